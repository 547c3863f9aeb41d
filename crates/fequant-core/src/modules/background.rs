use super::StageExecutor;
use crate::common::constants::{DEFAULT_POLYNOMIAL_ORDER, DEFAULT_SIGNAL_RANGE, EnergyWindow};
use crate::domain::{ExecutionMode, PipelineStage, QuantError, QuantResult};
use crate::fitting::{Component, FitModel, FitOptions, PixelFitStatus, Profile};
use crate::numerics::{LinearSolveError, solve_least_squares};
use crate::spectrum::{Mask, NavMap, Spectrum};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use tracing::info;

const BACKGROUND_COMPONENT: &str = "background";
/// Stand-in decay length for a flat exponential estimate.
const FLAT_EXPONENTIAL_TAU: f64 = 1.0e12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum BackgroundType {
    #[default]
    Polynomial,
    PowerLaw,
    Exponential,
    Offset,
}

impl BackgroundType {
    pub const ALL: [Self; 4] = [
        Self::Polynomial,
        Self::PowerLaw,
        Self::Exponential,
        Self::Offset,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Polynomial => "Polynomial",
            Self::PowerLaw => "PowerLaw",
            Self::Exponential => "Exponential",
            Self::Offset => "Offset",
        }
    }
}

impl Display for BackgroundType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error(
    "unknown background type '{name}', expected one of Polynomial, PowerLaw, Exponential, Offset"
)]
pub struct UnknownBackgroundType {
    pub name: String,
}

impl FromStr for BackgroundType {
    type Err = UnknownBackgroundType;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownBackgroundType {
                name: value.to_string(),
            })
    }
}

/// Fits a background family over a pre-edge window and subtracts it from
/// the whole energy axis of every pixel.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackgroundRemover {
    window: EnergyWindow,
    kind: BackgroundType,
    polynomial_order: usize,
    fast: bool,
    execution: ExecutionMode,
}

impl Default for BackgroundRemover {
    fn default() -> Self {
        Self {
            window: DEFAULT_SIGNAL_RANGE,
            kind: BackgroundType::Polynomial,
            polynomial_order: DEFAULT_POLYNOMIAL_ORDER,
            fast: false,
            execution: ExecutionMode::Serial,
        }
    }
}

impl BackgroundRemover {
    pub fn new(window: EnergyWindow, kind: BackgroundType) -> Self {
        Self {
            window,
            kind,
            ..Self::default()
        }
    }

    pub fn with_polynomial_order(mut self, order: usize) -> Self {
        self.polynomial_order = order;
        self
    }

    /// Use the closed-form estimate only, skipping the nonlinear refinement.
    pub fn fast(mut self, fast: bool) -> Self {
        self.fast = fast;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    fn profile(&self) -> Profile {
        match self.kind {
            BackgroundType::Polynomial => Profile::Polynomial {
                order: self.polynomial_order,
                origin: self.window.lo,
                scale: self.window.width(),
            },
            BackgroundType::PowerLaw => Profile::PowerLaw,
            BackgroundType::Exponential => Profile::Exponential,
            BackgroundType::Offset => Profile::Offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BackgroundRemoval {
    pub spectrum: Spectrum,
    /// Per-pixel parameters of the subtracted background, in profile order.
    pub parameters: NavMap<Vec<f64>>,
    /// `None` for the closed-form estimate, which does not iterate.
    pub statuses: Option<NavMap<PixelFitStatus>>,
}

impl StageExecutor for BackgroundRemover {
    type Output = BackgroundRemoval;

    fn stage(&self) -> PipelineStage {
        PipelineStage::BackgroundRemoval
    }

    /// The mask is not consumed; every pixel gets its own background.
    fn execute(&self, spectrum: &Spectrum, _mask: Option<&Mask>) -> QuantResult<BackgroundRemoval> {
        let range = spectrum.axis().window_range(self.window);
        if range.len() < 2 {
            return Err(QuantError::input_validation(
                "INPUT.SIGNAL_RANGE",
                format!(
                    "background window [{}, {}] holds fewer than 2 samples of axis [{}, {}]",
                    self.window.lo,
                    self.window.hi,
                    spectrum.axis().min(),
                    spectrum.axis().max()
                ),
            ));
        }

        let profile = self.profile();
        let energies = &spectrum.energies()[range.clone()];
        let estimates = spectrum
            .pixels()
            .map(|pixel| estimate_parameters(&profile, energies, &pixel[range.clone()]))
            .collect::<QuantResult<Vec<_>>>()?;

        let (parameters, statuses) = if self.fast {
            (estimates, None)
        } else {
            let mut model = FitModel::new();
            model
                .push(Component::new(BACKGROUND_COMPONENT, profile.clone()))
                .map_err(|error| error.into_quant_error("RUN.BACKGROUND_FIT"))?;
            model.set_signal_range(self.window);
            let options = FitOptions::default().with_execution(self.execution);
            let result = model
                .multifit_from(spectrum, &options, None, |pixel| estimates[pixel].clone())
                .map_err(|error| error.into_quant_error("RUN.BACKGROUND_FIT"))?;
            let parameters = (0..spectrum.pixel_count())
                .map(|pixel| result.pixel_values(pixel).unwrap_or_default().to_vec())
                .collect();
            (parameters, Some(result.statuses()))
        };

        let mut data = Vec::with_capacity(spectrum.data().len());
        for (pixel, values) in spectrum.pixels().zip(&parameters) {
            let samples = spectrum.energies().iter().zip(pixel);
            data.extend(samples.map(|(x, y)| y - profile.evaluate(*x, values)));
        }

        info!(
            background = %self.kind,
            lo = self.window.lo,
            hi = self.window.hi,
            fast = self.fast,
            pixels = spectrum.pixel_count(),
            "background removed"
        );

        Ok(BackgroundRemoval {
            spectrum: Spectrum::new(spectrum.axis().clone(), spectrum.nav_shape(), data)?,
            parameters: NavMap::new(spectrum.nav_shape(), parameters)?,
            statuses,
        })
    }
}

/// Closed-form starting values: exact least squares for polynomials,
/// log-linear regression for power law and exponential.
fn estimate_parameters(
    profile: &Profile,
    energies: &[f64],
    values: &[f64],
) -> QuantResult<Vec<f64>> {
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let estimate = match profile {
        Profile::Polynomial {
            order,
            origin,
            scale,
        } => {
            let design: Vec<Vec<f64>> = energies
                .iter()
                .map(|energy| {
                    let t = (energy - origin) / scale;
                    (0..=*order).map(|power| t.powi(power as i32)).collect()
                })
                .collect();
            solve_least_squares(&design, values).map_err(least_squares_error)?
        }
        Profile::PowerLaw => match log_linear_fit(energies, values, |energy| energy.ln()) {
            Some((intercept, slope)) => vec![intercept.exp(), -slope],
            None => vec![mean, 0.0],
        },
        Profile::Exponential => match log_linear_fit(energies, values, |energy| energy) {
            Some((intercept, slope)) if slope != 0.0 => vec![intercept.exp(), -1.0 / slope],
            _ => vec![mean, FLAT_EXPONENTIAL_TAU],
        },
        _ => vec![mean],
    };
    Ok(estimate)
}

fn least_squares_error(error: LinearSolveError) -> QuantError {
    QuantError::computation("RUN.BACKGROUND_FIT", error.to_string())
}

/// Straight-line fit of `ln(y)` against `abscissa(x)` over the positive samples.
fn log_linear_fit(
    energies: &[f64],
    values: &[f64],
    abscissa: impl Fn(f64) -> f64,
) -> Option<(f64, f64)> {
    let points: Vec<(f64, f64)> = energies
        .iter()
        .zip(values)
        .filter(|(energy, value)| **energy > 0.0 && **value > 0.0)
        .map(|(energy, value)| (abscissa(*energy), value.ln()))
        .collect();
    if points.len() < 2 {
        return None;
    }

    let count = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / count;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / count;
    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    let sxy: f64 = points
        .iter()
        .map(|(x, y)| (x - mean_x) * (y - mean_y))
        .sum();
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = mean_y - slope * mean_x;
    (slope.is_finite() && intercept.is_finite()).then_some((intercept, slope))
}
