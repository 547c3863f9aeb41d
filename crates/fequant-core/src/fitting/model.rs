use super::optimizer::{Optimizer, OptimizerSettings, ResidualProblem, Termination, minimize};
use super::parameter::{BoundTransform, Parameter, ParameterError};
use super::profiles::Profile;
use crate::common::constants::EnergyWindow;
use crate::domain::{ExecutionMode, QuantError};
use crate::spectrum::{EnergyAxis, Mask, NavMap, Spectrum, SpectrumError, is_masked};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, trace, warn};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FitError {
    #[error(transparent)]
    Parameter(#[from] ParameterError),
    #[error(transparent)]
    Spectrum(#[from] SpectrumError),
    #[error("fit domain holds no samples of axis [{min}, {max}]")]
    EmptyDomain { min: f64, max: f64 },
    #[error("component name '{name}' is already used in this model")]
    DuplicateComponent { name: String },
}

impl FitError {
    pub fn into_quant_error(self, code: &'static str) -> QuantError {
        match self {
            Self::Spectrum(error) => error.into(),
            Self::Parameter(error) => QuantError::internal(code, error.to_string()),
            other => QuantError::computation(code, other.to_string()),
        }
    }
}

/// Named component with its own parameter set.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    name: String,
    profile: Profile,
    parameters: Vec<Parameter>,
}

impl Component {
    pub fn new(name: impl Into<String>, profile: Profile) -> Self {
        let parameters = profile
            .parameter_names()
            .into_iter()
            .zip(profile.default_values())
            .map(|(name, value)| Parameter::new(name, value))
            .collect();
        Self {
            name: name.into(),
            profile,
            parameters,
        }
    }

    /// Component whose parameters start at `values`, in profile order.
    pub fn with_values(
        name: impl Into<String>,
        profile: Profile,
        values: &[f64],
    ) -> Result<Self, ParameterError> {
        let mut component = Self::new(name, profile);
        if values.len() != component.parameters.len() {
            return Err(ParameterError::ValueCountMismatch {
                component: component.name,
                expected: component.parameters.len(),
                actual: values.len(),
            });
        }
        for (parameter, value) in component.parameters.iter_mut().zip(values) {
            parameter.set_value(*value)?;
        }
        Ok(component)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn profile(&self) -> &Profile {
        &self.profile
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameter(&self, name: &str) -> Result<&Parameter, ParameterError> {
        self.parameters
            .iter()
            .find(|parameter| parameter.name() == name)
            .ok_or_else(|| ParameterError::UnknownParameter {
                component: self.name.clone(),
                parameter: name.to_string(),
            })
    }

    pub fn parameter_mut(&mut self, name: &str) -> Result<&mut Parameter, ParameterError> {
        let component = self.name.clone();
        self.parameters
            .iter_mut()
            .find(|parameter| parameter.name() == name)
            .ok_or(ParameterError::UnknownParameter {
                component,
                parameter: name.to_string(),
            })
    }

    pub fn set_parameters_free(&mut self, names: &[&str]) -> Result<(), ParameterError> {
        for name in names {
            self.parameter_mut(name)?.set_free(true);
        }
        Ok(())
    }

    pub fn set_parameters_not_free(&mut self) {
        for parameter in &mut self.parameters {
            parameter.set_free(false);
        }
    }

    pub fn values(&self) -> Vec<f64> {
        self.parameters.iter().map(Parameter::value).collect()
    }
}

/// Inclusion window plus carved-out exclusions defining the fitted samples.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignalRange {
    include: Option<EnergyWindow>,
    exclude: Vec<EnergyWindow>,
}

impl SignalRange {
    pub fn active_indices(&self, axis: &EnergyAxis) -> Vec<usize> {
        axis.values()
            .iter()
            .enumerate()
            .filter(|(_, energy)| self.include.is_none_or(|window| window.contains(**energy)))
            .filter(|(_, energy)| !self.exclude.iter().any(|window| window.contains(**energy)))
            .map(|(index, _)| index)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FitOptions {
    pub optimizer: Optimizer,
    pub bounded: bool,
    pub execution: ExecutionMode,
    pub settings: OptimizerSettings,
}

impl FitOptions {
    pub fn bounded(mut self, bounded: bool) -> Self {
        self.bounded = bounded;
        self
    }

    pub fn with_optimizer(mut self, optimizer: Optimizer) -> Self {
        self.optimizer = optimizer;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }
}

/// An ordered sum of components fitted over a signal range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FitModel {
    components: Vec<Component>,
    signal_range: SignalRange,
}

impl FitModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, component: Component) -> Result<(), FitError> {
        if self.component(&component.name).is_ok() {
            return Err(FitError::DuplicateComponent {
                name: component.name,
            });
        }
        self.components.push(component);
        Ok(())
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn component(&self, name: &str) -> Result<&Component, ParameterError> {
        self.components
            .iter()
            .find(|component| component.name == name)
            .ok_or_else(|| ParameterError::UnknownComponent {
                component: name.to_string(),
            })
    }

    pub fn component_mut(&mut self, name: &str) -> Result<&mut Component, ParameterError> {
        self.components
            .iter_mut()
            .find(|component| component.name == name)
            .ok_or_else(|| ParameterError::UnknownComponent {
                component: name.to_string(),
            })
    }

    pub fn signal_range(&self) -> &SignalRange {
        &self.signal_range
    }

    /// Restrict the fit to the closed window.
    pub fn set_signal_range(&mut self, window: EnergyWindow) {
        self.signal_range.include = Some(window);
    }

    /// Carve the closed window out of the fit domain.
    pub fn remove_signal_range(&mut self, window: EnergyWindow) {
        self.signal_range.exclude.push(window);
    }

    pub fn set_bounds(
        &mut self,
        component: &str,
        parameter: &str,
        lower: Option<f64>,
        upper: Option<f64>,
    ) -> Result<(), ParameterError> {
        self.component_mut(component)?
            .parameter_mut(parameter)?
            .set_bounds(lower, upper)
    }

    pub fn set_free(
        &mut self,
        component: &str,
        parameter: &str,
        free: bool,
    ) -> Result<(), ParameterError> {
        self.component_mut(component)?
            .parameter_mut(parameter)?
            .set_free(free);
        Ok(())
    }

    pub fn set_parameters_not_free(&mut self) {
        for component in &mut self.components {
            component.set_parameters_not_free();
        }
    }

    pub fn parameter_count(&self) -> usize {
        self.components
            .iter()
            .map(|component| component.parameters.len())
            .sum()
    }

    pub fn initial_values(&self) -> Vec<f64> {
        self.components
            .iter()
            .flat_map(|component| component.values())
            .collect()
    }

    /// Sum of all components at `x` using the current parameter values.
    pub fn evaluate(&self, x: f64) -> f64 {
        self.evaluate_with(x, &self.initial_values())
    }

    /// Sum of all components at `x` for a flat parameter vector.
    pub fn evaluate_with(&self, x: f64, values: &[f64]) -> f64 {
        let mut offset = 0;
        let mut total = 0.0;
        for component in &self.components {
            let count = component.parameters.len();
            let parameters = &values[offset..offset + count];
            total += component.profile.evaluate(x, parameters);
            offset += count;
        }
        total
    }

    /// Fit every unmasked pixel independently, each starting from the model's
    /// current parameter values.
    pub fn multifit(
        &self,
        spectrum: &Spectrum,
        options: &FitOptions,
        mask: Option<&Mask>,
    ) -> Result<FitResult, FitError> {
        let initial = self.initial_values();
        self.multifit_from(spectrum, options, mask, |_| initial.clone())
    }

    /// Like [`FitModel::multifit`], but pixel `i` starts from `start(i)`, a
    /// full parameter vector in model order. Masked pixels keep their start.
    pub fn multifit_from<F>(
        &self,
        spectrum: &Spectrum,
        options: &FitOptions,
        mask: Option<&Mask>,
        start: F,
    ) -> Result<FitResult, FitError>
    where
        F: Fn(usize) -> Vec<f64> + Sync,
    {
        if let Some(mask) = mask {
            mask.ensure_matches(spectrum)?;
        }

        let indices = self.signal_range.active_indices(spectrum.axis());
        if indices.is_empty() {
            return Err(FitError::EmptyDomain {
                min: spectrum.axis().min(),
                max: spectrum.axis().max(),
            });
        }
        let energies: Vec<f64> = indices
            .iter()
            .map(|index| spectrum.energies()[*index])
            .collect();

        let parameter_count = self.parameter_count();
        let free: Vec<FreeSlot> = self
            .components
            .iter()
            .flat_map(|component| &component.parameters)
            .enumerate()
            .filter(|(_, parameter)| parameter.is_free())
            .map(|(index, parameter)| FreeSlot {
                index,
                transform: parameter.transform(options.bounded),
            })
            .collect();

        let fit_pixel = |pixel: usize| -> Result<PixelFit, FitError> {
            let initial = start(pixel);
            if initial.len() != parameter_count {
                return Err(ParameterError::ValueCountMismatch {
                    component: format!("pixel {pixel}"),
                    expected: parameter_count,
                    actual: initial.len(),
                }
                .into());
            }
            if is_masked(mask, pixel) {
                return Ok(PixelFit::masked(initial));
            }
            let data = spectrum.pixel(pixel);
            let observed: Vec<f64> = indices.iter().map(|index| data[*index]).collect();
            let problem = PixelProblem {
                model: self,
                energies: &energies,
                observed: &observed,
                template: &initial,
                free: &free,
            };
            let internal: Vec<f64> = free
                .iter()
                .map(|slot| slot.transform.to_internal(initial[slot.index]))
                .collect();
            let minimization = minimize(&problem, &internal, options.optimizer, &options.settings);
            trace!(
                pixel,
                iterations = minimization.iterations,
                termination = ?minimization.termination,
                "pixel fit finished"
            );
            let values = problem.external(&minimization.params);
            Ok(PixelFit {
                values,
                status: PixelFitStatus::from_termination(minimization.termination),
            })
        };

        let pixel_count = spectrum.pixel_count();
        let fits: Vec<PixelFit> = match options.execution {
            ExecutionMode::Serial => (0..pixel_count).map(fit_pixel).collect::<Result<_, _>>()?,
            ExecutionMode::Parallel => (0..pixel_count)
                .into_par_iter()
                .map(fit_pixel)
                .collect::<Result<_, _>>()?,
        };

        let result = FitResult::new(self.clone(), spectrum, fits)?;
        let not_converged = result.count_status(PixelFitStatus::NotConverged)
            + result.count_status(PixelFitStatus::Failed);
        if not_converged > 0 {
            warn!(
                not_converged,
                pixels = pixel_count,
                "fit kept last attempted parameters for non-converged pixels"
            );
        }
        debug!(
            pixels = pixel_count,
            samples = energies.len(),
            free_parameters = free.len(),
            bounded = options.bounded,
            optimizer = ?options.optimizer,
            "multifit finished"
        );
        Ok(result)
    }
}

#[derive(Debug, Clone, Copy)]
struct FreeSlot {
    index: usize,
    transform: BoundTransform,
}

struct PixelProblem<'a> {
    model: &'a FitModel,
    energies: &'a [f64],
    observed: &'a [f64],
    template: &'a [f64],
    free: &'a [FreeSlot],
}

impl PixelProblem<'_> {
    fn external(&self, internal: &[f64]) -> Vec<f64> {
        let mut values = self.template.to_vec();
        for (slot, value) in self.free.iter().zip(internal) {
            values[slot.index] = slot.transform.to_external(*value);
        }
        values
    }
}

impl ResidualProblem for PixelProblem<'_> {
    fn residual_count(&self) -> usize {
        self.observed.len()
    }

    fn residuals(&self, params: &[f64], out: &mut [f64]) {
        let values = self.external(params);
        for ((out, energy), observed) in out.iter_mut().zip(self.energies).zip(self.observed) {
            *out = self.model.evaluate_with(*energy, &values) - observed;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFitStatus {
    Converged,
    NotConverged,
    Masked,
    /// Residuals were not finite at the starting point.
    Failed,
}

impl PixelFitStatus {
    fn from_termination(termination: Termination) -> Self {
        match termination {
            Termination::NonFiniteResidual => Self::Failed,
            other if other.is_converged() => Self::Converged,
            _ => Self::NotConverged,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PixelFit {
    values: Vec<f64>,
    status: PixelFitStatus,
}

impl PixelFit {
    fn masked(values: Vec<f64>) -> Self {
        Self {
            values,
            status: PixelFitStatus::Masked,
        }
    }
}

/// Per-pixel best-fit parameters of one [`FitModel::multifit`] call.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    model: FitModel,
    pixels: NavMap<PixelFit>,
}

impl FitResult {
    fn new(model: FitModel, spectrum: &Spectrum, fits: Vec<PixelFit>) -> Result<Self, FitError> {
        Ok(Self {
            model,
            pixels: NavMap::new(spectrum.nav_shape(), fits)?,
        })
    }

    /// Flat parameter vector of one pixel, in model order.
    pub fn pixel_values(&self, pixel: usize) -> Option<&[f64]> {
        self.pixels.get(pixel).map(|fit| fit.values.as_slice())
    }

    pub fn parameter_map(
        &self,
        component: &str,
        parameter: &str,
    ) -> Result<NavMap<f64>, ParameterError> {
        let offset = self.parameter_offset(component, parameter)?;
        Ok(self.pixels.map(|fit| fit.values[offset]))
    }

    pub fn component_values(
        &self,
        component: &str,
        pixel: usize,
    ) -> Result<Vec<f64>, ParameterError> {
        let (offset, count) = self.component_span(component)?;
        Ok(self
            .pixels
            .get(pixel)
            .map(|fit| fit.values[offset..offset + count].to_vec())
            .unwrap_or_default())
    }

    pub fn statuses(&self) -> NavMap<PixelFitStatus> {
        self.pixels.map(|fit| fit.status)
    }

    pub fn count_status(&self, status: PixelFitStatus) -> usize {
        self.pixels
            .values()
            .iter()
            .filter(|fit| fit.status == status)
            .count()
    }

    fn parameter_offset(&self, component: &str, parameter: &str) -> Result<usize, ParameterError> {
        let (offset, _) = self.component_span(component)?;
        let index = self
            .model
            .component(component)?
            .parameters()
            .iter()
            .position(|candidate| candidate.name() == parameter)
            .ok_or_else(|| ParameterError::UnknownParameter {
                component: component.to_string(),
                parameter: parameter.to_string(),
            })?;
        Ok(offset + index)
    }

    fn component_span(&self, component: &str) -> Result<(usize, usize), ParameterError> {
        let mut offset = 0;
        for candidate in self.model.components() {
            let count = candidate.parameters().len();
            if candidate.name() == component {
                return Ok((offset, count));
            }
            offset += count;
        }
        Err(ParameterError::UnknownComponent {
            component: component.to_string(),
        })
    }
}
