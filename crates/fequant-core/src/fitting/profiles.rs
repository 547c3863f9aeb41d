use crate::numerics::voigt_profile;
use std::f64::consts::{FRAC_PI_2, PI};

/// Closed-form component shapes a [`super::FitModel`] can hold.
///
/// Parameter order in every slice passed to [`Profile::evaluate`] follows
/// [`Profile::parameter_names`].
#[derive(Debug, Clone, PartialEq)]
pub enum Profile {
    /// `A / pi * gamma / ((x - centre)^2 + gamma^2)`
    Lorentzian,
    /// Area-normalised Voigt with Gaussian FWHM and Lorentzian half width `gamma`.
    Voigt,
    /// Two arctangent edge steps, each pinned to zero at `anchor`.
    DoubleArctan { anchor: f64 },
    /// `sum_k a_k t^k` with `t = (x - origin) / scale`.
    Polynomial {
        order: usize,
        origin: f64,
        scale: f64,
    },
    /// `A x^-r`
    PowerLaw,
    /// `A exp(-x / tau)`
    Exponential,
    Offset,
}

impl Profile {
    pub fn parameter_names(&self) -> Vec<String> {
        let fixed: &[&str] = match self {
            Self::Lorentzian => &["A", "centre", "gamma"],
            Self::Voigt => &["area", "centre", "FWHM", "gamma"],
            Self::DoubleArctan { .. } => &["height_1", "height_2", "x01", "x02"],
            Self::Polynomial { order, .. } => {
                return (0..=*order).map(|power| format!("a{power}")).collect();
            }
            Self::PowerLaw => &["A", "r"],
            Self::Exponential => &["A", "tau"],
            Self::Offset => &["offset"],
        };
        fixed.iter().map(|name| (*name).to_string()).collect()
    }

    pub fn parameter_count(&self) -> usize {
        match self {
            Self::Lorentzian => 3,
            Self::Voigt | Self::DoubleArctan { .. } => 4,
            Self::Polynomial { order, .. } => order + 1,
            Self::PowerLaw | Self::Exponential => 2,
            Self::Offset => 1,
        }
    }

    pub fn default_values(&self) -> Vec<f64> {
        match self {
            Self::Lorentzian => vec![1.0, 0.0, 1.0],
            Self::Voigt => vec![1.0, 0.0, 1.0, 1.0],
            Self::DoubleArctan { .. } => vec![1.0, 1.0, 0.0, 0.0],
            Self::Polynomial { order, .. } => vec![0.0; order + 1],
            Self::PowerLaw => vec![1.0, 1.0],
            Self::Exponential => vec![1.0, 1.0],
            Self::Offset => vec![0.0],
        }
    }

    pub fn evaluate(&self, x: f64, params: &[f64]) -> f64 {
        match self {
            Self::Lorentzian => {
                let (amplitude, centre, gamma) = (params[0], params[1], params[2]);
                let offset = x - centre;
                amplitude / PI * gamma / (offset * offset + gamma * gamma)
            }
            Self::Voigt => voigt_profile(x, params[0], params[1], params[2], params[3]),
            Self::DoubleArctan { anchor } => {
                arctan_step(x, params[0], params[2], *anchor)
                    + arctan_step(x, params[1], params[3], *anchor)
            }
            Self::Polynomial { origin, scale, .. } => {
                let t = (x - origin) / scale;
                params.iter().rev().fold(0.0, |acc, a| acc * t + a)
            }
            Self::PowerLaw => {
                if x <= 0.0 {
                    0.0
                } else {
                    params[0] * x.powf(-params[1])
                }
            }
            Self::Exponential => params[0] * (-x / params[1]).exp(),
            Self::Offset => params[0],
        }
    }
}

/// One edge step: `pi h atan(pi (x - x0) + pi/2)`, shifted to vanish at `anchor`.
pub fn arctan_step(x: f64, height: f64, centre: f64, anchor: f64) -> f64 {
    PI * height * (PI * (x - centre) + FRAC_PI_2).atan()
        - PI * height * (PI * (anchor - centre) + FRAC_PI_2).atan()
}
