use crate::common::constants::EnergyWindow;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum IntegrationError {
    #[error("integration input length mismatch: energy={energy}, values={values}")]
    LengthMismatch { energy: usize, values: usize },
    #[error("integration window [{lo}, {hi}] holds fewer than 2 samples")]
    InsufficientSamples { lo: f64, hi: f64 },
    #[error("integration window [{lo}, {hi}] is inverted")]
    InvertedWindow { lo: f64, hi: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowIntegralInput<'a> {
    pub energy: &'a [f64],
    pub values: &'a [f64],
    pub window: EnergyWindow,
}

impl<'a> WindowIntegralInput<'a> {
    pub fn new(energy: &'a [f64], values: &'a [f64], window: EnergyWindow) -> Self {
        Self {
            energy,
            values,
            window,
        }
    }
}

/// Trapezoidal integral over the samples whose energy lies in the closed window.
///
/// The energy grid is assumed strictly increasing, as guaranteed by
/// [`crate::spectrum::EnergyAxis`].
pub fn integrate_window(input: WindowIntegralInput<'_>) -> Result<f64, IntegrationError> {
    if input.energy.len() != input.values.len() {
        return Err(IntegrationError::LengthMismatch {
            energy: input.energy.len(),
            values: input.values.len(),
        });
    }
    let window = input.window;
    if window.lo > window.hi {
        return Err(IntegrationError::InvertedWindow {
            lo: window.lo,
            hi: window.hi,
        });
    }

    let start = input.energy.partition_point(|energy| *energy < window.lo);
    let end = input.energy.partition_point(|energy| *energy <= window.hi);
    if end < start + 2 {
        return Err(IntegrationError::InsufficientSamples {
            lo: window.lo,
            hi: window.hi,
        });
    }

    Ok(trapezoid(&input.energy[start..end], &input.values[start..end]))
}

pub fn trapezoid(energy: &[f64], values: &[f64]) -> f64 {
    energy
        .windows(2)
        .zip(values.windows(2))
        .map(|(x, y)| 0.5 * (x[1] - x[0]) * (y[0] + y[1]))
        .sum()
}

#[cfg(test)]
mod tests {
    use super::{IntegrationError, WindowIntegralInput, integrate_window, trapezoid};
    use crate::common::constants::EnergyWindow;

    #[test]
    fn trapezoid_is_exact_for_linear_data() {
        let energy: Vec<f64> = (0..11).map(|index| 700.0 + 0.5 * index as f64).collect();
        let values: Vec<f64> = energy.iter().map(|x| 2.0 * (x - 700.0) + 1.0).collect();
        // integral of 2t + 1 over [0, 5]
        assert!((trapezoid(&energy, &values) - 30.0).abs() <= 1.0e-12);
    }

    #[test]
    fn window_restricts_to_closed_interval() {
        let energy: Vec<f64> = (0..41).map(|index| 700.0 + 0.5 * index as f64).collect();
        let values = vec![1.0; energy.len()];
        let input = WindowIntegralInput::new(&energy, &values, EnergyWindow::new(709.5, 712.0));
        let integral = integrate_window(input).expect("integral");
        assert!((integral - 2.5).abs() <= 1.0e-12);
    }

    #[test]
    fn window_outside_grid_is_rejected() {
        let energy = [700.0, 701.0, 702.0];
        let values = [1.0, 1.0, 1.0];
        let input = WindowIntegralInput::new(&energy, &values, EnergyWindow::new(722.0, 727.0));
        let error = integrate_window(input).expect_err("empty window should fail");
        assert_eq!(
            error,
            IntegrationError::InsufficientSamples {
                lo: 722.0,
                hi: 727.0,
            }
        );
    }
}
