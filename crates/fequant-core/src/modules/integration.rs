use super::StageExecutor;
use crate::common::constants::{
    Calibration, INTEGRATION_L2_CALIBRATION, INTEGRATION_L3_CALIBRATION, IntegrationWindows,
    L2_COVERAGE_THRESHOLD, L2_INTEGRATION_WINDOWS, L3_INTEGRATION_WINDOWS,
};
use crate::domain::{PipelineStage, QuantError, QuantResult};
use crate::numerics::{IntegrationError, WindowIntegralInput, integrate_window};
use crate::spectrum::{Mask, NavMap, Spectrum};
use serde::Serialize;
use tracing::{debug, info};

/// Which data produced the second quantification map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondEdge {
    /// Q2 comes from the L2 windows.
    Measured,
    /// The axis stops at or below the L2 coverage threshold; Q2 repeats Q1.
    FallbackToL3,
}

impl From<IntegrationError> for QuantError {
    fn from(error: IntegrationError) -> Self {
        QuantError::computation("RUN.INTEGRATION", error.to_string())
    }
}

#[derive(Debug, Clone, Copy)]
struct EdgeRatio {
    windows: &'static IntegrationWindows,
    calibration: Calibration,
}

impl EdgeRatio {
    fn ratio(&self, energy: &[f64], values: &[f64]) -> Result<f64, IntegrationError> {
        let input = |window| WindowIntegralInput::new(energy, values, window);
        let ferric = integrate_window(input(self.windows.ferric))?;
        let total = integrate_window(input(self.windows.total))?;
        Ok(ferric / total)
    }

    fn ratio_map(&self, spectrum: &Spectrum) -> Result<NavMap<f64>, IntegrationError> {
        let ratios = spectrum
            .pixels()
            .map(|pixel| self.ratio(spectrum.energies(), pixel))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(NavMap::from_fn(spectrum.nav_shape(), |pixel| ratios[pixel]))
    }
}

/// Fe3+ fraction from window-integral ratios over the L3 and, when
/// covered, the L2 white lines.
#[derive(Debug, Clone, Copy)]
pub struct IntegrationExtractor {
    l3: EdgeRatio,
    l2: EdgeRatio,
    coverage_threshold: f64,
    coverage_limit: Option<f64>,
}

impl Default for IntegrationExtractor {
    fn default() -> Self {
        Self {
            l3: EdgeRatio {
                windows: &L3_INTEGRATION_WINDOWS,
                calibration: INTEGRATION_L3_CALIBRATION,
            },
            l2: EdgeRatio {
                windows: &L2_INTEGRATION_WINDOWS,
                calibration: INTEGRATION_L2_CALIBRATION,
            },
            coverage_threshold: L2_COVERAGE_THRESHOLD,
            coverage_limit: None,
        }
    }
}

impl IntegrationExtractor {
    /// Decide L2 coverage from `axis_max` rather than from the end of the
    /// axis being integrated, which alignment may have translated.
    pub fn with_coverage_limit(mut self, axis_max: f64) -> Self {
        self.coverage_limit = Some(axis_max);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationQuantification {
    pub int_fe3: NavMap<f64>,
    pub q1: NavMap<f64>,
    /// L2 ratio, absent when [`SecondEdge::FallbackToL3`].
    pub int_fe3_l2: Option<NavMap<f64>>,
    pub q2: NavMap<f64>,
    pub second_edge: SecondEdge,
}

impl StageExecutor for IntegrationExtractor {
    type Output = IntegrationQuantification;

    fn stage(&self) -> PipelineStage {
        PipelineStage::Integration
    }

    /// The mask is not consumed: every pixel is integrated.
    fn execute(
        &self,
        spectrum: &Spectrum,
        _mask: Option<&Mask>,
    ) -> QuantResult<IntegrationQuantification> {
        let int_fe3 = self.l3.ratio_map(spectrum)?;
        let q1 = int_fe3.map(|value| self.l3.calibration.apply(*value));

        let axis_max = self.coverage_limit.unwrap_or(spectrum.axis().max());
        let (int_fe3_l2, q2, second_edge) = if axis_max > self.coverage_threshold {
            let ratios = self.l2.ratio_map(spectrum)?;
            let q2 = ratios.map(|value| self.l2.calibration.apply(*value));
            (Some(ratios), q2, SecondEdge::Measured)
        } else {
            debug!(
                axis_max,
                threshold = self.coverage_threshold,
                "L2 edge not covered, Q2 repeats Q1"
            );
            (None, q1.clone(), SecondEdge::FallbackToL3)
        };

        info!(
            pixels = spectrum.pixel_count(),
            second_edge = ?second_edge,
            "integration feature extracted"
        );
        Ok(IntegrationQuantification {
            int_fe3,
            q1,
            int_fe3_l2,
            q2,
            second_edge,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{IntegrationExtractor, SecondEdge, StageExecutor};
    use crate::common::constants::{INTEGRATION_L2_CALIBRATION, INTEGRATION_L3_CALIBRATION};
    use crate::spectrum::{EnergyAxis, Spectrum};

    fn ramp(start: f64, count: usize) -> Spectrum {
        let axis = EnergyAxis::uniform(start, 0.5, count).expect("axis");
        let data = axis.values().iter().map(|x| 1.0 + 0.01 * (x - 700.0)).collect();
        Spectrum::single(axis, data).expect("spectrum")
    }

    #[test]
    fn short_axis_falls_back_to_l3() {
        let spectrum = ramp(700.0, 55);
        assert_eq!(spectrum.axis().max(), 727.0);

        let output = IntegrationExtractor::default()
            .execute(&spectrum, None)
            .expect("integration");
        assert_eq!(output.second_edge, SecondEdge::FallbackToL3);
        assert_eq!(output.q2, output.q1);
        assert!(output.int_fe3_l2.is_none());
        let int_fe3 = output.int_fe3.as_scalar().expect("scalar");
        assert_eq!(
            output.q1.as_scalar(),
            Some(INTEGRATION_L3_CALIBRATION.apply(int_fe3))
        );
    }

    #[test]
    fn long_axis_measures_l2() {
        let spectrum = ramp(700.0, 61);
        let output = IntegrationExtractor::default()
            .execute(&spectrum, None)
            .expect("integration");
        assert_eq!(output.second_edge, SecondEdge::Measured);
        let ratio = output
            .int_fe3_l2
            .as_ref()
            .and_then(|map| map.as_scalar())
            .expect("l2 ratio");
        // Linear data integrate exactly: mean value times width on each window.
        let ferric = 5.0 * (1.0 + 0.01 * 24.5);
        let total = 9.0 * (1.0 + 0.01 * 22.5);
        assert!((ratio - ferric / total).abs() < 1.0e-12);
        assert_eq!(
            output.q2.as_scalar(),
            Some(INTEGRATION_L2_CALIBRATION.apply(ratio))
        );
    }

    #[test]
    fn coverage_limit_overrides_integrated_axis_end() {
        let spectrum = ramp(700.4, 54);
        assert!((spectrum.axis().max() - 726.9).abs() < 1.0e-9);

        let extractor = IntegrationExtractor::default();
        let output = extractor.execute(&spectrum, None).expect("integration");
        assert_eq!(output.second_edge, SecondEdge::FallbackToL3);

        let output = extractor
            .with_coverage_limit(727.2)
            .execute(&spectrum, None)
            .expect("integration");
        assert_eq!(output.second_edge, SecondEdge::Measured);
        assert!(output.int_fe3_l2.is_some());
    }

    #[test]
    fn axis_missing_l3_window_is_run_error() {
        let spectrum = ramp(712.5, 40);
        let error = IntegrationExtractor::default()
            .execute(&spectrum, None)
            .expect_err("missing L3 window should fail");
        assert_eq!(error.code(), "RUN.INTEGRATION");
    }
}
