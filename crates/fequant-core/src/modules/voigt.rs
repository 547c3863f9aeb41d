//! Fe3+ fraction from an eight-peak Voigt decomposition of the L3 white line.

use super::StageExecutor;
use crate::common::constants::{
    Calibration, FE_L3_VOIGT_PEAKS, VOIGT_L3_CALIBRATION, VOIGT_PEAK_COUNT, VoigtPeakTable,
};
use crate::domain::{ExecutionMode, PipelineStage, QuantError, QuantResult};
use crate::fitting::{
    Component, FitModel, FitOptions, FitResult, Optimizer, ParameterError, Profile,
};
use crate::spectrum::{Mask, NavMap, Spectrum};
use tracing::{info, warn};

pub fn peak_name(index: usize) -> String {
    format!("voigt_{index}")
}

#[derive(Debug, Clone, Copy)]
pub struct VoigtExtractor {
    table: &'static VoigtPeakTable,
    calibration: Calibration,
    execution: ExecutionMode,
}

impl Default for VoigtExtractor {
    fn default() -> Self {
        Self {
            table: &FE_L3_VOIGT_PEAKS,
            calibration: VOIGT_L3_CALIBRATION,
            execution: ExecutionMode::Serial,
        }
    }
}

impl VoigtExtractor {
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    pub fn model(&self) -> QuantResult<FitModel> {
        let to_error =
            |error: ParameterError| QuantError::internal("RUN.VOIGT_MODEL", error.to_string());

        let mut model = FitModel::new();
        for index in 0..VOIGT_PEAK_COUNT {
            let peak = self.peak(index).map_err(to_error)?;
            model
                .push(peak)
                .map_err(|error| error.into_quant_error("RUN.VOIGT_MODEL"))?;
        }
        Ok(model)
    }

    fn peak(&self, index: usize) -> Result<Component, ParameterError> {
        let table = self.table;
        let centre = table.centres[index];
        let mut peak = Component::with_values(
            peak_name(index),
            Profile::Voigt,
            &[
                table.initial_area,
                centre,
                table.initial_fwhm,
                table.initial_gamma,
            ],
        )?;
        peak.parameter_mut("area")?.set_lower(Some(0.0))?;
        let tolerance = table.centre_tolerance;
        let (lo, hi) = (Some(centre - tolerance), Some(centre + tolerance));
        peak.parameter_mut("centre")?.set_bounds(lo, hi)?;
        peak.parameter_mut("FWHM")?
            .set_bounds(Some(0.0), Some(table.fwhm_max[index]))?;
        peak.parameter_mut("gamma")?
            .set_bounds(Some(0.0), Some(table.gamma_max[index]))?;
        Ok(peak)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct VoigtQuantification {
    /// `area_ferric / sum(area_normalisation)` per pixel.
    pub int_fe3: NavMap<f64>,
    pub q: NavMap<f64>,
    pub fit: FitResult,
}

impl StageExecutor for VoigtExtractor {
    type Output = VoigtQuantification;

    fn stage(&self) -> PipelineStage {
        PipelineStage::VoigtFitting
    }

    fn execute(
        &self,
        spectrum: &Spectrum,
        mask: Option<&Mask>,
    ) -> QuantResult<VoigtQuantification> {
        let cropped = spectrum.crop(self.table.window)?;
        let model = self.model()?;
        let options = FitOptions::default()
            .bounded(true)
            .with_optimizer(Optimizer::LevenbergMarquardt)
            .with_execution(self.execution);
        let fit = model
            .multifit(&cropped, &options, mask)
            .map_err(|error| error.into_quant_error("RUN.VOIGT_FIT"))?;

        let area_map = |index: usize| {
            fit.parameter_map(&peak_name(index), "area")
                .map_err(|error| QuantError::internal("RUN.VOIGT_MODEL", error.to_string()))
        };
        let ferric = area_map(self.table.ferric_peak)?;
        let normalisation = self
            .table
            .normalisation_peaks
            .iter()
            .map(|index| area_map(*index))
            .collect::<QuantResult<Vec<_>>>()?;

        let int_fe3 = NavMap::from_fn(ferric.shape(), |pixel| {
            let areas = normalisation.iter().map(|areas| areas.values()[pixel]);
            let denominator: f64 = areas.sum();
            ferric.values()[pixel] / denominator
        });
        let degenerate = int_fe3
            .values()
            .iter()
            .filter(|value| !value.is_finite())
            .count();
        if degenerate > 0 {
            warn!(degenerate, "L3 normalisation areas vanished");
        }
        let q = int_fe3.map(|value| self.calibration.apply(*value));

        info!(pixels = spectrum.pixel_count(), "voigt feature extracted");
        Ok(VoigtQuantification { int_fe3, q, fit })
    }
}

#[cfg(test)]
mod tests {
    use super::{StageExecutor, VoigtExtractor, peak_name};
    use crate::common::constants::{FE_L3_VOIGT_PEAKS, VOIGT_L3_CALIBRATION};
    use crate::numerics::voigt_profile;
    use crate::spectrum::{EnergyAxis, Spectrum};

    #[test]
    fn model_carries_bounds_from_peak_table() {
        let model = VoigtExtractor::default().model().expect("model");
        assert_eq!(model.components().len(), 8);
        let first = model.component(&peak_name(0)).expect("peak 0");
        assert_eq!(first.parameter("FWHM").expect("fwhm").upper(), Some(0.2));
        assert_eq!(first.parameter("area").expect("area").lower(), Some(0.0));
        let ferric = model.component(&peak_name(5)).expect("peak 5");
        let gamma = ferric.parameter("gamma").expect("gamma");
        assert_eq!(gamma.upper(), Some(0.45));
        let centre = ferric.parameter("centre").expect("centre");
        assert_eq!(centre.lower(), Some(709.75));
        assert_eq!(centre.upper(), Some(710.25));
    }

    #[test]
    fn synthetic_peaks_recover_area_ratio() {
        let table = &FE_L3_VOIGT_PEAKS;
        let areas = [0.02, 0.05, 0.08, 0.1, 0.12, 0.15, 0.06, 0.03];
        let axis = EnergyAxis::uniform(703.0, 0.05, 241).expect("axis");
        let data: Vec<f64> = axis
            .values()
            .iter()
            .map(|x| {
                (0..8)
                    .map(|index| {
                        let fwhm = if index == 0 { 0.15 } else { 0.25 };
                        voigt_profile(*x, areas[index], table.centres[index], fwhm, 0.1)
                    })
                    .sum::<f64>()
            })
            .collect();
        let spectrum = Spectrum::single(axis, data).expect("spectrum");

        let quantification = VoigtExtractor::default()
            .execute(&spectrum, None)
            .expect("voigt extraction");
        let expected = 0.15 / (0.05 + 0.08 + 0.1 + 0.12 + 0.15);
        let int_fe3 = quantification.int_fe3.as_scalar().expect("scalar");
        assert!(
            (int_fe3 - expected).abs() < 1.0e-6,
            "Int = {int_fe3}, expected {expected}"
        );
        assert_eq!(
            quantification.q.as_scalar(),
            Some(VOIGT_L3_CALIBRATION.apply(int_fe3))
        );
    }
}
