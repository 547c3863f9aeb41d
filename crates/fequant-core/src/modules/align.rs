use crate::common::constants::{AlignmentTable, L3_ALIGNMENT};
use crate::domain::{ExecutionMode, QuantError, QuantResult};
use crate::fitting::{Component, FitModel, FitOptions, ParameterError, Profile};
use crate::spectrum::{Mask, Spectrum, is_masked};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

const PEAK_COMPONENT: &str = "l3_peak";

/// How per-pixel fitted centres are reduced to the one global shift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShiftAggregation {
    /// Centre of the first unmasked pixel.
    #[default]
    FirstPixel,
    /// Mean centre over unmasked pixels.
    Mean,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AlignmentStep {
    pub centre: f64,
    pub shift: f64,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct AlignmentReport {
    pub steps: Vec<AlignmentStep>,
}

impl AlignmentReport {
    pub fn total_shift(&self) -> f64 {
        self.steps.iter().map(|step| step.shift).sum()
    }
}

/// Iteratively recentres the Fe L3 maximum at the reference energy by
/// translating the shared energy axis.
#[derive(Debug, Clone, Copy)]
pub struct AutoAligner {
    table: &'static AlignmentTable,
    aggregation: ShiftAggregation,
    execution: ExecutionMode,
}

impl Default for AutoAligner {
    fn default() -> Self {
        Self {
            table: &L3_ALIGNMENT,
            aggregation: ShiftAggregation::FirstPixel,
            execution: ExecutionMode::Serial,
        }
    }
}

impl AutoAligner {
    pub fn with_aggregation(mut self, aggregation: ShiftAggregation) -> Self {
        self.aggregation = aggregation;
        self
    }

    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    fn model(&self) -> QuantResult<FitModel> {
        let table = self.table;
        let to_error =
            |error: ParameterError| QuantError::internal("RUN.ALIGN_MODEL", error.to_string());

        let mut peak = Component::with_values(
            PEAK_COMPONENT,
            Profile::Lorentzian,
            &[
                table.initial_amplitude,
                table.initial_centre,
                table.initial_gamma,
            ],
        )
        .map_err(to_error)?;
        let (centre_lo, centre_hi) = table.centre_bounds;
        peak.parameter_mut("centre")
            .and_then(|centre| centre.set_bounds(Some(centre_lo), Some(centre_hi)))
            .map_err(to_error)?;
        peak.parameter_mut("gamma")
            .and_then(|gamma| gamma.set_upper(Some(table.gamma_max)))
            .map_err(to_error)?;

        let mut model = FitModel::new();
        model
            .push(peak)
            .map_err(|error| error.into_quant_error("RUN.ALIGN_MODEL"))?;
        model.set_signal_range(table.fit_window);
        Ok(model)
    }

    /// Shift the energy axis of `spectrum` in place, once per iteration.
    pub fn align(
        &self,
        spectrum: &mut Spectrum,
        mask: Option<&Mask>,
    ) -> QuantResult<AlignmentReport> {
        if let Some(mask) = mask {
            mask.ensure_matches(spectrum)?;
        }
        let model = self.model()?;
        let options = FitOptions::default()
            .bounded(true)
            .with_execution(self.execution);

        let mut report = AlignmentReport::default();
        for iteration in 0..self.table.iterations {
            let cropped = spectrum.crop(self.table.evaluation_window)?;
            let result = model
                .multifit(&cropped, &options, mask)
                .map_err(|error| error.into_quant_error("RUN.ALIGN_FIT"))?;
            let centres = result
                .parameter_map(PEAK_COMPONENT, "centre")
                .map_err(|error| QuantError::internal("RUN.ALIGN_MODEL", error.to_string()))?;

            let centre = aggregate(centres.values(), mask, self.aggregation)?;
            let shift = self.table.reference_centre - centre;
            spectrum.shift_energy(shift)?;
            debug!(iteration, centre, shift, "aligner iteration");
            report.steps.push(AlignmentStep { centre, shift });
        }

        info!(
            iterations = report.steps.len(),
            total_shift = report.total_shift(),
            aggregation = ?self.aggregation,
            "energy axis aligned"
        );
        Ok(report)
    }
}

fn aggregate(
    centres: &[f64],
    mask: Option<&Mask>,
    aggregation: ShiftAggregation,
) -> QuantResult<f64> {
    let mut unmasked = centres
        .iter()
        .enumerate()
        .filter(|(pixel, _)| !is_masked(mask, *pixel))
        .map(|(_, centre)| *centre);

    let centre = match aggregation {
        ShiftAggregation::FirstPixel => unmasked.next(),
        ShiftAggregation::Mean => {
            let values: Vec<f64> = unmasked.collect();
            let sum: f64 = values.iter().sum();
            (!values.is_empty()).then(|| sum / values.len() as f64)
        }
    };
    centre.ok_or_else(|| {
        QuantError::input_validation(
            "INPUT.MASK_ALL_PIXELS",
            "auto shift needs at least one unmasked pixel",
        )
    })
}
