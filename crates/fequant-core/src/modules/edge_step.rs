use super::StageExecutor;
use crate::common::constants::{EdgeStepTable, FE_EDGE_STEP};
use crate::domain::{ExecutionMode, PipelineStage, QuantError, QuantResult};
use crate::fitting::{
    Component, FitModel, FitOptions, ParameterError, PixelFitStatus, Profile,
};
use crate::spectrum::{Mask, NavMap, Spectrum};
use tracing::info;

const EDGE_COMPONENT: &str = "edge_step";

/// Removes the L3 and L2 continuum steps with a double-arctangent fitted
/// outside the white-line windows.
#[derive(Debug, Clone, Copy)]
pub struct EdgeStepRemover {
    table: &'static EdgeStepTable,
    execution: ExecutionMode,
}

impl Default for EdgeStepRemover {
    fn default() -> Self {
        Self {
            table: &FE_EDGE_STEP,
            execution: ExecutionMode::Serial,
        }
    }
}

impl EdgeStepRemover {
    pub fn with_execution(mut self, execution: ExecutionMode) -> Self {
        self.execution = execution;
        self
    }

    fn profile(&self) -> Profile {
        Profile::DoubleArctan {
            anchor: self.table.anchor,
        }
    }

    fn model(&self) -> QuantResult<FitModel> {
        let table = self.table;
        let to_error =
            |error: ParameterError| QuantError::internal("RUN.EDGE_STEP_MODEL", error.to_string());

        let mut step = Component::with_values(
            EDGE_COMPONENT,
            self.profile(),
            &[
                table.initial_height,
                table.initial_height,
                table.l3_centre,
                table.l2_centre,
            ],
        )
        .map_err(to_error)?;
        step.set_parameters_not_free();
        step.set_parameters_free(&["height_1", "height_2"])
            .map_err(to_error)?;

        let mut model = FitModel::new();
        for window in table.excluded_windows {
            model.remove_signal_range(window);
        }
        model
            .push(step)
            .map_err(|error| error.into_quant_error("RUN.EDGE_STEP_MODEL"))?;
        Ok(model)
    }
}

/// Fitted step heights per pixel.
#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStepFit {
    pub height_1: NavMap<f64>,
    pub height_2: NavMap<f64>,
    pub statuses: NavMap<PixelFitStatus>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EdgeStepRemoval {
    pub fine_structure: Spectrum,
    pub fit: EdgeStepFit,
}

impl StageExecutor for EdgeStepRemover {
    type Output = EdgeStepRemoval;

    fn stage(&self) -> PipelineStage {
        PipelineStage::EdgeStep
    }

    fn execute(&self, spectrum: &Spectrum, mask: Option<&Mask>) -> QuantResult<EdgeStepRemoval> {
        let model = self.model()?;
        let options = FitOptions::default().with_execution(self.execution);
        let result = model
            .multifit(spectrum, &options, mask)
            .map_err(|error| error.into_quant_error("RUN.EDGE_STEP_FIT"))?;

        let profile = self.profile();
        let mut data = Vec::with_capacity(spectrum.data().len());
        for (index, pixel) in spectrum.pixels().enumerate() {
            let values = result
                .component_values(EDGE_COMPONENT, index)
                .map_err(|error| QuantError::internal("RUN.EDGE_STEP_MODEL", error.to_string()))?;
            let samples = spectrum.energies().iter().zip(pixel);
            data.extend(samples.map(|(x, y)| y - profile.evaluate(*x, &values)));
        }

        let height_map = |name: &str| {
            result
                .parameter_map(EDGE_COMPONENT, name)
                .map_err(|error| QuantError::internal("RUN.EDGE_STEP_MODEL", error.to_string()))
        };
        let height_1 = height_map("height_1")?;
        let height_2 = height_map("height_2")?;
        let fit = EdgeStepFit {
            height_1,
            height_2,
            statuses: result.statuses(),
        };

        info!(pixels = spectrum.pixel_count(), "edge steps removed");
        Ok(EdgeStepRemoval {
            fine_structure: Spectrum::new(spectrum.axis().clone(), spectrum.nav_shape(), data)?,
            fit,
        })
    }
}
