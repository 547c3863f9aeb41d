use crate::domain::{PipelineStage, QuantResult};
use crate::spectrum::{Mask, Spectrum};

/// One read-only pipeline stage over a spectrum.
pub trait StageExecutor {
    type Output;

    fn stage(&self) -> PipelineStage;

    fn execute(&self, spectrum: &Spectrum, mask: Option<&Mask>) -> QuantResult<Self::Output>;
}

#[cfg(test)]
mod tests {
    use super::StageExecutor;
    use crate::domain::{PipelineStage, QuantError, QuantErrorCategory, QuantResult};
    use crate::spectrum::{EnergyAxis, Mask, Spectrum};

    struct FailingStage;

    impl StageExecutor for FailingStage {
        type Output = ();

        fn stage(&self) -> PipelineStage {
            PipelineStage::Integration
        }

        fn execute(&self, _spectrum: &Spectrum, _mask: Option<&Mask>) -> QuantResult<()> {
            Err(QuantError::computation("RUN.STAGE", "stage execution failed"))
        }
    }

    #[test]
    fn stage_executor_uses_shared_error_types() {
        let axis = EnergyAxis::uniform(700.0, 1.0, 3).expect("axis");
        let spectrum = Spectrum::single(axis, vec![0.0; 3]).expect("spectrum");
        let error = FailingStage
            .execute(&spectrum, None)
            .expect_err("stage should fail");
        assert_eq!(error.category(), QuantErrorCategory::ComputationError);
        assert_eq!(error.exit_code(), 4);
        assert_eq!(error.code(), "RUN.STAGE");
        assert_eq!(FailingStage.stage().as_str(), "INTEGRATION");
    }
}
