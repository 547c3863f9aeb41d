pub mod errors;

pub use errors::{QuantError, QuantErrorCategory, QuantResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// How independent per-pixel fits are scheduled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    #[default]
    Serial,
    Parallel,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    BackgroundRemoval,
    AutoAlign,
    EdgeStep,
    VoigtFitting,
    Integration,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BackgroundRemoval => "BACKGROUND",
            Self::AutoAlign => "ALIGN",
            Self::EdgeStep => "EDGE_STEP",
            Self::VoigtFitting => "VOIGT",
            Self::Integration => "INTEGRATION",
        }
    }
}

impl Display for PipelineStage {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::{ExecutionMode, PipelineStage};

    #[test]
    fn stage_labels_are_stable() {
        assert_eq!(PipelineStage::BackgroundRemoval.to_string(), "BACKGROUND");
        assert_eq!(PipelineStage::EdgeStep.as_str(), "EDGE_STEP");
        assert_eq!(ExecutionMode::default(), ExecutionMode::Serial);
    }

    #[test]
    fn execution_mode_uses_snake_case_names() {
        let parsed: ExecutionMode = serde_json::from_str("\"parallel\"").expect("parse");
        assert_eq!(parsed, ExecutionMode::Parallel);
    }
}
