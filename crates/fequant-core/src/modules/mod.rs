pub mod align;
pub mod background;
pub mod edge_step;
pub mod integration;
pub mod voigt;

mod traits;

pub use align::{AlignmentReport, AlignmentStep, AutoAligner, ShiftAggregation};
pub use background::{BackgroundRemoval, BackgroundRemover, BackgroundType, UnknownBackgroundType};
pub use edge_step::{EdgeStepFit, EdgeStepRemoval, EdgeStepRemover};
pub use integration::{IntegrationExtractor, IntegrationQuantification, SecondEdge};
pub use traits::StageExecutor;
pub use voigt::{VoigtExtractor, VoigtQuantification};
