pub mod common;
pub mod domain;
pub mod fitting;
pub mod modules;
pub mod numerics;
pub mod pipelines;
pub mod spectrum;

pub use domain::{QuantError, QuantErrorCategory, QuantResult};
pub use pipelines::{ExtractionMethod, QuantConfig, QuantOutput, Quantification, quantify};
pub use spectrum::{EnergyAxis, Mask, NavMap, NavShape, Spectrum};
