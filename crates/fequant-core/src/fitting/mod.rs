//! Constrained nonlinear curve fitting over named parametric components.

pub mod model;
pub mod optimizer;
pub mod parameter;
pub mod profiles;

pub use model::{Component, FitError, FitModel, FitOptions, FitResult, PixelFitStatus, SignalRange};
pub use optimizer::{
    Minimization, Optimizer, OptimizerSettings, ResidualProblem, Termination, minimize,
};
pub use parameter::{Parameter, ParameterError};
pub use profiles::{Profile, arctan_step};
