pub mod faddeeva;
pub mod integration;
pub mod linalg;

pub use faddeeva::{faddeeva, voigt_profile};
pub use integration::{IntegrationError, WindowIntegralInput, integrate_window, trapezoid};
pub use linalg::{
    DenseMatrix, LinearSolveError, LuDecomposition, lu_factorize, lu_solve, solve_least_squares,
};
