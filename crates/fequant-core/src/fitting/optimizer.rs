//! Damped least-squares minimisers shared by every fit in the pipeline.
//!
//! Both backends solve the damped normal equations `(JᵀJ + λD) δ = -Jᵀr`
//! with a forward-difference Jacobian; they differ in the damping matrix.

use crate::numerics::{DenseMatrix, lu_solve};
use serde::{Deserialize, Serialize};

const JACOBIAN_STEP: f64 = 1.490_116_119_384_765_6e-8;
const MIN_DAMPING: f64 = 1.0e-12;
const MAX_DAMPING: f64 = 1.0e16;
const DAMPING_FACTOR: f64 = 10.0;
const MIN_DIAGONAL: f64 = 1.0e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Optimizer {
    /// Levenberg damping `λI`.
    #[default]
    Leastsq,
    /// Marquardt damping `λ diag(JᵀJ)`, invariant to parameter scaling.
    LevenbergMarquardt,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerSettings {
    pub max_iterations: usize,
    pub ftol: f64,
    pub xtol: f64,
    pub gtol: f64,
    pub initial_damping: f64,
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1.0e-10,
            xtol: 1.0e-10,
            gtol: 1.0e-14,
            initial_damping: 1.0e-3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    ExactFit,
    CostConverged,
    StepConverged,
    GradientConverged,
    MaxIterations,
    DampingOverflow,
    NonFiniteResidual,
}

impl Termination {
    pub fn is_converged(self) -> bool {
        matches!(
            self,
            Self::ExactFit | Self::CostConverged | Self::StepConverged | Self::GradientConverged
        )
    }
}

/// Residual vector `model(p) - data` in the optimizer's coordinates.
pub trait ResidualProblem {
    fn residual_count(&self) -> usize;
    fn residuals(&self, params: &[f64], out: &mut [f64]);
}

#[derive(Debug, Clone, PartialEq)]
pub struct Minimization {
    pub params: Vec<f64>,
    pub cost: f64,
    pub iterations: usize,
    pub termination: Termination,
}

/// Minimise `0.5 |r(p)|^2` from `initial`.
///
/// The returned parameters are the last accepted iterate, so a run that
/// stops without converging still reports its best attempt.
pub fn minimize<P: ResidualProblem + ?Sized>(
    problem: &P,
    initial: &[f64],
    optimizer: Optimizer,
    settings: &OptimizerSettings,
) -> Minimization {
    let count = problem.residual_count();
    let mut params = initial.to_vec();
    let mut residuals = vec![0.0; count];
    problem.residuals(&params, &mut residuals);
    let mut cost = half_sum_of_squares(&residuals);

    if !cost.is_finite() {
        return finish(params, cost, 0, Termination::NonFiniteResidual);
    }
    if params.is_empty() || cost == 0.0 {
        return finish(params, cost, 0, Termination::ExactFit);
    }

    let dimension = params.len();
    let mut damping = settings.initial_damping;
    let mut jacobian = vec![0.0; count * dimension];
    let mut trial_residuals = vec![0.0; count];

    for iteration in 1..=settings.max_iterations {
        forward_difference_jacobian(problem, &params, &residuals, &mut jacobian);
        let (normal, gradient) = normal_equations(&jacobian, &residuals, dimension);

        let gradient_norm = gradient.iter().map(|value| value.abs()).fold(0.0, f64::max);
        if gradient_norm <= settings.gtol {
            return finish(params, cost, iteration, Termination::GradientConverged);
        }

        loop {
            let mut damped = normal.clone();
            for index in 0..dimension {
                let scale = match optimizer {
                    Optimizer::Leastsq => 1.0,
                    Optimizer::LevenbergMarquardt => normal[(index, index)].max(MIN_DIAGONAL),
                };
                damped[(index, index)] += damping * scale;
            }
            let rhs: Vec<f64> = gradient.iter().map(|value| -value).collect();

            let Ok(step) = lu_solve(&damped, &rhs) else {
                damping *= DAMPING_FACTOR;
                if damping > MAX_DAMPING {
                    return finish(params, cost, iteration, Termination::DampingOverflow);
                }
                continue;
            };

            let trial: Vec<f64> = params.iter().zip(&step).map(|(p, d)| p + d).collect();
            problem.residuals(&trial, &mut trial_residuals);
            let trial_cost = half_sum_of_squares(&trial_residuals);

            let step_norm = euclidean_norm(&step);
            let step_is_small =
                step_norm <= settings.xtol * (euclidean_norm(&params) + settings.xtol);

            if trial_cost.is_finite() && trial_cost < cost {
                let relative_decrease = (cost - trial_cost) / cost;
                params = trial;
                std::mem::swap(&mut residuals, &mut trial_residuals);
                cost = trial_cost;
                damping = (damping / DAMPING_FACTOR).max(MIN_DAMPING);

                if cost == 0.0 {
                    return finish(params, cost, iteration, Termination::ExactFit);
                }
                if relative_decrease <= settings.ftol {
                    return finish(params, cost, iteration, Termination::CostConverged);
                }
                if step_is_small {
                    return finish(params, cost, iteration, Termination::StepConverged);
                }
                break;
            }

            if step_is_small {
                return finish(params, cost, iteration, Termination::StepConverged);
            }
            if trial_cost.is_finite() && trial_cost - cost <= settings.ftol * cost {
                return finish(params, cost, iteration, Termination::CostConverged);
            }

            damping *= DAMPING_FACTOR;
            if damping > MAX_DAMPING {
                return finish(params, cost, iteration, Termination::DampingOverflow);
            }
        }
    }

    finish(
        params,
        cost,
        settings.max_iterations,
        Termination::MaxIterations,
    )
}

fn finish(
    params: Vec<f64>,
    cost: f64,
    iterations: usize,
    termination: Termination,
) -> Minimization {
    Minimization {
        params,
        cost,
        iterations,
        termination,
    }
}

/// Column-major `count × dimension` Jacobian.
fn forward_difference_jacobian<P: ResidualProblem + ?Sized>(
    problem: &P,
    params: &[f64],
    residuals: &[f64],
    jacobian: &mut [f64],
) {
    let count = residuals.len();
    let mut shifted = params.to_vec();
    let mut column = vec![0.0; count];

    for index in 0..params.len() {
        let step = JACOBIAN_STEP * params[index].abs().max(1.0);
        shifted[index] = params[index] + step;
        problem.residuals(&shifted, &mut column);
        shifted[index] = params[index];

        let target = &mut jacobian[index * count..(index + 1) * count];
        let pairs = column.iter().zip(residuals);
        for (derivative, (shifted_value, base_value)) in target.iter_mut().zip(pairs) {
            let value = (shifted_value - base_value) / step;
            *derivative = if value.is_finite() { value } else { 0.0 };
        }
    }
}

fn normal_equations(
    jacobian: &[f64],
    residuals: &[f64],
    dimension: usize,
) -> (DenseMatrix, Vec<f64>) {
    let count = residuals.len();
    let mut normal = DenseMatrix::zeros(dimension, dimension);
    let mut gradient = vec![0.0; dimension];

    for row in 0..dimension {
        let lhs = &jacobian[row * count..(row + 1) * count];
        gradient[row] = dot(lhs, residuals);
        for col in 0..=row {
            let rhs = &jacobian[col * count..(col + 1) * count];
            let value = dot(lhs, rhs);
            normal[(row, col)] = value;
            normal[(col, row)] = value;
        }
    }

    (normal, gradient)
}

fn dot(lhs: &[f64], rhs: &[f64]) -> f64 {
    lhs.iter().zip(rhs).map(|(a, b)| a * b).sum()
}

fn half_sum_of_squares(values: &[f64]) -> f64 {
    0.5 * values.iter().map(|value| value * value).sum::<f64>()
}

fn euclidean_norm(values: &[f64]) -> f64 {
    values.iter().map(|value| value * value).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::{Optimizer, OptimizerSettings, ResidualProblem, Termination, minimize};

    struct Exponential {
        x: Vec<f64>,
        y: Vec<f64>,
    }

    impl ResidualProblem for Exponential {
        fn residual_count(&self) -> usize {
            self.x.len()
        }

        fn residuals(&self, params: &[f64], out: &mut [f64]) {
            for ((out, x), y) in out.iter_mut().zip(&self.x).zip(&self.y) {
                *out = params[0] * (-params[1] * x).exp() - y;
            }
        }
    }

    fn exponential_problem() -> Exponential {
        let x: Vec<f64> = (0..40).map(|index| 0.1 * index as f64).collect();
        let y = x.iter().map(|x| 2.5 * (-1.3 * x).exp()).collect();
        Exponential { x, y }
    }

    #[test]
    fn both_backends_recover_noiseless_exponential() {
        let problem = exponential_problem();
        let settings = OptimizerSettings::default();
        for optimizer in [Optimizer::Leastsq, Optimizer::LevenbergMarquardt] {
            let result = minimize(&problem, &[1.0, 0.5], optimizer, &settings);
            assert!(result.termination.is_converged(), "{optimizer:?}");
            assert!((result.params[0] - 2.5).abs() < 1.0e-6, "{optimizer:?}");
            assert!((result.params[1] - 1.3).abs() < 1.0e-6, "{optimizer:?}");
        }
    }

    #[test]
    fn iteration_limit_keeps_last_accepted_iterate() {
        let problem = exponential_problem();
        let settings = OptimizerSettings {
            max_iterations: 1,
            ..OptimizerSettings::default()
        };
        let result = minimize(&problem, &[1.0, 0.5], Optimizer::Leastsq, &settings);
        assert_eq!(result.termination, Termination::MaxIterations);
        assert_eq!(result.iterations, 1);
        assert!(result.params.iter().all(|value| value.is_finite()));
        assert_ne!(result.params, vec![1.0, 0.5]);
    }

    #[test]
    fn non_finite_start_is_reported() {
        let problem = exponential_problem();
        let result = minimize(
            &problem,
            &[f64::NAN, 0.5],
            Optimizer::Leastsq,
            &OptimizerSettings::default(),
        );
        assert_eq!(result.termination, Termination::NonFiniteResidual);
        assert_eq!(result.iterations, 0);
    }
}
