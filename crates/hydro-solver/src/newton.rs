//! Damped Newton's method with backtracking line search (C5).
//!
//! Generic over the residual/Jacobian callables so the equation assembler
//! (`assembler.rs`) stays decoupled from the iteration itself: it hands in
//! `F(x)` and `J(x)` and gets back a converged `x` or a diverged/singular
//! error.

use crate::error::{SolverError, SolverResult};
use nalgebra::{DMatrix, DVector};
use tracing::debug;

/// Newton solver configuration: iteration/convergence/backtracking limits.
#[derive(Clone, Copy, Debug)]
pub struct NewtonConfig {
    /// Maximum Newton iterations.
    pub max_iterations: usize,
    /// Convergence tolerance on the residual infinity-norm.
    pub tol: f64,
    /// Armijo backtracking constant.
    pub backtrack_c: f64,
    /// Backtracking contraction factor.
    pub backtrack_rho: f64,
    /// Maximum backtracking steps per Newton iteration.
    pub backtrack_max_iterations: usize,
}

impl Default for NewtonConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            tol: 1e-6,
            backtrack_c: 1e-4,
            backtrack_rho: 0.5,
            backtrack_max_iterations: 100,
        }
    }
}

/// Newton iteration result.
#[derive(Debug, Clone)]
pub struct NewtonResult {
    pub x: DVector<f64>,
    pub residual_norm: f64,
    pub iterations: usize,
}

fn inf_norm(v: &DVector<f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

/// Solve `residual_fn(x) = 0` for `x`, starting from `x0`, using damped
/// Newton's method with Armijo backtracking on the residual infinity-norm.
///
/// `jacobian_fn` is evaluated once per Newton iteration; `residual_fn` is
/// evaluated once per Newton iteration plus once per backtracking trial.
/// The linear solve is a dense LU (this domain's systems are small enough
/// that sparsity doesn't pay for itself the way it would in thermo-flow's
/// larger systems); a Jacobian that fails to factor is reported directly
/// rather than patched with a pseudo-inverse, since a singular Jacobian here
/// almost always means a modeling bug (an isolated node not pinned, a
/// duplicate row) rather than transient ill-conditioning.
pub fn solve<F, J>(
    x0: DVector<f64>,
    residual_fn: F,
    jacobian_fn: J,
    config: &NewtonConfig,
) -> SolverResult<NewtonResult>
where
    F: Fn(&DVector<f64>) -> SolverResult<DVector<f64>>,
    J: Fn(&DVector<f64>) -> SolverResult<DMatrix<f64>>,
{
    let mut x = x0;
    let mut r = residual_fn(&x)?;
    let mut r_norm = inf_norm(&r);

    for iter in 0..config.max_iterations {
        if r_norm <= config.tol {
            debug!(iter, r_norm, "newton converged");
            return Ok(NewtonResult {
                x,
                residual_norm: r_norm,
                iterations: iter,
            });
        }

        let jac = jacobian_fn(&x)?;
        let delta = jac
            .clone()
            .lu()
            .solve(&(-&r))
            .ok_or_else(|| SolverError::LinearSolverSingular {
                what: format!("jacobian singular at newton iteration {iter}"),
            })?;

        let mut step = 1.0;
        let mut accepted: Option<(DVector<f64>, DVector<f64>, f64)> = None;
        for _ in 0..config.backtrack_max_iterations {
            let x_trial = &x + step * &delta;
            let r_trial = residual_fn(&x_trial)?;
            let r_trial_norm = inf_norm(&r_trial);
            if r_trial_norm <= (1.0 - config.backtrack_c * step) * r_norm {
                accepted = Some((x_trial, r_trial, r_trial_norm));
                break;
            }
            step *= config.backtrack_rho;
        }

        let (x_new, r_new, r_new_norm) = accepted.ok_or_else(|| SolverError::NewtonDiverged {
            what: format!(
                "backtracking failed to reduce the residual at iteration {iter} (|r|={r_norm:e})"
            ),
        })?;

        debug!(iter, r_norm = r_new_norm, step, "newton step accepted");
        x = x_new;
        r = r_new;
        r_norm = r_new_norm;
    }

    Err(SolverError::NewtonDiverged {
        what: format!(
            "exceeded {} iterations without reaching tol={:e}, final |r|={r_norm:e}",
            config.max_iterations, config.tol
        ),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_quadratic() {
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_element(1, x[0] * x[0] - 4.0))
        };
        let jacobian = |x: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_element(1, 1, 2.0 * x[0]))
        };

        let x0 = DVector::from_element(1, 3.0);
        let config = NewtonConfig::default();
        let result = solve(x0, residual, jacobian, &config).unwrap();

        assert!((result.x[0] - 2.0).abs() < 1e-6);
    }

    #[test]
    fn linear_system_two_unknowns() {
        // x + y = 3, x - y = 1 -> x=2, y=1
        let residual = |x: &DVector<f64>| -> SolverResult<DVector<f64>> {
            Ok(DVector::from_vec(vec![x[0] + x[1] - 3.0, x[0] - x[1] - 1.0]))
        };
        let jacobian = |_: &DVector<f64>| -> SolverResult<DMatrix<f64>> {
            Ok(DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 1.0, -1.0]))
        };
        let x0 = DVector::from_vec(vec![0.0, 0.0]);
        let result = solve(x0, residual, jacobian, &NewtonConfig::default()).unwrap();
        assert!((result.x[0] - 2.0).abs() < 1e-9);
        assert!((result.x[1] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn singular_jacobian_reported() {
        let residual =
            |x: &DVector<f64>| -> SolverResult<DVector<f64>> { Ok(DVector::from_element(1, x[0])) };
        let jacobian =
            |_: &DVector<f64>| -> SolverResult<DMatrix<f64>> { Ok(DMatrix::from_element(1, 1, 0.0)) };
        let x0 = DVector::from_element(1, 1.0);
        let err = solve(x0, residual, jacobian, &NewtonConfig::default()).unwrap_err();
        assert!(matches!(err, SolverError::LinearSolverSingular { .. }));
    }
}
