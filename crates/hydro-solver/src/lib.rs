//! Single-timestep hydraulic solver (C4/C5): assembles the nonlinear
//! head/flow equations for one trial and solves them with damped Newton's
//! method.
//!
//! The unknowns are node heads plus a per-node-kind auxiliary variable
//! (demand, outflow, net inflow, or leak demand) and link flows. Discrete
//! state (which links are closed, which valves are in which regime) is
//! supplied by the caller (`hydro-reconciler`) rather than owned here; this
//! crate only ever sees one fixed discrete configuration per solve.

pub mod assembler;
pub mod error;
pub mod newton;

pub use assembler::{DemandMode, HydraulicProblem, HydraulicSolution, VariableLayout};
pub use error::{SolverError, SolverResult};
pub use newton::{NewtonConfig, NewtonResult};

use nalgebra::DVector;

/// Solve one trial: build the initial guess, assemble residual/Jacobian
/// closures around `problem` and `state`, and run Newton's method to
/// convergence.
pub fn solve_step(
    problem: &HydraulicProblem,
    state: &hydro_network::SimState,
    previous: Option<&DVector<f64>>,
    config: &NewtonConfig,
) -> SolverResult<HydraulicSolution> {
    let layout = VariableLayout::new(problem.net);
    let x0 = assembler::initial_guess(problem, &layout, previous);

    let result = newton::solve(
        x0,
        |x| assembler::residual(problem, state, x, &layout),
        |x| assembler::jacobian(problem, state, x, &layout),
        config,
    )?;

    Ok(HydraulicSolution {
        x: result.x,
        layout,
    })
}
