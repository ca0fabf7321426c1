use crate::domain::Domain;
use crate::linalg::{LinearSolveError, LinearSolver};
use crate::problem::Assembler;
use std::fmt;

/// Drives the fixed-point Newton loop to convergence for one mesh/problem instance
///
/// Each call to [NewtonSolver::solve] allocates its own Jacobian matrix, residual vector
/// and backend factorization, all of which are released on every exit path, success or
/// failure. The mesh's coefficients are updated in place; on a failed solve they hold the
/// last completed iterate, which remains valid and inspectable.
#[derive(Clone, Copy, Debug)]
pub struct NewtonSolver {
    /// Convergence threshold on the l2-norm of the residual vector
    pub tolerance: f64,
    /// Iteration cap; exceeding it is a fatal [SolverError::NonConvergence]
    pub max_iterations: usize,
}

impl Default for NewtonSolver {
    fn default() -> Self {
        Self {
            tolerance: 1e-8,
            max_iterations: 150,
        }
    }
}

/// Diagnostics from a successful Newton solve
#[derive(Clone, Copy, Debug)]
pub struct NewtonSummary {
    /// Number of iterations performed, counting the final residual evaluation
    pub iterations: usize,
    /// l2-norm of the residual at convergence
    pub residual: f64,
}

#[derive(Debug, Clone)]
pub enum SolverError {
    /// The iteration cap was reached without the residual norm dropping below tolerance.
    /// Never retried with altered parameters: it signals a configuration/model error.
    NonConvergence { iterations: usize, residual: f64 },
    /// The linear-solve backend could not produce a correction vector
    LinearSolve(LinearSolveError),
}

impl From<LinearSolveError> for SolverError {
    fn from(err: LinearSolveError) -> Self {
        Self::LinearSolve(err)
    }
}

impl fmt::Display for SolverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::NonConvergence {
                iterations,
                residual,
            } => write!(
                f,
                "Newton's method did not converge within {} iterations (residual norm {:e})!",
                iterations, residual
            ),
            Self::LinearSolve(err) => write!(f, "Linear solve failed: {}", err),
        }
    }
}

impl std::error::Error for SolverError {}

impl NewtonSolver {
    /// Run Newton iterations on `domain` until the residual norm drops below tolerance
    ///
    /// The convergence test compares the squared residual norm against the squared
    /// tolerance to avoid a square root in the hot loop; reported diagnostics use the
    /// true norm. At least one full iteration is always performed because the initial
    /// residual on a freshly refined mesh can be spuriously small.
    pub fn solve(
        &self,
        domain: &mut Domain,
        assembler: &Assembler,
        backend: &dyn LinearSolver,
    ) -> Result<NewtonSummary, SolverError> {
        let mut y = domain.solution_vector();
        let mut it = 1;

        loop {
            let (jacobian, residual) = assembler.assemble(domain);

            let res_norm_squared: f64 = residual.iter().map(|r| r * r).sum();
            log::debug!(
                "---- Newton iter {}, residual norm: {:.15}",
                it,
                res_norm_squared.sqrt()
            );

            if res_norm_squared < self.tolerance * self.tolerance && it > 1 {
                return Ok(NewtonSummary {
                    iterations: it,
                    residual: res_norm_squared.sqrt(),
                });
            }

            // the matrix equation reads J(Yⁿ) ΔYⁿ⁺¹ = -F(Yⁿ)
            let neg_residual: Vec<f64> = residual.iter().map(|r| -r).collect();
            let correction = backend.solve(&jacobian, &neg_residual)?;

            for (y_i, delta) in y.iter_mut().zip(correction.iter()) {
                *y_i += delta;
            }
            it += 1;

            if it >= self.max_iterations {
                return Err(SolverError::NonConvergence {
                    iterations: it,
                    residual: res_norm_squared.sqrt(),
                });
            }

            domain.set_solution_vector(&y);
        }
    }
}
