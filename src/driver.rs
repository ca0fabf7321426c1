/// Eigenvalue driver based on source (power) iteration
pub mod power_iteration;

use crate::adaptivity::ftr::{FtrError, FtrErrorEstimator};
use crate::adaptivity::{AdaptError, AdaptivityController};
use crate::domain::fields::{exact_error, exact_solution_norm, ExactSolution};
use crate::domain::Domain;
use crate::linalg::LinearSolver;
use crate::problem::Assembler;
use crate::report::{AdaptStepRecord, Reporter};
use crate::solver::{NewtonSolver, SolverError};
use std::fmt;

// subdivision / quadrature size used to normalize the diagnostic exact error
const EXACT_NORM_SUBDIVISION: usize = 500;
const EXACT_NORM_QUAD_POINTS: usize = 12;

#[derive(Debug, Clone)]
pub enum DriverError {
    /// The coarse Newton solve failed
    Solver(SolverError),
    /// An element's trial-refinement estimate failed
    Estimator(FtrError),
    /// The refinement selection received degenerate or malformed inputs
    Adapt(AdaptError),
}

impl From<SolverError> for DriverError {
    fn from(err: SolverError) -> Self {
        Self::Solver(err)
    }
}

impl From<FtrError> for DriverError {
    fn from(err: FtrError) -> Self {
        Self::Estimator(err)
    }
}

impl From<AdaptError> for DriverError {
    fn from(err: AdaptError) -> Self {
        Self::Adapt(err)
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Solver(err) => write!(f, "Coarse solve failed: {}", err),
            Self::Estimator(err) => write!(f, "Error estimation failed: {}", err),
            Self::Adapt(err) => write!(f, "Refinement selection failed: {}", err),
        }
    }
}

impl std::error::Error for DriverError {}

/// Outcome of an adaptive run
#[derive(Debug, Clone)]
pub struct AdaptOutcome {
    /// Did the maximum FTR error meet the global tolerance
    pub converged: bool,
    /// Number of outer iterations performed
    pub steps: usize,
    /// Maximum FTR error after the last estimation sweep
    pub max_ftr_error: f64,
    /// `(num_dofs, max_ftr_error)` per outer iteration
    pub history: Vec<(usize, f64)>,
}

/// Orchestrates the outer adaptivity loop:
/// CoarseSolve → Estimate → CheckGlobal → {Stop | Refine → CoarseSolve}
///
/// Stops when the maximum FTR error indicator drops below `global_tolerance`. The
/// exact-solution oracle, when supplied, feeds relative-error diagnostics only — it
/// never participates in the stopping decision. `max_steps` is a safety cap: reaching
/// it reports non-convergence through the outcome instead of looping forever, and the
/// last completed mesh/solution stays valid on the caller's `Domain`.
pub struct AdaptiveDriver {
    /// Newton solver for the coarse mesh (the estimator carries its own)
    pub newton: NewtonSolver,
    pub estimator: FtrErrorEstimator,
    pub controller: AdaptivityController,
    /// Stopping threshold on the maximum FTR error
    pub global_tolerance: f64,
    /// Safety cap on outer iterations; `None` trusts the estimator to converge
    pub max_steps: Option<usize>,
    /// Run each estimation sweep on the Rayon Global ThreadPool
    pub parallel_estimation: bool,
}

impl Default for AdaptiveDriver {
    fn default() -> Self {
        Self {
            newton: NewtonSolver::default(),
            estimator: FtrErrorEstimator {
                newton: NewtonSolver::default(),
                refinement: Default::default(),
                norm: crate::domain::fields::ErrorNorm::L2,
            },
            controller: AdaptivityController::default(),
            global_tolerance: 1e-2,
            max_steps: Some(50),
            parallel_estimation: false,
        }
    }
}

impl AdaptiveDriver {
    /// Run the adaptivity loop to completion, mutating `domain` in place
    ///
    /// On a fatal error the domain holds the mesh/solution of the last outer iteration
    /// that completed successfully.
    pub fn run(
        &self,
        domain: &mut Domain,
        assembler: &Assembler,
        backend: &dyn LinearSolver,
        exact: Option<&dyn ExactSolution>,
        reporter: &mut dyn Reporter,
    ) -> Result<AdaptOutcome, DriverError> {
        let mut history = Vec::new();
        let mut step = 1;

        loop {
            log::info!("============ Adaptivity step {} ============", step);
            log::info!("N_dof = {}", domain.num_dofs());

            self.newton.solve(domain, assembler, backend)?;

            let (element_errors, ref_pairs) = if self.parallel_estimation {
                self.estimator
                    .estimate_all_parallel(domain, assembler, backend)?
            } else {
                self.estimator.estimate_all(domain, assembler, backend)?
            };

            let max_ftr_error = element_errors.iter().cloned().fold(0.0, f64::max);
            log::info!("Max FTR error = {:e}", max_ftr_error);

            let exact_rel_error = exact.map(|oracle| {
                let err = exact_error(&domain.mesh, oracle, self.estimator.norm);
                let norm = exact_solution_norm(
                    oracle,
                    domain.mesh.bounds(),
                    domain.mesh.num_eq(),
                    self.estimator.norm,
                    EXACT_NORM_SUBDIVISION,
                    EXACT_NORM_QUAD_POINTS,
                );
                let rel = err / norm;
                log::info!("Relative error (exact) = {} %", 100.0 * rel);
                rel
            });

            history.push((domain.num_dofs(), max_ftr_error));
            reporter.on_step(&AdaptStepRecord {
                step,
                num_dofs: domain.num_dofs(),
                max_ftr_error,
                exact_rel_error,
            });

            if max_ftr_error < self.global_tolerance {
                reporter.on_finish();
                return Ok(AdaptOutcome {
                    converged: true,
                    steps: step,
                    max_ftr_error,
                    history,
                });
            }

            if let Some(cap) = self.max_steps {
                if step >= cap {
                    log::warn!(
                        "Adaptivity loop reached its safety cap of {} steps without meeting the global tolerance",
                        cap
                    );
                    reporter.on_finish();
                    return Ok(AdaptOutcome {
                        converged: false,
                        steps: step,
                        max_ftr_error,
                        history,
                    });
                }
            }

            *domain = self.controller.refine(domain, &element_errors, &ref_pairs)?;
            step += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mesh::Mesh;
    use crate::linalg::DenseLu;
    use crate::problem::{FormArgs, TrialFn};
    use crate::report::NullReporter;

    fn decay_problem() -> (Domain, Assembler) {
        let mut mesh = Mesh::uniform(0.0, 2.0, 3, 1, 1);
        mesh.set_solution_constant(0, &[1.0]);
        mesh.set_dirichlet_left(0, 1.0);

        let mut assembler = Assembler::new();
        assembler.add_matrix_form(0, 0, |args: &FormArgs, trial: &TrialFn| {
            args.integrate(|m| (trial.dudx[m] + trial.u[m]) * args.v[m])
        });
        assembler.add_vector_form(0, |args: &FormArgs| {
            args.integrate(|m| (args.prev_ders[0][0][m] + args.prev_vals[0][0][m]) * args.v[m])
        });

        (Domain::from_mesh(mesh), assembler)
    }

    #[test]
    fn loose_tolerance_stops_without_refining() {
        let (mut domain, assembler) = decay_problem();
        let dofs_before = domain.num_dofs();

        let driver = AdaptiveDriver {
            global_tolerance: 1e3,
            ..Default::default()
        };
        let outcome = driver
            .run(&mut domain, &assembler, &DenseLu, None, &mut NullReporter)
            .unwrap();

        assert!(outcome.converged);
        assert_eq!(outcome.steps, 1);
        assert_eq!(outcome.history.len(), 1);
        assert_eq!(domain.num_dofs(), dofs_before);
    }

    #[test]
    fn safety_cap_reports_non_convergence() {
        let (mut domain, assembler) = decay_problem();

        let driver = AdaptiveDriver {
            global_tolerance: 1e-30,
            max_steps: Some(2),
            ..Default::default()
        };
        let outcome = driver
            .run(&mut domain, &assembler, &DenseLu, None, &mut NullReporter)
            .unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.steps, 2);
        // the cap's final mesh remains valid and solved
        assert!(domain.num_dofs() > 0);
    }
}
