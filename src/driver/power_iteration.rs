use crate::domain::Domain;
use crate::linalg::LinearSolver;
use crate::problem::Assembler;
use crate::solver::{NewtonSolver, SolverError};

/// Solution slot holding the frozen source copy consumed by the weak forms
pub const SOURCE_SLOT: usize = 1;

/// Finds the dominant eigenvalue of a source-driven problem by power iteration:
/// SourceUpdate → CoarseSolve → EigenvalueUpdate → {Stop | SourceUpdate}
///
/// Each iteration copies the current solution into [SOURCE_SLOT] (where the weak forms
/// read it as a fixed right-hand-side term), runs a Newton solve, and recomputes the
/// eigenvalue from the new solution. The mesh is fixed throughout; this driver never
/// touches the adaptivity machinery.
#[derive(Clone, Copy, Debug)]
pub struct PowerIteration {
    pub newton: NewtonSolver,
    /// Stopping threshold on the relative eigenvalue change between iterations
    pub tolerance: f64,
    /// Iteration cap; exhausting it is reported, not fatal — the last iterate stays usable
    pub max_iterations: usize,
}

impl Default for PowerIteration {
    fn default() -> Self {
        Self {
            newton: NewtonSolver::default(),
            tolerance: 1e-8,
            max_iterations: 1000,
        }
    }
}

/// Outcome of a power-iteration run
#[derive(Debug, Clone)]
pub struct PowerIterationOutcome {
    /// The last computed eigenvalue
    pub eigenvalue: f64,
    /// Number of source iterations performed
    pub iterations: usize,
    /// Did the relative eigenvalue change meet the tolerance
    pub converged: bool,
    /// Eigenvalue after each iteration
    pub history: Vec<f64>,
}

impl PowerIteration {
    /// Iterate until the eigenvalue settles, mutating the solution in place
    ///
    /// `eigenvalue_fn` recomputes the eigenvalue as an integral functional of the newly
    /// solved flux (e.g. a yield integral weighted by per-material cross sections).
    /// Weak forms which reference the eigenvalue should share state with this closure
    /// so they see each update.
    pub fn run<F>(
        &self,
        domain: &mut Domain,
        assembler: &Assembler,
        backend: &dyn LinearSolver,
        initial_eigenvalue: f64,
        mut eigenvalue_fn: F,
    ) -> Result<PowerIterationOutcome, SolverError>
    where
        F: FnMut(&Domain) -> f64,
    {
        assert!(
            domain.mesh.num_slots() > SOURCE_SLOT,
            "The mesh must carry a source solution slot; cannot run the power iteration!"
        );

        let mut eigenvalue = initial_eigenvalue;
        let mut history = Vec::new();

        for i in 0..self.max_iterations {
            domain.mesh.copy_solution(0, SOURCE_SLOT);

            self.newton.solve(domain, assembler, backend)?;

            let previous = eigenvalue;
            eigenvalue = eigenvalue_fn(domain);
            history.push(eigenvalue);
            log::info!("eigenvalue iterate {}: {:.9}", i, eigenvalue);

            if ((eigenvalue - previous) / eigenvalue).abs() < self.tolerance {
                return Ok(PowerIterationOutcome {
                    eigenvalue,
                    iterations: i + 1,
                    converged: true,
                    history,
                });
            }
        }

        log::warn!(
            "Source iteration exhausted {} iterations without meeting its tolerance; the last iterate is still usable",
            self.max_iterations
        );
        Ok(PowerIterationOutcome {
            eigenvalue,
            iterations: self.max_iterations,
            converged: false,
            history,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mesh::Mesh;
    use crate::linalg::DenseLu;
    use crate::problem::{Assembler, FormArgs, TrialFn};

    // a solvable placeholder problem: -u'' + u = u_src with natural BCs
    fn source_problem() -> (Domain, Assembler) {
        let mut mesh = Mesh::from_regions(&[0.0, 1.0], &[2], &[0], &[4], 1, 2);
        mesh.set_solution_constant(0, &[1.0]);

        let mut assembler = Assembler::new();
        assembler.add_matrix_form(0, 0, |args: &FormArgs, trial: &TrialFn| {
            args.integrate(|m| trial.dudx[m] * args.dvdx[m] + trial.u[m] * args.v[m])
        });
        assembler.add_vector_form(0, |args: &FormArgs| {
            args.integrate(|m| {
                args.prev_ders[0][0][m] * args.dvdx[m] + args.prev_vals[0][0][m] * args.v[m]
                    - args.prev_vals[SOURCE_SLOT][0][m] * args.v[m]
            })
        });

        (Domain::from_mesh(mesh), assembler)
    }

    #[test]
    fn stationary_functional_converges_immediately() {
        let (mut domain, assembler) = source_problem();
        let iteration = PowerIteration::default();

        let outcome = iteration
            .run(&mut domain, &assembler, &DenseLu, 1.0, |_| 2.5)
            .unwrap();

        // first update moves 1.0 → 2.5, second sees no change
        assert!(outcome.converged);
        assert_eq!(outcome.iterations, 2);
        assert!((outcome.eigenvalue - 2.5).abs() < 1e-15);
        assert_eq!(outcome.history.len(), 2);
    }

    #[test]
    fn exhausted_cap_is_reported_not_fatal() {
        let (mut domain, assembler) = source_problem();
        let iteration = PowerIteration {
            max_iterations: 3,
            ..Default::default()
        };

        // a functional that never settles
        let mut flip = 1.0;
        let outcome = iteration
            .run(&mut domain, &assembler, &DenseLu, 5.0, |_| {
                flip = -flip;
                2.0 + flip
            })
            .unwrap();

        assert!(!outcome.converged);
        assert_eq!(outcome.iterations, 3);
        assert_eq!(outcome.history.len(), 3);
    }

    #[test]
    #[should_panic]
    fn single_slot_mesh_is_rejected() {
        let mesh = Mesh::uniform(0.0, 1.0, 2, 1, 1);
        let mut domain = Domain::from_mesh(mesh);
        let assembler = Assembler::new();

        let _ = PowerIteration::default().run(&mut domain, &assembler, &DenseLu, 1.0, |_| 1.0);
    }
}
