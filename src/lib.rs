//! A 1D hp-Adaptive Finite Element Method Toolkit
//!
//! Drives nonlinear finite-element solves to convergence and adaptively refines a
//! one-dimensional mesh until a global error tolerance is met with as few degrees of
//! freedom as possible. Per-element "fast trial refinements" (FTR) — small locally
//! refined solves — both estimate the error and decide *how* each element is refined:
//! by raising its polynomial order, splitting it in space, or both.
//!
//! A second driver finds the dominant eigenvalue of a source-driven problem by power
//! iteration, re-running the same Newton solver against an updated source each pass.
//!
//! ```
//! use fem_1d::*;
//!
//! // y' = -y², y(0) = 1 over (0, 10); exact solution 1 / (x + 1)
//! let mut mesh = Mesh::uniform(0.0, 10.0, 5, 1, 1);
//! mesh.set_solution_constant(0, &[1.0]);
//! mesh.set_dirichlet_left(0, 1.0);
//! let mut domain = Domain::from_mesh(mesh);
//!
//! let mut assembler = Assembler::new();
//! assembler.add_matrix_form(0, 0, |args: &FormArgs, trial: &TrialFn| {
//!     args.integrate(|m| {
//!         (trial.dudx[m] + 2.0 * args.prev_vals[0][0][m] * trial.u[m]) * args.v[m]
//!     })
//! });
//! assembler.add_vector_form(0, |args: &FormArgs| {
//!     args.integrate(|m| {
//!         (args.prev_ders[0][0][m] + args.prev_vals[0][0][m].powi(2)) * args.v[m]
//!     })
//! });
//!
//! let outcome = AdaptiveDriver::default()
//!     .run(&mut domain, &assembler, &DenseLu, None, &mut NullReporter)
//!     .unwrap();
//!
//! assert!(outcome.converged);
//! ```

/// hp-Adaptivity: trial-refinement error estimation and refinement selection
pub mod adaptivity;
/// Shape functions and numerical integration
pub mod basis;
/// Mesh geometry, DOF numbering and solution fields
pub mod domain;
/// Outer solve drivers: the adaptivity loop and the eigenvalue power iteration
pub mod driver;
/// Sparse matrices and linear-solve backends
pub mod linalg;
/// Weak forms and system assembly
pub mod problem;
/// Convergence reporting
pub mod report;
/// The nonlinear (Newton) solver
pub mod solver;

pub use adaptivity::ftr::{FtrErrorEstimator, RefPair, TrialRefinement};
pub use adaptivity::{AdaptMode, AdaptivityController};
pub use domain::fields::{ErrorNorm, ExactSolution};
pub use domain::mesh::hp_refinement::HpRef;
pub use domain::mesh::{BoundaryCondition, Mesh};
pub use domain::Domain;
pub use driver::power_iteration::{PowerIteration, PowerIterationOutcome, SOURCE_SLOT};
pub use driver::{AdaptOutcome, AdaptiveDriver, DriverError};
pub use linalg::{DenseLu, LinearSolver};
pub use problem::{Assembler, FormArgs, Side, SurfArgs, TrialFn, TrialPoint};
pub use report::{AdaptStepRecord, CsvReporter, NullReporter, Reporter};
pub use solver::{NewtonSolver, NewtonSummary, SolverError};
