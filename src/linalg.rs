/// Use Nalgebra's dense LU factorization to solve a linear system (small problems)
pub mod dense_lu;
/// Sparsely Packed Matrix
pub mod sparse_matrix;

pub use dense_lu::DenseLu;
use sparse_matrix::SparseMatrix;
use std::fmt;

/// Interface to a linear-solve backend
///
/// A backend factors `matrix` and solves for `rhs`, returning the solution vector or a
/// failure. Backends are always passed explicitly into solve calls; no part of the crate
/// reads an ambient, process-wide backend selection. Factorization state lives only for
/// the duration of one `solve` call, so backend resources are released on every exit path.
pub trait LinearSolver: Sync {
    fn solve(&self, matrix: &SparseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError>;
}

#[derive(Debug, Clone)]
/// Error type for linear-solve backends
pub enum LinearSolveError {
    Singular,
    DimensionMismatch { expected: usize, actual: usize },
}

impl fmt::Display for LinearSolveError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Singular => write!(
                f,
                "Matrix factorization failed; likely singular or severely ill-conditioned!"
            ),
            Self::DimensionMismatch { expected, actual } => write!(
                f,
                "RHS vector length ({}) does not match matrix dimension ({}); Cannot Solve!",
                actual, expected
            ),
        }
    }
}

impl std::error::Error for LinearSolveError {}
