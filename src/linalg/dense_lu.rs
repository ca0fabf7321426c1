use super::{sparse_matrix::SparseMatrix, LinearSolveError, LinearSolver};
use nalgebra::{DMatrix, DVector};

/// Direct solver backed by Nalgebra's dense LU factorization
///
/// The sparse system matrix is expanded into a dense matrix before factorization, which
/// uses a large amount of memory when the matrices are large. This is perfectly adequate
/// for the system sizes produced by 1D meshes; larger problems should plug a sparse
/// backend into the [LinearSolver] seam instead.
pub struct DenseLu;

impl LinearSolver for DenseLu {
    fn solve(&self, matrix: &SparseMatrix, rhs: &[f64]) -> Result<Vec<f64>, LinearSolveError> {
        if rhs.len() != matrix.dimension {
            return Err(LinearSolveError::DimensionMismatch {
                expected: matrix.dimension,
                actual: rhs.len(),
            });
        }

        let dense: DMatrix<f64> = matrix.clone().into();
        let b = DVector::from_column_slice(rhs);

        dense
            .lu()
            .solve(&b)
            .map(|x| x.iter().cloned().collect())
            .ok_or(LinearSolveError::Singular)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solves_a_small_system() {
        // [2 1; 1 3] x = [3; 5] has the solution [4/5; 7/5]
        let mut matrix = SparseMatrix::new(2);
        matrix.insert([0, 0], 2.0);
        matrix.insert([0, 1], 1.0);
        matrix.insert([1, 0], 1.0);
        matrix.insert([1, 1], 3.0);

        let x = DenseLu.solve(&matrix, &[3.0, 5.0]).unwrap();

        assert!((x[0] - 0.8).abs() < 1e-14);
        assert!((x[1] - 1.4).abs() < 1e-14);
    }

    #[test]
    fn reports_singular_systems() {
        let mut matrix = SparseMatrix::new(2);
        matrix.insert([0, 0], 1.0);
        matrix.insert([0, 1], 2.0);
        matrix.insert([1, 0], 2.0);
        matrix.insert([1, 1], 4.0);

        assert!(matches!(
            DenseLu.solve(&matrix, &[1.0, 1.0]),
            Err(LinearSolveError::Singular)
        ));
    }

    #[test]
    fn reports_dimension_mismatches() {
        let matrix = SparseMatrix::new(3);
        assert!(matches!(
            DenseLu.solve(&matrix, &[1.0]),
            Err(LinearSolveError::DimensionMismatch {
                expected: 3,
                actual: 1
            })
        ));
    }
}
