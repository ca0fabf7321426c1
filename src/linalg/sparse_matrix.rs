use std::collections::BTreeMap;

use nalgebra::DMatrix;

/// Wrapper around a BTreeMap to store square matrices in a sparse data structure
///
/// Storage is full (not triangular): Newton Jacobians of first-order problems are
/// generally unsymmetric. Repeated insertions at the same coordinates accumulate,
/// matching the additive nature of element-wise assembly.
#[derive(Clone, Debug)]
pub struct SparseMatrix {
    /// Size of the square matrix
    pub dimension: usize,
    /// Matrix Entries, keyed by `[row, col]`
    entries: BTreeMap<[u32; 2], f64>,
}

impl SparseMatrix {
    pub fn new(dimension: usize) -> Self {
        assert!(
            dimension <= (u32::MAX as usize),
            "Matrix Dimension cannot exceed the size of a u32!"
        );

        Self {
            dimension,
            entries: BTreeMap::new(),
        }
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    /// Insert a value into the matrix, accumulating with any existing entry
    pub fn insert(&mut self, [row_idx, col_idx]: [usize; 2], value: f64) {
        assert!(
            row_idx < self.dimension,
            "row_idx exceeded matrix dimension; cannot insert value!"
        );
        assert!(
            col_idx < self.dimension,
            "col_idx exceeded matrix dimension; cannot insert value!"
        );

        let coordinates = [
            row_idx.try_into().expect("Row Idx was too large!"),
            col_idx.try_into().expect("Col Idx was too large!"),
        ];

        if let Some(current_value) = self.entries.get_mut(&coordinates) {
            *current_value += value;
        } else {
            self.entries.insert(coordinates, value);
        }
    }

    /// Insert a group of entries
    pub fn insert_group(&mut self, mut entry_group: Vec<([usize; 2], f64)>) {
        for (coordinates, value) in entry_group.drain(0..) {
            self.insert(coordinates, value);
        }
    }

    // Remove the entries from the matrix, replacing them with an empty BTreeMap.
    fn take_entries(&mut self) -> BTreeMap<[u32; 2], f64> {
        std::mem::take(&mut self.entries)
    }

    /// Consume the entries from another sparse matrix leaving it empty.
    pub fn consume_matrix(&mut self, other: &mut Self) {
        assert!(
            self.dimension == other.dimension,
            "Sparse Matrices have different dimensions; cannot consume matrix!"
        );
        let new_entries = other.take_entries();

        for (coordinates, value) in new_entries.iter() {
            if let Some(current_value) = self.entries.get_mut(coordinates) {
                *current_value += *value;
            } else {
                self.entries.insert(*coordinates, *value);
            }
        }
    }

    /// Iterate over all entries of the matrix in row-major order
    pub fn iter_entries(&self) -> impl Iterator<Item = ([usize; 2], f64)> + '_ {
        self.entries
            .iter()
            .map(|(coords, value)| ([coords[0] as usize, coords[1] as usize], *value))
    }
}

impl From<SparseMatrix> for DMatrix<f64> {
    fn from(sm: SparseMatrix) -> Self {
        let mut dense = DMatrix::zeros(sm.dimension, sm.dimension);

        for ([r, c], v) in sm.iter_entries() {
            dense[(r, c)] = v;
        }

        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_insertion() {
        let mut sm = SparseMatrix::new(10);

        sm.insert([0, 0], 1.0);
        sm.insert([0, 0], 1.0);
        sm.insert([9, 9], 10.0);
        sm.insert([4, 3], 0.25);
        sm.insert([0, 8], 0.125);
        sm.insert([8, 0], 0.125);

        let raw_entries = sm.take_entries();

        assert!((raw_entries.get(&[0, 0]).unwrap() - 2.0).abs() < 1e-15);
        assert!((raw_entries.get(&[9, 9]).unwrap() - 10.0).abs() < 1e-15);
        assert!((raw_entries.get(&[4, 3]).unwrap() - 0.25).abs() < 1e-15);

        // unsymmetric storage keeps transposed coordinates distinct
        assert!((raw_entries.get(&[0, 8]).unwrap() - 0.125).abs() < 1e-15);
        assert!((raw_entries.get(&[8, 0]).unwrap() - 0.125).abs() < 1e-15);
        assert!(raw_entries.get(&[3, 4]).is_none());
    }

    #[test]
    fn consume_another_matrix() {
        let mut sm_a = SparseMatrix::new(5);
        let mut sm_b = SparseMatrix::new(5);

        sm_a.insert([0, 0], 1.0);
        sm_a.insert([1, 1], 2.0);
        sm_a.insert([0, 4], 0.5);

        sm_b.insert([0, 0], 5.0);
        sm_b.insert([1, 1], 4.0);
        sm_b.insert([4, 0], -0.5);

        sm_a.consume_matrix(&mut sm_b);

        assert_eq!(sm_b.num_entries(), 0);

        let entries = sm_a.take_entries();
        assert!((entries.get(&[0, 0]).unwrap() - 6.0).abs() < 1e-15);
        assert!((entries.get(&[1, 1]).unwrap() - 6.0).abs() < 1e-15);
        assert!((entries.get(&[0, 4]).unwrap() - 0.5).abs() < 1e-15);
        assert!((entries.get(&[4, 0]).unwrap() + 0.5).abs() < 1e-15);
    }

    #[test]
    fn dense_conversion() {
        let mut sm = SparseMatrix::new(3);
        sm.insert([0, 0], 2.0);
        sm.insert([1, 0], -1.0);
        sm.insert([2, 2], 4.0);

        let dense: DMatrix<f64> = sm.into();
        assert!((dense[(0, 0)] - 2.0).abs() < 1e-15);
        assert!((dense[(1, 0)] + 1.0).abs() < 1e-15);
        assert!((dense[(2, 2)] - 4.0).abs() < 1e-15);
        assert!(dense[(0, 1)].abs() < 1e-15);
    }

    #[test]
    #[should_panic]
    fn consume_matrix_of_different_dim() {
        let mut sm_a = SparseMatrix::new(5);
        let mut sm_b = SparseMatrix::new(6);

        sm_a.consume_matrix(&mut sm_b);
    }

    #[test]
    #[should_panic]
    fn out_of_bounds_insertion() {
        let mut sm = SparseMatrix::new(10);
        sm.insert([10, 2], 1.0);
    }
}
