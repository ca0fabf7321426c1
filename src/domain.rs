/// Structures used to compute solution fields, norms and projections over a Domain
pub mod fields;
/// The internal geometric structure of a Domain
pub mod mesh;

use mesh::{elem::Elem, BoundaryCondition, Mesh};

/// High Level Description of an FEM Domain
///
/// Wraps a [Mesh] with a global Degree-of-Freedom numbering. DOFs are assigned per
/// equation in left-to-right element order: vertex functions shared by neighboring
/// `Elem`s share one DOF (enforcing solution continuity), Dirichlet-constrained vertex
/// functions carry no DOF, and every bubble function gets its own.
///
/// The numbering is regenerated from scratch by [Domain::from_mesh]; it never changes
/// between constructions, so the flatten/unflatten mapping between element coefficients
/// and the global solution vector is a stable bijection for the lifetime of a `Domain`.
pub struct Domain {
    pub mesh: Mesh,
    dof_map: Vec<Vec<Option<usize>>>,
    num_dofs: usize,
}

impl Domain {
    /// Construct a Domain from a Mesh, assigning a fresh DOF numbering
    pub fn from_mesh(mesh: Mesh) -> Self {
        let mut dom = Self {
            mesh,
            dof_map: Vec::new(),
            num_dofs: 0,
        };

        dom.gen_dofs();

        dom
    }

    // Generate Degrees of Freedom over the mesh according to the expansion orders on each Elem
    fn gen_dofs(&mut self) {
        let n_elems = self.mesh.num_active_elems();
        let n_eq = self.mesh.num_eq();

        self.dof_map = self
            .mesh
            .active_elems()
            .map(|elem| vec![None; n_eq * elem.num_local()])
            .collect();

        let mut dof_id_tracker = IdTracker::new(0);

        for eq in 0..n_eq {
            let mut shared_right: Option<usize> = None;

            for (elem_id, elem) in self.mesh.active_elems().enumerate() {
                let num_local = elem.num_local();

                // left vertex: shared with the previous Elem, or constrained on the boundary
                let left = if elem_id == 0 {
                    match self.mesh.bc_left()[eq] {
                        BoundaryCondition::Dirichlet(_) => None,
                        BoundaryCondition::Natural => Some(dof_id_tracker.next_id()),
                    }
                } else {
                    shared_right
                };

                // right vertex: constrained on the boundary, shared otherwise
                let right = if elem_id == n_elems - 1 {
                    match self.mesh.bc_right()[eq] {
                        BoundaryCondition::Dirichlet(_) => None,
                        BoundaryCondition::Natural => Some(dof_id_tracker.next_id()),
                    }
                } else {
                    Some(dof_id_tracker.next_id())
                };

                self.dof_map[elem_id][eq * num_local] = left;
                self.dof_map[elem_id][eq * num_local + 1] = right;

                for local in 2..num_local {
                    self.dof_map[elem_id][eq * num_local + local] = Some(dof_id_tracker.next_id());
                }

                shared_right = right;
            }
        }

        self.num_dofs = dof_id_tracker.next_id();
    }

    /// Total number of Degrees of Freedom
    pub fn num_dofs(&self) -> usize {
        self.num_dofs
    }

    /// Global DOF id of a local shape function, or `None` if it is Dirichlet-constrained
    pub fn dof(&self, elem_id: usize, eq: usize, local: usize) -> Option<usize> {
        self.dof_map[elem_id][eq * self.mesh.elems[elem_id].num_local() + local]
    }

    /// Iterate over all `Elem`s in the mesh
    pub fn elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.mesh.active_elems()
    }

    /// Flatten the current element coefficients (slot 0) into a global solution vector
    pub fn solution_vector(&self) -> Vec<f64> {
        let mut y = vec![0.0; self.num_dofs];

        for (elem_id, elem) in self.mesh.active_elems().enumerate() {
            for eq in 0..self.mesh.num_eq() {
                for local in 0..elem.num_local() {
                    if let Some(dof) = self.dof_map[elem_id][eq * elem.num_local() + local] {
                        y[dof] = elem.coeff(0, eq, local);
                    }
                }
            }
        }

        y
    }

    /// Write a global solution vector back into the element coefficients (slot 0)
    ///
    /// Dirichlet-constrained coefficients are left untouched
    pub fn set_solution_vector(&mut self, y: &[f64]) {
        assert!(
            y.len() == self.num_dofs,
            "Solution vector length does not match the DOF count; cannot write solution!"
        );

        let n_eq = self.mesh.num_eq();
        for (elem_id, elem) in self.mesh.elems.iter_mut().enumerate() {
            for eq in 0..n_eq {
                for local in 0..elem.num_local() {
                    if let Some(dof) = self.dof_map[elem_id][eq * elem.num_local() + local] {
                        elem.set_coeff(0, eq, local, y[dof]);
                    }
                }
            }
        }
    }
}

pub(crate) struct IdTracker {
    next_id: usize,
}

impl IdTracker {
    pub fn new(start: usize) -> Self {
        Self { next_id: start }
    }

    pub fn next_id(&mut self) -> usize {
        self.next_id += 1;
        self.next_id - 1
    }
}
