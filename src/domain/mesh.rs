/// A Finite Element covering an interval of the problem domain
pub mod elem;
/// Structures and Functions to facilitate hp-refinement
pub mod hp_refinement;

use crate::domain::fields::project_onto;
use elem::Elem;
use hp_refinement::{HpRef, HpRefError};

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};

/// Minimum element length. h-Refinements will fail after elements are shorter than this value.
pub const MIN_ELEM_LENGTH: f64 = 3.0518e-5; // 15ish refinement layers with unit sized elements

/// Maximum Polynomial expansion. p-Refinements will fail when Elem's expansion orders exceed this value.
pub const MAX_POLYNOMIAL_ORDER: usize = 10;

/// Boundary condition applied to one equation at one end of the domain
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BoundaryCondition {
    /// No essential constraint; boundary behavior comes from surface forms (if any)
    Natural,
    /// The solution value is fixed; the associated vertex coefficient carries no DOF
    Dirichlet(f64),
}

/// Information used to define the geometric structure and refinement state of a Domain.
///
/// Elements are stored in left-to-right domain order and partition the domain contiguously.
/// An `Elem`'s index in the list is its id; ids are reassigned whenever a refinement changes
/// the element count, and are stable between refinements.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub elems: Vec<Elem>,
    n_eq: usize,
    n_slots: usize,
    bc_left: Vec<BoundaryCondition>,
    bc_right: Vec<BoundaryCondition>,
}

impl Mesh {
    /// Construct a Mesh of equally sized Elems over `[a, b]` with a uniform expansion order
    ///
    /// All Elems carry material marker `0` and a single solution slot
    pub fn uniform(a: f64, b: f64, n_elems: usize, poly_order: usize, n_eq: usize) -> Self {
        assert!(b > a, "Domain bounds must be strictly increasing; cannot construct Mesh!");
        assert!(n_elems > 0, "Meshes require at least one Elem; cannot construct Mesh!");

        let h = (b - a) / n_elems as f64;
        let elems = (0..n_elems)
            .map(|i| {
                Elem::new(
                    i,
                    [a + i as f64 * h, a + (i + 1) as f64 * h],
                    0,
                    poly_order,
                    n_eq,
                    1,
                )
            })
            .collect();

        Self {
            elems,
            n_eq,
            n_slots: 1,
            bc_left: vec![BoundaryCondition::Natural; n_eq],
            bc_right: vec![BoundaryCondition::Natural; n_eq],
        }
    }

    /// Construct a Mesh from a sequence of material regions
    ///
    /// `interfaces` holds the `n + 1` region boundaries for `n` regions; each region is
    /// subdivided equidistantly into `subdivisions[r]` Elems carrying `markers[r]` and
    /// an initial expansion order of `poly_orders[r]`. Multiple solution slots may be
    /// requested for drivers which keep a source copy of the solution.
    pub fn from_regions(
        interfaces: &[f64],
        poly_orders: &[usize],
        markers: &[usize],
        subdivisions: &[usize],
        n_eq: usize,
        n_slots: usize,
    ) -> Self {
        let n_regions = interfaces.len().saturating_sub(1);
        assert!(
            n_regions > 0,
            "Meshes require at least one region; cannot construct Mesh!"
        );
        assert!(
            poly_orders.len() == n_regions
                && markers.len() == n_regions
                && subdivisions.len() == n_regions,
            "Region description arrays must all have one entry per region; cannot construct Mesh!"
        );
        assert!(
            interfaces.windows(2).all(|w| w[1] > w[0]),
            "Region interfaces must be strictly increasing; cannot construct Mesh!"
        );

        let mut elems = Vec::new();
        for r in 0..n_regions {
            assert!(
                subdivisions[r] > 0,
                "Regions require at least one subdivision; cannot construct Mesh!"
            );
            let h = (interfaces[r + 1] - interfaces[r]) / subdivisions[r] as f64;
            for i in 0..subdivisions[r] {
                elems.push(Elem::new(
                    elems.len(),
                    [
                        interfaces[r] + i as f64 * h,
                        interfaces[r] + (i + 1) as f64 * h,
                    ],
                    markers[r],
                    poly_orders[r],
                    n_eq,
                    n_slots,
                ));
            }
        }

        Self {
            elems,
            n_eq,
            n_slots,
            bc_left: vec![BoundaryCondition::Natural; n_eq],
            bc_right: vec![BoundaryCondition::Natural; n_eq],
        }
    }

    /// Number of equations
    pub fn num_eq(&self) -> usize {
        self.n_eq
    }

    /// Number of stored solution slots
    pub fn num_slots(&self) -> usize {
        self.n_slots
    }

    /// Number of active Elems
    pub fn num_active_elems(&self) -> usize {
        self.elems.len()
    }

    /// Iterate over the active Elems in left-to-right domain order
    pub fn active_elems(&self) -> impl Iterator<Item = &Elem> + '_ {
        self.elems.iter()
    }

    /// Bounds of the problem domain
    pub fn bounds(&self) -> [f64; 2] {
        [
            self.elems.first().unwrap().bounds[0],
            self.elems.last().unwrap().bounds[1],
        ]
    }

    /// Boundary condition at the left end of the domain for each equation
    pub fn bc_left(&self) -> &[BoundaryCondition] {
        &self.bc_left
    }

    /// Boundary condition at the right end of the domain for each equation
    pub fn bc_right(&self) -> &[BoundaryCondition] {
        &self.bc_right
    }

    /// Fix the solution value of one equation at the left end of the domain
    ///
    /// The associated vertex coefficient is set in every solution slot and carries no DOF
    pub fn set_dirichlet_left(&mut self, eq: usize, value: f64) {
        self.bc_left[eq] = BoundaryCondition::Dirichlet(value);
        for slot in 0..self.n_slots {
            self.elems[0].set_coeff(slot, eq, 0, value);
        }
    }

    /// Fix the solution value of one equation at the right end of the domain
    pub fn set_dirichlet_right(&mut self, eq: usize, value: f64) {
        self.bc_right[eq] = BoundaryCondition::Dirichlet(value);
        let last = self.elems.len() - 1;
        for slot in 0..self.n_slots {
            self.elems[last].set_coeff(slot, eq, 1, value);
        }
    }

    /// Set one solution slot to a spatially constant value per equation over the whole domain
    pub fn set_solution_constant(&mut self, slot: usize, values: &[f64]) {
        for elem in self.elems.iter_mut() {
            elem.set_constant(slot, values);
        }
    }

    /// Copy one solution slot into another on every Elem
    pub fn copy_solution(&mut self, from: usize, to: usize) {
        for elem in self.elems.iter_mut() {
            elem.copy_slot(from, to);
        }
    }

    /// Scale one solution slot by a constant on every Elem
    pub fn scale_solution(&mut self, slot: usize, factor: f64) {
        for elem in self.elems.iter_mut() {
            elem.scale_slot(slot, factor);
        }
    }

    /// Solution value and physical derivative at a physical coordinate
    ///
    /// On element boundaries the solution is evaluated on the right-adjacent Elem
    /// (either gives the same value for the continuous components)
    pub fn solution_value_and_deriv(&self, slot: usize, eq: usize, x: f64) -> (f64, f64) {
        let [a, b] = self.bounds();
        assert!(
            x >= a && x <= b,
            "Coordinate {} falls outside the domain; cannot evaluate solution!",
            x
        );

        let idx = self
            .elems
            .partition_point(|elem| elem.bounds[1] < x)
            .min(self.elems.len() - 1);
        self.elems[idx].value_and_deriv(slot, eq, x)
    }

    /// Apply a single hp-refinement to the Elem with the given id
    ///
    /// Solution coefficients are transferred onto the replacement Elem(s): a pure
    /// p-refinement keeps the represented solution bit-for-bit (hierarchic basis);
    /// an h-refinement projects the parent's solution onto each child so the new
    /// coefficients remain a good initial guess for the next nonlinear solve.
    ///
    /// Elem ids are reassigned to match the new left-to-right ordering.
    pub fn refine_element(&mut self, id: usize, refinement: HpRef) -> Result<(), HpRefError> {
        if id >= self.elems.len() {
            return Err(HpRefError::ElemDoesntExist(id));
        }

        if refinement.raises_order() && self.elems[id].poly_order + 1 > MAX_POLYNOMIAL_ORDER {
            return Err(HpRefError::ExceededMaxOrder(id));
        }

        if refinement.splits() && self.elems[id].length() / 2.0 < MIN_ELEM_LENGTH {
            return Err(HpRefError::BelowMinLength(id));
        }

        if !refinement.splits() {
            self.elems[id].raise_poly_order();
            return Ok(());
        }

        let parent = self.elems[id].clone();
        let child_order = if refinement.raises_order() {
            parent.poly_order + 1
        } else {
            parent.poly_order
        };
        let midpoint = (parent.bounds[0] + parent.bounds[1]) / 2.0;

        let children = [
            [parent.bounds[0], midpoint],
            [midpoint, parent.bounds[1]],
        ]
        .iter()
        .map(|child_bounds| {
            let mut child = Elem::new(
                0,
                *child_bounds,
                parent.marker,
                child_order,
                self.n_eq,
                self.n_slots,
            );
            for slot in 0..self.n_slots {
                let coeffs = project_onto(*child_bounds, child_order, self.n_eq, &|eq, x| {
                    parent.value_and_deriv(slot, eq, x)
                });
                child.set_slot_coeffs(slot, coeffs);
            }
            child
        })
        .collect::<Vec<Elem>>();

        self.elems.splice(id..=id, children);

        for (idx, elem) in self.elems.iter_mut().enumerate() {
            elem.id = idx;
        }

        Ok(())
    }

    // Rebuild this Mesh around a replacement element list, keeping the equation count,
    // solution slots and boundary conditions. Ids are reassigned to match the ordering.
    pub(crate) fn with_elems(&self, mut elems: Vec<Elem>) -> Self {
        assert!(
            !elems.is_empty(),
            "Meshes require at least one Elem; cannot rebuild Mesh!"
        );
        for (idx, elem) in elems.iter_mut().enumerate() {
            elem.id = idx;
        }

        Self {
            elems,
            n_eq: self.n_eq,
            n_slots: self.n_slots,
            bc_left: self.bc_left.clone(),
            bc_right: self.bc_right.clone(),
        }
    }

    /// Produce a Json Object that describes this Mesh and its current solution
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "bounds": array![self.bounds()[0], self.bounds()[1]],
            "num_eq": self.n_eq,
            "elems": JsonValue::from(
                self.elems.iter().map(|elem| elem.to_json()).collect::<Vec<_>>()
            ),
        }
    }
}
