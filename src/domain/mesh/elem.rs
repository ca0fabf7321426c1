use crate::basis::LobattoBasis;

#[cfg(feature = "json_export")]
use json::{array, object, JsonValue};

/// `Elem`s are the basic geometric unit in a [`Mesh`](super::Mesh)
///
/// An `Elem` covers the interval `[bounds[0], bounds[1]]` of the problem domain and owns:
/// * a polynomial expansion order (its p-refinement state)
/// * a material `marker` used to select region-specific weak forms
/// * one coefficient vector per stored solution slot, expressed in the hierarchic
///   Lobatto basis: locals `0` and `1` are the vertex functions associated with the
///   left and right endpoints, locals `2..=poly_order` are the bubble functions
///
/// For a mesh with `n_eq` equations each slot holds `n_eq * (poly_order + 1)` coefficients,
/// blocked by equation.
#[derive(Debug, Clone)]
pub struct Elem {
    pub id: usize,
    pub bounds: [f64; 2],
    pub marker: usize,
    pub poly_order: usize,
    n_eq: usize,
    coeffs: Vec<Vec<f64>>,
}

impl Elem {
    /// Construct a new Elem with all solution coefficients set to zero
    pub fn new(
        id: usize,
        bounds: [f64; 2],
        marker: usize,
        poly_order: usize,
        n_eq: usize,
        n_slots: usize,
    ) -> Self {
        assert!(
            bounds[1] > bounds[0],
            "Elem bounds must be strictly increasing; cannot construct Elem {}!",
            id
        );
        assert!(
            poly_order >= 1,
            "Elems require at least a linear expansion; cannot construct Elem {}!",
            id
        );
        assert!(
            n_eq >= 1 && n_slots >= 1,
            "Elems require at least one equation and one solution slot; cannot construct Elem {}!",
            id
        );

        Self {
            id,
            bounds,
            marker,
            poly_order,
            n_eq,
            coeffs: vec![vec![0.0; n_eq * (poly_order + 1)]; n_slots],
        }
    }

    /// Number of shape functions per equation (`poly_order + 1`)
    pub fn num_local(&self) -> usize {
        self.poly_order + 1
    }

    /// Number of equations this Elem stores coefficients for
    pub fn num_eq(&self) -> usize {
        self.n_eq
    }

    /// Number of stored solution slots
    pub fn num_slots(&self) -> usize {
        self.coeffs.len()
    }

    /// Spatial extent of this Elem
    pub fn length(&self) -> f64 {
        self.bounds[1] - self.bounds[0]
    }

    /// Jacobian of the mapping from parametric space `[-1, 1]` to this Elem's extent
    pub fn jacobian_scale(&self) -> f64 {
        self.length() / 2.0
    }

    /// Does `x` fall within this Elem's extent
    pub fn contains(&self, x: f64) -> bool {
        x >= self.bounds[0] && x <= self.bounds[1]
    }

    /// Map a physical coordinate into parametric space
    pub fn to_parametric(&self, x: f64) -> f64 {
        2.0 * (x - self.bounds[0]) / self.length() - 1.0
    }

    /// Map a parametric coordinate into physical space
    pub fn from_parametric(&self, xi: f64) -> f64 {
        self.bounds[0] + (xi + 1.0) * self.jacobian_scale()
    }

    /// Retrieve a single solution coefficient
    pub fn coeff(&self, slot: usize, eq: usize, local: usize) -> f64 {
        self.coeffs[slot][eq * self.num_local() + local]
    }

    /// Overwrite a single solution coefficient
    pub fn set_coeff(&mut self, slot: usize, eq: usize, local: usize, value: f64) {
        let num_local = self.num_local();
        self.coeffs[slot][eq * num_local + local] = value;
    }

    /// Overwrite all coefficients of one solution slot
    ///
    /// The incoming vector must be blocked by equation with `poly_order + 1` entries per block
    pub fn set_slot_coeffs(&mut self, slot: usize, coeffs: Vec<f64>) {
        assert!(
            coeffs.len() == self.n_eq * self.num_local(),
            "Coefficient vector has the wrong length for Elem {}; cannot overwrite solution slot!",
            self.id
        );
        self.coeffs[slot] = coeffs;
    }

    /// Copy the coefficients of one solution slot into another
    pub fn copy_slot(&mut self, from: usize, to: usize) {
        let src = self.coeffs[from].clone();
        self.coeffs[to] = src;
    }

    /// Scale all coefficients of one solution slot by a constant
    pub fn scale_slot(&mut self, slot: usize, factor: f64) {
        for c in self.coeffs[slot].iter_mut() {
            *c *= factor;
        }
    }

    /// Set one solution slot to a spatially constant value per equation
    ///
    /// Vertex coefficients take the given values; bubble coefficients are zeroed
    pub fn set_constant(&mut self, slot: usize, values: &[f64]) {
        assert!(
            values.len() == self.n_eq,
            "Expected one value per equation; cannot set Elem {} to a constant!",
            self.id
        );
        let num_local = self.num_local();
        for (eq, value) in values.iter().enumerate() {
            self.coeffs[slot][eq * num_local] = *value;
            self.coeffs[slot][eq * num_local + 1] = *value;
            for local in 2..num_local {
                self.coeffs[slot][eq * num_local + local] = 0.0;
            }
        }
    }

    /// Raise this Elem's polynomial order by one, extending each equation block with a
    /// zero coefficient for the new bubble function
    ///
    /// The represented solution is unchanged since the basis is hierarchic
    pub(crate) fn raise_poly_order(&mut self) {
        let old_local = self.num_local();
        for slot_coeffs in self.coeffs.iter_mut() {
            let mut extended = Vec::with_capacity(self.n_eq * (old_local + 1));
            for eq in 0..self.n_eq {
                extended.extend_from_slice(&slot_coeffs[eq * old_local..(eq + 1) * old_local]);
                extended.push(0.0);
            }
            *slot_coeffs = extended;
        }
        self.poly_order += 1;
    }

    /// Solution value and physical derivative at a physical coordinate
    pub fn value_and_deriv(&self, slot: usize, eq: usize, x: f64) -> (f64, f64) {
        let xi = self.to_parametric(x);
        let basis = LobattoBasis::with(self.poly_order, &[xi]);

        let mut value = 0.0;
        let mut deriv = 0.0;
        for local in 0..self.num_local() {
            let c = self.coeff(slot, eq, local);
            value += c * basis.value(local, 0);
            deriv += c * basis.deriv(local, 0);
        }

        (value, deriv / self.jacobian_scale())
    }

    /// Produce a Json Object that describes this Elem
    #[cfg(feature = "json_export")]
    pub fn to_json(&self) -> JsonValue {
        object! {
            "id": self.id,
            "bounds": array![self.bounds[0], self.bounds[1]],
            "marker": self.marker,
            "poly_order": self.poly_order,
            "coeffs": JsonValue::from(self.coeffs[0].clone()),
        }
    }
}
