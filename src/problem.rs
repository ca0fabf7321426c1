use crate::basis::glq::{gauss_quadrature_points, scale_gauss_quad_points};
use crate::basis::LobattoBasis;
use crate::domain::Domain;
use crate::linalg::sparse_matrix::SparseMatrix;

/// Which end of the domain a surface form applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Side {
    Left,
    Right,
}

/// Sampled quadrature data handed to volumetric weak forms
///
/// All arrays are indexed by quadrature point. Weights are pre-scaled by the element
/// mapping Jacobian, so forms integrate in physical space. `prev_vals`/`prev_ders` hold
/// the previous-iterate solution for every stored slot, indexed `[slot][eq][point]`;
/// slot 0 is the current Newton iterate, higher slots are driver-managed copies (e.g.
/// the source term of an eigenvalue iteration).
pub struct FormArgs<'a> {
    pub x: &'a [f64],
    pub weights: &'a [f64],
    /// Test function values at the quadrature points
    pub v: &'a [f64],
    /// Test function physical derivatives at the quadrature points
    pub dvdx: &'a [f64],
    pub prev_vals: &'a [Vec<Vec<f64>>],
    pub prev_ders: &'a [Vec<Vec<f64>>],
    /// Material marker of the element under integration
    pub marker: usize,
}

impl FormArgs<'_> {
    /// Quadrature sum of an integrand sampled by point index
    pub fn integrate<F: Fn(usize) -> f64>(&self, integrand: F) -> f64 {
        self.weights
            .iter()
            .enumerate()
            .map(|(m, w)| w * integrand(m))
            .sum()
    }
}

/// A trial function sampled at the quadrature points of a [FormArgs]
pub struct TrialFn<'a> {
    pub u: &'a [f64],
    pub dudx: &'a [f64],
}

/// Point data handed to surface weak forms at a domain boundary
pub struct SurfArgs<'a> {
    pub x: f64,
    /// Test function value at the boundary point
    pub v: f64,
    /// Test function physical derivative at the boundary point
    pub dvdx: f64,
    /// Previous-iterate solution values at the boundary point, indexed `[slot][eq]`
    pub prev_vals: &'a [Vec<f64>],
    pub prev_ders: &'a [Vec<f64>],
}

/// A trial function evaluated at the boundary point of a [SurfArgs]
pub struct TrialPoint {
    pub u: f64,
    pub dudx: f64,
}

pub type MatrixForm = Box<dyn Fn(&FormArgs, &TrialFn) -> f64 + Send + Sync>;
pub type VectorForm = Box<dyn Fn(&FormArgs) -> f64 + Send + Sync>;
pub type MatrixFormSurf = Box<dyn Fn(&SurfArgs, &TrialPoint) -> f64 + Send + Sync>;
pub type VectorFormSurf = Box<dyn Fn(&SurfArgs) -> f64 + Send + Sync>;

struct MatrixFormEntry {
    eq_test: usize,
    eq_trial: usize,
    marker: Option<usize>,
    form: MatrixForm,
}

struct VectorFormEntry {
    eq_test: usize,
    marker: Option<usize>,
    form: VectorForm,
}

struct MatrixFormSurfEntry {
    eq_test: usize,
    eq_trial: usize,
    side: Side,
    form: MatrixFormSurf,
}

struct VectorFormSurfEntry {
    eq_test: usize,
    side: Side,
    form: VectorFormSurf,
}

/// Produces the Jacobian matrix and residual vector for the current mesh coefficients
///
/// An `Assembler` is parameterized once at setup time with a set of weak-form callbacks:
/// volumetric matrix (Jacobian) and vector (residual) forms keyed by equation indices and
/// an optional material marker, plus surface forms keyed by a boundary [Side]. The same
/// `Assembler` serves every solve of a run; it holds no per-mesh state.
#[derive(Default)]
pub struct Assembler {
    matrix_forms: Vec<MatrixFormEntry>,
    vector_forms: Vec<VectorFormEntry>,
    matrix_forms_surf: Vec<MatrixFormSurfEntry>,
    vector_forms_surf: Vec<VectorFormSurfEntry>,
}

impl Assembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a volumetric Jacobian form applied on every element
    pub fn add_matrix_form(
        &mut self,
        eq_test: usize,
        eq_trial: usize,
        form: impl Fn(&FormArgs, &TrialFn) -> f64 + Send + Sync + 'static,
    ) {
        self.matrix_forms.push(MatrixFormEntry {
            eq_test,
            eq_trial,
            marker: None,
            form: Box::new(form),
        });
    }

    /// Register a volumetric Jacobian form applied only on elements with the given marker
    pub fn add_matrix_form_on(
        &mut self,
        eq_test: usize,
        eq_trial: usize,
        marker: usize,
        form: impl Fn(&FormArgs, &TrialFn) -> f64 + Send + Sync + 'static,
    ) {
        self.matrix_forms.push(MatrixFormEntry {
            eq_test,
            eq_trial,
            marker: Some(marker),
            form: Box::new(form),
        });
    }

    /// Register a volumetric residual form applied on every element
    pub fn add_vector_form(
        &mut self,
        eq_test: usize,
        form: impl Fn(&FormArgs) -> f64 + Send + Sync + 'static,
    ) {
        self.vector_forms.push(VectorFormEntry {
            eq_test,
            marker: None,
            form: Box::new(form),
        });
    }

    /// Register a volumetric residual form applied only on elements with the given marker
    pub fn add_vector_form_on(
        &mut self,
        eq_test: usize,
        marker: usize,
        form: impl Fn(&FormArgs) -> f64 + Send + Sync + 'static,
    ) {
        self.vector_forms.push(VectorFormEntry {
            eq_test,
            marker: Some(marker),
            form: Box::new(form),
        });
    }

    /// Register a Jacobian surface form at one end of the domain
    pub fn add_matrix_form_surf(
        &mut self,
        eq_test: usize,
        eq_trial: usize,
        side: Side,
        form: impl Fn(&SurfArgs, &TrialPoint) -> f64 + Send + Sync + 'static,
    ) {
        self.matrix_forms_surf.push(MatrixFormSurfEntry {
            eq_test,
            eq_trial,
            side,
            form: Box::new(form),
        });
    }

    /// Register a residual surface form at one end of the domain
    pub fn add_vector_form_surf(
        &mut self,
        eq_test: usize,
        side: Side,
        form: impl Fn(&SurfArgs) -> f64 + Send + Sync + 'static,
    ) {
        self.vector_forms_surf.push(VectorFormSurfEntry {
            eq_test,
            side,
            form: Box::new(form),
        });
    }

    /// Assemble the Jacobian matrix and residual vector against the current element
    /// coefficients of `domain`
    ///
    /// Rows and columns are skipped for Dirichlet-constrained shape functions; their
    /// fixed values enter the residual through the previous-iterate solution samples.
    pub fn assemble(&self, domain: &Domain) -> (SparseMatrix, Vec<f64>) {
        let num_dofs = domain.num_dofs();
        let mut jacobian = SparseMatrix::new(num_dofs);
        let mut residual = vec![0.0; num_dofs];

        let n_eq = domain.mesh.num_eq();
        let n_slots = domain.mesh.num_slots();

        for (elem_id, elem) in domain.elems().enumerate() {
            let num_local = elem.num_local();
            let n_pts = elem.poly_order + 3;

            let (xi_points, xi_weights) = gauss_quadrature_points(n_pts);
            let (scale, phys_points) =
                scale_gauss_quad_points(&xi_points, elem.bounds[0], elem.bounds[1]);
            let phys_weights: Vec<f64> = xi_weights.iter().map(|w| w * scale).collect();

            let basis = LobattoBasis::with(elem.poly_order, &xi_points);

            // shape function samples in physical space
            let fn_vals: Vec<Vec<f64>> = (0..num_local)
                .map(|n| (0..n_pts).map(|m| basis.value(n, m)).collect())
                .collect();
            let fn_ders: Vec<Vec<f64>> = (0..num_local)
                .map(|n| (0..n_pts).map(|m| basis.deriv(n, m) / scale).collect())
                .collect();

            // previous-iterate solution samples for every stored slot
            let mut prev_vals = vec![vec![vec![0.0; n_pts]; n_eq]; n_slots];
            let mut prev_ders = vec![vec![vec![0.0; n_pts]; n_eq]; n_slots];
            for slot in 0..n_slots {
                for eq in 0..n_eq {
                    for m in 0..n_pts {
                        let mut val = 0.0;
                        let mut der = 0.0;
                        for local in 0..num_local {
                            let c = elem.coeff(slot, eq, local);
                            val += c * fn_vals[local][m];
                            der += c * fn_ders[local][m];
                        }
                        prev_vals[slot][eq][m] = val;
                        prev_ders[slot][eq][m] = der;
                    }
                }
            }

            for entry in self
                .matrix_forms
                .iter()
                .filter(|entry| entry.marker.map_or(true, |marker| marker == elem.marker))
            {
                for a in 0..num_local {
                    let row = match domain.dof(elem_id, entry.eq_test, a) {
                        Some(row) => row,
                        None => continue,
                    };
                    let args = FormArgs {
                        x: &phys_points,
                        weights: &phys_weights,
                        v: &fn_vals[a],
                        dvdx: &fn_ders[a],
                        prev_vals: &prev_vals,
                        prev_ders: &prev_ders,
                        marker: elem.marker,
                    };
                    for b in 0..num_local {
                        let col = match domain.dof(elem_id, entry.eq_trial, b) {
                            Some(col) => col,
                            None => continue,
                        };
                        let trial = TrialFn {
                            u: &fn_vals[b],
                            dudx: &fn_ders[b],
                        };
                        jacobian.insert([row, col], (entry.form)(&args, &trial));
                    }
                }
            }

            for entry in self
                .vector_forms
                .iter()
                .filter(|entry| entry.marker.map_or(true, |marker| marker == elem.marker))
            {
                for a in 0..num_local {
                    let row = match domain.dof(elem_id, entry.eq_test, a) {
                        Some(row) => row,
                        None => continue,
                    };
                    let args = FormArgs {
                        x: &phys_points,
                        weights: &phys_weights,
                        v: &fn_vals[a],
                        dvdx: &fn_ders[a],
                        prev_vals: &prev_vals,
                        prev_ders: &prev_ders,
                        marker: elem.marker,
                    };
                    residual[row] += (entry.form)(&args);
                }
            }
        }

        if !self.matrix_forms_surf.is_empty() || !self.vector_forms_surf.is_empty() {
            self.assemble_surf(domain, &mut jacobian, &mut residual);
        }

        (jacobian, residual)
    }

    // add the boundary-point contributions of all surface forms
    fn assemble_surf(&self, domain: &Domain, jacobian: &mut SparseMatrix, residual: &mut Vec<f64>) {
        let n_eq = domain.mesh.num_eq();
        let n_slots = domain.mesh.num_slots();
        let n_elems = domain.mesh.num_active_elems();

        for side in [Side::Left, Side::Right] {
            let (elem_id, xi) = match side {
                Side::Left => (0, -1.0),
                Side::Right => (n_elems - 1, 1.0),
            };
            let elem = &domain.mesh.elems[elem_id];
            let num_local = elem.num_local();
            let scale = elem.jacobian_scale();
            let x = elem.from_parametric(xi);

            let basis = LobattoBasis::with(elem.poly_order, &[xi]);
            let fn_vals: Vec<f64> = (0..num_local).map(|n| basis.value(n, 0)).collect();
            let fn_ders: Vec<f64> = (0..num_local).map(|n| basis.deriv(n, 0) / scale).collect();

            let mut prev_vals = vec![vec![0.0; n_eq]; n_slots];
            let mut prev_ders = vec![vec![0.0; n_eq]; n_slots];
            for slot in 0..n_slots {
                for eq in 0..n_eq {
                    for local in 0..num_local {
                        let c = elem.coeff(slot, eq, local);
                        prev_vals[slot][eq] += c * fn_vals[local];
                        prev_ders[slot][eq] += c * fn_ders[local];
                    }
                }
            }

            for entry in self.matrix_forms_surf.iter().filter(|e| e.side == side) {
                for a in 0..num_local {
                    let row = match domain.dof(elem_id, entry.eq_test, a) {
                        Some(row) => row,
                        None => continue,
                    };
                    let args = SurfArgs {
                        x,
                        v: fn_vals[a],
                        dvdx: fn_ders[a],
                        prev_vals: &prev_vals,
                        prev_ders: &prev_ders,
                    };
                    for b in 0..num_local {
                        let col = match domain.dof(elem_id, entry.eq_trial, b) {
                            Some(col) => col,
                            None => continue,
                        };
                        let trial = TrialPoint {
                            u: fn_vals[b],
                            dudx: fn_ders[b],
                        };
                        jacobian.insert([row, col], (entry.form)(&args, &trial));
                    }
                }
            }

            for entry in self.vector_forms_surf.iter().filter(|e| e.side == side) {
                for a in 0..num_local {
                    let row = match domain.dof(elem_id, entry.eq_test, a) {
                        Some(row) => row,
                        None => continue,
                    };
                    let args = SurfArgs {
                        x,
                        v: fn_vals[a],
                        dvdx: fn_ders[a],
                        prev_vals: &prev_vals,
                        prev_ders: &prev_ders,
                    };
                    residual[row] += (entry.form)(&args);
                }
            }
        }
    }
}
