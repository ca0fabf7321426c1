use crate::basis::glq::{gauss_quadrature_points, scale_gauss_quad_points};
use crate::basis::LobattoBasis;
use crate::domain::mesh::Mesh;
use nalgebra::{DMatrix, DVector};

/// Norm used to measure the distance between two solutions
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorNorm {
    /// ∫ (u - v)²
    L2,
    /// ∫ (u - v)² + (u' - v')²
    H1,
}

/// Exact-solution oracle used for diagnostic error reporting only
///
/// Returns per-equation solution values and derivatives at a physical coordinate
pub trait ExactSolution {
    fn eval(&self, x: f64) -> (Vec<f64>, Vec<f64>);
}

impl<F> ExactSolution for F
where
    F: Fn(f64) -> (Vec<f64>, Vec<f64>),
{
    fn eval(&self, x: f64) -> (Vec<f64>, Vec<f64>) {
        self(x)
    }
}

/// Project a source solution onto the polynomial space of a target element
///
/// The target's vertex coefficients are constrained to the source values at the element
/// endpoints (preserving inter-element continuity); the bubble coefficients are found by
/// an L2 projection of the remainder. The returned coefficient vector is blocked by
/// equation with `poly_order + 1` entries per block.
///
/// `source` maps `(eq, x)` to a solution value/derivative pair.
pub fn project_onto<F>(bounds: [f64; 2], poly_order: usize, n_eq: usize, source: &F) -> Vec<f64>
where
    F: Fn(usize, f64) -> (f64, f64),
{
    let num_local = poly_order + 1;
    let mut coeffs = vec![0.0; n_eq * num_local];

    let (points, weights) = gauss_quadrature_points(poly_order + 2);
    let (_, phys_points) = scale_gauss_quad_points(&points, bounds[0], bounds[1]);
    let basis = LobattoBasis::with(poly_order, &points);

    for eq in 0..n_eq {
        let c_left = source(eq, bounds[0]).0;
        let c_right = source(eq, bounds[1]).0;
        coeffs[eq * num_local] = c_left;
        coeffs[eq * num_local + 1] = c_right;

        let n_bubbles = poly_order.saturating_sub(1);
        if n_bubbles == 0 {
            continue;
        }

        let gram = DMatrix::from_fn(n_bubbles, n_bubbles, |a, b| {
            weights
                .iter()
                .enumerate()
                .map(|(m, w)| w * basis.value(a + 2, m) * basis.value(b + 2, m))
                .sum()
        });

        let rhs = DVector::from_fn(n_bubbles, |a, _| {
            weights
                .iter()
                .enumerate()
                .map(|(m, w)| {
                    let remainder = source(eq, phys_points[m]).0
                        - c_left * basis.value(0, m)
                        - c_right * basis.value(1, m);
                    w * basis.value(a + 2, m) * remainder
                })
                .sum()
        });

        let bubble_coeffs = gram
            .lu()
            .solve(&rhs)
            .expect("Projection Gram matrix was singular; cannot project solution!");

        for (b, c) in bubble_coeffs.iter().enumerate() {
            coeffs[eq * num_local + 2 + b] = *c;
        }
    }

    coeffs
}

/// Norm of the difference between the solutions on two meshes, restricted to a region
///
/// The integral runs over the `fine` mesh's elements whose midpoints fall inside the
/// region, so the finer partition drives the quadrature. Both solutions are read from
/// slot 0 and all equations contribute.
pub fn solution_diff_norm(
    fine: &Mesh,
    coarse: &Mesh,
    region: [f64; 2],
    norm: ErrorNorm,
) -> f64 {
    let mut total = 0.0;

    for elem in fine.active_elems() {
        let midpoint = (elem.bounds[0] + elem.bounds[1]) / 2.0;
        if midpoint < region[0] || midpoint > region[1] {
            continue;
        }

        let (points, weights) = gauss_quadrature_points(elem.poly_order + 3);
        let (scale, phys_points) = scale_gauss_quad_points(&points, elem.bounds[0], elem.bounds[1]);

        for (m, w) in weights.iter().enumerate() {
            let x = phys_points[m];
            for eq in 0..fine.num_eq() {
                let (u_f, du_f) = elem.value_and_deriv(0, eq, x);
                let (u_c, du_c) = coarse.solution_value_and_deriv(0, eq, x);

                let mut contribution = (u_f - u_c).powi(2);
                if norm == ErrorNorm::H1 {
                    contribution += (du_f - du_c).powi(2);
                }
                total += w * scale * contribution;
            }
        }
    }

    total.sqrt()
}

/// Norm of the difference between the mesh solution and an exact solution over the
/// whole domain. Used for diagnostic reporting only; never for stopping decisions.
pub fn exact_error(mesh: &Mesh, exact: &dyn ExactSolution, norm: ErrorNorm) -> f64 {
    let mut total = 0.0;

    for elem in mesh.active_elems() {
        let (points, weights) = gauss_quadrature_points(elem.poly_order + 6);
        let (scale, phys_points) = scale_gauss_quad_points(&points, elem.bounds[0], elem.bounds[1]);

        for (m, w) in weights.iter().enumerate() {
            let x = phys_points[m];
            let (exact_vals, exact_ders) = exact.eval(x);
            for eq in 0..mesh.num_eq() {
                let (u, du) = elem.value_and_deriv(0, eq, x);

                let mut contribution = (u - exact_vals[eq]).powi(2);
                if norm == ErrorNorm::H1 {
                    contribution += (du - exact_ders[eq]).powi(2);
                }
                total += w * scale * contribution;
            }
        }
    }

    total.sqrt()
}

/// Norm of an exact solution over an interval, computed on a fine subdivision with
/// high-order quadrature. Used to normalize [exact_error] into a relative error.
pub fn exact_solution_norm(
    exact: &dyn ExactSolution,
    bounds: [f64; 2],
    n_eq: usize,
    norm: ErrorNorm,
    subdivision: usize,
    quad_points: usize,
) -> f64 {
    let (points, weights) = gauss_quadrature_points(quad_points);
    let h = (bounds[1] - bounds[0]) / subdivision as f64;
    let mut total = 0.0;

    for i in 0..subdivision {
        let sub = [bounds[0] + i as f64 * h, bounds[0] + (i + 1) as f64 * h];
        let (scale, phys_points) = scale_gauss_quad_points(&points, sub[0], sub[1]);

        for (m, w) in weights.iter().enumerate() {
            let (exact_vals, exact_ders) = exact.eval(phys_points[m]);
            for eq in 0..n_eq {
                let mut contribution = exact_vals[eq].powi(2);
                if norm == ErrorNorm::H1 {
                    contribution += exact_ders[eq].powi(2);
                }
                total += w * scale * contribution;
            }
        }
    }

    total.sqrt()
}

/// Domain integral of the solution weighted by a per-marker, per-equation coefficient
///
/// Computes `∫ Σ_eq weight(marker, eq) · u_eq(x) dx` over the whole mesh. This is the
/// integral functional shape used by eigenvalue drivers (e.g. a fission-yield integral
/// with per-material cross sections).
pub fn weighted_solution_integral<W>(mesh: &Mesh, slot: usize, weight: W) -> f64
where
    W: Fn(usize, usize) -> f64,
{
    let mut total = 0.0;

    for elem in mesh.active_elems() {
        let (points, weights) = gauss_quadrature_points(elem.poly_order + 1);
        let (scale, phys_points) = scale_gauss_quad_points(&points, elem.bounds[0], elem.bounds[1]);

        for (m, w) in weights.iter().enumerate() {
            let mut value = 0.0;
            for eq in 0..mesh.num_eq() {
                value += weight(elem.marker, eq) * elem.value_and_deriv(slot, eq, phys_points[m]).0;
            }
            total += w * scale * value;
        }
    }

    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn projection_reproduces_polynomials_in_the_space() {
        // a cubic is reproduced exactly by a cubic target space
        let source = |_eq: usize, x: f64| (x.powi(3) - 2.0 * x, 3.0 * x * x - 2.0);
        let coeffs = project_onto([0.0, 2.0], 3, 1, &source);

        let basis_check = |x: f64| {
            let elem = {
                let mut e = crate::domain::mesh::elem::Elem::new(0, [0.0, 2.0], 0, 3, 1, 1);
                e.set_slot_coeffs(0, coeffs.clone());
                e
            };
            elem.value_and_deriv(0, 0, x)
        };

        for x in [0.0, 0.33, 1.0, 1.75, 2.0] {
            let (u, _) = basis_check(x);
            assert!((u - (x.powi(3) - 2.0 * x)).abs() < 1e-12);
        }
    }

    #[test]
    fn projection_matches_endpoints() {
        let source = |_eq: usize, x: f64| ((x * 1.7).sin(), 1.7 * (x * 1.7).cos());
        let coeffs = project_onto([0.5, 1.5], 4, 1, &source);

        assert!((coeffs[0] - (0.5f64 * 1.7).sin()).abs() < 1e-14);
        assert!((coeffs[1] - (1.5f64 * 1.7).sin()).abs() < 1e-14);
    }

    #[test]
    fn exact_error_vanishes_for_represented_solution() {
        let mut mesh = Mesh::uniform(0.0, 1.0, 4, 2, 1);
        for elem in mesh.elems.iter_mut() {
            let coeffs = project_onto(elem.bounds, elem.poly_order, 1, &|_, x| (x * x, 2.0 * x));
            elem.set_slot_coeffs(0, coeffs);
        }

        let exact = |x: f64| (vec![x * x], vec![2.0 * x]);
        assert!(exact_error(&mesh, &exact, ErrorNorm::L2) < 1e-12);
        assert!(exact_error(&mesh, &exact, ErrorNorm::H1) < 1e-11);
    }

    #[test]
    fn exact_norm_of_linear_function() {
        // ∫ x² over (0, 1) = 1/3; ∫ x² + 1 over (0, 1) = 4/3
        let exact = |x: f64| (vec![x], vec![1.0]);

        let l2 = exact_solution_norm(&exact, [0.0, 1.0], 1, ErrorNorm::L2, 100, 8);
        let h1 = exact_solution_norm(&exact, [0.0, 1.0], 1, ErrorNorm::H1, 100, 8);

        assert!((l2 - (1.0f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((h1 - (4.0f64 / 3.0).sqrt()).abs() < 1e-12);
    }

    #[test]
    fn weighted_integral_of_constant_solution() {
        let mut mesh = Mesh::from_regions(
            &[0.0, 1.0, 3.0],
            &[2, 2],
            &[0, 1],
            &[1, 1],
            1,
            1,
        );
        mesh.set_solution_constant(0, &[2.0]);

        // weight 3 on marker 0 (length 1), weight 0.5 on marker 1 (length 2)
        let integral = weighted_solution_integral(&mesh, 0, |marker, _| match marker {
            0 => 3.0,
            _ => 0.5,
        });

        assert!((integral - (3.0 * 2.0 * 1.0 + 0.5 * 2.0 * 2.0)).abs() < 1e-12);
    }
}
