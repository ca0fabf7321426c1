use nalgebra::{DMatrix, SymmetricEigen};

/// Gauss-Legendre-Quadrature integral of some function F defined over an interval
/// ```
/// use fem_1d::basis::glq::*;
///
/// // define glq points over `(-1, 1)`
/// let (points, weights) = gauss_quadrature_points(10);
///
/// // compute the integral of x^2
/// let solution = real_gauss_quad(&weights, |m| points[m].powi(2));
///
/// assert!((solution - 2.0 / 3.0).abs() < 1e-12);
/// ```
pub fn real_gauss_quad<F>(weights: &[f64], integrand: F) -> f64
where
    F: Fn(usize) -> f64,
{
    let mut solution = 0.0;
    for (m, w) in weights.iter().enumerate() {
        solution += integrand(m) * w;
    }
    solution
}

/// Get a set of n Gauss-Legendre-Quadrature Integration points and weights
///
/// A rule with n points integrates polynomials up to degree `2n - 1` exactly
///
/// ```
/// use fem_1d::basis::glq::*;
///
/// // generate 10 GLQ points and weights over the range `(-1, 1)`
/// let (points, weights) = gauss_quadrature_points(10);
/// assert_eq!(points.len(), 10);
/// assert_eq!(weights.len(), 10);
/// assert!(points.iter().sum::<f64>().abs() < 1e-12);
/// assert!((weights.iter().sum::<f64>() - 2.0).abs() < 1e-12);
/// ```
// https://en.wikipedia.org/wiki/Gaussian_quadrature#Gauss%E2%80%93Legendre_quadrature
pub fn gauss_quadrature_points(n: usize) -> (Vec<f64>, Vec<f64>) {
    assert!(n > 0, "Quadrature rules must have at least one point!");

    let betas: Vec<f64> = (1..n)
        .map(|i| 0.5 / (1.0 - (2.0 * i as f64).powi(-2)).sqrt())
        .collect();

    let polymat: DMatrix<f64> = DMatrix::from_fn(n, n, |r, c| {
        if r == c + 1 {
            betas[r - 1]
        } else if c == r + 1 {
            betas[c - 1]
        } else {
            0.0
        }
    });

    let eigen_decomp = SymmetricEigen::new(polymat);

    let mut xw: Vec<(f64, f64)> = eigen_decomp
        .eigenvalues
        .iter()
        .cloned()
        .zip(
            eigen_decomp
                .eigenvectors
                .row(0)
                .iter()
                .map(|weight| (*weight).powi(2) * 2.0),
        )
        .collect();

    xw.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap());

    xw.drain(0..).unzip()
}

/// Scale a set of Gauss-Legendre-Quadrature Integration points to fall within a specific range
///
/// Returns the scale factor (the Jacobian of the mapping) along with the scaled points.
/// Quadrature weights must be multiplied by the scale factor to integrate over the new range.
///
/// ```
/// use fem_1d::basis::glq::*;
/// let (points, weights) = gauss_quadrature_points(10);
///
/// // scale the points to the range `(-0.75, 0.25)`
/// let (scale, points_scaled) = scale_gauss_quad_points(&points, -0.75, 0.25);
///
/// assert!((0.5 - scale).abs() < 1e-12);
/// assert!(points_scaled.iter().all(|x| *x > -0.75 && *x < 0.25));
/// ```
pub fn scale_gauss_quad_points(points: &[f64], min: f64, max: f64) -> (f64, Vec<f64>) {
    let scale_factor = (max - min) / 2.0;
    let offset = (max + min) / 2.0;

    (
        scale_factor,
        points
            .iter()
            .map(|x| x * scale_factor + offset)
            .collect::<Vec<f64>>(),
    )
}
