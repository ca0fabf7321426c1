/// Gauss-Legendre-Quadrature Points and Weights
pub mod glq;

/// Hierarchic Lobatto Shape Functions evaluated at a fixed set of parametric points
///
/// The first two shape functions are the linear vertex functions; the remaining ones are
/// "bubble" functions (integrated Legendre polynomials) which vanish at both endpoints:
///
/// * φ₀(ξ) = (1 - ξ) / 2
/// * φ₁(ξ) = (1 + ξ) / 2
/// * φₙ(ξ) = (Pₙ(ξ) - Pₙ₋₂(ξ)) / √(2(2n - 1))  for n ≥ 2
///
/// Values and first derivatives are computed once at construction and looked up during
/// integration. Derivatives are with respect to the parametric coordinate ξ ∈ [-1, 1];
/// they must be scaled by the inverse element-mapping Jacobian to get physical derivatives.
#[derive(Clone, Debug)]
pub struct LobattoBasis {
    values: Vec<Vec<f64>>,
    derivs: Vec<Vec<f64>>,
}

impl LobattoBasis {
    /// Evaluate all shape functions up to `poly_order` at the given parametric points
    pub fn with(poly_order: usize, points: &[f64]) -> Self {
        let legendre = legendre_table(poly_order, points);

        let mut values = Vec::with_capacity(poly_order + 1);
        let mut derivs = Vec::with_capacity(poly_order + 1);

        for n in 0..=poly_order {
            match n {
                0 => {
                    values.push(points.iter().map(|xi| (1.0 - xi) / 2.0).collect());
                    derivs.push(vec![-0.5; points.len()]);
                }
                1 => {
                    values.push(points.iter().map(|xi| (1.0 + xi) / 2.0).collect());
                    derivs.push(vec![0.5; points.len()]);
                }
                _ => {
                    let scale = (2.0 * (2.0 * n as f64 - 1.0)).sqrt();
                    values.push(
                        legendre[n]
                            .iter()
                            .zip(legendre[n - 2].iter())
                            .map(|(p_n, p_nm2)| (p_n - p_nm2) / scale)
                            .collect(),
                    );
                    let der_scale = ((2.0 * n as f64 - 1.0) / 2.0).sqrt();
                    derivs.push(legendre[n - 1].iter().map(|p| der_scale * p).collect());
                }
            }
        }

        Self { values, derivs }
    }

    /// Number of shape functions in the set (`poly_order + 1`)
    pub fn num_shape_fns(&self) -> usize {
        self.values.len()
    }

    /// Value of the n'th shape function at the p'th sample point
    pub fn value(&self, n: usize, p: usize) -> f64 {
        self.values[n][p]
    }

    /// Parametric derivative of the n'th shape function at the p'th sample point
    pub fn deriv(&self, n: usize, p: usize) -> f64 {
        self.derivs[n][p]
    }
}

/// Value and parametric derivative of the n'th Lobatto shape function at a single point
pub fn lobatto_value_and_deriv(n: usize, xi: f64) -> (f64, f64) {
    let basis = LobattoBasis::with(n, &[xi]);
    (basis.value(n, 0), basis.deriv(n, 0))
}

// Legendre polynomials P₀..P_n_max at each point via the three-term recurrence
fn legendre_table(n_max: usize, points: &[f64]) -> Vec<Vec<f64>> {
    let mut table: Vec<Vec<f64>> = Vec::with_capacity(n_max + 1);

    for n in 0..=n_max {
        match n {
            0 => table.push(vec![1.0; points.len()]),
            1 => table.push(points.to_vec()),
            _ => {
                let n_ = n as f64;
                let (prev, prev2) = (&table[n - 1], &table[n - 2]);
                let row: Vec<f64> = points
                    .iter()
                    .enumerate()
                    .map(|(p, xi)| {
                        ((2.0 * n_ - 1.0) * xi * prev[p] - (n_ - 1.0) * prev2[p]) / n_
                    })
                    .collect();
                table.push(row);
            }
        }
    }

    table
}
