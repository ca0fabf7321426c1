use crate::basis::glq::{gauss_quadrature_points, scale_gauss_quad_points};
use crate::domain::fields::{solution_diff_norm, ErrorNorm};
use crate::domain::mesh::elem::Elem;
use crate::domain::mesh::hp_refinement::{HpRef, HpRefError};
use crate::domain::Domain;
use crate::linalg::LinearSolver;
use crate::problem::Assembler;
use crate::solver::{NewtonSolver, SolverError};
use rayon::prelude::*;
use smallvec::SmallVec;
use std::fmt;

/// The local refinement applied to one element to build its trial mesh
#[derive(Clone, Copy, Debug)]
pub struct TrialRefinement {
    /// How the element is refined on the first level
    pub candidate: HpRef,
    /// Number of refinement levels; levels past the first split the trial elements
    /// again, making the trial solution progressively finer
    pub levels: usize,
}

impl Default for TrialRefinement {
    fn default() -> Self {
        Self {
            candidate: HpRef::Both,
            levels: 1,
        }
    }
}

/// The trial element(s) which replaced one coarse element in its trial mesh
///
/// Holds one element if the trial refinement only raised the polynomial order, two if it
/// split the element in space (or more, for multi-level trials). The elements carry the
/// converged trial solution and serve as the reference against which hp-refinement
/// candidates are scored. A fresh set is produced by every estimation sweep and owned by
/// the adaptivity step that consumes it.
#[derive(Clone, Debug)]
pub struct RefPair {
    elems: SmallVec<[Elem; 2]>,
}

impl RefPair {
    pub fn new(elems: SmallVec<[Elem; 2]>) -> Self {
        assert!(
            !elems.is_empty(),
            "Reference pairs require at least one element; cannot construct RefPair!"
        );
        assert!(
            elems.windows(2).all(|w| w[0].bounds[1] <= w[1].bounds[0] + 1e-12),
            "Reference-pair elements must be in left-to-right order; cannot construct RefPair!"
        );

        Self { elems }
    }

    /// The trial elements, in left-to-right order
    pub fn elems(&self) -> &[Elem] {
        &self.elems
    }

    /// Bounds of the region covered by the pair (the coarse element's extent)
    pub fn bounds(&self) -> [f64; 2] {
        [
            self.elems.first().unwrap().bounds[0],
            self.elems.last().unwrap().bounds[1],
        ]
    }

    /// Where an h-refinement of the underlying coarse element should split it: the
    /// boundary between the first two trial elements, or the midpoint if the trial
    /// was not split in space
    pub fn split_point(&self) -> f64 {
        if self.elems.len() > 1 {
            self.elems[0].bounds[1]
        } else {
            let [a, b] = self.bounds();
            (a + b) / 2.0
        }
    }

    /// Highest polynomial order among the trial elements
    pub fn max_poly_order(&self) -> usize {
        self.elems.iter().map(|e| e.poly_order).max().unwrap()
    }

    /// Trial-solution value and physical derivative at a physical coordinate
    pub fn value_and_deriv(&self, slot: usize, eq: usize, x: f64) -> (f64, f64) {
        let idx = self
            .elems
            .partition_point(|elem| elem.bounds[1] < x)
            .min(self.elems.len() - 1);
        self.elems[idx].value_and_deriv(slot, eq, x)
    }

    // interval endpoints of the pair's partition
    fn breakpoints(&self) -> Vec<f64> {
        let mut cuts: Vec<f64> = self.elems.iter().map(|e| e.bounds[0]).collect();
        cuts.push(self.bounds()[1]);
        cuts
    }

    /// Norm of the difference between this patch's solution and another patch's solution
    ///
    /// Both patches must cover the same region. The integral runs over the union of both
    /// partitions so the integrand is smooth on every interval.
    pub fn diff_norm(&self, other: &RefPair, norm: ErrorNorm) -> f64 {
        let mut cuts = self.breakpoints();
        cuts.extend(other.breakpoints());
        cuts.sort_by(|a, b| a.partial_cmp(b).unwrap());
        cuts.dedup_by(|a, b| (*a - *b).abs() < 1e-12);

        let n_eq = self.elems[0].num_eq();
        let quad_order = self.max_poly_order().max(other.max_poly_order()) + 3;
        let (points, weights) = gauss_quadrature_points(quad_order);

        let mut total = 0.0;
        for window in cuts.windows(2) {
            let (scale, phys_points) = scale_gauss_quad_points(&points, window[0], window[1]);

            for (m, w) in weights.iter().enumerate() {
                let x = phys_points[m];
                for eq in 0..n_eq {
                    let (u_a, du_a) = self.value_and_deriv(0, eq, x);
                    let (u_b, du_b) = other.value_and_deriv(0, eq, x);

                    let mut contribution = (u_a - u_b).powi(2);
                    if norm == ErrorNorm::H1 {
                        contribution += (du_a - du_b).powi(2);
                    }
                    total += w * scale * contribution;
                }
            }
        }

        total.sqrt()
    }
}

/// One element's error indicator and reference pair from a trial-refinement solve
#[derive(Clone, Debug)]
pub struct FtrEstimate {
    pub error: f64,
    pub ref_pair: RefPair,
}

#[derive(Debug, Clone)]
pub enum FtrError {
    /// The trial refinement could not be applied (bad id, order/length limits)
    Refinement(HpRefError),
    /// The inner Newton solve on the trial mesh failed; local refinement problems are
    /// not expected to be harder than the global one, so no silent fallback is attempted
    Solver(SolverError),
}

impl From<HpRefError> for FtrError {
    fn from(err: HpRefError) -> Self {
        Self::Refinement(err)
    }
}

impl From<SolverError> for FtrError {
    fn from(err: SolverError) -> Self {
        Self::Solver(err)
    }
}

impl fmt::Display for FtrError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Refinement(err) => write!(f, "Trial refinement failed: {}", err),
            Self::Solver(err) => write!(f, "Trial-mesh solve failed: {}", err),
        }
    }
}

impl std::error::Error for FtrError {}

/// Estimates per-element errors by fast trial refinement (FTR)
///
/// For each element, the coarse mesh (including its converged solution) is cloned, the
/// element alone is locally refined, the inherited coefficients seed an inner Newton
/// solve, and the error indicator is the norm of the difference between the coarse and
/// trial solutions restricted to the element's region.
#[derive(Clone, Copy, Debug)]
pub struct FtrErrorEstimator {
    /// Inner Newton solver; its tolerance is configured independently of the coarse one
    pub newton: NewtonSolver,
    pub refinement: TrialRefinement,
    pub norm: ErrorNorm,
}

impl FtrErrorEstimator {
    /// Estimate the error of one element
    pub fn estimate(
        &self,
        domain: &Domain,
        elem_id: usize,
        assembler: &Assembler,
        backend: &dyn LinearSolver,
    ) -> Result<FtrEstimate, FtrError> {
        if elem_id >= domain.mesh.num_active_elems() {
            return Err(FtrError::Refinement(HpRefError::ElemDoesntExist(elem_id)));
        }

        // replicate the coarse mesh including its solution, then refine the one element
        let mut trial_mesh = domain.mesh.clone();
        trial_mesh.refine_element(elem_id, self.refinement.candidate)?;
        let mut span = self.refinement.candidate.num_children();
        for _ in 1..self.refinement.levels {
            for k in (0..span).rev() {
                trial_mesh.refine_element(elem_id + k, HpRef::H)?;
            }
            span *= 2;
        }

        let mut trial_domain = Domain::from_mesh(trial_mesh);
        log::debug!(
            "Elem [{}]: trial mesh created ({} DOF)",
            elem_id,
            trial_domain.num_dofs()
        );

        self.newton.solve(&mut trial_domain, assembler, backend)?;

        let coarse_elem_bounds = domain.mesh.elems[elem_id].bounds;
        let error = solution_diff_norm(
            &trial_domain.mesh,
            &domain.mesh,
            coarse_elem_bounds,
            self.norm,
        );
        log::debug!("Elem [{}]: absolute error (est) = {:e}", elem_id, error);

        // identify the trial element(s) which replaced the coarse element by walking
        // both meshes' active elements in lock-step
        let mut replacements: SmallVec<[Elem; 2]> = SmallVec::new();
        let mut trial_elems = trial_domain.mesh.active_elems();
        for coarse_elem in domain.mesh.active_elems() {
            if coarse_elem.id == elem_id {
                for trial_elem in trial_elems.by_ref() {
                    replacements.push(trial_elem.clone());
                    if trial_elem.bounds[1] >= coarse_elem.bounds[1] - 1e-12 {
                        break;
                    }
                }
                break;
            }
            trial_elems.next();
        }

        Ok(FtrEstimate {
            error,
            ref_pair: RefPair::new(replacements),
        })
    }

    /// Estimate the error of every active element, in element-id order
    pub fn estimate_all(
        &self,
        domain: &Domain,
        assembler: &Assembler,
        backend: &dyn LinearSolver,
    ) -> Result<(Vec<f64>, Vec<RefPair>), FtrError> {
        let mut errors = Vec::with_capacity(domain.mesh.num_active_elems());
        let mut ref_pairs = Vec::with_capacity(domain.mesh.num_active_elems());

        for elem_id in 0..domain.mesh.num_active_elems() {
            let estimate = self.estimate(domain, elem_id, assembler, backend)?;
            errors.push(estimate.error);
            ref_pairs.push(estimate.ref_pair);
        }

        Ok((errors, ref_pairs))
    }

    /// Same as [estimate_all](Self::estimate_all), except the per-element estimations run
    /// in parallel on the Rayon Global ThreadPool
    ///
    /// Estimations for distinct elements share no mutable state: each task reads the
    /// frozen coarse solution and owns its cloned trial mesh and linear-system handles.
    pub fn estimate_all_parallel(
        &self,
        domain: &Domain,
        assembler: &Assembler,
        backend: &dyn LinearSolver,
    ) -> Result<(Vec<f64>, Vec<RefPair>), FtrError> {
        let estimates = (0..domain.mesh.num_active_elems())
            .into_par_iter()
            .map(|elem_id| self.estimate(domain, elem_id, assembler, backend))
            .collect::<Result<Vec<FtrEstimate>, FtrError>>()?;

        Ok(estimates
            .into_iter()
            .map(|estimate| (estimate.error, estimate.ref_pair))
            .unzip())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mesh::Mesh;
    use crate::linalg::DenseLu;
    use crate::problem::{FormArgs, TrialFn};

    // weak forms for y' = -y², y(0) = 1 (exact solution 1 / (x + 1))
    fn riccati_assembler() -> Assembler {
        let mut assembler = Assembler::new();
        assembler.add_matrix_form(0, 0, |args: &FormArgs, trial: &TrialFn| {
            args.integrate(|m| {
                (trial.dudx[m] + 2.0 * args.prev_vals[0][0][m] * trial.u[m]) * args.v[m]
            })
        });
        assembler.add_vector_form(0, |args: &FormArgs| {
            args.integrate(|m| {
                (args.prev_ders[0][0][m] + args.prev_vals[0][0][m].powi(2)) * args.v[m]
            })
        });
        assembler
    }

    fn solved_coarse_domain() -> Domain {
        let mut mesh = Mesh::uniform(0.0, 4.0, 4, 1, 1);
        mesh.set_solution_constant(0, &[1.0]);
        mesh.set_dirichlet_left(0, 1.0);
        let mut domain = Domain::from_mesh(mesh);

        NewtonSolver::default()
            .solve(&mut domain, &riccati_assembler(), &DenseLu)
            .unwrap();
        domain
    }

    fn estimator(refinement: TrialRefinement) -> FtrErrorEstimator {
        FtrErrorEstimator {
            newton: NewtonSolver::default(),
            refinement,
            norm: ErrorNorm::L2,
        }
    }

    #[test]
    fn ref_pair_shape_follows_the_candidate() {
        let domain = solved_coarse_domain();
        let assembler = riccati_assembler();

        let split = estimator(TrialRefinement::default())
            .estimate(&domain, 1, &assembler, &DenseLu)
            .unwrap();
        assert_eq!(split.ref_pair.elems().len(), 2);
        assert_eq!(split.ref_pair.elems()[0].poly_order, 2);
        let [a, b] = split.ref_pair.bounds();
        assert!((a - 1.0).abs() < 1e-12 && (b - 2.0).abs() < 1e-12);

        let bumped = estimator(TrialRefinement {
            candidate: HpRef::P,
            levels: 1,
        })
        .estimate(&domain, 1, &assembler, &DenseLu)
        .unwrap();
        assert_eq!(bumped.ref_pair.elems().len(), 1);
        assert_eq!(bumped.ref_pair.elems()[0].poly_order, 2);
    }

    #[test]
    fn error_indicator_stabilizes_with_finer_trials() {
        let domain = solved_coarse_domain();
        let assembler = riccati_assembler();

        let errors: Vec<f64> = (1..=3)
            .map(|levels| {
                estimator(TrialRefinement {
                    candidate: HpRef::H,
                    levels,
                })
                .estimate(&domain, 0, &assembler, &DenseLu)
                .unwrap()
                .error
            })
            .collect();

        // finer trials settle toward the element's true error: successive indicators
        // must neither collapse nor blow up
        assert!(errors.iter().all(|e| *e > 0.0));
        for window in errors.windows(2) {
            assert!(window[1] > 0.5 * window[0]);
            assert!(window[1] < 1.5 * window[0]);
        }
    }

    #[test]
    fn estimates_match_between_sequential_and_parallel_sweeps() {
        let domain = solved_coarse_domain();
        let assembler = riccati_assembler();
        let est = estimator(TrialRefinement::default());

        let (seq_errors, seq_pairs) = est.estimate_all(&domain, &assembler, &DenseLu).unwrap();
        let (par_errors, par_pairs) = est
            .estimate_all_parallel(&domain, &assembler, &DenseLu)
            .unwrap();

        assert_eq!(seq_errors.len(), 4);
        assert_eq!(seq_pairs.len(), 4);
        for (s, p) in seq_errors.iter().zip(par_errors.iter()) {
            assert!((s - p).abs() < 1e-12);
        }
        for (s, p) in seq_pairs.iter().zip(par_pairs.iter()) {
            assert_eq!(s.elems().len(), p.elems().len());
        }
    }

    #[test]
    fn out_of_range_elem_id_is_an_error() {
        let domain = solved_coarse_domain();
        let assembler = riccati_assembler();

        assert!(matches!(
            estimator(TrialRefinement::default()).estimate(&domain, 10, &assembler, &DenseLu),
            Err(FtrError::Refinement(HpRefError::ElemDoesntExist(10)))
        ));
    }
}
