/// Fast trial refinement (FTR) error estimation
pub mod ftr;

use crate::domain::fields::{project_onto, ErrorNorm};
use crate::domain::mesh::elem::Elem;
use crate::domain::mesh::{MAX_POLYNOMIAL_ORDER, MIN_ELEM_LENGTH};
use crate::domain::Domain;
use ftr::RefPair;
use smallvec::smallvec;
use std::fmt;

/// Which kinds of refinement the controller may apply
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AdaptMode {
    /// Only split elements in space, inheriting the polynomial order
    H,
    /// Only raise polynomial orders
    P,
    /// Decide per element between a split and an order bump
    Hp,
}

// the action selected for one marked element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum HpAction {
    Split,
    Bump,
}

#[derive(Debug, Clone)]
pub enum AdaptError {
    /// No element carries a positive error. The global stopping test should have
    /// terminated the loop before refinement was reached, so this is a logic error.
    DegenerateErrors,
    /// The error/pair arrays do not match the active element count
    MalformedErrors { expected: usize, actual: usize },
    /// An error indicator was negative or not finite
    NonFiniteError(usize),
}

impl fmt::Display for AdaptError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::DegenerateErrors => write!(
                f,
                "No element has a positive error indicator; Cannot select refinements!"
            ),
            Self::MalformedErrors { expected, actual } => write!(
                f,
                "Expected {} error indicators (one per active element), got {}; Cannot select refinements!",
                expected, actual
            ),
            Self::NonFiniteError(elem_id) => write!(
                f,
                "Error indicator of Elem {} is negative or not finite; Cannot select refinements!",
                elem_id
            ),
        }
    }
}

impl std::error::Error for AdaptError {}

/// Turns per-element error indicators into refinement actions and produces the next mesh
///
/// Elements whose indicator exceeds `threshold * max_error` are marked; if none qualifies,
/// the single worst element is marked anyway so refinement cannot stagnate. For each
/// marked element the controller picks an hp-action according to [AdaptMode], using the
/// FTR reference solution as a proxy for the true refined solution. Unmarked elements are
/// carried over unchanged, coefficients included, so the transferred solution remains a
/// good initial guess for the next Newton solve.
#[derive(Clone, Copy, Debug)]
pub struct AdaptivityController {
    pub mode: AdaptMode,
    pub norm: ErrorNorm,
    /// Marking threshold as a fraction of the maximum element error
    pub threshold: f64,
}

impl Default for AdaptivityController {
    fn default() -> Self {
        Self {
            mode: AdaptMode::Hp,
            norm: ErrorNorm::L2,
            threshold: 0.7,
        }
    }
}

impl AdaptivityController {
    /// Consume one sweep's error indicators and reference pairs and build the refined
    /// mesh, with a fresh DOF numbering. The input domain is left untouched; the caller
    /// replaces it with the returned one.
    pub fn refine(
        &self,
        domain: &Domain,
        element_errors: &[f64],
        ref_pairs: &[RefPair],
    ) -> Result<Domain, AdaptError> {
        let n_elems = domain.mesh.num_active_elems();
        if element_errors.len() != n_elems || ref_pairs.len() != n_elems {
            return Err(AdaptError::MalformedErrors {
                expected: n_elems,
                actual: element_errors.len().min(ref_pairs.len()),
            });
        }
        if let Some(bad) = element_errors.iter().position(|e| !e.is_finite() || *e < 0.0) {
            return Err(AdaptError::NonFiniteError(bad));
        }

        let max_error = element_errors.iter().cloned().fold(0.0, f64::max);
        if max_error == 0.0 {
            return Err(AdaptError::DegenerateErrors);
        }

        let mut marked: Vec<bool> = element_errors
            .iter()
            .map(|error| *error > self.threshold * max_error)
            .collect();

        // refinement must not stagnate: when the threshold excludes everything, the
        // worst element is refined anyway
        if !marked.iter().any(|m| *m) {
            let argmax = element_errors
                .iter()
                .enumerate()
                .max_by(|(_, a), (_, b)| a.partial_cmp(b).unwrap())
                .map(|(idx, _)| idx)
                .unwrap();
            marked[argmax] = true;
        }

        let n_slots = domain.mesh.num_slots();
        let mut new_elems: Vec<Elem> = Vec::with_capacity(n_elems + 4);

        for (elem_id, elem) in domain.elems().enumerate() {
            if !marked[elem_id] {
                new_elems.push(elem.clone());
                continue;
            }

            let pair = &ref_pairs[elem_id];
            match self.choose_action(elem, element_errors[elem_id], pair) {
                HpAction::Bump => {
                    log::debug!("Elem [{}]: raising order to {}", elem_id, elem.poly_order + 1);
                    new_elems.push(bump_candidate(elem, pair, n_slots));
                }
                HpAction::Split => {
                    log::debug!(
                        "Elem [{}]: splitting at {:.6}",
                        elem_id,
                        pair.split_point()
                    );
                    new_elems.extend(split_candidate(elem, pair, n_slots));
                }
            }
        }

        Ok(Domain::from_mesh(domain.mesh.with_elems(new_elems)))
    }

    // pick between the order-bump and spatial-split candidates for one marked element
    fn choose_action(&self, elem: &Elem, error: f64, pair: &RefPair) -> HpAction {
        match self.mode {
            AdaptMode::H => HpAction::Split,
            AdaptMode::P => HpAction::Bump,
            AdaptMode::Hp => {
                // respect the hard refinement limits before scoring
                if elem.poly_order + 1 > MAX_POLYNOMIAL_ORDER {
                    return HpAction::Split;
                }
                if elem.length() / 2.0 < MIN_ELEM_LENGTH {
                    return HpAction::Bump;
                }

                let n_eq = elem.num_eq() as f64;

                let bump = RefPair::new(smallvec![bump_candidate(elem, pair, 1)]);
                let bump_error = pair.diff_norm(&bump, self.norm);
                let bump_gain = (error - bump_error) / n_eq;

                let split_elems = split_candidate(elem, pair, 1);
                let split = RefPair::new(smallvec![
                    split_elems[0].clone(),
                    split_elems[1].clone()
                ]);
                let split_error = pair.diff_norm(&split, self.norm);
                // a split adds one vertex and p - 1 bubbles per equation
                let split_gain = (error - split_error) / (n_eq * elem.poly_order as f64);

                // ties favor the cheaper order bump
                if split_gain > bump_gain {
                    HpAction::Split
                } else {
                    HpAction::Bump
                }
            }
        }
    }
}

// the order-bump candidate: same extent, order + 1, solution projected from the
// reference pair (the spatial information in the pair is discarded)
fn bump_candidate(elem: &Elem, pair: &RefPair, n_slots: usize) -> Elem {
    let mut candidate = Elem::new(
        elem.id,
        elem.bounds,
        elem.marker,
        elem.poly_order + 1,
        elem.num_eq(),
        n_slots,
    );
    for slot in 0..n_slots.min(pair.elems()[0].num_slots()) {
        let coeffs = project_onto(elem.bounds, elem.poly_order + 1, elem.num_eq(), &|eq, x| {
            pair.value_and_deriv(slot, eq, x)
        });
        candidate.set_slot_coeffs(slot, coeffs);
    }
    candidate
}

// the spatial-split candidate: two children splitting at the reference pair's boundary,
// inheriting the element's order, solutions projected from the reference pair
fn split_candidate(elem: &Elem, pair: &RefPair, n_slots: usize) -> Vec<Elem> {
    let split_point = pair.split_point();

    [
        [elem.bounds[0], split_point],
        [split_point, elem.bounds[1]],
    ]
    .iter()
    .map(|child_bounds| {
        let mut child = Elem::new(
            elem.id,
            *child_bounds,
            elem.marker,
            elem.poly_order,
            elem.num_eq(),
            n_slots,
        );
        for slot in 0..n_slots.min(pair.elems()[0].num_slots()) {
            let coeffs = project_onto(*child_bounds, elem.poly_order, elem.num_eq(), &|eq, x| {
                pair.value_and_deriv(slot, eq, x)
            });
            child.set_slot_coeffs(slot, coeffs);
        }
        child
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::mesh::Mesh;
    use smallvec::SmallVec;

    // a reference pair mimicking a split + bump trial of one element, carrying an
    // arbitrary smooth solution
    fn mock_ref_pair(elem: &Elem) -> RefPair {
        let midpoint = (elem.bounds[0] + elem.bounds[1]) / 2.0;
        let elems: SmallVec<[Elem; 2]> = [
            [elem.bounds[0], midpoint],
            [midpoint, elem.bounds[1]],
        ]
        .iter()
        .map(|bounds| {
            let mut child = Elem::new(0, *bounds, elem.marker, elem.poly_order + 1, 1, 1);
            let coeffs = project_onto(*bounds, elem.poly_order + 1, 1, &|_, x| {
                (1.0 / (x + 1.0), -1.0 / (x + 1.0).powi(2))
            });
            child.set_slot_coeffs(0, coeffs);
            child
        })
        .collect();

        RefPair::new(elems)
    }

    fn domain_and_pairs(n_elems: usize) -> (Domain, Vec<RefPair>) {
        let domain = Domain::from_mesh(Mesh::uniform(0.0, 4.0, n_elems, 2, 1));
        let pairs = domain.elems().map(mock_ref_pair).collect();
        (domain, pairs)
    }

    #[test]
    fn zero_threshold_marks_every_element() {
        let (domain, pairs) = domain_and_pairs(4);
        let controller = AdaptivityController {
            mode: AdaptMode::P,
            norm: ErrorNorm::L2,
            threshold: 0.0,
        };

        let refined = controller
            .refine(&domain, &[0.4, 0.1, 0.3, 0.2], &pairs)
            .unwrap();

        assert_eq!(refined.mesh.num_active_elems(), 4);
        for elem in refined.elems() {
            assert_eq!(elem.poly_order, 3);
        }
    }

    #[test]
    fn unit_threshold_marks_only_the_worst_element() {
        let (domain, pairs) = domain_and_pairs(4);
        let controller = AdaptivityController {
            mode: AdaptMode::P,
            norm: ErrorNorm::L2,
            threshold: 1.0,
        };

        let refined = controller
            .refine(&domain, &[0.1, 0.4, 0.3, 0.2], &pairs)
            .unwrap();

        let orders: Vec<usize> = refined.elems().map(|e| e.poly_order).collect();
        assert_eq!(orders, vec![2, 3, 2, 2]);
    }

    #[test]
    fn threshold_excluded_sweep_still_refines_exactly_one_element() {
        let (domain, pairs) = domain_and_pairs(3);
        let controller = AdaptivityController {
            mode: AdaptMode::H,
            norm: ErrorNorm::L2,
            threshold: 1.0,
        };

        // uniform indicators: nothing strictly exceeds threshold * max, so the
        // forced-maximum rule applies to the first worst element only
        let refined = controller.refine(&domain, &[0.25, 0.25, 0.25], &pairs).unwrap();

        assert_eq!(refined.mesh.num_active_elems(), 4);
        assert!((refined.mesh.elems[0].length() - 2.0 / 3.0).abs() < 1e-12);
        assert!((refined.mesh.elems[2].length() - 4.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn h_mode_splits_and_inherits_order() {
        let (domain, pairs) = domain_and_pairs(2);
        let controller = AdaptivityController {
            mode: AdaptMode::H,
            norm: ErrorNorm::L2,
            threshold: 0.7,
        };

        let refined = controller.refine(&domain, &[1.0, 0.1], &pairs).unwrap();

        assert_eq!(refined.mesh.num_active_elems(), 3);
        assert_eq!(refined.mesh.elems[0].poly_order, 2);
        assert_eq!(refined.mesh.elems[1].poly_order, 2);
        assert!((refined.mesh.elems[0].bounds[1] - 1.0).abs() < 1e-12);

        // ids were reassigned to the new ordering
        for (idx, elem) in refined.elems().enumerate() {
            assert_eq!(elem.id, idx);
        }
    }

    #[test]
    fn unmarked_elements_keep_their_coefficients() {
        let mut mesh = Mesh::uniform(0.0, 4.0, 2, 2, 1);
        for elem in mesh.elems.iter_mut() {
            let coeffs = project_onto(elem.bounds, 2, 1, &|_, x| ((0.5 * x).sin(), 0.5 * (0.5 * x).cos()));
            elem.set_slot_coeffs(0, coeffs);
        }
        let domain = Domain::from_mesh(mesh);
        let pairs: Vec<RefPair> = domain.elems().map(mock_ref_pair).collect();

        let controller = AdaptivityController {
            mode: AdaptMode::P,
            norm: ErrorNorm::L2,
            threshold: 0.7,
        };
        let refined = controller.refine(&domain, &[1.0, 0.2], &pairs).unwrap();

        let before = domain.mesh.elems[1].clone();
        let after = &refined.mesh.elems[1];
        assert_eq!(after.poly_order, before.poly_order);
        for local in 0..before.num_local() {
            assert!((after.coeff(0, 0, local) - before.coeff(0, 0, local)).abs() < 1e-15);
        }
    }

    #[test]
    fn degenerate_and_malformed_inputs_are_surfaced() {
        let (domain, pairs) = domain_and_pairs(3);
        let controller = AdaptivityController::default();

        assert!(matches!(
            controller.refine(&domain, &[0.0, 0.0, 0.0], &pairs),
            Err(AdaptError::DegenerateErrors)
        ));
        assert!(matches!(
            controller.refine(&domain, &[0.1, 0.2], &pairs),
            Err(AdaptError::MalformedErrors { expected: 3, .. })
        ));
        assert!(matches!(
            controller.refine(&domain, &[0.1, f64::NAN, 0.2], &pairs),
            Err(AdaptError::NonFiniteError(1))
        ));
    }

    #[test]
    fn hp_mode_refines_the_marked_element() {
        let domain = Domain::from_mesh(Mesh::uniform(0.0, 8.0, 2, 1, 1));
        let pairs: Vec<RefPair> = domain.elems().map(mock_ref_pair).collect();
        let controller = AdaptivityController {
            mode: AdaptMode::Hp,
            norm: ErrorNorm::L2,
            threshold: 0.7,
        };

        let refined = controller.refine(&domain, &[1.0, 0.01], &pairs).unwrap();

        // whichever action won, exactly one element was refined and DOFs grew
        assert!(refined.num_dofs() > domain.num_dofs());
        assert!(
            refined.mesh.num_active_elems() == 3 || refined.mesh.elems[0].poly_order == 2
        );
    }
}
