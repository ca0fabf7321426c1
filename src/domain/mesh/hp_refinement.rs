use super::{MAX_POLYNOMIAL_ORDER, MIN_ELEM_LENGTH};
use std::fmt;

/// Description of a single hp-Refinement applied to one element
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HpRef {
    /// Split the element in two at its midpoint; both children inherit the polynomial order
    H,
    /// Raise the element's polynomial order by one; the spatial extent is unchanged
    P,
    /// Split the element in two and raise both children's polynomial order by one
    Both,
}

impl HpRef {
    /// Number of active elements this refinement leaves in place of the refined one
    pub fn num_children(&self) -> usize {
        match self {
            Self::P => 1,
            Self::H | Self::Both => 2,
        }
    }

    /// Does this refinement split the element in space
    pub fn splits(&self) -> bool {
        matches!(self, Self::H | Self::Both)
    }

    /// Does this refinement raise the polynomial order
    pub fn raises_order(&self) -> bool {
        matches!(self, Self::P | Self::Both)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HpRefError {
    ElemDoesntExist(usize),
    ExceededMaxOrder(usize),
    BelowMinLength(usize),
}

impl fmt::Display for HpRefError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::ElemDoesntExist(elem_id) => {
                write!(f, "Elem {} does not exist; Cannot apply hp-Refinement!", elem_id)
            }
            Self::ExceededMaxOrder(elem_id) => write!(
                f,
                "p-Refinement of Elem {} would exceed the maximum expansion order ({}); Cannot apply hp-Refinement!",
                elem_id, MAX_POLYNOMIAL_ORDER
            ),
            Self::BelowMinLength(elem_id) => write!(
                f,
                "h-Refinement of Elem {} would produce elements shorter than {}; Cannot apply hp-Refinement!",
                elem_id, MIN_ELEM_LENGTH
            ),
        }
    }
}

impl std::error::Error for HpRefError {}
