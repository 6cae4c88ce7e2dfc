//! Shared test helpers.

mod approx_eq;

pub use crate::approx_eq::ApproxIter;
pub use float_cmp::approx_eq;
