//! Numeric evaluation of expressions.
//!
//! - [`value`]: the value of an expression at the current point
//! - [`grad`]: gradients with respect to every variable

pub mod grad;
pub mod value;

pub use grad::Grad;
