//! First-order (tangent-plane) linearization of expressions.
//!
//! Two entry points are provided:
//!
//! - [`linearize`] returns the affine approximation of an expression at the
//!   current values of its variables. Numeric coefficients live in
//!   placeholders kept in a caller-owned [`GradCache`], so repeated calls at
//!   new points update the same placeholders instead of building new ones.
//! - [`linearize_para`] builds a reusable template whose coefficients are
//!   placeholders with no values; [`ParameterizedLinearization::refresh`]
//!   fills them at the current point.
//!
//! # Example
//!
//! ```
//! use dccp::prelude::*;
//!
//! let x = named_variable("x", ());
//! x.set_value(3.0).unwrap();
//!
//! let mut cache = GradCache::new();
//! let tangent = linearize(&power(&x, 2.0), None, Some(&mut cache))
//!     .unwrap()
//!     .unwrap();
//! assert!(tangent.is_affine());
//!
//! x.set_value(3.1).unwrap();
//! let v = tangent.value().and_then(|v| v.as_scalar()).unwrap();
//! assert!((v - 9.6).abs() < 1e-9);
//! ```

mod cache;
mod point;
mod template;

pub use cache::{CacheKey, GradCache, Slot};
pub use point::{linearize, linearize_with, PointMap};
pub use template::{linearize_para, ParameterizedLinearization, VariableTerm};

use crate::atoms::reshape;
use crate::expr::{Expr, Shape};

/// How the gradient term of a matrix-shaped variable enters the tangent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatrixTermMode {
    /// The term is added once (the first-order Taylor expansion).
    #[default]
    Single,
    /// The term is added twice.
    Doubled,
}

/// Linearization settings.
#[derive(Debug, Clone, Default)]
pub struct LinearizeSettings {
    /// Treatment of matrix-shaped variables in [`linearize_with`].
    pub matrix_term: MatrixTermMode,
}

/// Reshape a term to `shape` unless it already has it.
fn conform_term(term: Expr, shape: &Shape) -> Expr {
    if &term.shape() == shape {
        term
    } else {
        reshape(&term, shape.clone())
    }
}
