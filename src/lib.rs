//! # dccp
//!
//! Tangent-plane linearization of Disciplined Convex Programming (DCP)
//! expressions, the building block of convex-concave programming.
//!
//! A convex-concave procedure repeatedly replaces the non-convex parts of a
//! problem by their first-order approximation at the current point. dccp
//! provides that approximation over a small DCP modeling layer:
//!
//! ```
//! use dccp::prelude::*;
//!
//! let x = named_variable("x", 3);
//! x.set_value(vec![1.0, 2.0, 2.0]).unwrap();
//!
//! // norm2(x) is convex; its tangent at x is affine
//! let tangent = linearize(&norm2(&x), None, None).unwrap().unwrap();
//! assert!(tangent.is_affine());
//! let v = tangent.value().and_then(|v| v.as_scalar()).unwrap();
//! assert!((v - 3.0).abs() < 1e-12);
//! ```
//!
//! ## Linearization
//!
//! - [`linearize`](linearize::linearize): the concrete tangent at the current
//!   point; numeric coefficients are placeholders reused through a
//!   [`GradCache`](linearize::GradCache)
//! - [`linearize_para`](linearize::linearize_para): a template whose
//!   coefficients are filled later by
//!   [`refresh`](linearize::ParameterizedLinearization::refresh)
//!
//! ## Modeling layer
//!
//! - **Expressions**: the `Expr` enum with `Arc` sharing, built from
//!   variables, parameters (placeholders) and constants
//! - **DCP analysis**: curvature of every expression
//! - **Evaluation**: `value()` and `grad()` at the current point
//! - **Domains**: constraints under which an expression is defined
//!
//! ## Supported Atoms
//!
//! ### Affine
//! - Arithmetic: `+`, `-`, `*` (elementwise), `/` (by scalar)
//! - Aggregation: `sum`, `trace`, `cumsum`
//! - Structural: `reshape`, `vec`, `transpose`, `vstack`, `hstack`, `diag`, indexing
//! - Linear algebra: `matmul`, `dot`
//!
//! ### Nonlinear
//! - Norms: `norm1`, `norm2`, `norm_inf`
//! - Element-wise: `abs`, `pos`, `neg_part`, `exp`, `log`, `entropy`, `power`
//! - Aggregation: `maximum`, `minimum`, `sum_squares`
//! - Quadratic: `quad_form`, `quad_over_lin`

pub mod atoms;
pub mod constraints;
pub mod dcp;
pub mod error;
pub mod eval;
pub mod expr;
pub mod linearize;
pub mod sparse;

/// Prelude module for convenient imports.
///
/// ```
/// use dccp::prelude::*;
/// ```
pub mod prelude {
    // Expression types
    pub use crate::expr::{
        constant, constant_dmatrix, constant_matrix, constant_sparse, constant_vec, eye,
        named_parameter, named_variable, parameter, parameter_with_value, variable, Array, Expr,
        ExprId, Shape, VariableBuilder, VariableExt,
    };

    // Atoms
    pub use crate::atoms::{
        abs, column, cumsum, diag, dot, entropy, exp, hstack, index, log, matmul,
        maximum, minimum, neg_part, norm, norm1, norm2, norm_inf, pos, power, quad_form,
        quad_over_lin, reshape, sqrt, square, sum, sum_axis, sum_squares, trace, transpose, vec,
        vstack,
    };

    // Constraints
    pub use crate::constraints::Constraint;

    // DCP
    pub use crate::dcp::Curvature;

    // Evaluation
    pub use crate::eval::Grad;

    // Linearization
    pub use crate::linearize::{
        linearize, linearize_para, linearize_with, GradCache, LinearizeSettings,
        MatrixTermMode, ParameterizedLinearization, PointMap,
    };

    // Errors
    pub use crate::error::{CvxError, Result};
}

// Re-export main types at crate root
pub use error::{CvxError, Result};
pub use linearize::{linearize, linearize_para, GradCache};
