//! Atom functions for building expressions.
//!
//! Affine atoms pass through the linearizers untouched; nonlinear atoms are
//! what gets approximated.

pub mod affine;
pub mod nonlinear;

// Re-export affine operations
pub use affine::{
    column, cumsum, diag, dot, hstack, index, matmul, reshape, slice, sum, sum_axis,
    trace, transpose, vec, vstack,
};

// Re-export nonlinear atoms
pub use nonlinear::{
    abs, entropy, exp, log, maximum, minimum, neg_part, norm, norm1, norm2, norm_inf, pos, power,
    quad_form, quad_over_lin, sqrt, square, sum_squares,
};
