//! Variables: the leaves a linearization is taken with respect to.

use std::sync::{Arc, RwLock};

use super::expression::{Expr, ExprId, VariableData};
use super::shape::Shape;

/// Builder for variables with a name or a sign restriction.
///
/// A sign restriction is not enforced on assigned values; it only shows up in
/// [`Expr::domain`].
#[derive(Default)]
pub struct VariableBuilder {
    shape: Shape,
    name: Option<String>,
    nonneg: bool,
    nonpos: bool,
}

impl VariableBuilder {
    pub fn new(shape: impl Into<Shape>) -> Self {
        Self {
            shape: shape.into(),
            ..Default::default()
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Restrict to `x >= 0`, replacing any earlier `nonpos`.
    pub fn nonneg(mut self) -> Self {
        self.nonneg = true;
        self.nonpos = false;
        self
    }

    /// Restrict to `x <= 0`, replacing any earlier `nonneg`.
    pub fn nonpos(mut self) -> Self {
        self.nonpos = true;
        self.nonneg = false;
        self
    }

    /// A fresh variable with its own id and an empty value slot.
    pub fn build(self) -> Expr {
        Expr::Variable(VariableData {
            id: ExprId::new(),
            shape: self.shape,
            name: self.name,
            nonneg: self.nonneg,
            nonpos: self.nonpos,
            value: Arc::new(RwLock::new(None)),
        })
    }
}

/// Create a variable with the given shape.
///
/// ```
/// use dccp::expr::variable;
///
/// let x = variable(());      // scalar
/// let y = variable(5);       // vector
/// let z = variable((5,));    // the same shape as y
/// let w = variable((3, 4));  // matrix
/// assert_eq!(y.shape(), z.shape());
/// assert!(w.shape().is_matrix() && x.shape().is_scalar());
/// ```
pub fn variable(shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).build()
}

/// Create a named variable. The name keys the caller's point map in
/// [`linearize`](crate::linearize::linearize).
pub fn named_variable(name: impl Into<String>, shape: impl Into<Shape>) -> Expr {
    VariableBuilder::new(shape).name(name).build()
}

/// Attribute setters on an already built variable. Other expressions pass
/// through unchanged.
pub trait VariableExt {
    fn nonneg(self) -> Expr;

    fn nonpos(self) -> Expr;

    fn named(self, name: impl Into<String>) -> Expr;
}

impl VariableExt for Expr {
    fn nonneg(self) -> Expr {
        match self {
            Expr::Variable(mut v) => {
                v.nonneg = true;
                v.nonpos = false;
                Expr::Variable(v)
            }
            other => other,
        }
    }

    fn nonpos(self) -> Expr {
        match self {
            Expr::Variable(mut v) => {
                v.nonpos = true;
                v.nonneg = false;
                Expr::Variable(v)
            }
            other => other,
        }
    }

    fn named(self, name: impl Into<String>) -> Expr {
        match self {
            Expr::Variable(mut v) => {
                v.name = Some(name.into());
                Expr::Variable(v)
            }
            other => other,
        }
    }
}
