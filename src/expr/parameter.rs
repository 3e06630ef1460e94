//! Parameters: placeholders with a fixed shape and a settable value.
//!
//! A parameter behaves like a constant for DCP analysis, but its numeric value
//! lives in a shared slot and may be replaced without rebuilding the
//! expressions that use it.

use std::sync::{Arc, RwLock};

use super::expression::{Array, Expr, ExprId, ParameterData};
use super::shape::Shape;
use crate::error::Result;

/// Create a parameter with the given shape and no value.
///
/// # Examples
///
/// ```
/// use dccp::expr::parameter;
///
/// let p = parameter((3, 1));
/// p.set_value(vec![1.0, 2.0, 3.0]).unwrap();
/// assert!(p.set_value(vec![1.0]).is_err());
/// ```
pub fn parameter(shape: impl Into<Shape>) -> Expr {
    Expr::Parameter(ParameterData {
        id: ExprId::new(),
        shape: shape.into(),
        name: None,
        value: Arc::new(RwLock::new(None)),
    })
}

/// Create a named parameter with the given shape and no value.
pub fn named_parameter(name: impl Into<String>, shape: impl Into<Shape>) -> Expr {
    match parameter(shape) {
        Expr::Parameter(mut p) => {
            p.name = Some(name.into());
            Expr::Parameter(p)
        }
        other => other,
    }
}

/// Create a parameter of the given shape holding `value`.
pub fn parameter_with_value(shape: impl Into<Shape>, value: impl Into<Array>) -> Result<Expr> {
    let p = parameter(shape);
    p.set_value(value)?;
    Ok(p)
}
