//! Elementwise nonnegativity constraints.

use std::fmt;
use std::sync::Arc;

use crate::expr::Expr;

/// The constraint `expr >= 0`, elementwise.
#[derive(Debug, Clone)]
pub struct Constraint {
    expr: Arc<Expr>,
}

impl Constraint {
    /// `expr >= 0`.
    pub fn nonneg(expr: Expr) -> Self {
        Constraint {
            expr: Arc::new(expr),
        }
    }

    /// `expr <= 0`, stored as `-expr >= 0`.
    pub fn nonpos(expr: Expr) -> Self {
        Constraint::nonneg(Expr::Neg(Arc::new(expr)))
    }

    /// The constrained expression.
    pub fn expr(&self) -> &Expr {
        &self.expr
    }

    /// Largest violation at the current point, `0.0` when satisfied.
    ///
    /// Returns `None` when the constraint expression has no value.
    pub fn violation(&self) -> Option<f64> {
        let value = self.expr.dense_value()?;
        Some(value.iter().fold(0.0_f64, |acc, v| acc.max(-v)))
    }

    /// Check the constraint at the current point within `tol`.
    pub fn is_satisfied(&self, tol: f64) -> bool {
        self.violation().is_some_and(|v| v <= tol)
    }
}

impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} >= 0", self.expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{named_variable, variable};

    #[test]
    fn test_violation() {
        let x = variable(3);
        let c = Constraint::nonneg(x.clone());
        assert!(c.violation().is_none());
        assert!(!c.is_satisfied(1e-9));

        x.set_value(vec![1.0, -0.5, 2.0]).unwrap();
        assert_eq!(c.violation(), Some(0.5));
        assert!(c.is_satisfied(0.5));
        assert!(!c.is_satisfied(0.1));

        let upper = Constraint::nonpos(x.clone());
        assert_eq!(upper.violation(), Some(2.0));
    }

    #[test]
    fn test_display() {
        let x = named_variable("x", ());
        assert_eq!(Constraint::nonneg(x.clone()).to_string(), "x >= 0");
        assert_eq!(Constraint::nonpos(&x - 3.0).to_string(), "-(x - 3) >= 0");
        assert_eq!(Constraint::nonneg(x.clone()).expr().to_string(), "x");
    }
}
