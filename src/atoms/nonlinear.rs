//! Nonlinear atoms.
//!
//! These are the expressions the linearizers actually approximate. Each has
//! a value everywhere in its domain and, away from kinks and domain
//! boundaries, a closed-form gradient (see `eval::grad`).

use std::sync::Arc;

use crate::error::{CvxError, Result};
use crate::expr::Expr;

fn wrap(x: &Expr) -> Arc<Expr> {
    Arc::new(x.clone())
}

/// `sum(|x_i|)`. Convex; the zero subgradient is used at `x_i = 0`.
pub fn norm1(x: &Expr) -> Expr {
    Expr::Norm1(wrap(x))
}

/// Euclidean norm. Convex; not differentiable at the origin.
pub fn norm2(x: &Expr) -> Expr {
    Expr::Norm2(wrap(x))
}

/// `max(|x_i|)`. Convex.
pub fn norm_inf(x: &Expr) -> Expr {
    Expr::NormInf(wrap(x))
}

/// The `p`-norm for `p` in `{1, 2, inf}`.
///
/// ```
/// use dccp::prelude::*;
///
/// let x = variable(5);
/// assert_eq!(norm(&x, 2.0).unwrap().to_string(), norm2(&x).to_string());
/// assert!(norm(&x, 3.0).is_err());
/// ```
pub fn norm(x: &Expr, p: f64) -> Result<Expr> {
    match p {
        p if p == 1.0 => Ok(norm1(x)),
        p if p == 2.0 => Ok(norm2(x)),
        p if p == f64::INFINITY => Ok(norm_inf(x)),
        _ => Err(CvxError::InvalidProblem(format!(
            "norm p={} is not supported; use p=1, 2, or inf",
            p
        ))),
    }
}

/// Elementwise `|x|`.
pub fn abs(x: &Expr) -> Expr {
    Expr::Abs(wrap(x))
}

/// Elementwise `max(x, 0)`.
pub fn pos(x: &Expr) -> Expr {
    Expr::Pos(wrap(x))
}

/// Elementwise `max(-x, 0)`.
pub fn neg_part(x: &Expr) -> Expr {
    Expr::NegPart(wrap(x))
}

/// Elementwise maximum, broadcasting scalars. A single argument is
/// returned as is.
pub fn maximum(mut exprs: Vec<Expr>) -> Expr {
    match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::Maximum(exprs.into_iter().map(Arc::new).collect()),
    }
}

/// Elementwise minimum, broadcasting scalars. A single argument is
/// returned as is.
pub fn minimum(mut exprs: Vec<Expr>) -> Expr {
    match exprs.len() {
        1 => exprs.remove(0),
        _ => Expr::Minimum(exprs.into_iter().map(Arc::new).collect()),
    }
}

/// `x' P x` for a constant symmetric `P`.
pub fn quad_form(x: &Expr, p: &Expr) -> Expr {
    Expr::QuadForm(wrap(x), wrap(p))
}

/// `x' x`.
pub fn sum_squares(x: &Expr) -> Expr {
    Expr::SumSquares(wrap(x))
}

/// `x' x / y` for scalar `y`. Jointly convex for `y > 0`.
pub fn quad_over_lin(x: &Expr, y: &Expr) -> Expr {
    Expr::QuadOverLin(wrap(x), wrap(y))
}

pub fn exp(x: &Expr) -> Expr {
    Expr::Exp(wrap(x))
}

/// Natural logarithm; concave, defined for `x > 0`.
pub fn log(x: &Expr) -> Expr {
    Expr::Log(wrap(x))
}

/// Elementwise `-x log(x)`, with `entropy(0) = 0`.
pub fn entropy(x: &Expr) -> Expr {
    Expr::Entropy(wrap(x))
}

/// Elementwise `x^p`. Fractional and negative exponents restrict `x` to the
/// nonnegative orthant.
pub fn power(x: &Expr, p: f64) -> Expr {
    Expr::Power(wrap(x), p)
}

pub fn square(x: &Expr) -> Expr {
    power(x, 2.0)
}

pub fn sqrt(x: &Expr) -> Expr {
    power(x, 0.5)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant, named_variable, variable};

    #[test]
    fn test_norm_picks_atom() {
        let x = variable(4);
        assert!(matches!(norm(&x, 1.0), Ok(Expr::Norm1(_))));
        assert!(matches!(norm(&x, 2.0), Ok(Expr::Norm2(_))));
        assert!(matches!(norm(&x, f64::INFINITY), Ok(Expr::NormInf(_))));
        for p in [3.0, 0.5, f64::NEG_INFINITY, f64::NAN] {
            assert!(matches!(norm(&x, p), Err(CvxError::InvalidProblem(_))));
        }
    }

    #[test]
    fn test_single_argument_extrema() {
        let x = variable(3);
        assert!(maximum(vec![x.clone()]).is_variable());
        assert!(minimum(vec![x.clone()]).is_variable());
        assert!(matches!(
            maximum(vec![x.clone(), constant(0.0)]),
            Expr::Maximum(args) if args.len() == 2
        ));
    }

    #[test]
    fn test_powers_and_display() {
        let x = named_variable("x", ());
        assert!(matches!(sqrt(&x), Expr::Power(_, p) if p == 0.5));
        assert_eq!(square(&x).to_string(), "(x)^2");
        assert_eq!(entropy(&x).to_string(), "entropy(x)");
        assert_eq!(quad_over_lin(&x, &x).to_string(), "quad_over_lin(x, x)");
    }

    #[test]
    fn test_elementwise_atoms_keep_shape() {
        let x = variable((2, 3));
        for e in [abs(&x), pos(&x), neg_part(&x), exp(&x), log(&x), entropy(&x), sqrt(&x)] {
            assert_eq!(e.shape(), x.shape());
        }
        assert!(norm_inf(&x).shape().is_scalar());
        assert!(sum_squares(&x).shape().is_scalar());
    }
}
