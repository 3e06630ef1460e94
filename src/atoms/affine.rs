//! Affine atoms and operator overloading.
//!
//! Reshape and vectorization are column-major throughout. Elementwise `*`
//! of two non-constant operands is allowed; it is multilinear rather than
//! affine, so the linearizers approximate it.

use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use crate::expr::{constant, Expr, Shape};

fn plus(a: Expr, b: Expr) -> Expr {
    Expr::Add(Arc::new(a), Arc::new(b))
}

fn minus(a: Expr, b: Expr) -> Expr {
    plus(a, Expr::Neg(Arc::new(b)))
}

fn times(a: Expr, b: Expr) -> Expr {
    Expr::Mul(Arc::new(a), Arc::new(b))
}

fn plus_scalar(a: Expr, c: f64) -> Expr {
    plus(a, constant(c))
}

fn minus_scalar(a: Expr, c: f64) -> Expr {
    minus(a, constant(c))
}

// the constant factor goes first
fn scaled(a: Expr, c: f64) -> Expr {
    times(constant(c), a)
}

fn divided(a: Expr, c: f64) -> Expr {
    scaled(a, 1.0 / c)
}

/// `Expr op Expr` for every combination of owned and borrowed operands.
macro_rules! impl_expr_binop {
    ($Op:ident, $method:ident, $build:ident) => {
        impl $Op<Expr> for Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $build(self, rhs)
            }
        }

        impl $Op<&Expr> for Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                $build(self, rhs.clone())
            }
        }

        impl $Op<Expr> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: Expr) -> Expr {
                $build(self.clone(), rhs)
            }
        }

        impl $Op<&Expr> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: &Expr) -> Expr {
                $build(self.clone(), rhs.clone())
            }
        }
    };
}

/// `Expr op f64` for owned and borrowed expressions.
macro_rules! impl_scalar_op {
    ($Op:ident, $method:ident, $build:ident) => {
        impl $Op<f64> for Expr {
            type Output = Expr;

            fn $method(self, rhs: f64) -> Expr {
                $build(self, rhs)
            }
        }

        impl $Op<f64> for &Expr {
            type Output = Expr;

            fn $method(self, rhs: f64) -> Expr {
                $build(self.clone(), rhs)
            }
        }
    };
}

impl_expr_binop!(Add, add, plus);
impl_expr_binop!(Sub, sub, minus);
impl_expr_binop!(Mul, mul, times);

impl_scalar_op!(Add, add, plus_scalar);
impl_scalar_op!(Sub, sub, minus_scalar);
impl_scalar_op!(Mul, mul, scaled);
impl_scalar_op!(Div, div, divided);

impl Mul<Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: Expr) -> Expr {
        scaled(rhs, self)
    }
}

impl Mul<&Expr> for f64 {
    type Output = Expr;

    fn mul(self, rhs: &Expr) -> Expr {
        scaled(rhs.clone(), self)
    }
}

impl Neg for Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Arc::new(self))
    }
}

impl Neg for &Expr {
    type Output = Expr;

    fn neg(self) -> Expr {
        Expr::Neg(Arc::new(self.clone()))
    }
}

// ============================================================================
// Affine atom functions
// ============================================================================

/// Sum of all elements, or along an axis.
pub fn sum(expr: &Expr) -> Expr {
    Expr::Sum(Arc::new(expr.clone()), None)
}

/// Sum along a specific axis.
pub fn sum_axis(expr: &Expr, axis: usize) -> Expr {
    Expr::Sum(Arc::new(expr.clone()), Some(axis))
}

/// Reshape an expression to a new shape.
pub fn reshape(expr: &Expr, shape: impl Into<Shape>) -> Expr {
    Expr::Reshape(Arc::new(expr.clone()), shape.into())
}

/// Stack the columns of an expression into one vector.
pub fn vec(expr: &Expr) -> Expr {
    reshape(expr, Shape::vector(expr.shape().size()))
}

/// Transpose an expression.
pub fn transpose(expr: &Expr) -> Expr {
    Expr::Transpose(Arc::new(expr.clone()))
}

/// Matrix trace.
pub fn trace(expr: &Expr) -> Expr {
    Expr::Trace(Arc::new(expr.clone()))
}

/// Vertical stack (row-wise concatenation).
pub fn vstack(exprs: Vec<Expr>) -> Expr {
    Expr::VStack(exprs.into_iter().map(Arc::new).collect())
}

/// Horizontal stack (column-wise concatenation).
pub fn hstack(exprs: Vec<Expr>) -> Expr {
    Expr::HStack(exprs.into_iter().map(Arc::new).collect())
}

/// Matrix-vector or matrix-matrix multiplication.
pub fn matmul(a: &Expr, b: &Expr) -> Expr {
    Expr::MatMul(Arc::new(a.clone()), Arc::new(b.clone()))
}

/// `a' b`.
pub fn dot(a: &Expr, b: &Expr) -> Expr {
    matmul(&transpose(a), b)
}

/// Index into an expression.
pub fn index(expr: &Expr, idx: usize) -> Expr {
    use crate::expr::IndexSpec;
    Expr::Index(Arc::new(expr.clone()), IndexSpec::element(vec![idx]))
}

/// Column `d` of a matrix expression: `expr[:, d]`.
pub fn column(expr: &Expr, d: usize) -> Expr {
    use crate::expr::IndexSpec;
    Expr::Index(Arc::new(expr.clone()), IndexSpec::column(d))
}

/// Cumulative sum along an axis (down the rows when `axis` is `None` or `0`).
pub fn cumsum(expr: &Expr, axis: Option<usize>) -> Expr {
    Expr::Cumsum(Arc::new(expr.clone()), axis)
}

/// Diagonal matrix from a vector, or the diagonal of a matrix.
pub fn diag(expr: &Expr) -> Expr {
    Expr::Diag(Arc::new(expr.clone()))
}

/// Slice a range from an expression.
pub fn slice(expr: &Expr, start: usize, stop: usize) -> Expr {
    use crate::expr::IndexSpec;
    Expr::Index(Arc::new(expr.clone()), IndexSpec::range(start, stop))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{constant, parameter, variable};

    #[test]
    fn test_add_sub_neg_shapes() {
        let x = variable(5);
        let y = variable(5);
        assert_eq!((&x + &y).shape(), Shape::vector(5));
        assert_eq!((&x - &y).shape(), Shape::vector(5));
        assert_eq!((-&x).shape(), Shape::vector(5));
        assert_eq!((&x - 1.0).shape(), Shape::vector(5));
    }

    #[test]
    fn test_scalar_mul() {
        let x = variable(5);
        assert_eq!((2.0 * &x).shape(), Shape::vector(5));
        assert_eq!((&x / 2.0).shape(), Shape::vector(5));
    }

    #[test]
    fn test_sum_axis_shapes() {
        let x = variable((3, 4));
        assert_eq!(sum(&x).shape(), Shape::scalar());
        assert_eq!(sum_axis(&x, 0).shape(), Shape::vector(4));
        assert_eq!(sum_axis(&x, 1).shape(), Shape::vector(3));
    }

    #[test]
    fn test_column() {
        let x = variable((3, 4));
        assert_eq!(column(&x, 2).shape(), Shape::vector(3));
    }

    #[test]
    fn test_vec_and_reshape() {
        let x = variable((3, 4));
        assert_eq!(vec(&x).shape(), Shape::vector(12));
        assert_eq!(reshape(&vec(&x), (4, 3)).shape(), Shape::matrix(4, 3));
    }

    #[test]
    fn test_gradient_term_shape() {
        // g^T (x - x0) with g of shape (n, m) gives a length-m vector
        let g = parameter((3, 2));
        let x = variable(3);
        let x0 = parameter(3);
        let term = matmul(&transpose(&g), &(&x - &x0));
        assert_eq!(term.shape(), Shape::vector(2));
        assert!(term.is_affine());
    }

    #[test]
    fn test_diag_and_stack() {
        let x = variable(3);
        assert_eq!(diag(&x).shape(), Shape::matrix(3, 3));
        assert_eq!(diag(&variable((2, 5))).shape(), Shape::vector(2));
        let z = vstack(vec![variable((2, 3)), variable((3, 3))]);
        assert_eq!(z.shape(), Shape::matrix(5, 3));
        let h = hstack(vec![variable((2, 3)), variable((2, 1))]);
        assert_eq!(h.shape(), Shape::matrix(2, 4));
    }

    #[test]
    fn test_affine_is_affine() {
        let x = variable(5);
        let y = variable(5);
        assert!((&x + &y).is_affine());
        assert!((2.0 * &x).is_affine());
        assert!(sum(&x).is_affine());
        assert!(cumsum(&x, None).is_affine());
        // x * y is not affine
        assert!(!(&x * &y).is_affine());
        assert!((&x * &constant(3.0)).is_affine());
    }
}
