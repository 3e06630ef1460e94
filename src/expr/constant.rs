//! Constants. Each one is a leaf with a fixed value and its own id.

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::expression::{Array, ConstantData, Expr, ExprId};

fn leaf(value: Array) -> Expr {
    Expr::Constant(ConstantData {
        id: ExprId::new(),
        value,
    })
}

pub fn constant(value: f64) -> Expr {
    leaf(Array::Scalar(value))
}

/// A column of `values`.
pub fn constant_vec(values: Vec<f64>) -> Expr {
    leaf(Array::from_vec(values))
}

/// A `rows x cols` matrix filled column by column from `values`.
pub fn constant_matrix(values: Vec<f64>, rows: usize, cols: usize) -> Expr {
    leaf(Array::Dense(DMatrix::from_vec(rows, cols, values)))
}

pub fn constant_dmatrix(matrix: DMatrix<f64>) -> Expr {
    leaf(Array::Dense(matrix))
}

/// A sparse constant; evaluation densifies it where needed.
pub fn constant_sparse(matrix: CscMatrix<f64>) -> Expr {
    leaf(Array::Sparse(matrix))
}

/// The `n x n` identity.
pub fn eye(n: usize) -> Expr {
    constant_dmatrix(DMatrix::identity(n, n))
}
