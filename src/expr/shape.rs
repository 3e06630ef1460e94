//! Expression shapes.
//!
//! Shapes have at most two dimensions and broadcast like NumPy arrays. A
//! value of any shape is stored as a dense `rows() x cols()` column-major
//! matrix, so a vector of length `n` and an `n x 1` matrix share storage.

use std::fmt;

/// Shape of an expression.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum Shape {
    #[default]
    Scalar,
    Vector(usize),
    Matrix(usize, usize),
}

impl Shape {
    pub fn scalar() -> Self {
        Shape::Scalar
    }

    pub fn vector(n: usize) -> Self {
        Shape::Vector(n)
    }

    pub fn matrix(m: usize, n: usize) -> Self {
        Shape::Matrix(m, n)
    }

    /// Shape with the given NumPy dimensions; `None` past two dimensions.
    pub fn from_dims(dims: &[usize]) -> Option<Self> {
        match *dims {
            [] => Some(Shape::Scalar),
            [n] => Some(Shape::Vector(n)),
            [m, n] => Some(Shape::Matrix(m, n)),
            _ => None,
        }
    }

    /// NumPy dimensions: empty for a scalar.
    pub fn dims(&self) -> Vec<usize> {
        match *self {
            Shape::Scalar => vec![],
            Shape::Vector(n) => vec![n],
            Shape::Matrix(m, n) => vec![m, n],
        }
    }

    pub fn ndim(&self) -> usize {
        match self {
            Shape::Scalar => 0,
            Shape::Vector(_) => 1,
            Shape::Matrix(_, _) => 2,
        }
    }

    pub fn size(&self) -> usize {
        let (r, c) = self.storage_dims();
        r * c
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, Shape::Scalar)
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, Shape::Vector(_))
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, Shape::Matrix(_, _))
    }

    pub fn rows(&self) -> usize {
        self.storage_dims().0
    }

    pub fn cols(&self) -> usize {
        self.storage_dims().1
    }

    /// Dimensions of the dense matrix holding a value of this shape.
    pub fn storage_dims(&self) -> (usize, usize) {
        match *self {
            Shape::Scalar => (1, 1),
            Shape::Vector(n) => (n, 1),
            Shape::Matrix(m, n) => (m, n),
        }
    }

    /// Whether an `nrows x ncols` matrix can hold a value of this shape.
    pub fn admits(&self, nrows: usize, ncols: usize) -> bool {
        self.storage_dims() == (nrows, ncols)
    }

    /// A vector transposes to a single row.
    pub fn transpose(&self) -> Self {
        match *self {
            Shape::Scalar => Shape::Scalar,
            Shape::Vector(n) => Shape::Matrix(1, n),
            Shape::Matrix(m, n) => Shape::Matrix(n, m),
        }
    }

    /// Result shape of an elementwise operation, or `None` if the shapes
    /// do not broadcast.
    ///
    /// A vector and a matrix with the same storage give the vector shape.
    /// Otherwise a vector acts as a single row, as in NumPy.
    pub fn broadcast(&self, other: &Shape) -> Option<Shape> {
        if self.is_scalar() {
            return Some(other.clone());
        }
        if other.is_scalar() || self.storage_dims() == other.storage_dims() {
            return Some(if self.ndim() <= other.ndim() {
                self.clone()
            } else {
                other.clone()
            });
        }

        let as_row = |s: &Shape| match *s {
            Shape::Vector(n) => (1, n),
            _ => s.storage_dims(),
        };
        let join = |a: usize, b: usize| match (a, b) {
            _ if a == b => Some(a),
            (1, b) => Some(b),
            (a, 1) => Some(a),
            _ => None,
        };
        let (ar, ac) = as_row(self);
        let (br, bc) = as_row(other);
        let cols = join(ac, bc)?;
        if self.is_vector() && other.is_vector() {
            return Some(Shape::Vector(cols));
        }
        Some(Shape::Matrix(join(ar, br)?, cols))
    }

    /// Result shape of `self @ other`. A scalar operand scales the other
    /// side; two vectors give their inner product.
    pub fn matmul(&self, other: &Shape) -> Option<Shape> {
        use Shape::*;
        match (self, other) {
            (Scalar, s) | (s, Scalar) => Some(s.clone()),
            (Matrix(m, k), Matrix(j, n)) if k == j => Some(Matrix(*m, *n)),
            (Matrix(m, k), Vector(j)) if k == j => Some(Vector(*m)),
            (Vector(k), Matrix(j, n)) if k == j => Some(Vector(*n)),
            (Vector(k), Vector(j)) if k == j => Some(Scalar),
            _ => None,
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Shape::Scalar => write!(f, "()"),
            Shape::Vector(n) => write!(f, "({},)", n),
            Shape::Matrix(m, n) => write!(f, "({}, {})", m, n),
        }
    }
}

impl From<()> for Shape {
    fn from(_: ()) -> Self {
        Shape::Scalar
    }
}

impl From<usize> for Shape {
    fn from(n: usize) -> Self {
        Shape::Vector(n)
    }
}

impl From<(usize,)> for Shape {
    fn from((n,): (usize,)) -> Self {
        Shape::Vector(n)
    }
}

impl From<(usize, usize)> for Shape {
    fn from((m, n): (usize, usize)) -> Self {
        Shape::Matrix(m, n)
    }
}
