//! The expression graph.
//!
//! An `Expr` is an immutable DAG node; children are shared through `Arc`.
//! Variables and parameters keep their numeric value in a shared slot, so a
//! value assigned through one clone is seen by every other clone and by every
//! expression built on top of it.

use std::fmt;
use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use nalgebra::DMatrix;
use nalgebra_sparse::CscMatrix;

use super::shape::Shape;
use crate::error::{CvxError, Result};
use crate::sparse::csc_to_dense;

/// Identity of a leaf. Ids are process-wide and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ExprId(u64);

impl ExprId {
    pub fn new() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(0);
        ExprId(NEXT_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for ExprId {
    fn default() -> Self {
        Self::new()
    }
}

/// A numeric value. Only constants hold `Sparse`; evaluation is dense.
#[derive(Debug, Clone)]
pub enum Array {
    Dense(DMatrix<f64>),
    Sparse(CscMatrix<f64>),
    Scalar(f64),
}

impl Array {
    /// Shape of the stored matrix; dense values are always 2-d.
    pub fn shape(&self) -> Shape {
        match self {
            Array::Dense(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Sparse(m) => Shape::matrix(m.nrows(), m.ncols()),
            Array::Scalar(_) => Shape::scalar(),
        }
    }

    /// Dimensions of the dense representation.
    pub fn dims(&self) -> (usize, usize) {
        match self {
            Array::Dense(m) => (m.nrows(), m.ncols()),
            Array::Sparse(m) => (m.nrows(), m.ncols()),
            Array::Scalar(_) => (1, 1),
        }
    }

    pub fn size(&self) -> usize {
        let (m, n) = self.dims();
        m * n
    }

    /// The value of a scalar or a `1 x 1` dense matrix.
    pub fn as_scalar(&self) -> Option<f64> {
        match self {
            Array::Scalar(v) => Some(*v),
            Array::Dense(m) if m.nrows() == 1 && m.ncols() == 1 => Some(m[(0, 0)]),
            _ => None,
        }
    }

    /// Dense copy of the array (a scalar becomes a 1x1 matrix).
    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            Array::Dense(m) => m.clone(),
            Array::Sparse(m) => csc_to_dense(m),
            Array::Scalar(v) => DMatrix::from_element(1, 1, *v),
        }
    }

    /// Wrap a dense value for an expression of the given shape.
    pub fn from_dense(m: DMatrix<f64>, shape: &Shape) -> Self {
        if shape.is_scalar() && m.nrows() == 1 && m.ncols() == 1 {
            Array::Scalar(m[(0, 0)])
        } else {
            Array::Dense(m)
        }
    }

    /// Check that no element is NaN or infinite.
    pub fn is_finite(&self) -> bool {
        match self {
            Array::Scalar(v) => v.is_finite(),
            Array::Dense(m) => m.iter().all(|v| v.is_finite()),
            Array::Sparse(m) => m.values().iter().all(|v| v.is_finite()),
        }
    }

    /// `None` for non-square or non-symmetric matrices.
    pub fn is_psd(&self) -> Option<bool> {
        match self {
            Array::Scalar(v) => Some(*v >= 0.0),
            Array::Dense(m) => is_symmetric_psd(m),
            Array::Sparse(m) => is_symmetric_psd(&csc_to_dense(m)),
        }
    }

    /// A column holding `v`.
    pub fn from_vec(v: Vec<f64>) -> Self {
        let n = v.len();
        Array::Dense(DMatrix::from_vec(n, 1, v))
    }
}

fn is_symmetric_psd(m: &DMatrix<f64>) -> Option<bool> {
    if m.nrows() != m.ncols() {
        return None;
    }
    let n = m.nrows();
    for i in 0..n {
        for j in (i + 1)..n {
            if (m[(i, j)] - m[(j, i)]).abs() > 1e-10 {
                return None;
            }
        }
    }
    // Cholesky of a slightly shifted matrix accepts singular PSD matrices
    let shifted = m + DMatrix::identity(n, n) * 1e-12;
    Some(shifted.cholesky().is_some())
}

impl From<f64> for Array {
    fn from(v: f64) -> Self {
        Array::Scalar(v)
    }
}

impl From<Vec<f64>> for Array {
    fn from(v: Vec<f64>) -> Self {
        Array::from_vec(v)
    }
}

impl From<DMatrix<f64>> for Array {
    fn from(m: DMatrix<f64>) -> Self {
        Array::Dense(m)
    }
}

/// Shared numeric slot of a variable or parameter.
pub type ValueSlot = Arc<RwLock<Option<Array>>>;

#[derive(Debug, Clone)]
pub struct VariableData {
    pub id: ExprId,
    pub shape: Shape,
    pub name: Option<String>,
    /// Sign restrictions, reported by `domain()`.
    pub nonneg: bool,
    pub nonpos: bool,
    pub value: ValueSlot,
}

/// A placeholder: constant for curvature, but its value may change.
#[derive(Debug, Clone)]
pub struct ParameterData {
    pub id: ExprId,
    /// Fixed at creation; assigned values must match it.
    pub shape: Shape,
    pub name: Option<String>,
    pub value: ValueSlot,
}

#[derive(Debug, Clone)]
pub struct ConstantData {
    pub id: ExprId,
    pub value: Array,
}

impl ConstantData {
    pub fn shape(&self) -> Shape {
        self.value.shape()
    }
}

/// Per-dimension `(start, stop, step)` selection; `None` keeps the whole
/// dimension.
#[derive(Debug, Clone)]
pub struct IndexSpec {
    pub ranges: Vec<Option<(usize, usize, usize)>>,
}

impl IndexSpec {
    /// A single entry.
    pub fn element(indices: Vec<usize>) -> Self {
        IndexSpec {
            ranges: indices.into_iter().map(|i| Some((i, i + 1, 1))).collect(),
        }
    }

    /// `[start..stop]` along the first dimension.
    pub fn range(start: usize, stop: usize) -> Self {
        IndexSpec {
            ranges: vec![Some((start, stop, 1))],
        }
    }

    /// `[:, d]`.
    pub fn column(d: usize) -> Self {
        IndexSpec {
            ranges: vec![None, Some((d, d + 1, 1))],
        }
    }

    /// Shape of `base` after indexing. Dimensions that select a single
    /// entry are dropped.
    pub fn result_shape(&self, base: &Shape) -> Shape {
        let base_dims = base.dims();
        let dims: Vec<usize> = self
            .ranges
            .iter()
            .enumerate()
            .filter_map(|(i, r)| match *r {
                Some((start, stop, step)) => {
                    Some((stop - start).div_ceil(step)).filter(|n| *n > 1)
                }
                None => base_dims.get(i).copied(),
            })
            .collect();
        // an index never adds dimensions
        Shape::from_dims(&dims).unwrap_or_default()
    }

    /// Indices selected along dimension `dim` of extent `len`.
    pub fn selected(&self, dim: usize, len: usize) -> Vec<usize> {
        match self.ranges.get(dim).copied().flatten() {
            Some((start, stop, step)) => (start..stop.min(len)).step_by(step.max(1)).collect(),
            None => (0..len).collect(),
        }
    }
}

/// A node of the expression graph.
#[derive(Debug, Clone)]
pub enum Expr {
    Variable(VariableData),
    Parameter(ParameterData),
    Constant(ConstantData),

    // affine
    Add(Arc<Expr>, Arc<Expr>),
    Neg(Arc<Expr>),
    /// Elementwise product with broadcasting. Affine only when one side is
    /// constant.
    Mul(Arc<Expr>, Arc<Expr>),
    /// Sum of all entries, or along an axis.
    Sum(Arc<Expr>, Option<usize>),
    /// Column-major reshape.
    Reshape(Arc<Expr>, Shape),
    Index(Arc<Expr>, IndexSpec),
    VStack(Vec<Arc<Expr>>),
    HStack(Vec<Arc<Expr>>),
    Transpose(Arc<Expr>),
    Trace(Arc<Expr>),
    MatMul(Arc<Expr>, Arc<Expr>),
    Cumsum(Arc<Expr>, Option<usize>),
    /// Vector to diagonal matrix, or matrix to its diagonal.
    Diag(Arc<Expr>),

    // nonlinear
    Norm1(Arc<Expr>),
    Norm2(Arc<Expr>),
    NormInf(Arc<Expr>),
    Abs(Arc<Expr>),
    Pos(Arc<Expr>),
    NegPart(Arc<Expr>),
    Maximum(Vec<Arc<Expr>>),
    Minimum(Vec<Arc<Expr>>),
    /// `x' P x`; `P` is the second child.
    QuadForm(Arc<Expr>, Arc<Expr>),
    SumSquares(Arc<Expr>),
    /// `x' x / y` for scalar `y`.
    QuadOverLin(Arc<Expr>, Arc<Expr>),
    Exp(Arc<Expr>),
    Log(Arc<Expr>),
    /// `-x log(x)`, elementwise.
    Entropy(Arc<Expr>),
    Power(Arc<Expr>, f64),
}

impl Expr {
    /// Shape of the expression. Incompatible operands fall back to a
    /// scalar shape rather than panicking.
    pub fn shape(&self) -> Shape {
        match self {
            Expr::Variable(v) => v.shape.clone(),
            Expr::Parameter(p) => p.shape.clone(),
            Expr::Constant(c) => c.shape(),

            Expr::Add(a, b) | Expr::Mul(a, b) => {
                a.shape().broadcast(&b.shape()).unwrap_or_default()
            }
            Expr::Maximum(args) | Expr::Minimum(args) => args
                .iter()
                .map(|e| e.shape())
                .reduce(|acc, s| acc.broadcast(&s).unwrap_or(acc))
                .unwrap_or_default(),
            Expr::Neg(a)
            | Expr::Abs(a)
            | Expr::Pos(a)
            | Expr::NegPart(a)
            | Expr::Exp(a)
            | Expr::Log(a)
            | Expr::Entropy(a)
            | Expr::Power(a, _)
            | Expr::Cumsum(a, _) => a.shape(),

            Expr::Sum(a, axis) => match (a.shape(), axis) {
                (s, Some(0)) if s.is_matrix() => Shape::vector(s.cols()),
                (s, Some(_)) if s.is_matrix() => Shape::vector(s.rows()),
                _ => Shape::scalar(),
            },
            Expr::Trace(_)
            | Expr::Norm1(_)
            | Expr::Norm2(_)
            | Expr::NormInf(_)
            | Expr::QuadForm(_, _)
            | Expr::SumSquares(_)
            | Expr::QuadOverLin(_, _) => Shape::scalar(),

            Expr::Reshape(_, shape) => shape.clone(),
            Expr::Index(a, spec) => spec.result_shape(&a.shape()),
            Expr::VStack(args) => match args.first() {
                Some(first) => Shape::matrix(
                    args.iter().map(|e| e.shape().rows()).sum(),
                    first.shape().cols(),
                ),
                None => Shape::scalar(),
            },
            Expr::HStack(args) => match args.first() {
                Some(first) => Shape::matrix(
                    first.shape().rows(),
                    args.iter().map(|e| e.shape().cols()).sum(),
                ),
                None => Shape::scalar(),
            },
            Expr::Transpose(a) => a.shape().transpose(),
            Expr::MatMul(a, b) => a.shape().matmul(&b.shape()).unwrap_or_default(),
            Expr::Diag(a) => {
                let s = a.shape();
                if !s.is_scalar() && s.cols() == 1 {
                    Shape::matrix(s.size(), s.size())
                } else {
                    Shape::vector(s.rows().min(s.cols()))
                }
            }
        }
    }

    /// Direct sub-expressions, in argument order.
    pub fn args(&self) -> Vec<&Expr> {
        match self {
            Expr::Variable(_) | Expr::Parameter(_) | Expr::Constant(_) => Vec::new(),
            Expr::Add(a, b)
            | Expr::Mul(a, b)
            | Expr::MatMul(a, b)
            | Expr::QuadForm(a, b)
            | Expr::QuadOverLin(a, b) => vec![a.as_ref(), b.as_ref()],
            Expr::Neg(a)
            | Expr::Sum(a, _)
            | Expr::Reshape(a, _)
            | Expr::Index(a, _)
            | Expr::Transpose(a)
            | Expr::Trace(a)
            | Expr::Norm1(a)
            | Expr::Norm2(a)
            | Expr::NormInf(a)
            | Expr::Abs(a)
            | Expr::Pos(a)
            | Expr::NegPart(a)
            | Expr::SumSquares(a)
            | Expr::Exp(a)
            | Expr::Log(a)
            | Expr::Entropy(a)
            | Expr::Power(a, _)
            | Expr::Cumsum(a, _)
            | Expr::Diag(a) => vec![a.as_ref()],
            Expr::VStack(exprs)
            | Expr::HStack(exprs)
            | Expr::Maximum(exprs)
            | Expr::Minimum(exprs) => exprs.iter().map(|e| e.as_ref()).collect(),
        }
    }

    /// Get the unique ID if this is a variable.
    pub fn variable_id(&self) -> Option<ExprId> {
        match self {
            Expr::Variable(v) => Some(v.id),
            _ => None,
        }
    }

    /// Get the unique ID of a leaf (variable, parameter or constant).
    pub fn leaf_id(&self) -> Option<ExprId> {
        match self {
            Expr::Variable(v) => Some(v.id),
            Expr::Parameter(p) => Some(p.id),
            Expr::Constant(c) => Some(c.id),
            _ => None,
        }
    }

    /// Check if this expression is a constant.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expr::Constant(_))
    }

    /// Check if this expression is a variable.
    pub fn is_variable(&self) -> bool {
        matches!(self, Expr::Variable(_))
    }

    /// Check if this expression is a parameter.
    pub fn is_parameter(&self) -> bool {
        matches!(self, Expr::Parameter(_))
    }

    /// Get the constant value if this is a constant expression.
    pub fn constant_value(&self) -> Option<&Array> {
        match self {
            Expr::Constant(c) => Some(&c.value),
            _ => None,
        }
    }

    /// Display name of a variable or parameter leaf.
    ///
    /// Unnamed leaves are called `var{id}` / `param{id}`.
    pub fn name(&self) -> Option<String> {
        match self {
            Expr::Variable(v) => Some(
                v.name
                    .clone()
                    .unwrap_or_else(|| format!("var{}", v.id.raw())),
            ),
            Expr::Parameter(p) => Some(
                p.name
                    .clone()
                    .unwrap_or_else(|| format!("param{}", p.id.raw())),
            ),
            _ => None,
        }
    }

    /// Current value of a variable or parameter leaf.
    pub fn leaf_value(&self) -> Option<Array> {
        let slot = match self {
            Expr::Variable(v) => &v.value,
            Expr::Parameter(p) => &p.value,
            _ => return None,
        };
        slot.read().ok().and_then(|guard| guard.clone())
    }

    /// Assign a value to a variable or parameter leaf.
    ///
    /// The value must have the leaf's shape: a vector of length `n` accepts
    /// an `n x 1` matrix, a scalar accepts a scalar or a `1 x 1` matrix.
    pub fn set_value(&self, value: impl Into<Array>) -> Result<()> {
        let (slot, shape) = match self {
            Expr::Variable(v) => (&v.value, &v.shape),
            Expr::Parameter(p) => (&p.value, &p.shape),
            _ => {
                return Err(CvxError::InvalidProblem(
                    "only variables and parameters hold assignable values".into(),
                ))
            }
        };
        let value = value.into();
        let (m, n) = value.dims();
        if !shape.admits(m, n) {
            return Err(CvxError::ShapeMismatch {
                expected: shape.to_string(),
                got: format!("({}, {})", m, n),
            });
        }
        if !value.is_finite() {
            return Err(CvxError::NumericalError(format!(
                "non-finite value assigned to {}",
                self
            )));
        }
        let value = Array::from_dense(value.to_dense(), shape);
        let mut guard = slot
            .write()
            .map_err(|_| CvxError::NumericalError("value slot is poisoned".into()))?;
        *guard = Some(value);
        Ok(())
    }

    /// Remove the value of a variable or parameter leaf.
    pub fn clear_value(&self) {
        let slot = match self {
            Expr::Variable(v) => &v.value,
            Expr::Parameter(p) => &p.value,
            _ => return,
        };
        if let Ok(mut guard) = slot.write() {
            *guard = None;
        }
    }

    /// Collect all variables in this expression, ordered by id.
    pub fn variables(&self) -> Vec<Expr> {
        let mut vars = Vec::new();
        self.collect_leaves(&mut vars, &|e| e.is_variable());
        vars
    }

    /// Collect all parameters in this expression, ordered by id.
    pub fn parameters(&self) -> Vec<Expr> {
        let mut params = Vec::new();
        self.collect_leaves(&mut params, &|e| e.is_parameter());
        params
    }

    fn collect_leaves(&self, out: &mut Vec<Expr>, keep: &dyn Fn(&Expr) -> bool) {
        let mut stack = vec![self];
        while let Some(e) = stack.pop() {
            if keep(e) {
                out.push(e.clone());
            }
            stack.extend(e.args());
        }
        out.sort_by_key(|e| e.leaf_id());
        out.dedup_by_key(|e| e.leaf_id());
    }

    /// Structural identity of the expression graph.
    ///
    /// Two expressions share a key exactly when they apply the same atoms,
    /// with the same attributes, to the same leaves (leaves compare by id).
    pub fn structural_key(&self) -> String {
        let mut out = String::new();
        self.write_key(&mut out);
        out
    }

    fn write_key(&self, out: &mut String) {
        match self {
            Expr::Variable(v) => {
                let _ = write!(out, "v{}", v.id.raw());
                return;
            }
            Expr::Parameter(p) => {
                let _ = write!(out, "p{}", p.id.raw());
                return;
            }
            Expr::Constant(c) => {
                let _ = write!(out, "c{}", c.id.raw());
                return;
            }
            Expr::Sum(_, axis) | Expr::Cumsum(_, axis) => {
                let _ = write!(out, "{}[{:?}]", self.op_name(), axis);
            }
            Expr::Reshape(_, shape) => {
                let _ = write!(out, "{}[{:?}]", self.op_name(), shape.dims());
            }
            Expr::Index(_, spec) => {
                let _ = write!(out, "{}[{:?}]", self.op_name(), spec.ranges);
            }
            Expr::Power(_, p) => {
                let _ = write!(out, "{}[{:x}]", self.op_name(), p.to_bits());
            }
            _ => out.push_str(self.op_name()),
        }
        out.push('(');
        for (i, arg) in self.args().into_iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            arg.write_key(out);
        }
        out.push(')');
    }

    /// Short operator name used in keys and display.
    pub fn op_name(&self) -> &'static str {
        match self {
            Expr::Variable(_) => "variable",
            Expr::Parameter(_) => "parameter",
            Expr::Constant(_) => "constant",
            Expr::Add(_, _) => "add",
            Expr::Neg(_) => "neg",
            Expr::Mul(_, _) => "mul",
            Expr::Sum(_, _) => "sum",
            Expr::Reshape(_, _) => "reshape",
            Expr::Index(_, _) => "index",
            Expr::VStack(_) => "vstack",
            Expr::HStack(_) => "hstack",
            Expr::Transpose(_) => "transpose",
            Expr::Trace(_) => "trace",
            Expr::MatMul(_, _) => "matmul",
            Expr::Norm1(_) => "norm1",
            Expr::Norm2(_) => "norm2",
            Expr::NormInf(_) => "norm_inf",
            Expr::Abs(_) => "abs",
            Expr::Pos(_) => "pos",
            Expr::NegPart(_) => "neg_part",
            Expr::Maximum(_) => "maximum",
            Expr::Minimum(_) => "minimum",
            Expr::QuadForm(_, _) => "quad_form",
            Expr::SumSquares(_) => "sum_squares",
            Expr::QuadOverLin(_, _) => "quad_over_lin",
            Expr::Exp(_) => "exp",
            Expr::Log(_) => "log",
            Expr::Entropy(_) => "entropy",
            Expr::Power(_, _) => "power",
            Expr::Cumsum(_, _) => "cumsum",
            Expr::Diag(_) => "diag",
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Variable(_) | Expr::Parameter(_) => {
                write!(f, "{}", self.name().unwrap_or_default())
            }
            Expr::Constant(c) => match c.value.as_scalar() {
                Some(v) => write!(f, "{}", v),
                None => write!(f, "const{}", c.shape()),
            },
            Expr::Add(a, b) => match b.as_ref() {
                Expr::Neg(inner) => write!(f, "{} - {}", a, inner),
                _ => write!(f, "{} + {}", a, b),
            },
            Expr::Neg(a) => write!(f, "-({})", a),
            Expr::Mul(a, b) => write!(f, "({}) * ({})", a, b),
            Expr::MatMul(a, b) => write!(f, "({}) @ ({})", a, b),
            Expr::Transpose(a) => write!(f, "({})^T", a),
            Expr::Power(a, p) => write!(f, "({})^{}", a, p),
            Expr::Reshape(a, shape) => write!(f, "reshape({}, {})", a, shape),
            Expr::Index(a, spec) => write!(f, "{}{:?}", a, spec.ranges),
            _ => {
                write!(f, "{}(", self.op_name())?;
                for (i, arg) in self.args().into_iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}
