//! Numeric evaluation of expressions at the current leaf values.
//!
//! Every value is held as a dense column-major matrix with the storage
//! dimensions of the expression's shape (`n x 1` for a vector, `1 x 1` for a
//! scalar). Broadcasting follows NumPy, where a vector acts as a row.

use nalgebra::{DMatrix, DVector};

use crate::expr::{Array, Expr, Shape};

impl Expr {
    /// Numeric value at the current variable and parameter values.
    ///
    /// Returns `None` when a leaf has no value, when argument shapes are
    /// incompatible, or when the result is not finite (for example `log`
    /// of a non-positive number).
    pub fn value(&self) -> Option<Array> {
        let shape = self.shape();
        self.dense_value().map(|m| Array::from_dense(m, &shape))
    }

    /// Value as a dense matrix with the expression's storage dimensions.
    pub fn dense_value(&self) -> Option<DMatrix<f64>> {
        match self {
            Expr::Variable(_) | Expr::Parameter(_) => self.leaf_value().map(|v| v.to_dense()),
            Expr::Constant(c) => Some(c.value.to_dense()),
            _ => {
                let args = self
                    .args()
                    .into_iter()
                    .map(Expr::dense_value)
                    .collect::<Option<Vec<_>>>()?;
                let shapes = self.arg_shapes();
                self.apply(&args, &shapes, &self.shape())
            }
        }
    }

    pub(crate) fn arg_shapes(&self) -> Vec<Shape> {
        self.args().into_iter().map(Expr::shape).collect()
    }

    /// Apply this node's operation to argument values given in `args()` order.
    pub(crate) fn apply(
        &self,
        args: &[DMatrix<f64>],
        shapes: &[Shape],
        out: &Shape,
    ) -> Option<DMatrix<f64>> {
        let raw = apply_op(self, args, shapes, out)?;
        let value = conform(raw, out)?;
        if value.iter().all(|v| v.is_finite()) {
            Some(value)
        } else {
            None
        }
    }
}

/// Reshape `m` (column-major) to the storage dimensions of `shape`.
pub(crate) fn conform(m: DMatrix<f64>, shape: &Shape) -> Option<DMatrix<f64>> {
    let (r, c) = shape.storage_dims();
    if m.nrows() == r && m.ncols() == c {
        Some(m)
    } else if m.len() == r * c {
        Some(DMatrix::from_column_slice(r, c, m.as_slice()))
    } else {
        None
    }
}

/// Dimensions NumPy sees for a shape: vectors are rows.
fn numpy_dims(shape: &Shape) -> (usize, usize) {
    match shape.ndim() {
        0 => (1, 1),
        1 => (1, shape.rows()),
        _ => (shape.rows(), shape.cols()),
    }
}

/// Broadcast a value of shape `from` to shape `to`.
pub(crate) fn broadcast_to(m: &DMatrix<f64>, from: &Shape, to: &Shape) -> Option<DMatrix<f64>> {
    let (fr, fc) = numpy_dims(from);
    let (tr, tc) = numpy_dims(to);
    let (sr, sc) = to.storage_dims();
    if (fr != tr && fr != 1) || (fc != tc && fc != 1) {
        // a vector and an (n, 1) column share storage
        return (m.nrows() == sr && m.ncols() == sc).then(|| m.clone());
    }
    if m.len() != fr * fc {
        return None;
    }
    Some(DMatrix::from_fn(sr, sc, |r, c| {
        let (i, j) = if to.ndim() == 1 { (0, r) } else { (r, c) };
        let si = if fr == 1 { 0 } else { i };
        let sj = if fc == 1 { 0 } else { j };
        if from.ndim() == 1 {
            m[(sj, 0)]
        } else {
            m[(si, sj)]
        }
    }))
}

fn zip_broadcast(
    args: &[DMatrix<f64>],
    shapes: &[Shape],
    out: &Shape,
    f: impl Fn(f64, f64) -> f64,
) -> Option<DMatrix<f64>> {
    let mut iter = args.iter().zip(shapes);
    let (first, first_shape) = iter.next()?;
    let mut acc = broadcast_to(first, first_shape, out)?;
    for (arg, shape) in iter {
        let b = broadcast_to(arg, shape, out)?;
        acc.zip_apply(&b, |a, b| *a = f(*a, b));
    }
    Some(acc)
}

fn concat(args: &[DMatrix<f64>], vertical: bool) -> Option<DMatrix<f64>> {
    let first = args.first()?;
    if vertical {
        let cols = first.ncols();
        if args.iter().any(|a| a.ncols() != cols) {
            return None;
        }
        let rows = args.iter().map(|a| a.nrows()).sum();
        let mut out = DMatrix::zeros(rows, cols);
        let mut offset = 0;
        for a in args {
            out.rows_mut(offset, a.nrows()).copy_from(a);
            offset += a.nrows();
        }
        Some(out)
    } else {
        let rows = first.nrows();
        if args.iter().any(|a| a.nrows() != rows) {
            return None;
        }
        let cols = args.iter().map(|a| a.ncols()).sum();
        let mut out = DMatrix::zeros(rows, cols);
        let mut offset = 0;
        for a in args {
            out.columns_mut(offset, a.ncols()).copy_from(a);
            offset += a.ncols();
        }
        Some(out)
    }
}

fn scalar(v: f64) -> DMatrix<f64> {
    DMatrix::from_element(1, 1, v)
}

fn entr(v: f64) -> f64 {
    if v > 0.0 {
        -v * v.ln()
    } else if v == 0.0 {
        0.0
    } else {
        f64::NEG_INFINITY
    }
}

fn apply_op(
    expr: &Expr,
    args: &[DMatrix<f64>],
    shapes: &[Shape],
    out: &Shape,
) -> Option<DMatrix<f64>> {
    let a = args.first()?;
    let value = match expr {
        Expr::Variable(_) | Expr::Parameter(_) | Expr::Constant(_) => return None,

        Expr::Add(_, _) => zip_broadcast(args, shapes, out, |x, y| x + y)?,
        Expr::Mul(_, _) => zip_broadcast(args, shapes, out, |x, y| x * y)?,
        Expr::Maximum(_) => zip_broadcast(args, shapes, out, f64::max)?,
        Expr::Minimum(_) => zip_broadcast(args, shapes, out, f64::min)?,
        Expr::Neg(_) => -a,
        Expr::Sum(_, axis) => match axis {
            Some(axis) if shapes[0].ndim() > 1 => {
                if *axis == 0 {
                    DMatrix::from_fn(a.ncols(), 1, |j, _| a.column(j).sum())
                } else {
                    DMatrix::from_fn(a.nrows(), 1, |i, _| a.row(i).sum())
                }
            }
            _ => scalar(a.sum()),
        },
        Expr::Reshape(_, _) => a.clone(),
        Expr::Index(_, spec) => {
            let rows = spec.selected(0, a.nrows());
            let cols = if shapes[0].ndim() > 1 {
                spec.selected(1, a.ncols())
            } else {
                vec![0]
            };
            if rows.is_empty() || cols.is_empty() {
                return None;
            }
            DMatrix::from_fn(rows.len(), cols.len(), |i, j| a[(rows[i], cols[j])])
        }
        Expr::VStack(_) => concat(args, true)?,
        Expr::HStack(_) => concat(args, false)?,
        Expr::Transpose(_) => a.transpose(),
        Expr::Trace(_) => {
            if a.nrows() != a.ncols() {
                return None;
            }
            scalar(a.trace())
        }
        Expr::MatMul(_, _) => {
            let b = args.get(1)?;
            if shapes[0].is_scalar() {
                b * a[(0, 0)]
            } else if shapes[1].is_scalar() {
                a * b[(0, 0)]
            } else {
                // a vector on the left acts as a row
                let left = if shapes[0].ndim() == 1 {
                    a.transpose()
                } else {
                    a.clone()
                };
                if left.ncols() != b.nrows() {
                    return None;
                }
                left * b
            }
        }

        Expr::Norm1(_) => scalar(a.iter().map(|v| v.abs()).sum()),
        Expr::Norm2(_) => scalar(a.norm()),
        Expr::NormInf(_) => scalar(a.amax()),
        Expr::Abs(_) => a.map(f64::abs),
        Expr::Pos(_) => a.map(|v| v.max(0.0)),
        Expr::NegPart(_) => a.map(|v| (-v).max(0.0)),
        Expr::QuadForm(_, _) => {
            let p = args.get(1)?;
            let x = DVector::from_column_slice(a.as_slice());
            if p.nrows() != x.len() || p.ncols() != x.len() {
                return None;
            }
            scalar(x.dot(&(p * &x)))
        }
        Expr::SumSquares(_) => scalar(a.norm_squared()),
        Expr::QuadOverLin(_, _) => {
            let y = args.get(1)?;
            if y.len() != 1 {
                return None;
            }
            scalar(a.norm_squared() / y[(0, 0)])
        }
        Expr::Exp(_) => a.map(f64::exp),
        Expr::Log(_) => a.map(f64::ln),
        Expr::Entropy(_) => a.map(entr),
        Expr::Power(_, p) => a.map(|v| v.powf(*p)),
        Expr::Cumsum(_, axis) => {
            let mut acc = a.clone();
            if *axis == Some(1) {
                for j in 1..acc.ncols() {
                    let prev = acc.column(j - 1).clone_owned();
                    acc.column_mut(j).zip_apply(&prev, |v, p| *v += p);
                }
            } else {
                for i in 1..acc.nrows() {
                    let prev = acc.row(i - 1).clone_owned();
                    acc.row_mut(i).zip_apply(&prev, |v, p| *v += p);
                }
            }
            acc
        }
        Expr::Diag(_) => {
            if a.ncols() == 1 {
                DMatrix::from_diagonal(&DVector::from_column_slice(a.as_slice()))
            } else {
                let n = a.nrows().min(a.ncols());
                DMatrix::from_fn(n, 1, |i, _| a[(i, i)])
            }
        }
    };
    Some(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::*;
    use crate::expr::{constant, constant_matrix, constant_vec, parameter, variable};
    use approx::assert_relative_eq;

    fn scalar_of(e: &Expr) -> f64 {
        e.value().and_then(|v| v.as_scalar()).expect("scalar value")
    }

    #[test]
    fn test_value_requires_leaf_values() {
        let x = variable(3);
        let e = sum_squares(&x);
        assert!(e.value().is_none());
        x.set_value(vec![1.0, 2.0, 2.0]).unwrap();
        assert_relative_eq!(scalar_of(&e), 9.0);
        assert_relative_eq!(scalar_of(&norm2(&x)), 3.0);
    }

    #[test]
    fn test_scalar_power() {
        let x = variable(());
        x.set_value(3.0).unwrap();
        assert_relative_eq!(scalar_of(&power(&x, 2.0)), 9.0);
        assert_relative_eq!(scalar_of(&(&x - 1.0)), 2.0);
    }

    #[test]
    fn test_log_of_negative_is_undefined() {
        let x = variable(());
        x.set_value(-1.0).unwrap();
        assert!(log(&x).value().is_none());
        x.set_value(0.0).unwrap();
        assert!(log(&x).value().is_none());
        assert_relative_eq!(scalar_of(&entropy(&x)), 0.0);
    }

    #[test]
    fn test_broadcast_scalar_and_rows() {
        let x = variable(3);
        x.set_value(vec![1.0, 2.0, 3.0]).unwrap();
        let v = (&x + 1.0).dense_value().unwrap();
        assert_eq!(v.as_slice(), &[2.0, 3.0, 4.0]);

        // a vector broadcasts across the rows of a matrix
        let m = constant_matrix(vec![0.0; 6], 2, 3);
        let v = (&m + &x).dense_value().unwrap();
        assert_eq!(v.nrows(), 2);
        assert_eq!(v[(1, 2)], 3.0);

        // a stored column and a vector add elementwise
        let v = (&x + &constant_vec(vec![1.0, 1.0, 1.0])).dense_value().unwrap();
        assert_eq!(v.as_slice(), &[2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_variants() {
        let a = constant_matrix(vec![1.0, 0.0, 0.0, 2.0, 1.0, 1.0], 2, 3);
        let x = variable(3);
        x.set_value(vec![1.0, 2.0, 3.0]).unwrap();
        let ax = matmul(&a, &x).dense_value().unwrap();
        assert_eq!(ax.as_slice(), &[4.0, 7.0]);

        let xx = dot(&x, &x);
        assert_relative_eq!(scalar_of(&xx), 14.0);

        let g = parameter((3, 1));
        g.set_value(vec![1.0, 1.0, 1.0]).unwrap();
        let s = matmul(&transpose(&g), &x);
        assert_eq!(s.dense_value().unwrap().as_slice(), &[6.0]);
    }

    #[test]
    fn test_index_and_reshape() {
        let x = variable((2, 3));
        x.set_value(DMatrix::from_row_slice(2, 3, &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]))
            .unwrap();
        let c = column(&x, 1).dense_value().unwrap();
        assert_eq!(c.as_slice(), &[2.0, 5.0]);

        let v = vec(&x).dense_value().unwrap();
        assert_eq!(v.as_slice(), &[1.0, 4.0, 2.0, 5.0, 3.0, 6.0]);

        let back = reshape(&vec(&x), (2, 3)).dense_value().unwrap();
        assert_eq!(back, x.dense_value().unwrap());

        assert_relative_eq!(scalar_of(&index(&vec(&x), 3)), 5.0);
        assert_eq!(slice(&vec(&x), 1, 3).dense_value().unwrap().as_slice(), &[4.0, 2.0]);
    }

    #[test]
    fn test_sum_axes() {
        let x = constant_matrix(vec![1.0, 2.0, 3.0, 4.0], 2, 2);
        assert_eq!(sum_axis(&x, 0).dense_value().unwrap().as_slice(), &[3.0, 7.0]);
        assert_eq!(sum_axis(&x, 1).dense_value().unwrap().as_slice(), &[4.0, 6.0]);
        assert_relative_eq!(scalar_of(&trace(&x)), 5.0);
    }

    #[test]
    fn test_cumsum_and_diag() {
        let v = constant_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(cumsum(&v, None).dense_value().unwrap().as_slice(), &[1.0, 3.0, 6.0]);
        let d = diag(&v).dense_value().unwrap();
        assert_eq!(d[(2, 2)], 3.0);
        assert_eq!(d[(0, 2)], 0.0);
        let back = diag(&diag(&v)).dense_value().unwrap();
        assert_eq!(back.as_slice(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_stacks() {
        let a = constant_matrix(vec![1.0, 2.0], 1, 2);
        let b = constant_matrix(vec![3.0, 4.0], 1, 2);
        let v = vstack(vec![a.clone(), b.clone()]).dense_value().unwrap();
        assert_eq!(v[(1, 0)], 3.0);
        let h = hstack(vec![a, b]).dense_value().unwrap();
        assert_eq!(h.ncols(), 4);
        assert_eq!(h[(0, 2)], 3.0);
    }

    #[test]
    fn test_nonlinear_values() {
        let x = variable(3);
        x.set_value(vec![-1.0, 0.5, 2.0]).unwrap();
        assert_relative_eq!(scalar_of(&norm1(&x)), 3.5);
        assert_relative_eq!(scalar_of(&norm_inf(&x)), 2.0);
        assert_eq!(pos(&x).dense_value().unwrap().as_slice(), &[0.0, 0.5, 2.0]);
        assert_eq!(neg_part(&x).dense_value().unwrap().as_slice(), &[1.0, 0.0, 0.0]);
        let m = maximum(vec![x.clone(), constant(0.0)]).dense_value().unwrap();
        assert_eq!(m.as_slice(), &[0.0, 0.5, 2.0]);

        let y = variable(());
        y.set_value(2.0).unwrap();
        assert_relative_eq!(scalar_of(&quad_over_lin(&x, &y)), 5.25 / 2.0);
        y.set_value(0.0).unwrap();
        assert!(quad_over_lin(&x, &y).value().is_none());

        let q = quad_form(&x, &crate::expr::eye(3));
        assert_relative_eq!(scalar_of(&q), 5.25);
    }
}
