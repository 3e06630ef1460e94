//! Gradients of expressions with respect to their variables.
//!
//! The gradient of an expression `f` with respect to a variable `x` is the
//! transposed Jacobian: a matrix of shape `(x.size, f.size)` whose entry
//! `(k, j)` is the derivative of element `j` of `vec(f)` with respect to
//! element `k` of `vec(x)` (both vectorized column-major).
//!
//! Gradients are accumulated bottom-up with the chain rule. Each atom supplies
//! its local derivative; an atom that is not differentiable at the current
//! point reports `None`, which marks every variable flowing through it as
//! having an undefined gradient.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use nalgebra::{DMatrix, DVector};

use super::value::broadcast_to;
use crate::expr::{Expr, ExprId, Shape};

/// Gradient of an expression: one entry per variable, `None` where the
/// gradient is undefined at the current point.
pub type Grad = BTreeMap<ExprId, Option<DMatrix<f64>>>;

impl Expr {
    /// Gradient with respect to every variable at the current point.
    ///
    /// Returns `None` when the value itself cannot be computed.
    pub fn grad(&self) -> Option<Grad> {
        self.value_and_grad().map(|(_, grad)| grad)
    }

    /// Dense value together with the gradient map.
    pub fn value_and_grad(&self) -> Option<(DMatrix<f64>, Grad)> {
        match self {
            Expr::Variable(v) => {
                let value = self.leaf_value()?.to_dense();
                let n = value.len();
                let mut grad = Grad::new();
                grad.insert(v.id, Some(DMatrix::identity(n, n)));
                Some((value, grad))
            }
            Expr::Parameter(_) => Some((self.leaf_value()?.to_dense(), Grad::new())),
            Expr::Constant(c) => Some((c.value.to_dense(), Grad::new())),
            _ => {
                let children = self
                    .args()
                    .into_iter()
                    .map(Expr::value_and_grad)
                    .collect::<Option<Vec<_>>>()?;
                let (values, child_grads): (Vec<_>, Vec<_>) = children.into_iter().unzip();
                let shapes = self.arg_shapes();
                let out = self.shape();
                let value = self.apply(&values, &shapes, &out)?;

                let mut grad = Grad::new();
                for (i, child_grad) in child_grads.into_iter().enumerate() {
                    if child_grad.is_empty() {
                        continue;
                    }
                    let local = self.local_derivative(i, &values, &shapes, &out);
                    for (id, g) in child_grad {
                        let contribution = match (g, &local) {
                            (Some(g), Some(d)) => Some(g * d),
                            _ => None,
                        };
                        accumulate(&mut grad, id, contribution);
                    }
                }
                Some((value, grad))
            }
        }
    }

    /// Derivative of this node with respect to argument `i`, shaped
    /// `(arg.size, out.size)`.
    fn local_derivative(
        &self,
        i: usize,
        values: &[DMatrix<f64>],
        shapes: &[Shape],
        out: &Shape,
    ) -> Option<DMatrix<f64>> {
        let x = &values[i];
        match self {
            Expr::Variable(_) | Expr::Parameter(_) | Expr::Constant(_) => None,

            Expr::Add(_, _)
            | Expr::Neg(_)
            | Expr::Sum(_, _)
            | Expr::Reshape(_, _)
            | Expr::Index(_, _)
            | Expr::VStack(_)
            | Expr::HStack(_)
            | Expr::Transpose(_)
            | Expr::Trace(_)
            | Expr::Cumsum(_, _)
            | Expr::Diag(_) => self.unit_jacobian(i, values, shapes, out, Linearity::Linear),
            Expr::Mul(_, _) | Expr::MatMul(_, _) => {
                self.unit_jacobian(i, values, shapes, out, Linearity::Multilinear)
            }

            Expr::Norm1(_) => Some(column(x.iter().map(|v| signum0(*v)))),
            Expr::Norm2(_) => {
                let norm = x.norm();
                if norm == 0.0 {
                    None
                } else {
                    Some(column(x.iter().map(|v| v / norm)))
                }
            }
            Expr::NormInf(_) => {
                let mut d = DMatrix::zeros(x.len(), 1);
                if let Some((k, v)) = x
                    .iter()
                    .enumerate()
                    .fold(None, |best: Option<(usize, f64)>, (k, v)| match best {
                        Some((_, b)) if b.abs() >= v.abs() => best,
                        _ => Some((k, *v)),
                    })
                {
                    d[(k, 0)] = signum0(v);
                }
                Some(d)
            }
            Expr::Abs(_) => Some(diagonal(x.iter().map(|v| signum0(*v)))),
            Expr::Pos(_) => Some(diagonal(
                x.iter().map(|v| if *v > 0.0 { 1.0 } else { 0.0 }),
            )),
            Expr::NegPart(_) => Some(diagonal(
                x.iter().map(|v| if *v < 0.0 { -1.0 } else { 0.0 }),
            )),
            Expr::Maximum(_) => selection(i, values, shapes, out, |a, b| a > b),
            Expr::Minimum(_) => selection(i, values, shapes, out, |a, b| a < b),
            Expr::QuadForm(_, _) => {
                let xv = DVector::from_column_slice(values[0].as_slice());
                let p = &values[1];
                if i == 0 {
                    let d = (p + p.transpose()) * &xv;
                    Some(column(d.iter().copied()))
                } else {
                    let outer = &xv * xv.transpose();
                    Some(column(outer.iter().copied()))
                }
            }
            Expr::SumSquares(_) => Some(column(x.iter().map(|v| 2.0 * v))),
            Expr::QuadOverLin(_, _) => {
                let y = values[1][(0, 0)];
                if y <= 0.0 {
                    return None;
                }
                if i == 0 {
                    Some(column(values[0].iter().map(|v| 2.0 * v / y)))
                } else {
                    let ss = values[0].norm_squared();
                    Some(DMatrix::from_element(1, 1, -ss / (y * y)))
                }
            }
            Expr::Exp(_) => Some(diagonal(x.iter().map(|v| v.exp()))),
            Expr::Log(_) => {
                if x.iter().any(|v| *v <= 0.0) {
                    None
                } else {
                    Some(diagonal(x.iter().map(|v| 1.0 / v)))
                }
            }
            Expr::Entropy(_) => {
                if x.iter().any(|v| *v <= 0.0) {
                    None
                } else {
                    Some(diagonal(x.iter().map(|v| -v.ln() - 1.0)))
                }
            }
            Expr::Power(_, p) => power_derivative(x, *p),
        }
    }

    /// Local derivative of an affine or multilinear node, obtained by applying
    /// the node to unit perturbations of argument `i`.
    fn unit_jacobian(
        &self,
        i: usize,
        values: &[DMatrix<f64>],
        shapes: &[Shape],
        out: &Shape,
        mode: Linearity,
    ) -> Option<DMatrix<f64>> {
        let (r, c) = values[i].shape();
        let n = r * c;
        let mut args: Vec<DMatrix<f64>> = values
            .iter()
            .map(|v| match mode {
                Linearity::Linear => DMatrix::zeros(v.nrows(), v.ncols()),
                Linearity::Multilinear => v.clone(),
            })
            .collect();
        let mut d = DMatrix::zeros(n, out.size());
        for k in 0..n {
            let mut unit = DMatrix::zeros(r, c);
            unit[k] = 1.0;
            args[i] = unit;
            let image = self.apply(&args, shapes, out)?;
            for (j, v) in image.iter().enumerate() {
                d[(k, j)] = *v;
            }
        }
        Some(d)
    }
}

#[derive(Debug, Clone, Copy)]
enum Linearity {
    /// Other arguments are set to zero (the node is affine in each argument).
    Linear,
    /// Other arguments keep their values (the node is linear in each argument).
    Multilinear,
}

fn accumulate(grad: &mut Grad, id: ExprId, contribution: Option<DMatrix<f64>>) {
    match grad.entry(id) {
        Entry::Vacant(slot) => {
            slot.insert(contribution);
        }
        Entry::Occupied(mut slot) => {
            let merged = match (slot.get_mut().take(), contribution) {
                (Some(a), Some(b)) => Some(a + b),
                _ => None,
            };
            *slot.get_mut() = merged;
        }
    }
}

fn signum0(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

fn column(values: impl Iterator<Item = f64>) -> DMatrix<f64> {
    let v: Vec<f64> = values.collect();
    DMatrix::from_vec(v.len(), 1, v)
}

fn diagonal(values: impl Iterator<Item = f64>) -> DMatrix<f64> {
    let v: Vec<f64> = values.collect();
    DMatrix::from_diagonal(&DVector::from_vec(v))
}

fn power_derivative(x: &DMatrix<f64>, p: f64) -> Option<DMatrix<f64>> {
    if p == 0.0 {
        return Some(DMatrix::zeros(x.len(), x.len()));
    }
    let integral = p >= 1.0 && p.fract() == 0.0;
    if !integral {
        let outside = if p < 1.0 {
            x.iter().any(|v| *v <= 0.0)
        } else {
            x.iter().any(|v| *v < 0.0)
        };
        if outside {
            return None;
        }
    }
    Some(diagonal(x.iter().map(|v| p * v.powf(p - 1.0))))
}

/// Derivative of an elementwise max/min with respect to argument `i`:
/// each output element depends on the first argument that attains it.
fn selection(
    i: usize,
    values: &[DMatrix<f64>],
    shapes: &[Shape],
    out: &Shape,
    wins: impl Fn(f64, f64) -> bool,
) -> Option<DMatrix<f64>> {
    let spread = values
        .iter()
        .zip(shapes)
        .map(|(v, s)| broadcast_to(v, s, out))
        .collect::<Option<Vec<_>>>()?;
    let (r, c) = values[i].shape();
    let positions = DMatrix::from_iterator(r, c, (0..r * c).map(|k| k as f64));
    let source = broadcast_to(&positions, &shapes[i], out)?;

    let mut d = DMatrix::zeros(r * c, out.size());
    for j in 0..out.size() {
        let winner = (1..spread.len()).fold(0, |best, a| {
            if wins(spread[a][j], spread[best][j]) {
                a
            } else {
                best
            }
        });
        if winner == i {
            d[(source[j] as usize, j)] += 1.0;
        }
    }
    Some(d)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::atoms::*;
    use crate::expr::{constant, constant_matrix, variable};
    use approx::assert_relative_eq;

    fn grad_of(e: &Expr, x: &Expr) -> Option<DMatrix<f64>> {
        let id = x.variable_id().unwrap();
        e.grad().unwrap().get(&id).cloned().flatten()
    }

    #[test]
    fn test_square_gradient() {
        let x = variable(());
        x.set_value(3.0).unwrap();
        let g = grad_of(&power(&x, 2.0), &x).unwrap();
        assert_eq!(g.shape(), (1, 1));
        assert_relative_eq!(g[(0, 0)], 6.0);
    }

    #[test]
    fn test_variable_gradient_is_identity() {
        let x = variable(3);
        x.set_value(vec![1.0, 2.0, 3.0]).unwrap();
        assert_eq!(grad_of(&x, &x).unwrap(), DMatrix::identity(3, 3));
    }

    #[test]
    fn test_constant_has_no_entries() {
        let c = constant(2.0);
        assert!(c.grad().unwrap().is_empty());
        let p = crate::expr::parameter(());
        assert!(p.grad().is_none());
    }

    #[test]
    fn test_gradient_shape_is_var_by_expr() {
        let x = variable(3);
        x.set_value(vec![1.0, -2.0, 0.5]).unwrap();
        let a = constant_matrix(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], 2, 3);
        let e = exp(&matmul(&a, &x));
        let g = grad_of(&e, &x).unwrap();
        assert_eq!(g.shape(), (3, 2));

        // d exp(a_j . x) / dx_k = a_jk exp(a_j . x)
        let ax = matmul(&a, &x).dense_value().unwrap();
        let am = a.dense_value().unwrap();
        for j in 0..2 {
            for k in 0..3 {
                assert_relative_eq!(g[(k, j)], am[(j, k)] * ax[j].exp(), epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_product_rule() {
        let x = variable(2);
        x.set_value(vec![2.0, -1.0]).unwrap();
        let g = grad_of(&sum(&(&x * &x)), &x).unwrap();
        assert_eq!(g.as_slice(), &[4.0, -2.0]);
    }

    #[test]
    fn test_matrix_variable_gradient() {
        let x = variable((2, 2));
        x.set_value(DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 3.0, 4.0]))
            .unwrap();
        let g = grad_of(&sum_squares(&x), &x).unwrap();
        assert_eq!(g.shape(), (4, 1));
        // column-major vectorization of 2x
        assert_eq!(g.as_slice(), &[2.0, 6.0, 4.0, 8.0]);

        let t = grad_of(&trace(&x), &x).unwrap();
        assert_eq!(t.as_slice(), &[1.0, 0.0, 0.0, 1.0]);
    }

    #[test]
    fn test_nondifferentiable_points() {
        let x = variable(2);
        x.set_value(vec![0.0, 0.0]).unwrap();
        assert!(grad_of(&norm2(&x), &x).is_none());
        assert!(grad_of(&sqrt(&x), &x).is_none());
        assert!(grad_of(&entropy(&x), &x).is_none());
        // abs uses the zero subgradient
        assert_eq!(grad_of(&norm1(&x), &x).unwrap().as_slice(), &[0.0, 0.0]);
    }

    #[test]
    fn test_undefined_gradient_is_per_variable() {
        let x = variable(());
        let y = variable(());
        x.set_value(0.0).unwrap();
        y.set_value(2.0).unwrap();
        let e = &sqrt(&x) + &square(&y);
        let grad = e.grad().unwrap();
        assert!(grad[&x.variable_id().unwrap()].is_none());
        assert_relative_eq!(grad[&y.variable_id().unwrap()].as_ref().unwrap()[(0, 0)], 4.0);
    }

    #[test]
    fn test_maximum_selects_first_winner() {
        let x = variable(3);
        let y = variable(3);
        x.set_value(vec![1.0, 5.0, 2.0]).unwrap();
        y.set_value(vec![3.0, 0.0, 2.0]).unwrap();
        let m = maximum(vec![x.clone(), y.clone()]);
        let gx = grad_of(&m, &x).unwrap();
        let gy = grad_of(&m, &y).unwrap();
        assert_eq!(gx, DMatrix::from_diagonal(&DVector::from_vec(vec![0.0, 1.0, 1.0])));
        assert_eq!(gy, DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 0.0, 0.0])));
    }

    #[test]
    fn test_maximum_with_broadcast_scalar() {
        let x = variable(());
        x.set_value(1.0).unwrap();
        let c = constant_vec_of(&[0.0, 2.0, 0.5]);
        let m = maximum(vec![x.clone(), c]);
        let g = grad_of(&m, &x).unwrap();
        assert_eq!(g.as_slice(), &[1.0, 0.0, 1.0]);
    }

    fn constant_vec_of(v: &[f64]) -> Expr {
        crate::expr::constant_vec(v.to_vec())
    }

    #[test]
    fn test_quad_over_lin_gradient() {
        let x = variable(2);
        let y = variable(());
        x.set_value(vec![1.0, 2.0]).unwrap();
        y.set_value(2.0).unwrap();
        let e = quad_over_lin(&x, &y);
        assert_eq!(grad_of(&e, &x).unwrap().as_slice(), &[1.0, 2.0]);
        assert_relative_eq!(grad_of(&e, &y).unwrap()[(0, 0)], -5.0 / 4.0);
    }
}
