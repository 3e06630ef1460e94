//! Gradients checked against central finite differences.
//!
//! Points are drawn at random with proptest; each atom is evaluated on a
//! range where it is differentiable.

use dccp::prelude::*;
use nalgebra::DMatrix;
use proptest::prelude::*;

const H: f64 = 1e-6;
const TOL: f64 = 1e-5;

/// Numeric gradient of `e` with respect to `x`, shaped `(x.size, e.size)`.
fn finite_difference(e: &Expr, x: &Expr, point: &DMatrix<f64>) -> DMatrix<f64> {
    let n = point.len();
    let m = e.shape().size();
    let mut out = DMatrix::zeros(n, m);
    for k in 0..n {
        let mut up = point.clone();
        up[k] += H;
        x.set_value(up).unwrap();
        let f_up = e.dense_value().unwrap();

        let mut down = point.clone();
        down[k] -= H;
        x.set_value(down).unwrap();
        let f_down = e.dense_value().unwrap();

        for j in 0..m {
            out[(k, j)] = (f_up[j] - f_down[j]) / (2.0 * H);
        }
    }
    x.set_value(point.clone()).unwrap();
    out
}

fn check(e: &Expr, x: &Expr, point: &DMatrix<f64>) -> std::result::Result<(), TestCaseError> {
    x.set_value(point.clone()).unwrap();
    let grad = e.grad().expect("value is defined");
    let analytic = grad[&x.variable_id().unwrap()]
        .clone()
        .expect("gradient is defined");
    let numeric = finite_difference(e, x, point);
    prop_assert_eq!(analytic.shape(), numeric.shape());
    for (a, b) in analytic.iter().zip(numeric.iter()) {
        prop_assert!(
            (a - b).abs() <= TOL * (1.0 + b.abs()),
            "{}: analytic {} vs numeric {}",
            e,
            a,
            b
        );
    }
    Ok(())
}

fn point3(values: [f64; 3]) -> DMatrix<f64> {
    DMatrix::from_column_slice(3, 1, &values)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn grad_elementwise_atoms(a in -3.0f64..3.0, b in -3.0f64..3.0, c in -3.0f64..3.0) {
        let x = variable(3);
        let p = point3([a, b, c]);
        for e in [
            exp(&x),
            abs(&x),
            pos(&x),
            neg_part(&x),
            power(&x, 3.0),
            &x * &x,
            cumsum(&x, None),
            diag(&x),
        ] {
            check(&e, &x, &p)?;
        }
    }

    #[test]
    fn grad_reductions(a in -3.0f64..3.0, b in -3.0f64..3.0, c in -3.0f64..3.0) {
        let x = variable(3);
        let p = point3([a, b, c]);
        prop_assume!(p.norm() > 1e-3);
        let q = constant_matrix(vec![2.0, 0.5, 0.0, 0.5, 1.0, 0.0, 0.0, 0.0, 3.0], 3, 3);
        for e in [
            norm1(&x),
            norm2(&x),
            norm_inf(&x),
            sum_squares(&x),
            quad_form(&x, &q),
            sum(&exp(&x)),
            log(&sum(&exp(&x))),
        ] {
            check(&e, &x, &p)?;
        }
    }

    #[test]
    fn grad_maximum_minimum(a in -3.0f64..3.0, b in -3.0f64..3.0, c in -3.0f64..3.0) {
        let x = variable(3);
        let p = point3([a, b, c]);
        let k = constant_vec(vec![0.3, -0.7, 1.1]);
        prop_assume!(p.iter().zip([0.3, -0.7, 1.1]).all(|(v, w)| (v - w).abs() > 1e-3));
        check(&maximum(vec![x.clone(), k.clone()]), &x, &p)?;
        check(&minimum(vec![x.clone(), k]), &x, &p)?;
        check(&maximum(vec![x.clone(), constant(0.0)]), &x, &p)?;
    }

    #[test]
    fn grad_positive_domain_atoms(a in 0.2f64..4.0, b in 0.2f64..4.0, c in 0.2f64..4.0) {
        let x = variable(3);
        let p = point3([a, b, c]);
        for e in [
            log(&x),
            entropy(&x),
            sqrt(&x),
            power(&x, 1.5),
            power(&x, -1.0),
            quad_over_lin(&x, &sum(&x)),
        ] {
            check(&e, &x, &p)?;
        }
    }

    #[test]
    fn grad_affine_compositions(a in -3.0f64..3.0, b in -3.0f64..3.0, c in -3.0f64..3.0) {
        let x = variable(3);
        let p = point3([a, b, c]);
        let m = constant_matrix(vec![1.0, -2.0, 0.5, 3.0, 0.0, 1.0], 2, 3);
        for e in [
            exp(&matmul(&m, &x)),
            sum_squares(&(&matmul(&m, &x) - &constant_vec(vec![1.0, 2.0]))),
            exp(&reshape(&vstack(vec![x.clone(), x.clone()]), (2, 3))),
            exp(&transpose(&x)),
            &x * 2.0 - &exp(&index_of(&x, 1)),
        ] {
            check(&e, &x, &p)?;
        }
    }

    #[test]
    fn grad_matrix_variable(v in prop::collection::vec(-2.0f64..2.0, 6)) {
        let x = variable((2, 3));
        let p = DMatrix::from_column_slice(2, 3, &v);
        for e in [
            exp(&x),
            sum_squares(&x),
            matmul(&transpose(&x), &x),
            sum_axis(&exp(&x), 0),
            exp(&hstack(vec![x.clone(), x.clone()])),
        ] {
            check(&e, &x, &p)?;
        }
    }
}

fn index_of(x: &Expr, i: usize) -> Expr {
    dccp::atoms::index(x, i)
}

#[test]
fn grad_of_two_variables() {
    let x = variable(2);
    let y = variable(());
    x.set_value(vec![1.0, 3.0]).unwrap();
    y.set_value(2.0).unwrap();
    let e = quad_over_lin(&x, &y);
    let grad = e.grad().unwrap();
    assert_eq!(grad.len(), 2);

    let gx = grad[&x.variable_id().unwrap()].clone().unwrap();
    let gy = grad[&y.variable_id().unwrap()].clone().unwrap();
    assert!((gx[0] - 1.0).abs() < TOL);
    assert!((gx[1] - 3.0).abs() < TOL);
    assert!((gy[0] + 2.5).abs() < TOL);
}

#[test]
fn grad_undefined_value() {
    let x = variable(());
    assert!(exp(&x).grad().is_none());
    x.set_value(-1.0).unwrap();
    assert!(log(&x).grad().is_none());
}
