//! Convex-Concave Procedure Example
//!
//! Minimizes the difference of convex functions
//!
//! f(x) = ||x - a||_2^2 - 2 ||x||_2
//!
//! by repeatedly replacing the concave part -2 ||x||_2 with its tangent at
//! the current point. Each convex surrogate is minimized in closed form:
//! x = a + g / 2, where g is the gradient held by the template.

use dccp::prelude::*;
use nalgebra::DMatrix;

fn main() {
    println!("=== Convex-Concave Procedure ===\n");

    let a = [1.0, -2.0, 2.0];
    let x = named_variable("x", 3);
    x.set_value(vec![1.0, 1.0, 1.0]).expect("valid start point");

    let concave_part = 2.0 * norm2(&x);
    let objective = sum_squares(&(&x - &constant_vec(a.to_vec()))) - &concave_part;

    assert!(concave_part.is_convex() && !objective.is_convex());
    println!("objective curvature: {:?}", objective.curvature());

    // Template of the part being linearized, filled at every iterate
    let template = linearize_para(&concave_part).expect("scalar expression");
    let term = &template.linear_dictionary[&x.variable_id().expect("x is a variable")];

    let mut cache = GradCache::new();
    for k in 0..8 {
        let tangent = linearize(&concave_part, None, Some(&mut cache))
            .expect("value is defined")
            .expect("gradient is defined away from the origin");
        if !template.refresh().expect("value is defined") {
            println!("gradient undefined at iterate {}", k);
            break;
        }

        let g = term.gradients[0]
            .dense_value()
            .expect("gradient placeholder was refreshed");
        let next = DMatrix::from_iterator(3, 1, a.iter().zip(g.iter()).map(|(a, g)| a + g / 2.0));

        println!(
            "iter {}: f(x) = {:.6}, tangent = {:.6}",
            k,
            objective.value().and_then(|v| v.as_scalar()).unwrap_or(f64::NAN),
            tangent.value().and_then(|v| v.as_scalar()).unwrap_or(f64::NAN),
        );
        x.set_value(next).expect("iterate has the variable's shape");
    }

    let xv = x.dense_value().expect("x has a value");
    println!("\nFinal point: [{:.6}, {:.6}, {:.6}]", xv[0], xv[1], xv[2]);
    println!("Cached placeholders: {}", cache.len());
}
