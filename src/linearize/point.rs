//! Linearization at the current point.

use std::collections::HashMap;

use nalgebra::DMatrix;
use tracing::{debug, trace};

use super::cache::{CacheKey, GradCache};
use super::{conform_term, LinearizeSettings, MatrixTermMode};
use crate::atoms::{matmul, transpose, vec};
use crate::error::{CvxError, Result};
use crate::expr::{named_parameter, Array, Expr, Shape};

/// Caller-owned reference points, keyed by variable name.
pub type PointMap = HashMap<String, Expr>;

/// Tangent-plane approximation of `expr` at the current values of its
/// variables, with default settings.
///
/// See [`linearize_with`].
pub fn linearize(
    expr: &Expr,
    vars: Option<&mut PointMap>,
    grads: Option<&mut GradCache>,
) -> Result<Option<Expr>> {
    linearize_with(expr, vars, grads, &LinearizeSettings::default())
}

/// Tangent-plane approximation of `expr` at the current values of its
/// variables.
///
/// Affine expressions are returned unchanged. Otherwise the result is
///
/// ```text
/// f(p) + sum over variables x of  grad_x f(p)^T (x - p_x)
/// ```
///
/// where `f(p)` and the gradients are placeholders cached in `grads` (a
/// temporary cache is used when `grads` is `None`). When `vars` is given,
/// `vars[name]` receives the current value of each variable and serves as
/// its reference point `p_x`.
///
/// Returns `Ok(None)` when a gradient is undefined at the current point, and
/// [`CvxError::UndefinedValue`] when the value of a non-affine expression
/// is undefined. An entry of `vars` whose shape differs from its variable is
/// a [`CvxError::ShapeMismatch`]. Neither `vars` nor `grads` is touched
/// unless the whole tangent can be built.
pub fn linearize_with(
    expr: &Expr,
    mut vars: Option<&mut PointMap>,
    grads: Option<&mut GradCache>,
    settings: &LinearizeSettings,
) -> Result<Option<Expr>> {
    if expr.is_affine() {
        return Ok(Some(expr.clone()));
    }

    let undefined = || CvxError::UndefinedValue(expr.to_string());
    let value = expr.value().ok_or_else(undefined)?;
    let grad = expr.grad().ok_or_else(undefined)?;

    let mut terms: Vec<(Expr, Array, DMatrix<f64>)> = Vec::new();
    for var in expr.variables() {
        let g = var
            .variable_id()
            .and_then(|id| grad.get(&id).cloned().flatten());
        match g {
            Some(g) => {
                let point = var.leaf_value().ok_or_else(undefined)?;
                terms.push((var, point, g));
            }
            None => {
                debug!(variable = %var, "gradient undefined at the current point");
                return Ok(None);
            }
        }
    }
    if let Some(map) = vars.as_deref() {
        for (var, _, _) in &terms {
            let Some(existing) = var.name().and_then(|name| map.get(&name)) else {
                continue;
            };
            if existing.shape() != var.shape() {
                return Err(CvxError::ShapeMismatch {
                    expected: var.shape().to_string(),
                    got: existing.shape().to_string(),
                });
            }
        }
    }

    let mut scratch = GradCache::new();
    let cache: &mut GradCache = match grads {
        Some(cache) => cache,
        None => &mut scratch,
    };

    let key = expr.structural_key();
    let shape = expr.shape();
    debug!(expr = %expr, curvature = ?expr.curvature(), "linearizing at the current point");
    let mut tangent = cache.upsert(CacheKey::value(&key), shape.clone(), value)?;

    for (var, point, g) in terms {
        let Some(id) = var.variable_id() else {
            continue;
        };
        let var_shape = var.shape();

        let reference = match vars.as_deref_mut() {
            Some(map) => {
                let name = var.name().unwrap_or_default();
                let slot = map
                    .entry(name.clone())
                    .or_insert_with(|| named_parameter(name, var_shape.clone()));
                slot.set_value(point)?;
                slot.clone()
            }
            None => cache.upsert(CacheKey::point(&key, id), var_shape.clone(), point)?,
        };

        let g = cache.upsert(
            CacheKey::gradient(&key, id),
            Shape::matrix(var_shape.size(), shape.size()),
            Array::Dense(g),
        )?;
        let delta = &var - &reference;

        if var_shape.is_matrix() {
            let term = conform_term(matmul(&transpose(&g), &vec(&delta)), &shape);
            trace!(variable = %var, mode = ?settings.matrix_term, "matrix gradient term");
            tangent = &tangent + &term;
            if settings.matrix_term == MatrixTermMode::Doubled {
                tangent = &tangent + &term;
            }
        } else {
            let term = conform_term(matmul(&transpose(&g), &delta), &shape);
            trace!(variable = %var, "gradient term");
            tangent = &tangent + &term;
        }
    }

    Ok(Some(tangent))
}
