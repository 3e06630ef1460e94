//! Parameterized linearization templates.

use std::collections::BTreeMap;

use tracing::{debug, trace};

use super::conform_term;
use crate::atoms::{column, matmul, transpose};
use crate::constraints::Constraint;
use crate::error::{CvxError, Result};
use crate::expr::{parameter, Array, Expr, ExprId, Shape};

/// Placeholders attached to one variable of a template.
#[derive(Debug, Clone)]
pub struct VariableTerm {
    /// The variable itself.
    pub variable: Expr,
    /// Reference point, with the variable's shape.
    pub value: Expr,
    /// Gradient blocks of shape `(var.rows, expr.rows)`, one per column of
    /// the variable.
    pub gradients: Vec<Expr>,
}

/// Affine template of an expression:
///
/// ```text
/// zero_order + sum over variables x, columns d of  g_{x,d}^T (x[:, d] - value_x[:, d])
/// ```
///
/// Every coefficient is a placeholder without a value until
/// [`refresh`](ParameterizedLinearization::refresh) is called.
#[derive(Debug, Clone)]
pub struct ParameterizedLinearization {
    pub linear_expr: Expr,
    pub zero_order: Expr,
    pub linear_dictionary: BTreeMap<ExprId, VariableTerm>,
    pub domain: Vec<Constraint>,
    source: Expr,
}

/// Build the affine template of `expr`.
///
/// `expr` must be a scalar or a column (vector or `n x 1` matrix). No values
/// are assigned to the placeholders.
pub fn linearize_para(expr: &Expr) -> Result<ParameterizedLinearization> {
    let shape = expr.shape();
    if shape.cols() > 1 {
        return Err(CvxError::InvalidProblem(format!(
            "cannot build a linearization template for the matrix-valued expression {} of shape {}",
            expr, shape
        )));
    }
    let out_rows = shape.rows();

    let zero_order = parameter(shape.clone());
    let mut linear_expr = zero_order.clone();
    let mut linear_dictionary = BTreeMap::new();

    for var in expr.variables() {
        let Some(id) = var.variable_id() else {
            continue;
        };
        let var_shape = var.shape();
        let value = parameter(var_shape.clone());
        let block = Shape::matrix(var_shape.rows(), out_rows);

        let mut gradients = Vec::new();
        if var_shape.is_matrix() {
            for d in 0..var_shape.cols() {
                let g = parameter(block.clone());
                let delta = column(&var, d) - column(&value, d);
                let term = conform_term(matmul(&transpose(&g), &delta), &shape);
                linear_expr = &linear_expr + &term;
                gradients.push(g);
            }
        } else {
            let g = parameter(block);
            let term = conform_term(matmul(&transpose(&g), &(&var - &value)), &shape);
            linear_expr = &linear_expr + &term;
            gradients.push(g);
        }
        trace!(variable = %var, blocks = gradients.len(), "template term");

        linear_dictionary.insert(
            id,
            VariableTerm {
                variable: var,
                value,
                gradients,
            },
        );
    }
    debug!(
        expr = %expr,
        variables = linear_dictionary.len(),
        "built linearization template"
    );

    Ok(ParameterizedLinearization {
        linear_expr,
        zero_order,
        domain: expr.domain(),
        linear_dictionary,
        source: expr.clone(),
    })
}

impl ParameterizedLinearization {
    /// The expression this template approximates.
    pub fn source(&self) -> &Expr {
        &self.source
    }

    /// Fill every placeholder at the current point.
    ///
    /// Returns `Ok(false)` when a gradient is undefined at the current point.
    /// Nothing is written unless every placeholder can be filled, so a
    /// failed refresh leaves the previous coefficients in place.
    pub fn refresh(&self) -> Result<bool> {
        let undefined = || CvxError::UndefinedValue(self.source.to_string());
        let value = self.source.value().ok_or_else(undefined)?;
        let grad = self.source.grad().ok_or_else(undefined)?;

        let mut updates = Vec::with_capacity(self.linear_dictionary.len());
        for (id, term) in &self.linear_dictionary {
            let point = term.variable.leaf_value().ok_or_else(undefined)?;
            match grad.get(id).cloned().flatten() {
                Some(g) => updates.push((term, point, g)),
                None => {
                    debug!(variable = %term.variable, "gradient undefined at the current point");
                    return Ok(false);
                }
            }
        }

        self.zero_order.set_value(value)?;
        for (term, point, g) in updates {
            term.value.set_value(point)?;
            let rows = term.variable.shape().rows();
            for (d, placeholder) in term.gradients.iter().enumerate() {
                let block = g.rows(d * rows, rows).into_owned();
                placeholder.set_value(Array::Dense(block))?;
            }
        }
        Ok(true)
    }
}
