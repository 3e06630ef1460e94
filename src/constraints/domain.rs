//! Domains of expressions.
//!
//! The domain of an expression is the list of constraints its variables must
//! satisfy for the expression to be well defined. Each atom contributes its
//! own restrictions and inherits those of its arguments.

use crate::expr::Expr;

use super::Constraint;

impl Expr {
    /// Constraints describing where this expression is defined.
    ///
    /// The constraints are closed (`>= 0`), but `log`, `entropy`, powers
    /// below one (`sqrt` and negative exponents included) and the denominator
    /// of `quad_over_lin` are differentiable only where their argument is
    /// strictly positive. On the boundary the linearizers report an undefined
    /// gradient, or an undefined value where the atom itself is infinite.
    pub fn domain(&self) -> Vec<Constraint> {
        let mut out = Vec::new();
        self.collect_domain(&mut out);
        out
    }

    fn collect_domain(&self, out: &mut Vec<Constraint>) {
        match self {
            Expr::Variable(v) => {
                if v.nonneg {
                    out.push(Constraint::nonneg(self.clone()));
                } else if v.nonpos {
                    out.push(Constraint::nonpos(self.clone()));
                }
            }
            Expr::Log(a) | Expr::Entropy(a) => out.push(Constraint::nonneg(a.as_ref().clone())),
            Expr::Power(a, p) if p.fract() != 0.0 || *p < 0.0 => {
                out.push(Constraint::nonneg(a.as_ref().clone()))
            }
            Expr::QuadOverLin(_, y) => out.push(Constraint::nonneg(y.as_ref().clone())),
            _ => {}
        }
        for arg in self.args() {
            arg.collect_domain(out);
        }
    }
}
