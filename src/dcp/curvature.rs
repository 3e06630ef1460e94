//! Curvature of expressions.
//!
//! The linearizers only approximate expressions that are not affine, and a
//! tangent built from placeholders must itself come out affine. Parameters
//! therefore count as constants here.

use crate::expr::{Array, Expr};

/// Curvature of an expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curvature {
    Constant,
    Affine,
    Convex,
    Concave,
    /// No rule applies, e.g. a product of two variables.
    Unknown,
}

impl Curvature {
    pub fn is_constant(self) -> bool {
        self == Curvature::Constant
    }

    /// Constant or affine.
    pub fn is_affine(self) -> bool {
        matches!(self, Curvature::Constant | Curvature::Affine)
    }

    pub fn is_convex(self) -> bool {
        self.is_affine() || self == Curvature::Convex
    }

    pub fn is_concave(self) -> bool {
        self.is_affine() || self == Curvature::Concave
    }

    fn flip(self) -> Self {
        match self {
            Curvature::Convex => Curvature::Concave,
            Curvature::Concave => Curvature::Convex,
            other => other,
        }
    }

    fn plus(self, other: Self) -> Self {
        use Curvature::*;
        match (self, other) {
            (Unknown, _) | (_, Unknown) => Unknown,
            (Constant, c) | (c, Constant) => c,
            (Affine, c) | (c, Affine) => c,
            (a, b) if a == b => a,
            _ => Unknown,
        }
    }
}

fn convex_if(rule: bool) -> Curvature {
    if rule {
        Curvature::Convex
    } else {
        Curvature::Unknown
    }
}

fn concave_if(rule: bool) -> Curvature {
    if rule {
        Curvature::Concave
    } else {
        Curvature::Unknown
    }
}

impl Expr {
    /// Curvature under the DCP composition rules.
    ///
    /// Any atom applied only to constants (or parameters) is constant.
    pub fn curvature(&self) -> Curvature {
        let args: Vec<Curvature> = self.args().iter().map(|a| a.curvature()).collect();
        if !args.is_empty() && args.iter().all(|c| c.is_constant()) {
            return Curvature::Constant;
        }
        let first = args.first().copied().unwrap_or(Curvature::Constant);

        match self {
            Expr::Variable(_) => Curvature::Affine,
            Expr::Constant(_) | Expr::Parameter(_) => Curvature::Constant,

            Expr::Add(_, _) | Expr::VStack(_) | Expr::HStack(_) => args
                .iter()
                .fold(Curvature::Constant, |acc, c| acc.plus(*c)),
            Expr::Neg(_) => first.flip(),
            Expr::Mul(a, b) | Expr::MatMul(a, b) => product(a, b, first, args[1]),
            Expr::Sum(_, _)
            | Expr::Reshape(_, _)
            | Expr::Index(_, _)
            | Expr::Transpose(_)
            | Expr::Trace(_)
            | Expr::Cumsum(_, _)
            | Expr::Diag(_) => first,

            Expr::Norm1(_)
            | Expr::Norm2(_)
            | Expr::NormInf(_)
            | Expr::Abs(_)
            | Expr::SumSquares(_)
            | Expr::Exp(_) => convex_if(first.is_affine()),
            Expr::Pos(_) => convex_if(first.is_convex()),
            Expr::NegPart(_) => convex_if(first.is_concave()),
            Expr::Maximum(_) => convex_if(args.iter().all(|c| c.is_convex())),
            Expr::Minimum(_) => concave_if(args.iter().all(|c| c.is_concave())),
            Expr::QuadForm(_, p) if first.is_affine() => match p.constant_value() {
                Some(p) if p.is_psd() == Some(true) => Curvature::Convex,
                Some(p) if Array::Dense(-p.to_dense()).is_psd() == Some(true) => {
                    Curvature::Concave
                }
                _ => Curvature::Unknown,
            },
            Expr::QuadForm(_, _) => Curvature::Unknown,
            Expr::QuadOverLin(_, _) => convex_if(first.is_affine() && args[1].is_concave()),
            Expr::Log(_) => concave_if(first.is_concave()),
            Expr::Entropy(_) => concave_if(first.is_affine()),
            Expr::Power(_, p) => power_rule(first, *p),
        }
    }

    /// Constant or affine: the linearizers return such expressions unchanged.
    pub fn is_affine(&self) -> bool {
        self.curvature().is_affine()
    }

    pub fn is_convex(&self) -> bool {
        self.curvature().is_convex()
    }
}

/// Elementwise or matrix product where at most one side may vary.
fn product(a: &Expr, b: &Expr, ac: Curvature, bc: Curvature) -> Curvature {
    let (factor, other) = match (ac, bc) {
        (Curvature::Constant, c) => (a, c),
        (c, Curvature::Constant) => (b, c),
        _ => return Curvature::Unknown,
    };
    match factor.constant_value().and_then(Array::as_scalar) {
        Some(s) if s == 0.0 => Curvature::Constant,
        Some(s) if s < 0.0 => other.flip(),
        Some(_) => other,
        // sign of a matrix or parameter factor is not tracked
        None if other.is_affine() => Curvature::Affine,
        None => Curvature::Unknown,
    }
}

fn power_rule(base: Curvature, p: f64) -> Curvature {
    if p == 0.0 {
        Curvature::Constant
    } else if p == 1.0 {
        base
    } else if !base.is_affine() {
        Curvature::Unknown
    } else if p > 1.0 || p < 0.0 {
        Curvature::Convex
    } else if p > 0.0 {
        Curvature::Concave
    } else {
        Curvature::Unknown
    }
}
