//! Placeholder cache shared across linearization calls.

use std::collections::HashMap;

use tracing::debug;

use crate::error::Result;
use crate::expr::{parameter, Array, Expr, ExprId, Shape};

/// Role of a cached placeholder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Slot {
    /// Value of the expression at the base point.
    Value,
    /// Gradient of the expression with respect to one variable.
    Gradient,
    /// Reference point of one variable.
    Point,
}

/// Key of a cached placeholder.
///
/// `expr` is the structural key of the linearized expression, so two
/// expressions built from the same atoms over the same leaves share entries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
    pub expr: String,
    pub var: Option<ExprId>,
    pub slot: Slot,
}

impl CacheKey {
    pub fn value(expr: &str) -> Self {
        CacheKey {
            expr: expr.to_string(),
            var: None,
            slot: Slot::Value,
        }
    }

    pub fn gradient(expr: &str, var: ExprId) -> Self {
        CacheKey {
            expr: expr.to_string(),
            var: Some(var),
            slot: Slot::Gradient,
        }
    }

    pub fn point(expr: &str, var: ExprId) -> Self {
        CacheKey {
            expr: expr.to_string(),
            var: Some(var),
            slot: Slot::Point,
        }
    }
}

/// Caller-owned store of placeholders reused by [`linearize`](super::linearize).
///
/// Entries are never evicted; call [`GradCache::clear`] to start over.
#[derive(Debug, Clone, Default)]
pub struct GradCache {
    entries: HashMap<CacheKey, Expr>,
}

impl GradCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Placeholder stored under `key`.
    pub fn get(&self, key: &CacheKey) -> Option<&Expr> {
        self.entries.get(key)
    }

    /// Iterate over all entries.
    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &Expr)> {
        self.entries.iter()
    }

    /// Assign `value` to the placeholder under `key`, creating it with
    /// `shape` on first use.
    pub(crate) fn upsert(&mut self, key: CacheKey, shape: Shape, value: Array) -> Result<Expr> {
        if let Some(existing) = self.entries.get(&key) {
            debug!(slot = ?key.slot, expr = %key.expr, "placeholder cache hit");
            existing.set_value(value)?;
            return Ok(existing.clone());
        }
        debug!(slot = ?key.slot, expr = %key.expr, "placeholder cache miss");
        let placeholder = parameter(shape);
        placeholder.set_value(value)?;
        self.entries.insert(key, placeholder.clone());
        Ok(placeholder)
    }
}
