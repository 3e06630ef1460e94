//! Constraints and expression domains.

pub mod constraint;
pub mod domain;

pub use constraint::Constraint;
