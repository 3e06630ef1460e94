//! DCP curvature analysis.

pub mod curvature;

pub use curvature::Curvature;
