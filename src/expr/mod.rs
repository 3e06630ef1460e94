//! The expression graph: `Expr`, its `Shape`, and the three kinds of leaves
//! (variables, parameters and constants).

pub mod constant;
pub mod expression;
pub mod parameter;
pub mod shape;
pub mod variable;

// Re-export main types
pub use constant::{
    constant, constant_dmatrix, constant_matrix, constant_sparse, constant_vec, eye,
};
pub use expression::{
    Array, ConstantData, Expr, ExprId, IndexSpec, ParameterData, ValueSlot, VariableData,
};
pub use parameter::{named_parameter, parameter, parameter_with_value};
pub use shape::Shape;
pub use variable::{named_variable, variable, VariableBuilder, VariableExt};
