//! A small arithmetic expression language used for node values.
//!
//! Expressions are compiled against a list of shared [`ExpressionVariable`]s and stay
//! bound to them, so re-evaluating an expression after a parameter changes yields the
//! new result without recompiling.

pub mod parser;
pub mod value;
pub mod variable;

pub use parser::{Expression, ExpressionError};
pub use value::ExpressionValue;
pub use variable::{ExpressionVariable, find_variable};
