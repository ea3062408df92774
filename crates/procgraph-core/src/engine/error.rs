use super::node::{NodeContext, NodeType};
use crate::core::expression::ExpressionError;
use crate::core::models::cell::CellError;
use crate::core::models::configuration::ConfigurationError;
use std::fmt;
use thiserror::Error;

/// Failure to set, read or interpret a keyword value.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum KeywordError {
    #[error("Value {value} is below the minimum of {minimum}")]
    BelowMinimum { value: String, minimum: String },
    #[error("Value {value} is above the maximum of {maximum}")]
    AboveMaximum { value: String, maximum: String },
    #[error("Expected {expected}, found {found}")]
    WrongKind {
        expected: &'static str,
        found: String,
    },
    #[error("Expected {expected} argument(s), found {found}")]
    ArgumentCount { expected: &'static str, found: usize },
    #[error("'{value}' is not a valid option (valid options are: {options})")]
    UnknownOption { value: String, options: String },
    #[error("No node named '{0}' is in scope")]
    NodeNotInScope(String),
    #[error("Node '{name}' is a {found} node, which is not accepted here (allowed: {allowed})")]
    WrongNodeType {
        name: String,
        found: NodeType,
        allowed: String,
    },
    #[error("'{0}' is already in the list")]
    DuplicateEntry(String),
    #[error("Unknown species '{0}'")]
    UnknownSpecies(String),
    #[error("Invalid parameter name '{0}'")]
    InvalidParameterName(String),
    #[error("Invalid expression: {0}")]
    Expression(#[from] ExpressionError),
    #[error("Unrecognised keyword '{0}'")]
    Unrecognised(String),
}

/// Failure raised by a node while it runs.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum NodeError {
    #[error("Keyword '{0}' must be set")]
    MissingKeyword(&'static str),
    #[error("Node '{producer}' has not produced a {what} in this run")]
    MissingOutput {
        producer: String,
        what: &'static str,
    },
    #[error("Species '{0}' is not defined")]
    UnknownSpecies(String),
    #[error("Invalid value for '{keyword}': {message}")]
    InvalidValue {
        keyword: &'static str,
        message: String,
    },
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
    #[error("Cell error: {0}")]
    Cell(#[from] CellError),
    #[error("{0}")]
    Failed(String),
}

/// The phase of the execution protocol in which a node failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    Prepare,
    Execute,
    Finalise,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Prepare => write!(f, "prepare"),
            Phase::Execute => write!(f, "execute"),
            Phase::Finalise => write!(f, "finalise"),
        }
    }
}

#[derive(Debug, Error)]
pub enum ProcedureError {
    #[error("Node type '{0}' is not registered")]
    UnregisteredNodeType(String),
    #[error("A {node_type} node cannot be placed in a {context} sequence")]
    ContextMismatch {
        node_type: NodeType,
        context: NodeContext,
    },
    #[error("A node named '{0}' is already visible at this position")]
    DuplicateName(String),
    #[error("{0} nodes must be given a name")]
    NameRequired(NodeType),
    #[error("Invalid node name '{0}'")]
    InvalidName(String),
    #[error("Unknown node: {0}")]
    UnknownNode(String),
    #[error("Cannot move node '{name}': {reason}")]
    InvalidMove { name: String, reason: String },
    #[error("Node '{0}' does not own a branch")]
    NoBranch(String),
    #[error("Keyword '{keyword}' of node '{node}': {source}")]
    Keyword {
        node: String,
        keyword: String,
        source: KeywordError,
    },
    #[error("Node '{node}' ({node_type}) failed during {phase}: {source}")]
    Execution {
        node: String,
        node_type: NodeType,
        phase: Phase,
        source: NodeError,
    },
}
