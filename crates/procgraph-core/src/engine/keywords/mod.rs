//! Typed, named configuration slots attached to nodes.
//!
//! Every keyword tracks whether it has been explicitly set. Only explicitly set keywords
//! are written out, so an unset keyword always reads back as its default.

pub mod basic;
pub mod enumeration;
pub mod node;
pub mod optional;
pub mod parameters;
pub mod species;
pub mod value;

pub use basic::{BoolKeyword, DoubleKeyword, IntegerKeyword};
pub use enumeration::{EnumKeyword, EnumOption};
pub use node::{NodeKeyword, NodeVectorKeyword};
pub use optional::OptionalKeyword;
pub use parameters::ParametersKeyword;
pub use species::{SpeciesKeyword, SpeciesVectorKeyword};
pub use value::{NodeValueEnumKeyword, NodeValueKeyword, Vec3NodeValueKeyword};

use super::error::KeywordError;
use super::graph::NodeId;
use super::node::NodeType;
use crate::core::expression::ExpressionVariable;
use std::rc::Rc;
use toml::Value;

/// What a keyword can ask about the position of the node that owns it.
pub trait KeywordScope {
    /// Finds a node visible from the owning node by name (ignoring case).
    fn find_node(&self, name: &str) -> Option<(NodeId, NodeType)>;
    /// Whether `id` is visible from the owning node.
    fn is_visible(&self, id: NodeId) -> bool;
    /// The name of any node in the procedure, visible or not.
    fn node_name(&self, id: NodeId) -> Option<String>;
    /// Expression parameters visible from the owning node, nearest first.
    fn parameters(&self) -> Vec<Rc<ExpressionVariable>>;
    /// Resolves a species name to its registered spelling.
    ///
    /// Without species data available every name is accepted as written.
    fn find_species(&self, name: &str) -> Result<String, KeywordError>;
}

pub trait Keyword {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    /// Whether the keyword has been explicitly set since construction.
    fn is_set(&self) -> bool;

    /// Whether the current value equals the construction-time default.
    fn is_default(&self) -> bool;

    /// The persisted form of the keyword, or `None` when it should be omitted.
    fn serialise(&self, scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError>;

    /// Sets the keyword from its persisted form. On failure nothing changes.
    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError>;

    /// Sets the keyword from the arguments of a legacy keyword line.
    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError>;

    /// Repairs the value against the current scope.
    ///
    /// # Return
    ///
    /// `true` if the value was changed.
    fn validate(&mut self, _scope: &dyn KeywordScope) -> bool {
        false
    }

    /// Drops references to removed nodes. Returns `true` if the value changed.
    fn nodes_removed(&mut self, _removed: &[NodeId]) -> bool {
        false
    }

    /// Describes why the current value is not valid in `scope`, without changing it.
    fn check(&self, _scope: &dyn KeywordScope) -> Option<String> {
        None
    }

    /// Nodes this keyword refers to.
    fn referenced_nodes(&self) -> Vec<NodeId> {
        Vec::new()
    }

    /// Human-readable rendering of the current value.
    fn display_value(&self, scope: &dyn KeywordScope) -> String;
}

/// Name, description and set-flag shared by every keyword implementation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordInfo {
    pub name: &'static str,
    pub description: &'static str,
    pub set: bool,
}

impl KeywordInfo {
    pub const fn new(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            set: false,
        }
    }
}

/// Finds a keyword of `keywords` by name, ignoring case.
pub fn find_keyword<'a>(keywords: Vec<&'a mut dyn Keyword>, name: &str) -> Option<&'a mut dyn Keyword> {
    keywords
        .into_iter()
        .find(|k| k.name().eq_ignore_ascii_case(name))
}

pub(crate) fn kind_name(value: &Value) -> String {
    match value {
        Value::String(s) => format!("string \"{}\"", s),
        Value::Integer(i) => format!("integer {}", i),
        Value::Float(f) => format!("float {}", f),
        Value::Boolean(b) => format!("boolean {}", b),
        Value::Datetime(_) => "datetime".to_string(),
        Value::Array(_) => "array".to_string(),
        Value::Table(_) => "table".to_string(),
    }
}

pub(crate) fn expect_args(
    args: &[String],
    expected: &'static str,
    valid: impl Fn(usize) -> bool,
) -> Result<(), KeywordError> {
    if valid(args.len()) {
        Ok(())
    } else {
        Err(KeywordError::ArgumentCount {
            expected,
            found: args.len(),
        })
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use slotmap::SlotMap;

    /// A scope with a fixed set of visible nodes and parameters.
    #[derive(Default)]
    pub struct FixedScope {
        pub ids: SlotMap<NodeId, ()>,
        pub visible: Vec<(NodeId, String, NodeType)>,
        pub hidden: Vec<(NodeId, String, NodeType)>,
        pub params: Vec<Rc<ExpressionVariable>>,
        pub species: Option<Vec<String>>,
    }

    impl FixedScope {
        pub fn add_visible(&mut self, name: &str, node_type: NodeType) -> NodeId {
            let id = self.ids.insert(());
            self.visible.push((id, name.to_string(), node_type));
            id
        }

        pub fn add_hidden(&mut self, name: &str, node_type: NodeType) -> NodeId {
            let id = self.ids.insert(());
            self.hidden.push((id, name.to_string(), node_type));
            id
        }
    }

    impl KeywordScope for FixedScope {
        fn find_node(&self, name: &str) -> Option<(NodeId, NodeType)> {
            self.visible
                .iter()
                .find(|(_, n, _)| n.eq_ignore_ascii_case(name))
                .map(|(id, _, t)| (*id, *t))
        }

        fn is_visible(&self, id: NodeId) -> bool {
            self.visible.iter().any(|(v, _, _)| *v == id)
        }

        fn node_name(&self, id: NodeId) -> Option<String> {
            self.visible
                .iter()
                .chain(self.hidden.iter())
                .find(|(v, _, _)| *v == id)
                .map(|(_, n, _)| n.clone())
        }

        fn parameters(&self) -> Vec<Rc<ExpressionVariable>> {
            self.params.clone()
        }

        fn find_species(&self, name: &str) -> Result<String, KeywordError> {
            match &self.species {
                None => Ok(name.to_string()),
                Some(known) => known
                    .iter()
                    .find(|s| s.eq_ignore_ascii_case(name))
                    .cloned()
                    .ok_or_else(|| KeywordError::UnknownSpecies(name.to_string())),
            }
        }
    }
}
