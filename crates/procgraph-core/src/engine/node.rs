use super::context::ProcedureContext;
use super::error::NodeError;
use super::keywords::Keyword;
use crate::core::expression::ExpressionVariable;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Every kind of node the engine knows about.
///
/// The variant's [`tag`](NodeType::tag) is the stable string used as the registry key
/// and as the `type` field of persisted documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeType {
    Parameters,
    Repeat,
    Box,
    Add,
    Remove,
    Transmute,
    Temperature,
    SizeFactor,
    Pick,
    PickProximity,
    PickRegion,
    IterateSelection,
    CylindricalRegion,
    GeneralRegion,
    SphericalGlobalPotential,
    CylindricalGlobalPotential,
    RestraintPotential,
}

impl NodeType {
    pub const ALL: [NodeType; 17] = [
        NodeType::Parameters,
        NodeType::Repeat,
        NodeType::Box,
        NodeType::Add,
        NodeType::Remove,
        NodeType::Transmute,
        NodeType::Temperature,
        NodeType::SizeFactor,
        NodeType::Pick,
        NodeType::PickProximity,
        NodeType::PickRegion,
        NodeType::IterateSelection,
        NodeType::CylindricalRegion,
        NodeType::GeneralRegion,
        NodeType::SphericalGlobalPotential,
        NodeType::CylindricalGlobalPotential,
        NodeType::RestraintPotential,
    ];

    /// Node types that publish a molecule selection.
    pub const PICK_FAMILY: &'static [NodeType] = &[
        NodeType::Pick,
        NodeType::PickProximity,
        NodeType::PickRegion,
        NodeType::IterateSelection,
    ];

    /// Node types that publish a region.
    pub const REGION_FAMILY: &'static [NodeType] =
        &[NodeType::CylindricalRegion, NodeType::GeneralRegion];

    pub fn tag(&self) -> &'static str {
        match self {
            NodeType::Parameters => "Parameters",
            NodeType::Repeat => "Repeat",
            NodeType::Box => "Box",
            NodeType::Add => "Add",
            NodeType::Remove => "Remove",
            NodeType::Transmute => "Transmute",
            NodeType::Temperature => "Temperature",
            NodeType::SizeFactor => "SizeFactor",
            NodeType::Pick => "Pick",
            NodeType::PickProximity => "PickProximity",
            NodeType::PickRegion => "PickRegion",
            NodeType::IterateSelection => "IterateSelection",
            NodeType::CylindricalRegion => "CylindricalRegion",
            NodeType::GeneralRegion => "GeneralRegion",
            NodeType::SphericalGlobalPotential => "SphericalGlobalPotential",
            NodeType::CylindricalGlobalPotential => "CylindricalGlobalPotential",
            NodeType::RestraintPotential => "RestraintPotential",
        }
    }

    /// Looks up a node type by tag, ignoring case.
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|t| t.tag().eq_ignore_ascii_case(tag))
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Joins the tags of a node type filter for messages.
pub fn describe_types(types: &[NodeType]) -> String {
    if types.is_empty() {
        return "any".to_string();
    }
    types.iter().map(NodeType::tag).collect::<Vec<_>>().join(", ")
}

/// Where a node may legally be placed, and the context a sequence provides.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeContext {
    /// Building or modifying a configuration.
    Generation,
    /// Analysing a configuration without changing it.
    Analysis,
    /// A branch sequence that takes the context of the sequence its owner lives in.
    Inherit,
    /// Legal everywhere.
    Any,
}

impl NodeContext {
    /// Whether a node declaring `contexts` may be placed in a sequence whose effective
    /// context is `self`.
    pub fn admits(&self, contexts: &[NodeContext]) -> bool {
        *self == NodeContext::Any || contexts.iter().any(|c| *c == NodeContext::Any || c == self)
    }
}

impl fmt::Display for NodeContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeContext::Generation => write!(f, "Generation"),
            NodeContext::Analysis => write!(f, "Analysis"),
            NodeContext::Inherit => write!(f, "Inherit"),
            NodeContext::Any => write!(f, "Any"),
        }
    }
}

/// Declares that a node owns a child sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BranchSpec {
    /// Keyword under which the branch is persisted (e.g. `ForEach`).
    pub keyword: &'static str,
    /// Context of the child sequence, normally [`NodeContext::Inherit`].
    pub context: NodeContext,
}

pub const GENERATION_ONLY: &[NodeContext] = &[NodeContext::Generation];
pub const ANY_CONTEXT: &[NodeContext] = &[NodeContext::Any];

/// One step of a procedure.
///
/// A node owns its keywords and whatever working storage it needs during a run. It never
/// owns its branch: the [`Procedure`](super::procedure::Procedure) keeps child sequences
/// in its arena and drives them on the node's behalf.
///
/// During a run the phases are called in this order:
///
/// 1. `prepare` once, then the branch is prepared
/// 2. `execute`, then `next_branch_pass` repeatedly; each `true` executes the branch once
/// 3. the branch is finalised, then `finalise`
///
/// Inside a loop, step 2 can repeat for every outer pass. Any error aborts the run.
pub trait ProcedureNode: Any {
    fn node_type(&self) -> NodeType;

    /// Whether the node can only be created with an explicit name.
    fn must_be_named(&self) -> bool {
        false
    }

    fn contexts(&self) -> &'static [NodeContext];

    fn branch(&self) -> Option<BranchSpec> {
        None
    }

    fn keywords(&self) -> Vec<&dyn Keyword>;

    fn keywords_mut(&mut self) -> Vec<&mut dyn Keyword>;

    /// Expression parameters this node makes visible to nodes later in scope.
    fn parameters(&self) -> Vec<Rc<ExpressionVariable>> {
        Vec::new()
    }

    /// Called whenever the node is given a name, so prefixed parameters can follow it.
    fn set_name(&mut self, _name: &str) {}

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError>;

    /// Asks a branch-owning node whether its branch should run (again).
    fn next_branch_pass(&mut self, _ctx: &mut ProcedureContext) -> Result<bool, NodeError> {
        Ok(false)
    }

    fn finalise(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        Ok(())
    }

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Implements the keyword accessors and `Any` conversions of [`ProcedureNode`] for a
/// node struct whose keywords are the listed fields.
#[macro_export]
macro_rules! node_keywords {
    ($($field:ident),* $(,)?) => {
        fn keywords(&self) -> Vec<&dyn $crate::engine::keywords::Keyword> {
            vec![$(&self.$field),*]
        }

        fn keywords_mut(&mut self) -> Vec<&mut dyn $crate::engine::keywords::Keyword> {
            vec![$(&mut self.$field),*]
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_round_trip_ignoring_case() {
        for t in NodeType::ALL {
            assert_eq!(NodeType::from_tag(&t.tag().to_ascii_uppercase()), Some(t));
        }
        assert_eq!(NodeType::from_tag("Frobnicate"), None);
    }

    #[test]
    fn contexts_admit_matching_and_any() {
        assert!(NodeContext::Generation.admits(GENERATION_ONLY));
        assert!(!NodeContext::Analysis.admits(GENERATION_ONLY));
        assert!(NodeContext::Analysis.admits(ANY_CONTEXT));
        assert!(NodeContext::Any.admits(GENERATION_ONLY));
    }
}
