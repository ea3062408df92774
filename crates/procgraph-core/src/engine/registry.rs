use super::error::ProcedureError;
use super::node::{NodeType, ProcedureNode};
use super::nodes;
use crate::core::io::legacy::LegacyGrammar;
use tracing::error;

/// How to build one node type, and how to present it.
#[derive(Clone)]
pub struct NodeRegistration {
    pub node_type: NodeType,
    pub description: &'static str,
    pub category: &'static str,
    pub branch_keyword: Option<&'static str>,
    factory: fn() -> Box<dyn ProcedureNode>,
}

fn make<N: ProcedureNode + Default>() -> Box<dyn ProcedureNode> {
    Box::new(N::default())
}

/// Maps node type tags to constructors.
///
/// Built once at start-up and passed by reference to whatever needs to create nodes.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    registrations: Vec<NodeRegistration>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in node type.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register::<nodes::general::ParametersNode>(
            "Define named parameters for use in expressions",
            "General",
        );
        registry.register::<nodes::general::RepeatNode>("Repeat a sequence of nodes", "General");
        registry.register::<nodes::build::BoxNode>("Define the configuration box", "Build");
        registry.register::<nodes::add::AddNode>("Add molecules of a species", "Build");
        registry.register::<nodes::build::RemoveNode>("Remove molecules", "Build");
        registry.register::<nodes::build::TransmuteNode>(
            "Replace selected molecules with another species",
            "Build",
        );
        registry.register::<nodes::build::TemperatureNode>(
            "Set the configuration temperature",
            "Build",
        );
        registry.register::<nodes::build::SizeFactorNode>(
            "Set the configuration size factor",
            "Build",
        );
        registry.register::<nodes::pick::PickNode>("Pick molecules by species", "Pick");
        registry.register::<nodes::pick::PickProximityNode>(
            "Pick molecules by the number of neighbours nearby",
            "Pick",
        );
        registry.register::<nodes::pick::PickRegionNode>(
            "Pick molecules whose centre lies in a region",
            "Pick",
        );
        registry.register::<nodes::pick::IterateSelectionNode>(
            "Run a sequence once for each selected molecule",
            "Pick",
        );
        registry.register::<nodes::regions::CylindricalRegionNode>(
            "Define a cylindrical region",
            "Regions",
        );
        registry.register::<nodes::regions::GeneralRegionNode>(
            "Define the free space between atoms as a region",
            "Regions",
        );
        registry.register::<nodes::potentials::SphericalGlobalPotentialNode>(
            "Add a spherical global potential",
            "Potentials",
        );
        registry.register::<nodes::potentials::CylindricalGlobalPotentialNode>(
            "Add a cylindrical global potential",
            "Potentials",
        );
        registry.register::<nodes::potentials::RestraintPotentialNode>(
            "Restrain selected atoms to their current positions",
            "Potentials",
        );
        registry
    }

    /// Registers `N` under its node type tag, replacing any earlier registration.
    pub fn register<N: ProcedureNode + Default>(
        &mut self,
        description: &'static str,
        category: &'static str,
    ) {
        let prototype = N::default();
        let registration = NodeRegistration {
            node_type: prototype.node_type(),
            description,
            category,
            branch_keyword: prototype.branch().map(|b| b.keyword),
            factory: make::<N>,
        };
        self.registrations
            .retain(|r| r.node_type != registration.node_type);
        self.registrations.push(registration);
    }

    pub fn registration(&self, tag: &str) -> Option<&NodeRegistration> {
        self.registrations
            .iter()
            .find(|r| r.node_type.tag().eq_ignore_ascii_case(tag))
    }

    /// Creates a fresh node of the type registered under `tag`.
    ///
    /// # Errors
    ///
    /// Returns [`ProcedureError::UnregisteredNodeType`] if nothing is registered under
    /// `tag`. This always indicates a registration defect and is logged as an error.
    pub fn produce(&self, tag: &str) -> Result<Box<dyn ProcedureNode>, ProcedureError> {
        match self.registration(tag) {
            Some(registration) => Ok((registration.factory)()),
            None => {
                error!(tag, "Requested a node type that is not registered.");
                Err(ProcedureError::UnregisteredNodeType(tag.to_string()))
            }
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.registration(tag).is_some()
    }

    pub fn tags(&self) -> Vec<&'static str> {
        self.registrations.iter().map(|r| r.node_type.tag()).collect()
    }

    pub fn describe(&self, tag: &str) -> Option<&'static str> {
        self.registration(tag).map(|r| r.description)
    }

    /// Registered types grouped by category, in registration order.
    pub fn categories(&self) -> Vec<(&'static str, Vec<(&'static str, &'static str)>)> {
        let mut categories: Vec<(&'static str, Vec<(&'static str, &'static str)>)> = Vec::new();
        for r in &self.registrations {
            let entry = (r.node_type.tag(), r.description);
            match categories.iter_mut().find(|(c, _)| *c == r.category) {
                Some((_, members)) => members.push(entry),
                None => categories.push((r.category, vec![entry])),
            }
        }
        categories
    }
}

impl LegacyGrammar for NodeRegistry {
    fn node_tag(&self, word: &str) -> Option<String> {
        self.registration(word).map(|r| r.node_type.tag().to_string())
    }

    fn branch_keyword(&self, tag: &str) -> Option<String> {
        self.registration(tag)
            .and_then(|r| r.branch_keyword)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_node_type_is_registered_by_default() {
        let registry = NodeRegistry::with_defaults();
        for t in NodeType::ALL {
            let node = registry.produce(t.tag()).unwrap();
            assert_eq!(node.node_type(), t);
        }
        assert_eq!(registry.tags().len(), NodeType::ALL.len());
    }

    #[test]
    fn unknown_tags_are_an_error() {
        let registry = NodeRegistry::with_defaults();
        assert!(matches!(
            registry.produce("Frobnicate"),
            Err(ProcedureError::UnregisteredNodeType(tag)) if tag == "Frobnicate"
        ));
        assert!(registry.contains("pickregion"));
    }

    #[test]
    fn categories_keep_registration_order() {
        let registry = NodeRegistry::with_defaults();
        let categories = registry.categories();
        let names: Vec<_> = categories.iter().map(|(c, _)| *c).collect();
        assert_eq!(names, ["General", "Build", "Pick", "Regions", "Potentials"]);
        assert_eq!(categories[0].1[0].0, "Parameters");
    }

    #[test]
    fn branch_keywords_come_from_the_node_types() {
        let registry = NodeRegistry::with_defaults();
        assert_eq!(registry.branch_keyword("Repeat").as_deref(), Some("ForEach"));
        assert_eq!(registry.branch_keyword("Add"), None);
        assert_eq!(registry.node_tag("iterateselection").as_deref(), Some("IterateSelection"));
    }
}
