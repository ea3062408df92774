use super::error::KeywordError;
use super::graph::{Graph, NodeId};
use super::keywords::KeywordScope;
use super::node::NodeType;
use crate::core::data::CoreData;
use crate::core::expression::ExpressionVariable;
use std::fmt;
use std::rc::Rc;
use tracing::{debug, trace};

/// The view of the procedure from one node's position, handed to its keywords.
pub(crate) struct Scope<'g> {
    graph: &'g Graph,
    visible: Vec<NodeId>,
    core_data: Option<&'g CoreData>,
}

impl<'g> Scope<'g> {
    /// The scope seen by the node `id`.
    pub fn of_node(graph: &'g Graph, id: NodeId, core_data: Option<&'g CoreData>) -> Self {
        Self {
            graph,
            visible: graph.visible_from_node(id),
            core_data,
        }
    }
}

impl KeywordScope for Scope<'_> {
    fn find_node(&self, name: &str) -> Option<(NodeId, NodeType)> {
        self.visible.iter().find_map(|id| {
            let info = self.graph.nodes.get(*id)?;
            info.name
                .eq_ignore_ascii_case(name)
                .then_some((*id, info.node_type))
        })
    }

    fn is_visible(&self, id: NodeId) -> bool {
        self.visible.contains(&id)
    }

    fn node_name(&self, id: NodeId) -> Option<String> {
        self.graph.nodes.get(id).map(|info| info.name.clone())
    }

    fn parameters(&self) -> Vec<Rc<ExpressionVariable>> {
        self.visible
            .iter()
            .filter_map(|id| self.graph.bodies.get(*id))
            .flat_map(|body| body.parameters())
            .collect()
    }

    fn find_species(&self, name: &str) -> Result<String, KeywordError> {
        let Some(data) = self.core_data else {
            return Ok(name.to_string());
        };
        data.find_species(name)
            .and_then(|id| data.species(id))
            .map(|species| species.name.clone())
            .ok_or_else(|| KeywordError::UnknownSpecies(name.to_string()))
    }
}

/// Runs `f` on the body of `id` with a scope built from the rest of the graph.
///
/// The body is taken out of the arena for the duration of the call so the scope can
/// borrow the graph while the body is borrowed mutably.
pub(crate) fn with_body_in_scope<R>(
    graph: &mut Graph,
    id: NodeId,
    core_data: Option<&CoreData>,
    f: impl FnOnce(&mut dyn super::node::ProcedureNode, &Scope<'_>) -> R,
) -> Option<R> {
    let mut body = graph.bodies.remove(id)?;
    let result = {
        let scope = Scope::of_node(graph, id, core_data);
        f(body.as_mut(), &scope)
    };
    graph.bodies.insert(id, body);
    Some(result)
}

/// Repairs every keyword against its node's current scope.
///
/// Returns the number of keywords changed. Running it twice without an edit in
/// between returns 0 the second time.
pub(crate) fn validate_node_keywords(graph: &mut Graph) -> usize {
    let mut changed = 0;
    for id in graph.all_nodes() {
        changed += with_body_in_scope(graph, id, None, |body, scope| {
            body.keywords_mut()
                .into_iter()
                .filter_map(|kw| kw.validate(scope).then(|| kw.name()))
                .inspect(|name| trace!(keyword = name, "Keyword repaired."))
                .count()
        })
        .unwrap_or(0);
    }
    if changed > 0 {
        debug!(changed, "Validated node keywords.");
    }
    changed
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViolationKind {
    /// The node is not legal in the context of its sequence.
    ContextMismatch,
    /// The node can see another node with the same name.
    DuplicateName,
    /// A keyword value is not valid at the node's position.
    Keyword { keyword: String, message: String },
    /// The node requires a user-given name but only has a generated one.
    NameRequired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScopeViolation {
    pub node: NodeId,
    pub node_name: String,
    pub kind: ViolationKind,
}

impl fmt::Display for ScopeViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::ContextMismatch => {
                write!(f, "{}: not allowed in this context", self.node_name)
            }
            ViolationKind::DuplicateName => {
                write!(f, "{}: another visible node has the same name", self.node_name)
            }
            ViolationKind::Keyword { keyword, message } => {
                write!(f, "{}: keyword '{}' {}", self.node_name, keyword, message)
            }
            ViolationKind::NameRequired => {
                write!(f, "{}: this node type must be given a name", self.node_name)
            }
        }
    }
}

/// Lists every scoping problem in the graph without changing anything.
pub(crate) fn check(graph: &Graph) -> Vec<ScopeViolation> {
    let mut violations = Vec::new();
    for id in graph.all_nodes() {
        let (Some(info), Some(body)) = (graph.nodes.get(id), graph.bodies.get(id)) else {
            continue;
        };
        let violation = |kind| ScopeViolation {
            node: id,
            node_name: info.name.clone(),
            kind,
        };

        if !graph.effective_context(info.scope).admits(body.contexts()) {
            violations.push(violation(ViolationKind::ContextMismatch));
        }
        if body.must_be_named() && info.auto_named {
            violations.push(violation(ViolationKind::NameRequired));
        }
        let visible = graph.visible_from_node(id);
        if graph.clashing_node(&info.name, &visible).is_some() {
            violations.push(violation(ViolationKind::DuplicateName));
        }

        let scope = Scope {
            graph,
            visible,
            core_data: None,
        };
        for kw in body.keywords() {
            if let Some(message) = kw.check(&scope) {
                violations.push(violation(ViolationKind::Keyword {
                    keyword: kw.name().to_string(),
                    message,
                }));
            }
        }
    }
    violations
}

/// Whether any node can see another node with the same name.
pub(crate) fn has_visible_duplicates(graph: &Graph) -> bool {
    graph.all_nodes().into_iter().any(|id| {
        let visible = graph.visible_from_node(id);
        graph
            .nodes
            .get(id)
            .is_some_and(|info| graph.clashing_node(&info.name, &visible).is_some())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::graph::tests::{add_branch, push};
    use crate::engine::node::NodeContext;

    #[test]
    fn duplicates_are_only_reported_when_visible() {
        let mut g = Graph::new(NodeContext::Generation);
        let root = g.root;
        let r1 = push(&mut g, root, "R1", NodeType::Repeat);
        let r2 = push(&mut g, root, "R2", NodeType::Repeat);
        let b1 = add_branch(&mut g, r1);
        let b2 = add_branch(&mut g, r2);
        push(&mut g, b1, "Inner", NodeType::Add);
        push(&mut g, b2, "Inner", NodeType::Add);
        assert!(!has_visible_duplicates(&g));

        push(&mut g, root, "inner", NodeType::Box);
        assert!(!has_visible_duplicates(&g));
        push(&mut g, b2, "R1", NodeType::Box);
        assert!(has_visible_duplicates(&g));
    }

    #[test]
    fn scope_finds_only_visible_nodes() {
        let mut g = Graph::new(NodeContext::Generation);
        let root = g.root;
        let a = push(&mut g, root, "A", NodeType::Pick);
        let b = push(&mut g, root, "B", NodeType::Add);
        let c = push(&mut g, root, "C", NodeType::Pick);

        let scope = Scope::of_node(&g, b, None);
        assert_eq!(scope.find_node("a"), Some((a, NodeType::Pick)));
        assert_eq!(scope.find_node("C"), None);
        assert!(!scope.is_visible(c));
        assert_eq!(scope.node_name(c).as_deref(), Some("C"));
        assert_eq!(scope.find_species("Anything").unwrap(), "Anything");
    }
}
