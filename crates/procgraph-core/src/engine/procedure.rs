use super::context::ProcedureContext;
use super::error::{KeywordError, NodeError, Phase, ProcedureError};
use super::graph::{Graph, NodeId, NodeInfo, NodeSequence, SequenceId};
use super::keywords::{Keyword, KeywordScope, find_keyword};
use super::node::{NodeContext, NodeType, ProcedureNode};
use super::progress::Progress;
use super::registry::NodeRegistry;
use super::sequence::{self, Scope, ScopeViolation};
use crate::core::data::CoreData;
use crate::core::expression::{ExpressionVariable, find_variable};
use crate::core::models::configuration::ConfigurationId;
use std::collections::HashMap;
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

/// Structural changes reported to observers of a procedure.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcedureEvent {
    NodeRemoved {
        id: NodeId,
        name: String,
        node_type: NodeType,
    },
}

type Observer = Box<dyn Fn(&ProcedureEvent)>;

fn valid_node_name(name: &str) -> bool {
    !name.trim().is_empty()
        && name.trim() == name
        && !name.contains(['.', '\'', '"', '#', ','])
}

/// A tree of nodes that builds or analyses a configuration.
///
/// The procedure owns every node and sequence. Nodes are addressed by [`NodeId`] and
/// see only the nodes before them in their own sequence and in the sequences enclosing
/// it. Every edit leaves the tree in a valid state: edits that would break scoping
/// rules are rejected, and references broken by removals or moves are cleared.
pub struct Procedure {
    pub(crate) graph: Graph,
    observers: Vec<Observer>,
    run_cache: HashMap<ConfigurationId, u64>,
}

impl std::fmt::Debug for Procedure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Procedure").finish_non_exhaustive()
    }
}

impl Procedure {
    /// Creates an empty procedure whose root sequence has `context`.
    pub fn new(context: NodeContext) -> Self {
        Self {
            graph: Graph::new(context),
            observers: Vec::new(),
            run_cache: HashMap::new(),
        }
    }

    pub fn context(&self) -> NodeContext {
        self.graph.effective_context(self.graph.root)
    }

    pub fn root(&self) -> SequenceId {
        self.graph.root
    }

    /// The branch sequence owned by `id`, if any.
    pub fn branch_of(&self, id: NodeId) -> Option<SequenceId> {
        self.graph.nodes.get(id).and_then(|info| info.branch)
    }

    /// The nodes of `seq`, in order.
    pub fn sequence(&self, seq: SequenceId) -> &[NodeId] {
        self.graph
            .sequences
            .get(seq)
            .map_or(&[], |s| s.nodes.as_slice())
    }

    pub fn n_nodes(&self) -> usize {
        self.graph.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.nodes.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.graph.nodes.contains_key(id)
    }

    pub fn name(&self, id: NodeId) -> Option<&str> {
        self.graph.nodes.get(id).map(|info| info.name.as_str())
    }

    pub fn node_type(&self, id: NodeId) -> Option<NodeType> {
        self.graph.nodes.get(id).map(|info| info.node_type)
    }

    /// The sequence `id` lives in and its index there.
    pub fn position(&self, id: NodeId) -> Option<(SequenceId, usize)> {
        self.graph.position(id)
    }

    /// Every node, depth first in execution order.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.graph.all_nodes()
    }

    pub fn node(&self, id: NodeId) -> Option<&dyn ProcedureNode> {
        self.graph.bodies.get(id).map(|b| b.as_ref())
    }

    /// Borrows the body of `id` as its concrete type.
    pub fn node_body<T: ProcedureNode>(&self, id: NodeId) -> Option<&T> {
        self.graph.bodies.get(id)?.as_any().downcast_ref::<T>()
    }

    /// Mutably borrows the body of `id` as its concrete type. Clears the run cache.
    pub fn node_body_mut<T: ProcedureNode>(&mut self, id: NodeId) -> Option<&mut T> {
        self.run_cache.clear();
        self.graph.bodies.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Registers a callback for structural events.
    pub fn subscribe(&mut self, observer: impl Fn(&ProcedureEvent) + 'static) {
        self.observers.push(Box::new(observer));
    }

    pub fn invalidate_cache(&mut self) {
        self.run_cache.clear();
    }

    fn node_label(&self, id: NodeId) -> String {
        self.name(id)
            .map_or_else(|| format!("{:?}", id), str::to_string)
    }

    // Structure

    /// Inserts `node` into `seq` at `index` (or at the end).
    ///
    /// Without a name, a unique name of the form `<Tag><NN>` is generated.
    ///
    /// # Errors
    ///
    /// Fails without changing the procedure if the node is not legal in the sequence's
    /// context, must be named but no name is given, the name is malformed, or the name
    /// is already used by a node that the new node would see or be seen by.
    pub fn append_node(
        &mut self,
        mut node: Box<dyn ProcedureNode>,
        name: Option<&str>,
        seq: SequenceId,
        index: Option<usize>,
    ) -> Result<NodeId, ProcedureError> {
        let len = self
            .graph
            .sequences
            .get(seq)
            .ok_or_else(|| ProcedureError::UnknownNode(format!("sequence {:?}", seq)))?
            .nodes
            .len();
        let index = index.unwrap_or(len).min(len);
        let node_type = node.node_type();

        let context = self.graph.effective_context(seq);
        if !context.admits(node.contexts()) {
            return Err(ProcedureError::ContextMismatch { node_type, context });
        }

        let (name, auto_named) = match name {
            Some(given) => {
                if !valid_node_name(given) {
                    return Err(ProcedureError::InvalidName(given.to_string()));
                }
                let conflicts = self.graph.name_conflicts(seq, index, None);
                if self.graph.clashing_node(given, &conflicts).is_some() {
                    return Err(ProcedureError::DuplicateName(given.to_string()));
                }
                (given.to_string(), false)
            }
            None if node.must_be_named() => return Err(ProcedureError::NameRequired(node_type)),
            None => (self.graph.unique_name(node_type), true),
        };

        let branch_spec = node.branch();
        let id = self.graph.nodes.insert(NodeInfo {
            name: name.clone(),
            node_type,
            scope: seq,
            branch: None,
            auto_named,
        });
        if let Some(spec) = branch_spec {
            let branch = self.graph.sequences.insert(NodeSequence {
                owner: Some(id),
                context: spec.context,
                block_keyword: spec.keyword,
                nodes: Vec::new(),
            });
            self.graph.nodes[id].branch = Some(branch);
        }
        node.set_name(&name);
        self.graph.bodies.insert(id, node);
        self.graph.sequences[seq].nodes.insert(index, id);
        self.run_cache.clear();
        debug!(node = %name, %node_type, index, "Added node.");
        Ok(id)
    }

    /// Produces a node from `registry` and appends it.
    pub fn create_node(
        &mut self,
        registry: &NodeRegistry,
        tag: &str,
        name: Option<&str>,
        seq: SequenceId,
        index: Option<usize>,
    ) -> Result<NodeId, ProcedureError> {
        let node = registry.produce(tag)?;
        self.append_node(node, name, seq, index)
    }

    /// Removes `id` together with its branch.
    ///
    /// Keywords elsewhere that referred to any removed node are cleared, observers
    /// receive one [`ProcedureEvent::NodeRemoved`] per removed node, and the remaining
    /// keywords are validated.
    pub fn remove_node(&mut self, id: NodeId) -> Result<(), ProcedureError> {
        let (seq, index) = self
            .graph
            .position(id)
            .ok_or_else(|| ProcedureError::UnknownNode(format!("{:?}", id)))?;
        let removed = self.graph.subtree(id);
        self.graph.sequences[seq].nodes.remove(index);

        let mut events = Vec::with_capacity(removed.len());
        for node in &removed {
            if let Some(info) = self.graph.nodes.remove(*node) {
                if let Some(branch) = info.branch {
                    self.graph.sequences.remove(branch);
                }
                events.push(ProcedureEvent::NodeRemoved {
                    id: *node,
                    name: info.name,
                    node_type: info.node_type,
                });
            }
            self.graph.bodies.remove(*node);
        }

        let mut cleared = 0;
        for (_, body) in self.graph.bodies.iter_mut() {
            for kw in body.keywords_mut() {
                if kw.nodes_removed(&removed) {
                    cleared += 1;
                }
            }
        }
        for event in &events {
            for observer in &self.observers {
                observer(event);
            }
        }
        let repaired = sequence::validate_node_keywords(&mut self.graph);
        self.run_cache.clear();
        info!(
            removed = removed.len(),
            cleared_references = cleared,
            repaired,
            "Removed node."
        );
        Ok(())
    }

    /// Moves `id` to `new_index` within its own sequence.
    ///
    /// The move is reverted if it would make two nodes with the same name visible to each
    /// other. References that end up out of scope are cleared.
    pub fn move_node(&mut self, id: NodeId, new_index: usize) -> Result<(), ProcedureError> {
        let (seq, index) = self
            .graph
            .position(id)
            .ok_or_else(|| ProcedureError::UnknownNode(format!("{:?}", id)))?;
        let nodes = &mut self.graph.sequences[seq].nodes;
        let new_index = new_index.min(nodes.len() - 1);
        if new_index == index {
            return Ok(());
        }
        nodes.remove(index);
        nodes.insert(new_index, id);

        if sequence::has_visible_duplicates(&self.graph) {
            let nodes = &mut self.graph.sequences[seq].nodes;
            nodes.remove(new_index);
            nodes.insert(index, id);
            return Err(ProcedureError::InvalidMove {
                name: self.node_label(id),
                reason: "a node with the same name would become visible".to_string(),
            });
        }
        let repaired = sequence::validate_node_keywords(&mut self.graph);
        if repaired > 0 {
            warn!(
                node = %self.node_label(id),
                repaired,
                "Moving the node cleared references that are no longer in scope."
            );
        }
        self.run_cache.clear();
        Ok(())
    }

    /// Renames `id`. Node-prefixed parameters follow the new name.
    pub fn rename_node(&mut self, id: NodeId, name: &str) -> Result<(), ProcedureError> {
        if !valid_node_name(name) {
            return Err(ProcedureError::InvalidName(name.to_string()));
        }
        let (seq, index) = self
            .graph
            .position(id)
            .ok_or_else(|| ProcedureError::UnknownNode(format!("{:?}", id)))?;
        let conflicts = self.graph.name_conflicts(seq, index, Some(id));
        if self.graph.clashing_node(name, &conflicts).is_some() {
            return Err(ProcedureError::DuplicateName(name.to_string()));
        }
        let info = &mut self.graph.nodes[id];
        info.name = name.to_string();
        info.auto_named = false;
        if let Some(body) = self.graph.bodies.get_mut(id) {
            body.set_name(name);
        }
        self.run_cache.clear();
        Ok(())
    }

    // Scope queries

    /// Finds a node visible from `from` by name, optionally restricted to `allowed` types
    /// (empty = any type).
    pub fn node_in_scope(&self, from: NodeId, name: &str, allowed: &[NodeType]) -> Option<NodeId> {
        self.graph
            .visible_from_node(from)
            .into_iter()
            .find(|id| {
                self.graph.nodes.get(*id).is_some_and(|info| {
                    info.name.eq_ignore_ascii_case(name)
                        && (allowed.is_empty() || allowed.contains(&info.node_type))
                })
            })
    }

    /// Every node visible from `from` of the `allowed` types (empty = any), nearest first.
    pub fn nodes_in_scope(&self, from: NodeId, allowed: &[NodeType]) -> Vec<NodeId> {
        self.graph
            .visible_from_node(from)
            .into_iter()
            .filter(|id| {
                allowed.is_empty()
                    || self
                        .node_type(*id)
                        .is_some_and(|t| allowed.contains(&t))
            })
            .collect()
    }

    /// Finds a node anywhere in the procedure by name.
    pub fn find_node_by_name(&self, name: &str) -> Option<NodeId> {
        self.graph.find_by_name(name)
    }

    /// Parameters visible from `from`, nearest first.
    pub fn parameters_in_scope(&self, from: NodeId) -> Vec<Rc<ExpressionVariable>> {
        Scope::of_node(&self.graph, from, None).parameters()
    }

    pub fn parameter_in_scope(&self, from: NodeId, name: &str) -> Option<Rc<ExpressionVariable>> {
        find_variable(&self.parameters_in_scope(from), name)
    }

    // Keywords

    fn edit_keyword(
        &mut self,
        id: NodeId,
        keyword: &str,
        core_data: Option<&CoreData>,
        edit: impl FnOnce(&mut dyn Keyword, &Scope<'_>) -> Result<(), KeywordError>,
    ) -> Result<(), ProcedureError> {
        let label = self.node_label(id);
        let result = sequence::with_body_in_scope(&mut self.graph, id, core_data, |body, scope| {
            match find_keyword(body.keywords_mut(), keyword) {
                Some(kw) => edit(kw, scope),
                None => Err(KeywordError::Unrecognised(keyword.to_string())),
            }
        })
        .ok_or_else(|| ProcedureError::UnknownNode(label.clone()))?;
        result.map_err(|source| ProcedureError::Keyword {
            node: label,
            keyword: keyword.to_string(),
            source,
        })?;
        sequence::validate_node_keywords(&mut self.graph);
        self.run_cache.clear();
        Ok(())
    }

    /// Sets a keyword from its persisted form.
    ///
    /// With `core_data`, species names are checked against the registered species.
    pub fn set_keyword(
        &mut self,
        id: NodeId,
        keyword: &str,
        value: &toml::Value,
        core_data: Option<&CoreData>,
    ) -> Result<(), ProcedureError> {
        self.edit_keyword(id, keyword, core_data, |kw, scope| kw.deserialise(value, scope))
    }

    /// Sets a keyword from the arguments of a legacy keyword line.
    pub fn parse_keyword(
        &mut self,
        id: NodeId,
        keyword: &str,
        args: &[String],
        core_data: Option<&CoreData>,
    ) -> Result<(), ProcedureError> {
        self.edit_keyword(id, keyword, core_data, |kw, scope| kw.parse_args(args, scope))
    }

    /// The persisted form of a keyword, or `None` if it is unset or unknown.
    pub fn keyword_value(&self, id: NodeId, keyword: &str) -> Option<toml::Value> {
        let body = self.graph.bodies.get(id)?;
        let scope = Scope::of_node(&self.graph, id, None);
        body.keywords()
            .into_iter()
            .find(|kw| kw.name().eq_ignore_ascii_case(keyword))?
            .serialise(&scope)
            .ok()
            .flatten()
    }

    /// `(name, value, explicitly set)` for every keyword of `id`.
    pub fn describe_keywords(&self, id: NodeId) -> Vec<(&'static str, String, bool)> {
        let Some(body) = self.graph.bodies.get(id) else {
            return Vec::new();
        };
        let scope = Scope::of_node(&self.graph, id, None);
        body.keywords()
            .into_iter()
            .map(|kw| (kw.name(), kw.display_value(&scope), kw.is_set()))
            .collect()
    }

    // Validation

    /// Repairs keywords against the current structure and returns how many changed.
    pub fn validate_node_keywords(&mut self) -> usize {
        let changed = sequence::validate_node_keywords(&mut self.graph);
        if changed > 0 {
            self.run_cache.clear();
        }
        changed
    }

    /// Reports every scoping problem without changing anything.
    pub fn check(&self) -> Vec<ScopeViolation> {
        sequence::check(&self.graph)
    }

    // Execution

    /// Runs the procedure: prepares, executes and finalises every node.
    ///
    /// # Errors
    ///
    /// The first node failure stops the run and is returned as
    /// [`ProcedureError::Execution`]. Nodes after the failing one are not run and nothing
    /// is finalised.
    #[instrument(skip_all, name = "procedure_execute", fields(configuration = %ctx.configuration().name()))]
    pub fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), ProcedureError> {
        let names = self
            .graph
            .nodes
            .iter()
            .map(|(id, info)| (id, info.name.clone()));
        ctx.begin_run(names);
        let root = self.graph.root;
        let top_level = self.sequence(root).len() as u64;
        info!(nodes = self.graph.nodes.len(), "Running procedure.");

        ctx.report(Progress::PhaseStart { name: "Preparing" });
        let prepared = prepare_sequence(&mut self.graph, root, ctx);
        ctx.report(Progress::PhaseFinish);
        prepared?;

        ctx.report(Progress::PhaseStart { name: "Executing" });
        ctx.report(Progress::TaskStart {
            total_steps: top_level,
        });
        let executed = execute_sequence(&mut self.graph, root, ctx, true);
        ctx.report(Progress::TaskFinish);
        ctx.report(Progress::PhaseFinish);
        executed?;

        ctx.report(Progress::PhaseStart { name: "Finalising" });
        let finalised = finalise_sequence(&mut self.graph, root, ctx);
        ctx.report(Progress::PhaseFinish);
        finalised?;

        ctx.set_current(None);
        info!(
            molecules = ctx.configuration().n_molecules(),
            atoms = ctx.configuration().n_atoms(),
            "Procedure complete."
        );
        Ok(())
    }

    /// Runs the procedure unless the configuration is unchanged since the last
    /// successful run.
    ///
    /// # Return
    ///
    /// `true` if the procedure ran.
    pub fn execute_if_changed(&mut self, ctx: &mut ProcedureContext) -> Result<bool, ProcedureError> {
        let id = ctx.configuration().id();
        let version = ctx.configuration().version();
        if self.run_cache.get(&id) == Some(&version) {
            debug!(configuration = %id, version, "Configuration unchanged; skipping run.");
            return Ok(false);
        }
        match self.execute(ctx) {
            Ok(()) => {
                self.run_cache.insert(id, ctx.configuration().version());
                Ok(true)
            }
            Err(e) => {
                self.run_cache.remove(&id);
                Err(e)
            }
        }
    }
}

fn call_node<'a, T>(
    graph: &mut Graph,
    id: NodeId,
    phase: Phase,
    ctx: &mut ProcedureContext<'a>,
    f: impl FnOnce(&mut dyn ProcedureNode, &mut ProcedureContext<'a>) -> Result<T, NodeError>,
) -> Result<T, ProcedureError> {
    let missing = || ProcedureError::UnknownNode(format!("{:?}", id));
    let info = graph.nodes.get(id).ok_or_else(missing)?;
    let (node, node_type) = (info.name.clone(), info.node_type);
    let body = graph.bodies.get_mut(id).ok_or_else(missing)?;
    ctx.set_current(Some(id));
    let result = f(body.as_mut(), ctx);
    ctx.set_current(None);
    result.map_err(|source| {
        warn!(%node, %phase, error = %source, "Node failed.");
        ProcedureError::Execution {
            node,
            node_type,
            phase,
            source,
        }
    })
}

fn sequence_nodes(graph: &Graph, seq: SequenceId) -> Vec<NodeId> {
    graph
        .sequences
        .get(seq)
        .map(|s| s.nodes.clone())
        .unwrap_or_default()
}

fn prepare_sequence(
    graph: &mut Graph,
    seq: SequenceId,
    ctx: &mut ProcedureContext,
) -> Result<(), ProcedureError> {
    for id in sequence_nodes(graph, seq) {
        call_node(graph, id, Phase::Prepare, ctx, |node, ctx| node.prepare(ctx))?;
        if let Some(branch) = graph.nodes.get(id).and_then(|info| info.branch) {
            prepare_sequence(graph, branch, ctx)?;
        }
    }
    Ok(())
}

fn execute_sequence(
    graph: &mut Graph,
    seq: SequenceId,
    ctx: &mut ProcedureContext,
    top_level: bool,
) -> Result<(), ProcedureError> {
    for id in sequence_nodes(graph, seq) {
        call_node(graph, id, Phase::Execute, ctx, |node, ctx| node.execute(ctx))?;
        if let Some(branch) = graph.nodes.get(id).and_then(|info| info.branch) {
            while call_node(graph, id, Phase::Execute, ctx, |node, ctx| {
                node.next_branch_pass(ctx)
            })? {
                execute_sequence(graph, branch, ctx, false)?;
            }
        }
        if top_level {
            ctx.report(Progress::TaskIncrement);
        }
    }
    Ok(())
}

fn finalise_sequence(
    graph: &mut Graph,
    seq: SequenceId,
    ctx: &mut ProcedureContext,
) -> Result<(), ProcedureError> {
    for id in sequence_nodes(graph, seq) {
        if let Some(branch) = graph.nodes.get(id).and_then(|info| info.branch) {
            finalise_sequence(graph, branch, ctx)?;
        }
        call_node(graph, id, Phase::Finalise, ctx, |node, ctx| node.finalise(ctx))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::configuration::Configuration;
    use crate::core::pool::ProcessPool;
    use crate::engine::nodes::general::{ParametersNode, RepeatNode};
    use std::cell::RefCell;
    use toml::Value;

    fn registry() -> NodeRegistry {
        NodeRegistry::with_defaults()
    }

    #[test]
    fn generated_names_are_unique() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let a = proc.create_node(&reg, "Add", None, root, None).unwrap();
        let b = proc.create_node(&reg, "Add", None, root, None).unwrap();
        assert_eq!(proc.name(a), Some("Add01"));
        assert_eq!(proc.name(b), Some("Add02"));
    }

    #[test]
    fn named_node_types_require_a_name() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        assert!(matches!(
            proc.create_node(&reg, "Pick", None, root, None),
            Err(ProcedureError::NameRequired(NodeType::Pick))
        ));
        assert!(proc.is_empty());
    }

    #[test]
    fn clashing_names_are_rejected_in_either_direction() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let repeat = proc
            .create_node(&reg, "Repeat", Some("Loop"), root, None)
            .unwrap();
        let branch = proc.branch_of(repeat).unwrap();
        proc.create_node(&reg, "Box", Some("Inner"), branch, None)
            .unwrap();

        // Inserting before the loop would be seen by the branch.
        assert!(matches!(
            proc.create_node(&reg, "Box", Some("inner"), root, Some(0)),
            Err(ProcedureError::DuplicateName(_))
        ));
        // Appending after the loop is fine; nothing inside the branch can see it.
        proc.create_node(&reg, "Box", Some("Inner"), root, None)
            .unwrap();
        assert_eq!(proc.n_nodes(), 3);
    }

    #[test]
    fn removal_notifies_observers_for_the_whole_subtree() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let repeat = proc
            .create_node(&reg, "Repeat", Some("Loop"), root, None)
            .unwrap();
        let branch = proc.branch_of(repeat).unwrap();
        proc.create_node(&reg, "Add", None, branch, None).unwrap();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        proc.subscribe(move |event| {
            let ProcedureEvent::NodeRemoved { name, .. } = event;
            sink.borrow_mut().push(name.clone());
        });
        proc.remove_node(repeat).unwrap();
        assert_eq!(*seen.borrow(), ["Loop", "Add01"]);
        assert!(proc.is_empty());
        assert!(!proc.contains(repeat));
        assert!(proc.sequence(branch).is_empty());
    }

    #[test]
    fn move_reverts_on_name_clash() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let repeat = proc
            .create_node(&reg, "Repeat", Some("Loop"), root, None)
            .unwrap();
        let branch = proc.branch_of(repeat).unwrap();
        proc.create_node(&reg, "Box", Some("Cell"), branch, None)
            .unwrap();
        let cell = proc
            .create_node(&reg, "Box", Some("Cell"), root, None)
            .unwrap();

        assert!(matches!(
            proc.move_node(cell, 0),
            Err(ProcedureError::InvalidMove { .. })
        ));
        assert_eq!(proc.sequence(root), &[repeat, cell]);
    }

    #[test]
    fn renaming_updates_prefixed_parameters() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let repeat = proc
            .create_node(&reg, "Repeat", Some("Loop"), root, None)
            .unwrap();
        let branch = proc.branch_of(repeat).unwrap();
        let inner = proc.create_node(&reg, "Box", None, branch, None).unwrap();
        assert!(proc.parameter_in_scope(inner, "Loop.iteration").is_some());

        proc.rename_node(repeat, "Cycle").unwrap();
        assert!(proc.parameter_in_scope(inner, "Cycle.iteration").is_some());
        assert!(proc.parameter_in_scope(inner, "Loop.iteration").is_none());
        assert!(matches!(
            proc.rename_node(repeat, "Box01"),
            Err(ProcedureError::DuplicateName(_))
        ));
        assert!(matches!(
            proc.rename_node(repeat, "a.b"),
            Err(ProcedureError::InvalidName(_))
        ));
    }

    #[test]
    fn unknown_keywords_are_reported_against_the_node() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let params = proc
            .create_node(&reg, "Parameters", Some("P"), root, None)
            .unwrap();
        let err = proc
            .set_keyword(params, "Colour", &Value::String("red".into()), None)
            .unwrap_err();
        assert!(matches!(
            err,
            ProcedureError::Keyword { ref node, source: KeywordError::Unrecognised(_), .. } if node == "P"
        ));
    }

    #[test]
    fn repeat_runs_its_branch_count_times() {
        let reg = registry();
        let mut proc = Procedure::new(NodeContext::Generation);
        let root = proc.root();
        let params = proc
            .create_node(&reg, "Parameters", Some("P"), root, None)
            .unwrap();
        proc.parse_keyword(params, "Parameter", &["n".into(), "3".into()], None)
            .unwrap();
        let repeat = proc
            .create_node(&reg, "Repeat", Some("Loop"), root, None)
            .unwrap();
        proc.set_keyword(repeat, "Count", &Value::String("n+1".into()), None)
            .unwrap();

        let mut cfg = Configuration::new("Test");
        let data = CoreData::new();
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        proc.execute(&mut ctx).unwrap();

        let body = proc.node_body::<RepeatNode>(repeat).unwrap();
        assert_eq!(body.completed_passes(), 4);
        assert!(proc.node_body::<ParametersNode>(repeat).is_none());
    }
}
