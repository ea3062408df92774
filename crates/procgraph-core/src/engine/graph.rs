use super::node::{NodeContext, NodeType, ProcedureNode};
use slotmap::{SecondaryMap, SlotMap, new_key_type};

new_key_type! {
    /// Identity of a node within one procedure. Stale ids resolve to nothing.
    pub struct NodeId;
    /// Identity of a node sequence within one procedure.
    pub struct SequenceId;
}

/// Identity and placement of a node; the node body is stored separately.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub name: String,
    pub node_type: NodeType,
    /// Sequence the node lives in.
    pub scope: SequenceId,
    /// Child sequence owned by the node, if it declares one.
    pub branch: Option<SequenceId>,
    /// Whether the name was generated rather than given.
    pub auto_named: bool,
}

#[derive(Debug, Clone)]
pub struct NodeSequence {
    /// Node owning this sequence as its branch; `None` for the root.
    pub owner: Option<NodeId>,
    pub context: NodeContext,
    /// Keyword the sequence is persisted under inside its owner.
    pub block_keyword: &'static str,
    pub nodes: Vec<NodeId>,
}

/// Arena holding every node and sequence of a procedure.
pub(crate) struct Graph {
    pub nodes: SlotMap<NodeId, NodeInfo>,
    pub bodies: SecondaryMap<NodeId, Box<dyn ProcedureNode>>,
    pub sequences: SlotMap<SequenceId, NodeSequence>,
    pub root: SequenceId,
}

impl Graph {
    pub fn new(context: NodeContext) -> Self {
        let mut sequences = SlotMap::with_key();
        let root = sequences.insert(NodeSequence {
            owner: None,
            context,
            block_keyword: "Procedure",
            nodes: Vec::new(),
        });
        Self {
            nodes: SlotMap::with_key(),
            bodies: SecondaryMap::new(),
            sequences,
            root,
        }
    }

    pub fn position(&self, id: NodeId) -> Option<(SequenceId, usize)> {
        let info = self.nodes.get(id)?;
        let index = self.sequences.get(info.scope)?.nodes.iter().position(|n| *n == id)?;
        Some((info.scope, index))
    }

    /// The context nodes in `seq` must accept, resolving `Inherit` through owners.
    pub fn effective_context(&self, seq: SequenceId) -> NodeContext {
        let mut current = seq;
        loop {
            let Some(sequence) = self.sequences.get(current) else {
                return NodeContext::Any;
            };
            if sequence.context != NodeContext::Inherit {
                return sequence.context;
            }
            match sequence.owner.and_then(|o| self.nodes.get(o)) {
                Some(owner) => current = owner.scope,
                None => return NodeContext::Any,
            }
        }
    }

    /// Nodes visible from position `index` of `seq`, nearest first.
    ///
    /// These are the earlier siblings, then the owner of the sequence, then everything
    /// visible from the owner.
    pub fn visible_from(&self, seq: SequenceId, index: usize) -> Vec<NodeId> {
        let mut visible = Vec::new();
        let mut current = Some((seq, index));
        while let Some((s, i)) = current {
            let Some(sequence) = self.sequences.get(s) else {
                break;
            };
            let end = i.min(sequence.nodes.len());
            visible.extend(sequence.nodes[..end].iter().rev().copied());
            current = sequence.owner.and_then(|owner| {
                visible.push(owner);
                self.position(owner)
            });
        }
        visible
    }

    /// Nodes visible from `id` itself.
    pub fn visible_from_node(&self, id: NodeId) -> Vec<NodeId> {
        self.position(id)
            .map(|(seq, index)| self.visible_from(seq, index))
            .unwrap_or_default()
    }

    /// Every node in `seq` and, recursively, in the branches of those nodes.
    pub fn sequence_subtree(&self, seq: SequenceId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_sequence(seq, &mut out);
        out
    }

    fn collect_sequence(&self, seq: SequenceId, out: &mut Vec<NodeId>) {
        if let Some(sequence) = self.sequences.get(seq) {
            for id in &sequence.nodes {
                self.collect_node(*id, out);
            }
        }
    }

    fn collect_node(&self, id: NodeId, out: &mut Vec<NodeId>) {
        out.push(id);
        if let Some(branch) = self.nodes.get(id).and_then(|info| info.branch) {
            self.collect_sequence(branch, out);
        }
    }

    /// `id` followed by every node in its branch, depth first.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if self.nodes.contains_key(id) {
            self.collect_node(id, &mut out);
        }
        out
    }

    /// Nodes whose names must differ from a node placed at `index` of `seq`.
    ///
    /// With `placed` set, the node already sits at `index` and its own subtree is
    /// included. Without it, a new node is about to be inserted at `index`.
    pub fn name_conflicts(&self, seq: SequenceId, index: usize, placed: Option<NodeId>) -> Vec<NodeId> {
        let mut out = self.visible_from(seq, index);
        if let Some(sequence) = self.sequences.get(seq) {
            let later = if placed.is_some() { index + 1 } else { index };
            for id in sequence.nodes.iter().skip(later) {
                self.collect_node(*id, &mut out);
            }
        }
        if let Some(id) = placed {
            out.extend(self.subtree(id).into_iter().skip(1));
        }
        out
    }

    pub fn clashing_node(&self, name: &str, candidates: &[NodeId]) -> Option<NodeId> {
        candidates.iter().copied().find(|id| {
            self.nodes
                .get(*id)
                .is_some_and(|info| info.name.eq_ignore_ascii_case(name))
        })
    }

    /// Finds a node anywhere in the procedure by name, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.nodes
            .iter()
            .find(|(_, info)| info.name.eq_ignore_ascii_case(name))
            .map(|(id, _)| id)
    }

    /// A name of the form `<Tag><NN>` not used by any node.
    pub fn unique_name(&self, node_type: NodeType) -> String {
        (1..)
            .map(|n| format!("{}{:02}", node_type.tag(), n))
            .find(|candidate| self.find_by_name(candidate).is_none())
            .unwrap_or_else(|| node_type.tag().to_string())
    }

    /// Every node in execution order.
    pub fn all_nodes(&self) -> Vec<NodeId> {
        self.sequence_subtree(self.root)
    }
}
