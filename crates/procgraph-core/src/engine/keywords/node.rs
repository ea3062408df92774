use super::{Keyword, KeywordInfo, KeywordScope, expect_args, kind_name};
use crate::engine::error::KeywordError;
use crate::engine::graph::NodeId;
use crate::engine::node::{NodeType, describe_types};
use toml::Value;
use tracing::warn;

/// Resolves `name` to a node visible in `scope` whose type is in `allowed`.
fn resolve(
    name: &str,
    allowed: &[NodeType],
    scope: &dyn KeywordScope,
) -> Result<NodeId, KeywordError> {
    let (id, node_type) = scope
        .find_node(name)
        .ok_or_else(|| KeywordError::NodeNotInScope(name.to_string()))?;
    if !allowed.is_empty() && !allowed.contains(&node_type) {
        return Err(KeywordError::WrongNodeType {
            name: name.to_string(),
            found: node_type,
            allowed: describe_types(allowed),
        });
    }
    Ok(id)
}

fn node_label(id: NodeId, scope: &dyn KeywordScope) -> String {
    scope
        .node_name(id)
        .unwrap_or_else(|| "<removed node>".to_string())
}

/// A reference to one other node, held by identity and resolved by name through scope.
#[derive(Debug, Clone)]
pub struct NodeKeyword {
    info: KeywordInfo,
    target: Option<NodeId>,
    allowed: &'static [NodeType],
}

impl NodeKeyword {
    /// Creates an unset reference accepting nodes of the `allowed` types (empty = any).
    pub fn new(name: &'static str, description: &'static str, allowed: &'static [NodeType]) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            target: None,
            allowed,
        }
    }

    pub fn get(&self) -> Option<NodeId> {
        self.target
    }

    pub fn allowed(&self) -> &'static [NodeType] {
        self.allowed
    }

    /// Points the keyword at the node called `name`, or clears it when `name` is empty.
    pub fn set_by_name(&mut self, name: &str, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        self.target = if name.is_empty() {
            None
        } else {
            Some(resolve(name, self.allowed, scope)?)
        };
        self.info.set = true;
        Ok(())
    }
}

impl Keyword for NodeKeyword {
    fn name(&self) -> &'static str {
        self.info.name
    }

    fn description(&self) -> &'static str {
        self.info.description
    }

    fn is_set(&self) -> bool {
        self.info.set
    }

    fn is_default(&self) -> bool {
        self.target.is_none()
    }

    fn serialise(&self, scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        let Some(id) = self.target else {
            return Ok(None);
        };
        let name = scope
            .node_name(id)
            .ok_or_else(|| KeywordError::NodeNotInScope(node_label(id, scope)))?;
        Ok(Some(Value::String(name)))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        match value {
            Value::String(name) => self.set_by_name(name, scope),
            other => Err(KeywordError::WrongKind {
                expected: "a node name",
                found: kind_name(other),
            }),
        }
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        expect_args(args, "1", |n| n == 1)?;
        self.set_by_name(&args[0], scope)
    }

    fn validate(&mut self, scope: &dyn KeywordScope) -> bool {
        match self.target {
            Some(id) if !scope.is_visible(id) => {
                warn!(
                    keyword = self.info.name,
                    target = %node_label(id, scope),
                    "Clearing reference to a node that is no longer in scope."
                );
                self.target = None;
                true
            }
            _ => false,
        }
    }

    fn nodes_removed(&mut self, removed: &[NodeId]) -> bool {
        match self.target {
            Some(id) if removed.contains(&id) => {
                self.target = None;
                true
            }
            _ => false,
        }
    }

    fn check(&self, scope: &dyn KeywordScope) -> Option<String> {
        let id = self.target?;
        match scope.node_name(id) {
            None => Some("refers to a node that no longer exists".to_string()),
            Some(name) if !scope.is_visible(id) => {
                Some(format!("refers to node '{}', which is not in scope", name))
            }
            Some(_) => None,
        }
    }

    fn referenced_nodes(&self) -> Vec<NodeId> {
        self.target.into_iter().collect()
    }

    fn display_value(&self, scope: &dyn KeywordScope) -> String {
        self.target
            .map_or_else(|| "<none>".to_string(), |id| node_label(id, scope))
    }
}

/// An ordered list of distinct node references.
#[derive(Debug, Clone)]
pub struct NodeVectorKeyword {
    info: KeywordInfo,
    targets: Vec<NodeId>,
    allowed: &'static [NodeType],
}

impl NodeVectorKeyword {
    pub fn new(name: &'static str, description: &'static str, allowed: &'static [NodeType]) -> Self {
        Self {
            info: KeywordInfo::new(name, description),
            targets: Vec::new(),
            allowed,
        }
    }

    pub fn get(&self) -> &[NodeId] {
        &self.targets
    }

    /// Replaces the list with the named nodes. Fails without changes if any name does not
    /// resolve or appears twice.
    pub fn set_by_names<S: AsRef<str>>(
        &mut self,
        names: &[S],
        scope: &dyn KeywordScope,
    ) -> Result<(), KeywordError> {
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let id = resolve(name.as_ref(), self.allowed, scope)?;
            if targets.contains(&id) {
                return Err(KeywordError::DuplicateEntry(name.as_ref().to_string()));
            }
            targets.push(id);
        }
        self.targets = targets;
        self.info.set = true;
        Ok(())
    }
}

impl Keyword for NodeVectorKeyword {
    fn name(&self) -> &'static str {
        self.info.name
    }

    fn description(&self) -> &'static str {
        self.info.description
    }

    fn is_set(&self) -> bool {
        self.info.set
    }

    fn is_default(&self) -> bool {
        self.targets.is_empty()
    }

    fn serialise(&self, scope: &dyn KeywordScope) -> Result<Option<Value>, KeywordError> {
        if !self.info.set {
            return Ok(None);
        }
        let names = self
            .targets
            .iter()
            .map(|id| {
                scope
                    .node_name(*id)
                    .map(Value::String)
                    .ok_or_else(|| KeywordError::NodeNotInScope(node_label(*id, scope)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(Value::Array(names)))
    }

    fn deserialise(&mut self, value: &Value, scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        let names = match value {
            Value::String(s) => vec![s.clone()],
            Value::Array(items) => items
                .iter()
                .map(|item| {
                    item.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| KeywordError::WrongKind {
                            expected: "a node name",
                            found: kind_name(item),
                        })
                })
                .collect::<Result<Vec<_>, _>>()?,
            other => {
                return Err(KeywordError::WrongKind {
                    expected: "a list of node names",
                    found: kind_name(other),
                });
            }
        };
        self.set_by_names(names.as_slice(), scope)
    }

    fn parse_args(&mut self, args: &[String], scope: &dyn KeywordScope) -> Result<(), KeywordError> {
        self.set_by_names(args, scope)
    }

    fn validate(&mut self, scope: &dyn KeywordScope) -> bool {
        let before = self.targets.len();
        self.targets.retain(|id| scope.is_visible(*id));
        if self.targets.len() != before {
            warn!(
                keyword = self.info.name,
                dropped = before - self.targets.len(),
                "Dropped references to nodes that are no longer in scope."
            );
            return true;
        }
        false
    }

    fn nodes_removed(&mut self, removed: &[NodeId]) -> bool {
        let before = self.targets.len();
        self.targets.retain(|id| !removed.contains(id));
        self.targets.len() != before
    }

    fn check(&self, scope: &dyn KeywordScope) -> Option<String> {
        let problems: Vec<String> = self
            .targets
            .iter()
            .filter(|id| !scope.is_visible(**id))
            .map(|id| node_label(*id, scope))
            .collect();
        (!problems.is_empty())
            .then(|| format!("refers to nodes not in scope: {}", problems.join(", ")))
    }

    fn referenced_nodes(&self) -> Vec<NodeId> {
        self.targets.clone()
    }

    fn display_value(&self, scope: &dyn KeywordScope) -> String {
        self.targets
            .iter()
            .map(|id| node_label(*id, scope))
            .collect::<Vec<_>>()
            .join(", ")
    }
}
