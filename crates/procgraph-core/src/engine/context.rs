use super::error::NodeError;
use super::graph::NodeId;
use super::progress::{Progress, ProgressReporter};
use super::region::Region;
use crate::core::data::CoreData;
use crate::core::models::configuration::Configuration;
use crate::core::models::ids::MoleculeId;
use crate::core::pool::ProcessPool;
use slotmap::SecondaryMap;

/// Data published by nodes during one run, keyed by the producing node.
#[derive(Debug, Default)]
pub struct RunOutputs {
    selections: SecondaryMap<NodeId, Vec<MoleculeId>>,
    regions: SecondaryMap<NodeId, Region>,
}

/// Everything a node can reach while it runs.
pub struct ProcedureContext<'a> {
    configuration: &'a mut Configuration,
    core_data: &'a CoreData,
    pool: &'a ProcessPool,
    reporter: Option<&'a ProgressReporter<'a>>,
    outputs: RunOutputs,
    names: SecondaryMap<NodeId, String>,
    current: Option<NodeId>,
}

impl<'a> ProcedureContext<'a> {
    pub fn new(
        configuration: &'a mut Configuration,
        core_data: &'a CoreData,
        pool: &'a ProcessPool,
    ) -> Self {
        Self {
            configuration,
            core_data,
            pool,
            reporter: None,
            outputs: RunOutputs::default(),
            names: SecondaryMap::new(),
            current: None,
        }
    }

    pub fn with_reporter(mut self, reporter: &'a ProgressReporter<'a>) -> Self {
        self.reporter = Some(reporter);
        self
    }

    pub fn configuration(&self) -> &Configuration {
        &*self.configuration
    }

    pub fn configuration_mut(&mut self) -> &mut Configuration {
        &mut *self.configuration
    }

    pub fn core_data(&self) -> &'a CoreData {
        self.core_data
    }

    pub fn pool(&self) -> &'a ProcessPool {
        self.pool
    }

    pub(crate) fn report(&self, event: Progress) {
        if let Some(reporter) = self.reporter {
            reporter.report(event);
        }
    }

    /// Forwards a human-readable line to the progress reporter, if any.
    pub fn message(&self, text: impl Into<String>) {
        if let Some(reporter) = self.reporter {
            reporter.message(text);
        }
    }

    /// Starts a fresh run: clears outputs and records the names of all nodes.
    pub(crate) fn begin_run(&mut self, names: impl IntoIterator<Item = (NodeId, String)>) {
        self.outputs = RunOutputs::default();
        self.names = names.into_iter().collect();
        self.current = None;
    }

    pub(crate) fn set_current(&mut self, node: Option<NodeId>) {
        self.current = node;
    }

    /// The node currently being run.
    pub fn current_node(&self) -> Option<NodeId> {
        self.current
    }

    pub fn node_name(&self, id: NodeId) -> String {
        self.names
            .get(id)
            .cloned()
            .unwrap_or_else(|| "<unknown node>".to_string())
    }

    /// Publishes the molecules picked by the current node.
    pub fn publish_selection(&mut self, molecules: Vec<MoleculeId>) {
        if let Some(id) = self.current {
            self.outputs.selections.insert(id, molecules);
        }
    }

    pub fn clear_selection(&mut self) {
        if let Some(id) = self.current {
            self.outputs.selections.remove(id);
        }
    }

    pub fn selection(&self, producer: NodeId) -> Option<&[MoleculeId]> {
        self.outputs.selections.get(producer).map(Vec::as_slice)
    }

    /// The selection published by `producer`, with molecules removed since dropped.
    pub fn require_selection(&self, producer: NodeId) -> Result<Vec<MoleculeId>, NodeError> {
        let selection = self
            .selection(producer)
            .ok_or_else(|| NodeError::MissingOutput {
                producer: self.node_name(producer),
                what: "selection",
            })?;
        Ok(selection
            .iter()
            .copied()
            .filter(|m| self.configuration.contains_molecule(*m))
            .collect())
    }

    pub fn publish_region(&mut self, region: Region) {
        if let Some(id) = self.current {
            self.outputs.regions.insert(id, region);
        }
    }

    pub fn require_region(&self, producer: NodeId) -> Result<&Region, NodeError> {
        self.outputs
            .regions
            .get(producer)
            .ok_or_else(|| NodeError::MissingOutput {
                producer: self.node_name(producer),
                what: "region",
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn outputs_are_keyed_by_the_current_node() {
        let mut ids: SlotMap<NodeId, ()> = SlotMap::with_key();
        let pick = ids.insert(());
        let other = ids.insert(());
        let mut cfg = Configuration::new("Bulk");
        let data = CoreData::new();
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        ctx.begin_run([(pick, "Sel".to_string()), (other, "Other".to_string())]);

        ctx.set_current(Some(pick));
        ctx.publish_selection(Vec::new());
        assert!(ctx.require_selection(pick).unwrap().is_empty());

        let err = ctx.require_selection(other).unwrap_err();
        assert_eq!(
            err,
            NodeError::MissingOutput {
                producer: "Other".into(),
                what: "selection"
            }
        );
        assert!(ctx.require_region(pick).is_err());

        ctx.begin_run([(pick, "Sel".to_string())]);
        assert!(ctx.selection(pick).is_none());
    }
}
