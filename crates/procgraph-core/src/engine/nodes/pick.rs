//! Nodes that pick molecules and publish them as a selection.
//!
//! A selection is published under the picking node's id for the rest of the run. `Pick`,
//! `PickProximity` and `PickRegion` drop theirs in `finalise`. `IterateSelection`
//! republishes a one-molecule selection for each pass of its branch.

use crate::core::expression::{ExpressionValue, ExpressionVariable};
use crate::core::models::ids::MoleculeId;
use crate::core::pool::ProcessPool;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::keywords::{DoubleKeyword, NodeKeyword, OptionalKeyword, SpeciesVectorKeyword};
use crate::engine::node::{BranchSpec, GENERATION_ONLY, NodeContext, NodeType, ProcedureNode};
use nalgebra::Point3;
use std::rc::Rc;
use tracing::info;

fn from_keyword() -> NodeKeyword {
    NodeKeyword::new(
        "From",
        "Selection to pick from (default is the whole configuration)",
        NodeType::PICK_FAMILY,
    )
}

/// Molecules to pick from: the `From` selection, or every molecule, optionally
/// restricted to `species`.
fn candidates(
    ctx: &ProcedureContext,
    from: &NodeKeyword,
    species: &SpeciesVectorKeyword,
) -> Result<Vec<MoleculeId>, NodeError> {
    let pool = match from.get() {
        Some(producer) => ctx.require_selection(producer)?,
        None => ctx.configuration().molecules().map(|(id, _)| id).collect(),
    };
    if species.is_empty() {
        return Ok(pool);
    }
    let wanted = species.resolve(ctx.core_data())?;
    let cfg = ctx.configuration();
    Ok(pool
        .into_iter()
        .filter(|id| {
            cfg.molecule(*id)
                .is_some_and(|m| wanted.contains(&m.species()))
        })
        .collect())
}

/// Keeps a random `fraction` of `molecules`, rounded to nearest, in their original order.
fn random_subset(molecules: Vec<MoleculeId>, fraction: f64, pool: &ProcessPool) -> Vec<MoleculeId> {
    let keep = (molecules.len() as f64 * fraction).round() as usize;
    let mut indices: Vec<usize> = (0..molecules.len()).collect();
    let mut chosen = Vec::with_capacity(keep);
    for _ in 0..keep {
        match pool.random_index(indices.len()) {
            Some(i) => chosen.push(indices.swap_remove(i)),
            None => break,
        }
    }
    chosen.sort_unstable();
    chosen.into_iter().map(|i| molecules[i]).collect()
}

/// Picks molecules by species, optionally keeping only a random fraction.
#[derive(Debug)]
pub struct PickNode {
    species: SpeciesVectorKeyword,
    from: NodeKeyword,
    fraction: OptionalKeyword<f64>,
}

impl Default for PickNode {
    fn default() -> Self {
        Self {
            species: SpeciesVectorKeyword::new("Species", "Species to pick (default is all)"),
            from: from_keyword(),
            fraction: OptionalKeyword::new(
                "Fraction",
                "Fraction of the matching molecules to pick at random",
                None,
                0.0,
                Some(1.0),
                "All",
            ),
        }
    }
}

impl ProcedureNode for PickNode {
    fn node_type(&self) -> NodeType {
        NodeType::Pick
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let mut picked = candidates(ctx, &self.from, &self.species)?;
        if let Some(fraction) = self.fraction.get() {
            picked = random_subset(picked, fraction, ctx.pool());
        }
        info!("[Pick] Picked {} molecule(s).", picked.len());
        ctx.publish_selection(picked);
        Ok(())
    }

    fn finalise(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        ctx.clear_selection();
        Ok(())
    }

    crate::node_keywords!(species, from, fraction);
}

/// Picks molecules by how many molecules of other species sit within a cutoff.
#[derive(Debug)]
pub struct PickProximityNode {
    from: NodeKeyword,
    species: SpeciesVectorKeyword,
    proximal_species: SpeciesVectorKeyword,
    distance: DoubleKeyword,
    min_count: OptionalKeyword<i64>,
    max_count: OptionalKeyword<i64>,
}

impl Default for PickProximityNode {
    fn default() -> Self {
        Self {
            from: from_keyword(),
            species: SpeciesVectorKeyword::new("Species", "Species to pick (default is all)"),
            proximal_species: SpeciesVectorKeyword::new(
                "ProximalSpecies",
                "Species counted as neighbours (default is all)",
            ),
            distance: DoubleKeyword::new("Distance", "Neighbour cutoff distance", 5.0)
                .with_range(Some(0.0), None),
            min_count: OptionalKeyword::new(
                "MinCount",
                "Minimum number of neighbours",
                None,
                -1,
                None,
                "Off",
            ),
            max_count: OptionalKeyword::new(
                "MaxCount",
                "Maximum number of neighbours",
                None,
                -1,
                None,
                "Off",
            ),
        }
    }
}

impl ProcedureNode for PickProximityNode {
    fn node_type(&self) -> NodeType {
        NodeType::PickProximity
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        if !(self.distance.get() > 0.0) {
            return Err(NodeError::InvalidValue {
                keyword: "Distance",
                message: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let targets = candidates(ctx, &self.from, &self.species)?;
        let proximal = self.proximal_species.resolve(ctx.core_data())?;
        let cfg = ctx.configuration();
        let cell = cfg.cell();
        let neighbours: Vec<(MoleculeId, Point3<f64>)> = cfg
            .molecules()
            .filter(|(_, m)| proximal.is_empty() || proximal.contains(&m.species()))
            .map(|(id, m)| (id, m.centre_of_geometry(cell)))
            .collect();

        let cutoff = self.distance.get();
        let (min, max) = (self.min_count.get(), self.max_count.get());
        let picked: Vec<MoleculeId> = targets
            .into_iter()
            .filter(|id| {
                let Some(molecule) = cfg.molecule(*id) else {
                    return false;
                };
                let centre = molecule.centre_of_geometry(cell);
                let count = neighbours
                    .iter()
                    .filter(|(other, r)| {
                        other != id && cell.minimum_image_distance(&centre, r) <= cutoff
                    })
                    .count() as i64;
                min.is_none_or(|m| count >= m) && max.is_none_or(|m| count <= m)
            })
            .collect();

        info!(
            "[PickProximity] Picked {} molecule(s) with neighbour counts in range.",
            picked.len()
        );
        ctx.publish_selection(picked);
        Ok(())
    }

    fn finalise(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        ctx.clear_selection();
        Ok(())
    }

    crate::node_keywords!(from, species, proximal_species, distance, min_count, max_count);
}

/// Picks molecules whose centre lies inside a region.
#[derive(Debug)]
pub struct PickRegionNode {
    from: NodeKeyword,
    region: NodeKeyword,
}

impl Default for PickRegionNode {
    fn default() -> Self {
        Self {
            from: from_keyword(),
            region: NodeKeyword::new("Region", "Region to pick from", NodeType::REGION_FAMILY),
        }
    }
}

impl ProcedureNode for PickRegionNode {
    fn node_type(&self) -> NodeType {
        NodeType::PickRegion
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        match self.region.get() {
            Some(_) => Ok(()),
            None => Err(NodeError::MissingKeyword("Region")),
        }
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let producer = self.region.get().ok_or(NodeError::MissingKeyword("Region"))?;
        let region = ctx.require_region(producer)?;
        let pool = match self.from.get() {
            Some(from) => ctx.require_selection(from)?,
            None => ctx.configuration().molecules().map(|(id, _)| id).collect(),
        };
        let cfg = ctx.configuration();
        let picked: Vec<MoleculeId> = pool
            .into_iter()
            .filter(|id| {
                cfg.molecule(*id)
                    .is_some_and(|m| region.contains(cfg.cell(), &m.centre_of_geometry(cfg.cell())))
            })
            .collect();
        info!("[PickRegion] Picked {} molecule(s).", picked.len());
        ctx.publish_selection(picked);
        Ok(())
    }

    fn finalise(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        ctx.clear_selection();
        Ok(())
    }

    crate::node_keywords!(from, region);
}

/// Runs its branch once for every molecule of a selection.
///
/// During each pass the current molecule is this node's selection, and the parameters
/// `<Name>.nSelected` and `<Name>.index` (from 1) describe the loop.
#[derive(Debug)]
pub struct IterateSelectionNode {
    selection: NodeKeyword,
    n_selected: Rc<ExpressionVariable>,
    index: Rc<ExpressionVariable>,
    molecules: Vec<MoleculeId>,
    cursor: usize,
}

impl Default for IterateSelectionNode {
    fn default() -> Self {
        Self {
            selection: NodeKeyword::new(
                "Selection",
                "Selection to iterate over",
                NodeType::PICK_FAMILY,
            ),
            n_selected: ExpressionVariable::new(
                "IterateSelection.nSelected",
                ExpressionValue::Integer(0),
            ),
            index: ExpressionVariable::new("IterateSelection.index", ExpressionValue::Integer(0)),
            molecules: Vec::new(),
            cursor: 0,
        }
    }
}

impl ProcedureNode for IterateSelectionNode {
    fn node_type(&self) -> NodeType {
        NodeType::IterateSelection
    }

    fn must_be_named(&self) -> bool {
        true
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn branch(&self) -> Option<BranchSpec> {
        Some(BranchSpec {
            keyword: "ForEach",
            context: NodeContext::Inherit,
        })
    }

    fn parameters(&self) -> Vec<Rc<ExpressionVariable>> {
        vec![Rc::clone(&self.n_selected), Rc::clone(&self.index)]
    }

    fn set_name(&mut self, name: &str) {
        self.n_selected.set_name(&format!("{}.nSelected", name));
        self.index.set_name(&format!("{}.index", name));
    }

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        match self.selection.get() {
            Some(_) => Ok(()),
            None => Err(NodeError::MissingKeyword("Selection")),
        }
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let producer = self
            .selection
            .get()
            .ok_or(NodeError::MissingKeyword("Selection"))?;
        self.molecules = ctx.require_selection(producer)?;
        self.cursor = 0;
        self.n_selected.set_value(self.molecules.len() as i64);
        self.index.set_value(0_i64);
        ctx.clear_selection();
        Ok(())
    }

    fn next_branch_pass(&mut self, ctx: &mut ProcedureContext) -> Result<bool, NodeError> {
        // Molecules removed by an earlier pass are skipped.
        while let Some(molecule) = self.molecules.get(self.cursor).copied() {
            self.cursor += 1;
            if ctx.configuration().contains_molecule(molecule) {
                self.index.set_value(self.cursor as i64);
                ctx.publish_selection(vec![molecule]);
                return Ok(true);
            }
        }
        ctx.clear_selection();
        Ok(false)
    }

    crate::node_keywords!(selection);
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    #[test]
    fn random_subset_keeps_the_rounded_fraction_in_order() {
        let mut ids: SlotMap<MoleculeId, ()> = SlotMap::with_key();
        let molecules: Vec<MoleculeId> = (0..10).map(|_| ids.insert(())).collect();
        let pool = ProcessPool::new(1, 11);
        let subset = random_subset(molecules.clone(), 0.25, &pool);
        assert_eq!(subset.len(), 3);
        let positions: Vec<usize> = subset
            .iter()
            .map(|m| molecules.iter().position(|x| x == m).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(random_subset(molecules.clone(), 1.0, &pool), molecules);
    }

    #[test]
    fn iteration_parameters_follow_the_node_name() {
        let mut node = IterateSelectionNode::default();
        node.set_name("Each");
        let names: Vec<String> = node.parameters().iter().map(|p| p.name()).collect();
        assert_eq!(names, ["Each.nSelected", "Each.index"]);
    }
}
