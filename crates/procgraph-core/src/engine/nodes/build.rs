use crate::core::models::cell::Cell;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::keywords::value::Minimum;
use crate::engine::keywords::{
    BoolKeyword, NodeKeyword, NodeValueKeyword, NodeVectorKeyword, SpeciesKeyword,
    SpeciesVectorKeyword, Vec3NodeValueKeyword,
};
use crate::engine::node::{GENERATION_ONLY, NodeContext, NodeType, ProcedureNode};
use tracing::{info, warn};

/// Replaces the configuration cell.
#[derive(Debug)]
pub struct BoxNode {
    lengths: Vec3NodeValueKeyword,
    angles: Vec3NodeValueKeyword,
    non_periodic: BoolKeyword,
}

impl Default for BoxNode {
    fn default() -> Self {
        Self {
            lengths: Vec3NodeValueKeyword::new("Lengths", "Box axis lengths A, B and C", [1.0; 3])
                .with_minimum(Minimum::Exclusive(0.0)),
            angles: Vec3NodeValueKeyword::new(
                "Angles",
                "Box axis angles alpha, beta and gamma (degrees)",
                [90.0; 3],
            )
            .with_minimum(Minimum::Exclusive(0.0)),
            non_periodic: BoolKeyword::new("NonPeriodic", "Whether the box is non-periodic", false),
        }
    }
}

impl ProcedureNode for BoxNode {
    fn node_type(&self) -> NodeType {
        NodeType::Box
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let lengths = self.lengths.as_vector();
        let cell = if self.non_periodic.get() {
            Cell::non_periodic(lengths)?
        } else {
            Cell::new(lengths, self.angles.as_vector())?
        };
        info!(
            "[Box] Cell is now {}: A = {:.4} B = {:.4} C = {:.4}, volume = {:.4e} cubic Angstroms.",
            cell.kind(),
            lengths.x,
            lengths.y,
            lengths.z,
            cell.volume()
        );
        ctx.configuration_mut().set_cell(cell);
        Ok(())
    }

    crate::node_keywords!(lengths, angles, non_periodic);
}

/// Removes molecules by species and/or by picked selections.
#[derive(Debug)]
pub struct RemoveNode {
    species: SpeciesVectorKeyword,
    selection: NodeVectorKeyword,
}

impl Default for RemoveNode {
    fn default() -> Self {
        Self {
            species: SpeciesVectorKeyword::new("Species", "Species whose molecules are removed"),
            selection: NodeVectorKeyword::new(
                "Selection",
                "Picked molecules to remove",
                NodeType::PICK_FAMILY,
            ),
        }
    }
}

impl ProcedureNode for RemoveNode {
    fn node_type(&self) -> NodeType {
        NodeType::Remove
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        if self.species.is_empty() && self.selection.get().is_empty() {
            warn!("[Remove] Neither species nor a selection is set, so nothing will be removed.");
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let mut targets = Vec::new();
        for species in self.species.resolve(ctx.core_data())? {
            targets.extend(ctx.configuration().molecules_of_species(species));
        }
        for producer in self.selection.get() {
            targets.extend(ctx.require_selection(*producer)?);
        }
        targets.sort_unstable();
        targets.dedup();

        let removed = ctx.configuration_mut().remove_molecules(&targets);
        info!("[Remove] Removed {} molecule(s).", removed);
        Ok(())
    }

    crate::node_keywords!(species, selection);
}

/// Replaces each selected molecule with a molecule of another species at the same centre.
#[derive(Debug)]
pub struct TransmuteNode {
    selection: NodeKeyword,
    target: SpeciesKeyword,
}

impl Default for TransmuteNode {
    fn default() -> Self {
        Self {
            selection: NodeKeyword::new(
                "Selection",
                "Picked molecules to transmute",
                NodeType::PICK_FAMILY,
            ),
            target: SpeciesKeyword::new("Target", "Species to transmute selected molecules into"),
        }
    }
}

impl ProcedureNode for TransmuteNode {
    fn node_type(&self) -> NodeType {
        NodeType::Transmute
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let producer = self
            .selection
            .get()
            .ok_or(NodeError::MissingKeyword("Selection"))?;
        let target_id = self
            .target
            .resolve(ctx.core_data())?
            .ok_or(NodeError::MissingKeyword("Target"))?;
        let data = ctx.core_data();
        let target = data
            .species(target_id)
            .ok_or_else(|| NodeError::UnknownSpecies(format!("{:?}", target_id)))?;

        let selected = ctx.require_selection(producer)?;
        let cfg = ctx.configuration_mut();
        for molecule in &selected {
            let centre = match cfg.molecule(*molecule) {
                Some(m) => m.centre_of_geometry(cfg.cell()),
                None => continue,
            };
            cfg.remove_molecule(*molecule)?;
            let replacement = cfg.add_molecule(target_id, target)?;
            cfg.set_molecule_centre(replacement, &centre)?;
        }
        info!(
            "[Transmute] Transmuted {} molecule(s) into '{}'.",
            selected.len(),
            target.name
        );
        Ok(())
    }

    crate::node_keywords!(selection, target);
}

/// Sets the configuration temperature.
#[derive(Debug)]
pub struct TemperatureNode {
    temperature: NodeValueKeyword,
}

impl Default for TemperatureNode {
    fn default() -> Self {
        Self {
            temperature: NodeValueKeyword::new("Temperature", "Temperature in Kelvin", 300.0)
                .with_minimum(Minimum::Inclusive(0.0)),
        }
    }
}

impl ProcedureNode for TemperatureNode {
    fn node_type(&self) -> NodeType {
        NodeType::Temperature
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let temperature = self.temperature.get().as_double();
        ctx.configuration_mut().set_temperature(temperature)?;
        info!("[Temperature] Configuration temperature set to {} K.", temperature);
        Ok(())
    }

    crate::node_keywords!(temperature);
}

/// Sets the configuration size factor.
#[derive(Debug)]
pub struct SizeFactorNode {
    size_factor: NodeValueKeyword,
}

impl Default for SizeFactorNode {
    fn default() -> Self {
        Self {
            size_factor: NodeValueKeyword::new(
                "SizeFactor",
                "Factor by which to scale the box while keeping molecules intact",
                1.0,
            )
            .with_minimum(Minimum::Inclusive(1.0)),
        }
    }
}

impl ProcedureNode for SizeFactorNode {
    fn node_type(&self) -> NodeType {
        NodeType::SizeFactor
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let factor = self.size_factor.get().as_double();
        ctx.configuration_mut().set_size_factor(factor)?;
        info!("[SizeFactor] Size factor set to {}.", factor);
        Ok(())
    }

    crate::node_keywords!(size_factor);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::CoreData;
    use crate::core::models::configuration::Configuration;
    use crate::core::models::species::{Species, SpeciesAtom};
    use crate::core::pool::ProcessPool;
    use crate::engine::keywords::Keyword;
    use crate::engine::keywords::testing::FixedScope;
    use nalgebra::{Point3, Vector3};
    use toml::Value;

    #[test]
    fn box_replaces_the_cell() {
        let mut node = BoxNode::default();
        let scope = FixedScope::default();
        node.lengths
            .deserialise(
                &Value::Array(vec![Value::Integer(10), Value::Integer(20), Value::Integer(30)]),
                &scope,
            )
            .unwrap();
        let mut cfg = Configuration::new("Test");
        let data = CoreData::new();
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.execute(&mut ctx).unwrap();
        assert_eq!(ctx.configuration().cell().lengths(), Vector3::new(10.0, 20.0, 30.0));
        assert!((ctx.configuration().cell().volume() - 6000.0).abs() < 1e-6);
    }

    #[test]
    fn remove_by_species_leaves_other_species() {
        let mut data = CoreData::new();
        let argon = data
            .add_species(Species::new("Ar").with_atom(SpeciesAtom::new("Ar", 39.948, Point3::origin())))
            .unwrap();
        let neon = data
            .add_species(Species::new("Ne").with_atom(SpeciesAtom::new("Ne", 20.18, Point3::origin())))
            .unwrap();
        let mut cfg = Configuration::new("Test");
        for _ in 0..3 {
            cfg.add_molecule(argon, data.species(argon).unwrap()).unwrap();
            cfg.add_molecule(neon, data.species(neon).unwrap()).unwrap();
        }

        let mut node = RemoveNode::default();
        node.species
            .set_by_names(&["ar"], &FixedScope::default())
            .unwrap();
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.execute(&mut ctx).unwrap();
        assert_eq!(ctx.configuration().n_molecules(), 3);
        assert!(ctx.configuration().molecules_of_species(argon).is_empty());
    }

    #[test]
    fn size_factor_rejects_literals_below_one() {
        let mut node = SizeFactorNode::default();
        assert!(node.size_factor.set(0.5.into()).is_err());

        let mut cfg = Configuration::new("Test");
        let data = CoreData::new();
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.size_factor.set(2.0.into()).unwrap();
        node.execute(&mut ctx).unwrap();
        assert_eq!(ctx.configuration().size_factor(), 2.0);
    }
}
