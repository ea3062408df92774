use crate::core::models::cell::Cell;
use crate::core::models::configuration::AVOGADRO_PER_CUBIC_ANGSTROM;
use crate::core::models::species::Species;
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::keywords::value::Minimum;
use crate::engine::keywords::{
    BoolKeyword, EnumKeyword, EnumOption, NodeKeyword, NodeValueEnumKeyword, NodeValueKeyword,
    SpeciesKeyword,
};
use crate::engine::node::{GENERATION_ONLY, NodeContext, NodeType, ProcedureNode};
use nalgebra::{Point3, Rotation3};
use std::f64::consts::PI;
use tracing::{info, warn};

/// What happens to the cell when molecules are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoxAction {
    /// Leave the cell as it is.
    None,
    /// Grow the cell by the volume the new molecules need at the given density.
    AddVolume,
    /// Size the cell so that old and new contents together have the given density.
    ScaleVolume,
    /// Take the cell from the species definition.
    Set,
}

impl EnumOption for BoxAction {
    fn options() -> &'static [(&'static str, Self)] {
        &[
            ("None", BoxAction::None),
            ("AddVolume", BoxAction::AddVolume),
            ("ScaleVolume", BoxAction::ScaleVolume),
            ("Set", BoxAction::Set),
        ]
    }
}

/// Where each new molecule is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Positioning {
    Central,
    Current,
    Random,
    Region,
}

impl EnumOption for Positioning {
    fn options() -> &'static [(&'static str, Self)] {
        &[
            ("Central", Positioning::Central),
            ("Current", Positioning::Current),
            ("Random", Positioning::Random),
            ("Region", Positioning::Region),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DensityUnits {
    AtomsPerCubicAngstrom,
    GramsPerCubicCentimetre,
}

impl EnumOption for DensityUnits {
    fn options() -> &'static [(&'static str, Self)] {
        &[
            ("atoms/A3", DensityUnits::AtomsPerCubicAngstrom),
            ("g/cm3", DensityUnits::GramsPerCubicCentimetre),
        ]
    }
}

/// Volume in cubic Angstroms needed to hold `n_atoms` atoms of total `mass` (g/mol) at
/// `density`.
fn required_volume(n_atoms: f64, mass: f64, density: f64, units: DensityUnits) -> f64 {
    match units {
        DensityUnits::AtomsPerCubicAngstrom => n_atoms / density,
        DensityUnits::GramsPerCubicCentimetre => mass / (density * AVOGADRO_PER_CUBIC_ANGSTROM),
    }
}

/// Adds molecules of one species to the configuration.
#[derive(Debug)]
pub struct AddNode {
    species: SpeciesKeyword,
    population: NodeValueKeyword,
    density: NodeValueEnumKeyword<DensityUnits>,
    box_action: EnumKeyword<BoxAction>,
    scale_a: BoolKeyword,
    scale_b: BoolKeyword,
    scale_c: BoolKeyword,
    rotate: BoolKeyword,
    positioning: EnumKeyword<Positioning>,
    region: NodeKeyword,
}

impl Default for AddNode {
    fn default() -> Self {
        Self {
            species: SpeciesKeyword::new("Species", "Target species to add"),
            population: NodeValueKeyword::new("Population", "Number of molecules to add", 0_i64)
                .with_minimum(Minimum::Inclusive(0.0)),
            density: NodeValueEnumKeyword::new(
                "Density",
                "Density at which to add the species",
                0.1,
                DensityUnits::AtomsPerCubicAngstrom,
            )
            .with_minimum(Minimum::Exclusive(0.0)),
            box_action: EnumKeyword::new(
                "BoxAction",
                "Action to take on the box volume when adding the species",
                BoxAction::AddVolume,
            ),
            scale_a: BoolKeyword::new("ScaleA", "Scale box length A when modifying volume", true),
            scale_b: BoolKeyword::new("ScaleB", "Scale box length B when modifying volume", true),
            scale_c: BoolKeyword::new("ScaleC", "Scale box length C when modifying volume", true),
            rotate: BoolKeyword::new("Rotate", "Randomly rotate molecules on insertion", true),
            positioning: EnumKeyword::new(
                "Positioning",
                "How individual molecules are positioned",
                Positioning::Random,
            ),
            region: NodeKeyword::new(
                "Region",
                "Region into which to add the species",
                NodeType::REGION_FAMILY,
            ),
        }
    }
}

impl AddNode {
    fn scalable_axes(&self) -> [bool; 3] {
        [self.scale_a.get(), self.scale_b.get(), self.scale_c.get()]
    }

    /// Applies the box action and returns the population to add.
    fn adjust_box(
        &self,
        ctx: &mut ProcedureContext,
        species: &Species,
        population: i64,
    ) -> Result<i64, NodeError> {
        let density = self.density.value().as_double();
        let units = self.density.option();
        let action = self.box_action.get();
        if matches!(action, BoxAction::AddVolume | BoxAction::ScaleVolume) && !(density > 0.0) {
            return Err(NodeError::InvalidValue {
                keyword: "Density",
                message: format!("evaluates to {}, which is not positive", density),
            });
        }
        let new_atoms = usize::try_from(population)
            .ok()
            .and_then(|n| n.checked_mul(species.n_atoms()))
            .ok_or_else(|| NodeError::InvalidValue {
                keyword: "Population",
                message: format!(
                    "{} molecules of '{}' is more atoms than can be counted",
                    population, species.name
                ),
            })? as f64;
        let new_mass = species.mass() * population as f64;
        let cfg = ctx.configuration_mut();

        match action {
            BoxAction::None => {
                info!("[Add] Current box geometry / volume will remain as-is.");
            }
            BoxAction::AddVolume => {
                let mut volume = required_volume(new_atoms, new_mass, density, units);
                info!(
                    "[Add] Density for new species is {} {}; it requires {} cubic Angstroms.",
                    density,
                    units.option_name(),
                    volume
                );
                if cfg.n_atoms() > 0 {
                    volume += cfg.cell().volume();
                } else {
                    info!(
                        "[Add] Current box is empty, so its volume will be set to exactly {} cubic Angstroms.",
                        volume
                    );
                }
                let factors = cfg.cell().scale_factors(volume, self.scalable_axes());
                cfg.scale_contents_and_cell(&factors)?;
                info!(
                    "[Add] New box volume is {:e} cubic Angstroms - scale factors were ({},{},{}).",
                    cfg.cell().volume(),
                    factors.x,
                    factors.y,
                    factors.z
                );
            }
            BoxAction::ScaleVolume => {
                let existing = required_volume(cfg.n_atoms() as f64, cfg.atomic_mass(), density, units);
                let mut volume = required_volume(new_atoms, new_mass, density, units);
                if cfg.n_atoms() > 0 {
                    volume += existing;
                }
                let factors = cfg.cell().scale_factors(volume, self.scalable_axes());
                cfg.scale_contents_and_cell(&factors)?;
                info!(
                    "[Add] Current box scaled by ({},{},{}) - new volume is {:e} cubic Angstroms.",
                    factors.x,
                    factors.y,
                    factors.z,
                    cfg.cell().volume()
                );
            }
            BoxAction::Set => {
                let cell: Cell = species
                    .cell()
                    .filter(|c| c.is_periodic())
                    .cloned()
                    .ok_or_else(|| {
                        NodeError::Failed(format!(
                            "Species '{}' has no periodic box to take the geometry from",
                            species.name
                        ))
                    })?;
                info!("[Add] Box geometry set from species '{}' ({}).", species.name, cell.kind());
                cfg.set_cell(cell);
                if population > 1 {
                    warn!("[Add] Population for species '{}' reset to 1.", species.name);
                    return Ok(1);
                }
            }
        }
        Ok(population)
    }
}

impl ProcedureNode for AddNode {
    fn node_type(&self) -> NodeType {
        NodeType::Add
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn prepare(&mut self, _ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let positioning = self.positioning.get();
        match (positioning, self.region.get()) {
            (Positioning::Region, None) => return Err(NodeError::MissingKeyword("Region")),
            (p, Some(_)) if p != Positioning::Region => {
                warn!(
                    "[Add] A region has been specified but the positioning type is '{}', so it will be ignored.",
                    p.option_name()
                );
            }
            _ => {}
        }
        if !self.scalable_axes().contains(&true) {
            return Err(NodeError::InvalidValue {
                keyword: "ScaleA",
                message: "at least one box axis must be scalable".to_string(),
            });
        }
        Ok(())
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let species_id = self
            .species
            .resolve(ctx.core_data())?
            .ok_or(NodeError::MissingKeyword("Species"))?;
        let data = ctx.core_data();
        let species = data
            .species(species_id)
            .ok_or_else(|| NodeError::UnknownSpecies(format!("{:?}", species_id)))?;
        if species.n_atoms() == 0 {
            return Err(NodeError::Failed(format!(
                "Can't add species '{}' because it has no atoms",
                species.name
            )));
        }
        let population = self.population.get().as_integer();
        if population < 0 {
            return Err(NodeError::InvalidValue {
                keyword: "Population",
                message: format!("evaluates to {}, which is negative", population),
            });
        }
        info!(
            "[Add] Adding species '{}' - population is {}.",
            species.name, population
        );

        let population = self.adjust_box(ctx, species, population)?;

        let positioning = self.positioning.get();
        let region = match (positioning, self.region.get()) {
            (Positioning::Region, Some(producer)) => Some(ctx.require_region(producer)?.clone()),
            _ => None,
        };
        let rotate = self.rotate.get();
        info!(
            "[Add] Positioning type is '{}' and rotation is {}.",
            positioning.option_name(),
            if rotate { "on" } else { "off" }
        );

        let pool = ctx.pool();
        let cfg = ctx.configuration_mut();
        for _ in 0..population {
            let molecule = cfg.add_molecule(species_id, species)?;
            let cell = cfg.cell();
            let centre = match positioning {
                Positioning::Random => Some(cell.fractional_to_real(&Point3::new(
                    pool.random(),
                    pool.random(),
                    pool.random(),
                ))),
                Positioning::Central => Some(cell.fractional_to_real(&Point3::new(0.5, 0.5, 0.5))),
                Positioning::Region => {
                    let region = region.as_ref().ok_or(NodeError::MissingKeyword("Region"))?;
                    let position = region.random_position(cell, pool).ok_or_else(|| {
                        NodeError::Failed("Region contains no free space to place a molecule".to_string())
                    })?;
                    Some(position)
                }
                Positioning::Current => None,
            };
            if let Some(centre) = centre {
                cfg.set_molecule_centre(molecule, &centre)?;
            }
            if rotate {
                let rotation = Rotation3::from_euler_angles(
                    pool.random_plus_minus_one() * PI,
                    pool.random_plus_minus_one() * PI,
                    0.0,
                );
                cfg.rotate_molecule(molecule, &rotation)?;
            }
        }

        info!(
            "[Add] New box density is {:e} atoms/A3 ({} g/cm3).",
            cfg.atomic_density(),
            cfg.chemical_density()
        );
        Ok(())
    }

    crate::node_keywords!(
        species,
        population,
        density,
        box_action,
        scale_a,
        scale_b,
        scale_c,
        rotate,
        positioning,
        region
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::CoreData;
    use crate::core::models::configuration::Configuration;
    use crate::core::models::species::SpeciesAtom;
    use crate::core::pool::ProcessPool;
    use crate::engine::keywords::testing::FixedScope;
    use crate::engine::value::NodeValue;

    fn argon() -> CoreData {
        let mut data = CoreData::new();
        data.add_species(Species::new("Ar").with_atom(SpeciesAtom::new("Ar", 39.948, Point3::origin())))
            .unwrap();
        data
    }

    fn add_node(population: i64) -> AddNode {
        let mut node = AddNode::default();
        node.species
            .set_by_name("Ar", &FixedScope::default())
            .unwrap();
        node.population.set(NodeValue::from(population)).unwrap();
        node
    }

    #[test]
    fn add_volume_absorbs_an_empty_box() {
        let data = argon();
        let mut node = add_node(50);
        node.density
            .set(NodeValue::from(0.05), DensityUnits::AtomsPerCubicAngstrom)
            .unwrap();
        let mut cfg = Configuration::new("Test");
        let pool = ProcessPool::new(1, 7);
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.prepare(&mut ctx).unwrap();
        node.execute(&mut ctx).unwrap();
        assert_eq!(ctx.configuration().n_molecules(), 50);
        assert!((ctx.configuration().cell().volume() - 1000.0).abs() < 1e-6);
    }

    #[test]
    fn populations_too_large_to_count_are_rejected() {
        let mut data = CoreData::new();
        let atom = |x: f64| SpeciesAtom::new("O", 16.0, Point3::new(x, 0.0, 0.0));
        data.add_species(
            Species::new("Tri")
                .with_atom(atom(0.0))
                .with_atom(atom(1.0))
                .with_atom(atom(2.0)),
        )
        .unwrap();
        let mut node = AddNode::default();
        node.species
            .set_by_name("Tri", &FixedScope::default())
            .unwrap();
        node.population.set(NodeValue::from(i64::MAX)).unwrap();

        let mut cfg = Configuration::new("Test");
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.prepare(&mut ctx).unwrap();
        assert!(matches!(
            node.execute(&mut ctx).unwrap_err(),
            NodeError::InvalidValue { keyword: "Population", .. }
        ));
        assert_eq!(ctx.configuration().n_molecules(), 0);
    }

    #[test]
    fn mass_density_uses_species_mass() {
        let volume = required_volume(1.0, 602.214_076, 1.0, DensityUnits::GramsPerCubicCentimetre);
        assert!((volume - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn region_positioning_needs_a_region() {
        let data = argon();
        let mut node = add_node(1);
        node.positioning.set(Positioning::Region);
        let mut cfg = Configuration::new("Test");
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        assert_eq!(
            node.prepare(&mut ctx).unwrap_err(),
            NodeError::MissingKeyword("Region")
        );
    }

    #[test]
    fn set_requires_a_periodic_species_box() {
        let data = argon();
        let mut node = add_node(3);
        node.box_action.set(BoxAction::Set);
        let mut cfg = Configuration::new("Test");
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        assert!(matches!(node.execute(&mut ctx), Err(NodeError::Failed(_))));
        assert_eq!(ctx.configuration().n_molecules(), 0);
    }

    #[test]
    fn central_positioning_without_rotation_is_exact() {
        let data = argon();
        let mut node = add_node(2);
        node.box_action.set(BoxAction::None);
        node.positioning.set(Positioning::Central);
        node.rotate.set(false);
        let mut cfg = Configuration::new("Test");
        cfg.set_cell(Cell::cubic(10.0).unwrap());
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.execute(&mut ctx).unwrap();
        for (_, m) in ctx.configuration().molecules() {
            assert_eq!(m.positions()[0], Point3::new(5.0, 5.0, 5.0));
        }
    }
}
