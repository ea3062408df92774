use crate::core::models::ids::MoleculeId;
use crate::core::potentials::{GlobalPotential, PotentialForm, Restraint};
use crate::engine::context::ProcedureContext;
use crate::engine::error::NodeError;
use crate::engine::keywords::value::Minimum;
use crate::engine::keywords::{
    BoolKeyword, EnumKeyword, EnumOption, NodeValueKeyword, NodeVectorKeyword,
    Vec3NodeValueKeyword,
};
use crate::engine::node::{GENERATION_ONLY, NodeContext, NodeType, ProcedureNode};
use nalgebra::Point3;
use tracing::{info, warn};

impl EnumOption for PotentialForm {
    fn options() -> &'static [(&'static str, Self)] {
        &[
            ("Harmonic", PotentialForm::Harmonic),
            ("SoftWall", PotentialForm::SoftWall),
        ]
    }
}

fn form_keyword() -> EnumKeyword<PotentialForm> {
    EnumKeyword::new("Form", "Functional form of the potential", PotentialForm::Harmonic)
}

fn force_constant_keyword() -> NodeValueKeyword {
    NodeValueKeyword::new("ForceConstant", "Force constant of the potential", 10.0)
        .with_minimum(Minimum::Inclusive(0.0))
}

/// The origin in real space, converting from fractional coordinates if asked to.
fn real_origin(ctx: &ProcedureContext, origin: &Vec3NodeValueKeyword, fractional: bool) -> Point3<f64> {
    let point = Point3::from(origin.as_vector());
    if fractional {
        ctx.configuration().cell().fractional_to_real(&point)
    } else {
        point
    }
}

#[derive(Debug)]
pub struct SphericalGlobalPotentialNode {
    origin: Vec3NodeValueKeyword,
    fractional: BoolKeyword,
    form: EnumKeyword<PotentialForm>,
    force_constant: NodeValueKeyword,
    radius: NodeValueKeyword,
}

impl Default for SphericalGlobalPotentialNode {
    fn default() -> Self {
        Self {
            origin: Vec3NodeValueKeyword::new("Origin", "Centre of the sphere", [0.0; 3]),
            fractional: BoolKeyword::new("Fractional", "Whether the origin is in fractional coordinates", false),
            form: form_keyword(),
            force_constant: force_constant_keyword(),
            radius: NodeValueKeyword::new("Radius", "Radius of the sphere", 5.0)
                .with_minimum(Minimum::Inclusive(0.0)),
        }
    }
}

impl ProcedureNode for SphericalGlobalPotentialNode {
    fn node_type(&self) -> NodeType {
        NodeType::SphericalGlobalPotential
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let potential = GlobalPotential::Spherical {
            origin: real_origin(ctx, &self.origin, self.fractional.get()),
            form: self.form.get(),
            force_constant: self.force_constant.get().as_double(),
            radius: self.radius.get().as_double(),
        };
        info!("[SphericalGlobalPotential] Adding {} potential.", potential.form());
        ctx.configuration_mut().add_global_potential(potential);
        Ok(())
    }

    crate::node_keywords!(origin, fractional, form, force_constant, radius);
}

#[derive(Debug)]
pub struct CylindricalGlobalPotentialNode {
    origin: Vec3NodeValueKeyword,
    fractional: BoolKeyword,
    vector: Vec3NodeValueKeyword,
    form: EnumKeyword<PotentialForm>,
    force_constant: NodeValueKeyword,
    radius: NodeValueKeyword,
}

impl Default for CylindricalGlobalPotentialNode {
    fn default() -> Self {
        Self {
            origin: Vec3NodeValueKeyword::new("Origin", "Point on the cylinder axis", [0.0; 3]),
            fractional: BoolKeyword::new("Fractional", "Whether the origin is in fractional coordinates", false),
            vector: Vec3NodeValueKeyword::new("Vector", "Direction of the cylinder axis", [0.0, 0.0, 1.0]),
            form: form_keyword(),
            force_constant: force_constant_keyword(),
            radius: NodeValueKeyword::new("Radius", "Radius of the cylinder", 5.0)
                .with_minimum(Minimum::Inclusive(0.0)),
        }
    }
}

impl ProcedureNode for CylindricalGlobalPotentialNode {
    fn node_type(&self) -> NodeType {
        NodeType::CylindricalGlobalPotential
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let vector = self.vector.as_vector();
        if vector.norm() < 1.0e-8 {
            return Err(NodeError::InvalidValue {
                keyword: "Vector",
                message: "the axis vector has zero length".to_string(),
            });
        }
        let potential = GlobalPotential::Cylindrical {
            origin: real_origin(ctx, &self.origin, self.fractional.get()),
            vector: vector.normalize(),
            form: self.form.get(),
            force_constant: self.force_constant.get().as_double(),
            radius: self.radius.get().as_double(),
        };
        info!("[CylindricalGlobalPotential] Adding {} potential.", potential.form());
        ctx.configuration_mut().add_global_potential(potential);
        Ok(())
    }

    crate::node_keywords!(origin, fractional, vector, form, force_constant, radius);
}

/// Ties every atom of the selected molecules to its current position.
///
/// With no selection set, every molecule in the configuration is restrained.
#[derive(Debug)]
pub struct RestraintPotentialNode {
    selection: NodeVectorKeyword,
    force_constant: NodeValueKeyword,
}

impl Default for RestraintPotentialNode {
    fn default() -> Self {
        Self {
            selection: NodeVectorKeyword::new(
                "Selection",
                "Picked molecules to restrain",
                NodeType::PICK_FAMILY,
            ),
            force_constant: force_constant_keyword(),
        }
    }
}

impl ProcedureNode for RestraintPotentialNode {
    fn node_type(&self) -> NodeType {
        NodeType::RestraintPotential
    }

    fn contexts(&self) -> &'static [NodeContext] {
        GENERATION_ONLY
    }

    fn execute(&mut self, ctx: &mut ProcedureContext) -> Result<(), NodeError> {
        let mut molecules: Vec<MoleculeId> = Vec::new();
        if self.selection.get().is_empty() {
            warn!("[RestraintPotential] No selection given, so every molecule will be restrained.");
            molecules.extend(ctx.configuration().molecules().map(|(id, _)| id));
        } else {
            for producer in self.selection.get() {
                molecules.extend(ctx.require_selection(*producer)?);
            }
            molecules.sort_unstable();
            molecules.dedup();
        }

        let force_constant = self.force_constant.get().as_double();
        let restraints: Vec<Restraint> = molecules
            .iter()
            .filter_map(|id| ctx.configuration().molecule(*id).map(|m| (*id, m)))
            .flat_map(|(id, m)| {
                m.positions()
                    .iter()
                    .enumerate()
                    .map(move |(atom, anchor)| Restraint {
                        molecule: id,
                        atom,
                        anchor: *anchor,
                        force_constant,
                    })
            })
            .collect();

        let n = restraints.len();
        let cfg = ctx.configuration_mut();
        for restraint in restraints {
            cfg.add_restraint(restraint)?;
        }
        info!(
            "[RestraintPotential] Restrained {} atom(s) in {} molecule(s).",
            n,
            molecules.len()
        );
        Ok(())
    }

    crate::node_keywords!(selection, force_constant);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::data::CoreData;
    use crate::core::models::cell::Cell;
    use crate::core::models::configuration::Configuration;
    use crate::core::models::species::{Species, SpeciesAtom};
    use crate::core::pool::ProcessPool;
    use crate::engine::keywords::Keyword;
    use crate::engine::keywords::testing::FixedScope;
    use toml::Value;

    #[test]
    fn fractional_origins_are_converted() {
        let mut node = SphericalGlobalPotentialNode::default();
        let scope = FixedScope::default();
        node.origin
            .deserialise(
                &Value::Array(vec![Value::Float(0.5), Value::Float(0.5), Value::Float(0.5)]),
                &scope,
            )
            .unwrap();
        node.fractional.set(true);
        node.form.deserialise(&Value::String("softwall".into()), &scope).unwrap();

        let mut cfg = Configuration::new("Test");
        cfg.set_cell(Cell::cubic(20.0).unwrap());
        let data = CoreData::new();
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        node.execute(&mut ctx).unwrap();
        let GlobalPotential::Spherical { origin, form, .. } = &ctx.configuration().global_potentials()[0]
        else {
            panic!("expected a spherical potential");
        };
        assert_eq!(*origin, Point3::new(10.0, 10.0, 10.0));
        assert_eq!(*form, PotentialForm::SoftWall);
    }

    #[test]
    fn restraints_without_selection_cover_every_atom() {
        let mut data = CoreData::new();
        let dimer = data
            .add_species(
                Species::new("N2")
                    .with_atom(SpeciesAtom::new("N", 14.007, Point3::new(0.0, 0.0, 0.0)))
                    .with_atom(SpeciesAtom::new("N", 14.007, Point3::new(1.1, 0.0, 0.0))),
            )
            .unwrap();
        let mut cfg = Configuration::new("Test");
        cfg.set_cell(Cell::cubic(20.0).unwrap());
        for _ in 0..2 {
            cfg.add_molecule(dimer, data.species(dimer).unwrap()).unwrap();
        }
        let pool = ProcessPool::default();
        let mut ctx = ProcedureContext::new(&mut cfg, &data, &pool);
        RestraintPotentialNode::default().execute(&mut ctx).unwrap();
        assert_eq!(ctx.configuration().restraints().len(), 4);
    }
}
