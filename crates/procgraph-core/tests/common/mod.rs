#![allow(dead_code)]

use nalgebra::Point3;
use procgraph::core::data::CoreData;
use procgraph::core::io::ProcedureDocument;
use procgraph::core::models::species::{Species, SpeciesAtom};
use procgraph::engine::node::NodeContext;
use procgraph::engine::procedure::Procedure;
use procgraph::engine::registry::NodeRegistry;

pub fn water() -> Species {
    Species::new("Water")
        .with_atom(SpeciesAtom::new("O", 15.999, Point3::new(0.0, 0.0, 0.0)))
        .with_atom(SpeciesAtom::new("H", 1.008, Point3::new(0.757, 0.586, 0.0)))
        .with_atom(SpeciesAtom::new("H", 1.008, Point3::new(-0.757, 0.586, 0.0)))
}

pub fn argon() -> Species {
    Species::new("Ar").with_atom(SpeciesAtom::new("Ar", 39.948, Point3::origin()))
}

/// Species data holding water and argon.
pub fn core_data() -> CoreData {
    let mut data = CoreData::new();
    data.add_species(water()).unwrap();
    data.add_species(argon()).unwrap();
    data
}

pub fn from_toml(text: &str, data: Option<&CoreData>) -> Procedure {
    let document = ProcedureDocument::parse(text, "test").unwrap();
    Procedure::from_document(
        &document,
        &NodeRegistry::with_defaults(),
        data,
        NodeContext::Generation,
    )
    .unwrap()
}
