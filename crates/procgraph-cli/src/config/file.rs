use crate::error::{CliError, Result};
use nalgebra::{Point3, Vector3};
use procgraph::core::models::cell::{Cell, CellError};
use procgraph::core::models::species::{Species, SpeciesAtom};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

fn right_angles() -> [f64; 3] {
    [90.0; 3]
}

#[derive(Deserialize, Debug, Clone, PartialEq)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileCell {
    pub lengths: [f64; 3],
    #[serde(default = "right_angles")]
    pub angles: [f64; 3],
    #[serde(default)]
    pub non_periodic: bool,
}

impl FileCell {
    pub fn to_cell(&self) -> std::result::Result<Cell, CellError> {
        let lengths = Vector3::from(self.lengths);
        if self.non_periodic {
            Cell::non_periodic(lengths)
        } else {
            Cell::new(lengths, Vector3::from(self.angles))
        }
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileRunConfig {
    pub seed: Option<u64>,
    pub processes: Option<usize>,
    pub configuration_name: Option<String>,
    pub force: Option<bool>,
    pub cell: Option<FileCell>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileAtom {
    pub element: String,
    pub mass: f64,
    pub position: [f64; 3],
}

#[derive(Deserialize, Debug, Clone)]
#[serde(deny_unknown_fields, rename_all = "kebab-case")]
pub struct FileSpecies {
    pub name: String,
    #[serde(default)]
    pub atoms: Vec<FileAtom>,
    /// Periodic box the species was defined in, used by the `Set` box action.
    #[serde(rename = "box")]
    pub cell: Option<FileCell>,
}

impl FileSpecies {
    pub fn to_species(&self) -> std::result::Result<Species, CellError> {
        let mut species = self.atoms.iter().fold(Species::new(&self.name), |s, atom| {
            s.with_atom(SpeciesAtom::new(
                &atom.element,
                atom.mass,
                Point3::from(atom.position),
            ))
        });
        if let Some(cell) = &self.cell {
            species = species.with_cell(cell.to_cell()?);
        }
        Ok(species)
    }
}

#[derive(Deserialize, Debug, Default, Clone)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub run: Option<FileRunConfig>,
    #[serde(default)]
    pub species: Vec<FileSpecies>,
}

impl FileConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Reading run configuration from {:?}", path);
        let text = std::fs::read_to_string(path)?;
        toml::from_str(&text).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_file_is_parsed() {
        let text = r#"
            [run]
            seed = 42
            processes = 2
            configuration-name = "Bulk"
            cell = { lengths = [20.0, 20.0, 30.0] }

            [[species]]
            name = "Water"
            atoms = [
                { element = "O", mass = 15.999, position = [0.0, 0.0, 0.0] },
                { element = "H", mass = 1.008, position = [0.757, 0.586, 0.0] },
                { element = "H", mass = 1.008, position = [-0.757, 0.586, 0.0] },
            ]
            box = { lengths = [3.1, 3.1, 3.1] }
        "#;
        let config: FileConfig = toml::from_str(text).unwrap();
        let run = config.run.unwrap();
        assert_eq!(run.seed, Some(42));
        assert_eq!(run.configuration_name.as_deref(), Some("Bulk"));
        let cell = run.cell.unwrap();
        assert_eq!(cell.angles, [90.0; 3]);
        assert!((cell.to_cell().unwrap().volume() - 12000.0).abs() < 1e-9);

        let water = config.species[0].to_species().unwrap();
        assert_eq!(water.n_atoms(), 3);
        assert!(water.cell().is_some());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let err = toml::from_str::<FileConfig>("[run]\nrandom-seed = 3\n");
        assert!(err.is_err());
    }
}
