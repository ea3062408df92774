use super::models::ids::SpeciesId;
use super::models::species::Species;
use slotmap::SlotMap;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CoreDataError {
    #[error("A species named '{0}' already exists")]
    DuplicateSpecies(String),
}

/// Registry of the species known to the application.
///
/// Species are looked up by name case-insensitively.
#[derive(Debug, Default)]
pub struct CoreData {
    species: SlotMap<SpeciesId, Species>,
    name_index: HashMap<String, SpeciesId>,
}

impl CoreData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a species to the registry.
    ///
    /// # Errors
    ///
    /// Returns [`CoreDataError::DuplicateSpecies`] if a species with the same name
    /// (ignoring case) is already registered.
    pub fn add_species(&mut self, species: Species) -> Result<SpeciesId, CoreDataError> {
        let key = species.name.to_ascii_lowercase();
        if self.name_index.contains_key(&key) {
            return Err(CoreDataError::DuplicateSpecies(species.name));
        }
        let id = self.species.insert(species);
        self.name_index.insert(key, id);
        Ok(id)
    }

    pub fn species(&self, id: SpeciesId) -> Option<&Species> {
        self.species.get(id)
    }

    pub fn find_species(&self, name: &str) -> Option<SpeciesId> {
        self.name_index.get(&name.to_ascii_lowercase()).copied()
    }

    pub fn species_iter(&self) -> impl Iterator<Item = (SpeciesId, &Species)> {
        self.species.iter()
    }

    pub fn n_species(&self) -> usize {
        self.species.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::species::SpeciesAtom;
    use nalgebra::Point3;

    #[test]
    fn species_are_found_case_insensitively() {
        let mut data = CoreData::new();
        let id = data
            .add_species(Species::new("Water").with_atom(SpeciesAtom::new(
                "O",
                16.0,
                Point3::origin(),
            )))
            .unwrap();
        assert_eq!(data.find_species("WATER"), Some(id));
        assert_eq!(data.species(id).unwrap().name, "Water");
        assert_eq!(data.find_species("Argon"), None);
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let mut data = CoreData::new();
        data.add_species(Species::new("Water")).unwrap();
        let err = data.add_species(Species::new("water")).unwrap_err();
        assert_eq!(err, CoreDataError::DuplicateSpecies("water".to_string()));
        assert_eq!(data.n_species(), 1);
    }
}
