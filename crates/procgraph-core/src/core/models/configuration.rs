use super::cell::{Cell, CellError};
use super::ids::{MoleculeId, SpeciesId};
use super::molecule::Molecule;
use super::species::Species;
use crate::core::potentials::{GlobalPotential, Restraint};
use nalgebra::{Point3, Rotation3, Vector3};
use slotmap::SlotMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use thiserror::Error;

/// Avogadro's number divided by 1e24, converting g/mol/A^3 into g/cm^3.
pub(crate) const AVOGADRO_PER_CUBIC_ANGSTROM: f64 = 0.602_214_076;

static NEXT_CONFIGURATION_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigurationError {
    #[error("Invalid cell: {0}")]
    Cell(#[from] CellError),
    #[error("Molecule {0:?} does not exist in the configuration")]
    UnknownMolecule(MoleculeId),
    #[error("Species '{0}' has no atoms and cannot be added")]
    EmptySpecies(String),
    #[error("Temperature must be non-negative (got {0})")]
    InvalidTemperature(f64),
    #[error("Size factor must be at least 1.0 (got {0})")]
    InvalidSizeFactor(f64),
}

/// Process-unique identity of a configuration.
///
/// Identities are never reused, so a cached `(ConfigurationId, version)` pair cannot be
/// confused with a different configuration that happens to share a version number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConfigurationId(u64);

impl ConfigurationId {
    fn next() -> Self {
        Self(NEXT_CONFIGURATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConfigurationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// An atomistic configuration: a cell full of molecules plus the external potentials
/// and thermodynamic settings that go with it.
///
/// Every mutating method bumps the content [`version`](Configuration::version), which
/// is what the procedure uses to decide whether it needs to run again.
#[derive(Debug)]
pub struct Configuration {
    id: ConfigurationId,
    name: String,
    cell: Cell,
    molecules: SlotMap<MoleculeId, Molecule>,
    global_potentials: Vec<GlobalPotential>,
    restraints: Vec<Restraint>,
    temperature: f64,
    size_factor: f64,
    version: u64,
}

impl Configuration {
    /// Creates an empty configuration with a unit cubic cell at 300 K.
    pub fn new(name: &str) -> Self {
        Self {
            id: ConfigurationId::next(),
            name: name.to_string(),
            cell: Cell::default(),
            molecules: SlotMap::with_key(),
            global_potentials: Vec::new(),
            restraints: Vec::new(),
            temperature: 300.0,
            size_factor: 1.0,
            version: 0,
        }
    }

    pub fn id(&self) -> ConfigurationId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn cell(&self) -> &Cell {
        &self.cell
    }

    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    pub fn size_factor(&self) -> f64 {
        self.size_factor
    }

    pub fn global_potentials(&self) -> &[GlobalPotential] {
        &self.global_potentials
    }

    pub fn restraints(&self) -> &[Restraint] {
        &self.restraints
    }

    pub fn molecule(&self, id: MoleculeId) -> Option<&Molecule> {
        self.molecules.get(id)
    }

    pub fn contains_molecule(&self, id: MoleculeId) -> bool {
        self.molecules.contains_key(id)
    }

    pub fn molecules(&self) -> impl Iterator<Item = (MoleculeId, &Molecule)> {
        self.molecules.iter()
    }

    pub fn n_molecules(&self) -> usize {
        self.molecules.len()
    }

    pub fn n_atoms(&self) -> usize {
        self.molecules.values().map(Molecule::n_atoms).sum()
    }

    /// Returns the ids of every molecule instantiated from `species`, in insertion order.
    pub fn molecules_of_species(&self, species: SpeciesId) -> Vec<MoleculeId> {
        self.molecules
            .iter()
            .filter(|(_, m)| m.species() == species)
            .map(|(id, _)| id)
            .collect()
    }

    /// Total mass of all molecules in g/mol.
    pub fn atomic_mass(&self) -> f64 {
        self.molecules.values().map(Molecule::mass).sum()
    }

    /// Number density in atoms per cubic Angstrom.
    pub fn atomic_density(&self) -> f64 {
        self.n_atoms() as f64 / self.cell.volume()
    }

    /// Mass density in g/cm^3.
    pub fn chemical_density(&self) -> f64 {
        self.atomic_mass() / (self.cell.volume() * AVOGADRO_PER_CUBIC_ANGSTROM)
    }

    fn touch(&mut self) {
        self.version += 1;
    }

    pub fn set_cell(&mut self, cell: Cell) {
        self.cell = cell;
        self.touch();
    }

    /// Instantiates a molecule of `species` at its reference coordinates.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::EmptySpecies`] if the species has no atoms.
    pub fn add_molecule(
        &mut self,
        species_id: SpeciesId,
        species: &Species,
    ) -> Result<MoleculeId, ConfigurationError> {
        if species.n_atoms() == 0 {
            return Err(ConfigurationError::EmptySpecies(species.name.clone()));
        }
        let molecule = Molecule::new(species_id, species.reference_positions(), species.mass());
        let id = self.molecules.insert(molecule);
        self.touch();
        Ok(id)
    }

    /// Moves a molecule so that its centre of geometry lies at `centre`.
    pub fn set_molecule_centre(
        &mut self,
        id: MoleculeId,
        centre: &Point3<f64>,
    ) -> Result<(), ConfigurationError> {
        let molecule = self
            .molecules
            .get_mut(id)
            .ok_or(ConfigurationError::UnknownMolecule(id))?;
        molecule.set_centre_of_geometry(&self.cell, centre);
        self.touch();
        Ok(())
    }

    /// Rotates a molecule about its own centre of geometry.
    pub fn rotate_molecule(
        &mut self,
        id: MoleculeId,
        rotation: &Rotation3<f64>,
    ) -> Result<(), ConfigurationError> {
        let molecule = self
            .molecules
            .get_mut(id)
            .ok_or(ConfigurationError::UnknownMolecule(id))?;
        molecule.rotate(&self.cell, rotation);
        self.touch();
        Ok(())
    }

    pub fn remove_molecule(&mut self, id: MoleculeId) -> Result<Molecule, ConfigurationError> {
        let removed = self
            .molecules
            .remove(id)
            .ok_or(ConfigurationError::UnknownMolecule(id))?;
        self.restraints.retain(|r| r.molecule != id);
        self.touch();
        Ok(removed)
    }

    /// Removes every listed molecule that still exists and returns how many were removed.
    ///
    /// Ids that no longer exist are skipped, so a selection may safely be removed after
    /// another step already deleted some of its members.
    pub fn remove_molecules(&mut self, ids: &[MoleculeId]) -> usize {
        let count = ids
            .iter()
            .filter(|&&id| self.molecules.remove(id).is_some())
            .count();
        if count > 0 {
            self.restraints
                .retain(|r| self.molecules.contains_key(r.molecule));
            self.touch();
        }
        count
    }

    /// Scales the cell by `factors` and moves molecule centres so that their fractional
    /// coordinates are unchanged. Intramolecular geometry is left intact.
    pub fn scale_contents_and_cell(
        &mut self,
        factors: &Vector3<f64>,
    ) -> Result<(), ConfigurationError> {
        let new_cell = self.cell.scaled(factors)?;
        for molecule in self.molecules.values_mut() {
            let fractional = self
                .cell
                .real_to_fractional(&molecule.centre_of_geometry(&self.cell));
            let centre = new_cell.fractional_to_real(&fractional);
            molecule.set_centre_of_geometry(&self.cell, &centre);
        }
        self.cell = new_cell;
        self.touch();
        Ok(())
    }

    pub fn set_temperature(&mut self, temperature: f64) -> Result<(), ConfigurationError> {
        if !(temperature >= 0.0) {
            return Err(ConfigurationError::InvalidTemperature(temperature));
        }
        self.temperature = temperature;
        self.touch();
        Ok(())
    }

    pub fn set_size_factor(&mut self, size_factor: f64) -> Result<(), ConfigurationError> {
        if !(size_factor >= 1.0) {
            return Err(ConfigurationError::InvalidSizeFactor(size_factor));
        }
        self.size_factor = size_factor;
        self.touch();
        Ok(())
    }

    pub fn add_global_potential(&mut self, potential: GlobalPotential) {
        self.global_potentials.push(potential);
        self.touch();
    }

    pub fn add_restraint(&mut self, restraint: Restraint) -> Result<(), ConfigurationError> {
        if !self.molecules.contains_key(restraint.molecule) {
            return Err(ConfigurationError::UnknownMolecule(restraint.molecule));
        }
        self.restraints.push(restraint);
        self.touch();
        Ok(())
    }

    /// Empties the configuration of molecules and potentials. The cell is kept.
    pub fn clear(&mut self) {
        self.molecules.clear();
        self.global_potentials.clear();
        self.restraints.clear();
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::species::SpeciesAtom;

    fn argon() -> (SpeciesId, Species) {
        let mut keys: SlotMap<SpeciesId, ()> = SlotMap::with_key();
        let species = Species::new("Argon").with_atom(SpeciesAtom::new(
            "Ar",
            39.948,
            Point3::origin(),
        ));
        (keys.insert(()), species)
    }

    #[test]
    fn identities_are_unique() {
        let a = Configuration::new("A");
        let b = Configuration::new("B");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn every_mutation_bumps_the_version() {
        let (sp_id, sp) = argon();
        let mut cfg = Configuration::new("Test");
        let v0 = cfg.version();
        let mol = cfg.add_molecule(sp_id, &sp).unwrap();
        let v1 = cfg.version();
        assert!(v1 > v0);
        cfg.set_temperature(250.0).unwrap();
        let v2 = cfg.version();
        assert!(v2 > v1);
        cfg.remove_molecule(mol).unwrap();
        assert!(cfg.version() > v2);
    }

    #[test]
    fn failed_mutation_leaves_version_alone() {
        let mut cfg = Configuration::new("Test");
        let v = cfg.version();
        assert!(cfg.set_size_factor(0.5).is_err());
        assert!(cfg.set_temperature(-1.0).is_err());
        assert_eq!(cfg.version(), v);
    }

    #[test]
    fn empty_species_cannot_be_added() {
        let mut keys: SlotMap<SpeciesId, ()> = SlotMap::with_key();
        let mut cfg = Configuration::new("Test");
        let err = cfg
            .add_molecule(keys.insert(()), &Species::new("Nothing"))
            .unwrap_err();
        assert_eq!(err, ConfigurationError::EmptySpecies("Nothing".to_string()));
    }

    #[test]
    fn densities_follow_cell_volume() {
        let (sp_id, sp) = argon();
        let mut cfg = Configuration::new("Test");
        cfg.set_cell(Cell::cubic(10.0).unwrap());
        for _ in 0..10 {
            cfg.add_molecule(sp_id, &sp).unwrap();
        }
        assert!((cfg.atomic_density() - 0.01).abs() < 1e-12);
        let expected = 399.48 / (1000.0 * AVOGADRO_PER_CUBIC_ANGSTROM);
        assert!((cfg.chemical_density() - expected).abs() < 1e-12);
        assert_eq!(cfg.molecules_of_species(sp_id).len(), 10);
    }

    #[test]
    fn scaling_keeps_fractional_centres() {
        let (sp_id, sp) = argon();
        let mut cfg = Configuration::new("Test");
        cfg.set_cell(Cell::cubic(10.0).unwrap());
        let mol = cfg.add_molecule(sp_id, &sp).unwrap();
        cfg.set_molecule_centre(mol, &Point3::new(5.0, 2.5, 1.0))
            .unwrap();
        cfg.scale_contents_and_cell(&Vector3::new(2.0, 2.0, 2.0))
            .unwrap();
        let centre = cfg.molecule(mol).unwrap().positions()[0];
        assert!((centre - Point3::new(10.0, 5.0, 2.0)).norm() < 1e-9);
        assert!((cfg.cell().volume() - 8000.0).abs() < 1e-6);
    }

    #[test]
    fn removing_stale_ids_is_harmless() {
        let (sp_id, sp) = argon();
        let mut cfg = Configuration::new("Test");
        let a = cfg.add_molecule(sp_id, &sp).unwrap();
        let b = cfg.add_molecule(sp_id, &sp).unwrap();
        cfg.remove_molecule(a).unwrap();
        assert_eq!(cfg.remove_molecules(&[a, b]), 1);
        assert_eq!(cfg.n_molecules(), 0);
    }
}
