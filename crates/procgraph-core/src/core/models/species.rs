use super::cell::Cell;
use nalgebra::Point3;

/// A single atom within a species template.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesAtom {
    /// Element symbol (e.g., "O", "H").
    pub element: String,
    /// Atomic mass in g/mol.
    pub mass: f64,
    /// Reference position in Angstroms.
    pub position: Point3<f64>,
}

impl SpeciesAtom {
    pub fn new(element: &str, mass: f64, position: Point3<f64>) -> Self {
        Self {
            element: element.to_string(),
            mass,
            position,
        }
    }
}

/// A molecular template from which molecules are instantiated in a configuration.
///
/// Species are owned by [`CoreData`](crate::core::data::CoreData) and referenced
/// everywhere else by [`SpeciesId`](super::ids::SpeciesId).
#[derive(Debug, Clone, PartialEq)]
pub struct Species {
    pub name: String,
    atoms: Vec<SpeciesAtom>,
    cell: Option<Cell>,
}

impl Species {
    /// Creates a new, empty species with the given name.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            atoms: Vec::new(),
            cell: None,
        }
    }

    /// Adds an atom to the species and returns `self` for chaining.
    pub fn with_atom(mut self, atom: SpeciesAtom) -> Self {
        self.atoms.push(atom);
        self
    }

    /// Attaches a periodic cell definition to the species (used by "Set" box actions).
    pub fn with_cell(mut self, cell: Cell) -> Self {
        self.cell = Some(cell);
        self
    }

    pub fn atoms(&self) -> &[SpeciesAtom] {
        &self.atoms
    }

    pub fn n_atoms(&self) -> usize {
        self.atoms.len()
    }

    pub fn cell(&self) -> Option<&Cell> {
        self.cell.as_ref()
    }

    /// Returns the total mass of the species in g/mol.
    pub fn mass(&self) -> f64 {
        self.atoms.iter().map(|a| a.mass).sum()
    }

    /// Returns the geometric centre of the reference coordinates.
    ///
    /// # Return
    ///
    /// `None` if the species has no atoms.
    pub fn centre_of_geometry(&self) -> Option<Point3<f64>> {
        if self.atoms.is_empty() {
            return None;
        }
        let sum = self
            .atoms
            .iter()
            .fold(nalgebra::Vector3::zeros(), |acc, a| acc + a.position.coords);
        Some(Point3::from(sum / self.atoms.len() as f64))
    }

    /// Returns the reference coordinates of all atoms.
    pub fn reference_positions(&self) -> Vec<Point3<f64>> {
        self.atoms.iter().map(|a| a.position).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn water() -> Species {
        Species::new("Water")
            .with_atom(SpeciesAtom::new("O", 15.999, Point3::new(0.0, 0.0, 0.0)))
            .with_atom(SpeciesAtom::new("H", 1.008, Point3::new(0.96, 0.0, 0.0)))
            .with_atom(SpeciesAtom::new("H", 1.008, Point3::new(-0.24, 0.93, 0.0)))
    }

    #[test]
    fn mass_and_atom_count_are_reported() {
        let sp = water();
        assert_eq!(sp.n_atoms(), 3);
        assert!((sp.mass() - 18.015).abs() < 1e-9);
    }

    #[test]
    fn centre_of_geometry_is_mean_position() {
        let sp = water();
        let cog = sp.centre_of_geometry().unwrap();
        assert!((cog.x - 0.24).abs() < 1e-9);
        assert!((cog.y - 0.31).abs() < 1e-9);
        assert!(Species::new("Empty").centre_of_geometry().is_none());
    }
}
