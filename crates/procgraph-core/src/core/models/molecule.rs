use super::cell::Cell;
use super::ids::SpeciesId;
use nalgebra::{Point3, Rotation3, Vector3};

/// A molecule instantiated from a species inside a configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Molecule {
    species: SpeciesId,
    positions: Vec<Point3<f64>>,
    mass: f64,
}

impl Molecule {
    pub(crate) fn new(species: SpeciesId, positions: Vec<Point3<f64>>, mass: f64) -> Self {
        Self {
            species,
            positions,
            mass,
        }
    }

    pub fn species(&self) -> SpeciesId {
        self.species
    }

    pub fn positions(&self) -> &[Point3<f64>] {
        &self.positions
    }

    pub fn n_atoms(&self) -> usize {
        self.positions.len()
    }

    /// Total mass in g/mol, taken from the species at instantiation.
    pub fn mass(&self) -> f64 {
        self.mass
    }

    /// Returns the centre of geometry, unfolding atoms around the first one using
    /// the minimum-image convention of the given cell.
    pub fn centre_of_geometry(&self, cell: &Cell) -> Point3<f64> {
        let Some(reference) = self.positions.first() else {
            return Point3::origin();
        };
        let offset = self
            .positions
            .iter()
            .fold(Vector3::zeros(), |acc, r| {
                acc + cell.minimum_image_vector(reference, r)
            });
        reference + offset / self.positions.len() as f64
    }

    /// Translates the molecule so that its centre of geometry lies at `centre`.
    pub(crate) fn set_centre_of_geometry(&mut self, cell: &Cell, centre: &Point3<f64>) {
        let shift = centre - self.centre_of_geometry(cell);
        self.translate(&shift);
    }

    pub(crate) fn translate(&mut self, shift: &Vector3<f64>) {
        for r in &mut self.positions {
            *r += shift;
        }
    }

    /// Rotates the molecule about its centre of geometry.
    pub(crate) fn rotate(&mut self, cell: &Cell, rotation: &Rotation3<f64>) {
        let centre = self.centre_of_geometry(cell);
        for r in &mut self.positions {
            let local = cell.minimum_image_vector(&centre, r);
            *r = centre + rotation * local;
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::SlotMap;

    fn molecule() -> Molecule {
        let mut keys: SlotMap<SpeciesId, ()> = SlotMap::with_key();
        let id = keys.insert(());
        Molecule::new(
            id,
            vec![Point3::new(0.0, 0.0, 0.0), Point3::new(2.0, 0.0, 0.0)],
            2.0,
        )
    }

    #[test]
    fn centre_is_unfolded_across_the_boundary() {
        let cell = Cell::cubic(10.0).unwrap();
        let mut keys: SlotMap<SpeciesId, ()> = SlotMap::with_key();
        let mol = Molecule::new(
            keys.insert(()),
            vec![Point3::new(9.5, 5.0, 5.0), Point3::new(0.5, 5.0, 5.0)],
            2.0,
        );
        let cog = mol.centre_of_geometry(&cell);
        assert!((cog.x - 10.0).abs() < 1e-9);
    }

    #[test]
    fn set_centre_translates_all_atoms() {
        let cell = Cell::cubic(20.0).unwrap();
        let mut mol = molecule();
        mol.set_centre_of_geometry(&cell, &Point3::new(5.0, 5.0, 5.0));
        assert_eq!(mol.positions()[0], Point3::new(4.0, 5.0, 5.0));
        assert_eq!(mol.positions()[1], Point3::new(6.0, 5.0, 5.0));
    }

    #[test]
    fn rotation_preserves_centre_and_bond_length() {
        let cell = Cell::cubic(20.0).unwrap();
        let mut mol = molecule();
        let before = mol.centre_of_geometry(&cell);
        let rotation = Rotation3::from_axis_angle(&Vector3::z_axis(), std::f64::consts::FRAC_PI_2);
        mol.rotate(&cell, &rotation);
        let after = mol.centre_of_geometry(&cell);
        assert!((after - before).norm() < 1e-9);
        let bond = (mol.positions()[1] - mol.positions()[0]).norm();
        assert!((bond - 2.0).abs() < 1e-9);
        assert!((mol.positions()[0].y - (-1.0)).abs() < 1e-9);
    }
}
