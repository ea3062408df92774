use crate::core::models::cell::Cell;
use crate::core::pool::ProcessPool;
use nalgebra::{Point3, Unit, Vector3};

const MAX_PLACEMENT_ATTEMPTS: usize = 1000;

/// A part of the cell published by a region node for others to place into or pick from.
#[derive(Debug, Clone, PartialEq)]
pub enum Region {
    /// Infinite cylinder around a line, measured with minimum-image vectors.
    Cylinder {
        origin: Point3<f64>,
        axis: Unit<Vector3<f64>>,
        radius: f64,
    },
    /// Space further than `tolerance` from every listed atom.
    FreeSpace {
        tolerance: f64,
        atoms: Vec<Point3<f64>>,
    },
}

impl Region {
    pub fn contains(&self, cell: &Cell, point: &Point3<f64>) -> bool {
        match self {
            Region::Cylinder {
                origin,
                axis,
                radius,
            } => {
                let v = cell.minimum_image_vector(origin, point);
                let along = axis.into_inner() * v.dot(axis);
                (v - along).norm() <= *radius
            }
            Region::FreeSpace { tolerance, atoms } => atoms
                .iter()
                .all(|atom| cell.minimum_image_distance(atom, point) > *tolerance),
        }
    }

    /// Samples uniformly random points in the cell until one falls inside the region.
    ///
    /// Returns `None` if no point was found within a fixed number of attempts.
    pub fn random_position(&self, cell: &Cell, pool: &ProcessPool) -> Option<Point3<f64>> {
        (0..MAX_PLACEMENT_ATTEMPTS).find_map(|_| {
            let fractional = Point3::new(pool.random(), pool.random(), pool.random());
            let candidate = cell.fractional_to_real(&fractional);
            self.contains(cell, &candidate).then_some(candidate)
        })
    }
}
