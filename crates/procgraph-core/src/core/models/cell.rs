use nalgebra::{Matrix3, Point3, Vector3};
use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CellError {
    #[error("Cell axis lengths must be positive (got {0:?})")]
    NonPositiveLength([f64; 3]),
    #[error("Cell angles must lie strictly between 0 and 180 degrees (got {0:?})")]
    InvalidAngle([f64; 3]),
    #[error("Cell angles {0:?} do not describe a valid parallelepiped")]
    Degenerate([f64; 3]),
    #[error("Cell scale factors must be positive (got {0:?})")]
    InvalidScaleFactors([f64; 3]),
}

/// Kind of simulation cell, derived from its axis lengths and angles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CellKind {
    NonPeriodic,
    Cubic,
    Orthorhombic,
    Monoclinic,
    Triclinic,
}

impl fmt::Display for CellKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                CellKind::NonPeriodic => "NonPeriodic",
                CellKind::Cubic => "Cubic",
                CellKind::Orthorhombic => "Orthorhombic",
                CellKind::Monoclinic => "Monoclinic",
                CellKind::Triclinic => "Triclinic",
            }
        )
    }
}

const ANGLE_TOLERANCE: f64 = 1.0e-8;

/// Represents the (possibly periodic) simulation cell of a configuration.
///
/// The cell is defined by its three axis lengths (Angstroms) and the angles
/// alpha, beta and gamma between them (degrees). The A axis is aligned with x and
/// the B axis lies in the xy plane. The full axes matrix and its inverse are cached
/// so that conversions between fractional and real coordinates are cheap.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    lengths: Vector3<f64>,
    angles: Vector3<f64>,
    periodic: bool,
    axes: Matrix3<f64>,
    inverse_axes: Matrix3<f64>,
}

impl Default for Cell {
    fn default() -> Self {
        let unit = Vector3::new(1.0, 1.0, 1.0);
        let right = Vector3::new(90.0, 90.0, 90.0);
        Self {
            lengths: unit,
            angles: right,
            periodic: true,
            axes: Matrix3::identity(),
            inverse_axes: Matrix3::identity(),
        }
    }
}

impl Cell {
    /// Creates a new periodic cell from axis lengths and angles.
    ///
    /// # Arguments
    ///
    /// * `lengths` - The A, B and C axis lengths in Angstroms.
    /// * `angles` - The alpha, beta and gamma angles in degrees.
    ///
    /// # Errors
    ///
    /// Returns a [`CellError`] if any length is not positive, any angle lies outside
    /// (0, 180), or the angles cannot form a parallelepiped.
    pub fn new(lengths: Vector3<f64>, angles: Vector3<f64>) -> Result<Self, CellError> {
        Self::build(lengths, angles, true)
    }

    /// Creates a cubic periodic cell with the given side length.
    pub fn cubic(length: f64) -> Result<Self, CellError> {
        Self::new(
            Vector3::new(length, length, length),
            Vector3::new(90.0, 90.0, 90.0),
        )
    }

    /// Creates a non-periodic (orthorhombic) pseudo-cell.
    ///
    /// A non-periodic cell still has a volume, which is used for density
    /// calculations, but minimum-image conventions are not applied.
    pub fn non_periodic(lengths: Vector3<f64>) -> Result<Self, CellError> {
        Self::build(lengths, Vector3::new(90.0, 90.0, 90.0), false)
    }

    fn build(lengths: Vector3<f64>, angles: Vector3<f64>, periodic: bool) -> Result<Self, CellError> {
        if lengths.iter().any(|&l| !(l > 0.0) || !l.is_finite()) {
            return Err(CellError::NonPositiveLength([lengths.x, lengths.y, lengths.z]));
        }
        if angles.iter().any(|&a| !(a > 0.0 && a < 180.0)) {
            return Err(CellError::InvalidAngle([angles.x, angles.y, angles.z]));
        }

        let (alpha, beta, gamma) = (
            angles.x.to_radians(),
            angles.y.to_radians(),
            angles.z.to_radians(),
        );
        let cx = beta.cos();
        let cy = (alpha.cos() - beta.cos() * gamma.cos()) / gamma.sin();
        let cz_squared = 1.0 - cx * cx - cy * cy;
        if cz_squared <= 0.0 {
            return Err(CellError::Degenerate([angles.x, angles.y, angles.z]));
        }

        let a = Vector3::new(lengths.x, 0.0, 0.0);
        let b = Vector3::new(lengths.y * gamma.cos(), lengths.y * gamma.sin(), 0.0);
        let c = Vector3::new(cx, cy, cz_squared.sqrt()) * lengths.z;
        let axes = Matrix3::from_columns(&[a, b, c]);
        let inverse_axes = axes
            .try_inverse()
            .ok_or(CellError::Degenerate([angles.x, angles.y, angles.z]))?;

        Ok(Self {
            lengths,
            angles,
            periodic,
            axes,
            inverse_axes,
        })
    }

    /// Returns the kind of cell described by the current lengths and angles.
    pub fn kind(&self) -> CellKind {
        if !self.periodic {
            return CellKind::NonPeriodic;
        }
        let right = |a: f64| (a - 90.0).abs() < ANGLE_TOLERANCE;
        let n_right = self.angles.iter().filter(|&&a| right(a)).count();
        match n_right {
            3 => {
                let l = self.lengths;
                if (l.x - l.y).abs() < ANGLE_TOLERANCE && (l.x - l.z).abs() < ANGLE_TOLERANCE {
                    CellKind::Cubic
                } else {
                    CellKind::Orthorhombic
                }
            }
            2 => CellKind::Monoclinic,
            _ => CellKind::Triclinic,
        }
    }

    pub fn lengths(&self) -> Vector3<f64> {
        self.lengths
    }

    pub fn angles(&self) -> Vector3<f64> {
        self.angles
    }

    pub fn is_periodic(&self) -> bool {
        self.periodic
    }

    /// Returns the axes matrix, with the A, B and C vectors as its columns.
    pub fn axes(&self) -> &Matrix3<f64> {
        &self.axes
    }

    /// Returns the volume of the cell in cubic Angstroms.
    pub fn volume(&self) -> f64 {
        self.axes.determinant().abs()
    }

    /// Converts a fractional coordinate into a real-space position.
    pub fn fractional_to_real(&self, fractional: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.axes * fractional.coords)
    }

    /// Converts a real-space position into fractional coordinates.
    pub fn real_to_fractional(&self, real: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.inverse_axes * real.coords)
    }

    /// Returns the minimum-image vector pointing from `from` to `to`.
    ///
    /// For non-periodic cells this is the plain difference vector.
    pub fn minimum_image_vector(&self, from: &Point3<f64>, to: &Point3<f64>) -> Vector3<f64> {
        let delta = to - from;
        if !self.periodic {
            return delta;
        }
        let mut fractional = self.inverse_axes * delta;
        fractional.apply(|f| {
            let image = f.round();
            *f -= image;
        });
        self.axes * fractional
    }

    /// Returns the minimum-image distance between two positions.
    pub fn minimum_image_distance(&self, a: &Point3<f64>, b: &Point3<f64>) -> f64 {
        self.minimum_image_vector(a, b).norm()
    }

    /// Folds a real-space position back into the cell.
    pub fn fold(&self, real: &Point3<f64>) -> Point3<f64> {
        if !self.periodic {
            return *real;
        }
        let mut fractional = self.real_to_fractional(real);
        fractional.coords.apply(|f| {
            let cell_index = f.floor();
            *f -= cell_index;
        });
        self.fractional_to_real(&fractional)
    }

    /// Calculates the axis scale factors required to reach a target volume.
    ///
    /// Only the axes flagged as scalable are changed, each by the same factor.
    ///
    /// # Arguments
    ///
    /// * `required_volume` - The target volume in cubic Angstroms.
    /// * `scalable_axes` - Which of the A, B and C axes may be scaled.
    ///
    /// # Return
    ///
    /// The per-axis scale factors (1.0 for axes that are not scaled).
    pub fn scale_factors(&self, required_volume: f64, scalable_axes: [bool; 3]) -> Vector3<f64> {
        let n_scalable = scalable_axes.iter().filter(|&&s| s).count();
        if n_scalable == 0 || required_volume <= 0.0 {
            return Vector3::new(1.0, 1.0, 1.0);
        }
        let factor = (required_volume / self.volume()).powf(1.0 / n_scalable as f64);
        Vector3::from_iterator(
            scalable_axes
                .iter()
                .map(|&scalable| if scalable { factor } else { 1.0 }),
        )
    }

    /// Returns a copy of the cell with its axis lengths multiplied by the given factors.
    pub fn scaled(&self, factors: &Vector3<f64>) -> Result<Self, CellError> {
        if factors.iter().any(|&f| !(f > 0.0) || !f.is_finite()) {
            return Err(CellError::InvalidScaleFactors([factors.x, factors.y, factors.z]));
        }
        Self::build(self.lengths.component_mul(factors), self.angles, self.periodic)
    }
}
