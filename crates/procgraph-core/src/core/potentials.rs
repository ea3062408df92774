//! Definitions of external potentials attached to a configuration.
//!
//! Only the parameters are stored here. Evaluating energies and forces belongs to the
//! simulation kernels that consume a configuration, not to the procedure engine.

use super::models::ids::MoleculeId;
use nalgebra::{Point3, Vector3};
use std::fmt;

/// Functional form of a global potential.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PotentialForm {
    #[default]
    Harmonic,
    SoftWall,
}

impl fmt::Display for PotentialForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PotentialForm::Harmonic => write!(f, "Harmonic"),
            PotentialForm::SoftWall => write!(f, "SoftWall"),
        }
    }
}

/// A potential acting on every atom of a configuration.
#[derive(Debug, Clone, PartialEq)]
pub enum GlobalPotential {
    /// Restrains atoms with respect to a sphere centred at `origin`.
    Spherical {
        origin: Point3<f64>,
        form: PotentialForm,
        force_constant: f64,
        radius: f64,
    },
    /// Restrains atoms with respect to an infinite cylinder through `origin` along `vector`.
    Cylindrical {
        origin: Point3<f64>,
        vector: Vector3<f64>,
        form: PotentialForm,
        force_constant: f64,
        radius: f64,
    },
}

impl GlobalPotential {
    pub fn form(&self) -> PotentialForm {
        match self {
            GlobalPotential::Spherical { form, .. } | GlobalPotential::Cylindrical { form, .. } => {
                *form
            }
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            GlobalPotential::Spherical { .. } => "Spherical",
            GlobalPotential::Cylindrical { .. } => "Cylindrical",
        }
    }
}

/// A harmonic positional restraint tying one atom to a fixed anchor point.
#[derive(Debug, Clone, PartialEq)]
pub struct Restraint {
    pub molecule: MoleculeId,
    pub atom: usize,
    pub anchor: Point3<f64>,
    pub force_constant: f64,
}
