//! The built-in node catalogue, grouped the way the registry presents it.

pub mod add;
pub mod build;
pub mod general;
pub mod pick;
pub mod potentials;
pub mod regions;
