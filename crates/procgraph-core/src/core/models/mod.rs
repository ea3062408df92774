pub mod cell;
pub mod configuration;
pub mod ids;
pub mod molecule;
pub mod species;
