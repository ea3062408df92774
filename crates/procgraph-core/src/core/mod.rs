//! # Core Module
//!
//! The foundation layer: the atomistic data model that procedures build and modify,
//! the expression language used by node values, and document I/O.
//!
//! - **Data model** ([`models`], [`data`], [`potentials`]) - species, cells, molecules,
//!   configurations and the species registry
//! - **Execution resources** ([`pool`]) - the seeded random source handed to a run
//! - **Expressions** ([`expression`]) - compiled arithmetic bound to live parameters
//! - **Documents** ([`io`]) - versioned TOML documents, upgrades and the legacy format

pub mod data;
pub mod expression;
pub mod io;
pub mod models;
pub mod pool;
pub mod potentials;
