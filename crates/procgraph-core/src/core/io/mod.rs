//! Reading and writing procedure documents.
//!
//! The current on-disk form is a versioned TOML document ([`document`]); older TOML
//! documents are brought up to date by the [`upgrade`] table, and the older
//! line-oriented block format is read by [`legacy`].

pub mod document;
pub mod error;
pub mod legacy;
pub mod upgrade;

pub use document::{CURRENT_VERSION, DocumentVersion, ProcedureDocument};
pub use error::DocumentError;
