//! Run configuration: a TOML file merged with command-line overrides over built-in defaults.

pub mod builder;
pub mod defaults;
pub mod file;
pub mod models;
