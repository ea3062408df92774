//! # Workflows Module
//!
//! High-level entry points that tie the engine and the data model together.
//!
//! ## Overview
//!
//! A workflow takes care of everything around a procedure run: loading the document,
//! refusing procedures that fail their scope check, building the configuration and the
//! process pool from the run settings, and summarising the result. Front ends such as
//! the command-line tool call these functions rather than driving the engine directly.
//!
//! ## Architecture
//!
//! - **Generation Workflow** ([`generate`]) - load, check and run a generation procedure
//!   against a configuration, skipping runs the configuration does not need.

pub mod generate;
