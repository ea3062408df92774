//! # Engine Module
//!
//! This module implements the procedure graph: the nodes that build and modify a
//! configuration, the keywords that parameterise them, and the machinery that keeps a
//! graph of nodes consistent while it is edited and run.
//!
//! ## Overview
//!
//! A [`procedure::Procedure`] owns an arena of nodes arranged in nested sequences.
//! Nodes see the nodes before them in their own sequence and in every enclosing
//! sequence, and their keywords hold references that are resolved by name within that
//! scope and repaired whenever the graph changes shape. Running a procedure walks the
//! graph through prepare, execute and finalise phases against a
//! [`context::ProcedureContext`], stopping at the first node failure.
//!
//! ## Architecture
//!
//! - **Values and Keywords** ([`value`], [`keywords`]) - literal or expression-backed
//!   numbers and the typed, self-validating parameters built from them
//! - **Nodes** ([`node`], [`nodes`], [`registry`]) - the node trait, the built-in
//!   catalogue and the factory that produces nodes from their type tags
//! - **Graph and Scope** ([`graph`], [`sequence`]) - arena storage, visibility rules
//!   and scope validation
//! - **Procedure** ([`procedure`], [`serialise`]) - editing, execution and persistence
//! - **Run State** ([`context`], [`region`], [`progress`]) - what a node can reach
//!   while it runs and how progress is reported
//! - **Configuration** ([`config`]) - settings for a generation run
//! - **Error Handling** ([`error`]) - keyword, node and procedure error types

pub mod config;
pub mod context;
pub mod error;
pub mod graph;
pub mod keywords;
pub mod node;
pub mod nodes;
pub mod procedure;
pub mod progress;
pub mod region;
pub mod registry;
pub mod sequence;
pub mod serialise;
pub mod value;
