//! # procgraph
//!
//! A procedure graph engine for building and mutating atomistic simulation
//! configurations. A procedure is an ordered, nestable graph of typed nodes ("add 100
//! water molecules at this density", "pick molecules near a solute", "remove the
//! picked molecules") whose parameters may be expressions over named parameters
//! defined earlier in the graph.
//!
//! ## Architectural Philosophy
//!
//! The library follows a strict three-layer architecture.
//!
//! - **[`core`]: The Foundation.** The atomistic data model (species, cells, molecules,
//!   configurations), the expression language and document I/O.
//!
//! - **[`engine`]: The Logic Core.** The procedure graph itself: keywords, nodes, scope
//!   rules, editing operations and execution.
//!
//! - **[`workflows`]: The Public API.** Entry points that load a procedure, check it and
//!   run it against a configuration in one call.

pub mod core;
pub mod engine;
pub mod workflows;
