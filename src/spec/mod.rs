//! Spec layer: document schema + validated in-memory specification.
//!
//! This module is intentionally separate from command execution and the
//! pipeline stages. It owns:
//! - Schema (structural contract, recognized filter flags)
//! - Specification (typed, immutable configuration of one pipeline)

pub mod document;
pub mod schema;

pub use document::{FilterFlags, FilterSpec, Specification, SplitSpec};
pub use schema::{FilterFlag, Schema};
