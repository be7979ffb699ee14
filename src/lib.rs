//! Declarative command-output specifications.
//!
//! A specification names a command, a pattern that extracts records from
//! the command's output, a field to group records by and a reduction per
//! field. [`Pipeline`] binds one specification and runs it on demand;
//! scheduling runs every `interval` seconds is left to the caller.

pub mod apply;
pub mod command;
pub mod error;
pub mod filter;
pub mod pipeline;
pub mod spec;
pub mod split;

pub use command::{CommandError, CommandOutput, CommandRunner};
pub use error::{Error, Result};
pub use pipeline::{Pipeline, RunResult, run_specification};
pub use spec::{Schema, Specification};
