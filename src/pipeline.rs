//! Orchestrator: one reusable pipeline per specification.
//!
//! Building compiles the matcher and resolves transforms once; every `run`
//! then executes command -> filter -> split -> apply and either returns the
//! full result or the first stage error.

use crate::apply::{Output, Transforms};
use crate::command::CommandRunner;
use crate::filter::Matcher;
use crate::spec::Specification;
use crate::split::Splitter;
use crate::Result;
use serde::Serialize;
use serde_json::{Number, Value};
use std::time::Duration;

/// Outcome of one successful run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunResult {
    pub name: String,
    pub interval: Number,
    pub result: Output,
}

/// A specification bound to its compiled stages.
///
/// Holds only immutable data, so one pipeline can be run repeatedly or from
/// several threads; each run spawns its own child process.
#[derive(Debug, Clone)]
pub struct Pipeline {
    name: String,
    interval: Number,
    period: Duration,
    command: Vec<String>,
    runner: CommandRunner,
    matcher: Matcher,
    splitter: Splitter,
    transforms: Transforms,
}

impl Pipeline {
    pub fn build(spec: &Specification) -> Result<Self> {
        Self::with_runner(spec, CommandRunner::new())
    }

    /// Build with a caller-configured runner (e.g. one with a timeout).
    pub fn with_runner(spec: &Specification, runner: CommandRunner) -> Result<Self> {
        let matcher = Matcher::compile(&spec.filter.pattern, spec.filter.flags)?;
        let transforms = Transforms::resolve(&spec.apply)?;
        let splitter = Splitter::new(spec.split.key.clone(), spec.split.select.clone());

        if let Some(key) = splitter.key()
            && !matcher.fields().contains(&key)
        {
            // Not fatal here: the contract is to fail at run time, and only
            // when the command actually produced matches.
            tracing::warn!(
                spec = %spec.name,
                key,
                fields = ?matcher.fields(),
                "split key is not a group of the filter pattern"
            );
        }

        tracing::info!(spec = %spec.name, command = ?spec.command, "built pipeline");
        Ok(Self {
            name: spec.name.clone(),
            interval: spec.interval.clone(),
            period: spec.interval(),
            command: spec.command.clone(),
            runner,
            matcher,
            splitter,
            transforms,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// How long the caller should wait between runs.
    pub fn interval(&self) -> Duration {
        self.period
    }

    /// Run the specification once.
    pub fn run(&self) -> Result<RunResult> {
        let output = self.runner.run(&self.command)?;
        if !output.stderr.trim().is_empty() {
            tracing::warn!(spec = %self.name, stderr = %output.stderr.trim(), "command wrote to stderr");
        }

        let records = self.matcher.find_all(&output.stdout);
        tracing::debug!(spec = %self.name, matches = records.len(), "filtered command output");

        let pools = self.splitter.split(records)?;
        let result = self.transforms.apply(pools)?;

        Ok(RunResult {
            name: self.name.clone(),
            interval: self.interval.clone(),
            result,
        })
    }
}

/// Validate `doc`, build its pipeline and run it once.
pub fn run_specification(doc: &Value) -> Result<RunResult> {
    let spec = Specification::from_value(doc)?;
    Pipeline::build(&spec)?.run()
}
