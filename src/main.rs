use anyhow::Context;
use clap::{Parser, Subcommand};
use specpipe::{CommandRunner, Pipeline, Specification};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub type Result<T> = anyhow::Result<T>;

#[derive(Parser)]
#[command(name = "specpipe")]
#[command(about = "Run command-output specifications", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a specification and compile its pipeline without running it.
    Validate {
        #[arg(long)]
        spec: PathBuf,
    },

    /// Run a specification once and print the result as JSON.
    Run {
        #[arg(long)]
        spec: PathBuf,

        /// Kill the command after this many seconds.
        #[arg(long)]
        timeout: Option<f64>,

        #[arg(long)]
        pretty: bool,
    },

    /// Run a specification every `interval` seconds, one JSON line per run.
    Watch {
        #[arg(long)]
        spec: PathBuf,

        /// Kill the command after this many seconds.
        #[arg(long)]
        timeout: Option<f64>,

        /// Stop after this many runs.
        #[arg(long)]
        count: Option<u64>,
    },
}

fn main() -> Result<()> {
    // stdout carries results; diagnostics go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.cmd {
        Commands::Validate { spec } => {
            let spec = load_spec(&spec)?;
            Pipeline::build(&spec)?;
            println!("ok: {}", spec.name);
        }
        Commands::Run {
            spec,
            timeout,
            pretty,
        } => {
            let pipeline = build_pipeline(&spec, timeout)?;
            let result = pipeline.run()?;
            let json = if pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{json}");
        }
        Commands::Watch {
            spec,
            timeout,
            count,
        } => {
            let pipeline = build_pipeline(&spec, timeout)?;
            watch(&pipeline, count)?;
        }
    }

    Ok(())
}

fn load_spec(path: &Path) -> Result<Specification> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read specification file {}", path.display()))?;
    let doc: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("parse specification file {}", path.display()))?;
    let spec = Specification::from_value(&doc)
        .with_context(|| format!("invalid specification {}", path.display()))?;
    Ok(spec)
}

fn build_pipeline(path: &Path, timeout: Option<f64>) -> Result<Pipeline> {
    let spec = load_spec(path)?;
    let mut runner = CommandRunner::new();
    if let Some(secs) = timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("invalid timeout {secs}"))?;
        runner = runner.with_timeout(timeout);
    }
    Ok(Pipeline::with_runner(&spec, runner)?)
}

/// Caller-side scheduling: runs never overlap, and a failed run is reported
/// without stopping the loop.
fn watch(pipeline: &Pipeline, count: Option<u64>) -> Result<()> {
    let mut runs = 0u64;
    loop {
        match pipeline.run() {
            Ok(result) => println!("{}", serde_json::to_string(&result)?),
            Err(e) => tracing::error!(spec = %pipeline.name(), error = %e, "run failed"),
        }
        runs += 1;
        if count.is_some_and(|n| runs >= n) {
            return Ok(());
        }
        std::thread::sleep(pipeline.interval());
    }
}
