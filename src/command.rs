//! Command runner: executes a specification's argv as a child process.
//!
//! No shell is involved; `command[0]` is the program and the rest are passed
//! verbatim. A run either yields the captured output of a successful exit or
//! a [`CommandError`] carrying the exit code and standard error text.

use std::io::{self, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// How often a timed run checks whether the child has exited.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Errors produced while running an external command.
#[derive(Debug, thiserror::Error)]
pub enum CommandError {
    #[error("command is empty")]
    Empty,

    #[error("failed to start command {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("command {program:?} failed with {}: {}", describe_code(.code), .stderr.trim())]
    Exit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("command {program:?} timed out after {timeout:?}")]
    TimedOut { program: String, timeout: Duration },
}

impl CommandError {
    /// Exit code of the failed process, if it exited normally.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exit { code, .. } => *code,
            _ => None,
        }
    }

    /// Standard error captured from the failed process.
    pub fn stderr(&self) -> Option<&str> {
        match self {
            Self::Exit { stderr, .. } => Some(stderr),
            _ => None,
        }
    }
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("exit code {code}"),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

/// Captured output of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Spawns commands, optionally bounded by a caller-supplied timeout.
#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    timeout: Option<Duration>,
}

impl CommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Kill the child and fail the run once `timeout` has elapsed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Run `command` to completion and capture its output.
    ///
    /// A non-zero exit status is an error; stdout and stderr are decoded as
    /// UTF-8, replacing invalid sequences.
    pub fn run(&self, command: &[String]) -> Result<CommandOutput, CommandError> {
        let (program, args) = command.split_first().ok_or(CommandError::Empty)?;

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::debug!(program = %program, args = ?args, "spawning command");
        let spawn_err = |source| CommandError::Spawn {
            program: program.clone(),
            source,
        };

        // A timeout too large for an `Instant` never expires.
        let deadline = self
            .timeout
            .and_then(|timeout| Some((Instant::now().checked_add(timeout)?, timeout)));
        let (status, stdout, stderr) = match deadline {
            None => {
                let output = cmd.output().map_err(spawn_err)?;
                (output.status, output.stdout, output.stderr)
            }
            Some((deadline, timeout)) => {
                let child = cmd.spawn().map_err(spawn_err)?;
                wait_with_timeout(child, program, deadline, timeout)?
            }
        };

        let stdout = String::from_utf8_lossy(&stdout).into_owned();
        let stderr = String::from_utf8_lossy(&stderr).into_owned();

        if !status.success() {
            return Err(CommandError::Exit {
                program: program.clone(),
                code: status.code(),
                stderr,
            });
        }

        Ok(CommandOutput {
            code: status.code(),
            stdout,
            stderr,
        })
    }
}

type Captured = (ExitStatus, Vec<u8>, Vec<u8>);

fn wait_with_timeout(
    mut child: Child,
    program: &str,
    deadline: Instant,
    timeout: Duration,
) -> Result<Captured, CommandError> {
    let io_err = |source| CommandError::Spawn {
        program: program.to_string(),
        source,
    };
    let timed_out = || CommandError::TimedOut {
        program: program.to_string(),
        timeout,
    };

    // Drain both pipes while polling so a child that fills a pipe buffer
    // cannot stall before exiting.
    let (tx, rx) = mpsc::channel();
    let mut pipes = 0;
    if let Some(pipe) = child.stdout.take() {
        drain(pipe, Stream::Stdout, tx.clone());
        pipes += 1;
    }
    if let Some(pipe) = child.stderr.take() {
        drain(pipe, Stream::Stderr, tx.clone());
        pipes += 1;
    }
    drop(tx);

    let status = loop {
        if let Some(status) = child.try_wait().map_err(io_err)? {
            break status;
        }
        if Instant::now() >= deadline {
            tracing::warn!(program = %program, ?timeout, "killing command after timeout");
            // The child may exit between try_wait and kill; either way reap it.
            let _ = child.kill();
            child.wait().map_err(io_err)?;
            return Err(timed_out());
        }
        thread::sleep(POLL_INTERVAL);
    };

    // A background process started by the child can keep the pipes open
    // after the child exits, so reading them is bounded by the same deadline.
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    for _ in 0..pipes {
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok((Stream::Stdout, read)) => stdout = read.map_err(io_err)?,
            Ok((Stream::Stderr, read)) => stderr = read.map_err(io_err)?,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    program = %program,
                    ?timeout,
                    "command output still open after timeout"
                );
                return Err(timed_out());
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(io_err(io::Error::other("output reader thread panicked")));
            }
        }
    }
    Ok((status, stdout, stderr))
}

#[derive(Debug, Clone, Copy)]
enum Stream {
    Stdout,
    Stderr,
}

type Chunk = (Stream, io::Result<Vec<u8>>);

fn drain<R: Read + Send + 'static>(mut pipe: R, stream: Stream, tx: Sender<Chunk>) {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let read = pipe.read_to_end(&mut buf).map(|_| buf);
        // Nobody is listening once the run has timed out.
        let _ = tx.send((stream, read));
    });
}
