//! Invocation of the external `lmutil` executable.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, trace};

/// Default upper bound for a single `lmutil` run.
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Error type for command execution failures.
#[derive(Debug)]
pub enum CommandError {
    /// The executable could not be started.
    Spawn(std::io::Error),
    /// The command did not finish in time and was killed.
    Timeout(Duration),
}

impl std::fmt::Display for CommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommandError::Spawn(e) => write!(f, "failed to run lmutil: {}", e),
            CommandError::Timeout(t) => write!(f, "lmutil timed out after {}s", t.as_secs()),
        }
    }
}

impl std::error::Error for CommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CommandError::Spawn(e) => Some(e),
            CommandError::Timeout(_) => None,
        }
    }
}

impl From<std::io::Error> for CommandError {
    fn from(e: std::io::Error) -> Self {
        CommandError::Spawn(e)
    }
}

/// Captured result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `-1` when the process was terminated by a signal.
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Runs `lmutil` with the given arguments.
///
/// Implementations must be cancel-safe: dropping the returned future abandons
/// the run and must not leave the child process behind.
#[async_trait]
pub trait LmutilRunner: Send + Sync {
    async fn run(&self, args: &[String]) -> Result<CommandOutput, CommandError>;
}

/// Runs the real executable through `tokio::process`.
pub struct ProcessRunner {
    program: String,
    timeout: Duration,
}

impl ProcessRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl LmutilRunner for ProcessRunner {
    async fn run(&self, args: &[String]) -> Result<CommandOutput, CommandError> {
        run_with_timeout(&self.program, args, self.timeout).await
    }
}

/// Spawns `program args...`, captures output and kills the child on timeout or drop.
pub async fn run_with_timeout(
    program: &str,
    args: &[String],
    timeout: Duration,
) -> Result<CommandOutput, CommandError> {
    debug!(program, ?args, "running command");

    let child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(CommandError::Timeout(timeout)),
    };

    let result = CommandOutput {
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
    };
    debug!(program, exit_code = result.exit_code, "command finished");
    trace!(stdout = %result.stdout, stderr = %result.stderr, "command output");
    Ok(result)
}

/// Arguments for `lmstat -a` against `port@host`.
pub fn lmstat_args(host: &str, port: u16) -> Vec<String> {
    vec![
        "lmstat".to_string(),
        "-a".to_string(),
        "-c".to_string(),
        format!("{}@{}", port, host),
    ]
}
