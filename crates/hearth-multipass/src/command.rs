//! Subprocess execution of the tool.
//!
//! One call spawns exactly one process. Stdout and stderr are captured
//! separately; callers that need the tool's diagnostics use
//! [`CommandOutput::combined`].

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

/// Captured result of one tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub code: Option<i32>,
    pub success: bool,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl CommandOutput {
    /// Successful output with the given stdout.
    pub fn ok(stdout: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(0),
            success: true,
            stdout: stdout.into(),
            stderr: Vec::new(),
        }
    }

    /// Failed output with the given exit code and stderr.
    pub fn failed(code: i32, stderr: impl Into<Vec<u8>>) -> Self {
        Self {
            code: Some(code),
            success: false,
            stdout: Vec::new(),
            stderr: stderr.into(),
        }
    }

    /// Stdout followed by stderr, lossily decoded.
    pub fn combined(&self) -> String {
        let mut text = String::from_utf8_lossy(&self.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&self.stderr));
        text
    }
}

/// Runs the tool with an argument vector.
///
/// This is the seam between the reconciler and the outside world: the
/// production implementation spawns a process, tests substitute a fake.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Binary this runner invokes, for diagnostics.
    fn binary(&self) -> &Path;

    /// Run the tool once.
    ///
    /// # Arguments
    /// * `args` - Argument vector, verb first
    /// * `limit` - Local wait bound; expiry yields `io::ErrorKind::TimedOut`
    ///
    /// # Errors
    /// Returns the spawn error if the process could not be started.
    /// A non-zero exit is NOT an error at this level.
    async fn run(&self, args: &[String], limit: Option<Duration>) -> io::Result<CommandOutput>;
}

/// Spawns the real binary with `tokio::process`.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    binary: PathBuf,
}

impl ProcessRunner {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

#[async_trait]
impl CommandRunner for ProcessRunner {
    fn binary(&self) -> &Path {
        &self.binary
    }

    async fn run(&self, args: &[String], limit: Option<Duration>) -> io::Result<CommandOutput> {
        debug!(binary = %self.binary.display(), args = ?args, "executing tool command");

        let mut command = Command::new(&self.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match limit {
            Some(limit) => tokio::time::timeout(limit, command.output())
                .await
                .map_err(|_| {
                    io::Error::new(
                        io::ErrorKind::TimedOut,
                        format!("no result within {limit:?}"),
                    )
                })??,
            None => command.output().await?,
        };

        let result = CommandOutput {
            code: output.status.code(),
            success: output.status.success(),
            stdout: output.stdout,
            stderr: output.stderr,
        };

        debug!(
            code = ?result.code,
            stdout_len = result.stdout.len(),
            stderr_len = result.stderr.len(),
            "tool command completed"
        );
        trace!(output = %result.combined(), "tool output");
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combined_order() {
        let output = CommandOutput {
            code: Some(1),
            success: false,
            stdout: b"partial\n".to_vec(),
            stderr: b"launch failed".to_vec(),
        };
        assert_eq!(output.combined(), "partial\nlaunch failed");
    }

    #[test]
    fn test_constructors() {
        assert!(CommandOutput::ok("{}").success);
        let failed = CommandOutput::failed(2, "nope");
        assert!(!failed.success);
        assert_eq!(failed.code, Some(2));
        assert_eq!(failed.combined(), "nope");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let runner = ProcessRunner::new("/non/existent/binary");
        let err = runner.run(&["list".into()], None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }
}
