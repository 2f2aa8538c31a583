//! MultipassClient - typed operations over the tool's command surface.

use crate::command::{CommandOutput, CommandRunner, ProcessRunner};
use crate::decode::{decode_info, decode_list, InfoOutcome};
use crate::error::{Action, FailureCause, Result, ToolError};
use crate::launch::LaunchRequest;
use crate::record::VmRecord;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Binary used when no path is configured.
pub const DEFAULT_BINARY: &str = "multipass";

/// Extra local wait on top of the tool's own `--timeout`.
const DEFAULT_LAUNCH_GRACE: Duration = Duration::from_secs(30);

/// Client for the Multipass CLI.
///
/// Holds no state besides the runner, so clones are cheap and can be used
/// from any number of tasks at once.
#[derive(Clone)]
pub struct MultipassClient {
    runner: Arc<dyn CommandRunner>,
    launch_grace: Duration,
}

impl std::fmt::Debug for MultipassClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MultipassClient")
            .field("binary", &self.runner.binary())
            .field("launch_grace", &self.launch_grace)
            .finish()
    }
}

impl MultipassClient {
    /// Create a client spawning the given binary (`multipass` when empty).
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        let mut binary = binary.into();
        if binary.as_os_str().is_empty() {
            binary = PathBuf::from(DEFAULT_BINARY);
        }
        Self::with_runner(Arc::new(ProcessRunner::new(binary)))
    }

    /// Create a client over a custom runner.
    pub fn with_runner(runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            launch_grace: DEFAULT_LAUNCH_GRACE,
        }
    }

    /// Set how long to wait past the tool's own launch timeout.
    pub fn launch_grace(mut self, grace: Duration) -> Self {
        self.launch_grace = grace;
        self
    }

    /// Binary this client invokes.
    pub fn binary(&self) -> &Path {
        self.runner.binary()
    }

    async fn exec(
        &self,
        action: Action,
        args: Vec<String>,
        limit: Option<Duration>,
    ) -> Result<CommandOutput> {
        let output = match self.runner.run(&args, limit).await {
            Ok(output) => output,
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                tracing::warn!(%action, ?limit, "tool command timed out");
                return Err(ToolError::Timeout {
                    action,
                    limit: limit.unwrap_or_default(),
                });
            }
            Err(e) => {
                tracing::warn!(%action, error = %e, "failed to spawn tool");
                return Err(ToolError::Spawn {
                    action,
                    binary: self.runner.binary().to_path_buf(),
                    source: e,
                });
            }
        };

        if !output.success {
            let err = ToolError::exit(action, output.code, output.combined());
            tracing::warn!(%action, code = ?output.code, cause = ?err.cause(), "tool command failed");
            return Err(err);
        }

        Ok(output)
    }

    async fn on_instance(&self, action: Action, verb: &str, name: &str) -> Result<()> {
        self.exec(action, vec![verb.to_string(), name.to_string()], None)
            .await
            .map(|_| ())
    }

    /// Launch a new instance.
    ///
    /// When the request carries a timeout it is passed to the tool, and the
    /// local wait is bounded by that timeout plus the launch grace.
    pub async fn launch(&self, request: &LaunchRequest) -> Result<()> {
        let limit = request.timeout.map(|t| t + self.launch_grace);
        tracing::debug!(name = %request.name, ?limit, "launching instance");
        self.exec(Action::Launch, request.args(), limit).await?;
        Ok(())
    }

    /// Get the current record of a single instance.
    ///
    /// # Errors
    /// * `NotFound` if the tool does not know the name
    /// * `Partial` if the payload flags per-entity errors
    /// * `Decode` if the payload is malformed
    pub async fn info(&self, name: &str) -> Result<VmRecord> {
        let args = vec![
            "info".to_string(),
            name.to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        let output = self.exec(Action::Info, args, None).await?;

        let outcome = decode_info(&output.stdout, name).map_err(|source| ToolError::Decode {
            action: Action::Info,
            source,
        })?;

        match outcome {
            InfoOutcome::Found(record) => Ok(record),
            InfoOutcome::NotFound => Err(ToolError::NotFound {
                name: name.to_string(),
            }),
            InfoOutcome::PartialFailure(errors)
                if errors
                    .iter()
                    .all(|e| FailureCause::classify(e) == FailureCause::NotFound) =>
            {
                Err(ToolError::NotFound {
                    name: name.to_string(),
                })
            }
            InfoOutcome::PartialFailure(errors) => Err(ToolError::Partial { errors }),
        }
    }

    /// List every instance the tool knows about.
    pub async fn list(&self) -> Result<Vec<VmRecord>> {
        let args = vec![
            "list".to_string(),
            "--format".to_string(),
            "json".to_string(),
        ];
        let output = self.exec(Action::List, args, None).await?;

        decode_list(&output.stdout).map_err(|source| ToolError::Decode {
            action: Action::List,
            source,
        })
    }

    /// Soft-delete an instance. It stays recoverable until [`purge`](Self::purge).
    pub async fn delete(&self, name: &str) -> Result<()> {
        self.on_instance(Action::Delete, "delete", name).await
    }

    /// Permanently remove every soft-deleted instance.
    pub async fn purge(&self) -> Result<()> {
        self.exec(Action::Purge, vec!["purge".to_string()], None)
            .await
            .map(|_| ())
    }

    /// Start a stopped or suspended instance.
    pub async fn start(&self, name: &str) -> Result<()> {
        self.on_instance(Action::Start, "start", name).await
    }

    /// Stop a running instance.
    pub async fn stop(&self, name: &str) -> Result<()> {
        self.on_instance(Action::Stop, "stop", name).await
    }

    /// Restart an instance.
    pub async fn restart(&self, name: &str) -> Result<()> {
        self.on_instance(Action::Restart, "restart", name).await
    }

    /// Suspend a running instance.
    pub async fn suspend(&self, name: &str) -> Result<()> {
        self.on_instance(Action::Suspend, "suspend", name).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replays canned outputs and records every argument vector.
    struct Scripted {
        replies: Mutex<Vec<io::Result<CommandOutput>>>,
        calls: Mutex<Vec<(Vec<String>, Option<Duration>)>>,
    }

    impl Scripted {
        fn new(replies: Vec<io::Result<CommandOutput>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl CommandRunner for Scripted {
        fn binary(&self) -> &Path {
            Path::new("scripted")
        }

        async fn run(&self, args: &[String], limit: Option<Duration>) -> io::Result<CommandOutput> {
            self.calls.lock().unwrap().push((args.to_vec(), limit));
            self.replies.lock().unwrap().remove(0)
        }
    }

    #[test]
    fn test_default_binary() {
        assert_eq!(MultipassClient::new("").binary(), Path::new("multipass"));
        assert_eq!(
            MultipassClient::new("/usr/local/bin/multipass").binary(),
            Path::new("/usr/local/bin/multipass")
        );
    }

    #[tokio::test]
    async fn test_launch_passes_timeout_and_grace() {
        let runner = Scripted::new(vec![Ok(CommandOutput::ok(""))]);
        let client = MultipassClient::with_runner(runner.clone())
            .launch_grace(Duration::from_secs(10));

        let request = LaunchRequest::new("a").timeout(Duration::from_secs(300));
        client.launch(&request).await.unwrap();

        let calls = runner.calls.lock().unwrap();
        let (args, limit) = &calls[0];
        assert!(args.ends_with(&["--timeout".to_string(), "300".to_string()]));
        assert_eq!(*limit, Some(Duration::from_secs(310)));
    }

    #[tokio::test]
    async fn test_launch_failure_keeps_output() {
        let runner = Scripted::new(vec![Ok(CommandOutput::failed(
            2,
            "launch failed: instance \"a\" already exists",
        ))]);
        let client = MultipassClient::with_runner(runner);

        let err = client.launch(&LaunchRequest::new("a")).await.unwrap_err();
        assert_eq!(err.cause(), FailureCause::AlreadyExists);
        assert!(err.to_string().contains("failed to launch instance"));
        assert!(err.to_string().contains("already exists"));
    }

    #[tokio::test]
    async fn test_info_partial_failure() {
        let runner = Scripted::new(vec![Ok(CommandOutput::ok(
            r#"{"errors": ["boom"], "info": {}}"#,
        ))]);
        let client = MultipassClient::with_runner(runner);

        let err = client.info("a").await.unwrap_err();
        assert!(matches!(err, ToolError::Partial { ref errors } if errors == &["boom"]));
        assert!(err.to_string().contains("boom"));
    }

    #[tokio::test]
    async fn test_info_error_naming_missing_instance_is_not_found() {
        let runner = Scripted::new(vec![Ok(CommandOutput::ok(
            r#"{"errors": ["instance \"a\" does not exist"], "info": {}}"#,
        ))]);
        let client = MultipassClient::with_runner(runner);

        let err = client.info("a").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_info_absent_name() {
        let runner = Scripted::new(vec![Ok(CommandOutput::ok(r#"{"errors": [], "info": {}}"#))]);
        let client = MultipassClient::with_runner(runner);

        let err = client.info("ghost").await.unwrap_err();
        assert!(matches!(err, ToolError::NotFound { ref name } if name == "ghost"));
    }

    #[tokio::test]
    async fn test_info_malformed() {
        let runner = Scripted::new(vec![Ok(CommandOutput::ok("<html>"))]);
        let client = MultipassClient::with_runner(runner);

        let err = client.info("a").await.unwrap_err();
        assert!(matches!(err, ToolError::Decode { action: Action::Info, .. }));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let runner = Scripted::new(vec![Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "permission denied",
        ))]);
        let client = MultipassClient::with_runner(runner);

        let err = client.start("a").await.unwrap_err();
        assert!(matches!(err, ToolError::Spawn { action: Action::Start, .. }));
        assert!(err.to_string().contains("failed to start instance"));
    }

    #[tokio::test]
    async fn test_local_timeout() {
        let runner = Scripted::new(vec![Err(io::Error::new(io::ErrorKind::TimedOut, "late"))]);
        let client = MultipassClient::with_runner(runner);

        let request = LaunchRequest::new("a").timeout(Duration::from_secs(1));
        let err = client.launch(&request).await.unwrap_err();
        assert!(matches!(err, ToolError::Timeout { action: Action::Launch, .. }));
    }

    #[tokio::test]
    async fn test_verbs_render_args() {
        let runner = Scripted::new(vec![
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("")),
            Ok(CommandOutput::ok("")),
        ]);
        let client = MultipassClient::with_runner(runner.clone());

        client.delete("a").await.unwrap();
        client.purge().await.unwrap();
        client.start("a").await.unwrap();
        client.stop("a").await.unwrap();
        client.restart("a").await.unwrap();
        client.suspend("a").await.unwrap();

        let verbs: Vec<Vec<String>> = runner
            .calls
            .lock()
            .unwrap()
            .iter()
            .map(|(args, _)| args.clone())
            .collect();
        assert_eq!(
            verbs,
            vec![
                vec!["delete", "a"],
                vec!["purge"],
                vec!["start", "a"],
                vec!["stop", "a"],
                vec!["restart", "a"],
                vec!["suspend", "a"],
            ]
        );
    }
}
