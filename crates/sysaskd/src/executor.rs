//! Shell command executor with a primary and a degraded invocation path.
//!
//! Primary path: pipe the command through a jq directive so line output
//! becomes a JSON array, and feed the script to `bash -s` over stdin so
//! nested quoting in generated commands never reaches an outer shell. The
//! pipeline runs under `pipefail` so a failing left-hand command keeps its
//! exit status instead of jq's. The degraded path runs once, only when the
//! primary invocation itself fails (spawn error or timeout), with quotes
//! softened and no directive.

use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::ExecutorConfig;
use sysask_shared::AgentError;

/// Converts plain line output into a JSON array of lines.
const JSON_DIRECTIVE: &str = r#"jq -R -s 'split("\n") | map(select(length > 0))'"#;

/// Stderr is only ever quoted in error text, so a small cap suffices.
const STDERR_CAP: u64 = 64 * 1024;

/// Runs externally supplied shell commands, swappable for tests
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, command: &str) -> Result<String, AgentError>;
}

/// Production runner
pub struct ShellRunner {
    timeout: Duration,
    max_output_bytes: usize,
    /// Checked once at construction; without jq the directive is skipped.
    jq_available: bool,
    primary_shell: String,
}

enum PrimaryFailure {
    /// bash could not be spawned or the deadline passed
    Invocation(String),
    /// The command itself exited nonzero
    Command(String),
}

/// What came back from one child process, stdout bounded at the cap.
struct Collected {
    status: std::process::ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    truncated: bool,
}

impl ShellRunner {
    pub fn new(config: &ExecutorConfig) -> Self {
        let jq_available = std::process::Command::new("which")
            .arg("jq")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false);
        if !jq_available {
            warn!("jq not found, structured-output directive disabled");
        }

        Self {
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
            jq_available,
            primary_shell: "bash".to_string(),
        }
    }

    async fn run_primary(&self, command: &str) -> Result<String, PrimaryFailure> {
        // pipefail keeps the command's own exit status when the directive
        // at the end of the pipeline succeeds.
        let script = if self.jq_available {
            format!("set -o pipefail; {} | {}", command.trim(), JSON_DIRECTIVE)
        } else {
            command.trim().to_string()
        };

        debug!("primary execution: {:?}", script);

        let mut child = Command::new(&self.primary_shell)
            .arg("-s")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PrimaryFailure::Invocation(format!("failed to spawn bash: {}", e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(script.as_bytes())
                .await
                .map_err(|e| PrimaryFailure::Invocation(format!("failed to send script: {}", e)))?;
        }

        let collected = match timeout(self.timeout, self.wait_bounded(child)).await {
            Ok(result) => result
                .map_err(|e| PrimaryFailure::Invocation(format!("failed to collect output: {}", e)))?,
            Err(_) => {
                return Err(PrimaryFailure::Invocation(format!(
                    "command timed out after {}s",
                    self.timeout.as_secs()
                )))
            }
        };

        if !collected.truncated && !collected.status.success() {
            let stderr = String::from_utf8_lossy(&collected.stderr).trim().to_string();
            return Err(PrimaryFailure::Command(if stderr.is_empty() {
                format!("command exited with {}", collected.status)
            } else {
                stderr
            }));
        }

        if collected.truncated {
            // A cut JSON stream would not parse anyway.
            return Ok(self.capture(collected.stdout));
        }
        Ok(prettify(&self.capture(collected.stdout)))
    }

    async fn run_degraded(&self, command: &str) -> Result<String, String> {
        let softened = soften_quotes(command);
        debug!("degraded execution: {:?}", softened);

        let child = Command::new("sh")
            .arg("-c")
            .arg(&softened)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| format!("failed to run command: {}", e))?;

        let collected = match timeout(self.timeout, self.wait_bounded(child)).await {
            Ok(Ok(collected)) => collected,
            Ok(Err(e)) => return Err(format!("failed to collect output: {}", e)),
            Err(_) => {
                return Err(format!(
                    "command timed out after {}s",
                    self.timeout.as_secs()
                ))
            }
        };

        if !collected.truncated && !collected.status.success() {
            let stderr = String::from_utf8_lossy(&collected.stderr).trim().to_string();
            return Err(if stderr.is_empty() {
                format!("command exited with {}", collected.status)
            } else {
                stderr
            });
        }

        Ok(self.capture(collected.stdout))
    }

    /// Stream the child's stdout up to the cap, then reap it. A producer
    /// still writing past the cap is killed instead of buffered, so a
    /// runaway command cannot grow the process unbounded within the timeout.
    async fn wait_bounded(&self, mut child: Child) -> std::io::Result<Collected> {
        let cap = self.max_output_bytes;
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        // Drain stderr in a task so it keeps flowing while stdout is read,
        // and so it reaches EOF once a capped child is killed below.
        let stderr_task = tokio::spawn(async move {
            let mut buf = Vec::new();
            if let Some(err) = stderr {
                let mut limited = err.take(STDERR_CAP);
                let _ = limited.read_to_end(&mut buf).await;
            }
            buf
        });

        let mut stdout_bytes = Vec::new();
        if let Some(out) = stdout {
            // One byte past the cap tells us truncation happened.
            let mut limited = out.take(cap as u64 + 1);
            limited.read_to_end(&mut stdout_bytes).await?;
        }

        let truncated = stdout_bytes.len() > cap;
        if truncated {
            let _ = child.kill().await;
        }
        let status = child.wait().await?;
        let stderr_bytes = stderr_task.await.unwrap_or_default();

        Ok(Collected {
            status,
            stdout: stdout_bytes,
            stderr: stderr_bytes,
            truncated,
        })
    }

    /// Bound captured output and note when it was cut.
    fn capture(&self, mut bytes: Vec<u8>) -> String {
        let truncated = bytes.len() > self.max_output_bytes;
        if truncated {
            bytes.truncate(self.max_output_bytes);
        }
        let mut text = String::from_utf8_lossy(&bytes).into_owned();
        if truncated {
            text.push_str("\n... (output truncated)");
        }
        text
    }
}

#[async_trait]
impl CommandRunner for ShellRunner {
    async fn run(&self, command: &str) -> Result<String, AgentError> {
        match self.run_primary(command).await {
            Ok(output) => Ok(output),
            Err(PrimaryFailure::Command(error)) => Err(AgentError::Execution(error)),
            Err(PrimaryFailure::Invocation(error)) => {
                warn!("primary invocation failed ({}), trying degraded path", error);
                self.run_degraded(command)
                    .await
                    .map_err(|degraded| {
                        AgentError::Execution(format!("{}; degraded path: {}", error, degraded))
                    })
            }
        }
    }
}

/// Swap double quotes for single quotes, the simplest transport-safe form
/// for the degraded `sh -c` invocation.
fn soften_quotes(command: &str) -> String {
    command.replace('"', "'")
}

/// Re-serialize structured output pretty-printed; pass raw text through.
fn prettify(raw: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(raw.trim()) {
        Ok(value) => serde_json::to_string_pretty(&value).unwrap_or_else(|_| raw.to_string()),
        Err(_) => raw.to_string(),
    }
}
