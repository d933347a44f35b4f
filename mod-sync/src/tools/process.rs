//! Child process runner with timeout and cooperative cancellation

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::process::Command;

use crate::core::performance;
use crate::core::task_control::TaskControl;
use crate::error::ApiError;

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

/// Longest stderr excerpt carried in an error
const STDERR_EXCERPT_CHARS: usize = 600;

#[derive(Debug, Error)]
pub enum ToolRunError {
    #[error("executable not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("exited with status {code:?}: {stderr}")]
    Failed { code: Option<i32>, stderr: String },

    #[error("timed out after {0:?}")]
    TimedOut(Duration),

    #[error("cancelled")]
    Cancelled,
}

impl From<ToolRunError> for ApiError {
    fn from(err: ToolRunError) -> Self {
        match err {
            ToolRunError::NotFound(_) => ApiError::tool_unavailable(err.to_string()),
            ToolRunError::Spawn { .. } => ApiError::tool_unavailable(err.to_string()),
            ToolRunError::Failed { .. } => ApiError::tool_failure(err.to_string()),
            ToolRunError::TimedOut(_) => ApiError::timeout(err.to_string()),
            ToolRunError::Cancelled => ApiError::cancelled("External tool run cancelled"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub stdout: String,
    pub stderr: String,
}

fn excerpt(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() <= STDERR_EXCERPT_CHARS {
        return trimmed.to_string();
    }
    let cut: String = trimmed.chars().take(STDERR_EXCERPT_CHARS).collect();
    format!("{}...", cut)
}

/// Run `program` to completion.
///
/// The child is killed when the timeout elapses or `task` is cancelled; in both cases
/// no output is returned.
pub async fn run_tool(
    program: &Path,
    args: &[OsString],
    timeout: Duration,
    task: &TaskControl,
) -> Result<ToolOutput, ToolRunError> {
    if task.is_cancelled() {
        return Err(ToolRunError::Cancelled);
    }

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(windows)]
    command.creation_flags(CREATE_NO_WINDOW);

    let child = command.spawn().map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ToolRunError::NotFound(program.to_path_buf())
        } else {
            ToolRunError::Spawn {
                program: program.to_path_buf(),
                source: e,
            }
        }
    })?;
    performance::record_tool_invocation();

    // Dropping the wait future drops the child, which kills it
    tokio::select! {
        result = child.wait_with_output() => {
            let output = result.map_err(|e| ToolRunError::Spawn {
                program: program.to_path_buf(),
                source: e,
            })?;
            let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
            let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
            if output.status.success() {
                Ok(ToolOutput { stdout, stderr })
            } else {
                Err(ToolRunError::Failed {
                    code: output.status.code(),
                    stderr: excerpt(if stderr.trim().is_empty() { &stdout } else { &stderr }),
                })
            }
        }
        _ = tokio::time::sleep(timeout) => Err(ToolRunError::TimedOut(timeout)),
        _ = task.cancelled() => Err(ToolRunError::Cancelled),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiErrorCode;

    #[tokio::test]
    async fn test_missing_executable_is_unavailable() {
        let err = run_tool(
            Path::new("/definitely/not/here/rpfm_cli"),
            &[],
            Duration::from_secs(5),
            &TaskControl::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolRunError::NotFound(_)));
        assert_eq!(
            ApiError::from(err).code,
            ApiErrorCode::ExternalToolUnavailable
        );
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let task = TaskControl::new();
        task.cancel();
        let err = run_tool(Path::new("anything"), &[], Duration::from_secs(5), &task)
            .await
            .unwrap_err();
        assert!(ApiError::from(err).is_cancelled());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_child() {
        let err = run_tool(
            Path::new("sleep"),
            &[OsString::from("5")],
            Duration::from_millis(100),
            &TaskControl::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolRunError::TimedOut(_)));
        let api: ApiError = err.into();
        assert_eq!(api.code, ApiErrorCode::Timeout);
        assert!(api.is_retryable());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_cancellation_kills_child() {
        let task = TaskControl::new();
        let canceller = task.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let err = run_tool(
            Path::new("sleep"),
            &[OsString::from("5")],
            Duration::from_secs(30),
            &task,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ToolRunError::Cancelled));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_non_zero_exit_is_failure() {
        let err = run_tool(
            Path::new("sh"),
            &[OsString::from("-c"), OsString::from("echo broken >&2; exit 3")],
            Duration::from_secs(5),
            &TaskControl::new(),
        )
        .await
        .unwrap_err();
        match err {
            ToolRunError::Failed { code, stderr } => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_excerpt_truncates() {
        let long = "x".repeat(STDERR_EXCERPT_CHARS + 10);
        assert!(excerpt(&long).ends_with("..."));
        assert_eq!(excerpt("  short \n"), "short");
    }
}
