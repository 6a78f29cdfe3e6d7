//! Run command tool — execute a shell command inside the workspace.
//!
//! Commands run through `sh -c` (`cmd /C` on Windows) with the workspace
//! (or a directory inside it) as working directory, and are killed when
//! the timeout elapses.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{Tool, ToolCall};
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::workspace::Workspace;

const NAME: &str = "run_command";

pub struct RunCommandTool {
    workspace: Workspace,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(workspace: Workspace, timeout: Duration) -> Self {
        Self { workspace, timeout }
    }
}

#[derive(Deserialize)]
struct Args {
    command: String,
    #[serde(default)]
    cwd: Option<String>,
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Run a shell command in the workspace and return its exit code, stdout and stderr. Use it to build, test or inspect projects."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "cwd": {
                    "type": "string",
                    "description": "Working directory relative to the workspace root"
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let args: Args = call.decode_arguments()?;
        if args.command.trim().is_empty() {
            return Err(ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: "command is empty".into(),
            });
        }

        let cwd = self
            .workspace
            .resolve(args.cwd.as_deref().unwrap_or("."))
            .map_err(|e| e.into_tool_error(NAME))?;
        tokio::fs::create_dir_all(&cwd)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;

        debug!(command = %args.command, cwd = %cwd.display(), "Executing shell command");

        let mut command = if cfg!(target_os = "windows") {
            let mut c = Command::new("cmd");
            c.args(["/C", args.command.as_str()]);
            c
        } else {
            let mut c = Command::new("sh");
            c.args(["-c", args.command.as_str()]);
            c
        };
        command
            .current_dir(&cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed {
                    tool_name: NAME.into(),
                    reason: e.to_string(),
                });
            }
            Err(_) => {
                warn!(command = %args.command, "Command timed out");
                return Err(ToolError::Timeout {
                    tool_name: NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let code = output.status.code().unwrap_or(-1);
        if !output.status.success() {
            warn!(command = %args.command, exit_code = code, "Command failed");
        }

        let mut text = format!("[exit code: {code}]");
        if !stdout.trim().is_empty() {
            text.push('\n');
            text.push_str(stdout.trim_end());
        }
        if !stderr.trim().is_empty() {
            text.push_str("\n[stderr]: ");
            text.push_str(stderr.trim_end());
        }
        Ok(text)
    }
}
