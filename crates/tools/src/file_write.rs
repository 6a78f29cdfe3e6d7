//! Create file tool — write a file inside the workspace.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{Tool, ToolCall};
use serde::Deserialize;
use tracing::debug;

use crate::workspace::Workspace;

const NAME: &str = "create_file";

pub struct CreateFileTool {
    workspace: Workspace,
}

impl CreateFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct Args {
    path: String,
    content: String,
}

#[async_trait]
impl Tool for CreateFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace. Creates parent directories and overwrites existing files."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace root"
                },
                "content": {
                    "type": "string",
                    "description": "The full file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let args: Args = call.decode_arguments()?;
        let path = self
            .workspace
            .resolve(&args.path)
            .map_err(|e| e.into_tool_error(NAME))?;

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: e.to_string(),
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(failed)?;
        }
        tokio::fs::write(&path, &args.content).await.map_err(failed)?;

        let shown = self.workspace.display(&path);
        let chars = args.content.chars().count();
        debug!(path = %shown, chars, "Wrote file");
        Ok(format!("Created {shown} ({chars} chars)"))
    }
}
