//! Create project tool — sets up a project directory in the workspace.
//!
//! Usually listed as a priority tool: it runs before any other call of the
//! same turn, so files written into the new project land in an existing
//! directory.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{Tool, ToolCall};
use serde::Deserialize;
use tracing::debug;

use crate::workspace::Workspace;

const NAME: &str = "create_project";

pub struct CreateProjectTool {
    workspace: Workspace,
}

impl CreateProjectTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct Args {
    name: String,
}

#[async_trait]
impl Tool for CreateProjectTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Create a new project directory in the workspace. Call this before writing files into the project."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "name": {
                    "type": "string",
                    "description": "Project directory name (a single path segment)"
                }
            },
            "required": ["name"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let args: Args = call.decode_arguments()?;
        let name = args.name.trim();
        if name.is_empty() || name.contains(['/', '\\']) || name == "." || name == ".." {
            return Err(ToolError::InvalidArguments {
                tool_name: NAME.into(),
                reason: format!("'{name}' is not a valid project name"),
            });
        }

        let dir = self
            .workspace
            .resolve(name)
            .map_err(|e| e.into_tool_error(NAME))?;

        if dir.is_dir() {
            return Ok(format!("Project {name} already exists"));
        }

        debug!(project = name, "Creating project directory");
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: e.to_string(),
            })?;
        Ok(format!("Created project {name}"))
    }
}
