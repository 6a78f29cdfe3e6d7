//! List files tool — show the entries of a workspace directory.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{Tool, ToolCall};
use serde::Deserialize;

use crate::workspace::Workspace;

const NAME: &str = "list_files";

pub struct ListFilesTool {
    workspace: Workspace,
}

impl ListFilesTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize, Default)]
struct Args {
    #[serde(default)]
    path: Option<String>,
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "List the files and directories at a workspace path. Directories end with '/'."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory relative to the workspace root (default: the root)"
                }
            }
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let args: Args = call.decode_arguments()?;
        let requested = args.path.as_deref().unwrap_or(".");
        let dir = self
            .workspace
            .resolve(requested)
            .map_err(|e| e.into_tool_error(NAME))?;

        let failed = |e: std::io::Error| ToolError::ExecutionFailed {
            tool_name: NAME.into(),
            reason: format!("{requested}: {e}"),
        };

        let mut reader = tokio::fs::read_dir(&dir).await.map_err(failed)?;
        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(failed)? {
            let mut name = entry.file_name().to_string_lossy().into_owned();
            if entry.file_type().await.map_err(failed)?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }

        if entries.is_empty() {
            return Ok("(empty directory)".into());
        }
        entries.sort();
        Ok(entries.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_sorted_with_dir_suffix() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        std::fs::create_dir(dir.path().join("a_dir")).unwrap();
        std::fs::write(dir.path().join("c.rs"), "").unwrap();

        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let output = tool.execute(&ToolCall::new("l", NAME, "")).await.unwrap();
        assert_eq!(output, "a_dir/\nb.txt\nc.rs");
    }

    #[tokio::test]
    async fn empty_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("empty")).unwrap();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        let output = tool
            .execute(&ToolCall::new("l", NAME, r#"{"path":"empty"}"#))
            .await
            .unwrap();
        assert_eq!(output, "(empty directory)");
    }

    #[tokio::test]
    async fn missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ListFilesTool::new(Workspace::new(dir.path()));
        assert!(
            tool.execute(&ToolCall::new("l", NAME, r#"{"path":"ghost"}"#))
                .await
                .is_err()
        );
    }
}
