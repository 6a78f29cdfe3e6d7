//! Read file tool — read a UTF-8 file from the workspace.

use async_trait::async_trait;
use forgeloop_core::error::ToolError;
use forgeloop_core::tool::{Tool, ToolCall};
use serde::Deserialize;

use crate::workspace::Workspace;

const NAME: &str = "read_file";
const DEFAULT_MAX_BYTES: usize = 100_000;

pub struct ReadFileTool {
    workspace: Workspace,
}

impl ReadFileTool {
    pub fn new(workspace: Workspace) -> Self {
        Self { workspace }
    }
}

#[derive(Deserialize)]
struct Args {
    path: String,
    #[serde(default)]
    max_bytes: Option<usize>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Read the contents of a file in the workspace."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path relative to the workspace root"
                },
                "max_bytes": {
                    "type": "integer",
                    "description": "Maximum number of bytes to return (default 100000)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, call: &ToolCall) -> Result<String, ToolError> {
        let args: Args = call.decode_arguments()?;
        let path = self
            .workspace
            .resolve(&args.path)
            .map_err(|e| e.into_tool_error(NAME))?;

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: NAME.into(),
                reason: format!("{}: {e}", args.path),
            })?;

        Ok(truncate(content, args.max_bytes.unwrap_or(DEFAULT_MAX_BYTES)))
    }
}

/// Cut `content` to at most `max_bytes`, on a char boundary, with a marker.
fn truncate(mut content: String, max_bytes: usize) -> String {
    if content.len() <= max_bytes {
        return content;
    }
    let total = content.len();
    let mut cut = max_bytes;
    while !content.is_char_boundary(cut) {
        cut -= 1;
    }
    content.truncate(cut);
    content.push_str(&format!("\n[truncated: showing {cut} of {total} bytes]"));
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall::new("r1", NAME, args.to_string())
    }

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.md"), "# Notes\nline two").unwrap();
        let tool = ReadFileTool::new(Workspace::new(dir.path()));
        let output = tool
            .execute(&call(serde_json::json!({"path": "notes.md"})))
            .await
            .unwrap();
        assert_eq!(output, "# Notes\nline two");
    }

    #[tokio::test]
    async fn read_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReadFileTool::new(Workspace::new(dir.path()));
        let err = tool
            .execute(&call(serde_json::json!({"path": "nope.txt"})))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::ExecutionFailed { .. }));
        assert!(err.to_string().contains("nope.txt"));
    }

    #[tokio::test]
    async fn max_bytes_truncates() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("big.txt"), "abcdefghij").unwrap();
        let tool = ReadFileTool::new(Workspace::new(dir.path()));
        let output = tool
            .execute(&call(serde_json::json!({"path": "big.txt", "max_bytes": 4})))
            .await
            .unwrap();
        assert!(output.starts_with("abcd\n"));
        assert!(output.contains("showing 4 of 10 bytes"));
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let out = truncate("héllo".to_string(), 2);
        assert!(out.starts_with("h\n"));
    }
}
