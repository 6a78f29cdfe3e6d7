//! Workspace tools for forgeloop.
//!
//! Every tool here works inside one [`Workspace`] root: creating projects,
//! writing and reading files, listing directories and running commands.
//! Paths supplied by the model are resolved relative to that root and can
//! never leave it.

pub mod create_project;
pub mod file_read;
pub mod file_write;
pub mod list_files;
pub mod shell;
pub mod workspace;

use std::sync::Arc;
use std::time::Duration;

use forgeloop_core::tool::ToolRegistry;

pub use create_project::CreateProjectTool;
pub use file_read::ReadFileTool;
pub use file_write::CreateFileTool;
pub use list_files::ListFilesTool;
pub use shell::RunCommandTool;
pub use workspace::{PathError, Workspace};

/// Tools that never modify the workspace.
pub const READ_ONLY_TOOLS: &[&str] = &["read_file", "list_files"];

/// Create a registry with every workspace tool.
pub fn default_registry(workspace: Workspace, command_timeout: Duration) -> ToolRegistry {
    ToolRegistry::new()
        .with(Arc::new(CreateProjectTool::new(workspace.clone())))
        .with(Arc::new(CreateFileTool::new(workspace.clone())))
        .with(Arc::new(ReadFileTool::new(workspace.clone())))
        .with(Arc::new(ListFilesTool::new(workspace.clone())))
        .with(Arc::new(RunCommandTool::new(workspace, command_timeout)))
}
