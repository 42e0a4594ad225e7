use std::path::Path;
use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::shell::ShellInfo;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolPayload {
    Function { arguments: String },
    Custom { input: String },
}

/// Everything a handler needs to run one call.
#[derive(Debug, Clone)]
pub struct ToolInvocation<'a> {
    pub call_id: String,
    pub tool_name: String,
    pub payload: ToolPayload,
    pub cwd: &'a Path,
    pub shell: &'a ShellInfo,
    pub cancel: CancellationToken,
}

impl ToolInvocation<'_> {
    /// Relative paths are taken from the executor's base directory.
    pub fn resolve_path(&self, path: Option<String>) -> PathBuf {
        path.as_ref()
            .map(PathBuf::from)
            .map_or_else(|| self.cwd.to_path_buf(), |p| self.cwd.join(p))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutput {
    pub content: String,
    pub success: bool,
}

impl ToolOutput {
    pub fn new(content: impl Into<String>, success: bool) -> Self {
        Self {
            content: content.into(),
            success,
        }
    }
}
