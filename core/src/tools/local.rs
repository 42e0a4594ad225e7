use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use codicil_protocol::models::FunctionCallOutputPayload;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::function_tool::FunctionCallError;
use crate::shell::ShellInfo;
use crate::tools::ToolCall;
use crate::tools::ToolExecutor;
use crate::tools::ToolResult;
use crate::tools::context::ToolInvocation;
use crate::tools::context::ToolOutput;
use crate::tools::context::ToolPayload;
use crate::tools::handlers::ApplyPatchHandler;
use crate::tools::handlers::ShellCommandHandler;
use crate::tools::handlers::ShellHandler;
use crate::tools::handlers::ViewImageHandler;
use crate::tools::registry::ToolRegistry;

/// Executes the built-in tools on the local machine, relative to a base
/// directory.
#[derive(Debug)]
pub struct LocalToolExecutor {
    base_dir: PathBuf,
    shell: ShellInfo,
    registry: ToolRegistry,
}

impl LocalToolExecutor {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        let mut registry = ToolRegistry::default();
        registry.register("shell", Arc::new(ShellHandler));
        registry.register("shell_command", Arc::new(ShellCommandHandler));
        registry.register("apply_patch", Arc::new(ApplyPatchHandler));
        registry.register("view_image", Arc::new(ViewImageHandler));
        Self {
            base_dir: base_dir.into(),
            shell: ShellInfo::default_for_platform(),
            registry,
        }
    }

    /// Shell used to run `shell_command` scripts.
    pub fn with_shell(mut self, shell: ShellInfo) -> Self {
        self.shell = shell;
        self
    }

    pub fn base_dir(&self) -> &PathBuf {
        &self.base_dir
    }

    async fn dispatch(
        &self,
        call_id: &str,
        name: &str,
        payload: ToolPayload,
        cancel: CancellationToken,
    ) -> Result<ToolOutput, FunctionCallError> {
        let is_custom = matches!(payload, ToolPayload::Custom { .. });
        let handler = self
            .registry
            .handler(name)
            .filter(|handler| handler.matches_kind(&payload));
        let Some(handler) = handler else {
            return Err(if is_custom {
                FunctionCallError::RespondToModel(format!("Custom tool '{name}' not implemented"))
            } else {
                FunctionCallError::UnknownTool(name.to_string())
            });
        };

        let invocation = ToolInvocation {
            call_id: call_id.to_string(),
            tool_name: name.to_string(),
            payload,
            cwd: &self.base_dir,
            shell: &self.shell,
            cancel,
        };
        handler.handle(invocation).await
    }
}

#[async_trait]
impl ToolExecutor for LocalToolExecutor {
    async fn execute(&self, call: ToolCall, cancel: CancellationToken) -> ToolResult {
        debug!(call_id = %call.call_id(), tool = %call.name(), "executing local tool");
        match call {
            ToolCall::Function {
                call_id,
                name,
                arguments,
            } => {
                let outcome = self
                    .dispatch(&call_id, &name, ToolPayload::Function { arguments }, cancel)
                    .await;
                let output = match outcome {
                    Ok(ToolOutput { content, success }) => {
                        FunctionCallOutputPayload::from_text(content, success)
                    }
                    Err(err) => FunctionCallOutputPayload::from_text(err.to_string(), false),
                };
                ToolResult::Function { call_id, output }
            }
            ToolCall::Custom {
                call_id,
                name,
                input,
            } => {
                let outcome = self
                    .dispatch(&call_id, &name, ToolPayload::Custom { input }, cancel)
                    .await;
                let output = match outcome {
                    Ok(ToolOutput { content, .. }) => content,
                    Err(err) => err.to_string(),
                };
                ToolResult::Custom { call_id, output }
            }
        }
    }
}
