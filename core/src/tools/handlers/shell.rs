use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::exec::ExecParams;
use crate::exec::format_exec_output_for_model;
use crate::exec::process_exec_tool_call;
use crate::function_tool::FunctionCallError;
use crate::tools::context::ToolInvocation;
use crate::tools::context::ToolOutput;
use crate::tools::context::ToolPayload;
use crate::tools::registry::ToolHandler;
use crate::tools::registry::ToolKind;

const PROCESS_FAILED_TO_START: &str = "Process failed to start";

/// Arguments of the `shell` tool. Sandbox fields are accepted and ignored.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ShellToolCallParams {
    #[serde(default)]
    pub command: Vec<String>,
    pub workdir: Option<String>,
    pub timeout_ms: Option<u64>,
    pub sandbox_permissions: Option<String>,
    pub justification: Option<String>,
}

/// Arguments of the `shell_command` tool.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
pub struct ShellCommandToolCallParams {
    #[serde(default)]
    pub command: String,
    pub workdir: Option<String>,
    pub login: Option<bool>,
    pub timeout_ms: Option<u64>,
    pub sandbox_permissions: Option<String>,
    pub justification: Option<String>,
}

fn function_arguments(invocation: &ToolInvocation<'_>) -> Result<String, FunctionCallError> {
    match &invocation.payload {
        ToolPayload::Function { arguments } => Ok(arguments.clone()),
        ToolPayload::Custom { .. } => Err(FunctionCallError::RespondToModel(format!(
            "unsupported payload for shell handler: {}",
            invocation.tool_name
        ))),
    }
}

fn parse_arguments<'de, T: Deserialize<'de>>(arguments: &'de str) -> Result<T, FunctionCallError> {
    serde_json::from_str(arguments).map_err(|e| {
        FunctionCallError::RespondToModel(format!("failed to parse function arguments: {e}"))
    })
}

async fn run_exec(
    params: ExecParams,
    invocation: &ToolInvocation<'_>,
) -> Result<ToolOutput, FunctionCallError> {
    match process_exec_tool_call(params, invocation.cancel.clone()).await {
        Ok(output) => Ok(ToolOutput::new(
            format_exec_output_for_model(&output),
            output.success(),
        )),
        Err(err) => {
            warn!(call_id = %invocation.call_id, "failed to start tool process: {err}");
            Ok(ToolOutput::new(PROCESS_FAILED_TO_START, false))
        }
    }
}

pub struct ShellHandler;

#[async_trait]
impl ToolHandler for ShellHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(
        &self,
        invocation: ToolInvocation<'_>,
    ) -> Result<ToolOutput, FunctionCallError> {
        let arguments = function_arguments(&invocation)?;
        let params: ShellToolCallParams = parse_arguments(&arguments)?;
        if params.command.is_empty() {
            return Ok(ToolOutput::new("shell: missing command", false));
        }

        let exec_params = ExecParams {
            command: params.command,
            cwd: invocation.resolve_path(params.workdir),
            timeout_ms: params.timeout_ms,
        };
        run_exec(exec_params, &invocation).await
    }
}

pub struct ShellCommandHandler;

#[async_trait]
impl ToolHandler for ShellCommandHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(
        &self,
        invocation: ToolInvocation<'_>,
    ) -> Result<ToolOutput, FunctionCallError> {
        let arguments = function_arguments(&invocation)?;
        let params: ShellCommandToolCallParams = parse_arguments(&arguments)?;
        if params.command.trim().is_empty() {
            return Ok(ToolOutput::new("shell_command: missing command", false));
        }

        let use_login_shell = params.login.unwrap_or(true);
        let exec_params = ExecParams {
            command: invocation
                .shell
                .derive_exec_args(&params.command, use_login_shell),
            cwd: invocation.resolve_path(params.workdir),
            timeout_ms: params.timeout_ms,
        };
        run_exec(exec_params, &invocation).await
    }
}
