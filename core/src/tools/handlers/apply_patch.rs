use std::path::Path;

use async_trait::async_trait;
use codicil_apply_patch::apply_patch;
use serde::Deserialize;
use tracing::info;

use crate::function_tool::FunctionCallError;
use crate::tools::context::ToolInvocation;
use crate::tools::context::ToolOutput;
use crate::tools::context::ToolPayload;
use crate::tools::registry::ToolHandler;
use crate::tools::registry::ToolKind;

#[derive(Debug, Deserialize)]
struct ApplyPatchToolArgs {
    #[serde(default)]
    input: String,
}

/// Applies patches sent either as a freeform custom call or as the JSON
/// `{input}` function call.
pub struct ApplyPatchHandler;

fn run_patch(patch: &str, base_dir: &Path) -> ToolOutput {
    match apply_patch(patch, base_dir) {
        Ok(summary) => {
            info!("{summary}");
            ToolOutput::new(summary.to_string(), true)
        }
        Err(err) => ToolOutput::new(err.to_string(), false),
    }
}

#[async_trait]
impl ToolHandler for ApplyPatchHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Any
    }

    async fn handle(
        &self,
        invocation: ToolInvocation<'_>,
    ) -> Result<ToolOutput, FunctionCallError> {
        match &invocation.payload {
            ToolPayload::Custom { input } => Ok(run_patch(input, invocation.cwd)),
            ToolPayload::Function { arguments } => {
                let args: ApplyPatchToolArgs = serde_json::from_str(arguments).map_err(|e| {
                    FunctionCallError::RespondToModel(format!(
                        "apply_patch invalid arguments: {e}"
                    ))
                })?;
                if args.input.trim().is_empty() {
                    return Err(FunctionCallError::RespondToModel(
                        "apply_patch missing input".to_string(),
                    ));
                }
                Ok(run_patch(&args.input, invocation.cwd))
            }
        }
    }
}
