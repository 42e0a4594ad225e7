use async_trait::async_trait;

use crate::function_tool::FunctionCallError;
use crate::tools::context::ToolInvocation;
use crate::tools::context::ToolOutput;
use crate::tools::registry::ToolHandler;
use crate::tools::registry::ToolKind;

/// Attaching images needs a host that can feed them back into the turn, so
/// the local executor only declines.
pub struct ViewImageHandler;

#[async_trait]
impl ToolHandler for ViewImageHandler {
    fn kind(&self) -> ToolKind {
        ToolKind::Function
    }

    async fn handle(
        &self,
        _invocation: ToolInvocation<'_>,
    ) -> Result<ToolOutput, FunctionCallError> {
        Err(FunctionCallError::RespondToModel(
            "view_image is not implemented by the local executor".to_string(),
        ))
    }
}
