pub mod context;
pub mod handlers;
pub mod local;
pub mod registry;
pub mod router;
pub mod spec;

use async_trait::async_trait;
use codicil_protocol::models::FunctionCallOutputPayload;
use codicil_protocol::models::ResponseInputItem;
use tokio_util::sync::CancellationToken;

pub use local::LocalToolExecutor;
pub use router::ToolRouter;

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolCall {
    /// JSON function call; `arguments` is the raw JSON string.
    Function {
        call_id: String,
        name: String,
        arguments: String,
    },
    /// Custom (freeform) tool call carrying raw text.
    Custom {
        call_id: String,
        name: String,
        input: String,
    },
}

impl ToolCall {
    pub fn call_id(&self) -> &str {
        match self {
            ToolCall::Function { call_id, .. } | ToolCall::Custom { call_id, .. } => call_id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ToolCall::Function { name, .. } | ToolCall::Custom { name, .. } => name,
        }
    }
}

/// Outcome of a [`ToolCall`], matched to it by `call_id`.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResult {
    Function {
        call_id: String,
        output: FunctionCallOutputPayload,
    },
    Custom {
        call_id: String,
        output: String,
    },
}

impl ToolResult {
    pub fn call_id(&self) -> &str {
        match self {
            ToolResult::Function { call_id, .. } | ToolResult::Custom { call_id, .. } => call_id,
        }
    }

    /// Custom tools carry no success flag and count as successful.
    pub fn is_success(&self) -> bool {
        match self {
            ToolResult::Function { output, .. } => output.success.unwrap_or(true),
            ToolResult::Custom { .. } => true,
        }
    }
}

impl From<ToolResult> for ResponseInputItem {
    fn from(result: ToolResult) -> Self {
        match result {
            ToolResult::Function { call_id, output } => {
                ResponseInputItem::FunctionCallOutput { call_id, output }
            }
            ToolResult::Custom { call_id, output } => {
                ResponseInputItem::CustomToolCallOutput { call_id, output }
            }
        }
    }
}

/// Runs tool calls on behalf of a session. Tool-level failures are reported
/// as non-success results, never as errors.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, call: ToolCall, cancel: CancellationToken) -> ToolResult;
}
