use std::pin::Pin;
use std::task::Context;
use std::task::Poll;

use async_trait::async_trait;
use codicil_apply_patch::APPLY_PATCH_TOOL_INSTRUCTIONS;
use codicil_protocol::models::ResponseItem;
use codicil_protocol::protocol::RateLimitSnapshot;
use codicil_protocol::protocol::TokenUsage;
use futures::Stream;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::model_family::ModelFamily;
use crate::tools::spec::ToolSpec;

/// API request payload for a single model turn.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Prompt {
    /// System instructions for the model family in use.
    pub instructions: String,

    /// Conversation context input items.
    pub input: Vec<ResponseItem>,

    /// Tools available to the model. Empty for summarization requests.
    pub tools: Vec<ToolSpec>,

    /// Whether the model may request several tool calls in one response.
    pub parallel_tool_calls: bool,

    /// Optional JSON schema the final answer must satisfy.
    pub output_schema: Option<Value>,

    /// Stable key the provider can use to reuse cached prompt prefixes.
    pub prompt_cache_key: Option<String>,
}

/// The family's base instructions. The o3, o4-mini, codex-mini, gpt-4.1,
/// gpt-4o and gpt-3.5 families get the `apply_patch` usage notes appended
/// when no `apply_patch` tool is offered.
pub(crate) fn full_instructions(model_family: &ModelFamily, tools: &[ToolSpec]) -> String {
    let is_apply_patch_tool_present = tools.iter().any(|tool| tool.name() == "apply_patch");
    if model_family.needs_special_apply_patch_instructions && !is_apply_patch_tool_present {
        format!(
            "{}\n{APPLY_PATCH_TOOL_INSTRUCTIONS}",
            model_family.base_instructions
        )
    } else {
        model_family.base_instructions.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEvent {
    Created,
    OutputItemAdded(ResponseItem),
    OutputItemDone(ResponseItem),
    OutputTextDelta(String),
    ReasoningSummaryDelta {
        delta: String,
        summary_index: i64,
    },
    ReasoningContentDelta {
        delta: String,
        content_index: i64,
    },
    ReasoningSummaryPartAdded {
        summary_index: i64,
    },
    Completed {
        response_id: String,
        token_usage: Option<TokenUsage>,
    },
    RateLimits(RateLimitSnapshot),
    ModelsEtag(String),
}

/// What the model behind a [`ModelClient`] can do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCapabilities {
    pub supports_reasoning_summaries: bool,
    pub supports_parallel_tool_calls: bool,
    pub supports_prompt_cache_key: bool,
    pub supports_remote_compaction: bool,
    pub supports_output_schema: bool,
}

/// Events of one streamed model response. Terminal failures arrive as `Err`
/// items; the stream ends when the sender is dropped.
#[derive(Debug)]
pub struct ResponseStream {
    pub(crate) rx_event: mpsc::Receiver<Result<ResponseEvent>>,
}

impl ResponseStream {
    pub fn new(rx_event: mpsc::Receiver<Result<ResponseEvent>>) -> Self {
        Self { rx_event }
    }
}

impl Stream for ResponseStream {
    type Item = Result<ResponseEvent>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx_event.poll_recv(cx)
    }
}

/// Transport to a remote model. Implementations own retries, auth and wire
/// format; the session only consumes the event stream.
#[async_trait]
pub trait ModelClient: Send + Sync {
    fn capabilities(&self) -> ModelCapabilities;

    async fn stream(&self, prompt: &Prompt, cancel: CancellationToken) -> Result<ResponseStream>;

    /// Server-side compaction. Only called when
    /// [`ModelCapabilities::supports_remote_compaction`] is set.
    async fn compact(
        &self,
        prompt: &Prompt,
        cancel: CancellationToken,
    ) -> Result<Vec<ResponseItem>>;
}
