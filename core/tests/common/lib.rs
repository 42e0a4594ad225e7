#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use codicil_core::ModelCapabilities;
use codicil_core::ModelClient;
use codicil_core::Prompt;
use codicil_core::ResponseEvent;
use codicil_core::ResponseStream;
use codicil_core::SessionEvent;
use codicil_core::SessionLogger;
use codicil_core::ToolCall;
use codicil_core::ToolExecutor;
use codicil_core::ToolResult;
use codicil_core::config::Config;
use codicil_core::config::ConfigOverrides;
use codicil_core::config::ConfigToml;
use codicil_core::error::CodicilErr;
use codicil_core::error::Result;
use codicil_protocol::models::FunctionCallOutputPayload;
use codicil_protocol::models::ResponseItem;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub fn load_default_config_for_test(cwd: &Path) -> Config {
    Config::load_from_base_config_with_overrides(
        ConfigToml::default(),
        ConfigOverrides::default(),
        cwd.to_path_buf(),
    )
}

pub fn load_config_with_overrides(cwd: &Path, overrides: ConfigOverrides) -> Config {
    Config::load_from_base_config_with_overrides(
        ConfigToml::default(),
        overrides,
        cwd.to_path_buf(),
    )
}

enum ScriptedStream {
    Events(Vec<Result<ResponseEvent>>),
    Fail(CodicilErr),
    /// Never yields and never closes.
    Stalled,
}

/// A `ModelClient` that replays queued responses, one per `stream` call, and
/// remembers every prompt it was given.
#[derive(Default)]
pub struct ScriptedModelClient {
    capabilities: ModelCapabilities,
    scripts: Mutex<VecDeque<ScriptedStream>>,
    prompts: Mutex<Vec<Prompt>>,
    compact_prompts: Mutex<Vec<Prompt>>,
    compact_result: Mutex<Option<Vec<ResponseItem>>>,
    stalled_senders: Mutex<Vec<mpsc::Sender<Result<ResponseEvent>>>>,
}

impl ScriptedModelClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(mut self, capabilities: ModelCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn with_compact_result(self, items: Vec<ResponseItem>) -> Self {
        *self.compact_result.lock().unwrap() = Some(items);
        self
    }

    /// Queues a response that yields `events` and then closes.
    pub fn push_response(&self, events: Vec<ResponseEvent>) {
        self.push_stream(events.into_iter().map(Ok).collect());
    }

    pub fn push_stream(&self, events: Vec<Result<ResponseEvent>>) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Events(events));
    }

    /// Queues a `stream` call that fails before any event is produced.
    pub fn push_failure(&self, err: CodicilErr) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Fail(err));
    }

    pub fn push_stalled(&self) {
        self.scripts
            .lock()
            .unwrap()
            .push_back(ScriptedStream::Stalled);
    }

    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn compact_prompts(&self) -> Vec<Prompt> {
        self.compact_prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModelClient {
    fn capabilities(&self) -> ModelCapabilities {
        self.capabilities
    }

    async fn stream(&self, prompt: &Prompt, _cancel: CancellationToken) -> Result<ResponseStream> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let script = self.scripts.lock().unwrap().pop_front();
        match script {
            Some(ScriptedStream::Events(events)) => {
                let (tx, rx) = mpsc::channel(events.len().max(1));
                for event in events {
                    tx.try_send(event).expect("channel sized for every event");
                }
                Ok(ResponseStream::new(rx))
            }
            Some(ScriptedStream::Fail(err)) => Err(err),
            Some(ScriptedStream::Stalled) => {
                let (tx, rx) = mpsc::channel(1);
                self.stalled_senders.lock().unwrap().push(tx);
                Ok(ResponseStream::new(rx))
            }
            None => Err(CodicilErr::Stream("no scripted response left".to_string())),
        }
    }

    async fn compact(&self, prompt: &Prompt, _cancel: CancellationToken) -> Result<Vec<ResponseItem>> {
        self.compact_prompts.lock().unwrap().push(prompt.clone());
        self.compact_result
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| CodicilErr::Stream("no scripted compaction".to_string()))
    }
}

/// A `ToolExecutor` that records calls and answers `ran <name>` without
/// touching the machine.
#[derive(Default)]
pub struct RecordingToolExecutor {
    calls: Mutex<Vec<ToolCall>>,
    cancel_on_execute: Option<CancellationToken>,
}

impl RecordingToolExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancels `token` from inside every `execute` call.
    pub fn cancelling(token: CancellationToken) -> Self {
        Self {
            calls: Mutex::default(),
            cancel_on_execute: Some(token),
        }
    }

    pub fn calls(&self) -> Vec<ToolCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for RecordingToolExecutor {
    async fn execute(&self, call: ToolCall, _cancel: CancellationToken) -> ToolResult {
        self.calls.lock().unwrap().push(call.clone());
        if let Some(token) = &self.cancel_on_execute {
            token.cancel();
        }
        match call {
            ToolCall::Function { call_id, name, .. } => ToolResult::Function {
                call_id,
                output: FunctionCallOutputPayload::from_text(format!("ran {name}"), true),
            },
            ToolCall::Custom { call_id, name, .. } => ToolResult::Custom {
                call_id,
                output: format!("ran {name}"),
            },
        }
    }
}

/// Captures logger callbacks as the `SessionEvent`s they mirror.
#[derive(Default)]
pub struct RecordingLogger {
    events: Mutex<Vec<SessionEvent>>,
}

impl RecordingLogger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl SessionLogger for RecordingLogger {
    fn on_model_event(&self, event: &ResponseEvent) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::Model(event.clone()));
    }

    fn on_tool_call(&self, call: &ToolCall) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::ToolCall(call.clone()));
    }

    fn on_tool_result(&self, result: &ToolResult) {
        self.events
            .lock()
            .unwrap()
            .push(SessionEvent::ToolResult(result.clone()));
    }
}

pub mod responses {
    use codicil_core::ResponseEvent;
    use codicil_protocol::models::ContentItem;
    use codicil_protocol::models::ResponseItem;
    use codicil_protocol::protocol::TokenUsage;

    pub fn ev_created() -> ResponseEvent {
        ResponseEvent::Created
    }

    pub fn ev_output_text_delta(delta: &str) -> ResponseEvent {
        ResponseEvent::OutputTextDelta(delta.to_string())
    }

    pub fn assistant_message(id: &str, text: &str) -> ResponseItem {
        ResponseItem::Message {
            id: Some(id.to_string()),
            role: "assistant".to_string(),
            content: vec![ContentItem::OutputText {
                text: text.to_string(),
            }],
        }
    }

    pub fn ev_assistant_message(id: &str, text: &str) -> ResponseEvent {
        ResponseEvent::OutputItemDone(assistant_message(id, text))
    }

    pub fn ev_function_call(call_id: &str, name: &str, arguments: &str) -> ResponseEvent {
        ResponseEvent::OutputItemDone(ResponseItem::FunctionCall {
            id: None,
            name: name.to_string(),
            arguments: arguments.to_string(),
            call_id: call_id.to_string(),
        })
    }

    pub fn ev_custom_tool_call(call_id: &str, name: &str, input: &str) -> ResponseEvent {
        ResponseEvent::OutputItemDone(ResponseItem::CustomToolCall {
            id: None,
            status: None,
            call_id: call_id.to_string(),
            name: name.to_string(),
            input: input.to_string(),
        })
    }

    pub fn ev_completed(id: &str) -> ResponseEvent {
        ResponseEvent::Completed {
            response_id: id.to_string(),
            token_usage: None,
        }
    }

    pub fn ev_completed_with_tokens(id: &str, total_tokens: i64) -> ResponseEvent {
        ResponseEvent::Completed {
            response_id: id.to_string(),
            token_usage: Some(TokenUsage {
                input_tokens: total_tokens,
                cached_input_tokens: 0,
                output_tokens: 0,
                reasoning_output_tokens: 0,
                total_tokens,
            }),
        }
    }
}
