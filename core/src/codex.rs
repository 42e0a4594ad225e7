pub mod compact;

use std::path::PathBuf;
use std::sync::Arc;

use async_stream::try_stream;
use codicil_async_utils::CancelErr;
use codicil_async_utils::OrCancelExt;
use codicil_protocol::ConversationId;
use codicil_protocol::models::ResponseInputItem;
use codicil_protocol::models::ResponseItem;
use codicil_protocol::protocol::AskForApproval;
use codicil_protocol::protocol::SandboxPolicy;
use codicil_protocol::protocol::TokenUsage;
use codicil_protocol::protocol::TokenUsageInfo;
use codicil_protocol::user_input::UserInput;
use futures::Stream;
use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::client_common::ModelClient;
use crate::client_common::Prompt;
use crate::client_common::ResponseEvent;
use crate::client_common::full_instructions;
use crate::codex::compact::build_compacted_history;
use crate::codex::compact::collect_user_messages;
use crate::codex::compact::content_items_to_text;
use crate::codex::compact::user_text_message;
use crate::config::Config;
use crate::context_manager::ContextManager;
use crate::environment_context::EnvironmentContext;
use crate::error::CodicilErr;
use crate::error::Result as CodicilResult;
use crate::model_family::ModelFamily;
use crate::prompts::PromptCatalog;
use crate::shell::ShellInfo;
use crate::tools::ToolCall;
use crate::tools::ToolExecutor;
use crate::tools::ToolResult;
use crate::tools::ToolRouter;
use crate::tools::spec::ToolSpec;
use crate::truncate::TruncationPolicy;
use crate::user_instructions::DeveloperInstructions;
use crate::user_instructions::UserInstructions;

/// Per-session settings derived once from [`Config`] and the resolved
/// [`ModelFamily`].
#[derive(Debug, Clone, PartialEq)]
pub struct TurnContext {
    pub cwd: PathBuf,
    pub approval_policy: AskForApproval,
    pub sandbox_policy: SandboxPolicy,
    pub shell: ShellInfo,
    pub developer_instructions: Option<String>,
    pub user_instructions: Option<String>,
    pub model_family: ModelFamily,
    /// The configured override, else the family's policy.
    pub truncation_policy: TruncationPolicy,
}

impl TurnContext {
    pub fn new(config: &Config, model_family: ModelFamily) -> Self {
        let truncation_policy = config
            .truncation_policy_override
            .unwrap_or(model_family.truncation_policy);
        Self {
            cwd: config.cwd.clone(),
            approval_policy: config.approval_policy,
            sandbox_policy: config.sandbox_policy.clone(),
            shell: config.shell.clone(),
            developer_instructions: config.developer_instructions.clone(),
            user_instructions: config.user_instructions.clone(),
            model_family,
            truncation_policy,
        }
    }

    /// Developer instructions, user instructions, then the environment
    /// context. Blank instructions are skipped.
    pub fn build_initial_context(&self) -> Vec<ResponseItem> {
        let mut items = Vec::<ResponseItem>::with_capacity(3);
        if let Some(developer_instructions) = non_blank(self.developer_instructions.as_deref()) {
            items.push(DeveloperInstructions::new(developer_instructions).into());
        }
        if let Some(user_instructions) = non_blank(self.user_instructions.as_deref()) {
            items.push(
                UserInstructions {
                    directory: self.cwd.to_string_lossy().to_string(),
                    text: user_instructions.to_string(),
                }
                .into(),
            );
        }
        items.push(ResponseItem::from(EnvironmentContext::new(
            Some(self.cwd.clone()),
            Some(self.approval_policy),
            Some(&self.sandbox_policy),
            self.shell.clone(),
        )));
        items
    }
}

fn non_blank(text: Option<&str>) -> Option<&str> {
    text.filter(|text| !text.trim().is_empty())
}

/// Everything a session reports while running a turn.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// A model stream event, forwarded unchanged.
    Model(ResponseEvent),
    ToolCall(ToolCall),
    /// Emitted once the result has been recorded in history.
    ToolResult(ToolResult),
}

/// Optional observer of a session. All methods default to no-ops.
pub trait SessionLogger: Send + Sync {
    fn on_model_event(&self, _event: &ResponseEvent) {}

    fn on_tool_call(&self, _call: &ToolCall) {}

    fn on_tool_result(&self, _result: &ToolResult) {}
}

/// Drives one conversation: owns its history and talks to the model and the
/// tool executor. One turn runs at a time.
pub struct Session {
    conversation_id: ConversationId,
    model_client: Arc<dyn ModelClient>,
    tool_executor: Arc<dyn ToolExecutor>,
    prompts: Arc<PromptCatalog>,
    logger: Option<Arc<dyn SessionLogger>>,
    turn_context: TurnContext,
    router: ToolRouter,
    history: ContextManager,
    seeded_initial_context: bool,
}

impl Session {
    pub fn new(
        config: Config,
        model_client: Arc<dyn ModelClient>,
        tool_executor: Arc<dyn ToolExecutor>,
        prompts: Arc<PromptCatalog>,
    ) -> Self {
        let model_family = config.resolve_model_family(&prompts);
        let router = ToolRouter::from_config(&config, &model_family);
        let turn_context = TurnContext::new(&config, model_family);
        let conversation_id = ConversationId::new();
        info!(
            %conversation_id,
            model = %config.model,
            family = %turn_context.model_family.family,
            "session created"
        );
        Self {
            conversation_id,
            model_client,
            tool_executor,
            prompts,
            logger: None,
            turn_context,
            router,
            history: ContextManager::new(),
            seeded_initial_context: false,
        }
    }

    pub fn with_logger(mut self, logger: Arc<dyn SessionLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn conversation_id(&self) -> ConversationId {
        self.conversation_id
    }

    pub fn turn_context(&self) -> &TurnContext {
        &self.turn_context
    }

    pub fn tools(&self) -> &[ToolSpec] {
        self.router.specs()
    }

    /// The normalized transcript.
    pub fn history(&self) -> Vec<ResponseItem> {
        self.history.get_history()
    }

    /// What the next prompt would carry as input.
    pub fn history_for_prompt(&self) -> Vec<ResponseItem> {
        self.history.get_history_for_prompt()
    }

    pub fn estimate_token_count(&self) -> Option<usize> {
        self.history.estimate_token_count()
    }

    pub fn token_info(&self) -> Option<TokenUsageInfo> {
        self.history.token_info()
    }

    /// Runs one user turn. The stream yields model events as they arrive and
    /// a call/result pair for every tool the model invokes; it ends once a
    /// model response requests no tools or `cancel` fires between rounds.
    pub fn run_turn(
        &mut self,
        input: Vec<UserInput>,
        cancel: CancellationToken,
    ) -> impl Stream<Item = CodicilResult<SessionEvent>> + Send + '_ {
        try_stream! {
            self.ensure_initial_context();
            let user_message: ResponseItem = ResponseInputItem::from(input).into();
            self.record_conversation_items(std::slice::from_ref(&user_message));

            let mut follow_up = true;
            while follow_up && !cancel.is_cancelled() {
                follow_up = false;
                let prompt = self.build_prompt(self.router.specs().to_vec());
                let mut stream = self.model_client.stream(&prompt, cancel.clone()).await?;
                let mut completed = false;

                while let Some(event) = stream.next().await {
                    let event = event?;
                    if let Some(logger) = &self.logger {
                        logger.on_model_event(&event);
                    }
                    let done_item = match &event {
                        ResponseEvent::OutputItemDone(item) => Some(item.clone()),
                        ResponseEvent::Completed { token_usage, .. } => {
                            completed = true;
                            if let Some(usage) = token_usage {
                                self.update_token_usage(usage);
                            }
                            None
                        }
                        _ => None,
                    };
                    yield SessionEvent::Model(event);

                    let Some(item) = done_item else {
                        continue;
                    };
                    debug!(?item, "output item done");
                    self.record_conversation_items(std::slice::from_ref(&item));
                    let Some(call) = ToolRouter::build_tool_call(&item) else {
                        continue;
                    };

                    info!("ToolCall: {} {}", call.name(), tool_call_payload(&call));
                    if let Some(logger) = &self.logger {
                        logger.on_tool_call(&call);
                    }
                    yield SessionEvent::ToolCall(call.clone());

                    let result = self.tool_executor.execute(call, cancel.clone()).await;
                    if !result.is_success() {
                        debug!(call_id = %result.call_id(), "tool call did not succeed");
                    }
                    let output_item: ResponseItem = ResponseInputItem::from(result.clone()).into();
                    self.record_conversation_items(std::slice::from_ref(&output_item));
                    if let Some(logger) = &self.logger {
                        logger.on_tool_result(&result);
                    }
                    yield SessionEvent::ToolResult(result);
                    follow_up = true;
                }

                if !completed && !cancel.is_cancelled() {
                    if !follow_up {
                        Err::<(), CodicilErr>(CodicilErr::UnexpectedStreamEnd)?;
                    }
                    warn!("stream closed before response.completed; sending tool output anyway");
                }
            }
        }
    }

    /// Shrinks the history. Uses the model's remote compaction when it has
    /// one, otherwise asks the model for a summary and rebuilds the history
    /// around it. Cancellation leaves the history unreplaced.
    pub async fn compact(&mut self, cancel: CancellationToken) -> CodicilResult<()> {
        self.ensure_initial_context();
        info!(conversation_id = %self.conversation_id, "compacting conversation");

        if self.model_client.capabilities().supports_remote_compaction {
            let prompt = self.build_prompt(Vec::new());
            let compacted = match self
                .model_client
                .compact(&prompt, cancel.clone())
                .or_cancel(&cancel)
                .await
            {
                Ok(result) => result?,
                Err(CancelErr::Cancelled) => return Ok(()),
            };
            info!(items = compacted.len(), "remote compaction finished");
            self.history.replace(compacted);
            return Ok(());
        }

        let summarization_prompt = user_text_message(self.prompts.compact_prompt().to_string());
        self.record_conversation_items(std::slice::from_ref(&summarization_prompt));

        let prompt = self.build_prompt(Vec::new());
        let mut stream = match self
            .model_client
            .stream(&prompt, cancel.clone())
            .or_cancel(&cancel)
            .await
        {
            Ok(stream) => stream?,
            Err(CancelErr::Cancelled) => return Ok(()),
        };

        let mut summary_text: Option<String> = None;
        loop {
            let event = match stream.next().or_cancel(&cancel).await {
                Ok(Some(event)) => event?,
                Ok(None) => break,
                Err(CancelErr::Cancelled) => {
                    warn!("compaction cancelled before the summary completed");
                    return Ok(());
                }
            };
            if let Some(logger) = &self.logger {
                logger.on_model_event(&event);
            }
            match &event {
                ResponseEvent::OutputItemDone(ResponseItem::Message { role, content, .. })
                    if role == "assistant" =>
                {
                    summary_text = content_items_to_text(content);
                }
                ResponseEvent::Completed {
                    token_usage: Some(usage),
                    ..
                } => self.update_token_usage(usage),
                _ => {}
            }
        }

        let history_snapshot = self.history.get_history();
        let summary_prefix = self.prompts.summary_prefix();
        let user_messages = collect_user_messages(&history_snapshot, summary_prefix);
        let summary = format!("{summary_prefix}\n{}", summary_text.unwrap_or_default());
        let new_history = build_compacted_history(
            self.turn_context.build_initial_context(),
            &user_messages,
            &summary,
        );
        info!(
            before = history_snapshot.len(),
            after = new_history.len(),
            "compaction finished"
        );
        self.history.replace(new_history);
        Ok(())
    }

    fn ensure_initial_context(&mut self) {
        if self.seeded_initial_context {
            return;
        }
        let items = self.turn_context.build_initial_context();
        self.record_conversation_items(&items);
        self.seeded_initial_context = true;
    }

    fn record_conversation_items(&mut self, items: &[ResponseItem]) {
        self.history
            .record_items(items.iter(), self.turn_context.truncation_policy);
    }

    fn update_token_usage(&mut self, usage: &TokenUsage) {
        self.history
            .update_token_info(usage, self.turn_context.model_family.context_window);
    }

    fn build_prompt(&self, tools: Vec<ToolSpec>) -> Prompt {
        let model_family = &self.turn_context.model_family;
        let prompt_cache_key = self
            .model_client
            .capabilities()
            .supports_prompt_cache_key
            .then(|| self.conversation_id.to_string());
        Prompt {
            instructions: full_instructions(model_family, &tools),
            input: self.history.get_history_for_prompt(),
            tools,
            parallel_tool_calls: model_family.supports_parallel_tool_calls,
            output_schema: None,
            prompt_cache_key,
        }
    }
}

fn tool_call_payload(call: &ToolCall) -> &str {
    match call {
        ToolCall::Function { arguments, .. } => arguments,
        ToolCall::Custom { input, .. } => input,
    }
}
