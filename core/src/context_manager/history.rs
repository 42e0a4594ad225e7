use std::ops::Deref;

use codicil_protocol::models::FunctionCallOutputPayload;
use codicil_protocol::models::ResponseItem;
use codicil_protocol::protocol::TokenUsage;
use codicil_protocol::protocol::TokenUsageInfo;

use super::normalize;
use crate::truncate::TruncationPolicy;
use crate::truncate::approx_token_count;
use crate::truncate::truncate_function_output_items_with_policy;
use crate::truncate::truncate_text;

/// Call outputs are stored with this much headroom over the turn's policy.
const RECORD_BUDGET_MULTIPLIER: f64 = 1.2;

/// Transcript of conversation history. Single writer: the session that owns
/// it.
#[derive(Debug, Clone, Default)]
pub struct ContextManager {
    /// The oldest items are at the beginning of the vector.
    items: Vec<ResponseItem>,
    token_info: Option<TokenUsageInfo>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_info(&self) -> Option<TokenUsageInfo> {
        self.token_info.clone()
    }

    pub fn set_token_info(&mut self, info: Option<TokenUsageInfo>) {
        self.token_info = info;
    }

    /// Fold the usage reported by a completed response into the running
    /// totals.
    pub fn update_token_info(&mut self, usage: &TokenUsage, model_context_window: Option<i64>) {
        self.token_info = TokenUsageInfo::new_or_append(
            &self.token_info,
            &Some(usage.clone()),
            model_context_window,
        );
    }

    /// `items` is ordered from oldest to newest. Items the model never sees
    /// (system messages, unknown kinds) are dropped; call outputs are
    /// truncated once, here, and never rewritten afterwards.
    pub fn record_items<I>(&mut self, items: I, policy: TruncationPolicy)
    where
        I: IntoIterator,
        I::Item: Deref<Target = ResponseItem>,
    {
        for item in items {
            let item_ref = item.deref();
            let is_ghost_snapshot = matches!(item_ref, ResponseItem::GhostSnapshot { .. });
            if !is_api_message(item_ref) && !is_ghost_snapshot {
                continue;
            }

            let processed = process_item(item_ref, policy);
            self.items.push(processed);
        }
    }

    /// The full log with every call paired to exactly one output. The stored
    /// log is left untouched.
    pub fn get_history(&self) -> Vec<ResponseItem> {
        let mut items = self.items.clone();
        normalize::ensure_call_outputs_present(&mut items);
        normalize::remove_orphan_outputs(&mut items);
        items
    }

    /// Same as [`Self::get_history`] without the items that must never reach
    /// the model.
    pub fn get_history_for_prompt(&self) -> Vec<ResponseItem> {
        let mut history = self.get_history();
        history.retain(|item| !matches!(item, ResponseItem::GhostSnapshot { .. }));
        history
    }

    /// The stored items exactly as recorded.
    pub fn raw_items(&self) -> &[ResponseItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn replace(&mut self, items: Vec<ResponseItem>) {
        self.items = items;
    }

    /// Evict the oldest item together with its paired call or output.
    pub fn remove_first_item(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let removed = self.items.remove(0);
        normalize::remove_corresponding_for(&mut self.items, &removed);
    }

    /// Rough token count of everything the model would see, or `None` when
    /// nothing has been recorded yet.
    pub fn estimate_token_count(&self) -> Option<usize> {
        if self.items.is_empty() {
            return None;
        }

        Some(
            self.items
                .iter()
                .filter(|item| !matches!(item, ResponseItem::GhostSnapshot { .. }))
                .map(|item| serde_json::to_string(item).map_or(0, |s| approx_token_count(&s)))
                .sum(),
        )
    }
}

fn process_item(item: &ResponseItem, policy: TruncationPolicy) -> ResponseItem {
    let policy_with_serialization_budget = policy * RECORD_BUDGET_MULTIPLIER;
    match item {
        ResponseItem::FunctionCallOutput { call_id, output } => {
            let content = truncate_text(&output.content, policy_with_serialization_budget);
            let content_items = output.content_items.as_ref().map(|items| {
                truncate_function_output_items_with_policy(items, policy_with_serialization_budget)
            });
            ResponseItem::FunctionCallOutput {
                call_id: call_id.clone(),
                output: FunctionCallOutputPayload {
                    content,
                    content_items,
                    success: output.success,
                },
            }
        }
        ResponseItem::CustomToolCallOutput { call_id, output } => {
            ResponseItem::CustomToolCallOutput {
                call_id: call_id.clone(),
                output: truncate_text(output, policy_with_serialization_budget),
            }
        }
        _ => item.clone(),
    }
}

/// Anything that is not a system message or an unrecognized item is
/// considered an API message.
fn is_api_message(message: &ResponseItem) -> bool {
    match message {
        ResponseItem::Message { role, .. } => !role.eq_ignore_ascii_case("system"),
        ResponseItem::FunctionCallOutput { .. }
        | ResponseItem::FunctionCall { .. }
        | ResponseItem::CustomToolCall { .. }
        | ResponseItem::CustomToolCallOutput { .. }
        | ResponseItem::LocalShellCall { .. }
        | ResponseItem::Reasoning { .. }
        | ResponseItem::WebSearchCall { .. }
        | ResponseItem::Compaction { .. } => true,
        ResponseItem::GhostSnapshot { .. } | ResponseItem::Other(_) => false,
    }
}
