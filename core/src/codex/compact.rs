use codicil_protocol::models::ContentItem;
use codicil_protocol::models::ResponseItem;

use crate::truncate::TruncationPolicy;
use crate::truncate::approx_token_count;
use crate::truncate::truncate_text;

pub(crate) const SUMMARIZATION_PROMPT: &str = include_str!("../../templates/compact/prompt.md");
pub(crate) const SUMMARY_PREFIX: &str = include_str!("../../templates/compact/summary_prefix.md");
pub(crate) const COMPACT_USER_MESSAGE_MAX_TOKENS: usize = 20_000;

const NO_SUMMARY_PLACEHOLDER: &str = "(no summary available)";

/// Joins the non-blank text parts of a message with newlines. Images are
/// skipped; `None` when nothing textual remains.
pub fn content_items_to_text(content: &[ContentItem]) -> Option<String> {
    let pieces: Vec<&str> = content
        .iter()
        .filter_map(|item| match item {
            ContentItem::InputText { text } | ContentItem::OutputText { text } => {
                (!text.trim().is_empty()).then_some(text.as_str())
            }
            ContentItem::InputImage { .. } => None,
        })
        .collect();
    if pieces.is_empty() {
        None
    } else {
        Some(pieces.join("\n"))
    }
}

/// A message produced by an earlier compaction starts with the summary prefix
/// line.
pub fn is_summary_message(message: &str, summary_prefix: &str) -> bool {
    message
        .strip_prefix(summary_prefix)
        .is_some_and(|rest| rest.starts_with('\n'))
}

pub(crate) fn collect_user_messages(items: &[ResponseItem], summary_prefix: &str) -> Vec<String> {
    items
        .iter()
        .filter_map(|item| match item {
            ResponseItem::Message { role, content, .. } if role == "user" => {
                content_items_to_text(content)
            }
            _ => None,
        })
        .filter(|text| !is_summary_message(text, summary_prefix))
        .collect()
}

pub(crate) fn build_compacted_history(
    initial_context: Vec<ResponseItem>,
    user_messages: &[String],
    summary_text: &str,
) -> Vec<ResponseItem> {
    build_compacted_history_with_limit(
        initial_context,
        user_messages,
        summary_text,
        COMPACT_USER_MESSAGE_MAX_TOKENS,
    )
}

/// Initial context, then the newest user messages that fit in `max_tokens`
/// (the first one that overflows is truncated to the remaining budget and
/// selection stops there), then the summary.
pub(crate) fn build_compacted_history_with_limit(
    mut history: Vec<ResponseItem>,
    user_messages: &[String],
    summary_text: &str,
    max_tokens: usize,
) -> Vec<ResponseItem> {
    let mut selected_messages: Vec<String> = Vec::new();
    let mut remaining = max_tokens;
    for message in user_messages.iter().rev() {
        if remaining == 0 {
            break;
        }
        let tokens = approx_token_count(message);
        if tokens <= remaining {
            selected_messages.push(message.clone());
            remaining -= tokens;
        } else {
            selected_messages.push(truncate_text(message, TruncationPolicy::Tokens(remaining)));
            break;
        }
    }
    selected_messages.reverse();

    for message in selected_messages {
        history.push(user_text_message(message));
    }

    let summary_text = if summary_text.trim().is_empty() {
        NO_SUMMARY_PLACEHOLDER.to_string()
    } else {
        summary_text.to_string()
    };
    history.push(user_text_message(summary_text));
    history
}

pub(crate) fn user_text_message(text: String) -> ResponseItem {
    ResponseItem::Message {
        id: None,
        role: "user".to_string(),
        content: vec![ContentItem::InputText { text }],
    }
}
