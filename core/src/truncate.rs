//! Utilities for truncating large chunks of output while preserving a prefix
//! and suffix on UTF-8 boundaries, under either a byte budget or an
//! approximate token budget.

use std::ops::Mul;

use codicil_protocol::models::FunctionCallOutputContentItem;
use codicil_utils_string::take_bytes_at_char_boundary;
use codicil_utils_string::take_last_bytes_at_char_boundary;
use serde::Deserialize;
use serde::Serialize;

pub const APPROX_BYTES_PER_TOKEN: usize = 4;

/// A size budget for text sent to the model. Byte and token budgets convert
/// into each other at [`APPROX_BYTES_PER_TOKEN`], rounding up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "limit", rename_all = "snake_case")]
pub enum TruncationPolicy {
    Bytes(usize),
    Tokens(usize),
}

impl TruncationPolicy {
    pub fn token_budget(&self) -> usize {
        match self {
            TruncationPolicy::Bytes(bytes) => approx_tokens_from_byte_count(*bytes),
            TruncationPolicy::Tokens(tokens) => *tokens,
        }
    }

    pub fn byte_budget(&self) -> usize {
        match self {
            TruncationPolicy::Bytes(bytes) => *bytes,
            TruncationPolicy::Tokens(tokens) => approx_bytes_for_tokens(*tokens),
        }
    }

    fn with_limit(&self, limit: usize) -> Self {
        match self {
            TruncationPolicy::Bytes(_) => TruncationPolicy::Bytes(limit),
            TruncationPolicy::Tokens(_) => TruncationPolicy::Tokens(limit),
        }
    }

    fn limit(&self) -> usize {
        match self {
            TruncationPolicy::Bytes(limit) | TruncationPolicy::Tokens(limit) => *limit,
        }
    }

    /// Cost of `text` in this policy's unit.
    fn cost_of(&self, text: &str) -> usize {
        match self {
            TruncationPolicy::Bytes(_) => text.len(),
            TruncationPolicy::Tokens(_) => approx_token_count(text),
        }
    }
}

impl Mul<f64> for TruncationPolicy {
    type Output = Self;

    fn mul(self, multiplier: f64) -> Self::Output {
        let scaled = (self.limit() as f64 * multiplier).ceil() as usize;
        self.with_limit(scaled)
    }
}

/// Truncate `content` to fit `policy`, keeping its head and tail and placing
/// a marker that reports how much was removed in between. Text that already
/// fits is returned unchanged.
pub fn truncate_text(content: &str, policy: TruncationPolicy) -> String {
    if content.is_empty() {
        return String::new();
    }

    let max_bytes = policy.byte_budget();
    if max_bytes == 0 {
        let removed = removed_units(policy, content.len(), content.chars().count());
        return truncation_marker(policy, removed);
    }
    if content.len() <= max_bytes {
        return content.to_string();
    }

    let left_budget = max_bytes.div_ceil(2);
    let right_budget = max_bytes - left_budget;
    let (removed_chars, prefix, suffix) = split_string(content, left_budget, right_budget);
    let marker = truncation_marker(
        policy,
        removed_units(policy, content.len() - max_bytes, removed_chars),
    );

    let mut out = String::with_capacity(prefix.len() + marker.len() + suffix.len());
    out.push_str(prefix);
    out.push_str(&marker);
    out.push_str(suffix);
    out
}

/// Like [`truncate_text`] but, when truncation happens, prefixes the result
/// with the line count of the original content.
pub fn formatted_truncate_text(content: &str, policy: TruncationPolicy) -> String {
    if content.len() <= policy.byte_budget() {
        return content.to_string();
    }
    let total_lines = content.split('\n').count();
    let truncated = truncate_text(content, policy);
    format!("Total output lines: {total_lines}\n\n{truncated}")
}

/// Fit a list of structured output parts into `policy`. Images always pass
/// through. Text parts are kept whole while they fit; the first one that
/// does not fit is truncated to the remaining budget and every later text
/// part is dropped and reported in a trailing summary part.
pub fn truncate_function_output_items_with_policy(
    items: &[FunctionCallOutputContentItem],
    policy: TruncationPolicy,
) -> Vec<FunctionCallOutputContentItem> {
    let mut out: Vec<FunctionCallOutputContentItem> = Vec::with_capacity(items.len());
    let mut remaining = match policy {
        TruncationPolicy::Bytes(_) => policy.byte_budget(),
        TruncationPolicy::Tokens(_) => policy.token_budget(),
    };
    let mut omitted_text_items = 0usize;

    for item in items {
        match item {
            FunctionCallOutputContentItem::InputText { text } => {
                if remaining == 0 {
                    omitted_text_items += 1;
                    continue;
                }

                let cost = policy.cost_of(text);
                if cost <= remaining {
                    out.push(item.clone());
                    remaining -= cost;
                } else {
                    let snippet = truncate_text(text, policy.with_limit(remaining));
                    if snippet.is_empty() {
                        omitted_text_items += 1;
                    } else {
                        out.push(FunctionCallOutputContentItem::InputText { text: snippet });
                    }
                    remaining = 0;
                }
            }
            FunctionCallOutputContentItem::InputImage { .. } => out.push(item.clone()),
        }
    }

    if omitted_text_items > 0 {
        out.push(FunctionCallOutputContentItem::InputText {
            text: format!("[omitted {omitted_text_items} text items ...]"),
        });
    }

    out
}

pub fn approx_token_count(text: &str) -> usize {
    text.len().div_ceil(APPROX_BYTES_PER_TOKEN)
}

pub fn approx_bytes_for_tokens(tokens: usize) -> usize {
    tokens.saturating_mul(APPROX_BYTES_PER_TOKEN)
}

pub fn approx_tokens_from_byte_count(bytes: usize) -> usize {
    bytes.div_ceil(APPROX_BYTES_PER_TOKEN)
}

/// Split `s` into a head of at most `beginning_bytes` and a tail of at most
/// `end_bytes`, both on char boundaries, and count the chars in between.
fn split_string(s: &str, beginning_bytes: usize, end_bytes: usize) -> (usize, &str, &str) {
    let prefix = take_bytes_at_char_boundary(s, beginning_bytes);
    let suffix_start = (s.len() - take_last_bytes_at_char_boundary(s, end_bytes).len())
        .max(prefix.len());
    let removed_chars = s[prefix.len()..suffix_start].chars().count();
    (removed_chars, prefix, &s[suffix_start..])
}

fn removed_units(policy: TruncationPolicy, removed_bytes: usize, removed_chars: usize) -> usize {
    match policy {
        TruncationPolicy::Bytes(_) => removed_chars,
        TruncationPolicy::Tokens(_) => approx_tokens_from_byte_count(removed_bytes),
    }
}

fn truncation_marker(policy: TruncationPolicy, removed: usize) -> String {
    match policy {
        TruncationPolicy::Bytes(_) => format!("…{removed} chars truncated…"),
        TruncationPolicy::Tokens(_) => format!("…{removed} tokens truncated…"),
    }
}
