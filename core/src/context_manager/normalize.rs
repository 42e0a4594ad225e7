use std::collections::HashSet;

use codicil_protocol::models::FunctionCallOutputPayload;
use codicil_protocol::models::ResponseItem;
use tracing::info;
use tracing::warn;

const ABORTED_OUTPUT: &str = "aborted";

/// Insert an `"aborted"` output right after every call that has no output
/// anywhere in `items`.
pub(crate) fn ensure_call_outputs_present(items: &mut Vec<ResponseItem>) {
    let mut missing_outputs_to_insert: Vec<(usize, ResponseItem)> = Vec::new();

    for (idx, item) in items.iter().enumerate() {
        match item {
            ResponseItem::FunctionCall { call_id, .. } => {
                if !has_function_output(items, call_id) {
                    info!("Function call output is missing for call id: {call_id}");
                    missing_outputs_to_insert.push((idx, aborted_function_output(call_id)));
                }
            }
            ResponseItem::CustomToolCall { call_id, .. } => {
                let has_output = items.iter().any(|i| {
                    matches!(
                        i,
                        ResponseItem::CustomToolCallOutput { call_id: existing, .. }
                            if existing == call_id
                    )
                });
                if !has_output {
                    info!("Custom tool call output is missing for call id: {call_id}");
                    missing_outputs_to_insert.push((
                        idx,
                        ResponseItem::CustomToolCallOutput {
                            call_id: call_id.clone(),
                            output: ABORTED_OUTPUT.to_string(),
                        },
                    ));
                }
            }
            // A local shell call is answered by a function call output.
            ResponseItem::LocalShellCall {
                call_id: Some(call_id),
                ..
            } => {
                if !has_function_output(items, call_id) {
                    info!("Local shell call output is missing for call id: {call_id}");
                    missing_outputs_to_insert.push((idx, aborted_function_output(call_id)));
                }
            }
            _ => {}
        }
    }

    // Insert from the back so earlier indices stay valid.
    for (idx, output_item) in missing_outputs_to_insert.into_iter().rev() {
        items.insert(idx + 1, output_item);
    }
}

/// Drop every output whose call id matches no call in `items`.
pub(crate) fn remove_orphan_outputs(items: &mut Vec<ResponseItem>) {
    let mut function_call_ids: HashSet<String> = HashSet::new();
    let mut custom_call_ids: HashSet<String> = HashSet::new();
    for item in items.iter() {
        match item {
            ResponseItem::FunctionCall { call_id, .. }
            | ResponseItem::LocalShellCall {
                call_id: Some(call_id),
                ..
            } => {
                function_call_ids.insert(call_id.clone());
            }
            ResponseItem::CustomToolCall { call_id, .. } => {
                custom_call_ids.insert(call_id.clone());
            }
            _ => {}
        }
    }

    items.retain(|item| match item {
        ResponseItem::FunctionCallOutput { call_id, .. } => {
            let keep = function_call_ids.contains(call_id);
            if !keep {
                warn!("Function call output dropped, no call with id: {call_id}");
            }
            keep
        }
        ResponseItem::CustomToolCallOutput { call_id, .. } => {
            let keep = custom_call_ids.contains(call_id);
            if !keep {
                warn!("Custom tool call output dropped, no call with id: {call_id}");
            }
            keep
        }
        _ => true,
    });
}

/// After `removed` left the log, also remove the first item that pairs with
/// it so no half of a call/output pair is left behind.
pub(crate) fn remove_corresponding_for(items: &mut Vec<ResponseItem>, removed: &ResponseItem) {
    match removed {
        ResponseItem::FunctionCall { call_id, .. }
        | ResponseItem::LocalShellCall {
            call_id: Some(call_id),
            ..
        } => {
            remove_first_matching(items, |i| {
                matches!(
                    i,
                    ResponseItem::FunctionCallOutput { call_id: existing, .. }
                        if existing == call_id
                )
            });
        }
        ResponseItem::FunctionCallOutput { call_id, .. } => {
            remove_first_matching(items, |i| {
                matches!(
                    i,
                    ResponseItem::FunctionCall { call_id: existing, .. } if existing == call_id
                )
            });
            remove_first_matching(items, |i| {
                matches!(
                    i,
                    ResponseItem::LocalShellCall { call_id: Some(existing), .. }
                        if existing == call_id
                )
            });
        }
        ResponseItem::CustomToolCall { call_id, .. } => {
            remove_first_matching(items, |i| {
                matches!(
                    i,
                    ResponseItem::CustomToolCallOutput { call_id: existing, .. }
                        if existing == call_id
                )
            });
        }
        ResponseItem::CustomToolCallOutput { call_id, .. } => {
            remove_first_matching(items, |i| {
                matches!(
                    i,
                    ResponseItem::CustomToolCall { call_id: existing, .. } if existing == call_id
                )
            });
        }
        _ => {}
    }
}

fn has_function_output(items: &[ResponseItem], call_id: &str) -> bool {
    items.iter().any(|i| {
        matches!(
            i,
            ResponseItem::FunctionCallOutput { call_id: existing, .. } if existing == call_id
        )
    })
}

fn aborted_function_output(call_id: &str) -> ResponseItem {
    ResponseItem::FunctionCallOutput {
        call_id: call_id.to_string(),
        output: FunctionCallOutputPayload {
            content: ABORTED_OUTPUT.to_string(),
            ..Default::default()
        },
    }
}

fn remove_first_matching<F>(items: &mut Vec<ResponseItem>, predicate: F)
where
    F: Fn(&ResponseItem) -> bool,
{
    if let Some(pos) = items.iter().position(predicate) {
        items.remove(pos);
    }
}
