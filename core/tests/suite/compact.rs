use std::path::Path;
use std::sync::Arc;

use codicil_core::ModelCapabilities;
use codicil_core::Session;
use codicil_core::error::CodicilErr;
use codicil_core::prompts::PromptCatalog;
use codicil_core::prompts::PromptKey;
use codicil_protocol::models::ContentItem;
use codicil_protocol::models::ResponseItem;
use codicil_protocol::user_input::UserInput;
use core_test_support::RecordingToolExecutor;
use core_test_support::ScriptedModelClient;
use core_test_support::load_default_config_for_test;
use core_test_support::responses::assistant_message;
use core_test_support::responses::ev_assistant_message;
use core_test_support::responses::ev_completed;
use core_test_support::responses::ev_completed_with_tokens;
use futures::StreamExt;
use pretty_assertions::assert_eq;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracing_test::traced_test;

const FIRST_REPLY: &str = "FIRST_REPLY";
const SUMMARY_TEXT: &str = "SUMMARY_ONLY_CONTEXT";

fn builtin_prompt(key: PromptKey) -> String {
    PromptCatalog::builtin().get(key).to_string()
}

fn new_session(cwd: &Path, client: &Arc<ScriptedModelClient>, prompts: PromptCatalog) -> Session {
    Session::new(
        load_default_config_for_test(cwd),
        client.clone(),
        Arc::new(RecordingToolExecutor::new()),
        Arc::new(prompts),
    )
}

fn user_message(text: &str) -> ResponseItem {
    ResponseItem::Message {
        id: None,
        role: "user".to_string(),
        content: vec![ContentItem::InputText {
            text: text.to_string(),
        }],
    }
}

fn message_text(item: &ResponseItem) -> Option<&str> {
    match item {
        ResponseItem::Message { content, .. } => match content.as_slice() {
            [ContentItem::InputText { text }] | [ContentItem::OutputText { text }] => {
                Some(text.as_str())
            }
            _ => None,
        },
        _ => None,
    }
}

async fn run_simple_turn(session: &mut Session, client: &ScriptedModelClient, text: &str) {
    client.push_response(vec![
        ev_assistant_message("m1", FIRST_REPLY),
        ev_completed("r1"),
    ]);
    let events: Vec<_> = session
        .run_turn(
            vec![UserInput::Text {
                text: text.to_string(),
            }],
            CancellationToken::new(),
        )
        .collect()
        .await;
    assert!(events.iter().all(Result::is_ok));
}

#[tokio::test]
#[traced_test]
async fn local_compaction_rebuilds_history_around_summary() {
    let cwd = TempDir::new().unwrap();
    let client = Arc::new(ScriptedModelClient::new());
    let mut session = new_session(cwd.path(), &client, PromptCatalog::builtin());
    run_simple_turn(&mut session, &client, "hello world").await;

    client.push_response(vec![
        ev_assistant_message("m2", SUMMARY_TEXT),
        ev_completed_with_tokens("r2", 10),
    ]);
    session.compact(CancellationToken::new()).await.unwrap();

    let summarization_prompt = builtin_prompt(PromptKey::CompactPrompt);
    let summary_prefix = builtin_prompt(PromptKey::CompactSummaryPrefix);
    let prompts = client.prompts();
    assert_eq!(prompts.len(), 2);
    let summarize = &prompts[1];
    assert!(summarize.tools.is_empty());
    assert_eq!(
        summarize.input.last(),
        Some(&user_message(&summarization_prompt))
    );
    assert!(summarize.input.contains(&assistant_message("m1", FIRST_REPLY)));

    let initial_context = session.turn_context().build_initial_context();
    let mut expected = initial_context.clone();
    expected.extend(initial_context);
    expected.push(user_message("hello world"));
    expected.push(user_message(&summarization_prompt));
    expected.push(user_message(&format!("{summary_prefix}\n{SUMMARY_TEXT}")));
    assert_eq!(session.history(), expected);

    assert_eq!(
        session.token_info().map(|info| info.total_token_usage.total_tokens),
        Some(10)
    );
    assert!(logs_contain("compaction finished"));
}

#[tokio::test]
async fn repeated_compaction_keeps_only_the_latest_summary() {
    let cwd = TempDir::new().unwrap();
    let client = Arc::new(ScriptedModelClient::new());
    let mut session = new_session(cwd.path(), &client, PromptCatalog::builtin());
    run_simple_turn(&mut session, &client, "hello world").await;

    client.push_response(vec![
        ev_assistant_message("s1", "FIRST_SUMMARY"),
        ev_completed("r2"),
    ]);
    session.compact(CancellationToken::new()).await.unwrap();
    client.push_response(vec![
        ev_assistant_message("s2", "SECOND_SUMMARY"),
        ev_completed("r3"),
    ]);
    session.compact(CancellationToken::new()).await.unwrap();

    let summary_prefix = builtin_prompt(PromptKey::CompactSummaryPrefix);
    let history = session.history();
    let summaries: Vec<&str> = history
        .iter()
        .filter_map(message_text)
        .filter(|text| text.starts_with(summary_prefix.as_str()))
        .collect();
    assert_eq!(
        summaries,
        vec![format!("{summary_prefix}\nSECOND_SUMMARY").as_str()]
    );
    assert_eq!(history.last(), Some(&user_message(summaries[0])));
    assert!(history.contains(&user_message("hello world")));
}

#[tokio::test]
async fn compaction_uses_the_catalog_prompts() {
    let cwd = TempDir::new().unwrap();
    let client = Arc::new(ScriptedModelClient::new());
    let prompts = PromptCatalog::builtin()
        .with_prompt(PromptKey::CompactPrompt, "Summarize please.")
        .with_prompt(PromptKey::CompactSummaryPrefix, "Earlier:");
    let mut session = new_session(cwd.path(), &client, prompts);

    client.push_response(vec![ev_completed("r1")]);
    session.compact(CancellationToken::new()).await.unwrap();

    assert_eq!(
        client.prompts()[0].input.last(),
        Some(&user_message("Summarize please."))
    );
    // No assistant message: the summary is just the prefix line.
    assert_eq!(session.history().last(), Some(&user_message("Earlier:\n")));
}

#[tokio::test]
async fn remote_compaction_replaces_history_with_adapter_output() {
    let cwd = TempDir::new().unwrap();
    let compacted = vec![
        user_message("hello world"),
        ResponseItem::Compaction {
            encrypted_content: "opaque".to_string(),
        },
    ];
    let client = Arc::new(
        ScriptedModelClient::new()
            .with_capabilities(ModelCapabilities {
                supports_remote_compaction: true,
                ..Default::default()
            })
            .with_compact_result(compacted.clone()),
    );
    let mut session = new_session(cwd.path(), &client, PromptCatalog::builtin());
    run_simple_turn(&mut session, &client, "hello world").await;

    session.compact(CancellationToken::new()).await.unwrap();

    assert_eq!(client.prompts().len(), 1);
    let compact_prompts = client.compact_prompts();
    assert_eq!(compact_prompts.len(), 1);
    assert!(compact_prompts[0].tools.is_empty());
    assert_eq!(
        compact_prompts[0].input.last(),
        Some(&assistant_message("m1", FIRST_REPLY))
    );
    assert_eq!(session.history(), compacted);
}

#[tokio::test]
async fn remote_compaction_failure_keeps_history() {
    let cwd = TempDir::new().unwrap();
    let client = Arc::new(ScriptedModelClient::new().with_capabilities(ModelCapabilities {
        supports_remote_compaction: true,
        ..Default::default()
    }));
    let mut session = new_session(cwd.path(), &client, PromptCatalog::builtin());
    run_simple_turn(&mut session, &client, "hello world").await;
    let before = session.history();

    let err = session.compact(CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, CodicilErr::Stream(_)), "{err:?}");
    assert_eq!(session.history(), before);
}

#[tokio::test]
async fn cancelled_compaction_leaves_history_unreplaced() {
    let cwd = TempDir::new().unwrap();
    let client = Arc::new(ScriptedModelClient::new());
    let mut session = new_session(cwd.path(), &client, PromptCatalog::builtin());
    run_simple_turn(&mut session, &client, "hello world").await;
    let before = session.history();

    client.push_stalled();
    let cancel = CancellationToken::new();
    cancel.cancel();
    session.compact(cancel).await.unwrap();

    let mut expected = before;
    expected.push(user_message(&builtin_prompt(PromptKey::CompactPrompt)));
    assert_eq!(session.history(), expected);
}
