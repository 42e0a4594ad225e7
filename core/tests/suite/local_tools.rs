use std::time::Duration;
use std::time::Instant;

use codicil_core::LocalToolExecutor;
use codicil_core::ToolCall;
use codicil_core::ToolExecutor;
use codicil_core::ToolResult;
use codicil_protocol::models::FunctionCallOutputPayload;
use pretty_assertions::assert_eq;
use serde_json::Value;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

fn function_call(name: &str, arguments: Value) -> ToolCall {
    ToolCall::Function {
        call_id: "call-1".to_string(),
        name: name.to_string(),
        arguments: arguments.to_string(),
    }
}

async fn run_function(
    executor: &LocalToolExecutor,
    name: &str,
    arguments: Value,
) -> FunctionCallOutputPayload {
    let result = executor
        .execute(function_call(name, arguments), CancellationToken::new())
        .await;
    match result {
        ToolResult::Function { call_id, output } => {
            assert_eq!(call_id, "call-1");
            output
        }
        other => panic!("expected a function result, got {other:?}"),
    }
}

async fn run_custom(executor: &LocalToolExecutor, name: &str, input: &str) -> String {
    let call = ToolCall::Custom {
        call_id: "call-2".to_string(),
        name: name.to_string(),
        input: input.to_string(),
    };
    match executor.execute(call, CancellationToken::new()).await {
        ToolResult::Custom { call_id, output } => {
            assert_eq!(call_id, "call-2");
            output
        }
        other => panic!("expected a custom result, got {other:?}"),
    }
}

fn exec_json(output: &FunctionCallOutputPayload) -> Value {
    serde_json::from_str(&output.content).unwrap()
}

#[tokio::test]
async fn shell_runs_argv_in_base_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::create_dir(dir.path().join("sub")).unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let output = run_function(
        &executor,
        "shell",
        json!({"command": ["pwd"], "workdir": "sub"}),
    )
    .await;

    assert_eq!(output.success, Some(true));
    let parsed = exec_json(&output);
    assert_eq!(parsed["metadata"]["exit_code"], 0);
    let printed = parsed["output"].as_str().unwrap().trim();
    assert!(printed.ends_with("/sub"), "{printed}");
}

#[tokio::test]
async fn shell_rejects_empty_command() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let output = run_function(&executor, "shell", json!({"command": []})).await;

    assert_eq!(
        output,
        FunctionCallOutputPayload::from_text("shell: missing command", false)
    );
}

#[tokio::test]
async fn shell_command_reports_exit_code_and_both_streams() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let output = run_function(
        &executor,
        "shell_command",
        json!({"command": "echo out; echo err 1>&2; exit 3", "login": false}),
    )
    .await;

    assert_eq!(output.success, Some(false));
    let parsed = exec_json(&output);
    assert_eq!(parsed["metadata"]["exit_code"], 3);
    assert_eq!(parsed["output"], "out\nerr\n");
}

#[tokio::test]
async fn shell_command_rejects_blank_command() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let output = run_function(&executor, "shell_command", json!({"command": "  "})).await;

    assert_eq!(
        output,
        FunctionCallOutputPayload::from_text("shell_command: missing command", false)
    );
}

#[tokio::test]
async fn shell_timeout_kills_process() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());
    let started = Instant::now();

    let output = run_function(
        &executor,
        "shell",
        json!({"command": ["sleep", "5"], "timeout_ms": 200}),
    )
    .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(output.success, Some(false));
    assert_eq!(exec_json(&output)["metadata"]["exit_code"], -1);
}

#[tokio::test]
async fn cancellation_kills_process_and_keeps_partial_output() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());
    let cancel = CancellationToken::new();
    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        canceller.cancel();
    });
    let started = Instant::now();

    let result = executor
        .execute(
            function_call(
                "shell_command",
                json!({"command": "echo started; sleep 5", "login": false}),
            ),
            cancel,
        )
        .await;

    assert!(started.elapsed() < Duration::from_secs(4));
    let ToolResult::Function { output, .. } = result else {
        panic!("expected a function result");
    };
    assert_eq!(output.success, Some(false));
    let parsed = exec_json(&output);
    assert_eq!(parsed["metadata"]["exit_code"], -1);
    assert_eq!(parsed["output"], "started\n");
}

#[tokio::test]
async fn freeform_apply_patch_edits_base_dir() {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("keep.txt"), "one\ntwo\n").unwrap();
    let executor = LocalToolExecutor::new(dir.path());
    let patch = "*** Begin Patch\n*** Add File: notes/new.txt\n+hello\n+world\n*** Update File: keep.txt\n@@\n one\n-two\n+three\n*** End Patch";

    let output = run_custom(&executor, "apply_patch", patch).await;

    assert_eq!(output, "Applied patch: added 1, updated 1, deleted 0.");
    assert_eq!(
        std::fs::read_to_string(dir.path().join("notes/new.txt")).unwrap(),
        "hello\nworld"
    );
    assert_eq!(
        std::fs::read_to_string(dir.path().join("keep.txt")).unwrap(),
        "one\nthree\n"
    );
}

#[tokio::test]
async fn freeform_apply_patch_reports_parse_errors() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let output = run_custom(&executor, "apply_patch", "not a patch").await;

    assert_eq!(output, "apply_patch missing Begin Patch header");
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[tokio::test]
async fn json_apply_patch_validates_arguments() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let ToolResult::Function { output, .. } = executor
        .execute(
            ToolCall::Function {
                call_id: "call-1".to_string(),
                name: "apply_patch".to_string(),
                arguments: "{not json".to_string(),
            },
            CancellationToken::new(),
        )
        .await
    else {
        panic!("expected a function result");
    };
    assert_eq!(output.success, Some(false));
    assert!(
        output.content.starts_with("apply_patch invalid arguments: "),
        "{}",
        output.content
    );

    let missing = run_function(&executor, "apply_patch", json!({"input": " "})).await;
    assert_eq!(
        missing,
        FunctionCallOutputPayload::from_text("apply_patch missing input", false)
    );

    let applied = run_function(
        &executor,
        "apply_patch",
        json!({"input": "*** Begin Patch\n*** Add File: a.txt\n+a\n*** End Patch"}),
    )
    .await;
    assert_eq!(
        applied,
        FunctionCallOutputPayload::from_text("Applied patch: added 1, updated 0, deleted 0.", true)
    );
}

#[tokio::test]
async fn unsupported_tools_are_reported_to_the_model() {
    let dir = TempDir::new().unwrap();
    let executor = LocalToolExecutor::new(dir.path());

    let view_image = run_function(&executor, "view_image", json!({"path": "a.png"})).await;
    assert_eq!(
        view_image,
        FunctionCallOutputPayload::from_text(
            "view_image is not implemented by the local executor",
            false
        )
    );

    let unknown = run_function(&executor, "grep_files", json!({})).await;
    assert_eq!(
        unknown,
        FunctionCallOutputPayload::from_text("Unknown tool: grep_files", false)
    );

    let custom = run_custom(&executor, "shell", "ls").await;
    assert_eq!(custom, "Custom tool 'shell' not implemented");
}
