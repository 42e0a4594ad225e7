//! Root of the `codicil-core` library.

// Prevent accidental direct writes to stdout/stderr in library code. All
// output must go through the tracing stack or a `SessionLogger`.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod client_common;
pub mod codex;
pub mod config;
mod context_manager;
pub mod environment_context;
pub mod error;
pub mod exec;
pub mod function_tool;
pub mod model_family;
pub mod prompts;
pub mod shell;
pub mod tools;
pub mod truncate;
pub mod user_instructions;

pub use client_common::ModelCapabilities;
pub use client_common::ModelClient;
pub use client_common::Prompt;
pub use client_common::ResponseEvent;
pub use client_common::ResponseStream;
pub use codex::Session;
pub use codex::SessionEvent;
pub use codex::SessionLogger;
pub use codex::TurnContext;
pub use context_manager::ContextManager;
pub use tools::LocalToolExecutor;
pub use tools::ToolCall;
pub use tools::ToolExecutor;
pub use tools::ToolResult;
