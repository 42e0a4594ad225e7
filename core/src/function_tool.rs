use thiserror::Error;

/// Internal error type of the tool handlers. It never leaves the executor:
/// every variant is turned into a non-success tool result for the model.
#[derive(Debug, Error, PartialEq)]
pub enum FunctionCallError {
    #[error("{0}")]
    RespondToModel(String),
    #[error("Unknown tool: {0}")]
    UnknownTool(String),
}
