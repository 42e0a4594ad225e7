use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodicilErr>;

/// Errors that end a turn. Tool failures never show up here: they are
/// reported to the model as ordinary call output.
#[derive(Error, Debug)]
pub enum CodicilErr {
    /// The model adapter reported a failure while streaming.
    #[error("stream error: {0}")]
    Stream(String),

    /// The model completed the response with a failure status.
    #[error("response failed ({code}): {message}")]
    ResponseFailed { code: String, message: String },

    /// The event stream closed before a `completed` event arrived.
    #[error("stream closed before response.completed")]
    UnexpectedStreamEnd,

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),
}
