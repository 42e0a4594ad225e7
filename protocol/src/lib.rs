pub mod config_types;
pub mod conversation_id;
pub mod models;
pub mod protocol;
pub mod user_input;

pub use conversation_id::ConversationId;
