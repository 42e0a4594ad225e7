use codicil_protocol::models::ContentItem;
use codicil_protocol::models::ResponseItem;

pub const USER_INSTRUCTIONS_PREFIX: &str = "# AGENTS.md instructions for ";
pub const USER_INSTRUCTIONS_OPEN_TAG: &str = "<INSTRUCTIONS>";
pub const USER_INSTRUCTIONS_CLOSE_TAG: &str = "</INSTRUCTIONS>";

/// Project instructions supplied by the user, qualified by the directory
/// they apply to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInstructions {
    pub directory: String,
    pub text: String,
}

impl UserInstructions {
    pub fn serialize_to_text(&self) -> String {
        format!(
            "{USER_INSTRUCTIONS_PREFIX}{directory}\n\n{USER_INSTRUCTIONS_OPEN_TAG}\n{contents}\n{USER_INSTRUCTIONS_CLOSE_TAG}",
            directory = self.directory,
            contents = self.text,
        )
    }
}

impl From<UserInstructions> for ResponseItem {
    fn from(ui: UserInstructions) -> Self {
        ResponseItem::Message {
            id: None,
            role: "user".to_string(),
            content: vec![ContentItem::InputText {
                text: ui.serialize_to_text(),
            }],
        }
    }
}

/// Developer instructions are sent as a `developer` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeveloperInstructions {
    text: String,
}

impl DeveloperInstructions {
    pub fn new<T: Into<String>>(text: T) -> Self {
        Self { text: text.into() }
    }
}

impl From<DeveloperInstructions> for ResponseItem {
    fn from(di: DeveloperInstructions) -> Self {
        ResponseItem::Message {
            id: None,
            role: "developer".to_string(),
            content: vec![ContentItem::InputText { text: di.text }],
        }
    }
}
