use serde::Deserialize;
use serde::Serialize;

use crate::models::ContentItem;
use crate::models::ResponseInputItem;

/// User input
#[non_exhaustive]
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum UserInput {
    Text {
        text: String,
    },
    /// Pre‑encoded data: URI image.
    Image {
        image_url: String,
    },
}

impl From<Vec<UserInput>> for ResponseInputItem {
    fn from(items: Vec<UserInput>) -> Self {
        Self::Message {
            role: "user".to_string(),
            content: items
                .into_iter()
                .map(|input| match input {
                    UserInput::Text { text } => ContentItem::InputText { text },
                    UserInput::Image { image_url } => ContentItem::InputImage { image_url },
                })
                .collect(),
        }
    }
}
