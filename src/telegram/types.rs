//! Bot API payloads
//!
//! Only the fields the collector and the request bot read are modelled;
//! everything else in Telegram's JSON is ignored by serde.

use serde::{Deserialize, Serialize};

/// Envelope every Bot API method answers with
#[derive(Debug, Clone, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub description: Option<String>,
    pub error_code: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Update {
    pub update_id: i64,
    #[serde(default)]
    pub message: Option<Message>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Message {
    #[serde(default)]
    pub message_id: i64,
    pub chat: Chat,
    #[serde(default)]
    pub date: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
    /// Available sizes of a photo, smallest first
    #[serde(default)]
    pub photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    pub video: Option<FileAttachment>,
    #[serde(default)]
    pub audio: Option<FileAttachment>,
    #[serde(default)]
    pub document: Option<FileAttachment>,
}

impl Message {
    /// Plain text message
    pub fn text(chat_id: i64, text: &str) -> Self {
        Self {
            chat: Chat { id: chat_id },
            text: Some(text.to_string()),
            ..Default::default()
        }
    }

    /// Trimmed text body, if the message has a non-empty one
    pub fn trimmed_text(&self) -> Option<&str> {
        self.text
            .as_deref()
            .map(str::trim)
            .filter(|text| !text.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PhotoSize {
    pub file_id: String,
    #[serde(default)]
    pub width: u32,
    #[serde(default)]
    pub height: u32,
    #[serde(default)]
    pub file_size: Option<u64>,
}

/// Shared shape of `video`, `audio` and `document` payloads
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct FileAttachment {
    pub file_id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct File {
    pub file_id: String,
    #[serde(default)]
    pub file_path: Option<String>,
    #[serde(default)]
    pub file_size: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub first_name: String,
    #[serde(default)]
    pub username: Option<String>,
}

/// Custom reply keyboard shown under the input field
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReplyKeyboard {
    pub keyboard: Vec<Vec<KeyboardButton>>,
    pub resize_keyboard: bool,
    pub one_time_keyboard: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct KeyboardButton {
    pub text: String,
}

impl ReplyKeyboard {
    /// One row of buttons that disappears after use
    pub fn single_row(labels: &[&str]) -> Self {
        Self {
            keyboard: vec![labels
                .iter()
                .map(|label| KeyboardButton { text: label.to_string() })
                .collect()],
            resize_keyboard: true,
            one_time_keyboard: true,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct SendMessageRequest<'a> {
    pub chat_id: i64,
    pub text: &'a str,
    pub parse_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<&'a ReplyKeyboard>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_with_photo_deserializes() {
        let raw = r#"{
            "update_id": 42,
            "message": {
                "message_id": 7,
                "date": 1700000000,
                "chat": {"id": 1234, "type": "private"},
                "photo": [
                    {"file_id": "small", "width": 90, "height": 60},
                    {"file_id": "large", "width": 1280, "height": 720, "file_size": 90000}
                ]
            }
        }"#;

        let update: Update = serde_json::from_str(raw).unwrap();
        let message = update.message.unwrap();
        assert_eq!(update.update_id, 42);
        assert_eq!(message.chat.id, 1234);
        assert_eq!(message.photo.unwrap().last().unwrap().file_id, "large");
        assert!(message.text.is_none());
    }

    #[test]
    fn test_update_without_message() {
        let raw = r#"{"update_id": 9, "edited_message": {"chat": {"id": 1}}}"#;
        let update: Update = serde_json::from_str(raw).unwrap();
        assert!(update.message.is_none());
    }

    #[test]
    fn test_trimmed_text_ignores_blank() {
        assert_eq!(Message::text(1, "  hi  ").trimmed_text(), Some("hi"));
        assert_eq!(Message::text(1, "   ").trimmed_text(), None);
    }
}
