//! Telegram chat transport
//!
//! The collector only talks to the [`ChatTransport`] trait so the
//! conversation logic can run against a scripted transport in tests.

pub mod client;
pub mod types;

use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

pub use client::TelegramClient;
pub use types::{FileAttachment, Message, PhotoSize, ReplyKeyboard, Update, User};

/// Errors raised by a chat transport
#[derive(thiserror::Error, Debug)]
pub enum TransportError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Telegram API error {code:?}: {description}")]
    Api {
        code: Option<i64>,
        description: String,
    },

    #[error("Telegram returned no result for {0}")]
    EmptyResult(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the collector needs from a chat service
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a message (HTML parse mode) with an optional reply keyboard
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TransportError>;

    /// Fetch updates with `update_id >= offset`, long-polling up to `wait`.
    /// An offset of `-1` asks for the newest pending update only.
    async fn get_updates(&self, offset: i64, wait: Duration) -> Result<Vec<Update>, TransportError>;

    /// Resolve a file id into a remote path usable with [`ChatTransport::download_file`]
    async fn get_file(&self, file_id: &str) -> Result<String, TransportError>;

    /// Download a remote file to `dest`, returning the number of bytes written
    async fn download_file(&self, remote_path: &str, dest: &Path) -> Result<u64, TransportError>;
}

/// Escape user supplied text for HTML parse mode
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '&' => escaped.push_str("&amp;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(escape_html("D-Day <1944> & after"), "D-Day &lt;1944&gt; &amp; after");
        assert_eq!(escape_html("plain"), "plain");
    }
}
