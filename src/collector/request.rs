use std::path::PathBuf;
use std::time::Duration;

use super::attachment::MediaKind;
use crate::telegram::ReplyKeyboard;

/// What kind of answer a field request waits for
#[derive(Debug, Clone, PartialEq)]
pub enum Expect {
    /// First non-empty text message
    Text,
    /// Text messages accumulated until a terminator keyword
    MultipartText,
    /// Comma separated list
    Tags,
    /// Attachment of one of the accepted kinds, saved as `destination.<ext>`
    Media {
        accept: Vec<MediaKind>,
        destination: PathBuf,
    },
}

/// One solicited input of a collection session
#[derive(Debug, Clone)]
pub struct FieldRequest {
    /// Short human name used in logs and default notices
    pub label: String,
    pub prompt: String,
    pub expect: Expect,
    pub timeout: Duration,
    pub reminder_interval: Duration,
    pub skippable: bool,
    /// Sent on success; `{value}` is replaced with a preview of the answer
    pub received_notice: String,
    pub skipped_notice: String,
    pub timeout_notice: String,
    /// Extra line appended to reminders
    pub reminder_hint: String,
}

impl FieldRequest {
    fn new(label: &str, prompt: &str, expect: Expect) -> Self {
        Self {
            label: label.to_string(),
            prompt: prompt.to_string(),
            expect,
            timeout: Duration::from_secs(600),
            reminder_interval: Duration::from_secs(120),
            skippable: false,
            received_notice: format!("✅ <b>{}</b> received!", label),
            skipped_notice: format!("⏭️ <b>{}</b> skipped.", label),
            timeout_notice: format!("⏰ Timeout waiting for {}.", label),
            reminder_hint: "💡 Use /cancel to cancel the production".to_string(),
        }
    }

    pub fn text(label: &str, prompt: &str) -> Self {
        Self::new(label, prompt, Expect::Text)
    }

    pub fn multipart_text(label: &str, prompt: &str) -> Self {
        Self::new(label, prompt, Expect::MultipartText)
    }

    pub fn tags(label: &str, prompt: &str) -> Self {
        Self::new(label, prompt, Expect::Tags)
    }

    pub fn media(label: &str, prompt: &str, accept: &[MediaKind], destination: PathBuf) -> Self {
        Self::new(
            label,
            prompt,
            Expect::Media {
                accept: accept.to_vec(),
                destination,
            },
        )
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_reminder_interval(mut self, interval: Duration) -> Self {
        self.reminder_interval = interval;
        self
    }

    /// Allow the skip keyword to resolve this request without a payload
    pub fn skippable(mut self) -> Self {
        self.skippable = true;
        self.reminder_hint = "⏭️ Send /skip to continue without it".to_string();
        self
    }

    pub fn on_received(mut self, notice: &str) -> Self {
        self.received_notice = notice.to_string();
        self
    }

    pub fn on_skipped(mut self, notice: &str) -> Self {
        self.skipped_notice = notice.to_string();
        self
    }

    pub fn on_timeout(mut self, notice: &str) -> Self {
        self.timeout_notice = notice.to_string();
        self
    }

    pub fn keyboard(&self) -> Option<ReplyKeyboard> {
        self.skippable
            .then(|| ReplyKeyboard::single_row(&["/skip", "/cancel"]))
    }

    pub fn reminder_text(&self, remaining: Duration) -> String {
        format!(
            "⏳ Still waiting for {}...\n⏰ {} minutes remaining\n\n{}",
            self.label,
            remaining.as_secs() / 60,
            self.reminder_hint
        )
    }
}

/// Split a comma separated answer into trimmed, non-empty tags
pub fn parse_tags(text: &str) -> Vec<String> {
    text.split(',')
        .map(str::trim)
        .filter(|tag| !tag.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_tags() {
        assert_eq!(
            parse_tags("WWII, D-Day,History ,, Normandy "),
            vec!["WWII", "D-Day", "History", "Normandy"]
        );
        assert!(parse_tags(" , ").is_empty());
    }

    #[test]
    fn test_builder_defaults() {
        let request = FieldRequest::text("title", "Send the title");
        assert_eq!(request.timeout, Duration::from_secs(600));
        assert_eq!(request.reminder_interval, Duration::from_secs(120));
        assert!(!request.skippable);
        assert!(request.keyboard().is_none());

        let request = request.skippable().with_timeout(Duration::from_secs(30));
        assert!(request.keyboard().is_some());
        assert_eq!(request.timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_reminder_text_reports_whole_minutes() {
        let request = FieldRequest::text("title", "Send the title");
        let text = request.reminder_text(Duration::from_secs(479));
        assert!(text.contains("7 minutes remaining"));
        assert!(text.contains("/cancel"));
    }
}
