//! Interactive collection over a chat transport
//!
//! A [`Session`] drives a strictly turn-based conversation: one
//! [`FieldRequest`] at a time, each resolving to a [`FieldOutcome`].
//! Cancellation is a regular outcome variant that callers propagate, backed
//! by a persisted marker so other runs observe it too.

pub mod attachment;
pub mod commands;
pub mod interview;
pub mod marker;
pub mod reminder;
pub mod request;
pub mod session;

use std::path::PathBuf;

pub use attachment::{Attachment, MediaKind};
pub use commands::Command;
pub use interview::{collect_production, InterviewOutcome};
pub use marker::{CancellationMarker, MarkerStore};
pub use request::{Expect, FieldRequest};
pub use session::{Session, SessionSettings};

/// A downloaded attachment
#[derive(Debug, Clone, PartialEq)]
pub struct MediaFile {
    pub path: PathBuf,
    pub kind: MediaKind,
}

/// Resolved value of a received field
#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Tags(Vec<String>),
    Media(MediaFile),
}

impl Answer {
    /// Short HTML-safe rendering for confirmation notices
    pub fn preview(&self) -> String {
        match self {
            Answer::Text(text) => {
                let mut preview: String = text.chars().take(100).collect();
                if text.chars().count() > 100 {
                    preview.push_str("...");
                }
                crate::telegram::escape_html(&preview)
            }
            Answer::Tags(tags) => format!("{} tags", tags.len()),
            Answer::Media(media) => format!("{} file", media.kind),
        }
    }
}

/// Terminal state of a field request
#[derive(Debug, Clone, PartialEq)]
pub enum FieldOutcome {
    Received(Answer),
    Skipped,
    TimedOut,
    Cancelled,
}

impl FieldOutcome {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FieldOutcome::Cancelled)
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            FieldOutcome::Received(Answer::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn into_tags(self) -> Option<Vec<String>> {
        match self {
            FieldOutcome::Received(Answer::Tags(tags)) => Some(tags),
            _ => None,
        }
    }

    pub fn into_media(self) -> Option<MediaFile> {
        match self {
            FieldOutcome::Received(Answer::Media(media)) => Some(media),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preview_truncates_and_escapes() {
        let long = "a".repeat(150);
        assert_eq!(Answer::Text(long).preview().len(), 103);
        assert_eq!(Answer::Text("<b>".into()).preview(), "&lt;b&gt;");
        assert_eq!(Answer::Tags(vec!["a".into(), "b".into()]).preview(), "2 tags");
    }

    #[test]
    fn test_outcome_accessors() {
        let outcome = FieldOutcome::Received(Answer::Text("Title".into()));
        assert_eq!(outcome.clone().into_text().as_deref(), Some("Title"));
        assert!(outcome.into_tags().is_none());
        assert!(FieldOutcome::Cancelled.is_cancelled());
        assert!(FieldOutcome::TimedOut.into_media().is_none());
    }
}
