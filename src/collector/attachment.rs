use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

use crate::telegram::{FileAttachment, Message};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
            MediaKind::Audio => write!(f, "audio"),
        }
    }
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "gif", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv", "webm", "m4v"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "m4a", "wav", "ogg", "oga", "aac", "flac"];

impl MediaKind {
    fn from_mime(mime: &str) -> Option<Self> {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            Some(MediaKind::Image)
        } else if mime.starts_with("video/") {
            Some(MediaKind::Video)
        } else if mime.starts_with("audio/") {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    pub fn from_extension(extension: &str) -> Option<Self> {
        let extension = extension.to_ascii_lowercase();
        if IMAGE_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Image)
        } else if VIDEO_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Video)
        } else if AUDIO_EXTENSIONS.contains(&extension.as_str()) {
            Some(MediaKind::Audio)
        } else {
            None
        }
    }

    fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Image => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
        }
    }
}

/// A downloadable attachment recognised in a message
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub file_id: String,
    pub kind: MediaKind,
    /// File extension to save under, without the dot
    pub extension: String,
}

fn name_extension(file: &FileAttachment) -> Option<String> {
    file.file_name
        .as_deref()
        .and_then(|name| Path::new(name).extension())
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
}

fn mime_extension(mime: &str) -> Option<String> {
    let subtype = mime.split('/').nth(1)?.split(';').next()?.trim().to_ascii_lowercase();
    let extension = match subtype.as_str() {
        "jpeg" | "pjpeg" => "jpg",
        "mpeg" => "mp3",
        "mp4a-latm" | "x-m4a" | "m4a" => "m4a",
        "quicktime" => "mov",
        "x-matroska" => "mkv",
        "x-msvideo" => "avi",
        "x-wav" | "wave" => "wav",
        "" => return None,
        other => other,
    };
    Some(extension.to_string())
}

fn from_file(file: &FileAttachment, kind: MediaKind) -> Attachment {
    let extension = name_extension(file)
        .filter(|ext| MediaKind::from_extension(ext) == Some(kind))
        .or_else(|| file.mime_type.as_deref().and_then(mime_extension))
        .unwrap_or_else(|| kind.default_extension().to_string());

    Attachment {
        file_id: file.file_id.clone(),
        kind,
        extension,
    }
}

/// Recognise the attachment of a message.
///
/// Photos, videos and audio use Telegram's own categorisation. Documents
/// are classified by MIME type first, then by filename suffix; anything
/// else is not a usable attachment.
pub fn classify(message: &Message) -> Option<Attachment> {
    if let Some(largest) = message.photo.as_ref().and_then(|sizes| sizes.last()) {
        return Some(Attachment {
            file_id: largest.file_id.clone(),
            kind: MediaKind::Image,
            extension: "jpg".to_string(),
        });
    }

    if let Some(video) = &message.video {
        return Some(from_file(video, MediaKind::Video));
    }

    if let Some(audio) = &message.audio {
        return Some(from_file(audio, MediaKind::Audio));
    }

    let document = message.document.as_ref()?;
    let kind = document
        .mime_type
        .as_deref()
        .and_then(MediaKind::from_mime)
        .or_else(|| name_extension(document).and_then(|ext| MediaKind::from_extension(&ext)))?;

    Some(from_file(document, kind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telegram::PhotoSize;
    use crate::telegram::types::Chat;

    fn document(mime: Option<&str>, name: Option<&str>) -> Message {
        Message {
            chat: Chat { id: 1 },
            document: Some(FileAttachment {
                file_id: "doc".to_string(),
                mime_type: mime.map(str::to_string),
                file_name: name.map(str::to_string),
                file_size: None,
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_photo_uses_largest_size() {
        let message = Message {
            chat: Chat { id: 1 },
            photo: Some(vec![
                PhotoSize { file_id: "thumb".into(), width: 90, height: 90, file_size: None },
                PhotoSize { file_id: "full".into(), width: 1920, height: 1080, file_size: None },
            ]),
            ..Default::default()
        };

        let attachment = classify(&message).unwrap();
        assert_eq!(attachment.file_id, "full");
        assert_eq!(attachment.kind, MediaKind::Image);
        assert_eq!(attachment.extension, "jpg");
    }

    #[test]
    fn test_document_by_mime() {
        let attachment = classify(&document(Some("image/png"), None)).unwrap();
        assert_eq!(attachment.kind, MediaKind::Image);
        assert_eq!(attachment.extension, "png");

        let attachment = classify(&document(Some("audio/mpeg"), Some("march.MP3"))).unwrap();
        assert_eq!(attachment.kind, MediaKind::Audio);
        assert_eq!(attachment.extension, "mp3");

        let attachment = classify(&document(Some("video/quicktime"), None)).unwrap();
        assert_eq!(attachment.kind, MediaKind::Video);
        assert_eq!(attachment.extension, "mov");
    }

    #[test]
    fn test_document_by_suffix() {
        let attachment =
            classify(&document(Some("application/octet-stream"), Some("theme.m4a"))).unwrap();
        assert_eq!(attachment.kind, MediaKind::Audio);
        assert_eq!(attachment.extension, "m4a");
    }

    #[test]
    fn test_unrecognised_document() {
        assert!(classify(&document(Some("application/pdf"), Some("notes.pdf"))).is_none());
        assert!(classify(&document(None, None)).is_none());
        assert!(classify(&Message::text(1, "hello")).is_none());
    }
}
