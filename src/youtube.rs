//! YouTube Data API v3 client
//!
//! Uploads use the resumable protocol in a single request: the session is
//! opened with the metadata, then the whole file is streamed to the
//! returned location.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::YouTubeConfig;
use crate::production::append_json_log;

/// Longest title the platform accepts
pub const MAX_TITLE_CHARS: usize = 100;

#[derive(thiserror::Error, Debug)]
pub enum UploadError {
    #[error("Invalid YouTube credentials: {0}")]
    Credentials(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("YouTube API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Upload session was not opened: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl UploadError {
    /// Channel not allowed to perform the call, e.g. unverified custom thumbnails
    pub fn is_permission_denied(&self) -> bool {
        match self {
            UploadError::Api { status: 403, .. } => true,
            other => {
                let message = other.to_string().to_lowercase();
                message.contains("forbidden") || message.contains("permission")
            }
        }
    }
}

/// Authorized-user credentials as exported by the OAuth flow
#[derive(Debug, Clone, Deserialize)]
pub struct YouTubeCredentials {
    pub token: String,
    pub refresh_token: String,
    pub client_id: String,
    pub client_secret: String,
}

impl YouTubeCredentials {
    pub const REQUIRED_KEYS: [&'static str; 4] = ["token", "refresh_token", "client_id", "client_secret"];

    pub fn parse(json: &str) -> Result<Self, UploadError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| UploadError::Credentials(e.to_string()))?;

        let missing = Self::missing_keys(&value);
        if !missing.is_empty() {
            return Err(UploadError::Credentials(format!("missing keys: {}", missing.join(", "))));
        }

        serde_json::from_value(value).map_err(|e| UploadError::Credentials(e.to_string()))
    }

    /// Required keys absent from a credentials document
    pub fn missing_keys(value: &serde_json::Value) -> Vec<&'static str> {
        Self::REQUIRED_KEYS
            .iter()
            .copied()
            .filter(|key| value.get(*key).and_then(|v| v.as_str()).is_none())
            .collect()
    }
}

/// Snippet and status of an uploaded video
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub category_id: String,
    pub privacy_status: String,
}

impl VideoMetadata {
    /// Title is cut to [`MAX_TITLE_CHARS`]
    pub fn new(title: &str, description: &str, tags: &[String], config: &YouTubeConfig) -> Self {
        Self {
            title: title.chars().take(MAX_TITLE_CHARS).collect(),
            description: description.to_string(),
            tags: tags.to_vec(),
            category_id: config.category_id.clone(),
            privacy_status: config.privacy_status.clone(),
        }
    }

    pub fn request_body(&self) -> serde_json::Value {
        serde_json::json!({
            "snippet": {
                "title": self.title,
                "description": self.description,
                "tags": self.tags,
                "categoryId": self.category_id,
            },
            "status": {
                "privacyStatus": self.privacy_status,
                "selfDeclaredMadeForKids": false,
            }
        })
    }
}

pub fn watch_url(video_id: &str) -> String {
    format!("https://www.youtube.com/watch?v={}", video_id)
}

pub fn shorts_url(video_id: &str) -> String {
    format!("https://youtube.com/shorts/{}", video_id)
}

pub fn studio_url(video_id: &str) -> String {
    format!("https://studio.youtube.com/video/{}/edit", video_id)
}

/// Thumbnail waiting for a manual upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingThumbnail {
    pub video_id: String,
    pub video_url: String,
    pub thumbnail_path: PathBuf,
    pub upload_url: String,
    pub timestamp: DateTime<Utc>,
}

impl PendingThumbnail {
    pub fn new(video_id: &str, video_url: &str, thumbnail_path: &Path) -> Self {
        Self {
            video_id: video_id.to_string(),
            video_url: video_url.to_string(),
            thumbnail_path: thumbnail_path.to_path_buf(),
            upload_url: studio_url(video_id),
            timestamp: Utc::now(),
        }
    }

    pub async fn append_to(&self, log: &Path) -> anyhow::Result<()> {
        append_json_log(log, self).await
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct UploadedVideo {
    id: String,
}

fn content_type_for(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("mp4") => "video/mp4",
        Some("mov") => "video/quicktime",
        _ => "application/octet-stream",
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, UploadError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|value| value["error"]["message"].as_str().map(str::to_string))
        .unwrap_or(body);

    Err(UploadError::Api {
        status: status.as_u16(),
        message,
    })
}

/// Upload client bound to one set of credentials
pub struct YouTubeUploader {
    credentials: YouTubeCredentials,
    config: YouTubeConfig,
    client: reqwest::Client,
}

impl YouTubeUploader {
    pub fn new(config: &YouTubeConfig) -> Result<Self, UploadError> {
        let json = config
            .credentials
            .as_deref()
            .ok_or_else(|| UploadError::Credentials("YOUTUBE_CREDENTIALS is not configured".to_string()))?;
        let credentials = YouTubeCredentials::parse(json)?;

        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            credentials,
            config: config.clone(),
            client,
        })
    }

    /// Exchange the refresh token for a fresh access token
    async fn access_token(&self) -> Result<String, UploadError> {
        let response = self
            .client
            .post(&self.config.token_uri)
            .form(&[
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
                ("refresh_token", self.credentials.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .timeout(Duration::from_secs(30))
            .send()
            .await;

        match response {
            Ok(response) => {
                let token: TokenResponse = check_status(response).await?.json().await?;
                debug!("Refreshed YouTube access token");
                Ok(token.access_token)
            }
            Err(e) => {
                warn!("⚠️ Token refresh failed, using stored access token: {}", e);
                Ok(self.credentials.token.clone())
            }
        }
    }

    /// Upload `video` and return the new video id
    pub async fn upload(&self, video: &Path, metadata: &VideoMetadata) -> Result<String, UploadError> {
        let size = tokio::fs::metadata(video).await?.len();
        let token = self.access_token().await?;

        info!("📤 Uploading {} ({:.1} MB)", video.display(), size as f64 / 1_048_576.0);

        let response = self
            .client
            .post(format!("{}/videos", self.config.upload_base))
            .query(&[("uploadType", "resumable"), ("part", "snippet,status")])
            .bearer_auth(&token)
            .header("X-Upload-Content-Type", content_type_for(video))
            .header("X-Upload-Content-Length", size)
            .json(&metadata.request_body())
            .timeout(Duration::from_secs(60))
            .send()
            .await?;

        let response = check_status(response).await?;
        let location = response
            .headers()
            .get(reqwest::header::LOCATION)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| UploadError::Session("no Location header".to_string()))?;

        let file = tokio::fs::File::open(video).await?;
        let response = self
            .client
            .put(&location)
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(video))
            .header(reqwest::header::CONTENT_LENGTH, size)
            .body(reqwest::Body::from(file))
            .timeout(Duration::from_secs(self.config.upload_timeout_secs))
            .send()
            .await?;

        let uploaded: UploadedVideo = check_status(response).await?.json().await?;
        info!("✅ Video uploaded successfully: {}", watch_url(&uploaded.id));
        Ok(uploaded.id)
    }

    pub async fn set_thumbnail(&self, video_id: &str, thumbnail: &Path) -> Result<(), UploadError> {
        let bytes = tokio::fs::read(thumbnail).await?;
        let token = self.access_token().await?;

        info!("🖼️ Uploading custom thumbnail...");
        let response = self
            .client
            .post(format!("{}/thumbnails/set", self.config.upload_base))
            .query(&[("videoId", video_id)])
            .bearer_auth(&token)
            .header(reqwest::header::CONTENT_TYPE, content_type_for(thumbnail))
            .body(bytes)
            .timeout(Duration::from_secs(120))
            .send()
            .await?;

        check_status(response).await?;
        info!("✅ Thumbnail uploaded!");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const CREDENTIALS: &str = r#"{
        "token": "ya29.token",
        "refresh_token": "1//refresh",
        "client_id": "id.apps.googleusercontent.com",
        "client_secret": "secret",
        "scopes": ["https://www.googleapis.com/auth/youtube.upload"]
    }"#;

    #[test]
    fn test_parse_credentials() {
        let credentials = YouTubeCredentials::parse(CREDENTIALS).unwrap();
        assert_eq!(credentials.refresh_token, "1//refresh");

        let err = YouTubeCredentials::parse(r#"{"token": "t", "client_id": "c"}"#).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("refresh_token"));
        assert!(message.contains("client_secret"));

        assert!(YouTubeCredentials::parse("not json").is_err());
    }

    #[test]
    fn test_metadata_truncates_title() {
        let title = "é".repeat(130);
        let metadata = VideoMetadata::new(&title, "desc", &["WWII".to_string()], &YouTubeConfig::default());
        assert_eq!(metadata.title.chars().count(), MAX_TITLE_CHARS);

        let body = metadata.request_body();
        assert_eq!(body["snippet"]["categoryId"], "22");
        assert_eq!(body["status"]["privacyStatus"], "public");
        assert_eq!(body["status"]["selfDeclaredMadeForKids"], false);
        assert_eq!(body["snippet"]["tags"][0], "WWII");
    }

    #[test]
    fn test_permission_detection() {
        let denied = UploadError::Api {
            status: 403,
            message: "The authenticated user doesn't have permissions to upload and set custom video thumbnails.".into(),
        };
        assert!(denied.is_permission_denied());

        let forbidden = UploadError::Session("Forbidden".into());
        assert!(forbidden.is_permission_denied());

        let other = UploadError::Api {
            status: 400,
            message: "mediaBodyRequired".into(),
        };
        assert!(!other.is_permission_denied());
    }

    #[test]
    fn test_urls() {
        assert_eq!(watch_url("abc"), "https://www.youtube.com/watch?v=abc");
        assert_eq!(shorts_url("abc"), "https://youtube.com/shorts/abc");
        assert_eq!(studio_url("abc"), "https://studio.youtube.com/video/abc/edit");
    }

    #[tokio::test]
    async fn test_pending_thumbnail_log_appends() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("output").join("pending_thumbnails.json");

        PendingThumbnail::new("a1", &watch_url("a1"), Path::new("thumb.jpg"))
            .append_to(&log)
            .await
            .unwrap();
        PendingThumbnail::new("b2", &watch_url("b2"), Path::new("thumb.png"))
            .append_to(&log)
            .await
            .unwrap();

        let entries: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&log).unwrap()).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1]["upload_url"], "https://studio.youtube.com/video/b2/edit");
        assert_eq!(entries[0]["thumbnail_path"], "thumb.jpg");
    }
}
