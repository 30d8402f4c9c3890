use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};

use crate::collector::MarkerStore;

/// Narration speed used for every duration estimate
pub const WORDS_PER_MINUTE: f64 = 150.0;

const MARKER_FILE: &str = "cancel_flag.json";

/// Lifecycle of a production record
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ProductionStatus {
    /// Requested through the bot, waiting for a production run
    Pending,
    /// All fields gathered by the interview
    Collected,
    Producing,
    Published,
    Cancelled,
    Failed,
}

impl std::fmt::Display for ProductionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ProductionStatus::Pending => "pending",
            ProductionStatus::Collected => "collected",
            ProductionStatus::Producing => "producing",
            ProductionStatus::Published => "published",
            ProductionStatus::Cancelled => "cancelled",
            ProductionStatus::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Everything needed to produce one video
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductionRecord {
    pub video_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chat_id: Option<i64>,

    pub timestamp: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
    pub script: String,
    pub word_count: usize,

    /// Minutes of narration at [`WORDS_PER_MINUTE`]
    pub estimated_duration: f64,

    pub status: ProductionStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl ProductionRecord {
    pub fn new(
        title: String,
        description: String,
        tags: Vec<String>,
        script: String,
        status: ProductionStatus,
    ) -> Self {
        let timestamp = Utc::now();
        let word_count = script.split_whitespace().count();

        Self {
            video_id: format!("video_{}", timestamp.timestamp()),
            chat_id: None,
            timestamp,
            title,
            description,
            tags,
            script,
            word_count,
            estimated_duration: word_count as f64 / WORDS_PER_MINUTE,
            status,
            url: None,
        }
    }

    pub fn with_chat_id(mut self, chat_id: i64) -> Self {
        self.chat_id = Some(chat_id);
        self
    }

    /// Approximate number of 30 second segments
    pub fn estimated_segments(&self) -> usize {
        (self.estimated_duration * 2.0) as usize
    }
}

/// Directory of production records, one pretty JSON file per video.
///
/// The cancellation marker lives in the same directory.
#[derive(Debug, Clone)]
pub struct ProductionStore {
    dir: PathBuf,
}

impl ProductionStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn marker(&self) -> MarkerStore {
        MarkerStore::new(self.dir.join(MARKER_FILE))
    }

    fn record_path(&self, video_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", video_id))
    }

    pub async fn save(&self, record: &ProductionRecord) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Cannot create {}", self.dir.display()))?;

        let path = self.record_path(&record.video_id);
        let json_content = serde_json::to_string_pretty(record)?;
        fs::write(&path, json_content).await?;

        info!("💾 Production saved: {}", path.display());
        Ok(path)
    }

    pub async fn load(&self, video_id: &str) -> Result<ProductionRecord> {
        load_record(&self.record_path(video_id)).await
    }

    /// Latest records first, at most `limit`
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<ProductionRecord>> {
        if !fs::try_exists(&self.dir).await? {
            return Ok(Vec::new());
        }

        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let is_json = path.extension().map_or(false, |ext| ext == "json");
            if !is_json || path.file_name().map_or(false, |name| name == MARKER_FILE) {
                continue;
            }

            match load_record(&path).await {
                Ok(record) => records.push(record),
                Err(e) => warn!("Failed to load production file {}: {}", path.display(), e),
            }
        }

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        records.truncate(limit);
        debug!("📁 Listed {} production records", records.len());
        Ok(records)
    }

    pub async fn update_status(
        &self,
        video_id: &str,
        status: ProductionStatus,
        url: Option<String>,
    ) -> Result<ProductionRecord> {
        let mut record = self.load(video_id).await?;
        record.status = status;
        if url.is_some() {
            record.url = url;
        }
        self.save(&record).await?;
        Ok(record)
    }
}

pub async fn load_record(path: &Path) -> Result<ProductionRecord> {
    let content = fs::read_to_string(path)
        .await
        .with_context(|| format!("Cannot read production file {}", path.display()))?;
    let record = serde_json::from_str(&content)
        .with_context(|| format!("Invalid production file {}", path.display()))?;
    Ok(record)
}

/// Entry of the automatic production upload log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadLogEntry {
    pub timestamp: DateTime<Utc>,
    pub video_type: String,
    pub theme: String,
    pub title: String,
    pub duration_seconds: f64,
    pub video_id: String,
    pub url: String,
}

/// Append `entry` to a JSON array file, creating it when missing.
///
/// An unreadable existing log is replaced rather than failing the run.
pub async fn append_json_log<T: Serialize>(path: &Path, entry: &T) -> Result<()> {
    let mut entries: Vec<serde_json::Value> = match fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
            warn!("Log {} is not a JSON array, starting a new one: {}", path.display(), e);
            Vec::new()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
        Err(e) => return Err(e.into()),
    };

    entries.push(serde_json::to_value(entry)?);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, serde_json::to_string_pretty(&entries)?).await?;

    debug!("📝 Appended entry to {} ({} total)", path.display(), entries.len());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn record(title: &str) -> ProductionRecord {
        ProductionRecord::new(
            title.to_string(),
            "A description".to_string(),
            vec!["WWII".to_string()],
            "one two three four five six".to_string(),
            ProductionStatus::Collected,
        )
    }

    #[test]
    fn test_record_estimates() {
        let mut record = record("Title");
        assert_eq!(record.word_count, 6);
        assert!((record.estimated_duration - 0.04).abs() < 1e-9);

        record.estimated_duration = 2.6;
        assert_eq!(record.estimated_segments(), 5);
        assert!(record.video_id.starts_with("video_"));
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ProductionStatus::Published).unwrap();
        assert_eq!(json, "\"published\"");
    }

    #[tokio::test]
    async fn test_save_load_and_update() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProductionStore::new(temp_dir.path().join("productions"));

        let record = record("D-Day").with_chat_id(42);
        store.save(&record).await.unwrap();

        let loaded = store.load(&record.video_id).await.unwrap();
        assert_eq!(loaded, record);

        let updated = store
            .update_status(&record.video_id, ProductionStatus::Published, Some("https://youtu.be/x".into()))
            .await
            .unwrap();
        assert_eq!(updated.status, ProductionStatus::Published);
        assert_eq!(updated.url.as_deref(), Some("https://youtu.be/x"));
    }

    #[tokio::test]
    async fn test_list_recent_skips_marker_and_orders_newest_first() {
        let temp_dir = TempDir::new().unwrap();
        let store = ProductionStore::new(temp_dir.path().to_path_buf());

        let mut older = record("Older");
        older.video_id = "video_1".into();
        older.timestamp = Utc::now() - chrono::Duration::hours(1);
        let mut newer = record("Newer");
        newer.video_id = "video_2".into();

        store.save(&older).await.unwrap();
        store.save(&newer).await.unwrap();
        store.marker().write("test").unwrap();

        let recent = store.list_recent(5).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].title, "Newer");

        assert_eq!(store.list_recent(1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_append_json_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = temp_dir.path().join("output").join("log.json");

        append_json_log(&log, &serde_json::json!({"n": 1})).await.unwrap();
        append_json_log(&log, &serde_json::json!({"n": 2})).await.unwrap();

        let content: Vec<serde_json::Value> =
            serde_json::from_str(&std::fs::read_to_string(&log).unwrap()).unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content[1]["n"], 2);
    }
}
