use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Persisted record that halts every further field request
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CancellationMarker {
    pub cancelled: bool,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

/// Location of the cancellation marker on disk.
///
/// Presence of the file means "cancelled"; its content is informational.
#[derive(Debug, Clone)]
pub struct MarkerStore {
    path: PathBuf,
}

impl MarkerStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Write the marker atomically (temp file + rename in the same directory)
    pub fn write(&self, reason: &str) -> Result<CancellationMarker> {
        let marker = CancellationMarker {
            cancelled: true,
            timestamp: Utc::now(),
            reason: reason.to_string(),
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Cannot create marker directory {}", dir.display()))?;

        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        temp.write_all(serde_json::to_string_pretty(&marker)?.as_bytes())?;
        temp.persist(&self.path)
            .with_context(|| format!("Cannot persist marker at {}", self.path.display()))?;

        info!("🛑 Cancellation marker written: {}", self.path.display());
        Ok(marker)
    }

    pub fn read(&self) -> Result<Option<CancellationMarker>> {
        if !self.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Remove a previous marker; absent markers are fine
    pub fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                debug!("Cleared previous cancellation marker");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
