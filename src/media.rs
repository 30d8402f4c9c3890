use anyhow::Result;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Clip formats picked up from the stock folder
pub const CLIP_EXTENSIONS: &[&str] = &["mp4", "mov", "avi", "mkv"];

/// Folder of stock clips used by automatic production
#[derive(Debug, Clone)]
pub struct MediaLibrary {
    root: PathBuf,
}

impl MediaLibrary {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every clip directly inside the folder, sorted by name
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        if !self.root.exists() {
            debug!("Clip folder {} does not exist", self.root.display());
            return Ok(Vec::new());
        }

        let mut clips = Vec::new();
        for entry in WalkDir::new(&self.root).max_depth(1).follow_links(true) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let is_clip = entry
                .path()
                .extension()
                .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
                .map_or(false, |ext| CLIP_EXTENSIONS.contains(&ext.as_str()));
            if is_clip {
                clips.push(entry.into_path());
            }
        }

        clips.sort();
        Ok(clips)
    }

    /// Up to `count` distinct clips in random order
    pub fn sample(&self, count: usize) -> Result<Vec<PathBuf>> {
        let mut clips = self.discover()?;
        clips.shuffle(&mut rand::thread_rng());
        clips.truncate(count);

        info!("🎬 Selected {} clips from {}", clips.len(), self.root.display());
        Ok(clips)
    }
}
