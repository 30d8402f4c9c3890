use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::config::VideoConfig;

/// Audio information reported by ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub path: PathBuf,
    pub duration: Duration,
    pub sample_rate: Option<u32>,
    pub channels: u32,
    pub format: String,
    pub file_size: u64,
}

/// Position of one narration segment inside the full narration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentSpan {
    /// 1-based, as shown to the operator
    pub index: usize,
    pub start: Duration,
    pub duration: Duration,
}

impl SegmentSpan {
    pub fn end(&self) -> Duration {
        self.start + self.duration
    }
}

/// A narration segment written to disk
#[derive(Debug, Clone)]
pub struct AudioSegment {
    pub span: SegmentSpan,
    pub path: PathBuf,
}

/// Cut `total` into consecutive spans of `segment_len`; the last one
/// carries the remainder.
pub fn plan_segments(total: Duration, segment_len: Duration) -> Vec<SegmentSpan> {
    let total_ms = total.as_millis() as u64;
    let segment_ms = segment_len.as_millis() as u64;
    if total_ms == 0 || segment_ms == 0 {
        return Vec::new();
    }

    let count = total_ms.div_ceil(segment_ms);
    (0..count)
        .map(|i| {
            let start = i * segment_ms;
            let end = (start + segment_ms).min(total_ms);
            SegmentSpan {
                index: i as usize + 1,
                start: Duration::from_millis(start),
                duration: Duration::from_millis(end - start),
            }
        })
        .collect()
}

/// ffmpeg/ffprobe wrapper for narration audio
#[derive(Clone)]
pub struct AudioProcessor {
    ffmpeg: String,
    ffprobe: String,
}

impl AudioProcessor {
    pub fn new(config: &VideoConfig) -> Self {
        Self {
            ffmpeg: config.ffmpeg.clone(),
            ffprobe: config.ffprobe.clone(),
        }
    }

    /// Get detailed audio information
    pub async fn get_audio_info(&self, audio_path: &Path) -> Result<AudioInfo> {
        let output = tokio::process::Command::new(&self.ffprobe)
            .args(["-v", "quiet", "-print_format", "json", "-show_format", "-show_streams"])
            .args(["-select_streams", "a:0"])
            .arg(audio_path)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.ffprobe))?;

        if !output.status.success() {
            return Err(anyhow!("ffprobe failed for {}", audio_path.display()));
        }

        let ffprobe_data: serde_json::Value = serde_json::from_slice(&output.stdout)?;
        let format = &ffprobe_data["format"];
        let audio_stream = ffprobe_data["streams"]
            .as_array()
            .and_then(|streams| streams.first())
            .ok_or_else(|| anyhow!("No audio stream found in {}", audio_path.display()))?;

        let duration_seconds: f64 = format["duration"]
            .as_str()
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| anyhow!("Unknown duration for {}", audio_path.display()))?;

        let file_size = tokio::fs::metadata(audio_path).await?.len();

        Ok(AudioInfo {
            path: audio_path.to_path_buf(),
            duration: Duration::from_secs_f64(duration_seconds.max(0.0)),
            sample_rate: audio_stream["sample_rate"].as_str().and_then(|s| s.parse().ok()),
            channels: audio_stream["channels"].as_u64().unwrap_or(1) as u32,
            format: audio_stream["codec_name"].as_str().unwrap_or("unknown").to_string(),
            file_size,
        })
    }

    pub async fn duration(&self, audio_path: &Path) -> Result<Duration> {
        Ok(self.get_audio_info(audio_path).await?.duration)
    }

    /// Split narration into fixed-length mp3 segments named
    /// `<stem>_segment_NNN.mp3` under `output_dir`
    pub async fn split(
        &self,
        audio: &AudioInfo,
        segment_len: Duration,
        output_dir: &Path,
        stem: &str,
    ) -> Result<Vec<AudioSegment>> {
        let spans = plan_segments(audio.duration, segment_len);
        if spans.is_empty() {
            return Err(anyhow!("Narration {} is empty", audio.path.display()));
        }

        tokio::fs::create_dir_all(output_dir).await?;
        info!(
            "✂️ Splitting {:.1}s of narration into {} segments of {:.0}s",
            audio.duration.as_secs_f64(),
            spans.len(),
            segment_len.as_secs_f64()
        );

        let mut segments = Vec::with_capacity(spans.len());
        for span in spans {
            let path = output_dir.join(format!("{}_segment_{:03}.mp3", stem, span.index));

            let status = tokio::process::Command::new(&self.ffmpeg)
                .args(["-v", "error", "-y"])
                .arg("-ss")
                .arg(format!("{:.3}", span.start.as_secs_f64()))
                .arg("-t")
                .arg(format!("{:.3}", span.duration.as_secs_f64()))
                .arg("-i")
                .arg(&audio.path)
                .args(["-acodec", "libmp3lame"])
                .arg(&path)
                .status()
                .await?;

            if !status.success() {
                return Err(anyhow!("Failed to cut segment {} of {}", span.index, audio.path.display()));
            }

            debug!("  ✅ Segment {}: {:.1}s", span.index, span.duration.as_secs_f64());
            segments.push(AudioSegment { span, path });
        }

        Ok(segments)
    }

    /// Remove files under `dir` whose name starts with `prefix`
    pub async fn cleanup(&self, dir: &Path, prefix: &str) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let mut cleaned_files = 0;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let matches = path
                .file_name()
                .map_or(false, |name| name.to_string_lossy().starts_with(prefix));
            if !matches {
                continue;
            }
            if let Err(e) = tokio::fs::remove_file(&path).await {
                warn!("Failed to remove temp file {}: {}", path.display(), e);
            } else {
                cleaned_files += 1;
            }
        }

        if cleaned_files > 0 {
            info!("🧹 Cleaned up {} temporary audio files", cleaned_files);
        }
        Ok(cleaned_files)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_plan_segments_with_remainder() {
        let spans = plan_segments(Duration::from_millis(75_500), Duration::from_secs(30));
        assert_eq!(spans.len(), 3);
        assert_eq!(spans[0].index, 1);
        assert_eq!(spans[1].start, Duration::from_secs(30));
        assert_eq!(spans[2].duration, Duration::from_millis(15_500));
        assert_eq!(spans[2].end(), Duration::from_millis(75_500));
    }

    #[test]
    fn test_plan_segments_exact_multiple() {
        let spans = plan_segments(Duration::from_secs(60), Duration::from_secs(30));
        assert_eq!(spans.len(), 2);
        assert!(spans.iter().all(|span| span.duration == Duration::from_secs(30)));
    }

    #[test]
    fn test_plan_segments_empty() {
        assert!(plan_segments(Duration::ZERO, Duration::from_secs(30)).is_empty());
        assert!(plan_segments(Duration::from_secs(10), Duration::ZERO).is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_by_prefix() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join("video_1_segment_001.mp3"), b"a").unwrap();
        std::fs::write(temp_dir.path().join("video_1_full_audio.mp3"), b"a").unwrap();
        std::fs::write(temp_dir.path().join("video_2_segment_001.mp3"), b"a").unwrap();

        let processor = AudioProcessor::new(&VideoConfig::default());
        let removed = processor.cleanup(temp_dir.path(), "video_1_").await.unwrap();
        assert_eq!(removed, 2);
        assert!(temp_dir.path().join("video_2_segment_001.mp3").exists());

        let missing = temp_dir.path().join("missing");
        assert_eq!(processor.cleanup(&missing, "x").await.unwrap(), 0);
    }
}
