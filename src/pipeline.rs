//! Production runs
//!
//! [`VideoProducer`] turns a collected record into a published video while
//! asking the operator for media over chat. [`AutoProducer`] runs
//! unattended from an LLM script and the local clip folder.

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use rand::seq::SliceRandom;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info, warn};

use crate::audio::{AudioProcessor, AudioSegment};
use crate::collector::{FieldOutcome, FieldRequest, MediaFile, MediaKind, Session};
use crate::config::{AutoConfig, Config, VideoType};
use crate::llm::{create_llm, ScriptWriter};
use crate::media::MediaLibrary;
use crate::production::{append_json_log, ProductionRecord, ProductionStatus, ProductionStore, UploadLogEntry};
use crate::telegram::escape_html;
use crate::tts::Narrator;
use crate::video::{RenderProfile, SegmentPlan, VideoAssembler};
use crate::youtube::{self, PendingThumbnail, VideoMetadata, YouTubeUploader};

const DEFAULT_THEME: &str = "superação pessoal";

/// How a production run ended
#[derive(Debug, Clone, PartialEq)]
pub enum ProductionOutcome {
    Published { url: String },
    Cancelled,
}

fn segment_request(config: &Config, video_id: &str, index: usize, total: usize) -> FieldRequest {
    let collection = &config.collection;
    let timeout = Duration::from_secs(collection.segment_media_timeout_secs);
    let destination = config
        .paths
        .media_dir
        .join(format!("{}_segment_{:03}", video_id, index));

    FieldRequest::media(
        &format!("media {}/{}", index, total),
        &format!(
            "📸 <b>Media Request {index}/{total}</b>\n\n\
             🎬 Send an image or short video for segment {index}\n\
             ⏱️ This segment is approximately 30 seconds\n\n\
             💡 <b>Tips:</b>\n\
             • Use historical photos/footage\n\
             • High resolution (1920x1080 preferred)\n\
             • Related to the narration\n\n\
             ⏰ Waiting for {minutes} minutes...\n\n\
             🛑 Use /cancel to cancel production",
            index = index,
            total = total,
            minutes = timeout.as_secs() / 60
        ),
        &[MediaKind::Image, MediaKind::Video],
        destination,
    )
    .with_timeout(timeout)
    .with_reminder_interval(Duration::from_secs(collection.segment_reminder_interval_secs))
    .on_received(&format!("✅ Media {}/{} received!", index, total))
    .on_timeout(&format!(
        "⚠️ No media received for segment {}\nUsing placeholder...",
        index
    ))
}

fn music_request(config: &Config, video_id: &str) -> FieldRequest {
    let timeout = Duration::from_secs(config.collection.asset_timeout_secs);
    FieldRequest::media(
        "background music",
        &format!(
            "🎵 <b>BACKGROUND MUSIC (Optional)</b>\n\n\
             📻 Send an instrumental track for the video:\n\n\
             💡 <b>Recommendations:</b>\n\
             • INSTRUMENTAL music (no lyrics)\n\
             • Epic/cinematic style\n\
             • Format: MP3 or M4A\n\
             • Any length (it will be adjusted)\n\n\
             ⏰ You have {} minutes\n\n\
             ⏭️ Send <b>/skip</b> for a video without music",
            timeout.as_secs() / 60
        ),
        &[MediaKind::Audio],
        config.paths.segments_dir.join(format!("{}_background_music", video_id)),
    )
    .skippable()
    .with_timeout(timeout)
    .with_reminder_interval(Duration::from_secs(config.collection.asset_reminder_interval_secs))
    .on_received("✅ <b>Music Received!</b>\n\nIt will play at a low volume.")
    .on_skipped("⏭️ <b>Music Skipped</b>\n\nThe video will have no background music.")
    .on_timeout("⏰ <b>Timeout</b>\n\nThe video will have no background music.")
}

fn logo_request(config: &Config, video_id: &str) -> FieldRequest {
    let timeout = Duration::from_secs(config.collection.asset_timeout_secs);
    FieldRequest::media(
        "channel logo",
        &format!(
            "🖼️ <b>CHANNEL LOGO (Optional)</b>\n\n\
             📺 Send your channel profile picture:\n\n\
             💡 <b>Recommendations:</b>\n\
             • Square image (1:1)\n\
             • PNG with transparent background (ideal)\n\
             • 800x800 or larger\n\
             • The logo sits in the bottom right corner\n\n\
             ⏰ You have {} minutes\n\n\
             ⏭️ Send <b>/skip</b> for a video without logo",
            timeout.as_secs() / 60
        ),
        &[MediaKind::Image],
        config.paths.media_dir.join(format!("{}_channel_logo", video_id)),
    )
    .skippable()
    .with_timeout(timeout)
    .with_reminder_interval(Duration::from_secs(config.collection.asset_reminder_interval_secs))
    .on_received("✅ <b>Logo Received!</b>\n\nIt will appear in the bottom right corner.")
    .on_skipped("⏭️ <b>Logo Skipped</b>\n\nThe video will have no channel logo.")
    .on_timeout("⏰ <b>Timeout</b>\n\nThe video will have no channel logo.")
}

fn thumbnail_request(config: &Config, video_id: &str) -> FieldRequest {
    let timeout = Duration::from_secs(config.collection.thumbnail_timeout_secs);
    FieldRequest::media(
        "thumbnail",
        &format!(
            "🖼️ <b>CUSTOM THUMBNAIL</b>\n\n\
             📺 <b>Last step before the upload!</b>\n\n\
             📤 Send the thumbnail image now:\n\n\
             💡 <b>Recommendations:</b>\n\
             • Minimum 1280x720, ideally 1920x1080\n\
             • JPG or PNG\n\
             • Large readable text and vibrant colours\n\n\
             ⏰ You have {} minutes\n\n\
             ⏭️ Send <b>/skip</b> to use YouTube's automatic thumbnail",
            timeout.as_secs() / 60
        ),
        &[MediaKind::Image],
        config.paths.output_dir.join(format!("{}_thumbnail", video_id)),
    )
    .skippable()
    .with_timeout(timeout)
    .with_reminder_interval(Duration::from_secs(config.collection.thumbnail_reminder_interval_secs))
    .on_received("✅ <b>Thumbnail Received!</b>\n\nUploading the video with your thumbnail...")
    .on_skipped("⏭️ <b>Thumbnail Skipped</b>\n\nUsing YouTube's automatic thumbnail.")
    .on_timeout("⏰ <b>Timeout</b>\n\nUsing YouTube's automatic thumbnail.")
}

/// Interactive production of a collected record
pub struct VideoProducer {
    config: Config,
    store: ProductionStore,
    narrator: Narrator,
    audio: AudioProcessor,
    assembler: VideoAssembler,
}

impl VideoProducer {
    pub fn new(config: Config) -> Self {
        Self {
            store: ProductionStore::new(config.paths.productions_dir.clone()),
            narrator: Narrator::from_config(&config.tts),
            audio: AudioProcessor::new(&config.video),
            assembler: VideoAssembler::new(config.video.clone()),
            config,
        }
    }

    /// Produce and publish `record`, keeping its stored status current.
    ///
    /// Failures are reported over chat before being returned.
    pub async fn run(&self, session: &mut Session, mut record: ProductionRecord) -> Result<ProductionOutcome> {
        self.set_status(&mut record, ProductionStatus::Producing, None).await;

        match self.produce(session, &record).await {
            Ok(ProductionOutcome::Published { url }) => {
                self.set_status(&mut record, ProductionStatus::Published, Some(url.clone()))
                    .await;
                info!("✅ Production completed successfully!");
                Ok(ProductionOutcome::Published { url })
            }
            Ok(ProductionOutcome::Cancelled) => {
                self.set_status(&mut record, ProductionStatus::Cancelled, None).await;
                info!("🛑 Production {} cancelled", record.video_id);
                Ok(ProductionOutcome::Cancelled)
            }
            Err(e) => {
                error!("❌ Production failed: {:#}", e);
                session
                    .notify(&format!(
                        "❌ <b>Production Failed</b>\n\n{}",
                        escape_html(&format!("{:#}", e))
                    ))
                    .await;
                self.set_status(&mut record, ProductionStatus::Failed, None).await;
                Err(e)
            }
        }
    }

    async fn set_status(&self, record: &mut ProductionRecord, status: ProductionStatus, url: Option<String>) {
        record.status = status;
        if url.is_some() {
            record.url = url.clone();
        }
        if let Err(e) = self.store.update_status(&record.video_id, status, url).await {
            warn!("⚠️ Could not update production record {}: {}", record.video_id, e);
        }
    }

    async fn produce(&self, session: &mut Session, record: &ProductionRecord) -> Result<ProductionOutcome> {
        session
            .notify(&format!(
                "🎬 <b>Production Started</b>\n\n\
                 🎯 Video: {}\n\
                 🆔 ID: {}\n\n\
                 Starting audio generation...",
                escape_html(&record.title),
                record.video_id
            ))
            .await;

        let narration = self
            .config
            .paths
            .segments_dir
            .join(format!("{}_full_audio.mp3", record.video_id));
        self.narrator.narrate(&record.script, &narration).await?;
        session
            .notify("🎙️ <b>Audio Generated!</b>\n\nNarration created successfully.\nNow segmenting audio...")
            .await;

        if session.check_cancellation().await {
            return Ok(ProductionOutcome::Cancelled);
        }

        let info = self.audio.get_audio_info(&narration).await?;
        let segments = self
            .audio
            .split(
                &info,
                Duration::from_secs_f64(self.config.video.segment_seconds),
                &self.config.paths.segments_dir,
                &record.video_id,
            )
            .await?;

        if session.check_cancellation().await {
            return Ok(ProductionOutcome::Cancelled);
        }

        let plans = match self.collect_media(session, &record.video_id, &segments).await? {
            Some(plans) => plans,
            None => return Ok(ProductionOutcome::Cancelled),
        };

        let music = match session.await_field(&music_request(&self.config, &record.video_id)).await {
            FieldOutcome::Cancelled => return Ok(ProductionOutcome::Cancelled),
            outcome => outcome.into_media(),
        };
        let logo = match session.await_field(&logo_request(&self.config, &record.video_id)).await {
            FieldOutcome::Cancelled => return Ok(ProductionOutcome::Cancelled),
            outcome => outcome.into_media(),
        };

        if session.check_cancellation().await {
            return Ok(ProductionOutcome::Cancelled);
        }

        session.notify("🎥 Creating final video with all features...").await;
        let video_path = self
            .config
            .paths
            .output_dir
            .join(format!("{}.mp4", record.video_id));
        self.assembler
            .render(
                &plans,
                music.as_ref().map(|media| media.path.as_path()),
                logo.as_ref().map(|media| media.path.as_path()),
                &video_path,
            )
            .await?;

        let thumbnail = match session.await_field(&thumbnail_request(&self.config, &record.video_id)).await {
            FieldOutcome::Cancelled => return Ok(ProductionOutcome::Cancelled),
            outcome => outcome.into_media(),
        };

        if session.check_cancellation().await {
            return Ok(ProductionOutcome::Cancelled);
        }

        let url = self
            .publish(session, record, &video_path, thumbnail.as_ref().map(|media| media.path.as_path()))
            .await?;

        self.audio
            .cleanup(&self.config.paths.segments_dir, &format!("{}_", record.video_id))
            .await?;

        Ok(ProductionOutcome::Published { url })
    }

    /// One media file per segment; a placeholder frame stands in for
    /// segments that time out. `None` when cancelled.
    async fn collect_media(
        &self,
        session: &mut Session,
        video_id: &str,
        segments: &[AudioSegment],
    ) -> Result<Option<Vec<SegmentPlan>>> {
        let total = segments.len();
        info!("📸 Collecting media for {} segments...", total);
        session
            .notify(&format!(
                "📸 <b>Starting Media Collection</b>\n\n\
                 📊 Total segments: {}\n\
                 ⏱️ ~{:.0} seconds each\n\n\
                 I'll request media for each segment.\n\
                 Please send images or short videos in order.\n\n\
                 ⏰ You have {} minutes per segment.",
                total,
                self.config.video.segment_seconds,
                self.config.collection.segment_media_timeout_secs / 60
            ))
            .await;

        let mut plans = Vec::with_capacity(total);
        for segment in segments {
            let index = segment.span.index;
            let outcome = session
                .await_field(&segment_request(&self.config, video_id, index, total))
                .await;
            if outcome.is_cancelled() {
                return Ok(None);
            }
            let visual = match outcome.into_media() {
                Some(media) => media,
                None => self.placeholder(index).await?,
            };

            plans.push(SegmentPlan {
                audio: segment.path.clone(),
                duration: segment.span.duration,
                visual,
            });
        }

        session
            .notify(&format!(
                "✅ <b>All Media Collected!</b>\n\nReceived {} media files.\nNow creating the video...",
                plans.len()
            ))
            .await;
        Ok(Some(plans))
    }

    async fn placeholder(&self, index: usize) -> Result<MediaFile> {
        self.assembler
            .create_placeholder(index, &self.config.paths.media_dir)
            .await
            .with_context(|| format!("Cannot create placeholder for segment {}", index))
    }

    async fn publish(
        &self,
        session: &Session,
        record: &ProductionRecord,
        video: &Path,
        thumbnail: Option<&Path>,
    ) -> Result<String> {
        session.notify("📤 <b>Uploading to YouTube</b>\n\nPlease wait...").await;

        let uploader = YouTubeUploader::new(&self.config.youtube)?;
        let metadata = VideoMetadata::new(&record.title, &record.description, &record.tags, &self.config.youtube);
        let video_id = uploader
            .upload(video, &metadata)
            .await
            .context("YouTube upload failed")?;
        let url = youtube::watch_url(&video_id);

        let header = format!(
            "🎉 <b>VIDEO PUBLISHED!</b>\n\n📺 {}\n🔗 {}\n\n",
            escape_html(&record.title),
            url
        );

        let Some(thumbnail) = thumbnail else {
            session
                .notify(&format!(
                    "{}✅ Video uploaded to YouTube!\n📸 Using automatic thumbnail\n\n🎬 Production complete!",
                    header
                ))
                .await;
            return Ok(url);
        };

        match uploader.set_thumbnail(&video_id, thumbnail).await {
            Ok(()) => {
                session
                    .notify(&format!(
                        "{}✅ Video uploaded to YouTube!\n✅ Custom thumbnail applied!\n\n🎬 Production complete!",
                        header
                    ))
                    .await;
            }
            Err(e) if e.is_permission_denied() => {
                warn!("⚠️ Thumbnail upload not permitted: {}", e);
                let pending = PendingThumbnail::new(&video_id, &url, thumbnail);
                if let Err(e) = pending.append_to(&self.config.paths.pending_thumbnails()).await {
                    warn!("⚠️ Could not record pending thumbnail: {}", e);
                }
                session
                    .notify(&format!(
                        "{header}✅ Video uploaded successfully!\n\n\
                         ⚠️ <b>Thumbnail NOT uploaded</b>\n\n\
                         ❗ <b>Verification required:</b>\n\
                         The channel must be phone-verified to use custom thumbnails.\n\n\
                         📱 <b>How to fix:</b>\n\
                         1. Open https://www.youtube.com/verify\n\
                         2. Verify your phone number\n\
                         3. Wait for approval (up to 24h)\n\n\
                         🖼️ <b>Manual upload now:</b>\n\
                         {studio}",
                        header = header,
                        studio = pending.upload_url
                    ))
                    .await;
            }
            Err(e) => {
                warn!("⚠️ Thumbnail upload failed: {}", e);
                session
                    .notify(&format!(
                        "{}✅ Video uploaded!\n⚠️ Thumbnail upload failed: {}\n\n\
                         🖼️ Manual upload:\n{}\n\n🎬 Production complete!",
                        header,
                        escape_html(&e.to_string()),
                        youtube::studio_url(&video_id)
                    ))
                    .await;
            }
        }

        Ok(url)
    }
}

/// Number of stock clips sampled for a narration of `duration`
pub fn clip_count(video_type: VideoType, duration: Duration) -> usize {
    match video_type {
        VideoType::Short => 6,
        VideoType::Long => ((duration.as_secs_f64() / 12.0) as usize).max(10),
    }
}

/// Title, description and tags of an automatic upload
#[derive(Debug, Clone, PartialEq)]
pub struct AutoMetadata {
    pub title: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl AutoMetadata {
    pub fn new(theme: &str, script: &str, video_type: VideoType, auto: &AutoConfig) -> Self {
        let mut title = if theme.chars().count() <= 60 {
            theme.to_string()
        } else {
            format!("{}...", theme.chars().take(57).collect::<String>())
        };

        let excerpt: String = script.chars().take(300).collect();
        let mut description = format!("{}...\n\n{}\n\n{}", excerpt, auto.call_to_action, auto.hashtags);
        let mut tags = auto.tags.clone();

        if video_type == VideoType::Short {
            title.push_str(" #shorts");
            description.push_str(" #shorts");
            tags.push("shorts".to_string());
        }

        Self {
            title,
            description,
            tags,
        }
    }
}

/// Summary of a finished automatic run
#[derive(Debug, Clone)]
pub struct AutoRun {
    pub video_path: PathBuf,
    pub entry: UploadLogEntry,
}

/// Unattended production from an LLM script and stock clips
pub struct AutoProducer {
    config: Config,
    writer: ScriptWriter,
    narrator: Narrator,
    audio: AudioProcessor,
    assembler: VideoAssembler,
    library: MediaLibrary,
}

impl AutoProducer {
    pub fn new(config: Config) -> Result<Self> {
        let writer = ScriptWriter::new(create_llm(&config.llm)?);
        let narrator = Narrator::with_voice(&config.tts, &config.auto.voice, &config.auto.fallback_language);

        Ok(Self {
            writer,
            narrator,
            audio: AudioProcessor::new(&config.video),
            assembler: VideoAssembler::new(config.video.clone()),
            library: MediaLibrary::new(config.paths.clips_dir.clone()),
            config,
        })
    }

    fn pick_theme(&self) -> String {
        self.config
            .auto
            .themes
            .choose(&mut rand::thread_rng())
            .cloned()
            .unwrap_or_else(|| DEFAULT_THEME.to_string())
    }

    pub async fn run(&self) -> Result<AutoRun> {
        let auto = &self.config.auto;
        let video_type = auto.video_type;
        let paths = &self.config.paths;

        tokio::fs::create_dir_all(&paths.output_dir).await?;
        tokio::fs::create_dir_all(&paths.clips_dir).await?;

        let theme = self.pick_theme();
        info!("🎯 Theme: {}", theme);

        let script = self
            .writer
            .write(&theme, video_type, auto.duration_minutes, &auto.language)
            .await?;
        let preview: String = script.chars().take(150).collect();
        info!("Preview: {}...", preview);

        let stamp = Utc::now().format("%Y%m%d_%H%M%S");
        let narration = paths.output_dir.join(format!("{}_{}_narration.mp3", video_type, stamp));
        self.narrator.narrate(&script, &narration).await?;

        let duration = self.audio.duration(&narration).await?;
        info!("⏱️ Duration: {:.1}s", duration.as_secs_f64());

        let clips = self.library.sample(clip_count(video_type, duration))?;
        if clips.is_empty() {
            return Err(anyhow!(
                "No clips found in {}; add .mp4, .mov, .avi or .mkv files there",
                paths.clips_dir.display()
            ));
        }

        let video_path = paths.output_dir.join(format!("{}_{}.mp4", video_type, stamp));
        let profile = RenderProfile::for_type(video_type, &self.config.video);
        self.assembler
            .compose_clips(&clips, &narration, duration, &profile, &video_path)
            .await?;

        let metadata = AutoMetadata::new(&theme, &script, video_type, auto);
        let uploader = YouTubeUploader::new(&self.config.youtube)?;
        let upload = VideoMetadata::new(&metadata.title, &metadata.description, &metadata.tags, &self.config.youtube);
        let video_id = uploader.upload(&video_path, &upload).await?;

        let url = match video_type {
            VideoType::Short => youtube::shorts_url(&video_id),
            VideoType::Long => youtube::watch_url(&video_id),
        };

        let entry = UploadLogEntry {
            timestamp: Utc::now(),
            video_type: video_type.to_string(),
            theme,
            title: metadata.title,
            duration_seconds: duration.as_secs_f64(),
            video_id,
            url,
        };
        append_json_log(&paths.upload_log, &entry).await?;
        info!("✅ Video published: {}", entry.url);

        if let Err(e) = tokio::fs::remove_file(&narration).await {
            warn!("Could not remove narration {}: {}", narration.display(), e);
        }

        Ok(AutoRun { video_path, entry })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::Expect;

    #[test]
    fn test_clip_count() {
        assert_eq!(clip_count(VideoType::Short, Duration::from_secs(600)), 6);
        assert_eq!(clip_count(VideoType::Long, Duration::from_secs(60)), 10);
        assert_eq!(clip_count(VideoType::Long, Duration::from_secs(600)), 50);
    }

    #[test]
    fn test_short_metadata() {
        let auto = AutoConfig::default();
        let metadata = AutoMetadata::new("coragem", &"palavra ".repeat(100), VideoType::Short, &auto);

        assert_eq!(metadata.title, "coragem #shorts");
        assert!(metadata.description.ends_with(" #shorts"));
        assert!(metadata.description.contains(&auto.call_to_action));
        assert_eq!(metadata.tags.last().map(String::as_str), Some("shorts"));
        assert_eq!(metadata.tags.len(), auto.tags.len() + 1);
    }

    #[test]
    fn test_long_metadata_truncates_theme() {
        let auto = AutoConfig::default();
        let theme = "a".repeat(80);
        let metadata = AutoMetadata::new(&theme, "short script", VideoType::Long, &auto);

        assert_eq!(metadata.title.chars().count(), 60);
        assert!(metadata.title.ends_with("..."));
        assert!(metadata.description.starts_with("short script..."));
        assert_eq!(metadata.tags, auto.tags);
    }

    #[test]
    fn test_segment_request_targets_media_dir() {
        let config = Config::default();
        let request = segment_request(&config, "video_1", 2, 5);

        assert_eq!(request.timeout, Duration::from_secs(1200));
        assert_eq!(request.reminder_interval, Duration::from_secs(180));
        assert!(!request.skippable);
        assert!(request.prompt.contains("Media Request 2/5"));
        match request.expect {
            Expect::Media { accept, destination } => {
                assert_eq!(accept, vec![MediaKind::Image, MediaKind::Video]);
                assert_eq!(destination, PathBuf::from("media/video_1_segment_002"));
            }
            other => panic!("unexpected expectation {:?}", other),
        }
    }

    #[test]
    fn test_optional_assets_are_skippable() {
        let config = Config::default();
        for request in [
            music_request(&config, "v"),
            logo_request(&config, "v"),
            thumbnail_request(&config, "v"),
        ] {
            assert!(request.skippable, "{} should be skippable", request.label);
        }
        assert_eq!(thumbnail_request(&config, "v").timeout, Duration::from_secs(1200));
        assert_eq!(music_request(&config, "v").reminder_interval, Duration::from_secs(120));
    }
}
