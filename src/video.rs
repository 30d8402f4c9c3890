use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::collector::{MediaFile, MediaKind};
use crate::config::{VideoConfig, VideoType};

/// Frame size, rate and encoder settings of a render
#[derive(Debug, Clone, PartialEq)]
pub struct RenderProfile {
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate: String,
    pub preset: String,
}

impl RenderProfile {
    /// 1920x1080 with the configured rate and bitrate
    pub fn landscape(config: &VideoConfig) -> Self {
        Self {
            width: 1920,
            height: 1080,
            fps: config.fps,
            bitrate: config.bitrate.clone(),
            preset: config.preset.clone(),
        }
    }

    /// 1080x1920 for shorts
    pub fn vertical(config: &VideoConfig) -> Self {
        Self {
            width: 1080,
            height: 1920,
            fps: 30,
            bitrate: "8000k".to_string(),
            preset: config.preset.clone(),
        }
    }

    pub fn for_type(video_type: VideoType, config: &VideoConfig) -> Self {
        match video_type {
            VideoType::Short => Self::vertical(config),
            VideoType::Long => Self::landscape(config),
        }
    }

    fn encoder_args(&self) -> Vec<String> {
        [
            "-c:v", "libx264",
            "-preset", &self.preset,
            "-b:v", &self.bitrate,
            "-pix_fmt", "yuv420p",
            "-r", &self.fps.to_string(),
            "-c:a", "aac",
        ]
        .iter()
        .map(|arg| arg.to_string())
        .collect()
    }
}

/// One narration segment with the visual shown over it
#[derive(Debug, Clone)]
pub struct SegmentPlan {
    pub audio: PathBuf,
    pub duration: Duration,
    pub visual: MediaFile,
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

fn secs(duration: Duration) -> String {
    format!("{:.3}", duration.as_secs_f64())
}

/// Scale to cover the frame, then centre crop to it
pub fn cover_filter(width: u32, height: u32) -> String {
    format!(
        "scale={w}:{h}:force_original_aspect_ratio=increase,crop={w}:{h},setsar=1",
        w = width,
        h = height
    )
}

/// Slow centred zoom over a still image, gaining `zoom` by the last frame
pub fn ken_burns_filter(profile: &RenderProfile, duration: Duration, zoom: f64) -> String {
    let frames = ((duration.as_secs_f64() * profile.fps as f64).ceil() as u64).max(1);
    format!(
        "{cover},zoompan=z='1+{zoom}*on/{frames}':d={frames}:\
         x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={w}x{h}:fps={fps}",
        cover = cover_filter(profile.width, profile.height),
        zoom = zoom,
        frames = frames,
        w = profile.width,
        h = profile.height,
        fps = profile.fps,
    )
}

fn fade_filters(duration: Duration, fade: f64, fade_in: bool, fade_out: bool) -> String {
    let mut filters = String::new();
    if fade_in {
        filters.push_str(&format!(",fade=t=in:st=0:d={}", fade));
    }
    if fade_out {
        let start = (duration.as_secs_f64() - fade).max(0.0);
        filters.push_str(&format!(",fade=t=out:st={:.3}:d={}", start, fade));
    }
    filters
}

/// Concat demuxer list; single quotes in paths are escaped
pub fn concat_list(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|part| format!("file '{}'\n", path_arg(part).replace('\'', "'\\''")))
        .collect()
}

/// Escape text for a drawtext filter value
fn drawtext_escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace(':', "\\:")
        .replace('\'', "\\'")
}

/// Renders videos by driving the ffmpeg command line
#[derive(Clone)]
pub struct VideoAssembler {
    config: VideoConfig,
}

impl VideoAssembler {
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }

    async fn run_ffmpeg(&self, args: &[String], what: &str) -> Result<()> {
        debug!("ffmpeg {}", args.join(" "));

        let output = tokio::process::Command::new(&self.config.ffmpeg)
            .args(["-hide_banner", "-v", "error", "-y"])
            .args(args)
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run {}", self.config.ffmpeg))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: Vec<&str> = stderr.lines().rev().take(5).collect();
            return Err(anyhow!(
                "{} failed ({}): {}",
                what,
                output.status,
                tail.into_iter().rev().collect::<Vec<_>>().join("\n")
            ));
        }
        Ok(())
    }

    pub fn placeholder_args(&self, index: usize, output: &Path) -> Vec<String> {
        let mut drawtext = format!(
            "drawtext=text='{}':fontcolor=0x646464:fontsize=80:x=(w-text_w)/2:y=(h-text_h)/2",
            drawtext_escape(&format!("Segment {}", index))
        );
        if let Some(font) = &self.config.font_file {
            drawtext.push_str(&format!(":fontfile='{}'", drawtext_escape(&path_arg(font))));
        }

        let color = self.config.placeholder_color.trim_start_matches('#');
        vec![
            "-f".into(),
            "lavfi".into(),
            "-i".into(),
            format!("color=c=0x{}:s=1920x1080", color),
            "-frames:v".into(),
            "1".into(),
            "-vf".into(),
            drawtext,
            "-q:v".into(),
            "2".into(),
            path_arg(output),
        ]
    }

    /// Dark frame labelled with the segment number, used when no media arrived
    pub async fn create_placeholder(&self, index: usize, dir: &Path) -> Result<MediaFile> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("placeholder_{:03}.jpg", index));

        self.run_ffmpeg(&self.placeholder_args(index, &path), "Placeholder frame")
            .await?;

        Ok(MediaFile {
            path,
            kind: MediaKind::Image,
        })
    }

    /// Encode one segment: visual fitted to the frame, narration as audio
    pub fn segment_args(
        &self,
        profile: &RenderProfile,
        segment: &SegmentPlan,
        fade_in: bool,
        fade_out: bool,
        output: &Path,
    ) -> Vec<String> {
        let fades = fade_filters(segment.duration, self.config.fade_seconds, fade_in, fade_out);
        let mut args = Vec::new();

        let video_filter = match segment.visual.kind {
            MediaKind::Video => {
                // Loops short clips; -t below trims long ones
                args.extend(["-stream_loop".to_string(), "-1".to_string()]);
                format!("{},fps={}{}", cover_filter(profile.width, profile.height), profile.fps, fades)
            }
            _ => format!("{}{}", ken_burns_filter(profile, segment.duration, self.config.zoom), fades),
        };

        args.extend(["-i".to_string(), path_arg(&segment.visual.path)]);
        args.extend(["-i".to_string(), path_arg(&segment.audio)]);
        args.extend([
            "-filter_complex".to_string(),
            format!("[0:v]{}[v]", video_filter),
            "-map".to_string(),
            "[v]".to_string(),
            "-map".to_string(),
            "1:a".to_string(),
            "-t".to_string(),
            secs(segment.duration),
        ]);
        args.extend(profile.encoder_args());
        args.push(path_arg(output));
        args
    }

    /// Overlay the logo and mix the music under the narration
    pub fn finish_args(
        &self,
        input: &Path,
        total: Duration,
        music: Option<&Path>,
        logo: Option<&Path>,
        profile: &RenderProfile,
        output: &Path,
    ) -> Vec<String> {
        let mut args = vec!["-i".to_string(), path_arg(input)];
        let mut filters = Vec::new();
        let mut video_out = "0:v".to_string();
        let mut audio_out = "0:a".to_string();
        let mut next_input = 1;

        if let Some(music) = music {
            args.extend(["-stream_loop".into(), "-1".into(), "-i".into(), path_arg(music)]);
            filters.push(format!(
                "[{i}:a]volume={vol}[bg];[0:a][bg]amix=inputs=2:duration=first:normalize=0[a]",
                i = next_input,
                vol = self.config.music_volume
            ));
            audio_out = "[a]".to_string();
            next_input += 1;
        }

        if let Some(logo) = logo {
            args.extend(["-loop".into(), "1".into(), "-i".into(), path_arg(logo)]);
            let fade = self.config.fade_seconds;
            let fade_out_start = (total.as_secs_f64() - fade).max(0.0);
            filters.push(format!(
                "[{i}:v]scale={s}:{s},format=rgba,\
                 fade=t=in:st=0:d={fade}:alpha=1,fade=t=out:st={out:.3}:d={fade}:alpha=1[logo];\
                 [0:v][logo]overlay=W-w-{m}:H-h-{m}:shortest=1[v]",
                i = next_input,
                s = self.config.logo_size,
                m = self.config.logo_margin,
                fade = fade,
                out = fade_out_start,
            ));
            video_out = "[v]".to_string();
        }

        if !filters.is_empty() {
            args.extend(["-filter_complex".into(), filters.join(";")]);
        }
        args.extend(["-map".into(), video_out, "-map".into(), audio_out]);
        args.extend(["-t".into(), secs(total)]);
        args.extend(profile.encoder_args());
        args.push(path_arg(output));
        args
    }

    async fn concat(&self, parts: &[PathBuf], work_dir: &Path, output: &Path) -> Result<()> {
        let list_path = work_dir.join("concat.txt");
        tokio::fs::write(&list_path, concat_list(parts)).await?;

        let args: Vec<String> = vec![
            "-f".into(),
            "concat".into(),
            "-safe".into(),
            "0".into(),
            "-i".into(),
            path_arg(&list_path),
            "-c".into(),
            "copy".into(),
            path_arg(output),
        ];
        self.run_ffmpeg(&args, "Concatenation").await
    }

    /// Render an interactive production: one part per segment, joined,
    /// then logo and music applied over the whole video.
    pub async fn render(
        &self,
        segments: &[SegmentPlan],
        music: Option<&Path>,
        logo: Option<&Path>,
        output: &Path,
    ) -> Result<PathBuf> {
        if segments.is_empty() {
            return Err(anyhow!("Nothing to render: no segments"));
        }

        let output_dir = output.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(output_dir).await?;
        let work_dir = tempfile::Builder::new().prefix(".render-").tempdir_in(output_dir)?;

        let profile = RenderProfile::landscape(&self.config);
        let last = segments.len() - 1;
        let mut parts = Vec::with_capacity(segments.len());

        for (i, segment) in segments.iter().enumerate() {
            let part = work_dir.path().join(format!("part_{:03}.mp4", i + 1));
            let args = self.segment_args(&profile, segment, i == 0, i == last, &part);
            self.run_ffmpeg(&args, &format!("Segment {}", i + 1)).await?;

            info!(
                "    ✅ Segment {}/{} rendered ({:.1}s)",
                i + 1,
                segments.len(),
                segment.duration.as_secs_f64()
            );
            parts.push(part);
        }

        let total: Duration = segments.iter().map(|segment| segment.duration).sum();

        if music.is_none() && logo.is_none() {
            self.concat(&parts, work_dir.path(), output).await?;
        } else {
            let joined = work_dir.path().join("joined.mp4");
            self.concat(&parts, work_dir.path(), &joined).await?;

            let args = self.finish_args(&joined, total, music, logo, &profile, output);
            self.run_ffmpeg(&args, "Final render").await?;
        }

        info!("✅ Video created: {} ({:.1}s)", output.display(), total.as_secs_f64());
        Ok(output.to_path_buf())
    }

    pub fn clip_args(&self, profile: &RenderProfile, clip: &Path, duration: Duration, output: &Path) -> Vec<String> {
        let mut args: Vec<String> = vec![
            "-stream_loop".into(),
            "-1".into(),
            "-i".into(),
            path_arg(clip),
            "-an".into(),
            "-vf".into(),
            format!("{},fps={}", cover_filter(profile.width, profile.height), profile.fps),
            "-t".into(),
            secs(duration),
        ];
        args.extend(
            profile
                .encoder_args()
                .into_iter()
                .take_while(|arg| arg != "-c:a"),
        );
        args.push(path_arg(output));
        args
    }

    /// Automatic production: stock clips share the narration time evenly
    pub async fn compose_clips(
        &self,
        clips: &[PathBuf],
        narration: &Path,
        duration: Duration,
        profile: &RenderProfile,
        output: &Path,
    ) -> Result<PathBuf> {
        let clips = clip_sequence(clips, profile);
        if clips.is_empty() {
            return Err(anyhow!("No clips available to compose"));
        }

        let output_dir = output.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(output_dir).await?;
        let work_dir = tempfile::Builder::new().prefix(".compose-").tempdir_in(output_dir)?;

        let per_clip = duration.div_f64(clips.len() as f64);
        info!(
            "📹 Composing {}x{} video from {} clips ({:.1}s each)",
            profile.width,
            profile.height,
            clips.len(),
            per_clip.as_secs_f64()
        );

        let mut parts = Vec::with_capacity(clips.len());
        for (i, clip) in clips.iter().enumerate() {
            let part = work_dir.path().join(format!("clip_{:03}.mp4", i + 1));
            self.run_ffmpeg(&self.clip_args(profile, clip, per_clip, &part), &format!("Clip {}", i + 1))
                .await?;
            parts.push(part);
        }

        let joined = work_dir.path().join("joined.mp4");
        self.concat(&parts, work_dir.path(), &joined).await?;

        let args: Vec<String> = vec![
            "-i".into(),
            path_arg(&joined),
            "-i".into(),
            path_arg(narration),
            "-map".into(),
            "0:v".into(),
            "-map".into(),
            "1:a".into(),
            "-c:v".into(),
            "copy".into(),
            "-c:a".into(),
            "aac".into(),
            "-t".into(),
            secs(duration),
            path_arg(output),
        ];
        self.run_ffmpeg(&args, "Narration mux").await?;

        info!("✅ Video created: {}", output.display());
        Ok(output.to_path_buf())
    }
}

/// Vertical shorts with fewer than three clips repeat the list three times
pub fn clip_sequence(clips: &[PathBuf], profile: &RenderProfile) -> Vec<PathBuf> {
    let vertical = profile.height > profile.width;
    if vertical && !clips.is_empty() && clips.len() < 3 {
        clips.iter().cycle().take(clips.len() * 3).cloned().collect()
    } else {
        clips.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assembler() -> VideoAssembler {
        VideoAssembler::new(VideoConfig::default())
    }

    fn plan(kind: MediaKind, secs: u64) -> SegmentPlan {
        SegmentPlan {
            audio: PathBuf::from("seg.mp3"),
            duration: Duration::from_secs(secs),
            visual: MediaFile {
                path: PathBuf::from("visual"),
                kind,
            },
        }
    }

    #[test]
    fn test_profiles() {
        let config = VideoConfig::default();
        let short = RenderProfile::for_type(VideoType::Short, &config);
        assert_eq!((short.width, short.height, short.fps), (1080, 1920, 30));
        assert_eq!(short.bitrate, "8000k");

        let long = RenderProfile::for_type(VideoType::Long, &config);
        assert_eq!((long.width, long.height, long.fps), (1920, 1080, 24));
        assert_eq!(long.bitrate, "5000k");
    }

    #[test]
    fn test_image_segment_zooms_and_fades_in() {
        let assembler = assembler();
        let profile = RenderProfile::landscape(&VideoConfig::default());
        let args = assembler.segment_args(&profile, &plan(MediaKind::Image, 30), true, false, Path::new("out.mp4"));

        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("zoompan=z='1+0.05*on/720'"));
        assert!(filter.contains("fade=t=in:st=0:d=1"));
        assert!(!filter.contains("fade=t=out"));
        assert!(!args.contains(&"-stream_loop".to_string()));
        assert!(args.contains(&"30.000".to_string()));
    }

    #[test]
    fn test_video_segment_loops_and_fades_out() {
        let assembler = assembler();
        let profile = RenderProfile::landscape(&VideoConfig::default());
        let args = assembler.segment_args(&profile, &plan(MediaKind::Video, 12), false, true, Path::new("out.mp4"));

        assert_eq!(&args[..2], &["-stream_loop".to_string(), "-1".to_string()]);
        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("crop=1920:1080"));
        assert!(filter.contains("fade=t=out:st=11.000:d=1"));
    }

    #[test]
    fn test_finish_with_music_and_logo() {
        let assembler = assembler();
        let profile = RenderProfile::landscape(&VideoConfig::default());
        let args = assembler.finish_args(
            Path::new("joined.mp4"),
            Duration::from_secs(90),
            Some(Path::new("music.mp3")),
            Some(Path::new("logo.png")),
            &profile,
            Path::new("final.mp4"),
        );

        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.contains("[1:a]volume=0.15[bg]"));
        assert!(filter.contains("amix=inputs=2:duration=first:normalize=0"));
        assert!(filter.contains("[2:v]scale=150:150"));
        assert!(filter.contains("overlay=W-w-30:H-h-30"));
        assert!(filter.contains("fade=t=out:st=89.000"));
        assert!(args.contains(&"[a]".to_string()));
        assert!(args.contains(&"[v]".to_string()));
    }

    #[test]
    fn test_finish_with_logo_only_keeps_narration() {
        let assembler = assembler();
        let profile = RenderProfile::landscape(&VideoConfig::default());
        let args = assembler.finish_args(
            Path::new("joined.mp4"),
            Duration::from_secs(10),
            None,
            Some(Path::new("logo.png")),
            &profile,
            Path::new("final.mp4"),
        );

        let filter = &args[args.iter().position(|a| a == "-filter_complex").unwrap() + 1];
        assert!(filter.starts_with("[1:v]scale=150:150"));
        assert!(args.contains(&"0:a".to_string()));
    }

    #[test]
    fn test_placeholder_args() {
        let args = assembler().placeholder_args(4, Path::new("p.jpg"));
        assert!(args.contains(&"color=c=0x141414:s=1920x1080".to_string()));
        assert!(args.iter().any(|a| a.contains("text='Segment 4'")));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_short_repeats_few_clips() {
        let config = VideoConfig::default();
        let clips = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4")];

        let short = clip_sequence(&clips, &RenderProfile::vertical(&config));
        assert_eq!(short.len(), 6);
        assert_eq!(short[2], PathBuf::from("a.mp4"));

        let long = clip_sequence(&clips, &RenderProfile::landscape(&config));
        assert_eq!(long.len(), 2);
    }
}
