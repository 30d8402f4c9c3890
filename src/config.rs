use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::llm::LLMConfig;

/// Configuration for the history video bot
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    /// Bot API access and the operator chat
    pub telegram: TelegramConfig,

    /// Timeouts and polling behaviour of field requests
    pub collection: CollectionConfig,

    /// Working directories and log files
    pub paths: PathsConfig,

    /// Script generation
    pub llm: LLMConfig,

    /// Narration synthesis
    pub tts: TtsConfig,

    /// Rendering parameters
    pub video: VideoConfig,

    pub youtube: YouTubeConfig,

    pub github: GitHubConfig,

    pub server: ServerConfig,

    /// Automatic production
    pub auto: AutoConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    /// Bot token, usually provided through `TELEGRAM_BOT_TOKEN`
    pub bot_token: Option<String>,

    /// The only chat the bot talks to
    pub chat_id: Option<i64>,

    /// Bot API base URL
    pub api_base: String,

    /// Public URL registered as webhook by the server
    pub webhook_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Title, description and tags
    pub text_timeout_secs: u64,

    /// Multi-part narration script
    pub script_timeout_secs: u64,

    /// Reminder interval of the interview fields
    pub reminder_interval_secs: u64,

    pub segment_media_timeout_secs: u64,
    pub segment_reminder_interval_secs: u64,

    /// Background music and channel logo
    pub asset_timeout_secs: u64,
    pub asset_reminder_interval_secs: u64,

    pub thumbnail_timeout_secs: u64,
    pub thumbnail_reminder_interval_secs: u64,

    /// How often the cancellation marker is re-read while waiting
    pub cancel_check_interval_secs: u64,

    /// Upper bound of one long-poll
    pub poll_timeout_secs: u64,

    /// First pause after a transport error, doubled up to `max_backoff_secs`
    pub retry_backoff_secs: u64,
    pub max_backoff_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Production records and the cancellation marker
    pub productions_dir: PathBuf,

    /// Rendered videos, narration and the pending thumbnail log
    pub output_dir: PathBuf,

    /// Per-segment narration audio
    pub segments_dir: PathBuf,

    /// Media received over chat
    pub media_dir: PathBuf,

    /// Stock clips used by automatic production
    pub clips_dir: PathBuf,

    /// Upload log of automatic production
    pub upload_log: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TtsConfig {
    /// Voice of the interactive production
    pub voice: String,
    pub rate: String,
    pub pitch: String,

    /// Language of the fallback engine
    pub fallback_language: String,

    pub attempts: u32,
    pub attempt_timeout_secs: u64,
    pub retry_pause_secs: u64,

    pub edge_tts_command: String,
    pub gtts_command: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoConfig {
    pub ffmpeg: String,
    pub ffprobe: String,

    /// Length of one narration segment
    pub segment_seconds: f64,

    pub fps: u32,
    pub bitrate: String,
    pub preset: String,

    /// Volume of the background music under the narration
    pub music_volume: f32,

    /// Edge of the square logo overlay in pixels
    pub logo_size: u32,
    pub logo_margin: u32,

    pub fade_seconds: f64,

    /// Zoom gained by still images over a segment
    pub zoom: f64,

    pub placeholder_color: String,

    /// Font for placeholder captions, ffmpeg's default when unset
    pub font_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    /// Authorized-user credentials JSON (`YOUTUBE_CREDENTIALS`)
    pub credentials: Option<String>,

    pub category_id: String,
    pub privacy_status: String,

    pub token_uri: String,
    pub api_base: String,
    pub upload_base: String,

    /// Whole upload request timeout
    pub upload_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitHubConfig {
    pub token: Option<String>,

    /// `owner/name` of the repository running the production workflow
    pub repo: Option<String>,

    pub api_base: String,
    pub event_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,

    /// Records listed by `/status`
    pub status_limit: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum VideoType {
    /// Vertical short, about a minute
    Short,
    /// Horizontal video of `duration_minutes`
    Long,
}

impl FromStr for VideoType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(VideoType::Short),
            "long" => Ok(VideoType::Long),
            other => Err(anyhow!("Unknown video type '{}', expected short or long", other)),
        }
    }
}

impl std::fmt::Display for VideoType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VideoType::Short => f.write_str("short"),
            VideoType::Long => f.write_str("long"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoConfig {
    pub video_type: VideoType,

    /// One is picked at random per run
    pub themes: Vec<String>,

    /// Target length of long videos
    pub duration_minutes: u32,

    /// Language the script is written in
    pub language: String,

    pub voice: String,
    pub fallback_language: String,

    pub tags: Vec<String>,
    pub hashtags: String,
    pub call_to_action: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: None,
            api_base: "https://api.telegram.org".to_string(),
            webhook_url: None,
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            text_timeout_secs: 600,
            script_timeout_secs: 900,
            reminder_interval_secs: 120,
            segment_media_timeout_secs: 1200,
            segment_reminder_interval_secs: 180,
            asset_timeout_secs: 600,
            asset_reminder_interval_secs: 120,
            thumbnail_timeout_secs: 1200,
            thumbnail_reminder_interval_secs: 180,
            cancel_check_interval_secs: 5,
            poll_timeout_secs: 10,
            retry_backoff_secs: 3,
            max_backoff_secs: 30,
        }
    }
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            productions_dir: PathBuf::from("productions"),
            output_dir: PathBuf::from("output"),
            segments_dir: PathBuf::from("segments"),
            media_dir: PathBuf::from("media"),
            clips_dir: PathBuf::from("assets/genericas"),
            upload_log: PathBuf::from("videos_log.json"),
        }
    }
}

impl PathsConfig {
    pub fn pending_thumbnails(&self) -> PathBuf {
        self.output_dir.join("pending_thumbnails.json")
    }

    /// Every directory the bot writes into
    pub fn working_dirs(&self) -> [&Path; 4] {
        [
            &self.productions_dir,
            &self.output_dir,
            &self.segments_dir,
            &self.media_dir,
        ]
    }
}

impl Default for TtsConfig {
    fn default() -> Self {
        Self {
            voice: "en-US-AndrewMultilingualNeural".to_string(),
            rate: "+0%".to_string(),
            pitch: "+0Hz".to_string(),
            fallback_language: "en".to_string(),
            attempts: 3,
            attempt_timeout_secs: 120,
            retry_pause_secs: 10,
            edge_tts_command: "edge-tts".to_string(),
            gtts_command: "gtts-cli".to_string(),
        }
    }
}

impl Default for VideoConfig {
    fn default() -> Self {
        Self {
            ffmpeg: "ffmpeg".to_string(),
            ffprobe: "ffprobe".to_string(),
            segment_seconds: 30.0,
            fps: 24,
            bitrate: "5000k".to_string(),
            preset: "medium".to_string(),
            music_volume: 0.15,
            logo_size: 150,
            logo_margin: 30,
            fade_seconds: 1.0,
            zoom: 0.05,
            placeholder_color: "#141414".to_string(),
            font_file: None,
        }
    }
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            category_id: "22".to_string(),
            privacy_status: "public".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            upload_base: "https://www.googleapis.com/upload/youtube/v3".to_string(),
            upload_timeout_secs: 3600,
        }
    }
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            repo: None,
            api_base: "https://api.github.com".to_string(),
            event_type: "create_video".to_string(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            status_limit: 5,
        }
    }
}

impl Default for AutoConfig {
    fn default() -> Self {
        Self {
            video_type: VideoType::Short,
            themes: vec!["superação pessoal".to_string()],
            duration_minutes: 10,
            language: "Brazilian Portuguese".to_string(),
            voice: "pt-BR-AntonioNeural".to_string(),
            fallback_language: "pt".to_string(),
            tags: [
                "motivacao",
                "superacao",
                "reflexao",
                "filosofia",
                "inspiracao",
                "autoajuda",
                "desenvolvimento pessoal",
            ]
            .iter()
            .map(|tag| tag.to_string())
            .collect(),
            hashtags: "#motivacao #superacao #reflexao #filosofia #inspiracao".to_string(),
            call_to_action: "🔔 Inscreva-se para mais reflexões e motivação!".to_string(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.trim().is_empty())
}

fn parse_env<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_var(name)
        .map(|value| {
            value
                .trim()
                .parse()
                .map_err(|e| anyhow!("Invalid value for {}: {}", name, e))
        })
        .transpose()
}

impl Config {
    /// Load configuration from the first readable file, then apply the
    /// environment on top.
    pub fn load() -> Result<Self> {
        let config_paths = [
            "history-video-bot.toml",
            "config/history-video-bot.toml",
            "/etc/history-video-bot/config.toml",
        ];

        let mut config = None;
        for path in &config_paths {
            if let Ok(config_str) = std::fs::read_to_string(path) {
                match toml::from_str(&config_str) {
                    Ok(parsed) => {
                        tracing::info!("📄 Loaded configuration from: {}", path);
                        config = Some(parsed);
                        break;
                    }
                    Err(e) => {
                        tracing::warn!("Failed to parse config file {}: {}", path, e);
                    }
                }
            }
        }

        let mut config: Self = config.unwrap_or_default();
        config.apply_env()?;
        Ok(config)
    }

    /// Load an explicit configuration file, then apply the environment
    pub fn load_from(path: &Path) -> Result<Self> {
        let config_str = std::fs::read_to_string(path)
            .with_context(|| format!("Cannot read config file {}", path.display()))?;
        let mut config: Self = toml::from_str(&config_str)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());

        config.apply_env()?;
        Ok(config)
    }

    /// Defaults plus environment variables only
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(token) = env_var("TELEGRAM_BOT_TOKEN") {
            self.telegram.bot_token = Some(token);
        }
        if let Some(chat_id) = parse_env("TELEGRAM_CHAT_ID")? {
            self.telegram.chat_id = Some(chat_id);
        }
        if let Some(url) = env_var("TELEGRAM_WEBHOOK_URL") {
            self.telegram.webhook_url = Some(url);
        }

        if let Some(provider) = parse_env("LLM_PROVIDER")? {
            self.llm.provider = provider;
        }
        if let Some(api_key) = env_var("GEMINI_API_KEY") {
            self.llm.api_key = Some(api_key);
        }

        if let Some(credentials) = env_var("YOUTUBE_CREDENTIALS") {
            self.youtube.credentials = Some(credentials);
        }

        if let Some(token) = env_var("GITHUB_TOKEN") {
            self.github.token = Some(token);
        }
        if let Some(repo) = env_var("GITHUB_REPO") {
            self.github.repo = Some(repo);
        }

        if let Some(video_type) = parse_env("VIDEO_TYPE")? {
            self.auto.video_type = video_type;
        }
        if let Some(port) = parse_env("PORT")? {
            self.server.port = port;
        }

        if let Some(dir) = env_var("HVB_PRODUCTIONS_DIR") {
            self.paths.productions_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("HVB_OUTPUT_DIR") {
            self.paths.output_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("HVB_SEGMENTS_DIR") {
            self.paths.segments_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("HVB_MEDIA_DIR") {
            self.paths.media_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_var("HVB_CLIPS_DIR") {
            self.paths.clips_dir = PathBuf::from(dir);
        }

        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self, path: &str) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path);
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let collection = &self.collection;
        if collection.poll_timeout_secs == 0 {
            return Err(anyhow!("poll_timeout_secs must be greater than 0"));
        }
        if collection.cancel_check_interval_secs == 0 {
            return Err(anyhow!("cancel_check_interval_secs must be greater than 0"));
        }
        if collection.text_timeout_secs == 0 || collection.script_timeout_secs == 0 {
            return Err(anyhow!("field timeouts must be greater than 0"));
        }
        if collection.retry_backoff_secs > collection.max_backoff_secs {
            return Err(anyhow!("retry_backoff_secs cannot exceed max_backoff_secs"));
        }

        if self.video.segment_seconds <= 0.0 {
            return Err(anyhow!("segment_seconds must be greater than 0"));
        }
        if self.video.fps == 0 {
            return Err(anyhow!("fps must be greater than 0"));
        }
        if self.tts.attempts == 0 {
            return Err(anyhow!("tts attempts must be greater than 0"));
        }

        if let Some(repo) = &self.github.repo {
            if repo.split('/').filter(|part| !part.is_empty()).count() != 2 {
                return Err(anyhow!("GITHUB_REPO must look like owner/name, got '{}'", repo));
            }
        }

        tracing::info!("✅ Configuration validation passed");
        Ok(())
    }

    /// Bot token and chat id, required by every chat-driven command
    pub fn require_telegram(&self) -> Result<(String, i64)> {
        let token = self
            .telegram
            .bot_token
            .clone()
            .ok_or_else(|| anyhow!("TELEGRAM_BOT_TOKEN is not configured"))?;
        let chat_id = self
            .telegram
            .chat_id
            .ok_or_else(|| anyhow!("TELEGRAM_CHAT_ID is not configured"))?;
        Ok((token, chat_id))
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "History Video Bot Configuration:\n\
            - Telegram: {}\n\
            - Chat ID: {}\n\
            - LLM Provider: {:?} ({})\n\
            - TTS Voice: {}\n\
            - Segment Length: {}s\n\
            - Productions Directory: {}\n\
            - Output Directory: {}\n\
            - YouTube Credentials: {}\n\
            - GitHub Repository: {}\n\
            - Auto Video Type: {}",
            if self.telegram.bot_token.is_some() { "configured" } else { "missing" },
            self.telegram
                .chat_id
                .map(|id| id.to_string())
                .unwrap_or_else(|| "missing".to_string()),
            self.llm.provider,
            self.llm.model,
            self.tts.voice,
            self.video.segment_seconds,
            self.paths.productions_dir.display(),
            self.paths.output_dir.display(),
            if self.youtube.credentials.is_some() { "configured" } else { "missing" },
            self.github.repo.as_deref().unwrap_or("none"),
            self.auto.video_type
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_telegram(mut self, bot_token: &str, chat_id: i64) -> Self {
        self.config.telegram.bot_token = Some(bot_token.to_string());
        self.config.telegram.chat_id = Some(chat_id);
        self
    }

    /// Root every working directory under `root`
    pub fn with_work_dir(mut self, root: &Path) -> Self {
        let paths = &mut self.config.paths;
        paths.productions_dir = root.join("productions");
        paths.output_dir = root.join("output");
        paths.segments_dir = root.join("segments");
        paths.media_dir = root.join("media");
        paths.clips_dir = root.join("assets").join("genericas");
        paths.upload_log = root.join("videos_log.json");
        self
    }

    pub fn with_collection(mut self, collection: CollectionConfig) -> Self {
        self.config.collection = collection;
        self
    }

    pub fn with_video_type(mut self, video_type: VideoType) -> Self {
        self.config.auto.video_type = video_type;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.collection.text_timeout_secs, 600);
        assert_eq!(config.collection.script_timeout_secs, 900);
        assert_eq!(config.collection.cancel_check_interval_secs, 5);
        assert_eq!(config.tts.voice, "en-US-AndrewMultilingualNeural");
        assert_eq!(config.video.segment_seconds, 30.0);
        assert_eq!(
            config.paths.pending_thumbnails(),
            PathBuf::from("output/pending_thumbnails.json")
        );
    }

    #[test]
    fn test_config_builder() {
        let config = ConfigBuilder::new()
            .with_telegram("123:abc", 42)
            .with_work_dir(Path::new("/tmp/hvb"))
            .with_video_type(VideoType::Long)
            .build();

        assert_eq!(config.require_telegram().unwrap(), ("123:abc".to_string(), 42));
        assert_eq!(config.paths.productions_dir, PathBuf::from("/tmp/hvb/productions"));
        assert_eq!(config.auto.video_type, VideoType::Long);
    }

    #[test]
    fn test_config_validation() {
        let config = Config::default();
        assert!(config.validate().is_ok());

        let mut config = Config::default();
        config.collection.poll_timeout_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.github.repo = Some("no-slash".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            [telegram]
            chat_id = 7

            [collection]
            text_timeout_secs = 60
            "#,
        )
        .unwrap();

        assert_eq!(config.telegram.chat_id, Some(7));
        assert_eq!(config.telegram.api_base, "https://api.telegram.org");
        assert_eq!(config.collection.text_timeout_secs, 60);
        assert_eq!(config.collection.script_timeout_secs, 900);
    }

    #[test]
    fn test_video_type_parse() {
        assert_eq!("SHORT".parse::<VideoType>().unwrap(), VideoType::Short);
        assert_eq!(" long ".parse::<VideoType>().unwrap(), VideoType::Long);
        assert!("medium".parse::<VideoType>().is_err());
    }

    #[test]
    fn test_missing_telegram_is_reported() {
        let config = Config::default();
        let err = config.require_telegram().unwrap_err();
        assert!(err.to_string().contains("TELEGRAM_BOT_TOKEN"));
    }
}
