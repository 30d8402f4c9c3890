use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::TtsConfig;

/// A text-to-speech engine writing an audio file
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    fn name(&self) -> &'static str;

    async fn synthesize(&self, text: &str, output: &Path) -> Result<()>;
}

/// Write the text to a temporary file so long scripts never hit argv limits
fn text_file(text: &str) -> Result<tempfile::NamedTempFile> {
    let mut file = tempfile::Builder::new().suffix(".txt").tempfile()?;
    file.write_all(text.as_bytes())?;
    file.flush()?;
    Ok(file)
}

async fn run_tool(command: &mut tokio::process::Command, tool: &str) -> Result<()> {
    let output = command
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to start {}", tool))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(anyhow!("{} failed ({}): {}", tool, output.status, stderr.trim()));
    }
    Ok(())
}

/// Microsoft Edge neural voices through the `edge-tts` command line
pub struct EdgeTts {
    command: String,
    voice: String,
    rate: String,
    pitch: String,
}

impl EdgeTts {
    pub fn new(command: &str, voice: &str, rate: &str, pitch: &str) -> Self {
        Self {
            command: command.to_string(),
            voice: voice.to_string(),
            rate: rate.to_string(),
            pitch: pitch.to_string(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for EdgeTts {
    fn name(&self) -> &'static str {
        "Edge TTS"
    }

    async fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        let input = text_file(text)?;
        run_tool(
            tokio::process::Command::new(&self.command)
                .arg("--voice")
                .arg(&self.voice)
                .arg(format!("--rate={}", self.rate))
                .arg(format!("--pitch={}", self.pitch))
                .arg("--file")
                .arg(input.path())
                .arg("--write-media")
                .arg(output),
            &self.command,
        )
        .await
    }
}

/// Google Translate voice through `gtts-cli`
pub struct GoogleTts {
    command: String,
    language: String,
}

impl GoogleTts {
    pub fn new(command: &str, language: &str) -> Self {
        Self {
            command: command.to_string(),
            language: language.to_string(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTts {
    fn name(&self) -> &'static str {
        "gTTS"
    }

    async fn synthesize(&self, text: &str, output: &Path) -> Result<()> {
        let input = text_file(text)?;
        run_tool(
            tokio::process::Command::new(&self.command)
                .arg("--file")
                .arg(input.path())
                .arg("--lang")
                .arg(&self.language)
                .arg("--output")
                .arg(output),
            &self.command,
        )
        .await
    }
}

/// Narration with bounded retries on the primary engine and a fallback engine
pub struct Narrator {
    primary: Box<dyn SpeechSynthesizer>,
    fallback: Option<Box<dyn SpeechSynthesizer>>,
    attempts: u32,
    attempt_timeout: Duration,
    retry_pause: Duration,
}

impl Narrator {
    pub fn new(
        primary: Box<dyn SpeechSynthesizer>,
        fallback: Option<Box<dyn SpeechSynthesizer>>,
        attempts: u32,
        attempt_timeout: Duration,
        retry_pause: Duration,
    ) -> Self {
        Self {
            primary,
            fallback,
            attempts: attempts.max(1),
            attempt_timeout,
            retry_pause,
        }
    }

    /// Edge TTS with `voice`, falling back to gTTS in `fallback_language`
    pub fn with_voice(config: &TtsConfig, voice: &str, fallback_language: &str) -> Self {
        Self::new(
            Box::new(EdgeTts::new(&config.edge_tts_command, voice, &config.rate, &config.pitch)),
            Some(Box::new(GoogleTts::new(&config.gtts_command, fallback_language))),
            config.attempts,
            Duration::from_secs(config.attempt_timeout_secs),
            Duration::from_secs(config.retry_pause_secs),
        )
    }

    pub fn from_config(config: &TtsConfig) -> Self {
        Self::with_voice(config, &config.voice, &config.fallback_language)
    }

    /// Synthesize `text` into `output`, returning the file size
    pub async fn narrate(&self, text: &str, output: &Path) -> Result<u64> {
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        info!("🎙️ Generating narration with {}...", self.primary.name());

        for attempt in 1..=self.attempts {
            match self.try_engine(self.primary.as_ref(), text, output).await {
                Ok(bytes) => {
                    info!("✅ {} succeeded on attempt {} ({} bytes)", self.primary.name(), attempt, bytes);
                    return Ok(bytes);
                }
                Err(e) => warn!("⚠️ {} attempt {} failed: {}", self.primary.name(), attempt, e),
            }

            if attempt < self.attempts {
                tokio::time::sleep(self.retry_pause).await;
            }
        }

        let fallback = self
            .fallback
            .as_ref()
            .ok_or_else(|| anyhow!("{} failed after {} attempts", self.primary.name(), self.attempts))?;

        info!("🔄 Falling back to {}", fallback.name());
        let bytes = self
            .try_engine(fallback.as_ref(), text, output)
            .await
            .with_context(|| format!("{} fallback failed", fallback.name()))?;
        warn!("⚠️ Narration produced by fallback engine {}", fallback.name());
        Ok(bytes)
    }

    async fn try_engine(&self, engine: &dyn SpeechSynthesizer, text: &str, output: &Path) -> Result<u64> {
        // A leftover file from a failed attempt must not count as success
        let _ = tokio::fs::remove_file(output).await;

        tokio::time::timeout(self.attempt_timeout, engine.synthesize(text, output))
            .await
            .map_err(|_| anyhow!("timed out after {}s", self.attempt_timeout.as_secs()))??;

        let bytes = tokio::fs::metadata(output)
            .await
            .map(|metadata| metadata.len())
            .unwrap_or(0);
        if bytes == 0 {
            return Err(anyhow!("{} produced an empty file", engine.name()));
        }
        Ok(bytes)
    }
}
