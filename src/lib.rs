/// History Video Bot
///
/// Narrated history video production: scripts and media are gathered from an
/// operator over a Telegram chat (or generated by an LLM), narrated with a
/// TTS engine, assembled with ffmpeg and published to YouTube.

pub mod audio;
pub mod bot;
pub mod collector;
pub mod config;
pub mod llm;
pub mod media;
pub mod pipeline;
pub mod production;
pub mod setup;
pub mod telegram;
pub mod tts;
pub mod video;
pub mod youtube;

#[cfg(feature = "api")]
pub mod api;

// Re-export main types for easy access
pub use crate::collector::{FieldOutcome, FieldRequest, Session, SessionSettings};
pub use crate::config::{Config, VideoType};
pub use crate::llm::{LLMConfig, LLMProvider};
pub use crate::pipeline::{AutoProducer, ProductionOutcome, VideoProducer};
pub use crate::production::{ProductionRecord, ProductionStatus, ProductionStore};
pub use crate::telegram::{ChatTransport, TelegramClient};
