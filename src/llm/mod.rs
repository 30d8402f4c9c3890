pub mod providers;
pub mod script;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

pub use script::{clean_script, ScriptWriter};

/// LLM provider types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    LMStudio,
    Gemini,
    OpenAI,
}

impl FromStr for LLMProvider {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LLMProvider::Gemini),
            "openai" => Ok(LLMProvider::OpenAI),
            "lmstudio" | "lm-studio" => Ok(LLMProvider::LMStudio),
            other => Err(anyhow!("Unknown LLM provider '{}'", other)),
        }
    }
}

/// LLM configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_seconds: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Gemini,
            endpoint: None,
            api_key: None,
            model: "gemini-2.5-flash".to_string(),
            max_tokens: 8192,
            temperature: 0.9, // Narration benefits from some variety
            timeout_seconds: 120,
        }
    }
}

/// Chat message for LLM communication
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// LLM response
#[derive(Debug, Clone)]
pub struct LLMResponse {
    pub content: String,
    pub tokens_used: Option<u32>,
}

/// A text generation backend
#[async_trait]
pub trait LLM: Send + Sync {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse>;

    /// Human readable backend name for logs and errors
    fn name(&self) -> &'static str;
}

/// Build the backend selected in `config`
pub fn create_llm(config: &LLMConfig) -> Result<Box<dyn LLM>> {
    match config.provider {
        LLMProvider::LMStudio => Ok(Box::new(providers::ChatCompletionsProvider::lmstudio(config.clone())?)),
        LLMProvider::Gemini => Ok(Box::new(providers::GeminiProvider::new(config.clone())?)),
        LLMProvider::OpenAI => Ok(Box::new(providers::ChatCompletionsProvider::openai(config.clone())?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_parse() {
        assert_eq!("Gemini".parse::<LLMProvider>().unwrap(), LLMProvider::Gemini);
        assert_eq!("lm-studio".parse::<LLMProvider>().unwrap(), LLMProvider::LMStudio);
        assert!("claude".parse::<LLMProvider>().is_err());
    }

    #[test]
    fn test_provider_toml_name() {
        let config: LLMConfig = toml::from_str("provider = \"openai\"\nmodel = \"gpt-4o-mini\"").unwrap();
        assert_eq!(config.provider, LLMProvider::OpenAI);
        assert_eq!(config.timeout_seconds, 120);
    }
}
