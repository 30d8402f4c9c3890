use super::{ChatMessage, LLMConfig, LLMProvider, LLMResponse, LLM};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

const OPENAI_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
const LMSTUDIO_ENDPOINT: &str = "http://localhost:1234/v1/chat/completions";
const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

fn http_client(config: &LLMConfig) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_seconds))
        .build()?)
}

async fn error_for_status(response: reqwest::Response, name: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    Err(anyhow!("{} API error {}: {}", name, status, text))
}

/// OpenAI-style `/chat/completions` endpoint, used by OpenAI and LM Studio
pub struct ChatCompletionsProvider {
    config: LLMConfig,
    client: reqwest::Client,
    endpoint: String,
    provider: LLMProvider,
}

#[derive(Debug, Serialize)]
struct ChatCompletionsRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsResponse {
    choices: Vec<ChatCompletionsChoice>,
    usage: Option<ChatCompletionsUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionsUsage {
    total_tokens: u32,
}

impl ChatCompletionsProvider {
    pub fn openai(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("OpenAI API key required"));
        }
        let endpoint = config.endpoint.clone().unwrap_or_else(|| OPENAI_ENDPOINT.to_string());
        Ok(Self {
            client: http_client(&config)?,
            config,
            endpoint,
            provider: LLMProvider::OpenAI,
        })
    }

    pub fn lmstudio(config: LLMConfig) -> Result<Self> {
        let endpoint = config.endpoint.clone().unwrap_or_else(|| LMSTUDIO_ENDPOINT.to_string());
        Ok(Self {
            client: http_client(&config)?,
            config,
            endpoint,
            provider: LLMProvider::LMStudio,
        })
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_key {
            Some(api_key) => request.bearer_auth(api_key),
            None => request,
        }
    }
}

#[async_trait]
impl LLM for ChatCompletionsProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let request = ChatCompletionsRequest {
            model: self.config.model.clone(),
            messages,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!("Sending request to {} at {}", self.name(), self.endpoint);

        let response = self
            .authorized(self.client.post(&self.endpoint))
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(response, self.name()).await?;

        let completion: ChatCompletionsResponse = response.json().await?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No response from {}", self.name()))?
            .message
            .content;

        Ok(LLMResponse {
            content,
            tokens_used: completion.usage.map(|u| u.total_tokens),
        })
    }

    fn name(&self) -> &'static str {
        match self.provider {
            LLMProvider::OpenAI => "OpenAI",
            _ => "LM Studio",
        }
    }
}

/// Gemini `generateContent` provider
pub struct GeminiProvider {
    config: LLMConfig,
    client: reqwest::Client,
}

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(rename = "generationConfig")]
    generation_config: GeminiGenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
struct GeminiGenerationConfig {
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(rename = "usageMetadata")]
    usage_metadata: Option<GeminiUsage>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

#[derive(Debug, Deserialize)]
struct GeminiUsage {
    #[serde(rename = "totalTokenCount")]
    total_token_count: u32,
}

impl GeminiProvider {
    pub fn new(config: LLMConfig) -> Result<Self> {
        if config.api_key.is_none() {
            return Err(anyhow!("Gemini API key required (GEMINI_API_KEY)"));
        }

        Ok(Self {
            client: http_client(&config)?,
            config,
        })
    }

    fn base(&self) -> &str {
        self.config.endpoint.as_deref().unwrap_or(GEMINI_BASE)
    }
}

/// A lone user message is sent verbatim, a conversation as role-prefixed lines
fn flatten_messages(messages: &[ChatMessage]) -> String {
    match messages {
        [single] => single.content.clone(),
        _ => messages
            .iter()
            .map(|msg| format!("{}: {}", msg.role, msg.content))
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

#[async_trait]
impl LLM for GeminiProvider {
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<LLMResponse> {
        let api_key = self
            .config
            .api_key
            .as_ref()
            .ok_or_else(|| anyhow!("Gemini API key not configured"))?;

        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: flatten_messages(&messages),
                }],
            }],
            generation_config: GeminiGenerationConfig {
                max_output_tokens: self.config.max_tokens,
                temperature: self.config.temperature,
            },
        };

        let url = format!("{}/models/{}:generateContent", self.base(), self.config.model);

        debug!("Sending request to Gemini API ({})", self.config.model);

        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&request)
            .send()
            .await?;
        let response = error_for_status(response, "Gemini").await?;

        let gemini_response: GeminiResponse = response.json().await?;

        let content = gemini_response
            .candidates
            .first()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .iter()
                    .map(|part| part.text.as_str())
                    .collect::<String>()
            })
            .filter(|text| !text.trim().is_empty())
            .ok_or_else(|| anyhow!("No response from Gemini"))?;

        Ok(LLMResponse {
            content,
            tokens_used: gemini_response.usage_metadata.map(|u| u.total_token_count),
        })
    }

    fn name(&self) -> &'static str {
        "Gemini"
    }
}
