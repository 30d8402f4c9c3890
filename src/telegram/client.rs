use async_trait::async_trait;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use super::types::{ApiResponse, File, SendMessageRequest, User};
use super::{ChatTransport, ReplyKeyboard, TransportError, Update};
use crate::config::TelegramConfig;

/// Extra client-side time allowed on top of a long-poll
const NETWORK_GRACE: Duration = Duration::from_secs(5);

/// Bot API client over HTTPS
#[derive(Clone)]
pub struct TelegramClient {
    api_base: String,
    file_base: String,
    client: reqwest::Client,
}

impl TelegramClient {
    pub fn new(token: &str, api_base: &str) -> Result<Self, TransportError> {
        let api_base = api_base.trim_end_matches('/');
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            api_base: format!("{}/bot{}", api_base, token),
            file_base: format!("{}/file/bot{}", api_base, token),
            client,
        })
    }

    pub fn from_config(config: &TelegramConfig) -> anyhow::Result<Self> {
        let token = config
            .bot_token
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN is not configured"))?;
        Ok(Self::new(token, &config.api_base)?)
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.api_base, method)
    }

    async fn decode<T: DeserializeOwned>(
        response: reqwest::Response,
        method: &'static str,
    ) -> Result<T, TransportError> {
        let envelope: ApiResponse<T> = response.json().await?;
        if !envelope.ok {
            return Err(TransportError::Api {
                code: envelope.error_code,
                description: envelope.description.unwrap_or_default(),
            });
        }
        envelope.result.ok_or(TransportError::EmptyResult(method))
    }

    /// Identity of the bot behind the token
    pub async fn get_me(&self) -> Result<User, TransportError> {
        let response = self
            .client
            .get(self.method_url("getMe"))
            .timeout(Duration::from_secs(10))
            .send()
            .await?;
        Self::decode(response, "getMe").await
    }

    /// Point Telegram's webhook at `url`
    pub async fn set_webhook(&self, url: &str) -> Result<bool, TransportError> {
        let response = self
            .client
            .post(self.method_url("setWebhook"))
            .json(&serde_json::json!({ "url": url }))
            .timeout(Duration::from_secs(15))
            .send()
            .await?;
        Self::decode(response, "setWebhook").await
    }
}

#[async_trait]
impl ChatTransport for TelegramClient {
    async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TransportError> {
        let request = SendMessageRequest {
            chat_id,
            text,
            parse_mode: "HTML",
            reply_markup: keyboard,
        };

        let response = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&request)
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let _: serde_json::Value = Self::decode(response, "sendMessage").await?;
        debug!("Message sent to chat {}", chat_id);
        Ok(())
    }

    async fn get_updates(&self, offset: i64, wait: Duration) -> Result<Vec<Update>, TransportError> {
        // Long-poll granularity is whole seconds; round up so short waits still block
        let mut poll_secs = wait.as_secs();
        if wait.subsec_nanos() > 0 {
            poll_secs += 1;
        }

        let response = self
            .client
            .get(self.method_url("getUpdates"))
            .query(&[("offset", offset.to_string()), ("timeout", poll_secs.to_string())])
            .timeout(Duration::from_secs(poll_secs) + NETWORK_GRACE)
            .send()
            .await?;

        Self::decode(response, "getUpdates").await
    }

    async fn get_file(&self, file_id: &str) -> Result<String, TransportError> {
        let response = self
            .client
            .get(self.method_url("getFile"))
            .query(&[("file_id", file_id)])
            .timeout(Duration::from_secs(10))
            .send()
            .await?;

        let file: File = Self::decode(response, "getFile").await?;
        file.file_path.ok_or(TransportError::EmptyResult("getFile"))
    }

    async fn download_file(&self, remote_path: &str, dest: &Path) -> Result<u64, TransportError> {
        let response = self
            .client
            .get(format!("{}/{}", self.file_base, remote_path))
            .timeout(Duration::from_secs(120))
            .send()
            .await?
            .error_for_status()?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let written = save_stream(response.bytes_stream(), dest).await?;
        debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(written)
    }
}

/// Write `stream` to `dest`, removing the file again if any chunk fails
async fn save_stream<S, B, E>(stream: S, dest: &Path) -> Result<u64, TransportError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<TransportError>,
{
    let result = write_stream(stream, dest).await;
    if result.is_err() {
        // A truncated download must not look like a received file
        let _ = tokio::fs::remove_file(dest).await;
    }
    result
}

async fn write_stream<S, B, E>(stream: S, dest: &Path) -> Result<u64, TransportError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<TransportError>,
{
    futures::pin_mut!(stream);
    let mut file = tokio::fs::File::create(dest).await?;
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::<TransportError>::into)?;
        file.write_all(chunk.as_ref()).await?;
        written += chunk.as_ref().len() as u64;
    }
    file.flush().await?;
    Ok(written)
}
