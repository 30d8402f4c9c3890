//! Webhook server for the request bot
//!
//! Telegram pushes updates to `POST /webhook`; they are handled by the same
//! [`BotHandler`] the polling loop uses.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::bot::BotHandler;
use crate::config::Config;
use crate::telegram::TelegramClient;

pub mod handlers;
pub mod models;
pub mod server;

/// HTTP server receiving Telegram webhook calls
pub struct ApiServer {
    handler: Arc<BotHandler>,
    config: Arc<Config>,
}

impl ApiServer {
    pub fn new(handler: Arc<BotHandler>, config: Arc<Config>) -> Self {
        Self { handler, config }
    }

    /// Register the webhook when a public URL is configured, then serve
    pub async fn start(self) -> Result<()> {
        if let Some(base) = &self.config.telegram.webhook_url {
            let url = format!("{}/webhook", base.trim_end_matches('/'));
            let client = TelegramClient::from_config(&self.config.telegram)?;
            match client.set_webhook(&url).await {
                Ok(_) => info!("✅ Webhook set successfully: {}", url),
                Err(e) => warn!("❌ Failed to set webhook: {}", e),
            }
        }

        server::start_http_server(self.handler, &self.config.server.host, self.config.server.port).await
    }
}
