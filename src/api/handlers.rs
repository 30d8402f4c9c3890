//! API request handlers

use tracing::warn;

use super::models::{HealthStatus, WebhookAck};
use crate::bot::BotHandler;
use crate::telegram::Update;

pub fn health_check() -> HealthStatus {
    HealthStatus {
        status: "ok".to_string(),
        service: "history-video-bot".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().to_rfc3339(),
    }
}

/// Handle one pushed update. Errors are acknowledged rather than returned
/// as HTTP failures so Telegram does not redeliver the update.
pub async fn handle_webhook(handler: &BotHandler, update: &Update) -> WebhookAck {
    match handler.handle_update(update).await {
        Ok(()) => WebhookAck::ok(),
        Err(e) => {
            warn!("Error in webhook: {:#}", e);
            WebhookAck::error(e.to_string())
        }
    }
}
