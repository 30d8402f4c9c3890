//! API data models

use serde::{Deserialize, Serialize};

/// Body returned to Telegram for every webhook call
#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct WebhookAck {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookAck {
    pub fn ok() -> Self {
        Self { ok: true, error: None }
    }

    pub fn error(message: String) -> Self {
        Self {
            ok: false,
            error: Some(message),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub service: String,
    pub version: String,
    pub timestamp: String,
}
