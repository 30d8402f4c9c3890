use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::GitHubConfig;
use crate::production::ProductionRecord;

/// Starts a production run somewhere else
#[async_trait]
pub trait Dispatcher: Send + Sync {
    async fn dispatch(&self, record: &ProductionRecord) -> Result<()>;
}

/// Triggers a workflow through GitHub's `repository_dispatch` event
pub struct GitHubDispatcher {
    url: String,
    token: String,
    event_type: String,
    client: reqwest::Client,
}

impl GitHubDispatcher {
    pub fn new(config: &GitHubConfig) -> Result<Self> {
        let token = config
            .token
            .clone()
            .ok_or_else(|| anyhow!("GITHUB_TOKEN is not configured"))?;
        let repo = config
            .repo
            .as_deref()
            .ok_or_else(|| anyhow!("GITHUB_REPO is not configured"))?;

        let client = reqwest::Client::builder()
            .user_agent(concat!("history-video-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            url: format!("{}/repos/{}/dispatches", config.api_base.trim_end_matches('/'), repo),
            token,
            event_type: config.event_type.clone(),
            client,
        })
    }

    pub fn payload(&self, record: &ProductionRecord) -> Result<serde_json::Value> {
        Ok(serde_json::json!({
            "event_type": self.event_type,
            "client_payload": serde_json::to_value(record)?,
        }))
    }
}

#[async_trait]
impl Dispatcher for GitHubDispatcher {
    async fn dispatch(&self, record: &ProductionRecord) -> Result<()> {
        let response = self
            .client
            .post(&self.url)
            .header("Authorization", format!("token {}", self.token))
            .header("Accept", "application/vnd.github.v3+json")
            .json(&self.payload(record)?)
            .timeout(Duration::from_secs(15))
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::NO_CONTENT {
            let body = response.text().await.unwrap_or_default();
            warn!("❌ Failed to trigger workflow: {} {}", status, body);
            return Err(anyhow!("GitHub dispatch failed with {}: {}", status, body));
        }

        info!("✅ Workflow triggered for {}", record.video_id);
        Ok(())
    }
}
