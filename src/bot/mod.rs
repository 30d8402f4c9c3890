//! Request bot
//!
//! Answers `/start` and `/status` and turns `TITLE:` messages into pending
//! production records that are handed to a [`Dispatcher`].

pub mod dispatch;
pub mod request;

use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub use dispatch::{Dispatcher, GitHubDispatcher};
pub use request::{is_production_request, parse_production_message, ProductionRequest};

use crate::production::ProductionStore;
use crate::telegram::{escape_html, ChatTransport, Message, Update};

const HELP: &str = "🎬 <b>WWII History Video Production Bot</b>\n\n\
    📝 <b>How to create a video:</b>\n\n\
    Send your production request in this format:\n\n\
    <code>TITLE: Your video title\n\
    DESCRIPTION: Your video description\n\
    TAGS: tag1, tag2, tag3\n\
    SCRIPT:\n\
    Your complete narration script here...</code>\n\n\
    The bot will:\n\
    1️⃣ Generate audio from script\n\
    2️⃣ Request media for each 30s segment\n\
    3️⃣ Create and upload the video\n\n\
    🔔 Commands:\n\
    /start - Show this message\n\
    /status - Check production status";

const UNAUTHORIZED: &str = "⛔ Unauthorized access";

/// Handles messages sent to the request bot
pub struct BotHandler {
    transport: Arc<dyn ChatTransport>,
    store: ProductionStore,
    dispatcher: Arc<dyn Dispatcher>,
    authorized_chat: Option<i64>,
    status_limit: usize,
}

impl BotHandler {
    pub fn new(
        transport: Arc<dyn ChatTransport>,
        store: ProductionStore,
        dispatcher: Arc<dyn Dispatcher>,
        authorized_chat: Option<i64>,
        status_limit: usize,
    ) -> Self {
        Self {
            transport,
            store,
            dispatcher,
            authorized_chat,
            status_limit,
        }
    }

    async fn reply(&self, chat_id: i64, text: &str) {
        if let Err(e) = self.transport.send_message(chat_id, text, None).await {
            warn!("⚠️ Failed to reply to chat {}: {}", chat_id, e);
        }
    }

    pub async fn handle_update(&self, update: &Update) -> Result<()> {
        match &update.message {
            Some(message) => self.handle_message(message).await,
            None => Ok(()),
        }
    }

    pub async fn handle_message(&self, message: &Message) -> Result<()> {
        let chat_id = message.chat.id;
        if self.authorized_chat != Some(chat_id) {
            info!("⛔ Rejected message from chat {}", chat_id);
            self.reply(chat_id, UNAUTHORIZED).await;
            return Ok(());
        }

        let text = message.text.as_deref().unwrap_or("").trim();
        if text.starts_with("/start") {
            self.reply(chat_id, HELP).await;
        } else if text.starts_with("/status") {
            self.send_status(chat_id).await?;
        } else if is_production_request(text) {
            self.start_production(chat_id, text).await?;
        } else {
            self.reply(chat_id, "❓ Unknown command\n\nUse /start to see instructions")
                .await;
        }
        Ok(())
    }

    async fn send_status(&self, chat_id: i64) -> Result<()> {
        let records = self.store.list_recent(self.status_limit).await?;
        if records.is_empty() {
            self.reply(chat_id, "📊 No productions yet.").await;
            return Ok(());
        }

        let mut text = String::from("📊 <b>Latest productions</b>\n");
        for record in &records {
            text.push_str(&format!(
                "\n• <code>{}</code> {} [{}]",
                record.video_id,
                escape_html(&record.title),
                record.status
            ));
            if let Some(url) = &record.url {
                text.push_str(&format!("\n  🔗 {}", url));
            }
        }
        self.reply(chat_id, &text).await;
        Ok(())
    }

    async fn start_production(&self, chat_id: i64, text: &str) -> Result<()> {
        self.reply(chat_id, "📋 Processing your production request...").await;

        let request = parse_production_message(text);
        let today = chrono::Local::now().date_naive();
        let Some(record) = request.into_record(chat_id, today) else {
            self.reply(chat_id, "❌ No script found. Please include SCRIPT: section")
                .await;
            return Ok(());
        };

        self.store.save(&record).await?;

        match self.dispatcher.dispatch(&record).await {
            Ok(()) => {
                self.reply(
                    chat_id,
                    &format!(
                        "✅ <b>Production Started!</b>\n\n\
                         🎬 Video ID: <code>{}</code>\n\
                         📝 Title: {}\n\
                         ⏱️ Script length: {} chars\n\n\
                         🔄 GitHub Actions workflow triggered\n\
                         📱 You'll receive media requests soon...",
                        record.video_id,
                        escape_html(&record.title),
                        record.script.chars().count()
                    ),
                )
                .await;
            }
            Err(e) => {
                warn!("❌ Could not start production {}: {}", record.video_id, e);
                self.reply(
                    chat_id,
                    "❌ <b>Failed to start production</b>\n\n\
                     Please check GitHub Actions or contact support.",
                )
                .await;
            }
        }
        Ok(())
    }

    /// Long-poll for updates until Ctrl-C
    pub async fn serve(&self, poll_timeout: Duration) -> Result<()> {
        info!("🤖 Request bot polling for updates");
        let mut offset = 0;
        let mut backoff = Duration::from_secs(3);

        loop {
            let updates = tokio::select! {
                _ = tokio::signal::ctrl_c() => {
                    info!("👋 Shutting down request bot");
                    return Ok(());
                }
                result = self.transport.get_updates(offset, poll_timeout) => result,
            };

            let updates = match updates {
                Ok(updates) => {
                    backoff = Duration::from_secs(3);
                    updates
                }
                Err(e) => {
                    warn!("⚠️ Failed to fetch updates: {}", e);
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(Duration::from_secs(30));
                    continue;
                }
            };

            for update in updates {
                offset = offset.max(update.update_id + 1);
                debug!("Handling update {}", update.update_id);
                if let Err(e) = self.handle_update(&update).await {
                    warn!("❌ Error handling update {}: {:#}", update.update_id, e);
                }
            }
        }
    }
}
