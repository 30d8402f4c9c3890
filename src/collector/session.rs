use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::attachment::{self, Attachment, MediaKind};
use super::commands::{self, Command};
use super::marker::MarkerStore;
use super::reminder::ReminderSchedule;
use super::request::{parse_tags, Expect, FieldRequest};
use super::{Answer, FieldOutcome, MediaFile};
use crate::config::CollectionConfig;
use crate::telegram::{ChatTransport, Message, ReplyKeyboard, TransportError};

pub const CANCELLED_NOTICE: &str = "🛑 <b>PRODUCTION CANCELLED</b>\n\n\
    The production was cancelled as requested.\n\
    The workflow will stop now.";

const CANCEL_REASON: &str = "User requested cancellation";

/// Timing knobs of a session
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// Longest single long-poll
    pub poll_timeout: Duration,
    /// How often the persisted marker is re-read while waiting
    pub cancel_check_interval: Duration,
    /// First pause after a transport error
    pub retry_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(10),
            cancel_check_interval: Duration::from_secs(5),
            retry_backoff: Duration::from_secs(3),
            max_backoff: Duration::from_secs(30),
        }
    }
}

impl From<&CollectionConfig> for SessionSettings {
    fn from(config: &CollectionConfig) -> Self {
        Self {
            poll_timeout: Duration::from_secs(config.poll_timeout_secs),
            cancel_check_interval: Duration::from_secs(config.cancel_check_interval_secs),
            retry_backoff: Duration::from_secs(config.retry_backoff_secs),
            max_backoff: Duration::from_secs(config.max_backoff_secs),
        }
    }
}

/// One collection run against a single chat.
///
/// Owns the update cursor and the cancellation flag. The cursor only moves
/// forward, so no message is handed to two field requests.
pub struct Session {
    transport: Arc<dyn ChatTransport>,
    chat_id: i64,
    cursor: i64,
    cancelled: bool,
    marker: MarkerStore,
    settings: SessionSettings,
}

impl Session {
    /// Start a fresh collection: clears any previous marker and skips
    /// messages sent before now.
    pub async fn start(
        transport: Arc<dyn ChatTransport>,
        chat_id: i64,
        marker: MarkerStore,
        settings: SessionSettings,
    ) -> Self {
        if let Err(e) = marker.clear() {
            warn!("⚠️ Could not clear previous cancellation marker: {}", e);
        }
        Self::open(transport, chat_id, marker, settings).await
    }

    /// Continue a production started elsewhere. An existing marker means
    /// the session is already cancelled.
    pub async fn resume(
        transport: Arc<dyn ChatTransport>,
        chat_id: i64,
        marker: MarkerStore,
        settings: SessionSettings,
    ) -> Self {
        let session = Self::open(transport, chat_id, marker, settings).await;
        if session.cancelled {
            info!("🛑 Cancellation marker present, session starts cancelled");
        }
        session
    }

    async fn open(
        transport: Arc<dyn ChatTransport>,
        chat_id: i64,
        marker: MarkerStore,
        settings: SessionSettings,
    ) -> Self {
        let cursor = match transport.get_updates(-1, Duration::ZERO).await {
            Ok(updates) => updates.last().map(|update| update.update_id + 1).unwrap_or(0),
            Err(e) => {
                warn!("⚠️ Could not read pending updates, starting at offset 0: {}", e);
                0
            }
        };
        let cancelled = marker.exists();

        info!("📱 Collection session for chat {} starting at offset {}", chat_id, cursor);

        Self {
            transport,
            chat_id,
            cursor,
            cancelled,
            marker,
            settings,
        }
    }

    pub fn chat_id(&self) -> i64 {
        self.chat_id
    }

    /// Offset of the next update this session will read
    pub fn cursor(&self) -> i64 {
        self.cursor
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    pub fn marker(&self) -> &MarkerStore {
        &self.marker
    }

    /// Send a notice; failures are logged and never abort the session
    pub async fn notify(&self, text: &str) -> bool {
        self.notify_with(text, None).await
    }

    pub async fn notify_with(&self, text: &str, keyboard: Option<&ReplyKeyboard>) -> bool {
        match self.transport.send_message(self.chat_id, text, keyboard).await {
            Ok(()) => true,
            Err(e) => {
                warn!("⚠️ Failed to send message: {}", e);
                false
            }
        }
    }

    /// Fetch messages newer than the cursor, waiting at most `wait`.
    ///
    /// The cursor moves past every update seen, including updates without
    /// a message and messages from other chats, which are dropped.
    pub async fn poll_new_messages(&mut self, wait: Duration) -> Result<Vec<Message>, TransportError> {
        let updates = self.transport.get_updates(self.cursor, wait).await?;
        let mut messages = Vec::new();

        for update in updates {
            if update.update_id < self.cursor {
                debug!("Skipping already seen update {}", update.update_id);
                continue;
            }
            self.cursor = update.update_id + 1;

            match update.message {
                Some(message) if message.chat.id == self.chat_id => messages.push(message),
                Some(message) => debug!("Ignoring message from chat {}", message.chat.id),
                None => {}
            }
        }

        Ok(messages)
    }

    /// Look for a cancellation request without waiting.
    ///
    /// Returns `true` right away, with no transport call, once the session
    /// is cancelled or a marker exists. Non-cancel messages read here are
    /// discarded.
    pub async fn check_cancellation(&mut self) -> bool {
        if self.cancelled {
            return true;
        }
        if self.marker.exists() {
            info!("🛑 Cancellation marker detected");
            self.cancelled = true;
            return true;
        }

        match self.poll_new_messages(Duration::ZERO).await {
            Ok(batch) if commands::batch_requests_cancel(&batch) => {
                self.cancel().await;
                true
            }
            Ok(batch) => {
                if !batch.is_empty() {
                    debug!("Discarded {} messages outside a field request", batch.len());
                }
                false
            }
            Err(e) => {
                warn!("⚠️ Failed to check for cancellation: {}", e);
                false
            }
        }
    }

    async fn cancel(&mut self) -> FieldOutcome {
        info!("🛑 Cancellation requested by the operator");
        self.cancelled = true;

        // Best effort: the in-memory flag already stops this session
        if let Err(e) = self.marker.write(CANCEL_REASON) {
            warn!("⚠️ Could not persist cancellation marker: {}", e);
        }

        self.notify(CANCELLED_NOTICE).await;
        FieldOutcome::Cancelled
    }

    /// Send the prompt of `request` and wait until it resolves.
    pub async fn await_field(&mut self, request: &FieldRequest) -> FieldOutcome {
        if self.cancelled {
            debug!("Session cancelled, not requesting {}", request.label);
            return FieldOutcome::Cancelled;
        }

        let keyboard = request.keyboard();
        self.notify_with(&request.prompt, keyboard.as_ref()).await;
        info!("⏳ Waiting for {} (timeout: {}s)", request.label, request.timeout.as_secs());

        let started = Instant::now();
        let mut reminders = ReminderSchedule::new(request.reminder_interval);
        let mut last_marker_check = Duration::ZERO;
        let mut backoff = self.settings.retry_backoff;
        let mut parts: Vec<String> = Vec::new();

        loop {
            let elapsed = started.elapsed();
            if elapsed >= request.timeout {
                return self.resolve_timeout(request, parts).await;
            }

            if elapsed.saturating_sub(last_marker_check) >= self.settings.cancel_check_interval {
                last_marker_check = elapsed;
                if self.marker.exists() {
                    info!("🛑 Cancellation marker detected while waiting for {}", request.label);
                    self.cancelled = true;
                    self.notify(CANCELLED_NOTICE).await;
                    return FieldOutcome::Cancelled;
                }
            }

            if reminders.advance(elapsed).is_some() {
                self.notify(&request.reminder_text(request.timeout - elapsed)).await;
            }

            let wait = self.next_wait(request, &reminders, elapsed, last_marker_check);
            let batch = match self.poll_new_messages(wait).await {
                Ok(batch) => {
                    backoff = self.settings.retry_backoff;
                    batch
                }
                Err(e) => {
                    warn!("⚠️ Failed to fetch updates: {}", e);
                    let remaining = request.timeout.saturating_sub(started.elapsed());
                    tokio::time::sleep(backoff.min(remaining)).await;
                    backoff = (backoff * 2).min(self.settings.max_backoff);
                    continue;
                }
            };

            // Cancellation wins over anything else in the same batch
            if commands::batch_requests_cancel(&batch) {
                return self.cancel().await;
            }

            // The transport may overshoot `wait`; nothing is accepted past the deadline
            if started.elapsed() >= request.timeout {
                if !batch.is_empty() {
                    debug!("Dropping {} messages that arrived after the deadline", batch.len());
                }
                return self.resolve_timeout(request, parts).await;
            }

            for message in &batch {
                if let Some(outcome) = self.evaluate(request, message, &mut parts).await {
                    return outcome;
                }
            }
        }
    }

    /// Longest poll that overshoots neither the timeout, the next reminder
    /// bucket nor the next marker check.
    fn next_wait(
        &self,
        request: &FieldRequest,
        reminders: &ReminderSchedule,
        elapsed: Duration,
        last_marker_check: Duration,
    ) -> Duration {
        let mut wait = (request.timeout - elapsed).min(self.settings.poll_timeout);

        if let Some(until_reminder) = reminders.until_next(elapsed) {
            wait = wait.min(until_reminder);
        }
        if !self.settings.cancel_check_interval.is_zero() {
            let next_check = last_marker_check + self.settings.cancel_check_interval;
            wait = wait.min(next_check.saturating_sub(elapsed));
        }

        wait
    }

    async fn evaluate(
        &mut self,
        request: &FieldRequest,
        message: &Message,
        parts: &mut Vec<String>,
    ) -> Option<FieldOutcome> {
        let command = Command::from_message(message);

        if command == Some(Command::Skip) && request.skippable {
            info!("⏭️ {} skipped", request.label);
            self.notify(&request.skipped_notice).await;
            return Some(FieldOutcome::Skipped);
        }

        let answer = match &request.expect {
            Expect::Text => message.trimmed_text().map(|text| Answer::Text(text.to_string())),
            Expect::Tags => message
                .trimmed_text()
                .map(parse_tags)
                .filter(|tags| !tags.is_empty())
                .map(Answer::Tags),
            Expect::MultipartText if command == Some(Command::Done) => {
                if parts.is_empty() {
                    debug!("Terminator received before any part of {}", request.label);
                    None
                } else {
                    Some(Answer::Text(std::mem::take(parts).join("\n")))
                }
            }
            Expect::MultipartText => {
                if let Some(text) = message.trimmed_text() {
                    parts.push(text.to_string());
                    debug!("Part {} of {} received", parts.len(), request.label);
                }
                None
            }
            Expect::Media { accept, destination } => self
                .receive_media(message, accept, destination)
                .await
                .map(Answer::Media),
        }?;

        info!("✅ {} received", request.label);
        let notice = request.received_notice.replace("{value}", &answer.preview());
        self.notify(&notice).await;
        Some(FieldOutcome::Received(answer))
    }

    async fn receive_media(
        &self,
        message: &Message,
        accept: &[MediaKind],
        destination: &Path,
    ) -> Option<MediaFile> {
        let attachment = attachment::classify(message)?;
        if !accept.contains(&attachment.kind) {
            debug!("Ignoring {} attachment, not accepted here", attachment.kind);
            return None;
        }

        let dest = destination.with_extension(&attachment.extension);
        match self.download(&attachment, &dest).await {
            Ok(bytes) => {
                info!("📥 Media downloaded: {} ({} bytes)", dest.display(), bytes);
                Some(MediaFile {
                    path: dest,
                    kind: attachment.kind,
                })
            }
            Err(e) => {
                warn!("❌ Error downloading media: {}", e);
                None
            }
        }
    }

    async fn download(&self, attachment: &Attachment, dest: &Path) -> Result<u64, TransportError> {
        let remote_path = self.transport.get_file(&attachment.file_id).await?;
        self.transport.download_file(&remote_path, dest).await
    }

    async fn resolve_timeout(&mut self, request: &FieldRequest, parts: Vec<String>) -> FieldOutcome {
        if !parts.is_empty() {
            info!("⏰ {} timed out after {} parts, keeping them", request.label, parts.len());
            let answer = Answer::Text(parts.join("\n"));
            let notice = request.received_notice.replace("{value}", &answer.preview());
            self.notify(&notice).await;
            return FieldOutcome::Received(answer);
        }

        info!("⏰ Timeout waiting for {}", request.label);
        self.notify(&request.timeout_notice).await;
        FieldOutcome::TimedOut
    }
}
