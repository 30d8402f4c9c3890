//! Scripted chat transport shared by the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::time::Instant;

use history_video_bot::telegram::types::Chat;
use history_video_bot::telegram::{
    ChatTransport, FileAttachment, Message, PhotoSize, ReplyKeyboard, TransportError, Update,
};

pub const CHAT: i64 = 4242;

/// Message arriving `at` after the transport was created
struct Scripted {
    at: Duration,
    update: Update,
}

#[derive(Debug, Default)]
pub struct Calls {
    pub sent: Vec<String>,
    pub get_updates: usize,
    pub get_file: usize,
    pub downloads: usize,
}

/// Transport replaying a fixed script on tokio's (paused) clock.
///
/// Update ids are assigned in script order starting at 1. Files whose id
/// contains `bad` fail to download.
pub struct MockTransport {
    origin: Instant,
    script: Vec<Scripted>,
    calls: Mutex<Calls>,
    failures: AtomicUsize,
    whole_second_polls: bool,
}

impl MockTransport {
    pub fn new(script: Vec<(Duration, Message)>) -> Self {
        let script = script
            .into_iter()
            .enumerate()
            .map(|(i, (at, message))| Scripted {
                at,
                update: Update {
                    update_id: i as i64 + 1,
                    message: Some(message),
                },
            })
            .collect();

        Self {
            origin: Instant::now(),
            script,
            calls: Mutex::new(Calls::default()),
            failures: AtomicUsize::new(0),
            whole_second_polls: false,
        }
    }

    /// Round every long-poll wait up to whole seconds, like the Bot API does
    pub fn with_whole_second_polls(mut self) -> Self {
        self.whole_second_polls = true;
        self
    }

    pub fn silent() -> Self {
        Self::new(Vec::new())
    }

    /// Make the next `count` calls to `get_updates` fail
    pub fn fail_next(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<String> {
        self.calls.lock().unwrap().sent.clone()
    }

    pub fn sent_containing(&self, needle: &str) -> usize {
        self.sent().iter().filter(|text| text.contains(needle)).count()
    }

    pub fn get_updates_calls(&self) -> usize {
        self.calls.lock().unwrap().get_updates
    }

    pub fn get_file_calls(&self) -> usize {
        self.calls.lock().unwrap().get_file
    }

    pub fn download_calls(&self) -> usize {
        self.calls.lock().unwrap().downloads
    }

    fn arrived(&self, offset: i64) -> (Vec<Update>, Option<Duration>) {
        let now = Instant::now() - self.origin;
        let ready = self
            .script
            .iter()
            .filter(|s| s.at <= now && s.update.update_id >= offset)
            .map(|s| s.update.clone())
            .collect();
        let next = self
            .script
            .iter()
            .filter(|s| s.at > now && s.update.update_id >= offset)
            .map(|s| s.at)
            .min();
        (ready, next)
    }
}

#[async_trait]
impl ChatTransport for MockTransport {
    async fn send_message(
        &self,
        _chat_id: i64,
        text: &str,
        _keyboard: Option<&ReplyKeyboard>,
    ) -> Result<(), TransportError> {
        self.calls.lock().unwrap().sent.push(text.to_string());
        Ok(())
    }

    async fn get_updates(&self, offset: i64, wait: Duration) -> Result<Vec<Update>, TransportError> {
        self.calls.lock().unwrap().get_updates += 1;

        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(TransportError::Api {
                code: Some(502),
                description: "Bad Gateway".into(),
            });
        }

        if offset < 0 {
            let (ready, _) = self.arrived(0);
            return Ok(ready.last().cloned().into_iter().collect());
        }

        let wait = if self.whole_second_polls {
            Duration::from_secs_f64(wait.as_secs_f64().ceil())
        } else {
            wait
        };
        let deadline = Instant::now() + wait;
        loop {
            let (ready, next) = self.arrived(offset);
            if !ready.is_empty() || Instant::now() >= deadline {
                return Ok(ready);
            }
            let wake = match next {
                Some(at) => (self.origin + at).min(deadline),
                None => deadline,
            };
            tokio::time::sleep_until(wake).await;
        }
    }

    async fn get_file(&self, file_id: &str) -> Result<String, TransportError> {
        self.calls.lock().unwrap().get_file += 1;
        Ok(format!("photos/{}.jpg", file_id))
    }

    async fn download_file(&self, remote_path: &str, dest: &Path) -> Result<u64, TransportError> {
        self.calls.lock().unwrap().downloads += 1;
        if remote_path.contains("bad") {
            return Err(TransportError::Api {
                code: Some(400),
                description: "file is temporarily unavailable".into(),
            });
        }
        std::fs::write(dest, b"jpeg")?;
        Ok(4)
    }
}

pub fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

pub fn text(at: f64, body: &str) -> (Duration, Message) {
    (secs(at), Message::text(CHAT, body))
}

pub fn text_from(at: f64, chat_id: i64, body: &str) -> (Duration, Message) {
    (secs(at), Message::text(chat_id, body))
}

pub fn photo(at: f64, file_id: &str) -> (Duration, Message) {
    let message = Message {
        chat: Chat { id: CHAT },
        photo: Some(vec![PhotoSize {
            file_id: file_id.to_string(),
            width: 1280,
            height: 720,
            file_size: None,
        }]),
        ..Default::default()
    };
    (secs(at), message)
}

pub fn audio(at: f64, file_id: &str) -> (Duration, Message) {
    let message = Message {
        chat: Chat { id: CHAT },
        audio: Some(FileAttachment {
            file_id: file_id.to_string(),
            mime_type: Some("audio/mpeg".into()),
            ..Default::default()
        }),
        ..Default::default()
    };
    (secs(at), message)
}
