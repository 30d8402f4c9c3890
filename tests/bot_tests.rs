mod common;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

use common::{MockTransport, CHAT};
use history_video_bot::bot::{BotHandler, Dispatcher};
use history_video_bot::telegram::Message;
use history_video_bot::{ProductionRecord, ProductionStatus, ProductionStore};

#[derive(Default)]
struct RecordingDispatcher {
    dispatched: Mutex<Vec<String>>,
    fail: bool,
}

#[async_trait]
impl Dispatcher for RecordingDispatcher {
    async fn dispatch(&self, record: &ProductionRecord) -> Result<()> {
        if self.fail {
            return Err(anyhow!("dispatch refused"));
        }
        self.dispatched.lock().unwrap().push(record.video_id.clone());
        Ok(())
    }
}

struct Fixture {
    _dir: TempDir,
    store: ProductionStore,
    transport: Arc<MockTransport>,
    dispatcher: Arc<RecordingDispatcher>,
    handler: BotHandler,
}

fn fixture(fail_dispatch: bool) -> Fixture {
    let dir = TempDir::new().unwrap();
    let store = ProductionStore::new(dir.path().to_path_buf());
    let transport = Arc::new(MockTransport::silent());
    let dispatcher = Arc::new(RecordingDispatcher {
        fail: fail_dispatch,
        ..Default::default()
    });
    let handler = BotHandler::new(transport.clone(), store.clone(), dispatcher.clone(), Some(CHAT), 5);

    Fixture {
        _dir: dir,
        store,
        transport,
        dispatcher,
        handler,
    }
}

const REQUEST: &str = "TITLE: The Silent Heroes\n\
    DESCRIPTION: Untold stories.\n\
    TAGS: WWII, D-Day\n\
    SCRIPT:\n\
    June 6th, 1944.\n\
    The beaches bore witness.";

#[tokio::test]
async fn test_unauthorized_chat_is_rejected() {
    let f = fixture(false);
    f.handler.handle_message(&Message::text(1, REQUEST)).await.unwrap();

    assert_eq!(f.transport.sent(), vec!["⛔ Unauthorized access".to_string()]);
    assert!(f.dispatcher.dispatched.lock().unwrap().is_empty());
    assert!(f.store.list_recent(5).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_start_shows_help() {
    let f = fixture(false);
    f.handler.handle_message(&Message::text(CHAT, "/start")).await.unwrap();
    assert_eq!(f.transport.sent_containing("How to create a video"), 1);
}

#[tokio::test]
async fn test_request_is_saved_and_dispatched() {
    let f = fixture(false);
    f.handler.handle_message(&Message::text(CHAT, REQUEST)).await.unwrap();

    let records = f.store.list_recent(5).await.unwrap();
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.title, "The Silent Heroes");
    assert_eq!(record.tags, vec!["WWII", "D-Day"]);
    assert_eq!(record.script, "June 6th, 1944.\nThe beaches bore witness.");
    assert_eq!(record.status, ProductionStatus::Pending);

    assert_eq!(*f.dispatcher.dispatched.lock().unwrap(), vec![record.video_id.clone()]);
    assert_eq!(f.transport.sent_containing("Production Started!"), 1);
}

#[tokio::test]
async fn test_request_without_script_is_refused() {
    let f = fixture(false);
    f.handler
        .handle_message(&Message::text(CHAT, "title: Only a title"))
        .await
        .unwrap();

    assert_eq!(f.transport.sent_containing("No script found"), 1);
    assert!(f.dispatcher.dispatched.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_dispatch_keeps_the_record() {
    let f = fixture(true);
    f.handler.handle_message(&Message::text(CHAT, REQUEST)).await.unwrap();

    assert_eq!(f.store.list_recent(5).await.unwrap().len(), 1);
    assert_eq!(f.transport.sent_containing("Failed to start production"), 1);
}

#[tokio::test]
async fn test_status_lists_recent_productions() {
    let f = fixture(false);
    f.handler.handle_message(&Message::text(CHAT, "/status")).await.unwrap();
    assert_eq!(f.transport.sent_containing("No productions yet"), 1);

    let mut record = ProductionRecord::new(
        "Battle of <Midway>".into(),
        String::new(),
        vec![],
        "script".into(),
        ProductionStatus::Published,
    );
    record.url = Some("https://www.youtube.com/watch?v=abc".into());
    f.store.save(&record).await.unwrap();

    f.handler.handle_message(&Message::text(CHAT, "/status")).await.unwrap();
    let status = f.transport.sent().pop().unwrap();
    assert!(status.contains("Battle of &lt;Midway&gt; [published]"));
    assert!(status.contains("watch?v=abc"));
}

#[tokio::test]
async fn test_unknown_text_gets_hint() {
    let f = fixture(false);
    f.handler.handle_message(&Message::text(CHAT, "hello")).await.unwrap();
    assert_eq!(f.transport.sent_containing("Unknown command"), 1);
}
