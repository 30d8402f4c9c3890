mod common;

use std::sync::Arc;
use tempfile::TempDir;

use common::{MockTransport, CHAT};
use history_video_bot::{
    Config, ProductionRecord, ProductionStatus, ProductionStore, Session, SessionSettings, VideoProducer,
};

fn offline_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.paths.productions_dir = dir.path().join("productions");
    config.paths.output_dir = dir.path().join("output");
    config.paths.segments_dir = dir.path().join("segments");
    config.paths.media_dir = dir.path().join("media");

    // Neither engine exists, so narration fails right away
    config.tts.edge_tts_command = dir.path().join("no-edge-tts").display().to_string();
    config.tts.gtts_command = dir.path().join("no-gtts").display().to_string();
    config.tts.attempts = 1;
    config.tts.retry_pause_secs = 0;
    config
}

#[tokio::test]
async fn test_failed_production_is_reported_once_and_stored() {
    let dir = TempDir::new().unwrap();
    let config = offline_config(&dir);
    let store = ProductionStore::new(config.paths.productions_dir.clone());

    let record = ProductionRecord::new(
        "The Silent Heroes".into(),
        "Untold stories.".into(),
        vec!["WWII".into()],
        "June 6th, 1944.".into(),
        ProductionStatus::Collected,
    );
    store.save(&record).await.unwrap();

    let transport = Arc::new(MockTransport::silent());
    let mut session = Session::start(transport.clone(), CHAT, store.marker(), SessionSettings::default()).await;

    let producer = VideoProducer::new(config);
    assert!(producer.run(&mut session, record.clone()).await.is_err());

    assert_eq!(transport.sent_containing("Production Failed"), 1);

    let saved = store.load(&record.video_id).await.unwrap();
    assert_eq!(saved.status, ProductionStatus::Failed);
    assert_eq!(saved.title, record.title);
}
