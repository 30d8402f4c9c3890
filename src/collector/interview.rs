use anyhow::{anyhow, Result};
use std::time::Duration;
use tracing::info;

use super::request::{parse_tags, FieldRequest};
use super::session::Session;
use super::{Answer, FieldOutcome};
use crate::config::CollectionConfig;
use crate::production::{ProductionRecord, ProductionStatus, ProductionStore};

const INTRO: &str = "🎬 <b>Daily WWII Video Production</b>\n\n\
    Let's create a new history video!\n\n\
    Answer the next questions to get started.\n\
    ⏱️ You have 10 minutes for each answer.\n\n\
    🛑 Use <b>/cancel</b> at any time to cancel";

const TIME_IS_UP: &str = "❌ Time is up. Production cancelled.";

/// How an interview ended
#[derive(Debug, Clone, PartialEq)]
pub enum InterviewOutcome {
    Collected(ProductionRecord),
    /// Label of the field that was never answered
    TimedOut(String),
    Cancelled,
}

fn requests(config: &CollectionConfig) -> [FieldRequest; 4] {
    let text_timeout = Duration::from_secs(config.text_timeout_secs);
    let reminder = Duration::from_secs(config.reminder_interval_secs);

    [
        FieldRequest::text(
            "title",
            "1️⃣ <b>VIDEO TITLE</b>\n\n\
             Send the title of your WWII video.\n\n\
             <i>Example: The Forgotten Heroes of D-Day</i>\n\n\
             💡 Or send /cancel to cancel",
        )
        .with_timeout(text_timeout)
        .on_received("✅ Title received!\n\n<b>{value}</b>"),
        FieldRequest::text(
            "description",
            "2️⃣ <b>VIDEO DESCRIPTION</b>\n\n\
             Send the description shown on YouTube.\n\n\
             <i>Two or three paragraphs explaining the content.</i>\n\n\
             💡 Or send /cancel to cancel",
        )
        .with_timeout(text_timeout)
        .on_received("✅ Description received!\n\n<i>{value}</i>"),
        FieldRequest::tags(
            "tags",
            "3️⃣ <b>VIDEO TAGS</b>\n\n\
             Send the tags separated by commas.\n\n\
             <i>Example: WWII, D-Day, History, Documentary, Normandy</i>\n\n\
             💡 Or send /cancel to cancel",
        )
        .with_timeout(text_timeout)
        .on_received("✅ Tags received: {value}"),
        FieldRequest::multipart_text(
            "script",
            "4️⃣ <b>NARRATION SCRIPT</b>\n\n\
             Now send the full script to be narrated.\n\
             Long scripts can be split across several messages.\n\n\
             📝 <b>Tips:</b>\n\
             • Write in English\n\
             • Use clear sentences for narration\n\
             • Do not mention visual elements\n\n\
             ✅ Send <b>PRONTO</b> (or /done) when finished.\n\
             ⏱️ You have 15 minutes.\n\n\
             💡 Or send /cancel to cancel",
        )
        .with_timeout(Duration::from_secs(config.script_timeout_secs))
        .on_received("✅ <b>Script received!</b>"),
    ]
    .map(|request| request.with_reminder_interval(reminder).on_timeout(TIME_IS_UP))
}

fn into_text(answer: Answer) -> String {
    match answer {
        Answer::Text(text) => text,
        Answer::Tags(tags) => tags.join(", "),
        Answer::Media(media) => media.path.display().to_string(),
    }
}

/// Run the intake conversation: title, description, tags and script.
///
/// A collected record is saved with status `collected` before returning.
pub async fn collect_production(
    session: &mut Session,
    store: &ProductionStore,
    config: &CollectionConfig,
) -> Result<InterviewOutcome> {
    info!("📱 Collecting production details over chat");
    session.notify(INTRO).await;

    let mut answers = Vec::with_capacity(4);
    for request in requests(config) {
        match session.await_field(&request).await {
            FieldOutcome::Received(answer) => answers.push(answer),
            FieldOutcome::Cancelled => return Ok(InterviewOutcome::Cancelled),
            // None of the interview fields is skippable
            FieldOutcome::TimedOut | FieldOutcome::Skipped => {
                return Ok(InterviewOutcome::TimedOut(request.label));
            }
        }
    }

    let [title, description, tags, script]: [Answer; 4] = answers
        .try_into()
        .map_err(|_| anyhow!("Interview ended with missing answers"))?;
    let tags = match tags {
        Answer::Tags(tags) => tags,
        other => parse_tags(&into_text(other)),
    };

    let record = ProductionRecord::new(
        into_text(title),
        into_text(description),
        tags,
        into_text(script),
        ProductionStatus::Collected,
    )
    .with_chat_id(session.chat_id());

    session
        .notify(&format!(
            "📊 Statistics:\n\
             • Words: {}\n\
             • Estimated duration: {:.1} minutes\n\
             • Segments (~30s): {}\n\n\
             🎬 Starting production...\n\n\
             🛑 You can still cancel with /cancel",
            record.word_count,
            record.estimated_duration,
            record.estimated_segments()
        ))
        .await;

    store.save(&record).await?;
    info!("✅ Production details collected: {}", record.title);
    Ok(InterviewOutcome::Collected(record))
}
