use crate::telegram::Message;

/// Control keywords an operator can type during a collection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Abort the whole session
    Cancel,
    /// Leave an optional field empty
    Skip,
    /// End a multi-part text answer
    Done,
}

/// Every accepted spelling, after normalization
const KEYWORDS: &[(&str, Command)] = &[
    ("cancel", Command::Cancel),
    ("cancelar", Command::Cancel),
    ("skip", Command::Skip),
    ("pular", Command::Skip),
    ("pronto", Command::Done),
    ("done", Command::Done),
    ("fim", Command::Done),
    ("end", Command::Done),
];

impl Command {
    /// Resolve free text into a command: trimmed, lowercased, leading `/`
    /// and any `@botname` suffix removed.
    pub fn parse(text: &str) -> Option<Self> {
        let normalized = text.trim().to_lowercase();
        let normalized = normalized.strip_prefix('/').unwrap_or(&normalized);
        let normalized = normalized.split('@').next().unwrap_or_default();

        KEYWORDS
            .iter()
            .find(|(keyword, _)| *keyword == normalized)
            .map(|(_, command)| *command)
    }

    pub fn from_message(message: &Message) -> Option<Self> {
        message.text.as_deref().and_then(Self::parse)
    }
}

/// True when any message of the batch asks for cancellation
pub fn batch_requests_cancel(batch: &[Message]) -> bool {
    batch
        .iter()
        .any(|message| Command::from_message(message) == Some(Command::Cancel))
}
