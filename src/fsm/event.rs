//! Inbound events and the keyword parsing that shapes them.

use uuid::Uuid;

use crate::profile::{FeedbackSentiment, JobResult, MediaHandle};

/// Slash commands understood in any state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Restart,
}

impl Command {
    /// Parse a command from message text, accepting the bare word too.
    pub fn parse(text: &str) -> Option<Command> {
        match text.trim().to_lowercase().as_str() {
            "/start" | "start" => Some(Command::Start),
            "/restart" | "/reset" | "restart" => Some(Command::Restart),
            _ => None,
        }
    }
}

/// Terminal outcome of a generation job, carried by the completion event.
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Succeeded(JobResult),
    Failed { error: String },
}

/// What arrived, already stripped of transport details.
#[derive(Debug, Clone)]
pub enum EventKind {
    Command(Command),
    Photo { image: MediaHandle },
    Text { text: String },
    /// A voice note; the orchestrator transcribes it into `Text` before the
    /// state machine ever sees it.
    Voice { audio: MediaHandle },
    /// Fed back into the event stream by the job coordinator.
    JobCompleted { job_id: Uuid, outcome: JobOutcome },
}

/// One inbound event, tagged with the transport's delivery id so retried
/// deliveries can be deduplicated.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub event_id: String,
    pub kind: EventKind,
}

impl InboundEvent {
    pub fn new(event_id: impl Into<String>, kind: EventKind) -> Self {
        Self {
            event_id: event_id.into(),
            kind,
        }
    }

    /// Wrap text, promoting it to a command when it parses as one.
    pub fn from_text(event_id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let kind = match Command::parse(&text) {
            Some(command) => EventKind::Command(command),
            None => EventKind::Text { text },
        };
        Self::new(event_id, kind)
    }
}

/// Whether the text reads as "I'm done adding garments".
pub fn is_done_marker(text: &str) -> bool {
    matches!(
        text.trim().to_lowercase().as_str(),
        "done" | "/done" | "finished" | "that's all" | "thats all"
    )
}

/// Keyword check for an outfit request.
pub fn is_outfit_request(text: &str) -> bool {
    let lower = text.trim().to_lowercase();
    if matches!(lower.as_str(), "/outfit" | "/outfit_today" | "outfit") {
        return true;
    }
    const PHRASES: [&str; 5] = [
        "what should i wear",
        "what to wear",
        "outfit for",
        "dress me",
        "pick an outfit",
    ];
    PHRASES.iter().any(|p| lower.contains(p))
}

/// Parse a 👍/👎 style reaction; the remainder of the text becomes the note.
pub fn parse_feedback(text: &str) -> Option<(FeedbackSentiment, String)> {
    let trimmed = text.trim();
    let lower = trimmed.to_lowercase();
    let positive = ["👍", "love it", "like it", "great", "nice one"];
    let negative = ["👎", "don't like", "dont like", "dislike", "not a fan"];
    if positive.iter().any(|p| lower.starts_with(p)) {
        return Some((FeedbackSentiment::Positive, trimmed.to_string()));
    }
    if negative.iter().any(|p| lower.starts_with(p)) {
        return Some((FeedbackSentiment::Negative, trimmed.to_string()));
    }
    None
}
