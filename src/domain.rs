use crate::reference::{PullRequestReference, ReferenceError};

// Domain data structures shared across modules.

#[derive(Clone, Debug, Default)]
pub struct NotificationThread {
    pub id: String,
    pub messages: Vec<Message>,
}

#[derive(Clone, Debug, Default)]
pub struct Message {
    pub id: String,
    pub snippet: String,
    pub headers: Vec<Header>,
    pub parts: Vec<MimePart>,
}

impl Message {
    /// Header names compare case-insensitively, as in RFC 5322.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }
}

#[derive(Clone, Debug)]
pub struct Header {
    pub name: String,
    pub value: String,
}

#[derive(Clone, Debug)]
pub struct MimePart {
    pub mime_type: String,
    /// Base64url body as delivered by the mail transport.
    pub body_data: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NotificationMetadata {
    pub url: String,
    pub sender: String,
    pub subject: String,
    pub snippet: String,
}

impl NotificationMetadata {
    pub fn reference(&self) -> Result<PullRequestReference, ReferenceError> {
        PullRequestReference::parse(&self.url)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Deleted,
    Kept,
    Skipped,
}

impl Outcome {
    pub fn label(&self) -> &'static str {
        match self {
            Outcome::Deleted => "deleted",
            Outcome::Kept => "kept",
            Outcome::Skipped => "skipped",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneSummary {
    pub examined: usize,
    pub deleted: usize,
    pub kept: usize,
    pub skipped: usize,
    pub unparseable: usize,
}

impl PruneSummary {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Deleted => self.deleted += 1,
            Outcome::Kept => self.kept += 1,
            Outcome::Skipped => self.skipped += 1,
        }
    }
}
