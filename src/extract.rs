//! Finds the pull request a GitHub notification thread is about.
//!
//! Only messages whose subject carries the configured repository tag are
//! inspected, and only their `text/plain` parts are decoded. Every later
//! qualifying message replaces the URL recorded from an earlier one.

use std::sync::LazyLock;

use base64::{
    Engine,
    alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use regex::Regex;
use thiserror::Error;

use crate::domain::{Message, MimePart, NotificationMetadata, NotificationThread};

pub const SUBJECT_HEADER: &str = "Subject";
pub const SENDER_HEADER: &str = "X-GitHub-Sender";

const PLAIN_TEXT: &str = "text/plain";

static PULL_REQUEST_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"https://github\.com/[^/\s]+/[^/\s]+/pull/\d+(?:#[^\s]*)?")
        .expect("pull request pattern is valid")
});

// Gmail omits padding on body data.
const STANDARD_LENIENT: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

pub fn extract(
    thread: &NotificationThread,
    subject_marker: &str,
) -> Result<Option<NotificationMetadata>, ExtractError> {
    let mut url: Option<String> = None;
    let mut matched: Option<(&str, &str)> = None;
    let mut last_snippet: Option<&str> = None;

    for message in &thread.messages {
        let subject = required_header(message, SUBJECT_HEADER)?;
        let sender = required_header(message, SENDER_HEADER)?;
        last_snippet = Some(message.snippet.as_str());

        if !subject.contains(subject_marker) {
            continue;
        }
        matched = Some((subject, sender));

        if let Some(found) = first_pull_request_url(message)? {
            url = Some(found);
        }
    }

    let (Some(url), Some((subject, sender))) = (url, matched) else {
        return Ok(None);
    };

    Ok(Some(NotificationMetadata {
        url,
        sender: sender.to_owned(),
        subject: subject.to_owned(),
        snippet: last_snippet.unwrap_or_default().to_owned(),
    }))
}

fn required_header<'m>(message: &'m Message, name: &'static str) -> Result<&'m str, ExtractError> {
    message
        .header(name)
        .ok_or_else(|| ExtractError::MissingHeader {
            message_id: message.id.clone(),
            header: name,
        })
}

fn first_pull_request_url(message: &Message) -> Result<Option<String>, ExtractError> {
    for part in &message.parts {
        let Some(text) = decode_part(part).map_err(|source| ExtractError::UndecodableBody {
            message_id: message.id.clone(),
            source,
        })?
        else {
            continue;
        };

        if let Some(found) = find_pull_request_url(&text) {
            return Ok(Some(found));
        }
    }
    Ok(None)
}

/// Decodes a `text/plain` part; any other MIME type yields `None`.
pub fn decode_part(part: &MimePart) -> Result<Option<String>, base64::DecodeError> {
    if part.mime_type != PLAIN_TEXT {
        return Ok(None);
    }
    let Some(data) = part.body_data.as_deref() else {
        return Ok(None);
    };

    let standard = data.replace('-', "+").replace('_', "/");
    let bytes = STANDARD_LENIENT.decode(standard.trim_end())?;
    Ok(Some(String::from_utf8_lossy(&bytes).into_owned()))
}

/// First pull request URL in `text`, without its `#fragment`.
pub fn find_pull_request_url(text: &str) -> Option<String> {
    PULL_REQUEST_URL.find(text).map(|found| {
        let url = found.as_str();
        url.split('#').next().unwrap_or(url).to_owned()
    })
}

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("message {message_id} has no `{header}` header")]
    MissingHeader {
        message_id: String,
        header: &'static str,
    },
    #[error("message {message_id} has a text/plain part that is not valid base64: {source}")]
    UndecodableBody {
        message_id: String,
        #[source]
        source: base64::DecodeError,
    },
}
