use daycheck_extract::TimeSeries;
use serde::Deserialize;
use thiserror::Error;

const MESSAGE_COLUMN: &str = "Message";

/// Where the airframe serial sits in the status-text stream: the
/// `message_index`-th message, from character `offset`, optionally `len`
/// characters long. ArduPilot prints `<board> <serial>` early in every log,
/// but the position is firmware dependent, so this is configurable.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct IdentityRule {
    pub message_index: usize,
    pub offset: usize,
    pub len: Option<usize>,
}

impl Default for IdentityRule {
    fn default() -> Self {
        Self { message_index: 2, offset: 11, len: None }
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum IdentityError {
    #[error("status messages have no Message field")]
    NoMessageField,
    #[error("status message #{index} missing (log has {available})")]
    MissingMessage { index: usize, available: usize },
    #[error("offset {offset} past end of status message {message:?}")]
    OffsetOutOfRange { offset: usize, message: String },
    #[error("aircraft id is empty in status message {0:?}")]
    Empty(String),
    #[error("expected a serial number, found version string {0:?}")]
    VersionString(String),
}

pub fn parse_aircraft_id(msg: &TimeSeries, rule: &IdentityRule) -> Result<String, IdentityError> {
    let messages = msg.text(MESSAGE_COLUMN).ok_or(IdentityError::NoMessageField)?;
    let message = messages.get(rule.message_index).ok_or(IdentityError::MissingMessage {
        index: rule.message_index,
        available: messages.len(),
    })?;

    if rule.offset > message.chars().count() {
        return Err(IdentityError::OffsetOutOfRange { offset: rule.offset, message: message.clone() });
    }
    let tail = message.chars().skip(rule.offset);
    let raw: String = match rule.len {
        Some(n) => tail.take(n).collect(),
        None => tail.collect(),
    };

    let id = raw.trim();
    if id.is_empty() {
        return Err(IdentityError::Empty(message.clone()));
    }
    if looks_like_version(id) {
        return Err(IdentityError::VersionString(id.to_string()));
    }
    Ok(id.to_string())
}

fn looks_like_version(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some('V' | 'v')) && chars.next().map_or(false, |c| c.is_ascii_digit())
}
