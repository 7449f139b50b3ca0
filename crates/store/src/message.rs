use std::fmt::{self, Display};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    /// The person typing into the chat.
    User,
    /// The model's reply.
    Bot,
}

impl Sender {
    /// Returns the wire name of the sender.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Bot => "bot",
        }
    }

    /// Parses a wire name back into a sender.
    #[inline]
    pub fn from_wire(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Sender::User),
            "bot" => Some(Sender::Bot),
            _ => None,
        }
    }
}

/// The server-assigned ordering key of a record.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Wraps a point in time.
    #[inline]
    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime)
    }

    /// Returns the point in time.
    #[inline]
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

/// A chat message.
///
/// Records read from a [`crate::LogStore`] always carry a timestamp.
/// Copies kept locally before the store has confirmed them have none.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    /// The message body.
    pub text: String,
    /// Who wrote it.
    pub sender: Sender,
    /// The ordering key, `None` until persisted.
    pub timestamp: Option<Timestamp>,
}

impl Message {
    /// Creates a message that hasn't been persisted yet.
    #[inline]
    pub fn pending<S: Into<String>>(text: S, sender: Sender) -> Self {
        Self {
            text: text.into(),
            sender,
            timestamp: None,
        }
    }

    /// Returns whether the content (text and sender) matches an append
    /// request, ignoring the timestamp.
    #[inline]
    pub fn same_content(&self, other: &NewMessage) -> bool {
        self.text == other.text && self.sender == other.sender
    }
}

/// An append request. The store assigns the timestamp.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NewMessage {
    /// The message body.
    pub text: String,
    /// Who wrote it.
    pub sender: Sender,
}

impl NewMessage {
    /// Creates a user-authored record.
    #[inline]
    pub fn user<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            sender: Sender::User,
        }
    }

    /// Creates a bot-authored record.
    #[inline]
    pub fn bot<S: Into<String>>(text: S) -> Self {
        Self {
            text: text.into(),
            sender: Sender::Bot,
        }
    }

    /// Stamps the request, turning it into a stored record.
    #[inline]
    pub fn into_message(self, timestamp: Timestamp) -> Message {
        Message {
            text: self.text,
            sender: self.sender,
            timestamp: Some(timestamp),
        }
    }

    /// Returns the unconfirmed local copy of this request.
    #[inline]
    pub fn to_pending(&self) -> Message {
        Message::pending(self.text.clone(), self.sender)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_wire_shape() {
        let datetime = DateTime::parse_from_rfc3339("2024-05-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let msg = NewMessage::bot("Hi")
            .into_message(Timestamp::from_datetime(datetime));
        assert_eq!(
            serde_json::to_value(&msg).unwrap(),
            json!({
                "text": "Hi",
                "sender": "bot",
                "timestamp": "2024-05-01T10:00:00Z"
            })
        );
        assert_eq!(Sender::from_wire("user"), Some(Sender::User));
        assert_eq!(Sender::from_wire("system"), None);
    }

    #[test]
    fn test_pending_copy() {
        let request = NewMessage::user("Summarize\npage one");
        let pending = request.to_pending();
        assert_eq!(pending.timestamp, None);
        assert!(pending.same_content(&request));

        let stored = request
            .clone()
            .into_message(Timestamp::from_datetime(Utc::now()));
        assert!(stored.same_content(&request));
        assert!(!stored.same_content(&NewMessage::bot("Summarize\npage one")));
    }
}
