use pdfchat_model::ErrorKind;

/// The events in a preset response.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum PresetEvent {
    /// A chunk of reply text.
    MessageDelta(String),
}

/// The preset response for one request.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PresetResponse {
    /// Events in this response.
    pub events: Vec<PresetEvent>,
    /// If set, the response fails with this kind instead of producing
    /// any event.
    pub failure: Option<ErrorKind>,
}

impl PresetResponse {
    /// Creates a `PresetResponse` with the specified events.
    #[inline]
    pub fn with_events(events: impl Into<Vec<PresetEvent>>) -> Self {
        Self {
            events: events.into(),
            failure: None,
        }
    }

    /// Creates a `PresetResponse` that replies with `text` in one delta.
    #[inline]
    pub fn reply<S: Into<String>>(text: S) -> Self {
        Self::with_events([PresetEvent::MessageDelta(text.into())])
    }

    /// Creates a `PresetResponse` that always fails with `kind`.
    #[inline]
    pub fn failure(kind: ErrorKind) -> Self {
        Self {
            events: vec![],
            failure: Some(kind),
        }
    }

    pub(crate) fn echo(prompt: &str) -> Self {
        Self::reply(format!("You said {prompt}"))
    }
}
