use std::ops::Range;

use pdfchat_store::{Message, Sender};

/// What a snapshot changed in a [`TranscriptView`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ViewChange {
    /// The snapshot equals what is already displayed.
    Unchanged,
    /// The snapshot extends the displayed transcript; the range indexes
    /// the new messages.
    Appended(Range<usize>),
    /// The snapshot differs in some other way and was swapped in whole.
    Replaced,
}

/// The displayed transcript.
///
/// Every notification from the store is the complete log, so the view
/// always swaps in the snapshot it receives. [`TranscriptView::apply`]
/// only works out how much of it is new, letting a renderer print the
/// tail instead of redrawing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TranscriptView {
    messages: Vec<Message>,
}

impl TranscriptView {
    /// Creates an empty view.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the displayed messages.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Replaces the displayed transcript with `snapshot`.
    pub fn apply(&mut self, snapshot: &[Message]) -> ViewChange {
        if self.messages == snapshot {
            return ViewChange::Unchanged;
        }
        let shown = self.messages.len();
        let change = if snapshot.len() > shown && snapshot.starts_with(&self.messages) {
            ViewChange::Appended(shown..snapshot.len())
        } else {
            ViewChange::Replaced
        };
        self.messages = snapshot.to_vec();
        change
    }
}

/// Formats one message for display.
pub fn render_message(message: &Message) -> String {
    let label = match message.sender {
        Sender::User => "User",
        Sender::Bot => "Model",
    };
    format!("{label}: {}", message.text)
}
