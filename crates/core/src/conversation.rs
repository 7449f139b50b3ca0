//! Conversation-related types.

use std::ops::Index;
use std::slice;

use pdfchat_store::Message;

/// The driver's local mirror of the conversation.
///
/// Entries are appended as soon as they are known, before the store has
/// confirmed them, so none of them carries a timestamp. The mirror is
/// never reconciled against the store; it exists so the chat can show
/// progress while appends are in flight.
#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct Transcript {
    pub(crate) messages: Vec<Message>,
}

impl Transcript {
    /// Returns the mirrored messages in the order they were recorded.
    #[inline]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Returns the number of mirrored messages.
    #[inline]
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Returns `true` if nothing has been mirrored yet.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterates over the mirrored messages.
    #[inline]
    pub fn iter(&self) -> slice::Iter<'_, Message> {
        self.messages.iter()
    }

    #[inline]
    pub(crate) fn push(&mut self, message: Message) {
        self.messages.push(message);
    }
}

impl Index<usize> for Transcript {
    type Output = Message;

    #[inline]
    fn index(&self, index: usize) -> &Message {
        &self.messages[index]
    }
}

impl<'a> IntoIterator for &'a Transcript {
    type Item = &'a Message;
    type IntoIter = slice::Iter<'a, Message>;

    #[inline]
    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
