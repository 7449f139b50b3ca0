//! Core logic of the chat: the conversation driver, the model client
//! wrapper, and the error taxonomy of a turn.

#![deny(missing_docs)]
#![deny(clippy::missing_safety_doc)]

#[macro_use]
extern crate tracing;

pub mod conversation;
mod driver;
mod error;
mod model_client;
mod report;

pub use driver::{
    ConversationState, Driver, DriverBuilder, DriverConfig, DriverSnapshot,
    combine_prompt,
};
pub use conversation::Transcript;
pub use error::{Error, ErrorKind};
pub use pdfchat_extractor::TextSegment;
pub use pdfchat_store::{Message, NewMessage, Sender, Timestamp};
pub use report::{BatchReport, CycleReport, RejectReason, TurnReport};
