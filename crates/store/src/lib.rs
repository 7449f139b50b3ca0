//! The conversation log: an append-only, timestamp-ordered ledger of chat
//! messages that can be watched for changes.
//!
//! Records are immutable once appended, and their ordering key is always
//! assigned by the store, never by the writer. Subscribers always receive
//! the complete ordered log, so a consumer can treat every notification as
//! a full replacement of whatever it displays.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod memory;
mod message;
mod store;

pub use memory::MemoryLogStore;
pub use message::{Message, NewMessage, Sender, Timestamp};
pub use store::{LogStore, SnapshotHandler, StoreError, Subscription};
