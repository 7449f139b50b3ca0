use std::error::Error;
use std::fmt::{self, Debug, Display};

use async_trait::async_trait;
use tokio::task::JoinHandle;

use crate::message::{Message, NewMessage};

/// A callback receiving the complete, timestamp-ordered log.
pub type SnapshotHandler = Box<dyn Fn(&[Message]) + Send + Sync + 'static>;

/// An append-only message log that can be watched.
///
/// # Subscription contract
///
/// The handler passed to [`LogStore::subscribe`] is called once with the
/// current log as soon as it's available, and again whenever the log
/// changes. Every call receives the whole log ordered by timestamp, never
/// a delta. Calls happen on a task of their own, so they may interleave
/// with appends issued by the subscriber.
#[async_trait]
pub trait LogStore: Send + Sync + 'static {
    /// Appends one record. The store assigns its timestamp.
    async fn append(&self, message: NewMessage) -> Result<(), StoreError>;

    /// Starts watching the log.
    ///
    /// Must be called from within a tokio runtime.
    fn subscribe(&self, handler: SnapshotHandler) -> Subscription;
}

/// An error raised by a [`LogStore`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct StoreError {
    message: String,
}

impl StoreError {
    /// Creates an error with the given message.
    #[inline]
    pub fn new<S: Into<String>>(message: S) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Debug for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("StoreError").field(&self.message).finish()
    }
}

impl Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl Error for StoreError {}

/// A live subscription to a [`LogStore`].
///
/// Dropping the subscription unsubscribes, so keep it alive for as long as
/// notifications are wanted.
#[must_use = "dropping a subscription cancels it"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    /// Creates a subscription that runs `cancel` when it ends.
    #[inline]
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Creates a subscription backed by a delivery task, aborting the task
    /// when it ends.
    #[inline]
    pub fn from_task(task: JoinHandle<()>) -> Self {
        Self::new(move || task.abort())
    }

    /// Stops receiving notifications.
    #[inline]
    pub fn unsubscribe(mut self) {
        self.cancel();
    }

    fn cancel(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            trace!("subscription cancelled");
            cancel();
        }
    }
}

impl Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
