use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use tokio::sync::watch;
use tracing::Instrument;

use crate::message::{Message, NewMessage, Timestamp};
use crate::store::{LogStore, SnapshotHandler, StoreError, Subscription};

/// An in-process [`LogStore`].
///
/// Useful as a stand-in for a cloud store when none is configured, and as
/// a fake in tests. Clones share the same log.
#[derive(Clone)]
pub struct MemoryLogStore {
    inner: Arc<Inner>,
}

struct Inner {
    records: watch::Sender<Arc<Vec<Message>>>,
    fail_appends: AtomicBool,
}

impl Default for MemoryLogStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryLogStore {
    /// Creates an empty store.
    #[inline]
    pub fn new() -> Self {
        let (records, _) = watch::channel(Arc::new(Vec::new()));
        Self {
            inner: Arc::new(Inner {
                records,
                fail_appends: AtomicBool::new(false),
            }),
        }
    }

    /// Returns a copy of the whole log.
    pub fn records(&self) -> Vec<Message> {
        self.inner.records.borrow().to_vec()
    }

    /// Makes every following append fail (or succeed again).
    #[inline]
    pub fn set_fail_appends(&self, fail: bool) {
        self.inner.fail_appends.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, message: NewMessage) -> Result<(), StoreError> {
        if self.inner.fail_appends.load(Ordering::Relaxed) {
            warn!("rejecting append: store is set to fail");
            return Err(StoreError::new("memory store rejected the append"));
        }

        // The timestamp is picked under the channel's write lock, so the
        // log stays strictly ordered even with concurrent writers.
        self.inner.records.send_modify(|records| {
            let now = Utc::now();
            let datetime = match records.last().and_then(|m| m.timestamp) {
                Some(last) if last.as_datetime() >= now => {
                    last.as_datetime() + TimeDelta::nanoseconds(1)
                }
                _ => now,
            };
            let record = message.into_message(Timestamp::from_datetime(datetime));
            trace!("appended record: {record:?}");
            Arc::make_mut(records).push(record);
        });
        Ok(())
    }

    fn subscribe(&self, handler: SnapshotHandler) -> Subscription {
        let mut records_rx = self.inner.records.subscribe();
        let task = tokio::spawn(
            async move {
                loop {
                    let snapshot = Arc::clone(&records_rx.borrow_and_update());
                    handler(&snapshot);
                    if records_rx.changed().await.is_err() {
                        // The store has been dropped.
                        break;
                    }
                }
            }
            .instrument(trace_span!("memory store subscription")),
        );
        Subscription::from_task(task)
    }
}
