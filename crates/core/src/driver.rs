//! The conversation driver.
//!
//! A [`Driver`] is a handle to a task that owns the [`ConversationState`]
//! and the local transcript mirror. Every state change goes through that
//! task's mailbox, so the handle can be cloned and used from anywhere.
//! Model calls and store appends of a turn run in a separate task that
//! reports back through the same mailbox.

mod builder;
mod mailbox;
mod scheduler;
mod state;
mod turn;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use pdfchat_extractor::TextSegment;
use tokio::sync::oneshot;
use tracing::Instrument;

use self::mailbox::{Command, Mailbox, MailboxParts};
use self::scheduler::run_driver;
use crate::report::{RejectReason, TurnReport};

pub use self::builder::{DriverBuilder, DriverConfig};
pub use self::state::{ConversationState, DriverSnapshot};
pub use self::turn::combine_prompt;

/// Handle to a running conversation driver.
///
/// Dropping the last handle stops the driver, same as
/// [`Driver::shutdown`].
#[derive(Clone)]
pub struct Driver {
    mailbox: Arc<Mailbox>,
}

impl Driver {
    fn spawn(state: state::DriverState) -> Self {
        let MailboxParts {
            mailbox,
            cmd_rx,
            kill_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_driver(Arc::downgrade(&mailbox), state, cmd_rx, kill_rx)
                .instrument(debug_span!("driver")),
        );
        Self { mailbox }
    }

    /// Submits one user turn and waits until it has been fully handled.
    ///
    /// Empty input and submissions made while another turn is in flight
    /// are dropped and reported as [`TurnReport::Rejected`]. Failures of
    /// individual steps never escape; they are logged and recorded in the
    /// returned report.
    pub async fn submit_turn<S: Into<String>>(&self, input: S) -> TurnReport {
        let (reply_tx, reply_rx) = oneshot::channel();
        let cmd = Command::SubmitTurn {
            input: input.into(),
            reply: reply_tx,
        };
        if self.mailbox.send(cmd).is_err() {
            return TurnReport::Rejected(RejectReason::Stopped);
        }
        reply_rx.await.unwrap_or(TurnReport::Aborted)
    }

    /// Hands over the segments of a freshly extracted document.
    ///
    /// The batch replaces whatever was pending and will be replayed by the
    /// next accepted turn.
    pub fn on_extraction_result(&self, segments: Vec<TextSegment>) {
        if self
            .mailbox
            .send(Command::ExtractionResult(segments))
            .is_err()
        {
            warn!("driver has stopped, discarding extraction result");
        }
    }

    /// Returns whether a turn is in flight.
    ///
    /// A stopped driver is never busy.
    pub async fn is_busy(&self) -> bool {
        self.snapshot()
            .await
            .is_some_and(|snapshot| snapshot.state.is_busy())
    }

    /// Returns a copy of the conversation state and the mirror, or `None`
    /// if the driver has stopped.
    pub async fn snapshot(&self) -> Option<DriverSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.mailbox.send(Command::Snapshot(reply_tx)).ok()?;
        reply_rx.await.ok()
    }

    /// Stops the driver, aborting the turn in flight if any.
    ///
    /// The driver is not guaranteed to stop immediately, but it will not
    /// handle further commands.
    #[inline]
    pub fn shutdown(&self) {
        self.mailbox.try_kill();
    }
}
