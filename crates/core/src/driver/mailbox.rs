use pdfchat_extractor::TextSegment;
use pdfchat_store::Message;
use tokio::sync::{mpsc, oneshot, watch};

use super::state::DriverSnapshot;
use crate::report::TurnReport;

/// Everything the driver task reacts to.
#[derive(Debug)]
pub(super) enum Command {
    SubmitTurn {
        input: String,
        reply: oneshot::Sender<TurnReport>,
    },
    ExtractionResult(Vec<TextSegment>),
    /// A turn produced a transcript entry.
    Mirror(Message),
    /// A turn ended; `reply` is the submitter's channel.
    TurnFinished {
        report: TurnReport,
        reply: oneshot::Sender<TurnReport>,
    },
    Snapshot(oneshot::Sender<DriverSnapshot>),
}

/// Returned when a command is sent to a driver that has stopped.
#[derive(Debug)]
pub(super) struct DriverStopped;

pub(super) struct MailboxParts {
    pub mailbox: Mailbox,
    pub cmd_rx: mpsc::UnboundedReceiver<Command>,
    pub kill_rx: watch::Receiver<bool>,
}

pub(super) struct Mailbox {
    cmd_tx: mpsc::UnboundedSender<Command>,
    kill_tx: watch::Sender<bool>,
}

impl Mailbox {
    #[inline]
    pub fn new() -> MailboxParts {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (kill_tx, kill_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { cmd_tx, kill_tx },
            cmd_rx,
            kill_rx,
        }
    }

    #[inline]
    pub fn send(&self, cmd: Command) -> Result<(), DriverStopped> {
        self.cmd_tx.send(cmd).map_err(|_| DriverStopped)
    }

    /// Returns a sender for a turn task to report through.
    #[inline]
    pub fn sender(&self) -> mpsc::UnboundedSender<Command> {
        self.cmd_tx.clone()
    }

    #[inline]
    pub fn try_kill(&self) {
        self.kill_tx.send(true).ok();
    }
}
