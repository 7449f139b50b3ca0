use std::sync::Weak;

use tokio::select;
use tokio::sync::{mpsc, watch};

use super::mailbox::{Command, Mailbox};
use super::state::DriverState;

pub(super) async fn run_driver(
    mailbox: Weak<Mailbox>,
    mut state: DriverState,
    mut cmd_rx: mpsc::UnboundedReceiver<Command>,
    mut kill_rx: watch::Receiver<bool>,
) {
    debug!("started");
    loop {
        let cmd = select! {
            biased;

            _ = kill_rx.changed() => {
                break;
            }
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else {
                    break;
                };
                cmd
            }
        };
        trace!("received command: {cmd:?}");

        let proc_span = trace_span!("proc cmd");
        proc_span.in_scope(|| {
            state.handle(cmd, &mailbox);
            trace!("finished");
        });
    }
    state.abort_turn();
    debug!("will terminate");
}
