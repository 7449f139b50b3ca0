use std::sync::{Arc, Weak};

use pdfchat_extractor::TextSegment;
use pdfchat_store::{LogStore, Message, Sender};
use tokio::task::JoinHandle;
use tracing::Instrument;

use super::builder::{DriverConfig, IdleFn, MirrorFn};
use super::mailbox::{Command, Mailbox};
use super::turn::{TurnContext, TurnPlan, run_turn};
use crate::conversation::Transcript;
use crate::model_client::ModelClient;
use crate::report::{RejectReason, TurnReport};

/// The driver's bookkeeping of the document currently being discussed.
///
/// `segments_consumed` is `true` once every segment of the latest batch
/// has been replayed. Before the first batch arrives there is nothing to
/// replay, so it starts out `true`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationState {
    pending_segments: Vec<TextSegment>,
    segments_consumed: bool,
    is_busy: bool,
    batch_generation: u64,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            pending_segments: vec![],
            segments_consumed: true,
            is_busy: false,
            batch_generation: 0,
        }
    }
}

impl ConversationState {
    /// Segments waiting for the next turn. Empty once consumed.
    #[inline]
    pub fn pending_segments(&self) -> &[TextSegment] {
        &self.pending_segments
    }

    /// Whether the latest batch has been replayed.
    #[inline]
    pub fn segments_consumed(&self) -> bool {
        self.segments_consumed
    }

    /// Whether a turn is in flight.
    #[inline]
    pub fn is_busy(&self) -> bool {
        self.is_busy
    }

    /// Counts the batches received so far.
    #[inline]
    pub fn batch_generation(&self) -> u64 {
        self.batch_generation
    }

    fn accept_batch(&mut self, segments: Vec<TextSegment>) {
        self.pending_segments = segments;
        self.segments_consumed = false;
        self.batch_generation = self.batch_generation.wrapping_add(1);
    }

    fn plan_turn(&self) -> TurnPlan {
        if self.segments_consumed {
            TurnPlan::Single
        } else {
            TurnPlan::Replay {
                segments: self.pending_segments.clone(),
                generation: self.batch_generation,
            }
        }
    }

    fn finish_replay(&mut self, generation: u64) {
        if generation != self.batch_generation {
            // A newer batch arrived mid-replay and is still pending.
            debug!("batch {generation} replayed, batch {} pending", self.batch_generation);
            return;
        }
        self.pending_segments.clear();
        self.segments_consumed = true;
    }
}

/// A point-in-time copy of the driver's state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DriverSnapshot {
    /// The conversation state.
    pub state: ConversationState,
    /// The local mirror.
    pub transcript: Transcript,
}

/// Everything owned by the driver task.
pub(super) struct DriverState {
    pub model_client: ModelClient,
    pub store: Arc<dyn LogStore>,
    pub config: DriverConfig,
    pub conversation: ConversationState,
    pub transcript: Transcript,
    pub running_turn: Option<JoinHandle<()>>,
    pub on_mirror: Option<MirrorFn>,
    pub on_idle: Option<IdleFn>,
}

impl DriverState {
    pub fn handle(&mut self, cmd: Command, mailbox: &Weak<Mailbox>) {
        match cmd {
            Command::SubmitTurn { input, reply } => {
                if let Err(reason) = self.start_turn(input, reply, mailbox) {
                    debug!("submission rejected: {reason:?}");
                }
            }
            Command::ExtractionResult(segments) => {
                info!("received {} segments", segments.len());
                self.conversation.accept_batch(segments);
            }
            Command::Mirror(message) => {
                self.mirror(message);
            }
            Command::TurnFinished { report, reply } => {
                self.finish_turn(&report);
                reply.send(report).ok();
            }
            Command::Snapshot(reply) => {
                reply
                    .send(DriverSnapshot {
                        state: self.conversation.clone(),
                        transcript: self.transcript.clone(),
                    })
                    .ok();
            }
        }
    }

    fn start_turn(
        &mut self,
        input: String,
        reply: tokio::sync::oneshot::Sender<TurnReport>,
        mailbox: &Weak<Mailbox>,
    ) -> Result<(), RejectReason> {
        let rejection = if input.trim().is_empty() {
            Some(RejectReason::EmptyInput)
        } else if self.conversation.is_busy {
            Some(RejectReason::Busy)
        } else {
            None
        };
        let mailbox = match (rejection, mailbox.upgrade()) {
            (None, Some(mailbox)) => mailbox,
            (rejection, _) => {
                let reason = rejection.unwrap_or(RejectReason::Stopped);
                reply.send(TurnReport::Rejected(reason)).ok();
                return Err(reason);
            }
        };

        self.mirror(Message::pending(input.clone(), Sender::User));
        self.conversation.is_busy = true;

        let plan = self.conversation.plan_turn();
        debug!("starting turn: {plan:?}");
        let ctx = TurnContext {
            model_client: self.model_client.clone(),
            store: Arc::clone(&self.store),
            config: self.config.clone(),
            cmd_tx: mailbox.sender(),
        };
        self.running_turn = Some(tokio::spawn(
            run_turn(ctx, input, plan, reply).instrument(debug_span!("turn")),
        ));
        Ok(())
    }

    fn finish_turn(&mut self, report: &TurnReport) {
        if let TurnReport::SegmentReplay(batch) = report {
            self.conversation.finish_replay(batch.generation);
        }
        self.conversation.is_busy = false;
        self.running_turn = None;
        if let Some(on_idle) = &self.on_idle {
            on_idle();
        }
    }

    fn mirror(&mut self, message: Message) {
        if let Some(on_mirror) = &self.on_mirror {
            on_mirror(&message);
        }
        self.transcript.push(message);
    }

    pub fn abort_turn(&mut self) {
        if let Some(turn) = self.running_turn.take() {
            debug!("aborting the turn in flight");
            turn.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let state = ConversationState::default();
        assert!(state.segments_consumed());
        assert!(!state.is_busy());
        assert!(matches!(state.plan_turn(), TurnPlan::Single));
    }

    #[test]
    fn test_batch_lifecycle() {
        let mut state = ConversationState::default();
        state.accept_batch(vec![TextSegment::new("a"), TextSegment::new("b")]);
        assert!(!state.segments_consumed());

        let TurnPlan::Replay { segments, generation } = state.plan_turn() else {
            panic!("expected a replay");
        };
        assert_eq!(segments.len(), 2);

        state.finish_replay(generation);
        assert!(state.segments_consumed());
        assert!(state.pending_segments().is_empty());
    }

    #[test]
    fn test_newer_batch_survives_replay() {
        let mut state = ConversationState::default();
        state.accept_batch(vec![TextSegment::new("old")]);
        let TurnPlan::Replay { generation, .. } = state.plan_turn() else {
            panic!("expected a replay");
        };

        state.accept_batch(vec![TextSegment::new("new")]);
        state.finish_replay(generation);
        assert!(!state.segments_consumed());
        assert_eq!(state.pending_segments(), [TextSegment::new("new")]);
    }
}
