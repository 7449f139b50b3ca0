use std::sync::Arc;

use pdfchat_extractor::TextSegment;
use pdfchat_store::{LogStore, Message, NewMessage};
use tokio::sync::mpsc::error::SendError;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::Instrument;

use super::builder::DriverConfig;
use super::mailbox::Command;
use crate::error::Error;
use crate::model_client::ModelClient;
use crate::report::{BatchReport, CycleReport, TurnReport};

/// What a turn is going to do, decided when it is accepted.
#[derive(Debug)]
pub(super) enum TurnPlan {
    Single,
    Replay {
        segments: Vec<TextSegment>,
        generation: u64,
    },
}

/// Builds the prompt of one replay cycle.
///
/// The input comes first, then the segment, separated by a line break.
#[inline]
pub fn combine_prompt(input: &str, segment: &str) -> String {
    format!("{input}\n{segment}")
}

/// The collaborators a turn task needs.
pub(super) struct TurnContext {
    pub model_client: ModelClient,
    pub store: Arc<dyn LogStore>,
    pub config: DriverConfig,
    pub cmd_tx: mpsc::UnboundedSender<Command>,
}

impl TurnContext {
    async fn complete(&self, prompt: String) -> Result<String, Error> {
        let fut = self.model_client.complete(prompt);
        let result = match self.config.model_timeout {
            Some(limit) => timeout(limit, fut).await.unwrap_or_else(|_| {
                Err(Error::model_unavailable()
                    .with_reason(format!("timed out after {limit:?}")))
            }),
            None => fut.await,
        };
        if let Err(err) = &result {
            error!("model call failed: {err}");
        }
        result
    }

    async fn append(&self, message: NewMessage) -> Result<(), Error> {
        let sender = message.sender;
        let fut = self.store.append(message);
        let result = match self.config.store_timeout {
            Some(limit) => match timeout(limit, fut).await {
                Ok(result) => result.map_err(|err| err.message().to_owned()),
                Err(_) => Err(format!("timed out after {limit:?}")),
            },
            None => fut.await.map_err(|err| err.message().to_owned()),
        };
        result.map_err(|reason| {
            error!("failed to append {} record: {reason}", sender.as_str());
            Error::store_append_failed().with_reason(reason)
        })
    }

    fn mirror(&self, message: Message) {
        self.cmd_tx.send(Command::Mirror(message)).ok();
    }
}

pub(super) async fn run_turn(
    ctx: TurnContext,
    input: String,
    plan: TurnPlan,
    reply: oneshot::Sender<TurnReport>,
) {
    let guard = FinishGuard {
        cmd_tx: ctx.cmd_tx.clone(),
        reply: Some(reply),
    };
    let report = match plan {
        TurnPlan::Single => TurnReport::SingleTurn(run_single(&ctx, &input).await),
        TurnPlan::Replay {
            segments,
            generation,
        } => {
            let mut cycles = Vec::with_capacity(segments.len());
            for (index, segment) in segments.into_iter().enumerate() {
                let result = run_cycle(&ctx, &input, &segment)
                    .instrument(debug_span!("cycle", index))
                    .await;
                cycles.push(CycleReport {
                    index,
                    segment,
                    result,
                });
            }
            let batch = BatchReport { cycles, generation };
            if !batch.is_success() {
                warn!(
                    "{} of {} cycles failed",
                    batch.failures(),
                    batch.cycles.len()
                );
            }
            TurnReport::SegmentReplay(batch)
        }
    };
    guard.finish(report);
}

async fn run_cycle(
    ctx: &TurnContext,
    input: &str,
    segment: &TextSegment,
) -> Result<(), Error> {
    let prompt = combine_prompt(input, &segment.text);
    let reply = ctx.complete(prompt.clone()).await?;

    let user_record = NewMessage::user(prompt);
    let bot_record = NewMessage::bot(reply);
    ctx.mirror(user_record.to_pending());
    ctx.mirror(bot_record.to_pending());

    // The bot record is only written once its user record is in.
    ctx.append(user_record).await?;
    ctx.append(bot_record).await
}

async fn run_single(ctx: &TurnContext, input: &str) -> Result<(), Error> {
    let bot_record = NewMessage::bot(ctx.complete(input.to_owned()).await?);
    ctx.mirror(bot_record.to_pending());
    ctx.append(bot_record).await
}

/// Reports the end of a turn to the driver task.
///
/// If the turn task goes away without reporting (it was aborted, or it
/// panicked), the guard reports [`TurnReport::Aborted`] on drop so the
/// driver never stays busy.
struct FinishGuard {
    cmd_tx: mpsc::UnboundedSender<Command>,
    reply: Option<oneshot::Sender<TurnReport>>,
}

impl FinishGuard {
    fn finish(mut self, report: TurnReport) {
        self.report(report);
    }

    fn report(&mut self, report: TurnReport) {
        let Some(reply) = self.reply.take() else {
            return;
        };
        let cmd = Command::TurnFinished { report, reply };
        if let Err(SendError(Command::TurnFinished { report, reply })) =
            self.cmd_tx.send(cmd)
        {
            // The driver is gone, answer the submitter directly.
            reply.send(report).ok();
        }
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        if self.reply.is_some() {
            warn!("turn ended without reporting");
            self.report(TurnReport::Aborted);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_combine_prompt() {
        assert_eq!(
            combine_prompt("Summarize", "Revenue grew 4%."),
            "Summarize\nRevenue grew 4%."
        );
    }
}
