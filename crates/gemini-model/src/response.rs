use std::pin::Pin;
use std::task::{Context, Poll, ready};

use pdfchat_model::{
    ErrorKind, ModelFinishReason, ModelResponse, ModelResponseEvent,
};
use pin_project_lite::pin_project;

use crate::Error;
use crate::io::Sse;
use crate::proto::{GenerateContentChunk, is_blocking_finish_reason};

struct PartialState {
    sse: Sse,
    // Set when a chunk carried a finish reason. It's emitted on the next
    // poll, after the text delta of the same chunk.
    pending_finish_reason: Option<ModelFinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    pub struct GeminiResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl GeminiResponse {
    #[inline]
    pub fn from_sse(sse: Sse) -> Self {
        let partial_state = PartialState {
            sse,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for GeminiResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(
    mut partial_state: PartialState,
) -> Result<(Option<ModelResponseEvent>, PartialState), Error> {
    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    let sse = &mut partial_state.sse;
    loop {
        let sse_event = match sse.next_event().await {
            Ok(Some(event)) => event,
            Ok(None) => break,
            Err(err) => {
                return Err(Error::new(
                    format!("{err:?}"),
                    ErrorKind::Unavailable,
                ));
            }
        };
        trace!("got sse event: {sse_event}");

        let chunk = serde_json::from_str::<GenerateContentChunk>(&sse_event)
            .map_err(|err| Error::new(format!("{err}"), ErrorKind::Other))?;

        if let Some(block_reason) = chunk
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
        {
            return Err(Error::new(
                format!("prompt blocked: {block_reason}"),
                ErrorKind::Moderated,
            ));
        }

        // Only one candidate is ever requested.
        let Some(candidate) = chunk.candidates.first() else {
            continue;
        };

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if is_blocking_finish_reason(reason) {
                return Err(Error::new(
                    format!("response blocked: {reason}"),
                    ErrorKind::Moderated,
                ));
            }
            partial_state.pending_finish_reason = Some(match reason {
                "STOP" => ModelFinishReason::Stop,
                "MAX_TOKENS" => ModelFinishReason::MaxTokens,
                _ => ModelFinishReason::Other,
            });
        }

        let text = candidate.text();
        if !text.is_empty() {
            return Ok((
                Some(ModelResponseEvent::MessageDelta(text)),
                partial_state,
            ));
        }

        if let Some(finish_reason) = partial_state.pending_finish_reason.take()
        {
            return Ok((
                Some(ModelResponseEvent::Completed(finish_reason)),
                partial_state,
            ));
        }
    }

    Ok((None, partial_state))
}
