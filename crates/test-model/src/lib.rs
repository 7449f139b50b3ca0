//! A local fake model for testing purpose.

mod preset;

use std::collections::VecDeque;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::future::ready;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll, ready};
use std::time::Duration;

use pdfchat_model::{
    ErrorKind, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest, ModelResponse, ModelResponseEvent,
};
use tokio::time::{Sleep, sleep};

pub use preset::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ModelProviderError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

pub struct TestModelResponse {
    preset: PresetResponse,
    delay: Duration,
    event_idx: usize,
    sleep: Option<Pin<Box<Sleep>>>,
}

impl ModelResponse for TestModelResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        // SAFETY: This type does not require to be pinned.
        let this = unsafe { self.get_unchecked_mut() };

        if let Some(sleep) = &mut this.sleep {
            let sleep = sleep.as_mut();
            ready!(sleep.poll(cx));
            this.sleep = None;

            if let Some(kind) = this.preset.failure {
                return Poll::Ready(Err(Error {
                    message: "preset failure",
                    kind,
                }));
            }

            let events = &this.preset.events;
            if this.event_idx < events.len() {
                let event = match &events[this.event_idx] {
                    PresetEvent::MessageDelta(msg) => {
                        ModelResponseEvent::MessageDelta(msg.clone())
                    }
                };
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(event)));
            } else if this.event_idx == events.len() {
                this.event_idx += 1;
                return Poll::Ready(Ok(Some(ModelResponseEvent::Completed(
                    ModelFinishReason::Stop,
                ))));
            } else {
                // In case this method is called after completion.
                return Poll::Ready(Ok(None));
            }
        }
        this.sleep = Some(Box::pin(sleep(this.delay)));
        Pin::new(this).poll_next_event(cx)
    }
}

#[derive(Default)]
struct Script {
    rules: Vec<(String, PresetResponse)>,
    queue: VecDeque<PresetResponse>,
    requests: Vec<ModelRequest>,
}

/// A local fake model for testing purpose.
///
/// Responses are picked for each request in this order:
///
/// 1. The first rule whose needle is contained in the prompt. Rules are
///    never consumed.
/// 2. The next queued response.
/// 3. An echo reply, `"You said {prompt}"`.
///
/// Clones share the same script, so a test can hand a clone to the code
/// under test and inspect [`TestModelProvider::requests`] afterwards.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct TestModelProvider {
    script: Arc<Mutex<Script>>,
    delay: Option<Duration>,
}

impl TestModelProvider {
    /// Queues a response for the next request that matches no rule.
    #[inline]
    pub fn add_response(&mut self, preset: PresetResponse) {
        self.lock_script().queue.push_back(preset);
    }

    /// Answers every prompt containing `needle` with `preset`.
    #[inline]
    pub fn add_rule<S: Into<String>>(
        &mut self,
        needle: S,
        preset: PresetResponse,
    ) {
        self.lock_script().rules.push((needle.into(), preset));
    }

    /// Sets the delay before each event of a response.
    #[inline]
    pub fn set_delay(&mut self, duration: Duration) {
        self.delay = Some(duration);
    }

    /// Returns every request received so far, in arrival order.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.lock_script().requests.clone()
    }

    /// Returns the prompts of every request received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.lock_script()
            .requests
            .iter()
            .map(|req| req.prompt.clone())
            .collect()
    }

    fn lock_script(&self) -> std::sync::MutexGuard<'_, Script> {
        self.script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl ModelProvider for TestModelProvider {
    type Error = crate::Error;
    type Response = TestModelResponse;

    fn send_request(
        &self,
        req: &ModelRequest,
    ) -> impl Future<Output = Result<Self::Response, Self::Error>> + Send + 'static
    {
        let preset = {
            let mut script = self.lock_script();
            script.requests.push(req.clone());
            let rule = script
                .rules
                .iter()
                .find(|(needle, _)| req.prompt.contains(needle.as_str()))
                .map(|(_, preset)| preset.clone());
            rule.or_else(|| script.queue.pop_front())
                .unwrap_or_else(|| PresetResponse::echo(&req.prompt))
        };
        let resp = TestModelResponse {
            preset,
            delay: self.delay.unwrap_or(Duration::from_millis(1)),
            event_idx: 0,
            sleep: None,
        };
        ready(Ok(resp))
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use super::*;

    async fn collect_response(resp: TestModelResponse) -> Result<String, Error> {
        let mut resp = pin!(resp);
        let mut msg = String::new();
        loop {
            let event = poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await?;
            match event {
                Some(ModelResponseEvent::MessageDelta(delta)) => {
                    msg.push_str(&delta);
                }
                Some(ModelResponseEvent::Completed(_)) => {}
                None => break,
            }
        }
        Ok(msg)
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hello, ".to_owned()),
            PresetEvent::MessageDelta("world!".to_owned()),
        ]));

        let resp = provider
            .send_request(&ModelRequest::new("Hi"))
            .await
            .unwrap();
        assert_eq!(collect_response(resp).await.unwrap(), "Hello, world!");

        // The queue is drained, so the model echoes now.
        let resp = provider
            .send_request(&ModelRequest::new("Check my todo"))
            .await
            .unwrap();
        assert_eq!(
            collect_response(resp).await.unwrap(),
            "You said Check my todo"
        );
        assert_eq!(provider.prompts(), vec!["Hi", "Check my todo"]);
    }

    #[tokio::test]
    async fn test_rules_take_precedence() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::reply("queued"));
        provider.add_rule("beta", PresetResponse::failure(ErrorKind::Moderated));

        for _ in 0..2 {
            let resp = provider
                .send_request(&ModelRequest::new("summarize\nbeta"))
                .await
                .unwrap();
            let err = collect_response(resp).await.unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Moderated);
        }

        let resp = provider
            .send_request(&ModelRequest::new("summarize\nalpha"))
            .await
            .unwrap();
        assert_eq!(collect_response(resp).await.unwrap(), "queued");
    }

    #[tokio::test(start_paused = true)]
    async fn test_delay() {
        let mut provider = TestModelProvider::default();
        provider.set_delay(Duration::from_secs(5));

        let started = tokio::time::Instant::now();
        let resp = provider
            .send_request(&ModelRequest::new("Hi"))
            .await
            .unwrap();
        collect_response(resp).await.unwrap();
        assert!(started.elapsed() >= Duration::from_secs(10));
    }
}
