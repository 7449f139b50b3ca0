use std::sync::Arc;

use pdfchat_core::{Driver, DriverBuilder, DriverConfig, Error, TurnReport};
use pdfchat_extractor::Extractor;
use pdfchat_model::ModelProvider;
use pdfchat_store::{LogStore, Message, Subscription};

/// A session builder.
///
/// See [`Session`].
pub struct SessionBuilder {
    driver_builder: DriverBuilder,
    store: Arc<dyn LogStore>,
    extractor: Arc<dyn Extractor>,
}

impl SessionBuilder {
    /// Creates a session builder from its three collaborators.
    pub fn new<M: ModelProvider + 'static>(
        provider: M,
        store: Arc<dyn LogStore>,
        extractor: Arc<dyn Extractor>,
    ) -> Self {
        let driver_builder = DriverBuilder::new(provider, Arc::clone(&store));
        Self {
            driver_builder,
            store,
            extractor,
        }
    }

    /// Sets the timeouts applied to each model call and store append.
    #[inline]
    pub fn with_driver_config(mut self, config: DriverConfig) -> Self {
        self.driver_builder = self.driver_builder.with_config(config);
        self
    }

    /// Attaches a callback to be invoked when the driver mirrors a
    /// message locally, ahead of the store.
    #[inline]
    pub fn on_mirror(
        mut self,
        on_mirror: impl Fn(&Message) + Send + 'static,
    ) -> Self {
        self.driver_builder = self.driver_builder.on_mirror(on_mirror);
        self
    }

    /// Attaches a callback to be invoked when a turn finishes.
    #[inline]
    pub fn on_idle(mut self, on_idle: impl Fn() + Send + 'static) -> Self {
        self.driver_builder = self.driver_builder.on_idle(on_idle);
        self
    }

    /// Builds a new session.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Session {
        Session {
            driver: self.driver_builder.build(),
            store: self.store,
            extractor: self.extractor,
        }
    }
}

/// A chat session, like a window that displays messages, has an input
/// box and an upload button.
///
/// It's basically a wrapper around [`Driver`] that also knows where
/// documents are extracted and where the log lives.
pub struct Session {
    driver: Driver,
    store: Arc<dyn LogStore>,
    extractor: Arc<dyn Extractor>,
}

impl Session {
    /// Sends a message and waits for the turn to finish.
    #[inline]
    pub async fn send_message(&self, message: &str) -> TurnReport {
        self.driver.submit_turn(message).await
    }

    /// Extracts `document` and queues its segments for the next message.
    ///
    /// Returns the number of segments extracted.
    pub async fn upload_document(
        &self,
        file_name: &str,
        document: Vec<u8>,
    ) -> Result<usize, Error> {
        match self.extractor.extract(file_name, document).await {
            Ok(segments) => {
                let count = segments.len();
                info!("extracted {count} segments from {file_name}");
                self.driver.on_extraction_result(segments);
                Ok(count)
            }
            Err(err) => {
                error!("failed to extract {file_name}: {err}");
                Err(Error::extraction_failed().with_reason(err.message()))
            }
        }
    }

    /// Watches the persisted conversation.
    ///
    /// `handler` receives the whole log on every change.
    #[inline]
    pub fn subscribe(
        &self,
        handler: impl Fn(&[Message]) + Send + Sync + 'static,
    ) -> Subscription {
        self.store.subscribe(Box::new(handler))
    }

    /// Returns the underlying driver.
    #[inline]
    pub fn driver(&self) -> &Driver {
        &self.driver
    }
}
