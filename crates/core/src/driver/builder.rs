use std::sync::Arc;
use std::time::Duration;

use pdfchat_model::ModelProvider;
use pdfchat_store::{LogStore, Message};

use super::Driver;
use super::state::{ConversationState, DriverState};
use crate::conversation::Transcript;
use crate::model_client::ModelClient;

pub(super) type MirrorFn = Box<dyn Fn(&Message) + Send + 'static>;
pub(super) type IdleFn = Box<dyn Fn() + Send + 'static>;

/// Bounds on how long a turn waits for its collaborators.
///
/// `None` waits forever.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DriverConfig {
    /// Limit for one model call, reported as a model failure.
    pub model_timeout: Option<Duration>,
    /// Limit for one store append, reported as an append failure.
    pub store_timeout: Option<Duration>,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            model_timeout: Some(Duration::from_secs(60)),
            store_timeout: Some(Duration::from_secs(15)),
        }
    }
}

/// Builder for [`Driver`].
pub struct DriverBuilder {
    model_client: ModelClient,
    store: Arc<dyn LogStore>,
    config: DriverConfig,
    on_mirror: Option<MirrorFn>,
    on_idle: Option<IdleFn>,
}

impl DriverBuilder {
    /// Creates a builder talking to `provider` and persisting to `store`.
    #[inline]
    pub fn new<P: ModelProvider + 'static>(
        provider: P,
        store: Arc<dyn LogStore>,
    ) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            store,
            config: DriverConfig::default(),
            on_mirror: None,
            on_idle: None,
        }
    }

    /// Replaces the whole configuration.
    #[inline]
    pub fn with_config(mut self, config: DriverConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the model call timeout.
    #[inline]
    pub fn with_model_timeout(mut self, limit: Option<Duration>) -> Self {
        self.config.model_timeout = limit;
        self
    }

    /// Sets the store append timeout.
    #[inline]
    pub fn with_store_timeout(mut self, limit: Option<Duration>) -> Self {
        self.config.store_timeout = limit;
        self
    }

    /// Sets a callback invoked for every entry added to the local mirror.
    ///
    /// The callback runs on the driver task and should return quickly.
    #[inline]
    pub fn on_mirror(
        mut self,
        on_mirror: impl Fn(&Message) + Send + 'static,
    ) -> Self {
        self.on_mirror = Some(Box::new(on_mirror));
        self
    }

    /// Sets a callback invoked whenever a turn finishes.
    #[inline]
    pub fn on_idle(mut self, on_idle: impl Fn() + Send + 'static) -> Self {
        self.on_idle = Some(Box::new(on_idle));
        self
    }

    /// Starts the driver.
    ///
    /// Must be called from within a tokio runtime.
    pub fn build(self) -> Driver {
        debug!("starting driver with {:?}", self.config);
        Driver::spawn(DriverState {
            model_client: self.model_client,
            store: self.store,
            config: self.config,
            conversation: ConversationState::default(),
            transcript: Transcript::default(),
            running_turn: None,
            on_mirror: self.on_mirror,
            on_idle: self.on_idle,
        })
    }
}
