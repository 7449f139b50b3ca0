use std::fmt::{self, Debug};
use std::time::Duration;

/// Builder for [`FirestoreConfig`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FirestoreConfigBuilder {
    project_id: String,
    database: Option<String>,
    collection: Option<String>,
    api_key: Option<String>,
    access_token: Option<String>,
    base_url: Option<String>,
    poll_interval: Option<Duration>,
}

impl FirestoreConfigBuilder {
    /// Creates a builder for the given Google Cloud project.
    #[inline]
    pub fn with_project_id<S: Into<String>>(project_id: S) -> Self {
        Self {
            project_id: project_id.into(),
            database: None,
            collection: None,
            api_key: None,
            access_token: None,
            base_url: None,
            poll_interval: None,
        }
    }

    /// Sets the database id. Defaults to `(default)`.
    #[inline]
    pub fn with_database<S: Into<String>>(mut self, database: S) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Sets the collection holding the messages. Defaults to `messages`.
    #[inline]
    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Sets a web API key, sent as the `key` query parameter.
    #[inline]
    pub fn with_api_key<S: Into<String>>(mut self, api_key: S) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets an OAuth access token, sent as a bearer token.
    #[inline]
    pub fn with_access_token<S: Into<String>>(mut self, token: S) -> Self {
        self.access_token = Some(token.into());
        self
    }

    /// Sets a custom base URL, e.g. to talk to the emulator.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets how often subscriptions poll for changes.
    #[inline]
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> FirestoreConfig {
        FirestoreConfig {
            project_id: self.project_id,
            database: self.database.unwrap_or_else(|| "(default)".to_owned()),
            collection: self
                .collection
                .unwrap_or_else(|| "messages".to_owned()),
            api_key: self.api_key,
            access_token: self.access_token,
            base_url: self.base_url.map_or_else(
                || "https://firestore.googleapis.com/v1".to_owned(),
                |url| url.trim_end_matches('/').to_owned(),
            ),
            poll_interval: self
                .poll_interval
                .unwrap_or(Duration::from_secs(1)),
        }
    }
}

impl Debug for FirestoreConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreConfigBuilder")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<deducted>"),
            )
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

/// Configuration for [`crate::FirestoreLogStore`].
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct FirestoreConfig {
    pub(crate) project_id: String,
    pub(crate) database: String,
    pub(crate) collection: String,
    pub(crate) api_key: Option<String>,
    pub(crate) access_token: Option<String>,
    pub(crate) base_url: String,
    pub(crate) poll_interval: Duration,
}

impl FirestoreConfig {
    /// The resource path of the database's document root.
    pub(crate) fn documents_path(&self) -> String {
        format!(
            "projects/{}/databases/{}/documents",
            self.project_id, self.database
        )
    }
}

impl Debug for FirestoreConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FirestoreConfig")
            .field("project_id", &self.project_id)
            .field("database", &self.database)
            .field("collection", &self.collection)
            .field("api_key", &self.api_key.as_ref().map(|_| "<deducted>"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "<deducted>"),
            )
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}
