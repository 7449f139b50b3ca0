//! A [`LogStore`] backed by a Cloud Firestore collection, spoken to over
//! the REST API.
//!
//! Each record is one document with `text`, `sender` and a `timestamp`
//! filled in by the server at commit time. REST has no push channel, so
//! subscriptions poll the collection and only notify when the ordered
//! result changes.

#[macro_use]
extern crate tracing;

mod config;
mod proto;

use std::sync::Arc;

use async_trait::async_trait;
use pdfchat_store::{
    LogStore, Message, NewMessage, SnapshotHandler, StoreError, Subscription,
};
use reqwest::{Client, RequestBuilder, Response};
use tokio::time::{MissedTickBehavior, interval};
use tracing::Instrument;
use uuid::Uuid;

pub use config::{FirestoreConfig, FirestoreConfigBuilder};

/// Firestore-backed message log.
#[derive(Clone, Debug)]
pub struct FirestoreLogStore {
    client: Client,
    config: Arc<FirestoreConfig>,
}

impl FirestoreLogStore {
    /// Creates a store with the given configuration.
    #[inline]
    pub fn new(config: FirestoreConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    /// Reads the whole collection, ordered by timestamp.
    pub async fn fetch_all(&self) -> Result<Vec<Message>, StoreError> {
        let query = proto::create_query(&self.config.collection);
        let resp = self
            .post(&self.config.documents_path(), "runQuery")
            .json(&query)
            .send()
            .await;
        let resp = check_response(resp).await?;
        let items = resp
            .json::<Vec<proto::RunQueryItem>>()
            .await
            .map_err(|err| StoreError::new(format!("bad query reply: {err}")))?;
        Ok(proto::messages_from_query(items))
    }

    fn post(&self, resource: &str, method: &str) -> RequestBuilder {
        let url = format!("{}/{resource}:{method}", self.config.base_url);
        let mut builder = self.client.post(url);
        if let Some(api_key) = &self.config.api_key {
            builder = builder.query(&[("key", api_key)]);
        }
        match &self.config.access_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl LogStore for FirestoreLogStore {
    async fn append(&self, message: NewMessage) -> Result<(), StoreError> {
        let documents_path = self.config.documents_path();
        let document_name = format!(
            "{documents_path}/{}/{}",
            self.config.collection,
            Uuid::new_v4().simple()
        );
        trace!("committing {document_name}");
        let commit = proto::create_commit(document_name, &message);
        let resp = self
            .post(&documents_path, "commit")
            .json(&commit)
            .send()
            .await;
        check_response(resp).await?;
        Ok(())
    }

    fn subscribe(&self, handler: SnapshotHandler) -> Subscription {
        let store = self.clone();
        let task = tokio::spawn(
            async move {
                let mut ticker = interval(store.config.poll_interval);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                let mut gate = SnapshotGate::default();
                loop {
                    ticker.tick().await;
                    match store.fetch_all().await {
                        Ok(snapshot) => {
                            if let Some(snapshot) = gate.admit(snapshot) {
                                handler(snapshot);
                            }
                        }
                        Err(err) => {
                            warn!("failed to poll messages: {err}");
                        }
                    }
                }
            }
            .instrument(debug_span!("firestore subscription")),
        );
        Subscription::from_task(task)
    }
}

async fn check_response(
    resp: Result<Response, reqwest::Error>,
) -> Result<Response, StoreError> {
    // The URL may carry the API key, keep it out of the message.
    let resp =
        resp.map_err(|err| StoreError::new(format!("{}", err.without_url())))?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(StoreError::new(format!("firestore returned {status}: {body}")))
}

/// Lets a snapshot through only when it differs from the last one let
/// through, so polling doesn't re-notify an unchanged log.
#[derive(Default)]
struct SnapshotGate {
    last: Option<Vec<Message>>,
}

impl SnapshotGate {
    fn admit(&mut self, snapshot: Vec<Message>) -> Option<&[Message]> {
        if self.last.as_ref() == Some(&snapshot) {
            return None;
        }
        let last = self.last.insert(snapshot);
        Some(last.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use pdfchat_store::Sender;

    use super::*;

    #[test]
    fn test_snapshot_gate() {
        let mut gate = SnapshotGate::default();
        assert_eq!(gate.admit(vec![]).map(<[Message]>::len), Some(0));
        assert!(gate.admit(vec![]).is_none());

        let one = vec![Message::pending("Hi", Sender::User)];
        assert_eq!(gate.admit(one.clone()).map(<[Message]>::len), Some(1));
        assert!(gate.admit(one).is_none());
    }

    #[test]
    fn test_request_url() {
        let store = FirestoreLogStore::new(
            FirestoreConfigBuilder::with_project_id("demo")
                .with_api_key("k3y")
                .build(),
        );
        let req = store
            .post(&store.config.documents_path(), "commit")
            .build()
            .unwrap();
        assert_eq!(
            req.url().as_str(),
            "https://firestore.googleapis.com/v1/projects/demo/databases/(default)/documents:commit?key=k3y"
        );

        let store = FirestoreLogStore::new(
            FirestoreConfigBuilder::with_project_id("demo")
                .with_api_key("a&b=c")
                .build(),
        );
        let req = store.post("projects/demo", "commit").build().unwrap();
        assert_eq!(req.url().query(), Some("key=a%26b%3Dc"));
    }

    #[tokio::test]
    async fn test_unreachable_store() {
        let store = FirestoreLogStore::new(
            FirestoreConfigBuilder::with_project_id("demo")
                .with_base_url("http://127.0.0.1:9/v1")
                .build(),
        );
        assert!(store.append(NewMessage::user("Hi")).await.is_err());
        assert!(store.fetch_all().await.is_err());
    }

    #[tokio::test]
    async fn test_errors_hide_api_key() {
        let store = FirestoreLogStore::new(
            FirestoreConfigBuilder::with_project_id("demo")
                .with_api_key("SECRET-K3Y")
                .with_base_url("http://127.0.0.1:9/v1")
                .build(),
        );
        let err = store.fetch_all().await.unwrap_err();
        assert!(!err.message().contains("SECRET-K3Y"));
        let err = store.append(NewMessage::bot("Hello")).await.unwrap_err();
        assert!(!err.message().contains("SECRET-K3Y"));
    }
}
