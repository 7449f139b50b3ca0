use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use pdfchat_store::{Message, NewMessage, Sender, Timestamp};
use serde::{Deserialize, Serialize};

const TEXT_FIELD: &str = "text";
const SENDER_FIELD: &str = "sender";
const TIMESTAMP_FIELD: &str = "timestamp";

// ---------------------------
// Types shared in both ways
// ---------------------------

/// A Firestore field value. Only the variants the log uses are modeled;
/// anything else deserializes to an empty value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Value {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub string_value: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_value: Option<DateTime<Utc>>,
}

impl Value {
    fn string<S: Into<String>>(s: S) -> Self {
        Self {
            string_value: Some(s.into()),
            ..Default::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub fields: BTreeMap<String, Value>,
}

// ------------------------
// Types sent to the server
// ------------------------

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Precondition {
    exists: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform {
    field_path: &'static str,
    set_to_server_value: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct Write {
    update: Document,
    current_document: Precondition,
    update_transforms: Vec<FieldTransform>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommitRequest {
    writes: Vec<Write>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSelector {
    collection_id: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldReference {
    field_path: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
struct Order {
    field: FieldReference,
    direction: &'static str,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct StructuredQuery {
    from: Vec<CollectionSelector>,
    order_by: Vec<Order>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunQueryRequest {
    structured_query: StructuredQuery,
}

// ------------------------------
// Types received from the server
// ------------------------------

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct RunQueryItem {
    pub document: Option<Document>,
}

// -----------
// Conversions
// -----------

/// Builds a commit creating `document_name` with the server's request
/// time as its `timestamp`.
pub fn create_commit(document_name: String, message: &NewMessage) -> CommitRequest {
    let mut fields = BTreeMap::new();
    fields.insert(TEXT_FIELD.to_owned(), Value::string(message.text.clone()));
    fields.insert(
        SENDER_FIELD.to_owned(),
        Value::string(message.sender.as_str()),
    );
    CommitRequest {
        writes: vec![Write {
            update: Document {
                name: Some(document_name),
                fields,
            },
            current_document: Precondition { exists: false },
            update_transforms: vec![FieldTransform {
                field_path: TIMESTAMP_FIELD,
                set_to_server_value: "REQUEST_TIME",
            }],
        }],
    }
}

/// Builds a query listing the whole collection by timestamp.
pub fn create_query(collection: &str) -> RunQueryRequest {
    RunQueryRequest {
        structured_query: StructuredQuery {
            from: vec![CollectionSelector {
                collection_id: collection.to_owned(),
            }],
            order_by: vec![Order {
                field: FieldReference {
                    field_path: TIMESTAMP_FIELD,
                },
                direction: "ASCENDING",
            }],
        },
    }
}

/// Converts query results into log records, skipping documents that
/// don't look like messages.
pub fn messages_from_query(items: Vec<RunQueryItem>) -> Vec<Message> {
    items
        .into_iter()
        .filter_map(|item| item.document)
        .filter_map(|doc| {
            let message = message_from_document(&doc);
            if message.is_none() {
                warn!("skipping malformed document: {:?}", doc.name);
            }
            message
        })
        .collect()
}

fn message_from_document(doc: &Document) -> Option<Message> {
    let text = doc.fields.get(TEXT_FIELD)?.string_value.clone()?;
    let sender = doc
        .fields
        .get(SENDER_FIELD)?
        .string_value
        .as_deref()
        .and_then(Sender::from_wire)?;
    let timestamp = doc.fields.get(TIMESTAMP_FIELD)?.timestamp_value?;
    Some(Message {
        text,
        sender,
        timestamp: Some(Timestamp::from_datetime(timestamp)),
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_create_commit() {
        let commit = create_commit(
            "projects/p/databases/(default)/documents/messages/abc".to_owned(),
            &NewMessage::user("Hello"),
        );
        assert_eq!(
            serde_json::to_value(&commit).unwrap(),
            json!({
                "writes": [{
                    "update": {
                        "name": "projects/p/databases/(default)/documents/messages/abc",
                        "fields": {
                            "sender": { "stringValue": "user" },
                            "text": { "stringValue": "Hello" }
                        }
                    },
                    "currentDocument": { "exists": false },
                    "updateTransforms": [{
                        "fieldPath": "timestamp",
                        "setToServerValue": "REQUEST_TIME"
                    }]
                }]
            })
        );
    }

    #[test]
    fn test_create_query() {
        assert_eq!(
            serde_json::to_value(create_query("messages")).unwrap(),
            json!({
                "structuredQuery": {
                    "from": [{ "collectionId": "messages" }],
                    "orderBy": [{
                        "field": { "fieldPath": "timestamp" },
                        "direction": "ASCENDING"
                    }]
                }
            })
        );
    }

    #[test]
    fn test_messages_from_query() {
        let items: Vec<RunQueryItem> = serde_json::from_value(json!([
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/messages/a",
                    "fields": {
                        "text": { "stringValue": "Hi" },
                        "sender": { "stringValue": "user" },
                        "timestamp": { "timestampValue": "2024-05-01T10:00:00.123456Z" }
                    },
                    "createTime": "2024-05-01T10:00:00.123456Z",
                    "updateTime": "2024-05-01T10:00:00.123456Z"
                },
                "readTime": "2024-05-01T10:00:05Z"
            },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/messages/b",
                    "fields": {
                        "text": { "stringValue": "stray" },
                        "sender": { "integerValue": "3" }
                    }
                },
                "readTime": "2024-05-01T10:00:05Z"
            },
            {
                "document": {
                    "name": "projects/p/databases/(default)/documents/messages/c",
                    "fields": {
                        "text": { "stringValue": "Hello!" },
                        "sender": { "stringValue": "bot" },
                        "timestamp": { "timestampValue": "2024-05-01T10:00:01Z" }
                    }
                },
                "readTime": "2024-05-01T10:00:05Z"
            }
        ]))
        .unwrap();

        let messages = messages_from_query(items);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].text, "Hi");
        assert_eq!(messages[0].sender, Sender::User);
        assert_eq!(messages[1].sender, Sender::Bot);
        assert!(messages[0].timestamp < messages[1].timestamp);

        // An empty collection answers with a bare read time.
        let items: Vec<RunQueryItem> =
            serde_json::from_value(json!([{ "readTime": "2024-05-01T10:00:05Z" }]))
                .unwrap();
        assert!(messages_from_query(items).is_empty());
    }
}
