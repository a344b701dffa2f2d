use mongodb::bson::{Bson, DateTime, Document};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Body of a survey submission: any JSON object, kept verbatim.
#[derive(Debug, Clone, Default, Deserialize, utoipa::ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct SurveyPayload(pub Map<String, Value>);

/// A stored response as the API exposes it: the submitted fields plus
/// `timestamp` and `id`.
#[derive(Debug, Clone, PartialEq, Serialize, utoipa::ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct SurveyResult(pub Map<String, Value>);

/// A document of the `responses` collection, split into its server-owned
/// parts and the caller's fields.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseRecord {
    pub id: Option<Bson>,
    pub timestamp: Option<DateTime>,
    pub fields: Document,
}

impl ResponseRecord {
    /// Client-supplied `_id` and `timestamp` are dropped; both belong to the server.
    pub fn new(mut fields: Document, timestamp: DateTime) -> Self {
        fields.remove("_id");
        fields.remove("timestamp");
        Self {
            id: None,
            timestamp: Some(timestamp),
            fields,
        }
    }

    pub fn from_document(mut document: Document) -> Self {
        let id = document.remove("_id");
        let timestamp = match document.get("timestamp") {
            Some(Bson::DateTime(ts)) => {
                let ts = *ts;
                document.remove("timestamp");
                Some(ts)
            }
            _ => None,
        };

        Self {
            id,
            timestamp,
            fields: document,
        }
    }

    pub fn into_document(self) -> Document {
        let mut document = self.fields;
        if let Some(id) = self.id {
            document.insert("_id", id);
        }
        if let Some(ts) = self.timestamp {
            document.insert("timestamp", ts);
        }
        document
    }
}
