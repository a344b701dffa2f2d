use mongodb::bson::{Bson, DateTime};
use serde_json::{Map, Value};

use crate::models::{ResponseRecord, SurveyResult};

/// Shapes a stored response for clients: caller fields pass through, the
/// server timestamp is rendered as RFC 3339 and the store's `_id` becomes `id`.
pub fn to_survey_result(record: ResponseRecord) -> SurveyResult {
    let mut row: Map<String, Value> = record
        .fields
        .into_iter()
        .map(|(key, value)| (key, bson_to_json(value)))
        .collect();

    if let Some(ts) = record.timestamp {
        row.insert("timestamp".to_string(), datetime_to_json(ts));
    }
    if let Some(id) = record.id {
        row.insert("id".to_string(), bson_to_json(id));
    }

    SurveyResult(row)
}

fn bson_to_json(value: Bson) -> Value {
    match value {
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(ts) => datetime_to_json(ts),
        Bson::Int32(n) => Value::from(n),
        Bson::Int64(n) => Value::from(n),
        Bson::Array(items) => Value::Array(items.into_iter().map(bson_to_json).collect()),
        Bson::Document(doc) => Value::Object(doc.into_iter().map(|(k, v)| (k, bson_to_json(v))).collect()),
        other => other.into_relaxed_extjson(),
    }
}

fn datetime_to_json(ts: DateTime) -> Value {
    ts.try_to_rfc3339_string()
        .map(Value::String)
        .unwrap_or_else(|_| Value::from(ts.timestamp_millis()))
}
