use std::sync::Arc;

use futures::FutureExt;
use mongodb::bson::{self, Document};

use crate::database::{with_connection, Connector, ResponsesCollection, StoreResult, StoredId};
use crate::models::{ResponseRecord, SurveyPayload, SurveyResult};
use crate::services::response_mapper;
use crate::utils::clock;

/// Converts a submission into a BSON document. Fails only for values BSON
/// cannot hold, such as integers above `i64::MAX`.
pub fn payload_to_document(payload: &SurveyPayload) -> Result<Document, bson::ser::Error> {
    bson::to_document(&payload.0)
}

/// Stores a submission with a server-assigned timestamp.
pub async fn submit(connector: Arc<dyn Connector>, fields: Document) -> StoreResult<StoredId> {
    let record = ResponseRecord::new(fields, clock::monotonic_now());

    with_connection(connector, move |conn| {
        async move { ResponsesCollection::new(conn).insert(record).await }.boxed()
    })
    .await
}

/// All submissions, newest first, shaped for clients.
pub async fn results(connector: Arc<dyn Connector>) -> StoreResult<Vec<SurveyResult>> {
    let records = with_connection(connector, |conn| {
        async move { ResponsesCollection::new(conn).list().await }.boxed()
    })
    .await?;

    Ok(records.into_iter().map(response_mapper::to_survey_result).collect())
}
