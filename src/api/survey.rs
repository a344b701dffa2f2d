use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};

use crate::database::Connector;
use crate::models::{SurveyPayload, SurveyResult};
use crate::services::survey_service;
use crate::utils::{ApiError, ErrorResponse};

#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct SubmitResponse {
    pub message: String,
    pub id: String,
}

#[utoipa::path(
    post,
    path = "/api/submit",
    tag = "Survey",
    request_body = SurveyPayload,
    responses(
        (status = 201, description = "Response stored", body = SubmitResponse),
        (status = 400, description = "Body is not a JSON object", body = ErrorResponse),
        (status = 500, description = "Store unavailable or rejected the write", body = ErrorResponse)
    )
)]
pub async fn submit(
    db: web::Data<dyn Connector>,
    payload: web::Json<SurveyPayload>,
) -> Result<HttpResponse, ApiError> {
    let payload = payload.into_inner();
    log::info!("🗳️  POST /api/submit - {} fields", payload.0.len());

    let fields = survey_service::payload_to_document(&payload).map_err(|e| {
        log::warn!("❌ Submission rejected: {}", e);
        ApiError::Validation("Submission contains values that cannot be stored.".to_string())
    })?;

    match survey_service::submit(db.into_inner(), fields).await {
        Ok(id) => {
            log::info!("✅ Survey response stored: {}", id);
            Ok(HttpResponse::Created().json(SubmitResponse {
                message: "Survey submitted successfully!".to_string(),
                id: id.to_string(),
            }))
        }
        Err(e) => {
            log::error!("❌ Submission failed: {}", e);
            Err(ApiError::server("Server error during submission.", e))
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/results",
    tag = "Survey",
    responses(
        (status = 200, description = "All responses, newest first", body = [SurveyResult]),
        (status = 500, description = "Store unavailable", body = ErrorResponse)
    )
)]
pub async fn results(db: web::Data<dyn Connector>) -> Result<HttpResponse, ApiError> {
    log::info!("📊 GET /api/results");

    match survey_service::results(db.into_inner()).await {
        Ok(results) => {
            log::info!("✅ Found {} survey responses", results.len());
            Ok(HttpResponse::Ok().json(results))
        }
        Err(e) => {
            log::error!("❌ Fetching results failed: {}", e);
            Err(ApiError::server("Server error fetching results.", e))
        }
    }
}
