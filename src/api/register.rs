use actix_web::{web, HttpResponse};
use mongodb::bson::DateTime;

use crate::database::Connector;
use crate::services::registration_service::{
    self, RegisterRequest, RegisterResponse, RegistrationOutcome, EMAIL_TAKEN_MESSAGE, MISSING_FIELDS_MESSAGE,
};
use crate::utils::{ApiError, ErrorResponse};

#[utoipa::path(
    post,
    path = "/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisterResponse),
        (status = 400, description = "Missing required fields", body = ErrorResponse),
        (status = 409, description = "Email already registered", body = ErrorResponse),
        (status = 500, description = "Store unavailable or rejected the write", body = ErrorResponse)
    )
)]
pub async fn register(
    db: web::Data<dyn Connector>,
    request: web::Json<RegisterRequest>,
) -> Result<HttpResponse, ApiError> {
    let email = request.email.clone().unwrap_or_else(|| "N/A".to_string());
    log::info!("📝 POST /register - email: {}", email);

    let user = request.into_inner().into_user(DateTime::now()).map_err(|missing| {
        log::warn!("❌ Registration rejected: {} - missing {:?}", email, missing);
        ApiError::Validation(MISSING_FIELDS_MESSAGE.to_string())
    })?;

    match registration_service::register(db.into_inner(), user).await {
        Ok(RegistrationOutcome::Created(id)) => {
            log::info!("✅ User registered: {} ({})", email, id);
            Ok(HttpResponse::Created().json(RegisterResponse {
                message: "User registered successfully!".to_string(),
                user_id: registration_service::display_user_id(),
                mongo_id: id.to_string(),
            }))
        }
        Ok(RegistrationOutcome::EmailTaken) => {
            log::warn!("❌ Registration rejected: {} - already registered", email);
            Err(ApiError::Conflict(EMAIL_TAKEN_MESSAGE.to_string()))
        }
        Err(e) => {
            log::error!("❌ Registration failed: {} - {}", email, e);
            Err(ApiError::server("Server error during registration.", e))
        }
    }
}
