pub mod health;
pub mod register;
pub mod survey;
pub mod swagger;

use actix_cors::Cors;
use actix_web::http::header;
use actix_web::{error, web, HttpResponse};

use crate::utils::ErrorResponse;

/// Routes shared by the server and the handler tests.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(json_config())
        // Health check
        .route("/", web::get().to(health::root))
        .route("/health", web::get().to(health::health_check))
        // Users
        .route("/register", web::post().to(register::register))
        // Survey
        .service(
            web::scope("/api")
                .route("/submit", web::post().to(survey::submit))
                .route("/results", web::get().to(survey::results)),
        );
}

/// Rejects unparsable bodies with the same `{"error": ...}` shape as the handlers.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, req| {
        log::warn!("❌ Invalid JSON body on {} {}: {}", req.method(), req.path(), err);
        let response = HttpResponse::BadRequest().json(ErrorResponse {
            error: "Invalid JSON request body.".to_string(),
        });
        error::InternalError::from_response(err, response).into()
    })
}

/// Any origin when `allowed_origins` is empty.
pub fn cors(allowed_origins: &[String]) -> Cors {
    let cors = Cors::default()
        .allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::CONTENT_TYPE, header::ACCEPT, header::AUTHORIZATION])
        .expose_headers(vec![header::CONTENT_TYPE])
        .max_age(3600);

    if allowed_origins.is_empty() {
        return cors.allow_any_origin();
    }
    allowed_origins
        .iter()
        .fold(cors, |cors, origin| cors.allowed_origin(origin))
}
