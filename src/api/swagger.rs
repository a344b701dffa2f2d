use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Survey Service API",
        version = "1.0.0",
        description = "User registration and survey response collection backed by MongoDB.\n\n**Error bodies:** every failure answers `{\"error\": \"...\"}`; store internals are never included."
    ),
    paths(
        // Health
        crate::api::health::root,
        crate::api::health::health_check,

        // Users
        crate::api::register::register,

        // Survey
        crate::api::survey::submit,
        crate::api::survey::results,
    ),
    components(
        schemas(
            crate::api::health::HealthResponse,
            crate::services::registration_service::RegisterRequest,
            crate::services::registration_service::RegisterResponse,
            crate::api::survey::SubmitResponse,
            crate::models::SurveyPayload,
            crate::models::SurveyResult,
            crate::utils::ErrorResponse,
        )
    ),
    tags(
        (name = "Health", description = "Liveness endpoints. They never access the store."),
        (name = "Users", description = "User registration."),
        (name = "Survey", description = "Survey response submission and retrieval."),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_every_route() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        for expected in ["/", "/health", "/register", "/api/submit", "/api/results"] {
            assert!(paths.iter().any(|p| p.as_str() == expected), "missing {}", expected);
        }
    }
}
