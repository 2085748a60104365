//! OpenAPI specification endpoints

use actix_web::{get, HttpResponse, Responder};
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Risk Analyzer API",
        description = "API for analyzing corporate exposure to specific risk channels"
    ),
    paths(
        crate::api::analysis::analyze_risk,
        crate::api::analysis::submit_risk_analysis,
        crate::api::analysis::get_risk_analysis,
        crate::api::health::health_check,
    ),
    components(schemas(
        crate::api::analysis::AcceptedResponse,
        crate::api::error::ErrorResponse,
        crate::api::health::HealthStatus,
        crate::model::RiskAnalysisRequest,
        crate::model::RiskAnalysisResponse,
        crate::model::StatusReport,
    )),
    tags(
        (name = "risk-analysis", description = "Risk analysis workflow"),
        (name = "health", description = "Service health")
    )
)]
pub struct ApiDoc;

/// Serve OpenAPI JSON specification
#[get("/openapi.json")]
pub async fn openapi_json() -> impl Responder {
    HttpResponse::Ok().json(ApiDoc::openapi())
}

/// Serve OpenAPI YAML specification
#[get("/openapi.yaml")]
pub async fn openapi_yaml() -> impl Responder {
    match ApiDoc::openapi().to_yaml() {
        Ok(yaml) => HttpResponse::Ok().content_type("text/yaml").body(yaml),
        Err(e) => {
            tracing::error!(error = %e, "Failed to render OpenAPI YAML");
            HttpResponse::InternalServerError().finish()
        }
    }
}

/// Configure OpenAPI routes
pub fn configure(cfg: &mut actix_web::web::ServiceConfig) {
    cfg.service(openapi_json).service(openapi_yaml);
}
