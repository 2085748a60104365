//! Risk analysis endpoints
//!
//! Two submission modes share the same request shape: the synchronous
//! endpoint blocks until the report is ready, the job endpoint accepts the
//! request and runs the pipeline in a background worker that pollers follow
//! through the status endpoint.

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::api::error::ApiError;
use crate::app::AppState;
use crate::db::JobStore;
use crate::model::{RiskAnalysisRequest, StatusReport, WorkflowStatus};
use crate::service::jobs;
use crate::service::workflow::Progress;

/// Acknowledgement body for an accepted asynchronous job
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AcceptedResponse {
    pub request_id: Uuid,
    pub status: WorkflowStatus,
}

/// Run a risk analysis synchronously
#[utoipa::path(
    post,
    path = "/risk-analysis",
    request_body = RiskAnalysisRequest,
    responses(
        (status = 200, description = "Risk analysis report", body = crate::model::RiskAnalysisResponse),
        (status = 400, description = "Invalid request", body = crate::api::error::ErrorResponse),
        (status = 500, description = "Analysis failed", body = crate::api::error::ErrorResponse),
        (status = 502, description = "Upstream service failed", body = crate::api::error::ErrorResponse)
    ),
    tag = "risk-analysis"
)]
#[post("/risk-analysis")]
pub async fn analyze_risk(
    state: web::Data<AppState>,
    body: web::Json<RiskAnalysisRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let response = state
        .analysis
        .run(&request, &Progress::detached())
        .await
        .map_err(ApiError::from)?;

    Ok(HttpResponse::Ok().json(response))
}

/// Submit a risk analysis job for background execution
#[utoipa::path(
    post,
    path = "/risk-analysis/jobs",
    request_body = RiskAnalysisRequest,
    responses(
        (status = 202, description = "Job accepted", body = AcceptedResponse),
        (status = 400, description = "Invalid request", body = crate::api::error::ErrorResponse)
    ),
    tag = "risk-analysis"
)]
#[post("/risk-analysis/jobs")]
pub async fn submit_risk_analysis(
    state: web::Data<AppState>,
    body: web::Json<RiskAnalysisRequest>,
) -> Result<HttpResponse, ApiError> {
    let request = body.into_inner();
    request.validate()?;

    let request_id = Uuid::new_v4();
    state
        .store
        .create_or_update_status(request_id, WorkflowStatus::Queued)
        .await
        .map_err(ApiError::from)?;

    tracing::info!(request_id = %request_id, theme = %request.main_theme, "Job accepted");

    jobs::spawn_job(
        state.store.clone(),
        state.analysis.clone(),
        request_id,
        request,
    );

    Ok(HttpResponse::Accepted().json(AcceptedResponse {
        request_id,
        status: WorkflowStatus::Queued,
    }))
}

/// Poll an asynchronous job
#[utoipa::path(
    get,
    path = "/risk-analysis/{request_id}",
    params(
        ("request_id" = Uuid, Path, description = "Job identifier returned at submission")
    ),
    responses(
        (status = 200, description = "Job status, logs and report once completed", body = StatusReport),
        (status = 404, description = "Unknown job id", body = crate::api::error::ErrorResponse)
    ),
    tag = "risk-analysis"
)]
#[get("/risk-analysis/{request_id}")]
pub async fn get_risk_analysis(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, ApiError> {
    let request_id = path.into_inner();

    match state
        .store
        .get_report(request_id)
        .await
        .map_err(ApiError::from)?
    {
        Some(report) => Ok(HttpResponse::Ok().json(report)),
        None => Err(ApiError::JobNotFound(request_id)),
    }
}

/// Configure risk analysis routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(analyze_risk)
        .service(submit_risk_analysis)
        .service(get_risk_analysis);
}
