//! Row types for the job status and report tables

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use uuid::Uuid;

use crate::model::{RiskAnalysisRequest, RiskAnalysisResponse};

/// One row of `workflow_status` (the id is always the lookup key)
#[derive(Debug, sqlx::FromRow)]
pub struct WorkflowStatusRow {
    pub status: String,
    pub last_updated: DateTime<Utc>,
    pub logs: Json<Vec<String>>,
}

/// One row of `risk_reports`: the full original request fields alongside the
/// response, for replay and audit
#[derive(Debug, sqlx::FromRow)]
pub struct RiskReportRow {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub companies: Json<serde_json::Value>,
    pub llm_model: String,
    pub theme: String,
    pub focus: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub document_type: String,
    pub fiscal_year: Option<i32>,
    pub rerank_threshold: Option<f64>,
    pub frequency: String,
    pub document_limit: i32,
    pub batch_size: i32,
    pub report: Json<RiskAnalysisResponse>,
}

impl RiskReportRow {
    /// Flatten a request/response pair into the audit record shape
    pub fn from_parts(
        id: Uuid,
        request: &RiskAnalysisRequest,
        response: &RiskAnalysisResponse,
    ) -> Self {
        let companies = match (&request.company_universe, &request.watchlist_id) {
            (Some(universe), _) => serde_json::json!(universe),
            (None, Some(watchlist_id)) => serde_json::json!(watchlist_id),
            (None, None) => serde_json::Value::Null,
        };

        Self {
            id,
            created_at: Utc::now(),
            companies: Json(companies),
            llm_model: request.llm_model.clone(),
            theme: request.main_theme.clone(),
            focus: Some(request.focus.clone()),
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
            document_type: request.document_type.as_str().to_string(),
            fiscal_year: request.fiscal_year,
            rerank_threshold: request.rerank_threshold,
            frequency: request.frequency.as_str().to_string(),
            document_limit: request.document_limit as i32,
            batch_size: request.batch_size as i32,
            report: Json(response.clone()),
        }
    }
}
