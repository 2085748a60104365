//! End-to-end analysis orchestration
//!
//! Resolve the company universe, drive the four-stage workflow, emit the
//! completion trace and reshape the tabular outputs into the typed response.
//! One invocation handles one request; stages are strictly sequential.

use std::sync::Arc;

use crate::model::{RiskAnalysisRequest, RiskAnalysisResponse, ValidationError};
use crate::service::knowledge_graph::KnowledgeGraph;
use crate::service::report::{self, ReportError};
use crate::service::resolver::{resolve_companies, ResolutionError};
use crate::service::traces::{TraceClient, TraceEventName};
use crate::service::workflow::{
    AnalyzerParams, Progress, WorkflowEngine, WorkflowError, WorkflowInvoker, WorkflowOutput,
};

const TRACE_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Report(#[from] ReportError),
}

/// Orchestrates one analysis request end-to-end
pub struct AnalysisService {
    knowledge_graph: Arc<dyn KnowledgeGraph>,
    engine: Arc<dyn WorkflowEngine>,
    traces: TraceClient,
}

impl AnalysisService {
    pub fn new(
        knowledge_graph: Arc<dyn KnowledgeGraph>,
        engine: Arc<dyn WorkflowEngine>,
        traces: TraceClient,
    ) -> Self {
        Self {
            knowledge_graph,
            engine,
            traces,
        }
    }

    /// Run the full pipeline for an already-validated request
    pub async fn run(
        &self,
        request: &RiskAnalysisRequest,
        progress: &Progress,
    ) -> Result<RiskAnalysisResponse, AnalysisError> {
        let selector = request.company_selector()?;

        progress.push("Resolving company universe");
        let companies = resolve_companies(&selector, self.knowledge_graph.as_ref()).await?;

        tracing::info!(
            theme = %request.main_theme,
            companies = companies.len(),
            frequency = %request.frequency,
            "Starting risk analysis workflow"
        );

        let company_count = companies.len();
        let params = AnalyzerParams::from_request(request, companies);
        let output = WorkflowInvoker::new(self.engine.as_ref())
            .run(
                &params,
                request.frequency,
                request.document_limit,
                request.batch_size,
                progress,
            )
            .await?;

        self.send_report_generated(&output, company_count);

        let response = report::build_response(
            output.company_table,
            output.motivation_table,
            output.labeled_table,
            output.taxonomy.tree,
        )?;

        progress.push("Report assembled");
        tracing::info!(
            companies = response.risk_scoring.len(),
            chunks = response.content.len(),
            "Risk analysis completed"
        );

        Ok(response)
    }

    fn send_report_generated(&self, output: &WorkflowOutput, company_count: usize) {
        self.traces.send(
            TraceEventName::ReportGenerated,
            serde_json::json!({
                "serviceVersion": env!("CARGO_PKG_VERSION"),
                "workflowStartDate": output
                    .started_at
                    .format(TRACE_TIMESTAMP_FORMAT)
                    .to_string(),
                "workflowEndDate": output
                    .finished_at
                    .format(TRACE_TIMESTAMP_FORMAT)
                    .to_string(),
                "watchlistLength": company_count,
            }),
        );
    }
}
