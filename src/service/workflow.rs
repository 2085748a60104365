//! Workflow engine contract and invoker
//!
//! The four-stage risk analysis pipeline (taxonomy, retrieval, labeling,
//! scoring) runs in an external workflow service. This module owns the
//! contract for those calls and the invoker that threads the stage outputs
//! through in order; it never interprets the tables.

use std::collections::HashMap;
use std::env;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::model::{DataTable, DocumentType, Frequency, RiskAnalysisRequest, RiskTaxonomy};
use crate::service::knowledge_graph::Entity;

const WORKFLOW_API_BASE_URL: &str = "https://workflows.bigdata.com/v1/risk-analyzer";
const WORKFLOW_BASE_URL_ENV: &str = "BIGDATA_WORKFLOW_URL";

const API_KEY_HEADER: &str = "X-API-Key";

/// Row fields the labeling stage includes in its prompts, beyond the sentence
/// text itself
pub const ADDITIONAL_PROMPT_FIELDS: [&str; 3] = ["entity_sector", "entity_industry", "headline"];

#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    #[error("HTTP request to workflow service failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Workflow stage '{stage}' failed: {message}")]
    StageFailed {
        stage: &'static str,
        message: String,
    },
}

/// Progress sink handed to the engine for human-readable status lines
///
/// This is the message-passing form of the observer callback: the engine may
/// push zero or many messages at any point during a stage; a detached handle
/// or a dropped receiver turns every push into a no-op.
#[derive(Debug, Clone, Default)]
pub struct Progress {
    sender: Option<mpsc::UnboundedSender<String>>,
}

impl Progress {
    /// A connected handle plus the receiving end to drain
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A handle that discards every message
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn push(&self, message: impl Into<String>) {
        if let Some(sender) = &self.sender {
            let _ = sender.send(message.into());
        }
    }
}

/// Per-request parameters shared by every stage call
#[derive(Debug, Clone, Serialize)]
pub struct AnalyzerParams {
    pub llm_model: String,
    pub main_theme: String,
    pub focus: String,
    pub companies: Vec<Entity>,
    pub start_date: String,
    pub end_date: String,
    pub keywords: Vec<String>,
    pub document_type: DocumentType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub control_entities: Option<HashMap<String, Vec<String>>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fiscal_year: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_threshold: Option<f64>,
}

impl AnalyzerParams {
    pub fn from_request(request: &RiskAnalysisRequest, companies: Vec<Entity>) -> Self {
        Self {
            llm_model: request.llm_model.clone(),
            main_theme: request.main_theme.clone(),
            focus: request.focus.clone(),
            companies,
            start_date: request.start_date.clone(),
            end_date: request.end_date.clone(),
            keywords: request.keywords.clone().unwrap_or_default(),
            document_type: request.document_type,
            control_entities: request.control_entities.clone(),
            fiscal_year: request.fiscal_year,
            rerank_threshold: request.rerank_threshold,
        }
    }
}

/// Output of the taxonomy stage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaxonomyStage {
    pub tree: RiskTaxonomy,
    /// One summary sentence per taxonomy node, used as retrieval queries
    pub summaries: Vec<String>,
    /// Leaf-level category labels used to classify evidence chunks
    pub terminal_labels: Vec<String>,
}

/// The four workflow stage calls, in data-dependency order
#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn create_taxonomy(
        &self,
        params: &AnalyzerParams,
        progress: &Progress,
    ) -> Result<TaxonomyStage, WorkflowError>;

    async fn retrieve_results(
        &self,
        params: &AnalyzerParams,
        sentences: &[String],
        frequency: Frequency,
        document_limit: u32,
        batch_size: u32,
        progress: &Progress,
    ) -> Result<DataTable, WorkflowError>;

    /// Returns `(discarded, labeled)` tables; only the labeled table feeds
    /// the scoring stage
    async fn label_search_results(
        &self,
        params: &AnalyzerParams,
        sentences: DataTable,
        terminal_labels: &[String],
        tree: &RiskTaxonomy,
        additional_prompt_fields: &[&str],
        progress: &Progress,
    ) -> Result<(DataTable, DataTable), WorkflowError>;

    /// Returns `(company, industry, motivation)` score tables
    async fn generate_results(
        &self,
        params: &AnalyzerParams,
        labeled: &DataTable,
        progress: &Progress,
    ) -> Result<(DataTable, DataTable, DataTable), WorkflowError>;
}

/// Everything the response builder needs, plus the wall-clock bracket around
/// the whole pipeline for telemetry
#[derive(Debug, Clone)]
pub struct WorkflowOutput {
    pub taxonomy: TaxonomyStage,
    pub company_table: DataTable,
    pub motivation_table: DataTable,
    pub labeled_table: DataTable,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Drives the four stages sequentially, threading outputs in order
pub struct WorkflowInvoker<'a> {
    engine: &'a dyn WorkflowEngine,
}

impl<'a> WorkflowInvoker<'a> {
    pub fn new(engine: &'a dyn WorkflowEngine) -> Self {
        Self { engine }
    }

    pub async fn run(
        &self,
        params: &AnalyzerParams,
        frequency: Frequency,
        document_limit: u32,
        batch_size: u32,
        progress: &Progress,
    ) -> Result<WorkflowOutput, WorkflowError> {
        let started_at = Utc::now();

        let taxonomy = self.engine.create_taxonomy(params, progress).await?;
        tracing::debug!(
            summaries = taxonomy.summaries.len(),
            terminal_labels = taxonomy.terminal_labels.len(),
            "Taxonomy stage completed"
        );

        let sentences = self
            .engine
            .retrieve_results(
                params,
                &taxonomy.summaries,
                frequency,
                document_limit,
                batch_size,
                progress,
            )
            .await?;
        tracing::debug!(rows = sentences.len(), "Retrieval stage completed");

        let (_discarded, labeled) = self
            .engine
            .label_search_results(
                params,
                sentences,
                &taxonomy.terminal_labels,
                &taxonomy.tree,
                &ADDITIONAL_PROMPT_FIELDS,
                progress,
            )
            .await?;
        tracing::debug!(rows = labeled.len(), "Labeling stage completed");

        let (company_table, _industry_table, motivation_table) = self
            .engine
            .generate_results(params, &labeled, progress)
            .await?;
        tracing::debug!(
            companies = company_table.len(),
            "Scoring stage completed"
        );

        let finished_at = Utc::now();

        Ok(WorkflowOutput {
            taxonomy,
            company_table,
            motivation_table,
            labeled_table: labeled,
            started_at,
            finished_at,
        })
    }
}

// ============================================================================
// HTTP-backed engine
// ============================================================================

#[derive(Serialize)]
struct TaxonomyRequest<'a> {
    params: &'a AnalyzerParams,
}

#[derive(Serialize)]
struct RetrievalRequest<'a> {
    params: &'a AnalyzerParams,
    sentences: &'a [String],
    frequency: Frequency,
    document_limit: u32,
    batch_size: u32,
}

#[derive(Serialize)]
struct LabelingRequest<'a> {
    params: &'a AnalyzerParams,
    sentences: DataTable,
    terminal_labels: &'a [String],
    tree: &'a RiskTaxonomy,
    additional_prompt_fields: &'a [&'a str],
}

#[derive(Deserialize)]
struct LabelingResponse {
    discarded: DataTable,
    labeled: DataTable,
}

#[derive(Serialize)]
struct ScoringRequest<'a> {
    params: &'a AnalyzerParams,
    labeled: &'a DataTable,
}

#[derive(Deserialize)]
struct ScoringResponse {
    company: DataTable,
    industry: DataTable,
    motivation: DataTable,
}

/// Client for the external risk-analyzer workflow service
pub struct WorkflowClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl WorkflowClient {
    pub fn new(api_key: String) -> Self {
        let base_url = env::var(WORKFLOW_BASE_URL_ENV)
            .ok()
            .unwrap_or_else(|| WORKFLOW_API_BASE_URL.to_string());

        Self {
            client: reqwest::Client::new(),
            base_url,
            api_key,
        }
    }

    async fn post_stage<B, T>(&self, stage: &'static str, body: &B) -> Result<T, WorkflowError>
    where
        B: Serialize + Sync,
        T: serde::de::DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, stage);

        tracing::debug!(stage = stage, url = %url, "Invoking workflow stage");

        let response = self
            .client
            .post(&url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(WorkflowError::StageFailed {
                stage,
                message: format!("unexpected status {}: {}", status, message),
            });
        }

        response.json().await.map_err(|e| WorkflowError::StageFailed {
            stage,
            message: format!("failed to deserialize stage output: {}", e),
        })
    }
}

#[async_trait]
impl WorkflowEngine for WorkflowClient {
    async fn create_taxonomy(
        &self,
        params: &AnalyzerParams,
        progress: &Progress,
    ) -> Result<TaxonomyStage, WorkflowError> {
        progress.push("Generating risk taxonomy");
        let stage: TaxonomyStage = self
            .post_stage("taxonomy", &TaxonomyRequest { params })
            .await?;
        progress.push(format!(
            "Risk taxonomy generated with {} terminal labels",
            stage.terminal_labels.len()
        ));
        Ok(stage)
    }

    async fn retrieve_results(
        &self,
        params: &AnalyzerParams,
        sentences: &[String],
        frequency: Frequency,
        document_limit: u32,
        batch_size: u32,
        progress: &Progress,
    ) -> Result<DataTable, WorkflowError> {
        progress.push("Searching for relevant content");
        let table: DataTable = self
            .post_stage(
                "retrieval",
                &RetrievalRequest {
                    params,
                    sentences,
                    frequency,
                    document_limit,
                    batch_size,
                },
            )
            .await?;
        progress.push(format!("Retrieved {} content chunks", table.len()));
        Ok(table)
    }

    async fn label_search_results(
        &self,
        params: &AnalyzerParams,
        sentences: DataTable,
        terminal_labels: &[String],
        tree: &RiskTaxonomy,
        additional_prompt_fields: &[&str],
        progress: &Progress,
    ) -> Result<(DataTable, DataTable), WorkflowError> {
        progress.push("Labeling retrieved content");
        let response: LabelingResponse = self
            .post_stage(
                "labeling",
                &LabelingRequest {
                    params,
                    sentences,
                    terminal_labels,
                    tree,
                    additional_prompt_fields,
                },
            )
            .await?;
        progress.push(format!("Labeled {} content chunks", response.labeled.len()));
        Ok((response.discarded, response.labeled))
    }

    async fn generate_results(
        &self,
        params: &AnalyzerParams,
        labeled: &DataTable,
        progress: &Progress,
    ) -> Result<(DataTable, DataTable, DataTable), WorkflowError> {
        progress.push("Computing company exposure scores");
        let response: ScoringResponse = self
            .post_stage("scoring", &ScoringRequest { params, labeled })
            .await?;
        progress.push(format!(
            "Scored {} companies",
            response.company.len()
        ));
        Ok((response.company, response.industry, response.motivation))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::model::{CellValue, Row};

    /// Engine that records the call order and echoes recognizable tables
    #[derive(Default)]
    struct RecordingEngine {
        calls: Mutex<Vec<&'static str>>,
    }

    fn single_cell_table(column: &str, value: &str) -> DataTable {
        DataTable::new(vec![Row::from_iter([(column, CellValue::from(value))])])
    }

    #[async_trait]
    impl WorkflowEngine for RecordingEngine {
        async fn create_taxonomy(
            &self,
            _params: &AnalyzerParams,
            progress: &Progress,
        ) -> Result<TaxonomyStage, WorkflowError> {
            self.calls.lock().unwrap().push("taxonomy");
            progress.push("taxonomy done");
            Ok(TaxonomyStage {
                tree: RiskTaxonomy {
                    label: "Root".to_string(),
                    node: 1,
                    summary: None,
                    children: vec![],
                    keywords: None,
                },
                summaries: vec!["summary".to_string()],
                terminal_labels: vec!["Leaf".to_string()],
            })
        }

        async fn retrieve_results(
            &self,
            _params: &AnalyzerParams,
            sentences: &[String],
            _frequency: Frequency,
            _document_limit: u32,
            _batch_size: u32,
            _progress: &Progress,
        ) -> Result<DataTable, WorkflowError> {
            self.calls.lock().unwrap().push("retrieval");
            assert_eq!(sentences, ["summary"]);
            Ok(single_cell_table("Sentence", "s1"))
        }

        async fn label_search_results(
            &self,
            _params: &AnalyzerParams,
            sentences: DataTable,
            terminal_labels: &[String],
            _tree: &RiskTaxonomy,
            additional_prompt_fields: &[&str],
            _progress: &Progress,
        ) -> Result<(DataTable, DataTable), WorkflowError> {
            self.calls.lock().unwrap().push("labeling");
            assert_eq!(sentences, single_cell_table("Sentence", "s1"));
            assert_eq!(terminal_labels, ["Leaf"]);
            assert_eq!(additional_prompt_fields, &ADDITIONAL_PROMPT_FIELDS[..]);
            Ok((DataTable::default(), single_cell_table("Quote", "q1")))
        }

        async fn generate_results(
            &self,
            _params: &AnalyzerParams,
            labeled: &DataTable,
            _progress: &Progress,
        ) -> Result<(DataTable, DataTable, DataTable), WorkflowError> {
            self.calls.lock().unwrap().push("scoring");
            assert_eq!(*labeled, single_cell_table("Quote", "q1"));
            Ok((
                single_cell_table("Company", "A"),
                DataTable::default(),
                single_cell_table("Motivation", "m"),
            ))
        }
    }

    fn params() -> AnalyzerParams {
        AnalyzerParams {
            llm_model: "openai::gpt-4o-mini".to_string(),
            main_theme: "Tariffs".to_string(),
            focus: "Supply chains".to_string(),
            companies: vec![],
            start_date: "2025-01-01".to_string(),
            end_date: "2025-06-30".to_string(),
            keywords: vec![],
            document_type: DocumentType::News,
            control_entities: None,
            fiscal_year: None,
            rerank_threshold: None,
        }
    }

    #[tokio::test]
    async fn test_stages_run_in_order_and_thread_outputs() {
        let engine = RecordingEngine::default();
        let (progress, mut receiver) = Progress::channel();

        let output = WorkflowInvoker::new(&engine)
            .run(&params(), Frequency::Monthly, 100, 10, &progress)
            .await
            .unwrap();

        assert_eq!(
            *engine.calls.lock().unwrap(),
            ["taxonomy", "retrieval", "labeling", "scoring"]
        );
        assert_eq!(output.company_table, single_cell_table("Company", "A"));
        assert_eq!(output.motivation_table, single_cell_table("Motivation", "m"));
        assert_eq!(output.labeled_table, single_cell_table("Quote", "q1"));
        assert!(output.started_at <= output.finished_at);

        drop(progress);
        assert_eq!(receiver.recv().await.as_deref(), Some("taxonomy done"));
    }

    #[test]
    fn test_detached_progress_is_noop() {
        let progress = Progress::detached();
        progress.push("dropped on the floor");
    }
}
