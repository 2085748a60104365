//! Asynchronous job execution
//!
//! One spawned task owns a job end-to-end. Progress strings pushed by the
//! workflow travel over a channel and are drained into the job's log by a
//! companion task, so pipeline execution never waits on store writes.

use std::sync::Arc;

use uuid::Uuid;

use crate::db::{JobStore, SharedJobStore};
use crate::model::{RiskAnalysisRequest, WorkflowStatus};
use crate::service::analysis::AnalysisService;
use crate::service::workflow::Progress;

/// Spawn the background worker for an accepted job
pub fn spawn_job(
    store: SharedJobStore,
    service: Arc<AnalysisService>,
    request_id: Uuid,
    request: RiskAnalysisRequest,
) {
    tokio::spawn(run_job(store, service, request_id, request));
}

pub(crate) async fn run_job(
    store: SharedJobStore,
    service: Arc<AnalysisService>,
    request_id: Uuid,
    request: RiskAnalysisRequest,
) {
    let (progress, mut receiver) = Progress::channel();

    let log_store = store.clone();
    let consumer = tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            if let Err(e) = log_store.append_log(request_id, &message).await {
                tracing::warn!(request_id = %request_id, error = %e, "Failed to append job log");
            }
        }
    });

    if let Err(e) = store
        .create_or_update_status(request_id, WorkflowStatus::InProgress)
        .await
    {
        tracing::error!(request_id = %request_id, error = %e, "Failed to mark job in progress");
    }

    let result = service.run(&request, &progress).await;

    // Close the channel and let the consumer flush remaining progress lines
    // before the terminal transition is recorded.
    drop(progress);
    if let Err(e) = consumer.await {
        tracing::warn!(request_id = %request_id, error = %e, "Job log consumer panicked");
    }

    match result {
        Ok(response) => match store.complete(request_id, &request, &response).await {
            Ok(()) => {
                tracing::info!(request_id = %request_id, "Job completed");
            }
            Err(e) => {
                tracing::error!(request_id = %request_id, error = %e, "Failed to persist report");
                // Pollers must still reach a terminal state; leaving the job
                // in progress would make them wait forever.
                let message = format!("Failed to persist report: {}", e);
                if let Err(log_err) = store.append_log(request_id, &message).await {
                    tracing::warn!(request_id = %request_id, error = %log_err, "Failed to append failure log");
                }
                if let Err(status_err) = store
                    .create_or_update_status(request_id, WorkflowStatus::Failed)
                    .await
                {
                    tracing::error!(request_id = %request_id, error = %status_err, "Failed to mark job failed");
                }
            }
        },
        Err(e) => {
            let message = format!("Risk analysis failed: {}", e);
            if let Err(log_err) = store.append_log(request_id, &message).await {
                tracing::warn!(request_id = %request_id, error = %log_err, "Failed to append failure log");
            }
            if let Err(status_err) = store
                .create_or_update_status(request_id, WorkflowStatus::Failed)
                .await
            {
                tracing::error!(request_id = %request_id, error = %status_err, "Failed to mark job failed");
            }
            // Store transitions first, so pollers observe FAILED promptly
            tracing::error!(request_id = %request_id, error = %e, "Risk analysis job failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::db::memory::MemoryJobStore;
    use crate::db::JobStore;
    use crate::model::table::{CellValue, DataTable, Row};
    use crate::model::{DocumentType, Frequency, RiskTaxonomy};
    use crate::service::knowledge_graph::{
        Entity, KnowledgeGraph, KnowledgeGraphError, Watchlist,
    };
    use crate::service::traces::TraceClient;
    use crate::service::workflow::{
        AnalyzerParams, TaxonomyStage, WorkflowEngine, WorkflowError,
    };

    struct StubGraph;

    #[async_trait]
    impl KnowledgeGraph for StubGraph {
        async fn get_entities(
            &self,
            ids: &[String],
        ) -> Result<Vec<Option<Entity>>, KnowledgeGraphError> {
            Ok(ids
                .iter()
                .map(|id| {
                    Some(Entity {
                        id: id.clone(),
                        name: format!("Company {}", id),
                        entity_type: Entity::TYPE_COMPANY.to_string(),
                        ticker: None,
                        sector: None,
                        industry: None,
                        country: None,
                    })
                })
                .collect())
        }

        async fn get_watchlist(&self, _id: &str) -> Result<Watchlist, KnowledgeGraphError> {
            unreachable!("tests use explicit universes")
        }
    }

    struct StubEngine {
        fail_scoring: bool,
    }

    #[async_trait]
    impl WorkflowEngine for StubEngine {
        async fn create_taxonomy(
            &self,
            _params: &AnalyzerParams,
            progress: &Progress,
        ) -> Result<TaxonomyStage, WorkflowError> {
            progress.push("Generating risk taxonomy");
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
            _sentences: &[String],
            _frequency: Frequency,
            _document_limit: u32,
            _batch_size: u32,
            _progress: &Progress,
        ) -> Result<DataTable, WorkflowError> {
            Ok(DataTable::default())
        }

        async fn label_search_results(
            &self,
            _params: &AnalyzerParams,
            _sentences: DataTable,
            _terminal_labels: &[String],
            _tree: &RiskTaxonomy,
            _additional_prompt_fields: &[&str],
            _progress: &Progress,
        ) -> Result<(DataTable, DataTable), WorkflowError> {
            Ok((DataTable::default(), DataTable::default()))
        }

        async fn generate_results(
            &self,
            _params: &AnalyzerParams,
            _labeled: &DataTable,
            _progress: &Progress,
        ) -> Result<(DataTable, DataTable, DataTable), WorkflowError> {
            if self.fail_scoring {
                return Err(WorkflowError::StageFailed {
                    stage: "scoring",
                    message: "scoring backend unavailable".to_string(),
                });
            }
            let company = DataTable::new(vec![Row::from_iter([
                ("Company", CellValue::from("Company C1")),
                ("Ticker", CellValue::from("T1")),
                ("Sector", CellValue::from("S1")),
                ("Industry", CellValue::from("I1")),
                ("Composite Score", CellValue::from(10i64)),
            ])]);
            let motivation = DataTable::new(vec![Row::from_iter([
                ("Company", CellValue::from("Company C1")),
                ("Motivation", CellValue::from("Growth")),
            ])]);
            Ok((company, DataTable::default(), motivation))
        }
    }

    fn request() -> RiskAnalysisRequest {
        RiskAnalysisRequest {
            main_theme: "Tariffs".to_string(),
            focus: "Supply chains".to_string(),
            company_universe: Some(vec!["C1".to_string()]),
            watchlist_id: None,
            control_entities: None,
            start_date: "2025-01-01".to_string(),
            end_date: "2025-06-30".to_string(),
            keywords: None,
            llm_model: "openai::gpt-4o-mini".to_string(),
            document_type: DocumentType::News,
            fiscal_year: None,
            rerank_threshold: None,
            frequency: Frequency::Monthly,
            document_limit: 100,
            batch_size: 10,
        }
    }

    fn service(fail_scoring: bool) -> Arc<AnalysisService> {
        Arc::new(AnalysisService::new(
            Arc::new(StubGraph),
            Arc::new(StubEngine { fail_scoring }),
            TraceClient::disabled(),
        ))
    }

    #[tokio::test]
    async fn test_successful_job_completes_with_logged_progress() {
        let store: SharedJobStore = Arc::new(MemoryJobStore::new());
        let id = Uuid::new_v4();
        store
            .create_or_update_status(id, WorkflowStatus::Queued)
            .await
            .unwrap();

        run_job(store.clone(), service(false), id, request()).await;

        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, WorkflowStatus::Completed);
        assert!(report.report.is_some());
        assert!(report
            .logs
            .iter()
            .any(|line| line == "Generating risk taxonomy"));
        assert!(report.logs.iter().any(|line| line == "Report assembled"));
    }

    /// Store whose completion write always fails, as when the database
    /// drops the connection mid-job.
    struct BrokenCompleteStore {
        inner: MemoryJobStore,
    }

    #[async_trait]
    impl JobStore for BrokenCompleteStore {
        async fn create_or_update_status(
            &self,
            id: Uuid,
            status: WorkflowStatus,
        ) -> Result<(), crate::db::StoreError> {
            self.inner.create_or_update_status(id, status).await
        }

        async fn append_log(&self, id: Uuid, message: &str) -> Result<(), crate::db::StoreError> {
            self.inner.append_log(id, message).await
        }

        async fn complete(
            &self,
            _id: Uuid,
            _request: &RiskAnalysisRequest,
            _response: &crate::model::RiskAnalysisResponse,
        ) -> Result<(), crate::db::StoreError> {
            Err(crate::db::StoreError::Serialization(
                "connection reset".to_string(),
            ))
        }

        async fn get_status(
            &self,
            id: Uuid,
        ) -> Result<Option<WorkflowStatus>, crate::db::StoreError> {
            self.inner.get_status(id).await
        }

        async fn get_logs(&self, id: Uuid) -> Result<Option<Vec<String>>, crate::db::StoreError> {
            self.inner.get_logs(id).await
        }

        async fn get_report(
            &self,
            id: Uuid,
        ) -> Result<Option<crate::model::StatusReport>, crate::db::StoreError> {
            self.inner.get_report(id).await
        }
    }

    #[tokio::test]
    async fn test_failed_report_persistence_marks_job_failed() {
        let store: SharedJobStore = Arc::new(BrokenCompleteStore {
            inner: MemoryJobStore::new(),
        });
        let id = Uuid::new_v4();
        store
            .create_or_update_status(id, WorkflowStatus::Queued)
            .await
            .unwrap();

        run_job(store.clone(), service(false), id, request()).await;

        // The job must not stay in progress when the report write fails.
        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, WorkflowStatus::Failed);
        assert!(report.report.is_none());
        assert!(report
            .logs
            .iter()
            .any(|line| line.contains("Failed to persist report")));
    }

    #[tokio::test]
    async fn test_failed_job_records_error_and_status() {
        let store: SharedJobStore = Arc::new(MemoryJobStore::new());
        let id = Uuid::new_v4();
        store
            .create_or_update_status(id, WorkflowStatus::Queued)
            .await
            .unwrap();

        run_job(store.clone(), service(true), id, request()).await;

        let report = store.get_report(id).await.unwrap().unwrap();
        assert_eq!(report.status, WorkflowStatus::Failed);
        assert!(report.report.is_none());
        assert!(report
            .logs
            .iter()
            .any(|line| line.contains("scoring backend unavailable")));
    }
}
