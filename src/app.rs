//! Application state and service initialization
//!
//! Centralizes service construction and dependency injection: the external
//! clients are built once at startup and handed to the orchestration service,
//! never reached for through globals.

use std::sync::Arc;

use crate::db::memory::MemoryJobStore;
use crate::db::repository::SqlJobStore;
use crate::db::SharedJobStore;
use crate::service::{
    AnalysisService, BigdataKnowledgeGraph, TraceClient, WorkflowClient,
};

/// Application state injected into every handler
pub struct AppState {
    /// Job status and report persistence
    pub store: SharedJobStore,
    /// End-to-end analysis orchestration
    pub analysis: Arc<AnalysisService>,
    /// Usage telemetry
    pub traces: TraceClient,
}

impl AppState {
    /// Initialize all services and build application state
    ///
    /// Connects to Postgres for job persistence; if the database is
    /// unreachable the service still starts with an in-memory store and job
    /// state does not survive restarts.
    pub async fn initialize(api_key: String) -> Self {
        let store: SharedJobStore = match crate::db::create_pool().await {
            Ok(pool) => match crate::db::init_schema(&pool).await {
                Ok(()) => Arc::new(SqlJobStore::new(pool)),
                Err(e) => {
                    tracing::warn!(error = %e, "Schema initialization failed, using in-memory job store");
                    Arc::new(MemoryJobStore::new())
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "PostgreSQL unavailable, using in-memory job store");
                Arc::new(MemoryJobStore::new())
            }
        };

        let knowledge_graph = Arc::new(BigdataKnowledgeGraph::new(api_key.clone()));
        let engine = Arc::new(WorkflowClient::new(api_key.clone()));
        let traces = TraceClient::new(api_key);

        let analysis = Arc::new(AnalysisService::new(
            knowledge_graph,
            engine,
            traces.clone(),
        ));

        Self {
            store,
            analysis,
            traces,
        }
    }
}
