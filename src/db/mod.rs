//! Job status and report persistence

pub mod memory;
pub mod models;
pub mod repository;

use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

use crate::model::{RiskAnalysisRequest, RiskAnalysisResponse, StatusReport, WorkflowStatus};

// Environment variable names
const ENV_POSTGRES_HOST: &str = "RISK_ANALYZER_POSTGRES_HOST";
const ENV_POSTGRES_PORT: &str = "RISK_ANALYZER_POSTGRES_PORT";
const ENV_POSTGRES_USER: &str = "RISK_ANALYZER_POSTGRES_USER";
const ENV_POSTGRES_PASSWORD: &str = "RISK_ANALYZER_POSTGRES_PASSWORD";
const ENV_POSTGRES_DB: &str = "RISK_ANALYZER_POSTGRES_DB";

// Default values
const DEFAULT_POSTGRES_HOST: &str = "127.0.0.1";
const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POSTGRES_USER: &str = "risk_analyzer";
const DEFAULT_POSTGRES_PASSWORD: &str = "risk_analyzer";
const DEFAULT_POSTGRES_DB: &str = "risk_analyzer";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Job not found: {0}")]
    NotFound(Uuid),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Persistence operations for asynchronous job lifecycle
///
/// Every implementation serializes its operations: each call observes a fully
/// written prior state, never a torn one. Job status and the final report are
/// separate records so that an in-progress job with partial logs is
/// observable before any report exists.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Upsert the job status and bump `last_updated`. A job already in a
    /// terminal state is left unchanged.
    async fn create_or_update_status(
        &self,
        id: Uuid,
        status: WorkflowStatus,
    ) -> Result<(), StoreError>;

    /// Append a log line to an existing job; `NotFound` for unknown ids
    async fn append_log(&self, id: Uuid, message: &str) -> Result<(), StoreError>;

    /// Mark the job completed and persist the request/response pair as the
    /// durable report record; `NotFound` for unknown ids
    async fn complete(
        &self,
        id: Uuid,
        request: &RiskAnalysisRequest,
        response: &RiskAnalysisResponse,
    ) -> Result<(), StoreError>;

    async fn get_status(&self, id: Uuid) -> Result<Option<WorkflowStatus>, StoreError>;

    async fn get_logs(&self, id: Uuid) -> Result<Option<Vec<String>>, StoreError>;

    /// Status, logs and (once completed) the report for a job
    async fn get_report(&self, id: Uuid) -> Result<Option<StatusReport>, StoreError>;
}

pub type SharedJobStore = Arc<dyn JobStore>;

/// Create a new database connection pool
pub async fn create_pool() -> Result<PgPool, StoreError> {
    let host = env::var(ENV_POSTGRES_HOST).unwrap_or_else(|_| DEFAULT_POSTGRES_HOST.to_string());
    let port = env::var(ENV_POSTGRES_PORT).unwrap_or_else(|_| DEFAULT_POSTGRES_PORT.to_string());
    let user = env::var(ENV_POSTGRES_USER).unwrap_or_else(|_| DEFAULT_POSTGRES_USER.to_string());
    let password =
        env::var(ENV_POSTGRES_PASSWORD).unwrap_or_else(|_| DEFAULT_POSTGRES_PASSWORD.to_string());
    let database = env::var(ENV_POSTGRES_DB).unwrap_or_else(|_| DEFAULT_POSTGRES_DB.to_string());

    let database_url = format!(
        "postgres://{}:{}@{}:{}/{}",
        user, password, host, port, database
    );

    tracing::debug!(host = %host, port = %port, database = %database, "Connecting to PostgreSQL");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&database_url)
        .await?;

    tracing::info!(host = %host, port = %port, "PostgreSQL connection established");

    Ok(pool)
}

/// Initialize database schema
pub async fn init_schema(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS workflow_status (
            id UUID PRIMARY KEY,
            status VARCHAR(20) NOT NULL,
            last_updated TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            logs JSONB NOT NULL DEFAULT '[]'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS risk_reports (
            id UUID PRIMARY KEY,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            companies JSONB NOT NULL,
            llm_model TEXT NOT NULL,
            theme TEXT NOT NULL,
            focus TEXT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            document_type VARCHAR(20) NOT NULL,
            fiscal_year INTEGER,
            rerank_threshold DOUBLE PRECISION,
            frequency VARCHAR(5) NOT NULL,
            document_limit INTEGER NOT NULL,
            batch_size INTEGER NOT NULL,
            report JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_workflow_status_last_updated ON workflow_status(last_updated)",
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema initialized");

    Ok(())
}
