//! Postgres-backed job store
//!
//! A single store-wide async mutex serializes every read and write, so each
//! operation is atomic with respect to concurrent workers and pollers. The
//! lock is only held across the store operation itself, never across
//! pipeline calls.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::models::{RiskReportRow, WorkflowStatusRow};
use super::{JobStore, StoreError};
use crate::model::{RiskAnalysisRequest, RiskAnalysisResponse, StatusReport, WorkflowStatus};

pub struct SqlJobStore {
    pool: PgPool,
    lock: Mutex<()>,
}

impl SqlJobStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            lock: Mutex::new(()),
        }
    }

    async fn fetch_status_row(&self, id: Uuid) -> Result<Option<WorkflowStatusRow>, StoreError> {
        let row: Option<WorkflowStatusRow> =
            sqlx::query_as("SELECT status, last_updated, logs FROM workflow_status WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(row)
    }
}

fn parse_status(id: Uuid, value: &str) -> Result<WorkflowStatus, StoreError> {
    WorkflowStatus::parse(value).ok_or_else(|| {
        StoreError::Serialization(format!("unknown status '{}' for job {}", value, id))
    })
}

#[async_trait]
impl JobStore for SqlJobStore {
    async fn create_or_update_status(
        &self,
        id: Uuid,
        status: WorkflowStatus,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        if let Some(row) = self.fetch_status_row(id).await? {
            let current = parse_status(id, &row.status)?;
            if current.is_terminal() {
                tracing::debug!(
                    request_id = %id,
                    current = %current,
                    requested = %status,
                    "Ignoring status update on terminal job"
                );
                return Ok(());
            }
        }

        sqlx::query(
            r#"
            INSERT INTO workflow_status (id, status, last_updated, logs)
            VALUES ($1, $2, NOW(), '[]')
            ON CONFLICT (id) DO UPDATE SET
                status = EXCLUDED.status,
                last_updated = NOW()
            "#,
        )
        .bind(id)
        .bind(status.as_str())
        .execute(&self.pool)
        .await?;

        tracing::debug!(request_id = %id, status = %status, "Job status updated");
        Ok(())
    }

    async fn append_log(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        let result = sqlx::query(
            r#"
            UPDATE workflow_status
            SET logs = logs || to_jsonb($2::text), last_updated = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(message)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        request: &RiskAnalysisRequest,
        response: &RiskAnalysisResponse,
    ) -> Result<(), StoreError> {
        let _guard = self.lock.lock().await;

        // Report and status land in one transaction; a job must never be
        // durably completed without its report.
        let mut tx = self.pool.begin().await?;

        let report = RiskReportRow::from_parts(id, request, response);
        sqlx::query(
            r#"
            INSERT INTO risk_reports (
                id, created_at, companies, llm_model, theme, focus,
                start_date, end_date, document_type, fiscal_year,
                rerank_threshold, frequency, document_limit, batch_size, report
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET report = EXCLUDED.report
            "#,
        )
        .bind(report.id)
        .bind(report.created_at)
        .bind(&report.companies)
        .bind(&report.llm_model)
        .bind(&report.theme)
        .bind(&report.focus)
        .bind(&report.start_date)
        .bind(&report.end_date)
        .bind(&report.document_type)
        .bind(report.fiscal_year)
        .bind(report.rerank_threshold)
        .bind(&report.frequency)
        .bind(report.document_limit)
        .bind(report.batch_size)
        .bind(&report.report)
        .execute(&mut *tx)
        .await?;

        let result = sqlx::query(
            "UPDATE workflow_status SET status = $2, last_updated = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(WorkflowStatus::Completed.as_str())
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(id));
        }

        tx.commit().await?;

        tracing::info!(request_id = %id, "Job completed and report persisted");
        Ok(())
    }

    async fn get_status(&self, id: Uuid) -> Result<Option<WorkflowStatus>, StoreError> {
        let _guard = self.lock.lock().await;

        match self.fetch_status_row(id).await? {
            None => Ok(None),
            Some(row) => Ok(Some(parse_status(id, &row.status)?)),
        }
    }

    async fn get_logs(&self, id: Uuid) -> Result<Option<Vec<String>>, StoreError> {
        let _guard = self.lock.lock().await;

        Ok(self.fetch_status_row(id).await?.map(|row| row.logs.0))
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<StatusReport>, StoreError> {
        let _guard = self.lock.lock().await;

        let Some(row) = self.fetch_status_row(id).await? else {
            return Ok(None);
        };
        let status = parse_status(id, &row.status)?;

        let report: Option<Json<RiskAnalysisResponse>> =
            sqlx::query_scalar("SELECT report FROM risk_reports WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(Some(StatusReport {
            request_id: id,
            last_updated: row.last_updated,
            status,
            logs: row.logs.0,
            report: report.map(|json| json.0),
        }))
    }
}
