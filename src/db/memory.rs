//! In-memory job store
//!
//! Fallback when Postgres is unavailable, and the store used by tests. Same
//! trait semantics as the SQL store: one store-wide lock, separate status and
//! report records.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{JobStore, StoreError};
use crate::model::{RiskAnalysisRequest, RiskAnalysisResponse, StatusReport, WorkflowStatus};

#[derive(Debug, Clone)]
struct JobRecord {
    status: WorkflowStatus,
    last_updated: DateTime<Utc>,
    logs: Vec<String>,
}

#[derive(Debug, Clone)]
struct StoredReport {
    #[allow(dead_code)] // Audit field, mirrors the risk_reports row
    request: RiskAnalysisRequest,
    response: RiskAnalysisResponse,
}

#[derive(Default)]
struct Inner {
    jobs: HashMap<Uuid, JobRecord>,
    reports: HashMap<Uuid, StoredReport>,
}

#[derive(Default)]
pub struct MemoryJobStore {
    inner: Mutex<Inner>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn create_or_update_status(
        &self,
        id: Uuid,
        status: WorkflowStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;

        match inner.jobs.get_mut(&id) {
            Some(job) if job.status.is_terminal() => {
                tracing::debug!(
                    request_id = %id,
                    current = %job.status,
                    requested = %status,
                    "Ignoring status update on terminal job"
                );
            }
            Some(job) => {
                job.status = status;
                job.last_updated = Utc::now();
            }
            None => {
                inner.jobs.insert(
                    id,
                    JobRecord {
                        status,
                        last_updated: Utc::now(),
                        logs: Vec::new(),
                    },
                );
            }
        }
        Ok(())
    }

    async fn append_log(&self, id: Uuid, message: &str) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.logs.push(message.to_string());
        job.last_updated = Utc::now();
        Ok(())
    }

    async fn complete(
        &self,
        id: Uuid,
        request: &RiskAnalysisRequest,
        response: &RiskAnalysisResponse,
    ) -> Result<(), StoreError> {
        let mut inner = self.inner.lock().await;
        let job = inner.jobs.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        job.status = WorkflowStatus::Completed;
        job.last_updated = Utc::now();
        inner.reports.insert(
            id,
            StoredReport {
                request: request.clone(),
                response: response.clone(),
            },
        );
        Ok(())
    }

    async fn get_status(&self, id: Uuid) -> Result<Option<WorkflowStatus>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).map(|job| job.status))
    }

    async fn get_logs(&self, id: Uuid) -> Result<Option<Vec<String>>, StoreError> {
        let inner = self.inner.lock().await;
        Ok(inner.jobs.get(&id).map(|job| job.logs.clone()))
    }

    async fn get_report(&self, id: Uuid) -> Result<Option<StatusReport>, StoreError> {
        let inner = self.inner.lock().await;
        let Some(job) = inner.jobs.get(&id) else {
            return Ok(None);
        };
        Ok(Some(StatusReport {
            request_id: id,
            last_updated: job.last_updated,
            status: job.status,
            logs: job.logs.clone(),
            report: inner.reports.get(&id).map(|r| r.response.clone()),
        }))
    }
}
