//! Background matching jobs: created pending, processed on a tokio task, polled by status.

use std::sync::Arc;

use async_trait::async_trait;
use matchmaker_database::{MatchingJob, MatchingRepository};
use serde::Serialize;
use sqlx::SqlitePool;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::engine::{MatchSearch, MatchingEngine, ProgressReporter, SearchMeta};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::prompt::MatchResult;

pub const DEFAULT_METHOD: &str = "algorithmic";

/// Payload stored on a completed job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JobResult<'a> {
    matches: &'a [MatchResult],
    meta: &'a SearchMeta,
    from_cache: bool,
}

struct JobProgress {
    jobs: MatchingRepository,
    job_id: String,
}

#[async_trait]
impl ProgressReporter for JobProgress {
    async fn report(&self, progress: i64, message: &str) {
        if let Err(err) = self.jobs.update_progress(&self.job_id, progress, message).await {
            warn!(job_id = %self.job_id, error = %err, "failed to record job progress");
        }
    }
}

#[derive(Clone)]
pub struct JobRunner {
    jobs: MatchingRepository,
    engine: Arc<MatchingEngine>,
}

impl JobRunner {
    pub fn new(pool: SqlitePool, engine: Arc<MatchingEngine>) -> Self {
        Self {
            jobs: MatchingRepository::new(pool),
            engine,
        }
    }

    pub async fn create_job(
        &self,
        target_user_id: i64,
        matchmaker_id: i64,
        method: Option<&str>,
    ) -> OrchestratorResult<MatchingJob> {
        let job = self
            .jobs
            .create_job(target_user_id, matchmaker_id, method.unwrap_or(DEFAULT_METHOD))
            .await?;
        info!(job_id = %job.public_id, target_user_id, matchmaker_id, "matching job created");
        Ok(job)
    }

    /// Create a job and start processing it in the background.
    pub async fn submit(
        &self,
        target_user_id: i64,
        matchmaker_id: i64,
        method: Option<&str>,
    ) -> OrchestratorResult<MatchingJob> {
        let job = self.create_job(target_user_id, matchmaker_id, method).await?;
        self.spawn(job.public_id.clone());
        Ok(job)
    }

    pub fn spawn(&self, job_id: String) -> JoinHandle<()> {
        let runner = self.clone();
        tokio::spawn(async move {
            if let Err(err) = runner.process(&job_id).await {
                error!(job_id = %job_id, error = %err, "matching job processing failed");
            }
        })
    }

    /// Run a pending job to completion. Unknown and already claimed jobs are skipped.
    pub async fn process(&self, job_id: &str) -> OrchestratorResult<()> {
        let Some(job) = self.jobs.find_job(job_id).await? else {
            warn!(job_id, "matching job not found");
            return Ok(());
        };
        if !self.jobs.start_job(job_id).await? {
            info!(job_id, status = %job.status, "matching job is not pending, skipping");
            return Ok(());
        }

        let progress = JobProgress {
            jobs: self.jobs.clone(),
            job_id: job_id.to_string(),
        };
        progress.report(5, "Starting").await;

        match self
            .engine
            .find_matches(job.target_user_id, job.matchmaker_id, true, &progress)
            .await
        {
            Ok(search) => {
                let matches = search.matches.len();
                if let Err(err) = self.complete(job_id, &search).await {
                    warn!(job_id, error = %err, "storing matching job result failed");
                    if let Err(fail_err) = self.jobs.fail_job(job_id, &err.to_string()).await {
                        warn!(job_id, error = %fail_err, "marking matching job failed also failed");
                    }
                    return Err(err);
                }
                info!(job_id, matches, "matching job completed");
            }
            Err(err) => {
                warn!(job_id, error = %err, "matching job failed");
                self.jobs.fail_job(job_id, &err.to_string()).await?;
            }
        }
        Ok(())
    }

    async fn complete(&self, job_id: &str, search: &MatchSearch) -> OrchestratorResult<()> {
        let payload = serde_json::to_string(&JobResult {
            matches: &search.matches,
            meta: &search.meta,
            from_cache: search.from_cache,
        })?;
        self.jobs
            .complete_job(
                job_id,
                &payload,
                search.matches.len() as i64,
                search.meta.total_candidates_scanned,
            )
            .await?;
        Ok(())
    }

    pub async fn status(&self, job_id: &str) -> OrchestratorResult<MatchingJob> {
        self.jobs
            .find_job(job_id)
            .await?
            .ok_or_else(|| OrchestratorError::JobNotFound(job_id.to_string()))
    }
}
