//! Saved match searches and matching job persistence.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::entities::matching::{MatchingJob, MatchingJobStatus, SavedMatchSearch};
use crate::repos::enum_column;
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const SEARCH_COLUMNS: &str =
    "id, target_user_id, matchmaker_id, results, algorithm_version, candidates_scanned, created_at, updated_at";

const JOB_COLUMNS: &str = "id, public_id, target_user_id, matchmaker_id, method, status, progress, \
     progress_message, result, matches_found, total_candidates, error, created_at, updated_at, completed_at";

fn map_search(row: &SqliteRow) -> DatabaseResult<SavedMatchSearch> {
    Ok(SavedMatchSearch {
        id: row.try_get("id")?,
        target_user_id: row.try_get("target_user_id")?,
        matchmaker_id: row.try_get("matchmaker_id")?,
        results: row.try_get("results")?,
        algorithm_version: row.try_get("algorithm_version")?,
        candidates_scanned: row.try_get("candidates_scanned")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_job(row: &SqliteRow) -> DatabaseResult<MatchingJob> {
    Ok(MatchingJob {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        target_user_id: row.try_get("target_user_id")?,
        matchmaker_id: row.try_get("matchmaker_id")?,
        method: row.try_get("method")?,
        status: enum_column(row, "status")?,
        progress: row.try_get("progress")?,
        progress_message: row.try_get("progress_message")?,
        result: row.try_get("result")?,
        matches_found: row.try_get("matches_found")?,
        total_candidates: row.try_get("total_candidates")?,
        error: row.try_get("error")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

#[derive(Clone)]
pub struct MatchingRepository {
    pool: SqlitePool,
}

impl MatchingRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // Saved searches

    /// Replace the saved search for `target_user_id`.
    pub async fn upsert_search(
        &self,
        target_user_id: i64,
        matchmaker_id: i64,
        results: &str,
        algorithm_version: &str,
        candidates_scanned: i64,
    ) -> DatabaseResult<SavedMatchSearch> {
        let now = timestamp::now();
        sqlx::query(
            "INSERT INTO saved_match_searches (target_user_id, matchmaker_id, results, algorithm_version, \
             candidates_scanned, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(target_user_id) DO UPDATE SET matchmaker_id = excluded.matchmaker_id, \
             results = excluded.results, algorithm_version = excluded.algorithm_version, \
             candidates_scanned = excluded.candidates_scanned, updated_at = excluded.updated_at",
        )
        .bind(target_user_id)
        .bind(matchmaker_id)
        .bind(results)
        .bind(algorithm_version)
        .bind(candidates_scanned)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_search(target_user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("saved search for user {target_user_id}")))
    }

    pub async fn find_search(&self, target_user_id: i64) -> DatabaseResult<Option<SavedMatchSearch>> {
        let row = sqlx::query(&format!(
            "SELECT {SEARCH_COLUMNS} FROM saved_match_searches WHERE target_user_id = ?"
        ))
        .bind(target_user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_search).transpose()
    }

    pub async fn delete_search(&self, target_user_id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM saved_match_searches WHERE target_user_id = ?")
            .bind(target_user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // Jobs

    pub async fn create_job(&self, target_user_id: i64, matchmaker_id: i64, method: &str) -> DatabaseResult<MatchingJob> {
        let now = timestamp::now();
        let public_id = cuid2::cuid();
        sqlx::query(
            "INSERT INTO matching_jobs (public_id, target_user_id, matchmaker_id, method, status, progress, \
             created_at, updated_at) VALUES (?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(&public_id)
        .bind(target_user_id)
        .bind(matchmaker_id)
        .bind(method)
        .bind(MatchingJobStatus::Pending.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_job(&public_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("matching job {public_id}")))
    }

    pub async fn find_job(&self, public_id: &str) -> DatabaseResult<Option<MatchingJob>> {
        let row = sqlx::query(&format!("SELECT {JOB_COLUMNS} FROM matching_jobs WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_job).transpose()
    }

    /// Claim a pending job for processing. Returns false when it is not pending.
    pub async fn start_job(&self, public_id: &str) -> DatabaseResult<bool> {
        let result = sqlx::query(
            "UPDATE matching_jobs SET status = ?, progress = 0, updated_at = ? WHERE public_id = ? AND status = ?",
        )
        .bind(MatchingJobStatus::Processing.as_str())
        .bind(timestamp::now())
        .bind(public_id)
        .bind(MatchingJobStatus::Pending.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Progress stays below 100 until the job completes.
    pub async fn update_progress(&self, public_id: &str, progress: i64, message: &str) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE matching_jobs SET progress = ?, progress_message = ?, updated_at = ? WHERE public_id = ?",
        )
        .bind(progress.clamp(0, 99))
        .bind(message)
        .bind(timestamp::now())
        .bind(public_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn complete_job(
        &self,
        public_id: &str,
        result: &str,
        matches_found: i64,
        total_candidates: i64,
    ) -> DatabaseResult<()> {
        let now = timestamp::now();
        sqlx::query(
            "UPDATE matching_jobs SET status = ?, progress = 100, progress_message = NULL, result = ?, \
             matches_found = ?, total_candidates = ?, updated_at = ?, completed_at = ? WHERE public_id = ?",
        )
        .bind(MatchingJobStatus::Completed.as_str())
        .bind(result)
        .bind(matches_found)
        .bind(total_candidates)
        .bind(&now)
        .bind(&now)
        .bind(public_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn fail_job(&self, public_id: &str, error: &str) -> DatabaseResult<()> {
        let now = timestamp::now();
        sqlx::query(
            "UPDATE matching_jobs SET status = ?, error = ?, updated_at = ?, completed_at = ? WHERE public_id = ?",
        )
        .bind(MatchingJobStatus::Failed.as_str())
        .bind(error)
        .bind(&now)
        .bind(&now)
        .bind(public_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
