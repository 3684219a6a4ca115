//! Verification code repository.
//!
//! Every write takes a connection so it can join the caller's transaction.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::entities::verification::{Verification, VerificationStatus, VerificationType};
use crate::repos::enum_column;
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const VERIFICATION_COLUMNS: &str = "id, public_id, user_id, verification_type, target, token, status, attempts, \
     expires_at, completed_at, created_at";

fn map_verification(row: &SqliteRow) -> DatabaseResult<Verification> {
    Ok(Verification {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        user_id: row.try_get("user_id")?,
        verification_type: enum_column(row, "verification_type")?,
        target: row.try_get("target")?,
        token: row.try_get("token")?,
        status: enum_column(row, "status")?,
        attempts: row.try_get("attempts")?,
        expires_at: row.try_get("expires_at")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct VerificationRepository {
    pool: SqlitePool,
}

impl VerificationRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Mark every pending verification for `target` and `kind` as expired.
    pub async fn expire_pending(
        conn: &mut SqliteConnection,
        target: &str,
        kind: VerificationType,
    ) -> DatabaseResult<u64> {
        let result = sqlx::query(
            "UPDATE verifications SET status = ? WHERE target = ? AND verification_type = ? AND status = ?",
        )
        .bind(VerificationStatus::Expired.as_str())
        .bind(target)
        .bind(kind.as_str())
        .bind(VerificationStatus::Pending.as_str())
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn create(
        conn: &mut SqliteConnection,
        user_id: Option<i64>,
        kind: VerificationType,
        target: &str,
        token: &str,
        expires_at: &str,
    ) -> DatabaseResult<Verification> {
        let result = sqlx::query(
            "INSERT INTO verifications (public_id, user_id, verification_type, target, token, status, attempts, \
             expires_at, created_at) VALUES (?, ?, ?, ?, ?, ?, 0, ?, ?)",
        )
        .bind(cuid2::cuid())
        .bind(user_id)
        .bind(kind.as_str())
        .bind(target)
        .bind(token)
        .bind(VerificationStatus::Pending.as_str())
        .bind(expires_at)
        .bind(timestamp::now())
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query(&format!("SELECT {VERIFICATION_COLUMNS} FROM verifications WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("verification {id}")))?;
        map_verification(&row)
    }

    /// Newest pending verification for `target` and `kind`.
    pub async fn find_pending(
        conn: &mut SqliteConnection,
        target: &str,
        kind: VerificationType,
    ) -> DatabaseResult<Option<Verification>> {
        let row = sqlx::query(&format!(
            "SELECT {VERIFICATION_COLUMNS} FROM verifications \
             WHERE target = ? AND verification_type = ? AND status = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(target)
        .bind(kind.as_str())
        .bind(VerificationStatus::Pending.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(map_verification).transpose()
    }

    /// Newest verification, in any status, that carried `token`.
    pub async fn find_by_token(
        conn: &mut SqliteConnection,
        token: &str,
        target: &str,
        kind: VerificationType,
    ) -> DatabaseResult<Option<Verification>> {
        let row = sqlx::query(&format!(
            "SELECT {VERIFICATION_COLUMNS} FROM verifications \
             WHERE token = ? AND target = ? AND verification_type = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(token)
        .bind(target)
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(map_verification).transpose()
    }

    pub async fn record_attempt(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<()> {
        sqlx::query("UPDATE verifications SET attempts = attempts + 1 WHERE id = ?")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn mark_expired(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<()> {
        sqlx::query("UPDATE verifications SET status = ?, attempts = attempts + 1 WHERE id = ?")
            .bind(VerificationStatus::Expired.as_str())
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    pub async fn mark_completed(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE verifications SET status = ?, completed_at = ?, attempts = attempts + 1 WHERE id = ?",
        )
        .bind(VerificationStatus::Completed.as_str())
        .bind(timestamp::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Latest verification of any status for a target, used to throttle resends.
    pub async fn latest_for_target(
        &self,
        target: &str,
        kind: VerificationType,
    ) -> DatabaseResult<Option<Verification>> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query(&format!(
            "SELECT {VERIFICATION_COLUMNS} FROM verifications \
             WHERE target = ? AND verification_type = ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(target)
        .bind(kind.as_str())
        .fetch_optional(&mut *conn)
        .await?;
        row.as_ref().map(map_verification).transpose()
    }
}
