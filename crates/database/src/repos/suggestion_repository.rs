//! Match suggestion repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::entities::suggestion::{
    MatchSuggestion, Meeting, NewSuggestion, StatusHistoryEntry, SuggestionPatch, SuggestionStatus,
};
use crate::repos::{enum_column, optional_enum_column, placeholders};
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const SUGGESTION_COLUMNS: &str = "id, public_id, matchmaker_id, first_party_id, second_party_id, status, \
     previous_status, priority, matching_reason, first_party_notes, second_party_notes, internal_notes, \
     follow_up_notes, decision_deadline, response_deadline, first_party_sent, first_party_responded, \
     second_party_sent, second_party_responded, first_meeting_scheduled, closed_at, last_status_change, \
     last_activity, created_at, updated_at";

/// Lifecycle timestamp columns that a status change may stamp.
const STAMP_COLUMNS: &[&str] = &[
    "first_party_sent",
    "first_party_responded",
    "second_party_sent",
    "second_party_responded",
    "first_meeting_scheduled",
    "closed_at",
];

fn map_suggestion(row: &SqliteRow) -> DatabaseResult<MatchSuggestion> {
    Ok(MatchSuggestion {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        matchmaker_id: row.try_get("matchmaker_id")?,
        first_party_id: row.try_get("first_party_id")?,
        second_party_id: row.try_get("second_party_id")?,
        status: enum_column(row, "status")?,
        previous_status: optional_enum_column(row, "previous_status")?,
        priority: enum_column(row, "priority")?,
        matching_reason: row.try_get("matching_reason")?,
        first_party_notes: row.try_get("first_party_notes")?,
        second_party_notes: row.try_get("second_party_notes")?,
        internal_notes: row.try_get("internal_notes")?,
        follow_up_notes: row.try_get("follow_up_notes")?,
        decision_deadline: row.try_get("decision_deadline")?,
        response_deadline: row.try_get("response_deadline")?,
        first_party_sent: row.try_get("first_party_sent")?,
        first_party_responded: row.try_get("first_party_responded")?,
        second_party_sent: row.try_get("second_party_sent")?,
        second_party_responded: row.try_get("second_party_responded")?,
        first_meeting_scheduled: row.try_get("first_meeting_scheduled")?,
        closed_at: row.try_get("closed_at")?,
        last_status_change: row.try_get("last_status_change")?,
        last_activity: row.try_get("last_activity")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn map_history(row: &SqliteRow) -> DatabaseResult<StatusHistoryEntry> {
    Ok(StatusHistoryEntry {
        id: row.try_get("id")?,
        suggestion_id: row.try_get("suggestion_id")?,
        status: enum_column(row, "status")?,
        previous_status: optional_enum_column(row, "previous_status")?,
        notes: row.try_get("notes")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_meeting(row: &SqliteRow) -> DatabaseResult<Meeting> {
    Ok(Meeting {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        suggestion_id: row.try_get("suggestion_id")?,
        scheduled_date: row.try_get("scheduled_date")?,
        location: row.try_get("location")?,
        status: row.try_get("status")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct SuggestionRepository {
    pool: SqlitePool,
}

impl SuggestionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert inside the caller's transaction. `first_party_sent` is stamped for
    /// suggestions created directly in `PENDING_FIRST_PARTY`.
    pub async fn create(conn: &mut SqliteConnection, new: &NewSuggestion) -> DatabaseResult<MatchSuggestion> {
        let now = timestamp::now();
        let first_party_sent = (new.status == SuggestionStatus::PendingFirstParty).then(|| now.clone());
        let result = sqlx::query(
            "INSERT INTO match_suggestions (public_id, matchmaker_id, first_party_id, second_party_id, status, \
             priority, matching_reason, first_party_notes, second_party_notes, internal_notes, follow_up_notes, \
             decision_deadline, first_party_sent, last_status_change, last_activity, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cuid2::cuid())
        .bind(new.matchmaker_id)
        .bind(new.first_party_id)
        .bind(new.second_party_id)
        .bind(new.status.as_str())
        .bind(new.priority.as_str())
        .bind(&new.matching_reason)
        .bind(&new.first_party_notes)
        .bind(&new.second_party_notes)
        .bind(&new.internal_notes)
        .bind(&new.follow_up_notes)
        .bind(&new.decision_deadline)
        .bind(first_party_sent)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await?;

        let id = result.last_insert_rowid();
        Self::find_by_id_in(conn, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("suggestion {id}")))
    }

    pub async fn find_by_id_in(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<Option<MatchSuggestion>> {
        let row = sqlx::query(&format!("SELECT {SUGGESTION_COLUMNS} FROM match_suggestions WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(map_suggestion).transpose()
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<MatchSuggestion>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_id_in(&mut conn, id).await
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<MatchSuggestion>> {
        let row = sqlx::query(&format!("SELECT {SUGGESTION_COLUMNS} FROM match_suggestions WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_suggestion).transpose()
    }

    /// First suggestion in one of `statuses` involving any of `user_ids`, optionally skipping one suggestion.
    pub async fn find_involving_in_status(
        &self,
        user_ids: &[i64],
        statuses: &[SuggestionStatus],
        exclude_id: Option<i64>,
    ) -> DatabaseResult<Option<MatchSuggestion>> {
        if user_ids.is_empty() || statuses.is_empty() {
            return Ok(None);
        }
        let users = placeholders(user_ids.len());
        let sql = format!(
            "SELECT {SUGGESTION_COLUMNS} FROM match_suggestions \
             WHERE (first_party_id IN ({users}) OR second_party_id IN ({users})) AND status IN ({}) AND id != ? \
             ORDER BY created_at DESC LIMIT 1",
            placeholders(statuses.len())
        );
        let mut query = sqlx::query(&sql);
        for _ in 0..2 {
            for id in user_ids {
                query = query.bind(id);
            }
        }
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let row = query
            .bind(exclude_id.unwrap_or(-1))
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_suggestion).transpose()
    }

    pub async fn count_involving_in_status(
        &self,
        user_id: i64,
        statuses: &[SuggestionStatus],
    ) -> DatabaseResult<i64> {
        if statuses.is_empty() {
            return Ok(0);
        }
        let sql = format!(
            "SELECT COUNT(*) FROM match_suggestions WHERE (first_party_id = ? OR second_party_id = ?) \
             AND status IN ({})",
            placeholders(statuses.len())
        );
        let mut query = sqlx::query_scalar(&sql).bind(user_id).bind(user_id);
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let count: i64 = query.fetch_one(&self.pool).await?;
        Ok(count)
    }

    /// Move a suggestion to `status`, stamping `stamp` (one of the lifecycle columns) when given.
    pub async fn update_status(
        conn: &mut SqliteConnection,
        id: i64,
        status: SuggestionStatus,
        previous: SuggestionStatus,
        stamp: Option<&str>,
    ) -> DatabaseResult<()> {
        let now = timestamp::now();
        let stamp_clause = match stamp {
            Some(column) if STAMP_COLUMNS.contains(&column) => format!(", {column} = ?"),
            Some(column) => {
                return Err(DatabaseError::InvalidValue {
                    field: "suggestion timestamp column",
                    value: column.to_string(),
                })
            }
            None => String::new(),
        };
        let sql = format!(
            "UPDATE match_suggestions SET status = ?, previous_status = ?, last_status_change = ?, \
             last_activity = ?, updated_at = ?{stamp_clause} WHERE id = ?"
        );
        let mut query = sqlx::query(&sql)
            .bind(status.as_str())
            .bind(previous.as_str())
            .bind(&now)
            .bind(&now)
            .bind(&now);
        if stamp.is_some() {
            query = query.bind(&now);
        }
        let result = query.bind(id).execute(&mut *conn).await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("suggestion {id}")));
        }
        Ok(())
    }

    pub async fn insert_history(
        conn: &mut SqliteConnection,
        suggestion_id: i64,
        status: SuggestionStatus,
        previous: Option<SuggestionStatus>,
        notes: &str,
    ) -> DatabaseResult<()> {
        sqlx::query(
            "INSERT INTO suggestion_status_history (suggestion_id, status, previous_status, notes, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(suggestion_id)
        .bind(status.as_str())
        .bind(previous.map(|s| s.as_str()))
        .bind(notes)
        .bind(timestamp::now())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Status history, newest first.
    pub async fn history(&self, suggestion_id: i64) -> DatabaseResult<Vec<StatusHistoryEntry>> {
        let rows = sqlx::query(
            "SELECT id, suggestion_id, status, previous_status, notes, created_at FROM suggestion_status_history \
             WHERE suggestion_id = ? ORDER BY created_at DESC, id DESC",
        )
        .bind(suggestion_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_history).collect()
    }

    /// Apply the set fields of `patch` and bump `last_activity`.
    pub async fn update_details(&self, id: i64, patch: &SuggestionPatch) -> DatabaseResult<MatchSuggestion> {
        let now = timestamp::now();
        sqlx::query(
            "UPDATE match_suggestions SET \
             matching_reason = COALESCE(?, matching_reason), \
             first_party_notes = COALESCE(?, first_party_notes), \
             second_party_notes = COALESCE(?, second_party_notes), \
             internal_notes = COALESCE(?, internal_notes), \
             follow_up_notes = COALESCE(?, follow_up_notes), \
             priority = COALESCE(?, priority), \
             decision_deadline = COALESCE(?, decision_deadline), \
             response_deadline = COALESCE(?, response_deadline), \
             last_activity = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&patch.matching_reason)
        .bind(&patch.first_party_notes)
        .bind(&patch.second_party_notes)
        .bind(&patch.internal_notes)
        .bind(&patch.follow_up_notes)
        .bind(patch.priority.map(|p| p.as_str()))
        .bind(&patch.decision_deadline)
        .bind(&patch.response_deadline)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.find_by_id(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("suggestion {id}")))
    }

    /// Suggestions where the user is a party, newest activity first.
    pub async fn list_for_party(&self, user_id: i64, limit: i64) -> DatabaseResult<Vec<MatchSuggestion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM match_suggestions WHERE first_party_id = ? OR second_party_id = ? \
             ORDER BY COALESCE(last_activity, created_at) DESC, id DESC LIMIT ?"
        ))
        .bind(user_id)
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_suggestion).collect()
    }

    pub async fn list_for_matchmaker(&self, matchmaker_id: i64, limit: i64) -> DatabaseResult<Vec<MatchSuggestion>> {
        let rows = sqlx::query(&format!(
            "SELECT {SUGGESTION_COLUMNS} FROM match_suggestions WHERE matchmaker_id = ? \
             ORDER BY COALESCE(last_activity, created_at) DESC, id DESC LIMIT ?"
        ))
        .bind(matchmaker_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_suggestion).collect()
    }

    /// Delete a suggestion; history and meetings cascade.
    pub async fn delete(&self, id: i64) -> DatabaseResult<bool> {
        let result = sqlx::query("DELETE FROM match_suggestions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn create_meeting(
        &self,
        suggestion_id: i64,
        scheduled_date: &str,
        location: Option<&str>,
    ) -> DatabaseResult<Meeting> {
        let public_id = cuid2::cuid();
        sqlx::query(
            "INSERT INTO meetings (public_id, suggestion_id, scheduled_date, location, status, created_at) \
             VALUES (?, ?, ?, ?, 'SCHEDULED', ?)",
        )
        .bind(&public_id)
        .bind(suggestion_id)
        .bind(scheduled_date)
        .bind(location)
        .bind(timestamp::now())
        .execute(&self.pool)
        .await?;

        let row = sqlx::query(
            "SELECT id, public_id, suggestion_id, scheduled_date, location, status, created_at FROM meetings \
             WHERE public_id = ?",
        )
        .bind(&public_id)
        .fetch_one(&self.pool)
        .await?;
        map_meeting(&row)
    }

    pub async fn meetings(&self, suggestion_id: i64) -> DatabaseResult<Vec<Meeting>> {
        let rows = sqlx::query(
            "SELECT id, public_id, suggestion_id, scheduled_date, location, status, created_at FROM meetings \
             WHERE suggestion_id = ? ORDER BY scheduled_date",
        )
        .bind(suggestion_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_meeting).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::suggestion::SuggestionPriority;
    use crate::entities::user::{User, UserRole, UserStatus};
    use crate::repos::test_support::{insert_user, test_pool};

    async fn seed(pool: &SqlitePool) -> (User, User, User) {
        let mm = insert_user(pool, "mm@example.com", UserRole::Matchmaker, UserStatus::Active).await;
        let a = insert_user(pool, "a@example.com", UserRole::Candidate, UserStatus::Active).await;
        let b = insert_user(pool, "b@example.com", UserRole::Candidate, UserStatus::Active).await;
        (mm, a, b)
    }

    fn new_suggestion(mm: &User, a: &User, b: &User) -> NewSuggestion {
        NewSuggestion {
            matchmaker_id: mm.id,
            first_party_id: a.id,
            second_party_id: b.id,
            status: SuggestionStatus::PendingFirstParty,
            priority: SuggestionPriority::High,
            matching_reason: Some("shared values".into()),
            first_party_notes: None,
            second_party_notes: None,
            internal_notes: None,
            follow_up_notes: None,
            decision_deadline: None,
        }
    }

    #[tokio::test]
    async fn status_update_stamps_column_and_records_history() {
        let (pool, _dir) = test_pool().await;
        let (mm, a, b) = seed(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        let created = SuggestionRepository::create(&mut tx, &new_suggestion(&mm, &a, &b)).await.unwrap();
        assert!(created.first_party_sent.is_some());

        SuggestionRepository::update_status(
            &mut tx,
            created.id,
            SuggestionStatus::FirstPartyApproved,
            created.status,
            Some("first_party_responded"),
        )
        .await
        .unwrap();
        SuggestionRepository::insert_history(&mut tx, created.id, SuggestionStatus::FirstPartyApproved, Some(created.status), "ok")
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let repo = SuggestionRepository::new(pool.clone());
        let stored = repo.find_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, SuggestionStatus::FirstPartyApproved);
        assert_eq!(stored.previous_status, Some(SuggestionStatus::PendingFirstParty));
        assert!(stored.first_party_responded.is_some());
        assert_eq!(repo.history(created.id).await.unwrap().len(), 1);

        let mut conn = pool.acquire().await.unwrap();
        let err = SuggestionRepository::update_status(&mut conn, created.id, SuggestionStatus::Closed, stored.status, Some("status"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn blocking_lookup_respects_statuses_and_exclusion() {
        let (pool, _dir) = test_pool().await;
        let (mm, a, b) = seed(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let created = SuggestionRepository::create(&mut conn, &new_suggestion(&mm, &a, &b)).await.unwrap();
        drop(conn);
        let repo = SuggestionRepository::new(pool.clone());

        let blocking = repo
            .find_involving_in_status(&[a.id], SuggestionStatus::BLOCKING, None)
            .await
            .unwrap();
        assert!(blocking.is_none());

        sqlx::query("UPDATE match_suggestions SET status = 'DATING' WHERE id = ?")
            .bind(created.id)
            .execute(&pool)
            .await
            .unwrap();
        let blocking = repo
            .find_involving_in_status(&[b.id], SuggestionStatus::BLOCKING, None)
            .await
            .unwrap();
        assert_eq!(blocking.map(|s| s.id), Some(created.id));

        let excluded = repo
            .find_involving_in_status(&[b.id], SuggestionStatus::ACTIVE, Some(created.id))
            .await
            .unwrap();
        assert!(excluded.is_none());
        assert_eq!(repo.count_involving_in_status(a.id, SuggestionStatus::PENDING).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn patch_keeps_unset_fields_and_delete_cascades() {
        let (pool, _dir) = test_pool().await;
        let (mm, a, b) = seed(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        let created = SuggestionRepository::create(&mut tx, &new_suggestion(&mm, &a, &b)).await.unwrap();
        SuggestionRepository::insert_history(&mut tx, created.id, created.status, None, "created").await.unwrap();
        tx.commit().await.unwrap();
        let repo = SuggestionRepository::new(pool.clone());

        let patch = SuggestionPatch {
            internal_notes: Some("call on sunday".into()),
            priority: Some(SuggestionPriority::Urgent),
            ..SuggestionPatch::default()
        };
        let updated = repo.update_details(created.id, &patch).await.unwrap();
        assert_eq!(updated.matching_reason.as_deref(), Some("shared values"));
        assert_eq!(updated.internal_notes.as_deref(), Some("call on sunday"));
        assert_eq!(updated.priority, SuggestionPriority::Urgent);

        repo.create_meeting(created.id, "2030-01-01T18:00:00.000Z", None).await.unwrap();
        assert!(repo.delete(created.id).await.unwrap());
        let leftovers: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM suggestion_status_history")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(leftovers, 0);
        assert!(repo.meetings(created.id).await.unwrap().is_empty());
    }
}
