//! Profile repository for database operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::entities::profile::{
    AvailabilityStatus, CandidateQuery, PriorityCategory, Profile, ProfileDraft,
};
use crate::entities::user::UserStatus;
use crate::repos::{optional_enum_column, placeholders, string_list_column};
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const PROFILE_COLUMNS: &str = "p.id, p.user_id, p.gender, p.birth_date, p.religious_level, p.city, p.occupation, \
     p.education, p.about, p.height, p.marital_status, p.origin, p.service_type, p.character_traits, p.hobbies, \
     p.preferred_age_min, p.preferred_age_max, p.preferred_religious_levels, p.matching_notes, p.ai_summary, \
     p.readiness_level, p.is_profile_visible, p.availability_status, p.availability_note, \
     p.availability_updated_at, p.priority_score, p.priority_category, p.priority_updated_at, \
     p.completeness_score, p.difficulty_score, p.acceptance_rate, p.average_response_hours, \
     p.last_suggested_at, p.last_active_at, p.created_at, p.updated_at";

const DRAFT_COLUMNS: &str = "user_id, gender, birth_date, religious_level, city, occupation, education, about, \
     height, marital_status, origin, service_type, character_traits, hobbies, preferred_age_min, \
     preferred_age_max, preferred_religious_levels, matching_notes, ai_summary, readiness_level, \
     is_profile_visible, availability_status, availability_updated_at, last_active_at";

fn map_profile(row: &SqliteRow) -> DatabaseResult<Profile> {
    Ok(Profile {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        gender: optional_enum_column(row, "gender")?,
        birth_date: row.try_get("birth_date")?,
        religious_level: row.try_get("religious_level")?,
        city: row.try_get("city")?,
        occupation: row.try_get("occupation")?,
        education: row.try_get("education")?,
        about: row.try_get("about")?,
        height: row.try_get("height")?,
        marital_status: row.try_get("marital_status")?,
        origin: row.try_get("origin")?,
        service_type: row.try_get("service_type")?,
        character_traits: string_list_column(row, "character_traits")?,
        hobbies: string_list_column(row, "hobbies")?,
        preferred_age_min: row.try_get("preferred_age_min")?,
        preferred_age_max: row.try_get("preferred_age_max")?,
        preferred_religious_levels: string_list_column(row, "preferred_religious_levels")?,
        matching_notes: row.try_get("matching_notes")?,
        ai_summary: row.try_get("ai_summary")?,
        readiness_level: optional_enum_column(row, "readiness_level")?,
        is_profile_visible: row.try_get("is_profile_visible")?,
        availability_status: optional_enum_column(row, "availability_status")?,
        availability_note: row.try_get("availability_note")?,
        availability_updated_at: row.try_get("availability_updated_at")?,
        priority_score: row.try_get("priority_score")?,
        priority_category: optional_enum_column(row, "priority_category")?,
        priority_updated_at: row.try_get("priority_updated_at")?,
        completeness_score: row.try_get("completeness_score")?,
        difficulty_score: row.try_get("difficulty_score")?,
        acceptance_rate: row.try_get("acceptance_rate")?,
        average_response_hours: row.try_get("average_response_hours")?,
        last_suggested_at: row.try_get("last_suggested_at")?,
        last_active_at: row.try_get("last_active_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Repository for candidate profiles
#[derive(Clone)]
pub struct ProfileRepository {
    pool: SqlitePool,
}

impl ProfileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_user_id(&self, user_id: i64) -> DatabaseResult<Option<Profile>> {
        let row = sqlx::query(&format!("SELECT {PROFILE_COLUMNS} FROM profiles p WHERE p.user_id = ?"))
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_profile).transpose()
    }

    pub async fn create(&self, user_id: i64, draft: &ProfileDraft) -> DatabaseResult<Profile> {
        let mut conn = self.pool.acquire().await?;
        Self::insert(&mut conn, user_id, draft).await?;
        drop(conn);

        self.find_by_user_id(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("profile for user {user_id}")))
    }

    /// Insert a profile row inside the caller's transaction.
    pub async fn insert(conn: &mut SqliteConnection, user_id: i64, draft: &ProfileDraft) -> DatabaseResult<()> {
        let now = timestamp::now();
        sqlx::query(&format!("INSERT INTO profiles ({DRAFT_COLUMNS}, created_at, updated_at) VALUES ({})", placeholders(26)))
            .bind(user_id)
            .bind(draft.gender.map(|g| g.as_str()))
            .bind(&draft.birth_date)
            .bind(&draft.religious_level)
            .bind(&draft.city)
            .bind(&draft.occupation)
            .bind(&draft.education)
            .bind(&draft.about)
            .bind(draft.height)
            .bind(&draft.marital_status)
            .bind(&draft.origin)
            .bind(&draft.service_type)
            .bind(serde_json::to_string(&draft.character_traits)?)
            .bind(serde_json::to_string(&draft.hobbies)?)
            .bind(draft.preferred_age_min)
            .bind(draft.preferred_age_max)
            .bind(serde_json::to_string(&draft.preferred_religious_levels)?)
            .bind(&draft.matching_notes)
            .bind(&draft.ai_summary)
            .bind(draft.readiness_level.map(|r| r.as_str()))
            .bind(draft.is_profile_visible)
            .bind(draft.availability_status.map(|s| s.as_str()))
            .bind(draft.availability_status.map(|_| now.clone()))
            .bind(&now)
            .bind(&now)
            .bind(&now)
            .execute(&mut *conn)
            .await
            .map_err(|e| match DatabaseError::from(e) {
                DatabaseError::Duplicate(_) => DatabaseError::Duplicate(format!("profile for user {user_id}")),
                other => other,
            })?;
        Ok(())
    }

    /// Write every draft column, creating the row when the user has none yet.
    ///
    /// `availability_updated_at` only moves when the availability status changes.
    pub async fn upsert(&self, user_id: i64, draft: &ProfileDraft) -> DatabaseResult<Profile> {
        let now = timestamp::now();
        sqlx::query(&format!(
            "INSERT INTO profiles ({DRAFT_COLUMNS}, created_at, updated_at) VALUES ({}) \
             ON CONFLICT(user_id) DO UPDATE SET gender = excluded.gender, birth_date = excluded.birth_date, \
             religious_level = excluded.religious_level, city = excluded.city, occupation = excluded.occupation, \
             education = excluded.education, about = excluded.about, height = excluded.height, \
             marital_status = excluded.marital_status, origin = excluded.origin, \
             service_type = excluded.service_type, character_traits = excluded.character_traits, \
             hobbies = excluded.hobbies, preferred_age_min = excluded.preferred_age_min, \
             preferred_age_max = excluded.preferred_age_max, \
             preferred_religious_levels = excluded.preferred_religious_levels, \
             matching_notes = excluded.matching_notes, ai_summary = excluded.ai_summary, \
             readiness_level = excluded.readiness_level, is_profile_visible = excluded.is_profile_visible, \
             availability_updated_at = CASE WHEN profiles.availability_status IS excluded.availability_status \
                 THEN profiles.availability_updated_at ELSE excluded.availability_updated_at END, \
             availability_status = excluded.availability_status, last_active_at = excluded.last_active_at, \
             updated_at = excluded.updated_at",
            placeholders(26)
        ))
        .bind(user_id)
        .bind(draft.gender.map(|g| g.as_str()))
        .bind(&draft.birth_date)
        .bind(&draft.religious_level)
        .bind(&draft.city)
        .bind(&draft.occupation)
        .bind(&draft.education)
        .bind(&draft.about)
        .bind(draft.height)
        .bind(&draft.marital_status)
        .bind(&draft.origin)
        .bind(&draft.service_type)
        .bind(serde_json::to_string(&draft.character_traits)?)
        .bind(serde_json::to_string(&draft.hobbies)?)
        .bind(draft.preferred_age_min)
        .bind(draft.preferred_age_max)
        .bind(serde_json::to_string(&draft.preferred_religious_levels)?)
        .bind(&draft.matching_notes)
        .bind(&draft.ai_summary)
        .bind(draft.readiness_level.map(|r| r.as_str()))
        .bind(draft.is_profile_visible)
        .bind(draft.availability_status.map(|s| s.as_str()))
        .bind(draft.availability_status.map(|_| now.clone()))
        .bind(&now)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_by_user_id(user_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("profile for user {user_id}")))
    }

    /// Update availability inside the caller's transaction. Returns whether a profile row existed.
    pub async fn set_availability(
        conn: &mut SqliteConnection,
        user_id: i64,
        status: AvailabilityStatus,
        note: Option<&str>,
    ) -> DatabaseResult<bool> {
        let now = timestamp::now();
        let result = sqlx::query(
            "UPDATE profiles SET availability_status = ?, availability_note = ?, availability_updated_at = ?, \
             updated_at = ? WHERE user_id = ?",
        )
        .bind(status.as_str())
        .bind(note)
        .bind(&now)
        .bind(&now)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn update_priority(
        &self,
        user_id: i64,
        score: i64,
        category: PriorityCategory,
        completeness: i64,
    ) -> DatabaseResult<bool> {
        let now = timestamp::now();
        let result = sqlx::query(
            "UPDATE profiles SET priority_score = ?, priority_category = ?, priority_updated_at = ?, \
             completeness_score = ? WHERE user_id = ?",
        )
        .bind(score)
        .bind(category.as_str())
        .bind(&now)
        .bind(completeness)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn touch_last_suggested(conn: &mut SqliteConnection, user_ids: &[i64]) -> DatabaseResult<()> {
        if user_ids.is_empty() {
            return Ok(());
        }
        let sql = format!(
            "UPDATE profiles SET last_suggested_at = ? WHERE user_id IN ({})",
            placeholders(user_ids.len())
        );
        let mut query = sqlx::query(&sql).bind(timestamp::now());
        for id in user_ids {
            query = query.bind(id);
        }
        query.execute(&mut *conn).await?;
        Ok(())
    }

    pub async fn touch_last_active(&self, user_id: i64) -> DatabaseResult<()> {
        sqlx::query("UPDATE profiles SET last_active_at = ? WHERE user_id = ?")
            .bind(timestamp::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Visible, available profiles of active users matching the query, most recently updated first.
    pub async fn find_candidates(&self, query: &CandidateQuery) -> DatabaseResult<Vec<Profile>> {
        let mut sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p JOIN users u ON u.id = p.user_id \
             WHERE p.user_id != ? AND p.gender = ? AND u.status = ? AND p.availability_status = ? \
             AND p.is_profile_visible = true AND p.birth_date IS NOT NULL \
             AND substr(p.birth_date, 1, 10) >= ? AND substr(p.birth_date, 1, 10) <= ?"
        );
        if let Some(levels) = query.religious_levels.as_ref() {
            if levels.is_empty() {
                return Ok(Vec::new());
            }
            sql.push_str(&format!(" AND p.religious_level IN ({})", placeholders(levels.len())));
        }
        sql.push_str(" ORDER BY p.updated_at DESC, p.id DESC LIMIT ?");

        let mut statement = sqlx::query(&sql)
            .bind(query.exclude_user_id)
            .bind(query.gender.as_str())
            .bind(UserStatus::Active.as_str())
            .bind(AvailabilityStatus::Available.as_str())
            .bind(&query.born_on_or_after)
            .bind(&query.born_on_or_before);
        if let Some(levels) = query.religious_levels.as_ref() {
            for level in levels {
                statement = statement.bind(level);
            }
        }
        let rows = statement.bind(query.limit).fetch_all(&self.pool).await?;
        rows.iter().map(map_profile).collect()
    }

    /// Profiles of active users whose availability is one of `statuses`.
    pub async fn list_active_with_availability(
        &self,
        statuses: &[AvailabilityStatus],
    ) -> DatabaseResult<Vec<Profile>> {
        if statuses.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles p JOIN users u ON u.id = p.user_id \
             WHERE u.status = ? AND p.availability_status IN ({}) ORDER BY p.user_id",
            placeholders(statuses.len())
        );
        let mut query = sqlx::query(&sql).bind(UserStatus::Active.as_str());
        for status in statuses {
            query = query.bind(status.as_str());
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(map_profile).collect()
    }

    /// User ids of every active user that has a profile.
    pub async fn list_active_user_ids(&self) -> DatabaseResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT p.user_id FROM profiles p JOIN users u ON u.id = p.user_id WHERE u.status = ? ORDER BY p.user_id",
        )
        .bind(UserStatus::Active.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Count of profiles grouped by availability; `None` collects profiles without a status.
    pub async fn count_by_availability(
        &self,
        user_ids: &[i64],
    ) -> DatabaseResult<Vec<(Option<AvailabilityStatus>, i64)>> {
        if user_ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT availability_status, COUNT(*) AS total FROM profiles WHERE user_id IN ({}) \
             GROUP BY availability_status",
            placeholders(user_ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in user_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter()
            .map(|row| {
                let status = optional_enum_column(row, "availability_status")?;
                let total: i64 = row.try_get("total")?;
                Ok((status, total))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::profile::Gender;
    use crate::entities::user::{UserRole, UserStatus};
    use crate::repos::test_support::{insert_candidate, insert_user, test_pool};

    fn query_for(exclude: i64, gender: Gender) -> CandidateQuery {
        CandidateQuery {
            exclude_user_id: exclude,
            gender,
            born_on_or_after: "1990-01-01".into(),
            born_on_or_before: "2000-12-31".into(),
            religious_levels: None,
            limit: 10,
        }
    }

    #[tokio::test]
    async fn create_round_trips_lists_and_defaults() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "p@example.com", UserRole::Candidate, UserStatus::Active).await;
        let repo = ProfileRepository::new(pool);

        let draft = ProfileDraft {
            gender: Some(Gender::Female),
            hobbies: vec!["hiking".into(), "music".into()],
            ..ProfileDraft::default()
        };
        let profile = repo.create(user.id, &draft).await.unwrap();
        assert_eq!(profile.hobbies, vec!["hiking".to_string(), "music".to_string()]);
        assert!(profile.character_traits.is_empty());
        assert!(profile.is_profile_visible);
        assert_eq!(profile.availability_status, Some(AvailabilityStatus::Available));

        let err = repo.create(user.id, &draft).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));
    }

    #[tokio::test]
    async fn upsert_creates_then_overwrites_and_keeps_availability_timestamp() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "u@example.com", UserRole::Candidate, UserStatus::Active).await;
        let repo = ProfileRepository::new(pool);

        let created = repo
            .upsert(user.id, &ProfileDraft { height: Some(170), ..ProfileDraft::default() })
            .await
            .unwrap();
        assert_eq!(created.height, Some(170));
        let stamped = created.availability_updated_at.clone();
        assert!(stamped.is_some());

        let updated = repo
            .upsert(
                user.id,
                &ProfileDraft {
                    height: Some(182),
                    city: Some("Haifa".into()),
                    ..ProfileDraft::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.height, Some(182));
        assert_eq!(updated.city.as_deref(), Some("Haifa"));
        assert_eq!(updated.availability_updated_at, stamped);
    }

    #[tokio::test]
    async fn find_candidates_applies_gender_age_and_availability() {
        let (pool, _dir) = test_pool().await;
        let target = insert_candidate(&pool, "target@example.com", Gender::Male, "1994-05-01").await;
        let match_a = insert_candidate(&pool, "a@example.com", Gender::Female, "1995-02-02").await;
        insert_candidate(&pool, "old@example.com", Gender::Female, "1980-02-02").await;
        insert_candidate(&pool, "male@example.com", Gender::Male, "1995-02-02").await;
        let busy = insert_candidate(&pool, "busy@example.com", Gender::Female, "1996-02-02").await;

        let mut conn = pool.acquire().await.unwrap();
        ProfileRepository::set_availability(&mut conn, busy.id, AvailabilityStatus::Dating, Some("dating"))
            .await
            .unwrap();
        drop(conn);

        let repo = ProfileRepository::new(pool);
        let found = repo.find_candidates(&query_for(target.id, Gender::Female)).await.unwrap();
        let ids: Vec<i64> = found.iter().map(|p| p.user_id).collect();
        assert_eq!(ids, vec![match_a.id]);
    }

    #[tokio::test]
    async fn find_candidates_filters_religious_levels() {
        let (pool, _dir) = test_pool().await;
        let target = insert_candidate(&pool, "t@example.com", Gender::Female, "1994-05-01").await;
        let candidate = insert_candidate(&pool, "c@example.com", Gender::Male, "1993-01-01").await;
        sqlx::query("UPDATE profiles SET religious_level = 'dati_leumi_standard' WHERE user_id = ?")
            .bind(candidate.id)
            .execute(&pool)
            .await
            .unwrap();

        let repo = ProfileRepository::new(pool);
        let mut query = query_for(target.id, Gender::Male);
        query.religious_levels = Some(vec!["haredi_strict".into()]);
        assert!(repo.find_candidates(&query).await.unwrap().is_empty());

        query.religious_levels = Some(vec!["dati_leumi_standard".into()]);
        assert_eq!(repo.find_candidates(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn counts_group_missing_status_separately() {
        let (pool, _dir) = test_pool().await;
        let a = insert_candidate(&pool, "a@example.com", Gender::Female, "1995-01-01").await;
        let b = insert_candidate(&pool, "b@example.com", Gender::Female, "1995-01-01").await;
        sqlx::query("UPDATE profiles SET availability_status = NULL WHERE user_id = ?")
            .bind(b.id)
            .execute(&pool)
            .await
            .unwrap();

        let repo = ProfileRepository::new(pool);
        let mut counts = repo.count_by_availability(&[a.id, b.id]).await.unwrap();
        counts.sort_by_key(|(status, _)| status.map(|s| s.as_str()));
        assert_eq!(counts, vec![(None, 1), (Some(AvailabilityStatus::Available), 1)]);
    }
}
