//! User repository for database operations.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::entities::user::{NewUser, User, UserRole, UserStatus};
use crate::repos::{enum_column, placeholders};
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const USER_COLUMNS: &str = "id, public_id, email, password_hash, first_name, last_name, phone, role, status, \
     is_verified, is_phone_verified, is_profile_complete, source, language, marketing_consent, \
     terms_accepted_at, last_login_at, created_at, updated_at";

fn map_user(row: &SqliteRow) -> DatabaseResult<User> {
    Ok(User {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        phone: row.try_get("phone")?,
        role: enum_column(row, "role")?,
        status: enum_column(row, "status")?,
        is_verified: row.try_get("is_verified")?,
        is_phone_verified: row.try_get("is_phone_verified")?,
        is_profile_complete: row.try_get("is_profile_complete")?,
        source: enum_column(row, "source")?,
        language: row.try_get("language")?,
        marketing_consent: row.try_get("marketing_consent")?,
        terms_accepted_at: row.try_get("terms_accepted_at")?,
        last_login_at: row.try_get("last_login_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

/// Repository for user database operations
#[derive(Clone)]
pub struct UserRepository {
    pool: SqlitePool,
}

impl UserRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn find_by_id(&self, id: i64) -> DatabaseResult<Option<User>> {
        let mut conn = self.pool.acquire().await?;
        Self::find_by_id_in(&mut conn, id).await
    }

    /// Lookup usable inside a caller's transaction
    pub async fn find_by_id_in(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
            .bind(id)
            .fetch_optional(&mut *conn)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    /// Find user by email. Emails are stored lowercase.
    pub async fn find_by_email(&self, email: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?"))
            .bind(email.to_lowercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_by_phone(&self, phone: &str) -> DatabaseResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE phone = ? ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(phone)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_user).transpose()
    }

    pub async fn find_many(&self, ids: &[i64]) -> DatabaseResult<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id IN ({})",
            placeholders(ids.len())
        );
        let mut query = sqlx::query(&sql);
        for id in ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(map_user).collect()
    }

    pub async fn email_exists(&self, email: &str) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
            .bind(email.to_lowercase())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Insert a user inside the caller's transaction and return the stored row.
    pub async fn create(conn: &mut SqliteConnection, user: &NewUser) -> DatabaseResult<User> {
        let now = timestamp::now();
        let terms_accepted_at = user.terms_accepted.then(|| now.clone());

        let result = sqlx::query(
            "INSERT INTO users (public_id, email, password_hash, first_name, last_name, phone, role, status, \
             is_verified, is_phone_verified, is_profile_complete, source, language, marketing_consent, \
             terms_accepted_at, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, false, false, false, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cuid2::cuid())
        .bind(user.email.to_lowercase())
        .bind(&user.password_hash)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.phone)
        .bind(user.role.as_str())
        .bind(user.status.as_str())
        .bind(user.source.as_str())
        .bind(&user.language)
        .bind(user.marketing_consent)
        .bind(terms_accepted_at)
        .bind(&now)
        .bind(&now)
        .execute(&mut *conn)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::Duplicate(_) => DatabaseError::Duplicate(format!("email {}", user.email)),
            other => other,
        })?;

        let id = result.last_insert_rowid();
        Self::find_by_id_in(conn, id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("user {id}")))
    }

    /// Set `is_verified` and advance a pending-email account to phone verification.
    pub async fn mark_email_verified(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE users SET is_verified = true, \
             status = CASE WHEN status = ? THEN ? ELSE status END, updated_at = ? WHERE id = ?",
        )
        .bind(UserStatus::PendingEmailVerification.as_str())
        .bind(UserStatus::PendingPhoneVerification.as_str())
        .bind(timestamp::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Set `is_phone_verified` and activate a pending-phone account.
    pub async fn mark_phone_verified(conn: &mut SqliteConnection, id: i64) -> DatabaseResult<()> {
        sqlx::query(
            "UPDATE users SET is_phone_verified = true, \
             status = CASE WHEN status = ? THEN ? ELSE status END, updated_at = ? WHERE id = ?",
        )
        .bind(UserStatus::PendingPhoneVerification.as_str())
        .bind(UserStatus::Active.as_str())
        .bind(timestamp::now())
        .bind(id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn update_phone(&self, id: i64, phone: &str) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET phone = ?, updated_at = ? WHERE id = ?")
            .bind(phone)
            .bind(timestamp::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn update_status(&self, id: i64, status: UserStatus) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(timestamp::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn set_profile_complete(&self, id: i64, complete: bool) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET is_profile_complete = ?, updated_at = ? WHERE id = ?")
            .bind(complete)
            .bind(timestamp::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn touch_login(&self, id: i64) -> DatabaseResult<()> {
        sqlx::query("UPDATE users SET last_login_at = ? WHERE id = ?")
            .bind(timestamp::now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Newest accounts first, optionally restricted to one role.
    pub async fn list(&self, role: Option<UserRole>, limit: i64) -> DatabaseResult<Vec<User>> {
        let rows = match role {
            Some(role) => {
                sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users WHERE role = ? ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(role.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users ORDER BY created_at DESC LIMIT ?"
                ))
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };
        rows.iter().map(map_user).collect()
    }

    pub async fn count(&self) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repos::test_support::{insert_user, test_pool};

    #[tokio::test]
    async fn create_normalizes_email_and_rejects_duplicates() {
        let (pool, _dir) = test_pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let user = UserRepository::create(&mut conn, &NewUser::candidate("Dana@Example.COM", "Dana", "Levi"))
            .await
            .unwrap();
        assert_eq!(user.email, "dana@example.com");
        assert_eq!(user.status, UserStatus::PendingEmailVerification);
        assert!(user.terms_accepted_at.is_some());
        assert!(!user.is_verified);

        let err = UserRepository::create(&mut conn, &NewUser::candidate("dana@example.com", "D", "L"))
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));

        let repo = UserRepository::new(pool.clone());
        assert!(repo.email_exists("DANA@example.com").await.unwrap());
        assert!(repo.find_by_email("dana@EXAMPLE.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn verification_flags_advance_status_only_from_expected_state() {
        let (pool, _dir) = test_pool().await;
        let user = insert_user(&pool, "a@example.com", UserRole::Candidate, UserStatus::PendingEmailVerification).await;
        let repo = UserRepository::new(pool.clone());
        let mut conn = pool.acquire().await.unwrap();

        UserRepository::mark_email_verified(&mut conn, user.id).await.unwrap();
        let user = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(user.is_verified);
        assert_eq!(user.status, UserStatus::PendingPhoneVerification);

        UserRepository::mark_phone_verified(&mut conn, user.id).await.unwrap();
        let user = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert!(user.is_phone_verified);
        assert_eq!(user.status, UserStatus::Active);

        // Re-verifying email on an active account keeps it active.
        UserRepository::mark_email_verified(&mut conn, user.id).await.unwrap();
        let user = repo.find_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(user.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn list_filters_by_role() {
        let (pool, _dir) = test_pool().await;
        insert_user(&pool, "mm@example.com", UserRole::Matchmaker, UserStatus::Active).await;
        insert_user(&pool, "c1@example.com", UserRole::Candidate, UserStatus::Active).await;
        let repo = UserRepository::new(pool);

        let matchmakers = repo.list(Some(UserRole::Matchmaker), 10).await.unwrap();
        assert_eq!(matchmakers.len(), 1);
        assert_eq!(matchmakers[0].email, "mm@example.com");
        assert_eq!(repo.list(None, 10).await.unwrap().len(), 2);
        assert_eq!(repo.count().await.unwrap(), 2);
    }
}
