//! Availability inquiry repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection, SqlitePool};

use crate::entities::availability::{
    AvailabilityInquiry, InquiryFilter, InquiryOrder, InquiryParty,
};
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const INQUIRY_COLUMNS: &str = "id, public_id, matchmaker_id, first_party_id, second_party_id, first_party_response, \
     second_party_response, note, expires_at, created_at, updated_at";

fn map_inquiry(row: &SqliteRow) -> DatabaseResult<AvailabilityInquiry> {
    Ok(AvailabilityInquiry {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        matchmaker_id: row.try_get("matchmaker_id")?,
        first_party_id: row.try_get("first_party_id")?,
        second_party_id: row.try_get("second_party_id")?,
        first_party_response: row.try_get("first_party_response")?,
        second_party_response: row.try_get("second_party_response")?,
        note: row.try_get("note")?,
        expires_at: row.try_get("expires_at")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct AvailabilityRepository {
    pool: SqlitePool,
}

impl AvailabilityRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// An inquiry for `first_party_id` that has not expired yet.
    pub async fn find_active_for_first_party(
        &self,
        first_party_id: i64,
    ) -> DatabaseResult<Option<AvailabilityInquiry>> {
        let row = sqlx::query(&format!(
            "SELECT {INQUIRY_COLUMNS} FROM availability_inquiries \
             WHERE first_party_id = ? AND expires_at > ? ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(first_party_id)
        .bind(timestamp::now())
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_inquiry).transpose()
    }

    pub async fn create(
        &self,
        matchmaker_id: i64,
        first_party_id: i64,
        second_party_id: i64,
        note: Option<&str>,
        expires_at: &str,
    ) -> DatabaseResult<AvailabilityInquiry> {
        let now = timestamp::now();
        let public_id = cuid2::cuid();
        sqlx::query(
            "INSERT INTO availability_inquiries (public_id, matchmaker_id, first_party_id, second_party_id, note, \
             expires_at, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&public_id)
        .bind(matchmaker_id)
        .bind(first_party_id)
        .bind(second_party_id)
        .bind(note)
        .bind(expires_at)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        self.find_by_public_id(&public_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("inquiry {public_id}")))
    }

    pub async fn find_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<AvailabilityInquiry>> {
        let row = sqlx::query(&format!(
            "SELECT {INQUIRY_COLUMNS} FROM availability_inquiries WHERE public_id = ?"
        ))
        .bind(public_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_inquiry).transpose()
    }

    /// Record one party's answer inside the caller's transaction.
    pub async fn set_response(
        conn: &mut SqliteConnection,
        inquiry_id: i64,
        first_party: bool,
        is_available: bool,
    ) -> DatabaseResult<()> {
        let column = if first_party {
            "first_party_response"
        } else {
            "second_party_response"
        };
        sqlx::query(&format!(
            "UPDATE availability_inquiries SET {column} = ?, updated_at = ? WHERE id = ?"
        ))
        .bind(is_available)
        .bind(timestamp::now())
        .bind(inquiry_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Inquiries where `user_id` is the matchmaker or either party.
    pub async fn list_for_user(
        &self,
        user_id: i64,
        filter: InquiryFilter,
        order: InquiryOrder,
        limit: Option<i64>,
    ) -> DatabaseResult<Vec<AvailabilityInquiry>> {
        let status_clause = match filter {
            InquiryFilter::Pending => {
                "AND expires_at > ? AND (first_party_response IS NULL OR second_party_response IS NULL)"
            }
            InquiryFilter::Completed => {
                "AND first_party_response IS NOT NULL AND second_party_response IS NOT NULL"
            }
            InquiryFilter::Expired => "AND expires_at < ?",
        };
        let sql = format!(
            "SELECT {INQUIRY_COLUMNS} FROM availability_inquiries \
             WHERE (matchmaker_id = ? OR first_party_id = ? OR second_party_id = ?) {status_clause} \
             ORDER BY {} DESC, id DESC LIMIT ?",
            order.column()
        );

        let mut query = sqlx::query(&sql).bind(user_id).bind(user_id).bind(user_id);
        if matches!(filter, InquiryFilter::Pending | InquiryFilter::Expired) {
            query = query.bind(timestamp::now());
        }
        let rows = query.bind(limit.unwrap_or(-1)).fetch_all(&self.pool).await?;
        rows.iter().map(map_inquiry).collect()
    }

    /// Distinct party ids across all inquiries sent by a matchmaker.
    pub async fn party_ids_for_matchmaker(&self, matchmaker_id: i64) -> DatabaseResult<Vec<i64>> {
        let ids = sqlx::query_scalar(
            "SELECT first_party_id FROM availability_inquiries WHERE matchmaker_id = ? \
             UNION SELECT second_party_id FROM availability_inquiries WHERE matchmaker_id = ?",
        )
        .bind(matchmaker_id)
        .bind(matchmaker_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// Name, email and availability of a user, as shown on an inquiry.
    pub async fn party(&self, user_id: i64) -> DatabaseResult<Option<InquiryParty>> {
        let row = sqlx::query(
            "SELECT u.id, u.first_name, u.last_name, u.email, p.availability_status, p.availability_note, \
             p.availability_updated_at FROM users u LEFT JOIN profiles p ON p.user_id = u.id WHERE u.id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|row| {
            Ok(InquiryParty {
                id: row.try_get("id")?,
                first_name: row.try_get("first_name")?,
                last_name: row.try_get("last_name")?,
                email: row.try_get("email")?,
                availability_status: row.try_get("availability_status")?,
                availability_note: row.try_get("availability_note")?,
                availability_updated_at: row.try_get("availability_updated_at")?,
            })
        })
        .transpose()
    }
}
