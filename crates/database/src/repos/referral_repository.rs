//! Referral campaign, referrer and referral repository.

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};

use crate::entities::referral::{
    NewCampaign, NewReferral, NewReferrer, Referral, ReferralCampaign, ReferralStatus, Referrer,
};
use crate::repos::enum_column;
use crate::timestamp;
use crate::types::{DatabaseError, DatabaseResult};

const CAMPAIGN_COLUMNS: &str =
    "id, public_id, slug, name, description, is_active, starts_at, ends_at, prize_tiers, settings, created_at";

const REFERRER_COLUMNS: &str = "id, public_id, campaign_id, user_id, code, name, email, phone, tier, click_count, \
     registration_count, verified_count, completed_count, created_at";

const REFERRAL_COLUMNS: &str = "id, public_id, referrer_id, campaign_id, user_id, session_id, ip_address, \
     user_agent, landing_page, status, clicked_at, started_at, registered_at, verified_at, completed_at, created_at";

fn map_campaign(row: &SqliteRow) -> DatabaseResult<ReferralCampaign> {
    Ok(ReferralCampaign {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        is_active: row.try_get("is_active")?,
        starts_at: row.try_get("starts_at")?,
        ends_at: row.try_get("ends_at")?,
        prize_tiers: row.try_get("prize_tiers")?,
        settings: row.try_get("settings")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_referrer(row: &SqliteRow) -> DatabaseResult<Referrer> {
    Ok(Referrer {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        campaign_id: row.try_get("campaign_id")?,
        user_id: row.try_get("user_id")?,
        code: row.try_get("code")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        phone: row.try_get("phone")?,
        tier: enum_column(row, "tier")?,
        click_count: row.try_get("click_count")?,
        registration_count: row.try_get("registration_count")?,
        verified_count: row.try_get("verified_count")?,
        completed_count: row.try_get("completed_count")?,
        created_at: row.try_get("created_at")?,
    })
}

fn map_referral(row: &SqliteRow) -> DatabaseResult<Referral> {
    Ok(Referral {
        id: row.try_get("id")?,
        public_id: row.try_get("public_id")?,
        referrer_id: row.try_get("referrer_id")?,
        campaign_id: row.try_get("campaign_id")?,
        user_id: row.try_get("user_id")?,
        session_id: row.try_get("session_id")?,
        ip_address: row.try_get("ip_address")?,
        user_agent: row.try_get("user_agent")?,
        landing_page: row.try_get("landing_page")?,
        status: enum_column(row, "status")?,
        clicked_at: row.try_get("clicked_at")?,
        started_at: row.try_get("started_at")?,
        registered_at: row.try_get("registered_at")?,
        verified_at: row.try_get("verified_at")?,
        completed_at: row.try_get("completed_at")?,
        created_at: row.try_get("created_at")?,
    })
}

#[derive(Clone)]
pub struct ReferralRepository {
    pool: SqlitePool,
}

impl ReferralRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    // Campaigns

    pub async fn create_campaign(&self, campaign: &NewCampaign) -> DatabaseResult<ReferralCampaign> {
        let result = sqlx::query(
            "INSERT INTO referral_campaigns (public_id, slug, name, description, is_active, starts_at, ends_at, \
             prize_tiers, settings, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cuid2::cuid())
        .bind(&campaign.slug)
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.is_active)
        .bind(&campaign.starts_at)
        .bind(&campaign.ends_at)
        .bind(&campaign.prize_tiers)
        .bind(&campaign.settings)
        .bind(timestamp::now())
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find_campaign(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("campaign {id}")))
    }

    /// Overwrite the editable columns of a campaign. The slug never changes.
    pub async fn update_campaign(&self, id: i64, campaign: &NewCampaign) -> DatabaseResult<ReferralCampaign> {
        let result = sqlx::query(
            "UPDATE referral_campaigns SET name = ?, description = ?, is_active = ?, starts_at = ?, ends_at = ?, \
             prize_tiers = ?, settings = ? WHERE id = ?",
        )
        .bind(&campaign.name)
        .bind(&campaign.description)
        .bind(campaign.is_active)
        .bind(&campaign.starts_at)
        .bind(&campaign.ends_at)
        .bind(&campaign.prize_tiers)
        .bind(&campaign.settings)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound(format!("campaign {id}")));
        }

        self.find_campaign(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("campaign {id}")))
    }

    pub async fn campaign_slug_exists(&self, slug: &str) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM referral_campaigns WHERE slug = ?)")
            .bind(slug)
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    pub async fn find_campaign(&self, id: i64) -> DatabaseResult<Option<ReferralCampaign>> {
        let row = sqlx::query(&format!("SELECT {CAMPAIGN_COLUMNS} FROM referral_campaigns WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_campaign).transpose()
    }

    /// Newest active campaign with this slug, regardless of its date window.
    pub async fn find_active_campaign_by_slug(&self, slug: &str) -> DatabaseResult<Option<ReferralCampaign>> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM referral_campaigns WHERE slug = ? AND is_active = true \
             ORDER BY created_at DESC LIMIT 1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_campaign).transpose()
    }

    /// Newest active campaign whose window contains `now`.
    pub async fn find_running_campaign(&self, now: &str) -> DatabaseResult<Option<ReferralCampaign>> {
        let row = sqlx::query(&format!(
            "SELECT {CAMPAIGN_COLUMNS} FROM referral_campaigns \
             WHERE is_active = true AND starts_at <= ? AND ends_at >= ? ORDER BY created_at DESC, id DESC LIMIT 1"
        ))
        .bind(now)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_campaign).transpose()
    }

    /// Referral counts per status within a campaign.
    pub async fn status_counts(&self, campaign_id: i64) -> DatabaseResult<Vec<(ReferralStatus, i64)>> {
        let rows = sqlx::query(
            "SELECT status, COUNT(*) AS total FROM referrals WHERE campaign_id = ? GROUP BY status",
        )
        .bind(campaign_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| Ok((enum_column(row, "status")?, row.try_get("total")?)))
            .collect()
    }

    pub async fn count_referrers(&self, campaign_id: i64) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrers WHERE campaign_id = ?")
            .bind(campaign_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // Referrers

    pub async fn create_referrer(&self, referrer: &NewReferrer) -> DatabaseResult<Referrer> {
        let result = sqlx::query(
            "INSERT INTO referrers (public_id, campaign_id, user_id, code, name, email, phone, tier, created_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cuid2::cuid())
        .bind(referrer.campaign_id)
        .bind(referrer.user_id)
        .bind(&referrer.code)
        .bind(&referrer.name)
        .bind(&referrer.email)
        .bind(&referrer.phone)
        .bind(referrer.tier.as_str())
        .bind(timestamp::now())
        .execute(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(e) {
            DatabaseError::Duplicate(_) => DatabaseError::Duplicate(format!("referral code {}", referrer.code)),
            other => other,
        })?;

        let id = result.last_insert_rowid();
        self.find_referrer(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("referrer {id}")))
    }

    pub async fn find_referrer(&self, id: i64) -> DatabaseResult<Option<Referrer>> {
        let row = sqlx::query(&format!("SELECT {REFERRER_COLUMNS} FROM referrers WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_referrer).transpose()
    }

    /// Codes are stored uppercase.
    pub async fn find_referrer_by_code(&self, code: &str) -> DatabaseResult<Option<Referrer>> {
        let row = sqlx::query(&format!("SELECT {REFERRER_COLUMNS} FROM referrers WHERE code = ?"))
            .bind(code.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_referrer).transpose()
    }

    pub async fn code_exists(&self, code: &str) -> DatabaseResult<bool> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM referrers WHERE code = ?)")
            .bind(code.to_uppercase())
            .fetch_one(&self.pool)
            .await?;
        Ok(exists)
    }

    /// Codes starting with `prefix`, for picking a free numbered variant.
    pub async fn codes_with_prefix(&self, prefix: &str) -> DatabaseResult<Vec<String>> {
        let codes = sqlx::query_scalar("SELECT code FROM referrers WHERE substr(code, 1, ?) = ?")
            .bind(prefix.chars().count() as i64)
            .bind(prefix)
            .fetch_all(&self.pool)
            .await?;
        Ok(codes)
    }

    /// Number of referrers in the campaign with strictly more verified referrals.
    pub async fn count_ahead(&self, campaign_id: i64, verified_count: i64) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM referrers WHERE campaign_id = ? AND verified_count > ?",
        )
        .bind(campaign_id)
        .bind(verified_count)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Ordered by verified desc, completed desc, then earliest signup.
    pub async fn leaderboard(&self, campaign_id: i64, limit: i64) -> DatabaseResult<Vec<Referrer>> {
        let rows = sqlx::query(&format!(
            "SELECT {REFERRER_COLUMNS} FROM referrers WHERE campaign_id = ? \
             ORDER BY verified_count DESC, completed_count DESC, created_at ASC, id ASC LIMIT ?"
        ))
        .bind(campaign_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_referrer).collect()
    }

    /// Add one to a referrer counter and return the new value.
    pub async fn increment_counter(&self, referrer_id: i64, column: &'static str) -> DatabaseResult<i64> {
        if !matches!(
            column,
            "click_count" | "registration_count" | "verified_count" | "completed_count"
        ) {
            return Err(DatabaseError::InvalidValue {
                field: "referrer counter",
                value: column.to_string(),
            });
        }
        let value: i64 = sqlx::query_scalar(&format!(
            "UPDATE referrers SET {column} = {column} + 1 WHERE id = ? RETURNING {column}"
        ))
        .bind(referrer_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(value)
    }

    // Referrals

    pub async fn create_referral(&self, referral: &NewReferral) -> DatabaseResult<Referral> {
        let now = timestamp::now();
        let result = sqlx::query(
            "INSERT INTO referrals (public_id, referrer_id, campaign_id, session_id, ip_address, user_agent, \
             landing_page, status, clicked_at, created_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(cuid2::cuid())
        .bind(referral.referrer_id)
        .bind(referral.campaign_id)
        .bind(&referral.session_id)
        .bind(&referral.ip_address)
        .bind(&referral.user_agent)
        .bind(&referral.landing_page)
        .bind(ReferralStatus::Clicked.as_str())
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        self.find_referral(id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("referral {id}")))
    }

    pub async fn find_referral(&self, id: i64) -> DatabaseResult<Option<Referral>> {
        let row = sqlx::query(&format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_referral).transpose()
    }

    pub async fn find_referral_by_public_id(&self, public_id: &str) -> DatabaseResult<Option<Referral>> {
        let row = sqlx::query(&format!("SELECT {REFERRAL_COLUMNS} FROM referrals WHERE public_id = ?"))
            .bind(public_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(map_referral).transpose()
    }

    pub async fn latest_referral_for_user(&self, user_id: i64) -> DatabaseResult<Option<Referral>> {
        let row = sqlx::query(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE user_id = ? ORDER BY clicked_at DESC, id DESC LIMIT 1"
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_referral).transpose()
    }

    /// Latest referral for a session; `unlinked_only` skips referrals already tied to a user.
    pub async fn latest_referral_for_session(
        &self,
        session_id: &str,
        unlinked_only: bool,
    ) -> DatabaseResult<Option<Referral>> {
        let filter = if unlinked_only { "AND user_id IS NULL" } else { "" };
        let row = sqlx::query(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE session_id = ? {filter} \
             ORDER BY clicked_at DESC, id DESC LIMIT 1"
        ))
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(map_referral).transpose()
    }

    pub async fn count_by_ip(&self, referrer_id: i64, ip_address: &str) -> DatabaseResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM referrals WHERE referrer_id = ? AND ip_address = ?",
        )
        .bind(referrer_id)
        .bind(ip_address)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    /// Advance a referral to `status`, stamping its date column and optionally linking a user.
    pub async fn update_status(
        &self,
        referral_id: i64,
        status: ReferralStatus,
        user_id: Option<i64>,
    ) -> DatabaseResult<()> {
        let column = status.date_column();
        sqlx::query(&format!(
            "UPDATE referrals SET status = ?, user_id = COALESCE(?, user_id), {column} = ? WHERE id = ?"
        ))
        .bind(status.as_str())
        .bind(user_id)
        .bind(timestamp::now())
        .bind(referral_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn recent_referrals(&self, referrer_id: i64, limit: i64) -> DatabaseResult<Vec<Referral>> {
        let rows = sqlx::query(&format!(
            "SELECT {REFERRAL_COLUMNS} FROM referrals WHERE referrer_id = ? ORDER BY created_at DESC, id DESC LIMIT ?"
        ))
        .bind(referrer_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(map_referral).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::referral::ReferrerTier;
    use crate::repos::test_support::test_pool;

    fn campaign() -> NewCampaign {
        NewCampaign {
            slug: "spring".into(),
            name: "Spring".into(),
            description: None,
            is_active: true,
            starts_at: "2020-01-01T00:00:00.000Z".into(),
            ends_at: "2099-01-01T00:00:00.000Z".into(),
            prize_tiers: None,
            settings: None,
        }
    }

    fn referrer(campaign_id: i64, code: &str) -> NewReferrer {
        NewReferrer {
            campaign_id,
            user_id: None,
            code: code.into(),
            name: code.to_lowercase(),
            email: None,
            phone: None,
            tier: ReferrerTier::Community,
        }
    }

    #[tokio::test]
    async fn leaderboard_orders_by_verified_then_completed_then_age() {
        let (pool, _dir) = test_pool().await;
        let repo = ReferralRepository::new(pool);
        let campaign = repo.create_campaign(&campaign()).await.unwrap();
        let first = repo.create_referrer(&referrer(campaign.id, "FIRST")).await.unwrap();
        let second = repo.create_referrer(&referrer(campaign.id, "SECOND")).await.unwrap();
        let third = repo.create_referrer(&referrer(campaign.id, "THIRD")).await.unwrap();

        repo.increment_counter(third.id, "verified_count").await.unwrap();
        assert_eq!(repo.increment_counter(second.id, "completed_count").await.unwrap(), 1);

        let board = repo.leaderboard(campaign.id, 10).await.unwrap();
        let codes: Vec<&str> = board.iter().map(|r| r.code.as_str()).collect();
        assert_eq!(codes, vec!["THIRD", "SECOND", "FIRST"]);
        assert_eq!(repo.count_ahead(campaign.id, first.verified_count).await.unwrap(), 1);

        let err = repo.increment_counter(first.id, "name").await.unwrap_err();
        assert!(matches!(err, DatabaseError::InvalidValue { .. }));
    }

    #[tokio::test]
    async fn duplicate_codes_are_rejected_and_prefix_lookup_finds_variants() {
        let (pool, _dir) = test_pool().await;
        let repo = ReferralRepository::new(pool);
        let campaign = repo.create_campaign(&campaign()).await.unwrap();
        repo.create_referrer(&referrer(campaign.id, "DANA")).await.unwrap();
        repo.create_referrer(&referrer(campaign.id, "DANA1")).await.unwrap();

        let err = repo.create_referrer(&referrer(campaign.id, "DANA")).await.unwrap_err();
        assert!(matches!(err, DatabaseError::Duplicate(_)));

        let mut codes = repo.codes_with_prefix("DANA").await.unwrap();
        codes.sort();
        assert_eq!(codes, vec!["DANA".to_string(), "DANA1".to_string()]);
        assert!(repo.code_exists("dana").await.unwrap());
    }

    #[tokio::test]
    async fn referral_status_update_links_user_and_stamps_date() {
        let (pool, _dir) = test_pool().await;
        let repo = ReferralRepository::new(pool);
        let campaign = repo.create_campaign(&campaign()).await.unwrap();
        let owner = repo.create_referrer(&referrer(campaign.id, "OWNER")).await.unwrap();
        let referral = repo
            .create_referral(&NewReferral {
                referrer_id: owner.id,
                campaign_id: campaign.id,
                session_id: Some("sess-1".into()),
                ip_address: Some("10.0.0.1".into()),
                ..NewReferral::default()
            })
            .await
            .unwrap();

        assert_eq!(repo.count_by_ip(owner.id, "10.0.0.1").await.unwrap(), 1);
        let by_session = repo.latest_referral_for_session("sess-1", true).await.unwrap().unwrap();
        assert_eq!(by_session.id, referral.id);

        repo.update_status(referral.id, ReferralStatus::Started, None).await.unwrap();
        let stored = repo.find_referral(referral.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ReferralStatus::Started);
        assert!(stored.started_at.is_some());

        let counts = repo.status_counts(campaign.id).await.unwrap();
        assert_eq!(counts, vec![(ReferralStatus::Started, 1)]);
        assert!(repo.find_running_campaign(&timestamp::now()).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn campaign_update_keeps_slug_and_reports_missing_rows() {
        let (pool, _dir) = test_pool().await;
        let repo = ReferralRepository::new(pool);
        let created = repo.create_campaign(&campaign()).await.unwrap();
        assert!(repo.campaign_slug_exists("spring").await.unwrap());
        assert!(!repo.campaign_slug_exists("autumn").await.unwrap());

        let edited = NewCampaign {
            slug: "ignored".into(),
            name: "Spring 2".into(),
            is_active: false,
            ..campaign()
        };
        let updated = repo.update_campaign(created.id, &edited).await.unwrap();
        assert_eq!(updated.slug, "spring");
        assert_eq!(updated.name, "Spring 2");
        assert!(!updated.is_active);

        let missing = repo.update_campaign(created.id + 100, &edited).await.unwrap_err();
        assert!(matches!(missing, DatabaseError::NotFound(_)));
    }
}
