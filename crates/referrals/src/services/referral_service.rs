//! Referral campaigns: referrer signup, click tracking, funnel progress and the leaderboard.

use chrono::{DateTime, Utc};
use matchmaker_config::ReferralConfig;
use matchmaker_database::{
    timestamp, DatabaseError, NewCampaign, NewReferral, NewReferrer, Referral, ReferralCampaign, ReferralRepository,
    ReferralStatus, Referrer, ReferrerTier,
};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::types::{
    CampaignPatch, CampaignRequest, CampaignSettings, CampaignStats, CampaignSummary, ClickContext, ClickOutcome,
    LeaderboardEntry, PrizeTier, ReferralError, ReferralLookup, ReferralProgress, ReferralResult, ReferrerStats,
    RegisterReferrer,
};
use crate::utils::{
    calculate_earned_prizes, code_base, generate_referral_code, is_valid_code, next_prize, parse_campaign_settings,
    parse_prize_tiers, ReferralCookie,
};

const RECENT_REFERRALS: i64 = 10;
pub const DEFAULT_LEADERBOARD_SIZE: i64 = 10;

#[derive(Clone)]
pub struct ReferralService {
    referrals: ReferralRepository,
    cookie_max_age_days: i64,
}

impl ReferralService {
    pub fn new(pool: SqlitePool, config: &ReferralConfig) -> Self {
        Self {
            referrals: ReferralRepository::new(pool),
            cookie_max_age_days: config.cookie_max_age_days,
        }
    }

    /// The campaign named by `slug`, or the newest one running right now.
    pub async fn get_active_campaign(&self, slug: Option<&str>) -> ReferralResult<Option<ReferralCampaign>> {
        let campaign = match slug {
            Some(slug) => self.referrals.find_active_campaign_by_slug(slug).await?,
            None => self.referrals.find_running_campaign(&timestamp::now()).await?,
        };
        Ok(campaign)
    }

    /// Create a campaign. It is active from the start and the slug must be unused.
    pub async fn create_campaign(&self, request: CampaignRequest) -> ReferralResult<ReferralCampaign> {
        let slug = request.slug.trim().to_string();
        validate_slug(&slug)?;
        if self.referrals.campaign_slug_exists(&slug).await? {
            return Err(ReferralError::SlugTaken(slug));
        }

        let campaign = campaign_values(
            slug,
            request.name,
            request.description,
            true,
            &request.start_date,
            &request.end_date,
            request.prize_tiers.as_deref(),
            request.settings.as_ref(),
        )?;
        let created = self.referrals.create_campaign(&campaign).await.map_err(|err| match err {
            DatabaseError::Duplicate(_) => ReferralError::SlugTaken(campaign.slug.clone()),
            other => other.into(),
        })?;
        info!(campaign_id = created.id, slug = %created.slug, "referral campaign created");
        Ok(created)
    }

    /// Apply the fields present in `patch`; everything else keeps its stored value.
    pub async fn update_campaign(&self, campaign_id: i64, patch: CampaignPatch) -> ReferralResult<ReferralCampaign> {
        let current = self
            .referrals
            .find_campaign(campaign_id)
            .await?
            .ok_or_else(|| ReferralError::CampaignNotFound(campaign_id.to_string()))?;

        let prize_tiers = match patch.prize_tiers {
            Some(tiers) => tiers,
            None => parse_prize_tiers(current.prize_tiers.as_deref()),
        };
        let settings = match patch.settings {
            Some(settings) => settings,
            None => parse_campaign_settings(current.settings.as_deref()),
        };
        let campaign = campaign_values(
            current.slug,
            patch.name.unwrap_or(current.name),
            patch.description.or(current.description),
            patch.is_active.unwrap_or(current.is_active),
            patch.start_date.as_deref().unwrap_or(&current.starts_at),
            patch.end_date.as_deref().unwrap_or(&current.ends_at),
            Some(&prize_tiers),
            Some(&settings),
        )?;

        let updated = self.referrals.update_campaign(campaign_id, &campaign).await?;
        info!(campaign_id, "referral campaign updated");
        Ok(updated)
    }

    pub async fn campaign_with_stats(&self, campaign_id: i64) -> ReferralResult<CampaignStats> {
        let campaign = self
            .referrals
            .find_campaign(campaign_id)
            .await?
            .ok_or_else(|| ReferralError::CampaignNotFound(campaign_id.to_string()))?;

        let mut total_clicks = 0;
        let mut total_registrations = 0;
        let mut total_verified = 0;
        for (status, count) in self.referrals.status_counts(campaign.id).await? {
            total_clicks += count;
            if status.rank() >= ReferralStatus::Registered.rank() {
                total_registrations += count;
            }
            if status.rank() >= ReferralStatus::Verified.rank() {
                total_verified += count;
            }
        }
        let conversion_rate = if total_clicks > 0 {
            total_verified as f64 / total_clicks as f64 * 100.0
        } else {
            0.0
        };

        Ok(CampaignStats {
            total_referrers: self.referrals.count_referrers(campaign.id).await?,
            campaign,
            total_clicks,
            total_registrations,
            total_verified,
            conversion_rate,
        })
    }

    pub async fn create_referrer(&self, request: RegisterReferrer) -> ReferralResult<Referrer> {
        let name = request.name.trim();
        if name.is_empty() {
            return Err(ReferralError::Validation("name is required".to_string()));
        }

        let campaign = self
            .referrals
            .find_active_campaign_by_slug(&request.campaign_slug)
            .await?
            .ok_or_else(|| ReferralError::CampaignNotFound(request.campaign_slug.clone()))?;

        let code = match request.preferred_code.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
            Some(preferred) => {
                let code = preferred.to_uppercase();
                if !is_valid_code(&code) {
                    return Err(ReferralError::InvalidCodeFormat);
                }
                if self.referrals.code_exists(&code).await? {
                    return Err(ReferralError::CodeTaken(code));
                }
                code
            }
            None => {
                let taken = self.referrals.codes_with_prefix(&code_base(name)).await?;
                generate_referral_code(name, &taken)
            }
        };

        let draft = NewReferrer {
            campaign_id: campaign.id,
            user_id: request.user_id,
            code,
            name: name.to_string(),
            email: request.email,
            phone: request.phone,
            tier: request.tier.unwrap_or(ReferrerTier::Community),
        };
        let referrer = self.referrals.create_referrer(&draft).await.map_err(|err| match err {
            DatabaseError::Duplicate(_) => ReferralError::CodeTaken(draft.code.clone()),
            other => other.into(),
        })?;

        info!(referrer_id = referrer.id, code = %referrer.code, campaign = %campaign.slug, "referrer registered");
        Ok(referrer)
    }

    pub async fn referrer_stats(&self, code: &str) -> ReferralResult<ReferrerStats> {
        let referrer = self.referrer(code).await?;
        let campaign = self
            .referrals
            .find_campaign(referrer.campaign_id)
            .await?
            .ok_or_else(|| ReferralError::CampaignNotFound(referrer.campaign_id.to_string()))?;

        let rank = self.referrals.count_ahead(campaign.id, referrer.verified_count).await? + 1;
        let recent_referrals = self.referrals.recent_referrals(referrer.id, RECENT_REFERRALS).await?;
        let tiers = parse_prize_tiers(campaign.prize_tiers.as_deref());
        let now = Utc::now();

        Ok(ReferrerStats {
            next_prize: next_prize(referrer.verified_count, &tiers),
            prizes_earned: calculate_earned_prizes(referrer.verified_count, &tiers, &timestamp::format(now)),
            campaign: CampaignSummary {
                days_remaining: days_remaining(&campaign.ends_at, now),
                name: campaign.name,
                ends_at: campaign.ends_at,
            },
            code: referrer.code,
            name: referrer.name,
            tier: referrer.tier,
            click_count: referrer.click_count,
            registration_count: referrer.registration_count,
            verified_count: referrer.verified_count,
            completed_count: referrer.completed_count,
            rank,
            recent_referrals,
        })
    }

    /// Record a visit through a referral link and build the cookie that remembers it.
    pub async fn track_click(&self, click: ClickContext) -> ReferralResult<ClickOutcome> {
        let referrer = self
            .referrals
            .find_referrer_by_code(click.code.trim())
            .await?
            .ok_or_else(|| ReferralError::InvalidCode(click.code.clone()))?;
        let campaign = self
            .referrals
            .find_campaign(referrer.campaign_id)
            .await?
            .ok_or(ReferralError::CampaignInactive)?;
        let now = Utc::now();
        if !campaign.is_running_at(&timestamp::format(now)) {
            return Err(ReferralError::CampaignInactive);
        }

        let settings = parse_campaign_settings(campaign.settings.as_deref());
        if let Some(ip) = click.ip_address.as_deref().filter(|_| settings.max_referrals_per_ip > 0) {
            if self.referrals.count_by_ip(referrer.id, ip).await? >= settings.max_referrals_per_ip {
                debug!(code = %referrer.code, ip, "referral click over the per-IP cap");
                return Ok(ClickOutcome {
                    referral_id: None,
                    cookie: None,
                });
            }
        }

        let referral = self
            .referrals
            .create_referral(&NewReferral {
                referrer_id: referrer.id,
                campaign_id: campaign.id,
                session_id: click.session_id,
                ip_address: click.ip_address,
                user_agent: click.user_agent,
                landing_page: click.landing_page,
            })
            .await?;
        self.referrals.increment_counter(referrer.id, "click_count").await?;
        info!(code = %referrer.code, referral_id = %referral.public_id, "referral click tracked");

        let cookie = ReferralCookie::new(&referrer.code, &referral.public_id, self.cookie_max_age_days, now);
        Ok(ClickOutcome {
            referral_id: Some(referral.public_id),
            cookie: Some(cookie.encode()),
        })
    }

    /// Advance a referral along the funnel. Updates that would move it backwards are ignored.
    pub async fn update_referral_status(
        &self,
        lookup: ReferralLookup,
        status: ReferralStatus,
    ) -> ReferralResult<ReferralProgress> {
        let referral = self.locate(&lookup).await?.ok_or(ReferralError::NoReferral)?;
        let referrer = self
            .referrals
            .find_referrer(referral.referrer_id)
            .await?
            .ok_or(ReferralError::ReferralNotFound)?;

        if status.rank() <= referral.status.rank() {
            debug!(referral_id = %referral.public_id, current = %referral.status, requested = %status, "referral status unchanged");
            return Ok(ReferralProgress {
                referral_id: referral.public_id,
                referrer_code: referrer.code,
                new_verified_count: None,
            });
        }

        self.referrals.update_status(referral.id, status, lookup.user_id).await?;
        let mut new_verified_count = None;
        if let Some(column) = status.counter_column() {
            let value = self.referrals.increment_counter(referrer.id, column).await?;
            if status == ReferralStatus::Verified {
                new_verified_count = Some(value);
            }
        }
        info!(referral_id = %referral.public_id, code = %referrer.code, status = %status, "referral advanced");

        Ok(ReferralProgress {
            referral_id: referral.public_id,
            referrer_code: referrer.code,
            new_verified_count,
        })
    }

    /// Tie a freshly registered user to the referral they arrived through.
    pub async fn link_user_to_referral(
        &self,
        user_id: i64,
        referral_id: &str,
        session_id: Option<&str>,
    ) -> ReferralResult<Referral> {
        let referral = match self.referrals.find_referral_by_public_id(referral_id).await? {
            Some(referral) => Some(referral),
            None => match session_id {
                Some(session) => self.referrals.latest_referral_for_session(session, true).await?,
                None => None,
            },
        }
        .ok_or(ReferralError::ReferralNotFound)?;

        if referral.user_id.is_some_and(|owner| owner != user_id) {
            return Err(ReferralError::ReferralAlreadyUsed);
        }

        let referrer = self
            .referrals
            .find_referrer(referral.referrer_id)
            .await?
            .ok_or(ReferralError::ReferralNotFound)?;
        if referrer.user_id == Some(user_id) {
            let campaign = self.referrals.find_campaign(referral.campaign_id).await?;
            let settings = parse_campaign_settings(campaign.as_ref().and_then(|c| c.settings.as_deref()));
            if !settings.allow_self_referral {
                return Err(ReferralError::Validation("self referrals are not allowed".to_string()));
            }
        }

        if referral.status.rank() < ReferralStatus::Registered.rank() {
            self.referrals
                .update_status(referral.id, ReferralStatus::Registered, Some(user_id))
                .await?;
            self.referrals.increment_counter(referrer.id, "registration_count").await?;
            info!(referral_id = %referral.public_id, user_id, code = %referrer.code, "referral linked to user");
        }

        self.referrals
            .find_referral(referral.id)
            .await?
            .ok_or(ReferralError::ReferralNotFound)
    }

    /// Link a new user from the referral cookie value, if it is present and still valid.
    pub async fn link_from_cookie(&self, user_id: i64, cookie_value: &str) -> ReferralResult<Option<Referral>> {
        let Some(cookie) = ReferralCookie::parse(cookie_value, Utc::now()) else {
            debug!(user_id, "ignoring invalid or expired referral cookie");
            return Ok(None);
        };
        self.link_user_to_referral(user_id, &cookie.referral_id, None).await.map(Some)
    }

    pub async fn leaderboard(
        &self,
        campaign_id: i64,
        limit: Option<i64>,
        current_code: Option<&str>,
    ) -> ReferralResult<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LEADERBOARD_SIZE).clamp(1, 100);
        let current = current_code.map(str::to_uppercase);
        let board = self.referrals.leaderboard(campaign_id, limit).await?;
        Ok(board
            .into_iter()
            .enumerate()
            .map(|(index, referrer)| LeaderboardEntry {
                rank: index + 1,
                is_current_user: current.as_deref() == Some(referrer.code.as_str()),
                code: referrer.code,
                name: referrer.name,
                tier: referrer.tier,
                verified_count: referrer.verified_count,
                completed_count: referrer.completed_count,
            })
            .collect())
    }

    async fn referrer(&self, code: &str) -> ReferralResult<Referrer> {
        self.referrals
            .find_referrer_by_code(code.trim())
            .await?
            .ok_or_else(|| ReferralError::InvalidCode(code.to_string()))
    }

    /// The first identifier present decides the lookup; later ones are not tried.
    async fn locate(&self, lookup: &ReferralLookup) -> ReferralResult<Option<Referral>> {
        let referral = if let Some(id) = lookup.referral_id.as_deref() {
            self.referrals.find_referral_by_public_id(id).await?
        } else if let Some(user_id) = lookup.user_id {
            self.referrals.latest_referral_for_user(user_id).await?
        } else if let Some(session) = lookup.session_id.as_deref() {
            self.referrals.latest_referral_for_session(session, false).await?
        } else {
            None
        };
        Ok(referral)
    }
}

/// Whole days until `ends_at`, rounded up and never negative.
fn days_remaining(ends_at: &str, now: DateTime<Utc>) -> i64 {
    timestamp::parse(ends_at)
        .map(|end| {
            let seconds = (end - now).num_seconds().max(0);
            (seconds + 86_399) / 86_400
        })
        .unwrap_or(0)
}

fn validate_slug(slug: &str) -> ReferralResult<()> {
    let valid_chars = slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if !(2..=50).contains(&slug.len()) || !valid_chars {
        return Err(ReferralError::Validation(
            "Slug must be 2-50 lowercase letters, digits or hyphens".to_string(),
        ));
    }
    Ok(())
}

/// Validated column values for a campaign row.
#[allow(clippy::too_many_arguments)]
fn campaign_values(
    slug: String,
    name: String,
    description: Option<String>,
    is_active: bool,
    start_date: &str,
    end_date: &str,
    prize_tiers: Option<&[PrizeTier]>,
    settings: Option<&CampaignSettings>,
) -> ReferralResult<NewCampaign> {
    let name = name.trim().to_string();
    if !(2..=100).contains(&name.chars().count()) {
        return Err(ReferralError::Validation("Campaign name must be 2-100 characters".to_string()));
    }

    let starts = timestamp::parse(start_date)
        .ok_or_else(|| ReferralError::Validation(format!("Invalid start date: {start_date}")))?;
    let ends = timestamp::parse(end_date)
        .ok_or_else(|| ReferralError::Validation(format!("Invalid end date: {end_date}")))?;
    if ends <= starts {
        return Err(ReferralError::Validation("Campaign must end after it starts".to_string()));
    }

    if prize_tiers.unwrap_or_default().iter().any(|tier| tier.threshold < 1) {
        return Err(ReferralError::Validation("Prize thresholds start at 1".to_string()));
    }
    if settings.is_some_and(|s| s.max_referrals_per_ip < 0) {
        return Err(ReferralError::Validation("maxReferralsPerIP cannot be negative".to_string()));
    }

    let to_json = |value: serde_json::Result<String>| value.map_err(|err| ReferralError::Validation(err.to_string()));
    Ok(NewCampaign {
        slug,
        name,
        description: description.filter(|d| !d.trim().is_empty()),
        is_active,
        starts_at: timestamp::format(starts),
        ends_at: timestamp::format(ends),
        prize_tiers: prize_tiers.map(|tiers| to_json(serde_json::to_string(tiers))).transpose()?,
        settings: settings.map(|s| to_json(serde_json::to_string(s))).transpose()?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn days_remaining_rounds_up() {
        let now = Utc.with_ymd_and_hms(2024, 12, 1, 12, 0, 0).unwrap();
        assert_eq!(days_remaining("2024-12-03T00:00:00.000Z", now), 2);
        assert_eq!(days_remaining("2024-12-01T12:00:00.000Z", now), 0);
        assert_eq!(days_remaining("2024-11-01T00:00:00.000Z", now), 0);
        assert_eq!(days_remaining("soon", now), 0);
    }
}
