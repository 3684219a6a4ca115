//! Shared types for referral campaigns.

pub mod errors;

pub use errors::*;

use matchmaker_database::{Referral, ReferralCampaign, ReferrerTier};
use serde::{Deserialize, Serialize};

/// A reward unlocked at `threshold` verified referrals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrizeTier {
    pub threshold: i64,
    pub prize: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prize_value: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
}

/// Per-campaign switches. Missing keys fall back to the defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CampaignSettings {
    pub require_verification: bool,
    pub require_profile_complete: bool,
    #[serde(rename = "maxReferralsPerIP", alias = "maxReferralsPerIp")]
    pub max_referrals_per_ip: i64,
    pub allow_self_referral: bool,
}

impl Default for CampaignSettings {
    fn default() -> Self {
        Self {
            require_verification: true,
            require_profile_complete: false,
            max_referrals_per_ip: 5,
            allow_self_referral: false,
        }
    }
}

/// A new campaign. Dates are RFC 3339 timestamps.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignRequest {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub prize_tiers: Option<Vec<PrizeTier>>,
    pub settings: Option<CampaignSettings>,
}

/// Campaign edits; absent fields keep their value. The slug is fixed once created.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub prize_tiers: Option<Vec<PrizeTier>>,
    pub settings: Option<CampaignSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AwardedPrize {
    pub prize: String,
    pub prize_value: Option<f64>,
    pub threshold: i64,
    pub awarded_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NextPrize {
    pub threshold: i64,
    pub prize: String,
    pub remaining: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub code: String,
    pub name: String,
    pub tier: ReferrerTier,
    pub verified_count: i64,
    pub completed_count: i64,
    pub is_current_user: bool,
}

/// Funnel totals for an admin view of a campaign.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignStats {
    #[serde(flatten)]
    pub campaign: ReferralCampaign,
    pub total_referrers: i64,
    pub total_clicks: i64,
    pub total_registrations: i64,
    pub total_verified: i64,
    pub conversion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CampaignSummary {
    pub name: String,
    pub ends_at: String,
    pub days_remaining: i64,
}

/// What a referrer sees on their own dashboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferrerStats {
    pub code: String,
    pub name: String,
    pub tier: ReferrerTier,
    pub click_count: i64,
    pub registration_count: i64,
    pub verified_count: i64,
    pub completed_count: i64,
    pub rank: i64,
    pub next_prize: Option<NextPrize>,
    pub prizes_earned: Vec<AwardedPrize>,
    pub recent_referrals: Vec<Referral>,
    pub campaign: CampaignSummary,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterReferrer {
    pub campaign_slug: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub preferred_code: Option<String>,
    #[serde(default)]
    pub tier: Option<ReferrerTier>,
    #[serde(skip)]
    pub user_id: Option<i64>,
}

/// A visit through a referral link.
#[derive(Debug, Clone, Default)]
pub struct ClickContext {
    pub code: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub session_id: Option<String>,
    pub landing_page: Option<String>,
}

/// Result of a tracked click. No referral is recorded once the visitor's IP
/// reached the campaign cap, so there is no cookie to set either.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClickOutcome {
    pub referral_id: Option<String>,
    #[serde(skip)]
    pub cookie: Option<String>,
}

/// How to find the referral whose status should advance.
#[derive(Debug, Clone, Default)]
pub struct ReferralLookup {
    pub referral_id: Option<String>,
    pub user_id: Option<i64>,
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralProgress {
    pub referral_id: String,
    pub referrer_code: String,
    /// Set when this update made the referral verified.
    pub new_verified_count: Option<i64>,
}
