//! Referral campaign entity definitions

use serde::{Deserialize, Serialize};

string_enum! {
    ReferrerTier("tier") {
        Ambassador => "AMBASSADOR",
        Community => "COMMUNITY",
    }
}

string_enum! {
    /// Funnel position of a referred visitor, in ascending order
    ReferralStatus("status") {
        Clicked => "CLICKED",
        Started => "STARTED",
        Registered => "REGISTERED",
        Verified => "VERIFIED",
        Completed => "COMPLETED",
    }
}

impl ReferralStatus {
    /// Position in the funnel; later stages never regress to earlier ones.
    pub fn rank(&self) -> u8 {
        match self {
            ReferralStatus::Clicked => 0,
            ReferralStatus::Started => 1,
            ReferralStatus::Registered => 2,
            ReferralStatus::Verified => 3,
            ReferralStatus::Completed => 4,
        }
    }

    /// Column holding the timestamp of reaching this stage.
    pub fn date_column(&self) -> &'static str {
        match self {
            ReferralStatus::Clicked => "clicked_at",
            ReferralStatus::Started => "started_at",
            ReferralStatus::Registered => "registered_at",
            ReferralStatus::Verified => "verified_at",
            ReferralStatus::Completed => "completed_at",
        }
    }

    /// Referrer counter bumped when a referral reaches this stage.
    pub fn counter_column(&self) -> Option<&'static str> {
        match self {
            ReferralStatus::Clicked | ReferralStatus::Started => None,
            ReferralStatus::Registered => Some("registration_count"),
            ReferralStatus::Verified => Some("verified_count"),
            ReferralStatus::Completed => Some("completed_count"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralCampaign {
    pub id: i64,
    pub public_id: String,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub starts_at: String,
    pub ends_at: String,
    /// Raw JSON array of prize tiers
    pub prize_tiers: Option<String>,
    /// Raw JSON object of campaign settings
    pub settings: Option<String>,
    pub created_at: String,
}

impl ReferralCampaign {
    pub fn is_running_at(&self, now: &str) -> bool {
        self.is_active && self.starts_at.as_str() <= now && self.ends_at.as_str() >= now
    }
}

#[derive(Debug, Clone)]
pub struct NewCampaign {
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub starts_at: String,
    pub ends_at: String,
    pub prize_tiers: Option<String>,
    pub settings: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referrer {
    pub id: i64,
    pub public_id: String,
    pub campaign_id: i64,
    pub user_id: Option<i64>,
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tier: ReferrerTier,
    pub click_count: i64,
    pub registration_count: i64,
    pub verified_count: i64,
    pub completed_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewReferrer {
    pub campaign_id: i64,
    pub user_id: Option<i64>,
    pub code: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub tier: ReferrerTier,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Referral {
    pub id: i64,
    pub public_id: String,
    pub referrer_id: i64,
    pub campaign_id: i64,
    pub user_id: Option<i64>,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub landing_page: Option<String>,
    pub status: ReferralStatus,
    pub clicked_at: String,
    pub started_at: Option<String>,
    pub registered_at: Option<String>,
    pub verified_at: Option<String>,
    pub completed_at: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Default)]
pub struct NewReferral {
    pub referrer_id: i64,
    pub campaign_id: i64,
    pub session_id: Option<String>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub landing_page: Option<String>,
}
