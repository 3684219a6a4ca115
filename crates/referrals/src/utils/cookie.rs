//! The referral cookie: base64 encoded JSON naming the referral a visitor came through.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use matchmaker_database::timestamp;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReferralCookie {
    pub code: String,
    pub referral_id: String,
    pub clicked_at: String,
    pub expires_at: String,
}

impl ReferralCookie {
    pub fn new(code: impl Into<String>, referral_id: impl Into<String>, max_age_days: i64, now: DateTime<Utc>) -> Self {
        Self {
            code: code.into(),
            referral_id: referral_id.into(),
            clicked_at: timestamp::format(now),
            expires_at: timestamp::format(now + Duration::days(max_age_days)),
        }
    }

    pub fn encode(&self) -> String {
        // Serializing a struct of strings cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        STANDARD.encode(json)
    }

    /// `None` for values that do not decode or have expired.
    pub fn parse(value: &str, now: DateTime<Utc>) -> Option<Self> {
        let bytes = STANDARD.decode(value.trim()).ok()?;
        let cookie: ReferralCookie = serde_json::from_slice(&bytes).ok()?;
        let expires_at = timestamp::parse(&cookie.expires_at)?;
        (expires_at > now).then_some(cookie)
    }
}
