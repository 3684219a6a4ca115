//! Availability inquiries sent by matchmakers to candidates

use serde::{Deserialize, Serialize};

/// Minimal view of a party attached to an inquiry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InquiryParty {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub availability_status: Option<String>,
    pub availability_note: Option<String>,
    pub availability_updated_at: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityInquiry {
    pub id: i64,
    pub public_id: String,
    pub matchmaker_id: i64,
    pub first_party_id: i64,
    pub second_party_id: i64,
    pub first_party_response: Option<bool>,
    pub second_party_response: Option<bool>,
    pub note: Option<String>,
    pub expires_at: String,
    pub created_at: String,
    pub updated_at: String,
}

impl AvailabilityInquiry {
    pub fn is_expired_at(&self, now: &str) -> bool {
        self.expires_at.as_str() < now
    }

    pub fn is_party(&self, user_id: i64) -> bool {
        self.first_party_id == user_id || self.second_party_id == user_id
    }
}

/// Listing filter for inquiries involving a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InquiryFilter {
    /// Not expired and at least one response missing
    #[default]
    Pending,
    /// Both responses recorded
    Completed,
    Expired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InquiryOrder {
    #[default]
    CreatedAt,
    UpdatedAt,
}

impl InquiryOrder {
    pub fn column(&self) -> &'static str {
        match self {
            InquiryOrder::CreatedAt => "created_at",
            InquiryOrder::UpdatedAt => "updated_at",
        }
    }
}

/// Availability breakdown of the candidates a matchmaker has inquired about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AvailabilityStats {
    pub available: i64,
    pub unavailable: i64,
    pub dating: i64,
    pub pending: i64,
}
