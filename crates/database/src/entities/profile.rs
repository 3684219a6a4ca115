//! Candidate profile entity definitions

use serde::{Deserialize, Serialize};

string_enum! {
    Gender("gender") {
        Male => "MALE",
        Female => "FEMALE",
    }
}

string_enum! {
    /// Dating availability as tracked by the matchmaker
    AvailabilityStatus("availability_status") {
        Available => "AVAILABLE",
        Unavailable => "UNAVAILABLE",
        Dating => "DATING",
        Paused => "PAUSED",
        Engaged => "ENGAGED",
        Married => "MARRIED",
    }
}

string_enum! {
    PriorityCategory("priority_category") {
        Critical => "CRITICAL",
        High => "HIGH",
        Medium => "MEDIUM",
        Low => "LOW",
    }
}

string_enum! {
    ReadinessLevel("readiness_level") {
        VeryReady => "VERY_READY",
        Ready => "READY",
        SomewhatReady => "SOMEWHAT_READY",
        Uncertain => "UNCERTAIN",
        NotReady => "NOT_READY",
    }
}

impl Gender {
    pub fn opposite(&self) -> Gender {
        match self {
            Gender::Male => Gender::Female,
            Gender::Female => Gender::Male,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub id: i64,
    pub user_id: i64,
    pub gender: Option<Gender>,
    /// `YYYY-MM-DD`
    pub birth_date: Option<String>,
    pub religious_level: Option<String>,
    pub city: Option<String>,
    pub occupation: Option<String>,
    pub education: Option<String>,
    pub about: Option<String>,
    pub height: Option<i64>,
    pub marital_status: Option<String>,
    pub origin: Option<String>,
    pub service_type: Option<String>,
    pub character_traits: Vec<String>,
    pub hobbies: Vec<String>,
    pub preferred_age_min: Option<i64>,
    pub preferred_age_max: Option<i64>,
    pub preferred_religious_levels: Vec<String>,
    pub matching_notes: Option<String>,
    /// JSON document `{personalitySummary, lookingForSummary}`
    pub ai_summary: Option<String>,
    pub readiness_level: Option<ReadinessLevel>,
    pub is_profile_visible: bool,
    pub availability_status: Option<AvailabilityStatus>,
    pub availability_note: Option<String>,
    pub availability_updated_at: Option<String>,
    pub priority_score: Option<i64>,
    pub priority_category: Option<PriorityCategory>,
    pub priority_updated_at: Option<String>,
    pub completeness_score: Option<i64>,
    pub difficulty_score: Option<i64>,
    pub acceptance_rate: Option<f64>,
    pub average_response_hours: Option<f64>,
    pub last_suggested_at: Option<String>,
    pub last_active_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Values for inserting a profile row
#[derive(Debug, Clone)]
pub struct ProfileDraft {
    pub gender: Option<Gender>,
    pub birth_date: Option<String>,
    pub religious_level: Option<String>,
    pub city: Option<String>,
    pub occupation: Option<String>,
    pub education: Option<String>,
    pub about: Option<String>,
    pub height: Option<i64>,
    pub marital_status: Option<String>,
    pub origin: Option<String>,
    pub service_type: Option<String>,
    pub character_traits: Vec<String>,
    pub hobbies: Vec<String>,
    pub preferred_age_min: Option<i64>,
    pub preferred_age_max: Option<i64>,
    pub preferred_religious_levels: Vec<String>,
    pub matching_notes: Option<String>,
    pub ai_summary: Option<String>,
    pub readiness_level: Option<ReadinessLevel>,
    pub is_profile_visible: bool,
    pub availability_status: Option<AvailabilityStatus>,
}

impl Default for ProfileDraft {
    fn default() -> Self {
        Self {
            gender: None,
            birth_date: None,
            religious_level: None,
            city: None,
            occupation: None,
            education: None,
            about: None,
            height: None,
            marital_status: None,
            origin: None,
            service_type: None,
            character_traits: Vec::new(),
            hobbies: Vec::new(),
            preferred_age_min: None,
            preferred_age_max: None,
            preferred_religious_levels: Vec::new(),
            matching_notes: None,
            ai_summary: None,
            readiness_level: None,
            is_profile_visible: true,
            availability_status: Some(AvailabilityStatus::Available),
        }
    }
}

/// Filter used to pull match candidates for a target user.
///
/// Birth dates are compared as `YYYY-MM-DD` text, both bounds inclusive.
#[derive(Debug, Clone)]
pub struct CandidateQuery {
    pub exclude_user_id: i64,
    pub gender: Gender,
    pub born_on_or_after: String,
    pub born_on_or_before: String,
    /// `None` accepts every religious level.
    pub religious_levels: Option<Vec<String>>,
    pub limit: i64,
}
