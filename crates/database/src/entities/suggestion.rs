//! Match suggestion entity definitions

use serde::{Deserialize, Serialize};

string_enum! {
    /// Lifecycle status of a match suggestion
    SuggestionStatus("status") {
        Draft => "DRAFT",
        PendingFirstParty => "PENDING_FIRST_PARTY",
        FirstPartyApproved => "FIRST_PARTY_APPROVED",
        FirstPartyDeclined => "FIRST_PARTY_DECLINED",
        FirstPartyInterested => "FIRST_PARTY_INTERESTED",
        PendingSecondParty => "PENDING_SECOND_PARTY",
        SecondPartyApproved => "SECOND_PARTY_APPROVED",
        SecondPartyDeclined => "SECOND_PARTY_DECLINED",
        AwaitingMatchmakerApproval => "AWAITING_MATCHMAKER_APPROVAL",
        ContactDetailsShared => "CONTACT_DETAILS_SHARED",
        AwaitingFirstDateFeedback => "AWAITING_FIRST_DATE_FEEDBACK",
        ThinkingAfterDate => "THINKING_AFTER_DATE",
        ProceedingToSecondDate => "PROCEEDING_TO_SECOND_DATE",
        EndedAfterFirstDate => "ENDED_AFTER_FIRST_DATE",
        MeetingPending => "MEETING_PENDING",
        MeetingScheduled => "MEETING_SCHEDULED",
        MatchApproved => "MATCH_APPROVED",
        MatchDeclined => "MATCH_DECLINED",
        Dating => "DATING",
        Engaged => "ENGAGED",
        Married => "MARRIED",
        Expired => "EXPIRED",
        Closed => "CLOSED",
        Cancelled => "CANCELLED",
    }
}

string_enum! {
    SuggestionPriority("priority") {
        Low => "LOW",
        Medium => "MEDIUM",
        High => "HIGH",
        Urgent => "URGENT",
    }
}

impl SuggestionStatus {
    /// Statuses in which a candidate counts as actively engaged in a process.
    pub const ACTIVE: &'static [SuggestionStatus] = &[
        SuggestionStatus::FirstPartyApproved,
        SuggestionStatus::SecondPartyApproved,
        SuggestionStatus::AwaitingMatchmakerApproval,
        SuggestionStatus::ContactDetailsShared,
        SuggestionStatus::AwaitingFirstDateFeedback,
        SuggestionStatus::ThinkingAfterDate,
        SuggestionStatus::ProceedingToSecondDate,
        SuggestionStatus::MeetingPending,
        SuggestionStatus::MeetingScheduled,
        SuggestionStatus::MatchApproved,
        SuggestionStatus::Dating,
        SuggestionStatus::Engaged,
    ];

    /// Statuses that prevent creating a new suggestion for either party.
    pub const BLOCKING: &'static [SuggestionStatus] = &[
        SuggestionStatus::FirstPartyApproved,
        SuggestionStatus::SecondPartyApproved,
        SuggestionStatus::AwaitingMatchmakerApproval,
        SuggestionStatus::ContactDetailsShared,
        SuggestionStatus::AwaitingFirstDateFeedback,
        SuggestionStatus::ThinkingAfterDate,
        SuggestionStatus::ProceedingToSecondDate,
        SuggestionStatus::MeetingPending,
        SuggestionStatus::MeetingScheduled,
        SuggestionStatus::MatchApproved,
        SuggestionStatus::Dating,
    ];

    /// Waiting on a candidate's answer.
    pub const PENDING: &'static [SuggestionStatus] = &[
        SuggestionStatus::PendingFirstParty,
        SuggestionStatus::PendingSecondParty,
    ];

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SuggestionStatus::Married
                | SuggestionStatus::Expired
                | SuggestionStatus::Closed
                | SuggestionStatus::Cancelled
        )
    }
}

impl Default for SuggestionPriority {
    fn default() -> Self {
        SuggestionPriority::Medium
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSuggestion {
    pub id: i64,
    pub public_id: String,
    pub matchmaker_id: i64,
    pub first_party_id: i64,
    pub second_party_id: i64,
    pub status: SuggestionStatus,
    pub previous_status: Option<SuggestionStatus>,
    pub priority: SuggestionPriority,
    pub matching_reason: Option<String>,
    pub first_party_notes: Option<String>,
    pub second_party_notes: Option<String>,
    pub internal_notes: Option<String>,
    pub follow_up_notes: Option<String>,
    pub decision_deadline: Option<String>,
    pub response_deadline: Option<String>,
    pub first_party_sent: Option<String>,
    pub first_party_responded: Option<String>,
    pub second_party_sent: Option<String>,
    pub second_party_responded: Option<String>,
    pub first_meeting_scheduled: Option<String>,
    pub closed_at: Option<String>,
    pub last_status_change: Option<String>,
    pub last_activity: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl MatchSuggestion {
    pub fn involves(&self, user_id: i64) -> bool {
        self.first_party_id == user_id || self.second_party_id == user_id
    }
}

/// Values for inserting a suggestion row
#[derive(Debug, Clone)]
pub struct NewSuggestion {
    pub matchmaker_id: i64,
    pub first_party_id: i64,
    pub second_party_id: i64,
    pub status: SuggestionStatus,
    pub priority: SuggestionPriority,
    pub matching_reason: Option<String>,
    pub first_party_notes: Option<String>,
    pub second_party_notes: Option<String>,
    pub internal_notes: Option<String>,
    pub follow_up_notes: Option<String>,
    pub decision_deadline: Option<String>,
}

/// Partial update of suggestion details. `None` leaves a column untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionPatch {
    pub matching_reason: Option<String>,
    pub first_party_notes: Option<String>,
    pub second_party_notes: Option<String>,
    pub internal_notes: Option<String>,
    pub follow_up_notes: Option<String>,
    pub priority: Option<SuggestionPriority>,
    pub decision_deadline: Option<String>,
    pub response_deadline: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub id: i64,
    pub suggestion_id: i64,
    pub status: SuggestionStatus,
    pub previous_status: Option<SuggestionStatus>,
    pub notes: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: i64,
    pub public_id: String,
    pub suggestion_id: i64,
    pub scheduled_date: String,
    pub location: Option<String>,
    pub status: String,
    pub created_at: String,
}
