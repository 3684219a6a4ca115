//! The suggestion status state machine and the presentation helpers built on it.

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use matchmaker_database::{timestamp, AvailabilityStatus, MatchSuggestion, SuggestionStatus};
use matchmaker_notifications::Locale;
use serde::Serialize;

use crate::types::{SuggestionError, SuggestionResult};

/// Statuses reachable from `from`. Terminal statuses have none.
pub fn allowed_transitions(from: SuggestionStatus) -> &'static [SuggestionStatus] {
    use SuggestionStatus::*;

    match from {
        Draft => &[PendingFirstParty],
        PendingFirstParty => &[FirstPartyApproved, FirstPartyDeclined, FirstPartyInterested, Cancelled],
        FirstPartyInterested => &[PendingFirstParty, FirstPartyApproved, FirstPartyDeclined, Cancelled],
        FirstPartyApproved => &[PendingSecondParty, Cancelled],
        FirstPartyDeclined => &[Closed],
        PendingSecondParty => &[SecondPartyApproved, SecondPartyDeclined, Cancelled],
        SecondPartyApproved => &[ContactDetailsShared, Cancelled],
        SecondPartyDeclined => &[Closed],
        AwaitingMatchmakerApproval => &[ContactDetailsShared, Cancelled],
        ContactDetailsShared => &[AwaitingFirstDateFeedback, Cancelled],
        AwaitingFirstDateFeedback => &[ThinkingAfterDate, EndedAfterFirstDate, Cancelled],
        ThinkingAfterDate => &[ProceedingToSecondDate, EndedAfterFirstDate, Cancelled],
        ProceedingToSecondDate => &[Dating, Cancelled],
        EndedAfterFirstDate => &[Closed],
        MeetingPending => &[MeetingScheduled, Cancelled],
        MeetingScheduled => &[Dating, Cancelled],
        MatchApproved => &[Dating, Cancelled],
        MatchDeclined => &[Closed],
        Dating => &[Engaged, Closed, Cancelled],
        Engaged => &[Married, Cancelled],
        Married | Expired | Closed | Cancelled => &[],
    }
}

pub fn can_transition(from: SuggestionStatus, to: SuggestionStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

pub fn validate_transition(from: SuggestionStatus, to: SuggestionStatus) -> SuggestionResult<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(SuggestionError::InvalidTransition { from, to })
    }
}

/// Lifecycle column stamped when a suggestion enters `status`.
pub fn stamp_column(status: SuggestionStatus) -> Option<&'static str> {
    match status {
        SuggestionStatus::FirstPartyApproved => Some("first_party_responded"),
        SuggestionStatus::PendingSecondParty => Some("second_party_sent"),
        SuggestionStatus::SecondPartyApproved => Some("second_party_responded"),
        SuggestionStatus::ContactDetailsShared => Some("closed_at"),
        SuggestionStatus::MeetingScheduled => Some("first_meeting_scheduled"),
        _ => None,
    }
}

/// Status the system moves to on its own right after a party answers.
pub fn secondary_transition(status: SuggestionStatus) -> Option<SuggestionStatus> {
    match status {
        SuggestionStatus::FirstPartyApproved => Some(SuggestionStatus::PendingSecondParty),
        SuggestionStatus::SecondPartyApproved => Some(SuggestionStatus::ContactDetailsShared),
        SuggestionStatus::FirstPartyDeclined | SuggestionStatus::SecondPartyDeclined => {
            Some(SuggestionStatus::Closed)
        }
        _ => None,
    }
}

/// Availability both parties take on when a suggestion enters `status`.
pub fn availability_effect(status: SuggestionStatus, today: NaiveDate) -> Option<(AvailabilityStatus, String)> {
    match status {
        SuggestionStatus::Engaged | SuggestionStatus::Married => {
            let availability = if status == SuggestionStatus::Engaged {
                AvailabilityStatus::Engaged
            } else {
                AvailabilityStatus::Married
            };
            Some((availability, format!("Status changed to {status} on {}", today.format("%Y-%m-%d"))))
        }
        SuggestionStatus::Dating => Some((AvailabilityStatus::Dating, "Currently in a dating process".to_string())),
        _ => None,
    }
}

pub fn status_label(status: SuggestionStatus, locale: Locale) -> &'static str {
    use SuggestionStatus::*;

    match locale {
        Locale::He => match status {
            Draft => "טיוטה",
            PendingFirstParty => "ממתין לתשובת הצד הראשון",
            FirstPartyApproved => "הצד הראשון אישר",
            FirstPartyDeclined => "הצד הראשון דחה",
            FirstPartyInterested => "הצד הראשון מעוניין בהמשך",
            PendingSecondParty => "ממתין לתשובת הצד השני",
            SecondPartyApproved => "הצד השני אישר",
            SecondPartyDeclined => "הצד השני דחה",
            AwaitingMatchmakerApproval => "ממתין לאישור השדכן",
            ContactDetailsShared => "פרטי קשר שותפו",
            AwaitingFirstDateFeedback => "ממתין למשוב פגישה ראשונה",
            ThinkingAfterDate => "בחשיבה לאחר הפגישה",
            ProceedingToSecondDate => "התקדמות לפגישה שנייה",
            EndedAfterFirstDate => "הסתיים לאחר פגישה ראשונה",
            MeetingPending => "פגישה בהמתנה",
            MeetingScheduled => "פגישה נקבעה",
            MatchApproved => "השידוך אושר",
            MatchDeclined => "השידוך נדחה",
            Dating => "בתהליך היכרות",
            Engaged => "אירוסין",
            Married => "נישואין",
            Expired => "פג תוקף",
            Closed => "נסגר",
            Cancelled => "בוטל",
        },
        Locale::En => match status {
            Draft => "Draft",
            PendingFirstParty => "Waiting for the first party",
            FirstPartyApproved => "First party approved",
            FirstPartyDeclined => "First party declined",
            FirstPartyInterested => "First party interested",
            PendingSecondParty => "Waiting for the second party",
            SecondPartyApproved => "Second party approved",
            SecondPartyDeclined => "Second party declined",
            AwaitingMatchmakerApproval => "Awaiting matchmaker approval",
            ContactDetailsShared => "Contact details shared",
            AwaitingFirstDateFeedback => "Awaiting first date feedback",
            ThinkingAfterDate => "Thinking after the date",
            ProceedingToSecondDate => "Proceeding to a second date",
            EndedAfterFirstDate => "Ended after the first date",
            MeetingPending => "Meeting pending",
            MeetingScheduled => "Meeting scheduled",
            MatchApproved => "Match approved",
            MatchDeclined => "Match declined",
            Dating => "Dating",
            Engaged => "Engaged",
            Married => "Married",
            Expired => "Expired",
            Closed => "Closed",
            Cancelled => "Cancelled",
        },
    }
}

/// How far along the process a status is, in percent.
pub fn progress(status: SuggestionStatus) -> u8 {
    use SuggestionStatus::*;

    match status {
        Draft => 10,
        PendingFirstParty => 25,
        FirstPartyInterested => 30,
        FirstPartyApproved => 40,
        PendingSecondParty => 50,
        SecondPartyApproved | MatchApproved => 60,
        AwaitingMatchmakerApproval => 65,
        ContactDetailsShared => 70,
        MeetingPending => 72,
        MeetingScheduled => 74,
        AwaitingFirstDateFeedback => 75,
        ThinkingAfterDate => 77,
        ProceedingToSecondDate => 78,
        Dating => 80,
        Engaged => 95,
        Married | Expired | FirstPartyDeclined | SecondPartyDeclined => 100,
        MatchDeclined | EndedAfterFirstDate | Closed | Cancelled => 0,
    }
}

/// How a user relates to a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SuggestionRole {
    FirstParty,
    SecondParty,
    Matchmaker,
}

impl SuggestionRole {
    /// Parties take precedence over the matchmaker role.
    pub fn of(suggestion: &MatchSuggestion, user_id: i64) -> Option<Self> {
        if suggestion.first_party_id == user_id {
            Some(SuggestionRole::FirstParty)
        } else if suggestion.second_party_id == user_id {
            Some(SuggestionRole::SecondParty)
        } else if suggestion.matchmaker_id == user_id {
            Some(SuggestionRole::Matchmaker)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusAction {
    pub id: &'static str,
    pub label: &'static str,
    pub next_status: SuggestionStatus,
}

fn action(id: &'static str, he: &'static str, en: &'static str, next: SuggestionStatus, locale: Locale) -> StatusAction {
    StatusAction {
        id,
        label: match locale {
            Locale::He => he,
            Locale::En => en,
        },
        next_status: next,
    }
}

/// Actions offered to `role` while a suggestion sits in `status`.
pub fn available_actions(status: SuggestionStatus, role: SuggestionRole, locale: Locale) -> Vec<StatusAction> {
    use SuggestionRole::*;
    use SuggestionStatus::*;

    let cancel = || action("cancel", "ביטול ההצעה", "Cancel suggestion", Cancelled, locale);
    let close = || action("close", "סגירת הצעה", "Close suggestion", Closed, locale);
    let mark_dating = || action("mark-dating", "סימון כבתהליך היכרות", "Mark as dating", Dating, locale);
    let mark_ended = || {
        action(
            "mark-ended-first",
            "סימון כהסתיים לאחר פגישה",
            "Mark as ended after first date",
            EndedAfterFirstDate,
            locale,
        )
    };

    match (status, role) {
        (Draft, Matchmaker) => vec![action(
            "send-to-first",
            "שליחה לצד הראשון",
            "Send to first party",
            PendingFirstParty,
            locale,
        )],
        (PendingFirstParty, FirstParty) => vec![
            action("approve", "אישור ההצעה", "Approve", FirstPartyApproved, locale),
            action("decline", "דחיית ההצעה", "Decline", FirstPartyDeclined, locale),
            action("interested", "שמירה להמשך", "Save for later", FirstPartyInterested, locale),
        ],
        (FirstPartyInterested, FirstParty) => vec![
            action("approve", "אישור ההצעה", "Approve", FirstPartyApproved, locale),
            action("decline", "דחיית ההצעה", "Decline", FirstPartyDeclined, locale),
        ],
        (PendingFirstParty | FirstPartyInterested | PendingSecondParty, Matchmaker) => vec![cancel()],
        (FirstPartyApproved, Matchmaker) => vec![
            action(
                "send-to-second",
                "שליחה לצד השני",
                "Send to second party",
                PendingSecondParty,
                locale,
            ),
            cancel(),
        ],
        (PendingSecondParty, SecondParty) => vec![
            action("approve", "אישור ההצעה", "Approve", SecondPartyApproved, locale),
            action("decline", "דחיית ההצעה", "Decline", SecondPartyDeclined, locale),
        ],
        (SecondPartyApproved, Matchmaker) => vec![
            action(
                "share-contacts",
                "שיתוף פרטי קשר",
                "Share contact details",
                ContactDetailsShared,
                locale,
            ),
            cancel(),
        ],
        (AwaitingMatchmakerApproval, Matchmaker) => vec![
            action(
                "approve-share",
                "אישור שיתוף פרטים",
                "Approve sharing details",
                ContactDetailsShared,
                locale,
            ),
            cancel(),
        ],
        (ContactDetailsShared, FirstParty | SecondParty) => vec![action(
            "provide-feedback",
            "דיווח משוב לאחר פגישה",
            "Give feedback after the date",
            AwaitingFirstDateFeedback,
            locale,
        )],
        (ContactDetailsShared, Matchmaker) => vec![
            action(
                "request-feedback",
                "בקשת משוב",
                "Request feedback",
                AwaitingFirstDateFeedback,
                locale,
            ),
            cancel(),
        ],
        (AwaitingFirstDateFeedback, Matchmaker) => vec![
            action(
                "mark-thinking",
                "סימון כבחשיבה",
                "Mark as thinking",
                ThinkingAfterDate,
                locale,
            ),
            mark_ended(),
            cancel(),
        ],
        (ThinkingAfterDate, Matchmaker) => vec![
            action(
                "proceed-second",
                "המשך לפגישה שנייה",
                "Proceed to a second date",
                ProceedingToSecondDate,
                locale,
            ),
            mark_ended(),
            cancel(),
        ],
        (ProceedingToSecondDate | MeetingScheduled | MatchApproved, Matchmaker) => vec![mark_dating(), cancel()],
        (MeetingPending, Matchmaker) => vec![
            action(
                "schedule-meeting",
                "קביעת פגישה",
                "Schedule meeting",
                MeetingScheduled,
                locale,
            ),
            cancel(),
        ],
        (FirstPartyDeclined | SecondPartyDeclined | EndedAfterFirstDate | MatchDeclined, Matchmaker) => {
            vec![close()]
        }
        (Dating, Matchmaker) => vec![
            action("mark-engaged", "עדכון אירוסין", "Mark as engaged", Engaged, locale),
            close(),
            cancel(),
        ],
        (Engaged, Matchmaker) => vec![
            action("mark-married", "עדכון נישואין", "Mark as married", Married, locale),
            cancel(),
        ],
        _ => Vec::new(),
    }
}

/// Whole days until `deadline`, rounded up and never negative.
pub fn days_left(deadline: &str, now: DateTime<Utc>) -> Option<i64> {
    let deadline = timestamp::parse(deadline).or_else(|| {
        timestamp::parse_date(deadline)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc())
    })?;
    let millis = (deadline - now).num_milliseconds();
    let day = 24 * 60 * 60 * 1000;
    let days = if millis > 0 { (millis + day - 1) / day } else { 0 };
    Some(days)
}

/// Age in whole years on `today`, counting a birthday only once it has passed.
pub fn calculate_age(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}
