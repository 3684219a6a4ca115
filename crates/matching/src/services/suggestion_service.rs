//! Match suggestions: creation, editing and the status lifecycle.

use chrono::{DateTime, Utc};
use matchmaker_database::{
    MatchSuggestion, Meeting, NewSuggestion, ProfileRepository, StatusHistoryEntry, SuggestionPatch,
    SuggestionPriority, SuggestionRepository, SuggestionStatus, User, UserRepository, UserRole,
};
use matchmaker_notifications::{Locale, NotificationDispatcher, Recipient, SuggestionNotice};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::types::{Actor, SuggestionError, SuggestionResult};
use crate::utils::{
    availability_effect, available_actions, days_left, progress, secondary_transition, stamp_column, status_label,
    validate_transition, StatusAction, SuggestionRole,
};

const INITIAL_HISTORY_NOTE: &str = "Initial suggestion created and sent to first party";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSuggestion {
    pub first_party_id: i64,
    pub second_party_id: i64,
    #[serde(default)]
    pub priority: Option<SuggestionPriority>,
    #[serde(default)]
    pub matching_reason: Option<String>,
    #[serde(default)]
    pub first_party_notes: Option<String>,
    #[serde(default)]
    pub second_party_notes: Option<String>,
    #[serde(default)]
    pub internal_notes: Option<String>,
    #[serde(default)]
    pub follow_up_notes: Option<String>,
    #[serde(default)]
    pub decision_deadline: Option<String>,
}

/// Body of a status change request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: SuggestionStatus,
    #[serde(default)]
    pub notes: Option<String>,
    /// Only used when contact details are shared.
    #[serde(default)]
    pub meeting_date: Option<String>,
}

/// A suggestion together with its derived display fields.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestionView {
    #[serde(flatten)]
    pub suggestion: MatchSuggestion,
    pub status_label: &'static str,
    pub progress: u8,
    pub days_left: Option<i64>,
}

impl SuggestionView {
    pub fn new(suggestion: MatchSuggestion, locale: Locale, now: DateTime<Utc>) -> Self {
        Self {
            status_label: status_label(suggestion.status, locale),
            progress: progress(suggestion.status),
            days_left: suggestion
                .decision_deadline
                .as_deref()
                .and_then(|deadline| days_left(deadline, now)),
            suggestion,
        }
    }
}

#[derive(Clone)]
pub struct SuggestionService {
    pool: SqlitePool,
    suggestions: SuggestionRepository,
    users: UserRepository,
    dispatcher: NotificationDispatcher,
}

impl SuggestionService {
    pub fn new(pool: SqlitePool, dispatcher: NotificationDispatcher) -> Self {
        Self {
            suggestions: SuggestionRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            pool,
            dispatcher,
        }
    }

    /// Create a suggestion and send it straight to the first party.
    pub async fn create_suggestion(&self, actor: Actor, request: CreateSuggestion) -> SuggestionResult<MatchSuggestion> {
        if !actor.is_staff() {
            return Err(SuggestionError::forbidden("only matchmakers can create suggestions"));
        }
        if request.first_party_id == request.second_party_id {
            return Err(SuggestionError::validation("a suggestion needs two different parties"));
        }

        let first = self.party(request.first_party_id).await?;
        let second = self.party(request.second_party_id).await?;

        for (label, party) in [("First party", &first), ("Second party", &second)] {
            let blocking = self
                .suggestions
                .find_involving_in_status(&[party.id], SuggestionStatus::BLOCKING, None)
                .await?;
            if blocking.is_some() {
                return Err(SuggestionError::conflict(format!(
                    "{label} {} is already in an active suggestion process",
                    party.full_name()
                )));
            }
        }

        let new = NewSuggestion {
            matchmaker_id: actor.id,
            first_party_id: first.id,
            second_party_id: second.id,
            status: SuggestionStatus::PendingFirstParty,
            priority: request.priority.unwrap_or_default(),
            matching_reason: request.matching_reason,
            first_party_notes: request.first_party_notes,
            second_party_notes: request.second_party_notes,
            internal_notes: request.internal_notes,
            follow_up_notes: request.follow_up_notes,
            decision_deadline: request.decision_deadline,
        };

        let mut tx = self.pool.begin().await?;
        let suggestion = SuggestionRepository::create(&mut tx, &new).await?;
        SuggestionRepository::insert_history(&mut tx, suggestion.id, suggestion.status, None, INITIAL_HISTORY_NOTE)
            .await?;
        ProfileRepository::touch_last_suggested(&mut tx, &[first.id, second.id]).await?;
        tx.commit().await?;

        info!(
            suggestion_id = %suggestion.public_id,
            matchmaker_id = actor.id,
            first_party_id = first.id,
            second_party_id = second.id,
            "suggestion created"
        );
        self.notify(&suggestion).await;
        Ok(suggestion)
    }

    /// Edit notes, priority and deadlines. Only the owning matchmaker may.
    pub async fn update_suggestion(
        &self,
        actor: Actor,
        public_id: &str,
        patch: SuggestionPatch,
    ) -> SuggestionResult<MatchSuggestion> {
        let suggestion = self.find(public_id).await?;
        if suggestion.matchmaker_id != actor.id {
            return Err(SuggestionError::forbidden("only the owning matchmaker can edit this suggestion"));
        }
        Ok(self.suggestions.update_details(suggestion.id, &patch).await?)
    }

    pub async fn get(&self, actor: Actor, public_id: &str) -> SuggestionResult<MatchSuggestion> {
        let suggestion = self.find(public_id).await?;
        ensure_can_view(&suggestion, actor)?;
        Ok(suggestion)
    }

    /// Staff see the suggestions they own; candidates see those they are part of.
    pub async fn list_for_user(&self, actor: Actor, limit: i64) -> SuggestionResult<Vec<MatchSuggestion>> {
        let limit = limit.clamp(1, 200);
        let suggestions = if actor.is_staff() {
            self.suggestions.list_for_matchmaker(actor.id, limit).await?
        } else {
            self.suggestions.list_for_party(actor.id, limit).await?
        };
        Ok(suggestions)
    }

    pub async fn history(&self, actor: Actor, public_id: &str) -> SuggestionResult<Vec<StatusHistoryEntry>> {
        let suggestion = self.get(actor, public_id).await?;
        Ok(self.suggestions.history(suggestion.id).await?)
    }

    pub async fn meetings(&self, actor: Actor, public_id: &str) -> SuggestionResult<Vec<Meeting>> {
        let suggestion = self.get(actor, public_id).await?;
        Ok(self.suggestions.meetings(suggestion.id).await?)
    }

    pub async fn delete(&self, actor: Actor, public_id: &str) -> SuggestionResult<()> {
        let suggestion = self.find(public_id).await?;
        if suggestion.matchmaker_id != actor.id {
            return Err(SuggestionError::forbidden("only the owning matchmaker can delete this suggestion"));
        }
        self.suggestions.delete(suggestion.id).await?;
        info!(suggestion_id = %suggestion.public_id, "suggestion deleted");
        Ok(())
    }

    /// What the actor may do next with a suggestion.
    pub async fn actions(&self, actor: Actor, public_id: &str, locale: Locale) -> SuggestionResult<Vec<StatusAction>> {
        let suggestion = self.get(actor, public_id).await?;
        Ok(SuggestionRole::of(&suggestion, actor.id)
            .map(|role| available_actions(suggestion.status, role, locale))
            .unwrap_or_default())
    }

    /// Move a suggestion to `to`, record history and notify whoever the new
    /// status concerns. Delivery failures are logged only.
    pub async fn transition(
        &self,
        suggestion: &MatchSuggestion,
        to: SuggestionStatus,
        notes: Option<String>,
    ) -> SuggestionResult<MatchSuggestion> {
        let from = suggestion.status;
        validate_transition(from, to)?;

        let notes = notes
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| format!("Status changed from {from} to {to}"));

        let mut tx = self.pool.begin().await?;
        SuggestionRepository::update_status(&mut tx, suggestion.id, to, from, stamp_column(to)).await?;
        SuggestionRepository::insert_history(&mut tx, suggestion.id, to, Some(from), &notes).await?;
        let updated = SuggestionRepository::find_by_id_in(&mut tx, suggestion.id)
            .await?
            .ok_or_else(|| SuggestionError::not_found(suggestion.public_id.clone()))?;
        tx.commit().await?;

        info!(suggestion_id = %updated.public_id, %from, %to, "suggestion status changed");
        self.notify(&updated).await;
        Ok(updated)
    }

    /// Status change requested by a party, the owning matchmaker or an admin.
    ///
    /// Runs the automatic follow-up transition (approved answers move on,
    /// declines close) and syncs both profiles' availability for dating,
    /// engagement and marriage.
    pub async fn update_status(
        &self,
        actor: Actor,
        public_id: &str,
        update: StatusUpdate,
    ) -> SuggestionResult<MatchSuggestion> {
        let suggestion = self.find(public_id).await?;
        let target = update.status;

        let approving = matches!(
            target,
            SuggestionStatus::FirstPartyApproved | SuggestionStatus::SecondPartyApproved
        );
        if actor.role == UserRole::Candidate && approving {
            let active = self
                .suggestions
                .find_involving_in_status(&[actor.id], SuggestionStatus::ACTIVE, Some(suggestion.id))
                .await?;
            if active.is_some() {
                return Err(SuggestionError::conflict(
                    "you already have an active suggestion in progress",
                ));
            }
        }

        ensure_can_view(&suggestion, actor)?;

        if target == SuggestionStatus::ContactDetailsShared {
            if let Some(date) = update.meeting_date.as_deref().filter(|d| !d.trim().is_empty()) {
                let meeting = self.suggestions.create_meeting(suggestion.id, date, None).await?;
                info!(suggestion_id = %suggestion.public_id, meeting_id = %meeting.public_id, "meeting scheduled");
            }
        }

        let mut updated = self.transition(&suggestion, target, update.notes).await?;

        if let Some(next) = secondary_transition(target) {
            let note = format!("Automatic transition after {target}");
            match self.transition(&updated, next, Some(note)).await {
                Ok(moved) => updated = moved,
                Err(err) => warn!(
                    suggestion_id = %updated.public_id,
                    from = %target,
                    to = %next,
                    error = %err,
                    "automatic status transition failed"
                ),
            }
        }

        if let Some((availability, note)) = availability_effect(target, Utc::now().date_naive()) {
            let mut tx = self.pool.begin().await?;
            for user_id in [updated.first_party_id, updated.second_party_id] {
                if !ProfileRepository::set_availability(&mut tx, user_id, availability, Some(&note)).await? {
                    return Err(SuggestionError::ProfileNotFound { user_id });
                }
            }
            tx.commit().await?;
        }

        Ok(updated)
    }

    async fn find(&self, public_id: &str) -> SuggestionResult<MatchSuggestion> {
        self.suggestions
            .find_by_public_id(public_id)
            .await?
            .ok_or_else(|| SuggestionError::not_found(public_id))
    }

    async fn party(&self, user_id: i64) -> SuggestionResult<User> {
        self.users
            .find_by_id(user_id)
            .await?
            .ok_or(SuggestionError::PartyNotFound { id: user_id })
    }

    async fn notify(&self, suggestion: &MatchSuggestion) {
        let users = match self
            .users
            .find_many(&[suggestion.matchmaker_id, suggestion.first_party_id, suggestion.second_party_id])
            .await
        {
            Ok(users) => users,
            Err(err) => {
                warn!(suggestion_id = %suggestion.public_id, error = %err, "could not load suggestion participants");
                return;
            }
        };
        let recipient = |id: i64| users.iter().find(|u| u.id == id).map(Recipient::from);

        let (Some(matchmaker), Some(first_party), Some(second_party)) = (
            recipient(suggestion.matchmaker_id),
            recipient(suggestion.first_party_id),
            recipient(suggestion.second_party_id),
        ) else {
            warn!(suggestion_id = %suggestion.public_id, "suggestion participant missing, skipping notification");
            return;
        };

        let notice = SuggestionNotice {
            suggestion_id: suggestion.public_id.clone(),
            status: suggestion.status,
            status_label: status_label(suggestion.status, first_party.locale).to_string(),
            matchmaker,
            first_party,
            second_party,
        };
        let report = self.dispatcher.send_suggestion_update(&notice).await;
        for failure in &report.failures {
            warn!(
                suggestion_id = %suggestion.public_id,
                to = %failure.to,
                channel = %failure.channel,
                error = %failure.error,
                "suggestion notification failed"
            );
        }
    }
}

fn ensure_can_view(suggestion: &MatchSuggestion, actor: Actor) -> SuggestionResult<()> {
    if suggestion.involves(actor.id) || suggestion.matchmaker_id == actor.id || actor.is_admin() {
        Ok(())
    } else {
        Err(SuggestionError::forbidden("not a participant of this suggestion"))
    }
}
