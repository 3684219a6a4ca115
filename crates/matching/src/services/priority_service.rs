//! Priority triage: scores every candidate 0-100 so matchmakers know whom to
//! work on first.
//!
//! Categories: 80 and up is CRITICAL (today), 60 HIGH, 40 MEDIUM, below that LOW.

use chrono::{DateTime, Utc};
use matchmaker_database::{
    timestamp, AvailabilityStatus, DatabaseResult, Gender, PriorityCategory, Profile, ProfileRepository,
    ReadinessLevel, SuggestionRepository, SuggestionStatus, User, UserRepository,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, error, info, warn};

const BASE_SCORE: i64 = 50;

const NEW_USER_48H: i64 = 40;
const NEW_USER_WEEK: i64 = 25;
const NEW_USER_2WEEKS: i64 = 15;

const WAITING_PER_DAY: i64 = 2;
const WAITING_MAX: i64 = 30;

const ACTIVE_TODAY: i64 = 10;
const ACTIVE_3DAYS: i64 = 5;
const INACTIVE_14DAYS: i64 = -15;
const INACTIVE_30DAYS: i64 = -25;

const NO_PENDING_MATCHES: i64 = 15;

const PROFILE_COMPLETE: i64 = 10;
const PROFILE_PARTIAL: i64 = 5;
const PROFILE_INCOMPLETE: i64 = -10;

const DIFFICULTY_HIGH: i64 = -10;
const DIFFICULTY_LOW: i64 = 5;

const HIGH_ENGAGEMENT: i64 = 10;
const LOW_ENGAGEMENT: i64 = -5;

const NEW_USER_DAYS: i64 = 7;
const NEGLECTED_DAYS: i64 = 10;
const INACTIVE_DAYS: i64 = 14;

/// Everything the score depends on, already reduced to numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriorityInputs {
    pub days_since_registration: i64,
    pub days_since_last_suggestion: Option<i64>,
    pub days_since_last_activity: Option<i64>,
    pub pending_matches: i64,
    pub completeness: i64,
    pub difficulty: Option<i64>,
    pub acceptance_rate: Option<f64>,
    pub average_response_hours: Option<f64>,
    pub readiness: Option<ReadinessLevel>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityBreakdown {
    pub new_user_bonus: i64,
    pub waiting_time_bonus: i64,
    pub activity_bonus: i64,
    pub pending_matches_bonus: i64,
    pub profile_completeness_bonus: i64,
    pub difficulty_penalty: i64,
    pub engagement_bonus: i64,
    pub readiness_bonus: i64,
}

impl PriorityBreakdown {
    pub fn total(&self) -> i64 {
        self.new_user_bonus
            + self.waiting_time_bonus
            + self.activity_bonus
            + self.pending_matches_bonus
            + self.profile_completeness_bonus
            + self.difficulty_penalty
            + self.engagement_bonus
            + self.readiness_bonus
    }

    pub fn score(&self) -> i64 {
        (BASE_SCORE + self.total()).clamp(0, 100)
    }
}

impl PriorityInputs {
    pub fn breakdown(&self) -> PriorityBreakdown {
        let new_user_bonus = match self.days_since_registration {
            d if d <= 2 => NEW_USER_48H,
            d if d <= 7 => NEW_USER_WEEK,
            d if d <= 14 => NEW_USER_2WEEKS,
            _ => 0,
        };

        let waiting_time_bonus = self
            .days_since_last_suggestion
            .map_or(WAITING_MAX, |days| (days * WAITING_PER_DAY).min(WAITING_MAX));

        let activity_bonus = match self.days_since_last_activity {
            Some(d) if d <= 1 => ACTIVE_TODAY,
            Some(d) if d <= 3 => ACTIVE_3DAYS,
            Some(d) if d >= 30 => INACTIVE_30DAYS,
            Some(d) if d >= 14 => INACTIVE_14DAYS,
            _ => 0,
        };

        let pending_matches_bonus = if self.pending_matches == 0 { NO_PENDING_MATCHES } else { 0 };

        let profile_completeness_bonus = match self.completeness {
            c if c >= 80 => PROFILE_COMPLETE,
            c if c >= 50 => PROFILE_PARTIAL,
            _ => PROFILE_INCOMPLETE,
        };

        let difficulty_penalty = match self.difficulty.unwrap_or(5) {
            d if d >= 8 => DIFFICULTY_HIGH,
            d if d <= 4 => DIFFICULTY_LOW,
            _ => 0,
        };

        let acceptance = self.acceptance_rate.unwrap_or(0.5);
        let response_hours = self.average_response_hours.unwrap_or(48.0);
        let engagement_bonus = if acceptance >= 0.6 && response_hours <= 24.0 {
            HIGH_ENGAGEMENT
        } else if acceptance <= 0.2 {
            LOW_ENGAGEMENT
        } else {
            0
        };

        let readiness_bonus = match self.readiness {
            Some(ReadinessLevel::VeryReady) => 10,
            Some(ReadinessLevel::Ready) => 5,
            Some(ReadinessLevel::SomewhatReady) | None => 0,
            Some(ReadinessLevel::Uncertain) => -5,
            Some(ReadinessLevel::NotReady) => -15,
        };

        PriorityBreakdown {
            new_user_bonus,
            waiting_time_bonus,
            activity_bonus,
            pending_matches_bonus,
            profile_completeness_bonus,
            difficulty_penalty,
            engagement_bonus,
            readiness_bonus,
        }
    }
}

pub fn category_for(score: i64) -> PriorityCategory {
    match score {
        s if s >= 80 => PriorityCategory::Critical,
        s if s >= 60 => PriorityCategory::High,
        s if s >= 40 => PriorityCategory::Medium,
        _ => PriorityCategory::Low,
    }
}

/// Weighted fill rate: 70% for the seven required fields, 30% for the ten optional ones.
pub fn profile_completeness(profile: &Profile) -> i64 {
    fn filled(value: &Option<String>) -> bool {
        value.as_deref().is_some_and(|v| !v.is_empty())
    }

    let required = [
        filled(&profile.birth_date),
        profile.gender.is_some(),
        filled(&profile.religious_level),
        filled(&profile.city),
        filled(&profile.occupation),
        filled(&profile.education),
        filled(&profile.about),
    ];
    let optional = [
        profile.height.is_some(),
        filled(&profile.marital_status),
        filled(&profile.origin),
        filled(&profile.service_type),
        !profile.character_traits.is_empty(),
        !profile.hobbies.is_empty(),
        profile.preferred_age_min.is_some(),
        profile.preferred_age_max.is_some(),
        !profile.preferred_religious_levels.is_empty(),
        filled(&profile.matching_notes),
    ];

    let count = |fields: &[bool]| fields.iter().filter(|f| **f).count() as f64;
    let score = count(&required) / required.len() as f64 * 70.0 + count(&optional) / optional.len() as f64 * 30.0;
    score.round() as i64
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPriority {
    pub user_id: i64,
    pub public_id: String,
    pub first_name: String,
    pub last_name: String,
    pub gender: Option<Gender>,
    pub priority_score: i64,
    pub category: PriorityCategory,
    pub breakdown: PriorityBreakdown,
    pub days_since_registration: i64,
    pub days_since_last_suggestion: Option<i64>,
    pub days_since_last_activity: Option<i64>,
    pub pending_matches_count: i64,
    pub profile_completeness_score: i64,
    pub is_new_user: bool,
    pub is_neglected: bool,
    pub is_inactive: bool,
    pub has_no_pending_matches: bool,
}

impl UserPriority {
    fn build(user: &User, profile: &Profile, pending_matches: i64, now: DateTime<Utc>) -> Self {
        let inputs = PriorityInputs {
            days_since_registration: timestamp::days_since(&user.created_at, now).unwrap_or(0),
            days_since_last_suggestion: profile
                .last_suggested_at
                .as_deref()
                .and_then(|at| timestamp::days_since(at, now)),
            days_since_last_activity: profile
                .last_active_at
                .as_deref()
                .and_then(|at| timestamp::days_since(at, now)),
            pending_matches,
            completeness: profile
                .completeness_score
                .unwrap_or_else(|| profile_completeness(profile)),
            difficulty: profile.difficulty_score,
            acceptance_rate: profile.acceptance_rate,
            average_response_hours: profile.average_response_hours,
            readiness: profile.readiness_level,
        };
        let breakdown = inputs.breakdown();
        let score = breakdown.score();

        Self {
            user_id: user.id,
            public_id: user.public_id.clone(),
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            gender: profile.gender,
            priority_score: score,
            category: category_for(score),
            breakdown,
            days_since_registration: inputs.days_since_registration,
            days_since_last_suggestion: inputs.days_since_last_suggestion,
            days_since_last_activity: inputs.days_since_last_activity,
            pending_matches_count: pending_matches,
            profile_completeness_score: inputs.completeness,
            is_new_user: inputs.days_since_registration <= NEW_USER_DAYS,
            is_neglected: inputs
                .days_since_last_suggestion
                .is_some_and(|days| days >= NEGLECTED_DAYS),
            is_inactive: inputs
                .days_since_last_activity
                .is_some_and(|days| days >= INACTIVE_DAYS),
            has_no_pending_matches: pending_matches == 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriorityStats {
    pub total_users: usize,
    pub critical_count: usize,
    pub high_count: usize,
    pub medium_count: usize,
    pub low_count: usize,
    pub average_priority_score: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PrioritySummary {
    pub critical: Vec<UserPriority>,
    pub high: Vec<UserPriority>,
    pub medium: Vec<UserPriority>,
    pub low: Vec<UserPriority>,
    pub stats: PriorityStats,
}

impl PrioritySummary {
    /// Groups results that are already sorted by descending score.
    fn from_sorted(results: Vec<UserPriority>) -> Self {
        let total = results.len();
        let average = if total > 0 {
            (results.iter().map(|r| r.priority_score).sum::<i64>() as f64 / total as f64).round() as i64
        } else {
            0
        };

        let mut summary = PrioritySummary::default();
        for result in results {
            match result.category {
                PriorityCategory::Critical => summary.critical.push(result),
                PriorityCategory::High => summary.high.push(result),
                PriorityCategory::Medium => summary.medium.push(result),
                PriorityCategory::Low => summary.low.push(result),
            }
        }
        summary.stats = PriorityStats {
            total_users: total,
            critical_count: summary.critical.len(),
            high_count: summary.high.len(),
            medium_count: summary.medium.len(),
            low_count: summary.low.len(),
            average_priority_score: average,
        };
        summary
    }

    /// All results, most urgent first.
    pub fn into_ranked(self) -> Vec<UserPriority> {
        let mut all = self.critical;
        all.extend(self.high);
        all.extend(self.medium);
        all.extend(self.low);
        all
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct UpdateCounts {
    pub updated: usize,
    pub failed: usize,
}

#[derive(Clone)]
pub struct PriorityService {
    users: UserRepository,
    profiles: ProfileRepository,
    suggestions: SuggestionRepository,
}

impl PriorityService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool.clone()),
            suggestions: SuggestionRepository::new(pool),
        }
    }

    /// `None` when the user or their profile does not exist.
    pub async fn calculate_user_priority(&self, user_id: i64) -> DatabaseResult<Option<UserPriority>> {
        let Some(user) = self.users.find_by_id(user_id).await? else {
            return Ok(None);
        };
        let Some(profile) = self.profiles.find_by_user_id(user_id).await? else {
            return Ok(None);
        };
        self.evaluate(&user, &profile, Utc::now()).await.map(Some)
    }

    /// Scores for active users who are available or paused, highest first.
    pub async fn summary(&self) -> DatabaseResult<PrioritySummary> {
        let profiles = self
            .profiles
            .list_active_with_availability(&[AvailabilityStatus::Available, AvailabilityStatus::Paused])
            .await?;
        let ids: Vec<i64> = profiles.iter().map(|p| p.user_id).collect();
        let users = self.users.find_many(&ids).await?;
        let now = Utc::now();

        let mut results = Vec::with_capacity(profiles.len());
        for profile in &profiles {
            if let Some(user) = users.iter().find(|u| u.id == profile.user_id) {
                results.push(self.evaluate(user, profile, now).await?);
            }
        }
        results.sort_by(|a, b| b.priority_score.cmp(&a.priority_score));

        let summary = PrioritySummary::from_sorted(results);
        debug!(
            total = summary.stats.total_users,
            critical = summary.stats.critical_count,
            high = summary.stats.high_count,
            medium = summary.stats.medium_count,
            low = summary.stats.low_count,
            "priority summary calculated"
        );
        Ok(summary)
    }

    /// Persist the current score. Returns false when there is nothing to score.
    pub async fn update_user_in_db(&self, user_id: i64) -> DatabaseResult<bool> {
        let Some(result) = self.calculate_user_priority(user_id).await? else {
            warn!(user_id, "could not calculate priority");
            return Ok(false);
        };
        self.profiles
            .update_priority(user_id, result.priority_score, result.category, result.profile_completeness_score)
            .await
    }

    /// Recalculate every active user with a profile.
    pub async fn update_all_in_db(&self) -> DatabaseResult<UpdateCounts> {
        let mut counts = UpdateCounts::default();
        for user_id in self.profiles.list_active_user_ids().await? {
            match self.update_user_in_db(user_id).await {
                Ok(true) => counts.updated += 1,
                Ok(false) => counts.failed += 1,
                Err(err) => {
                    error!(user_id, error = %err, "priority update failed");
                    counts.failed += 1;
                }
            }
        }
        info!(updated = counts.updated, failed = counts.failed, "priorities recalculated");
        Ok(counts)
    }

    pub async fn top_priority(&self, limit: usize) -> DatabaseResult<Vec<UserPriority>> {
        let mut ranked = self.summary().await?.into_ranked();
        ranked.truncate(limit);
        Ok(ranked)
    }

    /// New users who never received a suggestion.
    pub async fn new_users_without_suggestion(&self) -> DatabaseResult<Vec<UserPriority>> {
        Ok(self
            .summary()
            .await?
            .into_ranked()
            .into_iter()
            .filter(|u| u.is_new_user && u.days_since_last_suggestion.is_none())
            .collect())
    }

    pub async fn neglected_users(&self) -> DatabaseResult<Vec<UserPriority>> {
        Ok(self
            .summary()
            .await?
            .into_ranked()
            .into_iter()
            .filter(|u| u.is_neglected)
            .collect())
    }

    async fn evaluate(&self, user: &User, profile: &Profile, now: DateTime<Utc>) -> DatabaseResult<UserPriority> {
        let pending = self
            .suggestions
            .count_involving_in_status(user.id, SuggestionStatus::PENDING)
            .await?;
        Ok(UserPriority::build(user, profile, pending, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs() -> PriorityInputs {
        PriorityInputs {
            days_since_registration: 100,
            days_since_last_suggestion: Some(3),
            days_since_last_activity: Some(7),
            pending_matches: 1,
            completeness: 60,
            difficulty: None,
            acceptance_rate: None,
            average_response_hours: None,
            readiness: None,
        }
    }

    #[test]
    fn neutral_inputs_score_near_base() {
        let breakdown = inputs().breakdown();
        assert_eq!(breakdown.waiting_time_bonus, 6);
        assert_eq!(breakdown.profile_completeness_bonus, 5);
        assert_eq!(breakdown.total(), 11);
        assert_eq!(breakdown.score(), 61);
        assert_eq!(category_for(breakdown.score()), PriorityCategory::High);
    }

    #[test]
    fn brand_new_unsuggested_user_is_critical() {
        let breakdown = PriorityInputs {
            days_since_registration: 1,
            days_since_last_suggestion: None,
            days_since_last_activity: Some(0),
            pending_matches: 0,
            completeness: 90,
            readiness: Some(ReadinessLevel::VeryReady),
            ..inputs()
        }
        .breakdown();

        assert_eq!(breakdown.new_user_bonus, 40);
        assert_eq!(breakdown.waiting_time_bonus, 30);
        assert_eq!(breakdown.activity_bonus, 10);
        assert_eq!(breakdown.pending_matches_bonus, 15);
        assert_eq!(breakdown.score(), 100);
    }

    #[test]
    fn penalties_clamp_at_zero() {
        let breakdown = PriorityInputs {
            days_since_last_suggestion: Some(0),
            days_since_last_activity: Some(45),
            completeness: 10,
            difficulty: Some(9),
            acceptance_rate: Some(0.1),
            readiness: Some(ReadinessLevel::NotReady),
            ..inputs()
        }
        .breakdown();

        assert_eq!(breakdown.activity_bonus, -25);
        assert_eq!(breakdown.difficulty_penalty, -10);
        assert_eq!(breakdown.engagement_bonus, -5);
        assert_eq!(breakdown.total(), -65);
        assert_eq!(breakdown.score(), 0);
        assert_eq!(category_for(0), PriorityCategory::Low);
    }

    #[test]
    fn engagement_needs_fast_responses() {
        let fast = PriorityInputs {
            acceptance_rate: Some(0.8),
            average_response_hours: Some(12.0),
            ..inputs()
        };
        assert_eq!(fast.breakdown().engagement_bonus, 10);

        let slow = PriorityInputs {
            average_response_hours: Some(30.0),
            ..fast
        };
        assert_eq!(slow.breakdown().engagement_bonus, 0);
    }

    #[test]
    fn waiting_bonus_is_capped() {
        let breakdown = PriorityInputs {
            days_since_last_suggestion: Some(40),
            ..inputs()
        }
        .breakdown();
        assert_eq!(breakdown.waiting_time_bonus, 30);
    }

    #[test]
    fn category_thresholds() {
        assert_eq!(category_for(80), PriorityCategory::Critical);
        assert_eq!(category_for(79), PriorityCategory::High);
        assert_eq!(category_for(40), PriorityCategory::Medium);
        assert_eq!(category_for(39), PriorityCategory::Low);
    }

    #[test]
    fn summary_groups_and_averages() {
        let sample = |id: i64, score: i64| UserPriority {
            user_id: id,
            public_id: format!("u{id}"),
            first_name: "A".into(),
            last_name: "B".into(),
            gender: None,
            priority_score: score,
            category: category_for(score),
            breakdown: PriorityBreakdown::default(),
            days_since_registration: 0,
            days_since_last_suggestion: None,
            days_since_last_activity: None,
            pending_matches_count: 0,
            profile_completeness_score: 0,
            is_new_user: false,
            is_neglected: false,
            is_inactive: false,
            has_no_pending_matches: true,
        };

        let summary = PrioritySummary::from_sorted(vec![sample(1, 90), sample(2, 65), sample(3, 20)]);
        assert_eq!(summary.stats.total_users, 3);
        assert_eq!(summary.stats.critical_count, 1);
        assert_eq!(summary.stats.medium_count, 0);
        assert_eq!(summary.stats.average_priority_score, 58);

        let ranked: Vec<i64> = summary.into_ranked().iter().map(|u| u.user_id).collect();
        assert_eq!(ranked, vec![1, 2, 3]);
    }
}
