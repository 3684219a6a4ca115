//! Finds and scores match candidates for a target user and caches the result.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use matchmaker_database::{
    timestamp, CandidateQuery, MatchingRepository, ProfileRepository, SavedMatchSearch, UserRepository,
};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info, warn};

use crate::compatibility::{age_on, compatible_religious_levels, AgeRange, RELIGIOUS_LEVEL_ORDER};
use crate::error::{OrchestratorError, OrchestratorResult};
use crate::prompt::{build_prompt, parse_matches, MatchResult, PersonSummary};
use crate::provider::CompletionProvider;

pub const ALGORITHM_VERSION: &str = "algorithmic-v1";
pub const SAVED_SEARCH_STALE_DAYS: i64 = 7;
const CANDIDATE_POOL_FACTOR: usize = 3;

/// Receives progress updates while a search runs.
#[async_trait]
pub trait ProgressReporter: Send + Sync {
    async fn report(&self, progress: i64, message: &str);
}

pub struct NoProgress;

#[async_trait]
impl ProgressReporter for NoProgress {
    async fn report(&self, _progress: i64, _message: &str) {}
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchMeta {
    pub total_candidates_scanned: i64,
    pub algorithm_version: String,
    pub saved_at: Option<String>,
    pub is_stale: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSearch {
    pub matches: Vec<MatchResult>,
    pub from_cache: bool,
    pub meta: SearchMeta,
}

impl MatchSearch {
    fn from_saved(saved: SavedMatchSearch, now: DateTime<Utc>) -> OrchestratorResult<Self> {
        let matches: Vec<MatchResult> = serde_json::from_str(&saved.results)?;
        Ok(Self {
            matches,
            from_cache: true,
            meta: SearchMeta {
                total_candidates_scanned: saved.candidates_scanned,
                is_stale: is_stale(&saved.updated_at, now),
                algorithm_version: saved.algorithm_version,
                saved_at: Some(saved.updated_at),
            },
        })
    }
}

/// Saved results older than a week should be refreshed.
pub fn is_stale(saved_at: &str, now: DateTime<Utc>) -> bool {
    timestamp::parse(saved_at)
        .map(|saved| now - saved > Duration::days(SAVED_SEARCH_STALE_DAYS))
        .unwrap_or(true)
}

#[derive(Clone)]
pub struct MatchingEngine {
    profiles: ProfileRepository,
    users: UserRepository,
    searches: MatchingRepository,
    provider: Arc<dyn CompletionProvider>,
    max_candidates: usize,
}

impl MatchingEngine {
    pub fn new(pool: SqlitePool, provider: Arc<dyn CompletionProvider>, max_candidates: usize) -> Self {
        Self {
            profiles: ProfileRepository::new(pool.clone()),
            users: UserRepository::new(pool.clone()),
            searches: MatchingRepository::new(pool),
            provider,
            max_candidates: max_candidates.max(1),
        }
    }

    /// Saved matches unless stale or `force_refresh`, otherwise a fresh scan that replaces them.
    pub async fn find_matches(
        &self,
        target_user_id: i64,
        matchmaker_id: i64,
        force_refresh: bool,
        progress: &dyn ProgressReporter,
    ) -> OrchestratorResult<MatchSearch> {
        let now = Utc::now();
        if !force_refresh {
            if let Some(saved) = self.searches.find_search(target_user_id).await? {
                if !is_stale(&saved.updated_at, now) {
                    debug!(target_user_id, "serving saved match search");
                    return MatchSearch::from_saved(saved, now);
                }
            }
        }

        progress.report(10, "Loading target profile").await;
        let (target_summary, mut candidates) = self.target(target_user_id, now).await?;
        progress
            .report(30, &format!("Found {} candidates", candidates.len()))
            .await;
        let scanned = candidates.len() as i64;
        candidates.truncate(self.max_candidates);

        let matches = if candidates.is_empty() {
            info!(target_user_id, "no candidates left after filtering");
            Vec::new()
        } else {
            progress
                .report(50, &format!("Analyzing {} candidates", candidates.len()))
                .await;
            let prompt = build_prompt(&target_summary, &candidates);
            let raw = self.provider.generate_json(&prompt).await?;
            parse_matches(&raw, &candidates)?
        };

        progress.report(90, "Saving results").await;
        let saved = self
            .searches
            .upsert_search(
                target_user_id,
                matchmaker_id,
                &serde_json::to_string(&matches)?,
                ALGORITHM_VERSION,
                scanned,
            )
            .await?;
        info!(
            target_user_id,
            provider = self.provider.name(),
            candidates = scanned,
            matches = matches.len(),
            "match search completed"
        );

        Ok(MatchSearch {
            matches,
            from_cache: false,
            meta: SearchMeta {
                total_candidates_scanned: scanned,
                algorithm_version: ALGORITHM_VERSION.to_string(),
                saved_at: Some(saved.updated_at),
                is_stale: false,
            },
        })
    }

    pub async fn load_saved(&self, target_user_id: i64) -> OrchestratorResult<Option<MatchSearch>> {
        match self.searches.find_search(target_user_id).await? {
            Some(saved) => MatchSearch::from_saved(saved, Utc::now()).map(Some),
            None => Ok(None),
        }
    }

    pub async fn delete_saved(&self, target_user_id: i64) -> OrchestratorResult<bool> {
        Ok(self.searches.delete_search(target_user_id).await?)
    }

    /// The target's summary and the filtered candidate pool, newest profiles first.
    async fn target(
        &self,
        target_user_id: i64,
        now: DateTime<Utc>,
    ) -> OrchestratorResult<(PersonSummary, Vec<PersonSummary>)> {
        let user = self
            .users
            .find_by_id(target_user_id)
            .await?
            .ok_or(OrchestratorError::TargetNotFound(target_user_id))?;
        let profile = self
            .profiles
            .find_by_user_id(target_user_id)
            .await?
            .ok_or(OrchestratorError::TargetNotFound(target_user_id))?;
        let (Some(gender), Some(birth_date)) = (
            profile.gender,
            profile.birth_date.as_deref().and_then(timestamp::parse_date),
        ) else {
            return Err(OrchestratorError::TargetIncomplete(target_user_id));
        };

        let today = now.date_naive();
        let age = age_on(birth_date, today);
        let target = PersonSummary::new(user.id, &user.first_name, &user.last_name, age, &profile);

        let levels = compatible_religious_levels(profile.religious_level.as_deref());
        let (earliest, latest) = AgeRange::for_target(age, gender).birth_date_bounds(today);
        let query = CandidateQuery {
            exclude_user_id: user.id,
            gender: gender.opposite(),
            born_on_or_after: earliest.format("%Y-%m-%d").to_string(),
            born_on_or_before: latest.format("%Y-%m-%d").to_string(),
            religious_levels: (levels.len() < RELIGIOUS_LEVEL_ORDER.len())
                .then(|| levels.iter().map(|l| l.to_string()).collect()),
            limit: (self.max_candidates * CANDIDATE_POOL_FACTOR) as i64,
        };
        let profiles = self.profiles.find_candidates(&query).await?;
        debug!(target_user_id, age, found = profiles.len(), "candidate pool loaded");

        let ids: Vec<i64> = profiles.iter().map(|p| p.user_id).collect();
        let users = self.users.find_many(&ids).await?;

        let candidates = profiles
            .iter()
            .filter_map(|profile| {
                let Some(user) = users.iter().find(|u| u.id == profile.user_id) else {
                    warn!(user_id = profile.user_id, "candidate profile without user");
                    return None;
                };
                let birth_date = profile.birth_date.as_deref().and_then(timestamp::parse_date)?;
                Some(PersonSummary::new(
                    user.id,
                    &user.first_name,
                    &user.last_name,
                    age_on(birth_date, today),
                    profile,
                ))
            })
            .collect();

        Ok((target, candidates))
    }
}
