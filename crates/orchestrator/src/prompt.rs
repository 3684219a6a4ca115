//! Candidate summaries, the scoring prompt and parsing of the model's answer.

use matchmaker_database::Profile;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{OrchestratorError, OrchestratorResult};

pub const MAX_SUMMARY_CHARS: usize = 1500;
const NOT_SPECIFIED: &str = "not specified";

/// The parts of `profiles.ai_summary` the prompt uses.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiProfileSummary {
    #[serde(default)]
    personality_summary: Option<String>,
    #[serde(default)]
    looking_for_summary: Option<String>,
}

fn ai_summary(profile: &Profile) -> Option<AiProfileSummary> {
    let raw = profile.ai_summary.as_deref()?;
    serde_json::from_str::<AiProfileSummary>(raw)
        .ok()
        .filter(|s| s.personality_summary.as_deref().is_some_and(|p| !p.trim().is_empty()))
}

/// One side of a potential match as presented to the model.
#[derive(Debug, Clone, PartialEq)]
pub struct PersonSummary {
    pub user_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub age: i32,
    pub religious_level: Option<String>,
    pub city: Option<String>,
    pub occupation: Option<String>,
    pub summary_text: String,
}

impl PersonSummary {
    pub fn new(user_id: i64, first_name: &str, last_name: &str, age: i32, profile: &Profile) -> Self {
        Self {
            user_id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            age,
            religious_level: profile.religious_level.clone(),
            city: profile.city.clone(),
            occupation: profile.occupation.clone(),
            summary_text: truncate_chars(&summary_text(profile, age), MAX_SUMMARY_CHARS),
        }
    }

    fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// The AI personality summary when present, else the free text about section, else a basic line.
pub fn summary_text(profile: &Profile, age: i32) -> String {
    if let Some(summary) = ai_summary(profile) {
        return format!(
            "Personality: {}\nLooking for: {}",
            summary.personality_summary.unwrap_or_default(),
            summary.looking_for_summary.as_deref().unwrap_or(NOT_SPECIFIED)
        );
    }
    if let Some(about) = profile.about.as_deref().filter(|a| !a.trim().is_empty()) {
        return format!("About: {about}");
    }
    format!(
        "Candidate aged {age}, {}, {}",
        profile.religious_level.as_deref().unwrap_or(NOT_SPECIFIED),
        profile.city.as_deref().unwrap_or(NOT_SPECIFIED)
    )
}

pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text.to_string(),
    }
}

fn target_profile(target: &PersonSummary) -> String {
    format!(
        "Name: {}\nAge: {}\nReligious level: {}\n\n{}",
        target.full_name(),
        target.age,
        target.religious_level.as_deref().unwrap_or(NOT_SPECIFIED),
        target.summary_text
    )
}

fn candidate_block(index: usize, candidate: &PersonSummary) -> String {
    format!(
        "[Candidate {}]\nName: {}\nAge: {} | Religious level: {} | City: {} | Occupation: {}\n{}\n---",
        index + 1,
        candidate.full_name(),
        candidate.age,
        candidate.religious_level.as_deref().unwrap_or(NOT_SPECIFIED),
        candidate.city.as_deref().unwrap_or(NOT_SPECIFIED),
        candidate.occupation.as_deref().unwrap_or(NOT_SPECIFIED),
        candidate.summary_text
    )
}

pub fn build_prompt(target: &PersonSummary, candidates: &[PersonSummary]) -> String {
    let count = candidates.len();
    let candidates_text = candidates
        .iter()
        .enumerate()
        .map(|(index, candidate)| candidate_block(index, candidate))
        .collect::<Vec<_>>()
        .join("\n\n");

    format!(
        "You are an expert matchmaker. Assess how well each candidate below suits the target person.\n\n\
         === Target profile ===\n{target}\n\n\
         === Candidates ({count}) ===\n{candidates_text}\n\n\
         === Instructions ===\n\
         1. Evaluate every candidate against the target profile.\n\
         2. Weigh religious and value alignment, personality fit, lifestyle and goals, and emotional connection potential.\n\
         3. Score each candidate from 0 to 100.\n\
         4. Give a short reasoning of at most 100 words, written in Hebrew.\n\n\
         Respond with JSON only, in this shape:\n\
         {{\"matches\": [{{\"candidateIndex\": 1, \"score\": 85, \"reasoning\": \"...\"}}]}}\n\
         Rate all {count} candidates, highest score first.",
        target = target_profile(target),
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiMatchResponse {
    matches: Vec<AiMatch>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AiMatch {
    candidate_index: i64,
    score: f64,
    #[serde(default)]
    reasoning: String,
}

/// A scored candidate as stored in saved searches and job results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub user_id: i64,
    pub score: i64,
    pub reasoning: String,
    pub first_name: String,
    pub last_name: String,
}

/// Remove a surrounding markdown code fence, if any.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Map the model's 1-based candidate indexes back to users, clamp scores and sort best first.
pub fn parse_matches(raw: &str, candidates: &[PersonSummary]) -> OrchestratorResult<Vec<MatchResult>> {
    let response: AiMatchResponse = serde_json::from_str(strip_code_fence(raw))
        .map_err(|err| OrchestratorError::ProviderResponse(format!("unexpected match format: {err}")))?;

    let mut results: Vec<MatchResult> = response
        .matches
        .into_iter()
        .filter_map(|m| {
            let candidate = usize::try_from(m.candidate_index)
                .ok()
                .and_then(|index| index.checked_sub(1))
                .and_then(|index| candidates.get(index));
            if candidate.is_none() {
                debug!(index = m.candidate_index, "dropping match with unknown candidate index");
            }
            let candidate = candidate?;
            Some(MatchResult {
                user_id: candidate.user_id,
                score: m.score.round().clamp(0.0, 100.0) as i64,
                reasoning: m.reasoning,
                first_name: candidate.first_name.clone(),
                last_name: candidate.last_name.clone(),
            })
        })
        .collect();
    results.sort_by(|a, b| b.score.cmp(&a.score));
    Ok(results)
}
