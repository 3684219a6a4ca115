//! Saved match searches and background matching jobs

use serde::{Deserialize, Serialize};

string_enum! {
    MatchingJobStatus("status") {
        Pending => "pending",
        Processing => "processing",
        Completed => "completed",
        Failed => "failed",
    }
}

/// Cached result of the last match scan for a target user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedMatchSearch {
    pub id: i64,
    pub target_user_id: i64,
    pub matchmaker_id: i64,
    /// JSON array of scored matches
    pub results: String,
    pub algorithm_version: String,
    pub candidates_scanned: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingJob {
    pub id: i64,
    pub public_id: String,
    pub target_user_id: i64,
    pub matchmaker_id: i64,
    pub method: String,
    pub status: MatchingJobStatus,
    pub progress: i64,
    pub progress_message: Option<String>,
    /// JSON array of scored matches once completed
    pub result: Option<String>,
    pub matches_found: Option<i64>,
    pub total_candidates: Option<i64>,
    pub error: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}
