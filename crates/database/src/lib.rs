//! Matchmaker Database Crate
//!
//! This crate provides database functionality for the Matchmaker backend,
//! including connection management, migrations, entities and repository
//! implementations for users, profiles, suggestions, referrals and matching jobs.

use sqlx::SqlitePool;
use matchmaker_config::DatabaseConfig;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod timestamp;
pub mod types;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::{run_migrations, MIGRATOR};

pub use repos::{
    AvailabilityRepository, MatchingRepository, ProfileRepository, ReferralRepository,
    SuggestionRepository, UserRepository, VerificationRepository,
};

pub use entities::{
    availability::{AvailabilityInquiry, AvailabilityStats, InquiryFilter, InquiryOrder, InquiryParty},
    matching::{MatchingJob, MatchingJobStatus, SavedMatchSearch},
    profile::{
        AvailabilityStatus, CandidateQuery, Gender, PriorityCategory, Profile, ProfileDraft,
        ReadinessLevel,
    },
    referral::{
        NewCampaign, NewReferral, NewReferrer, Referral, ReferralCampaign, ReferralStatus, Referrer,
        ReferrerTier,
    },
    suggestion::{
        MatchSuggestion, Meeting, NewSuggestion, StatusHistoryEntry, SuggestionPatch,
        SuggestionPriority, SuggestionStatus,
    },
    user::{NewUser, User, UserRole, UserSource, UserStatus},
    verification::{Verification, VerificationStatus, VerificationType},
};

pub use types::{DatabaseError, DatabaseResult};

/// Re-export commonly used types for convenience
pub use sqlx::{Sqlite, SqliteConnection, Transaction};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(format!("{e:#}")))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(format!("{e:#}")))?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn create_test_database() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("test.db");
        let config = DatabaseConfig {
            url: format!("sqlite://{}", db_path.display()),
            max_connections: 1,
        };

        let pool = initialize_database(&config).await.unwrap();
        (pool, temp_dir)
    }

    #[tokio::test]
    async fn test_database_initialization_creates_schema() {
        let (pool, _temp_dir) = create_test_database().await;

        let tables: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master WHERE type = 'table' AND name NOT LIKE '\\_%' ESCAPE '\\' ORDER BY name",
        )
        .fetch_all(&pool)
        .await
        .unwrap();

        for expected in [
            "availability_inquiries",
            "match_suggestions",
            "matching_jobs",
            "meetings",
            "profiles",
            "referral_campaigns",
            "referrals",
            "referrers",
            "saved_match_searches",
            "suggestion_status_history",
            "users",
            "verifications",
        ] {
            assert!(tables.iter().any(|t| t == expected), "missing table {expected}");
        }
    }

    #[tokio::test]
    async fn test_foreign_keys_enabled() {
        let (pool, _temp_dir) = create_test_database().await;

        let result: (bool,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .unwrap();

        assert!(result.0);
    }
}
