//! Database repository implementations

use std::str::FromStr;

use sqlx::sqlite::SqliteRow;
use sqlx::Row;

use crate::types::{DatabaseError, DatabaseResult};

pub mod availability_repository;
pub mod matching_repository;
pub mod profile_repository;
pub mod referral_repository;
pub mod suggestion_repository;
pub mod user_repository;
pub mod verification_repository;

pub use availability_repository::AvailabilityRepository;
pub use matching_repository::MatchingRepository;
pub use profile_repository::ProfileRepository;
pub use referral_repository::ReferralRepository;
pub use suggestion_repository::SuggestionRepository;
pub use user_repository::UserRepository;
pub use verification_repository::VerificationRepository;

pub(crate) fn enum_column<T>(row: &SqliteRow, column: &str) -> DatabaseResult<T>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: String = row.try_get(column)?;
    raw.parse()
}

pub(crate) fn optional_enum_column<T>(row: &SqliteRow, column: &str) -> DatabaseResult<Option<T>>
where
    T: FromStr<Err = DatabaseError>,
{
    let raw: Option<String> = row.try_get(column)?;
    raw.filter(|value| !value.is_empty())
        .map(|value| value.parse())
        .transpose()
}

/// Text columns holding a JSON array of strings. Malformed content reads as empty.
pub(crate) fn string_list_column(row: &SqliteRow, column: &str) -> DatabaseResult<Vec<String>> {
    let raw: Option<String> = row.try_get(column)?;
    Ok(raw
        .and_then(|value| serde_json::from_str(&value).ok())
        .unwrap_or_default())
}

/// `?, ?, ?` for binding a list in an `IN (...)` clause.
pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}
