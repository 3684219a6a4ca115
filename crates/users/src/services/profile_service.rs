//! Candidate profile reads and self-service edits.

use chrono::{Datelike, NaiveDate, Utc};
use matchmaker_database::{
    AvailabilityStatus, Gender, Profile, ProfileDraft, ProfileRepository, ReadinessLevel, UserRepository,
};
use sqlx::SqlitePool;
use tracing::info;

use crate::types::{UserError, UserResult};

pub const MIN_HEIGHT_CM: i64 = 120;
pub const MAX_HEIGHT_CM: i64 = 220;
pub const MIN_AGE: i64 = 18;
pub const MAX_PREFERRED_AGE: i64 = 99;
pub const MAX_ABOUT_CHARS: usize = 2000;

/// Partial profile edit. `None` leaves a field untouched; an empty string clears a text field.
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub gender: Option<String>,
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
    pub character_traits: Option<Vec<String>>,
    pub hobbies: Option<Vec<String>>,
    pub preferred_age_min: Option<i64>,
    pub preferred_age_max: Option<i64>,
    pub preferred_religious_levels: Option<Vec<String>>,
    pub matching_notes: Option<String>,
    pub readiness_level: Option<String>,
    pub is_profile_visible: Option<bool>,
    pub availability_status: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    users: UserRepository,
    profiles: ProfileRepository,
}

impl ProfileService {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            users: UserRepository::new(pool.clone()),
            profiles: ProfileRepository::new(pool),
        }
    }

    pub async fn get(&self, user_id: i64) -> UserResult<Profile> {
        self.profiles
            .find_by_user_id(user_id)
            .await?
            .ok_or(UserError::ProfileNotFound)
    }

    /// Apply `update` to the user's profile, creating the row on first edit.
    ///
    /// The whole edit is validated before anything is written. The account is
    /// flagged complete once gender, birth date, city and marital status are set.
    pub async fn update(&self, user_id: i64, update: ProfileUpdate) -> UserResult<Profile> {
        self.users.find_by_id(user_id).await?.ok_or(UserError::UserNotFound)?;

        let draft = match self.profiles.find_by_user_id(user_id).await? {
            Some(existing) => draft_from(existing),
            None => ProfileDraft::default(),
        };
        let draft = apply_update(draft, update, Utc::now().date_naive())?;

        let profile = self.profiles.upsert(user_id, &draft).await?;
        let complete = profile.gender.is_some()
            && profile.birth_date.is_some()
            && profile.city.is_some()
            && profile.marital_status.is_some();
        self.users.set_profile_complete(user_id, complete).await?;

        info!(user_id, complete, "profile updated");
        Ok(profile)
    }
}

fn draft_from(profile: Profile) -> ProfileDraft {
    ProfileDraft {
        gender: profile.gender,
        birth_date: profile.birth_date,
        religious_level: profile.religious_level,
        city: profile.city,
        occupation: profile.occupation,
        education: profile.education,
        about: profile.about,
        height: profile.height,
        marital_status: profile.marital_status,
        origin: profile.origin,
        service_type: profile.service_type,
        character_traits: profile.character_traits,
        hobbies: profile.hobbies,
        preferred_age_min: profile.preferred_age_min,
        preferred_age_max: profile.preferred_age_max,
        preferred_religious_levels: profile.preferred_religious_levels,
        matching_notes: profile.matching_notes,
        ai_summary: profile.ai_summary,
        readiness_level: profile.readiness_level,
        is_profile_visible: profile.is_profile_visible,
        availability_status: profile.availability_status,
    }
}

fn text(value: String) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

fn invalid(message: impl Into<String>) -> UserError {
    UserError::Validation(message.into())
}

fn age_on(birth: NaiveDate, today: NaiveDate) -> i64 {
    let mut age = i64::from(today.year() - birth.year());
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        age -= 1;
    }
    age
}

fn apply_update(mut draft: ProfileDraft, update: ProfileUpdate, today: NaiveDate) -> UserResult<ProfileDraft> {
    if let Some(gender) = update.gender {
        draft.gender = match text(gender) {
            Some(value) => Some(value.parse::<Gender>().map_err(|_| invalid(format!("Invalid gender: {value}")))?),
            None => None,
        };
    }

    if let Some(birth_date) = update.birth_date {
        let raw = text(birth_date).ok_or(UserError::MissingField("birthDate"))?;
        let date = NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
            .map_err(|_| invalid("Birth date must be formatted YYYY-MM-DD"))?;
        if age_on(date, today) < MIN_AGE {
            return Err(invalid(format!("Must be at least {MIN_AGE} years old")));
        }
        draft.birth_date = Some(date.format("%Y-%m-%d").to_string());
    }

    if let Some(height) = update.height {
        if !(MIN_HEIGHT_CM..=MAX_HEIGHT_CM).contains(&height) {
            return Err(invalid(format!(
                "Height must be between {MIN_HEIGHT_CM} and {MAX_HEIGHT_CM} cm"
            )));
        }
        draft.height = Some(height);
    }

    if let Some(about) = update.about {
        if about.chars().count() > MAX_ABOUT_CHARS {
            return Err(invalid(format!("About text is limited to {MAX_ABOUT_CHARS} characters")));
        }
        draft.about = text(about);
    }

    for (value, slot) in [
        (update.religious_level, &mut draft.religious_level),
        (update.city, &mut draft.city),
        (update.occupation, &mut draft.occupation),
        (update.education, &mut draft.education),
        (update.marital_status, &mut draft.marital_status),
        (update.origin, &mut draft.origin),
        (update.service_type, &mut draft.service_type),
        (update.matching_notes, &mut draft.matching_notes),
    ] {
        if let Some(value) = value {
            *slot = text(value);
        }
    }

    if let Some(traits) = update.character_traits {
        draft.character_traits = traits;
    }
    if let Some(hobbies) = update.hobbies {
        draft.hobbies = hobbies;
    }
    if let Some(levels) = update.preferred_religious_levels {
        draft.preferred_religious_levels = levels;
    }

    for age in [update.preferred_age_min, update.preferred_age_max].into_iter().flatten() {
        if !(MIN_AGE..=MAX_PREFERRED_AGE).contains(&age) {
            return Err(invalid(format!(
                "Preferred ages must be between {MIN_AGE} and {MAX_PREFERRED_AGE}"
            )));
        }
    }
    if update.preferred_age_min.is_some() {
        draft.preferred_age_min = update.preferred_age_min;
    }
    if update.preferred_age_max.is_some() {
        draft.preferred_age_max = update.preferred_age_max;
    }
    if let (Some(min), Some(max)) = (draft.preferred_age_min, draft.preferred_age_max) {
        if min > max {
            return Err(invalid("Preferred minimum age is above the maximum"));
        }
    }

    if let Some(readiness) = update.readiness_level {
        draft.readiness_level = match text(readiness) {
            Some(value) => Some(
                value
                    .parse::<ReadinessLevel>()
                    .map_err(|_| invalid(format!("Invalid readiness level: {value}")))?,
            ),
            None => None,
        };
    }

    if let Some(visible) = update.is_profile_visible {
        draft.is_profile_visible = visible;
    }

    if let Some(status) = update.availability_status {
        draft.availability_status = Some(match text(status) {
            Some(value) => value
                .parse::<AvailabilityStatus>()
                .map_err(|_| invalid(format!("Invalid availability status: {value}")))?,
            None => AvailabilityStatus::Available,
        });
    }

    Ok(draft)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
    }

    #[test]
    fn height_outside_range_is_rejected() {
        for height in [119, 221, -5] {
            let update = ProfileUpdate {
                height: Some(height),
                ..ProfileUpdate::default()
            };
            let err = apply_update(ProfileDraft::default(), update, today()).unwrap_err();
            assert!(matches!(err, UserError::Validation(ref msg) if msg.contains("Height")), "{height}");
        }

        let update = ProfileUpdate {
            height: Some(220),
            ..ProfileUpdate::default()
        };
        assert_eq!(apply_update(ProfileDraft::default(), update, today()).unwrap().height, Some(220));
    }

    #[test]
    fn minors_and_malformed_birth_dates_are_rejected() {
        let young = ProfileUpdate {
            birth_date: Some("2007-06-16".into()),
            ..ProfileUpdate::default()
        };
        assert!(apply_update(ProfileDraft::default(), young, today()).is_err());

        let adult = ProfileUpdate {
            birth_date: Some("2007-06-15".into()),
            ..ProfileUpdate::default()
        };
        let draft = apply_update(ProfileDraft::default(), adult, today()).unwrap();
        assert_eq!(draft.birth_date.as_deref(), Some("2007-06-15"));

        let garbage = ProfileUpdate {
            birth_date: Some("15/06/1990".into()),
            ..ProfileUpdate::default()
        };
        assert!(apply_update(ProfileDraft::default(), garbage, today()).is_err());
    }

    #[test]
    fn empty_strings_clear_and_absent_fields_stay() {
        let draft = ProfileDraft {
            city: Some("Haifa".into()),
            occupation: Some("Nurse".into()),
            ..ProfileDraft::default()
        };
        let update = ProfileUpdate {
            city: Some("  ".into()),
            ..ProfileUpdate::default()
        };
        let draft = apply_update(draft, update, today()).unwrap();
        assert_eq!(draft.city, None);
        assert_eq!(draft.occupation.as_deref(), Some("Nurse"));
    }

    #[test]
    fn preferred_age_bounds_are_checked_against_the_merged_profile() {
        let draft = ProfileDraft {
            preferred_age_max: Some(30),
            ..ProfileDraft::default()
        };
        let update = ProfileUpdate {
            preferred_age_min: Some(35),
            ..ProfileUpdate::default()
        };
        assert!(apply_update(draft, update, today()).is_err());

        let update = ProfileUpdate {
            preferred_age_min: Some(17),
            ..ProfileUpdate::default()
        };
        assert!(apply_update(ProfileDraft::default(), update, today()).is_err());
    }

    #[test]
    fn enums_are_parsed_and_blank_availability_means_available() {
        let update = ProfileUpdate {
            gender: Some("FEMALE".into()),
            availability_status: Some(String::new()),
            readiness_level: Some("READY".into()),
            ..ProfileUpdate::default()
        };
        let draft = ProfileDraft {
            availability_status: Some(AvailabilityStatus::Paused),
            ..ProfileDraft::default()
        };
        let draft = apply_update(draft, update, today()).unwrap();
        assert_eq!(draft.gender, Some(Gender::Female));
        assert_eq!(draft.availability_status, Some(AvailabilityStatus::Available));
        assert_eq!(draft.readiness_level, Some(ReadinessLevel::Ready));

        let bad = ProfileUpdate {
            gender: Some("OTHER".into()),
            ..ProfileUpdate::default()
        };
        assert!(apply_update(ProfileDraft::default(), bad, today()).is_err());
    }

    #[test]
    fn about_is_limited() {
        let update = ProfileUpdate {
            about: Some("א".repeat(MAX_ABOUT_CHARS + 1)),
            ..ProfileUpdate::default()
        };
        assert!(apply_update(ProfileDraft::default(), update, today()).is_err());
    }
}
