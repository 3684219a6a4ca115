//! User entity definitions

use serde::{Deserialize, Serialize};

string_enum! {
    /// Role of an account on the platform
    UserRole("role") {
        Candidate => "CANDIDATE",
        Matchmaker => "MATCHMAKER",
        Admin => "ADMIN",
    }
}

string_enum! {
    /// Account lifecycle, driven by email and phone verification
    UserStatus("status") {
        PendingEmailVerification => "PENDING_EMAIL_VERIFICATION",
        PendingPhoneVerification => "PENDING_PHONE_VERIFICATION",
        Active => "ACTIVE",
        Inactive => "INACTIVE",
        Blocked => "BLOCKED",
    }
}

string_enum! {
    UserSource("source") {
        Registration => "REGISTRATION",
        ManualEntry => "MANUAL_ENTRY",
    }
}

impl UserRole {
    /// Matchmakers and admins may operate the console.
    pub fn is_staff(&self) -> bool {
        matches!(self, UserRole::Matchmaker | UserRole::Admin)
    }
}

/// User entity representing an account in the system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub public_id: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub is_verified: bool,
    pub is_phone_verified: bool,
    pub is_profile_complete: bool,
    pub source: UserSource,
    pub language: String,
    pub marketing_consent: bool,
    pub terms_accepted_at: Option<String>,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name).trim().to_string()
    }
}

/// Values for inserting a new user row
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub source: UserSource,
    pub language: String,
    pub marketing_consent: bool,
    pub terms_accepted: bool,
}

impl NewUser {
    /// A self-registered candidate waiting for email verification.
    pub fn candidate(email: impl Into<String>, first_name: impl Into<String>, last_name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password_hash: None,
            first_name: first_name.into(),
            last_name: last_name.into(),
            phone: None,
            role: UserRole::Candidate,
            status: UserStatus::PendingEmailVerification,
            source: UserSource::Registration,
            language: "he".to_string(),
            marketing_consent: false,
            terms_accepted: true,
        }
    }
}
