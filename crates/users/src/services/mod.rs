//! Business logic services for accounts and verification.

pub mod account_service;
pub mod profile_service;
pub mod verification_service;

pub use account_service::{AccountService, LoginOutcome, RegistrationOutcome, RegistrationRequest};
pub use profile_service::{ProfileService, ProfileUpdate, MAX_HEIGHT_CM, MIN_HEIGHT_CM};
pub use verification_service::{generate_otp, VerificationService, RESEND_COOLDOWN_SECONDS};
