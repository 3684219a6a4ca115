//! # Matchmaker Users Crate
//!
//! Account registration, login and the one-time codes that move an account
//! from `PENDING_EMAIL_VERIFICATION` through `PENDING_PHONE_VERIFICATION` to
//! `ACTIVE`.
//!
//! - **Services**: [`AccountService`], [`ProfileService`] and [`VerificationService`]
//! - **Types**: [`UserError`], [`VerificationError`]
//! - **Utils**: argon2 passwords, JWT issuing, input validation

pub mod services;
pub mod types;
pub mod utils;

pub use services::{
    generate_otp, AccountService, LoginOutcome, ProfileService, ProfileUpdate, RegistrationOutcome, RegistrationRequest,
    VerificationService, MAX_HEIGHT_CM, MIN_HEIGHT_CM, RESEND_COOLDOWN_SECONDS,
};
pub use types::{UserError, UserResult, VerificationError, VerificationResult};
pub use utils::{normalize_phone, Claims, IssuedToken, JwtManager};
