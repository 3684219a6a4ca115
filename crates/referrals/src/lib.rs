//! Matchmaker Referrals Crate
//!
//! Referral campaigns for the Matchmaker backend: referrer signup with
//! generated codes, click tracking behind a cookie, funnel progress from click
//! to completed registration, prize tiers and the campaign leaderboard.

pub mod services;
pub mod types;
pub mod utils;

pub use services::{ReferralService, DEFAULT_LEADERBOARD_SIZE};
pub use types::*;
pub use utils::{generate_referral_code, is_valid_code, ReferralCookie};
