pub mod referral_service;

pub use referral_service::{ReferralService, DEFAULT_LEADERBOARD_SIZE};
