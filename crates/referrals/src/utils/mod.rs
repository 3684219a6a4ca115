pub mod codes;
pub mod cookie;
pub mod prizes;

pub use codes::{code_base, generate_referral_code, is_valid_code};
pub use cookie::ReferralCookie;
pub use prizes::{calculate_earned_prizes, next_prize, parse_campaign_settings, parse_prize_tiers};
