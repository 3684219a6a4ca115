//! Lenient parsing of campaign JSON columns and prize progress.

use serde_json::Value;
use tracing::warn;

use crate::types::{AwardedPrize, CampaignSettings, NextPrize, PrizeTier};

/// Prize tiers stored on a campaign. Malformed JSON yields no tiers.
pub fn parse_prize_tiers(raw: Option<&str>) -> Vec<PrizeTier> {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return Vec::new();
    };
    serde_json::from_str(raw).unwrap_or_else(|err| {
        warn!(error = %err, "ignoring malformed prize tiers");
        Vec::new()
    })
}

/// Campaign settings merged over the defaults. Anything but a JSON object yields the defaults.
pub fn parse_campaign_settings(raw: Option<&str>) -> CampaignSettings {
    let Some(raw) = raw.filter(|r| !r.trim().is_empty()) else {
        return CampaignSettings::default();
    };
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => serde_json::from_value(value).unwrap_or_else(|err| {
            warn!(error = %err, "ignoring malformed campaign settings");
            CampaignSettings::default()
        }),
        Ok(_) => CampaignSettings::default(),
        Err(err) => {
            warn!(error = %err, "ignoring malformed campaign settings");
            CampaignSettings::default()
        }
    }
}

fn sorted(tiers: &[PrizeTier]) -> Vec<&PrizeTier> {
    let mut sorted: Vec<&PrizeTier> = tiers.iter().collect();
    sorted.sort_by_key(|t| t.threshold);
    sorted
}

pub fn calculate_earned_prizes(verified_count: i64, tiers: &[PrizeTier], awarded_at: &str) -> Vec<AwardedPrize> {
    sorted(tiers)
        .into_iter()
        .filter(|tier| verified_count >= tier.threshold)
        .map(|tier| AwardedPrize {
            prize: tier.prize.clone(),
            prize_value: tier.prize_value,
            threshold: tier.threshold,
            awarded_at: awarded_at.to_string(),
        })
        .collect()
}

/// Lowest tier not reached yet; `None` once every prize is earned.
pub fn next_prize(verified_count: i64, tiers: &[PrizeTier]) -> Option<NextPrize> {
    sorted(tiers)
        .into_iter()
        .find(|tier| verified_count < tier.threshold)
        .map(|tier| NextPrize {
            threshold: tier.threshold,
            prize: tier.prize.clone(),
            remaining: tier.threshold - verified_count,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    const TIERS: &str = r#"[
        {"threshold": 10, "prize": "Dinner for two", "prizeValue": 400},
        {"threshold": 3, "prize": "Coffee voucher"},
        {"threshold": 5, "prize": "Book", "icon": "book"}
    ]"#;

    #[test]
    fn prize_tiers_parse_leniently() {
        assert_eq!(parse_prize_tiers(Some(TIERS)).len(), 3);
        assert!(parse_prize_tiers(Some("not json")).is_empty());
        assert!(parse_prize_tiers(Some("{}")).is_empty());
        assert!(parse_prize_tiers(None).is_empty());
    }

    #[test]
    fn settings_merge_with_defaults() {
        let settings = parse_campaign_settings(Some(r#"{"maxReferralsPerIP": 2, "allowSelfReferral": true}"#));
        assert_eq!(settings.max_referrals_per_ip, 2);
        assert!(settings.allow_self_referral);
        assert!(settings.require_verification);

        assert_eq!(parse_campaign_settings(Some("[1,2]")), CampaignSettings::default());
        assert_eq!(parse_campaign_settings(Some("{oops")), CampaignSettings::default());
        assert_eq!(parse_campaign_settings(None).max_referrals_per_ip, 5);
    }

    #[test]
    fn progress_through_tiers() {
        let tiers = parse_prize_tiers(Some(TIERS));

        let earned = calculate_earned_prizes(5, &tiers, "2024-12-01T00:00:00.000Z");
        let thresholds: Vec<i64> = earned.iter().map(|p| p.threshold).collect();
        assert_eq!(thresholds, vec![3, 5]);

        let next = next_prize(5, &tiers).unwrap();
        assert_eq!(next.threshold, 10);
        assert_eq!(next.remaining, 5);

        assert_eq!(next_prize(0, &tiers).unwrap().prize, "Coffee voucher");
        assert!(next_prize(12, &tiers).is_none());
    }
}
