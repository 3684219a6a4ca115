//! Hard filters applied before any candidate reaches the model.

use chrono::{Datelike, Months, NaiveDate};
use matchmaker_database::Gender;

/// Religious levels from strictest to most secular.
pub const RELIGIOUS_LEVEL_ORDER: [&str; 10] = [
    "HAREDI_STRICT",
    "HAREDI",
    "HAREDI_MODERN",
    "DATI_LEUMI_TORANI",
    "DATI_LEUMI",
    "DATI_LEUMI_LITE",
    "MASORTI_SHOMER_SHABBAT",
    "MASORTI",
    "HILONI_MAZDAHE",
    "HILONI",
];

const LEVEL_DISTANCE: usize = 2;

/// Levels within two steps of `level`. Unknown or missing levels match everything.
pub fn compatible_religious_levels(level: Option<&str>) -> Vec<&'static str> {
    let Some(index) = level.and_then(|l| RELIGIOUS_LEVEL_ORDER.iter().position(|known| *known == l)) else {
        return RELIGIOUS_LEVEL_ORDER.to_vec();
    };
    let start = index.saturating_sub(LEVEL_DISTANCE);
    let end = (index + LEVEL_DISTANCE).min(RELIGIOUS_LEVEL_ORDER.len() - 1);
    RELIGIOUS_LEVEL_ORDER[start..=end].to_vec()
}

pub fn are_religious_levels_compatible(a: Option<&str>, b: Option<&str>) -> bool {
    match (a, b) {
        (Some(a), Some(b)) => compatible_religious_levels(Some(a)).contains(&b),
        _ => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeRange {
    pub min: i32,
    pub max: i32,
}

impl AgeRange {
    /// Men may be matched with partners up to seven years younger.
    pub fn for_target(age: i32, gender: Gender) -> Self {
        match gender {
            Gender::Male => Self { min: age - 7, max: age + 5 },
            Gender::Female => Self { min: age - 5, max: age + 5 },
        }
    }

    /// Inclusive birth date bounds `(earliest, latest)` for candidates whose age on `today` falls in range.
    pub fn birth_date_bounds(&self, today: NaiveDate) -> (NaiveDate, NaiveDate) {
        let earliest = years_before(today, self.max + 1)
            .and_then(|d| d.succ_opt())
            .unwrap_or(NaiveDate::MIN);
        let latest = years_before(today, self.min.max(0)).unwrap_or(today);
        (earliest, latest)
    }
}

fn years_before(date: NaiveDate, years: i32) -> Option<NaiveDate> {
    date.checked_sub_months(Months::new(u32::try_from(years).ok()? * 12))
}

/// Completed years between `birth_date` and `today`.
pub fn age_on(birth_date: NaiveDate, today: NaiveDate) -> i32 {
    let mut age = today.year() - birth_date.year();
    if (today.month(), today.day()) < (birth_date.month(), birth_date.day()) {
        age -= 1;
    }
    age
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn levels_are_compatible_within_two_steps() {
        assert_eq!(
            compatible_religious_levels(Some("HAREDI")),
            vec!["HAREDI_STRICT", "HAREDI", "HAREDI_MODERN", "DATI_LEUMI_TORANI"]
        );
        assert_eq!(compatible_religious_levels(Some("DATI_LEUMI")).len(), 5);
        assert_eq!(compatible_religious_levels(None).len(), 10);
        assert_eq!(compatible_religious_levels(Some("SOMETHING")).len(), 10);

        assert!(are_religious_levels_compatible(Some("MASORTI"), Some("HILONI")));
        assert!(!are_religious_levels_compatible(Some("HAREDI"), Some("MASORTI")));
        assert!(are_religious_levels_compatible(None, Some("HAREDI")));
    }

    #[test]
    fn age_ranges_depend_on_gender() {
        assert_eq!(AgeRange::for_target(30, Gender::Male), AgeRange { min: 23, max: 35 });
        assert_eq!(AgeRange::for_target(30, Gender::Female), AgeRange { min: 25, max: 35 });
    }

    #[test]
    fn birth_date_bounds_cover_whole_years() {
        let today = date(2024, 6, 15);
        let (earliest, latest) = AgeRange { min: 25, max: 35 }.birth_date_bounds(today);
        assert_eq!(earliest, date(1988, 6, 16));
        assert_eq!(latest, date(1999, 6, 15));

        assert_eq!(age_on(earliest, today), 35);
        assert_eq!(age_on(earliest.pred_opt().unwrap(), today), 36);
        assert_eq!(age_on(latest, today), 25);
        assert_eq!(age_on(latest.succ_opt().unwrap(), today), 24);
    }

    #[test]
    fn age_counts_completed_years() {
        assert_eq!(age_on(date(1995, 4, 10), date(2024, 4, 9)), 28);
        assert_eq!(age_on(date(1995, 4, 10), date(2024, 4, 10)), 29);
    }
}
