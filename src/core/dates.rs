use chrono::{Datelike, Months, NaiveDate};

use super::tables::MAX_M40_MONTHS;
use super::types::{MonthsWindow, OptimalStart, YearMonth};

/// Age in whole years at which most insured people start M40 so the last
/// 250 weeks before a 60-65 claim are all voluntary contributions.
pub const OPTIMAL_START_AGE: u32 = 55;

pub fn age(birth_date: NaiveDate, at: NaiveDate) -> u32 {
    let mut years = at.year() - birth_date.year();
    if (at.month(), at.day()) < (birth_date.month(), birth_date.day()) {
        years -= 1;
    }
    years.max(0) as u32
}

/// Birthday `years` after `birth_date`; Feb 29 births land on Feb 28 in common years.
pub fn add_years(birth_date: NaiveDate, years: u32) -> Option<NaiveDate> {
    birth_date.checked_add_months(Months::new(years.checked_mul(12)?))
}

pub fn retirement_date(birth_date: NaiveDate, retirement_age: u32) -> Option<NaiveDate> {
    add_years(birth_date, retirement_age)
}

/// Whole calendar months from `from` to `to`, negative when `to` is earlier.
pub fn whole_months_between(from: NaiveDate, to: NaiveDate) -> i64 {
    let mut months =
        (to.year() as i64 - from.year() as i64) * 12 + (to.month() as i64 - from.month() as i64);
    if months > 0 && to.day() < from.day() {
        months -= 1;
    } else if months < 0 && to.day() > from.day() {
        months += 1;
    }
    months
}

pub fn optimal_start_date(birth_date: NaiveDate, today: NaiveDate) -> OptimalStart {
    let current_age = age(birth_date, today);
    let fifty_fifth = add_years(birth_date, OPTIMAL_START_AGE);

    match fifty_fifth {
        Some(birthday) if current_age < OPTIMAL_START_AGE => {
            let target = YearMonth::of(birthday).next();
            OptimalStart {
                month: target.month,
                year: target.year,
                rationale: format!(
                    "Empezar el mes siguiente a cumplir {OPTIMAL_START_AGE} años permite que las \
                     últimas 250 semanas antes de los 60 sean de Modalidad 40."
                ),
            }
        }
        _ => {
            let target = YearMonth::of(today).next();
            OptimalStart {
                month: target.month,
                year: target.year,
                rationale: format!(
                    "Con {current_age} años conviene iniciar los trámites cuanto antes, \
                     a partir del próximo mes."
                ),
            }
        }
    }
}

pub fn max_months_m40(
    birth_date: NaiveDate,
    retirement_age: u32,
    start: YearMonth,
) -> MonthsWindow {
    let (Some(start_date), Some(retirement)) = (
        start.first_day(),
        retirement_date(birth_date, retirement_age),
    ) else {
        return MonthsWindow {
            max_months: 0,
            limited: false,
        };
    };

    let diff = whole_months_between(start_date, retirement);
    MonthsWindow {
        max_months: diff.clamp(0, MAX_M40_MONTHS as i64) as u32,
        limited: diff > MAX_M40_MONTHS as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
    }

    #[test]
    fn age_is_calendar_exact() {
        let birth = date(1969, 6, 15);
        assert_eq!(age(birth, date(2025, 6, 14)), 55);
        assert_eq!(age(birth, date(2025, 6, 15)), 56);
        assert_eq!(age(birth, date(1960, 1, 1)), 0);
    }

    #[test]
    fn leap_day_birthday_falls_back_to_feb_28() {
        let birth = date(1964, 2, 29);
        assert_eq!(add_years(birth, 61), Some(date(2025, 2, 28)));
        assert_eq!(add_years(birth, 60), Some(date(2024, 2, 29)));
    }

    #[test]
    fn optimal_start_before_55_is_month_after_birthday() {
        let start = optimal_start_date(date(1975, 12, 10), date(2025, 3, 1));
        assert_eq!((start.month, start.year), (1, 2031));
        assert!(!start.rationale.is_empty());
    }

    #[test]
    fn optimal_start_after_55_is_next_calendar_month() {
        let start = optimal_start_date(date(1965, 4, 2), date(2025, 12, 18));
        assert_eq!((start.month, start.year), (1, 2026));

        let start = optimal_start_date(date(1965, 4, 2), date(2025, 7, 31));
        assert_eq!((start.month, start.year), (8, 2025));
    }

    #[test]
    fn max_months_caps_at_legal_limit() {
        let window = max_months_m40(date(1969, 1, 1), 65, YearMonth::new(2025, 2));
        assert_eq!(window.max_months, 58);
        assert!(window.limited);
    }

    #[test]
    fn max_months_counts_months_until_retirement() {
        let window = max_months_m40(date(1969, 1, 1), 60, YearMonth::new(2026, 1));
        assert_eq!(window.max_months, 36);
        assert!(!window.limited);
    }

    #[test]
    fn max_months_is_zero_when_start_is_at_or_after_retirement() {
        let window = max_months_m40(date(1969, 1, 1), 60, YearMonth::new(2029, 2));
        assert_eq!(window.max_months, 0);
        let window = max_months_m40(date(1969, 1, 1), 60, YearMonth::new(2029, 1));
        assert_eq!(window.max_months, 0);
    }

    #[test]
    fn max_months_handles_invalid_start_month() {
        let window = max_months_m40(date(1969, 1, 1), 65, YearMonth::new(2025, 13));
        assert_eq!(window.max_months, 0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_max_months_never_exceeds_legal_cap(
            birth_year in 1950i32..1990,
            birth_month in 1u32..13,
            birth_day in 1u32..29,
            retirement_age in 60u32..66,
            start_year in 2000i32..2060,
            start_month in 1u32..13
        ) {
            let birth = date(birth_year, birth_month, birth_day);
            let window = max_months_m40(birth, retirement_age, YearMonth::new(start_year, start_month));
            prop_assert!(window.max_months <= MAX_M40_MONTHS);
            if window.limited {
                prop_assert_eq!(window.max_months, MAX_M40_MONTHS);
            }
        }

        #[test]
        fn prop_age_increases_by_one_per_year(
            birth_year in 1940i32..2000,
            birth_month in 1u32..13,
            birth_day in 1u32..29,
            years in 1u32..80
        ) {
            let birth = date(birth_year, birth_month, birth_day);
            let birthday = add_years(birth, years).expect("in range");
            prop_assert_eq!(age(birth, birthday), years);
        }
    }
}
