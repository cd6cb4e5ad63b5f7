use super::tables::{
    DEPENDENT_UPLIFT, LEY_FOX_FACTOR, MAX_RETIREMENT_AGE, MIN_RETIREMENT_AGE, MIN_WEEKS,
    SalaryGroup, Tables,
};
use super::types::CivilStatus;

#[derive(Debug, Clone, Copy)]
pub struct PensionInputs {
    pub average_daily_sdi: f64,
    pub total_weeks: u32,
    pub retirement_age: u32,
    pub civil_status: CivilStatus,
    pub claim_year: i32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PensionOutcome {
    pub monthly: f64,
    /// Share of the average salary paid before age and uplift factors.
    pub percentage: f64,
    pub age_factor: f64,
    pub floored_at_pmg: bool,
}

/// Reduced-quantity factor for cesantía (Ley 73 art. 171); `None` below 60.
pub fn age_factor(age: u32) -> Option<f64> {
    if age < MIN_RETIREMENT_AGE {
        return None;
    }
    let years_early = MAX_RETIREMENT_AGE.saturating_sub(age);
    Some(1.0 - 0.05 * years_early as f64)
}

/// Annual increments earned past 500 weeks: a leftover of 13-26 weeks counts half, more counts full.
pub fn increment_years(total_weeks: u32) -> f64 {
    let excess = total_weeks.saturating_sub(MIN_WEEKS);
    let full = (excess / 52) as f64;
    match excess % 52 {
        0..=12 => full,
        13..=26 => full + 0.5,
        _ => full + 1.0,
    }
}

fn group_percentage(group: &SalaryGroup, years: f64) -> f64 {
    (group.basic + group.increment * years).min(1.0)
}

pub fn ley73_percentage(uma_multiple: f64, total_weeks: u32, tables: &Tables) -> f64 {
    tables
        .salary_group(uma_multiple)
        .map(|group| group_percentage(group, increment_years(total_weeks)))
        .unwrap_or(0.0)
}

/// Pension base in UMA: average salary times its art. 167 percentage.
///
/// The table's group steps would let a slightly higher salary earn a lower
/// pension, so every lower group is also evaluated at its ceiling and the
/// best value kept.
pub fn pension_base_multiple(uma_multiple: f64, total_weeks: u32, tables: &Tables) -> f64 {
    if !(uma_multiple.is_finite() && uma_multiple > 0.0) {
        return 0.0;
    }
    let years = increment_years(total_weeks);
    let own = uma_multiple * ley73_percentage(uma_multiple, total_weeks, tables);

    tables
        .ley73_groups
        .iter()
        .filter_map(|group| {
            group
                .upper_uma
                .filter(|upper| *upper < uma_multiple)
                .map(|upper| upper * group_percentage(group, years))
        })
        .fold(own, f64::max)
}

pub fn monthly_pension(inputs: PensionInputs, tables: &Tables) -> Option<PensionOutcome> {
    let age_factor = age_factor(inputs.retirement_age)?;
    let uma = tables.uma_daily(inputs.claim_year);
    let multiple = inputs.average_daily_sdi / uma;
    let base_multiple = pension_base_multiple(multiple, inputs.total_weeks, tables);

    let uplift = match inputs.civil_status {
        CivilStatus::Casado => DEPENDENT_UPLIFT,
        CivilStatus::Soltero => 1.0,
    };
    let computed =
        base_multiple * uma * tables.days_per_month * age_factor * LEY_FOX_FACTOR * uplift;
    if !computed.is_finite() {
        return None;
    }

    let pmg = tables.pmg_monthly(inputs.claim_year);
    let percentage = if multiple > 0.0 {
        base_multiple / multiple
    } else {
        0.0
    };
    Some(PensionOutcome {
        monthly: computed.max(pmg),
        percentage,
        age_factor,
        floored_at_pmg: computed < pmg,
    })
}
