use super::tables::{MAX_UMA_MULTIPLE, MIN_UMA_MULTIPLE, Tables};

/// Daily integrated salary for a gross monthly wage.
pub fn salary_to_sdi(gross_monthly: f64, tables: &Tables) -> f64 {
    gross_monthly / tables.days_per_month * tables.integration_factor
}

pub fn sdi_to_uma_multiple(daily_sdi: f64, year: i32, tables: &Tables) -> f64 {
    daily_sdi / tables.uma_daily(year)
}

pub fn uma_multiple_to_sdi(multiple: f64, year: i32, tables: &Tables) -> f64 {
    clamp_multiple(multiple) * tables.uma_daily(year)
}

/// Monthly M40 payment for a registered salary of `multiple` UMA in `year`.
pub fn uma_multiple_to_monthly_contribution(multiple: f64, year: i32, tables: &Tables) -> f64 {
    uma_multiple_to_sdi(multiple, year, tables) * tables.days_per_month * tables.m40_rate(year)
}

/// Inverse of [`uma_multiple_to_monthly_contribution`], unclamped.
pub fn monthly_contribution_to_uma_multiple(amount: f64, year: i32, tables: &Tables) -> f64 {
    let per_uma = tables.uma_daily(year) * tables.days_per_month * tables.m40_rate(year);
    if per_uma <= 0.0 {
        return 0.0;
    }
    amount / per_uma
}

pub fn clamp_multiple(multiple: f64) -> f64 {
    multiple.clamp(MIN_UMA_MULTIPLE, MAX_UMA_MULTIPLE)
}
