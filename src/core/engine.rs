use std::ops::RangeInclusive;

use chrono::Datelike;
use tracing::{debug, info, warn};

use super::dates::{max_months_m40, retirement_date};
use super::error::EngineError;
use super::pension::{PensionInputs, PensionOutcome, monthly_pension};
use super::ranking::{SortKey, rank};
use super::sdi::{monthly_contribution_to_uma_multiple, salary_to_sdi};
use super::tables::{
    AVERAGE_WINDOW_WEEKS, MAX_UMA_MULTIPLE, MIN_UMA_MULTIPLE, ROI_HORIZON_YEARS, Tables,
};
use super::types::{
    CivilStatus, ContributionRange, FamilyMemberData, IntegrationFilters, MonthsSelection,
    StrategyKind, StrategyResult, YearMonth,
};
use super::validator::{validate_filters, validate_member};

/// Per-UMA-multiple summary of one (start, months, kind) payment schedule.
///
/// Contributions and registered salaries are linear in the chosen multiple,
/// so a schedule is walked once and every UMA level is priced in O(1).
#[derive(Debug, Clone, Copy)]
pub struct ContributionProfile {
    pub start: YearMonth,
    pub end: YearMonth,
    pub months: u32,
    pub kind: StrategyKind,
    contribution_per_multiple: f64,
    first_contribution_per_multiple: f64,
    window_sdi_weeks_per_multiple: f64,
    window_weeks: f64,
    total_weeks: f64,
}

impl ContributionProfile {
    pub fn build(start: YearMonth, months: u32, kind: StrategyKind, tables: &Tables) -> Self {
        let start_uma = tables.uma_daily(start.year);
        let weeks_per_month = tables.days_per_month / 7.0;

        let mut contribution = 0.0;
        let mut first_contribution = 0.0;
        let mut window_sdi_weeks = 0.0;
        let mut window_weeks = 0.0;

        // Newest month first: the averaging window only reaches back 250 weeks.
        for index in (0..months).rev() {
            let month = start.add_months(index);
            let registered_uma = match kind {
                StrategyKind::Fijo => start_uma,
                StrategyKind::Progresivo => {
                    tables.uma_daily(start.add_months(index / 12 * 12).year)
                }
            };
            let payment = registered_uma * tables.days_per_month * tables.m40_rate(month.year);
            contribution += payment;
            if index == 0 {
                first_contribution = payment;
            }

            let counted = weeks_per_month.min((AVERAGE_WINDOW_WEEKS - window_weeks).max(0.0));
            window_weeks += counted;
            window_sdi_weeks += counted * registered_uma;
        }

        Self {
            start,
            end: start.add_months(months.saturating_sub(1)),
            months,
            kind,
            contribution_per_multiple: contribution,
            first_contribution_per_multiple: first_contribution,
            window_sdi_weeks_per_multiple: window_sdi_weeks,
            window_weeks,
            total_weeks: months as f64 * weeks_per_month,
        }
    }

    pub fn total_contribution(&self, multiple: f64) -> f64 {
        multiple * self.contribution_per_multiple
    }

    pub fn first_contribution(&self, multiple: f64) -> f64 {
        multiple * self.first_contribution_per_multiple
    }

    /// Weeks-weighted daily SDI over the averaging window, own salary filling the rest.
    pub fn average_daily_sdi(&self, multiple: f64, own_sdi: f64) -> f64 {
        let own_weeks = (AVERAGE_WINDOW_WEEKS - self.window_weeks).max(0.0);
        (multiple * self.window_sdi_weeks_per_multiple + own_sdi * own_weeks)
            / AVERAGE_WINDOW_WEEKS
    }

    pub fn m40_weeks(&self) -> u32 {
        self.total_weeks.floor() as u32
    }
}

/// Member-derived values shared by every candidate of one request.
#[derive(Debug, Clone, Copy)]
pub struct MemberContext {
    pub own_sdi: f64,
    pub weeks_contributed: u32,
    pub civil_status: CivilStatus,
    pub retirement_age: u32,
    pub claim_year: i32,
    pub baseline: PensionOutcome,
}

impl MemberContext {
    pub fn new(
        member: &FamilyMemberData,
        retirement_age: u32,
        start: YearMonth,
        tables: &Tables,
    ) -> Result<Self, EngineError> {
        let claim_year = retirement_date(member.birth_date, retirement_age)
            .map(|date| date.year())
            .ok_or_else(|| {
                EngineError::Computation("retirement date is out of range".to_string())
            })?;
        let own_sdi = salary_to_sdi(member.last_gross_salary, tables)
            .min(MAX_UMA_MULTIPLE * tables.uma_daily(start.year));

        let baseline = monthly_pension(
            PensionInputs {
                average_daily_sdi: own_sdi,
                total_weeks: member.weeks_contributed,
                retirement_age,
                civil_status: member.civil_status,
                claim_year,
            },
            tables,
        )
        .ok_or_else(|| {
            EngineError::Computation("baseline pension could not be computed".to_string())
        })?;

        Ok(Self {
            own_sdi,
            weeks_contributed: member.weeks_contributed,
            civil_status: member.civil_status,
            retirement_age,
            claim_year,
            baseline,
        })
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CandidateOutcome {
    pub multiple: f64,
    pub inversion_total: f64,
    pub first_contribution: f64,
    pub average_daily_sdi: f64,
    pub total_weeks: u32,
    pub pension: PensionOutcome,
}

pub fn evaluate_candidate(
    ctx: &MemberContext,
    profile: &ContributionProfile,
    multiple: f64,
    tables: &Tables,
) -> Option<CandidateOutcome> {
    let average_daily_sdi = profile.average_daily_sdi(multiple, ctx.own_sdi);
    let total_weeks = ctx.weeks_contributed.saturating_add(profile.m40_weeks());
    let pension = monthly_pension(
        PensionInputs {
            average_daily_sdi,
            total_weeks,
            retirement_age: ctx.retirement_age,
            civil_status: ctx.civil_status,
            claim_year: ctx.claim_year,
        },
        tables,
    )?;
    let inversion_total = profile.total_contribution(multiple);
    if !inversion_total.is_finite() {
        return None;
    }

    Some(CandidateOutcome {
        multiple,
        inversion_total,
        first_contribution: profile.first_contribution(multiple),
        average_daily_sdi,
        total_weeks,
        pension,
    })
}

fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

pub fn build_strategy_result(
    ctx: &MemberContext,
    profile: &ContributionProfile,
    uma: u32,
    outcome: &CandidateOutcome,
) -> StrategyResult {
    let pension = outcome.pension.monthly;
    let baseline = ctx.baseline.monthly;
    let gain = pension - baseline;
    let horizon_months = 12.0 * ROI_HORIZON_YEARS as f64;

    let roi = if outcome.inversion_total > 0.0 {
        finite((pension * horizon_months - baseline * horizon_months) / outcome.inversion_total)
    } else {
        None
    };
    let recuperacion_meses = if gain > 0.0 {
        finite(outcome.inversion_total / gain)
    } else {
        None
    };

    StrategyResult {
        estrategia: profile.kind,
        uma_elegida: uma,
        meses_m40: profile.months,
        inversion_total: outcome.inversion_total,
        pension_mensual: pension,
        pension_con_aguinaldo: pension,
        roi,
        recuperacion_meses,
        aportacion_mensual: outcome.first_contribution,
        aportacion_promedio: outcome.inversion_total / profile.months.max(1) as f64,
        semanas_totales: outcome.total_weeks,
        salario_promedio: outcome.average_daily_sdi,
        porcentaje_pension: outcome.pension.percentage,
        factor_edad: outcome.pension.age_factor,
        pension_sin_m40: baseline,
        edad_jubilacion: ctx.retirement_age,
        fecha_inicio: profile.start,
        fecha_fin: profile.end,
        ranking: None,
        puntaje: None,
        categoria: None,
    }
}

/// Whole UMA levels whose first monthly payment falls inside `range`.
pub fn uma_range(
    range: ContributionRange,
    year: i32,
    tables: &Tables,
) -> Option<RangeInclusive<u32>> {
    let low = (monthly_contribution_to_uma_multiple(range.min, year, tables) - 1e-9)
        .ceil()
        .max(MIN_UMA_MULTIPLE);
    let high = (monthly_contribution_to_uma_multiple(range.max, year, tables) + 1e-9)
        .floor()
        .min(MAX_UMA_MULTIPLE);
    if !(low.is_finite() && high.is_finite()) || low > high {
        return None;
    }
    Some(low as u32..=high as u32)
}

fn months_range(
    selection: MonthsSelection,
    available: u32,
) -> Result<RangeInclusive<u32>, EngineError> {
    match selection {
        MonthsSelection::Scan => Ok(1..=available),
        MonthsSelection::Fixed(months) if months <= available => Ok(months..=months),
        MonthsSelection::Fixed(months) => Err(EngineError::MonthsExceedWindow {
            requested: months,
            available,
        }),
    }
}

/// Validates the request and resolves its start month and the M40 durations to try.
pub fn scan_window(
    member: &FamilyMemberData,
    filters: &IntegrationFilters,
    tables: &Tables,
) -> Result<(YearMonth, RangeInclusive<u32>), EngineError> {
    let selection = validate_filters(filters)?;
    validate_member(member, filters.start_year, tables)?;

    let start = filters.start();
    let window = max_months_m40(member.birth_date, filters.retirement_age, start);
    if window.max_months == 0 {
        return Err(EngineError::InfeasibleWindow {
            start,
            retirement_age: filters.retirement_age,
        });
    }
    Ok((start, months_range(selection, window.max_months)?))
}

/// Every (UMA, months, kind) candidate allowed by `filters`, ordered by
/// UMA, then months, then `fijo` before `progresivo`.
pub fn enumerate(
    member: &FamilyMemberData,
    filters: &IntegrationFilters,
    tables: &Tables,
) -> Result<Vec<StrategyResult>, EngineError> {
    let (start, months) = scan_window(member, filters, tables)?;
    let range = filters.monthly_contribution_range;
    let umas = uma_range(range, start.year, tables).ok_or(EngineError::NoAffordableLevel {
        min: range.min,
        max: range.max,
    })?;

    let ctx = MemberContext::new(member, filters.retirement_age, start, tables)?;
    let profiles = months
        .flat_map(|m| {
            StrategyKind::ALL.map(|kind| ContributionProfile::build(start, m, kind, tables))
        })
        .collect::<Vec<_>>();
    debug!(
        uma_min = umas.start(),
        uma_max = umas.end(),
        profiles = profiles.len(),
        "scanning modalidad 40 candidates"
    );

    let mut results = Vec::with_capacity(umas.clone().count() * profiles.len());
    let mut skipped = 0_usize;
    for uma in umas {
        for profile in &profiles {
            match evaluate_candidate(&ctx, profile, uma as f64, tables) {
                Some(outcome) => {
                    results.push(build_strategy_result(&ctx, profile, uma, &outcome))
                }
                None => skipped += 1,
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, "skipped candidates with non-finite results");
    }

    Ok(results)
}

/// Validate, enumerate and rank in one call.
pub fn calculate_strategies(
    member: &FamilyMemberData,
    filters: &IntegrationFilters,
    tables: &Tables,
    sort: &[SortKey],
) -> Result<Vec<StrategyResult>, EngineError> {
    let candidates = enumerate(member, filters, tables)?;
    let ranked = rank(candidates, sort);
    info!(
        member = member.id.as_deref().unwrap_or("-"),
        candidates = ranked.len(),
        best_pension = ranked.first().map(|r| r.pension_mensual),
        "calculated strategies"
    );
    Ok(ranked)
}

pub fn filter_by_months(results: Vec<StrategyResult>, months: u32) -> Vec<StrategyResult> {
    results
        .into_iter()
        .filter(|r| r.meses_m40 == months)
        .collect()
}

pub fn filter_by_monthly_contribution(
    results: Vec<StrategyResult>,
    range: ContributionRange,
) -> Vec<StrategyResult> {
    results
        .into_iter()
        .filter(|r| range.contains(r.aportacion_mensual))
        .collect()
}
