use serde::Serialize;

use super::engine::{ContributionProfile, MemberContext, evaluate_candidate, scan_window};
use super::error::{EngineError, ValidationError};
use super::tables::{MAX_UMA_MULTIPLE, MIN_UMA_MULTIPLE, Tables};
use super::types::{FamilyMemberData, IntegrationFilters, MonthsMode, StrategyKind};

/// Bisection over [1, 25] reaches 1e-6 UMA well before this.
pub const MAX_SOLVER_ITERATIONS: u32 = 200;

#[derive(Debug, Clone, Copy)]
pub struct TargetSolveConfig {
    pub target_pension: f64,
    pub months: u32,
    pub kind: StrategyKind,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
}

impl TargetSolveConfig {
    pub fn new(target_pension: f64, months: u32, kind: StrategyKind) -> Self {
        Self {
            target_pension,
            months,
            kind,
            search_min: MIN_UMA_MULTIPLE,
            search_max: MAX_UMA_MULTIPLE,
            tolerance: 0.01,
            max_iterations: 40,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSolveIteration {
    pub iteration: u32,
    pub lower_bound: f64,
    pub upper_bound: f64,
    pub candidate_multiple: f64,
    pub pension_mensual: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TargetSolveResult {
    pub target_pension: f64,
    pub months: u32,
    pub estrategia: StrategyKind,
    pub search_min: f64,
    pub search_max: f64,
    pub tolerance: f64,
    pub max_iterations: u32,
    pub solved_multiple: Option<f64>,
    pub aportacion_mensual: Option<f64>,
    pub inversion_total: Option<f64>,
    pub pension_mensual: Option<f64>,
    pub pension_sin_m40: f64,
    pub iterations: Vec<TargetSolveIteration>,
    pub converged: bool,
    pub feasible: bool,
    pub message: String,
}

/// Smallest UMA multiple whose pension reaches `config.target_pension`.
///
/// Pension is non-decreasing in the multiple, so plain bisection applies.
/// The contribution range in `filters` is not enforced here.
pub fn solve_target_pension(
    member: &FamilyMemberData,
    filters: &IntegrationFilters,
    config: TargetSolveConfig,
    tables: &Tables,
) -> Result<TargetSolveResult, EngineError> {
    validate_config(config)?;

    let fixed = IntegrationFilters {
        months: Some(config.months),
        months_mode: Some(MonthsMode::Fixed),
        ..filters.clone()
    };
    let (start, _) = scan_window(member, &fixed, tables)?;
    let ctx = MemberContext::new(member, fixed.retirement_age, start, tables)?;
    let profile = ContributionProfile::build(start, config.months, config.kind, tables);

    let pension_at = |multiple: f64| -> Result<f64, EngineError> {
        evaluate_candidate(&ctx, &profile, multiple, tables)
            .map(|outcome| outcome.pension.monthly)
            .ok_or_else(|| {
                EngineError::Computation(format!("pension undefined at {multiple:.4} UMA"))
            })
    };

    let mut iterations = Vec::new();
    let low_pension = pension_at(config.search_min)?;
    let high_pension = pension_at(config.search_max)?;

    let mut solved_multiple = None;
    let mut converged = false;
    let feasible;
    let message;

    if low_pension + 1e-9 >= config.target_pension {
        solved_multiple = Some(config.search_min);
        converged = true;
        feasible = true;
        message = "Already meets target at the lower UMA bound.".to_string();
    } else if high_pension + 1e-9 < config.target_pension {
        feasible = false;
        message = "Target pension is not reachable within the UMA search bounds.".to_string();
    } else {
        let mut lo = config.search_min;
        let mut hi = config.search_max;
        let mut it = 0;
        while it < config.max_iterations {
            it += 1;
            let mid = (lo + hi) * 0.5;
            let pension = pension_at(mid)?;
            iterations.push(TargetSolveIteration {
                iteration: it,
                lower_bound: lo,
                upper_bound: hi,
                candidate_multiple: mid,
                pension_mensual: pension,
            });

            if pension + 1e-9 >= config.target_pension {
                hi = mid;
            } else {
                lo = mid;
            }

            if (hi - lo).abs() <= config.tolerance {
                converged = true;
                solved_multiple = Some(hi);
                break;
            }
        }
        if solved_multiple.is_none() {
            solved_multiple = Some(hi);
        }
        feasible = true;
        message = if converged {
            "Solved minimum UMA level for the target pension.".to_string()
        } else {
            "Reached max iterations before tolerance was met; returning best estimate."
                .to_string()
        };
    }

    let solved = solved_multiple
        .map(|multiple| {
            evaluate_candidate(&ctx, &profile, multiple, tables).ok_or_else(|| {
                EngineError::Computation(format!("pension undefined at {multiple:.4} UMA"))
            })
        })
        .transpose()?;

    Ok(TargetSolveResult {
        target_pension: config.target_pension,
        months: config.months,
        estrategia: config.kind,
        search_min: config.search_min,
        search_max: config.search_max,
        tolerance: config.tolerance,
        max_iterations: config.max_iterations,
        solved_multiple,
        aportacion_mensual: solved.map(|o| o.first_contribution),
        inversion_total: solved.map(|o| o.inversion_total),
        pension_mensual: solved.map(|o| o.pension.monthly),
        pension_sin_m40: ctx.baseline.monthly,
        iterations,
        converged,
        feasible,
        message,
    })
}

fn validate_config(config: TargetSolveConfig) -> Result<(), ValidationError> {
    let invalid = |msg: &str| Err(ValidationError::InvalidSearch(msg.to_string()));
    if !config.target_pension.is_finite() || config.target_pension <= 0.0 {
        return invalid("targetPension must be > 0");
    }
    if !config.search_min.is_finite() || !config.search_max.is_finite() {
        return invalid("search bounds must be finite");
    }
    if config.search_min < MIN_UMA_MULTIPLE || config.search_max > MAX_UMA_MULTIPLE {
        return invalid("search bounds must stay within 1 and 25 UMA");
    }
    if config.search_max <= config.search_min {
        return invalid("searchMax must be greater than searchMin");
    }
    if !config.tolerance.is_finite() || config.tolerance <= 0.0 {
        return invalid("tolerance must be > 0");
    }
    if config.max_iterations == 0 || config.max_iterations > MAX_SOLVER_ITERATIONS {
        return invalid("maxIterations must be between 1 and 200");
    }
    Ok(())
}
