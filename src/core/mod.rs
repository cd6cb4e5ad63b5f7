mod dates;
mod engine;
mod error;
mod isr;
mod pension;
mod projection;
mod ranking;
mod sdi;
mod solver;
mod tables;
mod types;
mod validator;

pub use dates::{age, max_months_m40, optimal_start_date, retirement_date};
pub use engine::{
    calculate_strategies, enumerate, filter_by_monthly_contribution, filter_by_months, uma_range,
};
pub use error::{EngineError, ErrorKind, ValidationError};
pub use isr::{exempt_threshold, isr};
pub use pension::{PensionInputs, PensionOutcome, age_factor, ley73_percentage, monthly_pension};
pub use projection::{ProjectionConfig, project};
pub use ranking::{DEFAULT_SORT, SortKey, rank, sort_results, top_n};
pub use sdi::{
    monthly_contribution_to_uma_multiple, salary_to_sdi, sdi_to_uma_multiple,
    uma_multiple_to_monthly_contribution, uma_multiple_to_sdi,
};
pub use solver::{
    MAX_SOLVER_ITERATIONS, TargetSolveConfig, TargetSolveIteration, TargetSolveResult,
    solve_target_pension,
};
pub use tables::{
    MAX_M40_MONTHS, MAX_RETIREMENT_AGE, MAX_UMA_MULTIPLE, MAX_WEEKS, MIN_RETIREMENT_AGE,
    MIN_UMA_MULTIPLE, MIN_WEEKS, TableError, Tables,
};
pub use types::{
    Category, CivilStatus, ContributionRange, FamilyMemberData, IntegrationFilters, IsrBreakdown,
    MonthsMode, MonthsWindow, OptimalStart, ProjectionYear, StrategyKind, StrategyResult,
    YearMonth,
};
pub use validator::{validate_filters, validate_member};
