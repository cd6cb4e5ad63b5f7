use serde::Serialize;
use thiserror::Error;

use super::types::YearMonth;

/// Input problems the user has to fix before anything can be calculated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("at least 500 contributed weeks are required, got {weeks}")]
    InsufficientWeeks { weeks: u32 },
    #[error("contributed weeks cannot exceed 5200, got {weeks}")]
    ExcessiveWeeks { weeks: u32 },
    #[error("last gross salary must be a positive amount")]
    InvalidSalary,
    #[error("salary integrates to {multiple:.2} UMA, above the legal cap of 25 UMA")]
    ExceedsLegalUmaCap { multiple: f64 },
    #[error("retirement age must be between 60 and 65, got {0}")]
    RetirementAgeOutOfRange(u32),
    #[error("start month must be between 1 and 12, got {0}")]
    InvalidStartMonth(u32),
    #[error("months must be between 1 and 58, got {0}")]
    MonthsOutOfRange(u32),
    #[error("either months or monthsMode=scan is required")]
    MissingMonths,
    #[error("invalid monthly contribution range: {0}")]
    InvalidContributionRange(String),
    #[error("invalid target search: {0}")]
    InvalidSearch(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::InsufficientWeeks { .. } => "InsufficientWeeks",
            ValidationError::ExcessiveWeeks { .. } => "ExcessiveWeeks",
            ValidationError::InvalidSalary => "InvalidSalary",
            ValidationError::ExceedsLegalUmaCap { .. } => "ExceedsLegalUMACap",
            ValidationError::RetirementAgeOutOfRange(_) => "RetirementAgeOutOfRange",
            ValidationError::InvalidStartMonth(_) => "InvalidStartMonth",
            ValidationError::MonthsOutOfRange(_) => "MonthsOutOfRange",
            ValidationError::MissingMonths => "MissingMonths",
            ValidationError::InvalidContributionRange(_) => "InvalidContributionRange",
            ValidationError::InvalidSearch(_) => "InvalidSearch",
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    InvalidInput,
    NoResults,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("no Modalidad 40 window between {start} and retirement at age {retirement_age}")]
    InfeasibleWindow { start: YearMonth, retirement_age: u32 },
    #[error("{requested} months do not fit the {available}-month window before retirement")]
    MonthsExceedWindow { requested: u32, available: u32 },
    #[error("monthly contribution range {min:.2}-{max:.2} does not reach any UMA level")]
    NoAffordableLevel { min: f64, max: f64 },
    #[error("computation failed: {0}")]
    Computation(String),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::Validation(_) => ErrorKind::InvalidInput,
            EngineError::InfeasibleWindow { .. }
            | EngineError::MonthsExceedWindow { .. }
            | EngineError::NoAffordableLevel { .. } => ErrorKind::NoResults,
            EngineError::Computation(_) => ErrorKind::Internal,
        }
    }
}
