use super::error::ValidationError;
use super::sdi::{salary_to_sdi, sdi_to_uma_multiple};
use super::tables::{
    MAX_M40_MONTHS, MAX_RETIREMENT_AGE, MAX_UMA_MULTIPLE, MAX_WEEKS, MIN_RETIREMENT_AGE, MIN_WEEKS,
    Tables,
};
use super::types::{FamilyMemberData, IntegrationFilters, MonthsMode, MonthsSelection};

/// Eligibility rules, first failure wins.
pub fn validate_member(
    member: &FamilyMemberData,
    year: i32,
    tables: &Tables,
) -> Result<(), ValidationError> {
    if member.weeks_contributed < MIN_WEEKS {
        return Err(ValidationError::InsufficientWeeks {
            weeks: member.weeks_contributed,
        });
    }
    if member.weeks_contributed > MAX_WEEKS {
        return Err(ValidationError::ExcessiveWeeks {
            weeks: member.weeks_contributed,
        });
    }

    if !member.last_gross_salary.is_finite() || member.last_gross_salary <= 0.0 {
        return Err(ValidationError::InvalidSalary);
    }

    let multiple = sdi_to_uma_multiple(
        salary_to_sdi(member.last_gross_salary, tables),
        year,
        tables,
    );
    if multiple > MAX_UMA_MULTIPLE {
        return Err(ValidationError::ExceedsLegalUmaCap { multiple });
    }

    Ok(())
}

pub fn validate_filters(filters: &IntegrationFilters) -> Result<MonthsSelection, ValidationError> {
    if !(MIN_RETIREMENT_AGE..=MAX_RETIREMENT_AGE).contains(&filters.retirement_age) {
        return Err(ValidationError::RetirementAgeOutOfRange(
            filters.retirement_age,
        ));
    }

    if !(1..=12).contains(&filters.start_month) {
        return Err(ValidationError::InvalidStartMonth(filters.start_month));
    }

    let range = filters.monthly_contribution_range;
    if !range.min.is_finite() || !range.max.is_finite() {
        return Err(ValidationError::InvalidContributionRange(
            "bounds must be finite".to_string(),
        ));
    }
    if range.min < 0.0 || range.max <= 0.0 {
        return Err(ValidationError::InvalidContributionRange(
            "min must be >= 0 and max must be > 0".to_string(),
        ));
    }
    if range.min > range.max {
        return Err(ValidationError::InvalidContributionRange(
            "min cannot exceed max".to_string(),
        ));
    }

    let selection = match (filters.months_mode, filters.months) {
        (Some(MonthsMode::Scan), _) => MonthsSelection::Scan,
        (_, Some(months)) => MonthsSelection::Fixed(months),
        (Some(MonthsMode::Fixed), None) | (None, None) => {
            return Err(ValidationError::MissingMonths);
        }
    };
    if let MonthsSelection::Fixed(months) = selection {
        if !(1..=MAX_M40_MONTHS).contains(&months) {
            return Err(ValidationError::MonthsOutOfRange(months));
        }
    }

    Ok(selection)
}
