use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const MIN_WEEKS: u32 = 500;
/// A century of contributions; anything above is a data entry error.
pub const MAX_WEEKS: u32 = 5_200;
pub const MIN_UMA_MULTIPLE: f64 = 1.0;
pub const MAX_UMA_MULTIPLE: f64 = 25.0;
pub const MAX_M40_MONTHS: u32 = 58;
pub const MIN_RETIREMENT_AGE: u32 = 60;
pub const MAX_RETIREMENT_AGE: u32 = 65;
/// Weeks averaged for the Ley 73 salary base.
pub const AVERAGE_WINDOW_WEEKS: f64 = 250.0;
pub const LEY_FOX_FACTOR: f64 = 1.11;
pub const DEPENDENT_UPLIFT: f64 = 1.15;
pub const ROI_HORIZON_YEARS: u32 = 20;
/// Pension income is exempt up to this many UMA (LISR art. 93, fr. IV).
pub const ISR_EXEMPT_UMA: f64 = 15.0;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("failed to read tables file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid tables JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid tables: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsrBracket {
    pub lower_limit: f64,
    pub fixed_fee: f64,
    pub rate: f64,
}

/// One row of the Ley 73 art. 167 table. `upper_uma` is inclusive; `None` is the open top group.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SalaryGroup {
    pub upper_uma: Option<f64>,
    pub basic: f64,
    pub increment: f64,
}

/// Year-keyed statutory data every engine call reads from.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Tables {
    pub uma_daily: BTreeMap<i32, f64>,
    /// Annual growth applied past the last published UMA.
    pub uma_growth_rate: f64,
    pub minimum_wage_daily: BTreeMap<i32, f64>,
    pub m40_rates: BTreeMap<i32, f64>,
    pub isr_monthly: BTreeMap<i32, Vec<IsrBracket>>,
    pub ley73_groups: Vec<SalaryGroup>,
    pub integration_factor: f64,
    pub days_per_month: f64,
}

impl Default for Tables {
    fn default() -> Self {
        Self::official()
    }
}

impl Tables {
    pub fn official() -> Self {
        let uma_daily = BTreeMap::from([
            (2017, 75.49),
            (2018, 80.60),
            (2019, 84.49),
            (2020, 86.88),
            (2021, 89.62),
            (2022, 96.22),
            (2023, 103.74),
            (2024, 108.57),
            (2025, 113.14),
            (2026, 117.31),
        ]);
        let minimum_wage_daily = BTreeMap::from([
            (2017, 80.04),
            (2018, 88.36),
            (2019, 102.68),
            (2020, 123.22),
            (2021, 141.70),
            (2022, 172.87),
            (2023, 207.44),
            (2024, 248.93),
            (2025, 278.80),
            (2026, 315.04),
        ]);
        // 2020 reform phase-in of the employer + worker share paid under M40.
        let m40_rates = BTreeMap::from([
            (2022, 0.10075),
            (2023, 0.11166),
            (2024, 0.12256),
            (2025, 0.13347),
            (2026, 0.14438),
            (2027, 0.15528),
            (2028, 0.16619),
            (2029, 0.17709),
            (2030, 0.18800),
        ]);
        // RMF Anexo 8, monthly tariff in force since 2023.
        let isr_2023 = [
            (0.01, 0.00, 0.0192),
            (746.05, 14.32, 0.0640),
            (6_332.06, 371.83, 0.1088),
            (11_128.02, 893.63, 0.1600),
            (12_935.83, 1_182.88, 0.1792),
            (15_487.72, 1_640.18, 0.2136),
            (31_236.50, 5_004.12, 0.2352),
            (49_233.01, 9_236.89, 0.3000),
            (93_993.91, 22_665.17, 0.3200),
            (125_325.21, 32_691.18, 0.3400),
            (375_975.62, 117_912.32, 0.3500),
        ]
        .into_iter()
        .map(|(lower_limit, fixed_fee, rate)| IsrBracket {
            lower_limit,
            fixed_fee,
            rate,
        })
        .collect::<Vec<_>>();
        let isr_monthly = BTreeMap::from([(2023, isr_2023)]);

        let ley73_groups = [
            (Some(1.00), 0.8000, 0.00563),
            (Some(1.25), 0.7711, 0.00814),
            (Some(1.50), 0.5818, 0.01178),
            (Some(1.75), 0.4923, 0.01430),
            (Some(2.00), 0.4267, 0.01615),
            (Some(2.25), 0.3765, 0.01756),
            (Some(2.50), 0.3368, 0.01868),
            (Some(2.75), 0.3048, 0.01958),
            (Some(3.00), 0.2783, 0.02033),
            (Some(3.25), 0.2560, 0.02096),
            (Some(3.50), 0.2370, 0.02149),
            (Some(3.75), 0.2207, 0.02195),
            (Some(4.00), 0.2065, 0.02235),
            (Some(4.25), 0.1939, 0.02271),
            (Some(4.50), 0.1829, 0.02302),
            (Some(4.75), 0.1730, 0.02330),
            (Some(5.00), 0.1641, 0.02355),
            (Some(5.25), 0.1561, 0.02377),
            (Some(5.50), 0.1488, 0.02398),
            (Some(5.75), 0.1422, 0.02416),
            (Some(6.00), 0.1362, 0.02433),
            (None, 0.1300, 0.02450),
        ]
        .into_iter()
        .map(|(upper_uma, basic, increment)| SalaryGroup {
            upper_uma,
            basic,
            increment,
        })
        .collect();

        Self {
            uma_daily,
            uma_growth_rate: 0.04,
            minimum_wage_daily,
            m40_rates,
            isr_monthly,
            ley73_groups,
            integration_factor: 1.12,
            days_per_month: 30.4,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TableError> {
        let tables: Tables = serde_json::from_str(json)?;
        tables.validate()?;
        Ok(tables)
    }

    pub fn from_path(path: &Path) -> Result<Self, TableError> {
        let raw = std::fs::read_to_string(path).map_err(|source| TableError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), TableError> {
        for (name, map) in [
            ("umaDaily", &self.uma_daily),
            ("minimumWageDaily", &self.minimum_wage_daily),
            ("m40Rates", &self.m40_rates),
        ] {
            if map.is_empty() {
                return Err(TableError::Invalid(format!("{name} must not be empty")));
            }
            if let Some((year, value)) = map.iter().find(|(_, v)| !v.is_finite() || **v <= 0.0) {
                return Err(TableError::Invalid(format!(
                    "{name}[{year}] must be > 0, got {value}"
                )));
            }
        }

        if !self.uma_growth_rate.is_finite() || self.uma_growth_rate <= -1.0 {
            return Err(TableError::Invalid("umaGrowthRate must be > -1".to_string()));
        }
        if !self.integration_factor.is_finite() || self.integration_factor < 1.0 {
            return Err(TableError::Invalid(
                "integrationFactor must be >= 1".to_string(),
            ));
        }
        if !self.days_per_month.is_finite() || self.days_per_month <= 0.0 {
            return Err(TableError::Invalid("daysPerMonth must be > 0".to_string()));
        }

        if self.isr_monthly.is_empty() {
            return Err(TableError::Invalid("isrMonthly must not be empty".to_string()));
        }
        for (year, brackets) in &self.isr_monthly {
            if brackets.is_empty() {
                return Err(TableError::Invalid(format!(
                    "isrMonthly[{year}] must not be empty"
                )));
            }
            let ordered = brackets
                .windows(2)
                .all(|pair| pair[0].lower_limit < pair[1].lower_limit);
            if !ordered {
                return Err(TableError::Invalid(format!(
                    "isrMonthly[{year}] lower limits must be strictly increasing"
                )));
            }
            if brackets
                .iter()
                .any(|b| !(0.0..=1.0).contains(&b.rate) || b.fixed_fee < 0.0)
            {
                return Err(TableError::Invalid(format!(
                    "isrMonthly[{year}] rates must be within 0..=1 and fees >= 0"
                )));
            }
        }

        let Some(last) = self.ley73_groups.last() else {
            return Err(TableError::Invalid(
                "ley73Groups must not be empty".to_string(),
            ));
        };
        if last.upper_uma.is_some() {
            return Err(TableError::Invalid(
                "the last ley73Groups row must be open-ended".to_string(),
            ));
        }
        let bounds = self
            .ley73_groups
            .iter()
            .filter_map(|g| g.upper_uma)
            .collect::<Vec<_>>();
        if bounds.len() + 1 != self.ley73_groups.len() {
            return Err(TableError::Invalid(
                "only the last ley73Groups row may be open-ended".to_string(),
            ));
        }
        if !bounds.windows(2).all(|pair| pair[0] < pair[1]) {
            return Err(TableError::Invalid(
                "ley73Groups upper bounds must be strictly increasing".to_string(),
            ));
        }
        Ok(())
    }

    /// Daily UMA for `year`; extrapolated past the last published year, first value before it.
    pub fn uma_daily(&self, year: i32) -> f64 {
        if let Some(value) = self.uma_daily.get(&year) {
            return *value;
        }
        match self.uma_daily.last_key_value() {
            Some((&last_year, &last_value)) if year > last_year => {
                last_value * (1.0 + self.uma_growth_rate).powi(year - last_year)
            }
            _ => year_floor_lookup(&self.uma_daily, year),
        }
    }

    pub fn minimum_wage_daily(&self, year: i32) -> f64 {
        year_floor_lookup(&self.minimum_wage_daily, year)
    }

    /// Pensión mínima garantizada: one monthly general minimum wage.
    pub fn pmg_monthly(&self, year: i32) -> f64 {
        self.minimum_wage_daily(year) * self.days_per_month
    }

    pub fn m40_rate(&self, year: i32) -> f64 {
        year_floor_lookup(&self.m40_rates, year)
    }

    /// Latest published bracket table not newer than `year`.
    pub fn isr_brackets(&self, year: i32) -> &[IsrBracket] {
        self.isr_monthly
            .range(..=year)
            .next_back()
            .or_else(|| self.isr_monthly.first_key_value())
            .map(|(_, brackets)| brackets.as_slice())
            .unwrap_or(&[])
    }

    pub fn salary_group(&self, uma_multiple: f64) -> Option<&SalaryGroup> {
        self.ley73_groups
            .iter()
            .find(|g| g.upper_uma.is_none_or(|upper| uma_multiple <= upper))
    }
}

fn year_floor_lookup(map: &BTreeMap<i32, f64>, year: i32) -> f64 {
    map.range(..=year)
        .next_back()
        .or_else(|| map.first_key_value())
        .map(|(_, v)| *v)
        .unwrap_or(0.0)
}
