use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CivilStatus {
    #[serde(alias = "married")]
    Casado,
    #[serde(alias = "single")]
    Soltero,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Peso SDI held at the start-year UMA for the whole run.
    #[serde(alias = "fixed")]
    Fijo,
    /// SDI re-based to the current UMA on every 12-month anniversary of the start.
    #[serde(alias = "progressive")]
    Progresivo,
}

impl StrategyKind {
    pub const ALL: [StrategyKind; 2] = [StrategyKind::Fijo, StrategyKind::Progresivo];
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MonthsMode {
    Scan,
    Fixed,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MonthsSelection {
    Scan,
    Fixed(u32),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Optima,
    Recomendada,
    Viable,
    Baja,
}

/// Calendar month, the granularity every M40 payment is made at. Serialized as `YYYY-MM`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Deserialize, Serialize)]
#[serde(into = "String", try_from = "String")]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn new(year: i32, month: u32) -> Self {
        Self { year, month }
    }

    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn is_valid(self) -> bool {
        (1..=12).contains(&self.month)
    }

    pub fn first_day(self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
    }

    pub fn add_months(self, months: u32) -> Self {
        let index = self.year as i64 * 12 + (self.month as i64 - 1) + months as i64;
        Self {
            year: index.div_euclid(12) as i32,
            month: index.rem_euclid(12) as u32 + 1,
        }
    }

    pub fn next(self) -> Self {
        self.add_months(1)
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl From<YearMonth> for String {
    fn from(value: YearMonth) -> Self {
        value.to_string()
    }
}

impl TryFrom<String> for YearMonth {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let parsed = value
            .split_once('-')
            .and_then(|(y, m)| Some(YearMonth::new(y.parse().ok()?, m.parse().ok()?)));
        match parsed {
            Some(ym) if ym.is_valid() => Ok(ym),
            _ => Err(format!("expected YYYY-MM, got {value:?}")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FamilyMemberData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub birth_date: NaiveDate,
    pub weeks_contributed: u32,
    pub last_gross_salary: f64,
    pub civil_status: CivilStatus,
}

#[derive(Copy, Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ContributionRange {
    pub min: f64,
    pub max: f64,
}

impl ContributionRange {
    pub fn contains(&self, amount: f64) -> bool {
        amount >= self.min && amount <= self.max
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntegrationFilters {
    pub monthly_contribution_range: ContributionRange,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub months_mode: Option<MonthsMode>,
    pub retirement_age: u32,
    pub start_month: u32,
    pub start_year: i32,
}

impl IntegrationFilters {
    pub fn start(&self) -> YearMonth {
        YearMonth::new(self.start_year, self.start_month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StrategyResult {
    pub estrategia: StrategyKind,
    pub uma_elegida: u32,
    pub meses_m40: u32,
    pub inversion_total: f64,
    pub pension_mensual: f64,
    pub pension_con_aguinaldo: f64,
    #[serde(rename = "ROI")]
    pub roi: Option<f64>,
    pub recuperacion_meses: Option<f64>,
    pub aportacion_mensual: f64,
    pub aportacion_promedio: f64,
    pub semanas_totales: u32,
    pub salario_promedio: f64,
    pub porcentaje_pension: f64,
    pub factor_edad: f64,
    pub pension_sin_m40: f64,
    pub edad_jubilacion: u32,
    pub fecha_inicio: YearMonth,
    pub fecha_fin: YearMonth,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ranking: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub puntaje: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub categoria: Option<Category>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IsrBreakdown {
    pub pension_bruta: f64,
    pub umbral_exento: f64,
    pub base_gravable: f64,
    pub isr_mensual: f64,
    pub pension_neta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionYear {
    pub anio: i32,
    pub pension_bruta: f64,
    pub pension_neta: f64,
    pub isr_mensual: f64,
    pub incremento: f64,
    pub acumulado: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimalStart {
    pub month: u32,
    pub year: i32,
    pub rationale: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthsWindow {
    pub max_months: u32,
    pub limited: bool,
}
