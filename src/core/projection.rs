use super::isr::isr;
use super::tables::{ROI_HORIZON_YEARS, Tables};
use super::types::ProjectionYear;

#[derive(Debug, Clone, Copy)]
pub struct ProjectionConfig {
    pub years: u32,
    pub annual_increase: f64,
    pub start_year: i32,
}

impl ProjectionConfig {
    pub fn starting(start_year: i32) -> Self {
        Self {
            years: ROI_HORIZON_YEARS,
            annual_increase: 0.05,
            start_year,
        }
    }
}

/// Gross and net pension for each year from `start_year`, one row per year.
///
/// Rows stop early if the calendar year would leave the `i32` range.
pub fn project(pension_inicial: f64, config: ProjectionConfig, tables: &Tables) -> Vec<ProjectionYear> {
    let growth = 1.0 + config.annual_increase;
    let mut rows = Vec::new();
    let mut previous_bruta = pension_inicial;

    for offset in 0..config.years {
        let Ok(step) = i32::try_from(offset) else {
            break;
        };
        let Some(anio) = config.start_year.checked_add(step) else {
            break;
        };
        let factor = growth.powi(step);
        let pension_bruta = pension_inicial * factor;
        let breakdown = isr(pension_bruta, anio, tables);

        rows.push(ProjectionYear {
            anio,
            pension_bruta,
            pension_neta: breakdown.pension_neta,
            isr_mensual: breakdown.isr_mensual,
            incremento: pension_bruta - previous_bruta,
            acumulado: (factor - 1.0) * 100.0,
        });
        previous_bruta = pension_bruta;
    }

    rows
}
