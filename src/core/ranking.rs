use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use super::types::{Category, StrategyResult};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortKey {
    #[serde(alias = "pensionDesc", alias = "pension")]
    PensionDesc,
    #[serde(alias = "pensionAsc")]
    PensionAsc,
    #[serde(alias = "inversionAsc", alias = "inversion")]
    InversionAsc,
    #[serde(alias = "inversionDesc")]
    InversionDesc,
    #[serde(alias = "roiDesc", alias = "roi", alias = "ROI")]
    RoiDesc,
    #[serde(alias = "recoveryAsc", alias = "recuperacion")]
    RecoveryAsc,
    #[serde(alias = "monthsAsc", alias = "meses")]
    MonthsAsc,
    #[serde(alias = "monthsDesc")]
    MonthsDesc,
    #[serde(alias = "umaAsc", alias = "uma")]
    UmaAsc,
    #[serde(alias = "umaDesc")]
    UmaDesc,
}

pub const DEFAULT_SORT: [SortKey; 2] = [SortKey::PensionDesc, SortKey::InversionAsc];

const PENSION_WEIGHT: f64 = 0.5;
const ROI_WEIGHT: f64 = 0.3;
const RECOVERY_WEIGHT: f64 = 0.2;

/// Missing values sort after present ones in either direction.
fn cmp_optional(a: Option<f64>, b: Option<f64>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) if descending => y.total_cmp(&x),
        (Some(x), Some(y)) => x.total_cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn compare_by(key: SortKey, a: &StrategyResult, b: &StrategyResult) -> Ordering {
    match key {
        SortKey::PensionDesc => b.pension_mensual.total_cmp(&a.pension_mensual),
        SortKey::PensionAsc => a.pension_mensual.total_cmp(&b.pension_mensual),
        SortKey::InversionAsc => a.inversion_total.total_cmp(&b.inversion_total),
        SortKey::InversionDesc => b.inversion_total.total_cmp(&a.inversion_total),
        SortKey::RoiDesc => cmp_optional(a.roi, b.roi, true),
        SortKey::RecoveryAsc => cmp_optional(a.recuperacion_meses, b.recuperacion_meses, false),
        SortKey::MonthsAsc => a.meses_m40.cmp(&b.meses_m40),
        SortKey::MonthsDesc => b.meses_m40.cmp(&a.meses_m40),
        SortKey::UmaAsc => a.uma_elegida.cmp(&b.uma_elegida),
        SortKey::UmaDesc => b.uma_elegida.cmp(&a.uma_elegida),
    }
}

fn tie_break(a: &StrategyResult, b: &StrategyResult) -> Ordering {
    a.uma_elegida
        .cmp(&b.uma_elegida)
        .then(a.meses_m40.cmp(&b.meses_m40))
        .then(a.estrategia.cmp(&b.estrategia))
}

/// Stable multi-key sort; an empty key list uses [`DEFAULT_SORT`].
pub fn sort_results(results: &mut [StrategyResult], keys: &[SortKey]) {
    let keys = if keys.is_empty() { &DEFAULT_SORT[..] } else { keys };
    results.sort_by(|a, b| {
        keys.iter()
            .fold(Ordering::Equal, |ord, key| ord.then_with(|| compare_by(*key, a, b)))
            .then_with(|| tie_break(a, b))
    });
}

#[derive(Debug, Clone, Copy)]
struct Spread {
    min: f64,
    max: f64,
}

impl Spread {
    fn of(values: impl Iterator<Item = f64>) -> Option<Self> {
        values.fold(None, |acc, v| match acc {
            None => Some(Spread { min: v, max: v }),
            Some(s) => Some(Spread {
                min: s.min.min(v),
                max: s.max.max(v),
            }),
        })
    }

    fn normalize(self, value: f64) -> f64 {
        let width = self.max - self.min;
        if width <= f64::EPSILON {
            1.0
        } else {
            ((value - self.min) / width).clamp(0.0, 1.0)
        }
    }

    /// Lower is better, e.g. months to recover the investment.
    fn normalize_inverse(self, value: f64) -> f64 {
        if self.max - self.min <= f64::EPSILON {
            1.0
        } else {
            1.0 - self.normalize(value)
        }
    }
}

pub fn category_for(puntaje: f64) -> Category {
    if puntaje >= 80.0 {
        Category::Optima
    } else if puntaje >= 60.0 {
        Category::Recomendada
    } else if puntaje >= 40.0 {
        Category::Viable
    } else {
        Category::Baja
    }
}

/// Sorts, then annotates `ranking`, `puntaje` and `categoria`.
pub fn rank(mut results: Vec<StrategyResult>, keys: &[SortKey]) -> Vec<StrategyResult> {
    sort_results(&mut results, keys);

    let pension = Spread::of(results.iter().map(|r| r.pension_mensual));
    let roi = Spread::of(results.iter().filter_map(|r| r.roi));
    let recovery = Spread::of(results.iter().filter_map(|r| r.recuperacion_meses));

    for (position, result) in results.iter_mut().enumerate() {
        let pension_score = pension.map_or(0.0, |s| s.normalize(result.pension_mensual));
        let roi_score = match (roi, result.roi) {
            (Some(s), Some(v)) => s.normalize(v),
            _ => 0.0,
        };
        let recovery_score = match (recovery, result.recuperacion_meses) {
            (Some(s), Some(v)) => s.normalize_inverse(v),
            _ => 0.0,
        };

        let puntaje = 100.0
            * (PENSION_WEIGHT * pension_score
                + ROI_WEIGHT * roi_score
                + RECOVERY_WEIGHT * recovery_score);
        let puntaje = (puntaje * 100.0).round() / 100.0;

        result.ranking = Some(position as u32 + 1);
        result.puntaje = Some(puntaje);
        result.categoria = Some(category_for(puntaje));
    }

    results
}

pub fn top_n(mut results: Vec<StrategyResult>, n: usize) -> Vec<StrategyResult> {
    results.truncate(n);
    results
}
