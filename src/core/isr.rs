use super::tables::{ISR_EXEMPT_UMA, IsrBracket, Tables};
use super::types::IsrBreakdown;

/// Monthly pension income exempt from ISR in `year`.
pub fn exempt_threshold(year: i32, tables: &Tables) -> f64 {
    ISR_EXEMPT_UMA * tables.uma_daily(year) * tables.days_per_month
}

pub fn isr(pension_mensual: f64, year: i32, tables: &Tables) -> IsrBreakdown {
    let pension_bruta = pension_mensual.max(0.0);
    let umbral_exento = exempt_threshold(year, tables);
    let base_gravable = (pension_bruta - umbral_exento).max(0.0);
    let isr_mensual = tax_for_base(base_gravable, tables.isr_brackets(year));

    IsrBreakdown {
        pension_bruta,
        umbral_exento,
        base_gravable,
        isr_mensual,
        pension_neta: pension_bruta - isr_mensual,
    }
}

fn tax_for_base(base: f64, brackets: &[IsrBracket]) -> f64 {
    if base <= 0.0 {
        return 0.0;
    }
    let Some(bracket) = brackets
        .iter()
        .take_while(|b| b.lower_limit <= base)
        .last()
        .or_else(|| brackets.first())
    else {
        return 0.0;
    };
    let excess = (base - bracket.lower_limit).max(0.0);
    (bracket.fixed_fee + excess * bracket.rate).min(base)
}
