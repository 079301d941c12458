#![forbid(unsafe_code)]

use ctc_contracts::aggregate::{AggregateImpactResult, IncomeBracket};
use ctc_contracts::impact::{BenefitAtIncome, HouseholdImpactResult};
use ctc_contracts::DataIntegrityWarning;

/// Relative tolerance for reconciliation checks, with an absolute floor of
/// 1.0 so near-zero expected values don't demand sub-cent agreement.
pub const RELATIVE_TOLERANCE: f64 = 1e-6;

fn reconciles(expected: f64, actual: f64) -> bool {
    (expected - actual).abs() <= RELATIVE_TOLERANCE * expected.abs().max(1.0)
}

/// Percent change with the zero-baseline guard: a zero or non-finite
/// baseline reports 0% instead of propagating NaN/infinity into the UI.
pub fn percent_change(baseline: f64, reform: f64) -> f64 {
    if baseline == 0.0 || !baseline.is_finite() || !reform.is_finite() {
        return 0.0;
    }
    (reform - baseline) / baseline * 100.0
}

/// Baseline/reform pair for one poverty cohort, with the derived deltas the
/// UI renders. `percent_change` is recomputed here with the zero guard; the
/// backend's own percent field is not trusted for display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PovertyDelta {
    pub baseline_rate: f64,
    pub reform_rate: f64,
    pub change_pp: f64,
    pub percent_change: f64,
}

pub fn poverty_delta(baseline_rate: f64, reform_rate: f64) -> PovertyDelta {
    PovertyDelta {
        baseline_rate,
        reform_rate,
        change_pp: reform_rate - baseline_rate,
        percent_change: percent_change(baseline_rate, reform_rate),
    }
}

/// Linear interpolation over an ascending sample grid, clamped at both ends
/// (the `np.interp` convention the reference sweep math uses).
pub fn interpolate_at(xs: &[f64], ys: &[f64], x: f64) -> f64 {
    debug_assert_eq!(xs.len(), ys.len());
    if xs.is_empty() {
        return 0.0;
    }
    if x <= xs[0] {
        return ys[0];
    }
    let last = xs.len() - 1;
    if x >= xs[last] {
        return ys[last];
    }
    let hi = xs.partition_point(|&v| v < x).min(last);
    let lo = hi - 1;
    let (x0, x1) = (xs[lo], xs[hi]);
    if x1 == x0 {
        return ys[hi];
    }
    let t = (x - x0) / (x1 - x0);
    ys[lo] + t * (ys[hi] - ys[lo])
}

/// Recompute the single-point breakdown at an adjusted income by
/// interpolating the sweep arrays; lets the UI move the income marker
/// without a new remote call.
pub fn benefit_at(result: &HouseholdImpactResult, income: f64) -> BenefitAtIncome {
    let baseline = interpolate_at(&result.income_range, &result.ctc_baseline_range, income);
    let reform = interpolate_at(&result.income_range, &result.ctc_reform_range, income);
    BenefitAtIncome {
        baseline,
        reform,
        difference: reform - baseline,
        ctc_component: interpolate_at(&result.income_range, &result.ctc_component, income),
        exemption_tax_benefit: interpolate_at(
            &result.income_range,
            &result.exemption_tax_benefit,
            income,
        ),
    }
}

/// Breakdown consistency: the components must sum to the headline
/// difference, and the difference must equal reform minus baseline. A
/// violation is surfaced, never averaged away; the headline number stays
/// authoritative either way.
pub fn check_breakdown(benefit: &BenefitAtIncome) -> Result<(), DataIntegrityWarning> {
    let headline = benefit.reform - benefit.baseline;
    if !reconciles(headline, benefit.difference) {
        return Err(DataIntegrityWarning {
            field: "benefit_at_income.difference",
            expected: headline,
            actual: benefit.difference,
        });
    }
    let component_sum = benefit.ctc_component + benefit.exemption_tax_benefit;
    if !reconciles(benefit.difference, component_sum) {
        return Err(DataIntegrityWarning {
            field: "benefit_at_income.breakdown",
            expected: benefit.difference,
            actual: component_sum,
        });
    }
    Ok(())
}

/// Pointwise breakdown consistency across the whole sweep, then the single
/// point.
pub fn check_household_result(result: &HouseholdImpactResult) -> Result<(), DataIntegrityWarning> {
    for i in 0..result.income_range.len() {
        let expected = result.ctc_reform_range[i] - result.ctc_baseline_range[i];
        let actual = result.ctc_component[i] + result.exemption_tax_benefit[i];
        if !reconciles(expected, actual) {
            return Err(DataIntegrityWarning {
                field: "household_impact_result.sweep_breakdown",
                expected,
                actual,
            });
        }
    }
    check_breakdown(&result.benefit_at_income)
}

#[derive(Debug, Clone, PartialEq)]
pub struct HouseholdFigures {
    pub benefit: BenefitAtIncome,
    pub integrity: Option<DataIntegrityWarning>,
}

pub fn household_figures(result: &HouseholdImpactResult) -> HouseholdFigures {
    HouseholdFigures {
        benefit: result.benefit_at_income.clone(),
        integrity: check_household_result(result).err(),
    }
}

/// Chart series for the bracket breakdown: (label, signed average impact).
/// A bracket that loses money keeps its negative value; clamping to zero
/// would hide the loss.
pub fn bracket_chart_series(brackets: &[IncomeBracket]) -> Vec<(String, f64)> {
    brackets
        .iter()
        .map(|b| (b.bracket.clone(), b.avg_benefit))
        .collect()
}

pub fn bracket_cost_total(brackets: &[IncomeBracket]) -> f64 {
    brackets.iter().map(|b| b.total_cost).sum()
}

pub fn reconcile_bracket_costs(
    brackets: &[IncomeBracket],
    total_cost: f64,
) -> Result<(), DataIntegrityWarning> {
    let bracket_sum = bracket_cost_total(brackets);
    if reconciles(total_cost, bracket_sum) {
        Ok(())
    } else {
        Err(DataIntegrityWarning {
            field: "aggregate_impact_result.by_income_bracket",
            expected: total_cost,
            actual: bracket_sum,
        })
    }
}

/// The statewide figures actually rendered: headline totals, winners and
/// losers, the four poverty cohorts with guarded percent changes, and the
/// signed bracket chart series.
#[derive(Debug, Clone, PartialEq)]
pub struct StatewideFigures {
    pub total_cost: f64,
    pub beneficiaries: f64,
    pub avg_benefit: f64,
    pub children_affected: f64,
    pub winners_rate: f64,
    pub losers_rate: f64,
    pub poverty: PovertyDelta,
    pub child_poverty: PovertyDelta,
    pub deep_poverty: PovertyDelta,
    pub deep_child_poverty: PovertyDelta,
    pub bracket_chart: Vec<(String, f64)>,
    pub integrity: Option<DataIntegrityWarning>,
}

pub fn statewide_figures(result: &AggregateImpactResult) -> StatewideFigures {
    StatewideFigures {
        total_cost: result.total_cost,
        beneficiaries: result.beneficiaries,
        avg_benefit: result.avg_benefit,
        children_affected: result.children_affected,
        winners_rate: result.winners_rate,
        losers_rate: result.losers_rate,
        poverty: poverty_delta(result.poverty_baseline_rate, result.poverty_reform_rate),
        child_poverty: poverty_delta(
            result.child_poverty_baseline_rate,
            result.child_poverty_reform_rate,
        ),
        deep_poverty: poverty_delta(
            result.deep_poverty_baseline_rate,
            result.deep_poverty_reform_rate,
        ),
        deep_child_poverty: poverty_delta(
            result.deep_child_poverty_baseline_rate,
            result.deep_child_poverty_reform_rate,
        ),
        bracket_chart: bracket_chart_series(&result.by_income_bracket),
        integrity: reconcile_bracket_costs(&result.by_income_bracket, result.total_cost).err(),
    }
}
