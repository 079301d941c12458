#![forbid(unsafe_code)]

use crate::common::ensure_finite;
use crate::{ContractViolation, Validate};

/// Benefit breakdown at a single income point. `difference` is the headline
/// number; the two components must sum to it (checked by the derived-value
/// layer as a data-integrity condition, not here; a response that fails the
/// check is still renderable).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BenefitAtIncome {
    pub baseline: f64,
    pub reform: f64,
    pub difference: f64,
    pub ctc_component: f64,
    pub exemption_tax_benefit: f64,
}

impl Validate for BenefitAtIncome {
    fn validate(&self) -> Result<(), ContractViolation> {
        ensure_finite("benefit_at_income.baseline", self.baseline)?;
        ensure_finite("benefit_at_income.reform", self.reform)?;
        ensure_finite("benefit_at_income.difference", self.difference)?;
        ensure_finite("benefit_at_income.ctc_component", self.ctc_component)?;
        ensure_finite(
            "benefit_at_income.exemption_tax_benefit",
            self.exemption_tax_benefit,
        )
    }
}

/// Income sweep returned by `POST /api/household-impact`: five parallel
/// sequences plus the single-point breakdown and a chart-axis bound.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HouseholdImpactResult {
    pub income_range: Vec<f64>,
    pub ctc_baseline_range: Vec<f64>,
    pub ctc_reform_range: Vec<f64>,
    pub ctc_component: Vec<f64>,
    pub exemption_tax_benefit: Vec<f64>,
    pub benefit_at_income: BenefitAtIncome,
    pub x_axis_max: f64,
}

impl Validate for HouseholdImpactResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        let n = self.income_range.len();
        if n == 0 {
            return Err(ContractViolation::InvalidValue {
                field: "household_impact_result.income_range",
                reason: "must be non-empty",
            });
        }
        if self.ctc_baseline_range.len() != n
            || self.ctc_reform_range.len() != n
            || self.ctc_component.len() != n
            || self.exemption_tax_benefit.len() != n
        {
            return Err(ContractViolation::InvalidValue {
                field: "household_impact_result",
                reason: "sweep sequences must have equal length",
            });
        }
        self.benefit_at_income.validate()?;
        ensure_finite("household_impact_result.x_axis_max", self.x_axis_max)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn benefit() -> BenefitAtIncome {
        BenefitAtIncome {
            baseline: 61_000.0,
            reform: 62_000.0,
            difference: 1_000.0,
            ctc_component: 1_000.0,
            exemption_tax_benefit: 0.0,
        }
    }

    #[test]
    fn at_impact_01_equal_length_sweep_is_valid() {
        let result = HouseholdImpactResult {
            income_range: vec![0.0, 50_000.0, 100_000.0],
            ctc_baseline_range: vec![0.0; 3],
            ctc_reform_range: vec![1_000.0; 3],
            ctc_component: vec![1_000.0; 3],
            exemption_tax_benefit: vec![0.0; 3],
            benefit_at_income: benefit(),
            x_axis_max: 500_000.0,
        };
        assert!(result.validate().is_ok());
    }

    #[test]
    fn at_impact_02_ragged_sweep_is_rejected() {
        let result = HouseholdImpactResult {
            income_range: vec![0.0, 50_000.0, 100_000.0],
            ctc_baseline_range: vec![0.0; 3],
            ctc_reform_range: vec![1_000.0; 2],
            ctc_component: vec![1_000.0; 3],
            exemption_tax_benefit: vec![0.0; 3],
            benefit_at_income: benefit(),
            x_axis_max: 500_000.0,
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn at_impact_03_empty_sweep_is_rejected() {
        let result = HouseholdImpactResult {
            income_range: vec![],
            ctc_baseline_range: vec![],
            ctc_reform_range: vec![],
            ctc_component: vec![],
            exemption_tax_benefit: vec![],
            benefit_at_income: benefit(),
            x_axis_max: 500_000.0,
        };
        assert!(result.validate().is_err());
    }

    #[test]
    fn at_impact_04_non_finite_point_value_is_rejected() {
        let mut b = benefit();
        b.difference = f64::NAN;
        assert!(b.validate().is_err());
    }
}
