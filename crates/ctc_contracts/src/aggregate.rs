#![forbid(unsafe_code)]

use crate::common::ensure_finite;
use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct IncomeBracket {
    pub bracket: String,
    pub beneficiaries: f64,
    pub total_cost: f64,
    pub avg_benefit: f64,
}

impl Validate for IncomeBracket {
    fn validate(&self) -> Result<(), ContractViolation> {
        if self.bracket.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "income_bracket.bracket",
                reason: "must be non-empty",
            });
        }
        ensure_finite("income_bracket.beneficiaries", self.beneficiaries)?;
        ensure_finite("income_bracket.total_cost", self.total_cost)?;
        ensure_finite("income_bracket.avg_benefit", self.avg_benefit)
    }
}

/// Statewide totals returned by `POST /api/aggregate-impact`. The four
/// poverty cohorts (overall, child, deep, deep-child) each carry a
/// baseline/reform/rate-change/percent-change quad; bracket total costs must
/// reconcile with `total_cost` (checked by the derived-value layer).
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AggregateImpactResult {
    pub total_cost: f64,
    pub beneficiaries: f64,
    pub avg_benefit: f64,
    pub children_affected: f64,

    pub winners: f64,
    pub losers: f64,
    pub winners_rate: f64,
    pub losers_rate: f64,

    pub poverty_baseline_rate: f64,
    pub poverty_reform_rate: f64,
    pub poverty_rate_change: f64,
    pub poverty_percent_change: f64,

    pub child_poverty_baseline_rate: f64,
    pub child_poverty_reform_rate: f64,
    pub child_poverty_rate_change: f64,
    pub child_poverty_percent_change: f64,

    pub deep_poverty_baseline_rate: f64,
    pub deep_poverty_reform_rate: f64,
    pub deep_poverty_rate_change: f64,
    pub deep_poverty_percent_change: f64,

    pub deep_child_poverty_baseline_rate: f64,
    pub deep_child_poverty_reform_rate: f64,
    pub deep_child_poverty_rate_change: f64,
    pub deep_child_poverty_percent_change: f64,

    pub by_income_bracket: Vec<IncomeBracket>,
}

impl Validate for AggregateImpactResult {
    fn validate(&self) -> Result<(), ContractViolation> {
        for (field, value) in [
            ("aggregate_impact_result.total_cost", self.total_cost),
            ("aggregate_impact_result.beneficiaries", self.beneficiaries),
            ("aggregate_impact_result.avg_benefit", self.avg_benefit),
            (
                "aggregate_impact_result.children_affected",
                self.children_affected,
            ),
            ("aggregate_impact_result.winners", self.winners),
            ("aggregate_impact_result.losers", self.losers),
            ("aggregate_impact_result.winners_rate", self.winners_rate),
            ("aggregate_impact_result.losers_rate", self.losers_rate),
            (
                "aggregate_impact_result.poverty_baseline_rate",
                self.poverty_baseline_rate,
            ),
            (
                "aggregate_impact_result.poverty_reform_rate",
                self.poverty_reform_rate,
            ),
            (
                "aggregate_impact_result.child_poverty_baseline_rate",
                self.child_poverty_baseline_rate,
            ),
            (
                "aggregate_impact_result.child_poverty_reform_rate",
                self.child_poverty_reform_rate,
            ),
            (
                "aggregate_impact_result.deep_poverty_baseline_rate",
                self.deep_poverty_baseline_rate,
            ),
            (
                "aggregate_impact_result.deep_poverty_reform_rate",
                self.deep_poverty_reform_rate,
            ),
            (
                "aggregate_impact_result.deep_child_poverty_baseline_rate",
                self.deep_child_poverty_baseline_rate,
            ),
            (
                "aggregate_impact_result.deep_child_poverty_reform_rate",
                self.deep_child_poverty_reform_rate,
            ),
        ] {
            ensure_finite(field, value)?;
        }
        if self.by_income_bracket.is_empty() {
            return Err(ContractViolation::InvalidValue {
                field: "aggregate_impact_result.by_income_bracket",
                reason: "must be non-empty",
            });
        }
        for bracket in &self.by_income_bracket {
            bracket.validate()?;
        }
        Ok(())
    }
}

/// Summary statistics for the microdata panel behind the aggregate query.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DatasetSummary {
    pub household_count: f64,
    pub person_count: f64,
    pub median_agi: f64,
    pub p75_agi: f64,
    pub p90_agi: f64,
    pub total_children: f64,
    pub households_with_children: f64,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub dataset_loaded: bool,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_result() -> AggregateImpactResult {
        AggregateImpactResult {
            total_cost: 30_000_000.0,
            beneficiaries: 60_000.0,
            avg_benefit: 500.0,
            children_affected: 95_000.0,
            winners: 60_000.0,
            losers: 1_500.0,
            winners_rate: 13.2,
            losers_rate: 0.3,
            poverty_baseline_rate: 10.8,
            poverty_reform_rate: 10.5,
            poverty_rate_change: -0.3,
            poverty_percent_change: -2.78,
            child_poverty_baseline_rate: 13.1,
            child_poverty_reform_rate: 12.4,
            child_poverty_rate_change: -0.7,
            child_poverty_percent_change: -5.34,
            deep_poverty_baseline_rate: 4.2,
            deep_poverty_reform_rate: 4.1,
            deep_poverty_rate_change: -0.1,
            deep_poverty_percent_change: -2.38,
            deep_child_poverty_baseline_rate: 3.0,
            deep_child_poverty_reform_rate: 2.9,
            deep_child_poverty_rate_change: -0.1,
            deep_child_poverty_percent_change: -3.33,
            by_income_bracket: vec![
                IncomeBracket {
                    bracket: "Under $50k".to_string(),
                    beneficiaries: 25_000.0,
                    total_cost: 14_000_000.0,
                    avg_benefit: 560.0,
                },
                IncomeBracket {
                    bracket: "$50k-$100k".to_string(),
                    beneficiaries: 20_000.0,
                    total_cost: 10_000_000.0,
                    avg_benefit: 500.0,
                },
                IncomeBracket {
                    bracket: "Over $100k".to_string(),
                    beneficiaries: 15_000.0,
                    total_cost: 6_000_000.0,
                    avg_benefit: 400.0,
                },
            ],
        }
    }

    #[test]
    fn at_aggregate_01_sample_result_is_schema_valid() {
        assert!(sample_result().validate().is_ok());
    }

    #[test]
    fn at_aggregate_02_empty_bracket_breakdown_is_rejected() {
        let mut result = sample_result();
        result.by_income_bracket.clear();
        assert!(result.validate().is_err());
    }

    #[test]
    fn at_aggregate_03_wire_round_trip_is_lossless() {
        let result = sample_result();
        let encoded = serde_json::to_string(&result).unwrap();
        let decoded: AggregateImpactResult = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, result);
    }

    #[test]
    fn at_aggregate_04_unnamed_bracket_is_rejected() {
        let mut result = sample_result();
        result.by_income_bracket[0].bracket.clear();
        assert!(result.validate().is_err());
    }
}
