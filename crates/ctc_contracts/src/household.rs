#![forbid(unsafe_code)]

use crate::reform::ReformParameters;
use crate::{ContractViolation, Validate};

/// Household as submitted for calculation. The spouse age is present exactly
/// when the household is married; the dependent count is the length of
/// `dependent_ages`, never a separate field.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HouseholdDescription {
    pub age_head: u8,
    pub age_spouse: Option<u8>,
    pub dependent_ages: Vec<u8>,
    pub income: u32,
    pub year: u16,
}

impl HouseholdDescription {
    pub fn v1(
        age_head: u8,
        age_spouse: Option<u8>,
        dependent_ages: Vec<u8>,
        income: u32,
        year: u16,
    ) -> Self {
        Self {
            age_head,
            age_spouse,
            dependent_ages,
            income,
            year,
        }
    }

    pub fn is_married(&self) -> bool {
        self.age_spouse.is_some()
    }

    pub fn dependent_count(&self) -> usize {
        self.dependent_ages.len()
    }
}

/// Wire body of `POST /api/household-impact` (and `/household-benefit-quick`).
/// Built from a household snapshot plus reform parameters; a pure transform
/// with no range validation. Out-of-range values are forwarded unchanged
/// and rejected by the remote calculator.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct HouseholdImpactRequest {
    pub age_head: u8,
    pub age_spouse: Option<u8>,
    pub dependent_ages: Vec<u8>,
    pub income: u32,
    pub year: u16,
    pub reform_params: ReformParameters,
}

impl HouseholdImpactRequest {
    pub fn v1(
        household: HouseholdDescription,
        reform_params: ReformParameters,
    ) -> Result<Self, ContractViolation> {
        let req = Self {
            age_head: household.age_head,
            age_spouse: household.age_spouse,
            dependent_ages: household.dependent_ages,
            income: household.income,
            year: household.year,
            reform_params,
        };
        req.validate()?;
        Ok(req)
    }

    pub fn household(&self) -> HouseholdDescription {
        HouseholdDescription {
            age_head: self.age_head,
            age_spouse: self.age_spouse,
            dependent_ages: self.dependent_ages.clone(),
            income: self.income,
            year: self.year,
        }
    }
}

impl Validate for HouseholdImpactRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.reform_params.validate()
    }
}

/// Wire body of `POST /api/aggregate-impact`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct AggregateImpactRequest {
    pub year: u16,
    pub reform_params: ReformParameters,
}

impl AggregateImpactRequest {
    pub fn v1(year: u16, reform_params: ReformParameters) -> Result<Self, ContractViolation> {
        let req = Self {
            year,
            reform_params,
        };
        req.validate()?;
        Ok(req)
    }
}

impl Validate for AggregateImpactRequest {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.reform_params.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn household() -> HouseholdDescription {
        HouseholdDescription::v1(35, None, vec![5], 50_000, 2027)
    }

    #[test]
    fn at_household_01_spouse_presence_defines_married() {
        let single = household();
        assert!(!single.is_married());
        assert_eq!(single.dependent_count(), 1);

        let married = HouseholdDescription::v1(35, Some(34), vec![5, 7], 80_000, 2027);
        assert!(married.is_married());
        assert_eq!(married.dependent_count(), 2);
    }

    #[test]
    fn at_household_02_request_builder_forwards_out_of_range_values() {
        // Range enforcement is the calculator's job: an implausible age and a
        // phase-out rate above 1.0 must pass through the builder untouched.
        let mut reform = ReformParameters::default_v1();
        reform.ctc_phaseout_rate = 3.5;
        let req = HouseholdImpactRequest::v1(
            HouseholdDescription::v1(250, None, vec![5], 50_000, 2027),
            reform,
        )
        .unwrap();
        assert_eq!(req.age_head, 250);
        assert_eq!(req.reform_params.ctc_phaseout_rate, 3.5);
    }

    #[test]
    fn at_household_03_request_wire_shape_matches_backend_contract() {
        let req =
            HouseholdImpactRequest::v1(household(), ReformParameters::default_v1()).unwrap();
        let value = serde_json::to_value(&req).unwrap();
        for key in ["age_head", "age_spouse", "dependent_ages", "income", "year", "reform_params"] {
            assert!(value.get(key).is_some(), "missing wire key {key}");
        }
        assert!(value["reform_params"]["ctc_phaseout_thresholds"]["SINGLE"].is_number());
        assert!(value["age_spouse"].is_null());
    }

    #[test]
    fn at_household_04_builder_rejects_structurally_invalid_reform() {
        let mut reform = ReformParameters::default_v1();
        reform.ctc_amount = f64::INFINITY;
        assert!(HouseholdImpactRequest::v1(household(), reform).is_err());
    }

    #[test]
    fn at_household_05_aggregate_request_round_trips() {
        let req = AggregateImpactRequest::v1(2027, ReformParameters::default_v1()).unwrap();
        let encoded = serde_json::to_string(&req).unwrap();
        let decoded: AggregateImpactRequest = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, req);
    }
}
