#![forbid(unsafe_code)]

use ctc_contracts::household::{
    AggregateImpactRequest, HouseholdDescription, HouseholdImpactRequest,
};
use ctc_contracts::reform::ReformParameters;
use ctc_contracts::ContractViolation;

/// The live form input, owned by the top-level controller and passed down
/// explicitly. Snapshots taken here are what the staleness tracker compares
/// against, so the struct is the single source of truth for the household
/// shape: the spouse field only reaches a snapshot while `married` is set,
/// and the dependent count is always the length of `dependent_ages`.
#[derive(Debug, Clone, PartialEq)]
pub struct FormState {
    pub age_head: u8,
    pub married: bool,
    pub age_spouse: u8,
    pub dependent_ages: Vec<u8>,
    pub income: u32,
    pub year: u16,
    pub reform: ReformParameters,
}

impl FormState {
    pub fn default_v1() -> Self {
        Self {
            age_head: 35,
            married: false,
            age_spouse: 35,
            dependent_ages: vec![5],
            income: 50_000,
            year: 2027,
            reform: ReformParameters::default_v1(),
        }
    }

    pub fn household(&self) -> HouseholdDescription {
        HouseholdDescription::v1(
            self.age_head,
            self.married.then_some(self.age_spouse),
            self.dependent_ages.clone(),
            self.income,
            self.year,
        )
    }

    pub fn household_request(&self) -> Result<HouseholdImpactRequest, ContractViolation> {
        HouseholdImpactRequest::v1(self.household(), self.reform.clone())
    }

    pub fn aggregate_request(&self) -> Result<AggregateImpactRequest, ContractViolation> {
        AggregateImpactRequest::v1(self.year, self.reform.clone())
    }
}
