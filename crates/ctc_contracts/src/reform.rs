#![forbid(unsafe_code)]

use crate::common::ensure_finite;
use crate::{ContractViolation, Validate};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilingStatus {
    Single,
    Joint,
    HeadOfHousehold,
    SurvivingSpouse,
    Separate,
}

impl FilingStatus {
    pub const ALL: [FilingStatus; 5] = [
        FilingStatus::Single,
        FilingStatus::Joint,
        FilingStatus::HeadOfHousehold,
        FilingStatus::SurvivingSpouse,
        FilingStatus::Separate,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FilingStatus::Single => "SINGLE",
            FilingStatus::Joint => "JOINT",
            FilingStatus::HeadOfHousehold => "HEAD_OF_HOUSEHOLD",
            FilingStatus::SurvivingSpouse => "SURVIVING_SPOUSE",
            FilingStatus::Separate => "SEPARATE",
        }
    }
}

/// Phase-out thresholds keyed by filing status. The calculator contract
/// requires exactly these five keys; a payload with a missing key fails
/// deserialization rather than defaulting to zero.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PhaseoutThresholds {
    #[serde(rename = "SINGLE")]
    pub single: f64,
    #[serde(rename = "JOINT")]
    pub joint: f64,
    #[serde(rename = "HEAD_OF_HOUSEHOLD")]
    pub head_of_household: f64,
    #[serde(rename = "SURVIVING_SPOUSE")]
    pub surviving_spouse: f64,
    #[serde(rename = "SEPARATE")]
    pub separate: f64,
}

impl PhaseoutThresholds {
    pub fn zeroed() -> Self {
        Self::uniform(0.0)
    }

    pub fn uniform(threshold: f64) -> Self {
        Self {
            single: threshold,
            joint: threshold,
            head_of_household: threshold,
            surviving_spouse: threshold,
            separate: threshold,
        }
    }

    pub fn for_status(&self, status: FilingStatus) -> f64 {
        match status {
            FilingStatus::Single => self.single,
            FilingStatus::Joint => self.joint,
            FilingStatus::HeadOfHousehold => self.head_of_household,
            FilingStatus::SurvivingSpouse => self.surviving_spouse,
            FilingStatus::Separate => self.separate,
        }
    }
}

impl Validate for PhaseoutThresholds {
    fn validate(&self) -> Result<(), ContractViolation> {
        for status in FilingStatus::ALL {
            if !self.for_status(status).is_finite() {
                return Err(ContractViolation::NotFinite {
                    field: "phaseout_thresholds",
                });
            }
        }
        Ok(())
    }
}

/// Derived refundability classification. Never stored on the wire; the cap
/// itself is the contract value and must not be rewritten to match the
/// classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Refundability {
    NonRefundable,
    PartiallyRefundable,
    FullyRefundable,
}

impl Refundability {
    pub fn as_str(self) -> &'static str {
        match self {
            Refundability::NonRefundable => "non-refundable",
            Refundability::PartiallyRefundable => "partially-refundable",
            Refundability::FullyRefundable => "fully-refundable",
        }
    }
}

/// Reform configuration accepted verbatim by the calculation backend.
///
/// Field names and the flat shape (flag + scalar fields rather than nested
/// enums) are fixed by the backend wire contract; any field added here must
/// be added on the backend simultaneously.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ReformParameters {
    pub ctc_amount: f64,
    pub ctc_age_limit: u8,
    pub ctc_refundability_cap: f64,
    pub ctc_phaseout_rate: f64,
    pub ctc_phaseout_thresholds: PhaseoutThresholds,

    // Stepped phase-out: the alternative shape used by the governor's
    // proposal variant. Ignored by the calculator unless the flag is set.
    pub ctc_stepped_phaseout: bool,
    pub ctc_stepped_phaseout_threshold: f64,
    pub ctc_stepped_phaseout_increment: f64,
    pub ctc_stepped_phaseout_rate_per_step: f64,

    pub ctc_young_child_boost_amount: f64,
    pub ctc_young_child_boost_age_limit: u8,

    pub enable_exemption_reform: bool,
    pub exemption_amount: f64,
    pub exemption_age_limit_enabled: bool,
    pub exemption_age_threshold: u8,
    pub exemption_phaseout_rate: f64,
    // Absent (not zeroed) while the exemption sub-reform is disabled, so an
    // accidentally-zero default cannot smuggle in a phase-out.
    #[serde(default)]
    pub exemption_phaseout_thresholds: Option<PhaseoutThresholds>,
}

impl ReformParameters {
    /// Baseline form defaults: a $1,000 non-refundable CTC for dependents
    /// under 18, no phase-out, exemption sub-reform off.
    pub fn default_v1() -> Self {
        Self {
            ctc_amount: 1_000.0,
            ctc_age_limit: 18,
            ctc_refundability_cap: 0.0,
            ctc_phaseout_rate: 0.0,
            ctc_phaseout_thresholds: PhaseoutThresholds::zeroed(),
            ctc_stepped_phaseout: false,
            ctc_stepped_phaseout_threshold: 0.0,
            ctc_stepped_phaseout_increment: 0.0,
            ctc_stepped_phaseout_rate_per_step: 0.0,
            ctc_young_child_boost_amount: 0.0,
            ctc_young_child_boost_age_limit: 6,
            enable_exemption_reform: false,
            exemption_amount: 5_200.0,
            exemption_age_limit_enabled: true,
            exemption_age_threshold: 18,
            exemption_phaseout_rate: 0.0,
            exemption_phaseout_thresholds: None,
        }
    }

    pub fn refundability(&self) -> Refundability {
        if self.ctc_refundability_cap == 0.0 {
            Refundability::NonRefundable
        } else if self.ctc_refundability_cap >= self.ctc_amount {
            Refundability::FullyRefundable
        } else {
            Refundability::PartiallyRefundable
        }
    }
}

impl Validate for ReformParameters {
    // Structural checks only. Numeric range enforcement (age bounds, rate
    // bounds) belongs to the remote calculator, which must see out-of-range
    // values unchanged.
    fn validate(&self) -> Result<(), ContractViolation> {
        ensure_finite("reform_parameters.ctc_amount", self.ctc_amount)?;
        ensure_finite(
            "reform_parameters.ctc_refundability_cap",
            self.ctc_refundability_cap,
        )?;
        ensure_finite("reform_parameters.ctc_phaseout_rate", self.ctc_phaseout_rate)?;
        self.ctc_phaseout_thresholds.validate()?;
        ensure_finite(
            "reform_parameters.ctc_stepped_phaseout_threshold",
            self.ctc_stepped_phaseout_threshold,
        )?;
        ensure_finite(
            "reform_parameters.ctc_stepped_phaseout_increment",
            self.ctc_stepped_phaseout_increment,
        )?;
        ensure_finite(
            "reform_parameters.ctc_stepped_phaseout_rate_per_step",
            self.ctc_stepped_phaseout_rate_per_step,
        )?;
        ensure_finite(
            "reform_parameters.ctc_young_child_boost_amount",
            self.ctc_young_child_boost_amount,
        )?;
        ensure_finite("reform_parameters.exemption_amount", self.exemption_amount)?;
        ensure_finite(
            "reform_parameters.exemption_phaseout_rate",
            self.exemption_phaseout_rate,
        )?;
        if let Some(thresholds) = &self.exemption_phaseout_thresholds {
            thresholds.validate()?;
        }
        if !self.enable_exemption_reform && self.exemption_phaseout_thresholds.is_some() {
            return Err(ContractViolation::InvalidValue {
                field: "reform_parameters.exemption_phaseout_thresholds",
                reason: "must be absent while the exemption sub-reform is disabled",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_reform_01_defaults_are_schema_valid() {
        assert!(ReformParameters::default_v1().validate().is_ok());
    }

    #[test]
    fn at_reform_02_refundability_classification_covers_all_regions() {
        let mut params = ReformParameters::default_v1();
        params.ctc_amount = 1_000.0;

        params.ctc_refundability_cap = 0.0;
        assert_eq!(params.refundability(), Refundability::NonRefundable);

        params.ctc_refundability_cap = 400.0;
        assert_eq!(params.refundability(), Refundability::PartiallyRefundable);

        params.ctc_refundability_cap = 1_000.0;
        assert_eq!(params.refundability(), Refundability::FullyRefundable);

        // A cap above the credit amount no longer binds.
        params.ctc_refundability_cap = 999_999.0;
        assert_eq!(params.refundability(), Refundability::FullyRefundable);

        // Classification must never rewrite the stored cap.
        assert_eq!(params.ctc_refundability_cap, 999_999.0);
    }

    #[test]
    fn at_reform_03_disabled_exemption_rejects_zeroed_threshold_table() {
        let mut params = ReformParameters::default_v1();
        params.exemption_phaseout_thresholds = Some(PhaseoutThresholds::zeroed());
        assert!(params.validate().is_err());

        params.enable_exemption_reform = true;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn at_reform_04_non_finite_threshold_is_rejected() {
        let mut params = ReformParameters::default_v1();
        params.ctc_phaseout_thresholds.joint = f64::NAN;
        assert!(matches!(
            params.validate(),
            Err(ContractViolation::NotFinite { .. })
        ));
    }

    #[test]
    fn at_reform_05_wire_round_trip_is_lossless() {
        let mut params = ReformParameters::default_v1();
        params.ctc_amount = 325.0;
        params.ctc_age_limit = 19;
        params.ctc_refundability_cap = 100_000.0;
        params.ctc_stepped_phaseout = true;
        params.ctc_stepped_phaseout_threshold = 261_000.0;
        params.ctc_stepped_phaseout_increment = 7_450.0;
        params.ctc_stepped_phaseout_rate_per_step = 0.20;
        params.ctc_young_child_boost_amount = 1_000.0;

        let encoded = serde_json::to_string(&params).unwrap();
        let decoded: ReformParameters = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, params);
        // Disabled sub-reform round-trips as absent, not zeroed.
        assert!(decoded.exemption_phaseout_thresholds.is_none());
    }

    #[test]
    fn at_reform_06_enabled_exemption_table_round_trips_by_value() {
        let mut params = ReformParameters::default_v1();
        params.enable_exemption_reform = true;
        params.exemption_phaseout_rate = 0.05;
        params.exemption_phaseout_thresholds = Some(PhaseoutThresholds {
            single: 80_000.0,
            joint: 160_000.0,
            head_of_household: 120_000.0,
            surviving_spouse: 160_000.0,
            separate: 80_000.0,
        });

        let encoded = serde_json::to_value(&params).unwrap();
        let decoded: ReformParameters = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded, params);
    }

    #[test]
    fn at_reform_07_threshold_table_with_missing_key_is_invalid_input() {
        let raw = r#"{
            "SINGLE": 0, "JOINT": 0, "HEAD_OF_HOUSEHOLD": 0, "SURVIVING_SPOUSE": 0
        }"#;
        assert!(serde_json::from_str::<PhaseoutThresholds>(raw).is_err());
    }

    #[test]
    fn at_reform_08_threshold_key_order_does_not_affect_equality() {
        let a: PhaseoutThresholds = serde_json::from_str(
            r#"{"SINGLE":1,"JOINT":2,"HEAD_OF_HOUSEHOLD":3,"SURVIVING_SPOUSE":4,"SEPARATE":5}"#,
        )
        .unwrap();
        let b: PhaseoutThresholds = serde_json::from_str(
            r#"{"SEPARATE":5,"SURVIVING_SPOUSE":4,"HEAD_OF_HOUSEHOLD":3,"JOINT":2,"SINGLE":1}"#,
        )
        .unwrap();
        assert_eq!(a, b);
    }
}
