#![forbid(unsafe_code)]

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MonotonicTimeNs(pub u64);

#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    NotFinite {
        field: &'static str,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

/// Normalized failure of a remote calculation call.
///
/// `Transport` means the request never completed (no remote-known status);
/// `Remote` means the calculator answered with a non-success status. The
/// `detail` string is the backend's own message when its error payload was
/// parseable JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CalculationError {
    Transport { kind: &'static str },
    Remote { status: u16, detail: Option<String> },
}

impl CalculationError {
    pub fn http_status(&self) -> Option<u16> {
        match self {
            CalculationError::Transport { .. } => None,
            CalculationError::Remote { status, .. } => Some(*status),
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            CalculationError::Transport { kind } => {
                format!("calculation request did not complete ({kind})")
            }
            CalculationError::Remote {
                detail: Some(detail),
                ..
            } => detail.clone(),
            CalculationError::Remote {
                status,
                detail: None,
            } => format!("HTTP error {status}"),
        }
    }
}

/// Should-never-happen numeric inconsistency in a calculator response.
/// Surfaced alongside the result, never instead of it.
#[derive(Debug, Clone, PartialEq)]
pub struct DataIntegrityWarning {
    pub field: &'static str,
    pub expected: f64,
    pub actual: f64,
}

impl DataIntegrityWarning {
    pub fn message(&self) -> String {
        format!(
            "{} does not reconcile: expected {:.6}, got {:.6}",
            self.field, self.expected, self.actual
        )
    }
}

pub(crate) fn ensure_finite(field: &'static str, value: f64) -> Result<(), ContractViolation> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ContractViolation::NotFinite { field })
    }
}
