#![forbid(unsafe_code)]

pub mod aggregate;
pub mod common;
pub mod household;
pub mod impact;
pub mod reform;

pub use common::{
    CalculationError, ContractViolation, DataIntegrityWarning, MonotonicTimeNs, Validate,
};
