//! Custom error types for the crate.
//!
//! This module defines the primary error type, `BenchError`, for the whole
//! acquisition engine. Using the `thiserror` crate, it provides a centralized
//! and consistent way to handle the different kinds of failures a measurement
//! run can hit, from instrument I/O to bad program definitions.
//!
//! ## Error Hierarchy
//!
//! `BenchError` is an enum that consolidates the failure classes:
//!
//! - **`Io` / `Visa`**: transport-level communication failures (timeout, broken
//!   connection). These are never retried by the engine; they abort the run.
//! - **`Config`**: semantic errors in the measurement program, such as an
//!   unknown record field, a malformed validation path, or mismatched channel
//!   lengths in a chip mapping. These indicate a bad program definition and
//!   always stop execution.
//! - **`Yaml`**: program file parse errors, wrapped from `serde_yaml`. An
//!   unknown command type or validation rule key surfaces here at load time.
//! - **`Response`**: the instrument answered, but the answer could not be
//!   parsed into the numbers a channel expects.
//! - **`Fit`**: degenerate data prevented the settle loop's linear fit.
//! - **`Invalid`**: a reading violated a validation rule while running in
//!   automatic mode. Carries the rule's configured message.
//! - **`Aborted`**: the operator declined to keep an invalid reading.
//! - **`Unsettled`**: the opt-in sweep cap of the settle loop was exhausted.
//!
//! By using `#[from]`, `BenchError` can be seamlessly created from underlying
//! error types, simplifying error handling throughout the crate with the `?`
//! operator.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type MeasureResult<T> = std::result::Result<T, BenchError>;

#[derive(Error, Debug)]
pub enum BenchError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("VISA error: {0}")]
    #[cfg(feature = "instrument_visa")]
    Visa(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Program file error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Instrument response error: {0}")]
    Response(String),

    #[error("Linear fit error: {0}")]
    Fit(String),

    #[error("Measurement is invalid: {0}")]
    Invalid(String),

    #[error("Measurement discarded by operator")]
    Aborted,

    #[error("Reading did not settle after {0} sweeps")]
    Unsettled(usize),
}

#[cfg(feature = "instrument_visa")]
impl From<visa_rs::Error> for BenchError {
    fn from(err: visa_rs::Error) -> Self {
        BenchError::Visa(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = BenchError::Config("unknown record field 'gate_current'".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration error: unknown record field 'gate_current'"
        );
    }

    #[test]
    fn test_invalid_carries_rule_message() {
        let err = BenchError::Invalid("anode current out of range".into());
        assert!(err.to_string().contains("anode current out of range"));
    }
}
