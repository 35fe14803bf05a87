//! Measurement engines: settle loop, validation, assembly, orchestration.

pub mod assemble;
pub mod convergence;
pub mod runner;
pub mod validate;

pub use assemble::{assemble, corrected_current, MeasurementRecord, RecordBuilder};
pub use convergence::{acquire_settled, drift_offset, linear_fit, SettleOptions};
pub use runner::{Operator, ProgramRunner, RunMode};
pub use validate::{validate, Verdict};
