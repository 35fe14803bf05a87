//! Instrument transport implementations
//!
//! This module contains implementations of the [`Transport`] trait,
//! providing low-level I/O abstraction over the bench instrument connection.
//! Everything above this seam is transport-agnostic: the protocol executor
//! only ever sees `&mut dyn Transport`.

pub mod mock;
#[cfg(feature = "instrument_visa")]
pub mod visa;

pub use mock::MockTransport;
#[cfg(feature = "instrument_visa")]
pub use visa::VisaTransport;

use crate::error::MeasureResult;

/// Blocking, exclusively-owned instrument connection.
///
/// The connection carries at most one command in flight; both operations
/// block until the instrument answers or the transport times out. Transport
/// failures propagate unmodified — retry policy, if any, belongs to the
/// caller, never to a single command.
pub trait Transport {
    /// Sends a command string. The observable effect is instrument state change.
    fn write(&mut self, command: &str) -> MeasureResult<()>;

    /// Sends a command string and returns the instrument's raw text response.
    fn query(&mut self, command: &str) -> MeasureResult<String>;
}
