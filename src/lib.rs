//! Instrument measurement acquisition and convergence engine for automated
//! electrical characterization of semiconductor test chips.
//!
//! The crate drives a bench instrument through declarative measurement
//! programs: setup and measure commands are executed over a [`adapters::Transport`],
//! raw channel traces are optionally settled by the convergence loop, gated
//! by threshold validation rules, and assembled into structured,
//! temperature-corrected measurement records for an external persistence
//! collaborator.

pub mod adapters;
pub mod config;
pub mod error;
pub mod measurement;
pub mod protocol;
pub mod readings;

pub use error::{BenchError, MeasureResult};
