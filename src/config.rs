//! Measurement program files.
//!
//! A program is declared in YAML: an ordered list of measurement groups,
//! the measure commands sampled on every sweep, and the per-chip field
//! mappings. Deserialization is strict where it matters — unknown command
//! types and unknown validation rule keys are load-time errors, so a broken
//! program never reaches the instrument.
//!
//! ```yaml
//! measurements:
//!   - name: iv_20v
//!     instrument:
//!       - { command: "*RST", type: write }
//!       - { command: ":PAGE:MEAS:VAR1:START 20", type: write }
//!     program:
//!       minimum: true
//!       int_time: SHORT
//!       validation:
//!         "anode_current[*]":
//!           max: { value: 1.0e-6, message: "Anode current above 1 uA" }
//!           abs: true
//! measure:
//!   - { name: voltage_input, command: ":DATA? 'V3'", type: query_ascii_values }
//!   - { name: anode_current, command: ":DATA? 'I1'", type: query_ascii_values }
//! chips:
//!   - voltage_input: { prop: voltage_input, slice: [0, 5] }
//!     anode_current: { prop: anode_current, slice: [0, 5] }
//!   - voltage_input: { prop: voltage_input, slice: [5, 10] }
//!     anode_current: { prop: anode_current, slice: [5, 10] }
//! ```

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::error::MeasureResult;
use crate::measurement::assemble::ChipBindings;
use crate::measurement::validate::RuleSet;
use crate::protocol::CommandDescriptor;

/// A complete measurement program.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementConfig {
    /// Measurement groups, executed in order.
    pub measurements: Vec<MeasurementGroup>,
    /// Channels read on every sweep.
    pub measure: Vec<CommandDescriptor>,
    /// Field mappings, one per physical chip sharing the sweep.
    pub chips: Vec<ChipBindings>,
}

/// One measurement group: instrument setup plus acquisition behavior.
#[derive(Debug, Clone, Deserialize)]
pub struct MeasurementGroup {
    /// Group name, logged when the group starts.
    pub name: String,
    /// Setup commands applied before the sweep.
    #[serde(default)]
    pub instrument: Vec<CommandDescriptor>,
    /// Acquisition behavior of the group.
    #[serde(default)]
    pub program: ProgramConfig,
}

/// Acquisition behavior of one group.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProgramConfig {
    /// Settle the reading with the convergence loop instead of a single shot.
    #[serde(default)]
    pub minimum: bool,
    /// Threshold rules gating the reading, in file order.
    #[serde(default)]
    pub validation: Option<RuleSet>,
    /// Integration-time label stamped onto the group's records.
    #[serde(default)]
    pub int_time: Option<String>,
}

impl MeasurementConfig {
    /// Parses a program from YAML text.
    pub fn from_yaml(text: &str) -> MeasureResult<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads a program from a YAML file.
    pub fn load(path: &Path) -> MeasureResult<Self> {
        Self::from_yaml(&fs::read_to_string(path)?)
    }
}
