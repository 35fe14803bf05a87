//! Orchestration of a whole measurement program.
//!
//! The runner walks the program group by group over one exclusively borrowed
//! transport, so instrument state set by a group's setup commands can never
//! be clobbered by another group. Each group produces one raw reading set,
//! optionally settled and validated, which is then fanned out across every
//! chip mapping.

use log::{info, warn};

use crate::adapters::Transport;
use crate::config::MeasurementConfig;
use crate::error::{BenchError, MeasureResult};
use crate::measurement::assemble::{assemble, MeasurementRecord};
use crate::measurement::convergence::{acquire_settled, SettleOptions};
use crate::measurement::validate::{validate, Verdict};
use crate::protocol::{acquire_sweep, apply_setup};
use crate::readings::RawReadings;

/// Decision seam towards a human operator.
///
/// Consulted only in interactive mode, when a reading set failed validation.
pub trait Operator {
    /// Whether the failing readings of `group` should be kept anyway.
    fn confirm_save(&mut self, group: &str, readings: &RawReadings) -> MeasureResult<bool>;
}

/// How validation failures are resolved.
pub enum RunMode<'a> {
    /// Unattended: any validation failure aborts the run.
    Automatic,
    /// An operator decides per failure whether to keep the readings.
    Interactive(&'a mut dyn Operator),
}

/// Executes measurement programs against one instrument connection.
pub struct ProgramRunner<'a> {
    transport: &'a mut dyn Transport,
    settle: SettleOptions,
}

impl<'a> ProgramRunner<'a> {
    /// Creates a runner over an exclusively borrowed transport.
    pub fn new(transport: &'a mut dyn Transport) -> Self {
        Self {
            transport,
            settle: SettleOptions::default(),
        }
    }

    /// Overrides the settle-loop tuning.
    pub fn with_settle_options(mut self, settle: SettleOptions) -> Self {
        self.settle = settle;
        self
    }

    /// Runs every measurement group of `config` in order and returns the
    /// records of all groups, in program order.
    ///
    /// `chips` labels the program's chip mappings one-to-one; a count
    /// mismatch is a configuration error rather than a silent partial run.
    /// `temperature` is the ambient temperature for the whole acquisition.
    pub fn run(
        &mut self,
        config: &MeasurementConfig,
        chips: &[String],
        temperature: f64,
        mode: &mut RunMode<'_>,
    ) -> MeasureResult<Vec<MeasurementRecord>> {
        if chips.len() != config.chips.len() {
            return Err(BenchError::Config(format!(
                "{} chip names supplied but the program maps {} chips",
                chips.len(),
                config.chips.len()
            )));
        }

        let mut records = Vec::new();
        for group in &config.measurements {
            info!("Executing measurement {}", group.name);
            apply_setup(self.transport, &group.instrument)?;

            let readings = if group.program.minimum {
                acquire_settled(self.transport, &config.measure, &self.settle)?
            } else {
                acquire_sweep(self.transport, &config.measure)?
            };

            if let Some(rules) = &group.program.validation {
                if let Verdict::Fail(message) = validate(&readings, rules)? {
                    match mode {
                        RunMode::Automatic => return Err(BenchError::Invalid(message)),
                        RunMode::Interactive(operator) => {
                            info!("\n{}", readings.dump());
                            if !operator.confirm_save(&group.name, &readings)? {
                                warn!("Measurement {} discarded, run aborted", group.name);
                                return Err(BenchError::Aborted);
                            }
                        }
                    }
                }
            }

            for (chip, bindings) in chips.iter().zip(&config.chips) {
                records.extend(assemble(
                    &readings,
                    chip,
                    temperature,
                    bindings,
                    group.program.int_time.as_deref(),
                )?);
            }
        }
        info!("Assembled {} measurement records", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::MockTransport;

    const PROGRAM: &str = r#"
measurements:
  - name: iv_quick
    instrument:
      - { command: "*RST", type: write }
    program: {}
measure:
  - { name: voltage_input, command: ":DATA? 'V3'", type: query_ascii_values }
  - { name: anode_current, command: ":DATA? 'I1'", type: query_ascii_values }
chips:
  - voltage_input: voltage_input
    anode_current: anode_current
"#;

    #[test]
    fn test_chip_count_mismatch_is_config_error() {
        let config = MeasurementConfig::from_yaml(PROGRAM).unwrap();
        let mut transport = MockTransport::new();
        let mut runner = ProgramRunner::new(&mut transport);
        let err = runner
            .run(&config, &[], 25.0, &mut RunMode::Automatic)
            .unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_setup_runs_before_measure_commands() {
        let config = MeasurementConfig::from_yaml(PROGRAM).unwrap();
        let mut transport = MockTransport::new()
            .on_query(":DATA? 'V3'", "0.0,1.0")
            .on_query(":DATA? 'I1'", "1e-9,2e-9");
        let chips = vec!["E0101".to_string()];
        let records = ProgramRunner::new(&mut transport)
            .run(&config, &chips, 25.0, &mut RunMode::Automatic)
            .unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(transport.written(), ["*RST"]);
        assert_eq!(transport.queried(), [":DATA? 'V3'", ":DATA? 'I1'"]);
    }
}
