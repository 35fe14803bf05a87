//! Declarative command protocol executor.
//!
//! A measurement program describes every instrument interaction as a
//! [`CommandDescriptor`]; this module maps a descriptor onto the transport
//! and turns the answer into a typed [`CommandOutput`]. Command types are a
//! closed enum, so a program file naming an unknown type is rejected when the
//! program is loaded, not when it runs.

use serde::Deserialize;

use crate::adapters::Transport;
use crate::error::{BenchError, MeasureResult};
use crate::readings::RawReadings;

/// How a command interacts with the instrument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandType {
    /// Send only; the observable effect is instrument state change.
    Write,
    /// Send and return the raw text response.
    Query,
    /// Send and parse an ASCII-formatted block of numbers.
    QueryAsciiValues,
    /// Send and parse the response by splitting on commas.
    QueryCsvValues,
}

/// One declared interaction with the instrument.
///
/// `name` is present only for commands whose result must be retained as a
/// channel of the sweep's reading set.
#[derive(Debug, Clone, Deserialize)]
pub struct CommandDescriptor {
    /// Channel name the result is captured under, if any.
    #[serde(default)]
    pub name: Option<String>,
    /// Command string sent to the instrument.
    pub command: String,
    /// Dispatch type.
    #[serde(rename = "type")]
    pub kind: CommandType,
}

/// Typed result of executing one command.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// A `write` produced no data.
    None,
    /// Raw text from a `query`.
    Text(String),
    /// Parsed numbers from `query_ascii_values` / `query_csv_values`.
    Values(Vec<f64>),
}

/// Executes one command descriptor against the transport.
///
/// Transport failures propagate unmodified; this function never retries.
pub fn execute(
    transport: &mut dyn Transport,
    descriptor: &CommandDescriptor,
) -> MeasureResult<CommandOutput> {
    match descriptor.kind {
        CommandType::Write => {
            transport.write(&descriptor.command)?;
            Ok(CommandOutput::None)
        }
        CommandType::Query => Ok(CommandOutput::Text(transport.query(&descriptor.command)?)),
        CommandType::QueryAsciiValues => {
            let text = transport.query(&descriptor.command)?;
            Ok(CommandOutput::Values(parse_ascii_values(&text)?))
        }
        CommandType::QueryCsvValues => {
            let text = transport.query(&descriptor.command)?;
            Ok(CommandOutput::Values(parse_csv_values(&text)?))
        }
    }
}

/// Executes a setup command list for its side effects, discarding outputs.
pub fn apply_setup(
    transport: &mut dyn Transport,
    commands: &[CommandDescriptor],
) -> MeasureResult<()> {
    for descriptor in commands {
        execute(transport, descriptor)?;
    }
    Ok(())
}

/// Runs every measure command in order and captures named results into a
/// fresh [`RawReadings`].
///
/// A named `query` is parsed into a single-element trace; a named `write` is
/// a configuration error, since a write produces nothing to capture.
pub fn acquire_sweep(
    transport: &mut dyn Transport,
    commands: &[CommandDescriptor],
) -> MeasureResult<RawReadings> {
    let mut readings = RawReadings::new();
    for descriptor in commands {
        let output = execute(transport, descriptor)?;
        let Some(name) = &descriptor.name else {
            continue;
        };
        let values = match output {
            CommandOutput::Values(values) => values,
            CommandOutput::Text(text) => {
                let trimmed = text.trim();
                let value = trimmed.parse::<f64>().map_err(|_| {
                    BenchError::Response(format!(
                        "channel '{name}': cannot parse '{trimmed}' as a number"
                    ))
                })?;
                vec![value]
            }
            CommandOutput::None => {
                return Err(BenchError::Config(format!(
                    "measure command '{name}' has type 'write' and produces no reading"
                )));
            }
        };
        readings.insert(name.clone(), values);
    }
    Ok(readings)
}

/// Parses an ASCII block of numbers separated by commas and/or whitespace.
fn parse_ascii_values(text: &str) -> MeasureResult<Vec<f64>> {
    text.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<f64>().map_err(|_| {
                BenchError::Response(format!("cannot parse ASCII value '{token}' as a number"))
            })
        })
        .collect()
}

/// Parses a comma-separated response into numbers.
fn parse_csv_values(text: &str) -> MeasureResult<Vec<f64>> {
    text.trim()
        .split(',')
        .map(|token| {
            token.trim().parse::<f64>().map_err(|_| {
                BenchError::Response(format!("cannot parse CSV value '{token}' as a number"))
            })
        })
        .collect()
}
