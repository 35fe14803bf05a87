//! Settle loop for measurements that need a stable electrical state.
//!
//! Chips with appreciable capacitance or leakage keep drifting for a while
//! after the sweep voltage is applied. The detector re-runs the sweep, fits a
//! line to the current-vs-voltage trace and watches the magnitude of the
//! fitted intercept — the residual DC offset that should decay to zero as
//! the chip settles. The first sweep whose offset stops improving ends the
//! loop, and the *previous* sweep is the one trusted.

use std::thread;
use std::time::Duration;

use log::debug;

use crate::adapters::Transport;
use crate::error::{BenchError, MeasureResult};
use crate::protocol::{acquire_sweep, CommandDescriptor};
use crate::readings::RawReadings;

/// Independent-variable channel of the drift fit.
pub const X_CHANNEL: &str = "voltage_input";

/// Dependent-variable channels, first match wins.
pub const Y_CHANNELS: [&str; 2] = ["anode_current", "cathode_current"];

/// Tuning for [`acquire_settled`].
#[derive(Debug, Clone)]
pub struct SettleOptions {
    /// Delay between sweeps.
    pub delay: Duration,
    /// Optional bound on the number of sweeps. `None` keeps sampling until
    /// the offset stops improving, however long that takes.
    pub max_sweeps: Option<usize>,
}

impl Default for SettleOptions {
    fn default() -> Self {
        Self {
            delay: Duration::from_millis(500),
            max_sweeps: None,
        }
    }
}

/// Least-squares fit of `y = a + b·x`; returns `(a, b)`.
///
/// Degenerate input (fewer than two points, unequal lengths, zero spread in
/// `x`) cannot be fitted and fails rather than returning nonsense.
pub fn linear_fit(x: &[f64], y: &[f64]) -> MeasureResult<(f64, f64)> {
    if x.len() != y.len() {
        return Err(BenchError::Fit(format!(
            "x and y traces differ in length ({} vs {})",
            x.len(),
            y.len()
        )));
    }
    if x.len() < 2 {
        return Err(BenchError::Fit(format!(
            "need at least two points, got {}",
            x.len()
        )));
    }

    let n = x.len() as f64;
    let x_mean = x.iter().sum::<f64>() / n;
    let y_mean = y.iter().sum::<f64>() / n;
    let mut covariance = 0.0;
    let mut variance = 0.0;
    for (&xi, &yi) in x.iter().zip(y) {
        covariance += (xi - x_mean) * (yi - y_mean);
        variance += (xi - x_mean) * (xi - x_mean);
    }
    if variance == 0.0 {
        return Err(BenchError::Fit(
            "all x values are identical, the slope is unconstrained".to_string(),
        ));
    }

    let slope = covariance / variance;
    let intercept = y_mean - slope * x_mean;
    Ok((intercept, slope))
}

/// Magnitude of the fitted intercept of the sweep's I/V trace.
///
/// Uses `voltage_input` as x and the first present current channel as y;
/// a sweep missing either is a configuration error.
pub fn drift_offset(readings: &RawReadings) -> MeasureResult<f64> {
    let x = readings
        .get(X_CHANNEL)
        .ok_or_else(|| BenchError::Config(format!("no '{X_CHANNEL}' channel in sweep")))?;
    let y = Y_CHANNELS
        .iter()
        .find_map(|channel| readings.get(channel))
        .ok_or_else(|| BenchError::Config("no current measurement found".to_string()))?;

    let (intercept, _slope) = linear_fit(x, y)?;
    Ok(intercept.abs())
}

/// Repeats the sweep until the drift offset stops improving and returns the
/// last improving sweep.
///
/// Each iteration acquires a brand-new reading set; the previous one is kept
/// in a single local. As soon as an offset is not strictly better than its
/// predecessor the previous reading set is the converged one — the current,
/// non-improving sweep is discarded. With `max_sweeps` unset the loop runs
/// until the signal settles.
pub fn acquire_settled(
    transport: &mut dyn Transport,
    commands: &[CommandDescriptor],
    options: &SettleOptions,
) -> MeasureResult<RawReadings> {
    let mut previous: Option<(f64, RawReadings)> = None;
    let mut sweeps = 0usize;

    loop {
        let readings = acquire_sweep(transport, commands)?;
        let offset = drift_offset(&readings)?;
        sweeps += 1;

        if let Some((previous_offset, previous_readings)) = previous.take() {
            if offset >= previous_offset {
                debug!(
                    "settled after {sweeps} sweeps (offset {offset:.3e} >= {previous_offset:.3e})"
                );
                return Ok(previous_readings);
            }
        }
        debug!("sweep {sweeps}: drift offset {offset:.3e}, still improving");
        previous = Some((offset, readings));

        if let Some(cap) = options.max_sweeps {
            if sweeps >= cap {
                return Err(BenchError::Unsettled(sweeps));
            }
        }
        thread::sleep(options.delay);
    }
}
