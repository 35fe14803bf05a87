//! Assembly of validated sweeps into structured measurement records.
//!
//! A chip mapping binds record fields to channels of the shared sweep,
//! optionally through a slice when several chips own contiguous ranges of one
//! acquisition. All bound traces must have equal length after slicing; a
//! mismatch fails loudly instead of truncating, since truncation would drop
//! or misalign data points silently.

use indexmap::IndexMap;
use serde::Deserialize;

use crate::error::{BenchError, MeasureResult};
use crate::readings::RawReadings;

/// Correction reference point in °C.
pub const REFERENCE_TEMPERATURE: f64 = 25.0;

/// Per-degree compensation factor of the diode current.
const CORRECTION_BASE: f64 = 1.15;

/// Projects a measured current to the reference temperature.
pub fn corrected_current(temperature: f64, current: f64) -> f64 {
    CORRECTION_BASE.powf(REFERENCE_TEMPERATURE - temperature) * current
}

/// Field mapping of one chip: record field name → channel binding.
pub type ChipBindings = IndexMap<String, FieldBinding>;

/// Binds a record field to a sweep channel, whole or sliced.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FieldBinding {
    /// Shorthand: the whole channel.
    Channel(String),
    /// Channel plus an optional sub-range.
    Sliced {
        /// Channel name.
        prop: String,
        /// Sub-range of the channel owned by this chip.
        #[serde(default)]
        slice: Option<SliceSpec>,
    },
}

impl FieldBinding {
    /// The bound channel name.
    pub fn prop(&self) -> &str {
        match self {
            FieldBinding::Channel(prop) => prop,
            FieldBinding::Sliced { prop, .. } => prop,
        }
    }

    fn select(&self, values: &[f64]) -> Vec<f64> {
        match self {
            FieldBinding::Channel(_) | FieldBinding::Sliced { slice: None, .. } => values.to_vec(),
            FieldBinding::Sliced {
                slice: Some(spec), ..
            } => spec.apply(values),
        }
    }
}

/// `[stop]`, `[start, stop]` or `[start, stop, step]`, with `null` meaning
/// "to the end". Out-of-range bounds clamp to the trace.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Vec<Option<usize>>")]
pub struct SliceSpec {
    start: usize,
    stop: Option<usize>,
    step: usize,
}

impl SliceSpec {
    fn apply(&self, values: &[f64]) -> Vec<f64> {
        let len = values.len();
        let start = self.start.min(len);
        let stop = self.stop.unwrap_or(len).min(len);
        if stop <= start {
            return Vec::new();
        }
        values[start..stop].iter().step_by(self.step).copied().collect()
    }
}

impl TryFrom<Vec<Option<usize>>> for SliceSpec {
    type Error = String;

    fn try_from(parts: Vec<Option<usize>>) -> Result<Self, Self::Error> {
        let (start, stop, step) = match parts.as_slice() {
            [stop] => (None, *stop, None),
            [start, stop] => (*start, *stop, None),
            [start, stop, step] => (*start, *stop, *step),
            _ => return Err(format!("slice takes 1 to 3 bounds, got {}", parts.len())),
        };
        let step = step.unwrap_or(1);
        if step == 0 {
            return Err("slice step must be at least 1".to_string());
        }
        Ok(Self {
            start: start.unwrap_or(0),
            stop,
            step,
        })
    }
}

/// One sweep point of one chip, ready for persistence.
///
/// Optional fields are populated from the chip mapping; the ambient
/// temperature of the acquisition is always present.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasurementRecord {
    /// Chip the record belongs to.
    pub chip: String,
    /// Ambient temperature at acquisition time, °C.
    pub temperature: f64,
    /// Swept input voltage, V.
    pub voltage_input: Option<f64>,
    /// Anode current, A.
    pub anode_current: Option<f64>,
    /// Anode current projected to the reference temperature, A.
    pub anode_current_corrected: Option<f64>,
    /// Cathode current, A.
    pub cathode_current: Option<f64>,
    /// Capacitance, F.
    pub capacitance: Option<f64>,
    /// Integration time label of the measurement group.
    pub int_time: Option<String>,
}

/// Builds a [`MeasurementRecord`] from (field name, value) pairs, rejecting
/// field names outside the record schema.
#[derive(Debug)]
pub struct RecordBuilder {
    record: MeasurementRecord,
}

impl RecordBuilder {
    /// Starts a record for `chip` at the given ambient temperature.
    pub fn new(chip: &str, temperature: f64) -> Self {
        Self {
            record: MeasurementRecord {
                chip: chip.to_string(),
                temperature,
                voltage_input: None,
                anode_current: None,
                anode_current_corrected: None,
                cathode_current: None,
                capacitance: None,
                int_time: None,
            },
        }
    }

    /// Stamps the group's integration-time label.
    pub fn int_time(mut self, int_time: Option<&str>) -> Self {
        self.record.int_time = int_time.map(String::from);
        self
    }

    /// Sets a schema field by name. Unknown names are configuration errors.
    pub fn set(&mut self, field: &str, value: f64) -> MeasureResult<()> {
        match field {
            "voltage_input" => self.record.voltage_input = Some(value),
            "anode_current" => self.record.anode_current = Some(value),
            "cathode_current" => self.record.cathode_current = Some(value),
            "capacitance" => self.record.capacitance = Some(value),
            other => {
                return Err(BenchError::Config(format!(
                    "unknown record field '{other}' in chip mapping"
                )))
            }
        }
        Ok(())
    }

    /// Finishes the record, deriving the temperature-corrected current when
    /// an anode current was bound.
    pub fn build(mut self) -> MeasurementRecord {
        if let Some(current) = self.record.anode_current {
            self.record.anode_current_corrected =
                Some(corrected_current(self.record.temperature, current));
        }
        self.record
    }
}

/// Zips the bound channels of one chip mapping into per-point records.
pub fn assemble(
    readings: &RawReadings,
    chip: &str,
    temperature: f64,
    bindings: &ChipBindings,
    int_time: Option<&str>,
) -> MeasureResult<Vec<MeasurementRecord>> {
    let mut columns: Vec<(&str, Vec<f64>)> = Vec::with_capacity(bindings.len());
    for (field, binding) in bindings {
        let values = readings.get(binding.prop()).ok_or_else(|| {
            BenchError::Config(format!(
                "chip '{chip}': field '{field}' is bound to channel '{}', which the sweep did not capture",
                binding.prop()
            ))
        })?;
        columns.push((field, binding.select(values)));
    }

    let points = columns.first().map_or(0, |(_, values)| values.len());
    for (field, values) in &columns {
        if values.len() != points {
            return Err(BenchError::Config(format!(
                "chip '{chip}': bound channels differ in length after slicing \
                 ('{}' has {} points, '{field}' has {})",
                columns[0].0,
                points,
                values.len()
            )));
        }
    }

    let mut records = Vec::with_capacity(points);
    for i in 0..points {
        let mut builder = RecordBuilder::new(chip, temperature).int_time(int_time);
        for (field, values) in &columns {
            builder.set(field, values[i])?;
        }
        records.push(builder.build());
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep() -> RawReadings {
        [
            (
                "voltage_input".to_string(),
                (0..10).map(f64::from).collect::<Vec<_>>(),
            ),
            (
                "anode_current".to_string(),
                (0..10).map(|i| f64::from(i) * 1e-9).collect::<Vec<_>>(),
            ),
        ]
        .into_iter()
        .collect()
    }

    fn bindings(pairs: &[(&str, FieldBinding)]) -> ChipBindings {
        pairs
            .iter()
            .map(|(field, binding)| (field.to_string(), binding.clone()))
            .collect()
    }

    fn sliced(prop: &str, start: usize, stop: usize) -> FieldBinding {
        FieldBinding::Sliced {
            prop: prop.to_string(),
            slice: Some(SliceSpec {
                start,
                stop: Some(stop),
                step: 1,
            }),
        }
    }

    #[test]
    fn test_two_chips_share_one_sweep() {
        let sweep = sweep();
        let chip_a = bindings(&[
            ("voltage_input", sliced("voltage_input", 0, 5)),
            ("anode_current", sliced("anode_current", 0, 5)),
        ]);
        let chip_b = bindings(&[
            ("voltage_input", sliced("voltage_input", 5, 10)),
            ("anode_current", sliced("anode_current", 5, 10)),
        ]);

        let a = assemble(&sweep, "E0101", 25.0, &chip_a, None).unwrap();
        let b = assemble(&sweep, "E0102", 25.0, &chip_b, None).unwrap();

        assert_eq!(a.len(), 5);
        assert_eq!(b.len(), 5);
        // Per-index alignment across all bound channels.
        assert_eq!(a[3].voltage_input, Some(3.0));
        assert_eq!(a[3].anode_current, Some(3e-9));
        assert_eq!(b[0].voltage_input, Some(5.0));
        assert_eq!(b[0].anode_current, Some(5e-9));
        assert_eq!(b[4].voltage_input, Some(9.0));
        assert!(a.iter().all(|r| r.chip == "E0101"));
    }

    #[test]
    fn test_length_mismatch_is_config_error_not_truncation() {
        let sweep = sweep();
        let mapping = bindings(&[
            ("voltage_input", sliced("voltage_input", 0, 5)),
            ("anode_current", sliced("anode_current", 0, 7)),
        ]);
        let err = assemble(&sweep, "E0101", 25.0, &mapping, None).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_corrected_current_identity_at_reference() {
        let sweep = sweep();
        let mapping = bindings(&[("anode_current", FieldBinding::Channel("anode_current".into()))]);
        let records = assemble(&sweep, "E0101", 25.0, &mapping, None).unwrap();
        for record in &records {
            assert_eq!(record.anode_current_corrected, record.anode_current);
        }
    }

    #[test]
    fn test_corrected_current_scales_below_reference() {
        // 1.15^10 ≈ 4.0456 at 15 °C.
        let scale = 1.15f64.powi(10);
        let value = corrected_current(15.0, 2e-9);
        assert!((value - 2e-9 * scale).abs() < 1e-21);
        assert!((corrected_current(15.0, 1.0) - 4.046).abs() < 1e-3);
    }

    #[test]
    fn test_no_correction_without_anode_current() {
        let sweep: RawReadings = [("cathode_current".to_string(), vec![1e-9])]
            .into_iter()
            .collect();
        let mapping = bindings(&[(
            "cathode_current",
            FieldBinding::Channel("cathode_current".into()),
        )]);
        let records = assemble(&sweep, "E0101", 20.0, &mapping, None).unwrap();
        assert_eq!(records[0].anode_current_corrected, None);
        assert_eq!(records[0].temperature, 20.0);
    }

    #[test]
    fn test_unknown_field_rejected() {
        let sweep = sweep();
        let mapping = bindings(&[("gate_current", FieldBinding::Channel("anode_current".into()))]);
        let err = assemble(&sweep, "E0101", 25.0, &mapping, None).unwrap_err();
        assert!(matches!(err, BenchError::Config(_)));
    }

    #[test]
    fn test_missing_channel_rejected() {
        let sweep = sweep();
        let mapping = bindings(&[("capacitance", FieldBinding::Channel("capacitance".into()))]);
        assert!(assemble(&sweep, "E0101", 25.0, &mapping, None).is_err());
    }

    #[test]
    fn test_slice_spec_parses_yaml_forms() {
        let spec: SliceSpec = serde_yaml::from_str("[0, 5]").unwrap();
        assert_eq!(spec.apply(&[0.0, 1.0, 2.0, 3.0, 4.0, 5.0]), [0.0, 1.0, 2.0, 3.0, 4.0]);

        let spec: SliceSpec = serde_yaml::from_str("[3]").unwrap();
        assert_eq!(spec.apply(&[0.0, 1.0, 2.0, 3.0]), [0.0, 1.0, 2.0]);

        let spec: SliceSpec = serde_yaml::from_str("[0, null, 2]").unwrap();
        assert_eq!(spec.apply(&[0.0, 1.0, 2.0, 3.0, 4.0]), [0.0, 2.0, 4.0]);

        assert!(serde_yaml::from_str::<SliceSpec>("[0, 1, 0]").is_err());
    }

    #[test]
    fn test_slice_clamps_out_of_range() {
        let spec: SliceSpec = serde_yaml::from_str("[8, 20]").unwrap();
        assert_eq!(spec.apply(&[0.0; 10]).len(), 2);
        let spec: SliceSpec = serde_yaml::from_str("[20, 30]").unwrap();
        assert!(spec.apply(&[0.0; 10]).is_empty());
    }

    #[test]
    fn test_int_time_stamped_on_every_record() {
        let sweep = sweep();
        let mapping = bindings(&[("voltage_input", FieldBinding::Channel("voltage_input".into()))]);
        let records = assemble(&sweep, "E0101", 25.0, &mapping, Some("SHORT")).unwrap();
        assert!(records.iter().all(|r| r.int_time.as_deref() == Some("SHORT")));
    }
}
