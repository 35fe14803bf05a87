//! Raw reading sets produced by one measurement sweep.
//!
//! A [`RawReadings`] maps channel names to the ordered numeric trace each
//! measure command returned. A set is built fresh for every sweep and never
//! mutated afterwards, so callers (the settle loop in particular) can keep
//! the previous sweep around in a single local for comparison.

use std::collections::BTreeMap;

/// Channel name to trace mapping for a single sweep.
///
/// Channels that will be zipped into records must have equal length; channels
/// captured from a plain `query` are single-element and are only useful to
/// validation rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawReadings {
    channels: BTreeMap<String, Vec<f64>>,
}

impl RawReadings {
    /// Creates an empty reading set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a channel trace. Replaces any previous trace of the same name.
    pub fn insert(&mut self, channel: impl Into<String>, values: Vec<f64>) {
        self.channels.insert(channel.into(), values);
    }

    /// Returns the trace for `channel`, if captured.
    pub fn get(&self, channel: &str) -> Option<&[f64]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    /// True when a trace named `channel` was captured.
    pub fn contains(&self, channel: &str) -> bool {
        self.channels.contains_key(channel)
    }

    /// Iterates channels in name order.
    pub fn channels(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.channels
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Number of captured channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// True when no channel was captured.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Multi-line dump of every channel, used when asking the operator
    /// whether a failing reading should be kept.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        for (name, values) in self.channels() {
            out.push_str(name);
            out.push_str(": [");
            for (i, value) in values.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{value:.4e}"));
            }
            out.push_str("]\n");
        }
        out
    }
}

impl FromIterator<(String, Vec<f64>)> for RawReadings {
    fn from_iter<T: IntoIterator<Item = (String, Vec<f64>)>>(iter: T) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}
