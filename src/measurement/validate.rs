//! Declarative threshold validation of raw readings.
//!
//! A rule set maps path expressions over a [`RawReadings`] to min/max bounds.
//! Rules are evaluated in the order the program file declares them; the first
//! violated bound short-circuits the whole evaluation with the rule's
//! configured message. The engine is pure apart from a warn-level log of that
//! message and never mutates the reading set.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use log::warn;
use serde::Deserialize;

use crate::error::{BenchError, MeasureResult};
use crate::readings::RawReadings;

/// Ordered path → rule mapping, as declared in the program file.
pub type RuleSet = IndexMap<String, Rule>;

/// Threshold rule applied to every value a path selects.
///
/// An unrecognized key in the program file fails deserialization, so a typo
/// like `mim:` is caught when the program is loaded.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Rule {
    /// Lower bound; values below it are violations.
    #[serde(default)]
    pub min: Option<Bound>,
    /// Upper bound; values above it are violations.
    #[serde(default)]
    pub max: Option<Bound>,
    /// Apply `abs()` to the selected value before checking bounds.
    #[serde(default)]
    pub abs: bool,
}

/// One bound with its human-readable failure message.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Bound {
    /// Threshold value.
    pub value: f64,
    /// Message logged and reported when the bound is violated.
    pub message: String,
}

/// Outcome of evaluating a rule set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Every matched value of every rule passed.
    Pass,
    /// A bound was violated; carries the rule's configured message.
    Fail(String),
}

/// Selects one or more scalar values inside a reading set.
///
/// Syntax: `channel` or `channel[*]` (every element), `channel[i]` (one
/// element). A path that matches nothing contributes no checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPath {
    channel: String,
    select: Select,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Select {
    All,
    Index(usize),
}

impl ChannelPath {
    /// Values the path selects, in trace order.
    fn resolve<'a>(&self, readings: &'a RawReadings) -> &'a [f64] {
        let Some(values) = readings.get(&self.channel) else {
            return &[];
        };
        match self.select {
            Select::All => values,
            Select::Index(i) => values.get(i..=i).unwrap_or(&[]),
        }
    }
}

impl FromStr for ChannelPath {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || BenchError::Config(format!("invalid validation path '{s}'"));

        let (channel, select) = match s.find('[') {
            None => (s, Select::All),
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix(']')
                    .filter(|inner| !inner.contains('['))
                    .ok_or_else(invalid)?;
                let select = if inner == "*" {
                    Select::All
                } else {
                    Select::Index(inner.parse().map_err(|_| invalid())?)
                };
                (&s[..open], select)
            }
        };
        if channel.is_empty() || channel.contains(']') {
            return Err(invalid());
        }
        Ok(Self {
            channel: channel.to_string(),
            select,
        })
    }
}

impl fmt::Display for ChannelPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.select {
            Select::All => write!(f, "{}", self.channel),
            Select::Index(i) => write!(f, "{}[{i}]", self.channel),
        }
    }
}

/// Evaluates a rule set against a reading set.
///
/// Returns `Verdict::Fail` with the first violated rule's message; later
/// rules are not evaluated. A malformed path is a configuration error.
pub fn validate(readings: &RawReadings, rules: &RuleSet) -> MeasureResult<Verdict> {
    for (path_expr, rule) in rules {
        let path: ChannelPath = path_expr.parse()?;
        for &raw in path.resolve(readings) {
            let value = if rule.abs { raw.abs() } else { raw };
            if let Some(min) = &rule.min {
                if value < min.value {
                    warn!("{}", min.message);
                    return Ok(Verdict::Fail(min.message.clone()));
                }
            }
            if let Some(max) = &rule.max {
                if value > max.value {
                    warn!("{}", max.message);
                    return Ok(Verdict::Fail(max.message.clone()));
                }
            }
        }
    }
    Ok(Verdict::Pass)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readings(pairs: &[(&str, &[f64])]) -> RawReadings {
        pairs
            .iter()
            .map(|(name, values)| (name.to_string(), values.to_vec()))
            .collect()
    }

    fn max_rule(value: f64, abs: bool) -> Rule {
        Rule {
            min: None,
            max: Some(Bound {
                value,
                message: "too large".into(),
            }),
            abs,
        }
    }

    fn min_rule(value: f64, abs: bool) -> Rule {
        Rule {
            min: Some(Bound {
                value,
                message: "too small".into(),
            }),
            max: None,
            abs,
        }
    }

    #[test]
    fn test_path_parsing() {
        assert_eq!(
            "i1[0]".parse::<ChannelPath>().unwrap(),
            ChannelPath {
                channel: "i1".into(),
                select: Select::Index(0)
            }
        );
        assert_eq!(
            "anode_current[*]".parse::<ChannelPath>().unwrap().select,
            Select::All
        );
        assert_eq!("i1".parse::<ChannelPath>().unwrap().select, Select::All);
        assert!("[0]".parse::<ChannelPath>().is_err());
        assert!("i1[zero]".parse::<ChannelPath>().is_err());
        assert!("i1[0".parse::<ChannelPath>().is_err());
    }

    #[test]
    fn test_pass_when_all_bounds_hold() {
        let set = readings(&[("i1", &[1e-10, 5e-10])]);
        let mut rules = RuleSet::new();
        rules.insert("i1[*]".into(), max_rule(1e-9, false));
        assert_eq!(validate(&set, &rules).unwrap(), Verdict::Pass);
    }

    #[test]
    fn test_first_violation_short_circuits() {
        let set = readings(&[("i1", &[2e-9]), ("i2", &[1.0])]);
        let mut rules = RuleSet::new();
        rules.insert("i1[0]".into(), max_rule(1e-9, false));
        // Malformed path: evaluating this rule would be a configuration
        // error, so reaching it proves the short-circuit is broken.
        rules.insert("i2[!!".into(), min_rule(0.0, false));

        assert_eq!(
            validate(&set, &rules).unwrap(),
            Verdict::Fail("too large".into())
        );
    }

    #[test]
    fn test_malformed_path_is_config_error() {
        let set = readings(&[("i2", &[1.0])]);
        let mut rules = RuleSet::new();
        rules.insert("i2[!!".into(), min_rule(0.0, false));
        assert!(matches!(
            validate(&set, &rules),
            Err(BenchError::Config(_))
        ));
    }

    #[test]
    fn test_abs_applied_before_bounds() {
        let set = readings(&[("i1", &[-2e-3])]);

        // min -1e-3 with abs: |−2e−3| = 2e−3 > −1e−3, so the bound holds,
        // for either sign of the raw value...
        let mut rules = RuleSet::new();
        rules.insert("i1[0]".into(), min_rule(-1e-3, true));
        assert_eq!(validate(&set, &rules).unwrap(), Verdict::Pass);
        let positive = readings(&[("i1", &[2e-3])]);
        assert_eq!(validate(&positive, &rules).unwrap(), Verdict::Pass);

        // ...but the same raw value without abs violates it.
        let mut rules = RuleSet::new();
        rules.insert("i1[0]".into(), min_rule(-1e-3, false));
        assert_eq!(
            validate(&set, &rules).unwrap(),
            Verdict::Fail("too small".into())
        );

        // And with abs a max bound catches the magnitude regardless of sign.
        let mut rules = RuleSet::new();
        rules.insert("i1[0]".into(), max_rule(1e-3, true));
        assert_eq!(
            validate(&set, &rules).unwrap(),
            Verdict::Fail("too large".into())
        );
    }

    #[test]
    fn test_unmatched_path_contributes_no_checks() {
        let set = readings(&[("i1", &[1.0])]);
        let mut rules = RuleSet::new();
        rules.insert("missing[*]".into(), max_rule(0.0, false));
        rules.insert("i1[5]".into(), max_rule(0.0, false));
        assert_eq!(validate(&set, &rules).unwrap(), Verdict::Pass);
    }

    #[test]
    fn test_unknown_rule_key_rejected_at_load() {
        let parsed: Result<Rule, _> =
            serde_yaml::from_str("{ mim: { value: 0.0, message: typo } }");
        assert!(parsed.is_err());
    }
}
