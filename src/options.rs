//! Option schema declaration and validation.
//!
//! Bots declare an ordered [`OptionSpec`] once, before any presentation. The
//! presentation layer collects raw values keyed by the spec's keys and submits
//! them; validation is all-or-nothing and a valid submission freezes into an
//! immutable [`OptionSet`] for the run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// Constraint kind for a single option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OptionKind {
    /// Numeric value in the inclusive range `[min, max]`.
    Slider { min: i64, max: i64 },
    /// Any subset (possibly empty) of `choices`.
    MultiSelect { choices: Vec<String> },
    /// Exactly one of `choices`.
    Select { choices: Vec<String> },
}

/// One configurable parameter: key, human-readable label, constraint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDescriptor {
    pub key: String,
    pub label: String,
    pub kind: OptionKind,
}

/// Ordered sequence of option descriptors with unique keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OptionSpec {
    descriptors: Vec<OptionDescriptor>,
}

impl OptionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a numeric range option. Panics on a duplicate key: the schema
    /// is authored by the bot developer, so a collision is a defect, not input.
    pub fn slider(mut self, key: &str, label: &str, min: i64, max: i64) -> Self {
        self.push(key, label, OptionKind::Slider { min, max });
        self
    }

    /// Declare a subset-of-set option.
    pub fn multi_select(mut self, key: &str, label: &str, choices: &[&str]) -> Self {
        self.push(
            key,
            label,
            OptionKind::MultiSelect {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        );
        self
    }

    /// Declare a one-of-set option.
    pub fn select(mut self, key: &str, label: &str, choices: &[&str]) -> Self {
        self.push(
            key,
            label,
            OptionKind::Select {
                choices: choices.iter().map(|c| c.to_string()).collect(),
            },
        );
        self
    }

    fn push(&mut self, key: &str, label: &str, kind: OptionKind) {
        assert!(
            !self.descriptors.iter().any(|d| d.key == key),
            "duplicate option key: {key}"
        );
        self.descriptors.push(OptionDescriptor {
            key: key.to_string(),
            label: label.to_string(),
            kind,
        });
    }

    pub fn descriptors(&self) -> &[OptionDescriptor] {
        &self.descriptors
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    fn descriptor(&self, key: &str) -> Option<&OptionDescriptor> {
        self.descriptors.iter().find(|d| d.key == key)
    }

    /// Validate a raw submission against this spec.
    ///
    /// Unknown keys are rejected first (all of them reported), then each
    /// known key is checked against its constraint, then missing keys are
    /// reported. A submission with any offence fails as a whole; nothing is
    /// stored on failure.
    pub fn validate(&self, raw: HashMap<String, OptionValue>) -> Result<OptionSet, ValidationError> {
        let mut offences = Vec::new();

        for key in raw.keys() {
            if self.descriptor(key).is_none() {
                offences.push(Offence::Unknown { key: key.clone() });
            }
        }

        for desc in &self.descriptors {
            match raw.get(&desc.key) {
                None => offences.push(Offence::Missing {
                    key: desc.key.clone(),
                }),
                Some(value) => {
                    if let Some(reason) = check_constraint(&desc.kind, value) {
                        offences.push(Offence::Invalid {
                            key: desc.key.clone(),
                            reason,
                        });
                    }
                }
            }
        }

        if offences.is_empty() {
            Ok(OptionSet { values: raw })
        } else {
            Err(ValidationError { offences })
        }
    }
}

/// Returns a rejection reason, or `None` if the value satisfies the kind.
fn check_constraint(kind: &OptionKind, value: &OptionValue) -> Option<String> {
    match (kind, value) {
        (OptionKind::Slider { min, max }, OptionValue::Number(n)) => {
            if n < min || n > max {
                Some(format!("{n} is outside [{min}, {max}]"))
            } else {
                None
            }
        }
        (OptionKind::MultiSelect { choices }, OptionValue::Selection(picked)) => picked
            .iter()
            .find(|p| !choices.contains(*p))
            .map(|p| format!("{p:?} is not one of {choices:?}")),
        (OptionKind::Select { choices }, OptionValue::Choice(picked)) => {
            if choices.contains(picked) {
                None
            } else {
                Some(format!("{picked:?} is not one of {choices:?}"))
            }
        }
        (kind, value) => Some(format!("expected {} value, got {}", kind_name(kind), value_name(value))),
    }
}

fn kind_name(kind: &OptionKind) -> &'static str {
    match kind {
        OptionKind::Slider { .. } => "numeric",
        OptionKind::MultiSelect { .. } => "multi-select",
        OptionKind::Select { .. } => "select",
    }
}

fn value_name(value: &OptionValue) -> &'static str {
    match value {
        OptionValue::Number(_) => "numeric",
        OptionValue::Selection(_) => "multi-select",
        OptionValue::Choice(_) => "select",
    }
}

/// A user-supplied value for one option.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Number(i64),
    Selection(Vec<String>),
    Choice(String),
}

/// Validated, immutable option values for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionSet {
    values: HashMap<String, OptionValue>,
}

impl OptionSet {
    /// Empty set, for bots that declare no options.
    pub fn empty() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    pub fn number(&self, key: &str) -> Option<i64> {
        match self.values.get(key) {
            Some(OptionValue::Number(n)) => Some(*n),
            _ => None,
        }
    }

    pub fn selection(&self, key: &str) -> Option<&[String]> {
        match self.values.get(key) {
            Some(OptionValue::Selection(v)) => Some(v.as_slice()),
            _ => None,
        }
    }

    pub fn choice(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(OptionValue::Choice(c)) => Some(c.as_str()),
            _ => None,
        }
    }
}

/// A single validation offence, keyed to the submission entry it concerns.
#[derive(Debug, Clone, PartialEq)]
pub enum Offence {
    Unknown { key: String },
    Missing { key: String },
    Invalid { key: String, reason: String },
}

impl std::fmt::Display for Offence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Offence::Unknown { key } => write!(f, "unknown option: {key}"),
            Offence::Missing { key } => write!(f, "missing option: {key}"),
            Offence::Invalid { key, reason } => write!(f, "invalid option {key}: {reason}"),
        }
    }
}

/// Validation failure carrying every offending key. The submission as a
/// whole is rejected; the controller stays in the configuring state.
#[derive(Debug, Clone, Error)]
#[error("option validation failed: {}", render(.offences))]
pub struct ValidationError {
    pub offences: Vec<Offence>,
}

fn render(offences: &[Offence]) -> String {
    offences
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> OptionSpec {
        OptionSpec::new()
            .slider("running_time", "How long to run (minutes)?", 1, 180)
            .multi_select("multi_select_example", "Multi-select Example", &["A", "B", "C"])
            .select("menu_example", "Menu Example", &["A", "B", "C"])
    }

    fn full_raw(running_time: i64) -> HashMap<String, OptionValue> {
        HashMap::from([
            ("running_time".into(), OptionValue::Number(running_time)),
            (
                "multi_select_example".into(),
                OptionValue::Selection(vec!["A".into(), "C".into()]),
            ),
            ("menu_example".into(), OptionValue::Choice("B".into())),
        ])
    }

    #[test]
    fn valid_submission_produces_option_set() {
        let set = spec().validate(full_raw(5)).expect("should validate");
        assert_eq!(set.number("running_time"), Some(5));
        assert_eq!(
            set.selection("multi_select_example"),
            Some(&["A".to_string(), "C".to_string()][..])
        );
        assert_eq!(set.choice("menu_example"), Some("B"));
    }

    #[test]
    fn unknown_key_rejected() {
        let mut raw = full_raw(5);
        raw.insert("speed".into(), OptionValue::Number(3));

        let err = spec().validate(raw).unwrap_err();
        assert!(err
            .offences
            .contains(&Offence::Unknown { key: "speed".into() }));
    }

    #[test]
    fn out_of_range_rejected_boundaries_accepted() {
        assert!(spec().validate(full_raw(0)).is_err());
        assert!(spec().validate(full_raw(181)).is_err());
        assert!(spec().validate(full_raw(1)).is_ok());
        assert!(spec().validate(full_raw(180)).is_ok());
    }

    #[test]
    fn missing_key_rejected() {
        let mut raw = full_raw(5);
        raw.remove("menu_example");

        let err = spec().validate(raw).unwrap_err();
        assert!(err.offences.contains(&Offence::Missing {
            key: "menu_example".into()
        }));
    }

    #[test]
    fn non_member_choice_rejected() {
        let mut raw = full_raw(5);
        raw.insert("menu_example".into(), OptionValue::Choice("D".into()));
        assert!(spec().validate(raw).is_err());

        let mut raw = full_raw(5);
        raw.insert(
            "multi_select_example".into(),
            OptionValue::Selection(vec!["A".into(), "Z".into()]),
        );
        assert!(spec().validate(raw).is_err());
    }

    #[test]
    fn empty_multi_select_is_valid() {
        let mut raw = full_raw(5);
        raw.insert("multi_select_example".into(), OptionValue::Selection(vec![]));
        assert!(spec().validate(raw).is_ok());
    }

    #[test]
    fn kind_mismatch_rejected() {
        let mut raw = full_raw(5);
        raw.insert("running_time".into(), OptionValue::Choice("fast".into()));

        let err = spec().validate(raw).unwrap_err();
        assert!(matches!(
            err.offences.as_slice(),
            [Offence::Invalid { key, .. }] if key == "running_time"
        ));
    }

    #[test]
    fn all_offences_reported_together() {
        let mut raw = full_raw(0); // out of range
        raw.remove("menu_example"); // missing
        raw.insert("bogus".into(), OptionValue::Number(1)); // unknown

        let err = spec().validate(raw).unwrap_err();
        assert_eq!(err.offences.len(), 3);
    }

    #[test]
    fn raw_values_deserialize_from_json() {
        let raw: HashMap<String, OptionValue> = serde_json::from_str(
            r#"{"running_time": 5, "multi_select_example": ["A"], "menu_example": "C"}"#,
        )
        .unwrap();
        assert!(spec().validate(raw).is_ok());
    }

    #[test]
    #[should_panic(expected = "duplicate option key")]
    fn duplicate_key_panics_in_builder() {
        let _ = OptionSpec::new()
            .slider("running_time", "a", 1, 10)
            .slider("running_time", "b", 1, 10);
    }
}
