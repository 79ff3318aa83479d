//! String-keyed job configuration.
//!
//! The compute framework describes a job as a flat map of string keys to
//! string values; workers receive the map alongside the job and consult it
//! during task setup and teardown. This crate is that map: ordered,
//! serializable, with small helpers for the comma-joined list and decimal
//! integer encodings the framework uses.
//!
//! Typed views over specific keys (artifact URI lists, timestamps, flags)
//! live with the components that own those keys; `JobConf` itself knows
//! nothing about them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A job's configuration: an ordered string-to-string map.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobConf {
    entries: BTreeMap<String, String>,
}

impl JobConf {
    /// Creates an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw value stored under `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Appends `value` to the value under `key`, separated by `separator`.
    ///
    /// When the key is absent (or holds an empty string), `value` is stored
    /// verbatim.
    pub fn append(&mut self, key: &str, value: &str, separator: &str) {
        let slot = self.entries.entry(key.to_string()).or_default();
        if !slot.is_empty() {
            slot.push_str(separator);
        }
        slot.push_str(value);
    }

    /// Decodes the comma-joined list under `key`.
    ///
    /// Missing keys and empty segments decode to nothing; surrounding
    /// whitespace is trimmed from each element.
    #[must_use]
    pub fn get_strings(&self, key: &str) -> Vec<String> {
        self.get(key)
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Stores `values` under `key` as a comma-joined list.
    pub fn set_strings<S: AsRef<str>>(&mut self, key: impl Into<String>, values: &[S]) {
        let joined = values
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(",");
        self.set(key, joined);
    }

    /// Decimal integer under `key`, or `default` when the key is absent or
    /// does not parse.
    #[must_use]
    pub fn get_i64(&self, key: &str, default: i64) -> i64 {
        self.get(key)
            .and_then(|value| value.trim().parse().ok())
            .unwrap_or(default)
    }

    /// Number of keys present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the configuration holds no keys at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates over all key/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}
