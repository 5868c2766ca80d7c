//! Comparison configuration.
//!
//! The engine is configured once through [`DiffConfig`]; validation happens
//! when a [`crate::PacketDiffer`] is built, after which comparisons cannot
//! fail.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_ALIGNMENT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_TIME_WINDOW: f64 = 1.0;

/// Fields that vary between captures independently of packet content.
///
/// `frame` is the root layer produced by ingestion; its capture-relative
/// fields are listed here alongside the per-protocol checksums.
pub const DEFAULT_IGNORE_FIELDS: &[&str] = &[
    "frame.timestamp",
    "frame.time_epoch",
    "frame.time_delta",
    "frame.time_relative",
    "frame.number",
    "ip.checksum",
    "tcp.checksum",
    "udp.checksum",
    "icmp.checksum",
];

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("time window must be a finite, non-negative number of seconds (got {value})")]
    InvalidTimeWindow { value: f64 },
    #[error("alignment threshold must be within 0.0..=1.0 (got {value})")]
    InvalidAlignmentThreshold { value: f64 },
}

/// Set of field names excluded from diffing and similarity scoring.
///
/// An entry matches either a bare field name (`checksum`) or a
/// layer-qualified one (`tcp.checksum`). Matching ignores ASCII case.
///
/// # Examples
/// ```
/// use pcapdiff_core::IgnoreSet;
///
/// let mut ignore = IgnoreSet::default();
/// assert!(ignore.is_ignored(Some("TCP"), "checksum"));
/// assert!(!ignore.is_ignored(Some("tcp"), "seq"));
///
/// ignore.insert("seq");
/// assert!(ignore.is_ignored(Some("tcp"), "seq"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IgnoreSet {
    names: BTreeSet<String>,
}

impl IgnoreSet {
    pub fn empty() -> Self {
        Self {
            names: BTreeSet::new(),
        }
    }

    /// Add a name; returns `false` when it was already present.
    pub fn insert(&mut self, name: impl AsRef<str>) -> bool {
        self.names.insert(name.as_ref().to_ascii_lowercase())
    }

    pub fn contains(&self, name: &str) -> bool {
        !self.names.is_empty() && self.names.contains(&name.to_ascii_lowercase())
    }

    /// Whether `field` of `layer` is excluded, by bare or qualified name.
    pub fn is_ignored(&self, layer: Option<&str>, field: &str) -> bool {
        if self.names.is_empty() {
            return false;
        }
        if self.contains(field) {
            return true;
        }
        layer.is_some_and(|layer| self.contains(&format!("{layer}.{field}")))
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for IgnoreSet {
    fn default() -> Self {
        DEFAULT_IGNORE_FIELDS.iter().collect()
    }
}

impl<S: AsRef<str>> Extend<S> for IgnoreSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for name in iter {
            self.insert(name);
        }
    }
}

impl<S: AsRef<str>> FromIterator<S> for IgnoreSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = IgnoreSet::empty();
        set.extend(iter);
        set
    }
}

/// What the aligner does with packets that carry no timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UntimestampedPolicy {
    /// Leave them out of the alignment and the report; they are only counted.
    #[default]
    Exclude,
    /// Pair the k-th untimestamped packet of each capture with each other.
    AlignByPosition,
}

/// Engine configuration.
///
/// # Examples
/// ```
/// use pcapdiff_core::{DiffConfig, UntimestampedPolicy};
///
/// let config = DiffConfig::default()
///     .with_time_window(0.5)
///     .with_ignore_fields(["ip.id"])
///     .with_untimestamped(UntimestampedPolicy::AlignByPosition);
/// assert!(config.validate().is_ok());
/// assert!(config.ignore_fields.is_ignored(Some("ip"), "id"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffConfig {
    /// Minimum similarity for a match. Validated and carried, but matching
    /// is gated by `time_window` alone.
    pub alignment_threshold: f64,
    /// Maximum timestamp delta (seconds) between two matched packets.
    pub time_window: f64,
    pub ignore_fields: IgnoreSet,
    #[serde(default)]
    pub untimestamped: UntimestampedPolicy,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            alignment_threshold: DEFAULT_ALIGNMENT_THRESHOLD,
            time_window: DEFAULT_TIME_WINDOW,
            ignore_fields: IgnoreSet::default(),
            untimestamped: UntimestampedPolicy::default(),
        }
    }
}

impl DiffConfig {
    pub fn with_time_window(mut self, seconds: f64) -> Self {
        self.time_window = seconds;
        self
    }

    pub fn with_alignment_threshold(mut self, threshold: f64) -> Self {
        self.alignment_threshold = threshold;
        self
    }

    /// Extend the ignore set with additional names.
    pub fn with_ignore_fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore_fields.extend(names);
        self
    }

    pub fn with_untimestamped(mut self, policy: UntimestampedPolicy) -> Self {
        self.untimestamped = policy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.time_window.is_finite() || self.time_window < 0.0 {
            return Err(ConfigError::InvalidTimeWindow {
                value: self.time_window,
            });
        }
        if !(0.0..=1.0).contains(&self.alignment_threshold) {
            return Err(ConfigError::InvalidAlignmentThreshold {
                value: self.alignment_threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, DEFAULT_IGNORE_FIELDS, DiffConfig, IgnoreSet};

    #[test]
    fn default_ignore_set_covers_checksums_and_frame_fields() {
        let ignore = IgnoreSet::default();
        assert_eq!(ignore.len(), DEFAULT_IGNORE_FIELDS.len());
        for layer in ["ip", "tcp", "udp", "icmp"] {
            assert!(ignore.is_ignored(Some(layer), "checksum"));
        }
        assert!(ignore.is_ignored(Some("frame"), "timestamp"));
        assert!(!ignore.is_ignored(None, "checksum"));
        assert!(!ignore.is_ignored(Some("eth"), "checksum"));
    }

    #[test]
    fn bare_names_match_any_layer() {
        let ignore: IgnoreSet = ["TTL"].into_iter().collect();
        assert!(ignore.is_ignored(Some("ip"), "ttl"));
        assert!(ignore.is_ignored(None, "ttl"));
        assert!(ignore.contains("ttl"));
    }

    #[test]
    fn empty_set_ignores_nothing() {
        let ignore = IgnoreSet::empty();
        assert!(ignore.is_empty());
        assert!(!ignore.is_ignored(Some("tcp"), "checksum"));
    }

    #[test]
    fn validate_rejects_negative_or_nan_window() {
        let err = DiffConfig::default()
            .with_time_window(-0.1)
            .validate()
            .unwrap_err();
        assert_eq!(err, ConfigError::InvalidTimeWindow { value: -0.1 });
        assert!(
            DiffConfig::default()
                .with_time_window(f64::NAN)
                .validate()
                .is_err()
        );
        assert!(DiffConfig::default().with_time_window(0.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_threshold_outside_unit_interval() {
        let err = DiffConfig::default()
            .with_alignment_threshold(1.5)
            .validate()
            .unwrap_err();
        assert!(err.to_string().contains("alignment threshold"));
        assert!(
            DiffConfig::default()
                .with_alignment_threshold(0.0)
                .validate()
                .is_ok()
        );
    }
}
