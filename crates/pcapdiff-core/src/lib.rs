//! pcapdiff core library: field-level comparison of two packet captures.
//!
//! The crate has two halves. The diff engine (`diff`) aligns packets of two
//! captures by timestamp proximity, compares matched packets layer by layer
//! and field by field, scores their similarity and aggregates everything
//! into a [`ComparisonResult`]. It is pure, synchronous and stateless: it
//! reads [`Capture`] arenas and never performs I/O, so comparisons can run
//! from several threads over the same inputs.
//!
//! Ingestion (`source`, `decode`, `loader`) turns pcap/pcapng files into
//! those arenas. It owns all I/O and the parsed-capture cache.
//!
//! Invariants:
//! - Every timestamped packet appears in exactly one [`PacketDiff`].
//! - Output ordering is deterministic: capture-1-driven entries first, then
//!   capture-2-only entries; map keys are sorted.
//!
//! # Examples
//! ```
//! use pcapdiff_core::{Capture, CaptureMetadata, DiffType, LayerBuilder, PacketDiffer};
//!
//! let one: Capture = [LayerBuilder::new("frame")
//!     .field("timestamp", 10.0)
//!     .sublayer(LayerBuilder::new("IP").field("ttl", 64u8))]
//! .into_iter()
//! .collect();
//! let two: Capture = [LayerBuilder::new("frame")
//!     .field("timestamp", 10.3)
//!     .sublayer(LayerBuilder::new("IP").field("ttl", 32u8))]
//! .into_iter()
//! .collect();
//!
//! let result = PacketDiffer::default().compare_captures(
//!     &one,
//!     &two,
//!     CaptureMetadata::from_capture("one.pcap", 0, &one),
//!     CaptureMetadata::from_capture("two.pcap", 0, &two),
//! );
//! assert_eq!(result.packet_diffs.len(), 1);
//! assert_eq!(result.packet_diffs[0].diff_type, DiffType::Modified);
//! assert_eq!(result.packet_diffs[0].layer_diffs["IP"]["ttl"], DiffType::Modified);
//! ```

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

mod config;
mod decode;
mod diff;
mod loader;
mod metadata;
mod model;
mod report;
mod source;

pub use config::{
    ConfigError, DEFAULT_ALIGNMENT_THRESHOLD, DEFAULT_IGNORE_FIELDS, DEFAULT_TIME_WINDOW,
    DiffConfig, IgnoreSet, UntimestampedPolicy,
};
pub use decode::{FrameContext, decode_packet};
pub use diff::{
    AlignedPair, Alignment, PacketDiffer, align_timestamps, compare_fields, compare_layers,
    similarity,
};
pub use loader::{
    CaptureLoader, IngestError, LoadedCapture, count_packets, is_valid_capture_file, load_capture,
    load_capture_with_progress, read_capture, read_capture_with_progress,
};
pub use metadata::CaptureMetadata;
pub use model::{Capture, FieldValue, Fields, LayerBuilder, LayerId, PacketLayer, TIMESTAMP_FIELD};
pub use report::{
    CaptureReport, DEFAULT_GENERATED_AT, DiffReport, PacketDiffReport, REPORT_VERSION, ToolInfo,
    build_report,
};
pub use source::{PacketEvent, PacketSource, PcapFileSource, SourceError};

/// Outcome of comparing a packet or a field.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum DiffType {
    Unchanged,
    Added,
    Removed,
    Modified,
}

impl DiffType {
    pub const ALL: [DiffType; 4] = [
        DiffType::Unchanged,
        DiffType::Added,
        DiffType::Removed,
        DiffType::Modified,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DiffType::Unchanged => "unchanged",
            DiffType::Added => "added",
            DiffType::Removed => "removed",
            DiffType::Modified => "modified",
        }
    }

    /// Capitalised label for reports.
    pub fn title(self) -> &'static str {
        match self {
            DiffType::Unchanged => "Unchanged",
            DiffType::Added => "Added",
            DiffType::Removed => "Removed",
            DiffType::Modified => "Modified",
        }
    }
}

impl fmt::Display for DiffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Field name to classification, only for fields that differ.
pub type FieldDiffs = BTreeMap<String, DiffType>;
/// Layer name to its field differences; layers without differences are absent.
pub type LayerDiffs = BTreeMap<String, FieldDiffs>;

/// Result of comparing one aligned packet pair, or one unmatched packet.
///
/// `packet_1`/`packet_2` are packet indices into the two compared
/// [`Capture`]s; resolve them with [`Capture::packet`].
///
/// # Examples
/// ```
/// use pcapdiff_core::{DiffType, PacketDiff};
///
/// let diff = PacketDiff::removed(0, 7, Some(1.0));
/// assert_eq!(diff.diff_type, DiffType::Removed);
/// assert_eq!(diff.packet_1, Some(7));
/// assert_eq!(diff.summary(), "Packet removed");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketDiff {
    /// Position in the comparison output (not a capture index).
    pub packet_id: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_2: Option<f64>,
    pub diff_type: DiffType,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub layer_diffs: LayerDiffs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet_1: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub packet_2: Option<usize>,
    /// Field overlap score in `0.0..=1.0`.
    pub similarity_score: f64,
}

impl PacketDiff {
    /// Entry for a capture-1 packet with no counterpart.
    pub fn removed(packet_id: usize, index: usize, timestamp: Option<f64>) -> Self {
        Self {
            packet_id,
            timestamp_1: timestamp,
            timestamp_2: None,
            diff_type: DiffType::Removed,
            layer_diffs: LayerDiffs::new(),
            packet_1: Some(index),
            packet_2: None,
            similarity_score: 0.0,
        }
    }

    /// Entry for a capture-2 packet with no counterpart.
    pub fn added(packet_id: usize, index: usize, timestamp: Option<f64>) -> Self {
        Self {
            packet_id,
            timestamp_1: None,
            timestamp_2: timestamp,
            diff_type: DiffType::Added,
            layer_diffs: LayerDiffs::new(),
            packet_1: None,
            packet_2: Some(index),
            similarity_score: 0.0,
        }
    }

    /// Absolute time difference between the two sides, when both are known.
    pub fn timestamp_diff(&self) -> Option<f64> {
        match (self.timestamp_1, self.timestamp_2) {
            (Some(ts1), Some(ts2)) => Some((ts2 - ts1).abs()),
            _ => None,
        }
    }

    pub fn has_differences(&self) -> bool {
        self.diff_type != DiffType::Unchanged || !self.layer_diffs.is_empty()
    }

    pub fn summary(&self) -> String {
        match self.diff_type {
            DiffType::Added => "Packet added".to_string(),
            DiffType::Removed => "Packet removed".to_string(),
            DiffType::Unchanged => "No differences".to_string(),
            DiffType::Modified => {
                let fields: usize = self.layer_diffs.values().map(BTreeMap::len).sum();
                format!(
                    "Modified: {} layers, {} fields",
                    self.layer_diffs.len(),
                    fields
                )
            }
        }
    }

    /// Changed fields as `layer.field` paths, in sorted order.
    pub fn changed_fields(&self) -> Vec<String> {
        self.layer_diffs
            .iter()
            .flat_map(|(layer, fields)| {
                fields
                    .iter()
                    .filter(|(_, diff)| **diff != DiffType::Unchanged)
                    .map(move |(field, _)| format!("{layer}.{field}"))
            })
            .collect()
    }
}

/// Per-category packet counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffCounts {
    pub unchanged: u64,
    pub added: u64,
    pub removed: u64,
    pub modified: u64,
}

impl DiffCounts {
    pub fn record(&mut self, diff_type: DiffType) {
        *self.slot(diff_type) += 1;
    }

    pub fn get(&self, diff_type: DiffType) -> u64 {
        match diff_type {
            DiffType::Unchanged => self.unchanged,
            DiffType::Added => self.added,
            DiffType::Removed => self.removed,
            DiffType::Modified => self.modified,
        }
    }

    fn slot(&mut self, diff_type: DiffType) -> &mut u64 {
        match diff_type {
            DiffType::Unchanged => &mut self.unchanged,
            DiffType::Added => &mut self.added,
            DiffType::Removed => &mut self.removed,
            DiffType::Modified => &mut self.modified,
        }
    }

    pub fn total(&self) -> u64 {
        self.unchanged + self.added + self.removed + self.modified
    }

    /// `(DiffType, count)` pairs in [`DiffType::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (DiffType, u64)> + '_ {
        DiffType::ALL.into_iter().map(|diff_type| (diff_type, self.get(diff_type)))
    }
}

impl FromIterator<DiffType> for DiffCounts {
    fn from_iter<I: IntoIterator<Item = DiffType>>(iter: I) -> Self {
        let mut counts = DiffCounts::default();
        for diff_type in iter {
            counts.record(diff_type);
        }
        counts
    }
}

/// Output of one comparison run. Read-only once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComparisonResult {
    pub file1_metadata: CaptureMetadata,
    pub file2_metadata: CaptureMetadata,
    /// Index equals [`PacketDiff::packet_id`].
    pub packet_diffs: Vec<PacketDiff>,
    /// Wall-clock time spent comparing.
    pub comparison_time: Duration,
    pub total_packets_1: u64,
    pub total_packets_2: u64,
    pub identical_packets: u64,
    pub modified_packets: u64,
    pub added_packets: u64,
    pub removed_packets: u64,
    /// Capture-1 packets left out of the alignment for lack of a timestamp.
    #[serde(default)]
    pub excluded_packets_1: u64,
    /// Capture-2 packets left out of the alignment for lack of a timestamp.
    #[serde(default)]
    pub excluded_packets_2: u64,
}

impl ComparisonResult {
    pub fn diff_counts(&self) -> DiffCounts {
        self.packet_diffs.iter().map(|diff| diff.diff_type).collect()
    }

    /// Mean similarity over all entries, as a percentage (100 when empty).
    pub fn similarity_percentage(&self) -> f64 {
        if self.packet_diffs.is_empty() {
            return 100.0;
        }
        let total: f64 = self
            .packet_diffs
            .iter()
            .map(|diff| diff.similarity_score)
            .sum();
        total / self.packet_diffs.len() as f64 * 100.0
    }

    pub fn has_differences(&self) -> bool {
        self.packet_diffs.iter().any(PacketDiff::has_differences)
    }

    pub fn summary(&self) -> String {
        let counts = self.diff_counts();
        format!(
            "Comparison: {} packets analyzed, {:.1}% similar, {} modified, {} added, {} removed",
            self.packet_diffs.len(),
            self.similarity_percentage(),
            counts.modified,
            counts.added,
            counts.removed
        )
    }
}
