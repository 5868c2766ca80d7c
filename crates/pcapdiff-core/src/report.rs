//! Serialisable report built from a [`ComparisonResult`].
//!
//! The report is the stable export shape: it lists only packets that
//! differ and renders metadata in display form. Key order is stable, so
//! two runs over the same inputs produce identical JSON apart from
//! `generated_at` and `comparison_time_secs`.

use serde::{Deserialize, Serialize};

use crate::metadata::CaptureMetadata;
use crate::{ComparisonResult, DiffCounts, DiffType, LayerDiffs, PacketDiff};

/// Current report schema version.
pub const REPORT_VERSION: u32 = 1;
/// Default timestamp used when the caller provides none.
pub const DEFAULT_GENERATED_AT: &str = "1970-01-01T00:00:00Z";

/// Tool metadata embedded in reports.
///
/// # Examples
/// ```
/// use pcapdiff_core::ToolInfo;
///
/// let tool = ToolInfo::current();
/// assert_eq!(tool.name, "pcapdiff");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolInfo {
    pub name: String,
    /// Tool version (semver).
    pub version: String,
}

impl ToolInfo {
    pub fn current() -> Self {
        Self {
            name: "pcapdiff".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One capture as shown in the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureReport {
    pub filename: String,
    pub packet_count: u64,
    pub file_size: u64,
    pub protocols: Vec<String>,
    /// Human-readable duration, e.g. `2.50s`.
    pub duration: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_end: Option<String>,
}

impl From<&CaptureMetadata> for CaptureReport {
    fn from(meta: &CaptureMetadata) -> Self {
        Self {
            filename: meta.filename.clone(),
            packet_count: meta.packet_count,
            file_size: meta.file_size,
            protocols: meta.protocols.clone(),
            duration: meta.duration_str(),
            time_start: meta.time_start_rfc3339(),
            time_end: meta.time_end_rfc3339(),
        }
    }
}

/// A packet entry that differs between the captures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketDiffReport {
    pub packet_id: usize,
    pub diff_type: DiffType,
    pub summary: String,
    pub similarity_score: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_1: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp_2: Option<f64>,
    pub layer_diffs: LayerDiffs,
}

impl From<&PacketDiff> for PacketDiffReport {
    fn from(diff: &PacketDiff) -> Self {
        Self {
            packet_id: diff.packet_id,
            diff_type: diff.diff_type,
            summary: diff.summary(),
            similarity_score: diff.similarity_score,
            timestamp_1: diff.timestamp_1,
            timestamp_2: diff.timestamp_2,
            layer_diffs: diff.layer_diffs.clone(),
        }
    }
}

/// Exported comparison report.
///
/// # Examples
/// ```
/// use pcapdiff_core::{Capture, CaptureMetadata, PacketDiffer, REPORT_VERSION, build_report};
///
/// let empty = Capture::new();
/// let result = PacketDiffer::default().compare_captures(
///     &empty,
///     &empty,
///     CaptureMetadata::empty("a.pcap", 0),
///     CaptureMetadata::empty("b.pcap", 0),
/// );
/// let report = build_report(&result, "2024-01-01T00:00:00Z");
/// assert_eq!(report.report_version, REPORT_VERSION);
/// assert!(report.packet_diffs.is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffReport {
    /// Report schema version (not the binary version).
    pub report_version: u32,
    pub tool: ToolInfo,
    /// RFC3339 timestamp of report generation.
    pub generated_at: String,
    pub file1: CaptureReport,
    pub file2: CaptureReport,
    pub comparison_summary: String,
    pub similarity_percentage: f64,
    pub comparison_time_secs: f64,
    pub diff_counts: DiffCounts,
    pub excluded_packets_1: u64,
    pub excluded_packets_2: u64,
    /// Differing packets only, in comparison order.
    pub packet_diffs: Vec<PacketDiffReport>,
}

impl DiffReport {
    pub fn to_json(&self, pretty: bool) -> serde_json::Result<String> {
        if pretty {
            serde_json::to_string_pretty(self)
        } else {
            serde_json::to_string(self)
        }
    }
}

pub fn build_report(result: &ComparisonResult, generated_at: impl Into<String>) -> DiffReport {
    DiffReport {
        report_version: REPORT_VERSION,
        tool: ToolInfo::current(),
        generated_at: generated_at.into(),
        file1: CaptureReport::from(&result.file1_metadata),
        file2: CaptureReport::from(&result.file2_metadata),
        comparison_summary: result.summary(),
        similarity_percentage: result.similarity_percentage(),
        comparison_time_secs: result.comparison_time.as_secs_f64(),
        diff_counts: result.diff_counts(),
        excluded_packets_1: result.excluded_packets_1,
        excluded_packets_2: result.excluded_packets_2,
        packet_diffs: result
            .packet_diffs
            .iter()
            .filter(|diff| diff.has_differences())
            .map(PacketDiffReport::from)
            .collect(),
    }
}
