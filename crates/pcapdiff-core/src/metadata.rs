use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::model::Capture;

/// Summary of one capture, computed once from its packet list.
///
/// Informational only: the diff engine carries it into the result untouched.
///
/// # Examples
/// ```
/// use pcapdiff_core::{Capture, CaptureMetadata, LayerBuilder};
///
/// let capture: Capture = [
///     LayerBuilder::new("frame")
///         .field("timestamp", 10.0)
///         .sublayer(LayerBuilder::new("ip")),
///     LayerBuilder::new("frame")
///         .field("timestamp", 12.5)
///         .sublayer(LayerBuilder::new("eth")),
/// ]
/// .into_iter()
/// .collect();
///
/// let meta = CaptureMetadata::from_capture("a.pcapng", 2048, &capture);
/// assert_eq!(meta.packet_count, 2);
/// assert_eq!(meta.protocols, ["eth", "ip"]);
/// assert_eq!(meta.duration_str(), "2.50s");
/// assert_eq!(meta.summary(), "a.pcapng: 2 packets, 2.50s, 2.0KB");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureMetadata {
    pub filename: String,
    pub packet_count: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_time: Option<f64>,
    /// Distinct top-level layer names, sorted.
    pub protocols: Vec<String>,
    pub file_size: u64,
}

impl CaptureMetadata {
    /// Metadata for a capture with no packets.
    pub fn empty(filename: impl Into<String>, file_size: u64) -> Self {
        Self {
            filename: filename.into(),
            packet_count: 0,
            start_time: None,
            end_time: None,
            protocols: Vec::new(),
            file_size,
        }
    }

    pub fn from_capture(filename: impl Into<String>, file_size: u64, capture: &Capture) -> Self {
        let mut first_ts = None;
        let mut last_ts = None;
        let mut protocols = BTreeSet::new();

        for packet in capture.packets() {
            update_ts_bounds(&mut first_ts, &mut last_ts, packet.timestamp());
            for layer in packet.sublayers() {
                protocols.insert(layer.name().to_string());
            }
        }

        Self {
            filename: filename.into(),
            packet_count: capture.len() as u64,
            start_time: first_ts,
            end_time: last_ts,
            protocols: protocols.into_iter().collect(),
            file_size,
        }
    }

    /// Capture duration in seconds, when both bounds are known.
    pub fn duration(&self) -> Option<f64> {
        match (self.start_time, self.end_time) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn duration_str(&self) -> String {
        match self.duration() {
            None => "Unknown".to_string(),
            Some(d) if d < 60.0 => format!("{d:.2}s"),
            Some(d) if d < 3600.0 => format!("{:.1}m", d / 60.0),
            Some(d) => format!("{:.1}h", d / 3600.0),
        }
    }

    pub fn file_size_str(&self) -> String {
        if self.file_size == 0 {
            return "Unknown".to_string();
        }
        let mut size = self.file_size as f64;
        for unit in ["B", "KB", "MB", "GB"] {
            if size < 1024.0 {
                return format!("{size:.1}{unit}");
            }
            size /= 1024.0;
        }
        format!("{size:.1}TB")
    }

    pub fn time_start_rfc3339(&self) -> Option<String> {
        ts_to_rfc3339(self.start_time)
    }

    pub fn time_end_rfc3339(&self) -> Option<String> {
        ts_to_rfc3339(self.end_time)
    }

    pub fn summary(&self) -> String {
        format!(
            "{}: {} packets, {}, {}",
            self.filename,
            self.packet_count,
            self.duration_str(),
            self.file_size_str()
        )
    }
}

fn update_ts_bounds(first: &mut Option<f64>, last: &mut Option<f64>, ts: Option<f64>) {
    let ts = match ts {
        Some(ts) => ts,
        None => return,
    };
    match first {
        None => *first = Some(ts),
        Some(existing) => {
            if ts < *existing {
                *first = Some(ts);
            }
        }
    }
    match last {
        None => *last = Some(ts),
        Some(existing) => {
            if ts > *existing {
                *last = Some(ts);
            }
        }
    }
}

pub(crate) fn ts_to_rfc3339(ts: Option<f64>) -> Option<String> {
    let ts = ts?;
    let nanos = (ts * 1_000_000_000.0) as i128;
    OffsetDateTime::from_unix_timestamp_nanos(nanos)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
}
