//! Diff engine: alignment, layer/field comparison and scoring.

mod align;
mod fields;
mod layers;
mod similarity;

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::{ConfigError, DiffConfig};
use crate::metadata::CaptureMetadata;
use crate::model::Capture;
use crate::{ComparisonResult, DiffCounts, DiffType, PacketDiff};

pub use align::{AlignedPair, Alignment, align_timestamps};
pub use fields::compare_fields;
pub use layers::compare_layers;
pub use similarity::similarity;

/// Compares two captures under one [`DiffConfig`].
///
/// Holds no state beyond its configuration, so one differ can serve any
/// number of comparisons, from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct PacketDiffer {
    config: DiffConfig,
}

impl PacketDiffer {
    pub fn new(config: DiffConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DiffConfig {
        &self.config
    }

    pub fn align_packets(&self, capture_1: &Capture, capture_2: &Capture) -> Alignment {
        align_timestamps(
            &capture_1.timestamps(),
            &capture_2.timestamps(),
            self.config.time_window,
            self.config.untimestamped,
        )
    }

    /// Align both captures and classify every alignment entry.
    ///
    /// The metadata values are carried into the result unchanged.
    pub fn compare_captures(
        &self,
        capture_1: &Capture,
        capture_2: &Capture,
        file1_metadata: CaptureMetadata,
        file2_metadata: CaptureMetadata,
    ) -> ComparisonResult {
        let started = Instant::now();
        let ignore = &self.config.ignore_fields;

        let alignment = self.align_packets(capture_1, capture_2);
        debug!(
            entries = alignment.pairs.len(),
            time_window = self.config.time_window,
            "aligned captures"
        );
        if alignment.excluded_1 > 0 || alignment.excluded_2 > 0 {
            warn!(
                excluded_1 = alignment.excluded_1,
                excluded_2 = alignment.excluded_2,
                "packets without timestamps left out of the comparison"
            );
        }

        let mut packet_diffs = Vec::with_capacity(alignment.pairs.len());
        for pair in &alignment.pairs {
            // Ids follow emitted entries, so they stay contiguous.
            let packet_id = packet_diffs.len();
            let packet_1 = pair.index_1.and_then(|index| capture_1.packet(index));
            let packet_2 = pair.index_2.and_then(|index| capture_2.packet(index));

            let diff = match (pair.index_1.zip(packet_1), pair.index_2.zip(packet_2)) {
                (Some((index_1, packet_1)), Some((index_2, packet_2))) => {
                    let layer_diffs = compare_layers(packet_1, packet_2, ignore);
                    let diff_type = if layer_diffs.is_empty() {
                        DiffType::Unchanged
                    } else {
                        DiffType::Modified
                    };
                    PacketDiff {
                        packet_id,
                        timestamp_1: packet_1.timestamp(),
                        timestamp_2: packet_2.timestamp(),
                        diff_type,
                        layer_diffs,
                        packet_1: Some(index_1),
                        packet_2: Some(index_2),
                        similarity_score: similarity(packet_1, packet_2, ignore),
                    }
                }
                (Some((index_1, packet_1)), None) => {
                    PacketDiff::removed(packet_id, index_1, packet_1.timestamp())
                }
                (None, Some((index_2, packet_2))) => {
                    PacketDiff::added(packet_id, index_2, packet_2.timestamp())
                }
                (None, None) => {
                    debug_assert!(false, "alignment entry {pair:?} resolves to no packet");
                    continue;
                }
            };
            packet_diffs.push(diff);
        }

        let counts: DiffCounts = packet_diffs.iter().map(|diff| diff.diff_type).collect();
        let comparison_time = started.elapsed();
        info!(
            packets = packet_diffs.len(),
            unchanged = counts.unchanged,
            modified = counts.modified,
            added = counts.added,
            removed = counts.removed,
            elapsed_ms = comparison_time.as_millis() as u64,
            "comparison finished"
        );

        ComparisonResult {
            file1_metadata,
            file2_metadata,
            packet_diffs,
            comparison_time,
            total_packets_1: capture_1.len() as u64,
            total_packets_2: capture_2.len() as u64,
            identical_packets: counts.unchanged,
            modified_packets: counts.modified,
            added_packets: counts.added,
            removed_packets: counts.removed,
            excluded_packets_1: alignment.excluded_1 as u64,
            excluded_packets_2: alignment.excluded_2 as u64,
        }
    }
}
