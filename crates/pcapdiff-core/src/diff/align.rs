use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::config::UntimestampedPolicy;

/// One alignment entry: indices into capture 1 and capture 2.
///
/// At least one side is always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlignedPair {
    pub index_1: Option<usize>,
    pub index_2: Option<usize>,
}

impl AlignedPair {
    pub fn paired(index_1: usize, index_2: usize) -> Self {
        Self {
            index_1: Some(index_1),
            index_2: Some(index_2),
        }
    }

    pub fn removed(index_1: usize) -> Self {
        Self {
            index_1: Some(index_1),
            index_2: None,
        }
    }

    pub fn added(index_2: usize) -> Self {
        Self {
            index_1: None,
            index_2: Some(index_2),
        }
    }
}

/// Output of the aligner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alignment {
    /// Capture-1-driven entries (paired or removed) first, then added ones.
    pub pairs: Vec<AlignedPair>,
    /// Capture-1 packets left out because they have no timestamp.
    pub excluded_1: usize,
    /// Capture-2 packets left out because they have no timestamp.
    pub excluded_2: usize,
}

/// Greedy nearest-timestamp alignment of two packet sequences.
///
/// Capture-1 packets are visited in timestamp order; each one takes the
/// closest not-yet-used capture-2 packet whose delta is within
/// `time_window`, ties going to the earliest candidate in capture-2
/// timestamp order. Unmatched capture-1 packets become removed entries and
/// leftover capture-2 packets become added entries, in that order. The
/// search is a full scan per packet (O(n·m)) and the result depends on
/// visiting order; it is not a globally optimal assignment.
///
/// Packets without a timestamp are handled by `policy`: excluded (only
/// counted) or paired positionally among themselves.
///
/// # Examples
/// ```
/// use pcapdiff_core::{AlignedPair, UntimestampedPolicy, align_timestamps};
///
/// let alignment = align_timestamps(
///     &[Some(1.0), Some(1.05)],
///     &[Some(1.02)],
///     0.5,
///     UntimestampedPolicy::Exclude,
/// );
/// assert_eq!(
///     alignment.pairs,
///     [AlignedPair::paired(0, 0), AlignedPair::removed(1)]
/// );
/// ```
pub fn align_timestamps(
    timestamps_1: &[Option<f64>],
    timestamps_2: &[Option<f64>],
    time_window: f64,
    policy: UntimestampedPolicy,
) -> Alignment {
    let (timed_1, untimed_1) = split_by_timestamp(timestamps_1);
    let (timed_2, untimed_2) = split_by_timestamp(timestamps_2);

    let mut pairs = Vec::with_capacity(timestamps_1.len() + timestamps_2.len());
    let mut used_2 = vec![false; timed_2.len()];

    for &(ts_1, index_1) in &timed_1 {
        let mut best: Option<(usize, f64)> = None;
        for (pos, &(ts_2, _)) in timed_2.iter().enumerate() {
            if used_2[pos] {
                continue;
            }
            let delta = (ts_2 - ts_1).abs();
            if delta <= time_window && best.is_none_or(|(_, best_delta)| delta < best_delta) {
                best = Some((pos, delta));
            }
        }
        match best {
            Some((pos, _)) => {
                used_2[pos] = true;
                pairs.push(AlignedPair::paired(index_1, timed_2[pos].1));
            }
            None => pairs.push(AlignedPair::removed(index_1)),
        }
    }

    let positional = policy == UntimestampedPolicy::AlignByPosition;
    if positional {
        for (k, &index_1) in untimed_1.iter().enumerate() {
            match untimed_2.get(k) {
                Some(&index_2) => pairs.push(AlignedPair::paired(index_1, index_2)),
                None => pairs.push(AlignedPair::removed(index_1)),
            }
        }
    }

    for (pos, &(_, index_2)) in timed_2.iter().enumerate() {
        if !used_2[pos] {
            pairs.push(AlignedPair::added(index_2));
        }
    }

    if positional {
        for &index_2 in untimed_2.iter().skip(untimed_1.len()) {
            pairs.push(AlignedPair::added(index_2));
        }
    }

    let (excluded_1, excluded_2) = if positional {
        (0, 0)
    } else {
        (untimed_1.len(), untimed_2.len())
    };

    Alignment {
        pairs,
        excluded_1,
        excluded_2,
    }
}

/// Timestamped `(ts, index)` pairs sorted by time then index, and the
/// indices of untimestamped packets in capture order.
fn split_by_timestamp(timestamps: &[Option<f64>]) -> (Vec<(f64, usize)>, Vec<usize>) {
    let mut timed = Vec::with_capacity(timestamps.len());
    let mut untimed = Vec::new();
    for (index, ts) in timestamps.iter().enumerate() {
        match ts {
            Some(ts) => timed.push((*ts, index)),
            None => untimed.push(index),
        }
    }
    timed.sort_by(|a, b| match a.0.total_cmp(&b.0) {
        Ordering::Equal => a.1.cmp(&b.1),
        other => other,
    });
    (timed, untimed)
}
