//! Batch partitioning of the frame range.
//!
//! Batch `i` covers frames `[i * B, min((i + 1) * B, total))`. Batches are
//! gapless, non-overlapping and ordered, so concatenating their segments in
//! index order reproduces the full frame sequence.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use kinetype_common::error::{ExportError, ExportResult};

/// A contiguous frame range encoded into one video segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Batch {
    /// Position in the partition.
    pub index: usize,

    /// First frame (inclusive).
    pub start: u64,

    /// One past the last frame (exclusive).
    pub end: u64,
}

impl Batch {
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn frames(&self) -> Range<u64> {
        self.start..self.end
    }

    /// File name of the segment this batch encodes into.
    pub fn segment_file_name(&self) -> String {
        format!("segment_{:04}.mp4", self.index)
    }
}

/// Split `[0, total_frames)` into batches of at most `batch_size` frames.
pub fn partition(total_frames: u64, batch_size: u64) -> Vec<Batch> {
    let batch_size = batch_size.max(1);
    let count = total_frames.div_ceil(batch_size) as usize;
    (0..count)
        .map(|index| {
            let start = index as u64 * batch_size;
            Batch {
                index,
                start,
                end: (start + batch_size).min(total_frames),
            }
        })
        .collect()
}

/// Assert `next` starts exactly where `prev` ended.
///
/// A mismatch means the partition itself is wrong, so it is reported as a
/// continuity error and never retried.
pub fn check_continuity(prev: &Batch, next: &Batch) -> ExportResult<()> {
    if next.index != prev.index + 1 {
        return Err(ExportError::continuity(format!(
            "batch {} follows batch {}",
            next.index, prev.index
        )));
    }
    if next.start != prev.end {
        return Err(ExportError::continuity(format!(
            "batch {} starts at frame {} but batch {} ended at frame {}",
            next.index, next.start, prev.index, prev.end
        )));
    }
    if next.is_empty() {
        return Err(ExportError::continuity(format!(
            "batch {} is empty ({}..{})",
            next.index, next.start, next.end
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_exact_single_batch() {
        let batches = partition(150, 150);
        assert_eq!(
            batches,
            vec![Batch {
                index: 0,
                start: 0,
                end: 150
            }]
        );
    }

    #[test]
    fn test_two_full_batches() {
        let batches = partition(300, 150);
        assert_eq!(batches.len(), 2);
        assert_eq!(batches[0].frames(), 0..150);
        assert_eq!(batches[1].frames(), 150..300);
    }

    #[test]
    fn test_short_tail_batch() {
        let batches = partition(301, 150);
        assert_eq!(batches.len(), 3);
        assert_eq!(batches[2].frames(), 300..301);
        assert_eq!(batches[2].len(), 1);
    }

    #[test]
    fn test_empty_range_has_no_batches() {
        assert!(partition(0, 150).is_empty());
    }

    #[test]
    fn test_segment_names_sort_by_index() {
        let batches = partition(1000, 10);
        let names: Vec<String> = batches.iter().map(Batch::segment_file_name).collect();
        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
        assert_eq!(names[7], "segment_0007.mp4");
    }

    #[test]
    fn test_continuity_detects_gap() {
        let prev = Batch {
            index: 0,
            start: 0,
            end: 150,
        };
        let gap = Batch {
            index: 1,
            start: 151,
            end: 300,
        };
        assert!(matches!(
            check_continuity(&prev, &gap),
            Err(ExportError::Continuity { .. })
        ));
        let overlap = Batch {
            index: 1,
            start: 149,
            end: 300,
        };
        assert!(check_continuity(&prev, &overlap).is_err());
        let ok = Batch {
            index: 1,
            start: 150,
            end: 300,
        };
        assert!(check_continuity(&prev, &ok).is_ok());
    }

    proptest! {
        #[test]
        fn prop_partition_reconstructs_range(total in 0u64..20_000, size in 1u64..500) {
            let batches = partition(total, size);
            let mut next = 0u64;
            for (i, batch) in batches.iter().enumerate() {
                prop_assert_eq!(batch.index, i);
                prop_assert_eq!(batch.start, next);
                prop_assert!(batch.len() >= 1);
                prop_assert!(batch.len() <= size);
                if i > 0 {
                    prop_assert!(check_continuity(&batches[i - 1], batch).is_ok());
                }
                next = batch.end;
            }
            prop_assert_eq!(next, total);
        }
    }
}
