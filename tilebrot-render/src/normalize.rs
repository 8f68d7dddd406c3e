//! Histogram equalization onto a bounded palette.
//!
//! Raw iteration counts span `0..=max_iterations`, far more values than a
//! palette has entries. The map built here spends palette entries on the
//! values that actually occur, merging the most frequent ones so that rare
//! values stay visually distinguishable.

use std::collections::BTreeMap;

/// Occurrences of each iteration count in the current epoch, ordered by count value.
pub type Histogram = BTreeMap<u32, u64>;

/// Iteration count → palette bucket in `[0, buckets)`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizationMap {
    buckets: BTreeMap<u32, u32>,
}

impl NormalizationMap {
    /// Bucket assigned to `value`, if the value occurred in the histogram.
    #[inline]
    pub fn bucket(&self, value: u32) -> Option<u32> {
        self.buckets.get(&value).copied()
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.buckets.iter().map(|(&v, &b)| (v, b))
    }

    /// Number of distinct buckets actually in use.
    pub fn buckets_used(&self) -> usize {
        let mut used: Vec<u32> = self.buckets.values().copied().collect();
        used.dedup();
        used.len()
    }
}

/// Build the normalization map for `histogram` over a palette of `palette` buckets.
///
/// With fewer distinct values than buckets, values are spread linearly by
/// rank. Otherwise the occurrence count at rank `distinct − palette` becomes
/// a threshold: walking values in ascending order, the running bucket only
/// advances after a value more frequent than the threshold, or one exactly
/// at it while tie slots remain. Values at or below the threshold therefore
/// share buckets with their neighbours.
pub fn normalize(histogram: &Histogram, palette: u32) -> NormalizationMap {
    let distinct = histogram.len() as u64;
    let size = u64::from(palette);
    let mut buckets = BTreeMap::new();

    if distinct < size {
        for (rank, &value) in histogram.keys().enumerate() {
            buckets.insert(value, (rank as u64 * size / distinct) as u32);
        }
        return NormalizationMap { buckets };
    }

    let mut counts: Vec<u64> = histogram.values().copied().collect();
    counts.sort_unstable();

    let pivot = (distinct - size) as usize;
    let threshold = counts[pivot];
    let mut tie_slots = 1 + counts[pivot + 1..]
        .iter()
        .take_while(|&&c| c == threshold)
        .count();

    let mut bucket = 0u32;
    for (&value, &count) in histogram {
        buckets.insert(value, bucket);

        let takes_tie = count == threshold && tie_slots > 1;
        if count > threshold || takes_tie {
            if takes_tie {
                tie_slots -= 1;
            }
            bucket += 1;
        }
    }

    NormalizationMap { buckets }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn histogram(pairs: &[(u32, u64)]) -> Histogram {
        pairs.iter().copied().collect()
    }

    /// Deterministic pseudo-random histograms (LCG) for property checks.
    fn synthetic(seed: u64, distinct: u32) -> Histogram {
        let mut state = seed;
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            state >> 33
        };
        (0..distinct)
            .map(|i| (i * 3 + (next() % 3) as u32, 1 + next() % 40))
            .collect()
    }

    #[test]
    fn empty_histogram_gives_empty_map() {
        let map = normalize(&Histogram::new(), 150);
        assert!(map.is_empty());
        assert_eq!(map.buckets_used(), 0);
    }

    #[test]
    fn single_value_maps_to_zero() {
        let map = normalize(&histogram(&[(5000, 1_440_000)]), 150);
        assert_eq!(map.bucket(5000), Some(0));

        // Also when the palette has a single entry.
        let map = normalize(&histogram(&[(7, 3)]), 1);
        assert_eq!(map.bucket(7), Some(0));
    }

    #[test]
    fn sparse_values_spread_by_rank() {
        let map = normalize(&histogram(&[(2, 10), (9, 1), (40, 7)]), 150);
        assert_eq!(map.bucket(2), Some(0));
        assert_eq!(map.bucket(9), Some(50));
        assert_eq!(map.bucket(40), Some(100));
        assert_eq!(map.bucket(3), None);
    }

    #[test]
    fn ties_consume_slots() {
        // counts sorted: [1, 5, 5, 5]; threshold = counts[2] = 5; two tie slots.
        let map = normalize(&histogram(&[(1, 5), (2, 5), (3, 5), (4, 1)]), 2);
        let got: Vec<_> = map.iter().collect();
        assert_eq!(got, vec![(1, 0), (2, 1), (3, 1), (4, 1)]);
        assert_eq!(map.buckets_used(), 2);
    }

    #[test]
    fn frequent_values_advance_the_bucket() {
        // 300 values, value v seen v + 1 times: threshold is 151, so only the
        // 149 values seen more often than that advance the running bucket.
        let h: Histogram = (0..300u32).map(|v| (v, u64::from(v) + 1)).collect();
        let map = normalize(&h, 150);
        assert_eq!(map.bucket(0), Some(0));
        assert_eq!(map.bucket(151), Some(0));
        assert_eq!(map.bucket(152), Some(1));
        assert_eq!(map.bucket(299), Some(148));
        assert_eq!(map.buckets_used(), 149);
    }

    #[test]
    fn buckets_stay_in_range() {
        for seed in 0..40u64 {
            for distinct in [1, 2, 149, 150, 151, 400, 2000] {
                let h = synthetic(seed, distinct);
                let map = normalize(&h, 150);
                assert_eq!(map.len(), h.len());
                assert!(map.iter().all(|(_, b)| b < 150), "seed {seed}, n {distinct}");
                assert!(map.buckets_used() <= 150);
            }
        }
    }

    #[test]
    fn buckets_are_monotonic_in_value() {
        let h = synthetic(7, 1000);
        let map = normalize(&h, 150);
        let buckets: Vec<u32> = map.iter().map(|(_, b)| b).collect();
        assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn rebuild_is_idempotent() {
        let h = synthetic(3, 600);
        assert_eq!(normalize(&h, 150), normalize(&h, 150));
    }
}
