use itertools::izip;

/// Sorted set of disjoint open m/z intervals, each carrying the index of
/// the trace accumulating inside it.
///
/// Stored as parallel arrays ordered by lower bound; containment lookups
/// are binary searches. Intervals are open on both ends, so two intervals
/// may share a boundary value without overlapping.
#[derive(Clone, Debug, Default)]
pub struct MzRangeSet {
    lowers: Vec<f64>,
    uppers: Vec<f64>,
    traces: Vec<usize>,
}

impl MzRangeSet {
    pub fn new() -> Self {
        MzRangeSet::default()
    }

    pub fn len(&self) -> usize {
        self.lowers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lowers.is_empty()
    }

    /// Slot of the interval containing `mz`, if any. Boundary values are
    /// not contained.
    pub fn find(&self, mz: f64) -> Option<usize> {
        let idx = self.lowers.partition_point(|&lower| lower < mz);
        if idx == 0 {
            return None;
        }
        let slot = idx - 1;
        (mz < self.uppers[slot]).then_some(slot)
    }

    pub fn lower(&self, slot: usize) -> f64 {
        self.lowers[slot]
    }

    pub fn upper(&self, slot: usize) -> f64 {
        self.uppers[slot]
    }

    pub fn trace(&self, slot: usize) -> usize {
        self.traces[slot]
    }

    /// Inserts a new interval. The caller guarantees that (lower, upper)
    /// does not overlap any existing interval; this is checked in debug
    /// builds.
    pub fn insert(&mut self, lower: f64, upper: f64, trace: usize) {
        let idx = self.lowers.partition_point(|&existing| existing < lower);
        debug_assert!(lower < upper);
        debug_assert!(idx == 0 || self.uppers[idx - 1] <= lower);
        debug_assert!(idx == self.lowers.len() || upper <= self.lowers[idx]);
        self.lowers.insert(idx, lower);
        self.uppers.insert(idx, upper);
        self.traces.insert(idx, trace);
    }

    /// Iterates (lower, upper, trace) in ascending lower-bound order.
    pub fn iter(&self) -> impl Iterator<Item = (f64, f64, usize)> + '_ {
        izip!(&self.lowers, &self.uppers, &self.traces).map(|(l, u, t)| (*l, *u, *t))
    }

    /// Whether all intervals are pairwise disjoint.
    pub fn is_disjoint(&self) -> bool {
        (1..self.len()).all(|i| self.uppers[i - 1] <= self.lowers[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_on_empty_set() {
        let ranges = MzRangeSet::new();
        assert!(ranges.find(100.0).is_none());
    }

    #[test]
    fn test_open_intervals_exclude_their_bounds() {
        let mut ranges = MzRangeSet::new();
        ranges.insert(99.0, 100.0, 0);
        assert!(ranges.find(99.0).is_none());
        assert!(ranges.find(100.0).is_none());
        assert_eq!(ranges.find(99.5), Some(0));
    }

    #[test]
    fn test_touching_intervals_are_disjoint() {
        let mut ranges = MzRangeSet::new();
        ranges.insert(100.0, 101.0, 1);
        ranges.insert(99.0, 100.0, 0);
        assert!(ranges.is_disjoint());
        assert_eq!(ranges.find(99.5), Some(0));
        assert_eq!(ranges.find(100.5), Some(1));
        assert!(ranges.find(100.0).is_none());
    }

    #[test]
    fn test_iter_is_ordered_by_lower_bound() {
        let mut ranges = MzRangeSet::new();
        ranges.insert(102.0, 103.0, 0);
        ranges.insert(99.0, 100.0, 1);
        ranges.insert(100.5, 101.5, 2);
        let lowers: Vec<f64> = ranges.iter().map(|(lower, _, _)| lower).collect();
        assert_eq!(lowers, vec![99.0, 100.5, 102.0]);
        let traces: Vec<usize> = ranges.iter().map(|(_, _, trace)| trace).collect();
        assert_eq!(traces, vec![1, 2, 0]);
    }
}
