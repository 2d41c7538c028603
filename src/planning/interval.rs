//! Interval subtraction over half-open `[start, end)` intervals.
//!
//! The planner uses it to carve free slots out of a candidate occupation
//! window once the intervals already reserved on a platform are removed.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Interval<T> {
    pub start: T,
    pub end: T,
}

impl<T: Ord + Copy> Interval<T> {
    /// Build an interval; an `end` before `start` collapses to an empty interval at `start`
    pub fn new(start: T, end: T) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Both intervals share at least one instant
    pub fn overlaps(&self, other: &Self) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn contains(&self, other: &Self) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    pub fn intersection(&self, other: &Self) -> Option<Self> {
        let clipped = Self::new(self.start.max(other.start), self.end.min(other.end));
        (!clipped.is_empty()).then_some(clipped)
    }

    /// Same interval with its start moved to at least `min_start`
    pub fn clip_start(&self, min_start: T) -> Self {
        Self::new(self.start.max(min_start), self.end)
    }

    /// Remove `busy` from this interval: zero, one or two non-empty remainders
    fn minus(&self, busy: &Self) -> Vec<Self> {
        if !self.overlaps(busy) {
            return vec![*self];
        }
        let mut remainders = Vec::with_capacity(2);
        if self.start < busy.start {
            remainders.push(Self::new(self.start, busy.start));
        }
        if busy.end < self.end {
            remainders.push(Self::new(busy.end, self.end));
        }
        remainders
    }
}

impl Interval<DateTime<Utc>> {
    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

/// Subtract every busy interval from every candidate.
///
/// Remainders of one candidate come out ordered by start, candidates in input
/// order. Empty remainders are dropped. The result does not depend on the
/// order of `busy`.
pub fn subtract<T: Ord + Copy>(candidates: &[Interval<T>], busy: &[Interval<T>]) -> Vec<Interval<T>> {
    let mut free = Vec::new();
    for candidate in candidates.iter().filter(|c| !c.is_empty()) {
        let mut pieces = vec![*candidate];
        for taken in busy.iter().filter(|b| !b.is_empty()) {
            pieces = pieces.iter().flat_map(|piece| piece.minus(taken)).collect();
            if pieces.is_empty() {
                break;
            }
        }
        free.extend(pieces);
    }
    free
}
