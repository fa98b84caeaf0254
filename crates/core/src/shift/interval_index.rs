//! Sorted index of date-ranged values
//!
//! Validity ranges of shift assignments and work days are kept sorted by
//! `from` and looked up with a binary search. Writes go through
//! [`IntervalIndex::insert`], which refuses overlaps. Rows loaded from storage
//! go through [`IntervalIndex::from_unchecked`]; overlaps there surface as an
//! [`IntervalOverlap`] on the lookup that hits them.

use chrono::NaiveDate;
use thiserror::Error;
use timekeep_domain::{AttendanceError, DateRange, Result};

/// More than one interval covers the looked-up date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("{count} intervals cover the same date")]
pub struct IntervalOverlap {
    pub count: usize,
}

#[derive(Debug, Clone)]
pub struct IntervalIndex<T> {
    entries: Vec<(DateRange, T)>,
    disjoint: bool,
}

impl<T> Default for IntervalIndex<T> {
    fn default() -> Self {
        Self { entries: Vec::new(), disjoint: true }
    }
}

impl<T> IntervalIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from stored rows without rejecting overlaps.
    pub fn from_unchecked(rows: impl IntoIterator<Item = (DateRange, T)>) -> Self {
        let mut entries: Vec<(DateRange, T)> = rows.into_iter().collect();
        entries.sort_by_key(|(range, _)| range.from);
        let disjoint = !has_overlap(&entries);
        Self { entries, disjoint }
    }

    /// Insert keeping the index sorted. Overlapping ranges are refused.
    pub fn insert(&mut self, range: DateRange, value: T) -> Result<()> {
        if let Some((existing, _)) = self.entries.iter().find(|(other, _)| other.overlaps(&range)) {
            return Err(AttendanceError::IntegrityConflict(format!(
                "validity {}..{} overlaps existing {}..{}",
                range.from,
                display_end(range.to),
                existing.from,
                display_end(existing.to),
            )));
        }
        let position = self.entries.partition_point(|(other, _)| other.from <= range.from);
        self.entries.insert(position, (range, value));
        Ok(())
    }

    /// Value whose range contains `date`.
    pub fn find(&self, date: NaiveDate) -> std::result::Result<Option<&T>, IntervalOverlap> {
        let upper = self.entries.partition_point(|(range, _)| range.from <= date);
        let candidates = &self.entries[..upper];

        if self.disjoint {
            return Ok(candidates
                .last()
                .filter(|(range, _)| range.contains(date))
                .map(|(_, value)| value));
        }

        let mut hits = candidates.iter().filter(|(range, _)| range.contains(date));
        match (hits.next(), hits.count()) {
            (None, _) => Ok(None),
            (Some((_, value)), 0) => Ok(Some(value)),
            (Some(_), rest) => Err(IntervalOverlap { count: rest + 1 }),
        }
    }

    /// True when the stored rows contain at least one overlap.
    pub fn has_overlaps(&self) -> bool {
        !self.disjoint
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(DateRange, T)> {
        self.entries.iter()
    }
}

/// Sweep over `from`-sorted ranges. A long range can swallow a later,
/// non-adjacent one, so compare against the furthest end seen so far.
fn has_overlap<T>(entries: &[(DateRange, T)]) -> bool {
    // None: nothing seen yet. Some(None): an open range was seen.
    let mut furthest_end: Option<Option<NaiveDate>> = None;
    for (range, _) in entries {
        if let Some(end) = furthest_end {
            if end.map_or(true, |end| range.from <= end) {
                return true;
            }
        }
        furthest_end = Some(match (furthest_end, range.to) {
            (Some(None), _) | (_, None) => None,
            (Some(Some(a)), Some(b)) => Some(a.max(b)),
            (None, Some(b)) => Some(b),
        });
    }
    false
}

fn display_end(end: Option<NaiveDate>) -> String {
    end.map_or_else(|| "open".to_string(), |date| date.to_string())
}
