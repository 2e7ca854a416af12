//! Bounded Measurement History with an Export Bookmark
//!
//! ## Design
//!
//! Finished averaging windows land here as [`TimestampedVector`] rows. The
//! store is a ring over `VecDeque`: once `capacity` rows are held, each
//! append silently evicts the oldest row. Eviction is normal operation on a
//! small device, never an error.
//!
//! ## Bookmark
//!
//! Chunked export needs a cursor that survives appends happening between
//! chunks. Rows are numbered with a monotonically increasing sequence
//! counter; the bookmark stores a sequence number rather than an index, so
//! it keeps pointing at the same row while newer rows arrive. Only evicting
//! the exact row the bookmark points at unsets it; since an unset bookmark
//! signals completion, a paused export overtaken by eviction ends early
//! instead of resuming from a row that no longer exists.

use alloc::collections::VecDeque;
use alloc::vec::Vec;

use crate::errors::HistoryError;
use crate::time::Timestamp;

/// One finished averaging window: midpoint timestamp plus one value per channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampedVector {
    pub timestamp: Timestamp,
    pub values: Vec<i32>,
}

impl TimestampedVector {
    pub fn new(timestamp: Timestamp, values: Vec<i32>) -> Self {
        Self { timestamp, values }
    }
}

/// Fixed-capacity row store, oldest row evicted on overflow
#[derive(Debug)]
pub struct BoundedHistory {
    entries: VecDeque<TimestampedVector>,
    capacity: usize,
    /// Sequence number the NEXT appended row will get
    next_seq: u64,
    bookmark: Option<u64>,
}

impl BoundedHistory {
    /// Create a history holding at most `capacity` rows
    ///
    /// `capacity` must be nonzero; the caller validates it as part of
    /// pipeline configuration.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            next_seq: 0,
            bookmark: None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Sequence number of the oldest retained row
    fn front_seq(&self) -> u64 {
        self.next_seq - self.entries.len() as u64
    }

    /// Append a row, evicting the oldest when full
    ///
    /// A bookmark pointing at the evicted row is unset; any other bookmark
    /// survives unchanged.
    pub fn append(&mut self, entry: TimestampedVector) {
        if self.entries.len() == self.capacity {
            let evicted_seq = self.front_seq();
            self.entries.pop_front();
            if self.bookmark == Some(evicted_seq) {
                self.bookmark = None;
            }
        }
        self.entries.push_back(entry);
        self.next_seq += 1;
    }

    pub fn newest(&self) -> Result<&TimestampedVector, HistoryError> {
        self.entries.back().ok_or(HistoryError::Empty)
    }

    pub fn oldest(&self) -> Result<&TimestampedVector, HistoryError> {
        self.entries.front().ok_or(HistoryError::Empty)
    }

    /// Place the bookmark `index` rows from the head or tail
    ///
    /// With `clamp_to_end`, an out-of-range index lands on the last row in
    /// the walk direction instead of unsetting the bookmark. On an empty
    /// history the bookmark is always unset.
    pub fn set_bookmark(&mut self, index: usize, from_tail: bool, clamp_to_end: bool) {
        if self.entries.is_empty() {
            self.bookmark = None;
            return;
        }

        let last = self.entries.len() - 1;
        let position = if index <= last {
            index
        } else if clamp_to_end {
            last
        } else {
            self.bookmark = None;
            return;
        };

        let offset = if from_tail { last - position } else { position };
        self.bookmark = Some(self.front_seq() + offset as u64);
    }

    /// Move the bookmark one row towards the tail (or head when `reverse`)
    ///
    /// Returns `false` and unsets the bookmark when it walks off either end.
    pub fn advance_bookmark(&mut self, reverse: bool) -> bool {
        let Some(seq) = self.bookmark else {
            return false;
        };

        let next = if reverse {
            seq.checked_sub(1).filter(|s| *s >= self.front_seq())
        } else {
            let candidate = seq + 1;
            (candidate < self.next_seq).then_some(candidate)
        };

        self.bookmark = next;
        next.is_some()
    }

    pub fn has_bookmark(&self) -> bool {
        self.bookmark.is_some()
    }

    pub fn unset_bookmark(&mut self) {
        self.bookmark = None;
    }

    /// Row currently under the bookmark, if any
    pub fn bookmark_entry(&self) -> Option<&TimestampedVector> {
        let seq = self.bookmark?;
        self.entries.get((seq - self.front_seq()) as usize)
    }

    /// Drop all rows and the bookmark; sequence numbering continues
    pub fn clear(&mut self) {
        self.entries.clear();
        self.bookmark = None;
    }

    pub fn iter(&self) -> impl Iterator<Item = &TimestampedVector> {
        self.entries.iter()
    }
}
