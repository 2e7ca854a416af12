//! Fixed-Length Per-Channel Value Containers
//!
//! ## Overview
//!
//! Every stage of the pipeline works on vectors with one slot per measurement
//! channel: running sums, min/max trackers, calibration offsets, scale
//! factors. [`ChannelArray`] is the shared container for all of them - a
//! runtime-sized sequence whose length is fixed at construction and whose
//! elements can be reset to a configured default in one call.
//!
//! ## Design Rationale
//!
//! The channel count is a runtime configuration value (a weather station has
//! three channels, a load-cell matrix may have sixteen), so the storage is
//! sized once from configuration rather than from a compile-time constant.
//! After construction the length never changes during operation; `resize` is
//! only ever called when a module is reconfigured, and it deliberately
//! invalidates all prior contents.
//!
//! The `is_default()` check exists for persistence: an array still holding
//! only its default value represents "never calibrated" and is not worth
//! writing to the config store.

use alloc::vec::Vec;
use core::ops::{Index, IndexMut};

/// Fixed-length sequence of per-channel values with a reset default
///
/// ## Invariants
///
/// - Length is fixed after construction (`resize` reinitializes, it is not a
///   grow operation).
/// - Insertion order equals channel order; element `i` always belongs to
///   channel `i`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelArray<T: Copy + PartialEq> {
    values: Vec<T>,
    default: T,
}

impl<T: Copy + PartialEq> ChannelArray<T> {
    /// Create an array of `len` channels, every element set to `default`
    pub fn new(len: usize, default: T) -> Self {
        let mut values = Vec::with_capacity(len);
        values.resize(len, default);
        Self { values, default }
    }

    /// Reallocate for a new channel count and default value
    ///
    /// All prior contents are invalidated.
    pub fn resize(&mut self, len: usize, default: T) {
        self.default = default;
        self.values.clear();
        self.values.resize(len, default);
    }

    /// Set every element back to the configured default
    pub fn reset_values(&mut self) {
        for value in &mut self.values {
            *value = self.default;
        }
    }

    /// Apply `f` to every `(value, channel)` pair
    ///
    /// This is the workhorse for all channel-wise transforms.
    pub fn for_each<F: FnMut(&mut T, usize)>(&mut self, mut f: F) {
        for (i, value) in self.values.iter_mut().enumerate() {
            f(value, i);
        }
    }

    /// True iff every element equals the configured default
    ///
    /// An all-default array represents "never calibrated" and is skipped
    /// when persisting calibration state.
    pub fn is_default(&self) -> bool {
        self.values.iter().all(|v| *v == self.default)
    }

    /// Copy values from a slice of matching length
    ///
    /// Returns `false` (leaving the array untouched) on length mismatch.
    pub fn fill_from(&mut self, source: &[T]) -> bool {
        if source.len() != self.values.len() {
            return false;
        }
        self.values.copy_from_slice(source);
        true
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, channel: usize) -> Option<T> {
        self.values.get(channel).copied()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.values
    }
}

impl<T: Copy + PartialEq> Index<usize> for ChannelArray<T> {
    type Output = T;

    fn index(&self, channel: usize) -> &T {
        &self.values[channel]
    }
}

impl<T: Copy + PartialEq> IndexMut<usize> for ChannelArray<T> {
    fn index_mut(&mut self, channel: usize) -> &mut T {
        &mut self.values[channel]
    }
}

/// Raw sample value accepted by the ingestion path
///
/// Sensors deliver integers or floats depending on the driver; the pipeline
/// converts either to fixed-point via the per-channel exponent. `f64` keeps
/// the conversion exact for every supported integer width.
pub trait RawSample: Copy {
    /// Widen to `f64` for the fixed-point conversion
    fn as_f64(self) -> f64;
}

macro_rules! impl_raw_sample {
    ($($t:ty),*) => {
        $(
            impl RawSample for $t {
                fn as_f64(self) -> f64 {
                    self as f64
                }
            }
        )*
    };
}

impl_raw_sample!(i8, i16, i32, u8, u16, u32, f32, f64);
