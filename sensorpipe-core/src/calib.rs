//! Per-Channel Calibration State and Transforms
//!
//! ## Processing Chain
//!
//! Raw sensor values pass through a fixed chain before they are reported:
//!
//! ```text
//! scaled = round( (raw * 10^exponent + offset) * scale ) + tare
//! ```
//!
//! - **exponent** shifts the decimal point so fractional sensor output can be
//!   carried as integers (fixed in code by the sensor integration, restored
//!   on every boot, never persisted).
//! - **offset** and **scale** are measured by the two-phase calibration
//!   protocol and persisted via the config store.
//! - **tare** is a transient virtual zero captured from the current reading;
//!   it is forgotten on restart and cleared whenever offset or scale change.
//!
//! ## Calibration Protocol
//!
//! Offset calibration measures a baseline and stores its negative, so a
//! subsequent reading of the same baseline processes to zero. Scale
//! calibration places a known reference on one channel and solves
//! `scale = target / (measured + offset)`; a zero denominator is rejected as
//! [`CalibrationError::DegenerateInput`] and leaves the prior scale intact.
//!
//! ## Persistence
//!
//! [`PersistedCalibration`] is the JSON payload handed to the config store.
//! Arrays still at their defaults are omitted - an all-default array means
//! "never calibrated" and carries no information. A stored array whose
//! length does not match the configured channel count is rejected wholesale
//! to avoid mixing calibration data across channel layouts.

use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::channels::{ChannelArray, RawSample};
use crate::errors::{CalibrationError, CalibrationResult};

/// Per-channel offset/scale/exponent/tare state and the transforms on it
#[derive(Debug, Clone)]
pub struct Calibrator {
    offset: ChannelArray<i32>,
    scale: ChannelArray<f32>,
    exponent: ChannelArray<i8>,
    tare: ChannelArray<i32>,
}

impl Calibrator {
    /// Create an identity calibrator for `channels` channels
    ///
    /// Defaults: offset 0, scale 1, exponent 0, tare 0 - raw values pass
    /// through unchanged.
    pub fn new(channels: usize) -> Self {
        Self {
            offset: ChannelArray::new(channels, 0),
            scale: ChannelArray::new(channels, 1.0),
            exponent: ChannelArray::new(channels, 0),
            tare: ChannelArray::new(channels, 0),
        }
    }

    pub fn channels(&self) -> usize {
        self.offset.len()
    }

    /// Set the fixed-point exponents, one per channel
    ///
    /// Returns `false` on length mismatch, leaving the exponents untouched.
    pub fn set_exponents(&mut self, exponents: &[i8]) -> bool {
        self.exponent.fill_from(exponents)
    }

    /// Convert one raw sample to fixed-point integers
    ///
    /// `out[i] = round(sample[i] * 10^exponent[i])`. The caller provides the
    /// scratch buffer so the hot path performs no allocation beyond it.
    pub fn apply_sample_to_int_exponent<S: RawSample>(&self, sample: &[S], out: &mut Vec<i32>) {
        out.clear();
        for (i, value) in sample.iter().enumerate() {
            let shift = libm::pow(10.0, self.exponent.get(i).unwrap_or(0) as f64);
            out.push(libm::round(value.as_f64() * shift) as i32);
        }
    }

    /// Apply offset, scale and tare to a single fixed-point value
    pub fn apply_processing(&self, raw: i32, channel: usize) -> i32 {
        let offset = self.offset.get(channel).unwrap_or(0);
        let scale = self.scale.get(channel).unwrap_or(1.0);
        let tare = self.tare.get(channel).unwrap_or(0);
        libm::round((raw + offset) as f64 * scale as f64) as i32 + tare
    }

    /// Store the negated baseline measurement as per-channel offset
    ///
    /// After `set_offset(measured)`, `apply_processing(measured[c], c) == 0`
    /// for every channel `c` (with default scale and tare).
    pub fn set_offset(&mut self, measured: &[i32]) {
        self.offset.for_each(|value, i| {
            *value = -measured.get(i).copied().unwrap_or(0);
        });
    }

    /// Solve the scale factor for one channel from a reference measurement
    ///
    /// `scale[channel] = target / (measured + offset[channel])`. Fails with
    /// [`CalibrationError::DegenerateInput`] when the denominator is zero;
    /// the prior scale is left untouched.
    pub fn set_scaling(
        &mut self,
        channel: usize,
        measured: i32,
        target: i32,
    ) -> CalibrationResult<()> {
        let channels = self.channels();
        if channel >= channels {
            return Err(CalibrationError::ChannelOutOfRange {
                channel: channel + 1,
                channels,
            });
        }

        let denominator = measured + self.offset[channel];
        if denominator == 0 {
            return Err(CalibrationError::DegenerateInput);
        }

        self.scale[channel] = target as f32 / denominator as f32;
        Ok(())
    }

    /// Capture the given raw reading as a transient virtual zero
    ///
    /// After `set_tare(latest)`, `apply_processing(latest[c], c) == 0` for
    /// every channel `c`.
    pub fn set_tare(&mut self, latest_raw: &[i32]) {
        for i in 0..self.tare.len() {
            let raw = latest_raw.get(i).copied().unwrap_or(0);
            let processed =
                libm::round((raw + self.offset[i]) as f64 * self.scale[i] as f64) as i32;
            self.tare[i] = -processed;
        }
    }

    /// Remove the transient tare
    pub fn clear_tare(&mut self) {
        self.tare.reset_values();
    }

    /// Restore the offset array to identity
    pub fn reset_offset(&mut self) {
        self.offset.reset_values();
    }

    /// Restore the scale array to identity
    pub fn reset_scaling(&mut self) {
        self.scale.reset_values();
    }

    /// True iff neither offset nor scale were ever calibrated
    pub fn is_default(&self) -> bool {
        self.offset.is_default() && self.scale.is_default()
    }

    pub fn offsets(&self) -> &[i32] {
        self.offset.as_slice()
    }

    pub fn scales(&self) -> &[f32] {
        self.scale.as_slice()
    }

    pub fn exponents(&self) -> &[i8] {
        self.exponent.as_slice()
    }

    /// Build the persistence payload; all-default arrays are omitted
    pub fn to_persisted(&self) -> PersistedCalibration {
        PersistedCalibration {
            offset: (!self.offset.is_default()).then(|| self.offset.as_slice().to_vec()),
            scale: (!self.scale.is_default()).then(|| self.scale.as_slice().to_vec()),
        }
    }

    /// Restore persisted offset/scale arrays
    ///
    /// Returns `false` (leaving the current state untouched) if any stored
    /// array length does not match the channel count. Missing arrays simply
    /// keep their defaults.
    pub fn restore(&mut self, persisted: &PersistedCalibration) -> bool {
        if let Some(offset) = &persisted.offset {
            if offset.len() != self.channels() {
                return false;
            }
        }
        if let Some(scale) = &persisted.scale {
            if scale.len() != self.channels() {
                return false;
            }
        }

        if let Some(offset) = &persisted.offset {
            self.offset.fill_from(offset);
        }
        if let Some(scale) = &persisted.scale {
            self.scale.fill_from(scale);
        }
        true
    }
}

/// Serialized calibration state, exchanged with the config store as JSON
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PersistedCalibration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale: Option<Vec<f32>>,
}
