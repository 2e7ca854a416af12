//! Streaming Sample Averaging
//!
//! ## Operation
//!
//! [`SampleAggregator`] consumes raw multi-channel samples one at a time and
//! produces one averaged [`TimestampedVector`] per full window. Memory use is
//! O(channel count): per-channel `i64` running sums plus informational
//! min/max, never a buffer of samples.
//!
//! The representative timestamp of a finished window is the midpoint of the
//! window-start and window-completion clock readings. This is a cheap,
//! slightly biased approximation of the per-sample mean time and is kept as
//! documented behavior.
//!
//! ## Modes
//!
//! In [`AggregatorMode::Normal`] samples pass through the fixed-point
//! exponent conversion only; offset and scale are applied downstream at
//! export/report time. In [`AggregatorMode::Calibrating`] the window size
//! switches to the calibration averaging count and the finished window is
//! meant for calibration finalization rather than history. Switching modes
//! in either direction discards the partial window.
//!
//! The finished window is handed off through a single take-once slot,
//! consumed by the orchestrating service step on the same cooperative
//! thread.

use alloc::vec::Vec;

use log::{debug, error};

use crate::calib::Calibrator;
use crate::channels::RawSample;
use crate::history::TimestampedVector;
use crate::time::{Clock, Timestamp};

/// Averaging mode, selects the window size and the destination of windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AggregatorMode {
    #[default]
    Normal,
    Calibrating,
}

/// Streaming per-channel averaging over a fixed sample-count window
#[derive(Debug)]
pub struct SampleAggregator {
    channels: usize,
    window: usize,
    mode: AggregatorMode,

    sums: Vec<i64>,
    maxima: Vec<i32>,
    minima: Vec<i32>,
    count: usize,
    window_start: Timestamp,

    /// Fixed-point conversion scratch, reused across samples
    scratch: Vec<i32>,
    finished: Option<TimestampedVector>,

    /// Zero channel count is fatal; logged once, then add_sample is a no-op
    fault_reported: bool,
}

impl SampleAggregator {
    pub fn new(channels: usize, window: usize) -> Self {
        Self {
            channels,
            window: window.max(1),
            mode: AggregatorMode::Normal,
            sums: alloc::vec![0; channels],
            maxima: alloc::vec![i32::MIN; channels],
            minima: alloc::vec![i32::MAX; channels],
            count: 0,
            window_start: 0,
            scratch: Vec::with_capacity(channels),
            finished: None,
            fault_reported: false,
        }
    }

    pub fn mode(&self) -> AggregatorMode {
        self.mode
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Samples accumulated in the current partial window
    pub fn pending(&self) -> usize {
        self.count
    }

    /// Switch mode and window size, discarding the partial window
    pub fn set_mode(&mut self, mode: AggregatorMode, window: usize) {
        self.mode = mode;
        self.window = window.max(1);
        self.reset_window();
        self.finished = None;
    }

    /// Change the window size in place (settings update), discarding the
    /// partial window
    pub fn set_window(&mut self, window: usize) {
        self.window = window.max(1);
        self.reset_window();
    }

    fn reset_window(&mut self) {
        self.sums.fill(0);
        self.maxima.fill(i32::MIN);
        self.minima.fill(i32::MAX);
        self.count = 0;
        self.window_start = 0;
    }

    /// Ingest one raw sample
    ///
    /// Converts to fixed-point via the calibrator's exponents, accumulates,
    /// and on the window boundary stores the averaged vector in the take-once
    /// slot. Never blocks; allocates only into the reusable scratch buffer.
    pub fn add_sample<S: RawSample, C: Clock>(
        &mut self,
        sample: &[S],
        calibrator: &Calibrator,
        clock: &C,
    ) {
        if self.channels == 0 {
            if !self.fault_reported {
                error!("sample aggregator configured with zero channels, ingestion disabled");
                self.fault_reported = true;
            }
            return;
        }
        if sample.len() != self.channels {
            debug!(
                "sample length {} does not match {} channels, dropped",
                sample.len(),
                self.channels
            );
            return;
        }

        calibrator.apply_sample_to_int_exponent(sample, &mut self.scratch);

        if self.count == 0 {
            self.window_start = clock.now_ms();
        }
        for (i, value) in self.scratch.iter().enumerate() {
            self.sums[i] += *value as i64;
            self.maxima[i] = self.maxima[i].max(*value);
            self.minima[i] = self.minima[i].min(*value);
        }
        self.count += 1;

        if self.count >= self.window {
            self.finish_window(clock.now_ms());
        }
    }

    fn finish_window(&mut self, now: Timestamp) {
        let count = self.count as i64;
        let values: Vec<i32> = self
            .sums
            .iter()
            .map(|sum| {
                // Rounded integer mean, correct for negative sums too
                let half = if *sum >= 0 { count / 2 } else { -(count / 2) };
                ((sum + half) / count) as i32
            })
            .collect();

        let timestamp = self.window_start + (now - self.window_start) / 2;
        debug!("window of {} samples finished at midpoint {timestamp}", self.count);

        self.finished = Some(TimestampedVector::new(timestamp, values));
        self.reset_window();
    }

    /// Take the finished window, if one is waiting; consumes it
    pub fn take_finished(&mut self) -> Option<TimestampedVector> {
        self.finished.take()
    }

    /// Per-channel maxima of the current partial window (informational)
    pub fn window_maxima(&self) -> &[i32] {
        &self.maxima
    }

    /// Per-channel minima of the current partial window (informational)
    pub fn window_minima(&self) -> &[i32] {
        &self.minima
    }
}
