//! Error Types for the Telemetry Pipeline
//!
//! ## Design Philosophy
//!
//! The error system is built for the same constraints as the rest of the
//! crate:
//!
//! 1. **Small Size**: Every variant is a few bytes of inline data - no
//!    `String`, only `&'static str` or plain numbers. Errors are returned in
//!    hot paths and must not allocate.
//!
//! 2. **Copy Semantics**: All error enums implement `Copy` so they can be
//!    returned and matched without move complications.
//!
//! 3. **Explicit Propagation**: No panic ever crosses a module boundary.
//!    Every public operation returns `Result` (or a boolean where a plain
//!    handled/unhandled answer suffices), and logging is only ever a side
//!    effect - never the signal a caller relies on.
//!
//! ## Taxonomy
//!
//! - [`ConfigError`] - invalid setup (zero channels, zero capacity). Fatal:
//!   the module reports it once and stays inert.
//! - [`CalibrationError`] - out-of-range channel, a calibration already in
//!   progress, or a degenerate scaling denominator. Recoverable; no state is
//!   mutated on failure.
//! - [`HistoryError`] - accessor called on an empty history buffer.
//!   Recoverable; callers must check before assuming data exists.
//!
//! Notably absent: eviction from the bounded history is *not* an error, it
//! is the expected steady-state behavior of a fixed-capacity buffer. An
//! export buffer too small for a row is also not an error - the exporter
//! degrades to a one-byte filler chunk instead (see [`crate::export`]).

use thiserror_no_std::Error;

/// Result type for calibration operations
pub type CalibrationResult<T> = Result<T, CalibrationError>;

/// Fatal configuration problems detected at setup
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// The module was constructed with zero measurement channels
    #[error("channel count is zero")]
    ZeroChannels,

    /// A capacity or averaging window was configured as zero
    #[error("capacity or averaging window is zero")]
    ZeroCapacity,

    /// A named setting was rejected by its validator
    #[error("invalid value for setting '{key}'")]
    InvalidSetting {
        /// Name of the rejected setting
        key: &'static str,
    },

    /// A named setting does not exist
    #[error("unknown setting")]
    UnknownSetting,
}

/// Recoverable failures of the two-phase calibration protocol
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CalibrationError {
    /// Channel number outside `1..=channels` (channels are 1-based at the API)
    #[error("channel {channel} out of range [1, {channels}]")]
    ChannelOutOfRange {
        /// The 1-based channel number that was requested
        channel: usize,
        /// Number of configured channels
        channels: usize,
    },

    /// Another offset or scaling measurement is already running
    #[error("a calibration measurement is already running")]
    Busy,

    /// Scaling denominator `measured + offset` is zero; prior scale kept
    #[error("degenerate scaling input: denominator is zero")]
    DegenerateInput,
}

/// Failures of history accessors
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryError {
    /// `newest()`/`oldest()` called while no entry is stored
    #[error("history is empty")]
    Empty,
}
