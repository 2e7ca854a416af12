//! Sensor-telemetry data pipeline core
//!
//! Ingests raw multi-channel samples, averages them in bounded memory,
//! applies per-channel calibration, keeps a capacity-limited history with a
//! resumable export cursor, and gates report fan-out by rate and change
//! threshold. Designed for small devices: no allocation in the sample hot
//! path beyond a fixed scratch buffer, no panics across public boundaries.
//!
//! ```no_run
//! use sensorpipe_core::{MemoryStore, PipelineConfig, SensorModule, SystemClock};
//!
//! let config = PipelineConfig::new(2);
//! let mut module = SensorModule::new(
//!     config,
//!     Box::new(SystemClock::new()),
//!     Box::new(MemoryStore::new()),
//! ).unwrap();
//!
//! module.setup();
//! module.add_sample(&[21.4f32, 1013.2]);
//! module.service();
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

pub mod aggregator;
pub mod calib;
pub mod channels;
pub mod config;
pub mod errors;
pub mod export;
pub mod history;
pub mod module;
pub mod report;
pub mod sinks;
pub mod time;

// Public API
pub use aggregator::{AggregatorMode, SampleAggregator};
pub use calib::{Calibrator, PersistedCalibration};
pub use channels::{ChannelArray, RawSample};
pub use config::{ConfigStore, MemoryStore, PipelineConfig, SettingValue, SettingsMap};
pub use errors::{CalibrationError, CalibrationResult, ConfigError, HistoryError};
pub use export::{ChunkExporter, ExportCursor};
pub use history::{BoundedHistory, TimestampedVector};
pub use module::SensorModule;
pub use report::ReportGate;
pub use sinks::{LogSink, ReportSink, SinkSet};
pub use time::{Clock, FixedClock, Timestamp};
#[cfg(feature = "std")]
pub use time::SystemClock;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_exists() {
        assert!(!VERSION.is_empty());
    }
}
