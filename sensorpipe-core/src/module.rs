//! Pipeline Orchestration
//!
//! [`SensorModule`] wires the pieces together and drives them from a single
//! cooperative loop: the producer calls [`SensorModule::add_sample`], the
//! loop body calls [`SensorModule::service`] to consume the finished-window
//! slot, route it to history or calibration finalization, run the report
//! gate and fan passing reports out to the sinks.
//!
//! ## Calibration Protocol
//!
//! `measure_offset` / `measure_scaling` switch the aggregator into
//! calibration averaging; the one finished calibration window is handed to
//! the [`Calibrator`] instead of history, the result persisted, and the
//! pipeline returns to normal averaging. Only one calibration runs at a
//! time; a second request is rejected with [`CalibrationError::Busy`].
//! Entering calibration clears the history buffer, since rows recorded under
//! the old calibration would not compare to rows recorded after it.
//!
//! ## Control Commands
//!
//! Two reserved text commands, `TARE` and `CLEAR`, manage the transient
//! virtual zero. Anything else is offered to an optional pass-through hook.

use alloc::boxed::Box;
use alloc::string::String;
use core::fmt::Write as _;

use log::{info, warn};

use crate::aggregator::{AggregatorMode, SampleAggregator};
use crate::calib::{Calibrator, PersistedCalibration};
use crate::channels::RawSample;
use crate::config::{ConfigStore, PipelineConfig, SettingValue, SettingsMap};
use crate::errors::{CalibrationError, CalibrationResult, ConfigError};
use crate::export::{ChunkExporter, ExportCursor};
use crate::history::BoundedHistory;
use crate::report::ReportGate;
use crate::sinks::{ReportSink, SinkSet};
use crate::time::Clock;

/// Config store key holding the persisted calibration payload
const CALIBRATION_KEY: &str = "calibration";

/// Which calibration, if any, the next finished window finalizes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CalibrationPhase {
    Idle,
    Offset,
    Scaling { channel: usize, target: i32 },
}

type CommandHook = Box<dyn FnMut(&str) -> bool>;

/// The assembled sensor pipeline
pub struct SensorModule {
    config: PipelineConfig,
    calibrator: Calibrator,
    aggregator: SampleAggregator,
    history: BoundedHistory,
    gate: ReportGate,
    sinks: SinkSet,
    settings: SettingsMap,
    clock: Box<dyn Clock>,
    store: Box<dyn ConfigStore>,
    phase: CalibrationPhase,
    command_hook: Option<CommandHook>,
    line: String,
}

impl SensorModule {
    /// Assemble a pipeline from a validated configuration
    ///
    /// Fails with the configuration error when the channel count or any
    /// capacity is zero; a module never exists in a half-configured state.
    pub fn new(
        config: PipelineConfig,
        clock: Box<dyn Clock>,
        store: Box<dyn ConfigStore>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut settings = SettingsMap::new();
        settings.register(
            "sample_averaging",
            SettingValue::Int(config.sample_averaging as i64),
            |v| v.as_int().is_some_and(|n| n >= 1),
        );
        settings.register(
            "averaging_offset_scaling",
            SettingValue::Int(config.averaging_offset_scaling as i64),
            |v| v.as_int().is_some_and(|n| n >= 1),
        );
        settings.register(
            "reporting_interval_ms",
            SettingValue::Int(config.reporting_interval_ms as i64),
            |v| v.as_int().is_some_and(|n| n >= 0),
        );
        settings.register(
            "threshold_permille",
            SettingValue::Int(config.threshold_permille as i64),
            |v| v.as_int().is_some_and(|n| n >= 0),
        );
        let channels = config.channels as i64;
        settings.register(
            "threshold_channel",
            SettingValue::Int(config.threshold_channel.map_or(-1, |c| c as i64)),
            move |v| v.as_int().is_some_and(|n| n >= -1 && n < channels),
        );

        Ok(Self {
            calibrator: Calibrator::new(config.channels),
            aggregator: SampleAggregator::new(config.channels, config.sample_averaging),
            history: BoundedHistory::new(config.history_capacity),
            gate: ReportGate::new(
                config.reporting_interval_ms,
                config.threshold_permille,
                config.threshold_channel,
            ),
            sinks: SinkSet::new(),
            settings,
            clock,
            store,
            phase: CalibrationPhase::Idle,
            command_hook: None,
            config,
            line: String::new(),
        })
    }

    /// Load persisted calibration and settings, then apply them
    ///
    /// Missing keys keep their defaults; a stored calibration payload that
    /// does not match the channel count is dropped with a warning.
    pub fn setup(&mut self) {
        self.settings.load_all(&*self.store);
        self.sync_settings();

        if let Some(json) = self.store.load(CALIBRATION_KEY) {
            match serde_json::from_str::<PersistedCalibration>(&json) {
                Ok(payload) => {
                    if !self.calibrator.restore(&payload) {
                        warn!("stored calibration does not match channel count, ignored");
                    }
                }
                Err(err) => warn!("stored calibration unreadable: {err}"),
            }
        }
    }

    /// Fixed-point exponents, one per channel, set by the sensor integration
    pub fn set_exponents(&mut self, exponents: &[i8]) -> bool {
        self.calibrator.set_exponents(exponents)
    }

    /// Register a report sink; at most [`SinkSet::MAX_SINKS`]
    pub fn add_sink(&mut self, sink: Box<dyn ReportSink>) -> Option<usize> {
        self.sinks.add(sink)
    }

    pub fn set_sink_enabled(&mut self, index: usize, enabled: bool) {
        self.sinks.set_enabled(index, enabled);
    }

    /// Hook invoked for control commands other than `TARE`/`CLEAR`
    pub fn set_command_hook(&mut self, hook: impl FnMut(&str) -> bool + 'static) {
        self.command_hook = Some(Box::new(hook));
    }

    /// Ingest one raw sample; never blocks
    pub fn add_sample<S: RawSample>(&mut self, sample: &[S]) {
        self.aggregator
            .add_sample(sample, &self.calibrator, &&*self.clock);
    }

    /// One cooperative step: consume a finished window, if any
    ///
    /// Normal windows go to history and through the report gate; calibration
    /// windows finalize the pending calibration instead.
    pub fn service(&mut self) {
        let Some(window) = self.aggregator.take_finished() else {
            return;
        };

        match self.phase {
            CalibrationPhase::Idle => {
                let calibrated: alloc::vec::Vec<i32> = window
                    .values
                    .iter()
                    .enumerate()
                    .map(|(c, v)| self.calibrator.apply_processing(*v, c))
                    .collect();
                let timestamp = window.timestamp;
                self.history.append(window);

                let now = self.clock.now_ms();
                if self.gate.should_forward(&calibrated, now) {
                    self.render_report_line(timestamp, &calibrated);
                    self.sinks.broadcast(&self.line);
                }
            }
            CalibrationPhase::Offset => {
                self.calibrator.set_offset(&window.values);
                self.calibrator.clear_tare();
                self.persist_calibration();
                info!("offset calibration finished");
                self.leave_calibration();
            }
            CalibrationPhase::Scaling { channel, target } => {
                let measured = window.values.get(channel).copied().unwrap_or(0);
                match self.calibrator.set_scaling(channel, measured, target) {
                    Ok(()) => {
                        self.calibrator.clear_tare();
                        self.persist_calibration();
                        info!("scale calibration finished for channel {}", channel + 1);
                    }
                    Err(err) => warn!("scale calibration failed: {err}"),
                }
                self.leave_calibration();
            }
        }
    }

    /// Start offset calibration over all channels
    pub fn measure_offset(&mut self) -> CalibrationResult<()> {
        self.enter_calibration(CalibrationPhase::Offset)
    }

    /// Start scale calibration for one channel (1-based) against `target`
    pub fn measure_scaling(&mut self, channel: usize, target: i32) -> CalibrationResult<()> {
        let channels = self.config.channels;
        if channel == 0 || channel > channels {
            return Err(CalibrationError::ChannelOutOfRange { channel, channels });
        }
        self.enter_calibration(CalibrationPhase::Scaling {
            channel: channel - 1,
            target,
        })
    }

    fn enter_calibration(&mut self, phase: CalibrationPhase) -> CalibrationResult<()> {
        if self.phase != CalibrationPhase::Idle {
            return Err(CalibrationError::Busy);
        }
        self.phase = phase;
        self.history.clear();
        self.aggregator.set_mode(
            AggregatorMode::Calibrating,
            self.config.averaging_offset_scaling,
        );
        Ok(())
    }

    fn leave_calibration(&mut self) {
        self.phase = CalibrationPhase::Idle;
        self.aggregator
            .set_mode(AggregatorMode::Normal, self.config.sample_averaging);
        self.gate.reset();
    }

    /// Restore default offsets and persist
    pub fn reset_offset(&mut self) {
        self.calibrator.reset_offset();
        self.calibrator.clear_tare();
        self.persist_calibration();
    }

    /// Restore default scales and persist
    pub fn reset_scaling(&mut self) {
        self.calibrator.reset_scaling();
        self.calibrator.clear_tare();
        self.persist_calibration();
    }

    /// Capture the newest stored reading as the transient virtual zero
    ///
    /// Returns `false` when history holds no reading yet.
    pub fn set_tare(&mut self) -> bool {
        match self.history.newest() {
            Ok(entry) => {
                let values = entry.values.clone();
                self.calibrator.set_tare(&values);
                true
            }
            Err(_) => false,
        }
    }

    pub fn clear_tare(&mut self) {
        self.calibrator.clear_tare();
    }

    /// Dispatch one control command; returns whether it was handled
    pub fn handle_command(&mut self, command: &str) -> bool {
        match command {
            "TARE" => {
                if !self.set_tare() {
                    warn!("TARE ignored, no measurement recorded yet");
                }
                true
            }
            "CLEAR" => {
                self.clear_tare();
                true
            }
            other => match &mut self.command_hook {
                Some(hook) => hook(other),
                None => false,
            },
        }
    }

    /// Parse, validate, apply and persist one settings update
    pub fn apply_setting(&mut self, key: &str, input: &str) -> Result<(), ConfigError> {
        self.settings.apply(key, input)?;
        self.sync_settings();
        self.settings.save_all(&mut *self.store);
        Ok(())
    }

    /// Push current settings values into the live components
    fn sync_settings(&mut self) {
        if let Some(n) = self.settings.get("sample_averaging").and_then(SettingValue::as_int) {
            self.config.sample_averaging = n as usize;
            if self.aggregator.mode() == AggregatorMode::Normal {
                self.aggregator.set_window(self.config.sample_averaging);
            }
        }
        if let Some(n) = self
            .settings
            .get("averaging_offset_scaling")
            .and_then(SettingValue::as_int)
        {
            self.config.averaging_offset_scaling = n as usize;
        }
        if let Some(n) = self
            .settings
            .get("reporting_interval_ms")
            .and_then(SettingValue::as_int)
        {
            self.config.reporting_interval_ms = n as u64;
            self.gate.set_min_interval(self.config.reporting_interval_ms);
        }
        let permille = self
            .settings
            .get("threshold_permille")
            .and_then(SettingValue::as_int)
            .unwrap_or(0) as u32;
        let channel = self
            .settings
            .get("threshold_channel")
            .and_then(SettingValue::as_int)
            .filter(|n| *n >= 0)
            .map(|n| n as usize);
        self.config.threshold_permille = permille;
        self.config.threshold_channel = channel;
        self.gate.set_threshold(permille, channel);
    }

    fn persist_calibration(&mut self) {
        match serde_json::to_string(&self.calibrator.to_persisted()) {
            Ok(json) => {
                if !self.store.save(CALIBRATION_KEY, &json) {
                    warn!("failed to persist calibration");
                }
            }
            Err(err) => warn!("calibration not serializable: {err}"),
        }
    }

    /// Render `timestamp,v1,...,vn;` into the reusable line buffer
    fn render_report_line(&mut self, timestamp: u64, values: &[i32]) {
        self.line.clear();
        let _ = write!(self.line, "{timestamp}");
        for value in values {
            let _ = write!(self.line, ",{value}");
        }
        self.line.push(';');
    }

    /// Uncalibrated history export; see [`ChunkExporter::fill`]
    pub fn export_raw(&mut self, buffer: &mut [u8], cursor: ExportCursor) -> usize {
        ChunkExporter::raw(&mut self.history).fill(buffer, cursor)
    }

    /// Calibrated history export
    pub fn export_scaled(&mut self, buffer: &mut [u8], cursor: ExportCursor) -> usize {
        ChunkExporter::scaled(&mut self.history, &self.calibrator).fill(buffer, cursor)
    }

    /// Single newest calibrated row
    pub fn export_latest(&mut self, buffer: &mut [u8]) -> usize {
        ChunkExporter::scaled(&mut self.history, &self.calibrator).fill_latest(buffer)
    }

    /// True when no chunked export is pending continuation
    pub fn export_complete(&self) -> bool {
        !self.history.has_bookmark()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn calibrator(&self) -> &Calibrator {
        &self.calibrator
    }

    pub fn setting(&self, key: &str) -> Option<&SettingValue> {
        self.settings.get(key)
    }
}
