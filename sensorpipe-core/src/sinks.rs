//! Report Sinks
//!
//! A sink accepts one pre-formatted text line per forwarded report.
//! Transport concerns (connections, retries, backpressure) are entirely the
//! sink's own business and invisible to the pipeline; `emit` has no return
//! value on purpose.

use alloc::boxed::Box;
use alloc::vec::Vec;

use log::{info, warn};

/// Destination for one pre-formatted report line
pub trait ReportSink {
    fn emit(&mut self, line: &str);
}

/// Sink that surfaces reports through the `log` facade
#[derive(Debug, Default)]
pub struct LogSink;

impl ReportSink for LogSink {
    fn emit(&mut self, line: &str) {
        info!("report: {line}");
    }
}

/// Up to [`SinkSet::MAX_SINKS`] sinks, each independently enabled
#[derive(Default)]
pub struct SinkSet {
    sinks: Vec<(Box<dyn ReportSink>, bool)>,
}

impl SinkSet {
    pub const MAX_SINKS: usize = 3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sink, enabled; returns its index, or `None` when full
    pub fn add(&mut self, sink: Box<dyn ReportSink>) -> Option<usize> {
        if self.sinks.len() >= Self::MAX_SINKS {
            warn!("sink registry full, sink dropped");
            return None;
        }
        self.sinks.push((sink, true));
        Some(self.sinks.len() - 1)
    }

    pub fn set_enabled(&mut self, index: usize, enabled: bool) {
        if let Some((_, flag)) = self.sinks.get_mut(index) {
            *flag = enabled;
        }
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Fan one line out to every enabled sink
    pub fn broadcast(&mut self, line: &str) {
        for (sink, enabled) in &mut self.sinks {
            if *enabled {
                sink.emit(line);
            }
        }
    }
}
