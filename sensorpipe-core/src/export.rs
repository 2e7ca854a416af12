//! Chunked CSV Export of the History Buffer
//!
//! ## Wire Format
//!
//! One row per stored vector: `timestamp,v1,v2,...,vn;` followed by a
//! newline. Raw export emits the stored fixed-point values; scaled export
//! runs each value through the calibrator first.
//!
//! ## Chunking Protocol
//!
//! Transports hand in a byte buffer of whatever size they can send at once.
//! [`ChunkExporter::fill`] writes as many complete rows as fit and leaves
//! the history bookmark on the next unwritten row, so the caller re-invokes
//! with [`ExportCursor::Resume`] until [`ChunkExporter::is_complete`]. A row
//! is never split across calls. When not even one row fits and nothing was
//! written this call, a single filler byte (a space) is emitted instead so
//! undersized buffers degrade without error.
//!
//! Starting a new export with [`ExportCursor::Start`] resets any bookmark a
//! previously abandoned export left behind.

use alloc::string::String;
use core::fmt::Write as _;

use crate::calib::Calibrator;
use crate::history::{BoundedHistory, TimestampedVector};

/// Where a fill call picks up: the head of history, or the bookmark left by
/// the previous call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportCursor {
    Start,
    Resume,
}

/// Serializes history rows into size-bounded buffer fills
pub struct ChunkExporter<'a> {
    history: &'a mut BoundedHistory,
    /// Some = scaled export, None = raw fixed-point export
    calibrator: Option<&'a Calibrator>,
    row: String,
}

impl<'a> ChunkExporter<'a> {
    pub fn raw(history: &'a mut BoundedHistory) -> Self {
        Self {
            history,
            calibrator: None,
            row: String::new(),
        }
    }

    pub fn scaled(history: &'a mut BoundedHistory, calibrator: &'a Calibrator) -> Self {
        Self {
            history,
            calibrator: Some(calibrator),
            row: String::new(),
        }
    }

    /// Write complete rows into `buffer`, returning the byte count written
    ///
    /// Advances the bookmark past every written row. Returns 1 with a single
    /// filler byte when the next row does not fit an otherwise empty call.
    pub fn fill(&mut self, buffer: &mut [u8], cursor: ExportCursor) -> usize {
        if cursor == ExportCursor::Start {
            self.history.set_bookmark(0, false, false);
        }

        let mut written = 0;
        while let Some(entry) = self.history.bookmark_entry() {
            let row = render_row(&mut self.row, entry, self.calibrator);
            let remaining = &mut buffer[written..];
            if row.len() > remaining.len() {
                if written == 0 && !buffer.is_empty() {
                    buffer[0] = b' ';
                    return 1;
                }
                return written;
            }

            remaining[..row.len()].copy_from_slice(row.as_bytes());
            written += row.len();
            if !self.history.advance_bookmark(false) {
                break;
            }
        }
        written
    }

    /// Write exactly the single newest row, calibrated
    ///
    /// Returns 0 on an empty history and the filler byte when the row does
    /// not fit.
    pub fn fill_latest(&mut self, buffer: &mut [u8]) -> usize {
        let Ok(entry) = self.history.newest() else {
            return 0;
        };

        let row = render_row(&mut self.row, entry, self.calibrator);
        if row.len() > buffer.len() {
            if !buffer.is_empty() {
                buffer[0] = b' ';
                return 1;
            }
            return 0;
        }
        buffer[..row.len()].copy_from_slice(row.as_bytes());
        row.len()
    }

    /// True once the bookmark has walked off the end of history
    pub fn is_complete(&self) -> bool {
        !self.history.has_bookmark()
    }
}

fn render_row<'r>(
    row: &'r mut String,
    entry: &TimestampedVector,
    calibrator: Option<&Calibrator>,
) -> &'r str {
    row.clear();
    let _ = write!(row, "{}", entry.timestamp);
    for (channel, value) in entry.values.iter().enumerate() {
        let value = match calibrator {
            Some(calib) => calib.apply_processing(*value, channel),
            None => *value,
        };
        let _ = write!(row, ",{value}");
    }
    row.push_str(";\n");
    row
}
