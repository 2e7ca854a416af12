//! Report Gating Policy
//!
//! Two independent vetoes decide whether a finished averaging window is
//! fanned out to the sinks; both must pass. A vetoed window still reaches
//! the history buffer, only the sink fan-out is suppressed.
//!
//! - **Rate limit**: the first window since startup always passes; after
//!   that, at least `min_interval_ms` must have elapsed since the last
//!   *forwarded* window. An interval of zero disables the veto.
//! - **Change threshold**: the per-mille relative change versus the last
//!   *forwarded* vector must exceed `threshold_permille`, evaluated on the
//!   selected channel or, when no channel is selected, on the channel with
//!   the maximum delta. A threshold of zero disables the veto.

use alloc::vec::Vec;

use log::debug;

use crate::time::Timestamp;

/// Rate and change-threshold veto over report fan-out
#[derive(Debug)]
pub struct ReportGate {
    min_interval_ms: Timestamp,
    threshold_permille: u32,
    /// Channel the threshold is evaluated on; None means max delta over all
    threshold_channel: Option<usize>,

    last_forwarded_at: Option<Timestamp>,
    last_forwarded: Vec<i32>,
}

impl ReportGate {
    pub fn new(
        min_interval_ms: Timestamp,
        threshold_permille: u32,
        threshold_channel: Option<usize>,
    ) -> Self {
        Self {
            min_interval_ms,
            threshold_permille,
            threshold_channel,
            last_forwarded_at: None,
            last_forwarded: Vec::new(),
        }
    }

    pub fn set_min_interval(&mut self, min_interval_ms: Timestamp) {
        self.min_interval_ms = min_interval_ms;
    }

    pub fn set_threshold(&mut self, permille: u32, channel: Option<usize>) {
        self.threshold_permille = permille;
        self.threshold_channel = channel;
    }

    /// Forget the last forwarded window; the next one passes unconditionally
    pub fn reset(&mut self) {
        self.last_forwarded_at = None;
        self.last_forwarded.clear();
    }

    /// Decide whether to forward, updating the gate state when it passes
    pub fn should_forward(&mut self, values: &[i32], now: Timestamp) -> bool {
        if let Some(last_at) = self.last_forwarded_at {
            if self.min_interval_ms > 0 && now < last_at + self.min_interval_ms {
                debug!("report vetoed by rate limit at {now}");
                return false;
            }
            if !self.change_exceeds_threshold(values) {
                debug!("report vetoed by change threshold at {now}");
                return false;
            }
        }

        self.last_forwarded_at = Some(now);
        self.last_forwarded.clear();
        self.last_forwarded.extend_from_slice(values);
        true
    }

    fn change_exceeds_threshold(&self, values: &[i32]) -> bool {
        if self.threshold_permille == 0 {
            return true;
        }

        let permille = match self.threshold_channel {
            Some(channel) => self.channel_permille(values, channel),
            None => (0..values.len())
                .map(|c| self.channel_permille(values, c))
                .max()
                .unwrap_or(0),
        };
        permille > self.threshold_permille
    }

    /// Relative change of one channel versus the last forwarded vector, in
    /// per mille of the previous magnitude
    fn channel_permille(&self, values: &[i32], channel: usize) -> u32 {
        let (Some(current), Some(previous)) =
            (values.get(channel), self.last_forwarded.get(channel))
        else {
            return 0;
        };

        let delta = (*current as i64 - *previous as i64).unsigned_abs();
        if *previous == 0 {
            // Any change from zero is treated as exceeding every threshold
            return if delta == 0 { 0 } else { u32::MAX };
        }
        let permille = delta * 1000 / (*previous as i64).unsigned_abs();
        permille.min(u32::MAX as u64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_window_always_passes() {
        let mut gate = ReportGate::new(1000, 500, None);
        assert!(gate.should_forward(&[0], 0));
    }

    #[test]
    fn rate_limit_example() {
        let mut gate = ReportGate::new(1000, 0, None);

        assert!(gate.should_forward(&[1], 0));
        assert!(!gate.should_forward(&[2], 500));
        assert!(gate.should_forward(&[3], 1100));
    }

    #[test]
    fn interval_counts_from_last_forwarded() {
        let mut gate = ReportGate::new(1000, 0, None);

        assert!(gate.should_forward(&[1], 0));
        assert!(!gate.should_forward(&[2], 999));
        // The veto at 999 did not restart the interval
        assert!(gate.should_forward(&[3], 1000));
    }

    #[test]
    fn zero_interval_disables_rate_limit() {
        let mut gate = ReportGate::new(0, 0, None);

        assert!(gate.should_forward(&[1], 10));
        assert!(gate.should_forward(&[2], 10));
    }

    #[test]
    fn threshold_on_selected_channel() {
        let mut gate = ReportGate::new(0, 100, Some(0));

        assert!(gate.should_forward(&[1000, 0], 0));
        // 5% change on channel 0: below 100 permille
        assert!(!gate.should_forward(&[1050, 9999], 1));
        // 15% change: passes
        assert!(gate.should_forward(&[1150, 0], 2));
    }

    #[test]
    fn threshold_on_max_delta_when_unselected() {
        let mut gate = ReportGate::new(0, 100, None);

        assert!(gate.should_forward(&[1000, 1000], 0));
        assert!(!gate.should_forward(&[1050, 1050], 1));
        // Channel 1 moved 20%, channel 0 barely
        assert!(gate.should_forward(&[1001, 1200], 2));
    }

    #[test]
    fn comparison_is_against_last_forwarded_vector() {
        let mut gate = ReportGate::new(0, 100, Some(0));

        assert!(gate.should_forward(&[1000], 0));
        assert!(!gate.should_forward(&[1090], 1));
        // 1090 was vetoed, so the baseline is still 1000 and the cumulative
        // drift eventually passes
        assert!(gate.should_forward(&[1110], 2));
    }

    #[test]
    fn change_from_zero_passes_any_threshold() {
        let mut gate = ReportGate::new(0, 900, Some(0));

        assert!(gate.should_forward(&[0], 0));
        assert!(gate.should_forward(&[1], 1));
    }

    #[test]
    fn reset_forgets_baseline() {
        let mut gate = ReportGate::new(1000, 0, None);

        assert!(gate.should_forward(&[1], 0));
        gate.reset();
        assert!(gate.should_forward(&[1], 1));
    }
}
