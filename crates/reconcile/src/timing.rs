//! Per-binding dispatch timing state.
//!
//! Throttle and debounce are properties of the dispatch side, not of the
//! handler value: the registry holds the configured delays, this module holds
//! the clock-dependent state that lives beside the live tree. The core owns
//! no timer primitive: debounce deadlines are surfaced to the host, which
//! schedules a single wakeup and calls back into `poll_timers`.

use serde_json::Value;

/// A debounced occurrence waiting for its quiet period to elapse.
#[derive(Clone, Debug)]
pub(crate) struct PendingDebounce {
    pub deadline: u64,
    pub payload: Value,
    /// Occurrence number, for suppressing a trailing fire of an event that
    /// already went out on the throttle leading edge.
    pub seq: u64,
}

/// Timing state for one (node, event-name) binding.
#[derive(Clone, Debug, Default)]
pub(crate) struct TimingEntry {
    /// Monotonic occurrence counter for this binding.
    pub seq: u64,
    /// When the throttle leading edge last fired.
    pub throttle_last_fired: Option<u64>,
    /// Occurrence that fired on the leading edge.
    pub throttle_fired_seq: u64,
    pub debounce: Option<PendingDebounce>,
}

impl TimingEntry {
    /// Next occurrence number.
    pub fn bump(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }

    /// Leading-edge decision: fire only when the window has elapsed.
    pub fn throttle_allows(&self, now: u64, delay: u64) -> bool {
        self.throttle_last_fired
            .is_none_or(|last| now > last + delay)
    }

    pub fn clear_throttle(&mut self) {
        self.throttle_last_fired = None;
        self.throttle_fired_seq = 0;
    }
}
