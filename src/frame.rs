use std::time::{Duration, Instant};

/// Shift register for one Wiegand transmission, complete once the lines go quiet
#[derive(Debug, Default)]
pub struct FrameAssembler {
    raw: u64,
    last_activity: Option<Instant>,
}

impl FrameAssembler {
    pub fn new() -> FrameAssembler {
        FrameAssembler::default()
    }

    /// Shift one bit in on the right.  Bits pushed past bit 63 are lost.
    pub fn push_bit(&mut self, bit: bool, at: Instant) {
        self.raw = self.raw << 1 | bit as u64;
        self.last_activity = Some(at);
    }

    /// The bits gathered so far
    pub fn pending(&self) -> u64 {
        self.raw
    }

    pub fn last_activity(&self) -> Option<Instant> {
        self.last_activity
    }

    /// Returns the accumulated frame and resets, but only when bits are waiting and
    /// nothing arrived for more than `timeout` before `now`
    pub fn take_if_quiet(&mut self, now: Instant, timeout: Duration) -> Option<u64> {
        if self.raw == 0 {
            return None;
        }

        let quiet = match self.last_activity {
            Some(last) => now.saturating_duration_since(last) > timeout,
            None => true,
        };

        if !quiet {
            return None;
        }

        Some(std::mem::take(&mut self.raw))
    }
}
