//! Rolling sequence counters (`seq`, `bdSeq`).
//!
//! Sparkplug's rebirth rule needs more than "the next value" — it needs
//! the value a still-live Will message was built with, which is the
//! counter's value *before* its most recent advance. `RollingCounter`
//! keeps both.

/// A counter that wraps at `modulus` and remembers the value it held
/// before the last advance.
///
/// `seq` uses `modulus = 256`; `bdSeq` uses `modulus = 2^32` (i.e. wraps
/// via `u32` overflow) per the Open Question recorded in DESIGN.md.
#[derive(Debug, Clone, Copy)]
pub struct RollingCounter {
    current: u64,
    previous: u64,
    modulus: u64,
}

impl RollingCounter {
    /// Creates a counter starting at 0 with the given wrap modulus.
    /// `previous_value()` equals `current_value()` until the first
    /// advance.
    pub fn new(modulus: u64) -> Self {
        Self {
            current: 0,
            previous: 0,
            modulus,
        }
    }

    /// The counter's current value.
    pub fn current_value(&self) -> u64 {
        self.current
    }

    /// The value the counter held immediately before its last advance.
    pub fn previous_value(&self) -> u64 {
        self.previous
    }

    /// Snapshots `current` into `previous`, then advances `current` by
    /// one, wrapping modulo `modulus`.
    pub fn next_value(&mut self) -> u64 {
        self.previous = self.current;
        self.current = (self.current + 1) % self.modulus;
        self.current
    }

    /// Resets the counter to 0, leaving `previous_value` untouched (the
    /// NBIRTH `seq` reset does not erase the last-known `bdSeq`
    /// relationship for callers tracking both counters independently).
    pub fn reset(&mut self) {
        self.current = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seq_wraps_at_256() {
        let mut c = RollingCounter::new(256);
        for _ in 0..255 {
            c.next_value();
        }
        assert_eq!(c.current_value(), 255);
        assert_eq!(c.next_value(), 0);
    }

    #[test]
    fn previous_value_tracks_prior_current() {
        let mut c = RollingCounter::new(256);
        assert_eq!(c.previous_value(), 0);
        c.next_value();
        assert_eq!(c.current_value(), 1);
        assert_eq!(c.previous_value(), 0);
        c.next_value();
        assert_eq!(c.current_value(), 2);
        assert_eq!(c.previous_value(), 1);
    }

    #[test]
    fn reset_zeroes_current_but_keeps_previous() {
        let mut c = RollingCounter::new(256);
        c.next_value();
        c.next_value();
        let prev = c.previous_value();
        c.reset();
        assert_eq!(c.current_value(), 0);
        assert_eq!(c.previous_value(), prev);
    }

    #[test]
    fn bdseq_wraps_at_u32_max_plus_one() {
        let mut c = RollingCounter::new(1u64 << 32);
        c.current = u32::MAX as u64;
        let next = c.next_value();
        assert_eq!(next, 0);
        assert_eq!(c.previous_value(), u32::MAX as u64);
    }
}
