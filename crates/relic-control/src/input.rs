//! Input de-duplication and relative timestamping.
//!
//! The module's key-repeat logic must never see spurious duplicate
//! transitions, so the tracker keeps a key matrix (last-known pressed state
//! per key code) and absorbs redundant calls before they reach the module.
//! Mouse input bypasses the matrix entirely: motion is continuous and every
//! sample is meaningful.

use std::collections::HashMap;

use crate::clock::Clock;

/// Gap between the press pass and the release pass of a simulated tap, in
/// milliseconds.
const TAP_RELEASE_DELAY_MS: u64 = 16;

/// A key transition to forward to the module.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyStroke {
    pub key_code: u32,
    pub pressed: bool,
    /// Milliseconds since instance start, non-decreasing.
    pub timestamp_ms: u64,
}

/// Per-instance key matrix plus the instance start timestamp.
///
/// The matrix is the single owner of key state; everything else treats it
/// as read-only. A key code absent from the matrix is released.
pub struct InputTracker<C: Clock> {
    clock: C,
    start_ns: u64,
    keys: HashMap<u32, bool>,
}

impl<C: Clock> InputTracker<C> {
    /// Create a tracker anchored at the clock's current time.
    pub fn new(clock: C) -> Self {
        let start_ns = clock.now_ns();
        Self {
            clock,
            start_ns,
            keys: HashMap::new(),
        }
    }

    /// Milliseconds elapsed since instance start.
    pub fn elapsed_ms(&self) -> u64 {
        (self.clock.now_ns() - self.start_ns) / 1_000_000
    }

    /// Last-known pressed state for `key_code`.
    pub fn is_pressed(&self, key_code: u32) -> bool {
        self.keys.get(&key_code).copied().unwrap_or(false)
    }

    /// Record a key transition.
    ///
    /// Returns the stroke to forward, or `None` when the call repeats the
    /// matrix's current state (the transition is absorbed and the matrix is
    /// left untouched).
    pub fn key_event(&mut self, key_code: u32, pressed: bool) -> Option<KeyStroke> {
        self.key_event_at(key_code, pressed, self.elapsed_ms())
    }

    fn key_event_at(&mut self, key_code: u32, pressed: bool, timestamp_ms: u64) -> Option<KeyStroke> {
        if self.is_pressed(key_code) == pressed {
            return None;
        }
        self.keys.insert(key_code, pressed);
        Some(KeyStroke {
            key_code,
            pressed,
            timestamp_ms,
        })
    }

    /// Simulate a near-simultaneous multi-key tap.
    ///
    /// Presses every code at the current relative time, then releases every
    /// code stamped 16 ms later. The press pass runs to completion before
    /// the release pass starts, and de-duplication applies to each
    /// transition individually.
    pub fn tap(&mut self, key_codes: &[u32]) -> Vec<KeyStroke> {
        let now = self.elapsed_ms();
        let mut strokes = Vec::with_capacity(key_codes.len() * 2);
        for &code in key_codes {
            strokes.extend(self.key_event_at(code, true, now));
        }
        for &code in key_codes {
            strokes.extend(self.key_event_at(code, false, now + TAP_RELEASE_DELAY_MS));
        }
        strokes
    }
}
