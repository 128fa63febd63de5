//! Warning gate: dedup + cooldown in front of the speech queue.
//!
//! A warning passes when its text differs from the last emitted text, or
//! when more than the cooldown has elapsed since that emission. Only the
//! single last-emitted text is remembered, so two alternating messages never
//! hit the cooldown. Time comes from a monotonic clock.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::warning::Warning;

/// Monotonic millisecond clock.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> u64;
}

/// Milliseconds since the clock was created, from `Instant`.
#[derive(Clone, Copy, Debug)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now_ms(&self) -> u64 {
        self.origin.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and replays. Clones share the same time.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now_ms: Arc<AtomicU64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Arc::new(AtomicU64::new(start_ms)),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now_ms
            .fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn set(&self, now_ms: u64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}

/// What the gate remembers. Session-scoped; changes only on emit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct GateState {
    pub last_emitted_text: Option<String>,
    pub last_emitted_at_ms: u64,
}

#[derive(Debug)]
pub struct WarningGate {
    cooldown_ms: u64,
    state: GateState,
}

impl WarningGate {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown_ms: cooldown.as_millis() as u64,
            state: GateState::default(),
        }
    }

    /// Decide whether `warning` may be emitted at `now_ms`. Records the
    /// emission when it passes; leaves state untouched when suppressed.
    pub fn admit(&mut self, warning: &Warning, now_ms: u64) -> bool {
        let text_changed = self.state.last_emitted_text.as_deref() != Some(warning.text());
        let cooled_down =
            now_ms.saturating_sub(self.state.last_emitted_at_ms) > self.cooldown_ms;

        if text_changed || cooled_down {
            self.state.last_emitted_text = Some(warning.text().to_string());
            self.state.last_emitted_at_ms = now_ms;
            true
        } else {
            false
        }
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn cooldown(&self) -> Duration {
        Duration::from_millis(self.cooldown_ms)
    }
}
