//! Millisecond wall-clock timestamps and an injectable clock.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// Milliseconds since the unix epoch.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    pub fn millis_since(self, earlier: Timestamp) -> u64 { self.0.saturating_sub(earlier.0) }

    pub fn plus_millis(self, ms: u64) -> Timestamp { Timestamp(self.0.saturating_add(ms)) }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        let ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        Timestamp(ms)
    }
}

/// A clock that only moves when told to. Cloning shares the same time source.
#[derive(Debug, Default, Clone)]
pub struct ManualClock(Arc<AtomicU64>);

impl ManualClock {
    pub fn new(start: Timestamp) -> Self { Self(Arc::new(AtomicU64::new(start.0))) }

    pub fn advance(&self, ms: u64) { self.0.fetch_add(ms, Ordering::SeqCst); }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp { Timestamp(self.0.load(Ordering::SeqCst)) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new(Timestamp(1_000));
        let other = clock.clone();
        clock.advance(500);
        assert_eq!(other.now(), Timestamp(1_500));
    }

    #[test]
    fn millis_since_saturates() {
        assert_eq!(Timestamp(10).millis_since(Timestamp(30)), 0);
        assert_eq!(Timestamp(30).millis_since(Timestamp(10)), 20);
    }
}
