//! Day-granularity clock used for registration and expiry.

use crate::types::DayEpoch;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

const SECONDS_PER_DAY: u64 = 86_400;

/// Source of the current [`DayEpoch`].
pub trait Clock: Send + Sync {
    fn today(&self) -> DayEpoch;
}

/// Wall clock. A clock set before 1970 reads as day 0.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> DayEpoch {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        DayEpoch::try_from(secs / SECONDS_PER_DAY).unwrap_or(DayEpoch::MAX)
    }
}

/// Manually driven clock for tests and replays.
#[derive(Debug, Default)]
pub struct FixedClock(AtomicU32);

impl FixedClock {
    pub fn new(day: DayEpoch) -> Self {
        FixedClock(AtomicU32::new(day))
    }

    pub fn set(&self, day: DayEpoch) {
        self.0.store(day, Ordering::SeqCst);
    }

    pub fn advance(&self, days: DayEpoch) {
        self.0.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn today(&self) -> DayEpoch {
        self.0.load(Ordering::SeqCst)
    }
}
