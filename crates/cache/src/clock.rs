//! Wall clock abstraction.
//!
//! Every age computation in the cache goes through a [`Clock`], so tests can
//! move time forward without sleeping.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use time::UtcDateTime;

/// Milliseconds since the Unix epoch. Zero means "never".
pub type Millis = i64;

pub type ClockHandle = Arc<dyn Clock + Send + Sync>;

pub trait Clock: Send + Sync {
    fn now(&self) -> Millis;
}

/// Saturating conversion of a [`Duration`] into [`Millis`].
pub fn millis(duration: Duration) -> Millis {
    Millis::try_from(duration.as_millis()).unwrap_or(Millis::MAX)
}

/// The real clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
    fn now(&self) -> Millis {
        let nanos = UtcDateTime::now().unix_timestamp_nanos();
        Millis::try_from(nanos / 1_000_000).unwrap_or(Millis::MAX)
    }
}

/// A clock that only moves when told to.
///
/// ```
/// use std::time::Duration;
/// use prsync_cache::{Clock, ManualClock};
///
/// let clock = ManualClock::new(1_000);
/// clock.advance(Duration::from_secs(2));
/// assert_eq!(clock.now(), 3_000);
/// ```
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}
impl ManualClock {
    pub fn new(now: Millis) -> Self {
        Self { now: AtomicI64::new(now) }
    }

    pub fn set(&self, now: Millis) {
        self.now.store(now, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(millis(by), Ordering::SeqCst);
    }
}
impl Clock for ManualClock {
    fn now(&self) -> Millis {
        self.now.load(Ordering::SeqCst)
    }
}
