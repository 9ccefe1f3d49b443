use crate::clock::{Millis, millis};
use crate::error::{ErrorKind, Result};
use std::time::Duration;

const DEFAULT_FRESHNESS: Duration = Duration::from_secs(5 * 60);
const DEFAULT_STALENESS: Duration = Duration::from_secs(30 * 60);
const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// When cached data may be served without a fetch, when it is revalidated in
/// the background, and when it stops counting as data at all.
///
/// ```text
///   0 ─── freshness ─────────── staleness ──────────▶ age
///   │ serve as-is │ serve + revalidate │ load (nothing usable)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Policy {
    freshness: Duration,
    staleness: Duration,
    fetch_timeout: Option<Duration>,
}
impl Policy {
    /// # Errors
    ///
    /// Returns [`ErrorKind::InvalidPolicy`] if `freshness > staleness`.
    pub fn new(freshness: Duration, staleness: Duration) -> Result<Self> {
        if freshness > staleness {
            exn::bail!(ErrorKind::InvalidPolicy("freshness window must not exceed staleness window"));
        }
        Ok(Self { freshness, staleness, fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT) })
    }

    /// Bound every network fetch. `None` waits forever.
    pub fn with_fetch_timeout(mut self, timeout: impl Into<Option<Duration>>) -> Self {
        self.fetch_timeout = timeout.into().filter(|t| !t.is_zero());
        self
    }

    pub fn freshness(&self) -> Millis {
        millis(self.freshness)
    }

    pub fn staleness(&self) -> Millis {
        millis(self.staleness)
    }

    pub fn fetch_timeout(&self) -> Option<Duration> {
        self.fetch_timeout
    }
}
impl Default for Policy {
    fn default() -> Self {
        Self {
            freshness: DEFAULT_FRESHNESS,
            staleness: DEFAULT_STALENESS,
            fetch_timeout: Some(DEFAULT_FETCH_TIMEOUT),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let policy = Policy::default();
        assert_eq!(policy.freshness(), 300_000);
        assert_eq!(policy.staleness(), 1_800_000);
        assert_eq!(policy.fetch_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn test_freshness_must_not_exceed_staleness() {
        assert!(Policy::new(Duration::from_secs(10), Duration::from_secs(10)).is_ok());
        let err = Policy::new(Duration::from_secs(11), Duration::from_secs(10)).unwrap_err();
        assert!(matches!(&*err, ErrorKind::InvalidPolicy(_)));
    }

    #[test]
    fn test_zero_timeout_means_none() {
        let policy = Policy::default().with_fetch_timeout(Duration::ZERO);
        assert_eq!(policy.fetch_timeout(), None);
    }
}
