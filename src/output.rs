//! Plain-text rendering of boards and snapshot listings.

use prsync_board::CollectionKey;
use prsync_cache::{CacheEntry, FetchState, Millis};
use serde::Serialize;
use std::io::{Result, Write};
use std::time::Duration;

/// How an age compares with the configured windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Freshness {
    Fresh,
    Stale,
    Expired,
}
impl Freshness {
    pub fn of(age: Millis, freshness: Duration, staleness: Duration) -> Self {
        let age = u128::try_from(age).unwrap_or_default();
        if age <= freshness.as_millis() {
            Self::Fresh
        } else if age <= staleness.as_millis() {
            Self::Stale
        } else {
            Self::Expired
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
        }
    }
}

/// `entry` as it goes into `--json` output.
#[derive(Serialize)]
pub struct BoardJson<'a> {
    pub repository: &'a CollectionKey,
    pub fetch_state: FetchState,
    #[serde(flatten)]
    pub entry: &'a CacheEntry,
}

/// Coarse human-readable age: `just now`, `42s`, `5m`, `3h`, `2d`.
pub fn age(ms: Millis) -> String {
    let secs = ms.max(0) / 1000;
    match secs {
        0 => "just now".to_string(),
        1..60 => format!("{secs}s"),
        60..3_600 => format!("{}m", secs / 60),
        3_600..86_400 => format!("{}h", secs / 3_600),
        _ => format!("{}d", secs / 86_400),
    }
}

pub fn board(out: &mut impl Write, key: &CollectionKey, entry: &CacheEntry, now: Millis) -> Result<()> {
    let synced = match entry.timestamp {
        0 => "never synced".to_string(),
        at => format!("synced {} ago", age(now.saturating_sub(at))),
    };
    writeln!(out, "{key}  ({} pull requests, {synced})", entry.item_count())?;
    if let Some(error) = &entry.error {
        writeln!(out, "  error: {error}")?;
        return Ok(());
    }
    for bucket in entry.buckets.iter().filter(|bucket| !bucket.is_empty()) {
        writeln!(out, "\n{} ({})", bucket.label, bucket.len())?;
        for item in &bucket.items {
            let author = if item.author.is_empty() { "ghost" } else { &item.author };
            writeln!(out, "  #{:<6} {}  @{author}", item.number, item.title)?;
        }
    }
    Ok(())
}

pub fn status_line(
    out: &mut impl Write,
    key: &CollectionKey,
    items: usize,
    age_ms: Millis,
    freshness: Freshness,
) -> Result<()> {
    writeln!(out, "{:<40} {items:>5} items  {:>8}  {}", key.to_string(), age(age_ms), freshness.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use prsync_board::{Item, build_buckets};
    use rstest::rstest;

    #[rstest]
    #[case(0, "just now")]
    #[case(999, "just now")]
    #[case(42_000, "42s")]
    #[case(5 * 60_000 + 1, "5m")]
    #[case(3 * 3_600_000, "3h")]
    #[case(49 * 3_600_000, "2d")]
    #[case(-5, "just now")]
    fn test_age(#[case] ms: Millis, #[case] expected: &str) {
        assert_eq!(age(ms), expected);
    }

    #[rstest]
    #[case(0, Freshness::Fresh)]
    #[case(300_000, Freshness::Fresh)]
    #[case(300_001, Freshness::Stale)]
    #[case(1_800_000, Freshness::Stale)]
    #[case(1_800_001, Freshness::Expired)]
    fn test_freshness(#[case] age: Millis, #[case] expected: Freshness) {
        let actual = Freshness::of(age, Duration::from_secs(300), Duration::from_secs(1_800));
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_board_skips_empty_buckets() {
        let items = vec![Item { is_draft: true, author: "octocat".into(), ..Item::open(7, "WIP") }];
        let entry = CacheEntry::fetched(build_buckets(&items), 1_000);
        let mut out = Vec::new();
        board(&mut out, &"acme/widgets".parse().unwrap(), &entry, 121_000).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "acme/widgets  (1 pull requests, synced 2m ago)\n\nDraft (1)\n  #7      WIP  @octocat\n");
    }

    #[test]
    fn test_board_error() {
        let mut out = Vec::new();
        board(&mut out, &"acme/widgets".parse().unwrap(), &CacheEntry::failed("HTTP 404"), 0).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "acme/widgets  (0 pull requests, never synced)\n  error: HTTP 404\n");
    }

    #[test]
    fn test_json_flattens_entry() {
        let key: CollectionKey = "acme/widgets".parse().unwrap();
        let entry = CacheEntry::empty();
        let json = serde_json::to_value(BoardJson { repository: &key, fetch_state: FetchState::Idle, entry: &entry }).unwrap();
        assert_eq!(json["repository"], "acme/widgets");
        assert_eq!(json["fetch_state"], "idle");
        assert_eq!(json["timestamp"], 0);
        assert_eq!(json["buckets"].as_array().map(Vec::len), Some(9));
    }
}
