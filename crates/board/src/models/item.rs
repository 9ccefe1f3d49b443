use super::sanitize;
use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use time::OffsetDateTime;

/// One pull request, as fetched from the remote.
///
/// Items are immutable once fetched: the cache never edits them, it only
/// sorts them into buckets and persists them verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub number: u64,
    pub title: String,
    /// Login of the author; empty for deleted ("ghost") accounts.
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub url: String,
    pub state: ItemState,
    #[serde(default)]
    pub is_draft: bool,
    #[serde(default)]
    pub mergeable: Mergeable,
    #[serde(default)]
    pub checks: CheckStatus,
    #[serde(default)]
    pub review_decision: ReviewDecision,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}
impl Item {
    /// Bare open pull request with every classification attribute at its
    /// neutral value. Mostly useful for building fixtures.
    pub fn open(number: u64, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            author: String::new(),
            url: String::new(),
            state: ItemState::Open,
            is_draft: false,
            mergeable: Mergeable::Unknown,
            checks: CheckStatus::None,
            review_decision: ReviewDecision::None,
            updated_at: None,
        }
    }
}

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemState {
    Open,
    Closed,
    Merged,
}
impl ItemState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}
impl FromStr for ItemState {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "open" => Self::Open,
            "closed" => Self::Closed,
            "merged" => Self::Merged,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "state",
                value: format!("unknown state: {}", s)
            }),
        })
    }
}
impl Display for ItemState {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Whether the pull request can be merged into its base without conflicts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mergeable {
    Mergeable,
    Conflicting,
    /// The remote has not computed mergeability yet.
    #[default]
    Unknown,
}
impl FromStr for Mergeable {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "mergeable" | "clean" => Self::Mergeable,
            "conflicting" | "dirty" => Self::Conflicting,
            "" | "unknown" => Self::Unknown,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "mergeable",
                value: format!("unknown mergeable state: {}", s)
            }),
        })
    }
}

/// Rolled-up status of every check run and commit status on the head commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Passing,
    Failing,
    Pending,
    /// No checks are configured, or none have reported.
    #[default]
    None,
}
impl CheckStatus {
    /// Roll individual check conclusions up into one status. Any failure
    /// wins, then anything still running; only an all-green set passes.
    pub fn rollup<I, S>(conclusions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen = false;
        let mut pending = false;
        for conclusion in conclusions {
            seen = true;
            match sanitize(conclusion).as_str() {
                "failure" | "error" | "cancelled" | "timedout" | "actionrequired" | "startupfailure" => {
                    return Self::Failing;
                },
                "success" | "neutral" | "skipped" => {},
                _ => pending = true,
            }
        }
        match (seen, pending) {
            (false, _) => Self::None,
            (true, true) => Self::Pending,
            (true, false) => Self::Passing,
        }
    }
}

/// Aggregate review outcome required by the base branch's protection rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewDecision {
    Approved,
    ChangesRequested,
    ReviewRequired,
    #[default]
    None,
}
impl FromStr for ReviewDecision {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match sanitize(s).as_str() {
            "approved" => Self::Approved,
            "changesrequested" => Self::ChangesRequested,
            "reviewrequired" => Self::ReviewRequired,
            "" | "none" => Self::None,
            _ => exn::bail!(ErrorKind::ParseError {
                field: "review_decision",
                value: format!("unknown review decision: {}", s)
            }),
        })
    }
}
