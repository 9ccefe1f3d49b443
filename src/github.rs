//! Pull request fetcher backed by the GitHub CLI.
//!
//! Shelling out to `gh` reuses whatever authentication the user already set
//! up (`gh auth login`, `GH_TOKEN`, enterprise hosts) instead of managing
//! tokens here.

use crate::error::{ErrorKind, Result};
use async_trait::async_trait;
use exn::ResultExt;
use prsync_board::{CheckStatus, CollectionKey, Item};
use prsync_cache::CollectionFetcher;
use prsync_cache::error::{ErrorKind as FetchErrorKind, Result as FetchResult};
use prsync_config::GithubConfig;
use serde::Deserialize;
use std::path::PathBuf;
use time::OffsetDateTime;
use tokio::process::Command;

const JSON_FIELDS: &str =
    "number,title,author,url,state,isDraft,mergeable,statusCheckRollup,reviewDecision,updatedAt";

/// Runs `gh pr list` for every fetch.
#[derive(Debug, Clone)]
pub struct GhCli {
    executable: PathBuf,
    limit: u32,
}
impl GhCli {
    /// Use the configured executable, or find `gh` on `PATH`.
    pub fn locate(config: &GithubConfig) -> Result<Self> {
        let executable = match &config.executable {
            Some(path) => which::which(path).or_raise(|| ErrorKind::GhNotFound)?,
            None => which::which("gh").or_raise(|| ErrorKind::GhNotFound)?,
        };
        tracing::debug!(executable = %executable.display(), "Using GitHub CLI");
        Ok(Self { executable, limit: config.limit })
    }

    fn args(&self, key: &CollectionKey) -> Vec<String> {
        vec![
            "pr".to_string(),
            "list".to_string(),
            "--repo".to_string(),
            key.to_string(),
            "--state".to_string(),
            "all".to_string(),
            "--limit".to_string(),
            self.limit.to_string(),
            "--json".to_string(),
            JSON_FIELDS.to_string(),
        ]
    }
}

#[async_trait]
impl CollectionFetcher for GhCli {
    async fn fetch(&self, key: &CollectionKey) -> FetchResult<Vec<Item>> {
        let output = Command::new(&self.executable)
            .args(self.args(key))
            .env("GH_PROMPT_DISABLED", "1")
            .kill_on_drop(true)
            .output()
            .await
            .or_raise(|| FetchErrorKind::Fetch(format!("could not run {}", self.executable.display())))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let message = match stderr.trim() {
                "" => format!("gh exited with {}", output.status),
                stderr => stderr.to_string(),
            };
            exn::bail!(FetchErrorKind::Fetch(message));
        }
        parse_items(&output.stdout)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPullRequest {
    number: u64,
    title: String,
    #[serde(default)]
    author: Option<RawAuthor>,
    #[serde(default)]
    url: String,
    state: String,
    #[serde(default)]
    is_draft: bool,
    #[serde(default)]
    mergeable: Option<String>,
    #[serde(default)]
    status_check_rollup: Option<Vec<RawCheck>>,
    #[serde(default)]
    review_decision: Option<String>,
    #[serde(default, with = "time::serde::rfc3339::option")]
    updated_at: Option<OffsetDateTime>,
}

#[derive(Deserialize)]
struct RawAuthor {
    #[serde(default)]
    login: String,
}

/// Either a check run (`status` + `conclusion`) or a commit status context
/// (`state`).
#[derive(Deserialize)]
struct RawCheck {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    conclusion: Option<String>,
    #[serde(default)]
    state: Option<String>,
}
impl RawCheck {
    fn outcome(&self) -> &str {
        if let Some(state) = &self.state {
            return state;
        }
        match (self.status.as_deref(), self.conclusion.as_deref()) {
            (Some(status), _) if !status.eq_ignore_ascii_case("completed") => status,
            (_, Some(conclusion)) => conclusion,
            _ => "",
        }
    }
}

impl TryFrom<RawPullRequest> for Item {
    type Error = prsync_board::error::Error;

    fn try_from(raw: RawPullRequest) -> std::result::Result<Self, Self::Error> {
        let checks = raw.status_check_rollup.unwrap_or_default();
        Ok(Self {
            number: raw.number,
            title: raw.title,
            author: raw.author.map(|author| author.login).unwrap_or_default(),
            url: raw.url,
            state: raw.state.parse()?,
            is_draft: raw.is_draft,
            mergeable: raw.mergeable.as_deref().unwrap_or_default().parse()?,
            checks: CheckStatus::rollup(checks.iter().map(RawCheck::outcome)),
            review_decision: raw.review_decision.as_deref().unwrap_or_default().parse()?,
            updated_at: raw.updated_at,
        })
    }
}

/// Map the JSON printed by `gh pr list --json` into items, keeping its order.
pub fn parse_items(stdout: &[u8]) -> FetchResult<Vec<Item>> {
    let unexpected = || FetchErrorKind::Fetch("unexpected output from gh".to_string());
    let raw: Vec<RawPullRequest> = serde_json::from_slice(stdout).or_raise(unexpected)?;
    raw.into_iter().map(|pr| Item::try_from(pr).or_raise(unexpected)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use prsync_board::{ItemState, Mergeable, ReviewDecision};
    use rstest::rstest;

    const OUTPUT: &str = r#"[
      {
        "author": {"id": "MDQ6", "is_bot": false, "login": "octocat", "name": "The Octocat"},
        "isDraft": false,
        "mergeable": "MERGEABLE",
        "number": 42,
        "reviewDecision": "APPROVED",
        "state": "OPEN",
        "statusCheckRollup": [
          {"__typename": "CheckRun", "name": "build", "status": "COMPLETED", "conclusion": "SUCCESS"},
          {"__typename": "StatusContext", "context": "ci/lint", "state": "SUCCESS"}
        ],
        "title": "Add widgets",
        "updatedAt": "2026-01-02T03:04:05Z",
        "url": "https://github.com/acme/widgets/pull/42"
      },
      {
        "author": null,
        "isDraft": true,
        "mergeable": "UNKNOWN",
        "number": 41,
        "reviewDecision": "",
        "state": "MERGED",
        "statusCheckRollup": null,
        "title": "Old work",
        "url": "https://github.com/acme/widgets/pull/41"
      }
    ]"#;

    #[test]
    fn test_parse_items() {
        let items = parse_items(OUTPUT.as_bytes()).unwrap();
        assert_eq!(items.len(), 2);

        let first = &items[0];
        assert_eq!(first.number, 42);
        assert_eq!(first.author, "octocat");
        assert_eq!(first.state, ItemState::Open);
        assert_eq!(first.mergeable, Mergeable::Mergeable);
        assert_eq!(first.checks, CheckStatus::Passing);
        assert_eq!(first.review_decision, ReviewDecision::Approved);
        assert_eq!(first.updated_at.map(|at| at.unix_timestamp()), Some(1_767_323_045));

        let second = &items[1];
        assert_eq!(second.author, "");
        assert!(second.is_draft);
        assert_eq!(second.state, ItemState::Merged);
        assert_eq!(second.checks, CheckStatus::None);
        assert_eq!(second.review_decision, ReviewDecision::None);
        assert_eq!(second.updated_at, None);
    }

    #[rstest]
    #[case(r#"{"status": "IN_PROGRESS", "conclusion": ""}"#, "IN_PROGRESS")]
    #[case(r#"{"status": "COMPLETED", "conclusion": "FAILURE"}"#, "FAILURE")]
    #[case(r#"{"state": "PENDING"}"#, "PENDING")]
    #[case(r#"{}"#, "")]
    fn test_check_outcome(#[case] json: &str, #[case] expected: &str) {
        let check: RawCheck = serde_json::from_str(json).unwrap();
        assert_eq!(check.outcome(), expected);
    }

    #[test]
    fn test_failing_check_wins() {
        let json = r#"[{"number": 1, "title": "t", "state": "OPEN", "statusCheckRollup": [
            {"status": "IN_PROGRESS"}, {"status": "COMPLETED", "conclusion": "FAILURE"}
        ]}]"#;
        assert_eq!(parse_items(json.as_bytes()).unwrap()[0].checks, CheckStatus::Failing);
    }

    #[rstest]
    #[case("not json")]
    #[case(r#"{"number": 1}"#)]
    #[case(r#"[{"number": 1, "title": "t", "state": "SUPERSEDED"}]"#)]
    fn test_unexpected_output(#[case] stdout: &str) {
        let err = parse_items(stdout.as_bytes()).unwrap_err();
        assert_eq!((*err).to_string(), "unexpected output from gh");
    }

    #[test]
    fn test_args() {
        let gh = GhCli { executable: PathBuf::from("/usr/bin/gh"), limit: 50 };
        let args = gh.args(&"acme/widgets".parse().unwrap());
        assert_eq!(args[..4], ["pr", "list", "--repo", "acme/widgets"]);
        assert!(args.windows(2).any(|pair| pair == ["--limit", "50"]));
        assert_eq!(args.last().map(String::as_str), Some(JSON_FIELDS));
    }
}
