use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use std::sync::LazyLock;

static SEGMENT: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^[A-Za-z0-9_.-]+$").expect("hardcoded regex is valid"));

/// Identity of one remote collection: a repository, named by its owner and
/// its name.
///
/// Used verbatim as the in-memory map key and, via
/// [`storage_key()`](Self::storage_key), as the durable snapshot key.
///
/// # Examples
///
/// ```
/// use prsync_board::CollectionKey;
///
/// let key: CollectionKey = "rust-lang/cargo".parse().unwrap();
/// assert_eq!(key.owner(), "rust-lang");
/// assert_eq!(key.storage_key("prsync"), "prsync:rust-lang/cargo");
/// assert!("not-a-repo".parse::<CollectionKey>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionKey {
    owner: String,
    name: String,
}
impl CollectionKey {
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Result<Self, Error> {
        let (owner, name) = (owner.into(), name.into());
        for segment in [&owner, &name] {
            if !SEGMENT.is_match(segment) || segment == "." || segment == ".." {
                exn::bail!(ErrorKind::InvalidKey(format!("{owner}/{name}")));
            }
        }
        Ok(Self { owner, name })
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Key under which this collection's snapshot is persisted, in the form
    /// `<namespace>:<owner>/<name>`.
    pub fn storage_key(&self, namespace: &str) -> String {
        format!("{namespace}:{}/{}", self.owner, self.name)
    }

    /// Inverse of [`storage_key()`](Self::storage_key). Returns `None` for
    /// keys belonging to a different namespace.
    pub fn from_storage_key(namespace: &str, storage_key: &str) -> Option<Self> {
        let rest = storage_key.strip_prefix(namespace)?.strip_prefix(':')?;
        rest.parse().ok()
    }
}
impl FromStr for CollectionKey {
    type Err = Error;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let Some((owner, name)) = s.trim().split_once('/') else {
            exn::bail!(ErrorKind::InvalidKey(s.to_string()));
        };
        Self::new(owner, name)
    }
}
impl TryFrom<String> for CollectionKey {
    type Error = Error;
    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.as_str().parse()
    }
}
impl From<CollectionKey> for String {
    fn from(key: CollectionKey) -> Self {
        key.to_string()
    }
}
impl Display for CollectionKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}/{}", self.owner, self.name)
    }
}
