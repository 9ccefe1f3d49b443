//! Mapping storage keys onto relative file paths.
//!
//! Keys look like `<namespace>:<owner>/<name>` and become
//! `<namespace>/<owner>/<name>.json`. Anything that would resolve outside the
//! store root is rejected.

use std::path::{Component, Path, PathBuf};

use crate::error::{ErrorKind, Result};

const EXTENSION: &str = "json";

/// Converts a storage key into a path relative to the store root.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use prsync_snapshot::key_to_path;
/// assert_eq!(key_to_path("prsync:owner/repo").unwrap(), Path::new("prsync/owner/repo.json"));
/// assert!(key_to_path("prsync:../../etc/passwd").is_err());
/// assert!(key_to_path("prsync:a\0b").is_err());
/// assert!(key_to_path("").is_err());
/// ```
pub fn key_to_path(key: &str) -> Result<PathBuf> {
    let joined = key.replacen(':', "/", 1);
    let mut components: Vec<&str> = Vec::new();
    for component in Path::new(&joined).components() {
        match component {
            Component::Normal(s) => {
                // Null bytes pass through Path::components() on Unix but cause
                // truncation in C-based syscalls, reject them explicitly.
                let Some(s) = s.to_str().filter(|s| !s.contains('\0')) else {
                    exn::bail!(ErrorKind::InvalidKey(key.to_string()));
                };
                components.push(s);
            },
            Component::CurDir => {},
            // Keys are never absolute, and never climb.
            Component::RootDir | Component::Prefix(_) | Component::ParentDir => {
                exn::bail!(ErrorKind::InvalidKey(key.to_string()))
            },
        }
    }
    if components.is_empty() {
        exn::bail!(ErrorKind::InvalidKey(key.to_string()));
    }
    let mut path: PathBuf = components.iter().collect();
    path.set_extension(match path.extension().and_then(|e| e.to_str()) {
        Some(existing) => format!("{existing}.{EXTENSION}"),
        None => EXTENSION.to_string(),
    });
    Ok(path)
}

/// Inverse of [`key_to_path()`]. Returns `None` for paths that could not
/// have been produced by it (wrong extension, non-UTF-8, single component).
///
/// ```
/// use std::path::Path;
/// use prsync_snapshot::path_to_key;
/// assert_eq!(path_to_key(Path::new("prsync/owner/repo.json")).as_deref(), Some("prsync:owner/repo"));
/// assert_eq!(path_to_key(Path::new("prsync/owner/repo.json.tmp")), None);
/// ```
pub fn path_to_key(path: &Path) -> Option<String> {
    let stem = path.to_str()?.strip_suffix(&format!(".{EXTENSION}"))?;
    let (namespace, rest) = stem.split_once('/')?;
    Some(format!("{namespace}:{rest}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dotted_repository_names_keep_their_dots() {
        let path = key_to_path("ns:owner/my.repo").unwrap();
        assert_eq!(path, Path::new("ns/owner/my.repo.json"));
        assert_eq!(path_to_key(&path).as_deref(), Some("ns:owner/my.repo"));
    }

    #[test]
    fn test_rejects_escapes() {
        assert!(key_to_path("/absolute").is_err());
        assert!(key_to_path("ns:owner/..").is_err());
        assert!(key_to_path("..:x").is_err());
    }

    #[test]
    fn test_current_dir_components_ignored() {
        assert_eq!(key_to_path("ns:./owner/repo").unwrap(), Path::new("ns/owner/repo.json"));
    }
}
