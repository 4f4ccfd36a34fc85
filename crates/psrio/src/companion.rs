//! Sibling metadata files.
//!
//! PRESTO keeps metadata next to the data it describes: `obs.dat` is
//! described by `obs.inf`, and `cand.pfd` may be accompanied by
//! `cand.pfd.bestprof`.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where to look for a companion file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Companion {
    /// The conventional sibling path.
    #[default]
    Sibling,
    /// An explicit path supplied by the caller.
    Path(PathBuf),
    /// Do not look for a companion.
    Skip,
}

/// `data` with its extension replaced by `suffix` (`obs.dat` → `obs.inf`).
pub fn replace_suffix(data: &Path, suffix: &str) -> PathBuf {
    data.with_extension(suffix)
}

/// `data` with `.suffix` appended (`cand.pfd` → `cand.pfd.bestprof`).
pub fn append_suffix(data: &Path, suffix: &str) -> PathBuf {
    let mut name = data.as_os_str().to_os_string();
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl Companion {
    /// The path this policy points at, given the conventional sibling.
    pub fn resolve(&self, sibling: PathBuf) -> Option<PathBuf> {
        match self {
            Companion::Sibling => Some(sibling),
            Companion::Path(p) => Some(p.clone()),
            Companion::Skip => None,
        }
    }
}

/// Fail with [`Error::MissingCompanion`] unless `path` exists.
pub fn require(path: PathBuf) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(Error::MissingCompanion { expected: path })
    }
}
