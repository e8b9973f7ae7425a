use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::core::refs::Reference;
use crate::util::BusyResult;

/// Locate the build description inside a directory: a file named
/// `BUSY`, or `BUSY.busy` as the fallback spelling.
pub fn find_busy_file(dir: &Path) -> Option<PathBuf> {
    for name in ["BUSY", "BUSY.busy"] {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
    }
    None
}

/// Bookkeeping for module resolution: canonical-path idempotence and
/// cycle detection. A directory resolves to at most one module record;
/// a directory that is currently being loaded further up the stack is
/// a cycle and the offending edge is dropped.
#[derive(Debug, Default)]
pub struct LoadTracker {
    loaded: HashMap<PathBuf, Reference>,
    stack: Vec<PathBuf>,
}

pub enum LoadState {
    /// Never seen; the caller should load it and then call `finish`.
    Fresh,
    /// Already materialized; bind to the existing record.
    Loaded(Reference),
    /// The directory is its own transitive parent.
    Cycle,
}

impl LoadTracker {
    pub fn new() -> LoadTracker {
        LoadTracker::default()
    }

    /// Canonicalize `dir` and classify it. `Fresh` pushes the
    /// directory onto the loading stack.
    pub fn enter(&mut self, dir: &Path) -> BusyResult<(PathBuf, LoadState)> {
        let canon = dir
            .canonicalize()
            .unwrap_or_else(|_| crate::util::paths::normalize_path(dir));
        if let Some(&id) = self.loaded.get(&canon) {
            return Ok((canon, LoadState::Loaded(id)));
        }
        if self.stack.contains(&canon) {
            return Ok((canon, LoadState::Cycle));
        }
        self.stack.push(canon.clone());
        Ok((canon, LoadState::Fresh))
    }

    /// Record the module the directory resolved to and pop the stack.
    pub fn finish(&mut self, canon: PathBuf, id: Reference) {
        debug_assert_eq!(self.stack.last(), Some(&canon));
        self.stack.pop();
        self.loaded.insert(canon, id);
    }

    /// Pop without registering (load failed part-way).
    pub fn abandon(&mut self, canon: &Path) {
        debug_assert_eq!(self.stack.last().map(|p| p.as_path()), Some(canon));
        self.stack.pop();
    }

    /// The module currently being loaded at the top of the stack.
    pub fn current(&self) -> Option<&Path> {
        self.stack.last().map(|p| p.as_path())
    }
}

/// The build-root-relative subpath mirrored under the build directory.
/// Directories outside the source tree fall back to the declared
/// submodule name under the parent's subpath.
pub fn relative_dir(
    canon_dir: &Path,
    root_dir: &Path,
    parent_rdir: &Path,
    name: &str,
) -> PathBuf {
    match canon_dir.strip_prefix(root_dir) {
        Ok(rel) => rel.to_path_buf(),
        Err(_) => parent_rdir.join(name),
    }
}
