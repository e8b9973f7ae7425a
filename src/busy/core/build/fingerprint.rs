use std::collections::HashMap;
use std::path::{Path, PathBuf};

use filetime::FileTime;

use crate::core::build::operation::{OpKind, Operation};

/// Caller-supplied include dependency map: for each source file, the
/// transitive headers it pulls in. Header tracking is opt-in; without
/// a snapshot, freshness is decided from direct inputs only.
#[derive(Debug, Default, Clone)]
pub struct DepSnapshot {
    deps: HashMap<PathBuf, Vec<PathBuf>>,
}

impl DepSnapshot {
    pub fn new() -> DepSnapshot {
        DepSnapshot::default()
    }

    pub fn insert(&mut self, source: impl Into<PathBuf>, headers: Vec<PathBuf>) {
        self.deps.insert(source.into(), headers);
    }

    /// The first header of `source` strictly newer than `reference`.
    fn any_newer(&self, source: &Path, reference: FileTime, cache: &mut MtimeCache) -> Option<&Path> {
        let headers = self.deps.get(source)?;
        headers
            .iter()
            .find(|h| match cache.mtime(h) {
                Some(m) => m > reference,
                None => true,
            })
            .map(|p| p.as_path())
    }
}

#[derive(Debug, Default)]
struct MtimeCache {
    map: HashMap<PathBuf, Option<FileTime>>,
}

impl MtimeCache {
    fn mtime(&mut self, path: &Path) -> Option<FileTime> {
        if let Some(cached) = self.map.get(path) {
            return *cached;
        }
        // fs::metadata follows symlinks; the host default is the
        // documented behavior.
        let m = crate::util::paths::mtime(path).ok();
        self.map.insert(path.to_path_buf(), m);
        m
    }

    fn forget(&mut self, path: &Path) {
        self.map.remove(path);
    }
}

/// Decides whether an operation is *due*: its output is missing, any
/// input is missing or newer than the output, or (for compiles with
/// header tracking) a transitive header is newer. Script runs are
/// always due; markers never are.
#[derive(Debug, Default)]
pub struct Freshness {
    cache: MtimeCache,
    snapshot: Option<DepSnapshot>,
    track_headers: bool,
}

impl Freshness {
    pub fn new(track_headers: bool, snapshot: Option<DepSnapshot>) -> Freshness {
        let track_headers =
            track_headers && snapshot.as_ref().map(|s| !s.deps.is_empty()).unwrap_or(false);
        Freshness {
            cache: MtimeCache::default(),
            snapshot,
            track_headers,
        }
    }

    pub fn is_due(&mut self, op: &Operation) -> bool {
        match op.op {
            OpKind::EnteringProduct => return false,
            OpKind::RunLua => return true,
            _ => {}
        }

        let outfile = match op.outfile() {
            // An operation without an output cannot be checked; run it
            // and let the command produce the error message.
            Some(f) if !f.is_empty() => PathBuf::from(f),
            _ => return true,
        };
        let reference = match self.cache.mtime(&outfile) {
            Some(m) => m,
            None => return true,
        };

        for infile in op.infiles() {
            let path = Path::new(infile);
            let mtime = match self.cache.mtime(path) {
                Some(m) => m,
                None => return true,
            };
            if mtime > reference {
                return true;
            }
            if self.track_headers && op.op == OpKind::Compile {
                if let Some(snapshot) = &self.snapshot {
                    if let Some(header) = snapshot.any_newer(path, reference, &mut self.cache) {
                        log::debug!(
                            "recompiling {} because of modified header {}",
                            path.display(),
                            header.display()
                        );
                        return true;
                    }
                }
            }
        }
        false
    }

    /// Drop the cached mtime of a path an operation just (re)wrote so
    /// downstream checks observe the new file.
    pub fn invalidate(&mut self, path: &Path) {
        self.cache.forget(path);
    }
}
