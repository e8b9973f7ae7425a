use std::fs;
use std::path::{Component, Path, PathBuf};

use anyhow::Context;
use filetime::FileTime;

use crate::util::errors::BusyResult;

/// Collapse `.` and `..` components without touching the filesystem.
/// Used for the canonical internal form of every path the evaluator
/// hands out; symlinks are deliberately not resolved here.
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut components = path.components().peekable();
    let mut ret = if let Some(c @ Component::Prefix(..)) = components.peek().cloned() {
        components.next();
        PathBuf::from(c.as_os_str())
    } else {
        PathBuf::new()
    };

    for component in components {
        match component {
            Component::Prefix(..) => unreachable!(),
            Component::RootDir => {
                ret.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                ret.pop();
            }
            Component::Normal(c) => {
                ret.push(c);
            }
        }
    }
    ret
}

/// Combine a base directory with a (possibly relative) path segment,
/// normalizing separators and `..` on the way. Absolute inputs are
/// taken verbatim (normalized).
pub fn join_normalized(base: &Path, rel: &Path) -> PathBuf {
    if rel.is_absolute() {
        normalize_path(rel)
    } else {
        normalize_path(&base.join(rel))
    }
}

/// Platform-native display form. Internally all paths use `/`; on
/// Windows this swaps in backslashes for user-facing output.
pub fn denormalize(path: &Path) -> String {
    let s = path.display().to_string();
    if cfg!(windows) {
        s.replace('/', "\\")
    } else {
        s
    }
}

/// Last-modification time via `fs::metadata`, which follows symlinks;
/// the freshness oracle inherits that behavior from the host.
pub fn mtime(path: &Path) -> BusyResult<FileTime> {
    let meta =
        fs::metadata(path).with_context(|| format!("failed to stat `{}`", path.display()))?;
    Ok(FileTime::from_last_modification_time(&meta))
}

pub fn read(path: &Path) -> BusyResult<String> {
    fs::read_to_string(path).with_context(|| format!("failed to read `{}`", path.display()))
}

pub fn write(path: &Path, contents: &[u8]) -> BusyResult<()> {
    fs::write(path, contents).with_context(|| format!("failed to write `{}`", path.display()))
}

pub fn create_dir_all(path: &Path) -> BusyResult<()> {
    fs::create_dir_all(path)
        .with_context(|| format!("failed to create directory `{}`", path.display()))
}

pub fn remove_file(path: &Path) -> BusyResult<()> {
    fs::remove_file(path).with_context(|| format!("failed to remove file `{}`", path.display()))
}
