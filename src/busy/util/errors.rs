use std::fmt;
use std::path::PathBuf;
use std::process::ExitStatus;

use anyhow::Error;

pub type BusyResult<T> = Result<T, Error>;

/// Classification of everything that can go wrong in a session.
///
/// Evaluation-phase failures accumulate as [`ErrorItem`]s and are
/// reported together at the next phase boundary; build-phase failures
/// are per-operation. `Internal` means a precondition was violated and
/// the session is no longer trustworthy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Parse,
    Resolve,
    Type,
    File,
    Config,
    Build,
    Cancel,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Parse => "parse error",
            ErrorKind::Resolve => "resolve error",
            ErrorKind::Type => "type error",
            ErrorKind::File => "file error",
            ErrorKind::Config => "config error",
            ErrorKind::Build => "build error",
            ErrorKind::Cancel => "cancelled",
            ErrorKind::Internal => "internal error",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

/// Source position for editor jump-to. Columns are 1-based for
/// display; a row of 0 means "whole file".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Location {
    pub file: PathBuf,
    pub row: u32,
    pub col: u32,
}

impl Location {
    pub fn new(file: impl Into<PathBuf>, row: u32, col: u32) -> Location {
        Location {
            file: file.into(),
            row,
            col,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", crate::util::paths::denormalize(&self.file))?;
        if self.row > 0 {
            write!(f, ":{}", self.row)?;
            if self.col > 0 {
                write!(f, ":{}", self.col)?;
            }
        }
        Ok(())
    }
}

/// One reportable message, optionally anchored to a source location.
#[derive(Debug, Clone)]
pub struct ErrorItem {
    pub kind: ErrorKind,
    pub severity: Severity,
    pub message: String,
    pub loc: Option<Location>,
}

impl fmt::Display for ErrorItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(loc) = &self.loc {
            write!(f, "{} ", loc)?;
        }
        write!(f, "{}: {}", self.kind, self.message)
    }
}

/// Accumulator used during evaluation; the session keeps going after a
/// recoverable error and reports the whole list at the phase boundary.
#[derive(Debug, Default)]
pub struct ErrorList {
    items: Vec<ErrorItem>,
}

impl ErrorList {
    pub fn new() -> ErrorList {
        ErrorList::default()
    }

    pub fn push(&mut self, item: ErrorItem) {
        log::debug!("recorded {}", item);
        self.items.push(item);
    }

    pub fn error(&mut self, kind: ErrorKind, loc: Option<Location>, message: impl Into<String>) {
        self.push(ErrorItem {
            kind,
            severity: Severity::Error,
            message: message.into(),
            loc,
        });
    }

    pub fn warning(&mut self, kind: ErrorKind, loc: Option<Location>, message: impl Into<String>) {
        self.push(ErrorItem {
            kind,
            severity: Severity::Warning,
            message: message.into(),
            loc,
        });
    }

    pub fn items(&self) -> &[ErrorItem] {
        &self.items
    }

    pub fn has_errors(&self) -> bool {
        self.items.iter().any(|i| i.severity == Severity::Error)
    }

    pub fn to_string_lossy(&self) -> String {
        self.items
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Error from an external process, carrying everything the reporter
/// needs to describe the failure.
#[derive(Debug, thiserror::Error)]
#[error("{desc}")]
pub struct ProcessError {
    pub desc: String,
    pub exit: Option<ExitStatus>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

pub fn process_error(
    msg: &str,
    status: Option<ExitStatus>,
    stdout: &[String],
    stderr: &[String],
) -> ProcessError {
    let exit = match status {
        Some(s) => s.to_string(),
        None => "never executed".to_string(),
    };
    let mut desc = format!("{} ({})", msg, exit);
    if !stdout.is_empty() {
        desc.push_str("\n--- stdout\n");
        desc.push_str(&stdout.join("\n"));
    }
    if !stderr.is_empty() {
        desc.push_str("\n--- stderr\n");
        desc.push_str(&stderr.join("\n"));
    }
    ProcessError {
        desc,
        exit: status,
        stdout: stdout.to_vec(),
        stderr: stderr.to_vec(),
    }
}

/// Marker wrapper for violated preconditions (stale references and the
/// like). Callers inspecting an error chain treat these as fatal.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct InternalError(pub String);

pub fn internal(error: impl fmt::Display) -> Error {
    InternalError(error.to_string()).into()
}
