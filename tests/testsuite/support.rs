//! Fixture helpers shared by the end-to-end tests: an on-disk project
//! builder, an executor that records invocations instead of spawning
//! tools, and a reporter that collects the event stream.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use busy::core::build::{BuildConfig, Executor, Operation, ProcessResult, Reporter};
use busy::core::session::{BuildParams, Session, TargetOs, Toolchain};
use busy::ops;
use busy::util::{CancelToken, ExecResult, ProcessBuilder};
use tempfile::TempDir;

pub fn project(files: &[(&str, &str)]) -> TempDir {
    let tmp = tempfile::tempdir().unwrap();
    for (path, content) in files {
        let full = tmp.path().join(path);
        std::fs::create_dir_all(full.parent().unwrap()).unwrap();
        std::fs::write(full, content).unwrap();
    }
    tmp
}

/// Pretends to be the toolchain: records every command and writes the
/// operation's output file so freshness behaves like a real build.
#[derive(Default)]
pub struct MockExecutor {
    pub calls: Mutex<Vec<(String, Vec<String>)>>,
}

impl Executor for MockExecutor {
    fn exec(&self, cmd: &ProcessBuilder, op: &Operation, _cancel: &CancelToken) -> ExecResult {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let args: Vec<String> = cmd
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        self.calls.lock().unwrap().push((program, args));
        if let Some(out) = op.outfile() {
            std::fs::create_dir_all(Path::new(out).parent().unwrap()).unwrap();
            std::fs::write(out, "artifact").unwrap();
        }
        ExecResult {
            success: true,
            status: None,
            stdout: Vec::new(),
            stderr: Vec::new(),
        }
    }
}

impl MockExecutor {
    pub fn executed_outputs(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|(_, args)| {
                args.iter()
                    .find_map(|a| {
                        a.strip_prefix("/Fo")
                            .or_else(|| a.strip_prefix("/out:"))
                            .map(str::to_string)
                    })
                    .or_else(|| {
                        args.iter()
                            .position(|a| a == "-o")
                            .and_then(|i| args.get(i + 1).cloned())
                    })
                    .unwrap_or_default()
            })
            .collect()
    }
}

#[derive(Default)]
pub struct EventLog {
    pub results: Vec<ProcessResult>,
    pub finished: Vec<bool>,
    pub descriptions: Vec<String>,
    pub total: usize,
}

impl Reporter for EventLog {
    fn task_started(&mut self, _name: &str, total: usize) {
        self.total = total;
    }
    fn task_finished(&mut self, success: bool) {
        self.finished.push(success);
    }
    fn command_description(&mut self, desc: &str) {
        self.descriptions.push(desc.to_string());
    }
    fn process_result(&mut self, result: &ProcessResult) {
        self.results.push(result.clone());
    }
}

pub fn linux_gcc(dir: &Path) -> BuildParams {
    let mut params = BuildParams::new(dir, dir.join("build"));
    params.toolchain = Toolchain::Gcc;
    params.os = TargetOs::Linux;
    params
}

pub fn win32_msvc(dir: &Path) -> BuildParams {
    let mut params = BuildParams::new(dir, dir.join("build"));
    params.toolchain = Toolchain::Msvc;
    params.os = TargetOs::Win32;
    params
}

pub fn evaluated(params: BuildParams) -> Session {
    let session = ops::parse_project(params).unwrap();
    assert!(
        !session.errors.has_errors(),
        "evaluation failed:\n{}",
        session.errors.to_string_lossy()
    );
    session
}

/// Evaluate + generate + run against the mock executor.
pub fn run(params: BuildParams, executor: &MockExecutor) -> (Session, EventLog, bool) {
    let mut session = evaluated(params);
    let config = BuildConfig::new(Some(2)).unwrap();
    let mut log = EventLog::default();
    let ok = ops::build_project(
        &mut session,
        &config,
        None,
        &mut log,
        executor,
        &CancelToken::new(),
    )
    .unwrap();
    (session, log, ok)
}

pub fn build_paths(session: &Session) -> PathBuf {
    session.params.root_build_dir.clone()
}
