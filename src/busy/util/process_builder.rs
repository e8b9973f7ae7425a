use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};

use crate::util::CancelToken;

/// How long an external process may run before the worker gives up on
/// it. Matches the historical builder limit.
pub const PROCESS_TIMEOUT: Duration = Duration::from_secs(240);

/// A builder for an external command, mirroring the process handling
/// of the reference codebase: program + args + env overlay + cwd, a
/// display form with platform quoting, and captured execution with a
/// timeout and a cancellation token.
#[derive(Clone, Debug)]
pub struct ProcessBuilder {
    program: OsString,
    args: Vec<OsString>,
    env: BTreeMap<String, OsString>,
    cwd: Option<PathBuf>,
}

impl fmt::Display for ProcessBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.to_string_lossy())?;
        for arg in &self.args {
            write!(
                f,
                " {}",
                shell_escape::escape(arg.to_string_lossy())
            )?;
        }
        Ok(())
    }
}

impl ProcessBuilder {
    pub fn new(program: impl AsRef<OsStr>) -> ProcessBuilder {
        ProcessBuilder {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: None,
        }
    }

    pub fn arg(&mut self, arg: impl AsRef<OsStr>) -> &mut ProcessBuilder {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args(&mut self, args: impl IntoIterator<Item = impl AsRef<OsStr>>) -> &mut ProcessBuilder {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    pub fn env(&mut self, key: &str, value: impl AsRef<OsStr>) -> &mut ProcessBuilder {
        self.env.insert(key.to_string(), value.as_ref().to_os_string());
        self
    }

    pub fn cwd(&mut self, dir: impl AsRef<Path>) -> &mut ProcessBuilder {
        self.cwd = Some(dir.as_ref().to_path_buf());
        self
    }

    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    pub fn get_cwd(&self) -> Option<&Path> {
        self.cwd.as_deref()
    }

    /// Run the command to completion, capturing stdout and stderr as
    /// line lists. Never returns `Err`: spawn failures, timeouts and
    /// cancellation all come back as an unsuccessful [`ExecResult`]
    /// with an explanatory stderr line, the way the build runner
    /// reports them.
    pub fn exec_captured(&self, timeout: Duration, cancel: &CancelToken) -> ExecResult {
        log::debug!("running {}", self);
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (k, v) in &self.env {
            cmd.env(k, v);
        }
        if let Some(cwd) = &self.cwd {
            cmd.current_dir(cwd);
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                return ExecResult {
                    success: false,
                    status: None,
                    stdout: Vec::new(),
                    stderr: vec![
                        "cannot start process".to_string(),
                        e.to_string(),
                    ],
                };
            }
        };

        let out_pipe = child.stdout.take().expect("stdout was piped");
        let err_pipe = child.stderr.take().expect("stderr was piped");
        let out_thread = std::thread::spawn(move || drain(out_pipe));
        let err_thread = std::thread::spawn(move || drain(err_pipe));

        let deadline = Instant::now() + timeout;
        let status: Option<ExitStatus>;
        let mut extra_err = Vec::new();
        loop {
            match child.try_wait() {
                Ok(Some(s)) => {
                    status = Some(s);
                    break;
                }
                Ok(None) => {
                    if cancel.is_cancelled() {
                        let _ = child.kill();
                        let _ = child.wait();
                        status = None;
                        extra_err.push("process terminated".to_string());
                        break;
                    }
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        status = None;
                        extra_err.push("process timeout".to_string());
                        break;
                    }
                    std::thread::sleep(Duration::from_millis(20));
                }
                Err(e) => {
                    status = None;
                    extra_err.push(format!("cannot wait for process: {}", e));
                    break;
                }
            }
        }

        let stdout = out_thread.join().unwrap_or_default();
        let mut stderr = err_thread.join().unwrap_or_default();
        stderr.extend(extra_err);

        let success = status.map(|s| s.code() == Some(0)).unwrap_or(false);
        ExecResult {
            success,
            status,
            stdout,
            stderr,
        }
    }
}

fn drain(mut pipe: impl Read) -> Vec<String> {
    let mut buf = Vec::new();
    let _ = pipe.read_to_end(&mut buf);
    String::from_utf8_lossy(&buf)
        .lines()
        .map(|l| l.trim_end().to_string())
        .filter(|l| !l.is_empty())
        .collect()
}

/// Outcome of one captured execution.
#[derive(Debug)]
pub struct ExecResult {
    pub success: bool,
    pub status: Option<ExitStatus>,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_quotes_arguments() {
        let mut pb = ProcessBuilder::new("cc");
        pb.arg("-DNAME=\"x y\"").arg("-Iinclude");
        let s = pb.to_string();
        assert!(s.starts_with("cc "));
        assert!(s.contains("-Iinclude"));
    }

    #[cfg(unix)]
    #[test]
    fn spawn_failure_is_reported_not_raised() {
        let pb = ProcessBuilder::new("/nonexistent/tool-xyz");
        let res = pb.exec_captured(Duration::from_secs(5), &CancelToken::new());
        assert!(!res.success);
        assert_eq!(res.stderr[0], "cannot start process");
    }

    #[cfg(unix)]
    #[test]
    fn captures_exit_status_and_output() {
        let mut pb = ProcessBuilder::new("sh");
        pb.arg("-c").arg("echo hello; echo oops >&2; exit 3");
        let res = pb.exec_captured(Duration::from_secs(10), &CancelToken::new());
        assert!(!res.success);
        assert_eq!(res.status.and_then(|s| s.code()), Some(3));
        assert_eq!(res.stdout, vec!["hello"]);
        assert_eq!(res.stderr, vec!["oops"]);
    }
}
