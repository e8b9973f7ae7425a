//! The build runner: a single dispatcher loop feeding a bounded set
//! of worker threads. Operations are consumed FIFO; the group index
//! is a barrier (a new group starts only once the pool has drained),
//! freshness is decided at dispatch time, and cancellation stops
//! dispatching while letting in-flight work report back.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use crossbeam_channel::unbounded;

use crate::core::build::build_config::BuildConfig;
use crate::core::build::fingerprint::Freshness;
use crate::core::build::invoke::{self, Invocation};
use crate::core::build::operation::Operation;
use crate::core::build::reporter::{ProcessResult, Reporter};
use crate::core::build::Executor;
use crate::util::{BusyResult, CancelToken, ExecResult};

pub struct JobQueue<'a> {
    config: &'a BuildConfig,
    workdir: PathBuf,
    env: Vec<(String, String)>,
}

impl<'a> JobQueue<'a> {
    pub fn new(config: &'a BuildConfig, workdir: impl Into<PathBuf>, env: Vec<(String, String)>) -> JobQueue<'a> {
        JobQueue {
            config,
            workdir: workdir.into(),
            env,
        }
    }

    /// Run the operation list to completion (or cancellation). The
    /// returned flag is the overall success; per-operation results
    /// and progress go to the reporter as they happen.
    pub fn execute(
        &self,
        ops: Vec<Operation>,
        freshness: &mut Freshness,
        reporter: &mut dyn Reporter,
        executor: &dyn Executor,
        cancel: &CancelToken,
    ) -> BusyResult<bool> {
        let mut queue: VecDeque<Operation> = ops.into();
        let total = queue.len();
        reporter.task_started("BUSY build run", total);

        let workers = self.config.jobs.max(1) as usize;
        let (tx, rx) = unbounded::<(Operation, ProcessResult)>();

        let mut success = true;
        let mut done = 0usize;
        let mut in_flight = 0usize;
        let mut cur_group = queue.front().map(|op| op.group).unwrap_or(0);
        // The most recent product marker; printed once before the
        // next operation that actually runs.
        let mut title: Option<String> = None;

        std::thread::scope(|scope| {
            loop {
                let draining = cancel.is_cancelled() || (self.config.stop_on_error && !success);

                while !draining && in_flight < workers {
                    let Some(head) = queue.front() else { break };
                    if head.group != cur_group {
                        if in_flight > 0 {
                            // Barrier: the old group must finish first.
                            break;
                        }
                        cur_group = head.group;
                    }
                    let op = queue.pop_front().unwrap();
                    done += 1;
                    reporter.task_progress(done);

                    if op.op.is_marker() {
                        title = Some(op.cmd.clone());
                        continue;
                    }
                    if !freshness.is_due(&op) {
                        continue;
                    }
                    if let Some(t) = title.take() {
                        reporter.command_description(&format!("    # running {}", t));
                    }

                    match invoke::prepare(&op, &self.workdir, &self.env) {
                        Ok(Invocation::Process(cmd)) => {
                            reporter.command_description(&format!("    {}", cmd));
                            if self.config.dry_run {
                                continue;
                            }
                            in_flight += 1;
                            let tx = tx.clone();
                            let cancel = cancel.clone();
                            let workdir = self.workdir.clone();
                            scope.spawn(move || {
                                let res = executor.exec(&cmd, &op, &cancel);
                                let result = process_result(&workdir, &cmd, res);
                                // The dispatcher may be gone after a
                                // hard error; nothing left to do then.
                                let _ = tx.send((op, result));
                            });
                        }
                        Ok(Invocation::Copy { from, to }) => {
                            reporter.command_description(&format!(
                                "    copy {} {}",
                                from.display(),
                                to.display()
                            ));
                            if self.config.dry_run {
                                continue;
                            }
                            in_flight += 1;
                            let tx = tx.clone();
                            let workdir = self.workdir.clone();
                            scope.spawn(move || {
                                let result = run_copy_result(&workdir, &from, &to);
                                let _ = tx.send((op, result));
                            });
                        }
                        Ok(Invocation::Marker) => {}
                        Err(e) => {
                            success = false;
                            reporter.process_result(&ProcessResult {
                                success: false,
                                program: op.cmd.clone(),
                                args: Vec::new(),
                                cwd: self.workdir.display().to_string(),
                                stdout: Vec::new(),
                                stderr: vec![e.to_string()],
                            });
                        }
                    }
                }

                if in_flight == 0 {
                    let draining =
                        cancel.is_cancelled() || (self.config.stop_on_error && !success);
                    if queue.is_empty() || draining {
                        break;
                    }
                    // Nothing running and work left: the next loop
                    // iteration advances the group barrier.
                    continue;
                }

                let (op, result) = rx.recv().expect("workers outlive the dispatcher loop");
                in_flight -= 1;
                if !result.success {
                    success = false;
                }
                if let Some(out) = op.outfile() {
                    freshness.invalidate(Path::new(out));
                }
                reporter.process_result(&result);
            }

            // Await whatever is still running (stop-on-error drain or
            // cancellation); their results still reach the reporter.
            while in_flight > 0 {
                let (op, result) = rx.recv().expect("in-flight workers always report");
                in_flight -= 1;
                if !result.success {
                    success = false;
                }
                if let Some(out) = op.outfile() {
                    freshness.invalidate(Path::new(out));
                }
                reporter.process_result(&result);
            }
        });

        if cancel.is_cancelled() {
            success = false;
        }
        reporter.task_finished(success);
        Ok(success)
    }
}

fn process_result(
    workdir: &Path,
    cmd: &crate::util::ProcessBuilder,
    res: ExecResult,
) -> ProcessResult {
    ProcessResult {
        success: res.success,
        program: cmd.get_program().to_string_lossy().into_owned(),
        args: cmd
            .get_args()
            .iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect(),
        cwd: workdir.display().to_string(),
        stdout: res.stdout,
        stderr: res.stderr,
    }
}

fn run_copy_result(workdir: &Path, from: &Path, to: &Path) -> ProcessResult {
    let (success, stderr) = match invoke::run_copy(from, to) {
        Ok(()) => (true, Vec::new()),
        Err(e) => (false, vec!["cannot copy files".to_string(), e.to_string()]),
    };
    ProcessResult {
        success,
        program: "copy".to_string(),
        args: vec![from.display().to_string(), to.display().to_string()],
        cwd: workdir.display().to_string(),
        stdout: Vec::new(),
        stderr,
    }
}
