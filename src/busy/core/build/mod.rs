//! Everything between a merged session and finished artifacts: the
//! command generator, the freshness oracle, the dispatcher with its
//! worker pool, and the operation/reporting types they share.

pub use self::build_config::{BuildConfig, MessageFormat, ToolPaths};
pub use self::fingerprint::{DepSnapshot, Freshness};
pub use self::generator::{generate, CommandList};
pub use self::job_queue::JobQueue;
pub use self::operation::{OpKind, Operation, ParamKind, Parameter};
pub use self::reporter::{ConsoleReporter, ProcessResult, Reporter, SilentReporter};

pub mod build_config;
pub mod fingerprint;
pub mod generator;
pub mod invoke;
pub mod job_queue;
pub mod operation;
pub mod reporter;

use crate::core::session::Session;
use crate::util::{BusyResult, CancelToken, ExecResult, ProcessBuilder, PROCESS_TIMEOUT};

/// Seam between the dispatcher and the outside world: every external
/// command goes through here, so tests (and dry hosts) can intercept
/// instead of spawning real tools.
pub trait Executor: Send + Sync {
    fn exec(&self, cmd: &ProcessBuilder, _op: &Operation, cancel: &CancelToken) -> ExecResult {
        cmd.exec_captured(PROCESS_TIMEOUT, cancel)
    }
}

/// Spawns the command, nothing else.
#[derive(Copy, Clone, Default)]
pub struct DefaultExecutor;

impl Executor for DefaultExecutor {}

/// Generate the operation list and run it. Stops at the phase
/// boundary if the session accumulated errors during generation.
pub fn run_build(
    session: &mut Session,
    config: &BuildConfig,
    snapshot: Option<DepSnapshot>,
    reporter: &mut dyn Reporter,
    executor: &dyn Executor,
    cancel: &CancelToken,
) -> BusyResult<bool> {
    let list = generate(session)?;
    if session.errors.has_errors() {
        return Ok(false);
    }
    let mut freshness = Freshness::new(config.track_headers, snapshot);
    let queue = JobQueue::new(
        config,
        session.params.root_build_dir.clone(),
        session.params.env.clone(),
    );
    queue.execute(list.ops, &mut freshness, reporter, executor, cancel)
}
