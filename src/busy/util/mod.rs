use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use self::errors::{
    internal, process_error, BusyResult, ErrorItem, ErrorKind, ErrorList, InternalError, Location,
    ProcessError, Severity,
};
pub use self::process_builder::{ExecResult, ProcessBuilder, PROCESS_TIMEOUT};

pub mod errors;
pub mod paths;
pub mod process_builder;

/// Caller-owned cooperative cancellation flag. Cloning shares the
/// underlying flag; any clone can cancel.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}
