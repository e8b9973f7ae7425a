//! Cancellation mid-build: no new work after the signal, in-flight
//! results still reported, terminal event carries failure.

use std::sync::atomic::{AtomicUsize, Ordering};

use busy::core::build::{BuildConfig, Executor, Operation};
use busy::ops;
use busy::util::{CancelToken, ExecResult, ProcessBuilder};

use crate::support::{evaluated, linux_gcc, project, EventLog, MockExecutor};

struct CancelAfter {
    inner: MockExecutor,
    completions: AtomicUsize,
    after: usize,
    token: CancelToken,
}

impl Executor for CancelAfter {
    fn exec(&self, cmd: &ProcessBuilder, op: &Operation, cancel: &CancelToken) -> ExecResult {
        std::thread::sleep(std::time::Duration::from_millis(15));
        let res = self.inner.exec(cmd, op, cancel);
        if self.completions.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            self.token.cancel();
        }
        res
    }
}

#[test]
fn cancel_mid_build_stops_dispatch_and_fails() {
    // Ten independent compiles in one group, two workers.
    let mut files: Vec<(String, String)> = Vec::new();
    let mut busy = String::from("let all ! : Library {\n");
    for i in 0..10 {
        let name = format!("u{}.cpp", i);
        busy.push_str(&format!("    .sources += ./{}\n", name));
        files.push((name, "\n".into()));
    }
    busy.push_str("}\n");
    files.push(("BUSY".into(), busy));
    let refs: Vec<(&str, &str)> = files.iter().map(|(a, b)| (a.as_str(), b.as_str())).collect();
    let p = project(&refs);

    let token = CancelToken::new();
    let executor = CancelAfter {
        inner: MockExecutor::default(),
        completions: AtomicUsize::new(0),
        after: 3,
        token: token.clone(),
    };

    let mut session = evaluated(linux_gcc(p.path()));
    let config = BuildConfig::new(Some(2)).unwrap();
    let mut log = EventLog::default();
    let ok = ops::build_project(&mut session, &config, None, &mut log, &executor, &token).unwrap();

    assert!(!ok);
    assert_eq!(log.finished, vec![false], "exactly one terminal event");
    // Three completed before the signal, plus at most the two
    // in-flight workers.
    assert!(
        log.results.len() >= 3 && log.results.len() <= 5,
        "{} results",
        log.results.len()
    );
    assert!(executor.inner.calls.lock().unwrap().len() <= 5);
}
