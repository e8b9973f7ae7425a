use serde::Serialize;

use crate::core::build::build_config::MessageFormat;
use crate::core::shell::Shell;

/// Outcome of a single executed operation, as handed to the caller.
#[derive(Clone, Debug, Serialize)]
pub struct ProcessResult {
    pub success: bool,
    pub program: String,
    pub args: Vec<String>,
    pub cwd: String,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
}

/// Receives the structured build events. All calls arrive serialized
/// from the dispatcher; implementations never need their own locking.
pub trait Reporter: Send {
    fn task_started(&mut self, _name: &str, _total: usize) {}
    fn task_progress(&mut self, _done: usize) {}
    fn task_finished(&mut self, _success: bool) {}
    /// Human-readable description of a command about to run (and the
    /// `# running <product>` labels between products).
    fn command_description(&mut self, _desc: &str) {}
    fn process_result(&mut self, _result: &ProcessResult) {}
}

/// Discards everything; useful for tests and redundant runs.
#[derive(Default)]
pub struct SilentReporter;

impl Reporter for SilentReporter {}

/// Prints to the console shell; with `MessageFormat::Json` the
/// per-operation results additionally stream as JSON lines on stdout.
pub struct ConsoleReporter {
    shell: Shell,
    format: MessageFormat,
    total: usize,
}

impl ConsoleReporter {
    pub fn new(shell: Shell, format: MessageFormat) -> ConsoleReporter {
        ConsoleReporter {
            shell,
            format,
            total: 0,
        }
    }
}

impl Reporter for ConsoleReporter {
    fn task_started(&mut self, name: &str, total: usize) {
        self.total = total;
        let _ = self.shell.status("Starting", format!("{} ({} operations)", name, total));
    }

    fn task_progress(&mut self, done: usize) {
        let _ = self
            .shell
            .verbose(format!("[{}/{}]", done, self.total));
    }

    fn task_finished(&mut self, success: bool) {
        if success {
            let _ = self.shell.status("Finished", "build succeeded");
        } else {
            let _ = self.shell.error("build failed");
        }
    }

    fn command_description(&mut self, desc: &str) {
        let _ = self.shell.note(desc);
    }

    fn process_result(&mut self, result: &ProcessResult) {
        if self.format == MessageFormat::Json {
            if let Ok(line) = serde_json::to_string(result) {
                println!("{}", line);
            }
        }
        if !result.success {
            let _ = self.shell.error(format!(
                "{} failed",
                result.program
            ));
            for line in result.stdout.iter().chain(&result.stderr) {
                let _ = self.shell.note(line);
            }
        }
    }
}
