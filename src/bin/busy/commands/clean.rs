use clap::{ArgMatches, Command};

use busy::core::Shell;
use busy::ops;
use busy::util::BusyResult;

use crate::commands::{params_from, report_errors, session_args};

pub fn cli() -> Command {
    session_args(Command::new("clean"))
        .about("Remove the artifacts a build of this project would produce")
}

pub fn exec(matches: &ArgMatches) -> BusyResult<i32> {
    let params = params_from(matches)?;
    let mut session = ops::parse_project(params)?;
    if session.errors.has_errors() {
        report_errors(&session)?;
        return Ok(1);
    }
    let removed = ops::clean_project(&mut session)?;
    let mut shell = Shell::new();
    shell.status("Cleaned", format!("{} files", removed))?;
    Ok(0)
}
