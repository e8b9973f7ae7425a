use clap::{ArgMatches, Command};

use busy::ops;
use busy::util::BusyResult;

use crate::commands::{params_from, report_errors, session_args};

pub fn cli() -> Command {
    session_args(Command::new("targets")).about("List the products of the project")
}

pub fn exec(matches: &ArgMatches) -> BusyResult<i32> {
    let params = params_from(matches)?;
    let session = ops::parse_project(params)?;
    if session.errors.has_errors() {
        report_errors(&session)?;
        return Ok(1);
    }
    for target in ops::list_targets(&session) {
        println!(
            "{:<12} {}{}{}",
            format!("{:?}", target.kind).to_lowercase(),
            target.qualident,
            if target.exported { " !" } else { "" },
            if target.runnable { " (runnable)" } else { "" },
        );
    }
    Ok(0)
}
