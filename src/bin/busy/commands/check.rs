use clap::{ArgMatches, Command};

use busy::core::build::generate;
use busy::core::Shell;
use busy::ops;
use busy::util::BusyResult;

use crate::commands::{params_from, report_errors, session_args};

pub fn cli() -> Command {
    session_args(Command::new("check"))
        .about("Evaluate and plan the project without running anything")
}

pub fn exec(matches: &ArgMatches) -> BusyResult<i32> {
    let params = params_from(matches)?;
    let mut session = ops::parse_project(params)?;
    let list = if session.errors.has_errors() {
        None
    } else {
        Some(generate(&mut session)?)
    };
    if session.errors.has_errors() {
        report_errors(&session)?;
        return Ok(1);
    }
    let mut shell = Shell::new();
    if let Some(list) = list {
        shell.status(
            "Checked",
            format!(
                "{} products, {} operations",
                ops::list_targets(&session).len(),
                list.ops.len()
            ),
        )?;
    }
    Ok(0)
}
