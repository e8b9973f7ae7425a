use clap::{Arg, ArgAction, ArgMatches, Command};

use busy::core::build::{
    BuildConfig, ConsoleReporter, DefaultExecutor, MessageFormat,
};
use busy::core::Shell;
use busy::ops;
use busy::util::{BusyResult, CancelToken};

use crate::commands::{params_from, report_errors, session_args};

pub fn cli() -> Command {
    session_args(Command::new("build"))
        .about("Evaluate the project and build the selected products")
        .arg(
            Arg::new("jobs")
                .short('j')
                .long("jobs")
                .value_name("N")
                .help("Number of parallel workers (default: available cores)"),
        )
        .arg(
            Arg::new("stop-on-error")
                .long("stop-on-error")
                .action(ArgAction::SetTrue)
                .help("Stop dispatching after the first failed operation"),
        )
        .arg(
            Arg::new("track-headers")
                .long("track-headers")
                .action(ArgAction::SetTrue)
                .help("Consult the header dependency snapshot for freshness"),
        )
        .arg(
            Arg::new("dry-run")
                .long("dry-run")
                .action(ArgAction::SetTrue)
                .help("Print the due commands without running them"),
        )
        .arg(
            Arg::new("message-format")
                .long("message-format")
                .value_name("FMT")
                .help("Result stream format: human or json"),
        )
}

pub fn exec(matches: &ArgMatches) -> BusyResult<i32> {
    let params = params_from(matches)?;
    let jobs = matches
        .get_one::<String>("jobs")
        .map(|j| j.parse::<u32>())
        .transpose()?;
    let mut config = BuildConfig::new(jobs)?;
    config.stop_on_error = matches.get_flag("stop-on-error");
    config.track_headers = matches.get_flag("track-headers");
    config.dry_run = matches.get_flag("dry-run");
    config.message_format = match matches.get_one::<String>("message-format").map(|s| s.as_str()) {
        Some("json") => MessageFormat::Json,
        Some("human") | None => MessageFormat::Human,
        Some(other) => anyhow::bail!("unknown message format `{}`", other),
    };

    let mut session = ops::parse_project(params)?;
    if session.errors.has_errors() {
        report_errors(&session)?;
        return Ok(1);
    }

    let mut reporter = ConsoleReporter::new(Shell::new(), config.message_format);
    let ok = ops::build_project(
        &mut session,
        &config,
        None,
        &mut reporter,
        &DefaultExecutor,
        &CancelToken::new(),
    )?;
    if session.errors.has_errors() {
        report_errors(&session)?;
    }
    Ok(if ok { 0 } else { 1 })
}
