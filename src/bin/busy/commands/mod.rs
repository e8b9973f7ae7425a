use std::path::{Path, PathBuf};

use clap::{Arg, ArgAction, ArgMatches, Command};

use busy::core::session::{split_compiler_command, BuildParams};
use busy::syntax::params::parse_params;
use busy::util::BusyResult;

pub mod build;
pub mod check;
pub mod clean;
pub mod targets;

pub fn builtin() -> Vec<Command> {
    vec![build::cli(), check::cli(), clean::cli(), targets::cli()]
}

pub fn builtin_exec(cmd: &str) -> Option<fn(&ArgMatches) -> BusyResult<i32>> {
    match cmd {
        "build" => Some(build::exec),
        "check" => Some(check::exec),
        "clean" => Some(clean::exec),
        "targets" => Some(targets::exec),
        _ => None,
    }
}

/// Arguments every subcommand shares: the project directory plus the
/// session parameters.
pub fn session_args(cmd: Command) -> Command {
    cmd.arg(
        Arg::new("dir")
            .value_name("DIR")
            .help("Project directory containing the BUSY file")
            .default_value("."),
    )
    .arg(
        Arg::new("build-dir")
            .long("build-dir")
            .value_name("DIR")
            .help("Root build directory (default: <DIR>/build)"),
    )
    .arg(
        Arg::new("mode")
            .long("mode")
            .value_name("MODE")
            .help("Build mode: debug, optimized or nonoptimized"),
    )
    .arg(
        Arg::new("toolchain")
            .long("toolchain")
            .value_name("NAME")
            .help("Toolchain family: gcc, clang or msvc"),
    )
    .arg(
        Arg::new("compiler")
            .long("compiler")
            .value_name("PATH")
            .help("Full compiler command; install dir and prefix are derived from it"),
    )
    .arg(
        Arg::new("toolchain-dir")
            .long("toolchain-dir")
            .value_name("DIR")
            .help("Directory the toolchain binaries live in"),
    )
    .arg(
        Arg::new("toolchain-prefix")
            .long("toolchain-prefix")
            .value_name("PREFIX")
            .help("Binary name prefix, e.g. arm-none-eabi-"),
    )
    .arg(Arg::new("os").long("os").value_name("OS").help("Target operating system"))
    .arg(Arg::new("cpu").long("cpu").value_name("CPU").help("Target processor"))
    .arg(
        Arg::new("wordsize")
            .long("wordsize")
            .value_name("BITS")
            .help("Target word size: 16, 32, 64 or 128"),
    )
    .arg(
        Arg::new("param")
            .long("param")
            .value_name("DESIG[=VALUE]")
            .action(ArgAction::Append)
            .help("Field override in the parameter mini-language"),
    )
    .arg(
        Arg::new("target")
            .long("target")
            .value_name("NAME")
            .action(ArgAction::Append)
            .help("Product to build (default: every exported product)"),
    )
}

pub fn params_from(matches: &ArgMatches) -> BusyResult<BuildParams> {
    let dir = PathBuf::from(matches.get_one::<String>("dir").unwrap());
    let source_dir = normalize_project_dir(&dir);
    let build_dir = matches
        .get_one::<String>("build-dir")
        .map(PathBuf::from)
        .unwrap_or_else(|| source_dir.join("build"));

    let mut params = BuildParams::new(source_dir, build_dir);
    if let Some(mode) = matches.get_one::<String>("mode") {
        params.build_mode = mode.parse()?;
    }
    if let Some(tc) = matches.get_one::<String>("toolchain") {
        params.toolchain = tc.parse()?;
    }
    if let Some(os) = matches.get_one::<String>("os") {
        params.os = os.parse()?;
    }
    if let Some(cpu) = matches.get_one::<String>("cpu") {
        params.cpu = cpu.parse()?;
    }
    if let Some(bits) = matches.get_one::<String>("wordsize") {
        params.wordsize = bits.parse()?;
    }
    if let Some(compiler) = matches.get_one::<String>("compiler") {
        let (dir, prefix) = split_compiler_command(Path::new(compiler), params.toolchain);
        params.toolchain_dir = dir;
        params.toolchain_prefix = prefix;
    }
    if let Some(dir) = matches.get_one::<String>("toolchain-dir") {
        params.toolchain_dir = PathBuf::from(dir);
    }
    if let Some(prefix) = matches.get_one::<String>("toolchain-prefix") {
        params.toolchain_prefix = prefix.clone();
    }
    if let Some(values) = matches.get_many::<String>("param") {
        let joined = values.cloned().collect::<Vec<_>>().join(" ");
        params.params = parse_params(&joined)?;
    }
    if let Some(targets) = matches.get_many::<String>("target") {
        params.targets = targets.cloned().collect();
    }
    params.validate()?;
    Ok(params)
}

/// Accept either the project directory or the BUSY file itself.
fn normalize_project_dir(dir: &Path) -> PathBuf {
    if dir.is_file() {
        dir.parent().map(Path::to_path_buf).unwrap_or_default()
    } else {
        dir.to_path_buf()
    }
}

/// Print the accumulated evaluation errors through the shell.
pub fn report_errors(session: &busy::Session) -> BusyResult<()> {
    use busy::util::errors::Severity;
    let mut shell = busy::core::Shell::new();
    for item in session.errors.items() {
        match item.severity {
            Severity::Error => shell.error(item)?,
            Severity::Warning => shell.warn(item)?,
            _ => shell.note(item)?,
        }
    }
    Ok(())
}
