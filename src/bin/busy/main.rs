use clap::Command;

mod commands;

fn cli() -> Command {
    Command::new("busy")
        .version(busy::version())
        .about("BUSY, a declarative build system")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommands(commands::builtin())
}

fn main() {
    env_logger::init();

    let matches = cli().get_matches();
    let (name, sub) = matches.subcommand().expect("subcommand is required");
    let exec = commands::builtin_exec(name).expect("subcommand is registered");
    match exec(sub) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            let mut shell = busy::core::Shell::new();
            let _ = shell.error(format!("{:#}", e));
            std::process::exit(101);
        }
    }
}
