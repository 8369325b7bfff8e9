use std::process::ExitCode;

use clap::Parser;

mod commands;
mod printer;

use commands::Command;
use keeper_runtime::logging;

#[derive(Debug, Parser)]
#[command(
    name = "keeper",
    version,
    about = "Keep a file index in step with a directory tree",
    propagate_version = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

fn main() -> ExitCode {
    logging::init().ok();

    let cli = Cli::parse();
    match cli.command {
        Command::Watch(args) => commands::watch::run(args),
        Command::Scan(args) => commands::scan::run(args),
        Command::Info(args) => commands::info::run(args),
        Command::List(args) => commands::list::run(args),
        Command::History(args) => commands::history::run(args),
    }
}
