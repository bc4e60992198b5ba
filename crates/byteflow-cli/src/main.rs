mod cli;
mod commands;

use cli::{build_cli, BuildParams, CheckParams, RunParams};

fn main() {
    let matches = build_cli().get_matches();

    match matches.subcommand() {
        Some(("build", m)) => commands::build::run(BuildParams::from_matches(m)),
        Some(("run", m)) => commands::run::run(RunParams::from_matches(m)),
        Some(("check", m)) => commands::check::run(CheckParams::from_matches(m)),
        _ => unreachable!("clap should have caught this"),
    }
}
