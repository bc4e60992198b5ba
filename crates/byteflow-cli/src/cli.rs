//! Command-line surface: shared argument builders and parameter structs.

use std::path::PathBuf;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};

pub fn build_cli() -> Command {
    Command::new("byteflow")
        .about("Compiles a C-like dialect to the Byteflow tape machine")
        .version(env!("CARGO_PKG_VERSION"))
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("build")
                .about("Compile a source file to tape-machine code")
                .arg(source_path_arg())
                .arg(output_arg())
                .arg(optimize_arg()),
        )
        .subcommand(
            Command::new("run")
                .about("Compile and execute a source file on the tape machine")
                .arg(source_path_arg())
                .arg(optimize_arg())
                .arg(input_arg()),
        )
        .subcommand(
            Command::new("check")
                .about("Compile and report diagnostics without emitting code")
                .arg(source_path_arg()),
        )
}

/// Source file to compile (positional).
fn source_path_arg() -> Arg {
    Arg::new("source")
        .value_name("SOURCE")
        .required(true)
        .value_parser(value_parser!(PathBuf))
        .help("Source file to compile")
}

/// Token-stream constant folding (-O/--optimize).
fn optimize_arg() -> Arg {
    Arg::new("optimize")
        .short('O')
        .long("optimize")
        .action(ArgAction::SetTrue)
        .help("Fold constants in the token stream")
}

/// Output path (-o/--output).
fn output_arg() -> Arg {
    Arg::new("output")
        .short('o')
        .long("output")
        .value_name("OUT")
        .value_parser(value_parser!(PathBuf))
        .help("Write the program here instead of stdout")
}

/// Bytes fed to the program's ',' instruction (--input).
fn input_arg() -> Arg {
    Arg::new("input")
        .long("input")
        .value_name("TEXT")
        .help("Program input (stdin is read when omitted)")
}

pub struct BuildParams {
    pub source: PathBuf,
    pub output: Option<PathBuf>,
    pub optimize: bool,
}

impl BuildParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            source: m.get_one::<PathBuf>("source").expect("required").clone(),
            output: m.get_one::<PathBuf>("output").cloned(),
            optimize: m.get_flag("optimize"),
        }
    }
}

pub struct RunParams {
    pub source: PathBuf,
    pub optimize: bool,
    pub input: Option<String>,
}

impl RunParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            source: m.get_one::<PathBuf>("source").expect("required").clone(),
            optimize: m.get_flag("optimize"),
            input: m.get_one::<String>("input").cloned(),
        }
    }
}

pub struct CheckParams {
    pub source: PathBuf,
}

impl CheckParams {
    pub fn from_matches(m: &ArgMatches) -> Self {
        Self {
            source: m.get_one::<PathBuf>("source").expect("required").clone(),
        }
    }
}
