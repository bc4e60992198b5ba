use crate::cli::BuildParams;

use super::{exit_with_error, print_warnings, read_source};

pub fn run(params: BuildParams) {
    let source = read_source(&params.source);

    let output = match byteflow_compiler::compile(&source, params.optimize) {
        Ok(output) => output,
        Err(e) => exit_with_error(&params.source, &source, &e),
    };
    print_warnings(&params.source, &source, &output.warnings);

    match &params.output {
        Some(path) => {
            if let Err(e) = std::fs::write(path, &output.program) {
                eprintln!("error: cannot write {}: {e}", path.display());
                std::process::exit(1);
            }
        }
        None => println!("{}", output.program),
    }
}
