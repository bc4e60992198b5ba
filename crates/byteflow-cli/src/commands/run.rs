use std::io::{Read, Write};

use crate::cli::RunParams;

use super::{exit_with_error, print_warnings, read_source};

pub fn run(params: RunParams) {
    let source = read_source(&params.source);

    let output = match byteflow_compiler::compile(&source, params.optimize) {
        Ok(output) => output,
        Err(e) => exit_with_error(&params.source, &source, &e),
    };
    print_warnings(&params.source, &source, &output.warnings);

    let input = match params.input {
        Some(text) => text.into_bytes(),
        None => {
            let mut buf = Vec::new();
            if let Err(e) = std::io::stdin().read_to_end(&mut buf) {
                eprintln!("error: cannot read stdin: {e}");
                std::process::exit(1);
            }
            buf
        }
    };

    match byteflow_vm::run(&output.program, &input) {
        Ok(result) => {
            let mut stdout = std::io::stdout();
            stdout.write_all(&result.stdout).ok();
            stdout.flush().ok();
        }
        Err(e) => {
            eprintln!("runtime error: {e}");
            std::process::exit(1);
        }
    }
}
