use crate::cli::CheckParams;

use super::{exit_with_error, print_warnings, read_source};

pub fn run(params: CheckParams) {
    let source = read_source(&params.source);

    match byteflow_compiler::compile(&source, false) {
        Ok(output) => {
            // Silent on success, like cargo check.
            print_warnings(&params.source, &source, &output.warnings);
        }
        Err(e) => exit_with_error(&params.source, &source, &e),
    }
}
