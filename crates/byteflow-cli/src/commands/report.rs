//! Diagnostic rendering shared by the commands.

use std::ops::Range;
use std::path::Path;

use annotate_snippets::{AnnotationKind, Group, Level, Renderer, Snippet};
use byteflow_compiler::{Diagnostics, Error, Severity, Span};

pub(crate) fn read_source(path: &Path) -> String {
    match std::fs::read_to_string(path) {
        Ok(source) => source,
        Err(e) => {
            eprintln!("error: cannot read {}: {e}", path.display());
            std::process::exit(1);
        }
    }
}

pub(crate) fn exit_with_error(path: &Path, source: &str, err: &Error) -> ! {
    let diag = err.diagnostic();
    match diag.span {
        Some(span) => {
            let kind = match err {
                Error::Syntax(_) => "syntax error",
                Error::Semantic(_) => "semantic error",
            };
            let title = format!("{kind}: {}", diag.message);
            eprint!("{}", render(path, source, Level::ERROR, &title, span));
        }
        None => eprintln!("error: {err}"),
    }
    std::process::exit(1);
}

pub(crate) fn print_warnings(path: &Path, source: &str, warnings: &Diagnostics) {
    for diag in warnings.iter() {
        let level = match diag.severity {
            Severity::Warning => Level::WARNING,
            Severity::Error => Level::ERROR,
        };
        match diag.span {
            Some(span) => eprint!("{}", render(path, source, level, &diag.message, span)),
            None => eprintln!("warning: {}", diag.message),
        }
    }
}

fn render(path: &Path, source: &str, level: Level<'_>, message: &str, span: Span) -> String {
    let path = path.display().to_string();
    let snippet = Snippet::source(source)
        .line_start(1)
        .path(&path)
        .annotation(
            AnnotationKind::Primary
                .span(clamp(span, source.len()))
                .label(message),
        );
    let report: Vec<Group> = vec![level.primary_title(message).element(snippet)];
    format!("{}\n", Renderer::styled().render(&report))
}

fn clamp(span: Span, limit: usize) -> Range<usize> {
    let range: Range<usize> = span.into();
    if range.start == range.end {
        return range.start..(range.start + 1).min(limit);
    }
    range
}
