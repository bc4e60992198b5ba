//! Error behavior: both kinds are fatal, nothing is emitted, and the
//! messages name the offending construct.

use byteflow_compiler::{compile, Error};
use indoc::indoc;

fn semantic_error(source: &str) -> String {
    match compile(source, false) {
        Err(Error::Semantic(diag)) => diag.message,
        Err(Error::Syntax(diag)) => panic!("expected a semantic error, got syntax: {diag}"),
        Ok(_) => panic!("expected the program to be rejected"),
    }
}

fn syntax_error(source: &str) -> String {
    match compile(source, false) {
        Err(Error::Syntax(diag)) => diag.message,
        Err(Error::Semantic(diag)) => panic!("expected a syntax error, got semantic: {diag}"),
        Ok(_) => panic!("expected the program to be rejected"),
    }
}

#[test]
fn recursion_is_rejected() {
    let source = indoc! {"
        int f() {
            f();
            return 0;
        }

        int main() {
            f();
        }
    "};
    assert!(semantic_error(source).contains("no support for recursion"));
}

#[test]
fn mutual_recursion_is_rejected() {
    let source = indoc! {"
        int main() {
            f();
        }

        int f() {
            g();
            return 0;
        }

        int g() {
            f();
            return 0;
        }
    "};
    assert!(semantic_error(source).contains("no support for recursion"));
}

#[test]
fn too_few_indices_on_assignment() {
    let source = indoc! {"
        int main() {
            int a[2][3];
            a[1] = 5;
        }
    "};
    assert!(semantic_error(source).contains("only 1 dimension"));
}

#[test]
fn too_few_indices_on_read_beyond_one() {
    let source = indoc! {"
        int main() {
            int a[2][3][4];
            int x = a[1][2];
        }
    "};
    assert!(semantic_error(source).contains("2 dimension(s)"));
}

#[test]
fn too_many_indices() {
    let source = indoc! {"
        int main() {
            int a[2];
            int x = a[1][0];
        }
    "};
    assert!(semantic_error(source).contains("unexpected '['"));
}

#[test]
fn declaration_directly_inside_case() {
    let source = indoc! {"
        int main() {
            int x = 1;
            switch (x) {
                case 1: int y = 0; break;
            }
        }
    "};
    assert!(semantic_error(source).contains("inside a case"));
}

#[test]
fn duplicate_case_value() {
    let source = indoc! {r#"
        int main() {
            int x = 1;
            switch (x) {
                case 1: print("a"); break;
                case 'b': break;
                case 1: break;
            }
        }
    "#};
    assert!(semantic_error(source).contains("case 1 already exists"));
}

#[test]
fn duplicate_default_case() {
    let source = indoc! {r#"
        int main() {
            int x = 1;
            switch (x) {
                default: break;
                case 1: break;
                default: break;
            }
        }
    "#};
    assert!(semantic_error(source).contains("default case already exists"));
}

#[test]
fn break_outside_a_switch() {
    let source = indoc! {"
        int main() {
            while (1) {
                break;
            }
        }
    "};
    assert!(semantic_error(source).contains("break outside of a switch"));
}

#[test]
fn undeclared_identifier() {
    assert!(semantic_error("int main() { x = 1; }").contains("undefined"));
}

#[test]
fn duplicate_declaration_in_one_scope() {
    let source = indoc! {"
        int main() {
            int x = 1;
            int x = 2;
        }
    "};
    assert!(semantic_error(source).contains("already defined"));
}

#[test]
fn arity_mismatch_at_a_call_site() {
    let source = indoc! {"
        int add(int a, int b) {
            return a + b;
        }

        int main() {
            print_num(add(1));
        }
    "};
    assert!(semantic_error(source).contains("2 parameters"));
}

#[test]
fn unknown_function() {
    assert!(semantic_error("int main() { frob(); }").contains("undefined"));
}

#[test]
fn array_initializer_for_a_scalar() {
    let source = indoc! {"
        int main() {
            int x;
            x = {1, 2};
        }
    "};
    assert!(semantic_error(source).contains("non-array"));
}

#[test]
fn string_initializer_for_a_multi_dimensional_array() {
    let source = indoc! {r#"
        int main() {
            int a[2][2] = "hi";
        }
    "#};
    assert!(semantic_error(source).contains("one-dimensional"));
}

#[test]
fn return_must_be_terminal() {
    let source = indoc! {"
        int main() {
            return 1;
            print_num(2);
        }
    "};
    assert!(semantic_error(source).contains("last statement"));
}

#[test]
fn main_must_exist() {
    assert!(semantic_error("int f() { return 1; }").contains("'main' is undefined"));
}

#[test]
fn main_takes_no_parameters() {
    let source = indoc! {"
        int main(int argc) {
            return argc;
        }
    "};
    assert!(semantic_error(source).contains("0 parameters"));
}

#[test]
fn redefining_a_library_function() {
    let source = indoc! {"
        void print_num(int n) { }

        int main() { }
    "};
    assert!(semantic_error(source).contains("already defined"));
}

#[test]
fn array_argument_size_mismatch() {
    let source = indoc! {"
        int first(int a[3]) {
            return a[0];
        }

        int main() {
            int v[2] = {1, 2};
            print_num(first(v));
        }
    "};
    assert!(semantic_error(source).contains("cells"));
}

#[test]
fn missing_semicolon() {
    let source = indoc! {"
        int main() {
            int x = 1
        }
    "};
    assert!(syntax_error(source).contains("';'"));
}

#[test]
fn mismatched_braces() {
    assert!(syntax_error("int main() { if (1) { }").contains("unmatched"));
}

#[test]
fn bad_array_initializer_token() {
    let source = indoc! {"
        int main() {
            int a[2];
            a = 5;
        }
    "};
    // `a = 5;` writes the base cell; `a = x;` style stays legal, but an
    // initializer must be a brace list or string, so `a = {x};` is not.
    let err = compile(
        "int main() { int a[2]; int x = 1; a = {x}; }",
        false,
    )
    .unwrap_err();
    assert!(matches!(err, Error::Syntax(_)));
    // And plain scalar writes through the array name still compile.
    compile(source, false).unwrap();
}

#[test]
fn case_value_must_be_a_literal() {
    let source = indoc! {"
        int main() {
            int x = 1;
            switch (x) {
                case x: break;
            }
        }
    "};
    assert!(semantic_error(source).contains("not a literal"));
}

#[test]
fn errors_carry_positions() {
    let err = compile("int main() {\n    y = 1;\n}", false).unwrap_err();
    let diag = err.diagnostic();
    assert!(diag.message.contains("line 2"));
    assert!(diag.span.is_some());
}
