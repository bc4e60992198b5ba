//! Exact emission snapshots for the smallest programs: the calling
//! convention's entry/exit moves and the literal idioms are stable text.

use byteflow_compiler::compile;

#[test]
fn empty_main_enters_and_exits_its_frame() {
    let output = compile("int main() { }", false).unwrap();
    insta::assert_snapshot!(output.program, @"><");
}

#[test]
fn print_emits_clear_count_output_per_character() {
    let output = compile(r#"int main() { print("A"); }"#, false).unwrap();
    insta::assert_snapshot!(
        output.program,
        @">[-]+++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++++.[-]<"
    );
}

#[test]
fn global_initializers_run_before_main_and_rewind_after() {
    let output = compile("int x = 7; int main() { }", false).unwrap();
    insta::assert_snapshot!(output.program, @"[-]+++++++>><<");
}

#[test]
fn uninitialized_globals_are_skipped_not_written() {
    let output = compile("int a[3]; int main() { }", false).unwrap();
    insta::assert_snapshot!(output.program, @">>>><<<<");
}
