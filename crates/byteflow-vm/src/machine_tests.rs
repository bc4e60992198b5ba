use super::machine::{run, Limits, Machine, RuntimeError};

#[test]
fn outputs_cell_values() {
    let out = run("+++.+.", b"").unwrap();
    assert_eq!(out.stdout, vec![3, 4]);
}

#[test]
fn ignores_non_instruction_bytes() {
    let out = run("++ hello . world", b"").unwrap();
    assert_eq!(out.stdout, vec![2]);
}

#[test]
fn cells_wrap_at_256() {
    let mut machine = Machine::new();
    machine.run("-", b"").unwrap();
    assert_eq!(machine.cell(0), 255);
    machine.run("+", b"").unwrap();
    assert_eq!(machine.cell(0), 0);
}

#[test]
fn input_reads_bytes_then_zero() {
    let out = run(",.,.,.", b"AB").unwrap();
    assert_eq!(out.stdout, vec![b'A', b'B', 0]);
}

#[test]
fn loops_multiply() {
    // 6 * 7 into cell 1.
    let mut machine = Machine::new();
    machine.run("++++++[->+++++++<]", b"").unwrap();
    assert_eq!(machine.cell(0), 0);
    assert_eq!(machine.cell(1), 42);
    assert_eq!(machine.pointer(), 0);
}

#[test]
fn unbalanced_open_bracket_is_rejected_before_running() {
    let err = run("+[", b"").unwrap_err();
    assert_eq!(err, RuntimeError::UnbalancedBracket(1));
}

#[test]
fn unbalanced_close_bracket_is_rejected_before_running() {
    let err = run("]", b"").unwrap_err();
    assert_eq!(err, RuntimeError::UnbalancedBracket(0));
}

#[test]
fn pointer_underflow_is_an_error() {
    let err = run("<", b"").unwrap_err();
    assert_eq!(err, RuntimeError::PointerUnderflow(0));
}

#[test]
fn runaway_loop_hits_the_step_limit() {
    let mut machine = Machine::with_limits(Limits::new().steps(1_000));
    let err = machine.run("+[]", b"").unwrap_err();
    assert_eq!(err, RuntimeError::StepLimitExceeded(1_000));
}

#[test]
fn tape_grows_to_the_right() {
    let mut machine = Machine::new();
    let program = ">".repeat(40_000) + "+";
    machine.run(&program, b"").unwrap();
    assert_eq!(machine.cell(40_000), 1);
    assert_eq!(machine.pointer(), 40_000);
}

#[test]
fn pointer_survives_across_runs() {
    let mut machine = Machine::new();
    machine.run(">>+", b"").unwrap();
    assert_eq!(machine.pointer(), 2);
    machine.run("<", b"").unwrap();
    assert_eq!(machine.pointer(), 1);
}
