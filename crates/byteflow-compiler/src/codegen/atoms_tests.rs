use super::atoms::{brackets_balance, Emitter};

/// Runs emitted code on a machine with the given starting cells, pointer at
/// the cell after them.
fn run_with(cells: &[u8], code: &str) -> byteflow_vm::Machine {
    let mut program = String::new();
    for &c in cells {
        program.push_str(&"+".repeat(c as usize));
        program.push('>');
    }
    program.push_str(code);
    let mut machine = byteflow_vm::Machine::new();
    machine.run(&program, b"").unwrap();
    machine
}

#[test]
fn goto_tracks_the_pointer() {
    let mut e = Emitter::new(3);
    e.goto(1);
    e.goto(5);
    assert_eq!(e.at(), 5);
    assert_eq!(e.into_code(), "<<>>>>");
}

#[test]
fn load_zeroes_then_counts() {
    let mut e = Emitter::new(0);
    e.load(4);
    assert_eq!(e.into_code(), "[-]++++");
}

#[test]
fn drain_moves_and_subtracts() {
    let mut e = Emitter::new(3);
    e.drain(0, &[(1, true), (2, false)]);
    let machine = run_with(&[7, 1, 10], &e.into_code());
    assert_eq!(machine.cell(0), 0);
    assert_eq!(machine.cell(1), 8);
    assert_eq!(machine.cell(2), 3);
    assert_eq!(machine.pointer(), 0);
}

#[test]
fn copy_preserves_the_source() {
    let mut e = Emitter::new(2);
    e.copy(0, 2);
    let machine = run_with(&[9, 0], &e.into_code());
    assert_eq!(machine.cell(0), 9);
    assert_eq!(machine.cell(2), 9);
    assert_eq!(machine.cell(3), 0);
    assert_eq!(machine.pointer(), 3);
}

#[test]
fn copy_works_right_to_left() {
    // Value at cell 5 copied down to cell 1.
    let mut e = Emitter::new(6);
    e.copy(5, 1);
    let mut program = String::from(">>>>>+++++>");
    program.push_str(&e.into_code());
    let mut machine = byteflow_vm::Machine::new();
    machine.run(&program, b"").unwrap();
    assert_eq!(machine.cell(5), 5);
    assert_eq!(machine.cell(1), 5);
    assert_eq!(machine.pointer(), 2);
}

#[test]
fn store_keeps_the_value_and_writes_the_target() {
    // Value at cell 2, written back to cell 0, old target contents gone.
    let mut e = Emitter::new(3);
    e.store(2, 0);
    let machine = run_with(&[4, 0, 6], &e.into_code());
    assert_eq!(machine.cell(0), 6);
    assert_eq!(machine.cell(2), 6);
    assert_eq!(machine.cell(3), 0);
    assert_eq!(machine.pointer(), 3);
}

#[test]
fn splice_adjusts_the_tracked_position() {
    let mut e = Emitter::new(0);
    e.splice(">>", 2);
    assert_eq!(e.at(), 2);
    e.splice("<", -1);
    assert_eq!(e.at(), 1);
}

#[test]
fn bracket_checker() {
    assert!(brackets_balance("[[-]>[<]]"));
    assert!(!brackets_balance("[-"));
    assert!(!brackets_balance("]["));
}
