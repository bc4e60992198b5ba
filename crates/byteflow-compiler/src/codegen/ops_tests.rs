//! Operator lowerings executed on the tape machine and checked against the
//! reference semantics, including the pointer contract and scratch hygiene.

use super::atoms::Emitter;
use super::ops::{binary, bit_not, bool_not, negate, BinOp};

/// Places `a` and `b` on the tape, runs the combining pattern, and returns
/// the result cell after asserting the pointer lands at cell 1 and every
/// scratch cell is zeroed again.
fn run_binary(op: BinOp, a: u8, b: u8) -> u8 {
    let mut e = Emitter::new(2);
    binary(&mut e, op, 0);

    let mut program = String::new();
    program.push_str(&"+".repeat(a as usize));
    program.push('>');
    program.push_str(&"+".repeat(b as usize));
    program.push('>');
    program.push_str(&e.into_code());

    let mut machine = byteflow_vm::Machine::new();
    machine.run(&program, b"").unwrap();
    assert_eq!(machine.pointer(), 1, "{op:?} {a} {b}: pointer");
    for cell in 1..=12 {
        assert_eq!(machine.cell(cell), 0, "{op:?} {a} {b}: scratch cell {cell}");
    }
    machine.cell(0)
}

fn reference(op: BinOp, a: u8, b: u8) -> u8 {
    match op {
        BinOp::Add => a.wrapping_add(b),
        BinOp::Sub => a.wrapping_sub(b),
        BinOp::Mul => a.wrapping_mul(b),
        BinOp::Div => a / b,
        BinOp::Mod => a % b,
        BinOp::Shl => {
            if b >= 8 {
                0
            } else {
                ((u32::from(a)) << b) as u8
            }
        }
        BinOp::Shr => {
            if b >= 8 {
                0
            } else {
                a >> b
            }
        }
        BinOp::Lt => u8::from(a < b),
        BinOp::Gt => u8::from(a > b),
        BinOp::Le => u8::from(a <= b),
        BinOp::Ge => u8::from(a >= b),
        BinOp::Eq => u8::from(a == b),
        BinOp::Ne => u8::from(a != b),
        BinOp::BitAnd => a & b,
        BinOp::BitOr => a | b,
        BinOp::BitXor => a ^ b,
        BinOp::And => u8::from(a != 0 && b != 0),
        BinOp::Or => u8::from(a != 0 || b != 0),
    }
}

const PAIRS: &[(u8, u8)] = &[
    (0, 0),
    (0, 1),
    (1, 0),
    (1, 1),
    (5, 3),
    (3, 5),
    (7, 7),
    (10, 3),
    (9, 3),
    (12, 4),
    (255, 1),
    (1, 255),
    (200, 100),
    (100, 200),
    (16, 16),
    (255, 255),
];

fn check(op: BinOp, skip_zero_divisor: bool) {
    for &(a, b) in PAIRS {
        if skip_zero_divisor && b == 0 {
            continue;
        }
        assert_eq!(
            run_binary(op, a, b),
            reference(op, a, b),
            "{op:?} of {a} and {b}"
        );
    }
}

#[test]
fn addition_and_subtraction_wrap() {
    check(BinOp::Add, false);
    check(BinOp::Sub, false);
}

#[test]
fn multiplication() {
    check(BinOp::Mul, false);
}

#[test]
fn division_and_remainder() {
    check(BinOp::Div, true);
    check(BinOp::Mod, true);
}

#[test]
fn shifts_double_and_halve() {
    for &(a, b) in &[(1u8, 3u8), (5, 2), (200, 1), (3, 0), (7, 8), (255, 4)] {
        assert_eq!(run_binary(BinOp::Shl, a, b), reference(BinOp::Shl, a, b));
        assert_eq!(run_binary(BinOp::Shr, a, b), reference(BinOp::Shr, a, b));
    }
}

#[test]
fn ordered_comparisons() {
    check(BinOp::Lt, false);
    check(BinOp::Gt, false);
    check(BinOp::Le, false);
    check(BinOp::Ge, false);
}

#[test]
fn equality_comparisons() {
    check(BinOp::Eq, false);
    check(BinOp::Ne, false);
}

#[test]
fn logical_connectives_yield_booleans() {
    check(BinOp::And, false);
    check(BinOp::Or, false);
}

#[test]
fn bitwise_operators() {
    check(BinOp::BitAnd, false);
    check(BinOp::BitOr, false);
    check(BinOp::BitXor, false);
}

fn run_unary(emit: fn(&mut Emitter, usize), a: u8) -> u8 {
    let mut e = Emitter::new(1);
    emit(&mut e, 0);
    assert_eq!(e.at(), 1);

    let mut program = String::new();
    program.push_str(&"+".repeat(a as usize));
    program.push('>');
    program.push_str(&e.into_code());

    let mut machine = byteflow_vm::Machine::new();
    machine.run(&program, b"").unwrap();
    assert_eq!(machine.pointer(), 1);
    for cell in 1..=4 {
        assert_eq!(machine.cell(cell), 0, "unary on {a}: scratch cell {cell}");
    }
    machine.cell(0)
}

#[test]
fn unary_patterns() {
    for a in [0u8, 1, 2, 7, 128, 255] {
        assert_eq!(run_unary(bool_not, a), u8::from(a == 0), "!{a}");
        assert_eq!(run_unary(bit_not, a), !a, "~{a}");
        assert_eq!(run_unary(negate, a), a.wrapping_neg(), "-{a}");
    }
}
