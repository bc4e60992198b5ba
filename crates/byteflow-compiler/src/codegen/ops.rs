//! Combining patterns for binary and unary operators.
//!
//! Every binary lowering has the same contract: the left operand sits at
//! `at`, the right at `at + 1`, the emitter enters at `at + 2`; the pattern
//! leaves the result at `at`, every scratch cell zeroed, and the emitter at
//! `at + 1`. Unary patterns enter at `at + 1` with the operand at `at` and
//! keep the same exit contract.
//!
//! `&&` and `||` are deliberately not short-circuited: both operand
//! emissions always run, so side effects in the right operand always happen.

use super::atoms::Emitter;

/// The repeated-subtraction division pattern for a divisor of at least 2
/// (its counter hand-off assumes the divisor outlives the first round, so
/// `/` and `%` on arbitrary runtime divisors use [`divide`] instead; this
/// serves the power-of-two paths, which always divide by 2). With dividend
/// at the current cell `n`, divisor at `n+1` and `n+2..n+5` zeroed, it
/// leaves `n` zeroed, `divisor - n%d` at `n+1`, `n % d` at `n+2` and
/// `n / d` at `n+3`, ending back at `n`. Cells `n+4` and `n+5` are read
/// (never written) and must be zero.
pub(crate) const DIVMOD: &str = "[->-[>+>>]>[+[-<+>]>+>>]<<<<<]";

/// Zeroes the four cells past the divisor that [`DIVMOD`] works over.
fn divmod_prep(code: &mut Emitter, n: usize) {
    for cell in n + 2..=n + 5 {
        code.goto(cell);
        code.clear();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Shl,
    Shr,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitOr,
    BitXor,
    And,
    Or,
}

/// Emits the combining pattern for `op` over cells `at` and `at + 1`.
pub fn binary(code: &mut Emitter, op: BinOp, at: usize) {
    debug_assert_eq!(code.at(), at + 2);
    match op {
        BinOp::Add => {
            code.drain(at + 1, &[(at, true)]);
        }
        BinOp::Sub => {
            code.drain(at + 1, &[(at, false)]);
        }
        BinOp::Mul => multiply(code, at),
        BinOp::Div => divide(code, at, true),
        BinOp::Mod => divide(code, at, false),
        BinOp::Shl => shift_left(code, at),
        BinOp::Shr => shift_right(code, at),
        BinOp::Eq => {
            equality(code, at);
            code.inc(1);
            code.drain(at + 1, &[(at, false)]);
        }
        BinOp::Ne => {
            equality(code, at);
            code.move_into(at + 1, at);
        }
        BinOp::Lt => less_than(code, at),
        BinOp::Gt => {
            swap_pair(code, at);
            less_than(code, at);
        }
        BinOp::Ge => {
            less_than(code, at);
            bool_not(code, at);
        }
        BinOp::Le => {
            swap_pair(code, at);
            less_than(code, at);
            bool_not(code, at);
        }
        BinOp::And => logical_and(code, at),
        BinOp::Or => logical_or(code, at),
        BinOp::BitAnd | BinOp::BitOr | BinOp::BitXor => bitwise(code, op, at),
    }
    debug_assert_eq!(code.at(), at + 1);
}

/// Boolean negation of the cell at `at` (any value, result 0/1).
/// Enter and exit at `at + 1`; `at + 1` is used as scratch.
pub fn bool_not(code: &mut Emitter, at: usize) {
    code.goto(at + 1);
    code.clear();
    code.goto(at);
    code.open();
    code.clear();
    code.goto(at + 1);
    code.inc(1);
    code.goto(at);
    code.close();
    code.inc(1);
    code.drain(at + 1, &[(at, false)]);
}

/// Bitwise complement of the cell at `at` (mod 256).
pub fn bit_not(code: &mut Emitter, at: usize) {
    code.goto(at + 1);
    code.clear();
    code.goto(at);
    code.inc(1);
    code.drain(at, &[(at + 1, false)]);
    code.move_into(at + 1, at);
    code.goto(at + 1);
}

/// Arithmetic negation of the cell at `at` (mod 256).
pub fn negate(code: &mut Emitter, at: usize) {
    code.goto(at + 1);
    code.clear();
    code.drain(at, &[(at + 1, false)]);
    code.move_into(at + 1, at);
    code.goto(at + 1);
}

fn multiply(code: &mut Emitter, at: usize) {
    let (l, r, acc, t) = (at, at + 1, at + 2, at + 3);
    code.goto(acc);
    code.clear();
    code.goto(t);
    code.clear();
    code.goto(l);
    code.open();
    code.dec(1);
    code.drain(r, &[(acc, true), (t, true)]);
    code.drain(t, &[(r, true)]);
    code.goto(l);
    code.close();
    code.move_into(acc, l);
    code.goto(r);
    code.clear();
}

/// Division by subtract-while-the-dividend-still-covers-the-divisor. Each
/// round compares working copies (the comparison drains its operands), so
/// the divisor cell survives until the final cleanup. Divisor zero never
/// leaves the loop, mirroring C's undefined division.
fn divide(code: &mut Emitter, at: usize, quotient: bool) {
    let (l, r, q, f) = (at, at + 1, at + 2, at + 3);
    code.goto(q);
    code.clear();
    covers_flag(code, l, r, f);
    code.goto(f);
    code.open();
    {
        code.copy(r, f + 1);
        code.drain(f + 1, &[(l, false)]);
        code.goto(q);
        code.inc(1);
        covers_flag(code, l, r, f);
        code.goto(f);
    }
    code.close();
    if quotient {
        code.goto(l);
        code.clear();
        code.move_into(q, l);
    } else {
        code.goto(q);
        code.clear();
    }
    code.goto(r);
    code.clear();
}

/// Leaves `(cell l) >= (cell r)` as 0/1 at `f`, preserving both inputs.
fn covers_flag(code: &mut Emitter, l: usize, r: usize, f: usize) {
    code.copy(l, f);
    code.copy(r, f + 1);
    less_than(code, f);
    bool_not(code, f);
}

/// Leaves `at` zeroed and a became-different flag at `at + 1`.
fn equality(code: &mut Emitter, at: usize) {
    code.drain(at + 1, &[(at, false)]);
    code.goto(at);
    code.open();
    code.clear();
    code.goto(at + 1);
    code.inc(1);
    code.goto(at);
    code.close();
}

/// Ordered comparison by draining both cells in lockstep. If the left cell
/// runs dry while the right still holds a value, the result is 1.
fn less_than(code: &mut Emitter, at: usize) {
    let (l, r, t0, t1, res) = (at, at + 1, at + 2, at + 3, at + 4);
    code.goto(t0);
    code.clear();
    code.goto(t1);
    code.clear();
    code.goto(res);
    code.clear();
    code.goto(r);
    code.open();
    {
        code.dec(1);
        code.move_into(l, t0);
        code.goto(t1);
        code.clear();
        code.inc(1);
        code.goto(t0);
        code.open();
        {
            code.dec(1);
            code.move_into(t0, l);
            code.goto(t1);
            code.dec(1);
            code.goto(t0);
        }
        code.close();
        code.goto(t1);
        code.open();
        {
            code.dec(1);
            code.goto(res);
            code.clear();
            code.inc(1);
            code.goto(r);
            code.clear();
            code.goto(t1);
        }
        code.close();
        code.goto(r);
    }
    code.close();
    code.goto(l);
    code.clear();
    code.move_into(res, l);
    code.goto(r);
}

/// Swaps the cells at `at` and `at + 1` through `at + 2`.
fn swap_pair(code: &mut Emitter, at: usize) {
    code.goto(at + 2);
    code.clear();
    code.move_into(at, at + 2);
    code.move_into(at + 1, at);
    code.move_into(at + 2, at + 1);
    code.goto(at + 2);
}

fn logical_and(code: &mut Emitter, at: usize) {
    let (l, r, t) = (at, at + 1, at + 2);
    code.goto(t);
    code.clear();
    code.goto(l);
    code.open();
    code.clear();
    code.goto(r);
    code.open();
    code.clear();
    code.goto(t);
    code.inc(1);
    code.goto(r);
    code.close();
    code.goto(l);
    code.close();
    code.goto(r);
    code.clear();
    code.move_into(t, l);
    code.goto(r);
}

fn logical_or(code: &mut Emitter, at: usize) {
    let (l, r, t) = (at, at + 1, at + 2);
    code.goto(t);
    code.clear();
    code.goto(l);
    code.open();
    code.clear();
    code.goto(t);
    code.clear();
    code.inc(1);
    code.goto(l);
    code.close();
    code.goto(r);
    code.open();
    code.clear();
    code.goto(t);
    code.clear();
    code.inc(1);
    code.goto(r);
    code.close();
    code.move_into(t, l);
    code.goto(r);
}

/// Left shift: double the left cell once per unit of the right cell.
fn shift_left(code: &mut Emitter, at: usize) {
    let t = at + 2;
    code.goto(t);
    code.clear();
    code.goto(at + 1);
    code.open();
    code.dec(1);
    code.drain(at, &[(t, true), (t, true)]);
    code.drain(t, &[(at, true)]);
    code.goto(at + 1);
    code.close();
}

/// Right shift: halve the left cell once per unit of the right cell.
fn shift_right(code: &mut Emitter, at: usize) {
    let (n, d, rem, quot) = (at + 2, at + 3, at + 4, at + 5);
    code.goto(n);
    code.clear();
    code.goto(at + 1);
    code.open();
    code.dec(1);
    code.move_into(at, n);
    code.goto(d);
    code.load(2);
    divmod_prep(code, n);
    code.goto(n);
    code.splice(DIVMOD, 0);
    code.move_into(quot, at);
    code.goto(d);
    code.clear();
    code.goto(rem);
    code.clear();
    code.goto(at + 1);
    code.close();
}

/// Bitwise and/or/xor by an unrolled 8-bit decompose-and-recombine: each
/// round splits one bit off both operands with a division by two and folds
/// the combined bit into the accumulator at its weight.
fn bitwise(code: &mut Emitter, op: BinOp, at: usize) {
    let (l, r, res, a, b) = (at, at + 1, at + 2, at + 3, at + 4);
    let (n, d, rem, quot, spare) = (at + 5, at + 6, at + 7, at + 8, at + 9);
    for cell in [res, a, b, n] {
        code.goto(cell);
        code.clear();
    }

    for bit in 0..8 {
        let weight = 1usize << bit;
        for (operand, target) in [(l, a), (r, b)] {
            code.move_into(operand, n);
            code.goto(d);
            code.load(2);
            divmod_prep(code, n);
            code.goto(n);
            code.splice(DIVMOD, 0);
            code.move_into(quot, operand);
            code.goto(d);
            code.clear();
            code.move_into(rem, target);
        }

        match op {
            BinOp::BitAnd => {
                code.goto(a);
                code.open();
                code.dec(1);
                code.goto(b);
                code.open();
                code.dec(1);
                code.goto(res);
                code.inc(weight);
                code.goto(b);
                code.close();
                code.goto(a);
                code.close();
                code.goto(b);
                code.clear();
            }
            BinOp::BitOr => {
                code.drain(b, &[(a, true)]);
                code.goto(a);
                code.open();
                code.clear();
                code.goto(res);
                code.inc(weight);
                code.goto(a);
                code.close();
            }
            BinOp::BitXor => {
                // b = 1 toggles the a bit through a one-cell scratch.
                code.goto(b);
                code.open();
                code.dec(1);
                code.goto(spare);
                code.clear();
                code.inc(1);
                code.goto(a);
                code.open();
                code.dec(1);
                code.goto(spare);
                code.dec(1);
                code.goto(a);
                code.close();
                code.move_into(spare, a);
                code.goto(b);
                code.close();
                code.goto(a);
                code.open();
                code.dec(1);
                code.goto(res);
                code.inc(weight);
                code.goto(a);
                code.close();
            }
            _ => unreachable!("not a bitwise operator"),
        }
    }

    code.move_into(res, l);
    code.goto(r);
}
