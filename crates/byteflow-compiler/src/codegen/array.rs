//! Runtime array indexing and initializer unpacking.
//!
//! The machine has no addressable memory, so reaching cell `base + I` for a
//! runtime `I` is done by walking: the linear index is first turned into a
//! step count `N = distance - I` (where `distance` is the compile-time gap
//! between the evaluation cell and the array base), then a small caravan of
//! counter cells moves left one cell at a time. Two counters travel with the
//! pointer — steps remaining and steps taken — decremented and incremented
//! in lockstep, so the walk knows both when to stop and how to come back.
//! Cells the caravan passes through are displaced a fixed offset to the
//! right and restored one by one on the return walk, so the corridor is
//! byte-identical afterwards.
//!
//! The step count lives in one cell, so an array must sit within 255 cells
//! of the evaluation point; the expression compiler rejects programs that
//! exceed this.

use super::atoms::Emitter;

/// Left walk for a read: caravan of (remaining, taken, spare); each step
/// displaces the entered cell three to the right.
const WALK_LEFT: &str = "[<[->>>+<<<]>-[-<+>]>[-<+>]<+<]";

/// Return walk for a read: carries the element value while restoring every
/// displaced cell from three cells ahead.
const WALK_RIGHT: &str = "[>[->+<]<-[->+<]>>>[-<<<+>>>]<<]";

/// Left walk for a write: same caravan plus the value cell, displacing four
/// to the right.
const WALK_LEFT_W: &str = "[<[->>>>+<<<<]>-[-<+>]>[-<+>]<+>>[-<+>]<<<]";

/// Return walk for a write, restoring from four cells ahead. Its final step
/// "restores" the evaluation cell from the stashed copy of the assigned
/// value, which is exactly the expression result the contract wants there.
const WALK_RIGHT_W: &str = "[-[->+<]>>>>[-<<<<+>>>>]<<<]";

/// Reads the element at `base + index` where the index value sits at `at`.
///
/// Enter with the emitter at `at + 1`; exits at `at + 1` with the element
/// value at `at`. `distance` is `at - base`.
pub(crate) fn read_element(code: &mut Emitter, at: usize, distance: u8) {
    debug_assert_eq!(code.at(), at + 1);
    code.clear();
    code.inc(distance as usize);
    code.drain(at, &[(at + 1, false)]);
    code.move_into(at + 1, at);
    code.goto(at + 2);
    code.clear();
    code.goto(at);

    let mut walk = String::from(WALK_LEFT);
    walk.push_str(">>>[-<+<<+>>>]<<");
    walk.push_str(WALK_RIGHT);
    walk.push_str(">[-<<+>>]<");
    code.splice(&walk, 1);
}

/// Writes the value at `at + 1` into the element at `base + index`, where
/// the index value sits at `at`.
///
/// Enter with the emitter at `at + 2`; exits at `at + 1` with the assigned
/// value left at `at`. `distance` is `at - base`.
pub(crate) fn write_element(code: &mut Emitter, at: usize, distance: u8) {
    debug_assert_eq!(code.at(), at + 2);
    code.clear();
    code.goto(at + 3);
    code.clear();
    code.goto(at + 4);
    code.clear();
    code.drain(at + 1, &[(at + 2, true), (at + 4, true)]);
    code.inc(distance as usize);
    code.drain(at, &[(at + 1, false)]);
    code.move_into(at + 1, at);
    code.goto(at);

    let mut walk = String::from(WALK_LEFT_W);
    walk.push_str(">>>>[-]<<[-<<+>>]<");
    walk.push_str(WALK_RIGHT_W);
    code.splice(&walk, 1);
}

/// One element of a brace-or-string initializer before unpacking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InitItem {
    Value(u8),
    List(Vec<InitItem>),
}

/// Unpacks an initializer against the declared dimensions.
///
/// A flat list is zero-padded to the full size; a nested list is matched
/// dimension by dimension with each sub-list zero-padded to its own size.
/// Errors are returned as bare messages; the caller attaches the position.
pub fn unpack_literals(dims: &[u32], items: &[InitItem]) -> Result<Vec<u8>, String> {
    let total: usize = dims.iter().map(|&d| d as usize).product();

    if items.iter().all(|i| matches!(i, InitItem::Value(_))) {
        if items.len() > total {
            return Err(format!(
                "initializer has {} values but the array holds {total}",
                items.len()
            ));
        }
        let mut out: Vec<u8> = items
            .iter()
            .map(|i| match i {
                InitItem::Value(v) => *v,
                InitItem::List(_) => unreachable!(),
            })
            .collect();
        out.resize(total, 0);
        return Ok(out);
    }

    if dims.len() == 1 {
        return Err("braced list is nested deeper than the array dimensions".into());
    }
    if items.len() > dims[0] as usize {
        return Err(format!(
            "initializer has {} sub-lists but the outer dimension holds {}",
            items.len(),
            dims[0]
        ));
    }

    let mut out = Vec::with_capacity(total);
    for item in items {
        match item {
            InitItem::List(sub) => out.extend(unpack_literals(&dims[1..], sub)?),
            InitItem::Value(_) => {
                return Err("cannot mix scalars and braced lists in one initializer".into());
            }
        }
    }
    out.resize(total, 0);
    Ok(out)
}
