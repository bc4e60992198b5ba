use super::array::{read_element, unpack_literals, write_element, InitItem};
use super::atoms::Emitter;

fn values(items: &[u8]) -> Vec<InitItem> {
    items.iter().map(|&v| InitItem::Value(v)).collect()
}

#[test]
fn flat_lists_zero_pad() {
    let out = unpack_literals(&[5], &values(&[1, 2, 3])).unwrap();
    assert_eq!(out, vec![1, 2, 3, 0, 0]);
}

#[test]
fn nested_lists_pad_each_row() {
    let items = vec![
        InitItem::List(values(&[1, 2])),
        InitItem::List(values(&[3])),
    ];
    let out = unpack_literals(&[3, 3], &items).unwrap();
    assert_eq!(out, vec![1, 2, 0, 3, 0, 0, 0, 0, 0]);
}

#[test]
fn overlong_initializers_are_errors() {
    assert!(unpack_literals(&[2], &values(&[1, 2, 3])).is_err());
    let rows = vec![
        InitItem::List(values(&[1])),
        InitItem::List(values(&[2])),
        InitItem::List(values(&[3])),
    ];
    assert!(unpack_literals(&[2, 1], &rows).is_err());
}

#[test]
fn nesting_deeper_than_dimensions_is_an_error() {
    let items = vec![InitItem::List(values(&[1]))];
    assert!(unpack_literals(&[4], &items).is_err());
}

#[test]
fn mixing_scalars_and_lists_is_an_error() {
    let items = vec![InitItem::Value(1), InitItem::List(values(&[2]))];
    assert!(unpack_literals(&[2, 2], &items).is_err());
}

/// Tape: array {10, 20, 30, 40} at cells 0..4, a live variable at cell 4,
/// the index at cell 6 (so the walk corridor crosses live data).
fn setup(index: u8) -> String {
    let mut program = String::new();
    for v in [10u8, 20, 30, 40] {
        program.push_str(&"+".repeat(v as usize));
        program.push('>');
    }
    program.push_str(&"+".repeat(99)); // live neighbor
    program.push_str(">>");
    program.push_str(&"+".repeat(index as usize));
    program.push('>');
    program
}

#[test]
fn read_walks_fetch_without_disturbing_memory() {
    for index in 0u8..4 {
        let mut e = Emitter::new(7);
        read_element(&mut e, 6, 6);
        assert_eq!(e.at(), 7);

        let program = setup(index) + &e.into_code();
        let mut machine = byteflow_vm::Machine::new();
        machine.run(&program, b"").unwrap();

        let expected = [10, 20, 30, 40][index as usize];
        assert_eq!(machine.cell(6), expected, "arr[{index}]");
        assert_eq!(machine.pointer(), 7);
        for (cell, want) in [(0, 10), (1, 20), (2, 30), (3, 40), (4, 99), (5, 0)] {
            assert_eq!(machine.cell(cell), want, "cell {cell} after reading [{index}]");
        }
        for cell in 7..=12 {
            assert_eq!(machine.cell(cell), 0, "scratch {cell}");
        }
    }
}

#[test]
fn write_walks_store_and_leave_the_value() {
    for index in 0u8..4 {
        let mut e = Emitter::new(8);
        write_element(&mut e, 6, 6);
        assert_eq!(e.at(), 7);

        // Value 77 at cell 7, index at cell 6.
        let program = setup(index) + &"+".repeat(77) + ">" + &e.into_code();
        let mut machine = byteflow_vm::Machine::new();
        machine.run(&program, b"").unwrap();

        let mut expected = [10u8, 20, 30, 40];
        expected[index as usize] = 77;
        for (cell, want) in expected.iter().enumerate() {
            assert_eq!(machine.cell(cell), *want, "cell {cell} after writing [{index}]");
        }
        assert_eq!(machine.cell(4), 99);
        assert_eq!(machine.cell(6), 77, "assignment value survives as the result");
        assert_eq!(machine.pointer(), 7);
        for cell in 7..=12 {
            assert_eq!(machine.cell(cell), 0, "scratch {cell}");
        }
    }
}
