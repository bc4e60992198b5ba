//! Tape-machine interpreter for compiled Byteflow programs.
//!
//! Executes the eight-instruction alphabet `> < + - . , [ ]` over a tape of
//! wrapping 8-bit cells, unbounded to the right. Every other byte in a
//! program is ignored. Besides running programs for the CLI, the machine
//! exposes its final pointer position and tape so the compiler's test suite
//! can check pointer neutrality and memory layout directly.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

mod machine;

#[cfg(test)]
mod machine_tests;

pub use machine::{Limits, Machine, Output, RuntimeError, run};
