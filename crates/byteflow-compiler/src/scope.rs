//! Symbol environment: a stack of scope frames over the cell tape.
//!
//! Allocation on the target machine is positional, so each frame records the
//! absolute cell of every variable and a `next_cell` counter. The innermost
//! frame's counter *is* the data pointer the statement compiler works at.
//! Counters only ever grow while a frame is live; composite constructs may
//! temporarily inflate the innermost counter with [`ScopeStack::reserve`]
//! while they hold scratch cells.

use indexmap::IndexMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VarKind {
    Scalar,
    Array,
}

/// A parsed variable declaration, before a cell is assigned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarDecl {
    pub name: String,
    pub kind: VarKind,
    pub dimensions: Vec<u32>,
}

impl VarDecl {
    pub fn scalar(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Scalar,
            dimensions: vec![1],
        }
    }

    pub fn array(name: impl Into<String>, dimensions: Vec<u32>) -> Self {
        Self {
            name: name.into(),
            kind: VarKind::Array,
            dimensions,
        }
    }

    pub fn size(&self) -> usize {
        self.dimensions.iter().map(|&d| d as usize).product()
    }
}

/// A variable materialized in a scope, with its tape cell fixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variable {
    pub name: String,
    pub kind: VarKind,
    pub dimensions: Vec<u32>,
    pub cell: usize,
}

impl Variable {
    pub fn size(&self) -> usize {
        self.dimensions.iter().map(|&d| d as usize).product()
    }

    pub fn is_array(&self) -> bool {
        self.kind == VarKind::Array
    }
}

#[derive(Debug, Default)]
struct ScopeFrame {
    vars: IndexMap<String, Variable>,
    next_cell: usize,
}

impl ScopeFrame {
    fn var_size(&self) -> usize {
        self.vars.values().map(Variable::size).sum()
    }
}

/// Stack of scope frames; the last frame is innermost.
#[derive(Debug, Default)]
pub struct ScopeStack {
    frames: Vec<ScopeFrame>,
}

impl ScopeStack {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes a frame starting at the parent frame's counter.
    pub fn push_frame(&mut self) {
        let next_cell = self.frames.last().map_or(0, |f| f.next_cell);
        self.frames.push(ScopeFrame {
            vars: IndexMap::new(),
            next_cell,
        });
    }

    /// Pops the innermost frame; returns the total size of its variables.
    pub fn pop_frame(&mut self) -> usize {
        let frame = self.frames.pop().expect("scope stack underflow");
        frame.var_size()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// Allocates a variable in the innermost frame.
    ///
    /// Returns `None` if the name already exists in that frame (duplicates
    /// in one scope are forbidden; the caller owns the error message).
    pub fn insert(&mut self, decl: VarDecl) -> Option<&Variable> {
        let frame = self.frames.last_mut().expect("no scope frame");
        if frame.vars.contains_key(&decl.name) {
            return None;
        }
        let size = decl.size();
        let name = decl.name.clone();
        let var = Variable {
            name: decl.name,
            kind: decl.kind,
            dimensions: decl.dimensions,
            cell: frame.next_cell,
        };
        frame.next_cell += size;
        frame.vars.insert(name.clone(), var);
        frame.vars.get(&name)
    }

    /// Resolves a name, scanning frames innermost outward.
    pub fn resolve(&self, name: &str) -> Option<&Variable> {
        self.frames.iter().rev().find_map(|f| f.vars.get(name))
    }

    /// The innermost next-available-cell counter.
    pub fn counter(&self) -> usize {
        self.frames.last().expect("no scope frame").next_cell
    }

    /// Transiently inflates the counter for scratch cells.
    pub fn reserve(&mut self, n: usize) {
        self.frames.last_mut().expect("no scope frame").next_cell += n;
    }

    /// Releases cells taken by [`reserve`](Self::reserve).
    pub fn release(&mut self, n: usize) {
        let frame = self.frames.last_mut().expect("no scope frame");
        debug_assert!(frame.next_cell >= n);
        frame.next_cell -= n;
    }

    /// Jumps the counter forward (used when a function frame starts past the
    /// caller-chosen return-value cell).
    pub fn set_counter(&mut self, cell: usize) {
        let frame = self.frames.last_mut().expect("no scope frame");
        debug_assert!(cell >= frame.next_cell);
        frame.next_cell = cell;
    }

    /// Total size of the variables in the innermost frame.
    pub fn frame_size(&self) -> usize {
        self.frames.last().expect("no scope frame").var_size()
    }
}
