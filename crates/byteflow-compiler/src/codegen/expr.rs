//! The expression tree and its lowering.
//!
//! Every node obeys one contract: emission starts with the emitter at some
//! cell `at`, and ends with the produced value at `at` and the emitter at
//! `at + 1`, with every scratch cell above zeroed again. Statement-level
//! callers discard the value with a single retreat.

use std::cell::RefCell;

use crate::diagnostics::{Diagnostics, Span};
use crate::functions::{FunctionBody, FunctionTable};
use crate::scope::Variable;
use crate::{Error, Result};

use super::array;
use super::atoms::Emitter;
use super::function::FunctionCompiler;
use super::ops::{self, BinOp};

/// Shared, read-mostly state threaded through parsing and emission.
#[derive(Clone, Copy)]
pub struct Ctx<'a> {
    pub functions: &'a FunctionTable,
    pub globals: &'a [Variable],
    pub warnings: &'a RefCell<Diagnostics>,
    /// Names of the functions currently being emitted, outermost first.
    /// A callee already on the chain means recursion, which the target
    /// machine cannot express.
    pub call_chain: &'a RefCell<Vec<String>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Not,
    BitNot,
    Neg,
}

/// An lvalue an increment/decrement/square operator applies to.
#[derive(Debug, Clone)]
pub enum Target {
    Scalar(usize),
    Element {
        base: usize,
        index: Box<Expr>,
        span: Span,
    },
}

#[derive(Debug, Clone)]
pub enum Arg {
    Value(Expr),
    Array { base: usize, size: usize },
}

#[derive(Debug, Clone)]
pub struct CallExpr {
    pub name: String,
    pub args: Vec<Arg>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal(u8),
    Var {
        cell: usize,
    },
    Binary {
        op: BinOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Assign {
        cell: usize,
        value: Box<Expr>,
    },
    IncDec {
        target: Target,
        delta: i8,
        postfix: bool,
    },
    Square {
        target: Target,
        postfix: bool,
    },
    Ternary {
        cond: Box<Expr>,
        then_branch: Box<Expr>,
        else_branch: Box<Expr>,
    },
    ArrayGet {
        base: usize,
        index: Box<Expr>,
        span: Span,
    },
    ArraySet {
        base: usize,
        index: Box<Expr>,
        op: Option<BinOp>,
        value: Box<Expr>,
        span: Span,
    },
    Call(CallExpr),
}

impl Expr {
    pub fn emit(&self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        let at = code.at();
        match self {
            Expr::Literal(v) => {
                code.load(*v);
                code.right(1);
            }
            Expr::Var { cell } => {
                code.copy(*cell, at);
            }
            Expr::Binary { op, lhs, rhs } => {
                lhs.emit(ctx, code)?;
                rhs.emit(ctx, code)?;
                ops::binary(code, *op, at);
            }
            Expr::Unary { op, operand } => {
                operand.emit(ctx, code)?;
                match op {
                    UnaryOp::Not => ops::bool_not(code, at),
                    UnaryOp::BitNot => ops::bit_not(code, at),
                    UnaryOp::Neg => ops::negate(code, at),
                }
            }
            Expr::Assign { cell, value } => {
                value.emit(ctx, code)?;
                code.store(at, *cell);
            }
            Expr::IncDec {
                target,
                delta,
                postfix,
            } => self.emit_incdec(ctx, code, target, *delta, *postfix)?,
            Expr::Square { target, postfix } => {
                self.emit_square(ctx, code, target, *postfix)?;
            }
            Expr::Ternary {
                cond,
                then_branch,
                else_branch,
            } => {
                cond.emit(ctx, code)?;
                // Take-else flag; the condition moves out of the way so both
                // branches can build their value at the result cell.
                code.clear();
                code.inc(1);
                code.goto(at + 2);
                code.clear();
                code.drain(at, &[(at + 2, true)]);
                code.goto(at + 2);
                code.open();
                code.clear();
                code.goto(at + 1);
                code.dec(1);
                code.goto(at);
                then_branch.emit(ctx, code)?;
                code.goto(at + 2);
                code.close();
                code.goto(at + 1);
                code.open();
                code.dec(1);
                code.goto(at);
                else_branch.emit(ctx, code)?;
                code.close();
            }
            Expr::ArrayGet { base, index, span } => {
                index.emit(ctx, code)?;
                let distance = walk_distance(at, *base, *span)?;
                array::read_element(code, at, distance);
            }
            Expr::ArraySet {
                base,
                index,
                op,
                value,
                span,
            } => self.emit_array_set(ctx, code, *base, index, *op, value, *span)?,
            Expr::Call(call) => self.emit_call(ctx, code, call)?,
        }
        debug_assert_eq!(code.at(), at + 1);
        Ok(())
    }

    fn emit_incdec(
        &self,
        ctx: &Ctx<'_>,
        code: &mut Emitter,
        target: &Target,
        delta: i8,
        postfix: bool,
    ) -> Result<()> {
        let at = code.at();
        match target {
            Target::Scalar(cell) => {
                if postfix {
                    code.copy(*cell, at);
                    bump(code, *cell, delta);
                    code.goto(at + 1);
                } else {
                    bump(code, *cell, delta);
                    code.copy(*cell, at);
                }
            }
            Target::Element { base, index, span } => {
                // Index evaluated once; the element comes up, changes, and
                // goes back down through the walking primitive.
                index.emit(ctx, code)?;
                code.copy(at, at + 1);
                let distance = walk_distance(at + 1, *base, *span)?;
                array::read_element(code, at + 1, distance);
                bump(code, at + 1, delta);
                code.goto(at + 2);
                array::write_element(code, at, walk_distance(at, *base, *span)?);
                if postfix {
                    bump(code, at, -delta);
                    code.goto(at + 1);
                }
            }
        }
        Ok(())
    }

    fn emit_square(
        &self,
        ctx: &Ctx<'_>,
        code: &mut Emitter,
        target: &Target,
        postfix: bool,
    ) -> Result<()> {
        let at = code.at();
        match target {
            Target::Scalar(cell) => {
                if postfix {
                    code.copy(*cell, at);
                    code.copy(*cell, at + 1);
                    code.copy(at + 1, at + 2);
                    ops::binary(code, BinOp::Mul, at + 1);
                    code.goto(*cell);
                    code.clear();
                    code.drain(at + 1, &[(*cell, true)]);
                } else {
                    code.copy(*cell, at);
                    code.copy(at, at + 1);
                    ops::binary(code, BinOp::Mul, at);
                    code.store(at, *cell);
                }
            }
            Target::Element { base, index, span } => {
                index.emit(ctx, code)?;
                code.copy(at, at + 1);
                let distance = walk_distance(at + 1, *base, *span)?;
                array::read_element(code, at + 1, distance);
                if postfix {
                    code.copy(at + 1, at + 5);
                }
                code.copy(at + 1, at + 2);
                ops::binary(code, BinOp::Mul, at + 1);
                array::write_element(code, at, walk_distance(at, *base, *span)?);
                if postfix {
                    code.goto(at);
                    code.clear();
                    code.move_into(at + 5, at);
                    code.goto(at + 1);
                }
            }
        }
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_array_set(
        &self,
        ctx: &Ctx<'_>,
        code: &mut Emitter,
        base: usize,
        index: &Expr,
        op: Option<BinOp>,
        value: &Expr,
        span: Span,
    ) -> Result<()> {
        let at = code.at();
        match op {
            None => {
                index.emit(ctx, code)?;
                value.emit(ctx, code)?;
                array::write_element(code, at, walk_distance(at, base, span)?);
            }
            Some(op) => {
                index.emit(ctx, code)?;
                code.copy(at, at + 1);
                array::read_element(code, at + 1, walk_distance(at + 1, base, span)?);
                value.emit(ctx, code)?;
                ops::binary(code, op, at + 1);
                array::write_element(code, at, walk_distance(at, base, span)?);
            }
        }
        Ok(())
    }

    fn emit_call(&self, ctx: &Ctx<'_>, code: &mut Emitter, call: &CallExpr) -> Result<()> {
        let at = code.at();
        if ctx.call_chain.borrow().iter().any(|n| n == &call.name) {
            return Err(Error::Semantic(crate::diagnostics::Diagnostic::error(
                format!(
                    "no support for recursion in call to '{}' (it is already being compiled)",
                    call.name
                ),
                Some(call.span),
            )));
        }

        let def = ctx
            .functions
            .get(&call.name)
            .expect("call target resolved during parsing");

        // Caller lays out: zeroed return-value cell, then the actuals.
        code.clear();
        let mut cell = at + 1;
        for arg in &call.args {
            match arg {
                Arg::Value(e) => {
                    code.goto(cell);
                    e.emit(ctx, code)?;
                    cell += 1;
                }
                Arg::Array { base, size } => {
                    for j in 0..*size {
                        code.copy(base + j, cell + j);
                    }
                    cell += size;
                }
            }
        }
        code.goto(at);

        ctx.call_chain.borrow_mut().push(call.name.clone());
        let body = match &def.body {
            FunctionBody::Native(snippet) => (*snippet).to_string(),
            FunctionBody::Tokens { .. } => {
                let mut callee = FunctionCompiler::instantiate(def, ctx.globals);
                callee.emit_body(ctx, at)?
            }
        };
        ctx.call_chain.borrow_mut().pop();

        code.splice(&body, 0);
        code.right(1);
        Ok(())
    }
}

/// In-place increment or decrement of an absolute cell; restores nothing.
fn bump(code: &mut Emitter, cell: usize, delta: i8) {
    code.goto(cell);
    if delta >= 0 {
        code.inc(delta as usize);
    } else {
        code.dec((-delta) as usize);
    }
}

/// Compile-time gap between the evaluation cell and the array base. The walk
/// counter is one cell, so the gap must fit in it.
fn walk_distance(at: usize, base: usize, span: Span) -> Result<u8> {
    let d = at - base;
    u8::try_from(d).map_err(|_| {
        Error::Semantic(crate::diagnostics::Diagnostic::error(
            format!("array access spans {d} cells; the walk counter holds at most 255"),
            Some(span),
        ))
    })
}
