//! Per-function compilation: grammar, statement emission, calling convention.
//!
//! A `FunctionCompiler` is instantiated per call site from the retained
//! token range of the definition — a cheap cursor over the shared buffer —
//! so nested calls to the same callee never share parser state. Emission is
//! single-pass: statements parse and emit in source order, with sub-emitters
//! for the pieces a loop or branch has to splice more than once.
//!
//! Pointer discipline: at every statement boundary the emitter's cell equals
//! the innermost scope counter. Statements are pointer-neutral; expressions
//! advance by one and are discarded with a single retreat.

use crate::functions::{parse_var_decl, FunctionBody, FunctionDef, ReturnKind};
use crate::parser::{decode_string, Cursor, Token, TokenKind};
use crate::scope::{ScopeStack, VarDecl, VarKind, Variable};
use crate::{Error, Result};

use super::array::{self, InitItem};
use super::atoms::Emitter;
use super::expr::{Arg, CallExpr, Ctx, Expr, Target, UnaryOp};
use super::ops::BinOp;

pub struct FunctionCompiler {
    name: String,
    #[allow(dead_code)]
    returns: ReturnKind,
    params: Vec<VarDecl>,
    cursor: Cursor,
    env: ScopeStack,
    ret_cell: usize,
}

impl FunctionCompiler {
    /// Fresh compilation state for one call site. The definition must carry
    /// a token body; native bodies are spliced by the caller directly.
    pub fn instantiate(def: &FunctionDef, globals: &[Variable]) -> Self {
        let FunctionBody::Tokens { buffer, range } = &def.body else {
            unreachable!("native bodies are not instantiated");
        };
        let cursor = Cursor::new(buffer.clone(), range.start, range.end);

        let mut env = ScopeStack::new();
        env.push_frame();
        for g in globals {
            let inserted = env
                .insert(VarDecl {
                    name: g.name.clone(),
                    kind: g.kind,
                    dimensions: g.dimensions.clone(),
                })
                .expect("global names are unique");
            debug_assert_eq!(inserted.cell, g.cell);
        }

        Self {
            name: def.name.clone(),
            returns: def.returns,
            params: def.params.clone(),
            cursor,
            env,
            ret_cell: 0,
        }
    }

    /// Emits the function body for a frame starting at `at` (the
    /// return-value cell chosen by the caller). The returned code enters and
    /// exits with the pointer at `at`.
    pub fn emit_body(&mut self, ctx: &Ctx<'_>, at: usize) -> Result<String> {
        debug_assert!(self.env.counter() <= at);
        self.ret_cell = at;
        self.env.set_counter(at + 1);
        self.env.push_frame();
        for param in self.params.clone() {
            let name = param.name.clone();
            if self.env.insert(param).is_none() {
                return Err(Error::Semantic(crate::diagnostics::Diagnostic::error(
                    format!("parameter '{name}' of '{}' is already defined", self.name),
                    None,
                )));
            }
        }

        let mut code = Emitter::new(at);
        code.right(1);
        self.prescan_scope(&mut code)?;
        self.compile_scope_statements(ctx, &mut code)?;
        code.goto(at + 1);
        self.env.pop_frame();
        code.left(1);
        Ok(code.into_code())
    }

    // ----- scopes -----

    /// With the cursor at `{`: pre-declares every top-level `int` of the
    /// region (declarations in nested braces and `for` headers excluded),
    /// consumes the `{`, and advances the pointer past the new variables.
    /// Allocation on the tape is positional, so every local must have its
    /// cell fixed before any statement of the scope runs.
    fn prescan_scope(&mut self, code: &mut Emitter) -> Result<()> {
        self.cursor.expect_current(TokenKind::LBrace)?;
        let open = self.cursor.pos();
        let close = self.cursor.find_matching(open)?;
        self.cursor.advance(1);

        let mut i = open + 1;
        while i < close {
            let kind = self.cursor.token_at(i).expect("inside braces").kind;
            match kind {
                TokenKind::KwInt => {
                    let in_for_header = i >= 2
                        && self.cursor.token_at(i - 2).map(|t| t.kind) == Some(TokenKind::KwFor);
                    if !in_for_header {
                        let (decl, id, _) = parse_var_decl(&self.cursor, i)?;
                        self.insert_declared(decl, &id)?;
                    }
                }
                TokenKind::LBrace => {
                    i = self.cursor.find_matching(i)?;
                }
                _ => {}
            }
            i += 1;
        }

        code.goto(self.env.counter());
        Ok(())
    }

    fn insert_declared(&mut self, decl: VarDecl, id: &Token) -> Result<()> {
        let described = self.cursor.describe(id);
        if self.env.insert(decl).is_none() {
            return Err(self
                .cursor
                .semantic_error(format!("{described} is already defined"), Some(id)));
        }
        Ok(())
    }

    /// Compiles statements until the scope's closing `}` (consumed).
    fn compile_scope_statements(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        loop {
            match self.cursor.current().map(|t| t.kind) {
                None => {
                    return Err(self
                        .cursor
                        .syntax_error("expected '}' before the end of the code", None));
                }
                Some(TokenKind::RBrace) => {
                    self.cursor.advance(1);
                    return Ok(());
                }
                Some(_) => self.compile_statement(ctx, code, true)?,
            }
        }
    }

    fn compile_scope(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        self.env.push_frame();
        self.prescan_scope(code)?;
        self.compile_scope_statements(ctx, code)?;
        let size = self.env.frame_size();
        code.goto(code.at() - size);
        self.env.pop_frame();
        Ok(())
    }

    // ----- statements -----

    fn compile_statement(
        &mut self,
        ctx: &Ctx<'_>,
        code: &mut Emitter,
        allow_declaration: bool,
    ) -> Result<()> {
        debug_assert_eq!(code.at(), self.env.counter());
        let Some(token) = self.cursor.current().copied() else {
            return Err(self.cursor.syntax_error("expected a statement", None));
        };

        match token.kind {
            TokenKind::KwInt => {
                if !allow_declaration {
                    return Err(self.cursor.semantic_error(
                        format!(
                            "cannot declare {} directly inside a case; declare it inside a \
                             nested scope or outside the switch",
                            self.cursor
                                .peek(1)
                                .map(|t| self.cursor.describe(t))
                                .unwrap_or_else(|| "a variable".into())
                        ),
                        Some(&token),
                    ));
                }
                self.compile_variable_declaration(ctx, code)
            }
            TokenKind::Inc | TokenKind::Dec | TokenKind::DoubleStar => {
                self.compile_expression_statement(ctx, code)
            }
            TokenKind::Id => {
                let next = self
                    .cursor
                    .peek(1)
                    .copied()
                    .ok_or_else(|| self.cursor.syntax_error("unterminated statement", None))?;
                if next.kind == TokenKind::Assign
                    && matches!(
                        self.cursor.peek(2).map(|t| t.kind),
                        Some(TokenKind::LBrace) | Some(TokenKind::Str)
                    )
                {
                    return self.compile_bulk_assign_statement(code);
                }
                if next.kind.is_assign()
                    || matches!(
                        next.kind,
                        TokenKind::LBrack
                            | TokenKind::Inc
                            | TokenKind::Dec
                            | TokenKind::DoubleStar
                            | TokenKind::LParen
                    )
                {
                    return self.compile_expression_statement(ctx, code);
                }
                Err(self.cursor.syntax_error(
                    format!(
                        "unexpected {} after {}; expected an assignment, '++', '--', '**', \
                         indexing or a function call",
                        self.cursor.describe(&next),
                        self.cursor.describe(&token)
                    ),
                    Some(&next),
                ))
            }
            TokenKind::KwPrint => self.compile_print(code),
            TokenKind::KwIf => self.compile_if(ctx, code),
            TokenKind::LBrace => self.compile_scope(ctx, code),
            TokenKind::KwWhile => self.compile_while(ctx, code),
            TokenKind::KwDo => self.compile_do_while(ctx, code),
            TokenKind::KwSwitch => self.compile_switch(ctx, code),
            TokenKind::KwFor => self.compile_for(ctx, code),
            TokenKind::KwReturn => self.compile_return(ctx, code),
            TokenKind::KwBreak => Err(self.cursor.semantic_error(
                format!(
                    "break outside of a switch case is not supported at {}",
                    self.cursor.describe(&token)
                ),
                Some(&token),
            )),
            TokenKind::Semicolon => {
                self.cursor.advance(1);
                Ok(())
            }
            TokenKind::KwCase | TokenKind::KwDefault => Err(self.cursor.syntax_error(
                format!(
                    "{} is not inside a switch statement",
                    self.cursor.describe(&token)
                ),
                Some(&token),
            )),
            _ => Err(self.cursor.syntax_error(
                format!("invalid statement at {}", self.cursor.describe(&token)),
                Some(&token),
            )),
        }
    }

    /// Compiles one statement into its own emitter and returns the code.
    /// Used where a construct splices a piece more than once or gates it.
    fn statement_to_string(
        &mut self,
        ctx: &Ctx<'_>,
        at: usize,
        allow_declaration: bool,
    ) -> Result<String> {
        let mut child = Emitter::new(at);
        self.compile_statement(ctx, &mut child, allow_declaration)?;
        debug_assert_eq!(child.at(), at);
        Ok(child.into_code())
    }

    fn expr_to_string(&self, ctx: &Ctx<'_>, expr: &Expr, at: usize) -> Result<String> {
        let mut child = Emitter::new(at);
        expr.emit(ctx, &mut child)?;
        debug_assert_eq!(child.at(), at + 1);
        Ok(child.into_code())
    }

    fn compile_variable_declaration(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        // Allocation happened at scope entry; only an initializer emits.
        self.cursor.expect_at(1, TokenKind::Id)?;
        self.cursor.advance(1);
        let id = *self.cursor.current().expect("checked");

        match self.cursor.peek(1).map(|t| t.kind) {
            Some(TokenKind::Semicolon) => {
                self.cursor.advance(2);
                Ok(())
            }
            Some(TokenKind::Assign) => self.compile_expression_statement(ctx, code),
            Some(TokenKind::LBrack) => {
                self.cursor.advance(1);
                while self.cursor.current().map(|t| t.kind) == Some(TokenKind::LBrack) {
                    self.cursor.expect_seq(
                        0,
                        &[TokenKind::LBrack, TokenKind::Num, TokenKind::RBrack],
                    )?;
                    self.cursor.advance(3);
                }
                match self.cursor.current().map(|t| t.kind) {
                    Some(k) if k.is_assign() => {
                        self.compile_array_assignment(code, &id)?;
                        code.goto(self.env.counter());
                    }
                    _ => {}
                }
                self.cursor.expect_current(TokenKind::Semicolon)?;
                self.cursor.advance(1);
                Ok(())
            }
            _ => Err(self.cursor.unexpected("';', '=' or '[' after the declaration")),
        }
    }

    /// `id = { ... };` / `id = "...";` — the one lowering that relaxes the
    /// expression contract: literals stream into the array cells and the
    /// caller re-positions the pointer afterwards.
    fn compile_array_assignment(&mut self, code: &mut Emitter, id: &Token) -> Result<()> {
        let name = self.cursor.text(id).to_string();
        let described = self.cursor.describe(id);
        let var = self
            .env
            .resolve(&name)
            .cloned()
            .ok_or_else(|| {
                self.cursor
                    .semantic_error(format!("variable {described} is undefined"), Some(id))
            })?;
        if !var.is_array() {
            return Err(self.cursor.semantic_error(
                format!("trying to assign an array initializer to non-array variable {described}"),
                Some(id),
            ));
        }

        let assign = self
            .cursor
            .current()
            .copied()
            .ok_or_else(|| self.cursor.unexpected("'='"))?;
        if assign.kind != TokenKind::Assign {
            return Err(self.cursor.syntax_error(
                format!(
                    "expected '=' when assigning an array initializer instead of {}",
                    self.cursor.describe(&assign)
                ),
                Some(&assign),
            ));
        }
        if !matches!(
            self.cursor.peek(1).map(|t| t.kind),
            Some(TokenKind::LBrace) | Some(TokenKind::Str)
        ) {
            return Err(self.cursor.unexpected("'{' or a string literal after '='"));
        }
        self.cursor.advance(1);

        if self.cursor.current().map(|t| t.kind) == Some(TokenKind::Str)
            && var.dimensions.len() > 1
        {
            return Err(self.cursor.semantic_error(
                format!("string initializer requires a one-dimensional array, but {described} has {} dimensions", var.dimensions.len()),
                Some(id),
            ));
        }

        let items = parse_init_items(&mut self.cursor)?;
        let values = array::unpack_literals(&var.dimensions, &items)
            .map_err(|msg| self.cursor.semantic_error(format!("{msg} at {described}"), Some(id)))?;

        code.goto(var.cell);
        for v in values {
            code.clear();
            code.inc(v as usize);
            code.right(1);
        }
        Ok(())
    }

    fn compile_bulk_assign_statement(&mut self, code: &mut Emitter) -> Result<()> {
        let id = *self.cursor.current().expect("dispatched on Id");
        self.cursor.advance(1);
        self.compile_array_assignment(code, &id)?;
        code.goto(self.env.counter());
        self.cursor.expect_current(TokenKind::Semicolon)?;
        self.cursor.advance(1);
        Ok(())
    }

    fn compile_expression_statement(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        let expr = self.parse_expression(ctx)?;
        self.cursor.expect_current(TokenKind::Semicolon)?;
        self.cursor.advance(1);
        expr.emit(ctx, code)?;
        code.left(1);
        Ok(())
    }

    fn compile_print(&mut self, code: &mut Emitter) -> Result<()> {
        self.cursor.expect_seq(
            1,
            &[
                TokenKind::LParen,
                TokenKind::Str,
                TokenKind::RParen,
                TokenKind::Semicolon,
            ],
        )?;
        let tok = *self.cursor.peek(2).expect("checked");
        let bytes = decode_string(&tok, &self.cursor.buffer().source)?;
        self.cursor.advance(5);

        for b in bytes {
            code.clear();
            code.inc(b as usize);
            code.output();
        }
        code.clear();
        Ok(())
    }

    fn compile_if(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        self.cursor.expect_at(1, TokenKind::LParen)?;
        self.cursor.advance(2);
        let cond = self.parse_expression(ctx)?;
        self.cursor.expect_current(TokenKind::RParen)?;
        self.cursor.advance(1);

        let p = self.env.counter();
        self.env.reserve(2);
        let body = self.statement_to_string(ctx, p + 2, true)?;
        let else_body = if self.cursor.current().map(|t| t.kind) == Some(TokenKind::KwElse) {
            self.cursor.advance(1);
            Some(self.statement_to_string(ctx, p + 2, true)?)
        } else {
            None
        };
        self.env.release(2);

        cond.emit(ctx, code)?;
        if else_body.is_some() {
            // take-else flag
            code.clear();
            code.inc(1);
        }
        code.goto(p);
        code.open();
        code.goto(p + 1);
        if else_body.is_some() {
            code.dec(1);
        }
        code.goto(p + 2);
        code.splice(&body, 0);
        code.goto(p);
        code.clear();
        code.close();

        if let Some(else_body) = else_body {
            code.goto(p + 1);
            code.open();
            code.goto(p + 2);
            code.splice(&else_body, 0);
            code.goto(p + 1);
            code.dec(1);
            code.close();
            code.goto(p);
        }
        Ok(())
    }

    fn compile_while(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        self.cursor.expect_at(1, TokenKind::LParen)?;
        self.cursor.advance(2);
        let cond = self.parse_expression(ctx)?;
        self.cursor.expect_current(TokenKind::RParen)?;
        self.cursor.advance(1);

        let p = self.env.counter();
        let cond_code = self.expr_to_string(ctx, &cond, p)?;
        let body = self.statement_to_string(ctx, p, true)?;

        // The target re-checks a loop condition by re-emitting it.
        code.splice(&cond_code, 1);
        code.left(1);
        code.open();
        code.splice(&body, 0);
        code.splice(&cond_code, 1);
        code.left(1);
        code.close();
        Ok(())
    }

    fn compile_do_while(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        self.cursor.expect_current(TokenKind::KwDo)?;
        self.cursor.advance(1);

        let p = self.env.counter();
        let body = self.statement_to_string(ctx, p, true)?;

        self.cursor
            .expect_seq(0, &[TokenKind::KwWhile, TokenKind::LParen])?;
        self.cursor.advance(2);
        let cond = self.parse_expression(ctx)?;
        self.cursor
            .expect_seq(0, &[TokenKind::RParen, TokenKind::Semicolon])?;
        self.cursor.advance(2);
        let cond_code = self.expr_to_string(ctx, &cond, p)?;

        code.clear();
        code.inc(1);
        code.open();
        code.splice(&body, 0);
        code.splice(&cond_code, 1);
        code.left(1);
        code.close();
        Ok(())
    }

    fn compile_for(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        self.cursor
            .expect_seq(0, &[TokenKind::KwFor, TokenKind::LParen])?;
        self.cursor.advance(2);

        let p = self.env.counter();
        self.env.push_frame();
        let mut header_size = 0usize;

        if self.cursor.current().map(|t| t.kind) == Some(TokenKind::KwInt) {
            // The header declaration belongs to the loop's scope but sits
            // before its braces, so it is inserted by hand; the init
            // statement below re-parses and initializes it.
            let (decl, id, _) = parse_var_decl(&self.cursor, self.cursor.pos())?;
            header_size = decl.size();
            self.insert_declared(decl, &id)?;
            code.goto(self.env.counter());

            let mut unassigned = self.cursor.peek(2).map(|t| t.kind) != Some(TokenKind::Assign);
            if self.cursor.peek(2).map(|t| t.kind) == Some(TokenKind::LBrack) {
                unassigned = self.token_after_array_access(1)?.kind != TokenKind::Assign;
            }
            if unassigned {
                ctx.warnings.borrow_mut().warning(
                    format!(
                        "for-loop variable '{}' isn't assigned and may cause side effects",
                        self.cursor.text(&id)
                    ),
                    Some(id.span),
                );
            }
        }

        if self.cursor.current().map(|t| t.kind) == Some(TokenKind::LBrace) {
            return Err(self
                .cursor
                .unexpected("a statement (not a scope) in the for-loop header"));
        }
        self.compile_statement(ctx, code, true)?;

        let cond = self.parse_expression(ctx)?;
        self.cursor.expect_current(TokenKind::Semicolon)?;
        self.cursor.advance(1);
        let p2 = self.env.counter();
        let cond_code = self.expr_to_string(ctx, &cond, p2)?;

        let step_code = if self.cursor.current().map(|t| t.kind) == Some(TokenKind::RParen) {
            String::new()
        } else {
            let step = self.parse_expression(ctx)?;
            let mut s = self.expr_to_string(ctx, &step, p2)?;
            s.push('<');
            s
        };
        self.cursor.expect_current(TokenKind::RParen)?;
        self.cursor.advance(1);

        let body = if self.cursor.current().map(|t| t.kind) == Some(TokenKind::LBrace) {
            let mut child = Emitter::new(p2);
            child.goto(p2 - header_size);
            self.prescan_scope(&mut child)?;
            self.compile_scope_statements(ctx, &mut child)?;
            let size = self.env.frame_size();
            child.goto(child.at() - size);
            child.goto(p2);
            child.into_code()
        } else {
            self.statement_to_string(ctx, p2, true)?
        };
        self.env.pop_frame();

        code.splice(&cond_code, 1);
        code.left(1);
        code.open();
        code.splice(&body, 0);
        code.splice(&step_code, 0);
        code.splice(&cond_code, 1);
        code.left(1);
        code.close();
        code.goto(p);
        Ok(())
    }

    fn compile_switch(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        self.cursor
            .expect_seq(0, &[TokenKind::KwSwitch, TokenKind::LParen])?;
        self.cursor.advance(2);

        let p = self.env.counter();
        self.env.reserve(1);
        let cond = self.parse_expression(ctx)?;
        self.cursor
            .expect_seq(0, &[TokenKind::RParen, TokenKind::LBrace])?;
        self.cursor.advance(2);
        self.env.reserve(1);

        struct Case {
            key: Option<u8>,
            body: String,
            has_break: bool,
        }
        let mut cases: Vec<Case> = Vec::new();

        while matches!(
            self.cursor.current().map(|t| t.kind),
            Some(TokenKind::KwCase) | Some(TokenKind::KwDefault)
        ) {
            let key = if self.cursor.current().map(|t| t.kind) == Some(TokenKind::KwCase) {
                self.cursor.advance(1);
                let tok = self
                    .cursor
                    .current()
                    .copied()
                    .ok_or_else(|| self.cursor.unexpected("a literal case value"))?;
                if !tok.kind.is_literal() {
                    return Err(self.cursor.semantic_error(
                        format!(
                            "switch case value is not a literal at {}",
                            self.cursor.describe(&tok)
                        ),
                        Some(&tok),
                    ));
                }
                let value = (tok.value % 256) as u8;
                if cases.iter().any(|c| c.key == Some(value)) {
                    return Err(self.cursor.semantic_error(
                        format!("case {value} already exists at {}", self.cursor.describe(&tok)),
                        Some(&tok),
                    ));
                }
                self.cursor.advance(1);
                Some(value)
            } else {
                let tok = *self.cursor.current().expect("matched default");
                if cases.iter().any(|c| c.key.is_none()) {
                    return Err(self.cursor.semantic_error(
                        format!(
                            "default case already exists at {}",
                            self.cursor.describe(&tok)
                        ),
                        Some(&tok),
                    ));
                }
                self.cursor.advance(1);
                None
            };
            self.cursor.expect_current(TokenKind::Colon)?;
            self.cursor.advance(1);

            let mut body = String::new();
            while !matches!(
                self.cursor.current().map(|t| t.kind),
                None | Some(TokenKind::KwCase)
                    | Some(TokenKind::KwDefault)
                    | Some(TokenKind::RBrace)
                    | Some(TokenKind::KwBreak)
            ) {
                body.push_str(&self.statement_to_string(ctx, p + 2, false)?);
            }

            let mut has_break = false;
            if self.cursor.current().map(|t| t.kind) == Some(TokenKind::KwBreak) {
                self.cursor.expect_at(1, TokenKind::Semicolon)?;
                self.cursor.advance(2);
                has_break = true;
                // Unreachable statements still parse; their code is dropped.
                while !matches!(
                    self.cursor.current().map(|t| t.kind),
                    None | Some(TokenKind::KwCase)
                        | Some(TokenKind::KwDefault)
                        | Some(TokenKind::RBrace)
                ) {
                    let _ = self.statement_to_string(ctx, p + 2, false)?;
                }
            }
            cases.push(Case {
                key,
                body,
                has_break,
            });
        }

        self.cursor.expect_current(TokenKind::RBrace)?;
        self.cursor.advance(1);

        // A case's effective body is its own plus everything it falls
        // through into, up to and including the first break.
        let effective = |start: usize| -> String {
            let mut out = String::new();
            for case in &cases[start..] {
                out.push_str(&case.body);
                if case.has_break {
                    break;
                }
            }
            out
        };

        code.right(1);
        cond.emit(ctx, code)?;
        code.goto(p);
        code.clear();
        code.inc(1); // no case matched yet
        code.goto(p + 2);

        for (i, case) in cases.iter().enumerate() {
            let Some(key) = case.key else { continue };
            code.copy(p + 1, p + 2);
            code.goto(p + 2);
            code.dec(key as usize);
            code.open();
            code.clear();
            code.goto(p + 3);
            code.inc(1);
            code.goto(p + 2);
            code.close();
            code.inc(1);
            code.drain(p + 3, &[(p + 2, false)]);
            code.goto(p + 2);
            code.open();
            code.dec(1);
            code.goto(p);
            code.dec(1);
            code.goto(p + 2);
            code.splice(&effective(i), 0);
            code.close();
        }

        if let Some(default_at) = cases.iter().position(|c| c.key.is_none()) {
            code.goto(p);
            code.open();
            code.dec(1);
            code.goto(p + 2);
            code.splice(&effective(default_at), 0);
            code.goto(p);
            code.close();
        }

        code.goto(p + 1);
        code.clear();
        code.goto(p);
        code.clear();
        self.env.release(2);
        Ok(())
    }

    fn compile_return(&mut self, ctx: &Ctx<'_>, code: &mut Emitter) -> Result<()> {
        let ret_tok = *self.cursor.current().expect("dispatched on return");
        self.cursor.advance(1);

        let value = if self.cursor.current().map(|t| t.kind) == Some(TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression(ctx)?)
        };
        self.cursor.expect_current(TokenKind::Semicolon)?;
        self.cursor.advance(1);

        // The convention has no jump, so return only works as the last
        // statement of the function's own scope.
        if self.env.depth() != 2 || self.cursor.pos() != self.cursor.len() - 1 {
            return Err(self.cursor.semantic_error(
                format!(
                    "return must be the last statement of '{}' at {}",
                    self.name,
                    self.cursor.describe(&ret_tok)
                ),
                Some(&ret_tok),
            ));
        }

        if let Some(expr) = value {
            let p = self.env.counter();
            expr.emit(ctx, code)?;
            code.left(1);
            code.goto(self.ret_cell);
            code.clear();
            code.drain(p, &[(self.ret_cell, true)]);
        }
        Ok(())
    }

    // ----- expressions -----

    fn parse_expression(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        self.parse_assignment(ctx)
    }

    fn parse_assignment(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let is_id = self.cursor.current().map(|t| t.kind) == Some(TokenKind::Id);
        let next = self.cursor.peek(1).map(|t| t.kind);

        if is_id && next.is_some_and(TokenKind::is_assign) {
            if matches!(
                self.cursor.peek(2).map(|t| t.kind),
                Some(TokenKind::LBrace) | Some(TokenKind::Str)
            ) {
                let id = *self.cursor.current().expect("checked");
                let name = self.cursor.text(&id).to_string();
                let described = self.cursor.describe(&id);
                return Err(match self.env.resolve(&name) {
                    Some(var) if var.is_array() => self.cursor.semantic_error(
                        format!(
                            "array initializer for {described} is only allowed as a standalone \
                             statement"
                        ),
                        Some(&id),
                    ),
                    _ => self.cursor.semantic_error(
                        format!(
                            "trying to assign an array initializer to non-array variable \
                             {described}"
                        ),
                        Some(&id),
                    ),
                });
            }

            let id = *self.cursor.current().expect("checked");
            let cell = self.resolve_cell(&id)?;
            let op = next.expect("checked");
            self.cursor.advance(2);
            let rhs = self.parse_expression(ctx)?;
            let value = match compound_binop(op) {
                None => rhs,
                Some(binop) => Expr::Binary {
                    op: binop,
                    lhs: Box::new(Expr::Var { cell }),
                    rhs: Box::new(rhs),
                },
            };
            return Ok(Expr::Assign {
                cell,
                value: Box::new(value),
            });
        }

        if is_id
            && next == Some(TokenKind::LBrack)
            && self.token_after_array_access(0)?.kind.is_assign()
        {
            let (base, index, id) = self.parse_array_access(ctx, true)?;
            let assign = *self
                .cursor
                .current()
                .expect("lookahead saw the assignment");
            self.cursor.advance(1);
            let value = self.parse_expression(ctx)?;
            return Ok(Expr::ArraySet {
                base,
                index: Box::new(index),
                op: compound_binop(assign.kind),
                value: Box::new(value),
                span: id.span,
            });
        }

        self.parse_ternary(ctx)
    }

    fn parse_ternary(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let cond = self.parse_logical_or(ctx)?;
        if self.cursor.current().map(|t| t.kind) != Some(TokenKind::Question) {
            return Ok(cond);
        }
        self.cursor.advance(1);
        let then_branch = self.parse_expression(ctx)?;
        self.cursor.expect_current(TokenKind::Colon)?;
        self.cursor.advance(1);
        let else_branch = self.parse_ternary(ctx)?;
        Ok(Expr::Ternary {
            cond: Box::new(cond),
            then_branch: Box::new(then_branch),
            else_branch: Box::new(else_branch),
        })
    }

    fn parse_logical_or(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_logical_and(ctx)?;
        while self.cursor.current().map(|t| t.kind) == Some(TokenKind::OrOr) {
            self.cursor.advance(1);
            let rhs = self.parse_logical_and(ctx)?;
            node = Expr::Binary {
                op: BinOp::Or,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_logical_and(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_bitwise_or(ctx)?;
        while self.cursor.current().map(|t| t.kind) == Some(TokenKind::AndAnd) {
            self.cursor.advance(1);
            let rhs = self.parse_bitwise_or(ctx)?;
            node = Expr::Binary {
                op: BinOp::And,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_bitwise_or(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_bitwise_xor(ctx)?;
        while self.cursor.current().map(|t| t.kind) == Some(TokenKind::Pipe) {
            self.cursor.advance(1);
            let rhs = self.parse_bitwise_xor(ctx)?;
            node = Expr::Binary {
                op: BinOp::BitOr,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_bitwise_xor(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_bitwise_and(ctx)?;
        while self.cursor.current().map(|t| t.kind) == Some(TokenKind::Caret) {
            self.cursor.advance(1);
            let rhs = self.parse_bitwise_and(ctx)?;
            node = Expr::Binary {
                op: BinOp::BitXor,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    fn parse_bitwise_and(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_relational(ctx)?;
        while self.cursor.current().map(|t| t.kind) == Some(TokenKind::Amp) {
            self.cursor.advance(1);
            let rhs = self.parse_relational(ctx)?;
            node = Expr::Binary {
                op: BinOp::BitAnd,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
        Ok(node)
    }

    /// Relational operators do not chain: `a < b < c` is a syntax error
    /// downstream rather than silently comparing a boolean.
    fn parse_relational(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let lhs = self.parse_shift(ctx)?;
        let op = match self.cursor.current().map(|t| t.kind) {
            Some(TokenKind::EqEq) => BinOp::Eq,
            Some(TokenKind::Ne) => BinOp::Ne,
            Some(TokenKind::Lt) => BinOp::Lt,
            Some(TokenKind::Gt) => BinOp::Gt,
            Some(TokenKind::Le) => BinOp::Le,
            Some(TokenKind::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.cursor.advance(1);
        let rhs = self.parse_shift(ctx)?;
        Ok(Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        })
    }

    fn parse_shift(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_additive(ctx)?;
        loop {
            let op = match self.cursor.current().map(|t| t.kind) {
                Some(TokenKind::Shl) => BinOp::Shl,
                Some(TokenKind::Shr) => BinOp::Shr,
                _ => return Ok(node),
            };
            self.cursor.advance(1);
            let rhs = self.parse_additive(ctx)?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_additive(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_multiplicative(ctx)?;
        loop {
            let op = match self.cursor.current().map(|t| t.kind) {
                Some(TokenKind::Plus) => BinOp::Add,
                Some(TokenKind::Minus) => BinOp::Sub,
                _ => return Ok(node),
            };
            self.cursor.advance(1);
            let rhs = self.parse_multiplicative(ctx)?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_multiplicative(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let mut node = self.parse_unary_prefix(ctx)?;
        loop {
            let op = match self.cursor.current().map(|t| t.kind) {
                Some(TokenKind::Star) => BinOp::Mul,
                Some(TokenKind::Slash) => BinOp::Div,
                Some(TokenKind::Percent) => BinOp::Mod,
                _ => return Ok(node),
            };
            self.cursor.advance(1);
            let rhs = self.parse_unary_prefix(ctx)?;
            node = Expr::Binary {
                op,
                lhs: Box::new(node),
                rhs: Box::new(rhs),
            };
        }
    }

    fn parse_unary_prefix(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        match self.cursor.current().map(|t| t.kind) {
            Some(TokenKind::Bang) => {
                self.cursor.advance(1);
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(self.parse_unary_prefix(ctx)?),
                })
            }
            Some(TokenKind::Tilde) => {
                self.cursor.advance(1);
                Ok(Expr::Unary {
                    op: UnaryOp::BitNot,
                    operand: Box::new(self.parse_unary_prefix(ctx)?),
                })
            }
            Some(TokenKind::Plus) => {
                self.cursor.advance(1);
                self.parse_unary_prefix(ctx)
            }
            Some(TokenKind::Minus) => {
                self.cursor.advance(1);
                Ok(Expr::Unary {
                    op: UnaryOp::Neg,
                    operand: Box::new(self.parse_unary_prefix(ctx)?),
                })
            }
            Some(TokenKind::Inc) => {
                self.cursor.advance(1);
                let target = self.parse_modifiable(ctx)?;
                Ok(Expr::IncDec {
                    target,
                    delta: 1,
                    postfix: false,
                })
            }
            Some(TokenKind::Dec) => {
                self.cursor.advance(1);
                let target = self.parse_modifiable(ctx)?;
                Ok(Expr::IncDec {
                    target,
                    delta: -1,
                    postfix: false,
                })
            }
            Some(TokenKind::DoubleStar) => {
                self.cursor.advance(1);
                let target = self.parse_modifiable(ctx)?;
                Ok(Expr::Square {
                    target,
                    postfix: false,
                })
            }
            _ => self.parse_unary_postfix(ctx),
        }
    }

    fn parse_unary_postfix(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let lit = self.parse_literal(ctx)?;
        match self.cursor.current().map(|t| t.kind) {
            Some(TokenKind::Inc) => {
                self.cursor.advance(1);
                Ok(Expr::IncDec {
                    target: self.as_target(lit)?,
                    delta: 1,
                    postfix: true,
                })
            }
            Some(TokenKind::Dec) => {
                self.cursor.advance(1);
                Ok(Expr::IncDec {
                    target: self.as_target(lit)?,
                    delta: -1,
                    postfix: true,
                })
            }
            Some(TokenKind::DoubleStar) => {
                self.cursor.advance(1);
                Ok(Expr::Square {
                    target: self.as_target(lit)?,
                    postfix: true,
                })
            }
            _ => Ok(lit),
        }
    }

    fn parse_modifiable(&mut self, ctx: &Ctx<'_>) -> Result<Target> {
        let lit = self.parse_literal(ctx)?;
        self.as_target(lit)
    }

    fn as_target(&self, expr: Expr) -> Result<Target> {
        match expr {
            Expr::Var { cell } => Ok(Target::Scalar(cell)),
            Expr::ArrayGet { base, index, span } => Ok(Target::Element { base, index, span }),
            _ => Err(self.cursor.semantic_error(
                "'++', '--' and '**' require a variable or an array element",
                self.cursor.current(),
            )),
        }
    }

    fn parse_literal(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let Some(tok) = self.cursor.current().copied() else {
            return Err(self.cursor.unexpected("a literal"));
        };

        match tok.kind {
            TokenKind::Id if self.cursor.peek(1).map(|t| t.kind) == Some(TokenKind::LParen) => {
                self.parse_call(ctx)
            }
            TokenKind::Id if self.cursor.peek(1).map(|t| t.kind) == Some(TokenKind::LBrack) => {
                let (base, index, id) = self.parse_array_access(ctx, false)?;
                Ok(Expr::ArrayGet {
                    base,
                    index: Box::new(index),
                    span: id.span,
                })
            }
            TokenKind::Id => {
                let cell = self.resolve_cell(&tok)?;
                self.cursor.advance(1);
                Ok(Expr::Var { cell })
            }
            k if k.is_literal() => {
                self.cursor.advance(1);
                Ok(Expr::Literal((tok.value % 256) as u8))
            }
            TokenKind::LParen => {
                self.cursor.advance(1);
                let expr = self.parse_expression(ctx)?;
                self.cursor.expect_current(TokenKind::RParen)?;
                self.cursor.advance(1);
                Ok(expr)
            }
            _ => Err(self.cursor.unexpected(
                "a literal (number, character, identifier, true, false, function call or \
                 parenthesized expression)",
            )),
        }
    }

    fn parse_call(&mut self, ctx: &Ctx<'_>) -> Result<Expr> {
        let fn_tok = *self.cursor.expect_current(TokenKind::Id)?;
        let name = self.cursor.text(&fn_tok).to_string();
        let described = self.cursor.describe(&fn_tok);
        self.cursor.advance(1);

        if name == self.name {
            return Err(self.cursor.semantic_error(
                format!("no support for recursion in function call {described}"),
                Some(&fn_tok),
            ));
        }
        let Some(def) = ctx.functions.get(&name) else {
            return Err(self
                .cursor
                .semantic_error(format!("function {described} is undefined"), Some(&fn_tok)));
        };
        let params = def.params.clone();

        self.cursor.expect_current(TokenKind::LParen)?;
        self.cursor.advance(1);

        let mut args = Vec::new();
        loop {
            match self.cursor.current().map(|t| t.kind) {
                None => return Err(self.cursor.unexpected("')'")),
                Some(TokenKind::RParen) => break,
                Some(_) => {}
            }

            let want_array = params
                .get(args.len())
                .is_some_and(|p| p.kind == VarKind::Array);
            let array_var = self.peek_array_argument();
            match (want_array, array_var) {
                (true, Some(var)) => {
                    let param = &params[args.len()];
                    if param.size() != var.size() {
                        return Err(self.cursor.semantic_error(
                            format!(
                                "array argument '{}' has {} cells but parameter '{}' of \
                                 {described} has {}",
                                var.name,
                                var.size(),
                                param.name,
                                param.size()
                            ),
                            self.cursor.current(),
                        ));
                    }
                    args.push(Arg::Array {
                        base: var.cell,
                        size: var.size(),
                    });
                    self.cursor.advance(1);
                }
                _ => args.push(Arg::Value(self.parse_expression(ctx)?)),
            }

            match self.cursor.current().map(|t| t.kind) {
                Some(TokenKind::Comma) => self.cursor.advance(1),
                Some(TokenKind::RParen) => {}
                _ => return Err(self.cursor.unexpected("',' or ')'")),
            }
        }
        self.cursor.advance(1);

        if params.len() != args.len() {
            return Err(self.cursor.semantic_error(
                format!(
                    "function {described} has {} parameters (called it with {})",
                    params.len(),
                    args.len()
                ),
                Some(&fn_tok),
            ));
        }
        for (param, arg) in params.iter().zip(&args) {
            if param.kind == VarKind::Array && matches!(arg, Arg::Value(_)) {
                return Err(self.cursor.semantic_error(
                    format!(
                        "parameter '{}' of {described} is an array; pass an array variable of \
                         matching size",
                        param.name
                    ),
                    Some(&fn_tok),
                ));
            }
        }

        Ok(Expr::Call(CallExpr {
            name,
            args,
            span: fn_tok.span,
        }))
    }

    /// An argument that is a bare array identifier (followed by `,` or `)`).
    fn peek_array_argument(&self) -> Option<Variable> {
        let tok = self.cursor.current()?;
        if tok.kind != TokenKind::Id {
            return None;
        }
        if !matches!(
            self.cursor.peek(1).map(|t| t.kind),
            Some(TokenKind::Comma) | Some(TokenKind::RParen)
        ) {
            return None;
        }
        let var = self.env.resolve(self.cursor.text(tok))?;
        var.is_array().then(|| var.clone())
    }

    /// Multi-dimensional access linearizes at compile time: each index is
    /// scaled by the size of the dimensions after it, all as ordinary `+`
    /// and `*` nodes with literal multipliers. A single index into a
    /// multi-dimensional array is accepted as a flat offset when reading;
    /// writing requires the full index list.
    fn parse_array_access(&mut self, ctx: &Ctx<'_>, for_set: bool) -> Result<(usize, Expr, Token)> {
        let id = *self.cursor.expect_current(TokenKind::Id)?;
        let described = self.cursor.describe(&id);
        let var = self
            .env
            .resolve(self.cursor.text(&id))
            .cloned()
            .ok_or_else(|| {
                self.cursor
                    .semantic_error(format!("variable {described} is undefined"), Some(&id))
            })?;
        self.cursor.expect_at(1, TokenKind::LBrack)?;
        self.cursor.advance(2);

        let first = self.parse_expression(ctx)?;
        self.cursor.expect_current(TokenKind::RBrack)?;
        self.cursor.advance(1);

        let dims = &var.dimensions;
        let k = dims.len();
        let mut index = first.clone();

        if k > 1 {
            let inner: u64 = dims[1..].iter().map(|&d| u64::from(d)).product();
            index = scale(first.clone(), inner);

            let mut dimension = 1;
            while dimension < k {
                if self.cursor.current().map(|t| t.kind) != Some(TokenKind::LBrack) {
                    if dimension == 1 {
                        if for_set {
                            return Err(self.cursor.semantic_error(
                                format!(
                                    "{described} is a {k}-dimensional array, but only 1 \
                                     dimension given as index"
                                ),
                                Some(&id),
                            ));
                        }
                        // Pointer-like flat access through the outer index.
                        return Ok((var.cell, first, id));
                    }
                    return Err(self.cursor.semantic_error(
                        format!(
                            "{described} is a {k}-dimensional array, but only {dimension} \
                             dimension(s) given as index"
                        ),
                        Some(&id),
                    ));
                }
                self.cursor.advance(1);
                let exp = self.parse_expression(ctx)?;
                self.cursor.expect_current(TokenKind::RBrack)?;
                self.cursor.advance(1);

                let term = if dimension + 1 < k {
                    let rest: u64 = dims[dimension + 1..].iter().map(|&d| u64::from(d)).product();
                    scale(exp, rest)
                } else {
                    exp
                };
                index = Expr::Binary {
                    op: BinOp::Add,
                    lhs: Box::new(index),
                    rhs: Box::new(term),
                };
                dimension += 1;
            }
        }

        if self.cursor.current().map(|t| t.kind) == Some(TokenKind::LBrack) {
            return Err(self.cursor.semantic_error(
                format!("{described} is a {k}-dimensional array; unexpected '['"),
                self.cursor.current(),
            ));
        }
        Ok((var.cell, index, id))
    }

    /// In `id[a][b]... tok`, returns `tok`.
    fn token_after_array_access(&self, offset: usize) -> Result<Token> {
        let mut idx = self.cursor.pos() + offset;
        let id_ok = self.cursor.token_at(idx).map(|t| t.kind) == Some(TokenKind::Id)
            && self.cursor.token_at(idx + 1).map(|t| t.kind) == Some(TokenKind::LBrack);
        if !id_ok {
            return Err(self.cursor.unexpected("an array access"));
        }
        idx += 1;
        while self.cursor.token_at(idx).map(|t| t.kind) == Some(TokenKind::LBrack) {
            idx = self.cursor.find_matching(idx)? + 1;
        }
        self.cursor
            .token_at(idx)
            .copied()
            .ok_or_else(|| self.cursor.syntax_error("unterminated array access", None))
    }

    fn resolve_cell(&self, id: &Token) -> Result<usize> {
        self.env
            .resolve(self.cursor.text(id))
            .map(|v| v.cell)
            .ok_or_else(|| {
                self.cursor.semantic_error(
                    format!("variable {} is undefined", self.cursor.describe(id)),
                    Some(id),
                )
            })
    }
}

/// Multiplies an index expression by a compile-time dimension product
/// (reduced to cell width, like every runtime value).
fn scale(expr: Expr, factor: u64) -> Expr {
    Expr::Binary {
        op: BinOp::Mul,
        lhs: Box::new(expr),
        rhs: Box::new(Expr::Literal((factor % 256) as u8)),
    }
}

/// Maps a compound-assignment token to its underlying operator.
fn compound_binop(kind: TokenKind) -> Option<BinOp> {
    match kind {
        TokenKind::Assign => None,
        TokenKind::PlusAssign => Some(BinOp::Add),
        TokenKind::MinusAssign => Some(BinOp::Sub),
        TokenKind::StarAssign => Some(BinOp::Mul),
        TokenKind::SlashAssign => Some(BinOp::Div),
        TokenKind::PercentAssign => Some(BinOp::Mod),
        TokenKind::ShlAssign => Some(BinOp::Shl),
        TokenKind::ShrAssign => Some(BinOp::Shr),
        TokenKind::AmpAssign => Some(BinOp::BitAnd),
        TokenKind::PipeAssign => Some(BinOp::BitOr),
        TokenKind::CaretAssign => Some(BinOp::BitXor),
        _ => unreachable!("not an assignment token"),
    }
}

/// Parses `{ ... }` (possibly nested) or a string literal into init items.
pub(crate) fn parse_init_items(cursor: &mut Cursor) -> Result<Vec<InitItem>> {
    match cursor.current().map(|t| t.kind) {
        Some(TokenKind::Str) => {
            let tok = *cursor.current().expect("checked");
            let bytes = decode_string(&tok, &cursor.buffer().source)?;
            cursor.advance(1);
            Ok(bytes.into_iter().map(InitItem::Value).collect())
        }
        Some(TokenKind::LBrace) => parse_braced_items(cursor),
        _ => Err(cursor.unexpected("'{' or a string literal")),
    }
}

fn parse_braced_items(cursor: &mut Cursor) -> Result<Vec<InitItem>> {
    cursor.expect_current(TokenKind::LBrace)?;
    cursor.advance(1);

    let mut items = Vec::new();
    loop {
        match cursor.current().map(|t| t.kind) {
            Some(TokenKind::RBrace) => {
                cursor.advance(1);
                return Ok(items);
            }
            Some(TokenKind::LBrace) => items.push(InitItem::List(parse_braced_items(cursor)?)),
            Some(k) if k.is_literal() => {
                let tok = cursor.current().expect("checked");
                items.push(InitItem::Value((tok.value % 256) as u8));
                cursor.advance(1);
            }
            _ => return Err(cursor.unexpected("a literal, '{' or '}' in the initializer")),
        }
        match cursor.current().map(|t| t.kind) {
            Some(TokenKind::Comma) => cursor.advance(1),
            Some(TokenKind::RBrace) => {}
            _ => return Err(cursor.unexpected("',' or '}' in the initializer")),
        }
    }
}
