//! Top-level driver: global definitions, `main`, and the final rewind.

use std::cell::RefCell;

use crate::codegen::array;
use crate::codegen::atoms::Emitter;
use crate::codegen::{parse_init_items, Ctx, FunctionCompiler};
use crate::diagnostics::{Diagnostic, Diagnostics};
use crate::functions::{parse_var_decl, FunctionDef, FunctionTable};
use crate::library;
use crate::optimizer;
use crate::parser::{lex, Cursor, TokenBuffer, TokenKind};
use crate::scope::Variable;
use crate::{Error, Result};

/// A successful compilation: the program text plus non-fatal warnings.
#[derive(Debug)]
pub struct Output {
    pub program: String,
    pub warnings: Diagnostics,
}

/// Compiles a source file to target text.
///
/// Compilation is deterministic: the same source and flag produce
/// byte-identical output. On error nothing is produced.
pub fn compile(source: &str, optimize: bool) -> Result<Output> {
    Compiler::new(source, optimize)?.compile()
}

pub struct Compiler {
    cursor: Cursor,
    functions: FunctionTable,
    globals: Vec<Variable>,
    warnings: RefCell<Diagnostics>,
}

impl Compiler {
    pub fn new(source: &str, optimize: bool) -> Result<Self> {
        let tokens = lex(source)?;
        let tokens = if optimize {
            optimizer::optimize(tokens)
        } else {
            tokens
        };
        let buffer = TokenBuffer::with_tokens(source.to_string(), tokens);
        Ok(Self {
            cursor: Cursor::whole(buffer),
            functions: FunctionTable::new(),
            globals: Vec::new(),
            warnings: RefCell::new(Diagnostics::new()),
        })
    }

    pub fn compile(mut self) -> Result<Output> {
        library::install(&mut self.functions)?;

        let mut code = Emitter::new(0);
        self.process_global_definitions(&mut code)?;

        let main = self.functions.get("main").ok_or_else(|| {
            Error::Semantic(Diagnostic::error("function 'main' is undefined", None))
        })?;
        if !main.params.is_empty() {
            return Err(Error::Semantic(Diagnostic::error(
                format!(
                    "function 'main' has {} parameters (called it with 0 parameters)",
                    main.params.len()
                ),
                None,
            )));
        }

        let globals_size: usize = self.globals.iter().map(Variable::size).sum();
        debug_assert_eq!(code.at(), globals_size);

        let call_chain = RefCell::new(vec!["main".to_string()]);
        let ctx = Ctx {
            functions: &self.functions,
            globals: &self.globals,
            warnings: &self.warnings,
            call_chain: &call_chain,
        };
        let mut entry = FunctionCompiler::instantiate(main, &self.globals);
        let body = entry.emit_body(&ctx, globals_size)?;
        code.splice(&body, 0);
        code.goto(0); // rewind to the origin cell

        Ok(Output {
            program: code.into_code(),
            warnings: self.warnings.into_inner(),
        })
    }

    /// Registers every function and compiles global-variable initializers in
    /// declaration order, leaving the pointer just past the globals.
    fn process_global_definitions(&mut self, code: &mut Emitter) -> Result<()> {
        while let Some(token) = self.cursor.current().copied() {
            match token.kind {
                TokenKind::Semicolon => {
                    self.cursor.advance(1);
                }
                TokenKind::KwVoid | TokenKind::KwInt => {
                    self.cursor.expect_at(1, TokenKind::Id)?;
                    match self.cursor.peek(2).map(|t| t.kind) {
                        Some(TokenKind::LParen) => {
                            let def = FunctionDef::parse(&mut self.cursor)?;
                            self.functions.insert(def)?;
                        }
                        Some(TokenKind::Semicolon)
                        | Some(TokenKind::Assign)
                        | Some(TokenKind::LBrack)
                            if token.kind == TokenKind::KwInt =>
                        {
                            self.compile_global_variable(code)?;
                        }
                        _ => {
                            let next = self.cursor.peek(2);
                            return Err(self.cursor.syntax_error(
                                format!(
                                    "unexpected {} after {}; expected '(' (function definition) \
                                     or one of '=', ';', '[' (variable definition)",
                                    next.map(|t| self.cursor.describe(t))
                                        .unwrap_or_else(|| "end of code".into()),
                                    self.cursor
                                        .peek(1)
                                        .map(|t| self.cursor.describe(t))
                                        .unwrap_or_else(|| "end of code".into()),
                                ),
                                next,
                            ));
                        }
                    }
                }
                _ => break,
            }
        }

        if let Some(token) = self.cursor.current() {
            return Err(self.cursor.syntax_error(
                format!(
                    "did not reach the end of the code; unexpected {}",
                    self.cursor.describe(token)
                ),
                Some(token),
            ));
        }
        Ok(())
    }

    fn compile_global_variable(&mut self, code: &mut Emitter) -> Result<()> {
        let (decl, id, next) = parse_var_decl(&self.cursor, self.cursor.pos())?;
        let described = self.cursor.describe(&id);
        self.cursor.jump_to(next);

        if self.globals.iter().any(|g| g.name == decl.name) {
            return Err(self
                .cursor
                .semantic_error(format!("{described} is already defined"), Some(&id)));
        }
        let cell = self.globals.iter().map(Variable::size).sum();
        let var = Variable {
            name: decl.name.clone(),
            kind: decl.kind,
            dimensions: decl.dimensions.clone(),
            cell,
        };
        let size = var.size();

        if var.is_array() {
            match self.cursor.current().map(|t| t.kind) {
                Some(TokenKind::Semicolon) => {
                    self.cursor.advance(1);
                    code.right(size);
                }
                Some(TokenKind::Assign) => {
                    self.cursor.advance(1);
                    if self.cursor.current().map(|t| t.kind) == Some(TokenKind::Str)
                        && var.dimensions.len() > 1
                    {
                        return Err(self.cursor.semantic_error(
                            format!(
                                "string initializer requires a one-dimensional array, but \
                                 {described} has {} dimensions",
                                var.dimensions.len()
                            ),
                            Some(&id),
                        ));
                    }
                    let items = parse_init_items(&mut self.cursor)?;
                    let values =
                        array::unpack_literals(&var.dimensions, &items).map_err(|msg| {
                            self.cursor
                                .semantic_error(format!("{msg} at {described}"), Some(&id))
                        })?;
                    for v in values {
                        code.clear();
                        code.inc(v as usize);
                        code.right(1);
                    }
                    self.cursor.expect_current(TokenKind::Semicolon)?;
                    self.cursor.advance(1);
                }
                _ => {
                    return Err(self
                        .cursor
                        .unexpected("';' or '=' in the array definition"));
                }
            }
        } else {
            match self.cursor.current().map(|t| t.kind) {
                Some(TokenKind::Semicolon) => {
                    self.cursor.advance(1);
                    code.right(1);
                }
                Some(TokenKind::Assign) => {
                    self.cursor.advance(1);
                    let lit = self
                        .cursor
                        .current()
                        .copied()
                        .ok_or_else(|| self.cursor.unexpected("a literal"))?;
                    if !lit.kind.is_literal() {
                        return Err(self.cursor.semantic_error(
                            format!(
                                "unexpected {}; expected a literal (number, character, true or \
                                 false)",
                                self.cursor.describe(&lit)
                            ),
                            Some(&lit),
                        ));
                    }
                    code.clear();
                    code.inc((lit.value % 256) as usize);
                    code.right(1);
                    self.cursor.expect_at(1, TokenKind::Semicolon)?;
                    self.cursor.advance(2);
                }
                _ => {
                    return Err(self.cursor.unexpected(
                        "';' or '=' when initializing a global variable",
                    ));
                }
            }
        }

        self.globals.push(var);
        Ok(())
    }
}
