//! # eevee
//!
//! A tree-walking interpreter for a small imperative scripting language.
//! Source text is scanned into tokens, parsed by recursive descent into a
//! syntax tree, and evaluated directly against a chain of scopes.
//!
//! ```
//! use eevee::Eevee;
//!
//! let mut session = Eevee::with_output(Vec::new());
//! session.run("let x = 1; x = x + 1; print x;");
//! assert!(!session.had_error());
//! assert_eq!(session.output(), b"2\n");
//! ```

pub mod ast;
pub mod environment;
pub mod errors;
pub mod interpreter;
pub mod parser;
pub mod printer;
pub mod scanner;
pub mod value;

use std::io::{self, Write};

use colored::*;

pub use crate::errors::{Diagnostic, Diagnostics, ErrorKind};
pub use crate::interpreter::Interpreter;
pub use crate::value::Value;

use crate::ast::Stmt;
use crate::parser::{Parsed, Parser};
use crate::scanner::Scanner;

/// One interpreter session: a persistent top-level scope plus the reports
/// of the most recent call. Each call to [`Eevee::run`] or
/// [`Eevee::run_line`] starts with an empty report list.
pub struct Eevee<W: Write = io::Stdout> {
    interpreter: Interpreter<W>,
    diagnostics: Diagnostics,
    print_ast: bool,
}

impl Eevee<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Eevee<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Eevee<W> {
    pub fn with_output(out: W) -> Self {
        Eevee {
            interpreter: Interpreter::with_output(out),
            diagnostics: Diagnostics::new(),
            print_ast: false,
        }
    }

    /// Dump every parsed tree to stderr before it runs.
    pub fn print_ast(mut self, enabled: bool) -> Self {
        self.print_ast = enabled;
        self
    }

    /// Runs a whole program.
    #[tracing::instrument(level = "debug", skip_all, fields(len = source.len()))]
    pub fn run(&mut self, source: &str) {
        self.diagnostics.clear();
        let tokens = Scanner::new(source, &mut self.diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut self.diagnostics).parse();
        self.execute(&statements);
    }

    /// Runs one line of interactive input. A line that is a single bare
    /// expression yields its value, unless the line had a syntax error.
    #[tracing::instrument(level = "debug", skip_all, fields(len = line.len()))]
    pub fn run_line(&mut self, line: &str) -> Option<Value> {
        self.diagnostics.clear();
        let tokens = Scanner::new(line, &mut self.diagnostics).scan_tokens();
        let parsed = Parser::new(tokens, &mut self.diagnostics).parse_repl();
        match parsed {
            Parsed::Expression(expr) => {
                if self.print_ast {
                    eprintln!("{}", printer::print_expr(&expr).blue());
                }
                match self.interpreter.evaluate(&expr) {
                    Ok(_) if self.diagnostics.had_error() => None,
                    Ok(value) => Some(value),
                    Err(error) => {
                        tracing::debug!(%error, "evaluation aborted");
                        self.diagnostics.report(Diagnostic::runtime(&error));
                        None
                    }
                }
            }
            Parsed::Statements(statements) => {
                self.execute(&statements);
                None
            }
        }
    }

    fn execute(&mut self, statements: &[Option<Stmt>]) {
        if self.print_ast {
            for stmt in statements.iter().flatten() {
                eprintln!("{}", printer::print_stmt(stmt).blue());
            }
        }
        if let Err(error) = self.interpreter.run(statements) {
            tracing::debug!(%error, "run aborted");
            self.diagnostics.report(Diagnostic::runtime(&error));
        }
    }

    /// Reports produced by the most recent call.
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn had_error(&self) -> bool {
        self.diagnostics.had_error()
    }

    pub fn interpreter(&self) -> &Interpreter<W> {
        &self.interpreter
    }

    pub fn output(&self) -> &W {
        self.interpreter.output()
    }
}
