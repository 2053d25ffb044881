use std::io::{self, Write};

use crate::ast::{Expr, Stmt};
use crate::environment::Environment;
use crate::errors::{RuntimeError, RuntimeErrorKind};
use crate::scanner::{Token, TokenType};
use crate::value::Value;

/// Why execution of a statement stopped early.
#[derive(Debug)]
enum Unwind {
    /// A `break` travelling up to the nearest enclosing loop.
    Break,
    Error(RuntimeError),
}

impl From<RuntimeError> for Unwind {
    fn from(error: RuntimeError) -> Self {
        Unwind::Error(error)
    }
}

/// Walks syntax trees against a persistent top-level environment.
/// `print` output goes to `out`.
pub struct Interpreter<W: Write = io::Stdout> {
    globals: Environment,
    environment: Environment,
    out: W,
}

impl Interpreter<io::Stdout> {
    pub fn new() -> Self {
        Self::with_output(io::stdout())
    }
}

impl Default for Interpreter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> Interpreter<W> {
    pub fn with_output(out: W) -> Self {
        let globals = Environment::new();
        Interpreter {
            environment: globals.clone(),
            globals,
            out,
        }
    }

    #[cfg(test)]
    fn globals(&self) -> &Environment {
        &self.globals
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn into_output(self) -> W {
        self.out
    }

    /// Executes statements in order, skipping the ones that failed to parse.
    /// The first runtime error aborts the rest of the sequence.
    pub fn run(&mut self, statements: &[Option<Stmt>]) -> Result<(), RuntimeError> {
        for statement in statements.iter().flatten() {
            match self.execute(statement) {
                Ok(()) => (),
                Err(Unwind::Break) => {
                    tracing::debug!("break outside of a loop ended the run");
                    break;
                }
                Err(Unwind::Error(error)) => {
                    self.environment = self.globals.clone();
                    return Err(error);
                }
            }
        }
        Ok(())
    }

    fn execute(&mut self, stmt: &Stmt) -> Result<(), Unwind> {
        match stmt {
            Stmt::Expression(expr) => {
                self.evaluate(expr)?;
            }
            Stmt::If {
                condition,
                consequent,
                alternate,
            } => {
                let branch = if self.evaluate(condition)?.is_truthy() {
                    consequent
                } else {
                    alternate
                };
                self.execute_block(branch, Environment::with_enclosing(&self.environment))?;
            }
            Stmt::Print { keyword, expr } => {
                let value = self.evaluate(expr)?;
                writeln!(self.out, "{value}").map_err(|e| {
                    RuntimeError::new(keyword, RuntimeErrorKind::Output(e.to_string()))
                })?;
            }
            Stmt::Var { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.evaluate(expr)?,
                    None => Value::Nil,
                };
                self.environment.define(&name.lexeme, value);
            }
            Stmt::Block(statements) => {
                self.execute_block(statements, Environment::with_enclosing(&self.environment))?;
            }
            Stmt::While { condition, body } => {
                while self.evaluate(condition)?.is_truthy() {
                    let scope = Environment::with_enclosing(&self.environment);
                    match self.execute_block(std::slice::from_ref(body.as_ref()), scope) {
                        Err(Unwind::Break) => break,
                        result => result?,
                    }
                }
            }
            Stmt::Break(_) => return Err(Unwind::Break),
        }
        Ok(())
    }

    fn execute_block(&mut self, statements: &[Stmt], scope: Environment) -> Result<(), Unwind> {
        tracing::trace!(len = statements.len(), "enter scope");
        let previous = std::mem::replace(&mut self.environment, scope);
        let result = statements.iter().try_for_each(|stmt| self.execute(stmt));
        self.environment = previous;
        result
    }

    pub fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match expr {
            Expr::Assign { name, value } => {
                let value = self.evaluate(value)?;
                self.environment.assign(name, value.clone())?;
                Ok(value)
            }
            Expr::Binary { left, operator, right } => {
                let left = self.evaluate(left)?;
                let right = self.evaluate(right)?;
                binary(operator, left, right)
            }
            Expr::Conditional {
                condition,
                consequent,
                alternate,
            } => {
                // All three operands run; only the selection is conditional.
                let condition = self.evaluate(condition)?;
                let consequent = self.evaluate(consequent)?;
                let alternate = self.evaluate(alternate)?;
                Ok(if condition.is_truthy() { consequent } else { alternate })
            }
            Expr::Grouping(inner) => self.evaluate(inner),
            Expr::LiteralNumber(n) => Ok(Value::Number(*n)),
            Expr::LiteralString(s) => Ok(Value::String(s.clone())),
            Expr::LiteralBoolean(b) => Ok(Value::Bool(*b)),
            Expr::LiteralNull => Ok(Value::Nil),
            Expr::Logical { left, operator, right } => {
                let left = self.evaluate(left)?;
                let short_circuits = if operator.tt == TokenType::Or {
                    left.is_truthy()
                } else {
                    !left.is_truthy()
                };
                if short_circuits {
                    return Ok(left);
                }
                self.evaluate(right)
            }
            Expr::Postfix { operand, operator } => {
                let old = self.evaluate(operand)?;
                let n = number_operand(operator, &old)?;
                let new = if operator.tt == TokenType::PlusPlus {
                    n + 1.0
                } else {
                    n - 1.0
                };
                if let Expr::Variable { name } = operand.as_ref() {
                    self.environment.assign(name, Value::Number(new))?;
                }
                // The expression yields the value from before the update.
                Ok(old)
            }
            Expr::Unary { operator, right } => {
                let right = self.evaluate(right)?;
                match operator.tt {
                    TokenType::Minus => Ok(Value::Number(-number_operand(operator, &right)?)),
                    TokenType::Bang => Ok(Value::Bool(!right.is_truthy())),
                    tt => unreachable!("parser never builds unary {tt:?}"),
                }
            }
            Expr::Variable { name } => self.environment.get(name),
        }
    }
}

fn binary(operator: &Token, left: Value, right: Value) -> Result<Value, RuntimeError> {
    let value = match operator.tt {
        TokenType::EqualEqual => Value::Bool(left == right),
        TokenType::BangEqual => Value::Bool(left != right),
        TokenType::Plus => match (left, right) {
            (Value::Number(l), Value::Number(r)) => Value::Number(l + r),
            (Value::String(l), Value::String(r)) => Value::String(l + &r),
            _ => {
                return Err(RuntimeError::type_mismatch(
                    operator,
                    "Operands must be numbers or strings.",
                ))
            }
        },
        _ => {
            let (l, r) = number_operands(operator, &left, &right)?;
            match operator.tt {
                TokenType::Minus => Value::Number(l - r),
                TokenType::Star => Value::Number(l * r),
                TokenType::Slash => {
                    if l == 0.0 || r == 0.0 {
                        return Err(RuntimeError::new(operator, RuntimeErrorKind::DivisionByZero));
                    }
                    Value::Number(l / r)
                }
                TokenType::Percent => Value::Number(l % r),
                TokenType::Greater => Value::Bool(l > r),
                TokenType::GreaterEqual => Value::Bool(l >= r),
                TokenType::Less => Value::Bool(l < r),
                TokenType::LessEqual => Value::Bool(l <= r),
                tt => unreachable!("parser never builds binary {tt:?}"),
            }
        }
    };
    Ok(value)
}

fn number_operand(operator: &Token, operand: &Value) -> Result<f64, RuntimeError> {
    operand
        .as_number()
        .ok_or_else(|| RuntimeError::type_mismatch(operator, "Operand must be a number."))
}

fn number_operands(operator: &Token, left: &Value, right: &Value) -> Result<(f64, f64), RuntimeError> {
    match (left.as_number(), right.as_number()) {
        (Some(l), Some(r)) => Ok((l, r)),
        _ => Err(RuntimeError::type_mismatch(operator, "Operands must be numbers.")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{Diagnostics, ErrorKind};
    use crate::parser::{Parsed, Parser};
    use crate::scanner::Scanner;

    fn parse(source: &str) -> Vec<Option<Stmt>> {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        let statements = Parser::new(tokens, &mut diagnostics).parse();
        assert!(diagnostics.is_empty(), "unexpected reports: {:?}", diagnostics);
        statements
    }

    fn expr(source: &str) -> Expr {
        let mut diagnostics = Diagnostics::new();
        let tokens = Scanner::new(source, &mut diagnostics).scan_tokens();
        match Parser::new(tokens, &mut diagnostics).parse_repl() {
            Parsed::Expression(expr) => expr,
            other => panic!("expected an expression, got {other:?}"),
        }
    }

    fn eval(source: &str) -> Result<Value, RuntimeError> {
        Interpreter::with_output(Vec::new()).evaluate(&expr(source))
    }

    fn run(source: &str) -> (String, Result<(), RuntimeError>) {
        let mut interpreter = Interpreter::with_output(Vec::new());
        let result = interpreter.run(&parse(source));
        let out = String::from_utf8(interpreter.into_output()).unwrap();
        (out, result)
    }

    fn error_kind(source: &str) -> ErrorKind {
        eval(source).unwrap_err().error_kind()
    }

    #[test]
    fn arithmetic() {
        assert_eq!(eval("2 + 3 * 4"), Ok(Value::Number(14.0)));
        assert_eq!(eval("(2 + 3) * 4"), Ok(Value::Number(20.0)));
        assert_eq!(eval("7 % 4"), Ok(Value::Number(3.0)));
        assert_eq!(eval("-(1 - 3)"), Ok(Value::Number(2.0)));
        assert_eq!(eval("5 / 2"), Ok(Value::Number(2.5)));
    }

    #[test]
    fn string_concatenation() {
        assert_eq!(eval("\"ab\" + \"cd\""), Ok(Value::from("abcd")));
    }

    #[test]
    fn mixed_plus_is_type_mismatch() {
        assert_eq!(error_kind("1 + \"a\""), ErrorKind::TypeMismatch);
        assert_eq!(error_kind("\"a\" + 1"), ErrorKind::TypeMismatch);
        assert_eq!(error_kind("\"a\" - \"b\""), ErrorKind::TypeMismatch);
        assert_eq!(error_kind("true < 1"), ErrorKind::TypeMismatch);
        assert_eq!(error_kind("-\"a\""), ErrorKind::TypeMismatch);
    }

    #[test]
    fn division_by_zero_on_either_side() {
        assert_eq!(error_kind("5 / 0"), ErrorKind::DivisionByZero);
        assert_eq!(error_kind("0 / 5"), ErrorKind::DivisionByZero);
        assert_eq!(eval("5 / 1"), Ok(Value::Number(5.0)));
    }

    #[test]
    fn modulo_has_no_zero_guard() {
        let value = eval("5 % 0").unwrap();
        assert!(matches!(value, Value::Number(n) if n.is_nan()));
    }

    #[test]
    fn comparisons() {
        assert_eq!(eval("1 < 2"), Ok(Value::Bool(true)));
        assert_eq!(eval("2 <= 2"), Ok(Value::Bool(true)));
        assert_eq!(eval("1 > 2"), Ok(Value::Bool(false)));
        assert_eq!(eval("3 >= 4"), Ok(Value::Bool(false)));
    }

    #[test]
    fn equality_never_fails() {
        assert_eq!(eval("nil == nil"), Ok(Value::Bool(true)));
        assert_eq!(eval("nil == false"), Ok(Value::Bool(false)));
        assert_eq!(eval("1 == \"1\""), Ok(Value::Bool(false)));
        assert_eq!(eval("\"a\" == \"a\""), Ok(Value::Bool(true)));
        assert_eq!(eval("1 != 2"), Ok(Value::Bool(true)));
    }

    #[test]
    fn logical_operators_return_operands() {
        assert_eq!(eval("nil or \"x\""), Ok(Value::from("x")));
        assert_eq!(eval("0 or \"x\""), Ok(Value::Number(0.0)));
        assert_eq!(eval("false and undefined_name"), Ok(Value::Bool(false)));
        assert_eq!(eval("1 and 2"), Ok(Value::Number(2.0)));
    }

    #[test]
    fn bang_negates_truthiness() {
        assert_eq!(eval("!nil"), Ok(Value::Bool(true)));
        assert_eq!(eval("!0"), Ok(Value::Bool(false)));
    }

    #[test]
    fn conditional_selects_by_truthiness() {
        assert_eq!(eval("true ? \"a\" : \"b\""), Ok(Value::from("a")));
        assert_eq!(eval("nil ? \"a\" : \"b\""), Ok(Value::from("b")));
    }

    #[test]
    fn conditional_evaluates_both_branches() {
        let (out, result) = run("let a = 0; let b = 0; let r = true ? a++ : b++; print r; print a; print b;");
        assert!(result.is_ok());
        assert_eq!(out, "0\n1\n1\n");
    }

    #[test]
    fn postfix_returns_old_value_and_commits_new() {
        let (out, result) = run("let x = 5; print x++; print x; print x--; print x;");
        assert!(result.is_ok());
        assert_eq!(out, "5\n6\n6\n5\n");
    }

    #[test]
    fn postfix_on_non_variable_does_not_write_back() {
        assert_eq!(eval("3++"), Ok(Value::Number(3.0)));
        assert_eq!(error_kind("\"s\"++"), ErrorKind::TypeMismatch);
    }

    #[test]
    fn assignment_requires_declaration() {
        let (_, result) = run("y = 1;");
        assert_eq!(result.unwrap_err().error_kind(), ErrorKind::UndefinedVariable);
        let (out, result) = run("let x = 1; x = x + 1; print x;");
        assert!(result.is_ok());
        assert_eq!(out, "2\n");
    }

    #[test]
    fn blocks_scope_their_declarations() {
        let (out, result) = run("let x = 1; do let x = 2; print x; end print x;");
        assert!(result.is_ok());
        assert_eq!(out, "2\n1\n");
        let (_, result) = run("do let y = 1; end print y;");
        assert!(result.is_err());
    }

    #[test]
    fn blocks_assign_outer_bindings() {
        let (out, _) = run("let x = 1; do x = 3; end print x;");
        assert_eq!(out, "3\n");
    }

    #[test]
    fn if_branches() {
        let (out, _) = run("if 0 then print \"yes\"; else print \"no\"; end if nil then print 1; end");
        assert_eq!(out, "yes\n");
    }

    #[test]
    fn while_loop() {
        let (out, _) = run("let i = 0; while i < 3 do print i; i++; end");
        assert_eq!(out, "0\n1\n2\n");
    }

    #[test]
    fn for_loop_scopes_its_initializer() {
        let (out, result) = run("for (let i = 0; i < 3; i += 1) print i * 10;");
        assert!(result.is_ok());
        assert_eq!(out, "0\n10\n20\n");
        let (_, result) = run("for (let i = 0; i < 1; i++) print i; print i;");
        assert!(result.is_err());
    }

    #[test]
    fn break_exits_innermost_loop() {
        let source = "
            let i = 0;
            while true do
                let j = 0;
                while true do
                    j++;
                    if j == 2 then break; end
                end
                print j;
                i++;
                if i == 2 then break; end
            end
            print i;
        ";
        let (out, result) = run(source);
        assert!(result.is_ok());
        assert_eq!(out, "2\n2\n2\n");
    }

    #[test]
    fn break_in_for_skips_increment() {
        let (out, _) = run("let k = 0; for (k = 0; k < 10; k++) if k == 3 then break; end print k;");
        assert_eq!(out, "3\n");
    }

    #[test]
    fn runtime_error_stops_the_rest() {
        let (out, result) = run("print 1; print 1 / 0; print 2;");
        assert_eq!(out, "1\n");
        let error = result.unwrap_err();
        assert_eq!(error.kind, RuntimeErrorKind::DivisionByZero);
        assert_eq!((error.token.line, error.token.column), (1, 18));
    }

    #[test]
    fn environment_restored_after_error_in_block() {
        let mut interpreter = Interpreter::with_output(Vec::new());
        assert!(interpreter.run(&parse("let x = 1; do let x = 2; x = nope; end")).is_err());
        assert!(interpreter.run(&parse("print x;")).is_ok());
        assert_eq!(interpreter.output(), b"1\n");
    }

    #[test]
    fn absent_statements_are_skipped() {
        let statements = vec![None, parse("print 7;").remove(0), None];
        let mut interpreter = Interpreter::with_output(Vec::new());
        assert!(interpreter.run(&statements).is_ok());
        assert_eq!(interpreter.output(), b"7\n");
    }

    #[test]
    fn uninitialized_variable_is_nil() {
        let (out, _) = run("let x; print x;");
        assert_eq!(out, "nil\n");
    }

    #[test]
    fn globals_persist_between_runs() {
        let mut interpreter = Interpreter::with_output(Vec::new());
        interpreter.run(&parse("let count = 1;")).unwrap();
        interpreter.run(&parse("count += 1;")).unwrap();
        let name = Token::new(TokenType::Identifier, "count", None, 1, 1);
        assert_eq!(interpreter.globals().get(&name), Ok(Value::Number(2.0)));
    }
}
