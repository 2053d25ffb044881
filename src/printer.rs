//! Renders syntax trees in a prefix, parenthesized form for debugging.

use crate::ast::{Expr, Stmt};

pub fn print_expr(expr: &Expr) -> String {
    match expr {
        Expr::Assign { name, value } => format!("(= {} {})", name.lexeme, print_expr(value)),
        Expr::Binary { left, operator, right } | Expr::Logical { left, operator, right } => {
            parenthesize(&operator.lexeme, [left.as_ref(), right.as_ref()])
        }
        Expr::Conditional {
            condition,
            consequent,
            alternate,
        } => parenthesize("?", [condition.as_ref(), consequent.as_ref(), alternate.as_ref()]),
        Expr::Grouping(inner) => parenthesize("group", [inner.as_ref()]),
        Expr::LiteralNumber(n) => format!("{n}"),
        Expr::LiteralString(s) => format!("\"{s}\""),
        Expr::LiteralBoolean(b) => b.to_string(),
        Expr::LiteralNull => "nil".to_string(),
        Expr::Postfix { operand, operator } => parenthesize(&operator.lexeme, [operand.as_ref()]),
        Expr::Unary { operator, right } => parenthesize(&operator.lexeme, [right.as_ref()]),
        Expr::Variable { name } => name.lexeme.clone(),
    }
}

pub fn print_stmt(stmt: &Stmt) -> String {
    match stmt {
        Stmt::Expression(expr) => format!("(expr {})", print_expr(expr)),
        Stmt::If {
            condition,
            consequent,
            alternate,
        } => {
            let mut out = format!("(if {} {}", print_expr(condition), list("then", consequent));
            if !alternate.is_empty() {
                out.push(' ');
                out.push_str(&list("else", alternate));
            }
            out.push(')');
            out
        }
        Stmt::Print { expr, .. } => format!("(print {})", print_expr(expr)),
        Stmt::Var { name, initializer } => match initializer {
            Some(init) => format!("(let {} {})", name.lexeme, print_expr(init)),
            None => format!("(let {})", name.lexeme),
        },
        Stmt::Block(statements) => list("block", statements),
        Stmt::While { condition, body } => {
            format!("(while {} {})", print_expr(condition), print_stmt(body))
        }
        Stmt::Break(_) => "(break)".to_string(),
    }
}

fn parenthesize<'e>(name: &str, exprs: impl IntoIterator<Item = &'e Expr>) -> String {
    let mut out = format!("({name}");
    for expr in exprs {
        out.push(' ');
        out.push_str(&print_expr(expr));
    }
    out.push(')');
    out
}

fn list(name: &str, statements: &[Stmt]) -> String {
    let mut out = format!("({name}");
    for stmt in statements {
        out.push(' ');
        out.push_str(&print_stmt(stmt));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{Token, TokenType};

    fn token(tt: TokenType, lexeme: &str) -> Token {
        Token::new(tt, lexeme, None, 1, 1)
    }

    #[test]
    fn prints_nested_expression() {
        let expr = Expr::binary(
            Expr::Unary {
                operator: token(TokenType::Minus, "-"),
                right: Box::new(Expr::LiteralNumber(123.0)),
            },
            token(TokenType::Star, "*"),
            Expr::Grouping(Box::new(Expr::LiteralNumber(45.67))),
        );
        assert_eq!(print_expr(&expr), "(* (- 123) (group 45.67))");
    }

    #[test]
    fn prints_literals() {
        assert_eq!(print_expr(&Expr::LiteralString("hi".into())), "\"hi\"");
        assert_eq!(print_expr(&Expr::LiteralNull), "nil");
        assert_eq!(print_expr(&Expr::LiteralBoolean(false)), "false");
    }

    #[test]
    fn prints_statements() {
        let stmt = Stmt::While {
            condition: Expr::LiteralBoolean(true),
            body: Box::new(Stmt::Block(vec![
                Stmt::Print {
                    keyword: token(TokenType::Print, "print"),
                    expr: Expr::Variable { name: token(TokenType::Identifier, "x") },
                },
                Stmt::Break(token(TokenType::Break, "break")),
            ])),
        };
        assert_eq!(print_stmt(&stmt), "(while true (block (print x) (break)))");
    }
}
