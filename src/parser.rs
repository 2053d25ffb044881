use crate::ast::{Expr, Stmt};
use crate::errors::{Diagnostic, Diagnostics, ParseError};
use crate::scanner::{Literal, Token, TokenType};

type ParseResult<T> = Result<T, ParseError>;

/// Deepest nesting of expressions or statements accepted before the parser
/// gives up with a syntax error.
const MAX_DEPTH: usize = 128;

/// Output of [`Parser::parse_repl`].
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed {
    /// Statements in source order; `None` marks a statement that failed to parse.
    Statements(Vec<Option<Stmt>>),
    /// The whole input was one expression without a trailing `;`.
    Expression(Expr),
}

pub struct Parser<'d> {
    tokens: Vec<Token>,
    current: usize,
    loop_depth: usize,
    depth: usize,
    // Closing keywords of each body being parsed, innermost last.
    body_ends: Vec<&'static [TokenType]>,
    allow_expression: bool,
    found_expression: bool,
    diagnostics: &'d mut Diagnostics,
}

impl<'d> Parser<'d> {
    pub fn new(tokens: Vec<Token>, diagnostics: &'d mut Diagnostics) -> Parser<'d> {
        Parser {
            tokens,
            current: 0,
            loop_depth: 0,
            depth: 0,
            body_ends: Vec::new(),
            allow_expression: false,
            found_expression: false,
            diagnostics,
        }
    }

    pub fn parse(&mut self) -> Vec<Option<Stmt>> {
        let mut statements = Vec::new();
        while !self.is_at_end() {
            statements.push(self.declaration());
        }
        tracing::debug!(count = statements.len(), "parsed statements");
        statements
    }

    /// Like [`Parser::parse`], but a lone expression with no terminator is
    /// returned as is so the caller can echo its value.
    pub fn parse_repl(&mut self) -> Parsed {
        self.allow_expression = true;

        let mut statements = Vec::new();
        while !self.is_at_end() {
            let statement = self.declaration();
            if self.found_expression {
                if let Some(Stmt::Expression(expr)) = statement {
                    tracing::debug!("parsed bare expression");
                    return Parsed::Expression(expr);
                }
            }
            statements.push(statement);
            self.allow_expression = false;
        }
        Parsed::Statements(statements)
    }

    fn declaration(&mut self) -> Option<Stmt> {
        let result = if self.match_keyword(TokenType::Let) {
            self.var_declaration()
        } else {
            self.statement()
        };

        match result {
            Ok(stmt) => Some(stmt),
            Err(ParseError) => {
                self.synchronize();
                None
            }
        }
    }

    fn statement(&mut self) -> ParseResult<Stmt> {
        self.nested(Self::simple_statement)
    }

    fn simple_statement(&mut self) -> ParseResult<Stmt> {
        if self.match_keyword(TokenType::Print) {
            return self.print_statement();
        }
        if self.match_keyword(TokenType::Do) {
            return Ok(Stmt::Block(self.block()?));
        }
        if self.match_keyword(TokenType::If) {
            return self.if_statement();
        }
        if self.match_keyword(TokenType::While) {
            return self.while_statement();
        }
        if self.match_keyword(TokenType::For) {
            return self.for_statement();
        }
        if self.match_keyword(TokenType::Break) {
            return self.break_statement();
        }
        self.expression_statement()
    }

    fn var_declaration(&mut self) -> ParseResult<Stmt> {
        let name = self.consume(TokenType::Identifier, "Expect variable name.")?;
        let initializer = if self.match_tokens(&[TokenType::Equal]) {
            Some(self.expression()?)
        } else {
            None
        };
        self.consume(TokenType::Semicolon, "Expect ';' after variable declaration.")?;
        Ok(Stmt::Var { name, initializer })
    }

    fn print_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        let expr = self.expression()?;
        self.consume(TokenType::Semicolon, "Expect ';' after value.")?;
        Ok(Stmt::Print { keyword, expr })
    }

    fn expression_statement(&mut self) -> ParseResult<Stmt> {
        let expr = self.expression()?;
        if self.allow_expression && self.is_at_end() {
            self.found_expression = true;
        } else {
            self.consume(TokenType::Semicolon, "Expect ';' after expression.")?;
        }
        Ok(Stmt::Expression(expr))
    }

    fn block(&mut self) -> ParseResult<Vec<Stmt>> {
        let statements = self.statements_until(&[TokenType::End]);
        self.consume(TokenType::End, "Expect 'end' after block.")?;
        Ok(statements)
    }

    fn if_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.expression()?;
        self.consume(TokenType::Then, "Expect 'then' after if condition.")?;
        let consequent = self.statements_until(&[TokenType::Else, TokenType::End]);
        let alternate = if self.match_tokens(&[TokenType::Else]) {
            self.statements_until(&[TokenType::End])
        } else {
            Vec::new()
        };
        self.consume(TokenType::End, "Expect 'end' after if statement.")?;
        Ok(Stmt::If {
            condition,
            consequent,
            alternate,
        })
    }

    fn while_statement(&mut self) -> ParseResult<Stmt> {
        let condition = self.expression()?;
        let body = self.loop_body()?;
        Ok(Stmt::While {
            condition,
            body: Box::new(body),
        })
    }

    // for (init; cond; incr) body  =>  do init; while cond do body; incr; end end
    fn for_statement(&mut self) -> ParseResult<Stmt> {
        self.consume(TokenType::LeftParen, "Expect '(' after 'for'.")?;

        let initializer = if self.match_tokens(&[TokenType::Semicolon]) {
            None
        } else if self.match_tokens(&[TokenType::Let]) {
            Some(self.var_declaration()?)
        } else {
            Some(self.expression_statement()?)
        };

        let condition = if self.check(TokenType::Semicolon) {
            Expr::LiteralBoolean(true)
        } else {
            self.expression()?
        };
        self.consume(TokenType::Semicolon, "Expect ';' after loop condition.")?;

        let increment = if self.check(TokenType::RightParen) {
            None
        } else {
            Some(self.expression()?)
        };
        self.consume(TokenType::RightParen, "Expect ')' after for clauses.")?;

        let mut body = self.loop_body()?;
        if let Some(increment) = increment {
            body = Stmt::Block(vec![body, Stmt::Expression(increment)]);
        }
        let looped = Stmt::While {
            condition,
            body: Box::new(body),
        };

        Ok(Stmt::Block(initializer.into_iter().chain([looped]).collect()))
    }

    fn loop_body(&mut self) -> ParseResult<Stmt> {
        self.loop_depth += 1;
        let body = self.statement();
        self.loop_depth -= 1;
        body
    }

    fn break_statement(&mut self) -> ParseResult<Stmt> {
        let keyword = self.previous().clone();
        if self.loop_depth == 0 {
            self.report(&keyword, "Must be inside a loop to use 'break'.");
        }
        self.consume(TokenType::Semicolon, "Expect ';' after 'break'.")?;
        Ok(Stmt::Break(keyword))
    }

    fn statements_until(&mut self, terminators: &'static [TokenType]) -> Vec<Stmt> {
        self.body_ends.push(terminators);
        let mut statements = Vec::new();
        while !terminators.iter().any(|&tt| self.check(tt)) && !self.is_at_end() {
            if let Some(stmt) = self.declaration() {
                statements.push(stmt);
            }
        }
        self.body_ends.pop();
        statements
    }

    fn expression(&mut self) -> ParseResult<Expr> {
        self.nested(Self::assignment)
    }

    fn assignment(&mut self) -> ParseResult<Expr> {
        let expr = self.conditional()?;

        if self.match_tokens(&[
            TokenType::Equal,
            TokenType::PlusEqual,
            TokenType::MinusEqual,
            TokenType::StarEqual,
            TokenType::SlashEqual,
            TokenType::PercentEqual,
        ]) {
            let equals = self.previous().clone();
            let value = self.expression()?;

            if let Expr::Variable { name } = &expr {
                let value = match compound_operator(&equals) {
                    Some(operator) => Expr::binary(expr.clone(), operator, value),
                    None => value,
                };
                return Ok(Expr::Assign {
                    name: name.clone(),
                    value: Box::new(value),
                });
            }

            self.report(&equals, "Invalid assignment target.");
        }

        Ok(expr)
    }

    fn conditional(&mut self) -> ParseResult<Expr> {
        let expr = self.or()?;

        if self.match_tokens(&[TokenType::QuestionMark]) {
            let consequent = self.or()?;
            self.consume(TokenType::Colon, "Expect ':' after expression.")?;
            let alternate = self.nested(Self::conditional)?;
            return Ok(Expr::Conditional {
                condition: Box::new(expr),
                consequent: Box::new(consequent),
                alternate: Box::new(alternate),
            });
        }

        Ok(expr)
    }

    fn or(&mut self) -> ParseResult<Expr> {
        let mut expr = self.and()?;
        while self.match_tokens(&[TokenType::Or]) {
            let operator = self.previous().clone();
            let right = self.and()?;
            expr = Expr::logical(expr, operator, right);
        }
        Ok(expr)
    }

    fn and(&mut self) -> ParseResult<Expr> {
        let mut expr = self.equality()?;
        while self.match_tokens(&[TokenType::And]) {
            let operator = self.previous().clone();
            let right = self.equality()?;
            expr = Expr::logical(expr, operator, right);
        }
        Ok(expr)
    }

    fn equality(&mut self) -> ParseResult<Expr> {
        let mut expr = self.comparison()?;
        while self.match_tokens(&[TokenType::BangEqual, TokenType::EqualEqual]) {
            let operator = self.previous().clone();
            let right = self.comparison()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn comparison(&mut self) -> ParseResult<Expr> {
        let mut expr = self.term()?;
        while self.match_tokens(&[
            TokenType::Greater,
            TokenType::GreaterEqual,
            TokenType::Less,
            TokenType::LessEqual,
        ]) {
            let operator = self.previous().clone();
            let right = self.term()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn term(&mut self) -> ParseResult<Expr> {
        let mut expr = self.factor()?;
        while self.match_tokens(&[TokenType::Minus, TokenType::Plus]) {
            let operator = self.previous().clone();
            let right = self.factor()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn factor(&mut self) -> ParseResult<Expr> {
        let mut expr = self.unary()?;
        while self.match_tokens(&[TokenType::Star, TokenType::Slash, TokenType::Percent]) {
            let operator = self.previous().clone();
            let right = self.unary()?;
            expr = Expr::binary(expr, operator, right);
        }
        Ok(expr)
    }

    fn unary(&mut self) -> ParseResult<Expr> {
        if self.match_tokens(&[TokenType::Minus, TokenType::Bang]) {
            let operator = self.previous().clone();
            let right = self.nested(Self::unary)?;
            return Ok(Expr::Unary {
                operator,
                right: Box::new(right),
            });
        }
        self.postfix()
    }

    fn postfix(&mut self) -> ParseResult<Expr> {
        let expr = self.primary()?;
        if self.match_tokens(&[TokenType::MinusMinus, TokenType::PlusPlus]) {
            let operator = self.previous().clone();
            return Ok(Expr::Postfix {
                operand: Box::new(expr),
                operator,
            });
        }
        Ok(expr)
    }

    fn primary(&mut self) -> ParseResult<Expr> {
        let token = self.peek().clone();
        let expr = match (token.tt, &token.literal) {
            (TokenType::False, _) => Expr::LiteralBoolean(false),
            (TokenType::True, _) => Expr::LiteralBoolean(true),
            (TokenType::Nil, _) => Expr::LiteralNull,
            (TokenType::Number, Some(Literal::Number(n))) => Expr::LiteralNumber(*n),
            (TokenType::String, Some(Literal::Str(s))) => Expr::LiteralString(s.clone()),
            (TokenType::Identifier, _) => Expr::Variable { name: token.clone() },
            (TokenType::LeftParen, _) => {
                self.advance();
                let expr = self.expression()?;
                self.consume(TokenType::RightParen, "Expect ')' after expression.")?;
                return Ok(Expr::Grouping(Box::new(expr)));
            }
            _ => return Err(self.error(&token, "Expect expression.")),
        };
        self.advance();
        Ok(expr)
    }

    fn nested<T>(&mut self, rule: fn(&mut Self) -> ParseResult<T>) -> ParseResult<T> {
        if self.depth >= MAX_DEPTH {
            let token = self.peek().clone();
            return Err(self.error(&token, "Too much nesting."));
        }
        self.depth += 1;
        let result = rule(self);
        self.depth -= 1;
        result
    }

    // Panic mode: drop tokens until just past a `;` or right before a keyword
    // that can start a statement or close a body. The keyword closing the
    // innermost open body is left for that body.
    fn synchronize(&mut self) {
        let tt = self.peek().tt;
        if self.body_ends.last().is_some_and(|ends| ends.contains(&tt)) {
            return;
        }
        self.advance();
        while !self.is_at_end() {
            if self.previous().tt == TokenType::Semicolon {
                return;
            }
            match self.peek().tt {
                TokenType::Class
                | TokenType::Def
                | TokenType::Do
                | TokenType::If
                | TokenType::For
                | TokenType::Lambda
                | TokenType::Match
                | TokenType::Print
                | TokenType::Return
                | TokenType::Let
                | TokenType::While
                | TokenType::Break
                | TokenType::Else
                | TokenType::End => return,
                _ => (),
            }
            self.advance();
        }
    }

    fn match_keyword(&mut self, tt: TokenType) -> bool {
        if self.match_tokens(&[tt]) {
            self.allow_expression = false;
            return true;
        }
        false
    }

    fn match_tokens(&mut self, types: &[TokenType]) -> bool {
        for &tt in types {
            if self.check(tt) {
                self.advance();
                return true;
            }
        }
        false
    }

    fn check(&self, tt: TokenType) -> bool {
        if self.is_at_end() {
            return false;
        }
        self.peek().tt == tt
    }

    fn advance(&mut self) -> Token {
        if !self.is_at_end() {
            self.current += 1;
        }
        self.previous().clone()
    }

    fn is_at_end(&self) -> bool {
        self.peek().tt == TokenType::Eof
    }

    // The scanner always terminates the stream with `Eof`, and `current` never
    // moves past it.
    fn peek(&self) -> &Token {
        &self.tokens[self.current.min(self.tokens.len() - 1)]
    }

    fn previous(&self) -> &Token {
        &self.tokens[self.current.saturating_sub(1)]
    }

    fn consume(&mut self, tt: TokenType, message: &str) -> ParseResult<Token> {
        if self.check(tt) {
            return Ok(self.advance());
        }
        let token = self.peek().clone();
        Err(self.error(&token, message))
    }

    fn report(&mut self, token: &Token, message: &str) {
        self.diagnostics.report(Diagnostic::syntax(token, message));
    }

    fn error(&mut self, token: &Token, message: &str) -> ParseError {
        self.report(token, message);
        ParseError
    }
}

fn compound_operator(token: &Token) -> Option<Token> {
    let (tt, lexeme) = match token.tt {
        TokenType::PlusEqual => (TokenType::Plus, "+"),
        TokenType::MinusEqual => (TokenType::Minus, "-"),
        TokenType::StarEqual => (TokenType::Star, "*"),
        TokenType::SlashEqual => (TokenType::Slash, "/"),
        TokenType::PercentEqual => (TokenType::Percent, "%"),
        _ => return None,
    };
    Some(Token::new(tt, lexeme, None, token.line, token.column))
}
