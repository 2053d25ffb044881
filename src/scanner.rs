use std::fmt;
use std::iter::Peekable;
use std::str::CharIndices;

use crate::errors::{Diagnostic, Diagnostics, LexError};

pub struct Scanner<'a, 'd> {
    source: &'a str,
    chars: Peekable<CharIndices<'a>>,
    tokens: Vec<Token>,
    diagnostics: &'d mut Diagnostics,
    start: usize,
    start_line: usize,
    start_column: usize,
    line: usize,
    column: usize,
}

impl<'a, 'd> Scanner<'a, 'd> {
    pub fn new(source: &'a str, diagnostics: &'d mut Diagnostics) -> Scanner<'a, 'd> {
        Scanner {
            source,
            chars: source.char_indices().peekable(),
            tokens: Vec::new(),
            diagnostics,
            start: 0,
            start_line: 1,
            start_column: 1,
            line: 1,
            column: 0,
        }
    }

    /// Scans the whole source. Never fails: lexical errors are reported and the
    /// offending input skipped, and the result always ends with an `Eof` token.
    pub fn scan_tokens(mut self) -> Vec<Token> {
        loop {
            let (line, column) = (self.line, self.column + 1);
            let Some((start, ch)) = self.advance() else {
                break;
            };
            self.start = start;
            self.start_line = line;
            self.start_column = column;

            match ch {
                '(' => self.make_token(TokenType::LeftParen, None),
                ')' => self.make_token(TokenType::RightParen, None),
                '{' => self.make_token(TokenType::LeftBrace, None),
                '}' => self.make_token(TokenType::RightBrace, None),
                ',' => self.make_token(TokenType::Comma, None),
                '.' => self.make_token(TokenType::Dot, None),
                ';' => self.make_token(TokenType::Semicolon, None),
                '?' => self.make_token(TokenType::QuestionMark, None),
                ':' => self.make_token(TokenType::Colon, None),
                '-' => {
                    if self.match_next('-') {
                        self.make_token(TokenType::MinusMinus, None);
                    } else if self.match_next('=') {
                        self.make_token(TokenType::MinusEqual, None);
                    } else {
                        self.make_token(TokenType::Minus, None);
                    }
                }
                '+' => {
                    if self.match_next('+') {
                        self.make_token(TokenType::PlusPlus, None);
                    } else if self.match_next('=') {
                        self.make_token(TokenType::PlusEqual, None);
                    } else {
                        self.make_token(TokenType::Plus, None);
                    }
                }
                '*' => self.one_or_two('=', TokenType::StarEqual, TokenType::Star),
                '%' => self.one_or_two('=', TokenType::PercentEqual, TokenType::Percent),
                '!' => self.one_or_two('=', TokenType::BangEqual, TokenType::Bang),
                '=' => self.one_or_two('=', TokenType::EqualEqual, TokenType::Equal),
                '<' => self.one_or_two('=', TokenType::LessEqual, TokenType::Less),
                '>' => self.one_or_two('=', TokenType::GreaterEqual, TokenType::Greater),
                '/' => {
                    if self.match_next('/') {
                        while let Some(ch) = self.peek() {
                            if ch == '\n' {
                                break;
                            }
                            self.advance();
                        }
                    } else if self.match_next('*') {
                        self.block_comment();
                    } else if self.match_next('=') {
                        self.make_token(TokenType::SlashEqual, None);
                    } else {
                        self.make_token(TokenType::Slash, None);
                    }
                }
                '"' => self.string(),
                ' ' | '\r' | '\t' | '\n' => (),
                _ => {
                    if ch.is_ascii_digit() {
                        self.number();
                    } else if is_alpha(ch) {
                        self.identifier();
                    } else {
                        self.error(LexError::UnexpectedCharacter(ch));
                    }
                }
            }
        }

        self.tokens.push(Token::new(TokenType::Eof, "", None, self.line, self.column + 1));
        tracing::debug!(count = self.tokens.len(), "scanned tokens");
        self.tokens
    }

    fn one_or_two(&mut self, second: char, matched: TokenType, single: TokenType) {
        if self.match_next(second) {
            self.make_token(matched, None);
        } else {
            self.make_token(single, None);
        }
    }

    // Runs until the closing `*/`; an unclosed comment swallows the rest of the input.
    fn block_comment(&mut self) {
        while let Some((_, ch)) = self.advance() {
            if ch == '*' && self.match_next('/') {
                return;
            }
        }
    }

    fn string(&mut self) {
        loop {
            match self.peek() {
                Some('"') => {
                    self.advance();
                    let end = self.offset();
                    let value = &self.source[self.start + 1..end - 1];
                    self.make_token(TokenType::String, Some(Literal::Str(value.to_string())));
                    return;
                }
                Some(_) => {
                    self.advance();
                }
                None => {
                    self.error(LexError::UnterminatedString);
                    return;
                }
            }
        }
    }

    fn number(&mut self) {
        self.consume_digits();
        if self.peek() == Some('.') && self.peek_next().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
            self.consume_digits();
        }
        match self.lexeme().parse::<f64>() {
            Ok(n) => self.make_token(TokenType::Number, Some(Literal::Number(n))),
            Err(_) => self.error(LexError::InvalidNumber),
        }
    }

    fn consume_digits(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_ascii_digit() {
                break;
            }
            self.advance();
        }
    }

    fn identifier(&mut self) {
        while let Some(ch) = self.peek() {
            if !is_alpha(ch) && !ch.is_ascii_digit() {
                break;
            }
            self.advance();
        }
        let tt = keyword(self.lexeme()).unwrap_or(TokenType::Identifier);
        let literal = match tt {
            TokenType::True => Some(Literal::Bool(true)),
            TokenType::False => Some(Literal::Bool(false)),
            TokenType::Nil => Some(Literal::Nil),
            _ => None,
        };
        self.make_token(tt, literal);
    }

    fn advance(&mut self) -> Option<(usize, char)> {
        let next = self.chars.next();
        match next {
            Some((_, '\n')) => {
                self.line += 1;
                self.column = 0;
            }
            Some(_) => self.column += 1,
            None => (),
        }
        next
    }

    fn match_next(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.advance();
            return true;
        }
        false
    }

    fn peek(&mut self) -> Option<char> {
        self.chars.peek().map(|&(_, ch)| ch)
    }

    fn peek_next(&self) -> Option<char> {
        let mut ahead = self.chars.clone();
        ahead.next();
        ahead.next().map(|(_, ch)| ch)
    }

    fn offset(&mut self) -> usize {
        self.chars.peek().map_or(self.source.len(), |&(i, _)| i)
    }

    fn lexeme(&mut self) -> &'a str {
        let end = self.offset();
        &self.source[self.start..end]
    }

    fn make_token(&mut self, tt: TokenType, literal: Option<Literal>) {
        let lexeme = self.lexeme();
        self.tokens.push(Token::new(tt, lexeme, literal, self.start_line, self.start_column));
    }

    fn error(&mut self, error: LexError) {
        self.diagnostics
            .report(Diagnostic::lexical(self.start_line, self.start_column, &error));
    }
}

fn is_alpha(ch: char) -> bool {
    ch.is_ascii_alphabetic() || ch == '_'
}

fn keyword(text: &str) -> Option<TokenType> {
    let tt = match text {
        "and" => TokenType::And,
        "break" => TokenType::Break,
        "class" => TokenType::Class,
        "def" => TokenType::Def,
        "do" => TokenType::Do,
        "else" => TokenType::Else,
        "end" => TokenType::End,
        "false" => TokenType::False,
        "for" => TokenType::For,
        "if" => TokenType::If,
        "lambda" => TokenType::Lambda,
        "let" => TokenType::Let,
        "match" => TokenType::Match,
        "nil" => TokenType::Nil,
        "or" => TokenType::Or,
        "print" => TokenType::Print,
        "return" => TokenType::Return,
        "self" => TokenType::SelfKw,
        "super" => TokenType::Super,
        "then" => TokenType::Then,
        "true" => TokenType::True,
        "while" => TokenType::While,
        _ => return None,
    };
    Some(tt)
}

/// Literal payload carried by `Number`, `String`, `True`, `False` and `Nil` tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Number(f64),
    Str(String),
    Bool(bool),
    Nil,
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Number(n) => write!(f, "{n}"),
            Literal::Str(s) => write!(f, "{s}"),
            Literal::Bool(b) => write!(f, "{b}"),
            Literal::Nil => write!(f, "nil"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub tt: TokenType,
    pub lexeme: String,
    pub literal: Option<Literal>,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn new(tt: TokenType, lexeme: &str, literal: Option<Literal>, line: usize, column: usize) -> Token {
        Token {
            tt,
            lexeme: lexeme.to_string(),
            literal,
            line,
            column,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.literal {
            Some(literal) => write!(f, "{:?} {} {}", self.tt, self.lexeme, literal),
            None => write!(f, "{:?} {}", self.tt, self.lexeme),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Copy, Hash)]
pub enum TokenType {
    LeftParen,
    RightParen,
    LeftBrace,
    RightBrace,
    Comma,
    Dot,
    Semicolon,
    QuestionMark,
    Colon,

    Bang,
    BangEqual,
    Equal,
    EqualEqual,
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Plus,
    PlusEqual,
    PlusPlus,
    Minus,
    MinusEqual,
    MinusMinus,
    Star,
    StarEqual,
    Slash,
    SlashEqual,
    Percent,
    PercentEqual,

    Identifier,
    String,
    Number,

    And,
    Break,
    Class,
    Def,
    Do,
    Else,
    End,
    False,
    For,
    If,
    Lambda,
    Let,
    Match,
    Nil,
    Or,
    Print,
    Return,
    SelfKw,
    Super,
    Then,
    True,
    While,

    Eof,
}
