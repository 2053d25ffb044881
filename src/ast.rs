use crate::scanner::Token;

#[derive(Clone, Debug, PartialEq)]
pub enum Expr {
    Assign {
        name: Token,
        value: Box<Expr>,
    }, // name = value
    Binary {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    }, // arithmetic, comparison and equality
    Conditional {
        condition: Box<Expr>,
        consequent: Box<Expr>,
        alternate: Box<Expr>,
    }, // condition ? consequent : alternate
    Grouping(Box<Expr>), // "(" expression ")"
    LiteralNumber(f64),
    LiteralString(String),
    LiteralBoolean(bool),
    LiteralNull,
    Logical {
        left: Box<Expr>,
        operator: Token,
        right: Box<Expr>,
    }, // and / or
    Postfix {
        operand: Box<Expr>,
        operator: Token,
    }, // ++ or --
    Unary {
        operator: Token,
        right: Box<Expr>,
    }, // ! or - (negate)
    Variable {
        name: Token,
    },
}

impl Expr {
    pub fn binary(left: Expr, operator: Token, right: Expr) -> Expr {
        Expr::Binary {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }

    pub fn logical(left: Expr, operator: Token, right: Expr) -> Expr {
        Expr::Logical {
            left: Box::new(left),
            operator,
            right: Box::new(right),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Stmt {
    Expression(Expr),
    If {
        condition: Expr,
        consequent: Vec<Stmt>,
        alternate: Vec<Stmt>,
    },
    Print {
        keyword: Token,
        expr: Expr,
    },
    Var {
        name: Token,
        initializer: Option<Expr>,
    },
    Block(Vec<Stmt>),
    While {
        condition: Expr,
        body: Box<Stmt>,
    },
    Break(Token),
}
