//! Recursive-descent formula parser
//!
//! Precedence, loosest first: comparison, `&`, `+ -`, `* /`, `^`, unary sign, `%`.

use super::FormulaError;
use super::lexer::{Token, tokenize};
use crate::sheet::cell_ref::CellRef;
use crate::sheet::value::ErrorValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Text(String),
    Bool(bool),
    Error(ErrorValue),
    Cell {
        sheet: Option<String>,
        cell: CellRef,
    },
    Range {
        sheet: Option<String>,
        start: CellRef,
        end: CellRef,
    },
    Name(String),
    Negate(Box<Expr>),
    Percent(Box<Expr>),
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

/// Parse formula text; a leading `=` is optional
pub fn parse(input: &str) -> Result<Expr, FormulaError> {
    let body = input.trim();
    let body = body.strip_prefix('=').unwrap_or(body);
    if body.trim().is_empty() {
        return Err(FormulaError::Empty);
    }
    let tokens = tokenize(body)?;
    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.comparison()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(FormulaError::UnexpectedToken(format!("{token:?}"))),
    }
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), FormulaError> {
        match self.next() {
            Some(ref token) if token == expected => Ok(()),
            Some(token) => Err(FormulaError::UnexpectedToken(format!("{token:?}"))),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn comparison(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.concat()?;
        loop {
            let op = match self.peek() {
                Some(Token::Eq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.concat()?;
            left = Self::binary(op, left, right);
        }
    }

    fn concat(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.additive()?;
        while self.eat(&Token::Ampersand) {
            let right = self.additive()?;
            left = Self::binary(BinaryOp::Concat, left, right);
        }
        Ok(left)
    }

    fn additive(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Self::binary(op, left, right);
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.power()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Mul,
                Some(Token::Slash) => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.power()?;
            left = Self::binary(op, left, right);
        }
    }

    fn power(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        while self.eat(&Token::Caret) {
            let right = self.unary()?;
            left = Self::binary(BinaryOp::Pow, left, right);
        }
        Ok(left)
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if self.eat(&Token::Minus) {
            return Ok(Expr::Negate(Box::new(self.unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.unary();
        }
        self.percent()
    }

    fn percent(&mut self) -> Result<Expr, FormulaError> {
        let mut expr = self.primary()?;
        while self.eat(&Token::Percent) {
            expr = Expr::Percent(Box::new(expr));
        }
        Ok(expr)
    }

    fn reference(&mut self, sheet: Option<String>, start: CellRef) -> Result<Expr, FormulaError> {
        if !self.eat(&Token::Colon) {
            return Ok(Expr::Cell { sheet, cell: start });
        }
        // The end of a range may repeat the sheet qualifier.
        if let Some(Token::Sheet(_)) = self.peek() {
            self.pos += 1;
        }
        match self.next() {
            Some(Token::Cell(end)) => Ok(Expr::Range {
                sheet,
                start: CellRef::new(start.column().min(end.column()), start.row().min(end.row()))
                    .map_err(|e| FormulaError::InvalidReference(e.to_string()))?,
                end: CellRef::new(start.column().max(end.column()), start.row().max(end.row()))
                    .map_err(|e| FormulaError::InvalidReference(e.to_string()))?,
            }),
            Some(token) => Err(FormulaError::InvalidReference(format!("{token:?}"))),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }

    fn primary(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::Text(s)) => Ok(Expr::Text(s)),
            Some(Token::Bool(b)) => Ok(Expr::Bool(b)),
            Some(Token::Error(e)) => Ok(Expr::Error(e)),
            Some(Token::Cell(cell)) => self.reference(None, cell),
            Some(Token::Sheet(sheet)) => match self.next() {
                Some(Token::Cell(cell)) => self.reference(Some(sheet), cell),
                Some(token) => Err(FormulaError::InvalidReference(format!("{sheet}!{token:?}"))),
                None => Err(FormulaError::UnexpectedEnd),
            },
            Some(Token::Name(name)) | Some(Token::Field(name)) => Ok(Expr::Name(name)),
            Some(Token::Function(name)) => {
                self.expect(&Token::LParen)?;
                let mut args = Vec::new();
                if !self.eat(&Token::RParen) {
                    loop {
                        args.push(self.comparison()?);
                        if self.eat(&Token::Comma) {
                            continue;
                        }
                        self.expect(&Token::RParen)?;
                        break;
                    }
                }
                Ok(Expr::Call { name, args })
            }
            Some(Token::LParen) => {
                let inner = self.comparison()?;
                self.expect(&Token::RParen)?;
                Ok(inner)
            }
            Some(token) => Err(FormulaError::UnexpectedToken(format!("{token:?}"))),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}
