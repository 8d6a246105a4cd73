//! Shared expression AST and the `Context` callers implement to evaluate
//! against their own state. Parsing and evaluation are split deliberately:
//! the grammar parser stores expression *text* verbatim on the message AST
//! (`Query.expression`, `Control.condition`, `Subscribe.filter`,
//! `Action.reason`, `Action.policy_expr`); this module re-parses that text,
//! independently, only when something actually needs a value out of it. That
//! keeps the message AST serialization-stable and the evaluator re-entrant
//! against the same grammar rather than a second, divergent one.

pub mod eval;

use crate::grammar::ParseError;
use crate::value::Value;
use std::collections::BTreeMap;

pub use eval::{evaluate, Evaluator, MapContext};

/// The contract an evaluation context must satisfy. Paths are dot-segmented;
/// intermediate segments that don't resolve to an object yield `null` rather
/// than erroring — only the ordering/arithmetic operators themselves fail.
pub trait Context {
    fn get(&self, path: &str) -> Option<Value>;
    fn has(&self, path: &str) -> bool;
    fn set(&mut self, path: &str, value: Value);
    fn as_map(&self) -> BTreeMap<String, Value>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    Add,
    Sub,
    Mul,
    Div,
}

/// Parsed form of an expression string — built fresh each time an embedded
/// expression is evaluated, never stored on the message AST.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Value),
    Path(String),
    List(Vec<Expr>),
    Object(BTreeMap<String, Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
}

/// Parse an expression string into an `Expr`. Whitespace between tokens is
/// insignificant; the grammar does not carry it through expression
/// productions.
pub fn parse_expr(src: &str) -> Result<Expr, ParseError> {
    let mut lexer = ExprLexer::new(src);
    let mut parser = ExprParser {
        tokens: lexer.tokenize()?,
        pos: 0,
    };
    let expr = parser.parse_or()?;
    parser.expect_eof()?;
    Ok(expr)
}

#[derive(Debug, Clone, PartialEq)]
enum ExprTok {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Null,
    Path(String),
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Comma,
    Colon,
    Plus,
    Minus,
    Star,
    Slash,
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
    And,
    Or,
}

struct ExprLexer<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> ExprLexer<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            bytes: src.as_bytes(),
            pos: 0,
        }
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: 1,
            column: self.pos + 1,
            message: message.into(),
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<u8> {
        self.bytes.get(self.pos + offset).copied()
    }

    fn tokenize(&mut self) -> Result<Vec<ExprTok>, ParseError> {
        let mut out = Vec::new();
        loop {
            while matches!(self.peek(), Some(b' ') | Some(b'\t') | Some(b'\n') | Some(b'\r')) {
                self.pos += 1;
            }
            let Some(b) = self.peek() else { break };
            match b {
                b'(' => {
                    out.push(ExprTok::LParen);
                    self.pos += 1;
                }
                b')' => {
                    out.push(ExprTok::RParen);
                    self.pos += 1;
                }
                b'[' => {
                    out.push(ExprTok::LBracket);
                    self.pos += 1;
                }
                b']' => {
                    out.push(ExprTok::RBracket);
                    self.pos += 1;
                }
                b'{' => {
                    out.push(ExprTok::LBrace);
                    self.pos += 1;
                }
                b'}' => {
                    out.push(ExprTok::RBrace);
                    self.pos += 1;
                }
                b',' => {
                    out.push(ExprTok::Comma);
                    self.pos += 1;
                }
                b':' => {
                    out.push(ExprTok::Colon);
                    self.pos += 1;
                }
                b'+' => {
                    out.push(ExprTok::Plus);
                    self.pos += 1;
                }
                b'*' => {
                    out.push(ExprTok::Star);
                    self.pos += 1;
                }
                b'/' => {
                    out.push(ExprTok::Slash);
                    self.pos += 1;
                }
                b'-' => {
                    if matches!(self.peek_at(1), Some(b'0'..=b'9')) {
                        out.push(self.read_number());
                    } else {
                        out.push(ExprTok::Minus);
                        self.pos += 1;
                    }
                }
                b'=' if self.peek_at(1) == Some(b'=') => {
                    out.push(ExprTok::Eq);
                    self.pos += 2;
                }
                b'!' if self.peek_at(1) == Some(b'=') => {
                    out.push(ExprTok::Ne);
                    self.pos += 2;
                }
                b'>' if self.peek_at(1) == Some(b'=') => {
                    out.push(ExprTok::Ge);
                    self.pos += 2;
                }
                b'<' if self.peek_at(1) == Some(b'=') => {
                    out.push(ExprTok::Le);
                    self.pos += 2;
                }
                b'>' => {
                    out.push(ExprTok::Gt);
                    self.pos += 1;
                }
                b'<' => {
                    out.push(ExprTok::Lt);
                    self.pos += 1;
                }
                b'&' if self.peek_at(1) == Some(b'&') => {
                    out.push(ExprTok::And);
                    self.pos += 2;
                }
                b'|' if self.peek_at(1) == Some(b'|') => {
                    out.push(ExprTok::Or);
                    self.pos += 2;
                }
                b'"' => out.push(self.read_string()?),
                b'0'..=b'9' => out.push(self.read_number()),
                _ if b.is_ascii_alphabetic() => out.push(self.read_ident()),
                other => return Err(self.err(format!("unexpected character '{}'", other as char))),
            }
        }
        Ok(out)
    }

    fn read_number(&mut self) -> ExprTok {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let mut is_float = false;
        if self.peek() == Some(b'.') && matches!(self.peek_at(1), Some(b'0'..=b'9')) {
            is_float = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("0");
        if is_float {
            ExprTok::Float(text.parse().unwrap_or(0.0))
        } else {
            ExprTok::Int(text.parse().unwrap_or(0))
        }
    }

    fn read_string(&mut self) -> Result<ExprTok, ParseError> {
        self.pos += 1;
        let mut value = String::new();
        loop {
            match self.peek() {
                None => return Err(self.err("unterminated string literal")),
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                Some(b'\\') => {
                    self.pos += 1;
                    match self.peek() {
                        Some(b'"') => value.push('"'),
                        Some(b'\\') => value.push('\\'),
                        Some(b'n') => value.push('\n'),
                        Some(b'r') => value.push('\r'),
                        Some(b't') => value.push('\t'),
                        Some(other) => {
                            return Err(self.err(format!("invalid escape sequence '\\{}'", other as char)))
                        }
                        None => return Err(self.err("unterminated escape sequence")),
                    }
                    self.pos += 1;
                }
                Some(other) => {
                    value.push(other as char);
                    self.pos += 1;
                }
            }
        }
        Ok(ExprTok::Str(value))
    }

    fn read_ident(&mut self) -> ExprTok {
        let start = self.pos;
        while matches!(self.peek(), Some(b) if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'-')
        {
            self.pos += 1;
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).unwrap_or("");
        match text {
            "true" => ExprTok::Bool(true),
            "false" => ExprTok::Bool(false),
            "null" => ExprTok::Null,
            _ => ExprTok::Path(text.to_string()),
        }
    }
}

struct ExprParser {
    tokens: Vec<ExprTok>,
    pos: usize,
}

impl ExprParser {
    fn peek(&self) -> Option<&ExprTok> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<ExprTok> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn err(&self, message: impl Into<String>) -> ParseError {
        ParseError {
            line: 1,
            column: self.pos + 1,
            message: message.into(),
        }
    }

    fn expect_eof(&self) -> Result<(), ParseError> {
        if self.pos == self.tokens.len() {
            Ok(())
        } else {
            Err(self.err("unexpected trailing tokens in expression"))
        }
    }

    fn parse_or(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_and()?;
        while matches!(self.peek(), Some(ExprTok::Or)) {
            self.bump();
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_relational()?;
        while matches!(self.peek(), Some(ExprTok::And)) {
            self.bump();
            let right = self.parse_relational()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_relational(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_additive()?;
        loop {
            let op = match self.peek() {
                Some(ExprTok::Eq) => BinaryOp::Eq,
                Some(ExprTok::Ne) => BinaryOp::Ne,
                Some(ExprTok::Gt) => BinaryOp::Gt,
                Some(ExprTok::Lt) => BinaryOp::Lt,
                Some(ExprTok::Ge) => BinaryOp::Ge,
                Some(ExprTok::Le) => BinaryOp::Le,
                _ => break,
            };
            self.bump();
            let right = self.parse_additive()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_additive(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Some(ExprTok::Plus) => BinaryOp::Add,
                Some(ExprTok::Minus) => BinaryOp::Sub,
                _ => break,
            };
            self.bump();
            let right = self.parse_multiplicative()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_multiplicative(&mut self) -> Result<Expr, ParseError> {
        let mut left = self.parse_primary()?;
        loop {
            let op = match self.peek() {
                Some(ExprTok::Star) => BinaryOp::Mul,
                Some(ExprTok::Slash) => BinaryOp::Div,
                _ => break,
            };
            self.bump();
            let right = self.parse_primary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_primary(&mut self) -> Result<Expr, ParseError> {
        match self.bump() {
            Some(ExprTok::Int(i)) => Ok(Expr::Literal(Value::Integer(i))),
            Some(ExprTok::Float(f)) => Ok(Expr::Literal(Value::Float(f))),
            Some(ExprTok::Str(s)) => Ok(Expr::Literal(Value::String(s))),
            Some(ExprTok::Bool(b)) => Ok(Expr::Literal(Value::Boolean(b))),
            Some(ExprTok::Null) => Ok(Expr::Literal(Value::Null)),
            Some(ExprTok::Path(p)) => Ok(Expr::Path(p)),
            Some(ExprTok::LParen) => {
                let inner = self.parse_or()?;
                match self.bump() {
                    Some(ExprTok::RParen) => Ok(inner),
                    _ => Err(self.err("expected ')'")),
                }
            }
            Some(ExprTok::LBracket) => {
                let mut items = Vec::new();
                if !matches!(self.peek(), Some(ExprTok::RBracket)) {
                    loop {
                        items.push(self.parse_or()?);
                        if matches!(self.peek(), Some(ExprTok::Comma)) {
                            self.bump();
                            continue;
                        }
                        break;
                    }
                }
                match self.bump() {
                    Some(ExprTok::RBracket) => Ok(Expr::List(items)),
                    _ => Err(self.err("expected ']'")),
                }
            }
            Some(ExprTok::LBrace) => {
                let mut map = BTreeMap::new();
                if !matches!(self.peek(), Some(ExprTok::RBrace)) {
                    loop {
                        let key = match self.bump() {
                            Some(ExprTok::Path(p)) => p,
                            Some(ExprTok::Str(s)) => s,
                            _ => return Err(self.err("expected an object key")),
                        };
                        match self.bump() {
                            Some(ExprTok::Colon) => {}
                            _ => return Err(self.err("expected ':'")),
                        }
                        let value = self.parse_or()?;
                        map.insert(key, value);
                        if matches!(self.peek(), Some(ExprTok::Comma)) {
                            self.bump();
                            continue;
                        }
                        break;
                    }
                }
                match self.bump() {
                    Some(ExprTok::RBrace) => Ok(Expr::Object(map)),
                    _ => Err(self.err("expected '}'")),
                }
            }
            _ => Err(self.err("expected a value, path, or '('")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_relational_over_additive() {
        let expr = parse_expr("balance>1000").unwrap();
        assert_eq!(
            expr,
            Expr::Binary(
                BinaryOp::Gt,
                Box::new(Expr::Path("balance".into())),
                Box::new(Expr::Literal(Value::Integer(1000)))
            )
        );
    }

    #[test]
    fn parses_logical_with_lower_precedence_than_relational() {
        let expr = parse_expr("a>1&&b<2").unwrap();
        match expr {
            Expr::Binary(BinaryOp::And, _, _) => {}
            other => panic!("expected top-level &&, got {other:?}"),
        }
    }

    #[test]
    fn whitespace_between_tokens_is_insignificant() {
        let a = parse_expr("a > 1 && b < 2").unwrap();
        let b = parse_expr("a>1&&b<2").unwrap();
        assert_eq!(a, b);
    }
}
