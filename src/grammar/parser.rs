//! Wire text → typed `Message`. See `grammar::minifier` for the inverse
//! direction; `parse(minify(m)) == m` is the round-trip property this pairs
//! with.

use super::ast::*;
use super::lexer::{Lexer, Token, TokenKind};
use super::ParseError;
use crate::value::Value;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Parse a complete wire message: a header line, a newline, then a
/// semicolon-separated statement body.
pub fn parse(text: &str) -> Result<Message, ParseError> {
    let newline_at = text.find('\n').ok_or_else(|| ParseError {
        line: 1,
        column: 1,
        message: "message is missing the header/body newline separator".into(),
    })?;
    let header_src = &text[..newline_at];
    let body_src = &text[newline_at + 1..];

    let header = parse_header(header_src)?;
    let statements = parse_body(body_src)?;
    Ok(Message::new(header, statements))
}

fn parse_header(src: &str) -> Result<Header, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("H")?;
    p.expect_ident("v")?;
    let version = p.expect_int()? as u32;

    p.expect_ident("id")?;
    p.expect_symbol('=')?;
    let message_id = p.expect_ident_any()?;

    p.expect_ident("src")?;
    p.expect_symbol('=')?;
    let source = p.expect_ident_any()?;

    p.expect_ident("dst")?;
    p.expect_symbol('=')?;
    let destination = p.expect_ident_any()?;

    p.expect_ident("ts")?;
    p.expect_symbol('=')?;
    let timestamp = p.expect_int()?;

    let mut header = Header::new(version, message_id, source, destination, timestamp);

    if p.peek_is_ident("corr") {
        p.bump();
        p.expect_symbol('=')?;
        if p.peek_is_symbol('-') {
            p.bump();
        } else {
            header.correlation = Some(p.expect_ident_any()?);
        }
    }

    if p.peek_is_ident("ttl") {
        p.bump();
        p.expect_symbol('=')?;
        header.ttl = Some(p.expect_u32()?);
    }

    p.expect_eof()?;
    Ok(header)
}

fn parse_body(src: &str) -> Result<Vec<Statement>, ParseError> {
    let mut statements = Vec::new();
    for segment in split_statements(src) {
        let trimmed = segment.trim();
        if trimmed.is_empty() {
            continue;
        }
        statements.push(parse_statement(trimmed)?);
    }
    Ok(statements)
}

/// Splits on top-level `;` — i.e. not inside `()`, `[]`, `{}` or a string
/// literal. The trailing empty segment after the final `;` is dropped by the
/// caller (it trims to an empty string).
fn split_statements(src: &str) -> Vec<&str> {
    let bytes = src.as_bytes();
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escape = false;
    let mut start = 0usize;
    let mut out = Vec::new();

    for (i, &b) in bytes.iter().enumerate() {
        if in_string {
            if escape {
                escape = false;
            } else if b == b'\\' {
                escape = true;
            } else if b == b'"' {
                in_string = false;
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth -= 1,
            b';' if depth == 0 => {
                out.push(&src[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    if start < src.len() {
        out.push(&src[start..]);
    }
    out
}

fn parse_statement(src: &str) -> Result<Statement, ParseError> {
    let keyword = leading_keyword(src)?;
    match keyword {
        "DO" => parse_action(src).map(Statement::Action),
        "ASK" => parse_query(src).map(Statement::Query),
        "SET" => parse_assert(src).map(Statement::Assert),
        "IF" => parse_control(src).map(Statement::Control),
        "EVENT" => parse_event(src).map(Statement::Event),
        "ERROR" => parse_error_stmt(src).map(Statement::Error),
        "FOLD" => parse_fold(src).map(Statement::Fold),
        "RECALL" => parse_recall(src).map(Statement::Recall),
        "SUB" => parse_subscribe(src).map(Statement::Subscribe),
        "UNSUB" => parse_unsubscribe(src).map(Statement::Unsubscribe),
        "KNOW" => parse_knowledge(src).map(Statement::Knowledge),
        other => Err(ParseError {
            line: 1,
            column: 1,
            message: format!("unknown statement keyword '{other}'"),
        }),
    }
}

fn leading_keyword(src: &str) -> Result<&str, ParseError> {
    let mut lexer = Lexer::new(src);
    let tok = lexer.next_token()?;
    match tok.kind {
        TokenKind::Ident(_) => Ok(lexer.slice(tok.start, tok.end)),
        _ => Err(ParseError {
            line: tok.line,
            column: tok.column,
            message: "expected a statement keyword".into(),
        }),
    }
}

fn parse_action(src: &str) -> Result<ActionStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("DO")?;
    let verb = p.expect_ident_any()?;
    p.expect_symbol('(')?;
    let (positional, named) = p.parse_args(')')?;
    p.expect_symbol(')')?;

    let mut policy = None;
    let mut priority = None;
    let mut reason = None;

    // The grammar only defines a bare `P:<name>` form; `PolicySpec.expr`
    // exists for callers constructing statements in code (see `ast.rs`) but
    // has no wire syntax of its own — the concrete example in the protocol
    // only ever shows `P:security`.
    if p.peek_is_ident("P") {
        p.bump();
        p.expect_symbol(':')?;
        let name = p.expect_ident_any()?;
        policy = Some(PolicySpec { name, expr: None });
    }

    if p.peek_is_ident("PRIO") {
        p.bump();
        p.expect_symbol('=')?;
        let name = p.expect_ident_any()?;
        priority = Some(Priority::parse(&name).ok_or_else(|| p.error(format!(
            "invalid priority '{name}'"
        )))?);
    }

    if p.peek_is_ident("BECAUSE") {
        p.bump();
        reason = Some(p.raw_rest().trim().to_string());
    } else {
        p.expect_eof()?;
    }

    Ok(ActionStatement {
        verb,
        positional,
        named,
        policy,
        priority,
        reason,
    })
}

fn parse_query(src: &str) -> Result<QueryStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("ASK")?;
    let rest_start = p.cursor_offset();
    let rest = p.raw_from(rest_start);
    let (expr_part, constraint_part) = split_on_keyword(rest, "WHERE");
    Ok(QueryStatement {
        expression: expr_part.trim().to_string(),
        constraint: constraint_part.map(|s| s.trim().to_string()),
    })
}

fn parse_assert(src: &str) -> Result<AssertStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("SET")?;
    let path = p.expect_ident_any()?;
    p.expect_symbol('=')?;
    let value = p.parse_value()?;
    p.expect_eof()?;
    Ok(AssertStatement { path, value })
}

fn parse_control(src: &str) -> Result<ControlStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("IF")?;
    let cond_start = p.cursor_offset();
    let rest = p.raw_from(cond_start);
    let (cond_part, after_then) = split_on_keyword(rest, "THEN")
        .1
        .map(|after| (split_on_keyword(rest, "THEN").0, Some(after)))
        .unwrap_or_else(|| (rest, None));
    let after_then = after_then.ok_or_else(|| p.error("IF without THEN".into()))?;
    let (then_part, else_part) = split_on_keyword(after_then, "ELSE");

    Ok(ControlStatement {
        condition: cond_part.trim().to_string(),
        then: Box::new(parse_statement(then_part.trim())?),
        otherwise: match else_part {
            Some(e) => Some(Box::new(parse_statement(e.trim())?)),
            None => None,
        },
    })
}

fn parse_event(src: &str) -> Result<EventStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("EVENT")?;
    let name = p.expect_ident_any()?;
    p.expect_symbol('(')?;
    let (positional, named) = p.parse_args(')')?;
    p.expect_symbol(')')?;
    p.expect_eof()?;
    Ok(EventStatement {
        name,
        positional,
        named,
    })
}

fn parse_error_stmt(src: &str) -> Result<ErrorStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("ERROR")?;
    let code = p.expect_ident_any()?;
    let message = if p.peek_is_str() {
        Some(p.expect_str()?)
    } else {
        None
    };
    p.expect_eof()?;
    Ok(ErrorStatement { code, message })
}

fn parse_fold(src: &str) -> Result<FoldStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("FOLD")?;
    let id = p.expect_ident_any()?;
    let summary = p.expect_str()?;
    let state = if !p.at_eof() {
        let value = p.parse_value()?;
        match value {
            Value::Object(_) | Value::Null => Some(value),
            _ => {
                return Err(p.error("fold state must be an object".into()));
            }
        }
    } else {
        None
    };
    p.expect_eof()?;
    Ok(FoldStatement { id, summary, state })
}

fn parse_recall(src: &str) -> Result<RecallStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("RECALL")?;
    let fold_id = p.expect_ident_any()?;
    p.expect_eof()?;
    Ok(RecallStatement { fold_id })
}

fn parse_subscribe(src: &str) -> Result<SubscribeStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("SUB")?;
    let pattern = p.expect_ident_any()?;
    let filter = if p.peek_is_ident("WHEN") {
        p.bump();
        Some(p.raw_rest().trim().to_string())
    } else {
        None
    };
    p.expect_eof()?;
    Ok(SubscribeStatement { pattern, filter })
}

fn parse_unsubscribe(src: &str) -> Result<UnsubscribeStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("UNSUB")?;
    let pattern = p.expect_ident_any()?;
    p.expect_eof()?;
    Ok(UnsubscribeStatement { pattern })
}

fn parse_knowledge(src: &str) -> Result<KnowledgeStatement, ParseError> {
    let mut p = TokenCursor::new(src);
    p.expect_ident("KNOW")?;
    let topic = p.expect_ident_any()?;
    p.expect_symbol('=')?;
    let value = p.parse_value()?;
    p.expect_symbol('@')?;
    let version = p.expect_int()? as u64;
    p.expect_eof()?;
    Ok(KnowledgeStatement {
        topic,
        value,
        version,
    })
}

/// Splits `src` at the first top-level occurrence of `keyword` (a bare,
/// whole-word identifier), returning `(before, Some(after))`, or
/// `(src, None)` if the keyword does not occur.
fn split_on_keyword<'a>(src: &'a str, keyword: &str) -> (&'a str, Option<&'a str>) {
    let mut lexer = Lexer::new(src);
    loop {
        let tok = match lexer.next_token() {
            Ok(t) => t,
            Err(_) => return (src, None),
        };
        match tok.kind {
            TokenKind::Eof => return (src, None),
            TokenKind::Ident(ref name) if name == keyword => {
                return (&src[..tok.start], Some(&src[tok.end..]));
            }
            _ => {}
        }
    }
}

/// Thin cursor over a `Lexer` with one-token lookahead, plus the raw-span
/// helpers the parser needs to capture embedded expression text verbatim.
struct TokenCursor<'a> {
    lexer: Lexer<'a>,
    lookahead: Token,
}

impl<'a> TokenCursor<'a> {
    fn new(src: &'a str) -> Self {
        let mut lexer = Lexer::new(src);
        let lookahead = lexer.next_token().unwrap_or(Token {
            kind: TokenKind::Eof,
            line: 1,
            column: 1,
            start: 0,
            end: 0,
        });
        Self { lexer, lookahead }
    }

    fn error(&self, message: String) -> ParseError {
        ParseError {
            line: self.lookahead.line,
            column: self.lookahead.column,
            message,
        }
    }

    fn bump(&mut self) -> Token {
        let next = self.lexer.next_token().unwrap_or(Token {
            kind: TokenKind::Eof,
            line: self.lookahead.line,
            column: self.lookahead.column,
            start: self.lookahead.end,
            end: self.lookahead.end,
        });
        std::mem::replace(&mut self.lookahead, next)
    }

    fn peek_is_ident(&self, name: &str) -> bool {
        matches!(&self.lookahead.kind, TokenKind::Ident(s) if s == name)
    }

    fn peek_is_symbol(&self, c: char) -> bool {
        matches!(self.lookahead.kind, TokenKind::Symbol(s) if s == c)
    }

    fn peek_is_str(&self) -> bool {
        matches!(self.lookahead.kind, TokenKind::Str(_))
    }

    fn at_eof(&self) -> bool {
        matches!(self.lookahead.kind, TokenKind::Eof)
    }

    fn expect_ident(&mut self, name: &str) -> Result<(), ParseError> {
        if self.peek_is_ident(name) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected '{name}'")))
        }
    }

    fn expect_ident_any(&mut self) -> Result<String, ParseError> {
        match &self.lookahead.kind {
            TokenKind::Ident(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            _ => Err(self.error("expected an identifier".into())),
        }
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), ParseError> {
        if self.peek_is_symbol(c) {
            self.bump();
            Ok(())
        } else {
            Err(self.error(format!("expected '{c}'")))
        }
    }

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        match self.lookahead.kind {
            TokenKind::Int(i) => {
                self.bump();
                Ok(i)
            }
            _ => Err(self.error("expected an integer".into())),
        }
    }

    /// Like `expect_int`, but rejects negative values — for fields the
    /// grammar types as `u32` (e.g. `ttl`), where a negative literal is
    /// malformed input rather than a value to silently truncate.
    fn expect_u32(&mut self) -> Result<u32, ParseError> {
        let (line, column) = (self.lookahead.line, self.lookahead.column);
        let value = self.expect_int()?;
        u32::try_from(value).map_err(|_| ParseError {
            line,
            column,
            message: format!("expected a non-negative integer, got {value}"),
        })
    }

    fn expect_str(&mut self) -> Result<String, ParseError> {
        match &self.lookahead.kind {
            TokenKind::Str(s) => {
                let s = s.clone();
                self.bump();
                Ok(s)
            }
            _ => Err(self.error("expected a string literal".into())),
        }
    }

    fn expect_eof(&mut self) -> Result<(), ParseError> {
        if self.at_eof() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing tokens".into()))
        }
    }

    /// Byte offset (into the segment this cursor was built from) of the
    /// current lookahead token's start — used to capture raw expression text.
    fn cursor_offset(&self) -> usize {
        self.lookahead.start
    }

    fn raw_from(&self, start: usize) -> &'a str {
        let src = self.lexer.source();
        &src[start..]
    }

    fn raw_rest(&self) -> &'a str {
        self.raw_from(self.cursor_offset())
    }

    fn parse_value(&mut self) -> Result<Value, ParseError> {
        let value = match self.lookahead.kind.clone() {
            TokenKind::Str(s) => {
                self.bump();
                Value::String(s)
            }
            TokenKind::Int(i) => {
                self.bump();
                Value::Integer(i)
            }
            TokenKind::Float(f) => {
                self.bump();
                Value::Float(f)
            }
            TokenKind::Ident(name) => {
                self.bump();
                match name.as_str() {
                    "true" => Value::Boolean(true),
                    "false" => Value::Boolean(false),
                    "null" => Value::Null,
                    _ => Value::Path(name),
                }
            }
            TokenKind::Symbol('[') => {
                self.bump();
                let mut items = Vec::new();
                if !self.peek_is_symbol(']') {
                    loop {
                        items.push(self.parse_value()?);
                        if self.peek_is_symbol(',') {
                            self.bump();
                            continue;
                        }
                        break;
                    }
                }
                self.expect_symbol(']')?;
                Value::List(items)
            }
            TokenKind::Symbol('{') => {
                self.bump();
                let mut map = BTreeMap::new();
                if !self.peek_is_symbol('}') {
                    loop {
                        let key = match self.lookahead.kind.clone() {
                            TokenKind::Ident(s) => {
                                self.bump();
                                s
                            }
                            TokenKind::Str(s) => {
                                self.bump();
                                s
                            }
                            _ => return Err(self.error("expected an object key".into())),
                        };
                        self.expect_symbol(':')?;
                        let value = self.parse_value()?;
                        map.insert(key, value);
                        if self.peek_is_symbol(',') {
                            self.bump();
                            continue;
                        }
                        break;
                    }
                }
                self.expect_symbol('}')?;
                Value::Object(map)
            }
            _ => return Err(self.error("expected a value".into())),
        };
        Ok(value)
    }

    /// Parses a comma-separated argument list: positional values first, then
    /// `name=value` named args (kept in submission order), stopping before
    /// `terminator`.
    fn parse_args(
        &mut self,
        terminator: char,
    ) -> Result<(Vec<Value>, IndexMap<String, Value>), ParseError> {
        let mut positional = Vec::new();
        let mut named = IndexMap::new();
        if self.peek_is_symbol(terminator) {
            return Ok((positional, named));
        }
        loop {
            if let TokenKind::Ident(name) = self.lookahead.kind.clone() {
                // Look ahead one more token to see if this is `name=value`.
                let save = self.lookahead.clone();
                let saved_lexer_pos = self.lexer.current_pos();
                self.bump();
                if self.peek_is_symbol('=') {
                    self.bump();
                    let value = self.parse_value()?;
                    named.insert(name, value);
                } else {
                    // Not a named arg; re-interpret the identifier as a
                    // positional literal/path value.
                    let value = match name.as_str() {
                        "true" => Value::Boolean(true),
                        "false" => Value::Boolean(false),
                        "null" => Value::Null,
                        _ => Value::Path(name),
                    };
                    positional.push(value);
                    let _ = (save, saved_lexer_pos);
                }
            } else {
                positional.push(self.parse_value()?);
            }
            if self.peek_is_symbol(',') {
                self.bump();
                continue;
            }
            break;
        }
        Ok((positional, named))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_with_correlation_and_ttl() {
        let msg = parse("H v 1 id=m1 src=a dst=b ts=1000 corr=m0 ttl=30\nDO noop();").unwrap();
        assert_eq!(msg.header.version, 1);
        assert_eq!(msg.header.message_id, "m1");
        assert_eq!(msg.header.correlation.as_deref(), Some("m0"));
        assert_eq!(msg.header.ttl, Some(30));
    }

    #[test]
    fn negative_ttl_is_a_parse_error() {
        let err = parse("H v 1 id=m1 src=a dst=b ts=1000 ttl=-5\nDO noop();").unwrap_err();
        assert!(err.message.contains("non-negative"));
    }

    #[test]
    fn parses_header_with_explicit_no_correlation() {
        let msg = parse("H v 1 id=m1 src=a dst=b ts=1000 corr=-\nDO noop();").unwrap();
        assert_eq!(msg.header.correlation, None);
    }

    #[test]
    fn parses_action_with_guardrail() {
        let msg = parse(
            "H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(\"app1\",version=42) P:security PRIO=HIGH BECAUSE balance>1000;",
        )
        .unwrap();
        match &msg.statements[0] {
            Statement::Action(a) => {
                assert_eq!(a.verb, "deploy");
                assert_eq!(a.positional, vec![Value::String("app1".into())]);
                assert_eq!(a.named.get("version"), Some(&Value::Integer(42)));
                assert_eq!(a.priority, Some(Priority::High));
                assert_eq!(a.reason.as_deref(), Some("balance>1000"));
                assert_eq!(a.policy.as_ref().unwrap().name, "security");
            }
            other => panic!("expected action, got {other:?}"),
        }
    }

    #[test]
    fn parses_knowledge_statement() {
        let msg = parse("H v 1 id=m1 src=a dst=b ts=1000\nKNOW system.cpu=90@2;").unwrap();
        match &msg.statements[0] {
            Statement::Knowledge(k) => {
                assert_eq!(k.topic, "system.cpu");
                assert_eq!(k.value, Value::Integer(90));
                assert_eq!(k.version, 2);
            }
            other => panic!("expected knowledge, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_reports_line_and_column() {
        let err = parse("H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(;").unwrap_err();
        assert!(err.line >= 1);
    }
}
