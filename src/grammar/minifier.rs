//! Typed `Message` → canonical wire text, the inverse of `grammar::parser`.
//!
//! Produces the compact form the protocol calls canonical: no insignificant
//! whitespace, a single space between header fields, a single `\n` between
//! header and body, `;`-separated statements, named args after positional
//! args with no space around their `,` separator. `parse(minify(m)) == m` for
//! every `m` the parser can produce — see `tests/roundtrip.rs`.

use super::ast::*;
use crate::value::Value;

/// Render a message to its canonical wire text.
pub fn minify(msg: &Message) -> String {
    let mut out = minify_header(&msg.header);
    out.push('\n');
    for (i, stmt) in msg.statements.iter().enumerate() {
        if i > 0 {
            out.push(';');
        }
        minify_statement(stmt, &mut out);
    }
    if !msg.statements.is_empty() {
        out.push(';');
    }
    out
}

fn minify_header(h: &Header) -> String {
    let mut out = format!(
        "H v {} id={} src={} dst={} ts={}",
        h.version, h.message_id, h.source, h.destination, h.timestamp
    );
    match &h.correlation {
        Some(c) => out.push_str(&format!(" corr={c}")),
        None => {}
    }
    if let Some(ttl) = h.ttl {
        out.push_str(&format!(" ttl={ttl}"));
    }
    out
}

fn minify_statement(stmt: &Statement, out: &mut String) {
    match stmt {
        Statement::Action(a) => minify_action(a, out),
        Statement::Query(q) => minify_query(q, out),
        Statement::Assert(a) => minify_assert(a, out),
        Statement::Control(c) => minify_control(c, out),
        Statement::Event(e) => minify_event(e, out),
        Statement::Error(e) => minify_error(e, out),
        Statement::Fold(f) => minify_fold(f, out),
        Statement::Recall(r) => out.push_str(&format!("RECALL {}", r.fold_id)),
        Statement::Subscribe(s) => minify_subscribe(s, out),
        Statement::Unsubscribe(u) => out.push_str(&format!("UNSUB {}", u.pattern)),
        Statement::Knowledge(k) => minify_knowledge(k, out),
    }
}

fn minify_args(positional: &[Value], named: &indexmap::IndexMap<String, Value>) -> String {
    let mut parts = Vec::with_capacity(positional.len() + named.len());
    for v in positional {
        parts.push(minify_value(v));
    }
    for (name, v) in named {
        parts.push(format!("{name}={}", minify_value(v)));
    }
    parts.join(",")
}

fn minify_action(a: &ActionStatement, out: &mut String) {
    out.push_str("DO ");
    out.push_str(&a.verb);
    out.push('(');
    out.push_str(&minify_args(&a.positional, &a.named));
    out.push(')');
    if let Some(policy) = &a.policy {
        out.push_str(&format!(" P:{}", policy.name));
    }
    if let Some(priority) = a.priority {
        out.push_str(&format!(" PRIO={}", priority.as_str()));
    }
    if let Some(reason) = &a.reason {
        out.push_str(" BECAUSE ");
        out.push_str(reason);
    }
}

fn minify_query(q: &QueryStatement, out: &mut String) {
    out.push_str("ASK ");
    out.push_str(&q.expression);
    if let Some(constraint) = &q.constraint {
        out.push_str(" WHERE ");
        out.push_str(constraint);
    }
}

fn minify_assert(a: &AssertStatement, out: &mut String) {
    out.push_str(&format!("SET {}={}", a.path, minify_value(&a.value)));
}

fn minify_control(c: &ControlStatement, out: &mut String) {
    out.push_str("IF ");
    out.push_str(&c.condition);
    out.push_str(" THEN ");
    minify_statement(&c.then, out);
    if let Some(otherwise) = &c.otherwise {
        out.push_str(" ELSE ");
        minify_statement(otherwise, out);
    }
}

fn minify_event(e: &EventStatement, out: &mut String) {
    out.push_str("EVENT ");
    out.push_str(&e.name);
    out.push('(');
    out.push_str(&minify_args(&e.positional, &e.named));
    out.push(')');
}

fn minify_error(e: &ErrorStatement, out: &mut String) {
    out.push_str("ERROR ");
    out.push_str(&e.code);
    if let Some(message) = &e.message {
        out.push(' ');
        out.push_str(&minify_value(&Value::String(message.clone())));
    }
}

fn minify_fold(f: &FoldStatement, out: &mut String) {
    out.push_str("FOLD ");
    out.push_str(&f.id);
    out.push(' ');
    out.push_str(&minify_value(&Value::String(f.summary.clone())));
    if let Some(state) = &f.state {
        out.push(' ');
        out.push_str(&minify_value(state));
    }
}

fn minify_subscribe(s: &SubscribeStatement, out: &mut String) {
    out.push_str("SUB ");
    out.push_str(&s.pattern);
    if let Some(filter) = &s.filter {
        out.push_str(" WHEN ");
        out.push_str(filter);
    }
}

fn minify_knowledge(k: &KnowledgeStatement, out: &mut String) {
    out.push_str(&format!(
        "KNOW {}={}@{}",
        k.topic,
        minify_value(&k.value),
        k.version
    ));
}

/// Values emit in their source form: strings escape the same four sequences
/// the lexer accepts, numbers are not reformatted, paths/identifiers are
/// written bare.
pub fn minify_value(v: &Value) -> String {
    match v {
        Value::String(s) => format!("\"{}\"", escape_string(s)),
        Value::Integer(i) => i.to_string(),
        Value::Float(f) => format_float(*f),
        Value::Boolean(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Path(p) => p.clone(),
        Value::List(items) => {
            let inner: Vec<String> = items.iter().map(minify_value).collect();
            format!("[{}]", inner.join(","))
        }
        Value::Object(map) => {
            let inner: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}:{}", minify_value(v)))
                .collect();
            format!("{{{}}}", inner.join(","))
        }
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out
}

/// Floats always keep a decimal point so they re-lex as `Float`, never
/// `Int` — `3.0` stays `3.0`, not `3`.
fn format_float(f: f64) -> String {
    let s = f.to_string();
    if s.contains('.') || s.contains('e') || s.contains('E') {
        s
    } else {
        format!("{s}.0")
    }
}

/// `ceil(len(wire)/4)` — the protocol's token-count heuristic, used for
/// budgeting/telemetry only; it is not part of the wire format.
pub fn token_count(wire: &str) -> usize {
    wire.len().div_ceil(4)
}

/// A JSON-equivalent rendering of a message, for comparison/debugging only —
/// never emitted on the wire and not parsed back by `grammar::parser::parse`.
pub fn to_json_equivalent(msg: &Message) -> serde_json::Value {
    serde_json::to_value(msg).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parser::parse;

    #[test]
    fn minifies_action_with_guardrail() {
        let msg = parse(
            "H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(\"app1\",version=42) P:security PRIO=HIGH BECAUSE balance>1000;",
        )
        .unwrap();
        let wire = minify(&msg);
        assert_eq!(
            wire,
            "H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(\"app1\",version=42) P:security PRIO=HIGH BECAUSE balance>1000;"
        );
    }

    #[test]
    fn round_trips_through_parse() {
        let original =
            "H v 1 id=m1 src=a dst=b ts=1000 corr=m0 ttl=30\nKNOW system.cpu=90@2;SET x.y=true;";
        let msg = parse(original).unwrap();
        let wire = minify(&msg);
        let reparsed = parse(&wire).unwrap();
        assert_eq!(msg, reparsed);
    }

    #[test]
    fn token_count_is_len_over_four_rounded_up() {
        assert_eq!(token_count("abcd"), 1);
        assert_eq!(token_count("abcde"), 2);
        assert_eq!(token_count(""), 0);
    }

    #[test]
    fn float_keeps_decimal_point() {
        assert_eq!(minify_value(&Value::Float(3.0)), "3.0");
        assert_eq!(minify_value(&Value::Float(3.5)), "3.5");
    }
}
