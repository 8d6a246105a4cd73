//! Typed representation of a SAG message. Building one of these (directly, or
//! via [`crate::grammar::parser::parse`]) and handing it to
//! [`crate::grammar::minifier::minify`] must reproduce the identical message —
//! see the round-trip tests in `tests/roundtrip.rs`.

use crate::value::Value;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub version: u32,
    pub message_id: String,
    pub source: String,
    pub destination: String,
    /// Seconds since the Unix epoch. The wire grammar is agnostic to
    /// sub-second precision; callers that need milliseconds must keep the
    /// unit consistent across the whole deployment (see crate-level docs).
    pub timestamp: i64,
    pub correlation: Option<String>,
    pub ttl: Option<u32>,
}

impl Header {
    pub fn new(
        version: u32,
        message_id: impl Into<String>,
        source: impl Into<String>,
        destination: impl Into<String>,
        timestamp: i64,
    ) -> Self {
        Self {
            version,
            message_id: message_id.into(),
            source: source.into(),
            destination: destination.into(),
            timestamp,
            correlation: None,
            ttl: None,
        }
    }

    pub fn with_correlation(mut self, correlation: impl Into<String>) -> Self {
        self.correlation = Some(correlation.into());
        self
    }

    pub fn with_ttl(mut self, ttl: u32) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Critical,
}

impl Priority {
    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Critical => "CRITICAL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Priority::Low),
            "NORMAL" => Some(Priority::Normal),
            "HIGH" => Some(Priority::High),
            "CRITICAL" => Some(Priority::Critical),
            _ => None,
        }
    }
}

/// The eleven statement kinds a message body can carry, in the order they
/// appeared in the source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum Statement {
    Action(ActionStatement),
    Query(QueryStatement),
    Assert(AssertStatement),
    Control(ControlStatement),
    Event(EventStatement),
    Error(ErrorStatement),
    Fold(FoldStatement),
    Recall(RecallStatement),
    Subscribe(SubscribeStatement),
    Unsubscribe(UnsubscribeStatement),
    Knowledge(KnowledgeStatement),
}

/// `P:<name>` or `P:<name>(<expr>)` attached to an action — a named policy,
/// optionally carrying its own guard expression.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicySpec {
    pub name: String,
    pub expr: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionStatement {
    pub verb: String,
    pub positional: Vec<Value>,
    /// Insertion order matters: the minifier re-emits named args in the
    /// order the agent submitted them and the validator reports the first
    /// failure in that same order, per the wire grammar's ordering contract.
    pub named: IndexMap<String, Value>,
    pub policy: Option<PolicySpec>,
    pub priority: Option<Priority>,
    /// Free text, or an expression (per the heuristic discriminator in
    /// `reason_is_expression`) giving the rationale for the action.
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryStatement {
    /// Raw expression source, preserved verbatim (not pre-parsed) so the
    /// minifier can reproduce it exactly.
    pub expression: String,
    pub constraint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssertStatement {
    pub path: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlStatement {
    pub condition: String,
    pub then: Box<Statement>,
    pub otherwise: Option<Box<Statement>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventStatement {
    pub name: String,
    pub positional: Vec<Value>,
    pub named: IndexMap<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorStatement {
    pub code: String,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldStatement {
    pub id: String,
    pub summary: String,
    pub state: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallStatement {
    pub fold_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscribeStatement {
    pub pattern: String,
    pub filter: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnsubscribeStatement {
    pub pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStatement {
    pub topic: String,
    pub value: Value,
    pub version: u64,
}

/// A fully-parsed message: one header plus an ordered statement sequence.
/// Immutable once constructed — mutate by building a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub header: Header,
    pub statements: Vec<Statement>,
}

impl Message {
    pub fn new(header: Header, statements: Vec<Statement>) -> Self {
        Self { header, statements }
    }

    pub fn builder(header: Header) -> MessageBuilder {
        MessageBuilder {
            header,
            statements: Vec::new(),
        }
    }
}

/// Fluent builder mirroring the builder style used elsewhere in this crate's
/// lineage (`Pattern::builder()`), for callers assembling a message in code
/// rather than parsing it from wire text.
pub struct MessageBuilder {
    header: Header,
    statements: Vec<Statement>,
}

impl MessageBuilder {
    pub fn statement(mut self, statement: Statement) -> Self {
        self.statements.push(statement);
        self
    }

    pub fn build(self) -> Message {
        Message {
            header: self.header,
            statements: self.statements,
        }
    }
}

/// The heuristic discriminator from the protocol's open question: an
/// `Action.reason` that looks like an expression (contains a comparison or
/// logical operator) is treated as a guardrail expression by the sanitizer
/// rather than free-text rationale. This is acknowledged as imperfect and
/// preserved as-is rather than "fixed".
pub fn reason_is_expression(reason: &str) -> bool {
    ["==", "!=", "<=", ">=", "&&", "||", "<", ">"]
        .iter()
        .any(|op| reason.contains(op))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reason_discriminator_flags_comparisons() {
        assert!(reason_is_expression("status == \"ready\""));
        assert!(!reason_is_expression("because it was requested"));
    }

    #[test]
    fn priority_round_trips_through_wire_string() {
        for p in [
            Priority::Low,
            Priority::Normal,
            Priority::High,
            Priority::Critical,
        ] {
            assert_eq!(Priority::parse(p.as_str()), Some(p));
        }
    }
}
