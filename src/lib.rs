//! SAG: wire grammar, expression evaluator and the stateful engines that sit
//! behind an agent's inbox — schema validation, routing, folding,
//! correlation, and a versioned knowledge store.
//!
//! This crate ships no transport, no persistence, and no authentication. It
//! parses and minifies messages, evaluates the guardrail/query expressions
//! embedded in them, and gives callers a handful of synchronous, per-agent
//! engines to drive the rest. Everything else — sockets, queues, on-disk
//! state, session auth — is the host application's job.
//!
//! ```text
//! wire text -> grammar::parse -> Message -> sanitizer::Sanitizer -> accepted/rejected
//!                                    |
//!                                    +-> correlation::CorrelationEngine (threading)
//!                                    +-> fold::FoldEngine (archive/restore)
//!                                    +-> knowledge::KnowledgeEngine (facts/subscriptions)
//! ```

pub mod config;
pub mod correlation;
pub mod error;
pub mod expr;
pub mod fold;
pub mod grammar;
pub mod knowledge;
pub mod sanitizer;
pub mod schema;
pub mod telemetry;
pub mod value;

pub use config::SagConfig;
pub use correlation::CorrelationEngine;
pub use error::{Error, ErrorCode, Result};
pub use expr::{evaluate, Context, Expr, MapContext};
pub use fold::FoldEngine;
pub use grammar::{
    minify, parse, reason_is_expression, ActionStatement, AssertStatement, ControlStatement,
    ErrorStatement, EventStatement, FoldStatement, Header, KnowledgeStatement, Message,
    MessageBuilder, ParseError, Priority, PolicySpec, QueryStatement, RecallStatement, Statement,
    SubscribeStatement, UnsubscribeStatement,
};
pub use knowledge::{Fact, KnowledgeEngine, Subscription};
pub use sanitizer::routing::{AgentRegistry, RouteGuard};
pub use sanitizer::{Sanitizer, SanitizerError, SanitizerResult};
pub use schema::{ArgType, ArgumentSpec, SchemaRegistry, SpecError, Validator, VerbSchema};
pub use value::Value;

pub const VERSION_MAJOR: u32 = 0;
pub const VERSION_MINOR: u32 = 1;
pub const VERSION_PATCH: u32 = 0;

/// The crate version as `MAJOR.MINOR.PATCH`.
pub fn version() -> String {
    format!("{}.{}.{}", VERSION_MAJOR, VERSION_MINOR, VERSION_PATCH)
}
