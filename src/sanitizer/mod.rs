//! The four-layer firewall a message crosses before an agent acts on it:
//! grammar parse, routing guard, schema validation, guardrail evaluation.
//! Layer 1 fails fast (there's no `Message` to keep validating once parsing
//! fails); layers 2-4 each run to completion and accumulate every failure so
//! a caller can fix a message in one pass instead of one error at a time.

pub mod routing;

use crate::error::{Error, ErrorCode};
use crate::expr::{evaluate, Context};
use crate::grammar::{parse, reason_is_expression, Message, Statement};
use crate::schema::{SchemaRegistry, Validator};
use routing::{AgentRegistry, RouteGuard};

/// One firewall-layer failure. Wraps the crate's central `Error` so the same
/// `ErrorCode` table in `error.rs` backs every layer, while staying its own
/// type so a `SanitizerResult` reads as "the sanitizer's findings" rather
/// than a grab-bag `Vec<Error>`.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct SanitizerError(#[from] pub Error);

impl SanitizerError {
    pub fn code(&self) -> ErrorCode {
        self.0.code()
    }
}

#[derive(Debug, Default)]
pub struct SanitizerResult {
    pub valid: bool,
    pub errors: Vec<SanitizerError>,
    /// The parsed message, when layer 1 succeeded — `None` only when
    /// `errors` contains exactly the parse failure.
    pub message: Option<Message>,
}

impl SanitizerResult {
    fn parse_failure(err: Error) -> Self {
        Self {
            valid: false,
            errors: vec![SanitizerError(err)],
            message: None,
        }
    }
}

pub struct Sanitizer<'a> {
    schemas: &'a SchemaRegistry,
    agents: &'a AgentRegistry,
}

impl<'a> Sanitizer<'a> {
    pub fn new(schemas: &'a SchemaRegistry, agents: &'a AgentRegistry) -> Self {
        Self { schemas, agents }
    }

    /// Runs all four layers. `from_agent`, when given, must match the
    /// parsed header's source — a mismatch is a routing failure, caught
    /// before the registry lookup even runs.
    pub fn sanitize(&self, raw_text: &str, from_agent: Option<&str>, ctx: &dyn Context) -> SanitizerResult {
        let message = match parse(raw_text) {
            Ok(m) => m,
            Err(e) => {
                tracing::debug!(error = %e, "sanitizer: grammar parse failed");
                return SanitizerResult::parse_failure(e.into());
            }
        };

        let mut errors = Vec::new();

        if let Some(claimed) = from_agent {
            if claimed != message.header.source {
                errors.push(SanitizerError(Error::RoutingDenied(format!(
                    "claimed sender '{claimed}' does not match header source '{}'",
                    message.header.source
                ))));
            }
        }
        let guard = RouteGuard::new(self.agents);
        if let Err(e) = guard.check(&message.header.source, &message.header.destination) {
            errors.push(SanitizerError(e));
        }

        let validator = Validator::new(self.schemas);
        for statement in &message.statements {
            match statement {
                Statement::Action(action) => {
                    if let Err(e) = validator.validate(action) {
                        errors.push(SanitizerError(e));
                    }
                }
                Statement::Event(event) => {
                    if let Err(e) = validator.validate_event(event) {
                        errors.push(SanitizerError(e));
                    }
                }
                _ => {}
            }
        }

        for statement in &message.statements {
            if let Statement::Action(action) = statement {
                let Some(reason) = &action.reason else {
                    continue;
                };
                if !reason_is_expression(reason) {
                    continue;
                }
                match evaluate(reason, ctx) {
                    Ok(value) if value.is_truthy() => {}
                    Ok(_) => {
                        errors.push(SanitizerError(Error::PreconditionFailed(format!(
                            "'{}' guardrail '{reason}' did not hold",
                            action.verb
                        ))));
                    }
                    Err(e) => errors.push(SanitizerError(e)),
                }
            }
        }

        let valid = errors.is_empty();
        tracing::debug!(
            message_id = %message.header.message_id,
            valid,
            error_count = errors.len(),
            "sanitizer pipeline complete"
        );
        SanitizerResult {
            valid,
            errors,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::MapContext;
    use crate::schema::{ArgType, ArgumentSpec, VerbSchema};
    use crate::value::Value;

    fn registries() -> (SchemaRegistry, AgentRegistry) {
        let mut schemas = SchemaRegistry::new();
        schemas.register(
            VerbSchema::new("deploy")
                .allow_extra_args(true)
                .with_named(ArgumentSpec::new("app", ArgType::String, false))
                .with_named(
                    ArgumentSpec::new("replicas", ArgType::Integer, false)
                        .with_range(Some(1.0), Some(100.0))
                        .unwrap(),
                )
                .with_named(
                    ArgumentSpec::new("env", ArgType::String, false).with_allowed_values(vec![
                        Value::String("staging".into()),
                        Value::String("production".into()),
                    ]),
                ),
        );
        let mut agents = AgentRegistry::new();
        agents.register("a", vec!["b".into()]);
        agents.register("b", vec![]);
        (schemas, agents)
    }

    #[test]
    fn valid_message_with_satisfied_guardrail_passes() {
        let (schemas, agents) = registries();
        let sanitizer = Sanitizer::new(&schemas, &agents);
        let mut ctx = MapContext::new();
        ctx.set("balance", Value::Integer(1500));
        let result = sanitizer.sanitize(
            "H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(\"app1\",version=42) P:security PRIO=HIGH BECAUSE balance>1000;",
            None,
            &ctx,
        );
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn guardrail_failure_is_reported() {
        let (schemas, agents) = registries();
        let sanitizer = Sanitizer::new(&schemas, &agents);
        let mut ctx = MapContext::new();
        ctx.set("balance", Value::Integer(500));
        let result = sanitizer.sanitize(
            "H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(\"app1\",version=42) P:security PRIO=HIGH BECAUSE balance>1000;",
            None,
            &ctx,
        );
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code() == ErrorCode::PreconditionFailed));
    }

    #[test]
    fn replicas_zero_fails_range_constraint() {
        let (schemas, agents) = registries();
        let sanitizer = Sanitizer::new(&schemas, &agents);
        let ctx = MapContext::new();
        let result = sanitizer.sanitize(
            "H v 1 id=m1 src=a dst=b ts=1000\nDO deploy(app=\"webapp\",replicas=0);",
            None,
            &ctx,
        );
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code() == ErrorCode::ValueOutOfRange));
    }

    #[test]
    fn unknown_destination_is_routing_denied() {
        let (schemas, agents) = registries();
        let sanitizer = Sanitizer::new(&schemas, &agents);
        let ctx = MapContext::new();
        let result = sanitizer.sanitize(
            "H v 1 id=m1 src=a dst=z ts=1000\nDO deploy(\"app1\");",
            None,
            &ctx,
        );
        assert!(!result.valid);
        assert!(result
            .errors
            .iter()
            .any(|e| e.code() == ErrorCode::RoutingDenied));
    }

    #[test]
    fn parse_failure_stops_the_pipeline() {
        let (schemas, agents) = registries();
        let sanitizer = Sanitizer::new(&schemas, &agents);
        let ctx = MapContext::new();
        let result = sanitizer.sanitize("not a message", None, &ctx);
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 1);
        assert!(result.message.is_none());
    }
}
