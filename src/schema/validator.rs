//! Validates an `ActionStatement` against a registered `VerbSchema`.
//!
//! Checks run in the fixed order the protocol specifies — positional args by
//! index, then named args, then (per present value) enum before pattern
//! before range — because the error returned for a given malformed action is
//! part of the tested contract, not an implementation detail.

use super::registry::SchemaRegistry;
use super::types::{ArgumentSpec, VerbSchema};
use crate::error::Error;
use crate::grammar::{ActionStatement, EventStatement};
use crate::value::Value;
use indexmap::IndexMap;

pub struct Validator<'a> {
    registry: &'a SchemaRegistry,
}

impl<'a> Validator<'a> {
    pub fn new(registry: &'a SchemaRegistry) -> Self {
        Self { registry }
    }

    /// `Ok(())` for both "valid" and "no schema registered for this verb"
    /// (validation is opt-in); `Err` carries the first violation found.
    pub fn validate(&self, action: &ActionStatement) -> Result<(), Error> {
        if action.verb.trim().is_empty() {
            return Err(Error::InvalidAction("action has an empty verb".into()));
        }
        let Some(schema) = self.registry.get(&action.verb) else {
            return Ok(());
        };
        Self::validate_call(schema, &action.positional, &action.named)
    }

    /// Events carry the same positional/named argument shape as actions and
    /// are checked against a schema registered under the event's name.
    pub fn validate_event(&self, event: &EventStatement) -> Result<(), Error> {
        if event.name.trim().is_empty() {
            return Err(Error::InvalidAction("event has an empty name".into()));
        }
        let Some(schema) = self.registry.get(&event.name) else {
            return Ok(());
        };
        Self::validate_call(schema, &event.positional, &event.named)
    }

    fn validate_call(
        schema: &VerbSchema,
        positional_args: &[Value],
        named_args: &IndexMap<String, Value>,
    ) -> Result<(), Error> {
        for (i, spec) in schema.positional.iter().enumerate() {
            match positional_args.get(i) {
                None if spec.required => return Err(Error::MissingArg(spec.name.clone())),
                None => {}
                Some(value) => {
                    check_type(spec, value)?;
                    check_constraints(spec, value)?;
                }
            }
        }
        if !schema.allow_extra_args && positional_args.len() > schema.positional.len() {
            return Err(Error::TooManyArgs(format!(
                "'{}' accepts at most {} positional argument(s), got {}",
                schema.verb,
                schema.positional.len(),
                positional_args.len()
            )));
        }

        for (key, value) in named_args {
            match schema.named.get(key) {
                None if !schema.allow_extra_args => {
                    return Err(Error::InvalidArgs(format!(
                        "unexpected named argument '{key}' for '{}'",
                        schema.verb
                    )))
                }
                None => {}
                Some(spec) => {
                    check_type(spec, value)?;
                    check_constraints(spec, value)?;
                }
            }
        }
        for spec in schema.named.values() {
            if spec.required && !named_args.contains_key(&spec.name) {
                return Err(Error::MissingArg(spec.name.clone()));
            }
        }

        Ok(())
    }
}

fn check_type(spec: &ArgumentSpec, value: &Value) -> Result<(), Error> {
    if spec.arg_type.accepts(value) {
        Ok(())
    } else {
        Err(Error::TypeMismatch {
            expected: spec.arg_type.to_string(),
            actual: value.type_name().to_string(),
        })
    }
}

/// Enum -> pattern -> range, in that order; `null` passes every constraint.
fn check_constraints(spec: &ArgumentSpec, value: &Value) -> Result<(), Error> {
    if matches!(value, Value::Null) {
        return Ok(());
    }
    if let Some(allowed) = &spec.allowed_values {
        if !allowed.contains(value) {
            return Err(Error::ValueNotAllowed(format!(
                "{value} is not one of the allowed values for '{}'",
                spec.name
            )));
        }
    }
    if let Some(pattern) = &spec.pattern {
        if let Some(s) = value.as_str() {
            if !pattern.is_match(s) {
                return Err(Error::PatternMismatch(format!(
                    "'{s}' does not match the required pattern for '{}'",
                    spec.name
                )));
            }
        }
    }
    if spec.min_value.is_some() || spec.max_value.is_some() {
        if let Some(n) = value.as_f64() {
            if let Some(min) = spec.min_value {
                if n < min {
                    return Err(Error::ValueOutOfRange(format!(
                        "{n} is below the minimum {min} for '{}'",
                        spec.name
                    )));
                }
            }
            if let Some(max) = spec.max_value {
                if n > max {
                    return Err(Error::ValueOutOfRange(format!(
                        "{n} is above the maximum {max} for '{}'",
                        spec.name
                    )));
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ArgType, VerbSchema};
    use indexmap::IndexMap;

    fn deploy_schema() -> VerbSchema {
        VerbSchema::new("deploy")
            .with_named(
                ArgumentSpec::new("app", ArgType::String, true)
                    .with_allowed_values(vec![
                        Value::String("webapp".into()),
                        Value::String("api".into()),
                    ]),
            )
            .with_named(
                ArgumentSpec::new("env", ArgType::String, false)
                    .with_allowed_values(vec![
                        Value::String("staging".into()),
                        Value::String("production".into()),
                    ]),
            )
            .with_named(
                ArgumentSpec::new("replicas", ArgType::Integer, false)
                    .with_range(Some(1.0), Some(100.0))
                    .unwrap(),
            )
    }

    fn action(named: Vec<(&str, Value)>) -> ActionStatement {
        ActionStatement {
            verb: "deploy".into(),
            positional: vec![],
            named: named.into_iter().map(|(k, v)| (k.to_string(), v)).collect::<IndexMap<_, _>>(),
            policy: None,
            priority: None,
            reason: None,
        }
    }

    #[test]
    fn unregistered_verb_passes() {
        let registry = SchemaRegistry::new();
        let validator = Validator::new(&registry);
        assert!(validator.validate(&action(vec![])).is_ok());
    }

    #[test]
    fn replicas_out_of_range_is_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(deploy_schema());
        let validator = Validator::new(&registry);
        let act = action(vec![
            ("app", Value::String("webapp".into())),
            ("replicas", Value::Integer(0)),
        ]);
        let err = validator.validate(&act).unwrap_err();
        assert!(matches!(err, Error::ValueOutOfRange(_)));
    }

    #[test]
    fn env_not_in_allowed_values_is_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(deploy_schema());
        let validator = Validator::new(&registry);
        let act = action(vec![
            ("app", Value::String("webapp".into())),
            ("env", Value::String("local".into())),
        ]);
        let err = validator.validate(&act).unwrap_err();
        assert!(matches!(err, Error::ValueNotAllowed(_)));
    }

    #[test]
    fn missing_required_named_arg_is_rejected() {
        let mut registry = SchemaRegistry::new();
        registry.register(deploy_schema());
        let validator = Validator::new(&registry);
        let err = validator.validate(&action(vec![])).unwrap_err();
        assert!(matches!(err, Error::MissingArg(_)));
    }

    #[test]
    fn unexpected_named_args_report_in_submission_order_not_alphabetical() {
        let mut registry = SchemaRegistry::new();
        registry.register(VerbSchema::new("deploy").with_named(ArgumentSpec::new(
            "app",
            ArgType::String,
            true,
        )));
        let validator = Validator::new(&registry);
        // "zzz" is submitted before "aaa"; a `BTreeMap` would iterate these
        // alphabetically and report "aaa" first instead.
        let act = action(vec![
            ("app", Value::String("webapp".into())),
            ("zzz", Value::Integer(1)),
            ("aaa", Value::Integer(2)),
        ]);
        match validator.validate(&act).unwrap_err() {
            Error::InvalidArgs(message) => assert!(message.contains("zzz")),
            other => panic!("expected InvalidArgs, got {other:?}"),
        }
    }

    #[test]
    fn release_version_pattern_enforced() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            VerbSchema::new("release").with_positional(
                ArgumentSpec::new("version", ArgType::String, true)
                    .with_pattern(r"^\d+\.\d+\.\d+$")
                    .unwrap(),
            ),
        );
        let validator = Validator::new(&registry);

        let mut bad = action(vec![]);
        bad.verb = "release".into();
        bad.positional = vec![Value::String("v1.0".into())];
        assert!(matches!(
            validator.validate(&bad).unwrap_err(),
            Error::PatternMismatch(_)
        ));

        let mut good = action(vec![]);
        good.verb = "release".into();
        good.positional = vec![Value::String("1.0.0".into())];
        assert!(validator.validate(&good).is_ok());
    }

    #[test]
    fn enum_checked_before_pattern_before_range() {
        // A spec with all three constraints on one argument; feed a value
        // that fails all three and confirm the enum failure wins.
        let mut registry = SchemaRegistry::new();
        registry.register(
            VerbSchema::new("tag").with_positional(
                ArgumentSpec::new("label", ArgType::String, true)
                    .with_allowed_values(vec![Value::String("a".into())])
                    .with_pattern(r"^z+$")
                    .unwrap(),
            ),
        );
        let validator = Validator::new(&registry);
        let mut act = action(vec![]);
        act.verb = "tag".into();
        act.positional = vec![Value::String("nope".into())];
        assert!(matches!(
            validator.validate(&act).unwrap_err(),
            Error::ValueNotAllowed(_)
        ));
    }

    #[test]
    fn events_validate_against_a_schema_registered_under_their_name() {
        let mut registry = SchemaRegistry::new();
        registry.register(
            VerbSchema::new("heartbeat")
                .with_named(ArgumentSpec::new("uptime", ArgType::Integer, true)),
        );
        let validator = Validator::new(&registry);
        let event = crate::grammar::EventStatement {
            name: "heartbeat".into(),
            positional: vec![],
            named: IndexMap::new(),
        };
        assert!(matches!(
            validator.validate_event(&event).unwrap_err(),
            Error::MissingArg(_)
        ));
    }
}
