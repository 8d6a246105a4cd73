//! Property tests for the quantified invariants in the protocol's testable
//! properties: parse/minify round-trip, fold fidelity, and topic pattern
//! totality. The generators below are deliberately bounded (plain
//! alphanumeric strings, two-decimal floats, no nested `List`/`Object`
//! values) rather than exhaustive over every `Value` shape — wide enough to
//! catch a broken escape or a misplaced separator, not a fuzzer.

use indexmap::IndexMap;
use proptest::prelude::*;
use proptest::proptest;
use sag::{
    parse, minify, ActionStatement, Header, KnowledgeStatement, Message, PolicySpec, Priority,
    Statement, Value,
};

fn ident_strategy() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9_]{0,6}"
}

fn plain_string_strategy() -> impl Strategy<Value = String> {
    "[a-zA-Z0-9 ]{0,12}"
}

fn simple_value_strategy() -> impl Strategy<Value = Value> {
    prop_oneof![
        plain_string_strategy().prop_map(Value::String),
        (-1_000_000i64..1_000_000).prop_map(Value::Integer),
        (-999i64..999, 0u32..99).prop_map(|(int_part, frac)| {
            let text = format!("{int_part}.{frac:02}");
            Value::Float(text.parse().unwrap())
        }),
        any::<bool>().prop_map(Value::Boolean),
        Just(Value::Null),
    ]
}

fn action_strategy() -> impl Strategy<Value = ActionStatement> {
    (
        ident_strategy(),
        prop::collection::vec(simple_value_strategy(), 0..3),
        prop::collection::vec((ident_strategy(), simple_value_strategy()), 0..3)
            .prop_map(|pairs| pairs.into_iter().collect::<IndexMap<_, _>>()),
        prop::option::of(ident_strategy()),
        prop::option::of(prop_oneof![
            Just(Priority::Low),
            Just(Priority::Normal),
            Just(Priority::High),
            Just(Priority::Critical),
        ]),
    )
        .prop_map(|(verb, positional, named, policy_name, priority)| ActionStatement {
            verb,
            positional,
            named,
            policy: policy_name.map(|name| PolicySpec { name, expr: None }),
            priority,
            // A free-text reason never contains a comparison/logical operator,
            // so it round-trips as plain text rather than as a guardrail.
            reason: None,
        })
}

fn header_strategy() -> impl Strategy<Value = Header> {
    (ident_strategy(), ident_strategy(), ident_strategy(), 0i64..10_000_000).prop_map(
        |(id, src, dst, ts)| Header::new(1, id, src, dst, ts),
    )
}

proptest! {
    #[test]
    fn action_statement_round_trips(header in header_strategy(), action in action_strategy()) {
        let msg = Message::new(header, vec![Statement::Action(action)]);
        let wire = minify(&msg);
        let reparsed = parse(&wire).expect("minified output must re-parse");
        prop_assert_eq!(msg, reparsed);
    }

    #[test]
    fn knowledge_statement_round_trips(
        header in header_strategy(),
        topic in "[a-z][a-z0-9]{0,4}(\\.[a-z][a-z0-9]{0,4}){0,2}",
        value in simple_value_strategy(),
        version in 0u64..1000,
    ) {
        let msg = Message::new(
            header,
            vec![Statement::Knowledge(KnowledgeStatement { topic, value, version })],
        );
        let wire = minify(&msg);
        let reparsed = parse(&wire).expect("minified output must re-parse");
        prop_assert_eq!(msg, reparsed);
    }
}

fn sample_message(n: i64, agent: &str) -> Message {
    Message::new(
        Header::new(1, format!("{agent}-{n}"), agent, "peer", 1_000 + n),
        vec![Statement::Action(ActionStatement {
            verb: "noop".into(),
            positional: vec![Value::Integer(n)],
            named: IndexMap::new(),
            policy: None,
            priority: None,
            reason: None,
        })],
    )
}

proptest! {
    #[test]
    fn fold_unfold_restores_every_message_unchanged(count in 0usize..60, agent in ident_strategy()) {
        let mut engine = sag::FoldEngine::new();
        let messages: Vec<Message> = (0..count as i64).map(|n| sample_message(n, &agent)).collect();
        let stmt = engine.fold(messages.clone(), "a history", None);
        let restored = engine.unfold(&stmt.id).unwrap();
        prop_assert_eq!(restored, messages);
    }
}

proptest! {
    #[test]
    fn double_star_matches_any_nonempty_topic(
        segments in prop::collection::vec("[a-z][a-z0-9]{0,4}", 1..5),
    ) {
        let topic = segments.join(".");
        prop_assert!(sag::knowledge::topic::matches("**", &topic));
    }

    #[test]
    fn literal_pattern_matches_only_its_own_topic(
        segments in prop::collection::vec("[a-z][a-z0-9]{0,4}", 1..4),
        extra in "[a-z][a-z0-9]{0,4}",
    ) {
        let topic = segments.join(".");
        prop_assert!(sag::knowledge::topic::matches(&topic, &topic));
        let mut longer = segments.clone();
        longer.push(extra);
        prop_assert!(!sag::knowledge::topic::matches(&topic, &longer.join(".")));
    }
}
