//! Versioned fact store with wildcard topic subscriptions. Facts are
//! last-writer-wins *by version*, never by wall clock — two agents that
//! never talk to a shared clock can still merge deterministically.

pub mod topic;

use crate::error::Error;
use crate::expr::{evaluate, Context};
use crate::fold::FoldEngine;
use crate::grammar::{FoldStatement, Header, KnowledgeStatement, Message, Statement};
use crate::value::Value;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Fact {
    pub topic: String,
    pub value: Value,
    pub version: u64,
}

#[derive(Debug, Clone)]
pub struct Subscription {
    pub subscriber_id: String,
    pub pattern: String,
    pub filter: Option<String>,
    pub cursor: HashMap<String, u64>,
}

/// A `Context` exposing exactly one binding — the topic's dotted name
/// mapped to its current value — for evaluating a subscription's filter
/// expression, per the protocol's "context containing `{topic_name: value}`".
struct TopicContext<'a> {
    topic: &'a str,
    value: Value,
}

impl Context for TopicContext<'_> {
    fn get(&self, path: &str) -> Option<Value> {
        if path == self.topic {
            Some(self.value.clone())
        } else {
            None
        }
    }

    fn has(&self, path: &str) -> bool {
        path == self.topic
    }

    fn set(&mut self, _path: &str, _value: Value) {}

    fn as_map(&self) -> std::collections::BTreeMap<String, Value> {
        let mut map = std::collections::BTreeMap::new();
        map.insert(self.topic.to_string(), self.value.clone());
        map
    }
}

pub struct KnowledgeEngine {
    agent_id: String,
    facts: HashMap<String, (Value, u64)>,
    subscribers: HashMap<String, Subscription>,
    knowledge_budget: Option<usize>,
    fold_engine: FoldEngine,
    fold_seq: u64,
}

impl KnowledgeEngine {
    pub fn new(agent_id: impl Into<String>, knowledge_budget: Option<usize>) -> Self {
        Self {
            agent_id: agent_id.into(),
            facts: HashMap::new(),
            subscribers: HashMap::new(),
            knowledge_budget,
            fold_engine: FoldEngine::new(),
            fold_seq: 0,
        }
    }

    pub fn fold_engine(&self) -> &FoldEngine {
        &self.fold_engine
    }

    pub fn fact(&self, topic: &str) -> Option<Fact> {
        self.facts.get(topic).map(|(value, version)| Fact {
            topic: topic.to_string(),
            value: value.clone(),
            version: *version,
        })
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Sets `topic` to `value` at the next version, then auto-folds the
    /// oldest-by-version facts (via the owned `FoldEngine`) until the store
    /// is back within budget. Folded facts remain retrievable: each is
    /// archived as a one-statement `Message` carrying its `KnowledgeStatement`,
    /// so re-applying the fold's unfolded messages through `apply_incoming`
    /// restores them.
    pub fn assert_fact(&mut self, topic: impl Into<String>, value: Value) -> Vec<FoldStatement> {
        let topic = topic.into();
        let next_version = self.facts.get(&topic).map(|(_, v)| v + 1).unwrap_or(1);
        tracing::debug!(topic = %topic, version = next_version, "asserted fact");
        self.facts.insert(topic, (value, next_version));

        let mut folds = Vec::new();
        let Some(budget) = self.knowledge_budget else {
            return folds;
        };
        while self.facts.len() > budget {
            let Some(oldest_topic) = self
                .facts
                .iter()
                .min_by_key(|(_, (_, version))| *version)
                .map(|(topic, _)| topic.clone())
            else {
                break;
            };
            let (value, version) = self.facts.remove(&oldest_topic).expect("key just read");
            tracing::debug!(
                topic = %oldest_topic,
                version,
                budget,
                "auto-folding oldest fact over budget"
            );
            self.fold_seq += 1;
            let synthetic = Message::new(
                Header::new(
                    1,
                    format!("{}-fold-{}", self.agent_id, self.fold_seq),
                    self.agent_id.clone(),
                    self.agent_id.clone(),
                    0,
                ),
                vec![Statement::Knowledge(KnowledgeStatement {
                    topic: oldest_topic.clone(),
                    value,
                    version,
                })],
            );
            let summary = format!("auto-folded '{oldest_topic}' at version {version} over budget");
            folds.push(self.fold_engine.fold(vec![synthetic], summary, None));
        }
        folds
    }

    /// Initializes delivery cursors to zero for every currently-matching
    /// topic, so the subscriber's first `compute_delta` sees every existing
    /// fact as new.
    pub fn add_subscriber(
        &mut self,
        subscriber_id: impl Into<String>,
        pattern: impl Into<String>,
        filter: Option<String>,
    ) {
        let subscriber_id = subscriber_id.into();
        let pattern = pattern.into();
        let cursor = self
            .facts
            .keys()
            .filter(|topic| topic::matches(&pattern, topic))
            .map(|topic| (topic.clone(), 0))
            .collect();
        self.subscribers.insert(
            subscriber_id.clone(),
            Subscription {
                subscriber_id,
                pattern,
                filter,
                cursor,
            },
        );
    }

    pub fn remove_subscriber(&mut self, subscriber_id: &str) -> bool {
        self.subscribers.remove(subscriber_id).is_some()
    }

    /// Facts new (by version) to `subscriber_id` among topics matching its
    /// pattern and passing its filter, ordered topic-lexicographic then
    /// version ascending. Does not advance the cursor — call
    /// `mark_delivered` to commit.
    pub fn compute_delta(&self, subscriber_id: &str) -> Result<Vec<KnowledgeStatement>, Error> {
        let Some(sub) = self.subscribers.get(subscriber_id) else {
            return Ok(Vec::new());
        };

        let mut matches: Vec<(&String, &Value, u64)> = self
            .facts
            .iter()
            .filter(|(topic, _)| topic::matches(&sub.pattern, topic))
            .filter(|(topic, (_, version))| *version > sub.cursor.get(*topic).copied().unwrap_or(0))
            .map(|(topic, (value, version))| (topic, value, *version))
            .collect();
        matches.sort_by(|a, b| a.0.cmp(b.0).then(a.2.cmp(&b.2)));

        let mut out = Vec::with_capacity(matches.len());
        for (topic, value, version) in matches {
            if let Some(filter) = &sub.filter {
                let ctx = TopicContext {
                    topic,
                    value: value.clone(),
                };
                match evaluate(filter, &ctx)? {
                    Value::Null | Value::Boolean(true) => {}
                    _ => continue,
                }
            }
            out.push(KnowledgeStatement {
                topic: topic.clone(),
                value: value.clone(),
                version,
            });
        }
        Ok(out)
    }

    /// Commits delivery: advances `subscriber_id`'s cursor past every
    /// statement's version. Call after actually sending `statements` (the
    /// result of a prior `compute_delta`) to the subscriber.
    pub fn mark_delivered(&mut self, subscriber_id: &str, statements: &[KnowledgeStatement]) {
        let Some(sub) = self.subscribers.get_mut(subscriber_id) else {
            return;
        };
        for stmt in statements {
            let cursor = sub.cursor.entry(stmt.topic.clone()).or_insert(0);
            if stmt.version > *cursor {
                *cursor = stmt.version;
            }
        }
    }

    /// Every current fact as a `KnowledgeStatement`, sorted by topic — the
    /// checkpoint representation a caller persists and later restores via
    /// `import_state`. Subscriptions are not part of the snapshot: a
    /// restored engine still needs subscribers to `add_subscriber` again,
    /// the same way a restarted agent re-subscribes after reconnecting.
    pub fn export_state(&self) -> Vec<KnowledgeStatement> {
        let mut out: Vec<KnowledgeStatement> = self
            .facts
            .iter()
            .map(|(topic, (value, version))| KnowledgeStatement {
                topic: topic.clone(),
                value: value.clone(),
                version: *version,
            })
            .collect();
        out.sort_by(|a, b| a.topic.cmp(&b.topic));
        out
    }

    /// Restores facts from a prior `export_state` snapshot, replacing
    /// whatever facts are currently held. Subscriber cursors are left
    /// untouched; a subscriber re-subscribing after a restore sees every
    /// restored fact as new, matching `add_subscriber`'s own zero-cursor
    /// behavior.
    pub fn import_state(&mut self, statements: Vec<KnowledgeStatement>) {
        self.facts = statements
            .into_iter()
            .map(|stmt| (stmt.topic, (stmt.value, stmt.version)))
            .collect();
    }

    /// Applies incoming facts under strict last-writer-by-version-wins: a
    /// statement is accepted only if its version exceeds the topic's current
    /// version; a tie rejects the incoming statement. Returns the subset
    /// actually applied.
    pub fn apply_incoming(
        &mut self,
        statements: Vec<KnowledgeStatement>,
        _from_agent: &str,
    ) -> Vec<KnowledgeStatement> {
        let mut applied = Vec::new();
        for stmt in statements {
            let current_version = self.facts.get(&stmt.topic).map(|(_, v)| *v).unwrap_or(0);
            if stmt.version > current_version {
                self.facts
                    .insert(stmt.topic.clone(), (stmt.value.clone(), stmt.version));
                applied.push(stmt);
            }
        }
        applied
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_increments_per_topic() {
        let mut engine = KnowledgeEngine::new("agent1", None);
        engine.assert_fact("system.cpu", Value::Integer(85));
        engine.assert_fact("system.cpu", Value::Integer(90));
        let fact = engine.fact("system.cpu").unwrap();
        assert_eq!(fact.version, 2);
        assert_eq!(fact.value, Value::Integer(90));
    }

    #[test]
    fn subscriber_receives_only_the_latest_version() {
        let mut engine = KnowledgeEngine::new("agent1", None);
        engine.assert_fact("system.cpu", Value::Integer(85));
        engine.add_subscriber("sub1", "system.**", None);
        engine.assert_fact("system.cpu", Value::Integer(90));

        let delta = engine.compute_delta("sub1").unwrap();
        assert_eq!(delta.len(), 1);
        assert_eq!(delta[0].value, Value::Integer(90));
        assert_eq!(delta[0].version, 2);
    }

    #[test]
    fn delta_is_empty_after_mark_delivered_with_no_new_facts() {
        let mut engine = KnowledgeEngine::new("agent1", None);
        engine.add_subscriber("sub1", "system.**", None);
        engine.assert_fact("system.cpu", Value::Integer(85));

        let delta = engine.compute_delta("sub1").unwrap();
        assert_eq!(delta.len(), 1);
        engine.mark_delivered("sub1", &delta);
        assert!(engine.compute_delta("sub1").unwrap().is_empty());
    }

    #[test]
    fn apply_incoming_rejects_stale_and_tied_versions() {
        let mut engine = KnowledgeEngine::new("agent1", None);
        engine.assert_fact("system.cpu", Value::Integer(85)); // version 1

        let applied = engine.apply_incoming(
            vec![KnowledgeStatement {
                topic: "system.cpu".into(),
                value: Value::Integer(50),
                version: 1,
            }],
            "agent2",
        );
        assert!(applied.is_empty());
        assert_eq!(engine.fact("system.cpu").unwrap().value, Value::Integer(85));

        let applied = engine.apply_incoming(
            vec![KnowledgeStatement {
                topic: "system.cpu".into(),
                value: Value::Integer(99),
                version: 2,
            }],
            "agent2",
        );
        assert_eq!(applied.len(), 1);
        assert_eq!(engine.fact("system.cpu").unwrap().value, Value::Integer(99));
    }

    #[test]
    fn budget_triggers_auto_fold_of_oldest_facts() {
        let mut engine = KnowledgeEngine::new("agent1", Some(2));
        engine.assert_fact("a", Value::Integer(1));
        engine.assert_fact("b", Value::Integer(2));
        let folds = engine.assert_fact("c", Value::Integer(3));
        assert_eq!(folds.len(), 1);
        assert_eq!(engine.len(), 2);
        assert!(engine.fact("a").is_none());
        assert!(engine.fold_engine().contains(&folds[0].id));
    }

    #[test]
    fn export_import_round_trips_current_facts() {
        let mut engine = KnowledgeEngine::new("agent1", None);
        engine.assert_fact("system.cpu", Value::Integer(85));
        engine.assert_fact("system.memory", Value::Integer(40));
        let snapshot = engine.export_state();

        let mut restored = KnowledgeEngine::new("agent1", None);
        restored.import_state(snapshot);
        assert_eq!(restored.fact("system.cpu").unwrap().version, 1);
        assert_eq!(restored.fact("system.memory").unwrap().value, Value::Integer(40));
    }

    #[test]
    fn filter_restricts_delta_to_matching_facts() {
        let mut engine = KnowledgeEngine::new("agent1", None);
        engine.add_subscriber("sub1", "system.**", Some("system.cpu>80".to_string()));
        engine.assert_fact("system.cpu", Value::Integer(50));
        assert!(engine.compute_delta("sub1").unwrap().is_empty());

        engine.assert_fact("system.cpu", Value::Integer(90));
        let delta = engine.compute_delta("sub1").unwrap();
        assert_eq!(delta.len(), 1);
    }
}
