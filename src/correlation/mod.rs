//! Per-agent message-id generation and causality tracking. One engine
//! belongs to one agent; sharing the id counter across agents (if a caller
//! runs several `CorrelationEngine`s inside one process and wants a single
//! global counter) is the caller's concern — see the crate-level notes on
//! the concurrency model.

use crate::grammar::{Header, Message};
use std::collections::HashMap;
use std::collections::HashSet;

/// The wire protocol version this engine stamps on headers it creates.
const PROTOCOL_VERSION: u32 = 1;

#[derive(Debug)]
pub struct CorrelationEngine {
    agent_id: String,
    counter: u64,
    last_received: Option<String>,
}

impl CorrelationEngine {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            counter: 0,
            last_received: None,
        }
    }

    /// `<agent-id>-<n>`, `n` strictly increasing from 1.
    pub fn generate_message_id(&mut self) -> String {
        self.counter += 1;
        let id = format!("{}-{}", self.agent_id, self.counter);
        tracing::trace!(agent_id = %self.agent_id, message_id = %id, "generated message id");
        id
    }

    pub fn record_incoming(&mut self, msg: &Message) {
        tracing::debug!(
            agent_id = %self.agent_id,
            message_id = %msg.header.message_id,
            "recorded incoming message"
        );
        self.last_received = Some(msg.header.message_id.clone());
    }

    /// A fresh header correlated to whatever was last received (or
    /// uncorrelated, if nothing has been received yet).
    pub fn create_response_header(&mut self, source: &str, destination: &str) -> Header {
        let mut header = Header::new(
            PROTOCOL_VERSION,
            self.generate_message_id(),
            source,
            destination,
            chrono::Utc::now().timestamp(),
        );
        header.correlation = self.last_received.clone();
        header
    }

    /// A fresh header explicitly correlated to `msg`, regardless of what was
    /// last received.
    pub fn create_header_in_response_to(
        &mut self,
        source: &str,
        destination: &str,
        msg: &Message,
    ) -> Header {
        let mut header = Header::new(
            PROTOCOL_VERSION,
            self.generate_message_id(),
            source,
            destination,
            chrono::Utc::now().timestamp(),
        );
        header.correlation = Some(msg.header.message_id.clone());
        header
    }

    /// Resets the last-received slot; the id counter keeps counting so
    /// message ids stay unique for the life of the agent.
    pub fn clear(&mut self) {
        self.last_received = None;
    }

    pub fn last_received(&self) -> Option<&str> {
        self.last_received.as_deref()
    }

    /// Every message whose `correlation` equals `id`, in the order they
    /// appear in `messages`.
    pub fn find_responses<'a>(messages: &'a [Message], id: &str) -> Vec<&'a Message> {
        messages
            .iter()
            .filter(|m| m.header.correlation.as_deref() == Some(id))
            .collect()
    }

    /// Follows `correlation` links backward from `start_id`, emitting
    /// chronologically (oldest first). A cycle — which would indicate a bug
    /// upstream, since correlation is meant to form a DAG — is broken by a
    /// visited set rather than looping forever.
    pub fn trace_thread<'a>(messages: &'a [Message], start_id: &str) -> Vec<&'a Message> {
        let by_id: HashMap<&str, &Message> = messages
            .iter()
            .map(|m| (m.header.message_id.as_str(), m))
            .collect();

        let mut chain = Vec::new();
        let mut visited = HashSet::new();
        let mut current = by_id.get(start_id).copied();

        while let Some(msg) = current {
            if !visited.insert(msg.header.message_id.clone()) {
                break;
            }
            chain.push(msg);
            current = msg
                .header
                .correlation
                .as_deref()
                .and_then(|parent_id| by_id.get(parent_id))
                .copied();
        }

        chain.reverse();
        chain
    }

    /// Parent message id -> ordered list of direct child message ids. A
    /// message with no correlation is a root and never appears as a key
    /// unless something else also correlates to it.
    pub fn build_conversation_tree(messages: &[Message]) -> HashMap<String, Vec<String>> {
        let mut tree: HashMap<String, Vec<String>> = HashMap::new();
        for msg in messages {
            if let Some(parent) = &msg.header.correlation {
                tree.entry(parent.clone())
                    .or_default()
                    .push(msg.header.message_id.clone());
            }
        }
        tree
    }
}
