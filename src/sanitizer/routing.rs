//! Layer 2 of the sanitizer firewall: an allow-list of which agents may send
//! to which. This is correctness plumbing, not authentication — nothing here
//! verifies that a message actually came from the agent it claims.

use crate::error::Error;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default)]
pub struct AgentRegistry {
    allowed_destinations: HashMap<String, HashSet<String>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, agent_id: impl Into<String>, allowed_destinations: Vec<String>) {
        self.allowed_destinations
            .insert(agent_id.into(), allowed_destinations.into_iter().collect());
    }

    pub fn is_known(&self, agent_id: &str) -> bool {
        self.allowed_destinations.contains_key(agent_id)
    }

    pub fn allows(&self, source: &str, destination: &str) -> bool {
        self.allowed_destinations
            .get(source)
            .is_some_and(|dests| dests.contains(destination))
    }
}

/// Stateless guard over an `AgentRegistry` — a routing check is just a
/// lookup, but kept as its own type to mirror the pipeline diagram's
/// `RouteGuard` box and give callers a single place to enrich the denial
/// reason later without touching `Sanitizer`.
pub struct RouteGuard<'a> {
    registry: &'a AgentRegistry,
}

impl<'a> RouteGuard<'a> {
    pub fn new(registry: &'a AgentRegistry) -> Self {
        Self { registry }
    }

    pub fn check(&self, source: &str, destination: &str) -> Result<(), Error> {
        if !self.registry.is_known(source) {
            return Err(Error::RoutingDenied(format!("unknown source agent '{source}'")));
        }
        if !self.registry.is_known(destination) {
            return Err(Error::RoutingDenied(format!(
                "unknown destination agent '{destination}'"
            )));
        }
        if !self.registry.allows(source, destination) {
            return Err(Error::RoutingDenied(format!(
                "'{source}' is not permitted to send to '{destination}'"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_source_is_denied() {
        let registry = AgentRegistry::new();
        let guard = RouteGuard::new(&registry);
        assert!(guard.check("a", "b").is_err());
    }

    #[test]
    fn allowed_route_passes() {
        let mut registry = AgentRegistry::new();
        registry.register("a", vec!["b".into()]);
        registry.register("b", vec![]);
        let guard = RouteGuard::new(&registry);
        assert!(guard.check("a", "b").is_ok());
    }

    #[test]
    fn destination_not_in_allow_list_is_denied() {
        let mut registry = AgentRegistry::new();
        registry.register("a", vec!["c".into()]);
        registry.register("b", vec![]);
        let guard = RouteGuard::new(&registry);
        assert!(guard.check("a", "b").is_err());
    }
}
