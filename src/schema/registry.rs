//! Verb name -> `VerbSchema` registry. Validation against an unregistered
//! verb passes (opt-in policy) — see `schema::validator`.

use super::types::VerbSchema;
use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: HashMap<String, VerbSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, schema: VerbSchema) {
        self.schemas.insert(schema.verb.clone(), schema);
    }

    pub fn unregister(&mut self, verb: &str) -> Option<VerbSchema> {
        self.schemas.remove(verb)
    }

    pub fn get(&self, verb: &str) -> Option<&VerbSchema> {
        self.schemas.get(verb)
    }

    pub fn has(&self, verb: &str) -> bool {
        self.schemas.contains_key(verb)
    }

    pub fn clear(&mut self) {
        self.schemas.clear();
    }

    pub fn size(&self) -> usize {
        self.schemas.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::types::{ArgType, ArgumentSpec};

    #[test]
    fn register_get_unregister_round_trip() {
        let mut reg = SchemaRegistry::new();
        assert!(!reg.has("deploy"));
        reg.register(
            VerbSchema::new("deploy").with_positional(ArgumentSpec::new(
                "app",
                ArgType::String,
                true,
            )),
        );
        assert!(reg.has("deploy"));
        assert_eq!(reg.size(), 1);
        assert_eq!(reg.get("deploy").unwrap().verb, "deploy");
        assert!(reg.unregister("deploy").is_some());
        assert!(!reg.has("deploy"));
    }

    #[test]
    fn clear_empties_the_registry() {
        let mut reg = SchemaRegistry::new();
        reg.register(VerbSchema::new("noop"));
        reg.register(VerbSchema::new("deploy"));
        reg.clear();
        assert_eq!(reg.size(), 0);
    }
}
