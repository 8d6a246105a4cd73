//! `SagConfig`: the configuration a host application hands to this crate's
//! constructors at startup. Single-level, unlike the core library's four-tier
//! System/Team/Project/User hierarchy — there is nothing in the protocol
//! runtime that calls for tiered override resolution, so only one file is
//! ever read, and it is the caller who reads it (this crate never touches a
//! well-known path itself).

use crate::error::Error;
use crate::schema::{ArgType, ArgumentSpec, VerbSchema};
use crate::value::Value;
use crate::sanitizer::routing::AgentRegistry;
use crate::schema::SchemaRegistry;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The allow-list an `AgentRegistry` is bootstrapped from: each agent id
/// maps to the destinations it may address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRegistryConfig {
    #[serde(default)]
    pub agents: BTreeMap<String, Vec<String>>,
}

impl AgentRegistryConfig {
    pub fn build(&self) -> AgentRegistry {
        let mut registry = AgentRegistry::new();
        for (agent, destinations) in &self.agents {
            registry.register(agent.clone(), destinations.clone());
        }
        registry
    }
}

/// One `ArgumentSpec` as it appears in TOML — every constraint optional, the
/// way a host app would hand-write `schemas.toml` rather than construct
/// `ArgumentSpec`s in code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArgumentSpecConfig {
    pub name: String,
    #[serde(rename = "type")]
    pub arg_type: ArgType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub allowed_values: Option<Vec<Value>>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub min_value: Option<f64>,
    #[serde(default)]
    pub max_value: Option<f64>,
}

impl ArgumentSpecConfig {
    fn build(&self) -> Result<ArgumentSpec, Error> {
        let mut spec = ArgumentSpec::new(self.name.clone(), self.arg_type, self.required);
        if let Some(description) = &self.description {
            spec = spec.with_description(description.clone());
        }
        if let Some(allowed) = &self.allowed_values {
            spec = spec.with_allowed_values(allowed.clone());
        }
        if let Some(pattern) = &self.pattern {
            spec = spec
                .with_pattern(pattern)
                .map_err(|e| Error::Configuration(e.to_string()))?;
        }
        if self.min_value.is_some() || self.max_value.is_some() {
            spec = spec
                .with_range(self.min_value, self.max_value)
                .map_err(|e| Error::Configuration(e.to_string()))?;
        }
        Ok(spec)
    }
}

/// One verb's schema as it appears in TOML: positional args in declared
/// order, named args keyed by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerbSchemaConfig {
    #[serde(default)]
    pub positional: Vec<ArgumentSpecConfig>,
    #[serde(default)]
    pub named: Vec<ArgumentSpecConfig>,
    #[serde(default)]
    pub allow_extra_args: bool,
}

impl VerbSchemaConfig {
    fn build(&self, verb: &str) -> Result<VerbSchema, Error> {
        let mut schema = VerbSchema::new(verb).allow_extra_args(self.allow_extra_args);
        for spec in &self.positional {
            schema = schema.with_positional(spec.build()?);
        }
        for spec in &self.named {
            schema = schema.with_named(spec.build()?);
        }
        Ok(schema)
    }
}

/// Knobs for the engines whose behavior is legitimately configuration rather
/// than protocol state.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Maximum live facts the knowledge engine holds before auto-folding the
    /// oldest-by-version entries. `None` (the TOML default, via `null` or
    /// simply omitting the key) means unbounded.
    pub knowledge_budget: Option<usize>,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            knowledge_budget: None,
        }
    }
}

/// Top-level configuration document, deserialized from a single TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SagConfig {
    #[serde(default)]
    pub agents: AgentRegistryConfig,
    #[serde(default)]
    pub schemas: BTreeMap<String, VerbSchemaConfig>,
    #[serde(default)]
    pub limits: EngineLimits,
}

impl SagConfig {
    pub fn from_str(content: &str) -> Result<Self, Error> {
        toml::from_str(content).map_err(|e| Error::Configuration(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let content = fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    pub fn build_agent_registry(&self) -> AgentRegistry {
        self.agents.build()
    }

    pub fn build_schema_registry(&self) -> Result<SchemaRegistry, Error> {
        let mut registry = SchemaRegistry::new();
        for (verb, config) in &self.schemas {
            registry.register(config.build(verb)?);
        }
        Ok(registry)
    }
}
