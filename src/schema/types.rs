//! The shape of a verb's arguments: `ArgType`, `ArgumentSpec`, `VerbSchema`.

use crate::value::Value;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArgType {
    String,
    Integer,
    Float,
    Boolean,
    List,
    Object,
    Any,
}

impl ArgType {
    /// Type compatibility per the protocol: `null` passes any type, `Any`
    /// accepts everything, otherwise the tagged variant must match.
    pub fn accepts(self, value: &Value) -> bool {
        if matches!(value, Value::Null) || matches!(self, ArgType::Any) {
            return true;
        }
        match (self, value) {
            (ArgType::String, Value::String(_)) => true,
            (ArgType::Integer, Value::Integer(_)) => true,
            (ArgType::Float, Value::Float(_)) => true,
            (ArgType::Boolean, Value::Boolean(_)) => true,
            (ArgType::List, Value::List(_)) => true,
            (ArgType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, ArgType::Integer | ArgType::Float)
    }
}

impl fmt::Display for ArgType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ArgType::String => "STRING",
            ArgType::Integer => "INTEGER",
            ArgType::Float => "FLOAT",
            ArgType::Boolean => "BOOLEAN",
            ArgType::List => "LIST",
            ArgType::Object => "OBJECT",
            ArgType::Any => "ANY",
        };
        f.write_str(s)
    }
}

/// One argument's constraints. Built via `ArgumentSpec::new` plus builder
/// methods rather than public fields, because `with_pattern`/`with_range`
/// reject combinations the type system alone can't (pattern on a non-string,
/// range on a non-numeric).
#[derive(Debug, Clone)]
pub struct ArgumentSpec {
    pub name: String,
    pub arg_type: ArgType,
    pub required: bool,
    pub description: String,
    pub allowed_values: Option<Vec<Value>>,
    pub pattern: Option<Regex>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpecError {
    #[error("pattern constraint is only valid on STRING arguments, got {0}")]
    PatternOnNonString(ArgTypeName),
    #[error("range constraint is only valid on numeric arguments, got {0}")]
    RangeOnNonNumeric(ArgTypeName),
    #[error("invalid regex pattern: {0}")]
    InvalidPattern(String),
}

/// `Display`-only wrapper so `SpecError` can derive `PartialEq`/`Eq` without
/// requiring those of `ArgType` (kept minimal here, not re-derived on
/// `ArgType` itself since it has no need for equality elsewhere).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgTypeName(pub String);

impl fmt::Display for ArgTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl ArgumentSpec {
    pub fn new(name: impl Into<String>, arg_type: ArgType, required: bool) -> Self {
        Self {
            name: name.into(),
            arg_type,
            required,
            description: String::new(),
            allowed_values: None,
            pattern: None,
            min_value: None,
            max_value: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_allowed_values(mut self, values: Vec<Value>) -> Self {
        self.allowed_values = Some(values);
        self
    }

    /// Rejects non-STRING argument types — the pattern constraint is
    /// string-only per the protocol's schema rules.
    pub fn with_pattern(mut self, pattern: &str) -> Result<Self, SpecError> {
        if self.arg_type != ArgType::String {
            return Err(SpecError::PatternOnNonString(ArgTypeName(
                self.arg_type.to_string(),
            )));
        }
        let regex = Regex::new(pattern).map_err(|e| SpecError::InvalidPattern(e.to_string()))?;
        self.pattern = Some(regex);
        Ok(self)
    }

    /// Rejects non-numeric argument types — range constraints only make
    /// sense on INTEGER/FLOAT.
    pub fn with_range(mut self, min: Option<f64>, max: Option<f64>) -> Result<Self, SpecError> {
        if !self.arg_type.is_numeric() {
            return Err(SpecError::RangeOnNonNumeric(ArgTypeName(
                self.arg_type.to_string(),
            )));
        }
        self.min_value = min;
        self.max_value = max;
        Ok(self)
    }
}

/// The full contract for one verb: ordered positional arguments, named
/// arguments keyed by name, and whether unrecognized extras are tolerated.
#[derive(Debug, Clone)]
pub struct VerbSchema {
    pub verb: String,
    pub positional: Vec<ArgumentSpec>,
    pub named: BTreeMap<String, ArgumentSpec>,
    pub allow_extra_args: bool,
}

impl VerbSchema {
    pub fn new(verb: impl Into<String>) -> Self {
        Self {
            verb: verb.into(),
            positional: Vec::new(),
            named: BTreeMap::new(),
            allow_extra_args: false,
        }
    }

    pub fn with_positional(mut self, spec: ArgumentSpec) -> Self {
        self.positional.push(spec);
        self
    }

    pub fn with_named(mut self, spec: ArgumentSpec) -> Self {
        self.named.insert(spec.name.clone(), spec);
        self
    }

    pub fn allow_extra_args(mut self, allow: bool) -> Self {
        self.allow_extra_args = allow;
        self
    }
}
