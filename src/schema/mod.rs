//! Verb argument schemas: registry of `VerbSchema`s plus the `Validator`
//! that checks an `ActionStatement` against one.

pub mod registry;
pub mod types;
pub mod validator;

pub use registry::SchemaRegistry;
pub use types::{ArgType, ArgumentSpec, SpecError, VerbSchema};
pub use validator::Validator;
