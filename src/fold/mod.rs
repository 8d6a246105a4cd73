//! Archives a message sequence under a fold id with exact-fidelity
//! unfolding. Summarization is for humans reading the fold statement on the
//! wire; the engine itself never lossily compresses — `unfold` always
//! returns precisely what `fold` was given.

use crate::error::Error;
use crate::grammar::{FoldStatement, Message};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// One archived entry: the messages as given, their summary, and whatever
/// state snapshot the caller attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Archive {
    messages: Vec<Message>,
    summary: String,
    state: Option<Value>,
}

#[derive(Debug, Default)]
pub struct FoldEngine {
    archives: HashMap<String, Archive>,
}

impl FoldEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Archives `messages` under a fresh id and returns the wire statement
    /// describing the fold. The messages themselves never appear on the
    /// statement — only `unfold` (or a checkpoint export) gets them back.
    pub fn fold(
        &mut self,
        messages: Vec<Message>,
        summary: impl Into<String>,
        state: Option<Value>,
    ) -> FoldStatement {
        let id = Uuid::new_v4().to_string();
        let summary = summary.into();
        tracing::debug!(fold_id = %id, message_count = messages.len(), "folding messages");
        self.archives.insert(
            id.clone(),
            Archive {
                messages,
                summary: summary.clone(),
                state: state.clone(),
            },
        );
        FoldStatement {
            id,
            summary,
            state,
        }
    }

    /// Returns the archived messages unchanged, element-wise, down to every
    /// header field and statement subtype — the roundtrip fidelity property
    /// the fold protocol exists to guarantee.
    pub fn unfold(&self, fold_id: &str) -> Result<Vec<Message>, Error> {
        tracing::trace!(fold_id, "unfolding");
        self.archives
            .get(fold_id)
            .map(|a| a.messages.clone())
            .ok_or_else(|| Error::UnknownFoldId(fold_id.to_string()))
    }

    pub fn contains(&self, fold_id: &str) -> bool {
        self.archives.contains_key(fold_id)
    }

    pub fn remove(&mut self, fold_id: &str) -> bool {
        self.archives.remove(fold_id).is_some()
    }

    pub fn clear(&mut self) {
        self.archives.clear();
    }

    pub fn len(&self) -> usize {
        self.archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.archives.is_empty()
    }

    /// Full-state checkpoint: every archived fold, serializable so a caller
    /// can persist and later `import_state` into a fresh engine. Unlike the
    /// on-wire `FoldStatement`, this carries the archived messages — a
    /// `FoldStatement` alone can't reconstruct an engine that still needs to
    /// answer `unfold`.
    pub fn export_state(&self) -> Result<String, Error> {
        Ok(serde_json::to_string(&self.archives)?)
    }

    pub fn import_state(&mut self, snapshot: &str) -> Result<(), Error> {
        self.archives = serde_json::from_str(snapshot)?;
        Ok(())
    }
}
