//! Optional tracing setup. Nothing in this crate initializes a global
//! subscriber on its own — a host application that wants structured output
//! calls `init_tracing()` once at startup; a host that already runs its own
//! `tracing_subscriber` setup (or none at all) can skip this module entirely
//! and the engines still emit spans, they just go nowhere until someone
//! installs a subscriber.
//!
//! Span/event conventions used across the engines:
//! - `agent_id` on correlation-engine operations
//! - `fold_id` on fold/unfold
//! - `topic` on knowledge assert/delta
//! - one `tracing::debug!`/`trace!` per logical operation, not per line

use tracing_subscriber::EnvFilter;

/// Installs a `tracing_subscriber::fmt` subscriber reading its filter from
/// `RUST_LOG` (defaulting to `info` when unset). Safe to call at most once
/// per process; a second call is a caller bug, not something this crate
/// guards against.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
}
