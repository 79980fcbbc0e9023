//! Persistence layer for the voice tutor
//!
//! Provides storage for:
//! - Callers, keyed by normalized phone number
//! - Append-only turn history
//! - Per-caller statistics (read-then-reduce over turns)
//!
//! Backed by ScyllaDB, with an in-memory store for development and tests.

pub mod client;
pub mod error;
pub mod history;
pub mod memory;
pub mod schema;

use std::sync::Arc;

pub use client::{ScyllaClient, ScyllaConfig};
pub use error::PersistenceError;
pub use history::{HistoryStore, NewTurn, ScyllaHistoryStore};
pub use memory::InMemoryHistoryStore;

/// Initialize the ScyllaDB-backed persistence layer
pub async fn init(config: ScyllaConfig) -> Result<PersistenceLayer, PersistenceError> {
    let client = ScyllaClient::connect(config).await?;
    client.ensure_schema().await?;

    Ok(PersistenceLayer {
        history: Arc::new(ScyllaHistoryStore::new(client)),
    })
}

/// Combined persistence layer
#[derive(Clone)]
pub struct PersistenceLayer {
    pub history: Arc<dyn HistoryStore>,
}

impl PersistenceLayer {
    /// Process-local storage
    pub fn in_memory() -> Self {
        Self {
            history: Arc::new(InMemoryHistoryStore::new()),
        }
    }
}
