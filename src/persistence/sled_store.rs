//! Actuator state store backed by `sled`
//!
//! Relays that must come back in the same state after a restart record every
//! change here, keyed by module id. Each record carries the time of the change.

use std::path::Path;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use sled::Db;
use tracing::warn;

use crate::scheduler::Reclaim;
use crate::utils::error::PersistenceError;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StoredState {
    pub module_id: String,
    pub state: u8,
    pub changed_at: i64,
}

#[derive(Clone)]
pub struct StateStore {
    db: Db,
}

impl StateStore {
    /// Open or create a sled database at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    /// A store that is deleted when dropped.
    pub fn temporary() -> Result<Self, PersistenceError> {
        let db = sled::Config::new().temporary(true).open()?;
        Ok(Self { db })
    }

    pub fn load_state(&self, module_id: &str) -> Result<Option<StoredState>, PersistenceError> {
        match self.db.get(module_id)? {
            Some(raw) => Ok(Some(serde_json::from_slice(&raw)?)),
            None => Ok(None),
        }
    }

    pub fn store_state(&self, module_id: &str, state: u8) -> Result<(), PersistenceError> {
        let record = StoredState {
            module_id: module_id.to_string(),
            state,
            changed_at: Utc::now().timestamp_millis(),
        };
        let serialized = serde_json::to_vec(&record)?;
        self.db.insert(module_id, serialized)?;
        Ok(())
    }
}

impl Reclaim for StateStore {
    fn name(&self) -> &str {
        "state-store"
    }

    /// Flush dirty pages so sled can release its write buffers.
    fn reclaim(&self) -> usize {
        match self.db.flush() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to flush state store: {e}");
                0
            }
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StateStore")
            .field("db", &"sled::Db")
            .finish()
    }
}
