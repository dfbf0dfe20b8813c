//! Session persistence
//!
//! Two key/value tiers mirror browser storage: the durable tier survives
//! restarts, the session tier lives as long as one terminal session. At most
//! one tier holds the session record at any time.

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;

/// Key under which the session record is stored in either tier
pub const SESSION_KEY: &str = "eczaci_auth";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("Storage lock poisoned")]
    Poisoned,
}

pub type StorageResult<T> = Result<T, StorageError>;

/// A string key/value store with Web Storage semantics
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Removing an absent key is a no-op
    fn remove(&self, key: &str) -> StorageResult<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> StorageResult<()> {
        (**self).remove(key)
    }
}

/// Storage tier of a persisted session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Durable,
    Session,
}

impl Tier {
    pub fn other(self) -> Self {
        match self {
            Tier::Durable => Tier::Session,
            Tier::Session => Tier::Durable,
        }
    }
}

/// Persisted session record, `{loggedIn, admin, user}` on the wire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub logged_in: bool,
    pub admin: bool,
    pub user: String,
}

/// A record found during restore, with the tier it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoredSession {
    pub tier: Tier,
    pub record: PersistedSession,
}

/// Reads and writes the session record across both tiers
pub struct SessionPersistence<K: KeyValueStore> {
    durable: K,
    session: K,
}

impl<K: KeyValueStore> SessionPersistence<K> {
    pub fn new(durable: K, session: K) -> Self {
        Self { durable, session }
    }

    pub fn tier(&self, tier: Tier) -> &K {
        match tier {
            Tier::Durable => &self.durable,
            Tier::Session => &self.session,
        }
    }

    /// Load the session record, durable tier first.
    ///
    /// Unreadable or corrupt records are logged, dropped from their tier and
    /// treated as absent. This never fails.
    pub fn load(&self) -> Option<RestoredSession> {
        let durable = self.read_tier(Tier::Durable);
        let session = self.read_tier(Tier::Session);

        match (durable, session) {
            (Some(record), Some(_)) => {
                tracing::warn!("Session record present in both tiers, using durable tier");
                Some(RestoredSession {
                    tier: Tier::Durable,
                    record,
                })
            }
            (Some(record), None) => Some(RestoredSession {
                tier: Tier::Durable,
                record,
            }),
            (None, Some(record)) => Some(RestoredSession {
                tier: Tier::Session,
                record,
            }),
            (None, None) => None,
        }
    }

    /// Write the record to `tier` and clear the other tier
    pub fn save(&self, tier: Tier, record: &PersistedSession) -> StorageResult<()> {
        let raw = serde_json::to_string(record)?;
        self.tier(tier).set(SESSION_KEY, &raw)?;
        self.tier(tier.other()).remove(SESSION_KEY)?;
        tracing::debug!(?tier, "Session record saved");
        Ok(())
    }

    /// Remove the record from both tiers.
    ///
    /// Both removals are attempted even if the first fails.
    pub fn clear(&self) -> StorageResult<()> {
        let durable = self.durable.remove(SESSION_KEY);
        let session = self.session.remove(SESSION_KEY);
        durable.and(session)
    }

    fn read_tier(&self, tier: Tier) -> Option<PersistedSession> {
        let raw = match self.tier(tier).get(SESSION_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(?tier, error = %e, "Failed to read session record");
                return None;
            }
        };

        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(?tier, error = %e, "Discarding corrupt session record");
                if let Err(e) = self.tier(tier).remove(SESSION_KEY) {
                    tracing::warn!(?tier, error = %e, "Failed to remove corrupt session record");
                }
                None
            }
        }
    }
}
