//! Connection registry.
//!
//! Process-wide mapping from a logical connection name to a connection
//! string. Every access, read or write, goes through one lock. Entries are
//! kept in registration order so an unnamed lookup is deterministic.

use crate::config::ConnectionStrings;
use crate::error::{DbError, DbResult};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

#[derive(Debug, Default)]
struct RegistryInner {
    entries: HashMap<String, String>,
    /// Names in registration order.
    order: Vec<String>,
}

impl RegistryInner {
    fn insert(&mut self, name: String, connection_string: String) -> Option<String> {
        let previous = self.entries.insert(name.clone(), connection_string);
        if previous.is_none() {
            self.order.push(name);
        }
        previous
    }
}

/// Name → connection string store. Empty means unconfigured.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryInner>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    // Each write leaves the map consistent, so a poisoned lock is safe to reuse.
    fn read(&self) -> RwLockReadGuard<'_, RegistryInner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, RegistryInner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether at least one connection is registered.
    pub fn is_configured(&self) -> bool {
        !self.read().entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        !self.is_configured()
    }

    /// Registered names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.read().order.clone()
    }

    /// Add entries from a loaded `ConnectionStrings` section.
    ///
    /// First write wins: a name that is already registered is skipped, as is
    /// an entry without a value. The lock is taken per entry. Returns the
    /// number of entries added; fails if the registry is still empty afterwards.
    pub fn load(&self, section: &ConnectionStrings) -> DbResult<usize> {
        let mut added = 0;

        for (name, value) in section.iter() {
            let mut inner = self.write();
            let Some(value) = value.filter(|v| !v.is_empty()) else {
                warn!(connection = %name, "Skipping connection without a connection string");
                continue;
            };
            if inner.entries.contains_key(name) {
                debug!(connection = %name, "Connection already registered, keeping existing value");
                continue;
            }
            inner.insert(name.to_string(), value.to_string());
            added += 1;
        }

        if !self.is_configured() {
            return Err(DbError::configuration("No connections configured."));
        }

        info!(added, total = self.len(), "Loaded connection strings");
        Ok(added)
    }

    /// Register a connection directly.
    ///
    /// Unlike [`load`](Self::load), an existing entry with the same name is
    /// overwritten. Returns the previous connection string, if any.
    pub fn register(
        &self,
        name: impl Into<String>,
        connection_string: impl Into<String>,
    ) -> Option<String> {
        let name = name.into();
        let previous = self.write().insert(name.clone(), connection_string.into());
        if previous.is_some() {
            warn!(connection = %name, "Overwrote registered connection");
        }
        previous
    }

    /// Look up a connection string.
    ///
    /// With a name, the lookup is exact. Without one, the first registered
    /// connection is returned.
    pub fn resolve(&self, name: Option<&str>) -> DbResult<String> {
        let inner = self.read();
        match name {
            Some(name) => inner
                .entries
                .get(name)
                .cloned()
                .ok_or_else(|| DbError::connection_not_found(name)),
            None => inner
                .order
                .first()
                .and_then(|first| inner.entries.get(first))
                .cloned()
                .ok_or_else(|| DbError::configuration("No connections configured.")),
        }
    }
}
