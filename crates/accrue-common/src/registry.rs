//! Aggregate registry
//!
//! One aggregate per deploying address, each behind its own `RwLock` so that
//! unrelated deployments never contend. Writers hold the lock for a whole
//! operation; views take read locks.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{AccrueError, Result};
use crate::types::address::Address;

/// Shared, lockable aggregate
pub type Shared<T> = Arc<RwLock<T>>;

/// Address-keyed store of aggregates of one kind
pub struct Registry<T> {
    kind: &'static str,
    entries: DashMap<Address, Shared<T>>,
}

impl<T> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: DashMap::new(),
        }
    }

    /// Publish a new aggregate under `owner`; fails if one already exists
    pub fn create(&self, owner: Address, aggregate: T) -> Result<Shared<T>> {
        let shared = Arc::new(RwLock::new(aggregate));
        self.register(owner, shared.clone())?;
        Ok(shared)
    }

    /// Publish an aggregate that is already shared with its collaborators
    pub fn register(&self, owner: Address, shared: Shared<T>) -> Result<()> {
        use dashmap::mapref::entry::Entry;

        match self.entries.entry(owner) {
            Entry::Occupied(_) => Err(AccrueError::AlreadyExists(format!(
                "{} already deployed at {}",
                self.kind,
                owner.short()
            ))),
            Entry::Vacant(slot) => {
                slot.insert(shared);
                debug!(kind = self.kind, owner = %owner.short(), "aggregate created");
                Ok(())
            }
        }
    }

    pub fn get(&self, owner: &Address) -> Result<Shared<T>> {
        self.entries
            .get(owner)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| {
                AccrueError::NotFound(format!("no {} at {}", self.kind, owner.short()))
            })
    }

    pub fn contains(&self, owner: &Address) -> bool {
        self.entries.contains_key(owner)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
