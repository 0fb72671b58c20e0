//! In-process remote store.
//!
//! Keeps collections in memory and can be told to fail or stall reads and
//! writes, which makes it the remote of choice for exercising the engine's
//! failure paths.

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use super::{RemoteConfig, RemoteConnector, RemoteStore};
use crate::error::RemoteError;
use crate::models::Collection;

#[derive(Default)]
struct State {
    collections: HashMap<Collection, Vec<Value>>,
    read_failures: HashMap<Collection, RemoteError>,
    write_failures: HashMap<Collection, RemoteError>,
    write_delay: Option<Duration>,
    writes: usize,
}

/// Remote store backed by process memory.
#[derive(Default)]
pub struct MemoryRemote {
    state: Mutex<State>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Seeds a collection directly, bypassing failure rules.
    pub fn put(&self, collection: Collection, items: Vec<Value>) {
        self.state().collections.insert(collection, items);
    }

    /// Current contents of a collection, bypassing failure rules.
    pub fn get(&self, collection: Collection) -> Vec<Value> {
        self.state()
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Makes reads of `collection` fail with `error` until cleared.
    pub fn fail_reads(&self, collection: Collection, error: RemoteError) {
        self.state().read_failures.insert(collection, error);
    }

    /// Makes writes of `collection` fail with `error` until cleared.
    pub fn fail_writes(&self, collection: Collection, error: RemoteError) {
        self.state().write_failures.insert(collection, error);
    }

    /// Makes every `bulk_write` wait `delay` before it applies or fails.
    pub fn delay_writes(&self, delay: Duration) {
        self.state().write_delay = Some(delay);
    }

    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.read_failures.clear();
        state.write_failures.clear();
    }

    /// Number of successful `bulk_write` calls.
    pub fn write_count(&self) -> usize {
        self.state().writes
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn fetch_collection(&self, collection: Collection) -> Result<Vec<Value>, RemoteError> {
        let state = self.state();
        if let Some(error) = state.read_failures.get(&collection) {
            return Err(error.clone());
        }
        Ok(state
            .collections
            .get(&collection)
            .cloned()
            .unwrap_or_default())
    }

    async fn bulk_write(&self, collection: Collection, items: &[Value]) -> Result<(), RemoteError> {
        let delay = self.state().write_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if let Some(error) = state.write_failures.get(&collection) {
            return Err(error.clone());
        }
        state.collections.insert(collection, items.to_vec());
        state.writes += 1;
        Ok(())
    }
}

/// Connector that hands out one shared [`MemoryRemote`] and counts connects.
#[derive(Clone, Default)]
pub struct MemoryConnector {
    remote: Arc<MemoryRemote>,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    pub fn new(remote: Arc<MemoryRemote>) -> Self {
        Self {
            remote,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn remote(&self) -> Arc<MemoryRemote> {
        self.remote.clone()
    }

    /// How many clients have been created.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

impl RemoteConnector for MemoryConnector {
    fn connect(&self, config: &RemoteConfig) -> Result<Arc<dyn RemoteStore>, RemoteError> {
        if !config.is_valid() {
            return Err(RemoteError::NotConnected);
        }
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(self.remote.clone())
    }
}
