//! Per-collection change notifications.
//!
//! Each collection has a `watch` channel holding its latest full snapshot and
//! freshness. Snapshots are ordered by [`Version`]. A write's version is
//! stamped inside the transaction that commits it, so writes publish in
//! commit order however long their push takes. A load publishes only when no
//! write of the collection was in progress or committed while it ran; if one
//! was, that write's own publish carries the newer state.

use serde_json::Value;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::watch;

use super::Freshness;
use crate::error::SyncError;
use crate::models::{Collection, Record};

/// Position of a snapshot in a collection's history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Version {
    /// Local commits of the collection at the time of the snapshot.
    pub generation: u64,
    /// Issue order among operations on the collection.
    pub seq: u64,
}

/// Full contents of a collection as of one engine operation.
#[derive(Debug, Clone)]
pub struct CollectionUpdate {
    /// Zero before anything was published.
    pub version: Version,
    pub items: Arc<Vec<Value>>,
    pub freshness: Freshness,
}

impl Default for CollectionUpdate {
    fn default() -> Self {
        Self {
            version: Version::default(),
            items: Arc::default(),
            freshness: Freshness::Unknown,
        }
    }
}

impl CollectionUpdate {
    /// Decodes the snapshot into typed records.
    pub fn decode<T: Record>(&self) -> Result<Vec<T>, SyncError> {
        self.items
            .iter()
            .map(|item| {
                serde_json::from_value(item.clone()).map_err(|source| SyncError::Decode {
                    collection: T::COLLECTION,
                    source,
                })
            })
            .collect()
    }
}

/// Taken at the start of a load, before any I/O.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket {
    pub collection: Collection,
    pub version: Version,
    /// A write was already in progress when the load started.
    contended: bool,
}

/// Marks a write of one collection as in progress until dropped.
#[must_use]
pub struct WriteGuard<'a> {
    subscriptions: &'a Subscriptions,
    collection: Collection,
}

impl Drop for WriteGuard<'_> {
    fn drop(&mut self) {
        let mut order = self.subscriptions.order(self.collection);
        order.writers = order.writers.saturating_sub(1);
    }
}

#[derive(Default)]
struct Order {
    seq: u64,
    generation: u64,
    writers: usize,
}

struct Channel {
    sender: watch::Sender<CollectionUpdate>,
    order: Mutex<Order>,
}

pub struct Subscriptions {
    channels: Vec<Channel>,
}

impl Subscriptions {
    pub fn new() -> Self {
        let channels = Collection::ALL
            .iter()
            .map(|_| {
                let (sender, _) = watch::channel(CollectionUpdate::default());
                Channel {
                    sender,
                    order: Mutex::new(Order::default()),
                }
            })
            .collect();

        Self { channels }
    }

    fn channel(&self, collection: Collection) -> &Channel {
        &self.channels[collection.index()]
    }

    fn order(&self, collection: Collection) -> MutexGuard<'_, Order> {
        self.channel(collection)
            .order
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn begin_load(&self, collection: Collection) -> LoadTicket {
        let mut order = self.order(collection);
        order.seq += 1;
        LoadTicket {
            collection,
            version: Version {
                generation: order.generation,
                seq: order.seq,
            },
            contended: order.writers > 0,
        }
    }

    /// Publishes a load result together with the freshness it observed.
    /// Returns whether subscribers were notified.
    pub fn finish_load(&self, ticket: LoadTicket, items: Vec<Value>, freshness: Freshness) -> bool {
        let order = self.order(ticket.collection);
        if ticket.contended || order.writers > 0 || order.generation != ticket.version.generation {
            tracing::debug!(
                "Dropped {} load overlapping a write (ticket {})",
                ticket.collection,
                ticket.version.seq
            );
            return false;
        }
        self.replace(ticket.collection, ticket.version, items, Some(freshness))
    }

    pub fn begin_write(&self, collection: Collection) -> WriteGuard<'_> {
        self.order(collection).writers += 1;
        WriteGuard {
            subscriptions: self,
            collection,
        }
    }

    /// Stamps a local commit of `collection`. Must be called inside the
    /// transaction that commits it, while the collection lock is held.
    pub fn commit(&self, collection: Collection) -> Version {
        let mut order = self.order(collection);
        order.generation += 1;
        order.seq += 1;
        Version {
            generation: order.generation,
            seq: order.seq,
        }
    }

    /// Publishes the contents written by the commit stamped `version`, unless
    /// a later commit already published. `None` keeps the current freshness.
    pub fn publish_write(
        &self,
        collection: Collection,
        version: Version,
        items: Vec<Value>,
        freshness: Option<Freshness>,
    ) -> bool {
        self.replace(collection, version, items, freshness)
    }

    pub fn set_freshness(&self, collection: Collection, freshness: Freshness) {
        self.channel(collection).sender.send_if_modified(|current| {
            if current.freshness == freshness {
                return false;
            }
            current.freshness = freshness;
            true
        });
    }

    fn replace(
        &self,
        collection: Collection,
        version: Version,
        items: Vec<Value>,
        freshness: Option<Freshness>,
    ) -> bool {
        let published = self.channel(collection).sender.send_if_modified(|current| {
            if version <= current.version {
                return false;
            }
            *current = CollectionUpdate {
                version,
                items: Arc::new(items),
                freshness: freshness.unwrap_or(current.freshness),
            };
            true
        });

        if !published {
            tracing::debug!(
                "Dropped stale result for {} (generation {}, ticket {})",
                collection,
                version.generation,
                version.seq
            );
        }
        published
    }

    pub fn subscribe(&self, collection: Collection) -> watch::Receiver<CollectionUpdate> {
        self.channel(collection).sender.subscribe()
    }

    pub fn latest(&self, collection: Collection) -> CollectionUpdate {
        self.channel(collection).sender.borrow().clone()
    }

    pub fn freshness(&self, collection: Collection) -> Freshness {
        self.channel(collection).sender.borrow().freshness
    }
}

impl Default for Subscriptions {
    fn default() -> Self {
        Self::new()
    }
}
