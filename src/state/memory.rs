//! In-memory document store.
//!
//! Writes are applied and pushed to every watcher before the write call
//! returns, in store order. That makes it a deterministic stand-in for a
//! remote store in tests, and good enough for single-process use.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use super::store::{
    merge_fields, ChangeCallback, Document, DocumentChange, DocumentStore, StoreError,
    Subscription,
};

type DocKey = (String, String);

#[derive(Default)]
struct MemoryInner {
    documents: HashMap<DocKey, Document>,
    watchers: HashMap<DocKey, Vec<(u64, ChangeCallback)>>,
    next_watcher: u64,
    writes: u64,
}

impl MemoryInner {
    fn callbacks(&self, key: &DocKey) -> Vec<ChangeCallback> {
        self.watchers
            .get(key)
            .map(|list| list.iter().map(|(_, cb)| Arc::clone(cb)).collect())
            .unwrap_or_default()
    }
}

/// Shared in-memory store. Clones share the same documents.
#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemoryInner>>,
    /// Held while a change is delivered so watchers see writes in order.
    delivery: Arc<Mutex<()>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn doc_key(collection: &str, id: &str) -> DocKey {
    (collection.to_string(), id.to_string())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a document without going through the async port.
    pub fn document(&self, collection: &str, id: &str) -> Option<Document> {
        lock(&self.inner)
            .documents
            .get(&doc_key(collection, id))
            .cloned()
    }

    /// Delete a document and notify its watchers.
    pub fn delete(&self, collection: &str, id: &str) -> bool {
        let key = doc_key(collection, id);
        let _delivery = lock(&self.delivery);
        let callbacks = {
            let mut inner = lock(&self.inner);
            if inner.documents.remove(&key).is_none() {
                return false;
            }
            inner.writes += 1;
            inner.callbacks(&key)
        };
        debug!(collection, id, watchers = callbacks.len(), "document deleted");
        for callback in callbacks {
            callback(DocumentChange::Absent);
        }
        true
    }

    /// Number of live subscriptions on a document.
    pub fn watcher_count(&self, collection: &str, id: &str) -> usize {
        lock(&self.inner)
            .watchers
            .get(&doc_key(collection, id))
            .map_or(0, Vec::len)
    }

    /// Total number of successful writes (set, update, delete).
    pub fn write_count(&self) -> u64 {
        lock(&self.inner).writes
    }

    /// Apply a write under the delivery lock, then push the result.
    fn write_with<F>(&self, collection: &str, id: &str, apply: F) -> Result<(), StoreError>
    where
        F: FnOnce(Option<&mut Document>) -> Result<Option<Document>, StoreError>,
    {
        let key = doc_key(collection, id);
        let _delivery = lock(&self.delivery);
        let (document, callbacks) = {
            let mut inner = lock(&self.inner);
            if let Some(created) = apply(inner.documents.get_mut(&key))? {
                inner.documents.insert(key.clone(), created);
            }
            inner.writes += 1;
            let document = inner.documents.get(&key).cloned();
            (document, inner.callbacks(&key))
        };
        debug!(collection, id, watchers = callbacks.len(), "document written");
        let change = DocumentChange::from_option(document);
        for callback in callbacks {
            callback(change.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        Ok(self.document(collection, id))
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        self.write_with(collection, id, |existing| match existing {
            Some(current) => {
                *current = document;
                Ok(None)
            }
            None => Ok(Some(document)),
        })
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        self.write_with(collection, id, |existing| match existing {
            Some(current) => {
                merge_fields(current, fields);
                Ok(None)
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        })
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
        on_change: ChangeCallback,
    ) -> Result<Subscription, StoreError> {
        let key = doc_key(collection, id);
        let _delivery = lock(&self.delivery);
        let (watcher_id, current) = {
            let mut inner = lock(&self.inner);
            let watcher_id = inner.next_watcher;
            inner.next_watcher += 1;
            inner
                .watchers
                .entry(key.clone())
                .or_default()
                .push((watcher_id, Arc::clone(&on_change)));
            (watcher_id, inner.documents.get(&key).cloned())
        };

        on_change(DocumentChange::from_option(current));

        let inner = Arc::downgrade(&self.inner);
        Ok(Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            let mut inner = lock(&inner);
            if let Some(list) = inner.watchers.get_mut(&key) {
                list.retain(|(id, _)| *id != watcher_id);
                if list.is_empty() {
                    inner.watchers.remove(&key);
                }
            }
        }))
    }
}
