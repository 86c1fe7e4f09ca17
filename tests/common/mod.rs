//! Shared test doubles.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::oneshot;

use squares_pool_state::state::{
    ChangeCallback, Document, DocumentStore, MemoryStore, StoreError, Subscription,
};

/// An update parked at the gate, with the field groups it carries.
struct Parked {
    fields: Vec<String>,
    release: oneshot::Sender<()>,
}

/// A [`MemoryStore`] wrapper that can fail writes, hold updates until the
/// test releases them, or keep delivering after unsubscribe.
#[derive(Default)]
pub struct ScriptedStore {
    pub memory: MemoryStore,
    fail_writes: AtomicBool,
    gate_updates: AtomicBool,
    leak_subscriptions: AtomicBool,
    parked: Mutex<Vec<Parked>>,
    leaked: Mutex<Vec<Subscription>>,
}

impl ScriptedStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn gate_updates(&self, gate: bool) {
        self.gate_updates.store(gate, Ordering::SeqCst);
    }

    /// Ignore unsubscribe: old callbacks keep receiving pushes.
    pub fn leak_subscriptions(&self, leak: bool) {
        self.leak_subscriptions.store(leak, Ordering::SeqCst);
    }

    pub fn parked_count(&self) -> usize {
        self.parked.lock().unwrap().len()
    }

    /// Wait until `count` updates are parked at the gate.
    pub async fn wait_parked(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.parked_count() < count {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("updates never reached the gate");
    }

    /// Let through the parked update whose field groups are exactly `fields`.
    pub fn release(&self, fields: &[&str]) {
        let mut parked = self.parked.lock().unwrap();
        let idx = parked
            .iter()
            .position(|p| p.fields == fields)
            .unwrap_or_else(|| panic!("no parked update with fields {fields:?}"));
        let entry = parked.remove(idx);
        let _ = entry.release.send(());
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.memory.get(collection, id).await
    }

    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        self.memory.set(collection, id, document).await
    }

    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        if self.gate_updates.load(Ordering::SeqCst) {
            let (tx, rx) = oneshot::channel();
            let mut names: Vec<String> = fields.keys().cloned().collect();
            names.sort();
            self.parked.lock().unwrap().push(Parked {
                fields: names,
                release: tx,
            });
            let _ = rx.await;
        }
        self.memory.update(collection, id, fields).await
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
        on_change: ChangeCallback,
    ) -> Result<Subscription, StoreError> {
        let subscription = self.memory.subscribe(collection, id, on_change).await?;
        if self.leak_subscriptions.load(Ordering::SeqCst) {
            self.leaked.lock().unwrap().push(subscription);
            return Ok(Subscription::new(|| {}));
        }
        Ok(subscription)
    }
}
