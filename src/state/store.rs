//! Document store port.
//!
//! The game manager talks to its backing store only through
//! [`DocumentStore`]: a keyed collection of JSON objects with whole-document
//! writes, top-level merge writes and a push feed per document. Any backend
//! with those four operations can sit behind it; [`MemoryStore`] is the
//! in-process one.
//!
//! [`MemoryStore`]: super::memory::MemoryStore

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, serde_json::Value>;

/// What a subscription pushes.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentChange {
    /// The full current document
    Present(Document),
    /// The document does not exist (never created, or deleted)
    Absent,
}

impl DocumentChange {
    pub fn from_option(document: Option<Document>) -> Self {
        match document {
            Some(document) => Self::Present(document),
            None => Self::Absent,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }
}

/// Receives pushes for one subscribed document.
///
/// Callbacks run on the writer's task and must not write back to the store.
pub type ChangeCallback = Arc<dyn Fn(DocumentChange) + Send + Sync>;

/// Live subscription handle. Dropping it unsubscribes.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// Stop receiving pushes.
    pub fn unsubscribe(mut self) {
        self.cancel_now();
    }

    fn cancel_now(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.cancel_now();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

/// Store-layer failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: String },
    #[error("store unavailable")]
    Unavailable,
    #[error("store backend error: {0}")]
    Backend(String),
}

/// A keyed document store with per-document change feeds.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a document once.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Write a whole document, replacing any previous one.
    async fn set(&self, collection: &str, id: &str, document: Document) -> Result<(), StoreError>;

    /// Overwrite the given top-level fields of an existing document.
    ///
    /// Fields not named are left alone; named fields are replaced whole.
    async fn update(&self, collection: &str, id: &str, fields: Document) -> Result<(), StoreError>;

    /// Watch a document.
    ///
    /// `on_change` is called promptly with the current state, then again on
    /// every change from any writer, with [`DocumentChange::Absent`] once the
    /// document is gone.
    async fn subscribe(
        &self,
        collection: &str,
        id: &str,
        on_change: ChangeCallback,
    ) -> Result<Subscription, StoreError>;
}

/// Serialize a value that must be a JSON object.
pub fn to_document<T: Serialize + ?Sized>(value: &T) -> Result<Document, serde_json::Error> {
    match serde_json::to_value(value)? {
        serde_json::Value::Object(map) => Ok(map),
        other => Err(serde::ser::Error::custom(format!(
            "expected a JSON object, got {other}"
        ))),
    }
}

/// Merge top-level fields into a document.
pub fn merge_fields(document: &mut Document, fields: Document) {
    for (key, value) in fields {
        document.insert(key, value);
    }
}
