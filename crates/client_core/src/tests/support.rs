//! Stores and helpers shared by the client tests.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use chrono::Utc;
use shared::{
    domain::{UserId, UserIdentity},
    paths::{CollectionPath, DocPath},
};
use storage::{
    Document, DocumentStore, Fields, Query, QuerySnapshot, SetMode, StoreError, Storage,
    Subscription, WriteBatch,
};
use tokio::sync::mpsc;

use crate::ClientContext;

pub(crate) const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

pub(crate) fn identity(uid: &str) -> UserIdentity {
    UserIdentity {
        uid: UserId::new(uid),
        display_name: Some(format!("User {uid}")),
        email: None,
    }
}

pub(crate) async fn memory_storage() -> Storage {
    Storage::new("sqlite::memory:").await.expect("memory store")
}

pub(crate) async fn memory_context(uid: &str) -> (Storage, ClientContext) {
    let storage = memory_storage().await;
    let ctx = ClientContext::new(Arc::new(storage.clone()), identity(uid));
    (storage, ctx)
}

fn unavailable() -> StoreError {
    StoreError::Unavailable("store offline".into())
}

/// A real store whose writes can be switched off.
pub(crate) struct FlakyStore {
    inner: Storage,
    fail_writes: AtomicBool,
}

impl FlakyStore {
    pub fn new(inner: Storage) -> Arc<Self> {
        Arc::new(Self {
            inner,
            fail_writes: AtomicBool::new(false),
        })
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            Err(unavailable())
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FlakyStore {
    async fn get(&self, path: &DocPath) -> Result<Option<Document>, StoreError> {
        self.inner.get(path).await
    }

    async fn add(&self, collection: &CollectionPath, fields: Fields) -> Result<Document, StoreError> {
        self.check()?;
        self.inner.add(collection, fields).await
    }

    async fn set(&self, path: &DocPath, fields: Fields, mode: SetMode) -> Result<(), StoreError> {
        self.check()?;
        self.inner.set(path, fields, mode).await
    }

    async fn update(&self, path: &DocPath, fields: Fields) -> Result<(), StoreError> {
        self.check()?;
        self.inner.update(path, fields).await
    }

    async fn delete(&self, path: &DocPath) -> Result<(), StoreError> {
        self.check()?;
        self.inner.delete(path).await
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        self.check()?;
        self.inner.commit(batch).await
    }

    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        self.inner.query(query).await
    }

    fn subscribe(&self, query: Query) -> Subscription {
        self.inner.subscribe(query)
    }
}

type Feed = mpsc::Sender<Result<QuerySnapshot, StoreError>>;

/// No backend at all: every subscription is fed by the test, reads are empty
/// and writes fail.
#[derive(Default)]
pub(crate) struct ScriptedStore {
    feeds: Mutex<Vec<(CollectionPath, Feed)>>,
}

impl ScriptedStore {
    /// Sends a snapshot to every open subscription on `collection`.
    pub async fn push(&self, collection: &CollectionPath, documents: Vec<Document>) {
        let feeds: Vec<Feed> = self
            .feeds
            .lock()
            .expect("feeds")
            .iter()
            .filter(|(c, _)| c == collection)
            .map(|(_, feed)| feed.clone())
            .collect();
        assert!(!feeds.is_empty(), "nobody subscribed to {collection}");
        for feed in feeds {
            let snapshot = QuerySnapshot {
                collection: collection.clone(),
                documents: documents.clone(),
                read_time: Utc::now(),
            };
            let _ = feed.send(Ok(snapshot)).await;
        }
    }

    pub fn subscribers(&self, collection: &CollectionPath) -> usize {
        self.feeds
            .lock()
            .expect("feeds")
            .iter()
            .filter(|(c, feed)| c == collection && !feed.is_closed())
            .count()
    }
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn get(&self, _path: &DocPath) -> Result<Option<Document>, StoreError> {
        Ok(None)
    }

    async fn add(&self, _collection: &CollectionPath, _fields: Fields) -> Result<Document, StoreError> {
        Err(unavailable())
    }

    async fn set(&self, _path: &DocPath, _fields: Fields, _mode: SetMode) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn update(&self, _path: &DocPath, _fields: Fields) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn delete(&self, _path: &DocPath) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn commit(&self, _batch: WriteBatch) -> Result<(), StoreError> {
        Err(unavailable())
    }

    async fn query(&self, query: &Query) -> Result<QuerySnapshot, StoreError> {
        Ok(QuerySnapshot {
            collection: query.collection.clone(),
            documents: Vec::new(),
            read_time: Utc::now(),
        })
    }

    fn subscribe(&self, query: Query) -> Subscription {
        let (tx, rx) = mpsc::channel(8);
        self.feeds
            .lock()
            .expect("feeds")
            .push((query.collection, tx));
        Subscription::from_receiver(rx)
    }
}

pub(crate) fn document(collection: &CollectionPath, id: &str, fields: serde_json::Value) -> Document {
    let fields = match fields {
        serde_json::Value::Object(map) => map,
        other => panic!("expected object, got {other}"),
    };
    let now = Utc::now();
    Document {
        path: collection.doc(id),
        fields,
        create_time: now,
        update_time: now,
    }
}
