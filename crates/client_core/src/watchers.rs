use std::{collections::HashMap, hash::Hash};

use storage::StoreError;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::debug;

use crate::repositories::LiveSequence;

/// Forwarding tasks keyed by what they watch. Replacing, removing or dropping
/// a watcher aborts its task, which drops the underlying subscription.
pub(crate) struct Watchers<K: Eq + Hash> {
    tasks: HashMap<K, JoinHandle<()>>,
}

impl<K: Eq + Hash + std::fmt::Debug> Watchers<K> {
    pub fn new() -> Self {
        Self {
            tasks: HashMap::new(),
        }
    }

    pub fn insert(&mut self, key: K, task: JoinHandle<()>) {
        if let Some(previous) = self.tasks.insert(key, task) {
            previous.abort();
        }
    }

    pub fn remove(&mut self, key: &K) {
        if let Some(task) = self.tasks.remove(key) {
            debug!(watch = ?key, "stopped watch");
            task.abort();
        }
    }

    pub fn contains(&self, key: &K) -> bool {
        self.tasks.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }
}

impl<K: Eq + Hash> Drop for Watchers<K> {
    fn drop(&mut self) {
        for (_, task) in self.tasks.drain() {
            task.abort();
        }
    }
}

/// Pumps every sequence from `live` into `tx` as a controller message.
pub(crate) fn forward<T, M>(
    mut live: LiveSequence<T>,
    tx: mpsc::Sender<M>,
    into_message: impl Fn(Result<Vec<T>, StoreError>) -> M + Send + 'static,
) -> JoinHandle<()>
where
    T: Send + 'static,
    M: Send + 'static,
{
    tokio::spawn(async move {
        while let Some(next) = live.next().await {
            if tx.send(into_message(next)).await.is_err() {
                break;
            }
        }
    })
}
