use std::{
    pin::Pin,
    task::{Context, Poll},
};

use futures::Stream;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::{QuerySnapshot, StoreError};

/// A live query. Snapshots arrive in commit order for this query only; there
/// is no ordering relative to other subscriptions.
pub struct Subscription {
    rx: mpsc::Receiver<Result<QuerySnapshot, StoreError>>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// Wraps an externally fed channel, e.g. a scripted sequence of snapshots.
    pub fn from_receiver(rx: mpsc::Receiver<Result<QuerySnapshot, StoreError>>) -> Self {
        Self { rx, task: None }
    }

    pub(crate) fn spawned(
        rx: mpsc::Receiver<Result<QuerySnapshot, StoreError>>,
        task: JoinHandle<()>,
    ) -> Self {
        Self {
            rx,
            task: Some(task),
        }
    }

    pub async fn next_snapshot(&mut self) -> Option<Result<QuerySnapshot, StoreError>> {
        self.rx.recv().await
    }
}

impl Stream for Subscription {
    type Item = Result<QuerySnapshot, StoreError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.get_mut().rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
