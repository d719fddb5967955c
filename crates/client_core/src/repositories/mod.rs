//! Mappers between in-memory entities and store documents.
//!
//! Entity timestamps are store-native and come from document metadata.
//! Repositories do no referential-integrity checks: a child written under a
//! deleted parent simply becomes an orphan.

use serde::{Deserialize, Serialize};
use shared::paths::CollectionPath;
use storage::{Direction, Document, Query, StoreError, Subscription};
use tracing::warn;

use crate::ordering::ORDER_FIELD;

mod categories;
mod events;
mod lists;
mod profile;
mod settings;
mod tasks;

pub use categories::CategoryRepository;
pub use events::{EventInput, EventRepository, DEFAULT_REMINDER_MINUTES};
pub use lists::ListRepository;
pub use profile::ProfileRepository;
pub use settings::SettingsRepository;
pub use tasks::TaskRepository;

pub(crate) use categories::category_from_document;
pub(crate) use events::event_from_document;
pub(crate) use lists::list_from_document;
pub(crate) use tasks::{task_from_document, TaskRecord};

/// Stored shape shared by lists and categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct NamedRecord {
    pub name: String,
    #[serde(default)]
    pub order: u32,
}

type Decoder<T> = Box<dyn Fn(&Document) -> Result<T, StoreError> + Send + Sync>;

/// A subscription decoded into entities, one full sequence per snapshot.
pub struct LiveSequence<T> {
    subscription: Subscription,
    decode: Decoder<T>,
}

impl<T> LiveSequence<T> {
    pub(crate) fn new(
        subscription: Subscription,
        decode: impl Fn(&Document) -> Result<T, StoreError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            subscription,
            decode: Box::new(decode),
        }
    }

    /// Next full sequence; `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<Result<Vec<T>, StoreError>> {
        let snapshot = self.subscription.next_snapshot().await?;
        Some(snapshot.map(|snapshot| decode_documents(&snapshot.documents, &self.decode)))
    }
}

/// Documents that fail to decode are logged and left out.
pub(crate) fn decode_documents<T>(
    documents: &[Document],
    decode: impl Fn(&Document) -> Result<T, StoreError>,
) -> Vec<T> {
    documents
        .iter()
        .filter_map(|doc| match decode(doc) {
            Ok(item) => Some(item),
            Err(err) => {
                warn!(path = %doc.path, error = %err, "skipping undecodable document");
                None
            }
        })
        .collect()
}

pub(crate) fn by_order(collection: CollectionPath) -> Query {
    Query::collection(collection).order_by(ORDER_FIELD, Direction::Ascending)
}

#[cfg(test)]
#[path = "../tests/repositories_tests.rs"]
mod tests;
