use serde_json::json;
use shared::{
    domain::{ListId, TaskList},
    paths::{self, CollectionPath},
};
use storage::{to_fields, Document, Fields, SetMode, StoreError};
use tracing::info;

use super::{by_order, decode_documents, LiveSequence, NamedRecord};
use crate::{
    error::{PlannerError, Result},
    ordering, ClientContext,
};

pub(crate) fn list_from_document(doc: &Document) -> Result<TaskList, StoreError> {
    let record: NamedRecord = doc.decode()?;
    Ok(TaskList {
        id: ListId::new(doc.id()),
        name: record.name,
        order: record.order,
        created_at: doc.create_time,
    })
}

#[derive(Clone)]
pub struct ListRepository {
    ctx: ClientContext,
    collection: CollectionPath,
}

impl ListRepository {
    pub fn new(ctx: &ClientContext) -> Self {
        Self {
            collection: paths::lists(ctx.uid()),
            ctx: ctx.clone(),
        }
    }

    pub async fn all(&self) -> Result<Vec<TaskList>> {
        let snapshot = self
            .ctx
            .store()
            .query(&by_order(self.collection.clone()))
            .await
            .map_err(PlannerError::store("load lists"))?;
        Ok(decode_documents(&snapshot.documents, list_from_document))
    }

    /// Appends a list after the siblings visible right now.
    pub async fn create(&self, name: &str) -> Result<TaskList> {
        let order = ordering::append_order(self.all().await?.len());
        let fields = to_fields(&NamedRecord {
            name: name.trim().to_string(),
            order,
        })
        .map_err(PlannerError::store("create list"))?;
        let doc = self
            .ctx
            .store()
            .add(&self.collection, fields)
            .await
            .map_err(PlannerError::store("create list"))?;
        info!(list_id = doc.id(), order, "created list");
        list_from_document(&doc).map_err(PlannerError::store("create list"))
    }

    pub async fn rename(&self, id: &ListId, name: &str) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name.trim()));
        self.ctx
            .store()
            .set(&self.collection.doc(id), fields, SetMode::Merge)
            .await
            .map_err(PlannerError::store("rename list"))
    }

    /// Refuses to remove the last remaining list. Its categories and tasks stay behind.
    pub async fn delete(&self, id: &ListId) -> Result<()> {
        if self.all().await?.len() <= 1 {
            return Err(PlannerError::LastList);
        }
        self.ctx
            .store()
            .delete(&self.collection.doc(id))
            .await
            .map_err(PlannerError::store("delete list"))?;
        info!(list_id = %id, "deleted list");
        Ok(())
    }

    pub async fn reorder(&self, final_order: &[ListId]) -> Result<()> {
        self.ctx
            .store()
            .commit(ordering::reindex_batch(&self.collection, final_order))
            .await
            .map_err(PlannerError::store("reorder lists"))
    }

    pub fn subscribe(&self) -> LiveSequence<TaskList> {
        LiveSequence::new(
            self.ctx.store().subscribe(by_order(self.collection.clone())),
            list_from_document,
        )
    }
}
