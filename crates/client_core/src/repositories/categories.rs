use serde_json::json;
use shared::{
    domain::{Category, CategoryId, ListId},
    paths::{self, CollectionPath},
};
use storage::{to_fields, Document, Fields, StoreError};
use tracing::info;

use super::{by_order, decode_documents, LiveSequence, NamedRecord};
use crate::{
    error::{PlannerError, Result},
    ordering, ClientContext,
};

pub(crate) fn category_from_document(
    list_id: &ListId,
    doc: &Document,
) -> Result<Category, StoreError> {
    let record: NamedRecord = doc.decode()?;
    Ok(Category {
        id: CategoryId::new(doc.id()),
        list_id: list_id.clone(),
        name: record.name,
        order: record.order,
        created_at: doc.create_time,
    })
}

/// Categories of one list.
#[derive(Clone)]
pub struct CategoryRepository {
    ctx: ClientContext,
    list_id: ListId,
    collection: CollectionPath,
}

impl CategoryRepository {
    pub fn new(ctx: &ClientContext, list_id: &ListId) -> Self {
        Self {
            collection: paths::categories(ctx.uid(), list_id),
            list_id: list_id.clone(),
            ctx: ctx.clone(),
        }
    }

    pub fn list_id(&self) -> &ListId {
        &self.list_id
    }

    pub async fn all(&self) -> Result<Vec<Category>> {
        let snapshot = self
            .ctx
            .store()
            .query(&by_order(self.collection.clone()))
            .await
            .map_err(PlannerError::store("load categories"))?;
        Ok(decode_documents(&snapshot.documents, |doc| {
            category_from_document(&self.list_id, doc)
        }))
    }

    pub async fn create(&self, name: &str) -> Result<Category> {
        let order = ordering::append_order(self.all().await?.len());
        let fields = to_fields(&NamedRecord {
            name: name.trim().to_string(),
            order,
        })
        .map_err(PlannerError::store("add category"))?;
        let doc = self
            .ctx
            .store()
            .add(&self.collection, fields)
            .await
            .map_err(PlannerError::store("add category"))?;
        info!(list_id = %self.list_id, category_id = doc.id(), order, "created category");
        category_from_document(&self.list_id, &doc).map_err(PlannerError::store("add category"))
    }

    pub async fn rename(&self, id: &CategoryId, name: &str) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("name".into(), json!(name.trim()));
        self.ctx
            .store()
            .update(&self.collection.doc(id), fields)
            .await
            .map_err(PlannerError::store("rename category"))
    }

    /// Leaves the category's tasks in place.
    pub async fn delete(&self, id: &CategoryId) -> Result<()> {
        self.ctx
            .store()
            .delete(&self.collection.doc(id))
            .await
            .map_err(PlannerError::store("delete category"))
    }

    pub async fn reorder(&self, final_order: &[CategoryId]) -> Result<()> {
        self.ctx
            .store()
            .commit(ordering::reindex_batch(&self.collection, final_order))
            .await
            .map_err(PlannerError::store("reorder categories"))
    }

    pub fn subscribe(&self) -> LiveSequence<Category> {
        let list_id = self.list_id.clone();
        LiveSequence::new(
            self.ctx.store().subscribe(by_order(self.collection.clone())),
            move |doc| category_from_document(&list_id, doc),
        )
    }
}
