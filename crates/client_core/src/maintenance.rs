//! Offline upkeep for one user's data: legacy schema migration, `order`
//! audits and orphan cleanup. None of this runs from the interactive client.

use std::{collections::HashMap, sync::Arc};

use shared::{
    domain::{CategoryId, ListId, Ordered, UserId, UserIdentity},
    paths::{self, CollectionPath, DocPath, USERS},
};
use storage::{to_fields, Document, DocumentStore, Query, SetMode, Storage, WriteBatch};
use tracing::{info, warn};

use crate::{
    error::{PlannerError, Result},
    ordering::{self, OrderAudit, ORDER_FIELD},
    repositories::{by_order, ListRepository, NamedRecord, TaskRecord},
    subtasks, ClientContext,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    /// The list the flat categories were moved into, if there were any.
    pub list_id: Option<ListId>,
    pub categories: usize,
    pub tasks: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScopeAudit {
    pub collection: CollectionPath,
    /// Sibling ids in rendered order.
    pub ids: Vec<String>,
    pub audit: OrderAudit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Orphan {
    pub collection: CollectionPath,
    /// Nearest ancestor document that no longer exists.
    pub missing_parent: DocPath,
    pub documents: usize,
}

struct Sibling {
    id: String,
    order: u32,
}

impl Ordered for Sibling {
    fn order(&self) -> u32 {
        self.order
    }

    fn sort_key(&self) -> &str {
        &self.id
    }
}

fn sibling(doc: &Document) -> Sibling {
    let order = doc
        .fields
        .get(ORDER_FIELD)
        .and_then(|value| value.as_u64())
        .and_then(|order| u32::try_from(order).ok())
        .unwrap_or_default();
    Sibling {
        id: doc.id().to_string(),
        order,
    }
}

pub struct Maintenance {
    storage: Storage,
    ctx: ClientContext,
}

impl Maintenance {
    /// Fails when `uid` cannot name a user document.
    pub fn new(storage: Storage, uid: UserId) -> Result<Self> {
        paths::checked_user_doc(&uid)?;
        let identity = UserIdentity {
            uid,
            display_name: None,
            email: None,
        };
        let store: Arc<dyn DocumentStore> = Arc::new(storage.clone());
        Ok(Self {
            storage,
            ctx: ClientContext::new(store, identity),
        })
    }

    pub fn uid(&self) -> &UserId {
        self.ctx.uid()
    }

    async fn documents(&self, query: &Query, action: &'static str) -> Result<Vec<Document>> {
        Ok(self
            .storage
            .query(query)
            .await
            .map_err(PlannerError::store(action))?
            .documents)
    }

    /// Moves `users/{uid}/categories/*` and their tasks into a new list named
    /// `list_name`, one atomic batch per category. Ids are kept; creation
    /// times restart at the migration.
    pub async fn migrate_flat_categories(&self, list_name: &str) -> Result<MigrationReport> {
        let uid = self.uid().clone();
        let legacy = self
            .documents(&by_order(paths::legacy_categories(&uid)), "read legacy categories")
            .await?;
        if legacy.is_empty() {
            info!(uid = %uid, "no legacy categories to migrate");
            return Ok(MigrationReport::default());
        }

        let list = ListRepository::new(&self.ctx).create(list_name).await?;
        let mut report = MigrationReport {
            list_id: Some(list.id.clone()),
            ..MigrationReport::default()
        };

        for doc in legacy {
            let category_id = CategoryId::new(doc.id());
            let record: NamedRecord = match doc.decode() {
                Ok(record) => record,
                Err(err) => {
                    warn!(path = %doc.path, error = %err, "skipping unreadable legacy category");
                    continue;
                }
            };
            let legacy_tasks = paths::legacy_tasks(&uid, &category_id);
            let target_tasks = paths::tasks(&uid, &list.id, &category_id);
            let mut batch = WriteBatch::new();
            batch.set(
                paths::categories(&uid, &list.id).doc(&category_id),
                to_fields(&record).map_err(PlannerError::store("migrate category"))?,
                SetMode::Overwrite,
            );

            let tasks = self
                .documents(&by_order(legacy_tasks.clone()), "read legacy tasks")
                .await?;
            let mut moved = 0;
            for task_doc in &tasks {
                let mut task: TaskRecord = match task_doc.decode() {
                    Ok(task) => task,
                    Err(err) => {
                        warn!(path = %task_doc.path, error = %err, "leaving unreadable legacy task");
                        continue;
                    }
                };
                subtasks::assign_legacy_ids(&mut task.subtasks);
                batch.set(
                    target_tasks.doc(task_doc.id()),
                    to_fields(&task).map_err(PlannerError::store("migrate task"))?,
                    SetMode::Overwrite,
                );
                batch.delete(task_doc.path.clone());
                moved += 1;
            }
            batch.delete(doc.path.clone());

            self.storage
                .commit(batch)
                .await
                .map_err(PlannerError::store("migrate category"))?;
            info!(category_id = %category_id, tasks = moved, "migrated legacy category");
            report.categories += 1;
            report.tasks += moved;
        }
        Ok(report)
    }

    /// Every sibling scope: the lists, each list's categories, each category's tasks.
    async fn scopes(&self) -> Result<Vec<CollectionPath>> {
        let uid = self.uid();
        let lists = paths::lists(uid);
        let mut scopes = vec![lists.clone()];
        for list in self.documents(&Query::collection(lists), "read lists").await? {
            let list_id = ListId::new(list.id());
            let categories = paths::categories(uid, &list_id);
            scopes.push(categories.clone());
            for category in self
                .documents(&Query::collection(categories), "read categories")
                .await?
            {
                scopes.push(paths::tasks(uid, &list_id, &CategoryId::new(category.id())));
            }
        }
        Ok(scopes)
    }

    pub async fn audit_order(&self) -> Result<Vec<ScopeAudit>> {
        let mut audits = Vec::new();
        for collection in self.scopes().await? {
            let siblings: Vec<Sibling> = self
                .documents(&by_order(collection.clone()), "audit order")
                .await?
                .iter()
                .map(sibling)
                .collect();
            if siblings.is_empty() {
                continue;
            }
            audits.push(ScopeAudit {
                audit: ordering::audit(&siblings),
                ids: siblings.into_iter().map(|s| s.id).collect(),
                collection,
            });
        }
        Ok(audits)
    }

    /// Reindexes every scope whose orders are not dense, keeping the rendered
    /// order. Returns the repaired scopes.
    pub async fn repair_order(&self) -> Result<Vec<CollectionPath>> {
        let mut repaired = Vec::new();
        for scope in self.audit_order().await? {
            if scope.audit.is_dense() {
                continue;
            }
            self.storage
                .commit(ordering::reindex_batch(&scope.collection, &scope.ids))
                .await
                .map_err(PlannerError::store("repair order"))?;
            info!(collection = %scope.collection, siblings = scope.ids.len(), "reindexed scope");
            repaired.push(scope.collection);
        }
        Ok(repaired)
    }

    /// Collections whose parent, or any ancestor below the user document, is gone.
    pub async fn find_orphans(&self) -> Result<Vec<Orphan>> {
        let collections = self
            .storage
            .collections_under(&paths::user_doc(self.uid()))
            .await
            .map_err(PlannerError::store("list collections"))?;
        let mut exists: HashMap<DocPath, bool> = HashMap::new();
        let mut orphans = Vec::new();

        for collection in collections {
            let mut ancestor = collection.parent();
            while let Some(doc) = ancestor {
                if doc.collection().as_str() == USERS {
                    break;
                }
                let present = match exists.get(&doc) {
                    Some(present) => *present,
                    None => {
                        let present = self
                            .storage
                            .get(&doc)
                            .await
                            .map_err(PlannerError::store("check parent"))?
                            .is_some();
                        exists.insert(doc.clone(), present);
                        present
                    }
                };
                if !present {
                    let documents = self
                        .documents(&Query::collection(collection.clone()), "count orphans")
                        .await?
                        .len();
                    orphans.push(Orphan {
                        collection: collection.clone(),
                        missing_parent: doc,
                        documents,
                    });
                    break;
                }
                ancestor = doc.collection().parent();
            }
        }
        Ok(orphans)
    }

    /// Deletes every orphaned document. Returns how many were removed.
    pub async fn purge_orphans(&self) -> Result<usize> {
        let mut removed = 0;
        for orphan in self.find_orphans().await? {
            let documents = self
                .documents(&Query::collection(orphan.collection.clone()), "purge orphans")
                .await?;
            let mut batch = WriteBatch::new();
            for doc in &documents {
                batch.delete(doc.path.clone());
            }
            self.storage
                .commit(batch)
                .await
                .map_err(PlannerError::store("purge orphans"))?;
            info!(collection = %orphan.collection, documents = documents.len(), "purged orphans");
            removed += documents.len();
        }
        Ok(removed)
    }

    /// The user document followed by every document below it.
    pub async fn dump(&self) -> Result<Vec<Document>> {
        let user_doc = paths::user_doc(self.uid());
        let mut documents: Vec<Document> = self
            .storage
            .get(&user_doc)
            .await
            .map_err(PlannerError::store("dump"))?
            .into_iter()
            .collect();
        let collections = self
            .storage
            .collections_under(&user_doc)
            .await
            .map_err(PlannerError::store("dump"))?;
        for collection in collections {
            documents.extend(self.documents(&Query::collection(collection), "dump").await?);
        }
        Ok(documents)
    }
}

#[cfg(test)]
#[path = "tests/maintenance_tests.rs"]
mod tests;
