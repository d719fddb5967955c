use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use shared::{
    dates::optional_calendar_date,
    domain::{CategoryId, ListId, Subtask, SubtaskId, Task, TaskId},
    paths::{self, CollectionPath},
};
use storage::{to_fields, Document, Fields, StoreError};
use tracing::{debug, info};

use super::{by_order, decode_documents, LiveSequence};
use crate::{
    error::{PlannerError, Result},
    ordering, subtasks, ClientContext,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct TaskRecord {
    pub text: String,
    #[serde(default)]
    pub order: u32,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default, with = "optional_calendar_date")]
    pub due_date: Option<NaiveDate>,
    #[serde(default)]
    pub subtasks: Vec<Subtask>,
}

pub(crate) fn task_from_document(
    category_id: &CategoryId,
    doc: &Document,
) -> Result<Task, StoreError> {
    let mut record: TaskRecord = doc.decode()?;
    subtasks::assign_legacy_ids(&mut record.subtasks);
    Ok(Task {
        id: TaskId::new(doc.id()),
        category_id: category_id.clone(),
        text: record.text,
        order: record.order,
        is_complete: record.is_complete,
        due_date: record.due_date,
        created_at: doc.create_time,
        subtasks: record.subtasks,
    })
}

fn subtask_fields(subtasks: &[Subtask]) -> Result<Fields, StoreError> {
    let mut fields = Fields::new();
    fields.insert("subtasks".into(), serde_json::to_value(subtasks)?);
    Ok(fields)
}

/// Tasks of one category.
#[derive(Clone)]
pub struct TaskRepository {
    ctx: ClientContext,
    category_id: CategoryId,
    collection: CollectionPath,
}

impl TaskRepository {
    pub fn new(ctx: &ClientContext, list_id: &ListId, category_id: &CategoryId) -> Self {
        Self {
            collection: paths::tasks(ctx.uid(), list_id, category_id),
            category_id: category_id.clone(),
            ctx: ctx.clone(),
        }
    }

    pub async fn all(&self) -> Result<Vec<Task>> {
        let snapshot = self
            .ctx
            .store()
            .query(&by_order(self.collection.clone()))
            .await
            .map_err(PlannerError::store("load tasks"))?;
        Ok(decode_documents(&snapshot.documents, |doc| {
            task_from_document(&self.category_id, doc)
        }))
    }

    pub async fn get(&self, id: &TaskId) -> Result<Task> {
        let doc = self
            .ctx
            .store()
            .get(&self.collection.doc(id))
            .await
            .map_err(PlannerError::store("load task"))?
            .ok_or_else(|| PlannerError::not_found("task", id.as_str()))?;
        task_from_document(&self.category_id, &doc).map_err(PlannerError::store("load task"))
    }

    pub async fn create(&self, text: &str, due_date: Option<NaiveDate>) -> Result<Task> {
        let order = ordering::append_order(self.all().await?.len());
        let fields = to_fields(&TaskRecord {
            text: text.trim().to_string(),
            order,
            is_complete: false,
            due_date,
            subtasks: Vec::new(),
        })
        .map_err(PlannerError::store("add task"))?;
        let doc = self
            .ctx
            .store()
            .add(&self.collection, fields)
            .await
            .map_err(PlannerError::store("add task"))?;
        info!(category_id = %self.category_id, task_id = doc.id(), order, "created task");
        task_from_document(&self.category_id, &doc).map_err(PlannerError::store("add task"))
    }

    /// Saves an edit draft. `None` clears the due date.
    pub async fn edit(&self, id: &TaskId, text: &str, due_date: Option<NaiveDate>) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert("text".into(), json!(text.trim()));
        fields.insert(
            "dueDate".into(),
            json!(due_date.map(shared::dates::format_calendar_date)),
        );
        self.ctx
            .store()
            .update(&self.collection.doc(id), fields)
            .await
            .map_err(PlannerError::store("update task"))
    }

    /// Completing also completes every subtask; uncompleting leaves them as they are.
    pub async fn set_complete(&self, id: &TaskId, complete: bool) -> Result<Task> {
        let mut task = self.get(id).await?;
        let mut fields = Fields::new();
        fields.insert("isComplete".into(), json!(complete));
        if complete && subtasks::complete_all(&mut task.subtasks) {
            fields.extend(subtask_fields(&task.subtasks).map_err(PlannerError::store("update task"))?);
        }
        self.ctx
            .store()
            .update(&self.collection.doc(id), fields)
            .await
            .map_err(PlannerError::store("update task"))?;
        task.is_complete = complete;
        Ok(task)
    }

    /// Subtasks embedded in the task are removed with it.
    pub async fn delete(&self, id: &TaskId) -> Result<()> {
        self.ctx
            .store()
            .delete(&self.collection.doc(id))
            .await
            .map_err(PlannerError::store("delete task"))
    }

    pub async fn reorder(&self, final_order: &[TaskId]) -> Result<()> {
        self.ctx
            .store()
            .commit(ordering::reindex_batch(&self.collection, final_order))
            .await
            .map_err(PlannerError::store("reorder tasks"))
    }

    pub async fn add_subtask(&self, task_id: &TaskId, text: &str) -> Result<Task> {
        let now = Utc::now();
        self.modify_subtasks(task_id, "add subtask", |subtasks| {
            subtasks::add(subtasks, text, now).is_some()
        })
        .await
    }

    pub async fn toggle_subtask(&self, task_id: &TaskId, subtask_id: &SubtaskId) -> Result<Task> {
        self.modify_subtasks(task_id, "update subtask", |subtasks| {
            subtasks::toggle(subtasks, subtask_id)
        })
        .await
    }

    pub async fn edit_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        text: &str,
    ) -> Result<Task> {
        self.modify_subtasks(task_id, "update subtask", |subtasks| {
            subtasks::edit(subtasks, subtask_id, text)
        })
        .await
    }

    pub async fn delete_subtask(&self, task_id: &TaskId, subtask_id: &SubtaskId) -> Result<Task> {
        self.modify_subtasks(task_id, "delete subtask", |subtasks| {
            subtasks::remove(subtasks, subtask_id)
        })
        .await
    }

    pub async fn move_subtask(
        &self,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        index: usize,
    ) -> Result<Task> {
        self.modify_subtasks(task_id, "reorder subtasks", |subtasks| {
            subtasks::move_to(subtasks, subtask_id, index)
        })
        .await
    }

    /// Reads the task fresh, applies `change`, and rewrites the whole sequence
    /// in one update when it changed.
    async fn modify_subtasks(
        &self,
        task_id: &TaskId,
        action: &'static str,
        change: impl FnOnce(&mut Vec<Subtask>) -> bool,
    ) -> Result<Task> {
        let mut task = self.get(task_id).await?;
        if !change(&mut task.subtasks) {
            debug!(task_id = %task_id, action, "subtask change was a no-op");
            return Ok(task);
        }
        let fields = subtask_fields(&task.subtasks).map_err(PlannerError::store(action))?;
        self.ctx
            .store()
            .update(&self.collection.doc(task_id), fields)
            .await
            .map_err(PlannerError::store(action))?;
        Ok(task)
    }

    pub fn subscribe(&self) -> LiveSequence<Task> {
        let category_id = self.category_id.clone();
        LiveSequence::new(
            self.ctx.store().subscribe(by_order(self.collection.clone())),
            move |doc| task_from_document(&category_id, doc),
        )
    }
}
