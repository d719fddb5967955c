use std::{collections::VecDeque, sync::Arc};

use shared::{
    dates,
    domain::{CategoryId, ListId, SubtaskId, Task, TaskId},
    error::ErrorCode,
};
use storage::StoreError;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::{
    alerts::AlertSink,
    board::{BoardDraft, BoardEffect, BoardMessage, BoardState, BoardWatch},
    error::{PlannerError, Result},
    ordering,
    repositories::{CategoryRepository, ListRepository, ProfileRepository, TaskRepository},
    watchers::{forward, Watchers},
    ClientContext,
};

const MESSAGE_BUFFER: usize = 64;

/// Drives the to-do board for one signed-in user.
///
/// Snapshots from the running watches and the outcome of user commands both
/// end up in [`BoardState::apply`]. Local echoes are applied only after the
/// store acknowledged the write, so a failed command leaves the state as it was.
pub struct BoardController {
    ctx: ClientContext,
    alerts: Arc<dyn AlertSink>,
    default_list_name: String,
    profile: ProfileRepository,
    title: String,
    state: BoardState,
    watchers: Watchers<BoardWatch>,
    tx: mpsc::Sender<BoardMessage>,
    rx: mpsc::Receiver<BoardMessage>,
}

impl BoardController {
    pub fn new(
        ctx: ClientContext,
        alerts: Arc<dyn AlertSink>,
        default_list_name: impl Into<String>,
        default_title: impl Into<String>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        let default_title = default_title.into();
        Self {
            profile: ProfileRepository::new(&ctx, default_title.clone()),
            title: default_title,
            ctx,
            alerts,
            default_list_name: default_list_name.into(),
            state: BoardState::default(),
            watchers: Watchers::new(),
            tx,
            rx,
        }
    }

    pub fn state(&self) -> &BoardState {
        &self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Number of live watches, lists included.
    pub fn watch_count(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_watching(&self, watch: &BoardWatch) -> bool {
        self.watchers.contains(watch)
    }

    pub async fn start(&mut self) {
        match self.profile.title().await {
            Ok(title) => self.title = title,
            Err(err) => self.report(err),
        }
        self.run_effects(vec![BoardEffect::Watch(BoardWatch::Lists)])
            .await;
    }

    /// Waits for the next snapshot and folds it in.
    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(message) => {
                self.dispatch(message).await;
                true
            }
            None => false,
        }
    }

    /// Folds in every snapshot that is already waiting.
    pub async fn process_pending(&mut self) -> usize {
        let mut processed = 0;
        while let Ok(message) = self.rx.try_recv() {
            self.dispatch(message).await;
            processed += 1;
        }
        processed
    }

    pub async fn dispatch(&mut self, message: BoardMessage) {
        let effects = self.state.apply(message);
        self.run_effects(effects).await;
    }

    async fn run_effects(&mut self, effects: Vec<BoardEffect>) {
        let mut queue: VecDeque<BoardEffect> = effects.into();
        while let Some(effect) = queue.pop_front() {
            debug!(effect = ?effect, "board effect");
            match effect {
                BoardEffect::Watch(watch) => self.watch(watch),
                BoardEffect::Unwatch(watch) => self.watchers.remove(&watch),
                BoardEffect::Alert(text) => self.alerts.alert(&text),
                BoardEffect::CreateDefaultList => {
                    if let Some(message) = self.create_default_list().await {
                        queue.extend(self.state.apply(message));
                    }
                }
            }
        }
    }

    async fn create_default_list(&self) -> Option<BoardMessage> {
        let outcome = self.fetch_or_create_default_list().await;
        self.settle(outcome)
    }

    async fn fetch_or_create_default_list(&self) -> Result<BoardMessage> {
        let repo = ListRepository::new(&self.ctx);
        // Another session may have created one since the empty snapshot.
        let existing = repo.all().await?;
        if !existing.is_empty() {
            return Ok(BoardMessage::ListsChanged(existing));
        }
        let list = repo.create(&self.default_list_name).await?;
        info!(list_id = %list.id, "created default list");
        Ok(BoardMessage::ListCreated(list))
    }

    fn watch(&mut self, watch: BoardWatch) {
        let tx = self.tx.clone();
        let task = match &watch {
            BoardWatch::Lists => forward(
                ListRepository::new(&self.ctx).subscribe(),
                tx,
                |next| match next {
                    Ok(lists) => BoardMessage::ListsChanged(lists),
                    Err(err) => watch_failed(BoardWatch::Lists, "load lists", err),
                },
            ),
            BoardWatch::Categories(list_id) => {
                let list_id = list_id.clone();
                forward(
                    CategoryRepository::new(&self.ctx, &list_id).subscribe(),
                    tx,
                    move |next| match next {
                        Ok(categories) => BoardMessage::CategoriesChanged {
                            list_id: list_id.clone(),
                            categories,
                        },
                        Err(err) => watch_failed(
                            BoardWatch::Categories(list_id.clone()),
                            "load categories",
                            err,
                        ),
                    },
                )
            }
            BoardWatch::Tasks(list_id, category_id) => {
                let (list_id, category_id) = (list_id.clone(), category_id.clone());
                forward(
                    TaskRepository::new(&self.ctx, &list_id, &category_id).subscribe(),
                    tx,
                    move |next| match next {
                        Ok(tasks) => BoardMessage::TasksChanged {
                            list_id: list_id.clone(),
                            category_id: category_id.clone(),
                            tasks,
                        },
                        Err(err) => watch_failed(
                            BoardWatch::Tasks(list_id.clone(), category_id.clone()),
                            "load tasks",
                            err,
                        ),
                    },
                )
            }
        };
        debug!(watch = ?watch, "started watch");
        self.watchers.insert(watch, task);
    }

    fn report(&self, err: PlannerError) {
        match err.code() {
            ErrorCode::Rejected | ErrorCode::Validation => {
                warn!(code = ?err.code(), error = %err, "board command refused")
            }
            _ => error!(code = ?err.code(), error = %err, "board command failed"),
        }
        self.alerts.alert(&err.alert_text());
    }

    /// Alerts once on failure.
    fn settle<T>(&self, outcome: Result<T>) -> Option<T> {
        outcome.map_err(|err| self.report(err)).ok()
    }

    fn active_list_id(&self) -> Option<ListId> {
        self.state.active_list.clone()
    }

    fn tasks(&self, category_id: &CategoryId) -> Option<TaskRepository> {
        let list_id = self.active_list_id()?;
        Some(TaskRepository::new(&self.ctx, &list_id, category_id))
    }

    // Title

    pub async fn set_title(&mut self, title: &str) -> bool {
        let title = title.trim();
        if title.is_empty() {
            return false;
        }
        if self.settle(self.profile.set_title(title).await).is_none() {
            return false;
        }
        self.title = title.to_string();
        true
    }

    // Lists

    pub async fn select_list(&mut self, list_id: &ListId) {
        self.dispatch(BoardMessage::SelectList(list_id.clone())).await;
    }

    /// Creates a list and switches to it.
    pub async fn create_list(&mut self, name: &str) -> Option<ListId> {
        if name.trim().is_empty() {
            return None;
        }
        let list = self.settle(ListRepository::new(&self.ctx).create(name).await)?;
        let list_id = list.id.clone();
        self.dispatch(BoardMessage::ListCreated(list)).await;
        Some(list_id)
    }

    pub async fn rename_list(&mut self, list_id: &ListId, name: &str) -> bool {
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        if self
            .settle(ListRepository::new(&self.ctx).rename(list_id, name).await)
            .is_none()
        {
            return false;
        }
        self.dispatch(BoardMessage::ListRenamed {
            list_id: list_id.clone(),
            name: name.to_string(),
        })
        .await;
        true
    }

    /// Deletes the active list and moves to another. The only list is never deleted.
    pub async fn delete_active_list(&mut self) -> bool {
        let Some(list_id) = self.active_list_id() else {
            return false;
        };
        if self
            .settle(ListRepository::new(&self.ctx).delete(&list_id).await)
            .is_none()
        {
            return false;
        }
        self.dispatch(BoardMessage::ListDeleted(list_id)).await;
        true
    }

    pub async fn reorder_lists(&mut self, final_order: Vec<ListId>) -> bool {
        if self
            .settle(ListRepository::new(&self.ctx).reorder(&final_order).await)
            .is_none()
        {
            return false;
        }
        self.dispatch(BoardMessage::ListsReordered(final_order)).await;
        true
    }

    // Categories

    pub async fn add_category(&mut self, name: &str) -> Option<CategoryId> {
        let list_id = self.active_list_id()?;
        if name.trim().is_empty() {
            return None;
        }
        let category =
            self.settle(CategoryRepository::new(&self.ctx, &list_id).create(name).await)?;
        let category_id = category.id.clone();
        self.dispatch(BoardMessage::CategoryCreated(category)).await;
        Some(category_id)
    }

    pub async fn rename_category(&mut self, category_id: &CategoryId, name: &str) -> bool {
        let Some(list_id) = self.active_list_id() else {
            return false;
        };
        let name = name.trim();
        if name.is_empty() {
            return false;
        }
        let repo = CategoryRepository::new(&self.ctx, &list_id);
        if self.settle(repo.rename(category_id, name).await).is_none() {
            return false;
        }
        self.dispatch(BoardMessage::CategoryRenamed {
            category_id: category_id.clone(),
            name: name.to_string(),
        })
        .await;
        true
    }

    /// Tasks of the category are not removed from the store.
    pub async fn delete_category(&mut self, category_id: &CategoryId) -> bool {
        let Some(list_id) = self.active_list_id() else {
            return false;
        };
        let repo = CategoryRepository::new(&self.ctx, &list_id);
        if self.settle(repo.delete(category_id).await).is_none() {
            return false;
        }
        self.dispatch(BoardMessage::CategoryDeleted(category_id.clone()))
            .await;
        true
    }

    pub async fn toggle_category(&mut self, category_id: &CategoryId) {
        self.dispatch(BoardMessage::ToggleCategory(category_id.clone()))
            .await;
    }

    pub async fn reorder_categories(&mut self, final_order: Vec<CategoryId>) -> bool {
        let Some(list_id) = self.active_list_id() else {
            return false;
        };
        let repo = CategoryRepository::new(&self.ctx, &list_id);
        if self.settle(repo.reorder(&final_order).await).is_none() {
            return false;
        }
        self.dispatch(BoardMessage::CategoriesReordered {
            list_id,
            order: final_order,
        })
        .await;
        true
    }

    /// Drag of the category at `from` to `to` in the rendered sequence.
    pub async fn move_category(&mut self, from: usize, to: usize) -> bool {
        let mut order: Vec<CategoryId> =
            self.state.categories.iter().map(|c| c.id.clone()).collect();
        if !ordering::move_item(&mut order, from, to) {
            return false;
        }
        self.reorder_categories(order).await
    }

    // Tasks

    /// `due` is the raw `YYYY-MM-DD` input; blank means no due date.
    pub async fn add_task(
        &mut self,
        category_id: &CategoryId,
        text: &str,
        due: &str,
    ) -> Option<TaskId> {
        let repo = self.tasks(category_id)?;
        if text.trim().is_empty() {
            return None;
        }
        let due_date = self.settle(dates::parse_optional_calendar_date(due).map_err(PlannerError::from))?;
        let task = self.settle(repo.create(text, due_date).await)?;
        let task_id = task.id.clone();
        self.dispatch(BoardMessage::TaskCreated {
            list_id: self.active_list_id()?,
            task,
        })
        .await;
        Some(task_id)
    }

    pub async fn edit_task(
        &mut self,
        category_id: &CategoryId,
        task_id: &TaskId,
        text: &str,
        due: &str,
    ) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }
        let Some(due_date) =
            self.settle(dates::parse_optional_calendar_date(due).map_err(PlannerError::from))
        else {
            return false;
        };
        if self.settle(repo.edit(task_id, text, due_date).await).is_none() {
            return false;
        }
        if let Some(mut task) = self.state.task(category_id, task_id).cloned() {
            task.text = text.trim().to_string();
            task.due_date = due_date;
            self.echo_updated(task).await;
        }
        true
    }

    pub async fn set_task_complete(
        &mut self,
        category_id: &CategoryId,
        task_id: &TaskId,
        complete: bool,
    ) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        match self.settle(repo.set_complete(task_id, complete).await) {
            Some(task) => {
                self.echo_updated(task).await;
                true
            }
            None => false,
        }
    }

    pub async fn delete_task(&mut self, category_id: &CategoryId, task_id: &TaskId) -> bool {
        let (Some(repo), Some(list_id)) = (self.tasks(category_id), self.active_list_id()) else {
            return false;
        };
        if self.settle(repo.delete(task_id).await).is_none() {
            return false;
        }
        self.dispatch(BoardMessage::TaskDeleted {
            list_id,
            category_id: category_id.clone(),
            task_id: task_id.clone(),
        })
        .await;
        true
    }

    pub async fn reorder_tasks(&mut self, category_id: &CategoryId, final_order: Vec<TaskId>) -> bool {
        let (Some(repo), Some(list_id)) = (self.tasks(category_id), self.active_list_id()) else {
            return false;
        };
        if self.settle(repo.reorder(&final_order).await).is_none() {
            return false;
        }
        self.dispatch(BoardMessage::TasksReordered {
            list_id,
            category_id: category_id.clone(),
            order: final_order,
        })
        .await;
        true
    }

    pub async fn move_task(&mut self, category_id: &CategoryId, from: usize, to: usize) -> bool {
        let mut order: Vec<TaskId> = self
            .state
            .tasks_of(category_id)
            .iter()
            .map(|t| t.id.clone())
            .collect();
        if !ordering::move_item(&mut order, from, to) {
            return false;
        }
        self.reorder_tasks(category_id, order).await
    }

    // Subtasks

    pub async fn add_subtask(&mut self, category_id: &CategoryId, task_id: &TaskId, text: &str) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        if text.trim().is_empty() {
            return false;
        }
        let outcome = repo.add_subtask(task_id, text).await;
        self.finish_subtask_change(outcome).await
    }

    pub async fn toggle_subtask(
        &mut self,
        category_id: &CategoryId,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        let outcome = repo.toggle_subtask(task_id, subtask_id).await;
        self.finish_subtask_change(outcome).await
    }

    pub async fn edit_subtask(
        &mut self,
        category_id: &CategoryId,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        text: &str,
    ) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        let outcome = repo.edit_subtask(task_id, subtask_id, text).await;
        self.finish_subtask_change(outcome).await
    }

    pub async fn delete_subtask(
        &mut self,
        category_id: &CategoryId,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
    ) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        let outcome = repo.delete_subtask(task_id, subtask_id).await;
        self.finish_subtask_change(outcome).await
    }

    pub async fn move_subtask(
        &mut self,
        category_id: &CategoryId,
        task_id: &TaskId,
        subtask_id: &SubtaskId,
        index: usize,
    ) -> bool {
        let Some(repo) = self.tasks(category_id) else {
            return false;
        };
        let outcome = repo.move_subtask(task_id, subtask_id, index).await;
        self.finish_subtask_change(outcome).await
    }

    async fn finish_subtask_change(&mut self, outcome: Result<Task>) -> bool {
        match self.settle(outcome) {
            Some(task) => {
                self.echo_updated(task).await;
                true
            }
            None => false,
        }
    }

    async fn echo_updated(&mut self, task: Task) {
        if let Some(list_id) = self.active_list_id() {
            self.dispatch(BoardMessage::TaskUpdated { list_id, task }).await;
        }
    }

    // Drafts

    pub async fn open_draft(&mut self, draft: BoardDraft) {
        self.dispatch(BoardMessage::OpenDraft(draft)).await;
    }

    pub async fn open_rename_list(&mut self) {
        if let Some(list) = self.state.active_list().cloned() {
            self.open_draft(BoardDraft::RenameList {
                list_id: list.id,
                name: list.name,
            })
            .await;
        }
    }

    pub async fn open_edit_task(&mut self, category_id: &CategoryId, task_id: &TaskId) {
        if let Some(task) = self.state.task(category_id, task_id).cloned() {
            self.open_draft(BoardDraft::EditTask {
                category_id: category_id.clone(),
                task_id: task.id,
                text: task.text,
                due: task.due_date.map(dates::format_calendar_date).unwrap_or_default(),
            })
            .await;
        }
    }

    /// Changes the open draft in place; nothing is written.
    pub async fn edit_draft(&mut self, change: impl FnOnce(&mut BoardDraft)) {
        if let Some(mut draft) = self.state.draft.clone() {
            change(&mut draft);
            self.dispatch(BoardMessage::DraftChanged(draft)).await;
        }
    }

    pub async fn cancel_draft(&mut self) {
        self.dispatch(BoardMessage::CloseDraft).await;
    }

    /// Commits the open draft through one repository call. The draft stays
    /// open when the save is refused or fails.
    pub async fn save_draft(&mut self) -> bool {
        let Some(draft) = self.state.draft.clone() else {
            return false;
        };
        let saved = match draft {
            BoardDraft::NewList { name } => self.create_list(&name).await.is_some(),
            BoardDraft::RenameList { list_id, name } => self.rename_list(&list_id, &name).await,
            BoardDraft::NewCategory { name } => self.add_category(&name).await.is_some(),
            BoardDraft::RenameCategory { category_id, name } => {
                self.rename_category(&category_id, &name).await
            }
            BoardDraft::NewTask {
                category_id,
                text,
                due,
            } => self.add_task(&category_id, &text, &due).await.is_some(),
            BoardDraft::EditTask {
                category_id,
                task_id,
                text,
                due,
            } => self.edit_task(&category_id, &task_id, &text, &due).await,
        };
        if saved {
            self.dispatch(BoardMessage::CloseDraft).await;
        }
        saved
    }
}

fn watch_failed(watch: BoardWatch, action: &'static str, err: StoreError) -> BoardMessage {
    let err = PlannerError::store(action)(err);
    error!(watch = ?watch, error = %err, "board watch failed");
    BoardMessage::WatchFailed {
        watch,
        alert: err.alert_text(),
    }
}

#[cfg(test)]
#[path = "tests/board_controller_tests.rs"]
mod tests;
