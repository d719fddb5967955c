//! Board view state and its reducer.
//!
//! Subscription snapshots and acknowledged local writes are both folded in by
//! [`BoardState::apply`]. A write's local echo and the snapshot that follows it
//! carry the same field values, so applying either (or both, in any order)
//! converges on the same state.

use std::collections::{HashMap, HashSet};

use shared::domain::{Category, CategoryId, ListId, Task, TaskId, TaskList};

use crate::ordering;

/// A live query the board wants running.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BoardWatch {
    Lists,
    Categories(ListId),
    Tasks(ListId, CategoryId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardEffect {
    Watch(BoardWatch),
    Unwatch(BoardWatch),
    /// The user has no lists at all.
    CreateDefaultList,
    Alert(String),
}

/// An open editor. Only an explicit save writes it through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoardDraft {
    NewList { name: String },
    RenameList { list_id: ListId, name: String },
    NewCategory { name: String },
    RenameCategory { category_id: CategoryId, name: String },
    NewTask { category_id: CategoryId, text: String, due: String },
    EditTask {
        category_id: CategoryId,
        task_id: TaskId,
        text: String,
        due: String,
    },
}

#[derive(Debug, Clone)]
pub enum BoardMessage {
    ListsChanged(Vec<TaskList>),
    CategoriesChanged {
        list_id: ListId,
        categories: Vec<Category>,
    },
    TasksChanged {
        list_id: ListId,
        category_id: CategoryId,
        tasks: Vec<Task>,
    },
    WatchFailed {
        watch: BoardWatch,
        alert: String,
    },
    SelectList(ListId),
    ToggleCategory(CategoryId),
    OpenDraft(BoardDraft),
    DraftChanged(BoardDraft),
    CloseDraft,

    ListCreated(TaskList),
    ListRenamed { list_id: ListId, name: String },
    ListDeleted(ListId),
    ListsReordered(Vec<ListId>),
    CategoryCreated(Category),
    CategoryRenamed { category_id: CategoryId, name: String },
    CategoryDeleted(CategoryId),
    CategoriesReordered {
        list_id: ListId,
        order: Vec<CategoryId>,
    },
    TaskCreated { list_id: ListId, task: Task },
    TaskUpdated { list_id: ListId, task: Task },
    TaskDeleted {
        list_id: ListId,
        category_id: CategoryId,
        task_id: TaskId,
    },
    TasksReordered {
        list_id: ListId,
        category_id: CategoryId,
        order: Vec<TaskId>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoardState {
    pub lists: Vec<TaskList>,
    pub lists_loaded: bool,
    pub active_list: Option<ListId>,
    pub categories: Vec<Category>,
    pub tasks: HashMap<CategoryId, Vec<Task>>,
    /// Categories are collapsed unless listed here.
    pub expanded: HashSet<CategoryId>,
    pub draft: Option<BoardDraft>,
    creating_default_list: bool,
}

impl BoardState {
    pub fn active_list(&self) -> Option<&TaskList> {
        let active = self.active_list.as_ref()?;
        self.lists.iter().find(|list| &list.id == active)
    }

    pub fn is_expanded(&self, category_id: &CategoryId) -> bool {
        self.expanded.contains(category_id)
    }

    pub fn tasks_of(&self, category_id: &CategoryId) -> &[Task] {
        self.tasks.get(category_id).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn task(&self, category_id: &CategoryId, task_id: &TaskId) -> Option<&Task> {
        self.tasks_of(category_id).iter().find(|task| &task.id == task_id)
    }

    fn is_active(&self, list_id: &ListId) -> bool {
        self.active_list.as_ref() == Some(list_id)
    }

    fn has_category(&self, category_id: &CategoryId) -> bool {
        self.categories.iter().any(|c| &c.id == category_id)
    }

    pub fn apply(&mut self, message: BoardMessage) -> Vec<BoardEffect> {
        let mut effects = Vec::new();
        match message {
            BoardMessage::ListsChanged(lists) => {
                self.lists = lists;
                self.lists_loaded = true;
                self.reconcile_lists(&mut effects);
            }
            BoardMessage::CategoriesChanged {
                list_id,
                categories,
            } => {
                if self.is_active(&list_id) {
                    self.replace_categories(list_id, categories, &mut effects);
                }
            }
            BoardMessage::TasksChanged {
                list_id,
                category_id,
                tasks,
            } => {
                if self.is_active(&list_id) && self.has_category(&category_id) {
                    self.tasks.insert(category_id, tasks);
                }
            }
            BoardMessage::WatchFailed { watch, alert } => {
                if watch == BoardWatch::Lists {
                    self.creating_default_list = false;
                }
                effects.push(BoardEffect::Alert(alert));
            }
            BoardMessage::SelectList(list_id) => {
                if self.lists.iter().any(|list| list.id == list_id) {
                    self.select(Some(list_id), &mut effects);
                }
            }
            BoardMessage::ToggleCategory(category_id) => {
                if !self.expanded.remove(&category_id) && self.has_category(&category_id) {
                    self.expanded.insert(category_id);
                }
            }
            BoardMessage::OpenDraft(draft) => self.draft = Some(draft),
            BoardMessage::DraftChanged(draft) => {
                if self.draft.is_some() {
                    self.draft = Some(draft);
                }
            }
            BoardMessage::CloseDraft => self.draft = None,

            BoardMessage::ListCreated(list) => {
                let list_id = list.id.clone();
                upsert(&mut self.lists, list, |l| &l.id);
                ordering::sort_siblings(&mut self.lists);
                self.creating_default_list = false;
                self.select(Some(list_id), &mut effects);
            }
            BoardMessage::ListRenamed { list_id, name } => {
                if let Some(list) = self.lists.iter_mut().find(|l| l.id == list_id) {
                    list.name = name;
                }
            }
            BoardMessage::ListDeleted(list_id) => {
                self.lists.retain(|l| l.id != list_id);
                self.reconcile_lists(&mut effects);
            }
            BoardMessage::ListsReordered(order) => {
                ordering::apply_local_order(&mut self.lists, &order, |l| &l.id, |l, o| l.order = o);
            }
            BoardMessage::CategoryCreated(category) => {
                if self.is_active(&category.list_id) {
                    let mut categories = self.categories.clone();
                    upsert(&mut categories, category.clone(), |c| &c.id);
                    ordering::sort_siblings(&mut categories);
                    self.replace_categories(category.list_id, categories, &mut effects);
                }
            }
            BoardMessage::CategoryRenamed { category_id, name } => {
                if let Some(category) = self.categories.iter_mut().find(|c| c.id == category_id) {
                    category.name = name;
                }
            }
            BoardMessage::CategoryDeleted(category_id) => {
                if let Some(list_id) = self.active_list.clone() {
                    let mut categories = self.categories.clone();
                    categories.retain(|c| c.id != category_id);
                    self.replace_categories(list_id, categories, &mut effects);
                }
            }
            BoardMessage::CategoriesReordered { list_id, order } => {
                if self.is_active(&list_id) {
                    ordering::apply_local_order(
                        &mut self.categories,
                        &order,
                        |c| &c.id,
                        |c, o| c.order = o,
                    );
                }
            }
            BoardMessage::TaskCreated { list_id, task } | BoardMessage::TaskUpdated { list_id, task } => {
                if self.is_active(&list_id) && self.has_category(&task.category_id) {
                    let tasks = self.tasks.entry(task.category_id.clone()).or_default();
                    upsert(tasks, task, |t| &t.id);
                    ordering::sort_siblings(tasks);
                }
            }
            BoardMessage::TaskDeleted {
                list_id,
                category_id,
                task_id,
            } => {
                if self.is_active(&list_id) {
                    if let Some(tasks) = self.tasks.get_mut(&category_id) {
                        tasks.retain(|t| t.id != task_id);
                    }
                }
            }
            BoardMessage::TasksReordered {
                list_id,
                category_id,
                order,
            } => {
                if self.is_active(&list_id) {
                    if let Some(tasks) = self.tasks.get_mut(&category_id) {
                        ordering::apply_local_order(tasks, &order, |t| &t.id, |t, o| t.order = o);
                    }
                }
            }
        }
        effects
    }

    /// Keeps the active list pointing at something that exists.
    fn reconcile_lists(&mut self, effects: &mut Vec<BoardEffect>) {
        if self.lists.is_empty() {
            self.select(None, effects);
            if self.lists_loaded && !self.creating_default_list {
                self.creating_default_list = true;
                effects.push(BoardEffect::CreateDefaultList);
            }
            return;
        }
        self.creating_default_list = false;
        let active_exists = self
            .active_list
            .as_ref()
            .is_some_and(|active| self.lists.iter().any(|list| &list.id == active));
        if !active_exists {
            let first = self.lists.first().map(|list| list.id.clone());
            self.select(first, effects);
        }
    }

    fn select(&mut self, list_id: Option<ListId>, effects: &mut Vec<BoardEffect>) {
        if self.active_list == list_id {
            return;
        }
        if let Some(previous) = self.active_list.take() {
            for category in &self.categories {
                effects.push(BoardEffect::Unwatch(BoardWatch::Tasks(
                    previous.clone(),
                    category.id.clone(),
                )));
            }
            effects.push(BoardEffect::Unwatch(BoardWatch::Categories(previous)));
        }
        self.categories.clear();
        self.tasks.clear();
        self.expanded.clear();
        self.draft = None;
        if let Some(list_id) = &list_id {
            effects.push(BoardEffect::Watch(BoardWatch::Categories(list_id.clone())));
        }
        self.active_list = list_id;
    }

    /// Swaps in a new category sequence and adjusts the per-category task watches.
    fn replace_categories(
        &mut self,
        list_id: ListId,
        categories: Vec<Category>,
        effects: &mut Vec<BoardEffect>,
    ) {
        let before: HashSet<CategoryId> = self.categories.iter().map(|c| c.id.clone()).collect();
        let after: HashSet<CategoryId> = categories.iter().map(|c| c.id.clone()).collect();

        for removed in before.difference(&after) {
            self.tasks.remove(removed);
            self.expanded.remove(removed);
            effects.push(BoardEffect::Unwatch(BoardWatch::Tasks(
                list_id.clone(),
                removed.clone(),
            )));
        }
        for category in &categories {
            if !before.contains(&category.id) {
                effects.push(BoardEffect::Watch(BoardWatch::Tasks(
                    list_id.clone(),
                    category.id.clone(),
                )));
            }
        }
        self.categories = categories;
    }
}

fn upsert<T, Id: PartialEq>(items: &mut Vec<T>, item: T, id_of: impl Fn(&T) -> &Id) {
    match items.iter().position(|existing| id_of(existing) == id_of(&item)) {
        Some(index) => items[index] = item,
        None => items.push(item),
    }
}

#[cfg(test)]
#[path = "tests/board_tests.rs"]
mod tests;
