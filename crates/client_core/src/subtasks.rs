//! Operations on the subtask sequence embedded in a task document.
//!
//! Every operation addresses a subtask by its id, never by position, and
//! reports whether the sequence changed so callers can skip no-op writes.

use chrono::{DateTime, Utc};
use shared::domain::{Subtask, SubtaskId};
use uuid::Uuid;

use crate::ordering;

/// Gives id-less subtasks written by older clients a stable positional id.
pub fn assign_legacy_ids(subtasks: &mut [Subtask]) {
    for (index, subtask) in subtasks.iter_mut().enumerate() {
        if subtask.id.as_str().is_empty() {
            subtask.id = SubtaskId::new(format!("legacy-{index}"));
        }
    }
}

/// Appends an incomplete subtask. Blank text is ignored.
pub fn add(subtasks: &mut Vec<Subtask>, text: &str, now: DateTime<Utc>) -> Option<SubtaskId> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    let id = SubtaskId::new(Uuid::new_v4().simple().to_string());
    subtasks.push(Subtask {
        id: id.clone(),
        text: text.to_string(),
        is_complete: false,
        created_at: now,
    });
    Some(id)
}

pub fn toggle(subtasks: &mut [Subtask], id: &SubtaskId) -> bool {
    match subtasks.iter_mut().find(|s| &s.id == id) {
        Some(subtask) => {
            subtask.is_complete = !subtask.is_complete;
            true
        }
        None => false,
    }
}

/// Replaces the text; blank or unchanged text leaves the subtask alone.
pub fn edit(subtasks: &mut [Subtask], id: &SubtaskId, text: &str) -> bool {
    let text = text.trim();
    if text.is_empty() {
        return false;
    }
    match subtasks.iter_mut().find(|s| &s.id == id) {
        Some(subtask) if subtask.text != text => {
            subtask.text = text.to_string();
            true
        }
        _ => false,
    }
}

pub fn remove(subtasks: &mut Vec<Subtask>, id: &SubtaskId) -> bool {
    let before = subtasks.len();
    subtasks.retain(|s| &s.id != id);
    subtasks.len() != before
}

/// Moves the subtask to `index`, clamped to the end of the sequence.
pub fn move_to(subtasks: &mut Vec<Subtask>, id: &SubtaskId, index: usize) -> bool {
    let Some(from) = subtasks.iter().position(|s| &s.id == id) else {
        return false;
    };
    let to = index.min(subtasks.len().saturating_sub(1));
    from != to && ordering::move_item(subtasks, from, to)
}

/// Completion cascade applied when the parent task is completed.
pub fn complete_all(subtasks: &mut [Subtask]) -> bool {
    let mut changed = false;
    for subtask in subtasks.iter_mut().filter(|s| !s.is_complete) {
        subtask.is_complete = true;
        changed = true;
    }
    changed
}
