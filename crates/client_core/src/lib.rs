use std::sync::Arc;

use shared::domain::{UserId, UserIdentity};
use storage::DocumentStore;

pub mod alerts;
pub mod auth;
pub mod board;
pub mod board_controller;
pub mod calendar;
pub mod calendar_controller;
pub mod config;
pub mod error;
pub mod maintenance;
pub mod ordering;
pub mod repositories;
pub mod settings_controller;
pub mod subtasks;
mod watchers;

pub use alerts::{AlertSink, LogAlertSink, RecordingAlertSink};
pub use auth::{AuthBranch, AuthGate, AuthProvider, LocalAuthProvider};
pub use board::{BoardDraft, BoardEffect, BoardMessage, BoardState, BoardWatch};
pub use board_controller::BoardController;
pub use calendar::{CalendarMessage, CalendarState, CalendarView, EventDraft, EventModal};
pub use calendar_controller::CalendarController;
pub use config::{load_config, ClientConfig};
pub use error::{PlannerError, Result};
pub use repositories::{
    CategoryRepository, EventInput, EventRepository, ListRepository, LiveSequence,
    ProfileRepository, SettingsRepository, TaskRepository,
};
pub use settings_controller::SettingsController;

/// Everything a repository or controller needs to reach one user's data.
/// Built once per sign-in and passed down explicitly.
#[derive(Clone)]
pub struct ClientContext {
    store: Arc<dyn DocumentStore>,
    user: UserIdentity,
}

impl ClientContext {
    pub fn new(store: Arc<dyn DocumentStore>, user: UserIdentity) -> Self {
        Self { store, user }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    pub fn user(&self) -> &UserIdentity {
        &self.user
    }

    pub fn uid(&self) -> &UserId {
        &self.user.uid
    }
}

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
