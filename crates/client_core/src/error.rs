use shared::error::{DomainError, ErrorCode};
use storage::StoreError;
use thiserror::Error;

pub type Result<T, E = PlannerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("failed to {action}: {source}")]
    Store {
        action: &'static str,
        #[source]
        source: StoreError,
    },
    #[error("cannot delete your only list")]
    LastList,
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: String },
    #[error("not signed in")]
    SignedOut,
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl PlannerError {
    /// Adapter for `map_err` that records which operation hit the store.
    pub fn store(action: &'static str) -> impl FnOnce(StoreError) -> Self {
        move |source| PlannerError::Store { action, source }
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        PlannerError::NotFound {
            kind,
            id: id.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            PlannerError::Store { source, .. } => source.code(),
            PlannerError::LastList => ErrorCode::Rejected,
            PlannerError::NotFound { .. } => ErrorCode::NotFound,
            PlannerError::SignedOut => ErrorCode::Unauthorized,
            PlannerError::Domain(err) => err.code(),
        }
    }

    /// Text shown to the user in the blocking alert.
    pub fn alert_text(&self) -> String {
        match self {
            PlannerError::Store { action, .. } => format!("Failed to {action}"),
            PlannerError::LastList => "Cannot delete your only list!".to_string(),
            PlannerError::NotFound { kind, .. } => format!("That {kind} no longer exists"),
            PlannerError::SignedOut => "Please sign in to continue".to_string(),
            PlannerError::Domain(err) => err.to_string(),
        }
    }
}
