use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Unauthorized,
    NotFound,
    Validation,
    Rejected,
    Unavailable,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    #[error("invalid store path '{path}': {reason}")]
    InvalidPath { path: String, reason: &'static str },
    #[error("invalid calendar date '{0}', expected YYYY-MM-DD")]
    InvalidDate(String),
    #[error("invalid time of day '{0}', expected HH:MM")]
    InvalidTime(String),
}

impl DomainError {
    pub fn code(&self) -> ErrorCode {
        ErrorCode::Validation
    }
}
