//! Hierarchical document paths, partitioned by user.
//!
//! A collection path has an odd number of segments (`users/u1/lists`), a
//! document path an even number (`users/u1/lists/l1`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{
    domain::{CategoryId, ListId, UserId},
    error::DomainError,
};

pub const USERS: &str = "users";
pub const LISTS: &str = "lists";
pub const CATEGORIES: &str = "categories";
pub const TASKS: &str = "tasks";
pub const EVENTS: &str = "events";
pub const SETTINGS: &str = "settings";
pub const CALENDAR_SETTINGS_ID: &str = "calendar";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CollectionPath(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocPath {
    collection: CollectionPath,
    id: String,
}

fn split_segments(raw: &str) -> Result<Vec<&str>, DomainError> {
    let segments: Vec<&str> = raw.trim_matches('/').split('/').collect();
    if segments.iter().any(|segment| segment.is_empty()) {
        return Err(DomainError::InvalidPath {
            path: raw.to_string(),
            reason: "empty segment",
        });
    }
    Ok(segments)
}

impl CollectionPath {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 == 0 {
            return Err(DomainError::InvalidPath {
                path: raw.to_string(),
                reason: "collection paths have an odd number of segments",
            });
        }
        Ok(Self(segments.join("/")))
    }

    pub fn root(name: &str) -> Self {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        Self(name.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Last segment, e.g. `tasks`.
    pub fn name(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }

    pub fn doc(&self, id: impl AsRef<str>) -> DocPath {
        let id = id.as_ref();
        debug_assert!(!id.is_empty() && !id.contains('/'));
        DocPath {
            collection: self.clone(),
            id: id.to_string(),
        }
    }

    /// Like [`CollectionPath::doc`] for ids that come from outside, such as a
    /// command line.
    pub fn try_doc(&self, id: impl AsRef<str>) -> Result<DocPath, DomainError> {
        let id = id.as_ref();
        let reason = if id.trim().is_empty() {
            "empty id"
        } else if id.contains('/') {
            "ids cannot contain '/'"
        } else {
            return Ok(self.doc(id));
        };
        Err(DomainError::InvalidPath {
            path: format!("{self}/{id}"),
            reason,
        })
    }

    /// The document this collection hangs off, `None` for root collections.
    pub fn parent(&self) -> Option<DocPath> {
        let (parent, _) = self.0.rsplit_once('/')?;
        DocPath::parse(parent).ok()
    }
}

impl DocPath {
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let segments = split_segments(raw)?;
        if segments.len() % 2 != 0 {
            return Err(DomainError::InvalidPath {
                path: raw.to_string(),
                reason: "document paths have an even number of segments",
            });
        }
        let (id, collection) = segments
            .split_last()
            .ok_or_else(|| DomainError::InvalidPath {
                path: raw.to_string(),
                reason: "empty path",
            })?;
        Ok(Self {
            collection: CollectionPath(collection.join("/")),
            id: (*id).to_string(),
        })
    }

    pub fn collection(&self) -> &CollectionPath {
        &self.collection
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn child(&self, name: &str) -> CollectionPath {
        debug_assert!(!name.is_empty() && !name.contains('/'));
        CollectionPath(format!("{self}/{name}"))
    }
}

impl fmt::Display for CollectionPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Display for DocPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}

impl TryFrom<String> for CollectionPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<CollectionPath> for String {
    fn from(value: CollectionPath) -> Self {
        value.0
    }
}

impl TryFrom<String> for DocPath {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<DocPath> for String {
    fn from(value: DocPath) -> Self {
        value.to_string()
    }
}

pub fn user_doc(uid: &UserId) -> DocPath {
    CollectionPath::root(USERS).doc(uid)
}

/// Validates a user id before any path is built from it.
pub fn checked_user_doc(uid: &UserId) -> Result<DocPath, DomainError> {
    CollectionPath::root(USERS).try_doc(uid)
}

pub fn lists(uid: &UserId) -> CollectionPath {
    user_doc(uid).child(LISTS)
}

pub fn categories(uid: &UserId, list_id: &ListId) -> CollectionPath {
    lists(uid).doc(list_id).child(CATEGORIES)
}

pub fn tasks(uid: &UserId, list_id: &ListId, category_id: &CategoryId) -> CollectionPath {
    categories(uid, list_id).doc(category_id).child(TASKS)
}

pub fn events(uid: &UserId) -> CollectionPath {
    user_doc(uid).child(EVENTS)
}

pub fn calendar_settings(uid: &UserId) -> DocPath {
    user_doc(uid).child(SETTINGS).doc(CALENDAR_SETTINGS_ID)
}

/// Flat categories directly under the user; only read by the migration.
pub fn legacy_categories(uid: &UserId) -> CollectionPath {
    user_doc(uid).child(CATEGORIES)
}

pub fn legacy_tasks(uid: &UserId, category_id: &CategoryId) -> CollectionPath {
    legacy_categories(uid).doc(category_id).child(TASKS)
}
