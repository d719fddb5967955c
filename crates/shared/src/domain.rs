use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }
    };
}

id_newtype!(UserId);
id_newtype!(ListId);
id_newtype!(CategoryId);
id_newtype!(TaskId);
id_newtype!(SubtaskId);
id_newtype!(EventId);

/// Identity handed out by the auth provider once sign-in completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub uid: UserId,
    pub display_name: Option<String>,
    pub email: Option<String>,
}

/// An entity that lives in a sibling scope ordered by an integer `order` field.
pub trait Ordered {
    fn order(&self) -> u32;
    /// Store-assigned identity, used to break ties between equal `order` values.
    fn sort_key(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskList {
    pub id: ListId,
    pub name: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub list_id: ListId,
    pub name: String,
    pub order: u32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub category_id: CategoryId,
    pub text: String,
    pub order: u32,
    pub is_complete: bool,
    pub due_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub subtasks: Vec<Subtask>,
}

/// Embedded in its parent task document; `id` is synthetic and only unique
/// within that task.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subtask {
    #[serde(default)]
    pub id: SubtaskId,
    pub text: String,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub created_at: DateTime<Utc>,
}

impl Default for SubtaskId {
    fn default() -> Self {
        Self(String::new())
    }
}

macro_rules! impl_ordered {
    ($ty:ty) => {
        impl Ordered for $ty {
            fn order(&self) -> u32 {
                self.order
            }

            fn sort_key(&self) -> &str {
                self.id.as_str()
            }
        }
    };
}

impl_ordered!(TaskList);
impl_ordered!(Category);
impl_ordered!(Task);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventColor {
    #[default]
    Teal,
    Blue,
    Purple,
    Pink,
    Orange,
    Green,
}

impl EventColor {
    pub const ALL: [EventColor; 6] = [
        EventColor::Teal,
        EventColor::Blue,
        EventColor::Purple,
        EventColor::Pink,
        EventColor::Orange,
        EventColor::Green,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventColor::Teal => "teal",
            EventColor::Blue => "blue",
            EventColor::Purple => "purple",
            EventColor::Pink => "pink",
            EventColor::Orange => "orange",
            EventColor::Green => "green",
        }
    }

    /// Unknown values fall back to teal.
    pub fn parse_lenient(raw: &str) -> Self {
        Self::ALL
            .into_iter()
            .find(|color| color.as_str().eq_ignore_ascii_case(raw.trim()))
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarEvent {
    pub id: EventId,
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub all_day: bool,
    pub color: EventColor,
    pub reminder: bool,
    pub reminder_minutes: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Per-user calendar sync preferences.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSettings {
    #[serde(default, alias = "googleSyncEnabled")]
    pub sync_enabled: bool,
    #[serde(default)]
    pub selected_calendar: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}
