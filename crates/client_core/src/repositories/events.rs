use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Deserializer, Serialize};
use shared::{
    dates::{calendar_date, optional_time_of_day},
    domain::{CalendarEvent, EventColor, EventId},
    paths::{self, CollectionPath},
};
use storage::{to_fields, Direction, Document, Query, StoreError};
use tracing::info;

use super::{decode_documents, LiveSequence};
use crate::{
    error::{PlannerError, Result},
    ClientContext,
};

pub const DEFAULT_REMINDER_MINUTES: u32 = 15;

fn default_reminder_minutes() -> u32 {
    DEFAULT_REMINDER_MINUTES
}

/// Missing, null and zero all read as the default lead time.
fn reminder_minutes_or_default<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let raw = Option::<u32>::deserialize(deserializer)?;
    Ok(raw.filter(|minutes| *minutes > 0).unwrap_or(DEFAULT_REMINDER_MINUTES))
}

fn lenient_color<'de, D: Deserializer<'de>>(deserializer: D) -> Result<EventColor, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.map(|raw| EventColor::parse_lenient(&raw)).unwrap_or_default())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    title: String,
    #[serde(default)]
    description: String,
    #[serde(with = "calendar_date")]
    date: NaiveDate,
    #[serde(default, with = "optional_time_of_day")]
    start_time: Option<NaiveTime>,
    #[serde(default, with = "optional_time_of_day")]
    end_time: Option<NaiveTime>,
    #[serde(default)]
    all_day: bool,
    #[serde(default, deserialize_with = "lenient_color")]
    color: EventColor,
    #[serde(default)]
    reminder: bool,
    #[serde(
        default = "default_reminder_minutes",
        deserialize_with = "reminder_minutes_or_default"
    )]
    reminder_minutes: u32,
}

/// A validated event as submitted from the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventInput {
    pub title: String,
    pub description: String,
    pub date: NaiveDate,
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub all_day: bool,
    pub color: EventColor,
    pub reminder: bool,
    pub reminder_minutes: u32,
}

impl From<&EventInput> for EventRecord {
    fn from(input: &EventInput) -> Self {
        // Times are only kept for timed events.
        let (start_time, end_time) = if input.all_day {
            (None, None)
        } else {
            (input.start_time, input.end_time)
        };
        Self {
            title: input.title.trim().to_string(),
            description: input.description.trim().to_string(),
            date: input.date,
            start_time,
            end_time,
            all_day: input.all_day,
            color: input.color,
            reminder: input.reminder,
            reminder_minutes: input.reminder_minutes,
        }
    }
}

pub(crate) fn event_from_document(doc: &Document) -> Result<CalendarEvent, StoreError> {
    let record: EventRecord = doc.decode()?;
    Ok(CalendarEvent {
        id: EventId::new(doc.id()),
        title: record.title,
        description: record.description,
        date: record.date,
        start_time: record.start_time,
        end_time: record.end_time,
        all_day: record.all_day,
        color: record.color,
        reminder: record.reminder,
        reminder_minutes: record.reminder_minutes,
        created_at: doc.create_time,
        updated_at: (doc.update_time > doc.create_time).then_some(doc.update_time),
    })
}

#[derive(Clone)]
pub struct EventRepository {
    ctx: ClientContext,
    collection: CollectionPath,
}

impl EventRepository {
    pub fn new(ctx: &ClientContext) -> Self {
        Self {
            collection: paths::events(ctx.uid()),
            ctx: ctx.clone(),
        }
    }

    fn by_date(&self) -> Query {
        Query::collection(self.collection.clone()).order_by("date", Direction::Ascending)
    }

    pub async fn all(&self) -> Result<Vec<CalendarEvent>> {
        let snapshot = self
            .ctx
            .store()
            .query(&self.by_date())
            .await
            .map_err(PlannerError::store("load events"))?;
        Ok(decode_documents(&snapshot.documents, event_from_document))
    }

    pub async fn create(&self, input: &EventInput) -> Result<CalendarEvent> {
        let fields =
            to_fields(&EventRecord::from(input)).map_err(PlannerError::store("add event"))?;
        let doc = self
            .ctx
            .store()
            .add(&self.collection, fields)
            .await
            .map_err(PlannerError::store("add event"))?;
        info!(event_id = doc.id(), date = %input.date, "created event");
        event_from_document(&doc).map_err(PlannerError::store("add event"))
    }

    pub async fn update(&self, id: &EventId, input: &EventInput) -> Result<()> {
        let fields =
            to_fields(&EventRecord::from(input)).map_err(PlannerError::store("update event"))?;
        self.ctx
            .store()
            .update(&self.collection.doc(id), fields)
            .await
            .map_err(PlannerError::store("update event"))
    }

    pub async fn delete(&self, id: &EventId) -> Result<()> {
        self.ctx
            .store()
            .delete(&self.collection.doc(id))
            .await
            .map_err(PlannerError::store("delete event"))
    }

    pub fn subscribe(&self) -> LiveSequence<CalendarEvent> {
        LiveSequence::new(
            self.ctx.store().subscribe(self.by_date()),
            event_from_document,
        )
    }
}
