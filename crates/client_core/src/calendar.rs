//! Calendar view state: grid math, navigation and the event editor draft.

use chrono::{Datelike, Days, Months, NaiveDate, NaiveTime};
use shared::{
    dates::{self, format_calendar_date, format_time_of_day},
    domain::{CalendarEvent, EventColor, EventId},
    error::DomainError,
};

use crate::repositories::EventInput;

const DEFAULT_START: (u32, u32) = (9, 0);
const DEFAULT_END: (u32, u32) = (10, 0);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalendarView {
    #[default]
    Month,
    Week,
    Day,
}

/// Cells of a Sunday-first month grid: blank cells before the 1st, then every day.
pub fn month_grid(anchor: NaiveDate) -> Vec<Option<NaiveDate>> {
    let first = first_of_month(anchor);
    let leading = first.weekday().num_days_from_sunday() as usize;
    let mut cells = vec![None; leading];
    cells.extend(first.iter_days().take_while(|day| day.month() == first.month()).map(Some));
    cells
}

/// Sunday through Saturday of the week containing `anchor`.
pub fn week_days(anchor: NaiveDate) -> Vec<NaiveDate> {
    let sunday = week_start(anchor);
    sunday.iter_days().take(7).collect()
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = u64::from(date.weekday().num_days_from_sunday());
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

/// Month steps land on the 1st; week and day steps keep the weekday.
pub fn step(view: CalendarView, anchor: NaiveDate, forward: bool) -> NaiveDate {
    let moved = match (view, forward) {
        (CalendarView::Month, true) => first_of_month(anchor).checked_add_months(Months::new(1)),
        (CalendarView::Month, false) => first_of_month(anchor).checked_sub_months(Months::new(1)),
        (CalendarView::Week, true) => anchor.checked_add_days(Days::new(7)),
        (CalendarView::Week, false) => anchor.checked_sub_days(Days::new(7)),
        (CalendarView::Day, true) => anchor.checked_add_days(Days::new(1)),
        (CalendarView::Day, false) => anchor.checked_sub_days(Days::new(1)),
    };
    moved.unwrap_or(anchor)
}

pub fn view_title(view: CalendarView, anchor: NaiveDate) -> String {
    match view {
        CalendarView::Month => anchor.format("%B %Y").to_string(),
        CalendarView::Day => anchor.format("%B %-d, %Y").to_string(),
        CalendarView::Week => {
            let start = week_start(anchor);
            let end = start.checked_add_days(Days::new(6)).unwrap_or(start);
            format!("{} - {}", start.format("%B %-d"), end.format("%B %-d, %Y"))
        }
    }
}

pub fn events_on(events: &[CalendarEvent], date: NaiveDate) -> Vec<&CalendarEvent> {
    events.iter().filter(|event| event.date == date).collect()
}

/// Editor fields as typed. Nothing is written until the draft is saved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub all_day: bool,
    pub reminder: bool,
    pub reminder_minutes: u32,
    pub color: EventColor,
}

fn clock(hm: (u32, u32)) -> String {
    NaiveTime::from_hms_opt(hm.0, hm.1, 0)
        .map(format_time_of_day)
        .unwrap_or_default()
}

impl EventDraft {
    pub fn for_date(date: NaiveDate) -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            date: format_calendar_date(date),
            start_time: clock(DEFAULT_START),
            end_time: clock(DEFAULT_END),
            all_day: true,
            reminder: false,
            reminder_minutes: crate::repositories::DEFAULT_REMINDER_MINUTES,
            color: EventColor::default(),
        }
    }

    pub fn from_event(event: &CalendarEvent) -> Self {
        Self {
            title: event.title.clone(),
            description: event.description.clone(),
            date: format_calendar_date(event.date),
            start_time: event
                .start_time
                .map(format_time_of_day)
                .unwrap_or_else(|| clock(DEFAULT_START)),
            end_time: event
                .end_time
                .map(format_time_of_day)
                .unwrap_or_else(|| clock(DEFAULT_END)),
            all_day: event.all_day,
            reminder: event.reminder,
            reminder_minutes: event.reminder_minutes,
            color: event.color,
        }
    }

    /// `Ok(None)` when the title or date is blank: the save is a no-op.
    pub fn submit(&self) -> Result<Option<EventInput>, DomainError> {
        if self.title.trim().is_empty() {
            return Ok(None);
        }
        let Some(date) = dates::parse_optional_calendar_date(&self.date)? else {
            return Ok(None);
        };
        let (start_time, end_time) = if self.all_day {
            (None, None)
        } else {
            (
                Some(dates::parse_time_of_day(&self.start_time)?),
                Some(dates::parse_time_of_day(&self.end_time)?),
            )
        };
        Ok(Some(EventInput {
            title: self.title.trim().to_string(),
            description: self.description.trim().to_string(),
            date,
            start_time,
            end_time,
            all_day: self.all_day,
            color: self.color,
            reminder: self.reminder,
            reminder_minutes: self.reminder_minutes,
        }))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventModal {
    Add(EventDraft),
    Edit { event_id: EventId, draft: EventDraft },
}

impl EventModal {
    pub fn draft(&self) -> &EventDraft {
        match self {
            EventModal::Add(draft) | EventModal::Edit { draft, .. } => draft,
        }
    }

    fn draft_mut(&mut self) -> &mut EventDraft {
        match self {
            EventModal::Add(draft) | EventModal::Edit { draft, .. } => draft,
        }
    }
}

#[derive(Debug, Clone)]
pub enum CalendarMessage {
    EventsChanged(Vec<CalendarEvent>),
    SetView(CalendarView),
    Previous,
    Next,
    /// A day clicked in the month grid.
    PickDay(NaiveDate),
    OpenAdd(NaiveDate),
    OpenEdit(EventId),
    DraftChanged(EventDraft),
    CloseModal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalendarState {
    pub view: CalendarView,
    pub anchor: NaiveDate,
    pub events: Vec<CalendarEvent>,
    pub modal: Option<EventModal>,
}

impl CalendarState {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            view: CalendarView::default(),
            anchor: today,
            events: Vec::new(),
            modal: None,
        }
    }

    pub fn title(&self) -> String {
        view_title(self.view, self.anchor)
    }

    pub fn events_on(&self, date: NaiveDate) -> Vec<&CalendarEvent> {
        events_on(&self.events, date)
    }

    pub fn apply(&mut self, message: CalendarMessage) {
        match message {
            CalendarMessage::EventsChanged(events) => {
                self.events = events;
                // An event removed elsewhere cannot stay open for editing.
                if let Some(EventModal::Edit { event_id, .. }) = &self.modal {
                    if !self.events.iter().any(|event| &event.id == event_id) {
                        self.modal = None;
                    }
                }
            }
            CalendarMessage::SetView(view) => self.view = view,
            CalendarMessage::Previous => self.anchor = step(self.view, self.anchor, false),
            CalendarMessage::Next => self.anchor = step(self.view, self.anchor, true),
            CalendarMessage::PickDay(date) => {
                self.anchor = date;
                self.view = CalendarView::Day;
            }
            CalendarMessage::OpenAdd(date) => {
                self.modal = Some(EventModal::Add(EventDraft::for_date(date)));
            }
            CalendarMessage::OpenEdit(event_id) => {
                if let Some(event) = self.events.iter().find(|event| event.id == event_id) {
                    self.modal = Some(EventModal::Edit {
                        draft: EventDraft::from_event(event),
                        event_id,
                    });
                }
            }
            CalendarMessage::DraftChanged(draft) => {
                if let Some(modal) = &mut self.modal {
                    *modal.draft_mut() = draft;
                }
            }
            CalendarMessage::CloseModal => self.modal = None,
        }
    }
}
