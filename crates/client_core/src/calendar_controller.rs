use std::sync::Arc;

use chrono::NaiveDate;
use shared::domain::EventId;
use tokio::{sync::mpsc, task::JoinHandle};
use tracing::{debug, error};

use crate::{
    alerts::AlertSink,
    calendar::{CalendarMessage, CalendarState, CalendarView, EventDraft, EventModal},
    error::PlannerError,
    repositories::EventRepository,
    watchers::forward,
    ClientContext,
};

const MESSAGE_BUFFER: usize = 16;

enum Incoming {
    Changed(CalendarMessage),
    Failed(PlannerError),
}

pub struct CalendarController {
    events: EventRepository,
    alerts: Arc<dyn AlertSink>,
    state: CalendarState,
    watch: Option<JoinHandle<()>>,
    tx: mpsc::Sender<Incoming>,
    rx: mpsc::Receiver<Incoming>,
}

impl CalendarController {
    pub fn new(ctx: &ClientContext, alerts: Arc<dyn AlertSink>, today: NaiveDate) -> Self {
        let (tx, rx) = mpsc::channel(MESSAGE_BUFFER);
        Self {
            events: EventRepository::new(ctx),
            alerts,
            state: CalendarState::new(today),
            watch: None,
            tx,
            rx,
        }
    }

    /// Anchored on the local calendar day.
    pub fn for_today(ctx: &ClientContext, alerts: Arc<dyn AlertSink>) -> Self {
        Self::new(ctx, alerts, chrono::Local::now().date_naive())
    }

    pub fn state(&self) -> &CalendarState {
        &self.state
    }

    pub fn start(&mut self) {
        let task = forward(self.events.subscribe(), self.tx.clone(), |next| match next {
            Ok(events) => Incoming::Changed(CalendarMessage::EventsChanged(events)),
            Err(err) => Incoming::Failed(PlannerError::store("load events")(err)),
        });
        if let Some(previous) = self.watch.replace(task) {
            previous.abort();
        }
        debug!("started event watch");
    }

    pub async fn process_next(&mut self) -> bool {
        match self.rx.recv().await {
            Some(Incoming::Changed(message)) => {
                self.state.apply(message);
                true
            }
            Some(Incoming::Failed(err)) => {
                self.report(err);
                true
            }
            None => false,
        }
    }

    fn report(&self, err: PlannerError) {
        error!(code = ?err.code(), error = %err, "calendar command failed");
        self.alerts.alert(&err.alert_text());
    }

    pub fn set_view(&mut self, view: CalendarView) {
        self.state.apply(CalendarMessage::SetView(view));
    }

    pub fn previous(&mut self) {
        self.state.apply(CalendarMessage::Previous);
    }

    pub fn next(&mut self) {
        self.state.apply(CalendarMessage::Next);
    }

    pub fn pick_day(&mut self, date: NaiveDate) {
        self.state.apply(CalendarMessage::PickDay(date));
    }

    pub fn open_add(&mut self, date: NaiveDate) {
        self.state.apply(CalendarMessage::OpenAdd(date));
    }

    pub fn open_edit(&mut self, event_id: &EventId) {
        self.state.apply(CalendarMessage::OpenEdit(event_id.clone()));
    }

    pub fn edit_draft(&mut self, change: impl FnOnce(&mut EventDraft)) {
        if let Some(modal) = &self.state.modal {
            let mut draft = modal.draft().clone();
            change(&mut draft);
            self.state.apply(CalendarMessage::DraftChanged(draft));
        }
    }

    pub fn close_modal(&mut self) {
        self.state.apply(CalendarMessage::CloseModal);
    }

    /// Writes the open draft. A blank title or date is a silent no-op; a failed
    /// write keeps the modal open.
    pub async fn save_modal(&mut self) -> bool {
        let Some(modal) = self.state.modal.clone() else {
            return false;
        };
        let input = match modal.draft().submit() {
            Ok(Some(input)) => input,
            Ok(None) => return false,
            Err(err) => {
                self.report(err.into());
                return false;
            }
        };
        let outcome = match &modal {
            EventModal::Add(_) => self.events.create(&input).await.map(|_| ()),
            EventModal::Edit { event_id, .. } => self.events.update(event_id, &input).await,
        };
        match outcome {
            Ok(()) => {
                self.close_modal();
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    /// Deletes the event being edited.
    pub async fn delete_open_event(&mut self) -> bool {
        let Some(EventModal::Edit { event_id, .. }) = self.state.modal.clone() else {
            return false;
        };
        match self.events.delete(&event_id).await {
            Ok(()) => {
                self.close_modal();
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }
}

impl Drop for CalendarController {
    fn drop(&mut self) {
        if let Some(task) = self.watch.take() {
            task.abort();
        }
    }
}

#[cfg(test)]
#[path = "tests/calendar_controller_tests.rs"]
mod tests;
