use std::sync::Arc;

use shared::domain::SyncSettings;
use tracing::error;

use crate::{
    alerts::AlertSink, error::PlannerError, repositories::SettingsRepository, ClientContext,
};

/// Calendar sync preferences. Calendar sync itself is not performed here.
pub struct SettingsController {
    repo: SettingsRepository,
    alerts: Arc<dyn AlertSink>,
    settings: SyncSettings,
    loaded: bool,
}

impl SettingsController {
    pub fn new(ctx: &ClientContext, alerts: Arc<dyn AlertSink>) -> Self {
        Self {
            repo: SettingsRepository::new(ctx),
            alerts,
            settings: SyncSettings::default(),
            loaded: false,
        }
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    pub async fn load(&mut self) -> bool {
        match self.repo.load().await {
            Ok(settings) => {
                self.settings = settings;
                self.loaded = true;
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    pub async fn toggle_sync(&mut self) -> bool {
        let next = SyncSettings {
            sync_enabled: !self.settings.sync_enabled,
            ..self.settings.clone()
        };
        self.save(next).await
    }

    pub async fn select_calendar(&mut self, calendar: &str) -> bool {
        let next = SyncSettings {
            selected_calendar: calendar.trim().to_string(),
            ..self.settings.clone()
        };
        self.save(next).await
    }

    async fn save(&mut self, next: SyncSettings) -> bool {
        match self.repo.save(&next).await {
            Ok(saved) => {
                self.settings = saved;
                true
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    fn report(&self, err: PlannerError) {
        error!(code = ?err.code(), error = %err, "settings command failed");
        self.alerts.alert(&err.alert_text());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{alerts::RecordingAlertSink, test_support::*};

    #[tokio::test]
    async fn toggling_sync_persists_and_stamps_the_document() {
        let (_, ctx) = memory_context("u1").await;
        let alerts = Arc::new(RecordingAlertSink::default());
        let mut settings = SettingsController::new(&ctx, alerts.clone());

        assert!(settings.load().await);
        assert!(!settings.settings().sync_enabled);
        assert!(settings.settings().updated_at.is_none());

        assert!(settings.toggle_sync().await);
        assert!(settings.select_calendar("  work  ").await);
        assert!(settings.settings().sync_enabled);
        assert!(settings.settings().updated_at.is_some());

        let reloaded = SettingsRepository::new(&ctx).load().await.expect("load");
        assert_eq!(reloaded.selected_calendar, "work");
        assert!(alerts.messages().is_empty());
    }

    #[tokio::test]
    async fn failed_save_keeps_the_previous_settings() {
        let store = FlakyStore::new(memory_storage().await);
        let ctx = ClientContext::new(store.clone(), identity("u1"));
        let alerts = Arc::new(RecordingAlertSink::default());
        let mut settings = SettingsController::new(&ctx, alerts.clone());
        assert!(settings.load().await);

        store.fail_writes(true);
        assert!(!settings.toggle_sync().await);
        assert!(!settings.settings().sync_enabled);
        assert_eq!(alerts.messages(), vec!["Failed to save settings".to_string()]);
    }
}
