use shared::{domain::SyncSettings, paths};
use storage::{to_fields, SetMode};
use tracing::info;

use crate::{
    error::{PlannerError, Result},
    ClientContext,
};

/// The single calendar settings document of a user.
#[derive(Clone)]
pub struct SettingsRepository {
    ctx: ClientContext,
}

impl SettingsRepository {
    pub fn new(ctx: &ClientContext) -> Self {
        Self { ctx: ctx.clone() }
    }

    /// Defaults when nothing has been saved yet.
    pub async fn load(&self) -> Result<SyncSettings> {
        let doc = self
            .ctx
            .store()
            .get(&paths::calendar_settings(self.ctx.uid()))
            .await
            .map_err(PlannerError::store("load settings"))?;
        let Some(doc) = doc else {
            return Ok(SyncSettings::default());
        };
        let mut settings: SyncSettings = doc.decode().map_err(PlannerError::store("load settings"))?;
        settings.updated_at = Some(doc.update_time);
        Ok(settings)
    }

    /// Replaces the whole document, dropping any legacy field names.
    pub async fn save(&self, settings: &SyncSettings) -> Result<SyncSettings> {
        let path = paths::calendar_settings(self.ctx.uid());
        let record = SyncSettings {
            updated_at: None,
            ..settings.clone()
        };
        let fields = to_fields(&record).map_err(PlannerError::store("save settings"))?;
        self.ctx
            .store()
            .set(&path, fields, SetMode::Overwrite)
            .await
            .map_err(PlannerError::store("save settings"))?;
        info!(sync_enabled = record.sync_enabled, "saved settings");
        self.load().await
    }
}
