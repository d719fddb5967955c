use serde_json::json;
use shared::paths;
use storage::{Fields, SetMode};

use crate::{
    error::{PlannerError, Result},
    ClientContext,
};

const TITLE_FIELD: &str = "title";

/// Fields kept on the user document itself, currently the board title.
#[derive(Clone)]
pub struct ProfileRepository {
    ctx: ClientContext,
    default_title: String,
}

impl ProfileRepository {
    pub fn new(ctx: &ClientContext, default_title: impl Into<String>) -> Self {
        Self {
            ctx: ctx.clone(),
            default_title: default_title.into(),
        }
    }

    pub async fn title(&self) -> Result<String> {
        let doc = self
            .ctx
            .store()
            .get(&paths::user_doc(self.ctx.uid()))
            .await
            .map_err(PlannerError::store("load title"))?;
        let title = doc
            .as_ref()
            .and_then(|doc| doc.fields.get(TITLE_FIELD))
            .and_then(|value| value.as_str())
            .map(str::trim)
            .filter(|title| !title.is_empty());
        Ok(title.map_or_else(|| self.default_title.clone(), str::to_string))
    }

    pub async fn set_title(&self, title: &str) -> Result<()> {
        let mut fields = Fields::new();
        fields.insert(TITLE_FIELD.into(), json!(title.trim()));
        self.ctx
            .store()
            .set(&paths::user_doc(self.ctx.uid()), fields, SetMode::Merge)
            .await
            .map_err(PlannerError::store("save title"))
    }
}
