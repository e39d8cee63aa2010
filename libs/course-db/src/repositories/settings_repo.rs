use std::sync::Arc;

use anyhow::{Context, Result};

use crate::keys;
use crate::models::settings::CourseSettings;
use crate::store::{self, KvStore};

#[derive(Clone)]
pub struct SettingsRepository {
    store: Arc<dyn KvStore>,
}

impl SettingsRepository {
    pub fn new(store: Arc<dyn KvStore>) -> Self {
        Self { store }
    }

    pub async fn course(&self) -> Result<CourseSettings> {
        store::load_or_default(self.store.as_ref(), keys::COURSE_SETTINGS)
            .await
            .context("Failed to load course settings")
    }

    pub async fn save_course(&self, settings: &CourseSettings) -> Result<()> {
        store::save(self.store.as_ref(), keys::COURSE_SETTINGS, settings)
            .await
            .context("Failed to save course settings")
    }
}
