//! Display settings persistence.

use std::collections::HashMap;
use std::sync::Arc;

use crate::application::ports::{KeyValueStore, StorageError, run_blocking};
use crate::domain::settings::DisplaySettings;

/// Reads and writes [`DisplaySettings`] through the key/value store.
pub struct SettingsService {
    store: Arc<dyn KeyValueStore>,
}

impl SettingsService {
    /// Create a service over a store.
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Current settings; missing or damaged values fall back to defaults.
    #[must_use]
    pub fn load(&self) -> DisplaySettings {
        let entries: HashMap<String, String> = DisplaySettings::keys()
            .into_iter()
            .filter_map(|key| self.store.get(key).map(|value| (key.to_string(), value)))
            .collect();
        DisplaySettings::from_entries(&entries)
    }

    /// Persist every setting as one write, on the blocking pool.
    ///
    /// # Errors
    ///
    /// Returns an error if the store rejects the write.
    pub async fn save(&self, settings: &DisplaySettings) -> Result<(), StorageError> {
        let entries: Vec<(String, String)> = settings
            .to_entries()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();
        run_blocking(&self.store, move |store| store.set_many(entries)).await?;
        tracing::info!(?settings, "Display settings saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::settings::{ANIMATION_DURATION_KEY, ColorMode};
    use crate::infrastructure::storage::{FileStore, MemoryStore};

    #[test]
    fn defaults_when_store_is_empty() {
        let service = SettingsService::new(Arc::new(MemoryStore::new()));
        assert_eq!(service.load(), DisplaySettings::default());
    }

    #[tokio::test]
    async fn save_then_load() {
        let store = Arc::new(MemoryStore::new());
        let service = SettingsService::new(store.clone());
        let settings = DisplaySettings {
            color_mode: ColorMode::RedUp,
            animation_duration_ms: 250,
            ..Default::default()
        };
        service.save(&settings).await.unwrap();

        assert_eq!(service.load(), settings);
        assert_eq!(store.get(ANIMATION_DURATION_KEY).as_deref(), Some("250"));
    }

    #[tokio::test]
    async fn failed_save_keeps_previous_settings() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("store.json");
        let service = SettingsService::new(Arc::new(FileStore::open(&path).unwrap()));
        std::fs::create_dir(dir.path().join("store.json.tmp")).unwrap();

        let settings = DisplaySettings {
            color_mode: ColorMode::RedUp,
            ..Default::default()
        };
        assert!(service.save(&settings).await.is_err());
        assert_eq!(service.load(), DisplaySettings::default());
    }
}
