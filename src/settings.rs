use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf, sync::RwLock};

use crate::engine::DEFAULT_LESSON_TOPIC;

pub const PROVIDER_API_KEY_ENV: &str = "HUME_API_KEY";
pub const COMPLETION_API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderSettings {
    /// Streaming endpoint; the API key is appended as `api_key` at connect time.
    pub socket_url: String,
    /// Directory of still images replayed as camera frames.
    pub capture_dir: Option<PathBuf>,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            socket_url: "wss://api.hume.ai/v0/stream/models".into(),
            capture_dir: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct CompletionSettings {
    pub base_url: String,
    pub model: String,
    /// When set, content comes from the web app's `/api/*` routes instead of
    /// calling the model directly.
    pub proxy_base_url: Option<String>,
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".into(),
            model: "gpt-4".into(),
            proxy_base_url: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EngagementSettings {
    pub provider: ProviderSettings,
    pub completion: CompletionSettings,
    pub lesson_topic: String,
    pub telemetry_enabled: bool,
    pub require_fresh_frame: bool,
}

impl Default for EngagementSettings {
    fn default() -> Self {
        Self {
            provider: ProviderSettings::default(),
            completion: CompletionSettings::default(),
            lesson_topic: DEFAULT_LESSON_TOPIC.into(),
            telemetry_enabled: true,
            require_fresh_frame: false,
        }
    }
}

/// JSON-backed settings file. Unreadable or missing files fall back to
/// defaults; secrets are never written here.
pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<EngagementSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_default()
        } else {
            EngagementSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn get(&self) -> EngagementSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: EngagementSettings) -> Result<()> {
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &EngagementSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}

pub fn provider_api_key() -> Option<String> {
    std::env::var(PROVIDER_API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

pub fn completion_api_key() -> Option<String> {
    std::env::var(COMPLETION_API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let store = SettingsStore::new(dir.path().join("settings.json")).unwrap();
        assert_eq!(store.get(), EngagementSettings::default());
    }

    #[test]
    fn update_persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");
        let store = SettingsStore::new(path.clone()).unwrap();

        let mut settings = store.get();
        settings.lesson_topic = "Positional Encoding".into();
        settings.completion.proxy_base_url = Some("http://localhost:3000".into());
        store.update(settings.clone()).unwrap();

        let reloaded = SettingsStore::new(path).unwrap();
        assert_eq!(reloaded.get(), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{"lessonTopic": "Tokenization"}"#).unwrap();

        let settings = SettingsStore::new(path).unwrap().get();
        assert_eq!(settings.lesson_topic, "Tokenization");
        assert!(settings.telemetry_enabled);
        assert_eq!(settings.completion.model, "gpt-4");
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(SettingsStore::new(path).unwrap().get(), EngagementSettings::default());
    }
}
