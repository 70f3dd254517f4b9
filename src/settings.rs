use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::model::game_state::INITIAL_HEALTH;

pub const DEFAULT_BASE_URL: &str = "http://localhost:1234";
pub const DEFAULT_MODEL: &str = "local-model";

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct LlmSettings {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub api_key: Option<String>,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.into(),
            model: DEFAULT_MODEL.into(),
            temperature: 0.7,
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub llm: LlmSettings,

    /// How many past messages are replayed to the narrator each turn.
    pub history_limit: usize,

    pub initial_health: u32,

    pub ui_scale: f32,

    // Speaker → color mapping
    pub speaker_colors: HashMap<String, [u8; 4]>,
}

impl Default for Settings {
    fn default() -> Self {
        let mut speaker_colors = HashMap::new();

        speaker_colors.insert("User".into(), [40, 70, 120, 255]);
        speaker_colors.insert("Narrator".into(), [40, 90, 60, 255]);
        speaker_colors.insert("System".into(), [80, 80, 80, 255]);
        speaker_colors.insert("Error".into(), [130, 40, 40, 255]);

        Self {
            llm: LlmSettings::default(),
            history_limit: 20,
            initial_health: INITIAL_HEALTH,
            ui_scale: 1.0,
            speaker_colors,
        }
    }
}

impl Settings {
    /// Applies `LLM_BASE_URL`, `LLM_MODEL` and `LLM_API_KEY` on top of the file.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, var: impl Fn(&str) -> Option<String>) {
        if let Some(url) = var("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Some(model) = var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(key) = var("LLM_API_KEY").filter(|k| !k.is_empty()) {
            self.llm.api_key = Some(key);
        }
    }
}

pub fn settings_path() -> PathBuf {
    let mut path = dirs::config_dir().unwrap_or_else(|| PathBuf::from("."));
    path.push("story_sync");
    path.push("settings.json");
    path
}

/// Loads settings, falling back to defaults when the file is missing or
/// unreadable, then applies environment overrides.
pub fn load_settings() -> Settings {
    let mut settings = load_settings_from(&settings_path());
    settings.apply_env();
    settings
}

pub fn load_settings_from(path: &Path) -> Settings {
    let Ok(json) = fs::read_to_string(path) else {
        return Settings::default();
    };

    serde_json::from_str(&json).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Ignoring malformed settings file");
        Settings::default()
    })
}

pub fn save_settings(settings: &Settings) -> anyhow::Result<()> {
    save_settings_to(settings, &settings_path())
}

pub fn save_settings_to(settings: &Settings, path: &Path) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("creating settings directory {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(settings)?;
    fs::write(path, json).with_context(|| format!("writing settings to {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_from(&dir.path().join("nope.json"));
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut settings = Settings::default();
        settings.llm.model = "mistral".into();
        settings.history_limit = 4;
        save_settings_to(&settings, &path).unwrap();

        assert_eq!(load_settings_from(&path), settings);
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, r#"{ "llm": { "model": "qwen" }, "initial_health": 50 }"#).unwrap();

        let settings = load_settings_from(&path);
        assert_eq!(settings.llm.model, "qwen");
        assert_eq!(settings.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.initial_health, 50);
        assert_eq!(settings.history_limit, 20);
    }

    #[test]
    fn malformed_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.json");
        fs::write(&path, "{ not json").unwrap();
        assert_eq!(load_settings_from(&path), Settings::default());
    }

    #[test]
    fn overrides_replace_llm_fields() {
        let mut settings = Settings::default();
        settings.apply_overrides(|key| match key {
            "LLM_MODEL" => Some("phi".into()),
            "LLM_API_KEY" => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.llm.model, "phi");
        assert_eq!(settings.llm.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.llm.api_key, None);
    }
}
