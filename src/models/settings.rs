//! Application settings
//!
//! Settings are an opaque JSON object that backups carry verbatim. Only the
//! theme mode is read, so a restore can switch the running theme at once.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key of the theme mode inside the settings object
pub const THEME_MODE_KEY: &str = "themeMode";

/// Key of the push encryption configuration inside the settings object
pub const ENCRYPTION_CONFIG_KEY: &str = "encryptionConfig";

/// UI theme preference
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ThemeMode {
    Light,
    Dark,
    #[default]
    System,
}

impl ThemeMode {
    /// Parse a theme mode from its stored name
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            "system" | "auto" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for ThemeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
            Self::System => write!(f, "system"),
        }
    }
}

/// The full settings object, round-tripped without interpretation
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AppSettings(Map<String, Value>);

impl AppSettings {
    /// Create empty settings
    pub fn new() -> Self {
        Self::default()
    }

    /// The theme mode, if present and recognized
    pub fn theme_mode(&self) -> Option<ThemeMode> {
        self.0
            .get(THEME_MODE_KEY)
            .and_then(Value::as_str)
            .and_then(ThemeMode::parse)
    }

    /// Set the theme mode
    pub fn set_theme_mode(&mut self, mode: ThemeMode) {
        self.0
            .insert(THEME_MODE_KEY.to_string(), Value::String(mode.to_string()));
    }

    /// Get a raw setting
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Set a raw setting
    pub fn insert(&mut self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.0.insert(key.into(), value)
    }

    /// Check if no settings are stored
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Get the underlying JSON object
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

impl From<Map<String, Value>> for AppSettings {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_theme_mode() {
        let settings: AppSettings = serde_json::from_value(json!({"themeMode": "dark"})).unwrap();
        assert_eq!(settings.theme_mode(), Some(ThemeMode::Dark));

        let settings: AppSettings = serde_json::from_value(json!({"themeMode": "neon"})).unwrap();
        assert_eq!(settings.theme_mode(), None);
    }

    #[test]
    fn test_unknown_fields_round_trip() {
        let raw = json!({
            "themeMode": "light",
            "encryptionConfig": {"algorithm": "AES256", "mode": "CBC", "key": "k"},
            "enableSound": true,
            "someFutureFlag": [1, 2, 3]
        });
        let settings: AppSettings = serde_json::from_value(raw.clone()).unwrap();
        assert_eq!(serde_json::to_value(&settings).unwrap(), raw);
        assert_eq!(settings.get(ENCRYPTION_CONFIG_KEY).unwrap()["mode"], "CBC");
    }

    #[test]
    fn test_set_theme_mode() {
        let mut settings = AppSettings::new();
        assert!(settings.is_empty());
        settings.set_theme_mode(ThemeMode::Light);
        assert_eq!(settings.get(THEME_MODE_KEY), Some(&json!("light")));
    }
}
