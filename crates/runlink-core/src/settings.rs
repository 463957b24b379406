//! Run settings: an opaque option bag handed to runs by reference.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, RunlinkError};

/// Environment variable holding the API key.
pub const ENV_API_KEY: &str = "RUNLINK_API_KEY";
/// `offline` or `online`.
pub const ENV_MODE: &str = "RUNLINK_MODE";
/// Boolean override of the mode.
pub const ENV_OFFLINE: &str = "RUNLINK_OFFLINE";

/// Typed form accepted by [`Settings::from_options`].
#[derive(Debug, Clone, Default)]
pub struct SettingsOptions {
    pub offline: bool,
    pub api_key: Option<String>,
}

/// Immutable once built.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    offline: bool,
    api_key: String,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_options(options: SettingsOptions) -> Self {
        Self {
            offline: options.offline,
            api_key: options.api_key.unwrap_or_default(),
        }
    }

    /// Build from string pairs. Recognised keys: `offline` (bool), `mode`
    /// (`offline` / `online`) and `api_key`. Other keys are ignored.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self> {
        let mut settings = Self::default();
        // Sorted so that `mode` and `offline` resolve the same way every time.
        let mut entries: Vec<_> = map.iter().collect();
        entries.sort();
        for (key, value) in entries {
            settings.apply(key, value)?;
        }
        Ok(settings)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&content)?)
    }

    /// Overlay `RUNLINK_*` environment variables on `self`.
    pub fn with_env(self) -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        self.with_vars(&vars)
    }

    pub fn from_env() -> Result<Self> {
        Self::default().with_env()
    }

    fn with_vars(mut self, vars: &HashMap<String, String>) -> Result<Self> {
        if let Some(mode) = vars.get(ENV_MODE) {
            self.apply("mode", mode)?;
        }
        if let Some(offline) = vars.get(ENV_OFFLINE) {
            self.apply("offline", offline)?;
        }
        if let Some(key) = vars.get(ENV_API_KEY) {
            self.apply("api_key", key)?;
        }
        Ok(self)
    }

    fn apply(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || RunlinkError::InvalidSetting {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "offline" => self.offline = parse_bool(value).ok_or_else(invalid)?,
            "mode" => {
                self.offline = match value.trim().to_ascii_lowercase().as_str() {
                    "offline" => true,
                    "online" | "run" => false,
                    _ => return Err(invalid()),
                }
            }
            "api_key" => self.api_key = value.to_string(),
            other => debug!(key = other, "ignoring unknown setting"),
        }
        Ok(())
    }

    pub fn offline(&self) -> bool {
        self.offline
    }

    pub fn api_key(&self) -> Option<&str> {
        (!self.api_key.is_empty()).then_some(self.api_key.as_str())
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("offline", &self.offline)
            .field("api_key", &self.api_key().map(|_| "<redacted>"))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_settings() {
        let s = Settings::new();
        assert!(!s.offline());
        assert_eq!(s.api_key(), None);
    }

    #[test]
    fn test_from_map() {
        let s = Settings::from_map(&map(&[("offline", "true"), ("api_key", "abc"), ("color", "red")])).unwrap();
        assert!(s.offline());
        assert_eq!(s.api_key(), Some("abc"));

        let s = Settings::from_map(&map(&[("mode", "offline")])).unwrap();
        assert!(s.offline());
    }

    #[test]
    fn test_from_map_rejects_bad_bool() {
        let err = Settings::from_map(&map(&[("offline", "maybe")])).unwrap_err();
        assert!(matches!(err, RunlinkError::InvalidSetting { ref key, .. } if key == "offline"));
    }

    #[test]
    fn test_from_options() {
        let s = Settings::from_options(SettingsOptions {
            offline: true,
            api_key: Some("k".into()),
        });
        assert!(s.offline());
        assert_eq!(s.api_key(), Some("k"));
    }

    #[test]
    fn test_env_overlay() {
        let base = Settings::from_options(SettingsOptions {
            offline: false,
            api_key: Some("file-key".into()),
        });
        let s = base
            .with_vars(&map(&[(ENV_MODE, "offline"), (ENV_API_KEY, "env-key")]))
            .unwrap();
        assert!(s.offline());
        assert_eq!(s.api_key(), Some("env-key"));
    }

    #[test]
    fn test_from_yaml_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("settings.yaml");
        std::fs::write(&path, "offline: true\napi_key: secret\n").unwrap();
        let s = Settings::from_yaml_file(&path).unwrap();
        assert!(s.offline());
        assert_eq!(s.api_key(), Some("secret"));
    }

    #[test]
    fn test_debug_redacts_key() {
        let s = Settings::from_options(SettingsOptions {
            offline: false,
            api_key: Some("super-secret".into()),
        });
        let shown = format!("{s:?}");
        assert!(!shown.contains("super-secret"));
        assert!(shown.contains("redacted"));
    }
}
