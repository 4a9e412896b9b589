use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::StoreError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Dark,
    Light,
    System,
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "dark" => Ok(Theme::Dark),
            "light" => Ok(Theme::Light),
            "system" => Ok(Theme::System),
            other => Err(format!("unknown theme: {other}")),
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Theme::Dark => write!(f, "dark"),
            Theme::Light => write!(f, "light"),
            Theme::System => write!(f, "system"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionPreference {
    #[default]
    Full,
    Reduced,
    None,
}

/// The persisted allowlist. Anything not in here lives for the session only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedPreferences {
    pub theme: Theme,
    pub motion_preference: MotionPreference,
    pub notifications_enabled: bool,
    pub sound_enabled: bool,
}

impl Default for PersistedPreferences {
    fn default() -> Self {
        Self {
            theme: Theme::Dark,
            motion_preference: MotionPreference::Full,
            notifications_enabled: true,
            sound_enabled: true,
        }
    }
}

/// Application preferences and session flags. All mutation goes through the
/// named setters; persisted fields are written through to disk on change.
#[derive(Debug)]
pub struct PreferencesStore {
    path: Option<PathBuf>,
    persisted: PersistedPreferences,
    ws_connected: bool,
    global_error: Option<String>,
}

impl Default for PreferencesStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl PreferencesStore {
    /// Session-only store; nothing is written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            persisted: PersistedPreferences::default(),
            ws_connected: false,
            global_error: None,
        }
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let persisted = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => PersistedPreferences::default(),
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), "Loaded preferences");

        let mut store = Self::in_memory();
        store.path = Some(path);
        store.persisted = persisted;
        Ok(store)
    }

    pub fn persisted(&self) -> &PersistedPreferences {
        &self.persisted
    }

    pub fn theme(&self) -> Theme {
        self.persisted.theme
    }

    pub fn motion_preference(&self) -> MotionPreference {
        self.persisted.motion_preference
    }

    pub fn notifications_enabled(&self) -> bool {
        self.persisted.notifications_enabled
    }

    pub fn sound_enabled(&self) -> bool {
        self.persisted.sound_enabled
    }

    pub fn ws_connected(&self) -> bool {
        self.ws_connected
    }

    pub fn global_error(&self) -> Option<&str> {
        self.global_error.as_deref()
    }

    // --- Persisted setters ---

    pub fn set_theme(&mut self, theme: Theme) -> Result<(), StoreError> {
        self.persisted.theme = theme;
        self.save()
    }

    pub fn set_motion_preference(&mut self, motion: MotionPreference) -> Result<(), StoreError> {
        self.persisted.motion_preference = motion;
        self.save()
    }

    pub fn set_notifications_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.persisted.notifications_enabled = enabled;
        self.save()
    }

    pub fn set_sound_enabled(&mut self, enabled: bool) -> Result<(), StoreError> {
        self.persisted.sound_enabled = enabled;
        self.save()
    }

    // --- Session setters ---

    pub fn set_ws_connected(&mut self, connected: bool) {
        self.ws_connected = connected;
    }

    pub fn set_global_error(&mut self, error: Option<String>) {
        self.global_error = error;
    }

    fn save(&self) -> Result<(), StoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let raw = serde_json::to_string_pretty(&self.persisted)?;
        fs::write(path, raw)?;
        Ok(())
    }
}
