pub mod preferences;

pub use preferences::{MotionPreference, PersistedPreferences, PreferencesStore, Theme};
