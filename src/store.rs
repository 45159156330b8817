//! Cosmetic preferences that survive restarts.
//!
//! The keys form a closed set and none of them is meant for the secret: the
//! share link stays its only durable copy. Every operation is best-effort; a
//! failing store reads as empty and drops writes, with a warning.

use std::{
    collections::BTreeMap,
    fmt::Display,
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
    str::FromStr,
};

use tracing::warn;

pub const PREFERENCES_FILE: &str = "prefs.json";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Could not access the preference file {0}")]
    Io(PathBuf, #[source] std::io::Error),
    #[error("The preference file {0} is not valid JSON")]
    Format(PathBuf, #[source] serde_json::Error),
    #[error("Unknown preference key {0}")]
    UnknownKey(String),
    #[error("Unknown color mode {0}. Expected one of: light, dark")]
    UnknownColorMode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PreferenceKey {
    Theme,
    DisplayName,
    ThemeColor,
    BackgroundColor,
    InstallStartUrl,
}

impl PreferenceKey {
    pub const ALL: [PreferenceKey; 5] = [
        Self::Theme,
        Self::DisplayName,
        Self::ThemeColor,
        Self::BackgroundColor,
        Self::InstallStartUrl,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::DisplayName => "display_name",
            Self::ThemeColor => "theme_color",
            Self::BackgroundColor => "background_color",
            Self::InstallStartUrl => "install_start_url",
        }
    }
}

impl Display for PreferenceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreferenceKey {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");

        Self::ALL
            .into_iter()
            .find(|key| key.as_str() == normalized)
            .ok_or_else(|| StoreError::UnknownKey(s.to_string()))
    }
}

/// `get`/`set`/`delete` over preference keys, never failing outward.
pub trait KeyValueStore {
    fn get(&self, key: PreferenceKey) -> Option<String>;
    fn set(&mut self, key: PreferenceKey, value: &str);
    fn delete(&mut self, key: PreferenceKey);
}

#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    values: BTreeMap<PreferenceKey, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        self.values.get(&key).cloned()
    }

    fn set(&mut self, key: PreferenceKey, value: &str) {
        self.values.insert(key, value.to_string());
    }

    fn delete(&mut self, key: PreferenceKey) {
        self.values.remove(&key);
    }
}

/// Preferences kept as a flat JSON object in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `prefs.json` inside `dir`
    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(PREFERENCES_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<BTreeMap<String, String>, StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => return Err(StoreError::Io(self.path.clone(), e)),
        };

        serde_json::from_slice(&raw).map_err(|e| StoreError::Format(self.path.clone(), e))
    }

    fn save(&self, values: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }

        let raw =
            serde_json::to_vec_pretty(values).map_err(|e| StoreError::Format(self.path.clone(), e))?;
        fs::write(&self.path, raw).map_err(|e| StoreError::Io(self.path.clone(), e))
    }

    pub fn try_get(&self, key: PreferenceKey) -> Result<Option<String>, StoreError> {
        Ok(self.load()?.remove(key.as_str()))
    }

    pub fn try_set(&self, key: PreferenceKey, value: &str) -> Result<(), StoreError> {
        let mut values = self.load()?;
        values.insert(key.as_str().to_string(), value.to_string());
        self.save(&values)
    }

    pub fn try_delete(&self, key: PreferenceKey) -> Result<(), StoreError> {
        let mut values = self.load()?;
        if values.remove(key.as_str()).is_some() {
            self.save(&values)?;
        }
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: PreferenceKey) -> Option<String> {
        self.try_get(key).unwrap_or_else(|e| {
            warn!(error = %e, %key, "could not read preference");
            None
        })
    }

    fn set(&mut self, key: PreferenceKey, value: &str) {
        if let Err(e) = self.try_set(key, value) {
            warn!(error = %e, %key, "could not store preference");
        }
    }

    fn delete(&mut self, key: PreferenceKey) {
        if let Err(e) = self.try_delete(key) {
            warn!(error = %e, %key, "could not delete preference");
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum ColorMode {
    #[default]
    Light,
    Dark,
}

impl ColorMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }

    /// The saved mode, or light when none (or garbage) is stored
    pub fn load(store: &impl KeyValueStore) -> Self {
        store
            .get(PreferenceKey::Theme)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default()
    }

    pub fn save(self, store: &mut impl KeyValueStore) {
        store.set(PreferenceKey::Theme, &self.to_string());
    }
}

impl Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Light => write!(f, "light"),
            Self::Dark => write!(f, "dark"),
        }
    }
}

impl FromStr for ColorMode {
    type Err = StoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "light" => Ok(Self::Light),
            "dark" => Ok(Self::Dark),
            _ => Err(StoreError::UnknownColorMode(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("theme", PreferenceKey::Theme)]
    #[case("display-name", PreferenceKey::DisplayName)]
    #[case("INSTALL_START_URL", PreferenceKey::InstallStartUrl)]
    fn key_from_str(#[case] input: &str, #[case] expected: PreferenceKey) {
        assert_eq!(expected, input.parse::<PreferenceKey>().unwrap());
    }

    #[test]
    fn there_is_no_secret_key() {
        assert!("secret".parse::<PreferenceKey>().is_err());
    }

    #[test]
    fn memory_store_get_set_delete() {
        let mut store = MemoryStore::default();
        assert_eq!(None, store.get(PreferenceKey::DisplayName));

        store.set(PreferenceKey::DisplayName, "Work");
        assert_eq!(Some("Work".to_string()), store.get(PreferenceKey::DisplayName));

        store.delete(PreferenceKey::DisplayName);
        assert_eq!(None, store.get(PreferenceKey::DisplayName));
    }

    #[test]
    fn file_store_persists_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::in_dir(&dir.path().join("nested"));
        store.set(PreferenceKey::Theme, "dark");
        store.set(PreferenceKey::DisplayName, "Work");

        let reopened = JsonFileStore::in_dir(&dir.path().join("nested"));
        assert_eq!(Some("dark".to_string()), reopened.get(PreferenceKey::Theme));
        assert_eq!(Some("Work".to_string()), reopened.get(PreferenceKey::DisplayName));
        assert_eq!(None, reopened.get(PreferenceKey::ThemeColor));
    }

    #[test]
    fn file_store_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = JsonFileStore::in_dir(dir.path());
        store.set(PreferenceKey::ThemeColor, "#0f172a");
        store.delete(PreferenceKey::ThemeColor);
        store.delete(PreferenceKey::BackgroundColor);

        assert_eq!(None, store.get(PreferenceKey::ThemeColor));
    }

    #[test]
    fn missing_file_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::in_dir(dir.path());

        assert_eq!(None, store.try_get(PreferenceKey::Theme).unwrap());
    }

    #[test]
    fn corrupt_file_is_swallowed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PREFERENCES_FILE);
        fs::write(&path, "{ not json").unwrap();
        let mut store = JsonFileStore::new(&path);

        assert!(matches!(
            store.try_get(PreferenceKey::Theme),
            Err(StoreError::Format(_, _))
        ));
        assert_eq!(None, store.get(PreferenceKey::Theme));
        store.set(PreferenceKey::Theme, "dark");
    }

    #[test]
    fn color_mode_round_trip_through_store() {
        let mut store = MemoryStore::default();
        assert_eq!(ColorMode::Light, ColorMode::load(&store));

        ColorMode::load(&store).toggled().save(&mut store);
        assert_eq!(ColorMode::Dark, ColorMode::load(&store));

        store.set(PreferenceKey::Theme, "sepia");
        assert_eq!(ColorMode::Light, ColorMode::load(&store));
    }
}
