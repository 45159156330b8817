//! Install metadata pushed to whatever serves the web app manifest.

use std::{
    fs,
    io::ErrorKind,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::{KeyValueStore, PreferenceKey, StoreError};

pub const MANIFEST_FILE: &str = "manifest.webmanifest";

/// Cosmetic install data. Serialized in camelCase, the shape the manifest
/// rewriter reads.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
}

impl InstallMetadata {
    /// Collects whatever the preference store knows about the install
    pub fn from_store(store: &impl KeyValueStore) -> Self {
        Self {
            name: store.get(PreferenceKey::DisplayName),
            short_name: None,
            start_url: store.get(PreferenceKey::InstallStartUrl),
            theme_color: store.get(PreferenceKey::ThemeColor),
            background_color: store.get(PreferenceKey::BackgroundColor),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestIcon {
    pub src: String,
    pub sizes: String,
    #[serde(rename = "type")]
    pub mime_type: String,
    pub purpose: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebManifest {
    pub name: String,
    pub short_name: String,
    pub start_url: String,
    pub scope: String,
    pub display: String,
    pub theme_color: String,
    pub background_color: String,
    #[serde(default)]
    pub icons: Vec<ManifestIcon>,
}

impl Default for WebManifest {
    fn default() -> Self {
        Self {
            name: "TOTP Generator".to_string(),
            short_name: "TOTP".to_string(),
            start_url: "/".to_string(),
            scope: "/".to_string(),
            display: "standalone".to_string(),
            theme_color: "#0f172a".to_string(),
            background_color: "#0b1220".to_string(),
            icons: vec![ManifestIcon {
                src: "/vite.svg".to_string(),
                sizes: "any".to_string(),
                mime_type: "image/svg+xml".to_string(),
                purpose: "any".to_string(),
            }],
        }
    }
}

impl WebManifest {
    /// Overlays the set fields of `metadata`. The short name follows the
    /// name when no short name of its own is given.
    pub fn apply(&mut self, metadata: &InstallMetadata) {
        if let Some(name) = &metadata.name {
            self.name = name.clone();
        }
        if let Some(short_name) = metadata.short_name.as_ref().or(metadata.name.as_ref()) {
            self.short_name = short_name.clone();
        }
        if let Some(start_url) = &metadata.start_url {
            self.start_url = start_url.clone();
        }
        if let Some(theme_color) = &metadata.theme_color {
            self.theme_color = theme_color.clone();
        }
        if let Some(background_color) = &metadata.background_color {
            self.background_color = background_color.clone();
        }
    }
}

/// Receives install metadata. Publishing is fire-and-forget: implementations
/// swallow their own failures.
pub trait MetadataSink {
    fn publish(&self, metadata: &InstallMetadata);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl MetadataSink for NoopSink {
    fn publish(&self, _metadata: &InstallMetadata) {}
}

/// Rewrites a manifest file on disk, starting from the current file or from
/// the default manifest when there is none.
#[derive(Debug, Clone)]
pub struct ManifestFileSink {
    path: PathBuf,
}

impl ManifestFileSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn in_dir(dir: &Path) -> Self {
        Self::new(dir.join(MANIFEST_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<WebManifest, StoreError> {
        match fs::read(&self.path) {
            Ok(raw) => serde_json::from_slice(&raw)
                .map_err(|e| StoreError::Format(self.path.clone(), e)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(WebManifest::default()),
            Err(e) => Err(StoreError::Io(self.path.clone(), e)),
        }
    }

    pub fn try_publish(&self, metadata: &InstallMetadata) -> Result<WebManifest, StoreError> {
        let mut manifest = self.load().unwrap_or_else(|e| {
            debug!(error = %e, "starting from the default manifest");
            WebManifest::default()
        });
        manifest.apply(metadata);

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StoreError::Io(parent.to_path_buf(), e))?;
        }
        let raw = serde_json::to_vec_pretty(&manifest)
            .map_err(|e| StoreError::Format(self.path.clone(), e))?;
        fs::write(&self.path, raw).map_err(|e| StoreError::Io(self.path.clone(), e))?;

        Ok(manifest)
    }
}

impl MetadataSink for ManifestFileSink {
    fn publish(&self, metadata: &InstallMetadata) {
        if let Err(e) = self.try_publish(metadata) {
            warn!(error = %e, "could not publish install metadata");
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::store::MemoryStore;

    #[test]
    fn metadata_serializes_in_camel_case() {
        let metadata = InstallMetadata {
            name: Some("Work".into()),
            start_url: Some("/?secret=X".into()),
            ..InstallMetadata::default()
        };

        assert_eq!(
            r#"{"name":"Work","startUrl":"/?secret=X"}"#,
            serde_json::to_string(&metadata).unwrap()
        );
    }

    #[test]
    fn name_also_becomes_short_name() {
        let mut manifest = WebManifest::default();
        manifest.apply(&InstallMetadata {
            name: Some("Work".into()),
            theme_color: Some("#000000".into()),
            ..InstallMetadata::default()
        });

        assert_eq!("Work", manifest.name);
        assert_eq!("Work", manifest.short_name);
        assert_eq!("#000000", manifest.theme_color);
        assert_eq!("#0b1220", manifest.background_color);
        assert_eq!("/", manifest.start_url);
    }

    #[test]
    fn explicit_short_name_wins() {
        let mut manifest = WebManifest::default();
        manifest.apply(&InstallMetadata {
            name: Some("Work account".into()),
            short_name: Some("Work".into()),
            ..InstallMetadata::default()
        });

        assert_eq!("Work", manifest.short_name);
    }

    #[test]
    fn metadata_from_store() {
        let mut store = MemoryStore::default();
        store.set(PreferenceKey::DisplayName, "Work");
        store.set(PreferenceKey::InstallStartUrl, "https://totp.example/?secret=X");

        let metadata = InstallMetadata::from_store(&store);

        assert_eq!(Some("Work".to_string()), metadata.name);
        assert_eq!(
            Some("https://totp.example/?secret=X".to_string()),
            metadata.start_url
        );
        assert_eq!(None, metadata.theme_color);
    }

    #[test]
    fn file_sink_merges_over_previous_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let sink = ManifestFileSink::in_dir(dir.path());

        sink.publish(&InstallMetadata {
            name: Some("Work".into()),
            ..InstallMetadata::default()
        });
        sink.publish(&InstallMetadata {
            start_url: Some("/?secret=X".into()),
            ..InstallMetadata::default()
        });

        let raw = fs::read(sink.path()).unwrap();
        let manifest: WebManifest = serde_json::from_slice(&raw).unwrap();
        assert_eq!("Work", manifest.name);
        assert_eq!("/?secret=X", manifest.start_url);
        assert_eq!("standalone", manifest.display);
    }

    #[test]
    fn only_the_file_sink_touches_disk() {
        let dir = tempfile::tempdir().unwrap();
        let metadata = InstallMetadata {
            name: Some("Work".into()),
            ..InstallMetadata::default()
        };
        let noop: Box<dyn MetadataSink> = Box::new(NoopSink);
        let file: Box<dyn MetadataSink> = Box::new(ManifestFileSink::in_dir(dir.path()));

        noop.publish(&metadata);
        assert_eq!(0, fs::read_dir(dir.path()).unwrap().count());

        file.publish(&metadata);
        let raw = fs::read(dir.path().join(MANIFEST_FILE)).unwrap();
        let manifest: WebManifest = serde_json::from_slice(&raw).unwrap();
        assert_eq!("Work", manifest.name);
    }

    #[test]
    fn file_sink_swallows_failures() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();
        let sink = ManifestFileSink::new(blocker.join(MANIFEST_FILE));

        assert!(sink.try_publish(&InstallMetadata::default()).is_err());
        sink.publish(&InstallMetadata::default());
    }
}
