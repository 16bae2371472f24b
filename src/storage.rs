use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::config::DetectorConfig;
use crate::gallery::Gallery;
use crate::references::{self, Fingerprint, SourceStamp};
use crate::Embedding;

const SNAPSHOT_VERSION: u32 = 2;

/// How the stored embeddings were produced: extractor settings plus the
/// model files on disk. Embeddings made under another key live in a
/// different space even when their dimension agrees.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractorKey {
    pub settings: DetectorConfig,
    pub models: Vec<SourceStamp>,
}

impl ExtractorKey {
    pub fn new(settings: &DetectorConfig) -> Self {
        let models = [&settings.detector_model, &settings.recognizer_model]
            .into_iter()
            .filter_map(|path| references::stamp(path))
            .collect();
        Self {
            settings: settings.clone(),
            models,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEntry {
    pub identity: String,
    pub embedding: Vec<f32>,
}

/// A built gallery together with the reference state and extractor it was
/// built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GallerySnapshot {
    pub version: u32,
    pub extractor: ExtractorKey,
    pub fingerprint: Fingerprint,
    pub entries: Vec<StoredEntry>,
}

impl GallerySnapshot {
    pub fn new(extractor: ExtractorKey, fingerprint: Fingerprint, gallery: &Gallery) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            extractor,
            fingerprint,
            entries: gallery
                .iter()
                .map(|e| StoredEntry {
                    identity: e.identity.clone(),
                    embedding: e.embedding.to_vec(),
                })
                .collect(),
        }
    }

    pub fn to_gallery(&self) -> Result<Gallery> {
        let mut gallery = Gallery::new();
        for entry in &self.entries {
            gallery
                .insert(&entry.identity, Embedding::new(entry.embedding.clone()))
                .with_context(|| format!("restoring {}", entry.identity))?;
        }
        Ok(gallery)
    }
}

/// Load a snapshot. Missing files and snapshots from another format version
/// read as `None`.
pub fn load_snapshot(path: &Path) -> Result<Option<GallerySnapshot>> {
    if !path.exists() {
        return Ok(None);
    }

    let data = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let snapshot: GallerySnapshot = postcard::from_bytes(&data)
        .with_context(|| format!("decoding snapshot {}", path.display()))?;
    if snapshot.version != SNAPSHOT_VERSION {
        log::info!(
            "ignoring gallery snapshot {} (version {}, expected {})",
            path.display(),
            snapshot.version,
            SNAPSHOT_VERSION
        );
        return Ok(None);
    }
    Ok(Some(snapshot))
}

pub fn save_snapshot(path: &Path, snapshot: &GallerySnapshot) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let data = postcard::to_allocvec(snapshot)?;
    // Write then rename so readers never see a torn file.
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, data).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("replacing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn key() -> ExtractorKey {
        ExtractorKey::new(&DetectorConfig::default())
    }

    fn sample() -> (Fingerprint, Gallery) {
        let fp = Fingerprint(vec![SourceStamp {
            path: PathBuf::from("students/alice.png"),
            len: 42,
            modified_ms: 1_700_000_000_000,
        }]);
        let mut g = Gallery::new();
        g.insert("alice", Embedding::new(vec![0.5, -1.25, 3.0])).unwrap();
        g.insert("bob", Embedding::new(vec![2.0, 0.0, -7.5])).unwrap();
        (fp, g)
    }

    #[test]
    fn snapshot_restores_gallery() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache/gallery.bin");
        let (fp, g) = sample();

        save_snapshot(&path, &GallerySnapshot::new(key(), fp.clone(), &g)).unwrap();
        let loaded = load_snapshot(&path).unwrap().unwrap();

        assert_eq!(loaded.fingerprint, fp);
        assert_eq!(loaded.extractor, key());
        assert_eq!(loaded.to_gallery().unwrap(), g);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn missing_snapshot_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_snapshot(&dir.path().join("nope.bin")).unwrap().is_none());
    }

    #[test]
    fn other_version_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.bin");
        let (fp, g) = sample();
        let mut snapshot = GallerySnapshot::new(key(), fp, &g);
        snapshot.version = SNAPSHOT_VERSION + 1;
        save_snapshot(&path, &snapshot).unwrap();

        assert!(load_snapshot(&path).unwrap().is_none());
    }

    #[test]
    fn corrupt_snapshot_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gallery.bin");
        std::fs::write(&path, [0xff, 0xff, 0xff]).unwrap();
        assert!(load_snapshot(&path).is_err());
    }

    #[test]
    fn key_follows_settings_and_model_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = DetectorConfig {
            detector_model: dir.path().join("yunet.onnx"),
            recognizer_model: dir.path().join("sface.onnx"),
            ..DetectorConfig::default()
        };
        let absent = ExtractorKey::new(&settings);
        assert!(absent.models.is_empty());

        std::fs::write(&settings.recognizer_model, b"weights").unwrap();
        let present = ExtractorKey::new(&settings);
        assert_eq!(present.models.len(), 1);
        assert_ne!(absent, present);
        assert_eq!(present, ExtractorKey::new(&settings));

        std::fs::write(&settings.recognizer_model, b"retrained weights").unwrap();
        assert_ne!(present, ExtractorKey::new(&settings));

        let before = ExtractorKey::new(&settings);
        settings.normalize_embeddings = true;
        assert_ne!(before, ExtractorKey::new(&settings));
    }
}
