//! Reference folder layout.
//!
//! ```text
//! students/
//!   alice.jpg        -> identity "alice"
//!   bob/             -> identity "bob", first usable photo wins
//!     front.png
//!     side.png
//! ```

use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{RecognitionError, Result};
use crate::gallery::ReferenceImage;

pub const IMAGE_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "bmp", "webp", "gif", "tif", "tiff",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceFile {
    pub identity: String,
    pub path: PathBuf,
}

/// Size and modification time of one reference file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceStamp {
    pub path: PathBuf,
    pub len: u64,
    pub modified_ms: u64,
}

/// Identifies a particular state of the reference folder. Any added,
/// removed, resized or touched file changes it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fingerprint(pub Vec<SourceStamp>);

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

fn is_hidden(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| n.starts_with('.'))
        .unwrap_or(true)
}

fn sorted_entries(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut paths = std::fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    paths.sort();
    Ok(paths)
}

fn stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
}

/// Why a folder entry does not become a reference, `None` if it does.
fn skip_reason(path: &Path) -> Option<&'static str> {
    if is_hidden(path) {
        Some("hidden")
    } else if path.is_dir() || (path.is_file() && is_image(path)) {
        None
    } else if path.is_file() {
        Some("not an image file")
    } else {
        Some("not a regular file")
    }
}

fn skip(path: &Path, reason: &str) {
    if reason == "hidden" {
        debug!("Ignoring reference entry {}: {}", path.display(), reason);
    } else {
        warn!("Ignoring reference entry {}: {}", path.display(), reason);
    }
}

/// List reference files in sorted order. Entries that cannot be references
/// are logged and left out.
pub fn scan(dir: &Path) -> Result<Vec<ReferenceFile>> {
    let entries = sorted_entries(dir).map_err(|source| RecognitionError::References {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files = Vec::new();
    for path in entries {
        if let Some(reason) = skip_reason(&path) {
            skip(&path, reason);
            continue;
        }
        if path.is_dir() {
            let Some(identity) = path.file_name().and_then(|n| n.to_str()).map(str::to_string)
            else {
                skip(&path, "folder name is not valid UTF-8");
                continue;
            };
            let inner = match sorted_entries(&path) {
                Ok(inner) => inner,
                Err(e) => {
                    warn!("Skipping reference folder {}: {}", path.display(), e);
                    continue;
                }
            };
            for p in inner {
                match skip_reason(&p) {
                    _ if p.is_dir() && !is_hidden(&p) => skip(&p, "nested folder"),
                    Some(reason) => skip(&p, reason),
                    None => files.push(ReferenceFile {
                        identity: identity.clone(),
                        path: p,
                    }),
                }
            }
        } else {
            match stem(&path) {
                Some(identity) => files.push(ReferenceFile { identity, path }),
                None => skip(&path, "file name is not valid UTF-8"),
            }
        }
    }

    Ok(files)
}

/// Size and modification time of `path`, `None` if it cannot be read.
pub fn stamp(path: &Path) -> Option<SourceStamp> {
    let meta = std::fs::metadata(path).ok()?;
    let modified_ms = meta
        .modified()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Some(SourceStamp {
        path: path.to_path_buf(),
        len: meta.len(),
        modified_ms,
    })
}

/// Stamp every file. Files that vanish between `scan` and here are left out.
pub fn fingerprint(files: &[ReferenceFile]) -> Fingerprint {
    Fingerprint(files.iter().filter_map(|f| stamp(&f.path)).collect())
}

/// Read reference files lazily. Unreadable files are skipped with a warning.
pub fn load(files: Vec<ReferenceFile>) -> impl Iterator<Item = ReferenceImage> {
    files.into_iter().filter_map(|f| match std::fs::read(&f.path) {
        Ok(bytes) => Some(ReferenceImage {
            identity: f.identity,
            bytes,
            source: f.path.display().to_string(),
        }),
        Err(e) => {
            warn!("Failed to read reference image {}: {}", f.path.display(), e);
            None
        }
    })
}
