use log::{info, warn};

use crate::decode::decode_image;
use crate::error::{RecognitionError, Result};
use crate::{Embedding, FaceExtractor};

#[derive(Debug, Clone, PartialEq)]
pub struct GalleryEntry {
    pub identity: String,
    pub embedding: Embedding,
}

/// Known identities, one representative embedding each, in insertion order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Gallery {
    entries: Vec<GalleryEntry>,
}

impl Gallery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an identity. Returns `Ok(false)` and keeps the existing entry if
    /// the identity is already present.
    pub fn insert(&mut self, identity: &str, embedding: Embedding) -> Result<bool> {
        if self.contains(identity) {
            return Ok(false);
        }
        if let Some(expected) = self.dimension() {
            if embedding.dim() != expected {
                return Err(RecognitionError::DimensionMismatch {
                    expected,
                    actual: embedding.dim(),
                });
            }
        }
        self.entries.push(GalleryEntry {
            identity: identity.to_string(),
            embedding,
        });
        Ok(true)
    }

    pub fn get(&self, identity: &str) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.identity == identity)
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.get(identity).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GalleryEntry> {
        self.entries.iter()
    }

    pub fn identities(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.identity.as_str()).collect()
    }

    /// Embedding dimension shared by all entries, `None` when empty.
    pub fn dimension(&self) -> Option<usize> {
        self.entries.first().map(|e| e.embedding.dim())
    }
}

/// One reference photo for an identity.
#[derive(Debug, Clone)]
pub struct ReferenceImage {
    pub identity: String,
    pub bytes: Vec<u8>,
    /// Where the bytes came from, for log messages.
    pub source: String,
}

/// Build a gallery from reference images.
///
/// Undecodable images, images without faces and extractor failures skip that
/// one reference with a warning. The first usable reference of an identity
/// wins. Only a dimension mismatch between references aborts the build.
pub fn build_gallery<I>(extractor: &dyn FaceExtractor, references: I) -> Result<Gallery>
where
    I: IntoIterator<Item = ReferenceImage>,
{
    let mut gallery = Gallery::new();

    for reference in references {
        if gallery.contains(&reference.identity) {
            log::debug!(
                "{}: identity {} already enrolled, ignoring",
                reference.source,
                reference.identity
            );
            continue;
        }

        let img = match decode_image(&reference.bytes) {
            Ok(img) => img,
            Err(e) => {
                warn!("Failed to read reference image {}: {}", reference.source, e);
                continue;
            }
        };

        let faces = match extractor.extract_faces(&img) {
            Ok(faces) => faces,
            Err(e) => {
                warn!("Face extraction failed for {}: {:#}", reference.source, e);
                continue;
            }
        };

        let Some(first) = faces.into_iter().next() else {
            warn!("No faces detected in reference image: {}", reference.source);
            continue;
        };

        gallery.insert(&reference.identity, first.embedding)?;
    }

    info!("Gallery built with {} identities", gallery.len());
    Ok(gallery)
}
