use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::info;

use crate::cache::GalleryCache;
use crate::config::{Config, MatchingConfig};
use crate::decode::decode_image;
use crate::error::{RecognitionError, Result};
use crate::gallery::{build_gallery, Gallery};
use crate::index::BruteForceIndex;
use crate::matcher::{match_faces, QueryResult};
use crate::references;
use crate::storage::ExtractorKey;
use crate::FaceExtractor;

/// Recognises gallery identities in query images.
///
/// The extractor is shared with whoever else needs it; the recognizer never
/// creates one itself.
pub struct Recognizer {
    extractor: Arc<dyn FaceExtractor>,
    references_dir: PathBuf,
    matching: MatchingConfig,
    cache: Option<GalleryCache>,
}

impl Recognizer {
    /// `config.detector` must describe how `extractor` produces embeddings;
    /// gallery snapshots are only reused under the same settings.
    pub fn new(extractor: Arc<dyn FaceExtractor>, config: &Config) -> Self {
        let cache = config.cache.enabled.then(|| {
            GalleryCache::new(
                config.cache.snapshot_path.clone(),
                ExtractorKey::new(&config.detector),
            )
        });
        Self {
            extractor,
            references_dir: config.gallery.references_dir.clone(),
            matching: config.matching,
            cache,
        }
    }

    pub fn references_dir(&self) -> &Path {
        &self.references_dir
    }

    /// Size of the cached gallery, if one is held.
    pub fn cached_gallery_size(&self) -> Option<usize> {
        self.cache.as_ref()?.current().map(|g| g.len())
    }

    fn build(&self, files: Vec<references::ReferenceFile>) -> Result<Gallery> {
        build_gallery(self.extractor.as_ref(), references::load(files))
    }

    /// The gallery for the current state of the reference folder.
    pub fn gallery(&self) -> Result<Arc<Gallery>> {
        let files = references::scan(&self.references_dir)?;
        match &self.cache {
            Some(cache) => {
                let fingerprint = references::fingerprint(&files);
                cache.get_or_build(fingerprint, || self.build(files))
            }
            None => Ok(Arc::new(self.build(files)?)),
        }
    }

    /// Rebuild the gallery from scratch, refreshing cache and snapshot.
    pub fn rebuild_gallery(&self) -> Result<Arc<Gallery>> {
        let files = references::scan(&self.references_dir)?;
        match &self.cache {
            Some(cache) => {
                let fingerprint = references::fingerprint(&files);
                cache.rebuild(fingerprint, || self.build(files))
            }
            None => Ok(Arc::new(self.build(files)?)),
        }
    }

    /// Decode `image_bytes`, extract its faces and match them.
    ///
    /// An unreadable image is an error, never an empty result. An image
    /// without faces returns an empty result without touching the gallery.
    pub fn recognize(&self, image_bytes: &[u8]) -> Result<QueryResult> {
        let img = decode_image(image_bytes)?;
        let faces = self
            .extractor
            .extract_faces(&img)
            .map_err(RecognitionError::Extraction)?;

        if faces.is_empty() {
            info!("No faces detected in the live image.");
            return Ok(QueryResult::empty());
        }
        info!("Detected {} face(s) in the live image.", faces.len());

        let gallery = self.gallery()?;
        let index = BruteForceIndex::new(&gallery);
        let result = match_faces(
            &faces,
            &index,
            self.matching.threshold,
            self.matching.policy,
        )?;

        info!("Recognized: {:?}", result.identities());
        Ok(result)
    }
}
