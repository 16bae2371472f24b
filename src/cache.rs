//! Gallery cache keyed by the reference folder fingerprint.
//!
//! Readers clone an `Arc<Gallery>` out of a short read lock and match
//! without holding it. A rebuild produces a fresh gallery and swaps the
//! `Arc`; rebuilds are serialised so concurrent misses run the extractor once.

use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};

use crate::error::Result;
use crate::gallery::Gallery;
use crate::references::Fingerprint;
use crate::storage::{self, ExtractorKey, GallerySnapshot};

struct Cached {
    fingerprint: Fingerprint,
    gallery: Arc<Gallery>,
}

pub struct GalleryCache {
    current: RwLock<Option<Cached>>,
    rebuild: Mutex<()>,
    snapshot_path: Option<PathBuf>,
    extractor: ExtractorKey,
}

impl GalleryCache {
    /// `extractor` describes how galleries handed to this cache are built.
    /// Snapshots written under a different key are never restored.
    pub fn new(snapshot_path: Option<PathBuf>, extractor: ExtractorKey) -> Self {
        Self {
            current: RwLock::new(None),
            rebuild: Mutex::new(()),
            snapshot_path,
            extractor,
        }
    }

    /// The gallery currently held, whatever its fingerprint.
    pub fn current(&self) -> Option<Arc<Gallery>> {
        self.current.read().as_ref().map(|c| c.gallery.clone())
    }

    fn lookup(&self, fingerprint: &Fingerprint) -> Option<Arc<Gallery>> {
        self.current
            .read()
            .as_ref()
            .filter(|c| &c.fingerprint == fingerprint)
            .map(|c| c.gallery.clone())
    }

    /// Return the gallery for `fingerprint`, running `build` only if neither
    /// memory nor the on-disk snapshot has it.
    pub fn get_or_build<F>(&self, fingerprint: Fingerprint, build: F) -> Result<Arc<Gallery>>
    where
        F: FnOnce() -> Result<Gallery>,
    {
        if let Some(gallery) = self.lookup(&fingerprint) {
            debug!("gallery cache hit ({} identities)", gallery.len());
            return Ok(gallery);
        }

        let _guard = self.rebuild.lock();
        // Another caller may have rebuilt while we waited.
        if let Some(gallery) = self.lookup(&fingerprint) {
            return Ok(gallery);
        }

        if let Some(gallery) = self.restore(&fingerprint) {
            return Ok(self.store(fingerprint, gallery));
        }

        info!("reference set changed, rebuilding gallery");
        let gallery = build()?;
        self.persist(&fingerprint, &gallery);
        Ok(self.store(fingerprint, gallery))
    }

    /// Build unconditionally, ignoring memory and snapshot.
    pub fn rebuild<F>(&self, fingerprint: Fingerprint, build: F) -> Result<Arc<Gallery>>
    where
        F: FnOnce() -> Result<Gallery>,
    {
        let _guard = self.rebuild.lock();
        let gallery = build()?;
        self.persist(&fingerprint, &gallery);
        Ok(self.store(fingerprint, gallery))
    }

    fn store(&self, fingerprint: Fingerprint, gallery: Gallery) -> Arc<Gallery> {
        let gallery = Arc::new(gallery);
        *self.current.write() = Some(Cached {
            fingerprint,
            gallery: gallery.clone(),
        });
        gallery
    }

    fn restore(&self, fingerprint: &Fingerprint) -> Option<Gallery> {
        let path = self.snapshot_path.as_deref()?;
        let snapshot = match storage::load_snapshot(path) {
            Ok(Some(s)) => s,
            Ok(None) => return None,
            Err(e) => {
                warn!("ignoring unreadable gallery snapshot: {:#}", e);
                return None;
            }
        };
        if snapshot.extractor != self.extractor {
            info!(
                "gallery snapshot {} was built with other extractor settings",
                path.display()
            );
            return None;
        }
        if &snapshot.fingerprint != fingerprint {
            debug!("gallery snapshot {} is stale", path.display());
            return None;
        }
        match snapshot.to_gallery() {
            Ok(gallery) => {
                info!(
                    "restored gallery snapshot {} ({} identities)",
                    path.display(),
                    gallery.len()
                );
                Some(gallery)
            }
            Err(e) => {
                warn!("ignoring invalid gallery snapshot: {:#}", e);
                None
            }
        }
    }

    fn persist(&self, fingerprint: &Fingerprint, gallery: &Gallery) {
        let Some(path) = self.snapshot_path.as_deref() else {
            return;
        };
        let snapshot =
            GallerySnapshot::new(self.extractor.clone(), fingerprint.clone(), gallery);
        if let Err(e) = storage::save_snapshot(path, &snapshot) {
            warn!("failed to write gallery snapshot {}: {:#}", path.display(), e);
        }
    }
}
