//! Nearest-neighbour search over a gallery.
//!
//! The matcher only talks to [`NeighborIndex`], so an approximate index can
//! replace the brute-force scan without changing matching semantics.

use rayon::prelude::*;

use crate::error::Result;
use crate::gallery::Gallery;
use crate::matcher::euclidean_distance;
use crate::Embedding;

#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor<'a> {
    pub identity: &'a str,
    pub distance: f32,
}

pub trait NeighborIndex: Send + Sync {
    /// Every entry strictly closer than `radius`, in gallery order.
    fn within<'a>(&'a self, query: &Embedding, radius: f32) -> Result<Vec<Neighbor<'a>>>;

    /// The closest entry. Ties go to the earlier gallery entry.
    fn nearest<'a>(&'a self, query: &Embedding) -> Result<Option<Neighbor<'a>>>;
}

/// Exhaustive O(G·D) scan, parallel over gallery entries.
pub struct BruteForceIndex<'g> {
    gallery: &'g Gallery,
}

impl<'g> BruteForceIndex<'g> {
    pub fn new(gallery: &'g Gallery) -> Self {
        Self { gallery }
    }

    fn distances(&self, query: &Embedding) -> Result<Vec<f32>> {
        self.gallery
            .entries()
            .par_iter()
            .map(|entry| euclidean_distance(&entry.embedding, query))
            .collect()
    }
}

impl NeighborIndex for BruteForceIndex<'_> {
    fn within<'a>(&'a self, query: &Embedding, radius: f32) -> Result<Vec<Neighbor<'a>>> {
        let distances = self.distances(query)?;
        Ok(self
            .gallery
            .iter()
            .zip(distances)
            .filter(|(_, d)| *d < radius)
            .map(|(entry, distance)| Neighbor {
                identity: &entry.identity,
                distance,
            })
            .collect())
    }

    fn nearest<'a>(&'a self, query: &Embedding) -> Result<Option<Neighbor<'a>>> {
        let distances = self.distances(query)?;
        Ok(self
            .gallery
            .iter()
            .zip(distances)
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(entry, distance)| Neighbor {
                identity: &entry.identity,
                distance,
            }))
    }
}
