use serde::{Deserialize, Serialize};

use crate::error::{RecognitionError, Result};
use crate::index::NeighborIndex;
use crate::{Embedding, FaceRecord};

/// How query faces are turned into accepted identities.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchPolicy {
    /// Every gallery identity closer than the threshold to any query face is
    /// accepted. One face may accept several identities.
    #[default]
    AllWithinThreshold,
    /// Each query face accepts at most its single nearest identity, and only
    /// when that distance is under the threshold.
    NearestWithinThreshold,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Present,
    Absent,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recognized {
    pub identity: String,
    /// Smallest distance seen to this identity over all query faces.
    pub distance: f32,
}

/// Identities recognised in one query image, each at most once, in order of
/// first acceptance (query faces in extractor order, then gallery order).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    recognized: Vec<Recognized>,
    faces: usize,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn presence(&self) -> Presence {
        if self.recognized.is_empty() {
            Presence::Absent
        } else {
            Presence::Present
        }
    }

    pub fn is_empty(&self) -> bool {
        self.recognized.is_empty()
    }

    pub fn recognized(&self) -> &[Recognized] {
        &self.recognized
    }

    pub fn identities(&self) -> Vec<&str> {
        self.recognized.iter().map(|r| r.identity.as_str()).collect()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.recognized.iter().any(|r| r.identity == identity)
    }

    /// Number of faces found in the query image.
    pub fn face_count(&self) -> usize {
        self.faces
    }

    fn accept(&mut self, identity: &str, distance: f32) {
        match self.recognized.iter_mut().find(|r| r.identity == identity) {
            Some(existing) => existing.distance = existing.distance.min(distance),
            None => self.recognized.push(Recognized {
                identity: identity.to_string(),
                distance,
            }),
        }
    }
}

/// Euclidean (L2) distance between two embeddings of equal dimension.
pub fn euclidean_distance(a: &Embedding, b: &Embedding) -> Result<f32> {
    if a.dim() != b.dim() {
        return Err(RecognitionError::DimensionMismatch {
            expected: a.dim(),
            actual: b.dim(),
        });
    }
    let sum: f32 = a
        .vector
        .iter()
        .zip(b.vector.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

/// Match every query face against the gallery behind `index`.
pub fn match_faces(
    queries: &[FaceRecord],
    index: &dyn NeighborIndex,
    threshold: f32,
    policy: MatchPolicy,
) -> Result<QueryResult> {
    let mut result = QueryResult {
        recognized: Vec::new(),
        faces: queries.len(),
    };

    for (face_idx, face) in queries.iter().enumerate() {
        let accepted = match policy {
            MatchPolicy::AllWithinThreshold => index.within(&face.embedding, threshold)?,
            MatchPolicy::NearestWithinThreshold => index
                .nearest(&face.embedding)?
                .filter(|n| n.distance < threshold)
                .into_iter()
                .collect(),
        };

        for neighbor in accepted {
            log::debug!(
                "face {}: {} at distance {:.3} (threshold {:.3})",
                face_idx,
                neighbor.identity,
                neighbor.distance,
                threshold
            );
            result.accept(neighbor.identity, neighbor.distance);
        }
    }

    Ok(result)
}
