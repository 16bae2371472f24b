use std::path::PathBuf;

use thiserror::Error;

/// Failures of the recognition core.
///
/// A query image with no faces is not an error; it produces an empty
/// [`QueryResult`](crate::matcher::QueryResult).
#[derive(Debug, Error)]
pub enum RecognitionError {
    /// Image bytes could not be decoded.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// Two embeddings of different length were compared. This means the
    /// gallery and the query come from different models.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The face extractor failed on a decodable image.
    #[error("face extraction failed: {0:#}")]
    Extraction(anyhow::Error),

    /// The reference folder could not be listed.
    #[error("reading references at {}: {source}", path.display())]
    References {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T, E = RecognitionError> = std::result::Result<T, E>;
