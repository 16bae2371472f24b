pub mod cache;
pub mod config;
pub mod decode;
pub mod error;
pub mod gallery;
pub mod index;
pub mod matcher;
pub mod recognizer;
pub mod references;
pub mod server;
pub mod storage;

// Re-export vision types for convenience
pub use rollcall_vision::{Detection, Embedding, FaceExtractor, FaceRecord, OnnxExtractor};

pub use error::{RecognitionError, Result};
pub use gallery::{build_gallery, Gallery, GalleryEntry, ReferenceImage};
pub use matcher::{match_faces, MatchPolicy, Presence, QueryResult};
pub use recognizer::Recognizer;
