pub mod align;
pub mod detect;
pub mod encode;
pub mod extractor;
pub mod face;
pub mod model;
pub mod preprocess;
pub mod yunet;

// Re-export commonly used types
pub use detect::DetectorOptions;
pub use extractor::{ExtractorOptions, FaceExtractor, OnnxExtractor};
pub use face::{Detection, Embedding, FaceRecord};
