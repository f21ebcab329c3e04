pub mod config;
pub mod extraction;
pub mod model;
pub mod util;

pub use config::ExtractorConfig;
pub use extraction::W2Extractor;
pub use model::{ExtractionResult, FieldValue};
