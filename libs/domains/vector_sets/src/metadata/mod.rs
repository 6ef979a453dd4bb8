//! Per-set configuration records
//!
//! - [`model`]: the canonical record, with the embedding provider as a tagged enum
//! - [`validate`]: normalization of arbitrary stored JSON into that record
//! - [`store`]: persistence in the consolidated hash plus legacy-key migration

pub mod model;
pub mod store;
pub mod validate;

pub use model::{
    EmbeddingConfig, ImageConfig, NoEmbeddingConfig, OllamaConfig, OpenAiConfig, StoreParameters,
    TensorFlowConfig, VectorSetMetadata, known_model_dimensions,
};
pub use store::{DEFAULT_CONFIG_KEY, MetadataKeys, MetadataStore};
pub use validate::validate_and_correct;
