use serde::ser::SerializeStruct;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::models::Quantization;

pub const DEFAULT_OPENAI_MODEL: &str = "text-embedding-3-small";
pub const DEFAULT_OPENAI_BATCH_SIZE: u32 = 100;
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434/api/embeddings";
pub const DEFAULT_OLLAMA_MODEL: &str = "mxbai-embed-large";
pub const DEFAULT_TENSORFLOW_MODEL: &str = "universal-sentence-encoder";
pub const DEFAULT_IMAGE_MODEL: &str = "mobilenet";
pub const DEFAULT_DIMENSIONS: u32 = 1536;

/// Output dimensionality of embedding models known to the browser.
pub fn known_model_dimensions(model: &str) -> Option<usize> {
    let model = model.split(':').next().unwrap_or(model);
    match model {
        "text-embedding-3-small" => Some(1536),
        "text-embedding-3-large" => Some(3072),
        "text-embedding-ada-002" => Some(1536),
        "mxbai-embed-large" => Some(1024),
        "nomic-embed-text" => Some(768),
        "all-minilm" => Some(384),
        "universal-sentence-encoder" => Some(512),
        "mobilenet" => Some(1024),
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenAiConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    pub model: String,
    pub batch_size: u32,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: DEFAULT_OPENAI_MODEL.to_string(),
            batch_size: DEFAULT_OPENAI_BATCH_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OllamaConfig {
    pub api_url: String,
    pub model_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_template: Option<String>,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_OLLAMA_URL.to_string(),
            model_name: DEFAULT_OLLAMA_MODEL.to_string(),
            prompt_template: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TensorFlowConfig {
    pub model: String,
}

impl Default for TensorFlowConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_TENSORFLOW_MODEL.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageConfig {
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_size: Option<u32>,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            model: DEFAULT_IMAGE_MODEL.to_string(),
            input_size: None,
        }
    }
}

/// Vectors are supplied by the caller; only their dimensionality is recorded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NoEmbeddingConfig {
    pub dimensions: u32,
}

impl Default for NoEmbeddingConfig {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
        }
    }
}

/// Embedding provider of a vector set, one variant per provider.
///
/// Stored as `{"provider": "<tag>", "<tag>": { ...provider config... }}`.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddingConfig {
    OpenAi(OpenAiConfig),
    Ollama(OllamaConfig),
    TensorFlow(TensorFlowConfig),
    Image(ImageConfig),
    None(NoEmbeddingConfig),
}

impl EmbeddingConfig {
    pub const PROVIDERS: [&'static str; 5] = ["openai", "ollama", "tensorflow", "image", "none"];

    pub fn provider(&self) -> &'static str {
        match self {
            EmbeddingConfig::OpenAi(_) => "openai",
            EmbeddingConfig::Ollama(_) => "ollama",
            EmbeddingConfig::TensorFlow(_) => "tensorflow",
            EmbeddingConfig::Image(_) => "image",
            EmbeddingConfig::None(_) => "none",
        }
    }

    /// Dimensionality of vectors this configuration produces, when it can be derived.
    pub fn expected_dimensions(&self) -> Option<usize> {
        match self {
            EmbeddingConfig::OpenAi(c) => known_model_dimensions(&c.model),
            EmbeddingConfig::Ollama(c) => known_model_dimensions(&c.model_name),
            EmbeddingConfig::TensorFlow(c) => known_model_dimensions(&c.model),
            EmbeddingConfig::Image(c) => known_model_dimensions(&c.model),
            EmbeddingConfig::None(c) => Some(c.dimensions as usize),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        EmbeddingConfig::OpenAi(OpenAiConfig::default())
    }
}

impl Serialize for EmbeddingConfig {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("EmbeddingConfig", 2)?;
        state.serialize_field("provider", self.provider())?;
        match self {
            EmbeddingConfig::OpenAi(c) => state.serialize_field("openai", c)?,
            EmbeddingConfig::Ollama(c) => state.serialize_field("ollama", c)?,
            EmbeddingConfig::TensorFlow(c) => state.serialize_field("tensorflow", c)?,
            EmbeddingConfig::Image(c) => state.serialize_field("image", c)?,
            EmbeddingConfig::None(c) => state.serialize_field("none", c)?,
        }
        state.end()
    }
}

/// Advanced build parameters, stored under `redisConfig`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreParameters {
    #[serde(rename = "reduceDimensions", skip_serializing_if = "Option::is_none")]
    pub reduce_dimensions: Option<u32>,
    #[serde(rename = "defaultCAS", skip_serializing_if = "Option::is_none")]
    pub default_cas: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quantization: Option<Quantization>,
    #[serde(rename = "buildExplorationFactor", skip_serializing_if = "Option::is_none")]
    pub build_exploration_factor: Option<u32>,
    #[serde(rename = "maxConnections", skip_serializing_if = "Option::is_none")]
    pub max_connections: Option<u32>,
}

impl StoreParameters {
    pub fn is_empty(&self) -> bool {
        self == &StoreParameters::default()
    }
}

/// Per-set configuration. Always in canonical shape; see [`super::validate_and_correct`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorSetMetadata {
    pub embedding: EmbeddingConfig,
    #[serde(rename = "redisConfig", skip_serializing_if = "Option::is_none")]
    pub store_parameters: Option<StoreParameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// RFC 3339 creation time
    pub created: String,
    /// RFC 3339 time of the last metadata write
    pub last_updated: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_vectors: Option<u64>,
    /// Top-level fields this crate does not interpret, kept as stored.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl Default for VectorSetMetadata {
    fn default() -> Self {
        let now = super::validate::now_rfc3339();
        let embedding = EmbeddingConfig::default();
        Self {
            dimensions: embedding.expected_dimensions(),
            embedding,
            store_parameters: None,
            description: None,
            created: now.clone(),
            last_updated: now,
            total_vectors: None,
            extra: serde_json::Map::new(),
        }
    }
}

impl<'de> Deserialize<'de> for VectorSetMetadata {
    /// Any JSON deserializes; malformed parts are replaced with defaults.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = serde_json::Value::deserialize(deserializer)?;
        Ok(super::validate_and_correct(&raw))
    }
}
