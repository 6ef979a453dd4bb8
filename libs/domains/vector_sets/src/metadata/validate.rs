use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use super::model::{
    EmbeddingConfig, ImageConfig, NoEmbeddingConfig, OllamaConfig, OpenAiConfig, StoreParameters,
    TensorFlowConfig, VectorSetMetadata,
};
use crate::models::Quantization;

pub(crate) fn now_rfc3339() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Top-level fields interpreted by [`validate_and_correct`]; everything else is carried over.
const KNOWN_FIELDS: [&str; 7] = [
    "embedding",
    "redisConfig",
    "description",
    "created",
    "lastUpdated",
    "dimensions",
    "totalVectors",
];

fn string(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
}

fn positive_u32(obj: &Map<String, Value>, key: &str) -> Option<u32> {
    obj.get(key)
        .and_then(Value::as_u64)
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

fn timestamp(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .filter(|s| DateTime::parse_from_rfc3339(s).is_ok())
        .map(str::to_string)
}

fn correct_embedding(raw: Option<&Value>, fallback_dimensions: Option<u32>) -> EmbeddingConfig {
    let Some(obj) = raw.and_then(Value::as_object) else {
        return EmbeddingConfig::default();
    };
    let Some(provider) = obj
        .get("provider")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
        .filter(|p| EmbeddingConfig::PROVIDERS.contains(&p.as_str()))
    else {
        return EmbeddingConfig::default();
    };
    // Older records kept provider fields next to the tag instead of nested under it
    let config = obj
        .get(provider.as_str())
        .and_then(Value::as_object)
        .unwrap_or(obj);

    match provider.as_str() {
        "ollama" => {
            let defaults = OllamaConfig::default();
            EmbeddingConfig::Ollama(OllamaConfig {
                api_url: string(config, "apiUrl").unwrap_or(defaults.api_url),
                model_name: string(config, "modelName").unwrap_or(defaults.model_name),
                prompt_template: string(config, "promptTemplate"),
            })
        }
        "tensorflow" => {
            let defaults = TensorFlowConfig::default();
            EmbeddingConfig::TensorFlow(TensorFlowConfig {
                model: string(config, "model").unwrap_or(defaults.model),
            })
        }
        "image" => {
            let defaults = ImageConfig::default();
            EmbeddingConfig::Image(ImageConfig {
                model: string(config, "model").unwrap_or(defaults.model),
                input_size: positive_u32(config, "inputSize"),
            })
        }
        "none" => EmbeddingConfig::None(NoEmbeddingConfig {
            dimensions: positive_u32(config, "dimensions")
                .or(fallback_dimensions)
                .unwrap_or(NoEmbeddingConfig::default().dimensions),
        }),
        _ => {
            let defaults = OpenAiConfig::default();
            EmbeddingConfig::OpenAi(OpenAiConfig {
                api_key: string(config, "apiKey"),
                model: string(config, "model").unwrap_or(defaults.model),
                batch_size: positive_u32(config, "batchSize").unwrap_or(defaults.batch_size),
            })
        }
    }
}

fn correct_store_parameters(raw: Option<&Value>) -> Option<StoreParameters> {
    let obj = raw.and_then(Value::as_object)?;
    let parameters = StoreParameters {
        reduce_dimensions: positive_u32(obj, "reduceDimensions"),
        default_cas: obj.get("defaultCAS").and_then(Value::as_bool),
        quantization: obj
            .get("quantization")
            .and_then(Value::as_str)
            .and_then(|q| q.parse::<Quantization>().ok()),
        build_exploration_factor: positive_u32(obj, "buildExplorationFactor"),
        max_connections: positive_u32(obj, "maxConnections"),
    };
    (!parameters.is_empty()).then_some(parameters)
}

/// Normalize arbitrary stored JSON into a canonical metadata record.
///
/// Non-objects yield the default record. Known fields are copied only when well typed;
/// anything missing or malformed gets its default. Top-level fields this crate does not
/// know are kept unchanged in [`VectorSetMetadata::extra`]. `dimensions` is recomputed
/// from the embedding configuration whenever that determines it.
pub fn validate_and_correct(raw: &Value) -> VectorSetMetadata {
    let Some(obj) = raw.as_object() else {
        return VectorSetMetadata::default();
    };

    let stored_dimensions = positive_u32(obj, "dimensions");
    let embedding = correct_embedding(obj.get("embedding"), stored_dimensions);
    let dimensions = embedding
        .expected_dimensions()
        .or(stored_dimensions.map(|d| d as usize));

    let created = timestamp(obj, "created").unwrap_or_else(now_rfc3339);
    let last_updated = timestamp(obj, "lastUpdated").unwrap_or_else(|| created.clone());

    VectorSetMetadata {
        embedding,
        store_parameters: correct_store_parameters(obj.get("redisConfig")),
        description: obj
            .get("description")
            .and_then(Value::as_str)
            .map(str::to_string),
        created,
        last_updated,
        dimensions,
        total_vectors: obj.get("totalVectors").and_then(Value::as_u64),
        extra: obj
            .iter()
            .filter(|(key, _)| !KNOWN_FIELDS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}
