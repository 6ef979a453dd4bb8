use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// One similarity or neighbor match.
///
/// Lists of tuples keep the order the store returned them in (descending similarity).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VectorTuple {
    pub element: String,
    pub score: f64,
    pub vector: Option<Vec<f32>>,
    pub attributes: Option<String>,
}

impl VectorTuple {
    pub fn new(element: impl Into<String>, score: f64) -> Self {
        Self {
            element: element.into(),
            score,
            vector: None,
            attributes: None,
        }
    }
}

/// Neighbor graph of one element, one entry per layer, highest layer first.
pub type NeighborLevels = Vec<Vec<VectorTuple>>;

/// A vector fetched for a named element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementVector {
    pub element: String,
    pub vector: Vec<f32>,
}

/// A single `VINFO` field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InfoValue {
    Number(f64),
    Text(String),
}

impl InfoValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            InfoValue::Number(n) => Some(*n),
            InfoValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            InfoValue::Text(s) => Some(s),
            InfoValue::Number(_) => None,
        }
    }
}

/// Parsed `VINFO` reply.
pub type VectorSetInfo = BTreeMap<String, InfoValue>;

/// Vector component storage mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantization {
    #[serde(rename = "Q8")]
    Q8,
    #[serde(rename = "BIN")]
    Binary,
    #[serde(rename = "NOQUANT")]
    NoQuant,
}

impl Quantization {
    /// Protocol token for this mode.
    pub fn token(&self) -> &'static str {
        match self {
            Quantization::Q8 => "Q8",
            Quantization::Binary => "BIN",
            Quantization::NoQuant => "NOQUANT",
        }
    }
}

impl fmt::Display for Quantization {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for Quantization {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "Q8" => Ok(Quantization::Q8),
            "BIN" => Ok(Quantization::Binary),
            "NOQUANT" => Ok(Quantization::NoQuant),
            other => Err(GatewayError::validation(format!(
                "unknown quantization '{}', expected Q8, BIN or NOQUANT",
                other
            ))),
        }
    }
}

/// Insert or update one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddRequest {
    pub set_key: String,
    pub element: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub reduce_dimensions: Option<u32>,
    /// JSON attributes stored with the element.
    #[serde(default)]
    pub attributes: Option<String>,
    #[serde(default)]
    pub use_cas: bool,
    #[serde(default)]
    pub quantization: Option<Quantization>,
    #[serde(default)]
    pub build_exploration_factor: Option<u32>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    /// Dimensionality the vector must have, derived by the caller from the embedding config.
    #[serde(default)]
    pub expected_dimension: Option<usize>,
}

impl AddRequest {
    pub fn new(set_key: impl Into<String>, element: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            set_key: set_key.into(),
            element: element.into(),
            vector,
            reduce_dimensions: None,
            attributes: None,
            use_cas: false,
            quantization: None,
            build_exploration_factor: None,
            max_connections: None,
            expected_dimension: None,
        }
    }

    pub fn with_reduce(mut self, dimensions: u32) -> Self {
        self.reduce_dimensions = Some(dimensions);
        self
    }

    pub fn with_attributes(mut self, attributes: impl Into<String>) -> Self {
        self.attributes = Some(attributes.into());
        self
    }

    pub fn with_cas(mut self, use_cas: bool) -> Self {
        self.use_cas = use_cas;
        self
    }

    pub fn with_quantization(mut self, quantization: Quantization) -> Self {
        self.quantization = Some(quantization);
        self
    }

    pub fn with_build_ef(mut self, ef: u32) -> Self {
        self.build_exploration_factor = Some(ef);
        self
    }

    pub fn with_max_connections(mut self, m: u32) -> Self {
        self.max_connections = Some(m);
        self
    }

    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }
}

fn default_count() -> usize {
    10
}

/// Similarity search by query vector or by reference element.
///
/// Exactly one of `search_vector` and `search_element` must be set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SimRequest {
    pub set_key: String,
    #[serde(default)]
    pub search_vector: Option<Vec<f32>>,
    #[serde(default)]
    pub search_element: Option<String>,
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub search_exploration_factor: Option<u32>,
    #[serde(default)]
    pub with_embeddings: bool,
    #[serde(default)]
    pub with_attributes: bool,
    #[serde(default)]
    pub expected_dimension: Option<usize>,
}

impl SimRequest {
    pub fn by_vector(set_key: impl Into<String>, vector: Vec<f32>, count: usize) -> Self {
        Self {
            set_key: set_key.into(),
            search_vector: Some(vector),
            search_element: None,
            count,
            filter: None,
            search_exploration_factor: None,
            with_embeddings: false,
            with_attributes: false,
            expected_dimension: None,
        }
    }

    pub fn by_element(set_key: impl Into<String>, element: impl Into<String>, count: usize) -> Self {
        Self {
            search_vector: None,
            search_element: Some(element.into()),
            ..Self::by_vector(set_key, Vec::new(), count)
        }
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }

    pub fn with_ef(mut self, ef: u32) -> Self {
        self.search_exploration_factor = Some(ef);
        self
    }

    pub fn with_embeddings(mut self) -> Self {
        self.with_embeddings = true;
        self
    }

    pub fn with_attributes(mut self) -> Self {
        self.with_attributes = true;
        self
    }

    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }
}

/// Neighbor listing for one element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinksRequest {
    pub set_key: String,
    pub element: String,
    /// Keep at most this many neighbors per level.
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub with_embeddings: bool,
}

impl LinksRequest {
    pub fn new(set_key: impl Into<String>, element: impl Into<String>) -> Self {
        Self {
            set_key: set_key.into(),
            element: element.into(),
            count: None,
            with_embeddings: false,
        }
    }

    pub fn with_count(mut self, count: usize) -> Self {
        self.count = Some(count);
        self
    }

    pub fn with_embeddings(mut self) -> Self {
        self.with_embeddings = true;
        self
    }
}

/// Create a vector set together with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRequest {
    pub set_key: String,
    /// Dimensionality of the placeholder vector; derived from the embedding config when absent.
    #[serde(default)]
    pub dimensions: Option<u32>,
    /// Raw metadata; validated and corrected before it is stored.
    #[serde(default)]
    pub metadata: Option<serde_json::Value>,
}

impl CreateRequest {
    pub fn new(set_key: impl Into<String>) -> Self {
        Self {
            set_key: set_key.into(),
            dimensions: None,
            metadata: None,
        }
    }

    pub fn with_dimensions(mut self, dimensions: u32) -> Self {
        self.dimensions = Some(dimensions);
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}
