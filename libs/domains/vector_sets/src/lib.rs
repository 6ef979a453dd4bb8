//! Vector-Set Gateway
//!
//! Pooled access to Redis vector sets: structured requests go in, typed results come
//! back wrapped in a uniform [`OperationResult`] envelope.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ VectorSetGateway │  ← validate, time, wrap in OperationResult
//! └───┬──────────┬───┘
//!     │          │
//! ┌───▼──────┐ ┌─▼─────────────┐   ┌───────────────┐
//! │ commands │ │ MetadataStore │   │    parser     │
//! │ (pure)   │ │ (hash+legacy) │   │ (lenient)     │
//! └───┬──────┘ └─┬─────────────┘   └───────▲───────┘
//!     │          │                         │
//! ┌───▼──────────▼───┐   ┌──────────┐      │
//! │  ConnectionPool  │──►│  batch   │──────┘
//! │ (one per URL)    │   │(pipeline)│
//! └───────┬──────────┘   └──────────┘
//!         │
//! ┌───────▼──────────┐
//! │  StoreTransport  │  ← RedisTransport (multiplexed connection)
//! │     (trait)      │
//! └──────────────────┘
//! ```
//!
//! # Leniency
//!
//! Whole replies of the wrong shape fail the call. Inside an otherwise valid reply,
//! malformed score pairs and neighbor levels are skipped, non-numeric vector components
//! become `0.0`, and batch elements whose reply is malformed or an error are omitted. Each such case
//! is logged with `warn!` and counted in `vset_gateway_lenient_skips_total`.
//!
//! # Usage
//!
//! ```ignore
//! use domain_vector_sets::{AddRequest, SimRequest, VectorSetGateway};
//!
//! let gateway = VectorSetGateway::shared();
//! let url = "redis://127.0.0.1:6379";
//!
//! gateway.add(url, AddRequest::new("movies", "alien", vec![0.1, 0.2])).await;
//! let found = gateway.similarity_search(url, SimRequest::by_element("movies", "alien", 5)).await;
//! println!("{}", serde_json::to_string(&found)?);
//!
//! gateway.shutdown().await;
//! ```

pub mod batch;
pub mod commands;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod metadata;
pub mod metrics;
pub mod models;
pub mod parser;
pub mod pool;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use commands::{PLACEHOLDER_ELEMENT, StoreCommand};
pub use envelope::OperationResult;
pub use error::{GatewayError, GatewayResult};
pub use gateway::VectorSetGateway;
pub use metadata::{
    EmbeddingConfig, MetadataKeys, MetadataStore, StoreParameters, VectorSetMetadata,
    validate_and_correct,
};
pub use crate::metrics::GatewayMetrics;
pub use models::{
    AddRequest, CreateRequest, ElementVector, InfoValue, LinksRequest, NeighborLevels,
    Quantization, SimRequest, VectorSetInfo, VectorTuple,
};
pub use pool::ConnectionPool;
pub use store::{RedisConnector, RedisTransport, StoreConnector, StoreTransport};
