//! Gateway entry points
//!
//! [`VectorSetGateway`] is what callers hold. Every method validates its request before
//! touching the pool, runs the commands on the pooled transport for the URL, and wraps
//! the outcome in an [`OperationResult`] with timing and the executed command.

use std::collections::{BTreeSet, HashMap};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::batch;
use crate::commands::{self, StoreCommand};
use crate::envelope::OperationResult;
use crate::error::{GatewayError, GatewayResult};
use crate::metadata::{MetadataKeys, MetadataStore, VectorSetMetadata, validate_and_correct};
use crate::metrics::GatewayMetrics;
use crate::models::{
    AddRequest, CreateRequest, ElementVector, LinksRequest, NeighborLevels, SimRequest,
    VectorSetInfo, VectorTuple,
};
use crate::parser;
use crate::pool::ConnectionPool;
use crate::store::StoreTransport;

fn error_category(err: &GatewayError) -> &'static str {
    match err {
        GatewayError::Connection(_) => "connection",
        GatewayError::Timeout(_) => "timeout",
        GatewayError::Protocol(_) => "protocol",
        GatewayError::Store(_) => "store",
        GatewayError::Validation(_) | GatewayError::DimensionMismatch { .. } => "validation",
        GatewayError::NotFound(_) => "not_found",
        GatewayError::AlreadyExists(_) => "already_exists",
        GatewayError::Serialization(_) => "serialization",
        GatewayError::Shutdown => "shutdown",
    }
}

/// Entry point for every vector-set operation.
///
/// Each call validates its request before touching the network, acquires the pooled
/// transport for `url`, runs the command and parses the reply into the
/// [`OperationResult`] envelope.
///
/// # Example
///
/// ```ignore
/// use domain_vector_sets::{SimRequest, VectorSetGateway};
///
/// let gateway = VectorSetGateway::shared();
/// let found = gateway
///     .similarity_search("redis://127.0.0.1:6379", SimRequest::by_element("movies", "alien", 5))
///     .await;
/// ```
#[derive(Clone)]
pub struct VectorSetGateway {
    pool: Arc<ConnectionPool>,
    metadata: MetadataStore,
    metrics: GatewayMetrics,
    operation_timeout: Option<Duration>,
}

impl VectorSetGateway {
    pub fn new(pool: Arc<ConnectionPool>) -> Self {
        Self {
            pool,
            metadata: MetadataStore::default(),
            metrics: GatewayMetrics::default(),
            operation_timeout: None,
        }
    }

    /// Gateway over the process-wide pool.
    pub fn shared() -> Self {
        Self::new(ConnectionPool::shared())
    }

    pub fn with_metadata_keys(mut self, keys: MetadataKeys) -> Self {
        self.metadata = MetadataStore::new(keys);
        self
    }

    pub fn with_metrics(mut self, metrics: GatewayMetrics) -> Self {
        self.metrics = metrics;
        self
    }

    /// Bound acquire plus execution of every operation.
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = Some(timeout);
        self
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    fn rejected<T>(&self, operation: &'static str, err: GatewayError) -> OperationResult<T> {
        debug!(operation = operation, error = %err, "Rejected request");
        self.metrics.command_failed(operation, error_category(&err));
        OperationResult::failure(err.to_string())
    }

    async fn execute<T, F, Fut>(
        &self,
        operation: &'static str,
        url: &str,
        executed: String,
        work: F,
    ) -> OperationResult<T>
    where
        F: FnOnce(Arc<dyn StoreTransport>) -> Fut,
        Fut: Future<Output = GatewayResult<T>>,
    {
        let started = Instant::now();
        debug!(operation = operation, url = %url, command = %executed, "Dispatching");

        let run = async {
            let transport = self.pool.acquire(url).await?;
            work(transport).await
        };
        let result = match self.operation_timeout {
            Some(limit) => match tokio::time::timeout(limit, run).await {
                Ok(result) => result,
                Err(_) => Err(GatewayError::Timeout(format!(
                    "{} did not complete within {:?}",
                    operation, limit
                ))),
            },
            None => run.await,
        };

        let elapsed = started.elapsed();
        match &result {
            Ok(_) => self.metrics.command_succeeded(operation, elapsed),
            Err(e) => {
                warn!(operation = operation, url = %url, error = %e, "Operation failed");
                self.metrics.command_failed(operation, error_category(e));
            }
        }
        OperationResult::from_result(result, elapsed.as_millis() as u64, Some(executed))
    }

    async fn run_single<T>(
        &self,
        operation: &'static str,
        url: &str,
        command: GatewayResult<StoreCommand>,
        parse: impl FnOnce(&redis::Value) -> GatewayResult<T>,
    ) -> OperationResult<T> {
        let command = match command {
            Ok(command) => command,
            Err(e) => return self.rejected(operation, e),
        };
        let executed = command.to_string();
        self.execute(operation, url, executed, |transport| async move {
            let reply = transport.query(&command).await?;
            parse(&reply)
        })
        .await
    }

    /// Insert or update one element. `true` when the element is new.
    pub async fn add(&self, url: &str, request: AddRequest) -> OperationResult<bool> {
        let command = commands::validate_dimension(&request.vector, request.expected_dimension)
            .and_then(|_| commands::build_add(&request));
        self.run_single("add", url, command, |reply| parser::parse_flag(reply, "add"))
            .await
    }

    pub async fn remove(&self, url: &str, set_key: &str, element: &str) -> OperationResult<bool> {
        let command = commands::build_remove(set_key, element);
        self.run_single("remove", url, command, |reply| parser::parse_flag(reply, "remove"))
            .await
    }

    /// Top matches by vector or by reference element, best first.
    pub async fn similarity_search(&self, url: &str, request: SimRequest) -> OperationResult<Vec<VectorTuple>> {
        let command = match &request.search_vector {
            Some(vector) => commands::validate_dimension(vector, request.expected_dimension),
            None => Ok(()),
        }
        .and_then(|_| commands::build_sim(&request));
        let command = match command {
            Ok(command) => command,
            Err(e) => return self.rejected("sim", e),
        };

        let executed = command.to_string();
        self.execute("sim", url, executed, |transport| async move {
            let reply = transport.query(&command).await?;
            let mut tuples = parser::parse_scored_pairs(&reply, "sim")?;
            let elements: Vec<String> = tuples.iter().map(|t| t.element.clone()).collect();

            if request.with_embeddings {
                let vectors = vectors_by_element(transport.as_ref(), &request.set_key, &elements).await?;
                for tuple in &mut tuples {
                    tuple.vector = vectors.get(&tuple.element).cloned();
                }
            }
            if request.with_attributes {
                let attributes = batch::fetch_attributes(transport.as_ref(), &request.set_key, &elements).await?;
                for tuple in &mut tuples {
                    tuple.attributes = attributes.get(&tuple.element).cloned();
                }
            }
            Ok(tuples)
        })
        .await
    }

    /// Neighbor graph of an element, highest layer first.
    pub async fn neighbors(&self, url: &str, request: LinksRequest) -> OperationResult<NeighborLevels> {
        if request.count == Some(0) {
            return self.rejected("links", GatewayError::validation("count must be greater than zero"));
        }
        let command = match commands::build_links(&request.set_key, &request.element) {
            Ok(command) => command,
            Err(e) => return self.rejected("links", e),
        };

        let executed = command.to_string();
        self.execute("links", url, executed, |transport| async move {
            let reply = transport.query(&command).await?;
            let mut levels = parser::parse_levels(&reply)?.ok_or_else(|| {
                GatewayError::NotFound(format!(
                    "element '{}' in '{}'",
                    request.element, request.set_key
                ))
            })?;
            if let Some(count) = request.count {
                for level in &mut levels {
                    level.truncate(count);
                }
            }

            if request.with_embeddings {
                let unique: BTreeSet<&str> = levels.iter().flatten().map(|t| t.element.as_str()).collect();
                let elements: Vec<String> = unique.into_iter().map(str::to_string).collect();
                let vectors = vectors_by_element(transport.as_ref(), &request.set_key, &elements).await?;
                for tuple in levels.iter_mut().flatten() {
                    tuple.vector = vectors.get(&tuple.element).cloned();
                }
            }
            Ok(levels)
        })
        .await
    }

    /// Vector of one element; `None` when the element does not exist.
    ///
    /// With `expected_dimension`, a vector of another length is a dimension mismatch.
    pub async fn fetch_vector(
        &self,
        url: &str,
        set_key: &str,
        element: &str,
        expected_dimension: Option<usize>,
    ) -> OperationResult<Option<Vec<f32>>> {
        let command = commands::build_emb(set_key, element);
        self.run_single("emb", url, command, |reply| {
            let vector = parser::parse_vector(reply)?;
            if let Some(vector) = &vector {
                commands::validate_dimension(vector, expected_dimension)?;
            }
            Ok(vector)
        })
        .await
    }

    /// Vectors of many elements in one round trip; see [`batch::fetch_vectors`].
    pub async fn fetch_vectors_batch(
        &self,
        url: &str,
        set_key: &str,
        elements: &[String],
    ) -> OperationResult<Vec<ElementVector>> {
        let commands = match commands::validate_set_key(set_key).and_then(|_| batch::vector_commands(set_key, elements)) {
            Ok(commands) => commands,
            Err(e) => return self.rejected("emb_batch", e),
        };

        let executed = batch::describe(&commands);
        self.execute("emb_batch", url, executed, |transport| async move {
            batch::fetch_vectors(transport.as_ref(), set_key, elements).await
        })
        .await
    }

    pub async fn get_attributes(&self, url: &str, set_key: &str, element: &str) -> OperationResult<Option<String>> {
        let command = commands::build_get_attr(set_key, element);
        self.run_single("getattr", url, command, |reply| {
            parser::parse_optional_string(reply, "getattr")
        })
        .await
    }

    /// Replace the attributes of an element; an empty string clears them.
    pub async fn set_attributes(
        &self,
        url: &str,
        set_key: &str,
        element: &str,
        attributes: &str,
    ) -> OperationResult<bool> {
        let command = commands::build_set_attr(set_key, element, attributes);
        self.run_single("setattr", url, command, |reply| parser::parse_flag(reply, "setattr"))
            .await
    }

    pub async fn dimension(&self, url: &str, set_key: &str) -> OperationResult<u64> {
        let command = commands::build_dim(set_key);
        self.run_single("dim", url, command, |reply| parser::parse_count(reply, "dim"))
            .await
    }

    pub async fn cardinality(&self, url: &str, set_key: &str) -> OperationResult<u64> {
        let command = commands::build_card(set_key);
        self.run_single("card", url, command, |reply| parser::parse_count(reply, "card"))
            .await
    }

    /// Bytes used by the set's key.
    pub async fn memory_usage(&self, url: &str, set_key: &str) -> OperationResult<u64> {
        let command = commands::build_memory_usage(set_key);
        self.run_single("memory", url, command, |reply| parser::parse_count(reply, "memory"))
            .await
    }

    pub async fn info(&self, url: &str, set_key: &str) -> OperationResult<VectorSetInfo> {
        let command = commands::build_info(set_key);
        let missing = set_key.to_string();
        self.run_single("info", url, command, move |reply| {
            parser::parse_info(reply)?.ok_or(GatewayError::NotFound(missing))
        })
        .await
    }

    /// Create a set holding only the placeholder element, and store its metadata.
    ///
    /// The placeholder dimension comes from the request, or else from the metadata's
    /// embedding configuration.
    pub async fn create_vector_set(&self, url: &str, request: CreateRequest) -> OperationResult<VectorSetMetadata> {
        let mut metadata = validate_and_correct(request.metadata.as_ref().unwrap_or(&Value::Null));
        let prepared = match (request.dimensions, metadata.dimensions) {
            (Some(requested), Some(expected)) if requested as usize != expected => {
                Err(GatewayError::DimensionMismatch {
                    expected,
                    actual: requested as usize,
                })
            }
            (Some(requested), _) => Ok(requested),
            (None, Some(expected)) => u32::try_from(expected)
                .map_err(|_| GatewayError::validation("dimensions out of range")),
            (None, None) => Err(GatewayError::validation(
                "dimensions are required when the embedding model does not determine them",
            )),
        }
        .and_then(|dimensions| {
            let exists = commands::build_exists(&request.set_key)?;
            let create = commands::build_create(&request.set_key, dimensions, metadata.store_parameters.as_ref())?;
            Ok((dimensions, exists, create))
        });
        let (dimensions, exists, create) = match prepared {
            Ok(prepared) => prepared,
            Err(e) => return self.rejected("create", e),
        };
        metadata.dimensions = Some(dimensions as usize);

        let executed = create.to_string();
        self.execute("create", url, executed, |transport| async move {
            if parser::parse_count(&transport.query(&exists).await?, "exists")? > 0 {
                return Err(GatewayError::AlreadyExists(request.set_key.clone()));
            }
            parser::parse_flag(&transport.query(&create).await?, "create")?;
            let raw = serde_json::to_value(&metadata)?;
            self.metadata.set(transport.as_ref(), &request.set_key, &raw).await
        })
        .await
    }

    /// Delete the set's key and its metadata record. `true` when the key existed.
    pub async fn delete_vector_set(&self, url: &str, set_key: &str) -> OperationResult<bool> {
        let command = match commands::build_delete(set_key) {
            Ok(command) => command,
            Err(e) => return self.rejected("delete", e),
        };

        let executed = command.to_string();
        self.execute("delete", url, executed, |transport| async move {
            let deleted = parser::parse_flag(&transport.query(&command).await?, "delete")?;
            if let Err(e) = self.metadata.delete(transport.as_ref(), set_key).await {
                warn!(set = %set_key, error = %e, "Deleted vector set but not its metadata");
            }
            Ok(deleted)
        })
        .await
    }

    /// Names of all vector sets, sorted.
    pub async fn list_vector_sets(&self, url: &str) -> OperationResult<Vec<String>> {
        let executed = commands::build_scan("0").to_string();
        self.execute("list", url, executed, |transport| async move {
            let mut names = BTreeSet::new();
            let mut cursor = "0".to_string();
            loop {
                let reply = transport.query(&commands::build_scan(&cursor)).await?;
                let (next, keys) = parser::parse_scan(&reply)?;
                names.extend(keys);
                if next == "0" {
                    break;
                }
                cursor = next;
            }
            Ok(names.into_iter().collect())
        })
        .await
    }

    pub async fn get_metadata(&self, url: &str, set_key: &str) -> OperationResult<VectorSetMetadata> {
        if let Err(e) = commands::validate_set_key(set_key) {
            return self.rejected("metadata_get", e);
        }
        let executed = self.metadata.keys().read_command(set_key).to_string();
        self.execute("metadata_get", url, executed, |transport| async move {
            self.metadata.get(transport.as_ref(), set_key).await
        })
        .await
    }

    /// Validate and store metadata; the stored (corrected) record is returned.
    pub async fn set_metadata(&self, url: &str, set_key: &str, raw: Value) -> OperationResult<VectorSetMetadata> {
        if let Err(e) = commands::validate_set_key(set_key) {
            return self.rejected("metadata_set", e);
        }
        let keys = self.metadata.keys();
        let executed = format!("HSET {} {} <metadata>", keys.config_key, keys.field(set_key));
        self.execute("metadata_set", url, executed, |transport| async move {
            self.metadata.set(transport.as_ref(), set_key, &raw).await
        })
        .await
    }

    /// Close every pooled connection.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }
}

async fn vectors_by_element(
    transport: &dyn StoreTransport,
    set_key: &str,
    elements: &[String],
) -> GatewayResult<HashMap<String, Vec<f32>>> {
    Ok(batch::fetch_vectors(transport, set_key, elements)
        .await?
        .into_iter()
        .map(|v| (v.element, v.vector))
        .collect())
}
