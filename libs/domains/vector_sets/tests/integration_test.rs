//! Integration tests for the vector-set gateway
//!
//! These tests run against a real Redis 8 via testcontainers to ensure:
//! - Commands are accepted by the server as built
//! - Replies parse into the expected shapes
//! - Metadata migration works on a live hash
//! - Pooled connections survive across calls

use std::sync::Arc;

use database::redis::PoolConfig;
use domain_vector_sets::*;
use serde_json::json;
use test_utils::{TestDataBuilder, TestVectorStore, assertions::*};

fn gateway() -> VectorSetGateway {
    VectorSetGateway::new(Arc::new(ConnectionPool::redis(PoolConfig::default())))
}

// ============================================================================
// Element Operations
// ============================================================================

#[tokio::test]
#[ignore = "requires docker"]
async fn test_add_and_fetch_vector() {
    let store = TestVectorStore::new().await;
    let gateway = gateway();
    let builder = TestDataBuilder::from_test_name("add_and_fetch");
    let set = builder.set_name("movies");
    let vector = vec![0.5, -0.25, 1.0];

    let added = gateway
        .add(
            store.url(),
            AddRequest::new(&set, "alien", vector.clone())
                .with_attributes(r#"{"year":1979}"#)
                .with_quantization(Quantization::NoQuant),
        )
        .await;
    assert_eq!(added.result(), Some(&true));

    let fetched = gateway.fetch_vector(store.url(), &set, "alien", Some(3)).await;
    let fetched = assert_some(fetched.into_result().unwrap(), "vector should exist");
    assert_vector_close(&fetched, &vector, 1e-4, "fetched vector");

    let attributes = gateway.get_attributes(store.url(), &set, "alien").await;
    assert_eq!(attributes.into_result().unwrap().as_deref(), Some(r#"{"year":1979}"#));

    let missing = gateway.fetch_vector(store.url(), &set, "nope", None).await;
    assert_eq!(missing.into_result().unwrap(), None);

    gateway.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_similarity_search_ranks_closest_first() {
    let store = TestVectorStore::new().await;
    let gateway = gateway();
    let set = TestDataBuilder::from_test_name("similarity").set_name("points");
    store
        .seed_set(
            &set,
            &[
                ("east", vec![1.0, 0.0]),
                ("north", vec![0.0, 1.0]),
                ("north-east", vec![0.7, 0.7]),
            ],
        )
        .await;

    let by_vector = gateway
        .similarity_search(store.url(), SimRequest::by_vector(&set, vec![1.0, 0.1], 3))
        .await
        .into_result()
        .unwrap();
    assert_eq!(by_vector.len(), 3);
    assert_eq!(by_vector[0].element, "east");
    assert!(by_vector.windows(2).all(|w| w[0].score >= w[1].score));

    let by_element = gateway
        .similarity_search(
            store.url(),
            SimRequest::by_element(&set, "north", 2).with_embeddings(),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(by_element[0].element, "north");
    assert!(by_element.iter().all(|t| t.vector.as_ref().map(Vec::len) == Some(2)));

    gateway.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_neighbors_and_batch_vectors() {
    let store = TestVectorStore::new().await;
    let gateway = gateway();
    let builder = TestDataBuilder::from_test_name("neighbors");
    let set = builder.set_name("graph");
    let vectors: Vec<(String, Vec<f32>)> = (0..8)
        .map(|i| (format!("e{}", i), builder.vector_at(i, 4)))
        .collect();
    let seed: Vec<(&str, Vec<f32>)> = vectors
        .iter()
        .map(|(name, v)| (name.as_str(), v.clone()))
        .collect();
    store.seed_set(&set, &seed).await;

    let levels = gateway
        .neighbors(store.url(), LinksRequest::new(&set, "e0").with_embeddings())
        .await
        .into_result()
        .unwrap();
    assert!(!levels.is_empty());
    assert!(levels.iter().flatten().all(|t| t.element != "e0"));

    let elements = vec!["e3".to_string(), "ghost".to_string(), "e1".to_string()];
    let batch = gateway.fetch_vectors_batch(store.url(), &set, &elements).await;
    assert_eq!(batch.executed_command(), Some(format!("VEMB {} e3; VEMB {} ghost; VEMB {} e1", set, set, set).as_str()));
    let batch = batch.into_result().unwrap();
    let names: Vec<&str> = batch.iter().map(|v| v.element.as_str()).collect();
    assert_eq!(names, ["e3", "e1"]);

    gateway.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_counts_and_info() {
    let store = TestVectorStore::new().await;
    let gateway = gateway();
    let set = TestDataBuilder::from_test_name("counts").set_name("small");
    store
        .seed_set(&set, &[("a", vec![1.0, 0.0, 0.0]), ("b", vec![0.0, 1.0, 0.0])])
        .await;

    assert_eq!(gateway.cardinality(store.url(), &set).await.into_result(), Ok(2));
    assert_eq!(gateway.dimension(store.url(), &set).await.into_result(), Ok(3));
    assert!(gateway.memory_usage(store.url(), &set).await.into_result().unwrap() > 0);

    let info = gateway.info(store.url(), &set).await.into_result().unwrap();
    assert_eq!(info.get("size").and_then(InfoValue::as_f64), Some(2.0));

    assert_eq!(gateway.remove(store.url(), &set, "a").await.into_result(), Ok(true));
    assert_eq!(gateway.remove(store.url(), &set, "a").await.into_result(), Ok(false));

    let missing = gateway.info(store.url(), "no-such-set").await;
    assert!(missing.error().is_some());

    gateway.shutdown().await;
}

// ============================================================================
// Set Lifecycle & Metadata
// ============================================================================

#[tokio::test]
#[ignore = "requires docker"]
async fn test_create_list_delete() {
    let store = TestVectorStore::new().await;
    let gateway = gateway();
    let builder = TestDataBuilder::from_test_name("lifecycle");
    let set = builder.set_name("created");

    let created = gateway
        .create_vector_set(
            store.url(),
            CreateRequest::new(&set).with_metadata(json!({
                "embedding": {"provider": "none", "none": {"dimensions": 4}},
                "description": "made in a test"
            })),
        )
        .await
        .into_result()
        .unwrap();
    assert_eq!(created.dimensions, Some(4));

    assert_eq!(gateway.cardinality(store.url(), &set).await.into_result(), Ok(1));
    let placeholder = gateway.fetch_vector(store.url(), &set, PLACEHOLDER_ELEMENT, Some(4)).await;
    assert!(placeholder.into_result().unwrap().is_some());

    let again = gateway
        .create_vector_set(store.url(), CreateRequest::new(&set).with_dimensions(4))
        .await;
    assert!(again.error().is_some());

    let listed = gateway.list_vector_sets(store.url()).await.into_result().unwrap();
    assert_eq!(listed, vec![set.clone()]);

    let stored = gateway.get_metadata(store.url(), &set).await.into_result().unwrap();
    assert_eq!(stored.description.as_deref(), Some("made in a test"));

    assert_eq!(gateway.delete_vector_set(store.url(), &set).await.into_result(), Ok(true));
    assert_eq!(gateway.list_vector_sets(store.url()).await.into_result(), Ok(vec![]));

    let mut conn = store.connection();
    let field: Option<String> = redis::cmd("HGET")
        .arg(metadata::DEFAULT_CONFIG_KEY)
        .arg(format!("vset:{}:metadata", set))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(field, None);

    gateway.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_legacy_metadata_is_migrated() {
    let store = TestVectorStore::new().await;
    let gateway = gateway();
    let set = TestDataBuilder::from_test_name("migration").set_name("legacy");
    let legacy = json!({
        "embedding": {"provider": "ollama", "ollama": {"modelName": "nomic-embed-text"}},
        "created": "2024-01-01T00:00:00.000Z"
    });

    let mut conn = store.connection();
    let _: () = redis::cmd("SET")
        .arg(format!("{}_metadata", set))
        .arg(legacy.to_string())
        .query_async(&mut conn)
        .await
        .unwrap();

    let migrated_record = gateway.get_metadata(store.url(), &set).await.into_result().unwrap();
    assert_eq!(migrated_record.dimensions, Some(768));
    assert_eq!(migrated_record.created, "2024-01-01T00:00:00.000Z");

    let legacy_left: i64 = redis::cmd("EXISTS")
        .arg(format!("{}_metadata", set))
        .query_async(&mut conn)
        .await
        .unwrap();
    assert_eq!(legacy_left, 0);

    let migrated: Option<String> = redis::cmd("HGET")
        .arg(metadata::DEFAULT_CONFIG_KEY)
        .arg(format!("vset:{}:metadata", set))
        .query_async(&mut conn)
        .await
        .unwrap();
    let migrated: serde_json::Value = serde_json::from_str(&assert_some(migrated, "migrated record")).unwrap();
    assert_eq!(migrated, serde_json::to_value(&migrated_record).unwrap());

    gateway.shutdown().await;
}

#[tokio::test]
#[ignore = "requires docker"]
async fn test_unreachable_store_reports_failure() {
    let gateway = VectorSetGateway::new(Arc::new(ConnectionPool::redis(
        PoolConfig::default().with_connect_timeout(std::time::Duration::from_millis(300)),
    )));

    let result = gateway.cardinality("redis://127.0.0.1:1", "movies").await;
    assert!(!result.is_success());
    assert!(result.error().is_some());
}
