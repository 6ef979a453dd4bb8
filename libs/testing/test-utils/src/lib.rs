//! Shared test utilities for the vector-set crates
//!
//! - `TestVectorStore`: Redis 8 container with automatic cleanup (feature: "redis")
//! - `TestDataBuilder`: Deterministic set names and vectors (always available)
//! - `assertions`: Custom assertion helpers (always available)
//!
//! # Usage
//!
//! ```toml
//! [dev-dependencies]
//! test-utils = { workspace = true, features = ["redis"] }
//! ```
//!
//! ```rust,ignore
//! use test_utils::{TestDataBuilder, TestVectorStore};
//!
//! #[tokio::test]
//! #[ignore = "requires docker"]
//! async fn my_vector_test() {
//!     let store = TestVectorStore::new().await;
//!     let builder = TestDataBuilder::from_test_name("my_vector_test");
//!
//!     let set = builder.set_name("movies");
//!     store.seed_set(&set, &[("alien", builder.vector(4))]).await;
//! }
//! ```

#[cfg(feature = "redis")]
mod redis;

#[cfg(feature = "redis")]
pub use redis::TestVectorStore;

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded random data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed: seed.max(1) }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_similarity_search");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique vector-set name for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.set_name("movies"), "test-movies-7");
    /// ```
    pub fn set_name(&self, prefix: &str) -> String {
        format!("test-{}-{}", prefix, self.seed)
    }

    /// Generate a vector with components in `[-1, 1)`
    ///
    /// The same builder always yields the same vector for the same `dimensions`.
    pub fn vector(&self, dimensions: usize) -> Vec<f32> {
        self.vector_at(0, dimensions)
    }

    /// Generate the `index`-th vector of a family, for seeding several elements
    pub fn vector_at(&self, index: u64, dimensions: usize) -> Vec<f32> {
        let mut state = self.seed ^ index.wrapping_mul(0x9E37_79B9_7F4A_7C15);
        if state == 0 {
            state = 1;
        }
        (0..dimensions)
            .map(|_| {
                // xorshift64
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                ((state >> 40) as f32 / (1u64 << 24) as f32) * 2.0 - 1.0
            })
            .collect()
    }
}

/// Test assertion helpers
pub mod assertions {
    /// Assert that two vectors are equal within `tolerance`, component by component
    pub fn assert_vector_close(actual: &[f32], expected: &[f32], tolerance: f32, context: &str) {
        assert_eq!(
            actual.len(),
            expected.len(),
            "{}: expected {} components, got {}",
            context,
            expected.len(),
            actual.len()
        );
        for (i, (a, e)) in actual.iter().zip(expected).enumerate() {
            assert!(
                (a - e).abs() <= tolerance,
                "{}: component {} differs: expected {}, got {}",
                context,
                i,
                e,
                a
            );
        }
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
