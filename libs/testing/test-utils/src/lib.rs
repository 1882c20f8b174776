//! Shared test utilities for the todo client crates
//!
//! This crate provides reusable test infrastructure:
//! - `FakeTodoBackend`: in-process REST backend on an ephemeral port, with
//!   failure injection and inspection helpers
//! - `TestDataBuilder`: Deterministic test data generation
//! - `assertions`: Custom assertion helpers
//!
//! # Usage
//!
//! ```rust,no_run
//! use test_utils::{FakeTodoBackend, TaskSeed, TestDataBuilder};
//!
//! #[tokio::test]
//! async fn my_client_test() {
//!     let backend = FakeTodoBackend::start().await;
//!     let builder = TestDataBuilder::from_test_name("my_test");
//!
//!     let user_id = backend.seed_user(&builder.email("owner"), "secret");
//!     backend.seed_task(user_id, TaskSeed::new(builder.title("groceries")));
//!     let token = backend.issue_token(user_id);
//! }
//! ```

mod backend;

pub use backend::{FakeTodoBackend, TaskSeed};

/// Builder for test data with deterministic randomization
///
/// This ensures tests are reproducible by using seeded data.
pub struct TestDataBuilder {
    seed: u64,
}

impl TestDataBuilder {
    /// Create a new builder with a seed (for deterministic tests)
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }

    /// Create from test name (generates seed from test name hash)
    ///
    /// This is the recommended way to create a builder for consistent test data.
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::from_test_name("test_reorder_tasks");
    /// ```
    pub fn from_test_name(name: &str) -> Self {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        name.hash(&mut hasher);
        Self::new(hasher.finish())
    }

    /// Generate a unique email address for testing
    ///
    /// # Example
    ///
    /// ```
    /// use test_utils::TestDataBuilder;
    ///
    /// let builder = TestDataBuilder::new(7);
    /// assert_eq!(builder.email("owner"), "owner-7@example.com");
    /// ```
    pub fn email(&self, local: &str) -> String {
        format!("{}-{}@example.com", local, self.seed)
    }

    /// Generate a unique task title for testing
    ///
    /// # Arguments
    ///
    /// * `suffix` - A unique identifier within the test (e.g., "first", "groceries")
    pub fn title(&self, suffix: &str) -> String {
        format!("test-task-{}-{}", self.seed, suffix)
    }

    /// A valid password of the given length
    pub fn password(&self, len: usize) -> String {
        "p".repeat(len)
    }
}

/// Test assertion helpers
pub mod assertions {
    use std::fmt::Debug;

    /// Assert that a list is in the expected order with a nice error message
    pub fn assert_order<T: PartialEq + Debug>(actual: &[T], expected: &[T], context: &str) {
        assert_eq!(
            actual, expected,
            "{}: expected order {:?}, got {:?}",
            context, expected, actual
        );
    }

    /// Assert that positions are exactly `1..=n` in list order
    pub fn assert_dense_positions(positions: &[i64], context: &str) {
        let expected: Vec<i64> = (1..=positions.len() as i64).collect();
        assert_eq!(
            positions, expected,
            "{}: positions are not 1..={}",
            context,
            positions.len()
        );
    }

    /// Assert that an optional value is Some
    pub fn assert_some<T>(value: Option<T>, context: &str) -> T {
        value.unwrap_or_else(|| panic!("{}: expected Some, got None", context))
    }
}
