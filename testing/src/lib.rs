//! # Composable CRUD Testing
//!
//! Testing utilities for CRUD reducers and orchestrated requests.
//!
//! This crate provides:
//! - A fixed [`Clock`] for deterministic `updatedAt` stamps
//! - [`RecordingDispatcher`], a dispatch sink that keeps every action
//! - Item fixtures and proptest strategies
//! - The Given-When-Then [`ReducerTest`] harness
//!
//! ## Example
//!
//! ```
//! use composable_crud_core::crud_for;
//! use composable_crud_testing::{fixtures, test_clock};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), composable_crud_core::CrudError> {
//! let cows = crud_for("cows")?.with_clock(Arc::new(test_clock()));
//! let created = cows.action_creators.create_success(fixtures::cow(28, "Hubert"));
//! assert_eq!(created.updated_at(), Some(test_clock().time()));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use composable_crud_core::environment::Clock;

mod reducer_test;

pub use reducer_test::{ReducerTest, assertions};

/// Mock implementations for testing.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use composable_crud_core::action::ActionRecord;
    use composable_crud_runtime::dispatch::{Dispatch, Dispatcher};
    use futures::future::BoxFuture;
    use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use composable_crud_testing::mocks::FixedClock;
    /// use composable_crud_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// The instant this clock reports
        #[must_use]
        pub const fn time(&self) -> DateTime<Utc> {
            self.time
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }

    /// Dispatch sink that records every action it receives
    ///
    /// # Example
    ///
    /// ```
    /// use composable_crud_core::ActionRecord;
    /// use composable_crud_runtime::Dispatch;
    /// use composable_crud_testing::RecordingDispatcher;
    ///
    /// # #[tokio::main(flavor = "current_thread")]
    /// # async fn main() {
    /// let recorder = RecordingDispatcher::new();
    /// recorder.dispatch(ActionRecord::new("cows/create/start")).await;
    /// assert_eq!(recorder.action_types(), vec!["cows/create/start"]);
    /// # }
    /// ```
    #[derive(Debug, Default)]
    pub struct RecordingDispatcher {
        actions: Mutex<Vec<ActionRecord>>,
        notify: Notify,
    }

    impl RecordingDispatcher {
        /// Create an empty recorder
        #[must_use]
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        /// This recorder as a [`Dispatcher`]
        #[must_use]
        pub fn dispatcher(self: &Arc<Self>) -> Dispatcher {
            Arc::clone(self) as Dispatcher
        }

        /// Every recorded action, oldest first
        #[must_use]
        pub fn actions(&self) -> Vec<ActionRecord> {
            self.lock().clone()
        }

        /// The types of every recorded action, oldest first
        #[must_use]
        pub fn action_types(&self) -> Vec<String> {
            self.lock()
                .iter()
                .map(|action| action.action_type.clone())
                .collect()
        }

        /// Number of recorded actions
        #[must_use]
        pub fn len(&self) -> usize {
            self.lock().len()
        }

        /// Whether nothing has been recorded
        #[must_use]
        pub fn is_empty(&self) -> bool {
            self.lock().is_empty()
        }

        /// Forget everything recorded so far
        pub fn clear(&self) {
            self.lock().clear();
        }

        /// Wait until at least `count` actions are recorded
        ///
        /// Returns `false` if `timeout` elapses first.
        pub async fn wait_for(&self, count: usize, timeout: Duration) -> bool {
            tokio::time::timeout(timeout, async {
                loop {
                    let notified = self.notify.notified();
                    if self.len() >= count {
                        return;
                    }
                    notified.await;
                }
            })
            .await
            .is_ok()
        }

        fn lock(&self) -> MutexGuard<'_, Vec<ActionRecord>> {
            self.actions.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    impl Dispatch for RecordingDispatcher {
        fn dispatch(&self, action: ActionRecord) -> BoxFuture<'_, ()> {
            self.lock().push(action);
            self.notify.notify_waiters();
            Box::pin(std::future::ready(()))
        }
    }
}

/// Test helpers and utilities.
pub mod helpers {
    use std::time::Duration;

    /// Resolve with `result` after `delay`
    ///
    /// Stands in for a network call inside request functions.
    pub async fn respond_after<T, E>(delay: Duration, result: Result<T, E>) -> Result<T, E> {
        tokio::time::sleep(delay).await;
        result
    }

    /// Install a `tracing` subscriber that writes through the test harness
    ///
    /// Safe to call from every test; only the first call installs.
    pub fn init_test_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    }
}

/// Item fixtures.
pub mod fixtures {
    use serde_json::{Value, json};

    /// A cow keyed by `id`
    #[must_use]
    pub fn cow(id: u32, name: &str) -> Value {
        json!({ "id": id, "name": name })
    }

    /// Three cows keyed 25, 26 and 29
    #[must_use]
    pub fn herd() -> Value {
        Value::Array(vec![cow(25, "foo"), cow(26, "bar"), cow(29, "bla")])
    }
}

/// Property-based testing utilities using proptest.
pub mod properties {
    use proptest::prelude::*;
    use serde_json::{Value, json};

    /// Key values as they appear in payloads: small integers or short strings
    pub fn key_strategy() -> impl Strategy<Value = Value> {
        prop_oneof![
            (0u32..50).prop_map(|n| json!(n)),
            "[a-z]{1,6}".prop_map(|s| json!(s)),
        ]
    }

    /// Items carrying `key` and a name
    pub fn item_strategy(key: &'static str) -> impl Strategy<Value = Value> {
        (key_strategy(), "[a-zA-Z ]{0,12}")
            .prop_map(move |(id, name)| json!({ key: id, "name": name }))
    }

    /// Lists of up to `max` items keyed by `key`
    pub fn items_strategy(key: &'static str, max: usize) -> impl Strategy<Value = Value> {
        prop::collection::vec(item_strategy(key), 0..max).prop_map(Value::Array)
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, RecordingDispatcher, test_clock};
