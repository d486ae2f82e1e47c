//! # Composable CRUD Core
//!
//! Action types, action creators and entity reducers for CRUD collections.
//!
//! For a named entity this crate generates a consistent triplet:
//!
//! - **Action types**: `{entity}/{label}/{start|success|failure}` for every
//!   [`Operation`](action::Operation)
//! - **Action creators**: builders for Flux Standard Action records
//! - **Reducer**: a pure state transition folding those actions into a
//!   [`CollectionState`](state::CollectionState)
//!
//! ## Architecture Principles
//!
//! - Unidirectional Data Flow
//! - Reducers never mutate their input snapshot
//! - Collection representation (list or map) is fixed at construction time
//! - Time is injected through [`Clock`](environment::Clock)
//!
//! ## Example
//!
//! ```
//! use composable_crud_core::crud_for;
//! use serde_json::json;
//!
//! # fn main() -> Result<(), composable_crud_core::CrudError> {
//! let examples = crud_for("examples")?;
//! let creators = &examples.action_creators;
//!
//! let state = examples.reducer.reduce_snapshot(None, Some(&creators.create_start()));
//! assert!(state.is_creating);
//!
//! let state = examples
//!     .reducer
//!     .reduce_snapshot(Some(&state), Some(&creators.create_success(json!({ "id": 1 }))));
//! assert!(!state.is_creating);
//! assert_eq!(state.items.len(), 1);
//! # Ok(())
//! # }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Flux Standard Action records and the action-type registry
pub mod action;

/// String case conversion used for action-creator names
pub mod case;

/// Reducer composition utilities
pub mod composition;

/// Entity configuration
pub mod config;

/// Action creators for an entity
pub mod creators;

/// The `crud_for` factory
pub mod crud;

/// Error types
pub mod error;

/// Collection state and item collections
pub mod state;

/// The entity reducer
pub mod entity;

pub use action::{ActionMeta, ActionRecord, ActionTypes, Operation, Phase, is_dispatchable};
pub use config::{ActionLabels, CrudConfig, InitialStateOverride, Mode};
pub use creators::ActionCreators;
pub use crud::{Crud, crud_for, crud_for_with};
pub use entity::EntityReducer;
pub use error::CrudError;
pub use state::{Collection, CollectionState, Item};

/// Reducer module - The core trait for state transitions
///
/// Reducers are pure functions: `(State, Action, Environment) → (State, Effects)`
///
/// They contain all business logic and are deterministic and testable.
pub mod reducer {
    use super::effect::Effect;
    use smallvec::SmallVec;

    /// The Reducer trait - core abstraction for state transitions
    ///
    /// # Type Parameters
    ///
    /// - `State`: The state this reducer operates on
    /// - `Action`: The action type this reducer processes
    /// - `Environment`: The injected dependencies this reducer needs
    ///
    /// # Example
    ///
    /// ```
    /// use composable_crud_core::{SmallVec, effect::Effect, reducer::Reducer};
    ///
    /// struct Counter;
    ///
    /// impl Reducer for Counter {
    ///     type State = i64;
    ///     type Action = i64;
    ///     type Environment = ();
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut i64,
    ///         action: i64,
    ///         _env: &(),
    ///     ) -> SmallVec<[Effect<i64>; 4]> {
    ///         *state += action;
    ///         SmallVec::new()
    ///     }
    /// }
    ///
    /// let mut state = 1;
    /// let _ = Counter.reduce(&mut state, 2, &());
    /// assert_eq!(state, 3);
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// # Arguments
        ///
        /// - `state`: Mutable reference to current state
        /// - `action`: The action to process
        /// - `env`: Reference to injected dependencies
        ///
        /// # Returns
        ///
        /// Effects to be executed by the runtime
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - Side effect descriptions
///
/// Effects describe side effects to be performed by the runtime.
/// They are values (not execution) and are composable.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// Effects are NOT executed immediately. They are descriptions of what should happen,
    /// returned from reducers and executed by the Store runtime. Orchestrated
    /// requests run as [`Effect::Future`]s that dispatch their own lifecycle
    /// actions.
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects in parallel
        Parallel(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Parallel(effects) => {
                    f.debug_tuple("Effect::Parallel").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Combine effects to run in parallel
        #[must_use]
        pub const fn merge(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Parallel(effects)
        }

        /// Build an [`Effect::Future`] from any sendable future
        #[must_use]
        pub fn future<F>(future: F) -> Effect<Action>
        where
            F: Future<Output = Option<Action>> + Send + 'static,
        {
            Effect::Future(Box::pin(future))
        }
    }
}

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// Action creators stamp `meta.updatedAt` from a clock, so tests can
    /// pin timestamps with a fixed implementation.
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Production clock backed by the system time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn effect_debug_is_readable() {
        let effect: Effect<u8> =
            Effect::merge(vec![Effect::None, Effect::future(async { Some(2) })]);
        let rendered = format!("{effect:?}");
        assert!(rendered.starts_with("Effect::Parallel"));
        assert!(rendered.contains("Effect::Future(<future>)"));
    }
}
