//! Ergonomic testing utilities for reducers
//!
//! This module provides a fluent API for testing reducers with readable Given-When-Then syntax.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use composable_crud_core::{effect::Effect, reducer::Reducer};

/// Type alias for state assertion functions
type StateAssertion<S> = Box<dyn FnOnce(&S)>;

/// Type alias for effect assertion functions
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// Several `when_action` calls are applied in order; effect assertions see
/// the effects of every action.
///
/// # Example
///
/// ```
/// use composable_crud_core::crud_for;
/// use composable_crud_testing::{ReducerTest, assertions, fixtures};
///
/// # fn main() -> Result<(), composable_crud_core::CrudError> {
/// let cows = crud_for("cows")?;
///
/// ReducerTest::new(cows.reducer.clone())
///     .with_env(())
///     .given_state(cows.reducer.initial_state())
///     .when_action(cows.action_creators.create_start())
///     .when_action(cows.action_creators.create_success(fixtures::cow(28, "Hubert")))
///     .then_state(|state| {
///         assert!(!state.is_creating);
///         assert_eq!(state.items.len(), 1);
///     })
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// # Ok(())
/// # }
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
    S: Clone,
    A: Clone,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment for the test
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add several actions to apply in order (When)
    #[must_use]
    pub fn when_actions<I>(mut self, actions: I) -> Self
    where
        I: IntoIterator<Item = A>,
    {
        self.actions.extend(actions);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the resulting effects (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if initial state, an action, or environment is not set,
    /// or if any assertions fail.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        assert!(
            !self.actions.is_empty(),
            "At least one action must be set with when_action()"
        );

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let mut effects = Vec::new();
        for action in self.actions {
            effects.extend(self.reducer.reduce(&mut state, action, &env));
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects and collection states
pub mod assertions {
    use composable_crud_core::effect::Effect;
    use composable_crud_core::state::CollectionState;
    use serde_json::Value;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(|effect| matches!(effect, Effect::None)),
            "Expected no effects, but found {}",
            effects.len()
        );
    }

    /// Assert the number of effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that no request-lifecycle flag is set
    ///
    /// # Panics
    ///
    /// Panics if any of the four flags is set.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_idle(state: &CollectionState) {
        assert!(
            !state.is_busy(),
            "Expected an idle collection, found creating={} fetching={} updating={} deleting={}",
            state.is_creating,
            state.is_fetching,
            state.is_updating,
            state.is_deleting
        );
    }

    /// Assert the key values of the items, in iteration order
    ///
    /// # Panics
    ///
    /// Panics if the keys differ.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_keys(state: &CollectionState, key: &str, expected: &[Value]) {
        let keys: Vec<Value> = state
            .items
            .items()
            .map(|item| item.get(key).cloned().unwrap_or(Value::Null))
            .collect();
        assert_eq!(keys, expected, "Unexpected item keys");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use composable_crud_core::{CrudConfig, Mode, crud_for, crud_for_with};
    use serde_json::json;

    #[test]
    fn applies_actions_in_order() {
        let Ok(cows) = crud_for("cows") else {
            unreachable!("valid entity");
        };
        let creators = cows.action_creators.clone();

        ReducerTest::new(cows.reducer.clone())
            .with_env(())
            .given_state(cows.reducer.initial_state())
            .when_actions([
                creators.fetch_list_start(),
                creators.fetch_list_success(json!([{ "id": 1 }, { "id": 2 }])),
                creators.delete_start(),
            ])
            .then_state(|state| {
                assert!(state.is_deleting);
                assert!(!state.is_fetching);
                assertions::assert_keys(state, "id", &[json!(1), json!(2)]);
            })
            .then_effects(|effects| assertions::assert_effects_count(effects, 0))
            .run();
    }

    #[test]
    fn map_mode_state_assertions() {
        let Ok(cows) = crud_for_with("cows", CrudConfig::default().with_mode(Mode::Map)) else {
            unreachable!("valid entity");
        };

        ReducerTest::new(cows.reducer.clone())
            .with_env(())
            .given_state(cows.reducer.initial_state())
            .when_action(cows.action_creators.update_success(json!({ "id": 7 })))
            .then_state(|state| {
                assertions::assert_idle(state);
                assertions::assert_keys(state, "id", &[json!(7)]);
            })
            .run();
    }

    #[test]
    fn test_assertions_no_effects() {
        assertions::assert_no_effects::<()>(&[Effect::None]);
        assertions::assert_no_effects::<()>(&[]);
    }

    #[test]
    #[should_panic(expected = "At least one action")]
    fn run_requires_an_action() {
        let Ok(cows) = crud_for("cows") else {
            unreachable!("valid entity");
        };
        ReducerTest::new(cows.reducer.clone())
            .with_env(())
            .given_state(cows.reducer.initial_state())
            .run();
    }
}
