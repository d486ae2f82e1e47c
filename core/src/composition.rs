//! Reducer composition utilities
//!
//! Entity reducers are independent; an application usually keeps several
//! collections side by side. These helpers put them under one state:
//!
//! - **`scope_reducer`**: run a reducer against one field of a larger state
//! - **`combine_reducers`**: run several reducers on the same state/action
//!
//! # Example
//!
//! ```
//! use composable_crud_core::composition::{combine_reducers, scope_reducer};
//! use composable_crud_core::reducer::Reducer;
//! use composable_crud_core::{CollectionState, crud_for};
//!
//! #[derive(Clone)]
//! struct AppState {
//!     cows: CollectionState,
//!     barns: CollectionState,
//! }
//!
//! # fn main() -> Result<(), composable_crud_core::CrudError> {
//! let cows = crud_for("cows")?;
//! let barns = crud_for("barns")?;
//!
//! let mut state = AppState {
//!     cows: cows.reducer.initial_state(),
//!     barns: barns.reducer.initial_state(),
//! };
//!
//! let app = combine_reducers(vec![
//!     Box::new(scope_reducer(
//!         cows.reducer.clone(),
//!         |app: &AppState| &app.cows,
//!         |app: &mut AppState, cows| app.cows = cows,
//!     )),
//!     Box::new(scope_reducer(
//!         barns.reducer.clone(),
//!         |app: &AppState| &app.barns,
//!         |app: &mut AppState, barns| app.barns = barns,
//!     )),
//! ]);
//!
//! let _ = app.reduce(&mut state, cows.action_creators.fetch_list_start(), &());
//! assert!(state.cows.is_fetching);
//! assert!(!state.barns.is_fetching);
//! # Ok(())
//! # }
//! ```

use crate::SmallVec;
use crate::effect::Effect;
use crate::reducer::Reducer;

/// Combines multiple reducers that operate on the same state and action types.
///
/// Each reducer runs in sequence and all effects are concatenated.
#[must_use]
pub fn combine_reducers<S, A, E>(
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
) -> CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    CombinedReducer { reducers }
}

/// A combined reducer that runs multiple reducers in sequence.
///
/// Created by [`combine_reducers`].
pub struct CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    reducers: Vec<Box<dyn Reducer<State = S, Action = A, Environment = E> + Send + Sync>>,
}

impl<S, A, E> Reducer for CombinedReducer<S, A, E>
where
    S: 'static,
    A: Clone + 'static,
    E: 'static,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut all_effects = SmallVec::new();

        for reducer in &self.reducers {
            all_effects.extend(reducer.reduce(state, action.clone(), env));
        }

        all_effects
    }
}

/// Scopes a reducer to operate on one field of a larger state.
///
/// The sub-state is cloned out, reduced, and written back.
pub fn scope_reducer<S, SubS, A, E, R>(
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&mut S, SubS),
) -> ScopedReducer<S, SubS, A, E, R>
where
    SubS: Clone,
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    ScopedReducer {
        reducer,
        get_state,
        set_state,
        _phantom: std::marker::PhantomData,
    }
}

/// A scoped reducer that operates on a subset of state.
///
/// Created by [`scope_reducer`].
pub struct ScopedReducer<S, SubS, A, E, R>
where
    SubS: Clone,
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    reducer: R,
    get_state: fn(&S) -> &SubS,
    set_state: fn(&mut S, SubS),
    _phantom: std::marker::PhantomData<fn() -> (A, E)>,
}

impl<S, SubS, A, E, R> Reducer for ScopedReducer<S, SubS, A, E, R>
where
    SubS: Clone,
    R: Reducer<State = SubS, Action = A, Environment = E>,
{
    type State = S;
    type Action = A;
    type Environment = E;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        let mut sub_state = (self.get_state)(state).clone();
        let effects = self.reducer.reduce(&mut sub_state, action, env);
        (self.set_state)(state, sub_state);
        effects
    }
}
