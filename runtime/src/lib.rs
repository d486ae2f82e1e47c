//! # Composable CRUD Runtime
//!
//! Runtime pieces for CRUD reducers built with `composable-crud-core`.
//!
//! ## Core Components
//!
//! - **`ApiRequest`**: Orchestrates one async request and dispatches its
//!   lifecycle actions with deferred start and minimum visible duration
//! - **Store**: Holds state, runs the reducer and executes returned effects,
//!   including requests spawned onto it
//! - **Dispatch**: The sink requests dispatch into
//!
//! ## Example
//!
//! ```
//! use composable_crud_core::{CrudConfig, Mode, crud_for_with};
//! use composable_crud_runtime::{ApiRequest, Store};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), String> {
//! let cows = crud_for_with("cows", CrudConfig::default().with_mode(Mode::Map))
//!     .map_err(|e| e.to_string())?;
//! let store = Store::new(cows.reducer.initial_state(), cows.reducer.clone(), ());
//!
//! let creators = cows.action_creators.clone();
//! let fetch = ApiRequest::new(|_dispatch, _get_state| async {
//!     Ok::<_, String>(json!([{ "id": 28, "name": "Hubert" }]))
//! })
//! .on_success(move |cows| Some(creators.fetch_list_success(cows.clone())));
//!
//! store.run(&fetch).await?;
//! assert_eq!(store.state(|cows| cows.items.len()), 1);
//! # Ok(())
//! # }
//! ```

/// Dispatch sinks and state accessors
pub mod dispatch;

/// Metrics for requests and stores
pub mod metrics;

/// Async request orchestration
pub mod request;

pub use dispatch::{Dispatch, Dispatcher, GetState, dispatch_fn, state_fn};
pub use error::StoreError;
pub use request::{ApiRequest, RequestOutcome, Surface, Timing, get_delay};
pub use store::Store;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug, Clone, PartialEq, Eq)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),

        /// Timeout waiting for a matching action
        ///
        /// Returned by `send_and_wait_for` when the timeout expires before
        /// a matching action is reduced.
        #[error("Timeout waiting for action")]
        Timeout,

        /// The action broadcast closed while waiting
        #[error("Action broadcast channel closed")]
        ChannelClosed,
    }
}

/// Store runtime for coordinating reducer execution and effect handling.
pub mod store {
    use crate::dispatch::{Dispatch, Dispatcher, GetState};
    use crate::error::StoreError;
    use crate::metrics::StoreMetrics;
    use crate::request::{ApiRequest, RequestOutcome};
    use composable_crud_core::action::ActionRecord;
    use composable_crud_core::effect::Effect;
    use composable_crud_core::reducer::Reducer;
    use composable_crud_core::SmallVec;
    use futures::future::BoxFuture;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::{broadcast, watch};

    /// Default capacity of the action broadcast
    pub const DEFAULT_BROADCAST_CAPACITY: usize = 64;

    /// The Store - runtime for a reducer
    ///
    /// State lives in a `watch` channel so it can be read synchronously and
    /// observed for changes. Every reduced action is also broadcast to
    /// [`actions`](Store::actions) subscribers.
    ///
    /// The handle is cheap to clone; clones share state.
    pub struct Store<S, A, E, R> {
        state: Arc<watch::Sender<S>>,
        reducer: Arc<R>,
        environment: Arc<E>,
        action_broadcast: broadcast::Sender<A>,
        shutdown: Arc<AtomicBool>,
        pending_effects: Arc<AtomicUsize>,
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R> {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: Arc::clone(&self.reducer),
                environment: Arc::clone(&self.environment),
                action_broadcast: self.action_broadcast.clone(),
                shutdown: Arc::clone(&self.shutdown),
                pending_effects: Arc::clone(&self.pending_effects),
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        S: Send + Sync + 'static,
        A: Clone + Send + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self::with_broadcast_capacity(
                initial_state,
                reducer,
                environment,
                DEFAULT_BROADCAST_CAPACITY,
            )
        }

        /// Create a new store with a custom action broadcast capacity
        ///
        /// # Panics
        ///
        /// Panics if `capacity` is zero.
        #[must_use]
        pub fn with_broadcast_capacity(
            initial_state: S,
            reducer: R,
            environment: E,
            capacity: usize,
        ) -> Self {
            let (state, _) = watch::channel(initial_state);
            let (action_broadcast, _) = broadcast::channel(capacity);
            Self {
                state: Arc::new(state),
                reducer: Arc::new(reducer),
                environment: Arc::new(environment),
                action_broadcast,
                shutdown: Arc::new(AtomicBool::new(false)),
                pending_effects: Arc::new(AtomicUsize::new(0)),
            }
        }

        /// Send an action to the store
        ///
        /// Runs the reducer against the current state, notifies
        /// subscribers and starts the returned effects. Effects run on the
        /// current Tokio runtime; actions they produce are sent back into
        /// the store. Returns once effects are started, not finished.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub fn send(&self, action: A) -> Result<(), StoreError> {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action, store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }
            StoreMetrics::record_action();

            let mut effects = SmallVec::<[Effect<A>; 4]>::new();
            let reduced = action.clone();
            self.state.send_modify(|state| {
                effects = self.reducer.reduce(state, reduced, &self.environment);
            });
            // No subscribers is fine
            let _ = self.action_broadcast.send(action);

            tracing::trace!(effects = effects.len(), "Action reduced");
            for effect in effects {
                self.execute(effect);
            }
            Ok(())
        }

        /// Send an action and wait for a reduced action matching `predicate`
        ///
        /// The sent action itself is offered to `predicate` too.
        ///
        /// # Errors
        ///
        /// - [`StoreError::ShutdownInProgress`] if the store is shutting down
        /// - [`StoreError::Timeout`] if nothing matched within `timeout`
        /// - [`StoreError::ChannelClosed`] if the broadcast closed
        pub async fn send_and_wait_for<F>(
            &self,
            action: A,
            predicate: F,
            timeout: Duration,
        ) -> Result<A, StoreError>
        where
            F: Fn(&A) -> bool,
        {
            let mut actions = self.action_broadcast.subscribe();
            self.send(action)?;

            let wait = async {
                loop {
                    match actions.recv().await {
                        Ok(action) if predicate(&action) => return Ok(action),
                        Ok(_) => {},
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            tracing::warn!(skipped, "Action subscriber lagged");
                        },
                        Err(broadcast::error::RecvError::Closed) => {
                            return Err(StoreError::ChannelClosed);
                        },
                    }
                }
            };

            tokio::time::timeout(timeout, wait)
                .await
                .map_err(|_| StoreError::Timeout)?
        }

        /// Read state through a closure
        pub fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            f(&self.state.borrow())
        }

        /// Subscribe to state changes
        #[must_use]
        pub fn subscribe(&self) -> watch::Receiver<S> {
            self.state.subscribe()
        }

        /// Subscribe to reduced actions
        #[must_use]
        pub fn actions(&self) -> broadcast::Receiver<A> {
            self.action_broadcast.subscribe()
        }

        /// Accessor returning a snapshot of the current state
        #[must_use]
        pub fn get_state(&self) -> GetState<S>
        where
            S: Clone,
        {
            let state = Arc::clone(&self.state);
            Arc::new(move || state.borrow().clone())
        }

        /// Number of effects currently in flight
        #[must_use]
        pub fn pending_effects(&self) -> usize {
            self.pending_effects.load(Ordering::Acquire)
        }

        /// Wait until no effect is in flight
        ///
        /// Unlike [`shutdown`](Store::shutdown) the store keeps accepting
        /// actions, so spawned requests can still land theirs.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::Timeout`] if effects are still running when
        /// `timeout` expires.
        pub async fn settle(&self, timeout: Duration) -> Result<(), StoreError> {
            self.wait_for_effects(timeout)
                .await
                .map_err(|_| StoreError::Timeout)
        }

        /// Initiate graceful shutdown
        ///
        /// New actions are refused, including those produced by effects still
        /// running. Waits for in-flight effects to finish.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if the timeout expires before all
        /// pending effects complete.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            tracing::info!("Initiating graceful shutdown");
            self.shutdown.store(true, Ordering::Release);

            match self.wait_for_effects(timeout).await {
                Ok(()) => {
                    tracing::info!("All effects completed, shutdown successful");
                    Ok(())
                },
                Err(pending) => {
                    tracing::error!(pending_effects = pending, "Shutdown timed out");
                    Err(StoreError::ShutdownTimeout(pending))
                },
            }
        }

        async fn wait_for_effects(&self, timeout: Duration) -> Result<(), usize> {
            let start = tokio::time::Instant::now();
            let poll_interval = Duration::from_millis(10);

            loop {
                let pending = self.pending_effects.load(Ordering::Acquire);
                if pending == 0 {
                    return Ok(());
                }
                if start.elapsed() >= timeout {
                    return Err(pending);
                }
                tracing::debug!(pending_effects = pending, "Waiting for effects to complete");
                tokio::time::sleep(poll_interval).await;
            }
        }

        fn execute(&self, effect: Effect<A>) {
            match effect {
                Effect::None => {},
                Effect::Parallel(effects) => {
                    for effect in effects {
                        self.execute(effect);
                    }
                },
                Effect::Future(future) => {
                    let Ok(runtime) = tokio::runtime::Handle::try_current() else {
                        tracing::error!("No Tokio runtime, effect dropped");
                        return;
                    };
                    let guard = PendingGuard::new(&self.pending_effects);
                    let store = self.clone();
                    runtime.spawn(async move {
                        let _guard = guard;
                        if let Some(action) = future.await {
                            store.feed_back(action);
                        }
                    });
                },
            }
        }

        fn feed_back(&self, action: A) {
            if let Err(error) = self.send(action) {
                tracing::warn!(%error, "Dropped action produced by an effect");
            }
        }
    }

    impl<S, E, R> Store<S, ActionRecord, E, R>
    where
        R: Reducer<State = S, Action = ActionRecord, Environment = E> + Send + Sync + 'static,
        S: Clone + Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// This store as a [`Dispatcher`]
        #[must_use]
        pub fn dispatcher(&self) -> Dispatcher {
            Arc::new(self.clone())
        }

        /// Run `request` against this store
        ///
        /// # Errors
        ///
        /// Returns the request error when the request throws on error.
        pub async fn run<T, Err>(
            &self,
            request: &ApiRequest<S, T, Err>,
        ) -> Result<RequestOutcome<T>, Err>
        where
            T: Send + 'static,
            Err: Send + 'static,
        {
            request.run(self.dispatcher(), self.get_state()).await
        }

        /// Start `request` in the background
        ///
        /// The request runs as a tracked effect, so [`settle`](Store::settle)
        /// and [`shutdown`](Store::shutdown) wait for it.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub fn spawn<T, Err>(&self, request: &ApiRequest<S, T, Err>) -> Result<(), StoreError>
        where
            T: Send + 'static,
            Err: Send + 'static,
        {
            self.spawn_all([request])
        }

        /// Start several requests side by side
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub fn spawn_all<'a, T, Err, I>(&self, requests: I) -> Result<(), StoreError>
        where
            T: Send + 'static,
            Err: Send + 'static,
            I: IntoIterator<Item = &'a ApiRequest<S, T, Err>>,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected request, store is shutting down");
                return Err(StoreError::ShutdownInProgress);
            }
            let effects: Vec<_> = requests
                .into_iter()
                .map(|request| {
                    request
                        .clone()
                        .into_effect(self.dispatcher(), self.get_state())
                })
                .collect();
            tracing::debug!(requests = effects.len(), "Spawning requests");
            self.execute(Effect::merge(effects));
            Ok(())
        }
    }

    impl<S, E, R> Dispatch for Store<S, ActionRecord, E, R>
    where
        R: Reducer<State = S, Action = ActionRecord, Environment = E> + Send + Sync + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        fn dispatch(&self, action: ActionRecord) -> BoxFuture<'_, ()> {
            if let Err(error) = self.send(action) {
                tracing::warn!(%error, "Dropped dispatched action");
            }
            Box::pin(std::future::ready(()))
        }
    }

    /// Tracks one in-flight effect for shutdown
    struct PendingGuard(Arc<AtomicUsize>);

    impl PendingGuard {
        fn new(counter: &Arc<AtomicUsize>) -> Self {
            let pending = counter.fetch_add(1, Ordering::AcqRel) + 1;
            StoreMetrics::record_pending(pending);
            Self(Arc::clone(counter))
        }
    }

    impl Drop for PendingGuard {
        fn drop(&mut self) {
            let pending = self.0.fetch_sub(1, Ordering::AcqRel).saturating_sub(1);
            StoreMetrics::record_pending(pending);
        }
    }

    #[cfg(test)]
    #[allow(clippy::expect_used)]
    mod tests {
        use super::*;
        use composable_crud_core::{CrudConfig, Mode, crud_for_with};
        use serde_json::json;

        #[derive(Clone, Debug, PartialEq)]
        enum Tick {
            Start,
            Echo(u32),
            Stop,
        }

        #[derive(Clone, Default)]
        struct Ticks(Vec<Tick>);

        struct TickReducer;

        impl Reducer for TickReducer {
            type State = Ticks;
            type Action = Tick;
            type Environment = ();

            fn reduce(
                &self,
                state: &mut Ticks,
                action: Tick,
                _env: &(),
            ) -> SmallVec<[Effect<Tick>; 4]> {
                state.0.push(action.clone());
                match action {
                    Tick::Start => composable_crud_core::smallvec![Effect::merge(vec![
                        Effect::future(async {
                            tokio::time::sleep(Duration::from_millis(50)).await;
                            Some(Tick::Echo(1))
                        }),
                        Effect::future(async { Some(Tick::Echo(2)) }),
                    ])],
                    Tick::Echo(_) | Tick::Stop => SmallVec::new(),
                }
            }
        }

        #[test]
        fn reduces_without_a_runtime() {
            let cows = crud_for_with("cows", CrudConfig::default().with_mode(Mode::Map))
                .expect("valid entity");
            let store = Store::new(cows.reducer.initial_state(), cows.reducer.clone(), ());
            store
                .send(cows.action_creators.create_success(json!({ "id": 1 })))
                .expect("accepted");
            assert_eq!(store.state(|cows| cows.items.len()), 1);
        }

        #[tokio::test(start_paused = true)]
        async fn parallel_effects_feed_back_as_they_finish() {
            let store = Store::new(Ticks::default(), TickReducer, ());
            let echoed = store
                .send_and_wait_for(
                    Tick::Start,
                    |tick| *tick == Tick::Echo(1),
                    Duration::from_secs(1),
                )
                .await
                .expect("delayed echo");
            assert_eq!(echoed, Tick::Echo(1));
            assert_eq!(
                store.state(|ticks| ticks.0.clone()),
                vec![Tick::Start, Tick::Echo(2), Tick::Echo(1)]
            );
        }

        #[tokio::test(start_paused = true)]
        async fn shutdown_waits_for_effects_then_refuses_actions() {
            let store = Store::new(Ticks::default(), TickReducer, ());
            store.send(Tick::Start).expect("accepted");
            assert_eq!(store.pending_effects(), 2);

            store
                .shutdown(Duration::from_secs(1))
                .await
                .expect("effects finish");
            assert_eq!(store.pending_effects(), 0);
            assert_eq!(store.send(Tick::Stop), Err(StoreError::ShutdownInProgress));
        }

        #[tokio::test(start_paused = true)]
        async fn shutdown_times_out_with_slow_effects() {
            let store = Store::new(Ticks::default(), TickReducer, ());
            store.send(Tick::Start).expect("accepted");
            let result = store.shutdown(Duration::from_millis(20)).await;
            assert_eq!(result, Err(StoreError::ShutdownTimeout(1)));
        }

        #[tokio::test(start_paused = true)]
        async fn settle_waits_without_refusing_actions() {
            let store = Store::new(Ticks::default(), TickReducer, ());
            store.send(Tick::Start).expect("accepted");
            store.settle(Duration::from_secs(1)).await.expect("effects finish");
            assert_eq!(store.state(|ticks| ticks.0.len()), 3);
            store.send(Tick::Stop).expect("still accepted");
        }

        #[tokio::test]
        async fn waiting_times_out_without_a_match() {
            let store = Store::new(Ticks::default(), TickReducer, ());
            let result = store
                .send_and_wait_for(
                    Tick::Stop,
                    |tick| *tick == Tick::Start,
                    Duration::from_millis(5),
                )
                .await;
            assert_eq!(result, Err(StoreError::Timeout));
        }
    }
}
