//! Async request orchestration
//!
//! [`ApiRequest`] wraps one asynchronous call and turns its lifecycle into
//! dispatched actions:
//!
//! 1. `should_fetch` may veto the call before anything happens.
//! 2. The start notification (`on_request`) is deferred. Requests that
//!    finish within the defer delay never announce themselves, so fast
//!    calls do not flash a loading indicator.
//! 3. Once the start notification has fired, completion is held back until
//!    the indicator has been visible for [`MIN_VISIBLE`].
//! 4. `on_success` or `on_error` run with the result, followed by
//!    `on_request_end`.
//!
//! Handlers return `Option<ActionRecord>`; only well-formed records are
//! dispatched.
//!
//! # Example
//!
//! ```
//! use composable_crud_core::crud_for;
//! use composable_crud_runtime::dispatch::{dispatch_fn, state_fn};
//! use composable_crud_runtime::request::{ApiRequest, RequestOutcome};
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), String> {
//! let cows = crud_for("cows").map_err(|e| e.to_string())?;
//! let creators = cows.action_creators.clone();
//!
//! let request = ApiRequest::new(|_dispatch, _get_state| async {
//!     Ok::<_, String>(json!([{ "id": 1, "name": "Berta" }]))
//! })
//! .on_request({
//!     let creators = creators.clone();
//!     move || Some(creators.fetch_list_start())
//! })
//! .on_success(move |cows| Some(creators.fetch_list_success(cows.clone())));
//!
//! let outcome = request
//!     .run(dispatch_fn(|_action| {}), state_fn(|| ()))
//!     .await?;
//! assert!(matches!(outcome, RequestOutcome::Completed(_)));
//! # Ok(())
//! # }
//! ```

use crate::dispatch::{Dispatcher, GetState, dispatch_if_dispatchable};
use crate::metrics::RequestMetrics;
use composable_crud_core::action::ActionRecord;
use composable_crud_core::effect::Effect;
use futures::future::BoxFuture;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// How long a request may run before the start notification fires
pub const DEFAULT_DEFER_DELAY: Duration = Duration::from_millis(150);

/// Minimum time a fired start notification stays in effect
pub const MIN_VISIBLE: Duration = Duration::from_millis(200);

/// Where requests run
///
/// Loading indicators only matter when something renders them. A
/// `Headless` surface never holds back completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Surface {
    /// Something renders the loading state
    #[default]
    Interactive,
    /// Nothing renders the loading state
    Headless,
}

/// Timestamps shared between a request and its deferred start task
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Timing {
    /// When the start notification fired, if it did
    pub on_request_called_at: Option<Instant>,
    /// When the request function completed
    pub request_finished_at: Option<Instant>,
}

/// How long to hold back completion so a fired indicator stays visible
/// for at least [`MIN_VISIBLE`].
///
/// Zero when the start notification never fired, when it has already been
/// visible long enough, or on a headless surface.
///
/// # Example
///
/// ```
/// use composable_crud_runtime::request::{Surface, Timing, get_delay};
/// use std::time::Duration;
/// use tokio::time::Instant;
///
/// let called = Instant::now();
/// let timing = Timing {
///     on_request_called_at: Some(called),
///     request_finished_at: Some(called + Duration::from_millis(50)),
/// };
/// assert_eq!(get_delay(&timing, Surface::Interactive), Duration::from_millis(150));
/// assert_eq!(get_delay(&timing, Surface::Headless), Duration::ZERO);
/// ```
#[must_use]
pub fn get_delay(timing: &Timing, surface: Surface) -> Duration {
    let Some(called_at) = timing.on_request_called_at else {
        return Duration::ZERO;
    };
    if surface == Surface::Headless {
        return Duration::ZERO;
    }
    let visible = timing
        .request_finished_at
        .map_or(Duration::ZERO, |finished| {
            finished.saturating_duration_since(called_at)
        });
    MIN_VISIBLE.saturating_sub(visible)
}

/// Result of [`ApiRequest::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome<T> {
    /// `should_fetch` refused the request
    Skipped,
    /// The request resolved with a value
    Completed(T),
    /// The request failed and the error was swallowed
    Failed,
}

impl<T> RequestOutcome<T> {
    /// The resolved value, if any
    #[must_use]
    pub fn into_value(self) -> Option<T> {
        match self {
            Self::Completed(value) => Some(value),
            Self::Skipped | Self::Failed => None,
        }
    }

    /// Whether the request was refused by `should_fetch`
    #[must_use]
    pub const fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

type RequestFn<S, T, E> =
    Arc<dyn Fn(Dispatcher, GetState<S>) -> BoxFuture<'static, Result<T, E>> + Send + Sync>;
type NotifyFn = Arc<dyn Fn() -> Option<ActionRecord> + Send + Sync>;
type ResultFn<V> = Arc<dyn Fn(&V) -> Option<ActionRecord> + Send + Sync>;

enum ShouldFetch<S> {
    Always,
    Never,
    When(Arc<dyn Fn(&S) -> bool + Send + Sync>),
}

impl<S> ShouldFetch<S> {
    fn allows(&self, get_state: &GetState<S>) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::When(predicate) => predicate(&get_state()),
        }
    }
}

impl<S> Clone for ShouldFetch<S> {
    fn clone(&self) -> Self {
        match self {
            Self::Always => Self::Always,
            Self::Never => Self::Never,
            Self::When(predicate) => Self::When(Arc::clone(predicate)),
        }
    }
}

/// One orchestrated asynchronous request
///
/// `S` is the application state visible through [`GetState`], `T` the
/// resolved value and `E` the error of the request function.
pub struct ApiRequest<S, T, E> {
    request: RequestFn<S, T, E>,
    should_fetch: ShouldFetch<S>,
    defer_delay: Duration,
    on_request: Option<NotifyFn>,
    on_request_end: Option<NotifyFn>,
    on_success: Option<ResultFn<T>>,
    on_error: Option<ResultFn<E>>,
    throw_on_error: bool,
    surface: Surface,
}

impl<S, T, E> Clone for ApiRequest<S, T, E> {
    fn clone(&self) -> Self {
        Self {
            request: Arc::clone(&self.request),
            should_fetch: self.should_fetch.clone(),
            defer_delay: self.defer_delay,
            on_request: self.on_request.clone(),
            on_request_end: self.on_request_end.clone(),
            on_success: self.on_success.clone(),
            on_error: self.on_error.clone(),
            throw_on_error: self.throw_on_error,
            surface: self.surface,
        }
    }
}

impl<S, T, E> std::fmt::Debug for ApiRequest<S, T, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiRequest")
            .field("defer_delay", &self.defer_delay)
            .field("on_request", &self.on_request.is_some())
            .field("on_request_end", &self.on_request_end.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .field("throw_on_error", &self.throw_on_error)
            .field("surface", &self.surface)
            .finish_non_exhaustive()
    }
}

impl<S, T, E> ApiRequest<S, T, E>
where
    S: 'static,
    T: Send + 'static,
    E: Send + 'static,
{
    /// Wrap an async request function.
    ///
    /// The function receives the dispatcher and state accessor so it can
    /// dispatch intermediate actions of its own.
    pub fn new<F, Fut>(request: F) -> Self
    where
        F: Fn(Dispatcher, GetState<S>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
    {
        Self {
            request: Arc::new(
                move |dispatch, get_state| -> BoxFuture<'static, Result<T, E>> {
                    Box::pin(request(dispatch, get_state))
                },
            ),
            should_fetch: ShouldFetch::Always,
            defer_delay: DEFAULT_DEFER_DELAY,
            on_request: None,
            on_request_end: None,
            on_success: None,
            on_error: None,
            throw_on_error: false,
            surface: Surface::default(),
        }
    }

    /// Allow or refuse the request unconditionally.
    #[must_use]
    pub fn should_fetch(mut self, should_fetch: bool) -> Self {
        self.should_fetch = if should_fetch {
            ShouldFetch::Always
        } else {
            ShouldFetch::Never
        };
        self
    }

    /// Decide per call from the current state.
    #[must_use]
    pub fn should_fetch_with<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&S) -> bool + Send + Sync + 'static,
    {
        self.should_fetch = ShouldFetch::When(Arc::new(predicate));
        self
    }

    /// Override how long the start notification is deferred.
    #[must_use]
    pub const fn defer_delay(mut self, delay: Duration) -> Self {
        self.defer_delay = delay;
        self
    }

    /// Action announcing that the request is in flight.
    #[must_use]
    pub fn on_request<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> Option<ActionRecord> + Send + Sync + 'static,
    {
        self.on_request = Some(Arc::new(handler));
        self
    }

    /// Action announcing that the request is over, whatever its result.
    #[must_use]
    pub fn on_request_end<F>(mut self, handler: F) -> Self
    where
        F: Fn() -> Option<ActionRecord> + Send + Sync + 'static,
    {
        self.on_request_end = Some(Arc::new(handler));
        self
    }

    /// Action built from the resolved value.
    #[must_use]
    pub fn on_success<F>(mut self, handler: F) -> Self
    where
        F: Fn(&T) -> Option<ActionRecord> + Send + Sync + 'static,
    {
        self.on_success = Some(Arc::new(handler));
        self
    }

    /// Action built from the error.
    #[must_use]
    pub fn on_error<F>(mut self, handler: F) -> Self
    where
        F: Fn(&E) -> Option<ActionRecord> + Send + Sync + 'static,
    {
        self.on_error = Some(Arc::new(handler));
        self
    }

    /// Return request errors to the caller instead of swallowing them.
    #[must_use]
    pub const fn throw_on_error(mut self, throw_on_error: bool) -> Self {
        self.throw_on_error = throw_on_error;
        self
    }

    /// Set the surface the request runs on.
    #[must_use]
    pub const fn surface(mut self, surface: Surface) -> Self {
        self.surface = surface;
        self
    }

    /// Run the request.
    ///
    /// On success the call waits out the hide-delay, dispatches
    /// `on_success` then `on_request_end`, and resolves with
    /// [`RequestOutcome::Completed`]. On failure `on_error` is dispatched at
    /// once and `on_request_end` follows from a detached task after the
    /// hide-delay.
    ///
    /// Must be called within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the request error when `throw_on_error` is set; otherwise
    /// failures resolve to [`RequestOutcome::Failed`].
    #[tracing::instrument(skip_all, name = "api_request")]
    pub async fn run(
        &self,
        dispatcher: Dispatcher,
        get_state: GetState<S>,
    ) -> Result<RequestOutcome<T>, E> {
        if !self.should_fetch.allows(&get_state) {
            tracing::debug!("Request skipped by should_fetch");
            RequestMetrics::record_skip();
            return Ok(RequestOutcome::Skipped);
        }

        RequestMetrics::record_start();
        let started = Instant::now();
        let timing = Arc::new(Mutex::new(Timing::default()));
        let start_task = self.spawn_start_notification(&timing, &dispatcher);

        let result = (self.request)(Arc::clone(&dispatcher), get_state).await;

        let timing = {
            let mut timing = lock(&timing);
            timing.request_finished_at = Some(Instant::now());
            *timing
        };
        RequestMetrics::record_finish(started.elapsed(), result.is_err());

        let delay = get_delay(&timing, self.surface);
        let hide_at = Instant::now() + delay;
        let announced = timing.on_request_called_at.is_some();
        // A claimed start task may still be dispatching; it must land first
        let start_task = start_task.and_then(|task| {
            if announced {
                Some(task)
            } else {
                task.abort();
                None
            }
        });

        match result {
            Ok(value) => {
                tracing::debug!(
                    announced,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Request succeeded"
                );
                if !delay.is_zero() {
                    tokio::time::sleep_until(hide_at).await;
                }
                join_start_notification(start_task).await;
                if let Some(on_success) = &self.on_success {
                    let action = invoke("on_success", || on_success(&value));
                    dispatch_if_dispatchable(dispatcher.as_ref(), action, "on_success").await;
                }
                if let Some(on_request_end) = &self.on_request_end {
                    let action = invoke("on_request_end", || on_request_end());
                    dispatch_if_dispatchable(dispatcher.as_ref(), action, "on_request_end")
                        .await;
                }
                Ok(RequestOutcome::Completed(value))
            },
            Err(error) => {
                tracing::debug!(
                    announced,
                    throw_on_error = self.throw_on_error,
                    "Request failed"
                );
                join_start_notification(start_task).await;
                if let Some(on_error) = &self.on_error {
                    let action = invoke("on_error", || on_error(&error));
                    dispatch_if_dispatchable(dispatcher.as_ref(), action, "on_error").await;
                }
                self.spawn_end_notification(&dispatcher, hide_at);
                if self.throw_on_error {
                    Err(error)
                } else {
                    Ok(RequestOutcome::Failed)
                }
            },
        }
    }

    /// This request as a store effect
    ///
    /// The effect runs the request to completion and feeds nothing back;
    /// the request dispatches its own lifecycle actions. A thrown error has
    /// no caller to reach and is logged instead.
    #[must_use]
    pub fn into_effect(
        self,
        dispatcher: Dispatcher,
        get_state: GetState<S>,
    ) -> Effect<ActionRecord> {
        Effect::future(async move {
            if self.run(dispatcher, get_state).await.is_err() {
                tracing::warn!("Spawned request failed, error dropped");
            }
            None
        })
    }

    /// Schedule `on_request` after the defer delay.
    ///
    /// The task claims the timing record before dispatching. A request that
    /// finished first leaves the record claimed by nobody and the task
    /// exits without notifying. Once claimed, [`run`](Self::run) joins the
    /// task before dispatching anything else, so `on_request` always lands
    /// first.
    fn spawn_start_notification(
        &self,
        timing: &Arc<Mutex<Timing>>,
        dispatcher: &Dispatcher,
    ) -> Option<JoinHandle<()>> {
        let on_request = Arc::clone(self.on_request.as_ref()?);
        let timing = Arc::clone(timing);
        let dispatcher = Arc::clone(dispatcher);
        let defer_delay = self.defer_delay;

        Some(tokio::spawn(async move {
            tokio::time::sleep(defer_delay).await;
            {
                let mut timing = lock(&timing);
                if timing.request_finished_at.is_some() {
                    return;
                }
                timing.on_request_called_at = Some(Instant::now());
            }
            tracing::debug!("Request still pending, announcing it");
            let action = invoke("on_request", || on_request());
            dispatch_if_dispatchable(dispatcher.as_ref(), action, "on_request").await;
        }))
    }

    /// Dispatch `on_request_end` from a detached task at `hide_at`.
    fn spawn_end_notification(&self, dispatcher: &Dispatcher, hide_at: Instant) {
        let Some(on_request_end) = self.on_request_end.as_ref().map(Arc::clone) else {
            return;
        };
        let dispatcher = Arc::clone(dispatcher);

        tokio::spawn(async move {
            tokio::time::sleep_until(hide_at).await;
            let action = invoke("on_request_end", || on_request_end());
            dispatch_if_dispatchable(dispatcher.as_ref(), action, "on_request_end").await;
        });
    }
}

/// Wait for a start notification that claimed the timing record.
async fn join_start_notification(start_task: Option<JoinHandle<()>>) {
    let Some(task) = start_task else {
        return;
    };
    if let Err(error) = task.await {
        tracing::error!(%error, "Start notification task failed");
    }
}

/// Run a handler, treating a panic as "nothing to dispatch".
fn invoke<F>(handler: &'static str, f: F) -> Option<ActionRecord>
where
    F: FnOnce() -> Option<ActionRecord>,
{
    catch_unwind(AssertUnwindSafe(f)).unwrap_or_else(|_| {
        tracing::error!(handler, "Handler panicked, nothing dispatched");
        RequestMetrics::record_handler_panic(handler);
        None
    })
}

fn lock(timing: &Mutex<Timing>) -> MutexGuard<'_, Timing> {
    timing.lock().unwrap_or_else(PoisonError::into_inner)
}
