//! Dispatch sinks and state accessors handed to requests.

use composable_crud_core::action::{ActionRecord, is_dispatchable};
use futures::future::BoxFuture;
use std::sync::Arc;

/// Anything that accepts action records
///
/// A [`Store`](crate::store::Store) over [`ActionRecord`] is the usual
/// implementation; tests record into a vector.
pub trait Dispatch: Send + Sync {
    /// Deliver one action.
    fn dispatch(&self, action: ActionRecord) -> BoxFuture<'_, ()>;
}

/// Shared dispatch sink
pub type Dispatcher = Arc<dyn Dispatch>;

/// Shared accessor for the current application state
pub type GetState<S> = Arc<dyn Fn() -> S + Send + Sync>;

/// Adapter that turns a synchronous closure into a [`Dispatch`].
pub struct FnDispatcher<F> {
    f: F,
}

impl<F> Dispatch for FnDispatcher<F>
where
    F: Fn(ActionRecord) + Send + Sync,
{
    fn dispatch(&self, action: ActionRecord) -> BoxFuture<'_, ()> {
        (self.f)(action);
        Box::pin(std::future::ready(()))
    }
}

/// Wrap a closure as a [`Dispatcher`].
///
/// # Example
///
/// ```
/// use composable_crud_runtime::dispatch::dispatch_fn;
/// use std::sync::{Arc, Mutex};
///
/// let seen = Arc::new(Mutex::new(Vec::new()));
/// let sink = Arc::clone(&seen);
/// let dispatcher = dispatch_fn(move |action| {
///     if let Ok(mut seen) = sink.lock() {
///         seen.push(action.action_type);
///     }
/// });
/// # let _ = dispatcher;
/// ```
pub fn dispatch_fn<F>(f: F) -> Dispatcher
where
    F: Fn(ActionRecord) + Send + Sync + 'static,
{
    Arc::new(FnDispatcher { f })
}

/// Wrap a closure as a [`GetState`].
pub fn state_fn<S, F>(f: F) -> GetState<S>
where
    F: Fn() -> S + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Dispatch `action` only if it is a well-formed action record.
pub(crate) async fn dispatch_if_dispatchable(
    dispatcher: &dyn Dispatch,
    action: Option<ActionRecord>,
    handler: &'static str,
) {
    match action {
        Some(action) if is_dispatchable(Some(&action)) => dispatcher.dispatch(action).await,
        Some(_) => tracing::trace!(handler, "Discarded action without a type"),
        None => {}
    }
}

#[cfg(test)]
#[allow(clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Dispatcher, Arc<Mutex<Vec<String>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let dispatcher = dispatch_fn(move |action| {
            sink.lock().expect("lock").push(action.action_type);
        });
        (dispatcher, seen)
    }

    #[test]
    fn dispatches_typed_actions() {
        let (dispatcher, seen) = recorder();
        tokio_test::block_on(dispatch_if_dispatchable(
            dispatcher.as_ref(),
            Some(ActionRecord::new("cows/create/start")),
            "on_request",
        ));
        assert_eq!(*seen.lock().expect("lock"), vec!["cows/create/start"]);
    }

    #[tokio::test]
    async fn discards_untyped_and_missing_actions() {
        let (dispatcher, seen) = recorder();
        dispatch_if_dispatchable(dispatcher.as_ref(), Some(ActionRecord::new("")), "on_success")
            .await;
        dispatch_if_dispatchable(dispatcher.as_ref(), None, "on_error").await;
        assert!(seen.lock().expect("lock").is_empty());
    }

    #[test]
    fn state_fn_reads_current_value() {
        let value = Arc::new(Mutex::new(1));
        let read = Arc::clone(&value);
        let get_state = state_fn(move || *read.lock().expect("lock"));
        *value.lock().expect("lock") = 7;
        assert_eq!(get_state(), 7);
    }
}
