//! Timing and dispatch behavior of `ApiRequest`.
//!
//! All tests run on a paused clock, so elapsed times are exact.

#![allow(clippy::expect_used, clippy::panic)]

use composable_crud_core::{ActionCreators, ActionRecord, crud_for};
use composable_crud_runtime::dispatch::state_fn;
use composable_crud_runtime::{ApiRequest, Dispatch, Dispatcher, RequestOutcome, Surface};
use composable_crud_testing::RecordingDispatcher;
use composable_crud_testing::helpers::{init_test_tracing, respond_after};
use futures::future::BoxFuture;
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::time::Instant;

const START: &str = "cows/fetch-list/start";
const SUCCESS: &str = "cows/fetch-list/success";
const FAILURE: &str = "cows/fetch-list/failure";
const END: &str = "ui/request/end";

fn creators() -> ActionCreators {
    crud_for("cows").expect("valid entity").action_creators
}

fn ms(millis: u64) -> Duration {
    Duration::from_millis(millis)
}

/// Wire every lifecycle handler to the cows fetch-list actions.
fn with_lifecycle(request: ApiRequest<(), Value, String>) -> ApiRequest<(), Value, String> {
    let creators = creators();
    let on_request = creators.clone();
    let on_error = creators.clone();
    request
        .on_request(move || Some(on_request.fetch_list_start()))
        .on_success(move |cows| Some(creators.fetch_list_success(cows.clone())))
        .on_error(move |error| Some(on_error.fetch_list_failure(error.clone())))
        .on_request_end(|| Some(ActionRecord::new(END)))
}

fn succeeding_after(delay: Duration) -> ApiRequest<(), Value, String> {
    with_lifecycle(ApiRequest::new(move |_dispatch, _get_state| {
        respond_after(delay, Ok(json!([{ "id": 1 }])))
    }))
}

fn failing_after(delay: Duration) -> ApiRequest<(), Value, String> {
    with_lifecycle(ApiRequest::new(move |_dispatch, _get_state| {
        respond_after(delay, Err("Network down".to_string()))
    }))
}

/// Sink that takes 30ms to accept start actions.
struct SlowStartSink {
    recorder: Arc<RecordingDispatcher>,
}

impl Dispatch for SlowStartSink {
    fn dispatch(&self, action: ActionRecord) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            if action.action_type.ends_with("/start") {
                tokio::time::sleep(ms(30)).await;
            }
            self.recorder.dispatch(action).await;
        })
    }
}

fn slow_start_sink(recorder: &Arc<RecordingDispatcher>) -> Dispatcher {
    Arc::new(SlowStartSink {
        recorder: Arc::clone(recorder),
    })
}

#[tokio::test(start_paused = true)]
async fn fast_request_never_announces_itself() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    let outcome = succeeding_after(ms(100))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    assert_eq!(outcome, RequestOutcome::Completed(json!([{ "id": 1 }])));
    assert_eq!(started.elapsed(), ms(100));
    assert_eq!(recorder.action_types(), vec![SUCCESS, END]);

    // The deferred start was cancelled, not merely late
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert_eq!(recorder.action_types(), vec![SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn slow_request_announces_and_stays_visible() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    succeeding_after(ms(300))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    // Start fired at 150ms, request done at 300ms: 150ms visible, 50ms to go
    assert_eq!(started.elapsed(), ms(350));
    assert_eq!(recorder.action_types(), vec![START, SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn completion_just_after_start_waits_full_minimum() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    succeeding_after(ms(160))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    assert_eq!(started.elapsed(), ms(350));
    assert_eq!(recorder.action_types(), vec![START, SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn long_request_completes_without_extra_delay() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    succeeding_after(ms(1000))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    assert_eq!(started.elapsed(), ms(1000));
    assert_eq!(recorder.action_types(), vec![START, SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn headless_surface_never_holds_back_completion() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    succeeding_after(ms(160))
        .surface(Surface::Headless)
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    assert_eq!(started.elapsed(), ms(160));
    assert_eq!(recorder.action_types(), vec![START, SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn slow_start_dispatch_still_lands_before_success() {
    init_test_tracing();
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    succeeding_after(ms(160))
        .surface(Surface::Headless)
        .run(slow_start_sink(&recorder), state_fn(|| ()))
        .await
        .expect("succeeds");

    // Start claimed at 150ms and accepted at 180ms
    assert_eq!(started.elapsed(), ms(180));
    assert_eq!(recorder.action_types(), vec![START, SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn slow_start_dispatch_still_lands_before_failure() {
    init_test_tracing();
    // The end notification keeps its deadline despite the slow start
    for (surface, ended_at) in [(Surface::Headless, 180), (Surface::Interactive, 350)] {
        let recorder = RecordingDispatcher::new();
        let started = Instant::now();

        let outcome = failing_after(ms(160))
            .surface(surface)
            .run(slow_start_sink(&recorder), state_fn(|| ()))
            .await
            .expect("errors are swallowed");

        assert_eq!(outcome, RequestOutcome::Failed);
        assert_eq!(started.elapsed(), ms(180));
        assert_eq!(recorder.action_types(), vec![START, FAILURE]);

        assert!(recorder.wait_for(3, Duration::from_secs(1)).await);
        assert_eq!(started.elapsed(), ms(ended_at));
        assert_eq!(recorder.action_types(), vec![START, FAILURE, END]);
    }
}

#[tokio::test(start_paused = true)]
async fn custom_defer_delay_moves_the_start() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    succeeding_after(ms(100))
        .defer_delay(ms(10))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    // Start at 10ms, 90ms visible when done, 110ms to go
    assert_eq!(started.elapsed(), ms(210));
    assert_eq!(recorder.action_types(), vec![START, SUCCESS, END]);
}

#[tokio::test(start_paused = true)]
async fn skipped_request_invokes_nothing() {
    let recorder = RecordingDispatcher::new();
    let called = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&called);

    let request = with_lifecycle(ApiRequest::new(move |_dispatch, _get_state| {
        flag.store(true, Ordering::SeqCst);
        respond_after(ms(10), Ok(json!([])))
    }))
    .should_fetch(false);

    let outcome = request
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("skipping is not an error");

    assert!(outcome.is_skipped());
    tokio::time::sleep(Duration::from_secs(1)).await;
    assert!(!called.load(Ordering::SeqCst));
    assert!(recorder.is_empty());
}

#[tokio::test(start_paused = true)]
async fn should_fetch_reads_current_state() {
    let recorder = RecordingDispatcher::new();
    let request = ApiRequest::new(|_dispatch, _get_state| async { Ok::<_, String>(1) })
        .should_fetch_with(|loaded: &bool| !*loaded);

    let skipped = request
        .run(recorder.dispatcher(), state_fn(|| true))
        .await
        .expect("skipped");
    let fetched = request
        .run(recorder.dispatcher(), state_fn(|| false))
        .await
        .expect("fetched");

    assert_eq!(skipped, RequestOutcome::Skipped);
    assert_eq!(fetched, RequestOutcome::Completed(1));
}

#[tokio::test(start_paused = true)]
async fn swallowed_error_dispatches_failure_then_end_after_delay() {
    let recorder = RecordingDispatcher::new();
    let started = Instant::now();

    let outcome = failing_after(ms(300))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("errors are swallowed");

    assert_eq!(outcome, RequestOutcome::Failed);
    assert_eq!(started.elapsed(), ms(300));
    assert_eq!(recorder.action_types(), vec![START, FAILURE]);

    let actions = recorder.actions();
    let failure = &actions[1];
    assert!(failure.error);
    assert_eq!(failure.payload, Some(json!("Network down")));

    assert!(recorder.wait_for(3, Duration::from_secs(1)).await);
    assert_eq!(started.elapsed(), ms(350));
    assert_eq!(recorder.action_types(), vec![START, FAILURE, END]);
}

#[tokio::test(start_paused = true)]
async fn thrown_error_reaches_the_caller() {
    let recorder = RecordingDispatcher::new();

    let result = failing_after(ms(20))
        .throw_on_error(true)
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await;

    assert_eq!(result, Err("Network down".to_string()));
    assert_eq!(recorder.action_types(), vec![FAILURE]);
    assert!(recorder.wait_for(2, Duration::from_secs(1)).await);
    assert_eq!(recorder.action_types(), vec![FAILURE, END]);
}

#[tokio::test(start_paused = true)]
async fn panicking_handler_is_isolated() {
    init_test_tracing();
    let recorder = RecordingDispatcher::new();

    let outcome = ApiRequest::new(|_dispatch, _get_state| async { Ok::<_, String>(json!(1)) })
        .on_success(|_value| panic!("success handler bug"))
        .on_request_end(|| Some(ActionRecord::new(END)))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("request itself succeeded");

    assert_eq!(outcome, RequestOutcome::Completed(json!(1)));
    assert_eq!(recorder.action_types(), vec![END]);
}

#[tokio::test(start_paused = true)]
async fn malformed_and_missing_actions_are_discarded() {
    init_test_tracing();
    let recorder = RecordingDispatcher::new();

    ApiRequest::new(|_dispatch, _get_state| respond_after(ms(400), Ok::<_, String>(())))
        .on_request(|| None)
        .on_success(|_unit| Some(ActionRecord::new("")))
        .on_request_end(|| Some(ActionRecord::new(END)))
        .run(recorder.dispatcher(), state_fn(|| ()))
        .await
        .expect("succeeds");

    assert_eq!(recorder.action_types(), vec![END]);
}

#[tokio::test(start_paused = true)]
async fn request_function_can_dispatch_and_read_state() {
    let recorder = RecordingDispatcher::new();

    let outcome = ApiRequest::new(|dispatch, get_state| async move {
        let page: u32 = get_state();
        dispatch
            .dispatch(ActionRecord::new(format!("cows/page/{page}")))
            .await;
        Ok::<_, String>(page * 10)
    })
    .run(recorder.dispatcher(), state_fn(|| 3))
    .await
    .expect("succeeds");

    assert_eq!(outcome.into_value(), Some(30));
    assert_eq!(recorder.action_types(), vec!["cows/page/3"]);
}
