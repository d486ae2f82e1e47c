//! Cow herd demo
//!
//! An in-memory cow API with artificial latency, and the requests that keep
//! a map-mode `cows` collection in sync with it.

use composable_crud_core::{
    ActionCreators, CollectionState, Crud, CrudConfig, CrudError, Operation, crud_for_with,
};
use composable_crud_runtime::ApiRequest;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;

/// Entity configuration shipped with the demo
pub const CONFIG: &str = include_str!("../cows.toml");

/// Build the cows triplet from [`CONFIG`]
///
/// # Errors
///
/// Returns the parse or validation error of the bundled configuration
pub fn cows_crud() -> Result<Crud, CrudError> {
    crud_for_with("cows", CrudConfig::from_toml_str(CONFIG)?)
}

/// Errors returned by [`CowApi`]
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ApiError {
    /// No cow with this id
    #[error("cow {0} not found")]
    NotFound(u64),
}

impl ApiError {
    /// Failure payload stored in the collection's `error`
    #[must_use]
    pub fn to_payload(&self) -> Value {
        json!({ "message": self.to_string() })
    }
}

#[derive(Debug)]
struct Herd {
    next_id: u64,
    cows: Vec<Value>,
}

/// In-memory cow backend
#[derive(Debug)]
pub struct CowApi {
    herd: Mutex<Herd>,
    latency: Duration,
}

impl CowApi {
    /// A backend holding `cows`, answering after `latency`
    ///
    /// New ids continue after the largest numeric id in `cows`.
    #[must_use]
    pub fn new(cows: Vec<Value>, latency: Duration) -> Arc<Self> {
        let next_id = cows
            .iter()
            .filter_map(|cow| cow.get("id").and_then(Value::as_u64))
            .max()
            .map_or(1, |id| id + 1);
        Arc::new(Self {
            herd: Mutex::new(Herd { next_id, cows }),
            latency,
        })
    }

    /// Every cow
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other calls.
    pub async fn list(&self) -> Result<Value, ApiError> {
        tokio::time::sleep(self.latency).await;
        Ok(Value::Array(self.herd.lock().await.cows.clone()))
    }

    /// Add a cow and return it with its new id
    ///
    /// # Errors
    ///
    /// Never fails; the signature matches the other calls.
    pub async fn create(&self, name: &str) -> Result<Value, ApiError> {
        tokio::time::sleep(self.latency).await;
        let mut herd = self.herd.lock().await;
        let cow = json!({ "id": herd.next_id, "name": name });
        herd.next_id += 1;
        herd.cows.push(cow.clone());
        Ok(cow)
    }

    /// Rename a cow and return it
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown ids.
    pub async fn rename(&self, id: u64, name: &str) -> Result<Value, ApiError> {
        tokio::time::sleep(self.latency).await;
        let mut herd = self.herd.lock().await;
        let cow = herd
            .cows
            .iter_mut()
            .find(|cow| cow.get("id").and_then(Value::as_u64) == Some(id))
            .ok_or_else(|| {
                tracing::warn!(id, "Rename of unknown cow");
                ApiError::NotFound(id)
            })?;
        if let Some(fields) = cow.as_object_mut() {
            fields.insert("name".to_string(), json!(name));
        }
        Ok(cow.clone())
    }

    /// Remove a cow and return its id
    ///
    /// # Errors
    ///
    /// Returns [`ApiError::NotFound`] for unknown ids.
    pub async fn remove(&self, id: u64) -> Result<Value, ApiError> {
        tokio::time::sleep(self.latency).await;
        let mut herd = self.herd.lock().await;
        let before = herd.cows.len();
        herd.cows
            .retain(|cow| cow.get("id").and_then(Value::as_u64) != Some(id));
        if herd.cows.len() == before {
            tracing::warn!(id, "Removal of unknown cow");
            return Err(ApiError::NotFound(id));
        }
        Ok(json!(id))
    }
}

/// Request type used against the cows collection
pub type CowRequest = ApiRequest<CollectionState, Value, ApiError>;

fn with_lifecycle(
    request: CowRequest,
    creators: &ActionCreators,
    operation: Operation,
) -> CowRequest {
    let on_request = creators.clone();
    let on_success = creators.clone();
    let on_error = creators.clone();
    request
        .on_request(move || Some(on_request.start(operation)))
        .on_success(move |value| Some(on_success.success(operation, value.clone())))
        .on_error(move |error| Some(on_error.failure(operation, error.to_payload())))
}

/// Load the whole herd, unless a load is already running
#[must_use]
pub fn fetch_herd(crud: &Crud, api: &Arc<CowApi>) -> CowRequest {
    let api = Arc::clone(api);
    let request = ApiRequest::new(move |_dispatch, _get_state| {
        let api = Arc::clone(&api);
        async move { api.list().await }
    });
    with_lifecycle(request, &crud.action_creators, Operation::FetchList)
        .should_fetch_with(|cows: &CollectionState| !cows.is_fetching)
}

/// Add a cow called `name`
#[must_use]
pub fn create_cow(crud: &Crud, api: &Arc<CowApi>, name: &str) -> CowRequest {
    let api = Arc::clone(api);
    let name = name.to_string();
    let request = ApiRequest::new(move |_dispatch, _get_state| {
        let api = Arc::clone(&api);
        let name = name.clone();
        async move { api.create(&name).await }
    });
    with_lifecycle(request, &crud.action_creators, Operation::Create)
}

/// Rename cow `id`
#[must_use]
pub fn rename_cow(crud: &Crud, api: &Arc<CowApi>, id: u64, name: &str) -> CowRequest {
    let api = Arc::clone(api);
    let name = name.to_string();
    let request = ApiRequest::new(move |_dispatch, _get_state| {
        let api = Arc::clone(&api);
        let name = name.clone();
        async move { api.rename(id, &name).await }
    });
    with_lifecycle(request, &crud.action_creators, Operation::Update)
}

/// Remove cow `id`
#[must_use]
pub fn delete_cow(crud: &Crud, api: &Arc<CowApi>, id: u64) -> CowRequest {
    let api = Arc::clone(api);
    let request = ApiRequest::new(move |_dispatch, _get_state| {
        let api = Arc::clone(&api);
        async move { api.remove(id).await }
    });
    with_lifecycle(request, &crud.action_creators, Operation::Delete)
}
