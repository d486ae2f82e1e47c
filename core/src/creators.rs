//! Action creators
//!
//! Every operation gets three creators following the lower-camel naming
//! convention of the dynamic original: `createStart`, `createSuccess`,
//! `createFailure`, `fetchListStart`, ... In Rust they are methods
//! (`create_start`, `fetch_list_success`, ...) and are also reachable by
//! their convention name through [`ActionCreators::by_name`].

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::action::{ActionMeta, ActionRecord, ActionTypes, Operation, Phase};
use crate::case::to_camel_case;
use crate::environment::{Clock, SystemClock};
use crate::error::CrudError;

/// Builds Flux Standard Actions for one entity
#[derive(Clone)]
pub struct ActionCreators {
    types: Arc<ActionTypes>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for ActionCreators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionCreators")
            .field("entity", &self.types.entity())
            .finish_non_exhaustive()
    }
}

impl ActionCreators {
    /// Creators stamping success actions with the system clock
    #[must_use]
    pub fn new(types: Arc<ActionTypes>) -> Self {
        Self::with_clock(types, Arc::new(SystemClock))
    }

    /// Creators stamping success actions with `clock`
    #[must_use]
    pub fn with_clock(types: Arc<ActionTypes>, clock: Arc<dyn Clock>) -> Self {
        Self { types, clock }
    }

    /// The action types these creators build
    #[must_use]
    pub fn types(&self) -> &ActionTypes {
        &self.types
    }

    /// `{type}` for the start phase
    #[must_use]
    pub fn start(&self, operation: Operation) -> ActionRecord {
        ActionRecord::new(self.types.get(operation, Phase::Start))
    }

    /// `{type, payload, meta: {updatedAt: now}}`
    #[must_use]
    pub fn success(&self, operation: Operation, payload: impl Into<Value>) -> ActionRecord {
        self.success_with_meta(operation, payload, ActionMeta::default())
    }

    /// Like [`success`](Self::success) with caller metadata merged over the
    /// default; a caller-supplied `updated_at` wins over the clock
    #[must_use]
    pub fn success_with_meta(
        &self,
        operation: Operation,
        payload: impl Into<Value>,
        meta: ActionMeta,
    ) -> ActionRecord {
        let meta = ActionMeta {
            updated_at: meta.updated_at.or_else(|| Some(self.clock.now())),
            extra: meta.extra,
        };

        ActionRecord::new(self.types.get(operation, Phase::Success))
            .with_payload(payload.into())
            .with_meta(meta)
    }

    /// `{type, error: true, payload: error}`
    #[must_use]
    pub fn failure(&self, operation: Operation, error: impl Into<Value>) -> ActionRecord {
        ActionRecord::new(self.types.get(operation, Phase::Failure))
            .with_payload(error.into())
            .as_error()
    }

    /// Build an action for an operation and phase
    ///
    /// `payload` is ignored for the start phase; a missing payload becomes
    /// `null` for the other phases.
    #[must_use]
    pub fn build(
        &self,
        operation: Operation,
        phase: Phase,
        payload: Option<Value>,
    ) -> ActionRecord {
        match phase {
            Phase::Start => self.start(operation),
            Phase::Success => self.success(operation, payload.unwrap_or(Value::Null)),
            Phase::Failure => self.failure(operation, payload.unwrap_or(Value::Null)),
        }
    }

    /// Convention names of all eighteen creators, e.g. `fetchListSuccess`
    #[must_use]
    pub fn creator_names() -> Vec<String> {
        Operation::ALL
            .into_iter()
            .flat_map(|operation| {
                Phase::ALL
                    .into_iter()
                    .map(move |phase| creator_name(operation, phase))
            })
            .collect()
    }

    /// Build an action by convention name
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::UnknownCreator`] if `name` is not one of
    /// [`creator_names`](Self::creator_names)
    pub fn by_name(&self, name: &str, payload: Option<Value>) -> Result<ActionRecord, CrudError> {
        Operation::ALL
            .into_iter()
            .flat_map(|operation| Phase::ALL.into_iter().map(move |phase| (operation, phase)))
            .find(|(operation, phase)| creator_name(*operation, *phase) == name)
            .map(|(operation, phase)| self.build(operation, phase, payload))
            .ok_or_else(|| CrudError::UnknownCreator(name.to_string()))
    }
}

fn creator_name(operation: Operation, phase: Phase) -> String {
    to_camel_case(&format!("{}_{}", operation.constant_name(), phase.suffix()))
}

macro_rules! named_creators {
    ($($operation:expr => $start:ident, $success:ident, $failure:ident;)*) => {
        impl ActionCreators {
            $(
                #[doc = concat!("Start action for `", stringify!($operation), "`")]
                #[must_use]
                pub fn $start(&self) -> ActionRecord {
                    self.start($operation)
                }

                #[doc = concat!("Success action for `", stringify!($operation), "`")]
                #[must_use]
                pub fn $success(&self, payload: impl Into<Value>) -> ActionRecord {
                    self.success($operation, payload)
                }

                #[doc = concat!("Failure action for `", stringify!($operation), "`")]
                #[must_use]
                pub fn $failure(&self, error: impl Into<Value>) -> ActionRecord {
                    self.failure($operation, error)
                }
            )*
        }
    };
}

named_creators! {
    Operation::Create => create_start, create_success, create_failure;
    Operation::FetchList => fetch_list_start, fetch_list_success, fetch_list_failure;
    Operation::FetchItem => fetch_item_start, fetch_item_success, fetch_item_failure;
    Operation::Update => update_start, update_success, update_failure;
    Operation::Edit => edit_start, edit_success, edit_failure;
    Operation::Delete => delete_start, delete_success, delete_failure;
}
