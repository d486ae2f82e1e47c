//! The entity reducer
//!
//! Folds an entity's actions into a [`CollectionState`]. The global error
//! short-circuit runs first: any action flagged `error` stores its payload in
//! `error` and clears every activity flag, whatever its type. Otherwise the
//! action type is resolved through the entity's [`ActionTypes`]:
//!
//! | Action | Flags | Items |
//! |---|---|---|
//! | `CREATE_START` | `is_creating`, error cleared | - |
//! | `CREATE_SUCCESS` | `is_creating` off, error cleared | append / insert |
//! | `CREATE_FAILURE` | error = `true` | - |
//! | `UPDATE_START` | `is_updating`, error cleared | - |
//! | `UPDATE_SUCCESS` | `is_updating` off, error cleared | upsert |
//! | `FETCH_*_START` | `is_fetching`, error cleared | - |
//! | `FETCH_LIST_SUCCESS` | `is_fetching` off, error cleared | replace |
//! | `FETCH_ITEM_SUCCESS` | `is_fetching` off, error cleared | upsert |
//! | `DELETE_START` | `is_deleting`, error cleared | - |
//! | `DELETE_SUCCESS` | `is_deleting` off | remove by key |
//!
//! Success transitions also copy `meta.updatedAt` into `updated_at`.
//! Anything else leaves the state untouched.

use indexmap::IndexMap;
use serde_json::Value;
use std::sync::Arc;

use crate::action::{ActionRecord, ActionTypes, Operation, Phase};
use crate::config::{CrudConfig, Mode};
use crate::effect::Effect;
use crate::error::CrudError;
use crate::reducer::Reducer;
use crate::state::{Collection, CollectionState, Item, map_key, same_key};
use crate::SmallVec;

/// Reducer for one entity collection
#[derive(Debug, Clone)]
pub struct EntityReducer {
    types: Arc<ActionTypes>,
    key: String,
    mode: Mode,
    initial_state: CollectionState,
}

impl EntityReducer {
    /// Build a reducer for the entity described by `types` and `config`
    ///
    /// # Errors
    ///
    /// Returns an error if `config` fails [`CrudConfig::validate`]
    pub fn new(types: Arc<ActionTypes>, config: &CrudConfig) -> Result<Self, CrudError> {
        config.validate()?;

        let initial_state = config
            .initial_state
            .apply(CollectionState::empty(config.mode));

        Ok(Self {
            types,
            key: config.key.clone(),
            mode: config.mode,
            initial_state,
        })
    }

    /// The configured initial state
    #[must_use]
    pub fn initial_state(&self) -> CollectionState {
        self.initial_state.clone()
    }

    /// Item field used for identity
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Collection representation
    #[must_use]
    pub const fn mode(&self) -> Mode {
        self.mode
    }

    /// The action types this reducer responds to
    #[must_use]
    pub fn types(&self) -> &ActionTypes {
        &self.types
    }

    /// Pure transition: returns the next state without touching `state`
    ///
    /// A missing state is replaced by the initial state; a missing action
    /// behaves like an unknown action type.
    #[must_use]
    pub fn reduce_snapshot(
        &self,
        state: Option<&CollectionState>,
        action: Option<&ActionRecord>,
    ) -> CollectionState {
        let mut next = state.cloned().unwrap_or_else(|| self.initial_state());
        self.align_representation(&mut next);
        if let Some(action) = action {
            self.apply(&mut next, action);
        }
        next
    }

    /// Apply `action` to `state` in place
    pub fn apply(&self, state: &mut CollectionState, action: &ActionRecord) {
        self.align_representation(state);

        if action.error {
            tracing::trace!(
                entity = %self.types.entity(),
                action_type = %action.action_type,
                "Storing error action"
            );
            state.error.clone_from(&action.payload);
            state.clear_flags();
            return;
        }

        let Some((operation, phase)) = self.types.resolve(&action.action_type) else {
            return;
        };

        tracing::trace!(
            entity = %self.types.entity(),
            %operation,
            %phase,
            "Reducing action"
        );

        match (operation, phase) {
            (Operation::Create, Phase::Start) => {
                state.is_creating = true;
                state.error = None;
            },
            (Operation::Create, Phase::Success) => {
                if let Some(payload) = present(action) {
                    self.append(&mut state.items, payload);
                }
                state.is_creating = false;
                state.error = None;
                state.updated_at = action.updated_at();
            },
            (Operation::Create, Phase::Failure) => {
                state.error = Some(Value::Bool(true));
            },
            (Operation::Update, Phase::Start) => {
                state.is_updating = true;
                state.error = None;
            },
            (Operation::Update, Phase::Success) => {
                if let Some(payload) = present(action) {
                    self.upsert(&mut state.items, payload);
                }
                state.is_updating = false;
                state.error = None;
                state.updated_at = action.updated_at();
            },
            (Operation::FetchList | Operation::FetchItem, Phase::Start) => {
                state.is_fetching = true;
                state.error = None;
            },
            (Operation::FetchList, Phase::Success) => {
                self.replace(&mut state.items, action.payload.as_ref());
                state.is_fetching = false;
                state.error = None;
                state.updated_at = action.updated_at();
            },
            (Operation::FetchItem, Phase::Success) => {
                if let Some(payload) = present(action) {
                    self.upsert(&mut state.items, payload);
                }
                state.is_fetching = false;
                state.error = None;
                state.updated_at = action.updated_at();
            },
            (Operation::Delete, Phase::Start) => {
                state.is_deleting = true;
                state.error = None;
            },
            (Operation::Delete, Phase::Success) => {
                match action.payload.as_ref() {
                    Some(id) => self.remove(&mut state.items, id),
                    None => tracing::warn!(
                        entity = %self.types.entity(),
                        "Delete success without a key payload, items unchanged"
                    ),
                }
                state.is_deleting = false;
                state.updated_at = action.updated_at();
            },
            // Non-create failures only matter through the error flag, and
            // edit has no transitions of its own.
            _ => {},
        }
    }

    fn append(&self, items: &mut Collection, payload: &Value) {
        match (items, payload) {
            (Collection::List(list), Value::Array(values)) => {
                list.extend(values.iter().filter_map(|value| self.as_item(value)).cloned());
            },
            (Collection::List(list), value) => {
                if let Some(item) = self.as_item(value) {
                    list.push(item.clone());
                }
            },
            (Collection::Map(map), value) => {
                if let Some(item) = self.as_item(value) {
                    self.insert_keyed(map, item.clone());
                }
            },
        }
    }

    fn upsert(&self, items: &mut Collection, payload: &Value) {
        let Some(item) = self.as_item(payload) else {
            return;
        };

        match items {
            Collection::List(list) => {
                let id = item.get(&self.key);
                let matches = |existing: &Item| match (existing.get(&self.key), id) {
                    (Some(found), Some(id)) => same_key(found, id),
                    (found, id) => found == id,
                };
                match list.iter().position(matches) {
                    Some(index) => list[index] = item.clone(),
                    None => list.push(item.clone()),
                }
            },
            Collection::Map(map) => self.insert_keyed(map, item.clone()),
        }
    }

    fn replace(&self, items: &mut Collection, payload: Option<&Value>) {
        let replacement = match (self.mode, payload) {
            (Mode::List, Some(Value::Array(values))) => Collection::List(
                values
                    .iter()
                    .filter_map(|value| self.as_item(value))
                    .cloned()
                    .collect(),
            ),
            (Mode::List, Some(Value::Object(keyed))) => Collection::List(
                keyed
                    .values()
                    .filter_map(|value| self.as_item(value))
                    .cloned()
                    .collect(),
            ),
            (Mode::Map, Some(Value::Array(values))) => {
                let mut map = IndexMap::with_capacity(values.len());
                for item in values.iter().filter_map(|value| self.as_item(value)) {
                    self.insert_keyed(&mut map, item.clone());
                }
                Collection::Map(map)
            },
            (Mode::Map, Some(Value::Object(keyed))) => Collection::Map(
                keyed
                    .iter()
                    .filter_map(|(id, value)| {
                        self.as_item(value).map(|item| (id.clone(), item.clone()))
                    })
                    .collect(),
            ),
            (_, other) => {
                tracing::warn!(
                    entity = %self.types.entity(),
                    payload = ?other,
                    "Fetch list payload is neither a sequence nor a mapping, items unchanged"
                );
                return;
            },
        };

        *items = replacement;
    }

    fn remove(&self, items: &mut Collection, id: &Value) {
        match items {
            Collection::List(list) => {
                list.retain(|item| {
                    !item.get(&self.key).is_some_and(|found| same_key(found, id))
                });
            },
            Collection::Map(map) => {
                map.shift_remove(&map_key(id));
            },
        }
    }

    fn insert_keyed(&self, map: &mut IndexMap<String, Item>, item: Item) {
        match item.get(&self.key) {
            Some(id) => {
                map.insert(map_key(id), item);
            },
            None => tracing::warn!(
                entity = %self.types.entity(),
                key = %self.key,
                "Item has no key field, cannot store it in a map collection"
            ),
        }
    }

    fn as_item<'a>(&self, value: &'a Value) -> Option<&'a Item> {
        let item = value.as_object();
        if item.is_none() {
            tracing::warn!(
                entity = %self.types.entity(),
                payload = %value,
                "Ignoring non-object item payload"
            );
        }
        item
    }

    fn align_representation(&self, state: &mut CollectionState) {
        if state.items.mode() == self.mode {
            return;
        }

        tracing::warn!(
            entity = %self.types.entity(),
            expected = %self.mode,
            found = %state.items.mode(),
            "State items in the wrong representation, converting"
        );

        let items = std::mem::replace(&mut state.items, Collection::empty(self.mode));
        match items {
            Collection::List(list) => {
                let mut map = IndexMap::with_capacity(list.len());
                for item in list {
                    self.insert_keyed(&mut map, item);
                }
                state.items = Collection::Map(map);
            },
            Collection::Map(map) => {
                state.items = Collection::List(map.into_values().collect());
            },
        }
    }
}

fn present(action: &ActionRecord) -> Option<&Value> {
    action.payload.as_ref().filter(|payload| !payload.is_null())
}

impl Reducer for EntityReducer {
    type State = CollectionState;
    type Action = ActionRecord;
    type Environment = ();

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        _env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        self.apply(state, &action);
        SmallVec::new()
    }
}
