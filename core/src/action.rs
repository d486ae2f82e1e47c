//! Flux Standard Action records and the action-type registry.
//!
//! Every entity owns eighteen action types: three [`Phase`]s for each of the
//! six [`Operation`]s. The string form is `{entity}/{label}/{phase}`, for
//! example `examples/create/start`.

use crate::config::ActionLabels;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

/// A logical CRUD operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operation {
    /// POST a new item
    Create,
    /// GET the whole collection
    FetchList,
    /// GET one item
    FetchItem,
    /// PUT an item
    Update,
    /// PATCH an item (types and creators only, the reducer ignores it)
    Edit,
    /// DELETE an item
    Delete,
}

impl Operation {
    /// All operations in registry order
    pub const ALL: [Self; 6] = [
        Self::Create,
        Self::FetchList,
        Self::FetchItem,
        Self::Update,
        Self::Edit,
        Self::Delete,
    ];

    /// Constant-style name, e.g. `FETCH_LIST`
    #[must_use]
    pub const fn constant_name(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::FetchList => "FETCH_LIST",
            Self::FetchItem => "FETCH_ITEM",
            Self::Update => "UPDATE",
            Self::Edit => "EDIT",
            Self::Delete => "DELETE",
        }
    }

    /// Label used in action-type strings unless configured otherwise
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::FetchList => "fetch-list",
            Self::FetchItem => "fetch-item",
            Self::Update => "update",
            Self::Edit => "edit",
            Self::Delete => "delete",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Create => 0,
            Self::FetchList => 1,
            Self::FetchItem => 2,
            Self::Update => 3,
            Self::Edit => 4,
            Self::Delete => 5,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.constant_name())
    }
}

/// Request lifecycle phase of an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Request started
    Start,
    /// Request succeeded
    Success,
    /// Request failed
    Failure,
}

impl Phase {
    /// All phases in registry order
    pub const ALL: [Self; 3] = [Self::Start, Self::Success, Self::Failure];

    /// Constant suffix, e.g. `START`
    #[must_use]
    pub const fn suffix(self) -> &'static str {
        match self {
            Self::Start => "START",
            Self::Success => "SUCCESS",
            Self::Failure => "FAILURE",
        }
    }

    /// Lowercase label used in action-type strings
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Success => "success",
            Self::Failure => "failure",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Start => 0,
            Self::Success => 1,
            Self::Failure => 2,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.suffix())
    }
}

/// Metadata attached to success actions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionMeta {
    /// When the payload was produced
    #[serde(rename = "updatedAt", default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    /// Any other caller-supplied metadata
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ActionMeta {
    /// Metadata carrying only a timestamp
    #[must_use]
    pub fn stamped(at: DateTime<Utc>) -> Self {
        Self {
            updated_at: Some(at),
            extra: Map::new(),
        }
    }
}

/// A Flux Standard Action
///
/// When `error` is set, `payload` holds the error value and the reducer
/// handles the action as an error regardless of its type.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActionRecord {
    /// Action type string
    #[serde(rename = "type")]
    pub action_type: String,

    /// Optional payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Error flag
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub error: bool,

    /// Optional metadata
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<ActionMeta>,
}

impl ActionRecord {
    /// Create an action with only a type
    #[must_use]
    pub fn new(action_type: impl Into<String>) -> Self {
        Self {
            action_type: action_type.into(),
            ..Self::default()
        }
    }

    /// Attach a payload
    #[must_use]
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Attach metadata
    #[must_use]
    pub fn with_meta(mut self, meta: ActionMeta) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Mark the action as an error; the payload becomes the error value
    #[must_use]
    pub const fn as_error(mut self) -> Self {
        self.error = true;
        self
    }

    /// `meta.updatedAt`, if any
    #[must_use]
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.meta.as_ref().and_then(|meta| meta.updated_at)
    }
}

/// Returns true if the value can be forwarded to a dispatch sink
///
/// Only present actions with a non-empty type qualify. Handler results that
/// fail this check are discarded silently.
#[must_use]
pub fn is_dispatchable(action: Option<&ActionRecord>) -> bool {
    action.is_some_and(|action| !action.action_type.is_empty())
}

/// Action-type strings for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionTypes {
    entity: String,
    types: Vec<String>,
    lookup: HashMap<String, (Operation, Phase)>,
}

impl ActionTypes {
    /// Build all action types for `entity` using the configured labels
    #[must_use]
    pub fn new(entity: &str, labels: &ActionLabels) -> Self {
        let mut types = Vec::with_capacity(Operation::ALL.len() * Phase::ALL.len());
        let mut lookup = HashMap::new();

        for operation in Operation::ALL {
            let label = labels.label(operation);
            for phase in Phase::ALL {
                let action_type = format!("{entity}/{label}/{}", phase.label());
                // First operation wins when two share a label
                lookup
                    .entry(action_type.clone())
                    .or_insert((operation, phase));
                types.push(action_type);
            }
        }

        Self {
            entity: entity.to_string(),
            types,
            lookup,
        }
    }

    /// Entity these types are namespaced under
    #[must_use]
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Action-type string for an operation and phase
    #[must_use]
    pub fn get(&self, operation: Operation, phase: Phase) -> &str {
        &self.types[operation.index() * Phase::ALL.len() + phase.index()]
    }

    /// Look up by constant name, e.g. `CREATE_START`
    #[must_use]
    pub fn by_constant(&self, name: &str) -> Option<&str> {
        self.iter()
            .find(|(operation, phase, _)| {
                name.strip_prefix(operation.constant_name())
                    .and_then(|rest| rest.strip_prefix('_'))
                    .is_some_and(|suffix| suffix == phase.suffix())
            })
            .map(|(_, _, action_type)| action_type)
    }

    /// Resolve an action-type string back to its operation and phase
    #[must_use]
    pub fn resolve(&self, action_type: &str) -> Option<(Operation, Phase)> {
        self.lookup.get(action_type).copied()
    }

    /// Iterate over `(operation, phase, type)` in registry order
    pub fn iter(&self) -> impl Iterator<Item = (Operation, Phase, &str)> {
        Operation::ALL
            .into_iter()
            .flat_map(|operation| Phase::ALL.into_iter().map(move |phase| (operation, phase)))
            .map(|(operation, phase)| (operation, phase, self.get(operation, phase)))
    }

    /// Number of action types (always 18)
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Always false; kept for API symmetry with `len`
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
