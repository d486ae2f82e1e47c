//! Collection state produced by entity reducers.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::config::Mode;

/// An opaque item record; only the configured key field is ever inspected
pub type Item = Map<String, Value>;

/// Items held by a collection, in the representation chosen at construction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Collection {
    /// Ordered sequence of items
    List(Vec<Item>),
    /// Items keyed by the rendered value of their key field
    Map(IndexMap<String, Item>),
}

impl Collection {
    /// An empty collection in the given representation
    #[must_use]
    pub fn empty(mode: Mode) -> Self {
        match mode {
            Mode::List => Self::List(Vec::new()),
            Mode::Map => Self::Map(IndexMap::new()),
        }
    }

    /// The representation of this collection
    #[must_use]
    pub const fn mode(&self) -> Mode {
        match self {
            Self::List(_) => Mode::List,
            Self::Map(_) => Mode::Map,
        }
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Map(items) => items.len(),
        }
    }

    /// True when there are no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over items; map collections yield in insertion order
    pub fn items(&self) -> Box<dyn Iterator<Item = &Item> + '_> {
        match self {
            Self::List(items) => Box::new(items.iter()),
            Self::Map(items) => Box::new(items.values()),
        }
    }

    /// Find an item whose `key` field equals `id`
    ///
    /// List lookups compare with [`same_key`] (`1` never equals `"1"`);
    /// map lookups go through the rendered key.
    #[must_use]
    pub fn find(&self, key: &str, id: &Value) -> Option<&Item> {
        match self {
            Self::List(items) => items
                .iter()
                .find(|item| item.get(key).is_some_and(|found| same_key(found, id))),
            Self::Map(items) => items.get(&map_key(id)),
        }
    }
}

/// Render a key value the way map collections index it
///
/// Strings are used verbatim; everything else uses its JSON text. Integral
/// floats render as integers, so `1.0` and `1` index the same item.
#[must_use]
pub fn map_key(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => canonical_number(n).to_string(),
        other => other.to_string(),
    }
}

/// Whether two key values name the same item
///
/// Strict across JSON types; numbers compare by value.
#[must_use]
pub fn same_key(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(l), Value::Number(r)) => canonical_number(l) == canonical_number(r),
        _ => left == right,
    }
}

// Floats beyond 2^53 are not exact integers anyway
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

#[allow(clippy::cast_possible_truncation)]
fn canonical_number(n: &Number) -> Number {
    match n.as_f64() {
        Some(f) if n.is_f64() && f.fract() == 0.0 && f.abs() < MAX_SAFE_INTEGER => {
            Number::from(f as i64)
        },
        _ => n.clone(),
    }
}

/// State of one entity collection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionState {
    /// A create request is in flight
    pub is_creating: bool,
    /// A fetch request is in flight
    pub is_fetching: bool,
    /// An update request is in flight
    pub is_updating: bool,
    /// A delete request is in flight
    pub is_deleting: bool,
    /// Last error, if any
    #[serde(default)]
    pub error: Option<Value>,
    /// The items
    pub items: Collection,
    /// Timestamp of the last successful payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl CollectionState {
    /// Idle state with no items
    #[must_use]
    pub fn empty(mode: Mode) -> Self {
        Self {
            is_creating: false,
            is_fetching: false,
            is_updating: false,
            is_deleting: false,
            error: None,
            items: Collection::empty(mode),
            updated_at: None,
        }
    }

    /// True while any request is in flight
    #[must_use]
    pub const fn is_busy(&self) -> bool {
        self.is_creating || self.is_fetching || self.is_updating || self.is_deleting
    }

    pub(crate) const fn clear_flags(&mut self) {
        self.is_creating = false;
        self.is_fetching = false;
        self.is_updating = false;
        self.is_deleting = false;
    }
}
