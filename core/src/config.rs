//! Entity configuration
//!
//! Configuration is plain serde data with sensible defaults, so an entity can
//! be declared in code or loaded from TOML/JSON.
//!
//! # Example
//!
//! ```
//! use composable_crud_core::config::{CrudConfig, Mode};
//!
//! # fn main() -> Result<(), composable_crud_core::CrudError> {
//! let config = CrudConfig::from_toml_str(
//!     r#"
//!     key = "slug"
//!     mode = "map"
//!
//!     [actions]
//!     fetch_list = "list"
//!     "#,
//! )?;
//!
//! assert_eq!(config.key, "slug");
//! assert_eq!(config.mode, Mode::Map);
//! assert_eq!(config.actions.fetch_list, "list");
//! assert_eq!(config.actions.create, "create");
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::action::Operation;
use crate::error::CrudError;
use crate::state::{Collection, CollectionState};

/// Collection representation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Ordered list of items
    #[default]
    List,
    /// Items keyed by their key field
    Map,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
        }
    }
}

/// Label per operation used when building action-type strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActionLabels {
    /// Label for [`Operation::Create`]
    pub create: String,
    /// Label for [`Operation::FetchList`]
    pub fetch_list: String,
    /// Label for [`Operation::FetchItem`]
    pub fetch_item: String,
    /// Label for [`Operation::Update`]
    pub update: String,
    /// Label for [`Operation::Edit`]
    pub edit: String,
    /// Label for [`Operation::Delete`]
    pub delete: String,
}

impl ActionLabels {
    /// Label configured for `operation`
    #[must_use]
    pub fn label(&self, operation: Operation) -> &str {
        match operation {
            Operation::Create => &self.create,
            Operation::FetchList => &self.fetch_list,
            Operation::FetchItem => &self.fetch_item,
            Operation::Update => &self.update,
            Operation::Edit => &self.edit,
            Operation::Delete => &self.delete,
        }
    }

    /// Validate labels
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidConfig`] if any label is empty
    pub fn validate(&self) -> Result<(), CrudError> {
        for operation in Operation::ALL {
            if self.label(operation).trim().is_empty() {
                return Err(CrudError::InvalidConfig(format!(
                    "label for {operation} cannot be empty"
                )));
            }
        }
        Ok(())
    }
}

impl Default for ActionLabels {
    fn default() -> Self {
        Self {
            create: Operation::Create.default_label().to_string(),
            fetch_list: Operation::FetchList.default_label().to_string(),
            fetch_item: Operation::FetchItem.default_label().to_string(),
            update: Operation::Update.default_label().to_string(),
            edit: Operation::Edit.default_label().to_string(),
            delete: Operation::Delete.default_label().to_string(),
        }
    }
}

/// Partial override merged over the computed initial state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InitialStateOverride {
    /// Initial `is_creating`
    pub is_creating: Option<bool>,
    /// Initial `is_fetching`
    pub is_fetching: Option<bool>,
    /// Initial `is_updating`
    pub is_updating: Option<bool>,
    /// Initial `is_deleting`
    pub is_deleting: Option<bool>,
    /// Initial `error`
    pub error: Option<Value>,
    /// Initial items; must match the configured [`Mode`]
    pub items: Option<Collection>,
}

impl InitialStateOverride {
    /// Merge this override over `base`
    #[must_use]
    pub fn apply(&self, mut base: CollectionState) -> CollectionState {
        if let Some(flag) = self.is_creating {
            base.is_creating = flag;
        }
        if let Some(flag) = self.is_fetching {
            base.is_fetching = flag;
        }
        if let Some(flag) = self.is_updating {
            base.is_updating = flag;
        }
        if let Some(flag) = self.is_deleting {
            base.is_deleting = flag;
        }
        if let Some(error) = &self.error {
            base.error = Some(error.clone());
        }
        if let Some(items) = &self.items {
            base.items = items.clone();
        }
        base
    }
}

/// Configuration for one entity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrudConfig {
    /// Item field used for identity
    pub key: String,
    /// Collection representation, fixed for the reducer's lifetime
    pub mode: Mode,
    /// Endpoint forwarded to transport collaborators; defaults to `/{entity}`
    pub endpoint: Option<String>,
    /// Per-operation labels
    pub actions: ActionLabels,
    /// Initial state override
    pub initial_state: InitialStateOverride,
}

impl CrudConfig {
    /// Set the key field
    #[must_use]
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// Set the collection representation
    #[must_use]
    pub const fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    /// Set the endpoint
    #[must_use]
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = Some(endpoint.into());
        self
    }

    /// Set the operation labels
    #[must_use]
    pub fn with_actions(mut self, actions: ActionLabels) -> Self {
        self.actions = actions;
        self
    }

    /// Set the initial state override
    #[must_use]
    pub fn with_initial_state(mut self, initial_state: InitialStateOverride) -> Self {
        self.initial_state = initial_state;
        self
    }

    /// Parse from TOML
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Parse`] on malformed input and
    /// [`CrudError::InvalidConfig`] if validation fails
    pub fn from_toml_str(input: &str) -> Result<Self, CrudError> {
        let config: Self = toml::from_str(input).map_err(|e| CrudError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::Parse`] on malformed input and
    /// [`CrudError::InvalidConfig`] if validation fails
    pub fn from_json_str(input: &str) -> Result<Self, CrudError> {
        let config: Self =
            serde_json::from_str(input).map_err(|e| CrudError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns [`CrudError::InvalidConfig`] for an empty key or label, and
    /// [`CrudError::ModeMismatch`] if initial items do not match `mode`
    pub fn validate(&self) -> Result<(), CrudError> {
        if self.key.trim().is_empty() {
            return Err(CrudError::InvalidConfig("key cannot be empty".to_string()));
        }

        self.actions.validate()?;

        if let Some(items) = &self.initial_state.items {
            if items.mode() != self.mode {
                return Err(CrudError::ModeMismatch {
                    expected: self.mode,
                    found: items.mode(),
                });
            }
        }

        Ok(())
    }
}

impl Default for CrudConfig {
    fn default() -> Self {
        Self {
            key: "id".to_string(),
            mode: Mode::List,
            endpoint: None,
            actions: ActionLabels::default(),
            initial_state: InitialStateOverride::default(),
        }
    }
}
