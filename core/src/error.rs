//! Error types for building entity triplets.

use thiserror::Error;

use crate::config::Mode;

/// Errors raised while configuring an entity
///
/// Reducers themselves never fail; these only surface from configuration
/// and the `crud_for` factory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CrudError {
    /// Entity name was empty
    #[error("Entity name cannot be empty")]
    EmptyEntity,

    /// Configuration failed validation
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Initial items use a different representation than the configured mode
    #[error("Initial items are a {found} but the reducer is configured for {expected}")]
    ModeMismatch {
        /// Configured mode
        expected: Mode,
        /// Representation of the supplied items
        found: Mode,
    },

    /// Configuration text could not be parsed
    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    /// An action-creator name is not part of the naming convention
    #[error("Unknown action creator: {0}")]
    UnknownCreator(String),
}
