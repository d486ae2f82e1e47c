//! The `crud_for` factory
//!
//! Assembles action types, action creators and a reducer for one entity
//! from a single configuration.

use std::sync::Arc;

use crate::action::ActionTypes;
use crate::config::CrudConfig;
use crate::creators::ActionCreators;
use crate::entity::EntityReducer;
use crate::environment::Clock;
use crate::error::CrudError;

/// The generated triplet for one entity
#[derive(Debug, Clone)]
pub struct Crud {
    /// Action-type strings
    pub action_types: Arc<ActionTypes>,
    /// Action creators
    pub action_creators: ActionCreators,
    /// The entity reducer
    pub reducer: EntityReducer,
    /// Endpoint for transport collaborators
    pub endpoint: String,
}

impl Crud {
    /// Replace the clock used to stamp success actions
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.action_creators = ActionCreators::with_clock(Arc::clone(&self.action_types), clock);
        self
    }

    /// Entity name
    #[must_use]
    pub fn entity(&self) -> &str {
        self.action_types.entity()
    }
}

/// Build the triplet for `entity` with the default configuration
///
/// # Errors
///
/// Returns [`CrudError::EmptyEntity`] if `entity` is blank
///
/// # Example
///
/// ```
/// use composable_crud_core::crud_for;
///
/// # fn main() -> Result<(), composable_crud_core::CrudError> {
/// let examples = crud_for("examples")?;
/// assert_eq!(examples.action_creators.create_start().action_type, "examples/create/start");
/// assert_eq!(examples.endpoint, "/examples");
/// # Ok(())
/// # }
/// ```
pub fn crud_for(entity: &str) -> Result<Crud, CrudError> {
    crud_for_with(entity, CrudConfig::default())
}

/// Build the triplet for `entity` with an explicit configuration
///
/// # Errors
///
/// Returns [`CrudError::EmptyEntity`] if `entity` is blank, or the
/// validation error of `config`
pub fn crud_for_with(entity: &str, config: CrudConfig) -> Result<Crud, CrudError> {
    if entity.trim().is_empty() {
        return Err(CrudError::EmptyEntity);
    }

    let action_types = Arc::new(ActionTypes::new(entity, &config.actions));
    let reducer = EntityReducer::new(Arc::clone(&action_types), &config)?;
    let action_creators = ActionCreators::new(Arc::clone(&action_types));
    let endpoint = config.endpoint.unwrap_or_else(|| format!("/{entity}"));

    tracing::debug!(
        entity,
        mode = %reducer.mode(),
        key = %reducer.key(),
        %endpoint,
        "Created CRUD triplet"
    );

    Ok(Crud {
        action_types,
        action_creators,
        reducer,
        endpoint,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActionLabels, Mode};

    #[test]
    fn rejects_blank_entity() {
        assert!(matches!(crud_for(" "), Err(CrudError::EmptyEntity)));
    }

    #[test]
    fn endpoint_defaults_to_entity_path() {
        let crud = crud_for_with("cows", CrudConfig::default().with_endpoint("/api/v2/cows"));
        assert!(matches!(crud, Ok(ref c) if c.endpoint == "/api/v2/cows"));
        assert!(matches!(crud_for("cows"), Ok(ref c) if c.endpoint == "/cows"));
    }

    #[test]
    fn custom_labels_flow_into_every_part() {
        let labels = ActionLabels {
            fetch_list: "load-all".to_string(),
            ..ActionLabels::default()
        };
        let result = crud_for_with(
            "cows",
            CrudConfig::default().with_mode(Mode::Map).with_actions(labels),
        );
        let Ok(crud) = result else {
            unreachable!("valid configuration");
        };
        let start = crud.action_creators.fetch_list_start();
        assert_eq!(start.action_type, "cows/load-all/start");
        let state = crud.reducer.reduce_snapshot(None, Some(&start));
        assert!(state.is_fetching);
        assert_eq!(crud.entity(), "cows");
    }

    #[test]
    fn invalid_config_is_reported() {
        let result = crud_for_with("cows", CrudConfig::default().with_key(""));
        assert!(matches!(result, Err(CrudError::InvalidConfig(_))));
    }
}
