//! Filter registry keyed by engine and type name.

use std::collections::HashMap;

use super::Filter;
use super::relational::{BooleanFilter, ChoiceFilter, NumberFilter, StringFilter};
use super::search::{MaxFilter, TermFilter};
use crate::error::{DatagridError, DatagridResult};
use crate::proxy_query::Engine;
use crate::value::Options;

/// Creates an uninitialised filter.
pub type FilterConstructor = fn() -> Box<dyn Filter>;

/// Creates filters by `(engine, type)`.
///
/// The engine is selected once with [`set_engine`](Self::set_engine); every
/// `create` then looks the type up among that engine's registrations.
#[derive(Debug, Clone)]
pub struct FilterFactory {
    engine: Option<Engine>,
    types: HashMap<Engine, HashMap<String, FilterConstructor>>,
}

impl Default for FilterFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterFactory {
    /// Create a factory with the built-in filters registered and no engine.
    pub fn new() -> Self {
        let mut factory = Self {
            engine: None,
            types: HashMap::new(),
        };

        factory.register(Engine::Relational, "string", || Box::new(StringFilter::default()));
        factory.register(Engine::Relational, "number", || Box::new(NumberFilter::default()));
        factory.register(Engine::Relational, "boolean", || Box::new(BooleanFilter::default()));
        factory.register(Engine::Relational, "choice", || Box::new(ChoiceFilter::default()));
        factory.register(Engine::Search, "term", || Box::new(TermFilter::default()));
        factory.register(Engine::Search, "max", || Box::new(MaxFilter::default()));

        factory
    }

    /// Register (or replace) a filter type for an engine.
    pub fn register(&mut self, engine: Engine, type_name: &str, constructor: FilterConstructor) {
        self.types
            .entry(engine)
            .or_default()
            .insert(type_name.to_string(), constructor);
    }

    pub fn set_engine(&mut self, engine: Engine) {
        self.engine = Some(engine);
    }

    pub fn with_engine(mut self, engine: Engine) -> Self {
        self.engine = Some(engine);
        self
    }

    pub fn engine(&self) -> Option<Engine> {
        self.engine
    }

    /// Whether the selected engine has `type_name` registered.
    pub fn has_type(&self, type_name: &str) -> bool {
        self.engine
            .and_then(|engine| self.types.get(&engine))
            .is_some_and(|types| types.contains_key(type_name))
    }

    /// Create and initialise a filter.
    pub fn create(
        &self,
        name: &str,
        type_name: &str,
        options: Options,
    ) -> DatagridResult<Box<dyn Filter>> {
        if type_name.is_empty() {
            return Err(DatagridError::configuration("The filter type must be defined"));
        }

        let Some(engine) = self.engine else {
            return Err(DatagridError::configuration(
                "The engine of filters must be defined, call set_engine on the filter factory with relational or search",
            ));
        };

        let constructor = self
            .types
            .get(&engine)
            .and_then(|types| types.get(type_name))
            .ok_or_else(|| {
                DatagridError::configuration(format!(
                    "No attached service to filter type named `{type_name}` in engine `{engine}`"
                ))
            })?;

        let mut filter = constructor();
        filter.initialize(name, options);
        Ok(filter)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn creates_initialised_filters() {
        let factory = FilterFactory::new().with_engine(Engine::Relational);
        let options = json!({"field_name": "title"}).as_object().cloned().unwrap();

        let filter = factory.create("title", "string", options).unwrap();
        assert_eq!(filter.name(), "title");
        assert_eq!(filter.filter_type(), "string");
        assert_eq!(filter.field_name().unwrap(), "title");
    }

    #[test]
    fn empty_type_is_rejected() {
        let factory = FilterFactory::new().with_engine(Engine::Relational);
        let err = factory.create("title", "", Options::new()).unwrap_err();
        assert!(err.to_string().contains("The filter type must be defined"));
    }

    #[test]
    fn engine_is_required() {
        let factory = FilterFactory::new();
        let err = factory.create("title", "string", Options::new()).unwrap_err();
        assert!(err.to_string().contains("engine of filters must be defined"));
    }

    #[test]
    fn types_are_scoped_by_engine() {
        let mut factory = FilterFactory::new();
        factory.set_engine(Engine::Search);
        assert!(factory.has_type("term"));
        assert!(!factory.has_type("string"));

        let err = factory.create("title", "string", Options::new()).unwrap_err();
        assert!(err.to_string().contains("No attached service to filter type named `string`"));
    }

    #[test]
    fn custom_registration() {
        let mut factory = FilterFactory::new().with_engine(Engine::Search);
        factory.register(Engine::Search, "keyword", || Box::new(TermFilter::default()));
        let filter = factory.create("tag", "keyword", Options::new()).unwrap();
        assert_eq!(filter.name(), "tag");
    }
}
