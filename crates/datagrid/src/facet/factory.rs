//! Facet registry keyed by type name.

use std::collections::HashMap;

use super::{Facet, TermsFacet};
use crate::error::{DatagridError, DatagridResult};
use crate::value::Options;

/// Creates an uninitialised facet.
pub type FacetConstructor = fn() -> Box<dyn Facet>;

/// Creates facets by type name.
#[derive(Debug, Clone)]
pub struct FacetFactory {
    types: HashMap<String, FacetConstructor>,
}

impl Default for FacetFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl FacetFactory {
    /// Create a factory with the built-in `terms` facet registered.
    pub fn new() -> Self {
        let mut factory = Self {
            types: HashMap::new(),
        };
        factory.register("terms", || Box::new(TermsFacet::default()));
        factory
    }

    pub fn register(&mut self, type_name: &str, constructor: FacetConstructor) {
        self.types.insert(type_name.to_string(), constructor);
    }

    /// Create and initialise a facet.
    pub fn create(
        &self,
        name: &str,
        type_name: &str,
        options: Options,
    ) -> DatagridResult<Box<dyn Facet>> {
        if type_name.is_empty() {
            return Err(DatagridError::configuration("The facet type must be defined"));
        }

        let constructor = self.types.get(type_name).ok_or_else(|| {
            DatagridError::configuration(format!(
                "No attached service to facet type named `{type_name}`"
            ))
        })?;

        let mut facet = constructor();
        facet.initialize(name, options);
        Ok(facet)
    }
}
