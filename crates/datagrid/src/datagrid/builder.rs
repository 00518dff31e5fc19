//! Fluent assembly of a datagrid's filters, facets and extra form fields.

use super::Datagrid;
use crate::error::{DatagridError, DatagridResult};
use crate::facet::FacetFactory;
use crate::filter::FilterFactory;
use crate::form::Widget;
use crate::value::Options;

/// Adds factory-made filters and facets to a datagrid.
#[derive(Debug)]
pub struct DatagridBuilder {
    datagrid: Datagrid,
    filter_factory: FilterFactory,
    facet_factory: FacetFactory,
}

impl DatagridBuilder {
    /// The filter factory should already have its engine selected.
    pub fn new(datagrid: Datagrid, filter_factory: FilterFactory, facet_factory: FacetFactory) -> Self {
        Self {
            datagrid,
            filter_factory,
            facet_factory,
        }
    }

    pub fn datagrid(&self) -> &Datagrid {
        &self.datagrid
    }

    pub fn datagrid_mut(&mut self) -> &mut Datagrid {
        &mut self.datagrid
    }

    /// Finish building.
    pub fn into_datagrid(self) -> Datagrid {
        self.datagrid
    }

    /// Create a filter of `type_name` and add it to the datagrid.
    pub fn add_filter(
        &mut self,
        name: &str,
        type_name: &str,
        options: Options,
    ) -> DatagridResult<&mut Self> {
        if type_name.is_empty() {
            return Err(DatagridError::configuration(
                "The filter type must be defined (filter type guessing is not supported)",
            ));
        }
        let filter = self.filter_factory.create(name, type_name, options)?;
        self.datagrid.add_filter(filter);
        Ok(self)
    }

    /// Create a facet of `type_name` and attach it to the datagrid's query.
    pub fn add_facet(
        &mut self,
        name: &str,
        type_name: &str,
        options: Options,
    ) -> DatagridResult<&mut Self> {
        if type_name.is_empty() {
            return Err(DatagridError::configuration(
                "The facet type must be defined (facet type guessing is not supported)",
            ));
        }
        let facet = self.facet_factory.create(name, type_name, options)?;
        self.datagrid.add_facet(facet)?;
        Ok(self)
    }

    /// Register a form field that is not backed by a filter.
    pub fn add_form_field(&mut self, name: &str, widget: Widget, options: Options) -> &mut Self {
        self.datagrid.form_mut().add_field(name, widget, options);
        self
    }
}
