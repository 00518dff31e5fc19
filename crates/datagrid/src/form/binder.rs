//! Binding raw request values through the filter form.

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;
use tracing::debug;

use super::types::{FormField, Widget};
use crate::error::DatagridResult;
use crate::value::{Options, Values};

/// The form collaborator a datagrid registers its fields with and submits
/// raw values through.
pub trait FormBinder: Send + Sync + fmt::Debug {
    /// Register a field. Registering a name twice replaces the field.
    fn add_field(&mut self, name: &str, widget: Widget, options: Options);

    /// Bind raw values, returning the normalised data keyed by field name.
    fn submit(&mut self, values: &Values) -> DatagridResult<Values>;

    fn field(&self, name: &str) -> Option<&FormField>;

    /// Field names in registration order.
    fn field_names(&self) -> Vec<String>;

    /// Normalised value of a field after `submit`.
    fn bound_data(&self, name: &str) -> Option<&Value>;

    fn is_submitted(&self) -> bool;
}

/// In-memory [`FormBinder`]: fields keep registration order and values are
/// normalised per widget.
#[derive(Debug, Clone, Default)]
pub struct FilterForm {
    fields: IndexMap<String, FormField>,
    data: Values,
    submitted: bool,
}

impl FilterForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(&self) -> impl Iterator<Item = &FormField> {
        self.fields.values()
    }

    pub fn data(&self) -> &Values {
        &self.data
    }
}

impl FormBinder for FilterForm {
    fn add_field(&mut self, name: &str, widget: Widget, options: Options) {
        self.fields
            .insert(name.to_string(), FormField::new(name, widget).options(options));
    }

    fn submit(&mut self, values: &Values) -> DatagridResult<Values> {
        let data: Values = self
            .fields
            .iter()
            .map(|(name, field)| {
                let bound = values
                    .get(name)
                    .map(|raw| field.normalize(raw))
                    .unwrap_or(Value::Null);
                (name.clone(), bound)
            })
            .collect();

        let extra: Vec<&String> = values
            .keys()
            .filter(|key| !self.fields.contains_key(*key))
            .collect();
        if !extra.is_empty() {
            debug!(fields = ?extra, "ignoring values without a form field");
        }

        self.data = data.clone();
        self.submitted = true;
        Ok(data)
    }

    fn field(&self, name: &str) -> Option<&FormField> {
        self.fields.get(name)
    }

    fn field_names(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    fn bound_data(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }

    fn is_submitted(&self) -> bool {
        self.submitted
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn submit_binds_registered_fields_in_order() {
        let mut form = FilterForm::new();
        form.add_field("title", Widget::Text, Options::new());
        form.add_field("_page", Widget::Hidden, Options::new());
        assert!(!form.is_submitted());

        let mut values = Values::new();
        values.insert("_page".to_string(), json!("2"));
        values.insert("title".to_string(), json!(" rust "));
        values.insert("unknown".to_string(), json!("x"));

        let data = form.submit(&values).unwrap();
        assert!(form.is_submitted());
        assert_eq!(data.keys().collect::<Vec<_>>(), vec!["title", "_page"]);
        assert_eq!(data["title"], json!({"type": null, "value": "rust"}));
        assert_eq!(data["_page"], json!("2"));
        assert_eq!(form.bound_data("unknown"), None);
    }

    #[test]
    fn missing_values_bind_null() {
        let mut form = FilterForm::new();
        form.add_field("title", Widget::Text, Options::new());
        let data = form.submit(&Values::new()).unwrap();
        assert_eq!(data["title"], Value::Null);
    }

    #[test]
    fn re_adding_replaces_field() {
        let mut form = FilterForm::new();
        form.add_field("title", Widget::Text, Options::new());
        form.add_field("title", Widget::Choice, Options::new());
        assert_eq!(form.field_names(), vec!["title".to_string()]);
        assert_eq!(form.field("title").unwrap().widget, Widget::Choice);
    }
}
