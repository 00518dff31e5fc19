//! Filters: named, optioned predicates bound to submitted values.
//!
//! A filter carries its options and the `{type, value}` pair bound by the
//! datagrid. Once active it contributes a backend-native predicate to a
//! [`ProxyQuery`]. Concrete filters only supply [`Filter::apply`] and their
//! defaults; option handling lives in the trait's provided methods.

mod factory;
pub mod relational;
pub mod search;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{DatagridError, DatagridResult};
use crate::form::Widget;
use crate::proxy_query::{Engine, ProxyQuery};
use crate::value::{FilterData, Options};

pub use factory::{FilterConstructor, FilterFactory};

/// How a filter's predicate combines with the predicates before it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FilterCondition {
    #[default]
    And,
    Or,
}

impl FilterCondition {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterCondition::And => "AND",
            FilterCondition::Or => "OR",
        }
    }
}

impl fmt::Display for FilterCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FilterCondition {
    type Err = DatagridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("and") {
            Ok(FilterCondition::And)
        } else if s.eq_ignore_ascii_case("or") {
            Ok(FilterCondition::Or)
        } else {
            Err(DatagridError::UnexpectedType {
                expected: "AND|OR".to_string(),
                given: s.to_string(),
            })
        }
    }
}

/// State every filter carries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    pub name: String,
    pub options: Options,
    pub value: Option<FilterData>,
    pub condition: FilterCondition,
}

/// Widget and widget options used to render a filter in the form.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderSettings {
    pub widget: Widget,
    pub options: Options,
}

/// A named predicate over a datagrid's query.
pub trait Filter: Send + Sync + fmt::Debug {
    fn state(&self) -> &FilterState;

    fn state_mut(&mut self) -> &mut FilterState;

    /// Registry key of the filter type (e.g. "string", "term").
    fn filter_type(&self) -> &'static str;

    /// Options merged under the user options at initialisation.
    fn default_options(&self) -> Options {
        Options::new()
    }

    /// Add this filter's predicate for `data` to the query.
    fn apply(&self, query: &mut ProxyQuery, data: &FilterData) -> DatagridResult<()>;

    /// Widget used for the filter's form field.
    fn render_settings(&self) -> RenderSettings {
        RenderSettings {
            widget: Widget::Text,
            options: self.render_options(),
        }
    }

    /// `{field_type, field_options, label}` handed to the form widget.
    fn render_options(&self) -> Options {
        let mut options = Options::new();
        options.insert("field_type".to_string(), json!(self.field_type()));
        options.insert("field_options".to_string(), self.field_options());
        options.insert("label".to_string(), json!(self.label()));
        options
    }

    /// Set the name and merge `options` over the defaults.
    fn initialize(&mut self, name: &str, options: Options) {
        self.state_mut().name = name.to_string();
        self.set_options(options);
    }

    fn name(&self) -> &str {
        &self.state().name
    }

    /// Name of the form field: dots are not valid there, so they become `__`.
    fn form_name(&self) -> String {
        self.name().replace('.', "__")
    }

    /// Replace all options with the defaults overlaid by `options`.
    fn set_options(&mut self, options: Options) {
        let mut merged = self.default_options();
        merged.extend(options);
        self.state_mut().options = merged;
    }

    fn options(&self) -> &Options {
        &self.state().options
    }

    fn option(&self, name: &str) -> Option<&Value> {
        self.state().options.get(name)
    }

    fn set_option(&mut self, name: &str, value: Value) {
        self.state_mut().options.insert(name.to_string(), value);
    }

    fn field_type(&self) -> String {
        self.option("field_type")
            .and_then(Value::as_str)
            .unwrap_or("text")
            .to_string()
    }

    fn field_options(&self) -> Value {
        self.option("field_options")
            .cloned()
            .unwrap_or_else(|| json!({"required": false}))
    }

    fn label(&self) -> Option<&str> {
        self.option("label").and_then(Value::as_str)
    }

    fn set_label(&mut self, label: &str) {
        self.set_option("label", json!(label));
    }

    /// The `field_name` option, required by filters that target a column.
    fn field_name(&self) -> DatagridResult<&str> {
        self.option("field_name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| {
                DatagridError::configuration(format!(
                    "The option `field_name` must be set for field : `{}`",
                    self.name()
                ))
            })
    }

    fn translation_domain(&self) -> Option<&str> {
        self.option("translation_domain").and_then(Value::as_str)
    }

    fn set_value(&mut self, value: FilterData) {
        self.state_mut().value = Some(value);
    }

    fn clear_value(&mut self) {
        self.state_mut().value = None;
    }

    fn value(&self) -> Option<&FilterData> {
        self.state().value.as_ref()
    }

    /// Active once a value other than null, `false` or `""` is bound.
    fn is_active(&self) -> bool {
        self.value().is_some_and(FilterData::has_value)
    }

    fn condition(&self) -> FilterCondition {
        self.state().condition
    }

    fn set_condition(&mut self, condition: FilterCondition) {
        self.state_mut().condition = condition;
    }
}

/// Error for a filter applied to a query of the other backend.
pub(crate) fn wrong_engine(filter: &dyn Filter, engine: Engine) -> DatagridError {
    DatagridError::configuration(format!(
        "Filter `{}` of type `{}` cannot be applied to a {engine} query",
        filter.name(),
        filter.filter_type(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct TitleFilter {
        state: FilterState,
    }

    impl Filter for TitleFilter {
        fn state(&self) -> &FilterState {
            &self.state
        }

        fn state_mut(&mut self) -> &mut FilterState {
            &mut self.state
        }

        fn filter_type(&self) -> &'static str {
            "title"
        }

        fn default_options(&self) -> Options {
            let mut options = Options::new();
            options.insert("foo".to_string(), json!("bar"));
            options.insert("field_name".to_string(), json!("title"));
            options
        }

        fn apply(&self, _query: &mut ProxyQuery, _data: &FilterData) -> DatagridResult<()> {
            Ok(())
        }
    }

    fn options(value: Value) -> Options {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn initialize_merges_defaults() {
        let mut filter = TitleFilter::default();
        filter.initialize("title", options(json!({"foo": "baz", "label": "Title"})));

        assert_eq!(filter.name(), "title");
        assert_eq!(filter.option("foo"), Some(&json!("baz")));
        assert_eq!(filter.option("field_name"), Some(&json!("title")));
        assert_eq!(filter.label(), Some("Title"));
    }

    #[test]
    fn set_options_twice_is_idempotent() {
        let given = options(json!({"foo": "baz", "operator_type": "choice"}));
        let mut filter = TitleFilter::default();

        filter.set_options(given.clone());
        let first = filter.options().clone();
        filter.set_options(given);

        assert_eq!(filter.options(), &first);
        assert_eq!(first.get("foo"), Some(&json!("baz")));
        assert_eq!(first.get("field_name"), Some(&json!("title")));
    }

    #[test]
    fn option_defaults() {
        let mut filter = TitleFilter::default();
        filter.initialize("title", Options::new());

        assert_eq!(filter.field_type(), "text");
        assert_eq!(filter.field_options(), json!({"required": false}));
        assert_eq!(filter.label(), None);
        assert_eq!(filter.translation_domain(), None);
        assert_eq!(filter.option("missing"), None);
    }

    #[test]
    fn form_name_replaces_dots() {
        let mut filter = TitleFilter::default();
        filter.initialize("author.name", Options::new());
        assert_eq!(filter.form_name(), "author__name");
    }

    #[test]
    fn missing_field_name_is_an_error() {
        let mut filter = TitleFilter::default();
        filter.initialize("title", options(json!({"field_name": ""})));

        let err = filter.field_name().unwrap_err();
        assert!(err.to_string().contains("`field_name` must be set for field : `title`"));
    }

    #[test]
    fn activity_follows_value() {
        let mut filter = TitleFilter::default();
        assert!(!filter.is_active());

        filter.set_value(FilterData::value(Value::Null));
        assert!(!filter.is_active());

        filter.set_value(FilterData::value(false));
        assert!(!filter.is_active());

        filter.set_value(FilterData::value(""));
        assert!(!filter.is_active());

        filter.set_value(FilterData::new("contains", "rust"));
        assert!(filter.is_active());

        filter.clear_value();
        assert!(!filter.is_active());
    }

    #[test]
    fn condition_defaults_to_and() {
        let mut filter = TitleFilter::default();
        assert_eq!(filter.condition(), FilterCondition::And);
        filter.set_condition("or".parse().unwrap());
        assert_eq!(filter.condition(), FilterCondition::Or);
        assert!("xor".parse::<FilterCondition>().is_err());
    }

    #[test]
    fn render_options_shape() {
        let mut filter = TitleFilter::default();
        filter.initialize("title", Options::new());
        filter.set_label("Title");

        let settings = filter.render_settings();
        assert_eq!(settings.widget, Widget::Text);
        assert_eq!(
            Value::Object(settings.options),
            json!({"field_type": "text", "field_options": {"required": false}, "label": "Title"})
        );
    }
}
