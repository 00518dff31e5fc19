//! Filter form field types.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::warn;

use crate::filter::relational::{BOOLEAN_NO, BOOLEAN_YES};
use crate::value::Options;

/// Widget a form field renders with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Widget {
    Text,
    Number,
    Choice,
    Boolean,
    Hidden,
    /// Widget provided by the rendering layer; values pass through as given.
    Custom(String),
}

impl Widget {
    /// Get the widget name as a string.
    pub fn type_name(&self) -> &str {
        match self {
            Widget::Text => "text",
            Widget::Number => "number",
            Widget::Choice => "choice",
            Widget::Boolean => "boolean",
            Widget::Hidden => "hidden",
            Widget::Custom(name) => name,
        }
    }

    /// Widget for a name; unknown names become [`Widget::Custom`].
    pub fn from_name(name: &str) -> Self {
        match name {
            "text" => Widget::Text,
            "number" => Widget::Number,
            "choice" => Widget::Choice,
            "boolean" => Widget::Boolean,
            "hidden" => Widget::Hidden,
            other => Widget::Custom(other.to_string()),
        }
    }

    /// Filter widgets bind `{type, value}` pairs; hidden fields bind a raw scalar.
    pub fn is_compound(&self) -> bool {
        !matches!(self, Widget::Hidden)
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

impl From<&str> for Widget {
    fn from(name: &str) -> Self {
        Widget::from_name(name)
    }
}

/// A field of the filter form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormField {
    /// Field name; the key read from submitted values.
    pub name: String,

    pub widget: Widget,

    /// Widget options (`field_type`, `field_options`, `label`, `choices`, ...).
    pub options: Options,
}

impl FormField {
    pub fn new(name: impl Into<String>, widget: Widget) -> Self {
        Self {
            name: name.into(),
            widget,
            options: Options::new(),
        }
    }

    /// Replace the widget options.
    pub fn options(mut self, options: Options) -> Self {
        self.options = options;
        self
    }

    pub fn label(&self) -> Option<&str> {
        self.options.get("label").and_then(Value::as_str)
    }

    /// Normalise a submitted value.
    ///
    /// Compound fields always bind `{type, value}`: scalars are wrapped with a
    /// null type. `null` stays `null`.
    pub fn normalize(&self, raw: &Value) -> Value {
        if raw.is_null() {
            return Value::Null;
        }
        if !self.widget.is_compound() {
            return trim(raw);
        }

        let (kind, value) = match raw {
            Value::Object(map) => (
                map.get("type").map(trim).unwrap_or(Value::Null),
                map.get("value").cloned().unwrap_or(Value::Null),
            ),
            scalar => (Value::Null, scalar.clone()),
        };

        json!({
            "type": kind,
            "value": self.normalize_value(&value),
        })
    }

    fn normalize_value(&self, value: &Value) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        match &self.widget {
            Widget::Text | Widget::Hidden => trim(value),
            Widget::Number => number(&self.name, value),
            Widget::Boolean => boolean(&self.name, value),
            Widget::Choice => match value {
                Value::Array(items) => Value::Array(items.iter().map(trim).collect()),
                scalar => trim(scalar),
            },
            Widget::Custom(_) => value.clone(),
        }
    }
}

fn trim(value: &Value) -> Value {
    match value {
        Value::String(s) => Value::String(s.trim().to_string()),
        other => other.clone(),
    }
}

fn number(field: &str, value: &Value) -> Value {
    match value {
        Value::Number(_) => value.clone(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return json!("");
            }
            if let Ok(n) = s.parse::<i64>() {
                json!(n)
            } else if let Ok(n) = s.parse::<f64>() {
                json!(n)
            } else {
                warn!(field = %field, value = %s, "discarding non-numeric input");
                Value::Null
            }
        }
        other => {
            warn!(field = %field, value = %other, "discarding non-numeric input");
            Value::Null
        }
    }
}

/// Yes/no input maps onto [`BOOLEAN_YES`]/[`BOOLEAN_NO`].
fn boolean(field: &str, value: &Value) -> Value {
    let yes = match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => match n.as_i64() {
            Some(BOOLEAN_YES) => Some(true),
            Some(0) | Some(BOOLEAN_NO) => Some(false),
            _ => None,
        },
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "" => return json!(""),
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "2" | "false" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    };

    match yes {
        Some(true) => json!(BOOLEAN_YES),
        Some(false) => json!(BOOLEAN_NO),
        None => {
            warn!(field = %field, value = %value, "discarding unrecognised boolean input");
            Value::Null
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn widget_names() {
        assert_eq!(Widget::from_name("choice"), Widget::Choice);
        assert_eq!(Widget::from_name("date_range").type_name(), "date_range");
        assert_eq!(Widget::from("hidden"), Widget::Hidden);
        assert!(!Widget::Hidden.is_compound());
        assert!(Widget::Text.is_compound());
    }

    #[test]
    fn text_wraps_and_trims() {
        let field = FormField::new("title", Widget::Text);
        assert_eq!(
            field.normalize(&json!("  rust ")),
            json!({"type": null, "value": "rust"})
        );
        assert_eq!(
            field.normalize(&json!({"type": "contains", "value": " a "})),
            json!({"type": "contains", "value": "a"})
        );
        assert_eq!(field.normalize(&Value::Null), Value::Null);
        assert_eq!(
            field.normalize(&json!({"type": "contains"})),
            json!({"type": "contains", "value": null})
        );
    }

    #[test]
    fn hidden_stays_raw() {
        let field = FormField::new("_page", Widget::Hidden);
        assert_eq!(field.normalize(&json!(" 2 ")), json!("2"));
        assert_eq!(field.normalize(&json!(3)), json!(3));
    }

    #[test]
    fn number_coercion() {
        let field = FormField::new("rating", Widget::Number);
        assert_eq!(field.normalize(&json!("4"))["value"], json!(4));
        assert_eq!(field.normalize(&json!("2.5"))["value"], json!(2.5));
        assert_eq!(field.normalize(&json!("lots"))["value"], Value::Null);
        assert_eq!(field.normalize(&json!(""))["value"], json!(""));
    }

    #[test]
    fn boolean_coercion() {
        let field = FormField::new("published", Widget::Boolean);
        assert_eq!(field.normalize(&json!("yes"))["value"], json!(BOOLEAN_YES));
        assert_eq!(field.normalize(&json!(false))["value"], json!(BOOLEAN_NO));
        assert_eq!(field.normalize(&json!("0"))["value"], json!(BOOLEAN_NO));
        assert_eq!(field.normalize(&json!("maybe"))["value"], Value::Null);
    }

    #[test]
    fn choice_trims_each_item() {
        let field = FormField::new("status", Widget::Choice);
        assert_eq!(
            field.normalize(&json!({"type": "in", "value": [" a", "b "]})),
            json!({"type": "in", "value": ["a", "b"]})
        );
    }

    #[test]
    fn label_from_options() {
        let field = FormField::new("title", Widget::Text)
            .options(json!({"label": "Title"}).as_object().cloned().unwrap());
        assert_eq!(field.label(), Some("Title"));
    }
}
