//! Raw parameter values, filter data and option maps.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reserved key carrying the sort field.
pub const SORT_BY: &str = "_sort_by";
/// Reserved key carrying the sort direction.
pub const SORT_ORDER: &str = "_sort_order";
/// Reserved key carrying the requested page.
pub const PAGE: &str = "_page";
/// Reserved key carrying the requested page size.
pub const PER_PAGE: &str = "_per_page";

/// The four reserved keys, in the order their form fields are registered.
pub const RESERVED_KEYS: [&str; 4] = [SORT_BY, SORT_ORDER, PAGE, PER_PAGE];

/// Raw request parameters, keyed by field name, in submission order.
pub type Values = IndexMap<String, Value>;

/// Filter and facet options.
pub type Options = serde_json::Map<String, Value>;

/// A result row as returned by a backend.
pub type Row = Value;

/// The `{type, value}` pair bound to a filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterData {
    /// Operator chosen by the user (e.g. "contains", ">=").
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    /// Submitted value; `Null` when absent.
    #[serde(default)]
    pub value: Value,
}

impl FilterData {
    /// Create filter data with an operator.
    pub fn new(kind: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            kind: Some(kind.into()),
            value: value.into(),
        }
    }

    /// Filter data carrying a value and no operator.
    pub fn value(value: impl Into<Value>) -> Self {
        Self {
            kind: None,
            value: value.into(),
        }
    }

    /// Read filter data from a bound form value.
    ///
    /// Objects contribute their `type` and `value` keys; any other non-null
    /// value becomes the `value` itself.
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(map) => Self {
                kind: map.get("type").and_then(Value::as_str).map(str::to_string),
                value: map.get("value").cloned().unwrap_or(Value::Null),
            },
            Value::Null => Self::default(),
            other => Self::value(other.clone()),
        }
    }

    /// Whether the bound value counts as set (not null, false or "").
    pub fn has_value(&self) -> bool {
        is_present(&self.value)
    }

    /// The JSON representation stored in a datagrid's values.
    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "type": self.kind,
            "value": self.value,
        })
    }
}

/// Whether a value is present for filtering purposes.
pub fn is_present(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false)) && value.as_str() != Some("")
}

/// Whether a raw submitted value carries a non-empty `value` entry.
///
/// Scalars submitted without the `{type, value}` wrapper count as the value.
pub fn has_submitted_value(raw: Option<&Value>) -> bool {
    let value = match raw {
        Some(Value::Object(map)) => map.get("value"),
        other => other,
    };
    value.is_some_and(|v| !v.is_null() && v.as_str() != Some(""))
}

/// Read an integer out of a raw parameter (numbers or numeric strings).
pub fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
