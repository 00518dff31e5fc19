//! Datagrid error types.

use thiserror::Error;

/// Errors surfaced while building or running a datagrid.
///
/// Backend failures are carried through as-is; nothing in this crate retries
/// or rewrites them.
#[derive(Debug, Error)]
pub enum DatagridError {
    /// Missing mandatory option, unknown filter/facet type, no engine selected.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A bound value did not have the shape the binding step requires.
    #[error("expected argument of type \"{expected}\", \"{given}\" given")]
    UnexpectedType { expected: String, given: String },

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Search(#[from] reqwest::Error),

    /// Failure reported by a custom executor or search client.
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl DatagridError {
    /// Shorthand for a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        DatagridError::Configuration(message.into())
    }

    /// Type error describing the JSON shape that was given.
    pub fn unexpected_type(expected: impl Into<String>, given: &serde_json::Value) -> Self {
        DatagridError::UnexpectedType {
            expected: expected.into(),
            given: json_type_name(given).to_string(),
        }
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "boolean",
        serde_json::Value::Number(_) => "number",
        serde_json::Value::String(_) => "string",
        serde_json::Value::Array(_) => "array",
        serde_json::Value::Object(_) => "object",
    }
}

/// Result type alias using DatagridError.
pub type DatagridResult<T> = Result<T, DatagridError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unexpected_type_names_the_given_shape() {
        let err = DatagridError::unexpected_type("FieldDescription", &serde_json::json!(42));
        assert_eq!(
            err.to_string(),
            "expected argument of type \"FieldDescription\", \"number\" given"
        );
    }

    #[test]
    fn configuration_message() {
        let err = DatagridError::configuration("The filter type must be defined");
        assert!(matches!(err, DatagridError::Configuration(_)));
        assert!(err.to_string().contains("filter type"));
    }
}
