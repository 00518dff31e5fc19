//! Field descriptions: sortable attributes reached through association hops.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::value::Options;

/// A scalar column on the entity a field description ends at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    /// Column name.
    pub field_name: String,
}

impl FieldMapping {
    pub fn new(field_name: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
        }
    }
}

/// One association hop from a parent entity to a related table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssociationMapping {
    /// Association name on the parent (e.g. "author"); also the JSON key in rows.
    pub field_name: String,

    /// Table the association points at.
    pub target_table: String,

    /// Column on the parent side of the join (e.g. "author_id").
    pub local_column: String,

    /// Column on the target side of the join.
    #[serde(default = "default_foreign_column")]
    pub foreign_column: String,
}

fn default_foreign_column() -> String {
    "id".to_string()
}

impl AssociationMapping {
    /// Create an association joined on `local_column = target.id`.
    pub fn new(
        field_name: impl Into<String>,
        target_table: impl Into<String>,
        local_column: impl Into<String>,
    ) -> Self {
        Self {
            field_name: field_name.into(),
            target_table: target_table.into(),
            local_column: local_column.into(),
            foreign_column: default_foreign_column(),
        }
    }

    /// Override the target side join column.
    pub fn foreign_column(mut self, column: impl Into<String>) -> Self {
        self.foreign_column = column.into();
        self
    }
}

/// Describes a listable/sortable attribute of the rows in a datagrid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDescription {
    /// Name used in request parameters (`_sort_by`).
    pub name: String,

    /// Terminal scalar field.
    pub field_mapping: FieldMapping,

    /// Association hops from the root entity to the field's owner.
    #[serde(default)]
    pub parent_association_mappings: Vec<AssociationMapping>,

    /// Free-form options (`sortable`, `label`, ...).
    #[serde(default)]
    pub options: Options,
}

impl FieldDescription {
    /// Describe a field on the root entity whose name is also its column.
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            field_mapping: FieldMapping::new(name.clone()),
            name,
            parent_association_mappings: Vec::new(),
            options: Options::new(),
        }
    }

    /// Point the description at another column.
    pub fn field(mut self, field_name: impl Into<String>) -> Self {
        self.field_mapping = FieldMapping::new(field_name);
        self
    }

    /// Append an association hop.
    pub fn through(mut self, association: AssociationMapping) -> Self {
        self.parent_association_mappings.push(association);
        self
    }

    /// Mark the field sortable.
    pub fn sortable(self) -> Self {
        self.with_option("sortable", true)
    }

    /// Set an option.
    pub fn with_option(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.options.insert(name.to_string(), value.into());
        self
    }

    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// A field is sortable when its `sortable` option is set to anything but `false`.
    pub fn is_sortable(&self) -> bool {
        self.option("sortable")
            .is_some_and(|v| !matches!(v, Value::Null | Value::Bool(false)))
    }

    /// The name the datagrid sorts under: the `sortable` option when it is a
    /// string, the field name otherwise.
    pub fn sort_name(&self) -> &str {
        self.option("sortable")
            .and_then(Value::as_str)
            .unwrap_or(&self.name)
    }

    /// Dotted path from the root entity, e.g. `author.name`.
    pub fn path(&self) -> String {
        self.parent_association_mappings
            .iter()
            .map(|m| m.field_name.as_str())
            .chain(std::iter::once(self.field_mapping.field_name.as_str()))
            .collect::<Vec<_>>()
            .join(".")
    }

    /// Extract this field's value from a row, following the association path.
    ///
    /// Missing keys along the way yield `None`.
    pub fn value<'a>(&self, row: &'a Value) -> Option<&'a Value> {
        let mut current = row;
        for association in &self.parent_association_mappings {
            current = current.get(&association.field_name)?;
        }
        current.get(&self.field_mapping.field_name)
    }
}
