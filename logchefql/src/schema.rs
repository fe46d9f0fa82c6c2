//! Table schema descriptors used by the SQL generator.
//!
//! The tokenizer and parser never look at a schema; only field access generation
//! does. Declared types are free-form backend type strings such as
//! `Map(String, String)`, `JSON`, `LowCardinality(String)` or `DateTime64(3)`.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use validator::Validate;

/// A single column and its declared backend type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct ColumnInfo {
    /// Column name.
    #[validate(length(min = 1, message = "Column name cannot be empty"))]
    pub name: String,

    /// Declared backend type.
    #[serde(rename = "type")]
    pub declared_type: String,
}

impl ColumnInfo {
    /// Creates a new column descriptor.
    #[must_use]
    pub fn new(name: impl Into<String>, declared_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
        }
    }
}

/// How a column's nested data is accessed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// An associative array, accessed with `col['key']`.
    Map,
    /// A JSON column.
    Json,
    /// Any other declared type.
    Other,
    /// The column is not in the schema.
    Unknown,
}

/// Errors that can occur when loading a schema.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// The schema document is not valid JSON.
    #[error("Invalid schema JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// A column failed validation.
    #[error("Invalid schema: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Ordered column list of the table being queried.
///
/// # Example
///
/// ```
/// use logchefql::schema::{ColumnKind, SchemaInfo};
///
/// let schema = SchemaInfo::from_json(
///     r#"{"columns": [{"name": "log_attributes", "type": "Map(String, String)"}]}"#,
/// )
/// .unwrap();
/// assert_eq!(schema.column_kind("log_attributes"), ColumnKind::Map);
/// assert_eq!(schema.column_kind("missing"), ColumnKind::Unknown);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct SchemaInfo {
    /// Columns in table order.
    #[validate(nested)]
    pub columns: Vec<ColumnInfo>,
}

impl SchemaInfo {
    /// Creates a schema from `(name, type)` pairs.
    #[must_use]
    pub fn new<N, T>(columns: impl IntoIterator<Item = (N, T)>) -> Self
    where
        N: Into<String>,
        T: Into<String>,
    {
        Self {
            columns: columns
                .into_iter()
                .map(|(name, declared_type)| ColumnInfo::new(name, declared_type))
                .collect(),
        }
    }

    /// Parses and validates a schema from its JSON form (`{"columns": [...]}`).
    ///
    /// # Errors
    ///
    /// Returns an error if the JSON is malformed or a column name is empty.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        let schema: Self = serde_json::from_str(json)?;
        schema.validate()?;
        Ok(schema)
    }

    /// Looks up a column by exact name.
    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnInfo> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Classifies a column by its declared type.
    #[must_use]
    pub fn column_kind(&self, name: &str) -> ColumnKind {
        self.column(name)
            .map_or(ColumnKind::Unknown, |c| classify(&c.declared_type))
    }
}

/// Classifies a declared type, looking through `Nullable(...)` and `LowCardinality(...)`.
fn classify(declared_type: &str) -> ColumnKind {
    let mut inner = declared_type.trim();
    loop {
        let unwrapped = ["Nullable(", "LowCardinality("]
            .iter()
            .find_map(|wrapper| inner.strip_prefix(wrapper))
            .and_then(|rest| rest.strip_suffix(')'));
        match unwrapped {
            Some(rest) => inner = rest.trim(),
            None => break,
        }
    }

    if inner.starts_with("Map(") {
        ColumnKind::Map
    } else if inner.starts_with("JSON") || inner.starts_with("Object(") {
        ColumnKind::Json
    } else {
        ColumnKind::Other
    }
}
