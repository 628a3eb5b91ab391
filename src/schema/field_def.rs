// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Logical type of an attribute (column) carried by records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Integer,
    Integer64,
    Float,
    String,
    Binary,
    Date,
    Time,
    DateTime,
}

impl DataType {
    /// Infer the data type of a JSON attribute value.
    ///
    /// Booleans are treated as integers; anything that is not a number is
    /// reported as a string.
    pub fn of(value: &Value) -> DataType {
        match value {
            Value::Bool(_) => DataType::Integer,
            Value::Number(n) if n.is_i64() || n.is_u64() => match n.as_i64() {
                Some(v) if i32::try_from(v).is_ok() => DataType::Integer,
                _ => DataType::Integer64,
            },
            Value::Number(_) => DataType::Float,
            _ => DataType::String,
        }
    }
}

/// Metadata of one attribute of a schema.
///
/// Immutable by convention: once a field is part of a [`SchemaDef`](super::SchemaDef)
/// it is only ever copied, never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub data_type: DataType,
    #[serde(default)]
    pub precision: u32,
    #[serde(default)]
    pub width: u32,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: Option<Value>,
}

fn default_nullable() -> bool {
    true
}

impl FieldDef {
    /// A nullable field with no precision, width or default value.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
            precision: 0,
            width: 0,
            nullable: true,
            default_value: None,
        }
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default_value = Some(value);
        self
    }

    pub fn with_nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn with_width(mut self, width: u32, precision: u32) -> Self {
        self.width = width;
        self.precision = precision;
        self
    }

    /// Case-insensitive name comparison used for schema uniqueness.
    pub fn same_name(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

impl std::fmt::Display for FieldDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Name = {}, DataType = {:?}, Precision = {}, Width = {}, Nullable = {}, Default = {:?}",
            self.name, self.data_type, self.precision, self.width, self.nullable, self.default_value
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_data_type_of_values() {
        let cases = vec![
            (json!(1), DataType::Integer),
            (json!(5_000_000_000i64), DataType::Integer64),
            (json!(1.5), DataType::Float),
            (json!("text"), DataType::String),
            (json!(true), DataType::Integer),
            (json!(null), DataType::String),
        ];

        for (value, expected) in cases {
            assert_eq!(DataType::of(&value), expected, "value {}", value);
        }
    }

    #[test]
    fn test_same_name_ignores_case() {
        let field = FieldDef::new("Name", DataType::String);
        assert!(field.same_name("NAME"));
        assert!(field.same_name("name"));
        assert!(!field.same_name("names"));
    }
}
