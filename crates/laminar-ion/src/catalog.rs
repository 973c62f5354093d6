//! Type catalog: which Ion types a row-model type may serialize as.
//!
//! | Declared type | Allowed Ion types (first is default) |
//! |---------------|--------------------------------------|
//! | `boolean` | `bool` |
//! | `tinyint` / `smallint` / `int` / `bigint` | `int` |
//! | `float` / `double` | `float` |
//! | `decimal` | `decimal`, `int` |
//! | `date` / `timestamp` | `timestamp` |
//! | `char` / `varchar` / `string` | `string`, `symbol` |
//! | `binary` | `blob`, `clob` |
//! | `array` | `list`, `sexp` |
//! | `map` / `struct` | `struct` |
//!
//! A `uniontype` has no column-level choice; each variant serializes with
//! its own default.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::element::IonType;
use crate::error::{IonSerdeError, IonSerdeResult};
use crate::types::{ColumnSchema, TypeDescriptor};

/// Ion type a column serializes as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireType {
    /// `bool`
    Bool,
    /// `int`
    Int,
    /// `float`
    Float,
    /// `decimal`
    Decimal,
    /// `timestamp`
    Timestamp,
    /// `string`
    String,
    /// `symbol`
    Symbol,
    /// `blob`
    Blob,
    /// `clob`
    Clob,
    /// `list`
    List,
    /// `sexp`
    SExp,
    /// `struct`
    Struct,
}

str_enum!(WireType, "serialize_as", "unknown Ion type",
    Bool => "bool", "boolean";
    Int => "int", "integer";
    Float => "float";
    Decimal => "decimal";
    Timestamp => "timestamp";
    String => "string";
    Symbol => "symbol";
    Blob => "blob";
    Clob => "clob";
    List => "list";
    SExp => "sexp";
    Struct => "struct";
);

impl WireType {
    /// The Ion type written for this choice.
    #[must_use]
    pub fn ion_type(self) -> IonType {
        match self {
            Self::Bool => IonType::Bool,
            Self::Int => IonType::Int,
            Self::Float => IonType::Float,
            Self::Decimal => IonType::Decimal,
            Self::Timestamp => IonType::Timestamp,
            Self::String => IonType::String,
            Self::Symbol => IonType::Symbol,
            Self::Blob => IonType::Blob,
            Self::Clob => IonType::Clob,
            Self::List => IonType::List,
            Self::SExp => IonType::SExp,
            Self::Struct => IonType::Struct,
        }
    }
}

/// Allowed wire types for a declared type; the first entry is the default.
#[must_use]
pub fn valid_wire_types(declared: &TypeDescriptor) -> &'static [WireType] {
    match declared {
        TypeDescriptor::Boolean => &[WireType::Bool],
        TypeDescriptor::TinyInt
        | TypeDescriptor::SmallInt
        | TypeDescriptor::Int
        | TypeDescriptor::BigInt => &[WireType::Int],
        TypeDescriptor::Float | TypeDescriptor::Double => &[WireType::Float],
        TypeDescriptor::Decimal { .. } => &[WireType::Decimal, WireType::Int],
        TypeDescriptor::Date | TypeDescriptor::Timestamp => &[WireType::Timestamp],
        TypeDescriptor::Char(_) | TypeDescriptor::Varchar(_) | TypeDescriptor::String => {
            &[WireType::String, WireType::Symbol]
        }
        TypeDescriptor::Binary => &[WireType::Blob, WireType::Clob],
        TypeDescriptor::List(_) => &[WireType::List, WireType::SExp],
        TypeDescriptor::Map(_) | TypeDescriptor::Struct(_) => &[WireType::Struct],
        TypeDescriptor::Union(_) => &[],
    }
}

/// Resolved wire type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializationChoice {
    wire_type: Option<WireType>,
}

impl SerializationChoice {
    /// The default choice for a declared type.
    #[must_use]
    pub fn default_for(declared: &TypeDescriptor) -> Self {
        Self {
            wire_type: valid_wire_types(declared).first().copied(),
        }
    }

    /// Resolves `(declared, override)` into a choice.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] if the override is
    /// not allowed for the declared type.
    pub fn resolve(
        column: &str,
        declared: &TypeDescriptor,
        requested: Option<WireType>,
    ) -> IonSerdeResult<Self> {
        let Some(requested) = requested else {
            return Ok(Self::default_for(declared));
        };
        let allowed = valid_wire_types(declared);
        if allowed.contains(&requested) {
            Ok(Self {
                wire_type: Some(requested),
            })
        } else {
            Err(IonSerdeError::config(
                format!("ion.{column}.serialize_as"),
                format!("{declared} cannot be serialized as {requested}"),
            ))
        }
    }

    /// The wire type; `None` for unions, which choose per variant.
    #[must_use]
    pub fn wire_type(&self) -> Option<WireType> {
        self.wire_type
    }
}

/// Per-column serialization choices, resolved once at bind time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeCatalog {
    choices: Vec<SerializationChoice>,
}

impl TypeCatalog {
    /// Resolves every column of `schema` against `overrides` (keyed by
    /// column name).
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] if an override names
    /// an unknown column or an invalid wire type.
    pub fn new(schema: &ColumnSchema, overrides: &HashMap<String, WireType>) -> IonSerdeResult<Self> {
        for name in overrides.keys() {
            if schema.index_of(name).is_none() {
                return Err(IonSerdeError::config(
                    format!("ion.{name}.serialize_as"),
                    format!("unknown column '{name}'"),
                ));
            }
        }
        let choices = schema
            .columns()
            .iter()
            .map(|col| {
                let choice = SerializationChoice::resolve(
                    &col.name,
                    &col.data_type,
                    overrides.get(&col.name).copied(),
                )?;
                debug!(column = %col.name, data_type = %col.data_type, wire_type = ?choice.wire_type, "resolved serialization choice");
                Ok(choice)
            })
            .collect::<IonSerdeResult<Vec<_>>>()?;
        Ok(Self { choices })
    }

    /// Choice for the column at `column_index`.
    #[must_use]
    pub fn resolve(&self, column_index: usize) -> Option<SerializationChoice> {
        self.choices.get(column_index).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Column;

    fn schema() -> ColumnSchema {
        ColumnSchema::new(vec![
            Column::new("name", TypeDescriptor::String),
            Column::new("amount", TypeDescriptor::decimal(10, 2)),
            Column::new("tags", TypeDescriptor::list(TypeDescriptor::String)),
            Column::new("u", TypeDescriptor::Union(vec![TypeDescriptor::Int])),
        ])
        .unwrap()
    }

    #[test]
    fn test_defaults_are_first_valid() {
        let catalog = TypeCatalog::new(&schema(), &HashMap::new()).unwrap();
        assert_eq!(catalog.resolve(0).unwrap().wire_type(), Some(WireType::String));
        assert_eq!(catalog.resolve(1).unwrap().wire_type(), Some(WireType::Decimal));
        assert_eq!(catalog.resolve(2).unwrap().wire_type(), Some(WireType::List));
        assert_eq!(catalog.resolve(3).unwrap().wire_type(), None);
        assert!(catalog.resolve(4).is_none());
    }

    #[test]
    fn test_valid_overrides() {
        let overrides = HashMap::from([
            ("name".to_string(), WireType::Symbol),
            ("amount".to_string(), WireType::Int),
            ("tags".to_string(), WireType::SExp),
        ]);
        let catalog = TypeCatalog::new(&schema(), &overrides).unwrap();
        assert_eq!(catalog.resolve(0).unwrap().wire_type(), Some(WireType::Symbol));
        assert_eq!(catalog.resolve(1).unwrap().wire_type(), Some(WireType::Int));
        assert_eq!(catalog.resolve(2).unwrap().wire_type(), Some(WireType::SExp));
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let overrides = HashMap::from([("name".to_string(), WireType::Symbol)]);
        let catalog = TypeCatalog::new(&schema(), &overrides).unwrap();
        assert_eq!(catalog.resolve(0), catalog.resolve(0));
        let again = TypeCatalog::new(&schema(), &overrides).unwrap();
        assert_eq!(catalog, again);
    }

    #[test]
    fn test_invalid_override_rejected() {
        let overrides = HashMap::from([("name".to_string(), WireType::Blob)]);
        let err = TypeCatalog::new(&schema(), &overrides).unwrap_err();
        assert!(matches!(err, IonSerdeError::InvalidConfiguration { ref key, .. } if key == "ion.name.serialize_as"));

        let overrides = HashMap::from([("u".to_string(), WireType::Int)]);
        assert!(TypeCatalog::new(&schema(), &overrides).is_err());
    }

    #[test]
    fn test_unknown_column_rejected() {
        let overrides = HashMap::from([("missing".to_string(), WireType::Int)]);
        assert!(TypeCatalog::new(&schema(), &overrides).is_err());
    }

    #[test]
    fn test_wire_type_parse() {
        assert_eq!("SYMBOL".parse::<WireType>().unwrap(), WireType::Symbol);
        assert_eq!("boolean".parse::<WireType>().unwrap(), WireType::Bool);
        assert_eq!(WireType::SExp.to_string(), "sexp");
        assert!("varchar".parse::<WireType>().is_err());
    }

    #[test]
    fn test_validity_table() {
        assert_eq!(valid_wire_types(&TypeDescriptor::Binary), &[WireType::Blob, WireType::Clob]);
        assert_eq!(valid_wire_types(&TypeDescriptor::Date), &[WireType::Timestamp]);
        assert_eq!(
            valid_wire_types(&TypeDescriptor::map(TypeDescriptor::Int)),
            &[WireType::Struct]
        );
    }
}
