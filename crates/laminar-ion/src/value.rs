//! Row-model values.
//!
//! [`RowValue`] is the tagged representation of one value of the host
//! engine's row model. The serializer only reads through it: category,
//! primitive sub-kind, and the container accessors below mirror the
//! reflection capability the engine exposes.

use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};

/// Coarse category of a row value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowCategory {
    /// SQL NULL.
    Null,
    /// Any non-container value.
    Primitive,
    /// Ordered sequence.
    List,
    /// Key/value pairs.
    Map,
    /// Named fields.
    Struct,
    /// Tagged union value.
    Union,
}

/// One row-model value.
#[derive(Debug, Clone, PartialEq)]
pub enum RowValue {
    /// SQL NULL.
    Null,
    /// `boolean`
    Boolean(bool),
    /// `tinyint`
    TinyInt(i8),
    /// `smallint`
    SmallInt(i16),
    /// `int`
    Int(i32),
    /// `bigint`
    BigInt(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// `decimal(p,s)`
    Decimal(BigDecimal),
    /// `char(n)`
    Char(String),
    /// `varchar(n)`
    Varchar(String),
    /// `string`
    String(String),
    /// `binary`
    Binary(Vec<u8>),
    /// `date`
    Date(NaiveDate),
    /// `timestamp` (zone-less, interpreted as UTC)
    Timestamp(NaiveDateTime),
    /// `array<T>`
    List(Vec<RowValue>),
    /// `map<K,V>`; keys are expected to be text.
    Map(Vec<(RowValue, RowValue)>),
    /// `struct<...>`, fields in declaration order.
    Struct(Vec<(String, RowValue)>),
    /// `uniontype<...>` with an explicit active variant.
    Union {
        /// Index of the active variant.
        tag: u8,
        /// The variant's value.
        value: Box<RowValue>,
    },
}

impl RowValue {
    /// Convenience constructor for a struct from `(name, value)` pairs.
    #[must_use]
    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, RowValue)>) -> Self {
        Self::Struct(fields.into_iter().map(|(n, v)| (n.into(), v)).collect())
    }

    /// Convenience constructor for a union value.
    #[must_use]
    pub fn union(tag: u8, value: RowValue) -> Self {
        Self::Union {
            tag,
            value: Box::new(value),
        }
    }

    /// Category of this value.
    #[must_use]
    pub fn category(&self) -> RowCategory {
        match self {
            Self::Null => RowCategory::Null,
            Self::List(_) => RowCategory::List,
            Self::Map(_) => RowCategory::Map,
            Self::Struct(_) => RowCategory::Struct,
            Self::Union { .. } => RowCategory::Union,
            _ => RowCategory::Primitive,
        }
    }

    /// Returns `true` for [`RowValue::Null`].
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Name of the runtime kind, used in error messages.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Boolean(_) => "boolean",
            Self::TinyInt(_) => "tinyint",
            Self::SmallInt(_) => "smallint",
            Self::Int(_) => "int",
            Self::BigInt(_) => "bigint",
            Self::Float(_) => "float",
            Self::Double(_) => "double",
            Self::Decimal(_) => "decimal",
            Self::Char(_) => "char",
            Self::Varchar(_) => "varchar",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
            Self::Date(_) => "date",
            Self::Timestamp(_) => "timestamp",
            Self::List(_) => "array",
            Self::Map(_) => "map",
            Self::Struct(_) => "struct",
            Self::Union { .. } => "uniontype",
        }
    }

    /// Field of a struct value by exact name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&RowValue> {
        match self {
            Self::Struct(fields) => fields.iter().find(|(n, _)| n == name).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Element of a list value.
    #[must_use]
    pub fn element(&self, index: usize) -> Option<&RowValue> {
        match self {
            Self::List(items) => items.get(index),
            _ => None,
        }
    }

    /// Number of children of a container value; zero for primitives.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::List(items) => items.len(),
            Self::Map(entries) => entries.len(),
            Self::Struct(fields) => fields.len(),
            _ => 0,
        }
    }

    /// Returns `true` when [`len`](Self::len) is zero.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries of a map value.
    #[must_use]
    pub fn map_entries(&self) -> &[(RowValue, RowValue)] {
        match self {
            Self::Map(entries) => entries,
            _ => &[],
        }
    }

    /// Active variant index of a union value.
    #[must_use]
    pub fn union_tag(&self) -> Option<u8> {
        match self {
            Self::Union { tag, .. } => Some(*tag),
            _ => None,
        }
    }

    /// Text content of a `char` / `varchar` / `string` value.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Char(s) | Self::Varchar(s) | Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Integer-family content widened to `i64`.
    #[must_use]
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::TinyInt(v) => Some(i64::from(*v)),
            Self::SmallInt(v) => Some(i64::from(*v)),
            Self::Int(v) => Some(i64::from(*v)),
            Self::BigInt(v) => Some(*v),
            _ => None,
        }
    }
}

impl fmt::Display for RowValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("NULL"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::TinyInt(v) => write!(f, "{v}"),
            Self::SmallInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::BigInt(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Double(v) => write!(f, "{v}"),
            Self::Decimal(d) => write!(f, "{d}"),
            Self::Char(s) | Self::Varchar(s) | Self::String(s) => write!(f, "{s:?}"),
            Self::Binary(b) => write!(f, "<{} bytes>", b.len()),
            Self::Date(d) => write!(f, "{d}"),
            Self::Timestamp(ts) => write!(f, "{ts}"),
            Self::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, v)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{name}: {v}")?;
                }
                f.write_str("}")
            }
            Self::Union { tag, value } => write!(f, "{tag}:{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories() {
        assert_eq!(RowValue::Null.category(), RowCategory::Null);
        assert_eq!(RowValue::Int(1).category(), RowCategory::Primitive);
        assert_eq!(RowValue::List(vec![]).category(), RowCategory::List);
        assert_eq!(RowValue::Map(vec![]).category(), RowCategory::Map);
        assert_eq!(
            RowValue::union(1, RowValue::String("x".into())).category(),
            RowCategory::Union
        );
    }

    #[test]
    fn test_accessors() {
        let row = RowValue::structure([
            ("id", RowValue::Int(7)),
            ("tags", RowValue::List(vec![RowValue::String("a".into())])),
        ]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.field("id"), Some(&RowValue::Int(7)));
        assert!(row.field("ID").is_none());
        let tags = row.field("tags").unwrap();
        assert_eq!(tags.element(0).and_then(RowValue::as_text), Some("a"));
        assert!(tags.element(1).is_none());
    }

    #[test]
    fn test_as_i64_widens() {
        assert_eq!(RowValue::TinyInt(-3).as_i64(), Some(-3));
        assert_eq!(RowValue::BigInt(i64::MAX).as_i64(), Some(i64::MAX));
        assert_eq!(RowValue::Double(1.0).as_i64(), None);
    }

    #[test]
    fn test_display() {
        let v = RowValue::structure([("n", RowValue::union(0, RowValue::Int(3)))]);
        assert_eq!(v.to_string(), "{n: 0:3}");
    }
}
