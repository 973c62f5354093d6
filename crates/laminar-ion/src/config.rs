//! Table configuration.
//!
//! [`TableProperties`] is the raw string key/value surface a table is
//! declared with. [`TableConfig::from_properties`] resolves it once, at
//! bind time, into typed settings:
//!
//! | Key | Default |
//! |-----|---------|
//! | `columns` | required |
//! | `columns.types` | required |
//! | `ion.encoding` | `binary` |
//! | `ion.fail_on_overflow` | `true` |
//! | `ion.<column>.fail_on_overflow` | table default |
//! | `ion.<column>.serialize_as` | first valid Ion type |
//! | `ion.<column>.path_extractor` | `(<column>)` |
//! | `ion.serialize_null` | `OMIT` |
//! | `ion.timestamp.serialization_offset` | `Z` |
//! | `ion.path_extractor.case_sensitive` | `false` |
//! | `ion.ignore_malformed` | `false` |

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::catalog::WireType;
use crate::error::{IonSerdeError, IonSerdeResult};
use crate::overflow::OverflowConfig;
use crate::path::SearchPath;
use crate::serializer::NullPolicy;
use crate::timestamp::TimestampOffset;
use crate::types::ColumnSchema;

/// Key of the column name list.
pub const COLUMNS: &str = "columns";
/// Key of the column type list.
pub const COLUMN_TYPES: &str = "columns.types";
/// Key of the output encoding.
pub const ENCODING: &str = "ion.encoding";
/// Key of the table-wide overflow default.
pub const FAIL_ON_OVERFLOW: &str = "ion.fail_on_overflow";
/// Key of the null policy.
pub const SERIALIZE_NULL: &str = "ion.serialize_null";
/// Key of the timestamp presentation offset.
pub const TIMESTAMP_OFFSET: &str = "ion.timestamp.serialization_offset";
/// Key of the path case-sensitivity flag.
pub const CASE_SENSITIVE: &str = "ion.path_extractor.case_sensitive";
/// Key of the ignore-malformed flag.
pub const IGNORE_MALFORMED: &str = "ion.ignore_malformed";

const COLUMN_FAIL_ON_OVERFLOW: &str = "fail_on_overflow";
const COLUMN_SERIALIZE_AS: &str = "serialize_as";
const COLUMN_PATH_EXTRACTOR: &str = "path_extractor";

/// Output encoding requested from the codec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputEncoding {
    /// Compact binary Ion.
    #[default]
    Binary,
    /// Human-readable text Ion.
    Text,
}

str_enum!(OutputEncoding, "ion.encoding", "expected binary or text",
    Binary => "binary";
    Text => "text";
);

/// Raw table properties.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableProperties {
    properties: HashMap<String, String>,
}

impl TableProperties {
    /// Empty properties.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a property.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.properties.insert(key.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Value of `key`, trimmed.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(|v| v.trim())
    }

    /// Value of a required key.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] if it is absent.
    pub fn require(&self, key: &str) -> IonSerdeResult<&str> {
        self.get(key)
            .ok_or_else(|| IonSerdeError::config(key, "required property is missing"))
    }

    /// Parses a boolean property, case-insensitively.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] for anything but
    /// `true` or `false`.
    pub fn get_bool(&self, key: &str) -> IonSerdeResult<Option<bool>> {
        self.get(key).map(|v| parse_bool(key, v)).transpose()
    }

    /// All keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        let mut keys: Vec<&str> = self.properties.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys.into_iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for TableProperties {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            properties: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

fn parse_bool(key: &str, value: &str) -> IonSerdeResult<bool> {
    if value.eq_ignore_ascii_case("true") {
        Ok(true)
    } else if value.eq_ignore_ascii_case("false") {
        Ok(false)
    } else {
        Err(IonSerdeError::config(
            key,
            format!("expected true or false, got '{value}'"),
        ))
    }
}

/// Splits `ion.<column>.<setting>` into `(column, setting)`.
fn column_key(key: &str) -> Option<(&str, &str)> {
    let rest = key.strip_prefix("ion.")?;
    [COLUMN_FAIL_ON_OVERFLOW, COLUMN_SERIALIZE_AS, COLUMN_PATH_EXTRACTOR]
        .into_iter()
        .find_map(|setting| {
            let column = rest.strip_suffix(setting)?.strip_suffix('.')?;
            (!column.is_empty()).then_some((column, setting))
        })
}

/// Resolved table configuration. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table columns.
    pub schema: ColumnSchema,
    /// Output encoding.
    pub encoding: OutputEncoding,
    /// Overflow flags.
    pub overflow: OverflowConfig,
    /// Per-column wire type overrides.
    pub serialize_as: BTreeMap<String, WireType>,
    /// Per-column search paths, in path syntax.
    pub path_extractors: BTreeMap<String, String>,
    /// Null policy.
    pub null_policy: NullPolicy,
    /// Timestamp presentation offset.
    pub timestamp_offset: TimestampOffset,
    /// Whether path steps and struct lookups are case-sensitive.
    pub case_sensitive: bool,
    /// Whether malformed documents are skipped.
    pub ignore_malformed: bool,
}

impl TableConfig {
    /// A config with every setting at its default.
    #[must_use]
    pub fn new(schema: ColumnSchema) -> Self {
        Self {
            schema,
            encoding: OutputEncoding::default(),
            overflow: OverflowConfig::default(),
            serialize_as: BTreeMap::new(),
            path_extractors: BTreeMap::new(),
            null_policy: NullPolicy::default(),
            timestamp_offset: TimestampOffset::UTC,
            case_sensitive: false,
            ignore_malformed: false,
        }
    }

    /// Resolves table properties.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] for a missing schema,
    /// an unparseable value, or a per-column key naming an unknown column.
    pub fn from_properties(properties: &TableProperties) -> IonSerdeResult<Self> {
        let schema = ColumnSchema::from_properties(
            properties.require(COLUMNS)?,
            properties.require(COLUMN_TYPES)?,
        )?;
        let mut cfg = Self::new(schema);

        if let Some(v) = properties.get(ENCODING) {
            cfg.encoding = v.parse()?;
        }
        if let Some(v) = properties.get(SERIALIZE_NULL) {
            cfg.null_policy = v.parse()?;
        }
        if let Some(v) = properties.get(TIMESTAMP_OFFSET) {
            cfg.timestamp_offset = v.parse()?;
        }
        cfg.case_sensitive = properties.get_bool(CASE_SENSITIVE)?.unwrap_or(false);
        cfg.ignore_malformed = properties.get_bool(IGNORE_MALFORMED)?.unwrap_or(false);

        let mut overflow = OverflowConfig::new(properties.get_bool(FAIL_ON_OVERFLOW)?.unwrap_or(true));
        for key in properties.keys() {
            let Some((column, setting)) = column_key(key) else {
                continue;
            };
            if cfg.schema.index_of(column).is_none() {
                return Err(IonSerdeError::config(key, format!("unknown column '{column}'")));
            }
            let value = properties.require(key)?;
            match setting {
                COLUMN_FAIL_ON_OVERFLOW => {
                    overflow = overflow.with_column(column, parse_bool(key, value)?);
                }
                COLUMN_SERIALIZE_AS => {
                    let wire: WireType = value
                        .parse()
                        .map_err(|_| IonSerdeError::config(key, format!("unknown Ion type '{value}'")))?;
                    cfg.serialize_as.insert(column.to_string(), wire);
                }
                _ => {
                    SearchPath::parse_for(key, value)?;
                    cfg.path_extractors.insert(column.to_string(), value.to_string());
                }
            }
        }
        cfg.overflow = overflow;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> TableProperties {
        TableProperties::new()
            .with(COLUMNS, "id,name,amount")
            .with(COLUMN_TYPES, "int:string:decimal(10,2)")
    }

    #[test]
    fn test_defaults() {
        let cfg = TableConfig::from_properties(&base()).unwrap();
        assert_eq!(cfg.schema.len(), 3);
        assert_eq!(cfg.encoding, OutputEncoding::Binary);
        assert_eq!(cfg.null_policy, NullPolicy::Omit);
        assert_eq!(cfg.timestamp_offset, TimestampOffset::UTC);
        assert!(cfg.overflow.fail_on_overflow("id"));
        assert!(!cfg.case_sensitive);
        assert!(!cfg.ignore_malformed);
        assert!(cfg.serialize_as.is_empty());
        assert!(cfg.path_extractors.is_empty());
    }

    #[test]
    fn test_full_properties() {
        let props = base()
            .with(ENCODING, "TEXT")
            .with(FAIL_ON_OVERFLOW, "False")
            .with("ion.id.fail_on_overflow", "TRUE")
            .with("ion.name.serialize_as", "symbol")
            .with("ion.amount.path_extractor", "(payment amount)")
            .with(SERIALIZE_NULL, "TYPED")
            .with(TIMESTAMP_OFFSET, "+01:30")
            .with(CASE_SENSITIVE, "true")
            .with(IGNORE_MALFORMED, "true");
        let cfg = TableConfig::from_properties(&props).unwrap();
        assert_eq!(cfg.encoding, OutputEncoding::Text);
        assert!(cfg.overflow.fail_on_overflow("id"));
        assert!(!cfg.overflow.fail_on_overflow("name"));
        assert_eq!(cfg.serialize_as.get("name"), Some(&WireType::Symbol));
        assert_eq!(cfg.path_extractors.get("amount").map(String::as_str), Some("(payment amount)"));
        assert_eq!(cfg.null_policy, NullPolicy::TypedNull);
        assert_eq!(cfg.timestamp_offset.minutes(), 90);
        assert!(cfg.case_sensitive);
        assert!(cfg.ignore_malformed);
    }

    #[test]
    fn test_missing_schema() {
        let err = TableConfig::from_properties(&TableProperties::new().with(COLUMNS, "a")).unwrap_err();
        assert!(matches!(err, IonSerdeError::InvalidConfiguration { ref key, .. } if key == COLUMN_TYPES));
    }

    #[test]
    fn test_bad_values() {
        for (key, value) in [
            (FAIL_ON_OVERFLOW, "yes"),
            (ENCODING, "json"),
            (SERIALIZE_NULL, "skip"),
            (TIMESTAMP_OFFSET, "1:30"),
            ("ion.id.serialize_as", "varchar"),
            ("ion.id.path_extractor", "id"),
            ("ion.id.fail_on_overflow", "1"),
        ] {
            let err = TableConfig::from_properties(&base().with(key, value));
            assert!(
                matches!(err, Err(IonSerdeError::InvalidConfiguration { .. })),
                "{key}={value} should be rejected"
            );
        }
    }

    #[test]
    fn test_wire_type_checked_at_bind() {
        // Any Ion type name parses here; the catalog checks it against the
        // column type.
        let cfg = TableConfig::from_properties(&base().with("ion.id.serialize_as", "struct")).unwrap();
        assert_eq!(cfg.serialize_as.get("id"), Some(&WireType::Struct));
    }

    #[test]
    fn test_unknown_column() {
        let err = TableConfig::from_properties(&base().with("ion.nope.serialize_as", "int")).unwrap_err();
        assert!(matches!(err, IonSerdeError::InvalidConfiguration { ref key, .. } if key == "ion.nope.serialize_as"));
    }

    #[test]
    fn test_column_key_split() {
        assert_eq!(column_key("ion.a.b.serialize_as"), Some(("a.b", "serialize_as")));
        assert_eq!(column_key("ion.fail_on_overflow"), None);
        assert_eq!(column_key("ion.path_extractor.case_sensitive"), None);
        assert_eq!(column_key("ion..path_extractor"), None);
    }

    #[test]
    fn test_config_serde() {
        let cfg = TableConfig::from_properties(&base().with(SERIALIZE_NULL, "untyped")).unwrap();
        let json = serde_json::to_string(&cfg).unwrap();
        assert!(json.contains("\"UNTYPED\""));
        let back: TableConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cfg);
    }
}
