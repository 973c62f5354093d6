//! Bound Ion tables: the row ↔ document entry points.
//!
//! [`IonTable::bind`] resolves table properties once into immutable state:
//! the [`TypeCatalog`], the [`PathExtractor`], and the [`Serializer`]
//! settings. A bound table holds no per-call state and can be shared
//! across threads; every call brings its own reader or writer.
//!
//! - [`IonTable::serialize`] writes one row as one top-level struct, column
//!   fields in schema order.
//! - [`IonTable::deserialize`] consumes one top-level value and returns a
//!   [`DecodedRow`] whose columns are converted lazily on access.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::adapter::ValueAdapter;
use crate::catalog::{SerializationChoice, TypeCatalog};
use crate::codec::{DocumentReader, DocumentWriter, ElementReader, ElementWriter};
use crate::config::{OutputEncoding, TableConfig, TableProperties};
use crate::element::{Element, IonType};
use crate::error::{IonSerdeError, IonSerdeResult};
use crate::path::{PathExtractor, RowAccumulator, SearchPath, SearchPathBinding, Slot};
use crate::serializer::Serializer;
use crate::types::{Column, ColumnSchema};
use crate::value::{RowCategory, RowValue};

/// A table bound to its configuration.
#[derive(Debug, Clone)]
pub struct IonTable {
    config: TableConfig,
    catalog: TypeCatalog,
    extractor: PathExtractor,
    serializer: Serializer,
}

impl IonTable {
    /// Binds a table from raw properties.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] for any invalid
    /// property; see [`TableConfig::from_properties`] and [`IonTable::new`].
    pub fn bind(properties: &TableProperties) -> IonSerdeResult<Self> {
        Self::new(TableConfig::from_properties(properties)?)
    }

    /// Binds a table from a resolved configuration.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] if a per-column
    /// setting names an unknown column, a wire type is not valid for its
    /// column, a search path does not parse, or two search paths overlap.
    pub fn new(config: TableConfig) -> IonSerdeResult<Self> {
        let schema = &config.schema;
        let unknown = |setting: &str, column: &str| {
            IonSerdeError::config(
                format!("ion.{column}.{setting}"),
                format!("unknown column '{column}'"),
            )
        };
        if let Some(column) = config
            .overflow
            .overridden_columns()
            .find(|c| schema.index_of(c).is_none())
        {
            return Err(unknown("fail_on_overflow", column));
        }
        if let Some(column) = config
            .path_extractors
            .keys()
            .find(|c| schema.index_of(c).is_none())
        {
            return Err(unknown("path_extractor", column));
        }

        let overrides: HashMap<String, _> = config
            .serialize_as
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();
        let catalog = TypeCatalog::new(schema, &overrides)?;

        let bindings = schema
            .columns()
            .iter()
            .enumerate()
            .map(|(index, column)| {
                let path = match config.path_extractors.get(&column.name) {
                    Some(text) => SearchPath::parse_for(&format!("ion.{}.path_extractor", column.name), text)?,
                    None => SearchPath::field(column.name.clone()),
                };
                Ok(SearchPathBinding::new(index, column.name.clone(), path))
            })
            .collect::<IonSerdeResult<Vec<_>>>()?;
        let extractor = PathExtractor::new(bindings, config.case_sensitive)?;
        let serializer = Serializer::new(config.null_policy, config.timestamp_offset);

        debug!(
            columns = schema.len(),
            encoding = %config.encoding,
            null_policy = %config.null_policy,
            offset = %config.timestamp_offset,
            case_sensitive = config.case_sensitive,
            ignore_malformed = config.ignore_malformed,
            "bound Ion table"
        );
        Ok(Self {
            config,
            catalog,
            extractor,
            serializer,
        })
    }

    /// The resolved configuration.
    #[must_use]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// The table columns.
    #[must_use]
    pub fn schema(&self) -> &ColumnSchema {
        &self.config.schema
    }

    /// The resolved serialization choices.
    #[must_use]
    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    /// The encoding to request from the codec.
    #[must_use]
    pub fn encoding(&self) -> OutputEncoding {
        self.config.encoding
    }

    // ── Write ──────────────────────────────────────────────────────

    /// Writes `row` as one top-level struct.
    ///
    /// `row` must be a struct value; columns are looked up by name, and a
    /// missing column is treated as null.
    ///
    /// # Errors
    ///
    /// Any conversion or writer error aborts the row; the writer should be
    /// discarded.
    pub fn serialize(&self, row: &RowValue, writer: &mut dyn DocumentWriter) -> IonSerdeResult<()> {
        if row.category() != RowCategory::Struct {
            return Err(IonSerdeError::mismatch("struct row", row.kind_name()));
        }
        writer.step_in(IonType::Struct)?;
        for (index, column) in self.schema().columns().iter().enumerate() {
            let value = row.field(&column.name).unwrap_or(&RowValue::Null);
            let wire = self
                .catalog
                .resolve(index)
                .and_then(|c: SerializationChoice| c.wire_type());
            self.serializer
                .serialize_field(writer, &column.name, value, &column.data_type, wire)?;
        }
        writer.step_out()
    }

    /// Serializes `row` into an in-memory element.
    ///
    /// # Errors
    ///
    /// See [`serialize`](Self::serialize).
    pub fn serialize_element(&self, row: &RowValue) -> IonSerdeResult<Element> {
        let mut writer = ElementWriter::new();
        self.serialize(row, &mut writer)?;
        writer
            .finish()?
            .pop()
            .ok_or_else(|| IonSerdeError::Codec("writer produced no value".into()))
    }

    // ── Read ───────────────────────────────────────────────────────

    /// Reads the next top-level value of `reader` into a row.
    ///
    /// Returns `None` when the reader is exhausted, or when the document
    /// is malformed and the table ignores malformed input.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::MalformedInput`] for a malformed document
    /// unless ignored, and propagates other reader errors.
    pub fn deserialize(&self, reader: &mut dyn DocumentReader) -> IonSerdeResult<Option<DecodedRow<'_>>> {
        let mut slots = RowAccumulator::new(self.schema().len());
        match self.extractor.extract(reader, &mut slots) {
            Ok(true) => Ok(Some(DecodedRow { table: self, slots })),
            Ok(false) => Ok(None),
            Err(e) if e.is_malformed() && self.config.ignore_malformed => {
                warn!(error = %e, "skipping malformed Ion document");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Reads a single in-memory document.
    ///
    /// # Errors
    ///
    /// See [`deserialize`](Self::deserialize).
    pub fn deserialize_element(&self, document: &Element) -> IonSerdeResult<Option<DecodedRow<'_>>> {
        let stream = std::slice::from_ref(document);
        let mut reader = ElementReader::new(stream);
        self.deserialize(&mut reader)
    }

    fn fail_on_overflow(&self, column: &Column) -> bool {
        self.config.overflow.fail_on_overflow(&column.name)
    }
}

/// One decoded document. Columns are converted on access.
#[derive(Debug, Clone)]
pub struct DecodedRow<'t> {
    table: &'t IonTable,
    slots: RowAccumulator,
}

impl<'t> DecodedRow<'t> {
    /// The table this row was read with.
    #[must_use]
    pub fn table(&self) -> &'t IonTable {
        self.table
    }

    /// Raw slot of the column at `index`.
    #[must_use]
    pub fn slot(&self, index: usize) -> &Slot {
        self.slots.get(index)
    }

    /// Returns `true` if no path matched `column` (or it is unknown).
    #[must_use]
    pub fn is_absent(&self, column: &str) -> bool {
        self.table
            .schema()
            .index_of(column)
            .map_or(true, |i| matches!(self.slots.get(i), Slot::Absent))
    }

    /// Deferred adapter for a matched, non-null column.
    #[must_use]
    pub fn adapter(&self, index: usize) -> Option<ValueAdapter<'_>> {
        let column = self.table.schema().column(index)?;
        match self.slots.get(index) {
            Slot::Value(element) => Some(ValueAdapter::new(
                element,
                &column.data_type,
                self.table.fail_on_overflow(column),
                self.table.config.case_sensitive,
            )),
            Slot::Absent | Slot::Null => None,
        }
    }

    /// Converts the column at `index`; `None` if it is absent.
    ///
    /// # Errors
    ///
    /// See [`ValueAdapter::adapt`].
    pub fn get_index(&self, index: usize) -> IonSerdeResult<Option<RowValue>> {
        match self.slots.get(index) {
            Slot::Absent => Ok(None),
            Slot::Null => Ok(Some(RowValue::Null)),
            Slot::Value(_) => self.adapter(index).map(|a| a.adapt()).transpose(),
        }
    }

    /// Converts the named column; `None` if it is absent or unknown.
    ///
    /// # Errors
    ///
    /// See [`ValueAdapter::adapt`].
    pub fn get(&self, column: &str) -> IonSerdeResult<Option<RowValue>> {
        match self.table.schema().index_of(column) {
            Some(index) => self.get_index(index),
            None => Ok(None),
        }
    }

    /// Converts every column in schema order; absent columns are null.
    ///
    /// # Errors
    ///
    /// Returns the first conversion error.
    pub fn values(&self) -> IonSerdeResult<Vec<RowValue>> {
        (0..self.slots.len())
            .map(|i| Ok(self.get_index(i)?.unwrap_or(RowValue::Null)))
            .collect()
    }

    /// The row as a struct value; absent columns are null.
    ///
    /// # Errors
    ///
    /// See [`values`](Self::values).
    pub fn to_row(&self) -> IonSerdeResult<RowValue> {
        let names = self.table.schema().columns().iter().map(|c| c.name.clone());
        Ok(RowValue::Struct(names.zip(self.values()?).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::WireType;
    use crate::config::{COLUMNS, COLUMN_TYPES, IGNORE_MALFORMED};
    use crate::element::Value;

    fn props(names: &str, types: &str) -> TableProperties {
        TableProperties::new().with(COLUMNS, names).with(COLUMN_TYPES, types)
    }

    #[test]
    fn test_bind_resolves_catalog() {
        let table = IonTable::bind(&props("a,b", "string:array<int>").with("ion.a.serialize_as", "symbol")).unwrap();
        assert_eq!(table.catalog().resolve(0).unwrap().wire_type(), Some(WireType::Symbol));
        assert_eq!(table.catalog().resolve(1).unwrap().wire_type(), Some(WireType::List));
        assert_eq!(table.encoding(), OutputEncoding::Binary);
    }

    #[test]
    fn test_bind_rejects_invalid_wire_type() {
        let err = IonTable::bind(&props("a", "int").with("ion.a.serialize_as", "string")).unwrap_err();
        assert!(matches!(err, IonSerdeError::InvalidConfiguration { ref key, .. } if key == "ion.a.serialize_as"));
    }

    #[test]
    fn test_bind_rejects_overlapping_paths() {
        let err = IonTable::bind(&props("a,b", "int:int").with("ion.b.path_extractor", "(a)")).unwrap_err();
        assert!(matches!(err, IonSerdeError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_new_rejects_unknown_override_columns() {
        let schema = ColumnSchema::from_properties("a", "int").unwrap();
        let mut config = TableConfig::new(schema);
        config.overflow = config.overflow.clone().with_column("zz", false);
        let err = IonTable::new(config).unwrap_err();
        assert!(matches!(err, IonSerdeError::InvalidConfiguration { ref key, .. } if key == "ion.zz.fail_on_overflow"));
    }

    #[test]
    fn test_serialize_requires_struct_row() {
        let table = IonTable::bind(&props("a", "int")).unwrap();
        let err = table.serialize_element(&RowValue::Int(1)).unwrap_err();
        assert!(matches!(err, IonSerdeError::TypeMismatch { .. }));
    }

    #[test]
    fn test_serialize_schema_order() {
        let table = IonTable::bind(&props("b,a", "int:string")).unwrap();
        let row = RowValue::structure([("a", RowValue::String("x".into())), ("b", RowValue::Int(1))]);
        let out = table.serialize_element(&row).unwrap();
        let names: Vec<&str> = out.fields().iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_custom_path_and_lazy_errors() {
        let table = IonTable::bind(
            &props("city,n", "string:tinyint").with("ion.city.path_extractor", "(address city)"),
        )
        .unwrap();
        let doc = Element::structure([
            ("address", Element::structure([("City", Element::from("Oslo"))])),
            ("n", Element::from(1000)),
        ]);
        let row = table.deserialize_element(&doc).unwrap().unwrap();
        assert_eq!(row.get("city").unwrap(), Some(RowValue::String("Oslo".into())));
        assert!(matches!(row.get("n"), Err(IonSerdeError::Overflow { .. })));
        assert_eq!(row.get("missing").unwrap(), None);
        assert!(row.is_absent("missing"));
        assert!(row.values().is_err());
    }

    #[test]
    fn test_null_and_absent_slots() {
        let table = IonTable::bind(&props("a,b", "int:int")).unwrap();
        let doc = Element::structure([("a", Element::typed_null(IonType::Int))]);
        let row = table.deserialize_element(&doc).unwrap().unwrap();
        assert_eq!(row.slot(0), &Slot::Null);
        assert_eq!(row.get("a").unwrap(), Some(RowValue::Null));
        assert!(row.is_absent("b"));
        assert_eq!(row.values().unwrap(), vec![RowValue::Null, RowValue::Null]);
    }

    #[test]
    fn test_ignore_malformed_flag_only_swallows_malformed() {
        struct Broken;
        impl DocumentReader for Broken {
            fn next(&mut self) -> IonSerdeResult<Option<IonType>> {
                Err(IonSerdeError::MalformedInput("truncated".into()))
            }
            fn ion_type(&self) -> Option<IonType> {
                None
            }
            fn is_null(&self) -> bool {
                false
            }
            fn field_name(&self) -> Option<&str> {
                None
            }
            fn annotations(&self) -> &[String] {
                &[]
            }
            fn depth(&self) -> usize {
                0
            }
            fn step_in(&mut self) -> IonSerdeResult<()> {
                Err(IonSerdeError::Codec("no value".into()))
            }
            fn step_out(&mut self) -> IonSerdeResult<()> {
                Err(IonSerdeError::Codec("top level".into()))
            }
            fn read_element(&mut self) -> IonSerdeResult<Element> {
                Err(IonSerdeError::Codec("no value".into()))
            }
        }

        let strict = IonTable::bind(&props("a", "int")).unwrap();
        assert!(matches!(strict.deserialize(&mut Broken), Err(IonSerdeError::MalformedInput(_))));

        let lenient = IonTable::bind(&props("a", "int").with(IGNORE_MALFORMED, "true")).unwrap();
        assert!(lenient.deserialize(&mut Broken).unwrap().is_none());
    }

    #[test]
    fn test_to_row() {
        let table = IonTable::bind(&props("a,b", "boolean:binary")).unwrap();
        let doc = Element::structure([("b", Element::new(Value::Blob(vec![9])))]);
        let row = table.deserialize_element(&doc).unwrap().unwrap();
        assert_eq!(
            row.to_row().unwrap(),
            RowValue::structure([("a", RowValue::Null), ("b", RowValue::Binary(vec![9]))])
        );
    }
}
