//! # `LaminarDB` Ion
//!
//! Adapts Amazon Ion documents to and from the statically-typed row model
//! of `LaminarDB` tables.
//!
//! A table is bound once from string properties ([`IonTable::bind`]).
//! Binding resolves every column's wire type, overflow policy, and search
//! path into immutable state; rows are then serialized into one top-level
//! Ion struct each, and documents are deserialized into lazily converted
//! [`DecodedRow`]s.
//!
//! ```
//! use laminar_ion::{Element, IonTable, RowValue, TableProperties};
//!
//! let table = IonTable::bind(
//!     &TableProperties::new()
//!         .with("columns", "id,name")
//!         .with("columns.types", "int:string"),
//! )
//! .unwrap();
//!
//! let doc = Element::structure([("id", Element::from(7)), ("name", Element::from("ion"))]);
//! let row = table.deserialize_element(&doc).unwrap().unwrap();
//! assert_eq!(row.get("id").unwrap(), Some(RowValue::Int(7)));
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]

#[macro_use]
mod macros;

/// Error taxonomy
pub mod error;

/// Row-model type descriptors and schemas
pub mod types;

/// Row-model values
pub mod value;

/// In-memory Ion value tree
pub mod element;

/// Reader/writer cursor traits and tree-backed cursors
pub mod codec;

/// Per-column wire type resolution
pub mod catalog;

/// Narrowing conversion rules
pub mod overflow;

/// Timestamp offset handling
pub mod timestamp;

/// Case-insensitive container access
pub mod view;

/// Search paths and single-pass extraction
pub mod path;

/// Ion to row-model conversion
pub mod adapter;

/// Row-model to Ion dispatch
pub mod serializer;

/// Table property resolution
pub mod config;

/// Bound tables and decoded rows
pub mod table;

/// Arrow `RecordBatch` bridge
pub mod arrow;

pub use catalog::{SerializationChoice, TypeCatalog, WireType};
pub use codec::{DocumentReader, DocumentWriter, ElementReader, ElementWriter};
pub use config::{OutputEncoding, TableConfig, TableProperties};
pub use element::{Element, IonTimestamp, IonType, Value};
pub use error::{IonSerdeError, IonSerdeResult};
pub use overflow::OverflowConfig;
pub use path::{PathExtractor, RowAccumulator, SearchPath, SearchPathBinding, Slot};
pub use serializer::{NullPolicy, Serializer};
pub use table::{DecodedRow, IonTable};
pub use timestamp::TimestampOffset;
pub use types::{Column, ColumnSchema, StructField, TypeDescriptor};
pub use value::{RowCategory, RowValue};
pub use view::{view, View};
