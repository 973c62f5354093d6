//! Arrow bridge for decoded rows.
//!
//! [`to_arrow_schema`] maps a [`ColumnSchema`] to an Arrow schema and
//! [`RowBatchBuilder`] accumulates [`DecodedRow`]s into a [`RecordBatch`].
//!
//! | Row type | Arrow type |
//! |----------|------------|
//! | `boolean` | `Boolean` |
//! | `tinyint` … `bigint` | `Int8` … `Int64` |
//! | `float` / `double` | `Float32` / `Float64` |
//! | `decimal(p,s)` | `Decimal128(p, s)` |
//! | `char` / `varchar` / `string` | `Utf8` |
//! | `binary` | `Binary` |
//! | `date` | `Date32` |
//! | `timestamp` | `Timestamp(Millisecond)` |
//! | `array` / `map` / `struct` / `uniontype` | `Utf8` (rendered text) |

use std::sync::Arc;

use arrow_array::builder::{
    BinaryBuilder, BooleanBuilder, Date32Builder, Decimal128Builder, Float32Builder, Float64Builder,
    Int16Builder, Int32Builder, Int64Builder, Int8Builder, StringBuilder, TimestampMillisecondBuilder,
};
use arrow_array::{ArrayRef, RecordBatch};
use arrow_schema::{DataType, Field, Schema, SchemaRef, TimeUnit};
use chrono::{Datelike, NaiveDate};
use num_traits::ToPrimitive;

use crate::error::{IonSerdeError, IonSerdeResult};
use crate::table::DecodedRow;
use crate::types::{ColumnSchema, TypeDescriptor};
use crate::value::RowValue;

/// Arrow type of a row-model type.
#[must_use]
pub fn to_arrow_type(data_type: &TypeDescriptor) -> DataType {
    match data_type {
        TypeDescriptor::Boolean => DataType::Boolean,
        TypeDescriptor::TinyInt => DataType::Int8,
        TypeDescriptor::SmallInt => DataType::Int16,
        TypeDescriptor::Int => DataType::Int32,
        TypeDescriptor::BigInt => DataType::Int64,
        TypeDescriptor::Float => DataType::Float32,
        TypeDescriptor::Double => DataType::Float64,
        #[allow(clippy::cast_possible_wrap)]
        TypeDescriptor::Decimal { precision, scale } => DataType::Decimal128(*precision, *scale as i8),
        TypeDescriptor::Binary => DataType::Binary,
        TypeDescriptor::Date => DataType::Date32,
        TypeDescriptor::Timestamp => DataType::Timestamp(TimeUnit::Millisecond, None),
        TypeDescriptor::Char(_)
        | TypeDescriptor::Varchar(_)
        | TypeDescriptor::String
        | TypeDescriptor::List(_)
        | TypeDescriptor::Map(_)
        | TypeDescriptor::Struct(_)
        | TypeDescriptor::Union(_) => DataType::Utf8,
    }
}

/// Arrow schema of a table; every field is nullable.
#[must_use]
pub fn to_arrow_schema(schema: &ColumnSchema) -> SchemaRef {
    let fields: Vec<Field> = schema
        .columns()
        .iter()
        .map(|c| Field::new(&c.name, to_arrow_type(&c.data_type), true))
        .collect();
    Arc::new(Schema::new(fields))
}

// ── Builder helpers ────────────────────────────────────────────────

/// Trait-object wrapper so we can store heterogeneous builders in a `Vec`.
trait ColumnBuilder: Send {
    fn append_row_value(&mut self, value: &RowValue) -> IonSerdeResult<()>;
    fn finish(&mut self) -> ArrayRef;
}

macro_rules! impl_column_builder {
    ($builder:ty, $($pattern:pat => $value:expr),+ $(,)?) => {
        impl ColumnBuilder for $builder {
            fn append_row_value(&mut self, value: &RowValue) -> IonSerdeResult<()> {
                match value {
                    RowValue::Null => self.append_null(),
                    $( $pattern => self.append_value($value), )+
                    other => {
                        return Err(IonSerdeError::mismatch(
                            stringify!($builder),
                            other.kind_name(),
                        ))
                    }
                }
                Ok(())
            }

            fn finish(&mut self) -> ArrayRef {
                Arc::new(<$builder>::finish(self))
            }
        }
    };
}

impl_column_builder!(BooleanBuilder, RowValue::Boolean(v) => *v);
impl_column_builder!(Int8Builder, RowValue::TinyInt(v) => *v);
impl_column_builder!(Int16Builder, RowValue::SmallInt(v) => *v);
impl_column_builder!(Int32Builder, RowValue::Int(v) => *v);
impl_column_builder!(Int64Builder, RowValue::BigInt(v) => *v);
impl_column_builder!(Float32Builder, RowValue::Float(v) => *v);
impl_column_builder!(Float64Builder, RowValue::Double(v) => *v);
impl_column_builder!(
    StringBuilder,
    RowValue::Char(v) | RowValue::Varchar(v) | RowValue::String(v) => v,
);
impl_column_builder!(BinaryBuilder, RowValue::Binary(v) => v);
impl_column_builder!(Date32Builder, RowValue::Date(d) => days_since_epoch(*d));
impl_column_builder!(
    TimestampMillisecondBuilder,
    RowValue::Timestamp(t) => t.and_utc().timestamp_millis(),
);

/// Days between 0001-01-01 and 1970-01-01.
const EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn days_since_epoch(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - EPOCH_DAYS_FROM_CE
}

/// `Decimal128` with the column scale applied to each value.
struct DecimalColumn {
    builder: Decimal128Builder,
    scale: i64,
}

impl ColumnBuilder for DecimalColumn {
    fn append_row_value(&mut self, value: &RowValue) -> IonSerdeResult<()> {
        match value {
            RowValue::Null => self.builder.append_null(),
            RowValue::Decimal(d) => {
                let (digits, _) = d.with_scale(self.scale).into_bigint_and_exponent();
                let unscaled = digits.to_i128().ok_or_else(|| IonSerdeError::Overflow {
                    value: d.to_string(),
                    target: "decimal128".into(),
                })?;
                self.builder.append_value(unscaled);
            }
            other => return Err(IonSerdeError::mismatch("decimal", other.kind_name())),
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        Arc::new(self.builder.finish())
    }
}

/// Nested values rendered as text.
struct RenderedColumn(StringBuilder);

impl ColumnBuilder for RenderedColumn {
    fn append_row_value(&mut self, value: &RowValue) -> IonSerdeResult<()> {
        if value.is_null() {
            self.0.append_null();
        } else {
            self.0.append_value(value.to_string());
        }
        Ok(())
    }

    fn finish(&mut self) -> ArrayRef {
        Arc::new(self.0.finish())
    }
}

/// Returns `true` if the column builder for `data_type` takes `value`.
fn accepts(data_type: &TypeDescriptor, value: &RowValue) -> bool {
    use TypeDescriptor as T;
    matches!(
        (data_type, value),
        (_, RowValue::Null)
            | (T::Boolean, RowValue::Boolean(_))
            | (T::TinyInt, RowValue::TinyInt(_))
            | (T::SmallInt, RowValue::SmallInt(_))
            | (T::Int, RowValue::Int(_))
            | (T::BigInt, RowValue::BigInt(_))
            | (T::Float, RowValue::Float(_))
            | (T::Double, RowValue::Double(_))
            | (T::Decimal { .. }, RowValue::Decimal(_))
            | (
                T::Char(_) | T::Varchar(_) | T::String,
                RowValue::Char(_) | RowValue::Varchar(_) | RowValue::String(_)
            )
            | (T::Binary, RowValue::Binary(_))
            | (T::Date, RowValue::Date(_))
            | (T::Timestamp, RowValue::Timestamp(_))
            | (T::List(_) | T::Map(_) | T::Struct(_) | T::Union(_), _)
    )
}

fn create_builder(data_type: &TypeDescriptor, capacity: usize) -> IonSerdeResult<Box<dyn ColumnBuilder>> {
    let builder: Box<dyn ColumnBuilder> = match data_type {
        TypeDescriptor::Boolean => Box::new(BooleanBuilder::with_capacity(capacity)),
        TypeDescriptor::TinyInt => Box::new(Int8Builder::with_capacity(capacity)),
        TypeDescriptor::SmallInt => Box::new(Int16Builder::with_capacity(capacity)),
        TypeDescriptor::Int => Box::new(Int32Builder::with_capacity(capacity)),
        TypeDescriptor::BigInt => Box::new(Int64Builder::with_capacity(capacity)),
        TypeDescriptor::Float => Box::new(Float32Builder::with_capacity(capacity)),
        TypeDescriptor::Double => Box::new(Float64Builder::with_capacity(capacity)),
        TypeDescriptor::Decimal { precision, scale } => {
            #[allow(clippy::cast_possible_wrap)]
            let builder = Decimal128Builder::with_capacity(capacity)
                .with_precision_and_scale(*precision, *scale as i8)?;
            Box::new(DecimalColumn {
                builder,
                scale: i64::from(*scale),
            })
        }
        TypeDescriptor::Char(_) | TypeDescriptor::Varchar(_) | TypeDescriptor::String => {
            Box::new(StringBuilder::with_capacity(capacity, capacity * 32))
        }
        TypeDescriptor::Binary => Box::new(BinaryBuilder::with_capacity(capacity, capacity * 64)),
        TypeDescriptor::Date => Box::new(Date32Builder::with_capacity(capacity)),
        TypeDescriptor::Timestamp => Box::new(TimestampMillisecondBuilder::with_capacity(capacity)),
        TypeDescriptor::List(_)
        | TypeDescriptor::Map(_)
        | TypeDescriptor::Struct(_)
        | TypeDescriptor::Union(_) => Box::new(RenderedColumn(StringBuilder::with_capacity(capacity, capacity * 64))),
    };
    Ok(builder)
}

// ── RowBatchBuilder ────────────────────────────────────────────────

/// Accumulates rows column-wise into a [`RecordBatch`].
pub struct RowBatchBuilder {
    schema: SchemaRef,
    types: Vec<TypeDescriptor>,
    columns: Vec<Box<dyn ColumnBuilder>>,
    rows: usize,
}

impl std::fmt::Debug for RowBatchBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RowBatchBuilder")
            .field("schema", &self.schema)
            .field("rows", &self.rows)
            .finish_non_exhaustive()
    }
}

impl RowBatchBuilder {
    /// Creates a builder for `schema`.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Arrow`] for a decimal Arrow cannot hold.
    pub fn new(schema: &ColumnSchema, capacity: usize) -> IonSerdeResult<Self> {
        let columns = schema
            .columns()
            .iter()
            .map(|c| create_builder(&c.data_type, capacity))
            .collect::<IonSerdeResult<Vec<_>>>()?;
        Ok(Self {
            schema: to_arrow_schema(schema),
            types: schema.columns().iter().map(|c| c.data_type.clone()).collect(),
            columns,
            rows: 0,
        })
    }

    /// The Arrow schema of the batches produced.
    #[must_use]
    pub fn schema(&self) -> SchemaRef {
        Arc::clone(&self.schema)
    }

    /// Rows appended since the last [`finish`](Self::finish).
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    /// Returns `true` if no rows are buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Converts and appends a decoded row.
    ///
    /// The row is converted in full before anything is appended, so a
    /// conversion error leaves the builder unchanged.
    ///
    /// # Errors
    ///
    /// Returns the row's first conversion error.
    pub fn append(&mut self, row: &DecodedRow<'_>) -> IonSerdeResult<()> {
        let values = row.values()?;
        self.append_values(&values)
    }

    /// Appends one row of values in schema order.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::TypeMismatch`] if the arity or a value kind
    /// does not match the schema.
    pub fn append_values(&mut self, values: &[RowValue]) -> IonSerdeResult<()> {
        if values.len() != self.columns.len() {
            return Err(IonSerdeError::mismatch(
                format!("{} columns", self.columns.len()),
                format!("{} values", values.len()),
            ));
        }
        if let Some((data_type, value)) = self
            .types
            .iter()
            .zip(values)
            .find(|(t, v)| !accepts(t, v))
        {
            return Err(IonSerdeError::mismatch(data_type, value.kind_name()));
        }
        for (builder, value) in self.columns.iter_mut().zip(values) {
            builder.append_row_value(value)?;
        }
        self.rows += 1;
        Ok(())
    }

    /// Drains the buffered rows into a batch.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Arrow`] if Arrow rejects the columns.
    pub fn finish(&mut self) -> IonSerdeResult<RecordBatch> {
        let arrays: Vec<ArrayRef> = self.columns.iter_mut().map(|b| b.finish()).collect();
        self.rows = 0;
        Ok(RecordBatch::try_new(Arc::clone(&self.schema), arrays)?)
    }
}
