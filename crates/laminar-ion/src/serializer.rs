//! Write-side dispatch from row-model values to Ion.
//!
//! [`Serializer::serialize`] walks a `(RowValue, TypeDescriptor, WireType)`
//! triple recursively:
//!
//! - primitives are converted to a [`Scalar`] first and only then written,
//!   so a failed conversion never leaves a partial value in the writer
//! - integer-family values are widened to Ion `int`
//! - a `double` written to a `float` column must narrow bit-exactly;
//!   there is no truncating fallback on write
//! - timestamps are presented at the table offset, dates as day precision
//! - lists, maps, and structs step into the matching container
//! - unions use the explicit tag when the value carries one, otherwise the
//!   first variant the value converts to
//!
//! Nulls follow the table's [`NullPolicy`]. Any error aborts the whole
//! document.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;
use serde::{Deserialize, Serialize};

use crate::catalog::{valid_wire_types, WireType};
use crate::codec::DocumentWriter;
use crate::element::{IonTimestamp, IonType};
use crate::error::{IonSerdeError, IonSerdeResult};
use crate::overflow::{check_text, decimal_to_bigint, exact_f32, narrow_int};
use crate::timestamp::{present_date, TimestampOffset};
use crate::types::TypeDescriptor;
use crate::value::{RowCategory, RowValue};

/// How a null row value is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NullPolicy {
    /// Write nothing; struct fields and map entries are left out.
    #[default]
    #[serde(rename = "OMIT")]
    Omit,
    /// Write a null tagged with the column's wire type.
    #[serde(rename = "TYPED")]
    TypedNull,
    /// Write `null.null`.
    #[serde(rename = "UNTYPED")]
    UntypedNull,
}

str_enum!(NullPolicy, "ion.serialize_null", "expected OMIT, TYPED or UNTYPED",
    Omit => "omit";
    TypedNull => "typed", "typed_null";
    UntypedNull => "untyped", "untyped_null";
);

/// A converted primitive, ready to write.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar<'v> {
    /// `bool`
    Bool(bool),
    /// `int`
    Int(BigInt),
    /// 32-bit `float`
    Float32(f32),
    /// 64-bit `float`
    Float64(f64),
    /// `decimal`
    Decimal(&'v BigDecimal),
    /// `timestamp`
    Timestamp(IonTimestamp),
    /// `string`
    String(&'v str),
    /// `symbol`
    Symbol(&'v str),
    /// `blob`
    Blob(&'v [u8]),
    /// `clob`
    Clob(&'v [u8]),
}

fn default_wire(data_type: &TypeDescriptor) -> Option<WireType> {
    valid_wire_types(data_type).first().copied()
}

fn mismatch(data_type: &TypeDescriptor, value: &RowValue) -> IonSerdeError {
    IonSerdeError::mismatch(data_type, value.kind_name())
}

/// Table-wide write settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Serializer {
    null_policy: NullPolicy,
    offset: TimestampOffset,
}

impl Serializer {
    /// Creates a serializer.
    #[must_use]
    pub fn new(null_policy: NullPolicy, offset: TimestampOffset) -> Self {
        Self { null_policy, offset }
    }

    /// The null policy.
    #[must_use]
    pub fn null_policy(&self) -> NullPolicy {
        self.null_policy
    }

    /// The timestamp presentation offset.
    #[must_use]
    pub fn offset(&self) -> TimestampOffset {
        self.offset
    }

    /// Writes `value` as a struct field, honoring [`NullPolicy::Omit`].
    ///
    /// # Errors
    ///
    /// See [`serialize`](Self::serialize).
    pub fn serialize_field(
        &self,
        writer: &mut dyn DocumentWriter,
        name: &str,
        value: &RowValue,
        data_type: &TypeDescriptor,
        wire: Option<WireType>,
    ) -> IonSerdeResult<()> {
        if value.is_null() && self.null_policy == NullPolicy::Omit {
            return Ok(());
        }
        writer.set_field_name(name);
        self.serialize(writer, value, data_type, wire)
    }

    /// Writes `value` under `data_type`; `wire` of `None` uses the type's
    /// default wire type.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::TypeMismatch`] when the value's kind does
    /// not fit the type, [`IonSerdeError::PrecisionLoss`] for inexact
    /// narrowing, [`IonSerdeError::InvalidKeyType`] for non-text map keys,
    /// [`IonSerdeError::NoMatchingVariant`] for unions, and writer errors.
    pub fn serialize(
        &self,
        writer: &mut dyn DocumentWriter,
        value: &RowValue,
        data_type: &TypeDescriptor,
        wire: Option<WireType>,
    ) -> IonSerdeResult<()> {
        let wire = wire.or_else(|| default_wire(data_type));
        if value.is_null() {
            return self.write_null(writer, data_type, wire);
        }
        match data_type {
            TypeDescriptor::List(inner) => {
                let RowValue::List(items) = value else {
                    return Err(mismatch(data_type, value));
                };
                let container = match wire {
                    Some(WireType::SExp) => IonType::SExp,
                    _ => IonType::List,
                };
                writer.step_in(container)?;
                for item in items {
                    self.serialize(writer, item, inner, None)?;
                }
                writer.step_out()
            }
            TypeDescriptor::Map(inner) => {
                let RowValue::Map(entries) = value else {
                    return Err(mismatch(data_type, value));
                };
                writer.step_in(IonType::Struct)?;
                for (key, entry) in entries {
                    let name = key
                        .as_text()
                        .ok_or_else(|| IonSerdeError::InvalidKeyType(key.kind_name().to_string()))?;
                    self.serialize_field(writer, name, entry, inner, None)?;
                }
                writer.step_out()
            }
            TypeDescriptor::Struct(fields) => {
                if value.category() != RowCategory::Struct {
                    return Err(mismatch(data_type, value));
                }
                writer.step_in(IonType::Struct)?;
                for field in fields {
                    let child = value.field(&field.name).unwrap_or(&RowValue::Null);
                    self.serialize_field(writer, &field.name, child, &field.data_type, None)?;
                }
                writer.step_out()
            }
            TypeDescriptor::Union(variants) => self.serialize_union(writer, value, data_type, variants),
            _ => {
                let scalar = self.to_scalar(value, data_type, wire)?;
                write_scalar(writer, &scalar)
            }
        }
    }

    fn write_null(
        &self,
        writer: &mut dyn DocumentWriter,
        data_type: &TypeDescriptor,
        wire: Option<WireType>,
    ) -> IonSerdeResult<()> {
        match self.null_policy {
            NullPolicy::TypedNull => {
                let ion_type = match (data_type, wire) {
                    (_, Some(wire)) => wire.ion_type(),
                    (TypeDescriptor::Union(variants), None) => variants
                        .first()
                        .and_then(default_wire)
                        .map_or(IonType::Null, WireType::ion_type),
                    _ => IonType::Null,
                };
                writer.write_null(Some(ion_type))
            }
            // Omitted fields never reach here; nulls inside lists stay
            // positional.
            NullPolicy::Omit | NullPolicy::UntypedNull => writer.write_null(None),
        }
    }

    fn serialize_union(
        &self,
        writer: &mut dyn DocumentWriter,
        value: &RowValue,
        union_type: &TypeDescriptor,
        variants: &[TypeDescriptor],
    ) -> IonSerdeResult<()> {
        let no_match = || IonSerdeError::NoMatchingVariant {
            value: value.kind_name().to_string(),
            union_type: union_type.to_string(),
        };
        if let RowValue::Union { tag, value: inner } = value {
            let variant = variants.get(usize::from(*tag)).ok_or_else(no_match)?;
            return self.serialize(writer, inner, variant, None);
        }
        for variant in variants {
            let container_kind = match variant {
                TypeDescriptor::List(_) => Some(RowCategory::List),
                TypeDescriptor::Map(_) => Some(RowCategory::Map),
                TypeDescriptor::Struct(_) => Some(RowCategory::Struct),
                TypeDescriptor::Union(_) => None,
                _ => {
                    if let Ok(scalar) = self.to_scalar(value, variant, default_wire(variant)) {
                        return write_scalar(writer, &scalar);
                    }
                    continue;
                }
            };
            if container_kind == Some(value.category()) {
                return self.serialize(writer, value, variant, None);
            }
        }
        Err(no_match())
    }

    /// Converts a primitive value for the given type and wire choice.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::TypeMismatch`] or a narrowing error. An
    /// integer must fit the declared width and text the declared length;
    /// writes never truncate.
    pub fn to_scalar<'v>(
        &self,
        value: &'v RowValue,
        data_type: &TypeDescriptor,
        wire: Option<WireType>,
    ) -> IonSerdeResult<Scalar<'v>> {
        let scalar = match (data_type, value) {
            (TypeDescriptor::Boolean, RowValue::Boolean(b)) => Scalar::Bool(*b),
            (TypeDescriptor::TinyInt | TypeDescriptor::SmallInt | TypeDescriptor::Int | TypeDescriptor::BigInt, _) => {
                let wide = value.as_i64().ok_or_else(|| mismatch(data_type, value))?;
                let width = data_type.integer_width().ok_or_else(|| mismatch(data_type, value))?;
                let wide = BigInt::from(wide);
                narrow_int(&wide, width, true)?;
                Scalar::Int(wide)
            }
            (TypeDescriptor::Float, RowValue::Float(f)) => Scalar::Float32(*f),
            (TypeDescriptor::Float, RowValue::Double(d)) => Scalar::Float32(exact_f32(*d)?),
            (TypeDescriptor::Double, RowValue::Float(f)) => Scalar::Float64(f64::from(*f)),
            (TypeDescriptor::Double, RowValue::Double(d)) => Scalar::Float64(*d),
            (TypeDescriptor::Decimal { .. }, RowValue::Decimal(d)) => match wire {
                Some(WireType::Int) => Scalar::Int(decimal_to_bigint(d)?),
                _ => Scalar::Decimal(d),
            },
            (TypeDescriptor::Char(_) | TypeDescriptor::Varchar(_) | TypeDescriptor::String, _) => {
                let text = value.as_text().ok_or_else(|| mismatch(data_type, value))?;
                if let TypeDescriptor::Char(limit) | TypeDescriptor::Varchar(limit) = data_type {
                    check_text(text, *limit)?;
                }
                match wire {
                    Some(WireType::Symbol) => Scalar::Symbol(text),
                    _ => Scalar::String(text),
                }
            }
            (TypeDescriptor::Binary, RowValue::Binary(bytes)) => match wire {
                Some(WireType::Clob) => Scalar::Clob(bytes),
                _ => Scalar::Blob(bytes),
            },
            (TypeDescriptor::Date, RowValue::Date(date)) => Scalar::Timestamp(present_date(*date)),
            (TypeDescriptor::Timestamp, RowValue::Timestamp(ts)) => Scalar::Timestamp(self.offset.present(ts)?),
            _ => return Err(mismatch(data_type, value)),
        };
        Ok(scalar)
    }
}

/// Writes a converted primitive.
///
/// # Errors
///
/// Propagates writer errors.
pub fn write_scalar(writer: &mut dyn DocumentWriter, scalar: &Scalar<'_>) -> IonSerdeResult<()> {
    match scalar {
        Scalar::Bool(b) => writer.write_bool(*b),
        Scalar::Int(i) => writer.write_int(i),
        Scalar::Float32(f) => writer.write_f32(*f),
        Scalar::Float64(f) => writer.write_f64(*f),
        Scalar::Decimal(d) => writer.write_decimal(d),
        Scalar::Timestamp(ts) => writer.write_timestamp(ts),
        Scalar::String(s) => writer.write_string(s),
        Scalar::Symbol(s) => writer.write_symbol(s),
        Scalar::Blob(b) => writer.write_blob(b),
        Scalar::Clob(b) => writer.write_clob(b),
    }
}
