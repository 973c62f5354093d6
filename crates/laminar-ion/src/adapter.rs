//! Read-side conversion of Ion values into row-model values.
//!
//! [`ValueAdapter`] pairs a matched [`Element`] with the column's declared
//! [`TypeDescriptor`] and converts on demand. Narrowing follows the
//! column's fail-on-overflow flag (see [`crate::overflow`]); struct fields
//! are looked up through a [`View`] so nested names honor the table's case
//! sensitivity.
//!
//! | Declared | Accepted Ion types |
//! |----------|--------------------|
//! | `boolean` | `bool` |
//! | integer family | `int`, `decimal` |
//! | `float` / `double` | `float`, `int`, `decimal` |
//! | `decimal(p,s)` | `decimal`, `int` |
//! | `char` / `varchar` / `string` | `string`, `symbol` |
//! | `binary` | `blob`, `clob` |
//! | `date` / `timestamp` | `timestamp` |
//! | `array` | `list`, `sexp` |
//! | `map` / `struct` | `struct` |
//!
//! Anything else is [`IonSerdeError::TypeMismatch`].

use bigdecimal::BigDecimal;

use crate::element::{Element, IonType, Value};
use crate::error::{IonSerdeError, IonSerdeResult};
use crate::overflow::{
    decimal_to_f64, decimal_to_int, fit_decimal, fit_text, int_to_f64, narrow_f32, narrow_int,
};
use crate::types::TypeDescriptor;
use crate::value::RowValue;
use crate::view::{view, View};

/// Deferred conversion of one matched value.
#[derive(Debug, Clone, Copy)]
pub struct ValueAdapter<'a> {
    element: &'a Element,
    data_type: &'a TypeDescriptor,
    fail_on_overflow: bool,
    case_sensitive: bool,
}

impl<'a> ValueAdapter<'a> {
    /// Creates an adapter; nothing is converted until [`adapt`](Self::adapt).
    #[must_use]
    pub fn new(
        element: &'a Element,
        data_type: &'a TypeDescriptor,
        fail_on_overflow: bool,
        case_sensitive: bool,
    ) -> Self {
        Self {
            element,
            data_type,
            fail_on_overflow,
            case_sensitive,
        }
    }

    /// The matched element.
    #[must_use]
    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// The declared type.
    #[must_use]
    pub fn data_type(&self) -> &'a TypeDescriptor {
        self.data_type
    }

    /// Converts the element.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::TypeMismatch`] for an unconvertible Ion
    /// type, a narrowing error when the column fails on overflow, or
    /// [`IonSerdeError::NoMatchingVariant`] for a union no variant accepts.
    pub fn adapt(&self) -> IonSerdeResult<RowValue> {
        adapt(
            view(self.element, self.case_sensitive),
            self.data_type,
            self.fail_on_overflow,
        )
    }
}

fn mismatch(data_type: &TypeDescriptor, element: &Element) -> IonSerdeError {
    IonSerdeError::mismatch(data_type, element.ion_type())
}

/// Converts the viewed element under `data_type`.
///
/// # Errors
///
/// See [`ValueAdapter::adapt`].
pub fn adapt(node: View<'_>, data_type: &TypeDescriptor, fail: bool) -> IonSerdeResult<RowValue> {
    let element = node.element();
    if element.is_null() {
        return Ok(RowValue::Null);
    }
    let value = element.value();
    match data_type {
        TypeDescriptor::Boolean => match value {
            Value::Bool(b) => Ok(RowValue::Boolean(*b)),
            _ => Err(mismatch(data_type, element)),
        },
        TypeDescriptor::TinyInt | TypeDescriptor::SmallInt | TypeDescriptor::Int | TypeDescriptor::BigInt => {
            adapt_integer(element, data_type, fail)
        }
        TypeDescriptor::Float => {
            let wide = match value {
                Value::Float(f) => *f,
                Value::Int(i) => int_to_f64(i, fail)?,
                Value::Decimal(d) => decimal_to_f64(d, fail)?,
                _ => return Err(mismatch(data_type, element)),
            };
            narrow_f32(wide, fail).map(RowValue::Float)
        }
        TypeDescriptor::Double => match value {
            Value::Float(f) => Ok(RowValue::Double(*f)),
            Value::Int(i) => int_to_f64(i, fail).map(RowValue::Double),
            Value::Decimal(d) => decimal_to_f64(d, fail).map(RowValue::Double),
            _ => Err(mismatch(data_type, element)),
        },
        TypeDescriptor::Decimal { precision, scale } => {
            let decimal = match value {
                Value::Decimal(d) => d.clone(),
                Value::Int(i) => BigDecimal::from(i.clone()),
                _ => return Err(mismatch(data_type, element)),
            };
            fit_decimal(&decimal, *precision, *scale, fail).map(RowValue::Decimal)
        }
        TypeDescriptor::Char(limit) | TypeDescriptor::Varchar(limit) => {
            let text = element.as_text().ok_or_else(|| mismatch(data_type, element))?;
            let fitted = fit_text(text, *limit, fail)?;
            Ok(if matches!(data_type, TypeDescriptor::Char(_)) {
                RowValue::Char(fitted)
            } else {
                RowValue::Varchar(fitted)
            })
        }
        TypeDescriptor::String => element
            .as_text()
            .map(|t| RowValue::String(t.to_string()))
            .ok_or_else(|| mismatch(data_type, element)),
        TypeDescriptor::Binary => match value {
            Value::Blob(bytes) | Value::Clob(bytes) => Ok(RowValue::Binary(bytes.clone())),
            _ => Err(mismatch(data_type, element)),
        },
        TypeDescriptor::Date => match value {
            Value::Timestamp(ts) => Ok(RowValue::Date(ts.instant().date_naive())),
            _ => Err(mismatch(data_type, element)),
        },
        TypeDescriptor::Timestamp => match value {
            Value::Timestamp(ts) => Ok(RowValue::Timestamp(ts.instant().naive_utc())),
            _ => Err(mismatch(data_type, element)),
        },
        TypeDescriptor::List(inner) => {
            if !element.ion_type().is_sequence() {
                return Err(mismatch(data_type, element));
            }
            node.items()
                .map(|item| adapt(item, inner, fail))
                .collect::<IonSerdeResult<Vec<_>>>()
                .map(RowValue::List)
        }
        TypeDescriptor::Map(inner) => {
            if element.ion_type() != IonType::Struct {
                return Err(mismatch(data_type, element));
            }
            node.fields()
                .map(|(name, child)| Ok((RowValue::String(name.to_string()), adapt(child, inner, fail)?)))
                .collect::<IonSerdeResult<Vec<_>>>()
                .map(RowValue::Map)
        }
        TypeDescriptor::Struct(fields) => {
            if element.ion_type() != IonType::Struct {
                return Err(mismatch(data_type, element));
            }
            fields
                .iter()
                .map(|field| {
                    let value = match node.get(&field.name) {
                        Some(child) => adapt(child, &field.data_type, fail)?,
                        None => RowValue::Null,
                    };
                    Ok((field.name.clone(), value))
                })
                .collect::<IonSerdeResult<Vec<_>>>()
                .map(RowValue::Struct)
        }
        TypeDescriptor::Union(variants) => adapt_union(node, data_type, variants, fail),
    }
}

fn adapt_integer(element: &Element, data_type: &TypeDescriptor, fail: bool) -> IonSerdeResult<RowValue> {
    let width = data_type
        .integer_width()
        .ok_or_else(|| mismatch(data_type, element))?;
    let wide = match element.value() {
        Value::Int(i) => narrow_int(i, width, fail)?,
        Value::Decimal(d) => decimal_to_int(d, width, fail)?,
        _ => return Err(mismatch(data_type, element)),
    };
    let overflow = || IonSerdeError::Overflow {
        value: wide.to_string(),
        target: data_type.to_string(),
    };
    Ok(match data_type {
        TypeDescriptor::TinyInt => RowValue::TinyInt(i8::try_from(wide).map_err(|_| overflow())?),
        TypeDescriptor::SmallInt => RowValue::SmallInt(i16::try_from(wide).map_err(|_| overflow())?),
        TypeDescriptor::Int => RowValue::Int(i32::try_from(wide).map_err(|_| overflow())?),
        _ => RowValue::BigInt(wide),
    })
}

/// Whether an Ion type could hold a value of a container variant.
fn container_matches(variant: &TypeDescriptor, ion_type: IonType) -> Option<bool> {
    match variant {
        TypeDescriptor::List(_) => Some(ion_type.is_sequence()),
        TypeDescriptor::Map(_) | TypeDescriptor::Struct(_) => Some(ion_type == IonType::Struct),
        _ => None,
    }
}

/// Picks the first variant the value converts to.
///
/// Container variants match on Ion type alone. Primitive variants match
/// when a strict conversion succeeds, so a wider variant wins over a
/// narrower one that would wrap or truncate. Only when no variant takes
/// the value strictly, and the column coerces, is the first primitive
/// variant that converts with coercion used.
fn adapt_union(
    node: View<'_>,
    union_type: &TypeDescriptor,
    variants: &[TypeDescriptor],
    fail: bool,
) -> IonSerdeResult<RowValue> {
    let ion_type = node.element().ion_type();
    let tagged = variants
        .iter()
        .enumerate()
        .map_while(|(index, variant)| u8::try_from(index).ok().map(|tag| (tag, variant)));
    for (tag, variant) in tagged.clone() {
        match container_matches(variant, ion_type) {
            Some(true) => return Ok(RowValue::union(tag, adapt(node, variant, fail)?)),
            Some(false) => {}
            None => {
                if let Ok(value) = adapt(node, variant, true) {
                    return Ok(RowValue::union(tag, value));
                }
            }
        }
    }
    if !fail {
        for (tag, variant) in tagged {
            if container_matches(variant, ion_type).is_none() {
                if let Ok(value) = adapt(node, variant, false) {
                    return Ok(RowValue::union(tag, value));
                }
            }
        }
    }
    Err(IonSerdeError::NoMatchingVariant {
        value: ion_type.to_string(),
        union_type: union_type.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::{DateTime, NaiveDate};
    use num_bigint::BigInt;

    use super::*;
    use crate::element::IonTimestamp;

    fn run(element: &Element, ty: &str, fail: bool) -> IonSerdeResult<RowValue> {
        let ty: TypeDescriptor = ty.parse().unwrap();
        ValueAdapter::new(element, &ty, fail, false).adapt()
    }

    #[test]
    fn test_null_is_sentinel() {
        assert_eq!(run(&Element::typed_null(IonType::Int), "int", true).unwrap(), RowValue::Null);
        assert_eq!(run(&Element::null(), "struct<a:int>", true).unwrap(), RowValue::Null);
    }

    #[test]
    fn test_integer_overflow_policy() {
        let e = Element::from(200);
        assert!(matches!(run(&e, "tinyint", true), Err(IonSerdeError::Overflow { .. })));
        assert_eq!(run(&e, "tinyint", false).unwrap(), RowValue::TinyInt(-56));
        assert_eq!(run(&e, "smallint", true).unwrap(), RowValue::SmallInt(200));

        let huge = Element::new(Value::Int(BigInt::from(u64::MAX)));
        assert!(matches!(run(&huge, "bigint", true), Err(IonSerdeError::Overflow { .. })));
        assert_eq!(run(&huge, "bigint", false).unwrap(), RowValue::BigInt(-1));
    }

    #[test]
    fn test_decimal_into_integer() {
        let whole = Element::from(BigDecimal::from_str("42.00").unwrap());
        assert_eq!(run(&whole, "int", true).unwrap(), RowValue::Int(42));
        let frac = Element::from(BigDecimal::from_str("42.5").unwrap());
        assert!(matches!(run(&frac, "int", true), Err(IonSerdeError::PrecisionLoss { .. })));
        assert_eq!(run(&frac, "int", false).unwrap(), RowValue::Int(42));
    }

    #[test]
    fn test_floats() {
        let e = Element::from(0.1);
        assert!(matches!(run(&e, "float", true), Err(IonSerdeError::PrecisionLoss { .. })));
        assert_eq!(run(&e, "float", false).unwrap(), RowValue::Float(0.1));
        assert_eq!(run(&Element::from(0.5), "float", true).unwrap(), RowValue::Float(0.5));
        assert_eq!(run(&Element::from(3), "double", true).unwrap(), RowValue::Double(3.0));
    }

    #[test]
    fn test_text_and_decimal_fit() {
        let e = Element::symbol("abcdef");
        assert!(matches!(run(&e, "varchar(3)", true), Err(IonSerdeError::LengthExceeded { length: 6, limit: 3 })));
        assert_eq!(run(&e, "char(3)", false).unwrap(), RowValue::Char("abc".into()));
        assert_eq!(run(&e, "string", true).unwrap(), RowValue::String("abcdef".into()));

        let d = Element::from(BigDecimal::from_str("1.235").unwrap());
        assert_eq!(
            run(&d, "decimal(5,2)", true).unwrap(),
            RowValue::Decimal(BigDecimal::from_str("1.24").unwrap())
        );
    }

    #[test]
    fn test_type_mismatch() {
        let err = run(&Element::from("7"), "int", true).unwrap_err();
        assert!(matches!(err, IonSerdeError::TypeMismatch { ref expected, ref found } if expected == "int" && found == "string"));
        assert!(run(&Element::from(1), "array<int>", false).is_err());
    }

    #[test]
    fn test_timestamps() {
        let instant = DateTime::parse_from_rfc3339("2024-01-01T23:30:00+01:30").unwrap();
        let e = Element::new(Value::Timestamp(IonTimestamp::with_offset(instant)));
        assert_eq!(
            run(&e, "timestamp", true).unwrap(),
            RowValue::Timestamp(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap().and_hms_opt(22, 0, 0).unwrap())
        );
        assert_eq!(
            run(&e, "date", true).unwrap(),
            RowValue::Date(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
        );
    }

    #[test]
    fn test_nested_struct_case_insensitive() {
        let e = Element::structure([
            ("ID", Element::from(1)),
            ("Tags", Element::list([Element::from("x")])),
            ("Attrs", Element::structure([("k", Element::from(2))])),
        ]);
        let value = run(&e, "struct<id:int,tags:array<string>,attrs:map<string,int>,gone:int>", true).unwrap();
        assert_eq!(
            value,
            RowValue::structure([
                ("id", RowValue::Int(1)),
                ("tags", RowValue::List(vec![RowValue::String("x".into())])),
                ("attrs", RowValue::Map(vec![(RowValue::String("k".into()), RowValue::Int(2))])),
                ("gone", RowValue::Null),
            ])
        );

        let ty: TypeDescriptor = "struct<id:int>".parse().unwrap();
        let strict = ValueAdapter::new(&e, &ty, true, true).adapt().unwrap();
        assert_eq!(strict, RowValue::structure([("id", RowValue::Null)]));
    }

    #[test]
    fn test_union_inference() {
        let ty = "uniontype<int,string,array<int>>";
        assert_eq!(run(&Element::from(5), ty, true).unwrap(), RowValue::union(0, RowValue::Int(5)));
        assert_eq!(
            run(&Element::from("hello"), ty, true).unwrap(),
            RowValue::union(1, RowValue::String("hello".into()))
        );
        assert_eq!(
            run(&Element::list([Element::from(1)]), ty, true).unwrap(),
            RowValue::union(2, RowValue::List(vec![RowValue::Int(1)]))
        );
        let err = run(&Element::from(true), ty, true).unwrap_err();
        assert!(matches!(err, IonSerdeError::NoMatchingVariant { .. }));
    }

    #[test]
    fn test_union_prefers_variant_that_fits() {
        let ints = "uniontype<tinyint,int>";
        for fail in [true, false] {
            assert_eq!(run(&Element::from(5), ints, fail).unwrap(), RowValue::union(0, RowValue::TinyInt(5)));
            assert_eq!(run(&Element::from(200), ints, fail).unwrap(), RowValue::union(1, RowValue::Int(200)));
        }

        let text = "uniontype<varchar(3),string>";
        for fail in [true, false] {
            assert_eq!(
                run(&Element::from("hello"), text, fail).unwrap(),
                RowValue::union(1, RowValue::String("hello".into()))
            );
        }

        let floats = "uniontype<float,double>";
        assert_eq!(run(&Element::from(0.1), floats, false).unwrap(), RowValue::union(1, RowValue::Double(0.1)));
    }

    #[test]
    fn test_union_coerces_only_when_nothing_fits() {
        let big = Element::new(Value::Int(BigInt::from(1_i64 << 40)));
        let ty = "uniontype<tinyint,int>";
        assert!(matches!(run(&big, ty, true), Err(IonSerdeError::NoMatchingVariant { .. })));
        assert_eq!(run(&big, ty, false).unwrap(), RowValue::union(0, RowValue::TinyInt(0)));
    }

    #[test]
    fn test_int_and_decimal_into_floats() {
        let e = Element::from(16_777_217);
        assert!(matches!(run(&e, "float", true), Err(IonSerdeError::PrecisionLoss { .. })));
        assert_eq!(run(&e, "float", false).unwrap(), RowValue::Float(16_777_216.0));
        assert_eq!(run(&e, "double", true).unwrap(), RowValue::Double(16_777_217.0));

        let huge = Element::new(Value::Int(BigInt::from(10).pow(400)));
        assert!(matches!(run(&huge, "double", true), Err(IonSerdeError::Overflow { .. })));
        assert_eq!(run(&huge, "double", false).unwrap(), RowValue::Double(f64::INFINITY));

        let d = Element::from(BigDecimal::from_str("2.5").unwrap());
        assert_eq!(run(&d, "float", true).unwrap(), RowValue::Float(2.5));
        let tenth = Element::from(BigDecimal::from_str("0.1").unwrap());
        assert_eq!(run(&tenth, "double", true).unwrap(), RowValue::Double(0.1));
        assert!(matches!(run(&tenth, "float", true), Err(IonSerdeError::PrecisionLoss { .. })));
    }
}
