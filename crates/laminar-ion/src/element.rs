//! In-memory Ion value tree.
//!
//! [`Element`] is the materialized form of one Ion value: a list of
//! annotations plus a [`Value`]. The path extractor stores matched
//! subtrees as elements, the value adapter reads from them, and the
//! tree-backed codec in [`crate::codec`] reads and writes them.
//!
//! `Display` renders Ion text. It is meant for diagnostics and for the
//! Arrow bridge's textual fallback, not as a conforming text encoder.

use std::fmt;

use base64::Engine;
use bigdecimal::BigDecimal;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat};
use num_bigint::BigInt;

/// The thirteen Ion types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IonType {
    /// `null.null`
    Null,
    /// `bool`
    Bool,
    /// arbitrary-precision `int`
    Int,
    /// 64-bit `float`
    Float,
    /// arbitrary-precision `decimal`
    Decimal,
    /// `timestamp` with precision and offset
    Timestamp,
    /// interned text
    Symbol,
    /// Unicode text
    String,
    /// character large object
    Clob,
    /// binary large object
    Blob,
    /// ordered sequence
    List,
    /// S-expression
    SExp,
    /// field-keyed struct
    Struct,
}

impl IonType {
    /// Returns `true` for list, sexp, and struct.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(self, Self::List | Self::SExp | Self::Struct)
    }

    /// Returns `true` for list and sexp.
    #[must_use]
    pub fn is_sequence(self) -> bool {
        matches!(self, Self::List | Self::SExp)
    }

    /// Lower-case Ion type name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::Decimal => "decimal",
            Self::Timestamp => "timestamp",
            Self::Symbol => "symbol",
            Self::String => "string",
            Self::Clob => "clob",
            Self::Blob => "blob",
            Self::List => "list",
            Self::SExp => "sexp",
            Self::Struct => "struct",
        }
    }
}

impl fmt::Display for IonType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Timestamps ─────────────────────────────────────────────────────

/// Precision of an [`IonTimestamp`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimestampPrecision {
    /// Calendar day only.
    Day,
    /// Time of day to millisecond precision.
    Millisecond,
}

/// An Ion timestamp: an instant, its precision, and whether the local
/// offset is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IonTimestamp {
    instant: DateTime<FixedOffset>,
    precision: TimestampPrecision,
    offset_known: bool,
}

impl IonTimestamp {
    /// A day-precision timestamp with unknown offset.
    #[must_use]
    pub fn day(date: NaiveDate) -> Self {
        let instant = date
            .and_time(NaiveTime::MIN)
            .and_utc()
            .fixed_offset();
        Self {
            instant,
            precision: TimestampPrecision::Day,
            offset_known: false,
        }
    }

    /// A millisecond-precision timestamp at a known offset.
    #[must_use]
    pub fn with_offset(instant: DateTime<FixedOffset>) -> Self {
        Self {
            instant,
            precision: TimestampPrecision::Millisecond,
            offset_known: true,
        }
    }

    /// The instant, presented at its local offset.
    #[must_use]
    pub fn instant(&self) -> DateTime<FixedOffset> {
        self.instant
    }

    /// Precision of the timestamp.
    #[must_use]
    pub fn precision(&self) -> TimestampPrecision {
        self.precision
    }

    /// Local offset in minutes, `None` when unknown.
    #[must_use]
    pub fn offset_minutes(&self) -> Option<i32> {
        self.offset_known
            .then(|| self.instant.offset().local_minus_utc() / 60)
    }

    /// Milliseconds since the Unix epoch.
    #[must_use]
    pub fn epoch_millis(&self) -> i64 {
        self.instant.timestamp_millis()
    }
}

impl fmt::Display for IonTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.precision {
            TimestampPrecision::Day => write!(f, "{}T", self.instant.format("%Y-%m-%d")),
            TimestampPrecision::Millisecond => {
                let text = self.instant.to_rfc3339_opts(SecondsFormat::Millis, true);
                if self.offset_known {
                    f.write_str(&text)
                } else {
                    // Unknown offset is spelled -00:00.
                    let local = text.trim_end_matches('Z');
                    write!(f, "{local}-00:00")
                }
            }
        }
    }
}

// ── Values ─────────────────────────────────────────────────────────

/// The content of an [`Element`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// A null, tagged with its Ion type (`null.null` for untyped).
    Null(IonType),
    /// `bool`
    Bool(bool),
    /// `int`
    Int(BigInt),
    /// `float`
    Float(f64),
    /// `decimal`
    Decimal(BigDecimal),
    /// `timestamp`
    Timestamp(IonTimestamp),
    /// `symbol`
    Symbol(String),
    /// `string`
    String(String),
    /// `clob`
    Clob(Vec<u8>),
    /// `blob`
    Blob(Vec<u8>),
    /// `list`
    List(Vec<Element>),
    /// `sexp`
    SExp(Vec<Element>),
    /// `struct`; field order is preserved and names may repeat.
    Struct(Vec<(String, Element)>),
}

impl Value {
    /// Ion type of this value.
    #[must_use]
    pub fn ion_type(&self) -> IonType {
        match self {
            Self::Null(t) => *t,
            Self::Bool(_) => IonType::Bool,
            Self::Int(_) => IonType::Int,
            Self::Float(_) => IonType::Float,
            Self::Decimal(_) => IonType::Decimal,
            Self::Timestamp(_) => IonType::Timestamp,
            Self::Symbol(_) => IonType::Symbol,
            Self::String(_) => IonType::String,
            Self::Clob(_) => IonType::Clob,
            Self::Blob(_) => IonType::Blob,
            Self::List(_) => IonType::List,
            Self::SExp(_) => IonType::SExp,
            Self::Struct(_) => IonType::Struct,
        }
    }
}

/// One annotated Ion value.
#[derive(Debug, Clone, PartialEq)]
pub struct Element {
    annotations: Vec<String>,
    value: Value,
}

impl Element {
    /// Wraps a value with no annotations.
    #[must_use]
    pub fn new(value: Value) -> Self {
        Self {
            annotations: Vec::new(),
            value,
        }
    }

    /// `null.null`
    #[must_use]
    pub fn null() -> Self {
        Self::new(Value::Null(IonType::Null))
    }

    /// A null of the given type.
    #[must_use]
    pub fn typed_null(ion_type: IonType) -> Self {
        Self::new(Value::Null(ion_type))
    }

    /// A struct from `(name, element)` pairs.
    #[must_use]
    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, Element)>) -> Self {
        Self::new(Value::Struct(
            fields.into_iter().map(|(n, e)| (n.into(), e)).collect(),
        ))
    }

    /// A list of elements.
    #[must_use]
    pub fn list(items: impl IntoIterator<Item = Element>) -> Self {
        Self::new(Value::List(items.into_iter().collect()))
    }

    /// A symbol.
    #[must_use]
    pub fn symbol(text: impl Into<String>) -> Self {
        Self::new(Value::Symbol(text.into()))
    }

    /// Replaces the annotations.
    #[must_use]
    pub fn with_annotations<A: Into<String>>(mut self, annotations: impl IntoIterator<Item = A>) -> Self {
        self.annotations = annotations.into_iter().map(Into::into).collect();
        self
    }

    /// Annotations in order.
    #[must_use]
    pub fn annotations(&self) -> &[String] {
        &self.annotations
    }

    /// Returns `true` if the element carries `annotation`.
    #[must_use]
    pub fn has_annotation(&self, annotation: &str) -> bool {
        self.annotations.iter().any(|a| a == annotation)
    }

    /// The value.
    #[must_use]
    pub fn value(&self) -> &Value {
        &self.value
    }

    /// Consumes the element, returning its value.
    #[must_use]
    pub fn into_value(self) -> Value {
        self.value
    }

    /// Ion type of the value.
    #[must_use]
    pub fn ion_type(&self) -> IonType {
        self.value.ion_type()
    }

    /// Returns `true` for any typed or untyped null.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self.value, Value::Null(_))
    }

    /// Fields of a struct; empty for anything else.
    #[must_use]
    pub fn fields(&self) -> &[(String, Element)] {
        match &self.value {
            Value::Struct(fields) => fields,
            _ => &[],
        }
    }

    /// Children of a list or sexp; empty for anything else.
    #[must_use]
    pub fn items(&self) -> &[Element] {
        match &self.value {
            Value::List(items) | Value::SExp(items) => items,
            _ => &[],
        }
    }

    /// First field named exactly `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Element> {
        self.fields()
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, e)| e)
    }

    /// Text of a string or symbol.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match &self.value {
            Value::String(s) | Value::Symbol(s) => Some(s),
            _ => None,
        }
    }

    /// Integer content.
    #[must_use]
    pub fn as_int(&self) -> Option<&BigInt> {
        match &self.value {
            Value::Int(i) => Some(i),
            _ => None,
        }
    }

    /// Converts a JSON value: numbers that fit `i64`/`u64` become ints,
    /// other numbers floats, objects structs, arrays lists.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::new(match value {
            serde_json::Value::Null => Value::Null(IonType::Null),
            serde_json::Value::Bool(b) => Value::Bool(*b),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(BigInt::from(i))
                } else if let Some(u) = n.as_u64() {
                    Value::Int(BigInt::from(u))
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_json::Value::String(s) => Value::String(s.clone()),
            serde_json::Value::Array(items) => Value::List(items.iter().map(Self::from_json).collect()),
            serde_json::Value::Object(map) => Value::Struct(
                map.iter()
                    .map(|(k, v)| (k.clone(), Self::from_json(v)))
                    .collect(),
            ),
        })
    }
}

impl From<Value> for Element {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl From<bool> for Element {
    fn from(b: bool) -> Self {
        Self::new(Value::Bool(b))
    }
}

impl From<i64> for Element {
    fn from(i: i64) -> Self {
        Self::new(Value::Int(BigInt::from(i)))
    }
}

impl From<i32> for Element {
    fn from(i: i32) -> Self {
        Self::new(Value::Int(BigInt::from(i)))
    }
}

impl From<f64> for Element {
    fn from(f: f64) -> Self {
        Self::new(Value::Float(f))
    }
}

impl From<&str> for Element {
    fn from(s: &str) -> Self {
        Self::new(Value::String(s.to_string()))
    }
}

impl From<BigDecimal> for Element {
    fn from(d: BigDecimal) -> Self {
        Self::new(Value::Decimal(d))
    }
}

// ── Text rendering ─────────────────────────────────────────────────

fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
        && !matches!(text, "null" | "true" | "false" | "nan")
}

fn write_symbol(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    if is_identifier(text) {
        f.write_str(text)
    } else {
        let escaped = text.replace('\\', "\\\\").replace('\'', "\\'");
        write!(f, "'{escaped}'")
    }
}

fn write_string(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    // JSON string escaping is a subset of Ion's.
    match serde_json::to_string(text) {
        Ok(quoted) => f.write_str(&quoted),
        Err(_) => Err(fmt::Error),
    }
}

fn write_float(f: &mut fmt::Formatter<'_>, v: f64) -> fmt::Result {
    if v.is_nan() {
        f.write_str("nan")
    } else if v.is_infinite() {
        f.write_str(if v > 0.0 { "+inf" } else { "-inf" })
    } else {
        write!(f, "{v:e}")
    }
}

fn write_decimal(f: &mut fmt::Formatter<'_>, d: &BigDecimal) -> fmt::Result {
    let (digits, scale) = d.as_bigint_and_exponent();
    write!(f, "{digits}d{}", -scale)
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for annotation in &self.annotations {
            write_symbol(f, annotation)?;
            f.write_str("::")?;
        }
        match &self.value {
            Value::Null(IonType::Null) => f.write_str("null"),
            Value::Null(t) => write!(f, "null.{t}"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(v) => write_float(f, *v),
            Value::Decimal(d) => write_decimal(f, d),
            Value::Timestamp(ts) => write!(f, "{ts}"),
            Value::Symbol(s) => write_symbol(f, s),
            Value::String(s) => write_string(f, s),
            Value::Clob(bytes) => {
                f.write_str("{{")?;
                write_string(f, &String::from_utf8_lossy(bytes))?;
                f.write_str("}}")
            }
            Value::Blob(bytes) => write!(
                f,
                "{{{{{}}}}}",
                base64::engine::general_purpose::STANDARD.encode(bytes)
            ),
            Value::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            Value::SExp(items) => {
                f.write_str("(")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str(")")
            }
            Value::Struct(fields) => {
                f.write_str("{")?;
                for (i, (name, value)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write_symbol(f, name)?;
                    write!(f, ": {value}")?;
                }
                f.write_str("}")
            }
        }
    }
}
