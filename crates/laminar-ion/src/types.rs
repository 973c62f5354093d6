//! Row-model type descriptors and column schemas.
//!
//! - [`TypeDescriptor`]: the statically-typed shape of a row-model value
//! - [`Column`] / [`ColumnSchema`]: ordered, uniquely named table columns
//!
//! Descriptors parse from and render to the host engine's type syntax
//! (`struct<id:int,tags:array<string>>`), which is how `columns.types`
//! arrives in table properties.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{IonSerdeError, IonSerdeResult};

/// Default precision for a bare `decimal` declaration.
pub const DEFAULT_DECIMAL_PRECISION: u8 = 10;
/// Default scale for a bare `decimal` declaration.
pub const DEFAULT_DECIMAL_SCALE: u8 = 0;
/// Largest precision the host engine accepts.
pub const MAX_DECIMAL_PRECISION: u8 = 38;

/// Row-model type of a column or nested value.
///
/// Map keys are always text and are therefore not carried in the descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// `boolean`
    Boolean,
    /// `tinyint` (8-bit signed)
    TinyInt,
    /// `smallint` (16-bit signed)
    SmallInt,
    /// `int` (32-bit signed)
    Int,
    /// `bigint` (64-bit signed)
    BigInt,
    /// `float` (32-bit IEEE 754)
    Float,
    /// `double` (64-bit IEEE 754)
    Double,
    /// `decimal(precision, scale)`
    Decimal {
        /// Total number of digits.
        precision: u8,
        /// Digits after the decimal point.
        scale: u8,
    },
    /// `char(n)`
    Char(u32),
    /// `varchar(n)`
    Varchar(u32),
    /// `string`
    String,
    /// `binary`
    Binary,
    /// `date`
    Date,
    /// `timestamp`
    Timestamp,
    /// `array<T>`
    List(Box<TypeDescriptor>),
    /// `map<string, T>`
    Map(Box<TypeDescriptor>),
    /// `struct<name:T, ...>`
    Struct(Vec<StructField>),
    /// `uniontype<T, ...>`
    Union(Vec<TypeDescriptor>),
}

/// A named member of a [`TypeDescriptor::Struct`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructField {
    /// Field name, unique within its struct.
    pub name: String,
    /// Field type.
    pub data_type: TypeDescriptor,
}

impl StructField {
    /// Creates a struct field.
    pub fn new(name: impl Into<String>, data_type: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

impl TypeDescriptor {
    /// Shorthand for `decimal(precision, scale)`.
    #[must_use]
    pub fn decimal(precision: u8, scale: u8) -> Self {
        Self::Decimal { precision, scale }
    }

    /// Shorthand for `array<element>`.
    #[must_use]
    pub fn list(element: TypeDescriptor) -> Self {
        Self::List(Box::new(element))
    }

    /// Shorthand for `map<string, value>`.
    #[must_use]
    pub fn map(value: TypeDescriptor) -> Self {
        Self::Map(Box::new(value))
    }

    /// Shorthand for a struct from `(name, type)` pairs.
    #[must_use]
    pub fn structure<N: Into<String>>(fields: impl IntoIterator<Item = (N, TypeDescriptor)>) -> Self {
        Self::Struct(
            fields
                .into_iter()
                .map(|(n, t)| StructField::new(n, t))
                .collect(),
        )
    }

    /// Returns `true` for non-container types.
    #[must_use]
    pub fn is_primitive(&self) -> bool {
        !matches!(
            self,
            Self::List(_) | Self::Map(_) | Self::Struct(_) | Self::Union(_)
        )
    }

    /// Returns `true` for the fixed-width integer family.
    #[must_use]
    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Self::TinyInt | Self::SmallInt | Self::Int | Self::BigInt
        )
    }

    /// Bit width of an integer-family type.
    #[must_use]
    pub fn integer_width(&self) -> Option<u32> {
        match self {
            Self::TinyInt => Some(8),
            Self::SmallInt => Some(16),
            Self::Int => Some(32),
            Self::BigInt => Some(64),
            _ => None,
        }
    }

    /// Checks the recursive well-formedness invariants.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] for duplicate struct
    /// field names, empty structs or unions, and out-of-range decimals.
    pub fn validate(&self) -> IonSerdeResult<()> {
        match self {
            Self::Decimal { precision, scale } => {
                if *precision == 0 || *precision > MAX_DECIMAL_PRECISION || scale > precision {
                    return Err(IonSerdeError::config(
                        "columns.types",
                        format!("invalid decimal({precision},{scale})"),
                    ));
                }
                Ok(())
            }
            Self::Char(0) | Self::Varchar(0) => Err(IonSerdeError::config(
                "columns.types",
                format!("{self} must have a positive length"),
            )),
            Self::List(inner) | Self::Map(inner) => inner.validate(),
            Self::Struct(fields) => {
                if fields.is_empty() {
                    return Err(IonSerdeError::config(
                        "columns.types",
                        "struct must declare at least one field",
                    ));
                }
                for (i, field) in fields.iter().enumerate() {
                    if fields[..i].iter().any(|f| f.name == field.name) {
                        return Err(IonSerdeError::config(
                            "columns.types",
                            format!("duplicate struct field '{}'", field.name),
                        ));
                    }
                    field.data_type.validate()?;
                }
                Ok(())
            }
            Self::Union(variants) => {
                if variants.is_empty() {
                    return Err(IonSerdeError::config(
                        "columns.types",
                        "uniontype must declare at least one variant",
                    ));
                }
                if variants.len() > usize::from(u8::MAX) + 1 {
                    return Err(IonSerdeError::config(
                        "columns.types",
                        format!("uniontype declares {} variants, at most 256 allowed", variants.len()),
                    ));
                }
                variants.iter().try_for_each(TypeDescriptor::validate)
            }
            _ => Ok(()),
        }
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean => f.write_str("boolean"),
            Self::TinyInt => f.write_str("tinyint"),
            Self::SmallInt => f.write_str("smallint"),
            Self::Int => f.write_str("int"),
            Self::BigInt => f.write_str("bigint"),
            Self::Float => f.write_str("float"),
            Self::Double => f.write_str("double"),
            Self::Decimal { precision, scale } => write!(f, "decimal({precision},{scale})"),
            Self::Char(n) => write!(f, "char({n})"),
            Self::Varchar(n) => write!(f, "varchar({n})"),
            Self::String => f.write_str("string"),
            Self::Binary => f.write_str("binary"),
            Self::Date => f.write_str("date"),
            Self::Timestamp => f.write_str("timestamp"),
            Self::List(inner) => write!(f, "array<{inner}>"),
            Self::Map(value) => write!(f, "map<string,{value}>"),
            Self::Struct(fields) => {
                f.write_str("struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{}:{}", field.name, field.data_type)?;
                }
                f.write_str(">")
            }
            Self::Union(variants) => {
                f.write_str("uniontype<")?;
                for (i, v) in variants.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{v}")?;
                }
                f.write_str(">")
            }
        }
    }
}

impl FromStr for TypeDescriptor {
    type Err = IonSerdeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parser = TypeParser::new(s);
        let ty = parser.parse_type()?;
        parser.expect_end()?;
        ty.validate()?;
        Ok(ty)
    }
}

// ── Column schema ──────────────────────────────────────────────────

/// One table column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    /// Column name.
    pub name: String,
    /// Column type.
    pub data_type: TypeDescriptor,
}

impl Column {
    /// Creates a column.
    pub fn new(name: impl Into<String>, data_type: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered list of uniquely named columns. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSchema {
    columns: Vec<Column>,
}

impl ColumnSchema {
    /// Builds a schema, validating names and types.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] on an empty or
    /// duplicate column name or a malformed type.
    pub fn new(columns: Vec<Column>) -> IonSerdeResult<Self> {
        for (i, col) in columns.iter().enumerate() {
            if col.name.is_empty() {
                return Err(IonSerdeError::config("columns", "empty column name"));
            }
            if columns[..i].iter().any(|c| c.name == col.name) {
                return Err(IonSerdeError::config(
                    "columns",
                    format!("duplicate column '{}'", col.name),
                ));
            }
            col.data_type.validate()?;
        }
        Ok(Self { columns })
    }

    /// Builds a schema from the `columns` / `columns.types` property pair.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] when the lists differ
    /// in length or a type string does not parse.
    pub fn from_properties(names: &str, types: &str) -> IonSerdeResult<Self> {
        let names: Vec<&str> = names
            .split(',')
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .collect();
        let types = parse_type_list(types)?;
        if names.len() != types.len() {
            return Err(IonSerdeError::config(
                "columns.types",
                format!(
                    "{} column names but {} column types",
                    names.len(),
                    types.len()
                ),
            ));
        }
        Self::new(
            names
                .into_iter()
                .zip(types)
                .map(|(n, t)| Column::new(n, t))
                .collect(),
        )
    }

    /// Number of columns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    /// Returns `true` if the schema has no columns.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Columns in declaration order.
    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Column at `index`.
    #[must_use]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    /// Index of the column named `name`.
    #[must_use]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }
}

/// Parses a top-level type list separated by `:` (or `,`) at depth zero.
///
/// # Errors
///
/// Returns [`IonSerdeError::InvalidConfiguration`] on malformed input.
pub fn parse_type_list(s: &str) -> IonSerdeResult<Vec<TypeDescriptor>> {
    let mut parser = TypeParser::new(s);
    let mut out = Vec::new();
    parser.skip_ws();
    if parser.at_end() {
        return Ok(out);
    }
    loop {
        let ty = parser.parse_type()?;
        ty.validate()?;
        out.push(ty);
        parser.skip_ws();
        if parser.at_end() {
            return Ok(out);
        }
        if !(parser.eat(':') || parser.eat(',')) {
            return Err(parser.error("expected ':' between column types"));
        }
    }
}

// ── Parser ─────────────────────────────────────────────────────────

struct TypeParser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> TypeParser<'a> {
    fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn error(&self, message: &str) -> IonSerdeError {
        IonSerdeError::config(
            "columns.types",
            format!("{message} at offset {} in '{}'", self.pos, self.input),
        )
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn at_end(&self) -> bool {
        self.pos >= self.input.len()
    }

    fn skip_ws(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.input.len() - trimmed.len();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        if self.rest().starts_with(c) {
            self.pos += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, c: char) -> IonSerdeResult<()> {
        if self.eat(c) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{c}'")))
        }
    }

    fn expect_end(&mut self) -> IonSerdeResult<()> {
        self.skip_ws();
        if self.at_end() {
            Ok(())
        } else {
            Err(self.error("unexpected trailing input"))
        }
    }

    fn ident(&mut self) -> IonSerdeResult<&'a str> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$'))
            .unwrap_or(rest.len());
        if len == 0 {
            return Err(self.error("expected identifier"));
        }
        self.pos += len;
        Ok(&rest[..len])
    }

    fn number(&mut self) -> IonSerdeResult<u32> {
        self.skip_ws();
        let rest = self.rest();
        let len = rest
            .find(|c: char| !c.is_ascii_digit())
            .unwrap_or(rest.len());
        let n = rest[..len]
            .parse::<u32>()
            .map_err(|_| self.error("expected number"))?;
        self.pos += len;
        Ok(n)
    }

    fn length_param(&mut self) -> IonSerdeResult<u32> {
        self.expect('(')?;
        let n = self.number()?;
        self.expect(')')?;
        Ok(n)
    }

    fn parse_type(&mut self) -> IonSerdeResult<TypeDescriptor> {
        let keyword = self.ident()?.to_ascii_lowercase();
        Ok(match keyword.as_str() {
            "boolean" => TypeDescriptor::Boolean,
            "tinyint" => TypeDescriptor::TinyInt,
            "smallint" => TypeDescriptor::SmallInt,
            "int" | "integer" => TypeDescriptor::Int,
            "bigint" => TypeDescriptor::BigInt,
            "float" => TypeDescriptor::Float,
            "double" => TypeDescriptor::Double,
            "string" => TypeDescriptor::String,
            "binary" => TypeDescriptor::Binary,
            "date" => TypeDescriptor::Date,
            "timestamp" => TypeDescriptor::Timestamp,
            "char" => TypeDescriptor::Char(self.length_param()?),
            "varchar" => TypeDescriptor::Varchar(self.length_param()?),
            "decimal" => {
                if self.eat('(') {
                    let precision = self.small_number()?;
                    let scale = if self.eat(',') {
                        self.small_number()?
                    } else {
                        DEFAULT_DECIMAL_SCALE
                    };
                    self.expect(')')?;
                    TypeDescriptor::Decimal { precision, scale }
                } else {
                    TypeDescriptor::Decimal {
                        precision: DEFAULT_DECIMAL_PRECISION,
                        scale: DEFAULT_DECIMAL_SCALE,
                    }
                }
            }
            "array" => {
                self.expect('<')?;
                let inner = self.parse_type()?;
                self.expect('>')?;
                TypeDescriptor::List(Box::new(inner))
            }
            "map" => {
                self.expect('<')?;
                let key = self.parse_type()?;
                if !matches!(
                    key,
                    TypeDescriptor::String | TypeDescriptor::Char(_) | TypeDescriptor::Varchar(_)
                ) {
                    return Err(self.error(&format!("map key must be text, got {key}")));
                }
                self.expect(',')?;
                let value = self.parse_type()?;
                self.expect('>')?;
                TypeDescriptor::Map(Box::new(value))
            }
            "struct" => {
                self.expect('<')?;
                let mut fields = Vec::new();
                loop {
                    let name = self.ident()?.to_string();
                    self.expect(':')?;
                    let data_type = self.parse_type()?;
                    fields.push(StructField { name, data_type });
                    if !self.eat(',') {
                        break;
                    }
                }
                self.expect('>')?;
                TypeDescriptor::Struct(fields)
            }
            "uniontype" => {
                self.expect('<')?;
                let mut variants = vec![self.parse_type()?];
                while self.eat(',') {
                    variants.push(self.parse_type()?);
                }
                self.expect('>')?;
                TypeDescriptor::Union(variants)
            }
            other => return Err(self.error(&format!("unknown type '{other}'"))),
        })
    }

    fn small_number(&mut self) -> IonSerdeResult<u8> {
        let n = self.number()?;
        u8::try_from(n).map_err(|_| self.error("decimal parameter out of range"))
    }
}
