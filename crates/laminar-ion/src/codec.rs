//! Streaming cursor interfaces to the Ion codec.
//!
//! The binary and text encoders live outside this crate. The serde core
//! talks to them through two cursor traits:
//!
//! | Trait | Direction | Primitives |
//! |-------|-----------|------------|
//! | [`DocumentReader`] | Ion → rows | `next`, `step_in`, `step_out`, `read_element` |
//! | [`DocumentWriter`] | rows → Ion | `step_in`, `step_out`, `set_field_name`, `write_*` |
//!
//! [`ElementReader`] and [`ElementWriter`] implement the traits over the
//! in-memory [`Element`] tree. Cursors are owned by exactly one call and
//! release their resources on drop, including on error paths.

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::element::{Element, IonTimestamp, IonType, Value};
use crate::error::{IonSerdeError, IonSerdeResult};

// ── DocumentReader ─────────────────────────────────────────────────

/// Forward-only, depth-first cursor over a stream of Ion values.
pub trait DocumentReader {
    /// Advances to the next value at the current depth.
    ///
    /// Returns `None` at the end of the current container (or stream).
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::MalformedInput`] if the underlying data is
    /// structurally invalid.
    fn next(&mut self) -> IonSerdeResult<Option<IonType>>;

    /// Type of the current value, `None` before the first `next`.
    fn ion_type(&self) -> Option<IonType>;

    /// Returns `true` if the current value is a (typed) null.
    fn is_null(&self) -> bool;

    /// Field name of the current value when positioned inside a struct.
    fn field_name(&self) -> Option<&str>;

    /// Annotations on the current value.
    fn annotations(&self) -> &[String];

    /// Container nesting depth; zero at top level.
    fn depth(&self) -> usize;

    /// Steps into the current container value.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] if the current value is not a
    /// non-null container.
    fn step_in(&mut self) -> IonSerdeResult<()>;

    /// Steps out to the parent, skipping any unread children.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] at top level.
    fn step_out(&mut self) -> IonSerdeResult<()>;

    /// Materializes the current value and its whole subtree.
    ///
    /// The cursor stays positioned on the value; the following `next`
    /// moves past it.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] if no value is current, or
    /// [`IonSerdeError::MalformedInput`] on invalid data.
    fn read_element(&mut self) -> IonSerdeResult<Element>;
}

#[derive(Debug, Clone, Copy)]
enum Children<'a> {
    Sequence(&'a [Element]),
    Fields(&'a [(String, Element)]),
}

impl<'a> Children<'a> {
    fn get(self, index: usize) -> Option<(Option<&'a str>, &'a Element)> {
        match self {
            Self::Sequence(items) => items.get(index).map(|e| (None, e)),
            Self::Fields(fields) => fields.get(index).map(|(n, e)| (Some(n.as_str()), e)),
        }
    }
}

#[derive(Debug)]
struct Frame<'a> {
    children: Children<'a>,
    /// Index of the current child; `None` before the first `next`.
    position: Option<usize>,
}

/// [`DocumentReader`] over a slice of top-level elements.
#[derive(Debug)]
pub struct ElementReader<'a> {
    stack: Vec<Frame<'a>>,
}

impl<'a> ElementReader<'a> {
    /// Creates a reader over a stream of top-level values.
    #[must_use]
    pub fn new(stream: &'a [Element]) -> Self {
        Self {
            stack: vec![Frame {
                children: Children::Sequence(stream),
                position: None,
            }],
        }
    }

    fn current(&self) -> Option<(Option<&'a str>, &'a Element)> {
        let frame = self.stack.last()?;
        frame.children.get(frame.position?)
    }
}

impl DocumentReader for ElementReader<'_> {
    fn next(&mut self) -> IonSerdeResult<Option<IonType>> {
        let Some(frame) = self.stack.last_mut() else {
            return Err(IonSerdeError::Codec("reader has no open frame".into()));
        };
        let next = frame.position.map_or(0, |p| p + 1);
        match frame.children.get(next) {
            Some((_, element)) => {
                frame.position = Some(next);
                Ok(Some(element.ion_type()))
            }
            None => {
                // Park past the end so repeated calls keep returning None.
                frame.position = Some(next);
                Ok(None)
            }
        }
    }

    fn ion_type(&self) -> Option<IonType> {
        self.current().map(|(_, e)| e.ion_type())
    }

    fn is_null(&self) -> bool {
        self.current().is_some_and(|(_, e)| e.is_null())
    }

    fn field_name(&self) -> Option<&str> {
        self.current().and_then(|(n, _)| n)
    }

    fn annotations(&self) -> &[String] {
        self.current().map_or(&[][..], |(_, e)| e.annotations())
    }

    fn depth(&self) -> usize {
        self.stack.len() - 1
    }

    fn step_in(&mut self) -> IonSerdeResult<()> {
        let (_, element) = self
            .current()
            .ok_or_else(|| IonSerdeError::Codec("step_in without a current value".into()))?;
        let children = match element.value() {
            Value::List(items) | Value::SExp(items) => Children::Sequence(items),
            Value::Struct(fields) => Children::Fields(fields),
            other => {
                return Err(IonSerdeError::Codec(format!(
                    "cannot step into {}",
                    if matches!(other, Value::Null(_)) {
                        "a null".to_string()
                    } else {
                        other.ion_type().to_string()
                    }
                )))
            }
        };
        self.stack.push(Frame {
            children,
            position: None,
        });
        Ok(())
    }

    fn step_out(&mut self) -> IonSerdeResult<()> {
        if self.stack.len() <= 1 {
            return Err(IonSerdeError::Codec("step_out at top level".into()));
        }
        self.stack.pop();
        Ok(())
    }

    fn read_element(&mut self) -> IonSerdeResult<Element> {
        self.current()
            .map(|(_, e)| e.clone())
            .ok_or_else(|| IonSerdeError::Codec("read_element without a current value".into()))
    }
}

// ── DocumentWriter ─────────────────────────────────────────────────

/// Streaming writer of Ion values.
pub trait DocumentWriter {
    /// Sets the field name for the next value written inside a struct.
    fn set_field_name(&mut self, name: &str);

    /// Writes a null; `None` writes the untyped `null.null`.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] on misuse or output failure.
    fn write_null(&mut self, ion_type: Option<IonType>) -> IonSerdeResult<()>;

    /// Writes a `bool`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_bool(&mut self, value: bool) -> IonSerdeResult<()>;

    /// Writes an arbitrary-precision `int`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_int(&mut self, value: &BigInt) -> IonSerdeResult<()>;

    /// Writes a 32-bit `float`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_f32(&mut self, value: f32) -> IonSerdeResult<()>;

    /// Writes a 64-bit `float`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_f64(&mut self, value: f64) -> IonSerdeResult<()>;

    /// Writes a `decimal`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_decimal(&mut self, value: &BigDecimal) -> IonSerdeResult<()>;

    /// Writes a `timestamp`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_timestamp(&mut self, value: &IonTimestamp) -> IonSerdeResult<()>;

    /// Writes a `string`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_string(&mut self, value: &str) -> IonSerdeResult<()>;

    /// Writes a `symbol`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_symbol(&mut self, value: &str) -> IonSerdeResult<()>;

    /// Writes a `blob`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_blob(&mut self, value: &[u8]) -> IonSerdeResult<()>;

    /// Writes a `clob`.
    ///
    /// # Errors
    ///
    /// See [`write_null`](Self::write_null).
    fn write_clob(&mut self, value: &[u8]) -> IonSerdeResult<()>;

    /// Opens a list, sexp, or struct.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] if `container` is not a container type.
    fn step_in(&mut self, container: IonType) -> IonSerdeResult<()>;

    /// Closes the innermost open container.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] at top level.
    fn step_out(&mut self) -> IonSerdeResult<()>;

    /// Number of open containers.
    fn depth(&self) -> usize;
}

#[derive(Debug)]
struct OpenContainer {
    ion_type: IonType,
    field_name: Option<String>,
    children: Vec<(Option<String>, Element)>,
}

/// [`DocumentWriter`] that builds [`Element`] trees.
#[derive(Debug, Default)]
pub struct ElementWriter {
    output: Vec<Element>,
    open: Vec<OpenContainer>,
    pending_field: Option<String>,
}

impl ElementWriter {
    /// Creates an empty writer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the completed top-level values.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::Codec`] if a container is still open.
    pub fn finish(self) -> IonSerdeResult<Vec<Element>> {
        if !self.open.is_empty() {
            return Err(IonSerdeError::Codec(format!(
                "{} container(s) still open at finish",
                self.open.len()
            )));
        }
        Ok(self.output)
    }

    fn push(&mut self, element: Element) -> IonSerdeResult<()> {
        let field = self.pending_field.take();
        match self.open.last_mut() {
            None => {
                self.output.push(element);
                Ok(())
            }
            Some(parent) if parent.ion_type == IonType::Struct => {
                let name = field.ok_or_else(|| {
                    IonSerdeError::Codec(format!(
                        "{} value written inside a struct without a field name",
                        element.ion_type()
                    ))
                })?;
                parent.children.push((Some(name), element));
                Ok(())
            }
            Some(parent) => {
                parent.children.push((None, element));
                Ok(())
            }
        }
    }

    fn push_value(&mut self, value: Value) -> IonSerdeResult<()> {
        self.push(Element::new(value))
    }
}

impl DocumentWriter for ElementWriter {
    fn set_field_name(&mut self, name: &str) {
        self.pending_field = Some(name.to_string());
    }

    fn write_null(&mut self, ion_type: Option<IonType>) -> IonSerdeResult<()> {
        self.push_value(Value::Null(ion_type.unwrap_or(IonType::Null)))
    }

    fn write_bool(&mut self, value: bool) -> IonSerdeResult<()> {
        self.push_value(Value::Bool(value))
    }

    fn write_int(&mut self, value: &BigInt) -> IonSerdeResult<()> {
        self.push_value(Value::Int(value.clone()))
    }

    fn write_f32(&mut self, value: f32) -> IonSerdeResult<()> {
        self.push_value(Value::Float(f64::from(value)))
    }

    fn write_f64(&mut self, value: f64) -> IonSerdeResult<()> {
        self.push_value(Value::Float(value))
    }

    fn write_decimal(&mut self, value: &BigDecimal) -> IonSerdeResult<()> {
        self.push_value(Value::Decimal(value.clone()))
    }

    fn write_timestamp(&mut self, value: &IonTimestamp) -> IonSerdeResult<()> {
        self.push_value(Value::Timestamp(*value))
    }

    fn write_string(&mut self, value: &str) -> IonSerdeResult<()> {
        self.push_value(Value::String(value.to_string()))
    }

    fn write_symbol(&mut self, value: &str) -> IonSerdeResult<()> {
        self.push_value(Value::Symbol(value.to_string()))
    }

    fn write_blob(&mut self, value: &[u8]) -> IonSerdeResult<()> {
        self.push_value(Value::Blob(value.to_vec()))
    }

    fn write_clob(&mut self, value: &[u8]) -> IonSerdeResult<()> {
        self.push_value(Value::Clob(value.to_vec()))
    }

    fn step_in(&mut self, container: IonType) -> IonSerdeResult<()> {
        if !container.is_container() {
            return Err(IonSerdeError::Codec(format!(
                "cannot step into {container}"
            )));
        }
        if self.open.last().is_some_and(|p| p.ion_type == IonType::Struct)
            && self.pending_field.is_none()
        {
            return Err(IonSerdeError::Codec(format!(
                "{container} opened inside a struct without a field name"
            )));
        }
        let field_name = self.pending_field.take();
        self.open.push(OpenContainer {
            ion_type: container,
            field_name,
            children: Vec::new(),
        });
        Ok(())
    }

    fn step_out(&mut self) -> IonSerdeResult<()> {
        let container = self
            .open
            .pop()
            .ok_or_else(|| IonSerdeError::Codec("step_out at top level".into()))?;
        let value = match container.ion_type {
            IonType::Struct => Value::Struct(
                container
                    .children
                    .into_iter()
                    .map(|(n, e)| (n.unwrap_or_default(), e))
                    .collect(),
            ),
            IonType::SExp => Value::SExp(container.children.into_iter().map(|(_, e)| e).collect()),
            _ => Value::List(container.children.into_iter().map(|(_, e)| e).collect()),
        };
        self.pending_field = container.field_name;
        self.push_value(value)
    }

    fn depth(&self) -> usize {
        self.open.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<Element> {
        vec![
            Element::structure([
                ("id", Element::from(7)),
                ("tags", Element::list([Element::from("a"), Element::from("b")])),
            ]),
            Element::from(true),
        ]
    }

    #[test]
    fn test_reader_walks_depth_first() {
        let stream = sample();
        let mut reader = ElementReader::new(&stream);
        assert_eq!(reader.ion_type(), None);
        assert_eq!(reader.next().unwrap(), Some(IonType::Struct));
        reader.step_in().unwrap();
        assert_eq!(reader.depth(), 1);
        assert_eq!(reader.next().unwrap(), Some(IonType::Int));
        assert_eq!(reader.field_name(), Some("id"));
        assert_eq!(reader.next().unwrap(), Some(IonType::List));
        assert_eq!(reader.field_name(), Some("tags"));
        reader.step_in().unwrap();
        assert_eq!(reader.next().unwrap(), Some(IonType::String));
        assert_eq!(reader.field_name(), None);
        reader.step_out().unwrap();
        assert_eq!(reader.next().unwrap(), None);
        assert_eq!(reader.next().unwrap(), None);
        reader.step_out().unwrap();
        assert_eq!(reader.next().unwrap(), Some(IonType::Bool));
        assert_eq!(reader.next().unwrap(), None);
    }

    #[test]
    fn test_reader_read_element_keeps_position() {
        let stream = sample();
        let mut reader = ElementReader::new(&stream);
        reader.next().unwrap();
        let e = reader.read_element().unwrap();
        assert_eq!(e, stream[0]);
        assert_eq!(reader.next().unwrap(), Some(IonType::Bool));
    }

    #[test]
    fn test_reader_misuse() {
        let stream = sample();
        let mut reader = ElementReader::new(&stream);
        assert!(reader.step_out().is_err());
        assert!(reader.step_in().is_err());
        reader.next().unwrap();
        reader.next().unwrap();
        assert!(matches!(reader.step_in(), Err(IonSerdeError::Codec(_))));
    }

    #[test]
    fn test_writer_builds_tree() {
        let mut writer = ElementWriter::new();
        writer.step_in(IonType::Struct).unwrap();
        writer.set_field_name("id");
        writer.write_int(&BigInt::from(7)).unwrap();
        writer.set_field_name("tags");
        writer.step_in(IonType::List).unwrap();
        writer.write_string("a").unwrap();
        writer.write_string("b").unwrap();
        writer.step_out().unwrap();
        writer.step_out().unwrap();
        writer.write_bool(true).unwrap();
        assert_eq!(writer.finish().unwrap(), sample());
    }

    #[test]
    fn test_writer_requires_field_names_in_struct() {
        let mut writer = ElementWriter::new();
        writer.step_in(IonType::Struct).unwrap();
        assert!(matches!(writer.write_bool(true), Err(IonSerdeError::Codec(_))));
        assert!(writer.step_in(IonType::List).is_err());
    }

    #[test]
    fn test_writer_finish_with_open_container_fails() {
        let mut writer = ElementWriter::new();
        writer.step_in(IonType::List).unwrap();
        assert_eq!(writer.depth(), 1);
        assert!(writer.finish().is_err());
    }

    #[test]
    fn test_writer_typed_null() {
        let mut writer = ElementWriter::new();
        writer.write_null(Some(IonType::Int)).unwrap();
        writer.write_null(None).unwrap();
        let out = writer.finish().unwrap();
        assert_eq!(out[0], Element::typed_null(IonType::Int));
        assert_eq!(out[1], Element::null());
    }
}
