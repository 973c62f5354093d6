//! Search-path extraction of columns from Ion documents.
//!
//! A column is bound to a [`SearchPath`], an S-expression of steps:
//!
//! | Step | Matches |
//! |------|---------|
//! | `name`, `'name'`, `"name"` | struct field with that name |
//! | `3` | child at position 3 of any container |
//! | `*` | any single child |
//! | `**` | zero or more levels |
//! | `A::step` | `step`, if the value carries annotation `A` |
//!
//! `()` matches the top-level value itself.
//!
//! [`PathExtractor`] makes a single forward pass over a [`DocumentReader`].
//! Each binding is tracked as a set of reachable step positions per depth;
//! subtrees no binding can reach are skipped without stepping in. A matched
//! value is read whole and stored in the [`RowAccumulator`]. Nulls bind the
//! null sentinel. If a binding matches several nodes, the last one wins,
//! except that without case sensitivity a field whose name equals the final
//! field step exactly is kept over later case variants, as [`View::get`]
//! does. Only the final step takes part in that preference.
//!
//! [`View::get`]: crate::view::View::get
//!
//! Bindings whose paths could match a common node are rejected when the
//! extractor is built.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::codec::DocumentReader;
use crate::element::Element;
use crate::error::{IonSerdeError, IonSerdeResult};
use crate::view::names_match;

// ── Grammar ────────────────────────────────────────────────────────

/// What a single step selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepKind {
    /// A struct field by name.
    Field(String),
    /// A child by position.
    Index(usize),
    /// Any single child.
    Wildcard,
    /// Zero or more levels.
    AnyDepth,
}

/// One step of a search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStep {
    /// Annotations the matched value must carry.
    pub annotations: Vec<String>,
    /// The selector.
    pub kind: StepKind,
}

impl PathStep {
    /// A step with no annotation requirements.
    #[must_use]
    pub fn new(kind: StepKind) -> Self {
        Self {
            annotations: Vec::new(),
            kind,
        }
    }

    fn is_any_depth(&self) -> bool {
        self.kind == StepKind::AnyDepth
    }

    fn matches(&self, segment: &Segment<'_>, case_sensitive: bool) -> bool {
        let selected = match &self.kind {
            StepKind::Field(name) => segment
                .field
                .is_some_and(|field| names_match(field, name, case_sensitive)),
            StepKind::Index(i) => segment.index == *i,
            StepKind::Wildcard | StepKind::AnyDepth => true,
        };
        selected
            && self
                .annotations
                .iter()
                .all(|a| segment.annotations.iter().any(|have| have == a))
    }

    /// Whether some node could satisfy both steps.
    fn intersects(&self, other: &Self, case_sensitive: bool) -> bool {
        match (&self.kind, &other.kind) {
            (StepKind::Field(a), StepKind::Field(b)) => names_match(a, b, case_sensitive),
            (StepKind::Index(a), StepKind::Index(b)) => a == b,
            _ => true,
        }
    }
}

/// A parsed search path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPath {
    steps: Vec<PathStep>,
}

impl SearchPath {
    /// Path of a single field step; the default for a column.
    #[must_use]
    pub fn field(name: impl Into<String>) -> Self {
        Self {
            steps: vec![PathStep::new(StepKind::Field(name.into()))],
        }
    }

    /// Builds a path from steps.
    #[must_use]
    pub fn from_steps(steps: Vec<PathStep>) -> Self {
        Self { steps }
    }

    /// The steps in order.
    #[must_use]
    pub fn steps(&self) -> &[PathStep] {
        &self.steps
    }

    /// Parses a path, attributing errors to `key`.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] on a syntax error.
    pub fn parse_for(key: &str, text: &str) -> IonSerdeResult<Self> {
        PathParser::new(text)
            .parse()
            .map_err(|message| IonSerdeError::config(key, format!("'{text}': {message}")))
    }

    /// Reachable positions before any segment is consumed.
    fn start(&self) -> Positions {
        self.close(vec![0])
    }

    /// Adds the positions reachable by letting `**` match zero levels.
    fn close(&self, mut positions: Positions) -> Positions {
        let mut i = 0;
        while i < positions.len() {
            let p = positions[i];
            if self.steps.get(p).is_some_and(PathStep::is_any_depth) && !positions.contains(&(p + 1)) {
                positions.push(p + 1);
            }
            i += 1;
        }
        positions.sort_unstable();
        positions
    }

    fn advance(&self, positions: &[usize], segment: &Segment<'_>, case_sensitive: bool) -> Positions {
        let mut next = Vec::new();
        for &p in positions {
            let Some(step) = self.steps.get(p) else {
                continue;
            };
            if step.is_any_depth() {
                next.push(p);
            } else if step.matches(segment, case_sensitive) {
                next.push(p + 1);
            }
        }
        next.dedup();
        self.close(next)
    }

    fn accepts(&self, positions: &[usize]) -> bool {
        positions.contains(&self.steps.len())
    }

    /// Whether a node accepted under `field` matched the final field step
    /// with its exact spelling.
    fn exact_at(&self, field: Option<&str>) -> bool {
        match self.steps.last() {
            Some(PathStep {
                kind: StepKind::Field(name),
                ..
            }) => field == Some(name.as_str()),
            _ => true,
        }
    }

    /// Whether any descendant could still match.
    fn is_live(&self, positions: &[usize]) -> bool {
        positions.iter().any(|&p| p < self.steps.len())
    }

    /// Whether some node is matched by both paths.
    ///
    /// Walks pairs of step positions: both paths consume one level at a
    /// time, `**` may consume a level without advancing or be skipped.
    #[must_use]
    pub fn overlaps(&self, other: &Self, case_sensitive: bool) -> bool {
        let (a, b) = (&self.steps, &other.steps);
        let mut seen = HashSet::new();
        let mut pending = vec![(0usize, 0usize)];
        while let Some((i, j)) = pending.pop() {
            if !seen.insert((i, j)) {
                continue;
            }
            if i == a.len() && j == b.len() {
                return true;
            }
            let sa = a.get(i);
            let sb = b.get(j);
            if sa.is_some_and(PathStep::is_any_depth) {
                pending.push((i + 1, j));
            }
            if sb.is_some_and(PathStep::is_any_depth) {
                pending.push((i, j + 1));
            }
            if let (Some(sa), Some(sb)) = (sa, sb) {
                match (sa.is_any_depth(), sb.is_any_depth()) {
                    (false, false) if sa.intersects(sb, case_sensitive) => pending.push((i + 1, j + 1)),
                    (true, false) => pending.push((i, j + 1)),
                    (false, true) => pending.push((i + 1, j)),
                    _ => {}
                }
            }
        }
        false
    }
}

type Positions = Vec<usize>;

impl FromStr for SearchPath {
    type Err = IonSerdeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_for("path_extractor", s)
    }
}

fn write_text(f: &mut fmt::Formatter<'_>, text: &str) -> fmt::Result {
    let bare = !text.is_empty()
        && !text.bytes().all(|b| b.is_ascii_digit())
        && text != "*"
        && text != "**"
        && text.chars().all(|c| !c.is_whitespace() && !"()'\":".contains(c));
    if bare {
        f.write_str(text)
    } else {
        write!(f, "'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
    }
}

impl fmt::Display for SearchPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("(")?;
        for (i, step) in self.steps.iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            for annotation in &step.annotations {
                write_text(f, annotation)?;
                f.write_str("::")?;
            }
            match &step.kind {
                StepKind::Field(name) => write_text(f, name)?,
                StepKind::Index(i) => write!(f, "{i}")?,
                StepKind::Wildcard => f.write_str("*")?,
                StepKind::AnyDepth => f.write_str("**")?,
            }
        }
        f.write_str(")")
    }
}

#[derive(Debug, PartialEq)]
enum Token {
    Open,
    Close,
    Colons,
    Bare(String),
    Quoted(String),
}

struct PathParser<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
}

impl<'a> PathParser<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            chars: input.chars().peekable(),
        }
    }

    fn token(&mut self) -> Result<Option<Token>, String> {
        while self.chars.peek().is_some_and(|c| c.is_whitespace()) {
            self.chars.next();
        }
        let Some(c) = self.chars.next() else {
            return Ok(None);
        };
        match c {
            '(' => Ok(Some(Token::Open)),
            ')' => Ok(Some(Token::Close)),
            ':' => {
                if self.chars.next() == Some(':') {
                    Ok(Some(Token::Colons))
                } else {
                    Err("expected '::'".into())
                }
            }
            '\'' | '"' => self.quoted(c).map(|s| Some(Token::Quoted(s))),
            _ => {
                let mut text = String::from(c);
                while let Some(&c) = self.chars.peek() {
                    if c.is_whitespace() || "()'\":".contains(c) {
                        break;
                    }
                    text.push(c);
                    self.chars.next();
                }
                Ok(Some(Token::Bare(text)))
            }
        }
    }

    fn quoted(&mut self, quote: char) -> Result<String, String> {
        let mut text = String::new();
        loop {
            match self.chars.next() {
                None => return Err("unterminated quoted name".into()),
                Some('\\') => match self.chars.next() {
                    Some(c) => text.push(c),
                    None => return Err("unterminated escape".into()),
                },
                Some(c) if c == quote => return Ok(text),
                Some(c) => text.push(c),
            }
        }
    }

    fn parse(mut self) -> Result<SearchPath, String> {
        if self.token()? != Some(Token::Open) {
            return Err("a search path starts with '('".into());
        }
        let mut steps = Vec::new();
        let mut annotations = Vec::new();
        loop {
            let token = self.token()?.ok_or("missing ')'")?;
            let (text, quoted) = match token {
                Token::Close if annotations.is_empty() => break,
                Token::Close => return Err("annotation without a step".into()),
                Token::Open => return Err("nested '(' is not a step".into()),
                Token::Colons => return Err("'::' without an annotation".into()),
                Token::Bare(text) => (text, false),
                Token::Quoted(text) => (text, true),
            };
            if self.chars.peek() == Some(&':') {
                if self.token()? != Some(Token::Colons) {
                    return Err("expected '::'".into());
                }
                annotations.push(text);
                continue;
            }
            let kind = if quoted {
                StepKind::Field(text)
            } else if text == "*" {
                StepKind::Wildcard
            } else if text == "**" {
                if !annotations.is_empty() {
                    return Err("'**' cannot carry annotations".into());
                }
                StepKind::AnyDepth
            } else if text.bytes().all(|b| b.is_ascii_digit()) {
                StepKind::Index(text.parse().map_err(|_| format!("index {text} too large"))?)
            } else {
                StepKind::Field(text)
            };
            steps.push(PathStep {
                annotations: std::mem::take(&mut annotations),
                kind,
            });
        }
        if self.token()?.is_some() {
            return Err("trailing input after ')'".into());
        }
        Ok(SearchPath { steps })
    }
}

// ── Bindings and accumulation ──────────────────────────────────────

/// A column bound to the path its value is extracted from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchPathBinding {
    /// Index of the column in the schema.
    pub column: usize,
    /// Column name, for diagnostics.
    pub name: String,
    /// The search path.
    pub path: SearchPath,
}

impl SearchPathBinding {
    /// Binds `column` to `path`.
    #[must_use]
    pub fn new(column: usize, name: impl Into<String>, path: SearchPath) -> Self {
        Self {
            column,
            name: name.into(),
            path,
        }
    }
}

/// State of one column after extraction.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot {
    /// No path matched.
    Absent,
    /// A null was matched.
    Null,
    /// A non-null value was matched.
    Value(Element),
}

/// Per-document column slots, owned by a single deserialize call.
#[derive(Debug, Clone, PartialEq)]
pub struct RowAccumulator {
    slots: Vec<Slot>,
}

impl RowAccumulator {
    /// `width` absent slots.
    #[must_use]
    pub fn new(width: usize) -> Self {
        Self {
            slots: vec![Slot::Absent; width],
        }
    }

    /// Binds a matched element; nulls become [`Slot::Null`].
    pub fn bind(&mut self, column: usize, element: Element) {
        if let Some(slot) = self.slots.get_mut(column) {
            *slot = if element.is_null() {
                Slot::Null
            } else {
                Slot::Value(element)
            };
        }
    }

    /// Slot of `column`; out-of-range columns are absent.
    #[must_use]
    pub fn get(&self, column: usize) -> &Slot {
        self.slots.get(column).unwrap_or(&Slot::Absent)
    }

    /// Number of slots.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` when there are no slots.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Clears every slot back to absent.
    pub fn reset(&mut self) {
        self.slots.fill(Slot::Absent);
    }
}

// ── Extraction ─────────────────────────────────────────────────────

/// Location of the current node relative to its parent.
struct Segment<'r> {
    field: Option<&'r str>,
    index: usize,
    annotations: &'r [String],
}

/// Single-pass extractor for a fixed set of bindings.
#[derive(Debug, Clone)]
pub struct PathExtractor {
    bindings: Vec<SearchPathBinding>,
    case_sensitive: bool,
}

impl PathExtractor {
    /// Validates `bindings` and builds the extractor.
    ///
    /// # Errors
    ///
    /// Returns [`IonSerdeError::InvalidConfiguration`] if two bindings
    /// could match a common node.
    pub fn new(bindings: Vec<SearchPathBinding>, case_sensitive: bool) -> IonSerdeResult<Self> {
        for (i, a) in bindings.iter().enumerate() {
            for b in &bindings[i + 1..] {
                if a.path.overlaps(&b.path, case_sensitive) {
                    return Err(IonSerdeError::config(
                        format!("ion.{}.path_extractor", b.name),
                        format!(
                            "path {} of column '{}' overlaps path {} of column '{}'",
                            b.path, b.name, a.path, a.name
                        ),
                    ));
                }
            }
        }
        for binding in &bindings {
            debug!(column = %binding.name, path = %binding.path, "bound search path");
        }
        Ok(Self {
            bindings,
            case_sensitive,
        })
    }

    /// The bindings in column order.
    #[must_use]
    pub fn bindings(&self) -> &[SearchPathBinding] {
        &self.bindings
    }

    /// Whether field steps compare names case-sensitively.
    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    /// Consumes the next top-level value of `reader` into `row`.
    ///
    /// Returns `false` when the reader is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates reader errors, including
    /// [`IonSerdeError::MalformedInput`].
    pub fn extract(&self, reader: &mut dyn DocumentReader, row: &mut RowAccumulator) -> IonSerdeResult<bool> {
        if reader.next()?.is_none() {
            return Ok(false);
        }
        let states: Vec<Positions> = self.bindings.iter().map(|b| b.path.start()).collect();
        let mut exact = vec![false; row.len()];
        self.visit(reader, &states, row, &mut exact)?;
        Ok(true)
    }

    /// `exact` records, per column, whether the bound value matched with
    /// the exact field spelling.
    fn visit(
        &self,
        reader: &mut dyn DocumentReader,
        states: &[Positions],
        row: &mut RowAccumulator,
        exact: &mut [bool],
    ) -> IonSerdeResult<()> {
        let matched: Vec<(usize, bool)> = self
            .bindings
            .iter()
            .zip(states)
            .filter(|(b, s)| b.path.accepts(s))
            .map(|(b, _)| (b.column, self.case_sensitive || b.path.exact_at(reader.field_name())))
            .filter(|&(column, is_exact)| is_exact || !exact.get(column).copied().unwrap_or(false))
            .collect();
        if !matched.is_empty() {
            let element = reader.read_element()?;
            for (column, is_exact) in matched {
                row.bind(column, element.clone());
                if let Some(seen) = exact.get_mut(column) {
                    *seen |= is_exact;
                }
            }
        }

        let descend = reader.ion_type().is_some_and(|t| t.is_container())
            && !reader.is_null()
            && self
                .bindings
                .iter()
                .zip(states)
                .any(|(b, s)| b.path.is_live(s));
        if !descend {
            return Ok(());
        }

        reader.step_in()?;
        let mut index = 0;
        while reader.next()?.is_some() {
            let child: Vec<Positions> = {
                let segment = Segment {
                    field: reader.field_name(),
                    index,
                    annotations: reader.annotations(),
                };
                self.bindings
                    .iter()
                    .zip(states)
                    .map(|(b, s)| b.path.advance(s, &segment, self.case_sensitive))
                    .collect()
            };
            if child.iter().any(|s| !s.is_empty()) {
                self.visit(reader, &child, row, exact)?;
            }
            index += 1;
        }
        reader.step_out()
    }
}
