//! Case-insensitive field access over Ion containers.
//!
//! [`view`] wraps an [`Element`] without copying it. `get` tries an exact
//! field match first; when that misses and the view is case-insensitive,
//! it scans the struct's direct children once and returns the first field
//! whose name matches ignoring case. Among several case variants of the
//! same name, the first in field order wins.
//!
//! Children reached through a view are views with the same sensitivity,
//! so the fallback applies at every depth without wrapping the tree up
//! front.

use crate::element::Element;

/// Compares field names under the given sensitivity.
#[must_use]
pub fn names_match(a: &str, b: &str, case_sensitive: bool) -> bool {
    if case_sensitive {
        a == b
    } else {
        a == b
            || a.chars()
                .flat_map(char::to_lowercase)
                .eq(b.chars().flat_map(char::to_lowercase))
    }
}

/// Read-only view of an element.
#[derive(Debug, Clone, Copy)]
pub struct View<'a> {
    element: &'a Element,
    case_sensitive: bool,
}

/// Wraps `element` in a view.
#[must_use]
pub fn view(element: &Element, case_sensitive: bool) -> View<'_> {
    View {
        element,
        case_sensitive,
    }
}

impl<'a> View<'a> {
    /// The underlying element.
    #[must_use]
    pub fn element(&self) -> &'a Element {
        self.element
    }

    /// Whether lookups are case-sensitive.
    #[must_use]
    pub fn is_case_sensitive(&self) -> bool {
        self.case_sensitive
    }

    fn wrap(&self, element: &'a Element) -> View<'a> {
        View {
            element,
            case_sensitive: self.case_sensitive,
        }
    }

    /// Field `name` of a struct, falling back to a case-insensitive match.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<View<'a>> {
        let fields = self.element.fields();
        let exact = fields.iter().find(|(n, _)| n == name);
        let found = match exact {
            Some(hit) => Some(hit),
            None if !self.case_sensitive => fields
                .iter()
                .find(|(n, _)| names_match(n, name, false)),
            None => None,
        };
        found.map(|(_, e)| self.wrap(e))
    }

    /// Child at `index` of a list or sexp.
    #[must_use]
    pub fn index(&self, index: usize) -> Option<View<'a>> {
        self.element.items().get(index).map(|e| self.wrap(e))
    }

    /// Struct fields as `(name, view)` pairs.
    pub fn fields(&self) -> impl Iterator<Item = (&'a str, View<'a>)> + 'a {
        let (element, case_sensitive) = (self.element, self.case_sensitive);
        element.fields().iter().map(move |(n, e)| {
            (
                n.as_str(),
                View {
                    element: e,
                    case_sensitive,
                },
            )
        })
    }

    /// Sequence children as views.
    pub fn items(&self) -> impl Iterator<Item = View<'a>> + 'a {
        let (element, case_sensitive) = (self.element, self.case_sensitive);
        element.items().iter().map(move |e| View {
            element: e,
            case_sensitive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc() -> Element {
        Element::structure([
            ("Foo", Element::from(1)),
            ("foo_bar", Element::from(2)),
            (
                "Nested",
                Element::structure([("Inner", Element::from("x")), ("inner", Element::from("y"))]),
            ),
            ("FOO", Element::from(3)),
        ])
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let d = doc();
        let v = view(&d, false);
        let hit = v.get("foo").unwrap();
        assert_eq!(hit.element(), &Element::from(1));
        assert!(view(&d, true).get("foo").is_none());
    }

    #[test]
    fn test_exact_match_preferred() {
        let d = doc();
        assert_eq!(view(&d, false).get("FOO").unwrap().element(), &Element::from(3));
        let nested = view(&d, false).get("nested").unwrap();
        assert_eq!(nested.get("inner").unwrap().element(), &Element::from("y"));
    }

    #[test]
    fn test_first_case_variant_wins() {
        let d = doc();
        let nested = view(&d, false).get("NESTED").unwrap();
        assert_eq!(nested.get("INNER").unwrap().element(), &Element::from("x"));
    }

    #[test]
    fn test_nested_views_inherit_sensitivity() {
        let d = doc();
        let nested = view(&d, true).get("Nested").unwrap();
        assert!(nested.is_case_sensitive());
        assert!(nested.get("INNER").is_none());
        let names: Vec<&str> = nested.fields().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["Inner", "inner"]);
    }

    #[test]
    fn test_sequences() {
        let d = Element::list([Element::structure([("A", Element::from(true))])]);
        let v = view(&d, false);
        assert_eq!(v.items().count(), 1);
        assert!(v.index(0).unwrap().get("a").is_some());
        assert!(v.index(1).is_none());
        assert!(v.get("a").is_none());
    }

    #[test]
    fn test_names_match() {
        assert!(!names_match("Straße", "STRASSE", false));
        assert!(names_match("ÉTÉ", "été", false));
        assert!(!names_match("ÉTÉ", "été", true));
    }
}
