//! Value - the typed node atom
//!
//! A `Value` is an immutable RDF-style atom: an IRI, a blank node, a plain /
//! typed / language-tagged string, or one of the scalar literals.
//!
//! ## Ordering
//!
//! Values are totally ordered by their canonical string form (the `Display`
//! rendering). The canonical forms are disjoint across variants, so the
//! ordering is consistent with equality:
//!
//! - `Iri` renders as `<iri>`
//! - `Bnode` renders as `_:name`
//! - `String` renders as `"escaped"`
//! - `TypedString` renders as `"escaped"^^<datatype>`
//! - `LangString` renders as `"escaped"@lang`
//! - `Int` renders as a plain decimal
//! - `Float` renders in exponent form (`3E0`), keeping it distinct from `Int`
//! - `Bool` renders as `true` / `false`
//! - `Time` renders as RFC 3339 with nanoseconds
//! - `Raw` renders its bytes lossily

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// Typed node value.
///
/// Covers the atoms a quad direction can hold.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Value {
    /// IRI node
    Iri(String),
    /// Blank node with a local name
    Bnode(String),
    /// Plain string literal
    String(String),
    /// String literal with an explicit datatype IRI
    TypedString {
        value: String,
        datatype: String,
    },
    /// String literal with a language tag
    LangString {
        value: String,
        lang: String,
    },
    /// 64-bit signed integer literal
    Int(i64),
    /// 64-bit floating point literal
    Float(f64),
    /// Boolean literal
    Bool(bool),
    /// Timestamp literal (UTC)
    Time(DateTime<Utc>),
    /// Raw, uninterpreted bytes
    Raw(Vec<u8>),
}

impl Value {
    /// IRI constructor
    pub fn iri(s: impl Into<String>) -> Self {
        Value::Iri(s.into())
    }

    /// Blank node constructor
    pub fn bnode(s: impl Into<String>) -> Self {
        Value::Bnode(s.into())
    }

    /// Plain string constructor
    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    /// True for the string-ish variants a plain regex filter applies to
    /// (`String`, `TypedString`, `LangString`).
    pub fn is_string_like(&self) -> bool {
        matches!(
            self,
            Value::String(_) | Value::TypedString { .. } | Value::LangString { .. }
        )
    }

    /// The raw text of a value, if it has one.
    ///
    /// Returns the unquoted string for string-ish variants and the name for
    /// `Iri`/`Bnode`. Scalars return `None`.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Iri(s) | Value::Bnode(s) | Value::String(s) => Some(s),
            Value::TypedString { value, .. } | Value::LangString { value, .. } => Some(value),
            _ => None,
        }
    }

    /// Canonical string form used for ordering and cross-type comparison.
    pub fn canonical(&self) -> String {
        self.to_string()
    }
}

fn escape_into(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    f.write_str("\"")?;
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            c => write!(f, "{c}")?,
        }
    }
    f.write_str("\"")
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Iri(s) => write!(f, "<{s}>"),
            Value::Bnode(s) => write!(f, "_:{s}"),
            Value::String(s) => escape_into(f, s),
            Value::TypedString { value, datatype } => {
                escape_into(f, value)?;
                write!(f, "^^<{datatype}>")
            }
            Value::LangString { value, lang } => {
                escape_into(f, value)?;
                write!(f, "@{lang}")
            }
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v:E}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Time(t) => write!(f, "{}", t.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
            Value::Raw(b) => write!(f, "{}", String::from_utf8_lossy(b)),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Iri(a), Iri(b)) | (Bnode(a), Bnode(b)) | (String(a), String(b)) => a == b,
            (
                TypedString { value: a, datatype: da },
                TypedString { value: b, datatype: db },
            ) => a == b && da == db,
            (LangString { value: a, lang: la }, LangString { value: b, lang: lb }) => {
                a == b && la == lb
            }
            (Int(a), Int(b)) => a == b,
            // bitwise so Eq/Hash stay consistent
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Bool(a), Bool(b)) => a == b,
            (Time(a), Time(b)) => a == b,
            (Raw(a), Raw(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for Value {}

impl Hash for Value {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Value::Iri(s) | Value::Bnode(s) | Value::String(s) => s.hash(state),
            Value::TypedString { value, datatype } => {
                value.hash(state);
                datatype.hash(state);
            }
            Value::LangString { value, lang } => {
                value.hash(state);
                lang.hash(state);
            }
            Value::Int(v) => v.hash(state),
            Value::Float(v) => v.to_bits().hash(state),
            Value::Bool(v) => v.hash(state),
            Value::Time(t) => t.hash(state),
            Value::Raw(b) => b.hash(state),
        }
    }
}

impl PartialOrd for Value {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Value {
    fn cmp(&self, other: &Self) -> Ordering {
        use Value::*;
        // Fast paths only where the raw text orders the same as the
        // canonical rendering; everything else goes through it.
        match (self, other) {
            (Iri(a), Iri(b)) | (Bnode(a), Bnode(b)) => a.cmp(b),
            _ => self.canonical().cmp(&other.canonical()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_forms_are_disjoint() {
        let vals = [
            Value::iri("3"),
            Value::string("3"),
            Value::Int(3),
            Value::Float(3.0),
            Value::bnode("3"),
        ];
        for (i, a) in vals.iter().enumerate() {
            for (j, b) in vals.iter().enumerate() {
                if i != j {
                    assert_ne!(a.canonical(), b.canonical(), "{a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn ordering_follows_canonical_string() {
        let mut vals = vec![
            Value::iri("charlie"),
            Value::iri("alice"),
            Value::string("bob"),
            Value::iri("bob"),
        ];
        vals.sort();
        assert_eq!(
            vals.iter().map(|v| v.canonical()).collect::<Vec<_>>(),
            vec!["\"bob\"", "<alice>", "<bob>", "<charlie>"],
        );
    }

    #[test]
    fn string_escaping() {
        assert_eq!(Value::string("a\"b\\c").canonical(), r#""a\"b\\c""#);
    }

    #[test]
    fn float_and_int_compare_by_form() {
        assert_eq!(Value::Float(3.0).canonical(), "3E0");
        assert_ne!(Value::Float(3.0), Value::Int(3));
    }
}
