//! Value filter predicates
//!
//! Filters applied to value streams by the `Filter` shape: binary
//! comparisons against a fixed value, regular expressions, and SQL-style
//! wildcard patterns (which compile down to regular expressions).

use crate::error::QueryError;
use regex::Regex;
use std::cmp::Ordering;
use std::fmt;
use tessera_db_core::Value;

/// Binary comparison operator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CmpOperator {
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
}

impl CmpOperator {
    fn holds(&self, ord: Ordering) -> bool {
        match self {
            CmpOperator::Lt => ord == Ordering::Less,
            CmpOperator::Lte => ord != Ordering::Greater,
            CmpOperator::Gt => ord == Ordering::Greater,
            CmpOperator::Gte => ord != Ordering::Less,
            CmpOperator::Eq => ord == Ordering::Equal,
            CmpOperator::Neq => ord != Ordering::Equal,
        }
    }
}

impl fmt::Display for CmpOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            CmpOperator::Lt => "<",
            CmpOperator::Lte => "<=",
            CmpOperator::Gt => ">",
            CmpOperator::Gte => ">=",
            CmpOperator::Eq => "==",
            CmpOperator::Neq => "!=",
        })
    }
}

/// A predicate over values.
#[derive(Clone, Debug)]
pub enum ValueFilter {
    /// Binary comparison against a fixed value.
    Comparison { op: CmpOperator, value: Value },
    /// Regular expression on string-ish values; `refs` also matches the
    /// text of IRIs and blank nodes.
    ///
    /// Regexp patterns can rarely be optimized; prefer `Wildcard` when the
    /// pattern allows it.
    Regexp { re: Regex, refs: bool },
    /// String pattern with `%` (zero or more characters) and `?` (exactly
    /// one character).
    Wildcard { pattern: String },
}

impl PartialEq for ValueFilter {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (
                ValueFilter::Comparison { op: a, value: va },
                ValueFilter::Comparison { op: b, value: vb },
            ) => a == b && va == vb,
            (
                ValueFilter::Regexp { re: a, refs: ra },
                ValueFilter::Regexp { re: b, refs: rb },
            ) => a.as_str() == b.as_str() && ra == rb,
            (ValueFilter::Wildcard { pattern: a }, ValueFilter::Wildcard { pattern: b }) => a == b,
            _ => false,
        }
    }
}

/// A filter prepared for execution.
pub enum CompiledFilter {
    /// Nothing can pass (empty wildcard pattern).
    MatchNone,
    /// Everything passes; the filter can be dropped.
    MatchAll,
    /// Apply the predicate.
    Filter(ValueFilter),
}

impl ValueFilter {
    /// Prepare the filter for execution, compiling wildcards to regexps.
    pub fn compile(&self) -> Result<CompiledFilter, QueryError> {
        match self {
            ValueFilter::Wildcard { pattern } => {
                if pattern.is_empty() {
                    return Ok(CompiledFilter::MatchNone);
                }
                if pattern.trim_matches('%').is_empty() {
                    return Ok(CompiledFilter::MatchAll);
                }
                let re = Regex::new(&wildcard_regexp(pattern))
                    .map_err(|e| QueryError::InvalidPattern(e.to_string()))?;
                Ok(CompiledFilter::Filter(ValueFilter::Regexp { re, refs: true }))
            }
            f => Ok(CompiledFilter::Filter(f.clone())),
        }
    }

    /// Evaluate the predicate against a value.
    pub fn filter_value(&self, v: &Value) -> Result<bool, QueryError> {
        match self {
            ValueFilter::Comparison { op, value } => Ok(compare(v, *op, value)),
            ValueFilter::Regexp { re, refs } => Ok(regex_match(re, *refs, v)),
            ValueFilter::Wildcard { .. } => match self.compile()? {
                CompiledFilter::MatchNone => Ok(false),
                CompiledFilter::MatchAll => Ok(true),
                CompiledFilter::Filter(f) => f.filter_value(v),
            },
        }
    }
}

/// Comparison semantics: same-type comparison for the ordered atoms,
/// canonical string form for everything else and heterogeneous pairs.
fn compare(qval: &Value, op: CmpOperator, val: &Value) -> bool {
    use Value::*;
    match (qval, val) {
        (Int(a), Int(b)) => op.holds(a.cmp(b)),
        (Float(a), Float(b)) => match a.partial_cmp(b) {
            Some(ord) => op.holds(ord),
            None => false,
        },
        (String(a), String(b)) | (Bnode(a), Bnode(b)) | (Iri(a), Iri(b)) => op.holds(a.cmp(b)),
        (Time(a), Time(b)) => op.holds(a.cmp(b)),
        // mixed or unordered types compare by canonical form
        (a, b)
            if !matches!(
                b,
                Int(_) | Float(_) | String(_) | Bnode(_) | Iri(_) | Time(_)
            ) =>
        {
            op.holds(a.canonical().cmp(&b.canonical()))
        }
        _ => false,
    }
}

fn regex_match(re: &Regex, refs: bool, v: &Value) -> bool {
    match v {
        Value::String(s) => re.is_match(s),
        Value::TypedString { value, .. } => re.is_match(value),
        Value::Bnode(s) | Value::Iri(s) if refs => re.is_match(s),
        _ => false,
    }
}

/// The regexp pattern equivalent to a wildcard pattern.
pub fn wildcard_regexp(pattern: &str) -> String {
    const ANY: char = '%';
    // escape all meta-characters, then re-introduce the wildcards
    let mut pattern = regex::escape(pattern);
    // anchor unless the pattern is open-ended on that side
    if let Some(stripped) = pattern.strip_prefix(ANY) {
        pattern = stripped.to_string();
    } else {
        pattern.insert(0, '^');
    }
    if let Some(stripped) = pattern.strip_suffix(ANY) {
        pattern = stripped.to_string();
    } else {
        pattern.push('$');
    }
    pattern.replace(ANY, ".*").replace("\\?", ".")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(f: &ValueFilter, v: Value) -> bool {
        f.filter_value(&v).unwrap()
    }

    #[test]
    fn comparison_same_type() {
        let f = ValueFilter::Comparison {
            op: CmpOperator::Gt,
            value: Value::iri("c"),
        };
        assert!(matches(&f, Value::iri("charlie")));
        assert!(!matches(&f, Value::iri("alice")));
        // different type never passes a typed comparison
        assert!(!matches(&f, Value::string("zzz")));
    }

    #[test]
    fn comparison_heterogeneous_falls_back_to_canonical() {
        let f = ValueFilter::Comparison {
            op: CmpOperator::Eq,
            value: Value::Bool(true),
        };
        assert!(matches(&f, Value::Bool(true)));
        assert!(!matches(&f, Value::Bool(false)));
    }

    #[test]
    fn wildcard_prefix() {
        assert_eq!(wildcard_regexp("bo%"), "^bo");
        let f = ValueFilter::Wildcard {
            pattern: "bo%".to_string(),
        };
        assert!(matches(&f, Value::iri("bob")));
        assert!(!matches(&f, Value::iri("alice")));
    }

    #[test]
    fn wildcard_infix_and_single_char() {
        assert_eq!(wildcard_regexp("%ed%"), "ed");
        assert_eq!(wildcard_regexp("???"), "^...$");
        let f = ValueFilter::Wildcard {
            pattern: "???".to_string(),
        };
        assert!(matches(&f, Value::iri("bob")));
        assert!(!matches(&f, Value::iri("alice")));
    }

    #[test]
    fn wildcard_degenerate_patterns() {
        assert!(matches!(
            ValueFilter::Wildcard {
                pattern: "".to_string()
            }
            .compile()
            .unwrap(),
            CompiledFilter::MatchNone
        ));
        assert!(matches!(
            ValueFilter::Wildcard {
                pattern: "%%".to_string()
            }
            .compile()
            .unwrap(),
            CompiledFilter::MatchAll
        ));
    }

    #[test]
    fn regex_refs_controls_iri_matching() {
        let re = Regex::new("ar?li.*e").unwrap();
        let plain = ValueFilter::Regexp {
            re: re.clone(),
            refs: false,
        };
        let with_refs = ValueFilter::Regexp { re, refs: true };
        assert!(!matches(&plain, Value::iri("alice")));
        assert!(matches(&with_refs, Value::iri("alice")));
        assert!(matches(&plain, Value::string("alice")));
    }
}
