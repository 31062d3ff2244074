//! Quad - the fundamental data unit
//!
//! A quad is an ordered `(subject, predicate, object, label)` tuple of
//! values; the label names the graph the statement belongs to and may be
//! absent. `InternalQuad` is the same shape over store refs, used when the
//! store exposes indexed quads to the optimizer.

use crate::refs::Ref;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the four quad components, or `Any` as a wildcard.
///
/// `Any` is only meaningful for store lookups; shape nodes that carry a
/// direction always hold a concrete one.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub enum Direction {
    Subject,
    Predicate,
    Object,
    Label,
    #[default]
    Any,
}

impl Direction {
    /// The four concrete directions, in tuple order.
    pub const ALL: [Direction; 4] = [
        Direction::Subject,
        Direction::Predicate,
        Direction::Object,
        Direction::Label,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Subject => "subject",
            Direction::Predicate => "predicate",
            Direction::Object => "object",
            Direction::Label => "label",
            Direction::Any => "any",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single statement: subject, predicate, object and an optional graph
/// label.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Quad {
    pub subject: Value,
    pub predicate: Value,
    pub object: Value,
    pub label: Option<Value>,
}

impl Quad {
    pub fn new(subject: Value, predicate: Value, object: Value, label: Option<Value>) -> Self {
        Self {
            subject,
            predicate,
            object,
            label,
        }
    }

    /// Quad of IRIs, the common test fixture form.
    pub fn make(subject: &str, predicate: &str, object: &str, label: &str) -> Self {
        Self {
            subject: Value::iri(subject),
            predicate: Value::iri(predicate),
            object: Value::iri(object),
            label: if label.is_empty() {
                None
            } else {
                Some(Value::iri(label))
            },
        }
    }

    /// The value at a direction. `Label` may be absent; `Any` is never set.
    pub fn get(&self, d: Direction) -> Option<&Value> {
        match d {
            Direction::Subject => Some(&self.subject),
            Direction::Predicate => Some(&self.predicate),
            Direction::Object => Some(&self.object),
            Direction::Label => self.label.as_ref(),
            Direction::Any => None,
        }
    }
}

impl fmt::Display for Quad {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)?;
        if let Some(l) = &self.label {
            write!(f, " {l}")?;
        }
        Ok(())
    }
}

/// A quad over store refs, as surfaced by a store's quad index.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InternalQuad {
    pub subject: Option<Ref>,
    pub predicate: Option<Ref>,
    pub object: Option<Ref>,
    pub label: Option<Ref>,
}

impl InternalQuad {
    /// The ref at a direction.
    pub fn get(&self, d: Direction) -> Option<&Ref> {
        match d {
            Direction::Subject => self.subject.as_ref(),
            Direction::Predicate => self.predicate.as_ref(),
            Direction::Object => self.object.as_ref(),
            Direction::Label => self.label.as_ref(),
            Direction::Any => None,
        }
    }

    /// Assign the ref at a direction. `Any` is not assignable.
    pub fn set(&mut self, d: Direction, v: Ref) {
        match d {
            Direction::Subject => self.subject = Some(v),
            Direction::Predicate => self.predicate = Some(v),
            Direction::Object => self.object = Some(v),
            Direction::Label => self.label = Some(v),
            Direction::Any => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_access() {
        let q = Quad::make("a", "follows", "b", "");
        assert_eq!(q.get(Direction::Subject), Some(&Value::iri("a")));
        assert_eq!(q.get(Direction::Label), None);
        assert_eq!(q.get(Direction::Any), None);

        let labeled = Quad::make("a", "status", "b", "g");
        assert_eq!(labeled.get(Direction::Label), Some(&Value::iri("g")));
    }

    #[test]
    fn internal_quad_get_set() {
        let mut q = InternalQuad::default();
        q.set(Direction::Object, Ref::Node(7));
        assert_eq!(q.get(Direction::Object), Some(&Ref::Node(7)));
        assert_eq!(q.get(Direction::Subject), None);
    }
}
