//! Ref - store-local node reference
//!
//! A `Ref` is the opaque token a store hands out for a node or a quad. The
//! enum itself is the stable key: it derives `Eq`, `Hash` and `Ord`, so
//! iterators use refs directly in seen-sets and tag maps without a separate
//! key accessor.
//!
//! `PreFetched` carries the value inline for stores that can avoid a
//! name-lookup round-trip, and for synthesized results (e.g. counts) that
//! have no store-side identity at all.

use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque store-local reference.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Ref {
    /// A node, identified by a store-local id
    Node(u64),
    /// A quad, identified by a store-local id
    Quad(u64),
    /// A node carrying its value inline
    PreFetched(Box<Value>),
}

impl Ref {
    /// Wrap a value as a pre-fetched reference.
    pub fn pre_fetched(v: Value) -> Self {
        Ref::PreFetched(Box::new(v))
    }

    /// The inline value of a pre-fetched reference.
    pub fn value(&self) -> Option<&Value> {
        match self {
            Ref::PreFetched(v) => Some(v),
            _ => None,
        }
    }

    /// Variant name, for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Ref::Node(_) => "node",
            Ref::Quad(_) => "quad",
            Ref::PreFetched(_) => "pre-fetched",
        }
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Ref::Node(id) => write!(f, "Node({id})"),
            Ref::Quad(id) => write!(f, "Quad({id})"),
            Ref::PreFetched(v) => write!(f, "PreFetched({v})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn refs_key_sets_directly() {
        let mut seen = HashSet::new();
        assert!(seen.insert(Ref::Node(1)));
        assert!(!seen.insert(Ref::Node(1)));
        assert!(seen.insert(Ref::Quad(1)));
        assert!(seen.insert(Ref::pre_fetched(Value::Int(1))));
        assert!(!seen.insert(Ref::pre_fetched(Value::Int(1))));
    }
}
