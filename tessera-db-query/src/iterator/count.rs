//! Count iterator: collapses a stream into its cardinality
//!
//! Yields exactly one `Int` value. If the sub-iterator advertises an exact
//! size it is used directly; otherwise the stream is drained, counting
//! `next` and `next_path` rows.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap, VIterator};
use tessera_db_core::Value;

/// One-row cardinality of a ref stream.
pub struct Count {
    it: Box<dyn RefIterator>,
    done: bool,
    result: Option<Value>,
    err: Option<QueryError>,
}

impl Count {
    pub fn new(it: Box<dyn RefIterator>) -> Self {
        Self {
            it,
            done: false,
            result: None,
            err: None,
        }
    }
}

impl IteratorBase for Count {
    fn name(&self) -> &'static str {
        "Count"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref().or_else(|| self.it.err())
    }

    fn reset(&mut self) {
        self.done = false;
        self.result = None;
        self.err = None;
        self.it.reset();
    }

    fn stats(&self) -> Stats {
        let sub = self.it.stats();
        let next_cost = if sub.exact {
            1
        } else {
            sub.next_cost * sub.size.max(1)
        };
        Stats {
            size: 1,
            exact: true,
            next_cost,
            contains_cost: next_cost,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.it.as_ref()]
    }

    fn close(&mut self) {
        self.it.close();
    }
}

impl VIterator for Count {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.done {
            return false;
        }
        let st = self.it.stats();
        let size = if st.exact {
            st.size
        } else {
            let mut size = 0i64;
            while self.it.next(ctx) {
                size += 1;
                while self.it.next_path(ctx) {
                    size += 1;
                }
            }
            if let Some(e) = self.it.err() {
                self.err = Some(e.clone());
                return false;
            }
            size
        };
        self.result = Some(Value::Int(size));
        self.done = true;
        true
    }

    fn result(&self) -> Option<Value> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    // Unusual on purpose: the count "contains" a value only when it equals
    // the cardinality itself. Kept for optimizer assumptions.
    fn contains(&mut self, ctx: &ExecutionContext, v: &Value) -> bool {
        if !self.done {
            self.next(ctx);
        }
        self.result.as_ref() == Some(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;
    use crate::iterator::null::Null;
    use crate::iterator::unique::Unique;
    use tessera_db_core::Ref;

    #[test]
    fn exact_size_short_circuits() {
        let ctx = ExecutionContext::new();
        let sub = Fixed::new(vec![Ref::Node(1), Ref::Node(2)]);
        let mut it = Count::new(Box::new(sub));
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(Value::Int(2)));
        assert!(!it.next(&ctx));
    }

    #[test]
    fn inexact_size_drains() {
        let ctx = ExecutionContext::new();
        // Unique reports an inexact size, forcing the drain path.
        let sub = Unique::new(Box::new(Fixed::new(vec![
            Ref::Node(1),
            Ref::Node(1),
            Ref::Node(2),
        ])));
        let mut it = Count::new(Box::new(sub));
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(Value::Int(2)));
    }

    #[test]
    fn count_of_empty_is_zero() {
        let ctx = ExecutionContext::new();
        let mut it = Count::new(Box::new(Null::new()));
        assert!(it.next(&ctx));
        assert_eq!(it.result(), Some(Value::Int(0)));
    }

    #[test]
    fn contains_matches_only_the_size() {
        let ctx = ExecutionContext::new();
        let sub = Fixed::new(vec![Ref::Node(1), Ref::Node(2)]);
        let mut it = Count::new(Box::new(sub));
        assert!(it.contains(&ctx, &Value::Int(2)));
        assert!(!it.contains(&ctx, &Value::Int(1)));
    }
}
