//! Unique iterator: drops repeated results
//!
//! Remembers every ref it has emitted. `next_path` always returns false: a
//! unique row keeps only the first path that produced it.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use rustc_hash::FxHashSet;
use tessera_db_core::Ref;

const UNIQUENESS_FACTOR: i64 = 2;

/// Deduplicating wrapper over a ref stream.
pub struct Unique {
    sub: Box<dyn RefIterator>,
    seen: FxHashSet<Ref>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Unique {
    pub fn new(sub: Box<dyn RefIterator>) -> Self {
        Self {
            sub,
            seen: FxHashSet::default(),
            result: None,
            err: None,
        }
    }
}

impl IteratorBase for Unique {
    fn name(&self) -> &'static str {
        "Unique"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.seen.clear();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let st = self.sub.stats();
        Stats {
            size: st.size / UNIQUENESS_FACTOR,
            exact: false,
            next_cost: st.next_cost * UNIQUENESS_FACTOR,
            contains_cost: st.contains_cost,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) {
        self.seen.clear();
        self.sub.close();
    }
}

impl RefIterator for Unique {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        while self.sub.next(ctx) {
            let Some(curr) = self.sub.result() else {
                break;
            };
            if self.seen.insert(curr.clone()) {
                self.result = Some(curr);
                return true;
            }
        }
        if let Some(e) = self.sub.err() {
            self.err = Some(e.clone());
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    // A unique row has at most one path.
    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        self.sub.contains(ctx, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;

    #[test]
    fn drops_repeats() {
        let ctx = ExecutionContext::new();
        let sub = Fixed::new(vec![Ref::Node(1), Ref::Node(2), Ref::Node(1), Ref::Node(3)]);
        let mut it = Unique::new(Box::new(sub));
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        assert_eq!(got, vec![Ref::Node(1), Ref::Node(2), Ref::Node(3)]);
    }

    #[test]
    fn next_path_is_always_false() {
        let ctx = ExecutionContext::new();
        let mut it = Unique::new(Box::new(Fixed::new(vec![Ref::Node(1)])));
        assert!(it.next(&ctx));
        assert!(!it.next_path(&ctx));
    }
}
