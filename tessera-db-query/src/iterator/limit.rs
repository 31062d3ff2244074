//! Limit iterator: caps the number of emitted rows
//!
//! A limit of zero or less means unlimited. `next_path` rows count toward
//! the cap the same way `next` rows do.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use tessera_db_core::Ref;

/// Emits at most `limit` rows from its sub-iterator.
pub struct Limit {
    it: Box<dyn RefIterator>,
    limit: i64,
    count: i64,
}

impl Limit {
    pub fn new(it: Box<dyn RefIterator>, limit: i64) -> Self {
        Self {
            it,
            limit,
            count: 0,
        }
    }
}

impl IteratorBase for Limit {
    fn name(&self) -> &'static str {
        "Limit"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.it.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.it.err()
    }

    fn reset(&mut self) {
        self.count = 0;
        self.it.reset();
    }

    fn stats(&self) -> Stats {
        let mut st = self.it.stats();
        if self.limit > 0 && st.size > self.limit {
            st.size = self.limit;
        }
        st
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.it.as_ref()]
    }

    fn close(&mut self) {
        self.it.close();
    }
}

impl RefIterator for Limit {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.limit > 0 && self.count >= self.limit {
            return false;
        }
        if self.it.next(ctx) {
            self.count += 1;
            return true;
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.it.result()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.limit > 0 && self.count >= self.limit {
            return false;
        }
        if self.it.next_path(ctx) {
            self.count += 1;
            return true;
        }
        false
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        self.it.contains(ctx, v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;

    fn fixed(ids: &[u64]) -> Box<dyn RefIterator> {
        Box::new(Fixed::new(ids.iter().map(|&i| Ref::Node(i)).collect()))
    }

    #[test]
    fn caps_results() {
        let ctx = ExecutionContext::new();
        let mut it = Limit::new(fixed(&[1, 2, 3, 4]), 2);
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        assert_eq!(got, vec![Ref::Node(1), Ref::Node(2)]);
    }

    #[test]
    fn zero_means_unlimited() {
        let ctx = ExecutionContext::new();
        let mut it = Limit::new(fixed(&[1, 2, 3]), 0);
        let mut n = 0;
        while it.next(&ctx) {
            n += 1;
        }
        assert_eq!(n, 3);
    }

    #[test]
    fn limit_larger_than_input() {
        let ctx = ExecutionContext::new();
        let mut it = Limit::new(fixed(&[1, 2]), 10);
        let mut n = 0;
        while it.next(&ctx) {
            n += 1;
        }
        assert_eq!(n, 2);
    }
}
