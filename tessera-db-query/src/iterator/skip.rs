//! Skip iterator: discards the first N results
//!
//! The skip counter is shared between `next` and `next_path`, so the first
//! N rows are discarded whichever way they are produced.
//!
//! `contains` is a passthrough: a membership probe answers for the
//! underlying set and does not consume or honor the skip window.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use tessera_db_core::Ref;

/// Skips a number of initial results from its sub-iterator.
pub struct Skip {
    it: Box<dyn RefIterator>,
    skip: i64,
    skipped: i64,
}

impl Skip {
    pub fn new(it: Box<dyn RefIterator>, skip: i64) -> Self {
        Self {
            it,
            skip,
            skipped: 0,
        }
    }
}

impl IteratorBase for Skip {
    fn name(&self) -> &'static str {
        "Skip"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.it.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.it.err()
    }

    fn reset(&mut self) {
        self.skipped = 0;
        self.it.reset();
    }

    fn stats(&self) -> Stats {
        let mut st = self.it.stats();
        st.size = (st.size - self.skip).max(0);
        st
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.it.as_ref()]
    }

    fn close(&mut self) {
        self.it.close();
    }
}

impl RefIterator for Skip {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        while self.skipped < self.skip {
            if !self.it.next(ctx) {
                return false;
            }
            self.skipped += 1;
        }
        self.it.next(ctx)
    }

    fn result(&self) -> Option<Ref> {
        self.it.result()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        while self.skipped < self.skip {
            if !self.it.next_path(ctx) {
                return false;
            }
            self.skipped += 1;
        }
        self.it.next_path(ctx)
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
    fn skips_initial_results() {
        let ctx = ExecutionContext::new();
        let mut it = Skip::new(fixed(&[1, 2, 3, 4]), 2);
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        assert_eq!(got, vec![Ref::Node(3), Ref::Node(4)]);
    }

    #[test]
    fn skip_past_end_yields_nothing() {
        let ctx = ExecutionContext::new();
        let mut it = Skip::new(fixed(&[1, 2]), 5);
        assert!(!it.next(&ctx));
        assert!(it.err().is_none());
    }

    #[test]
    fn contains_is_a_passthrough() {
        // Membership probes ignore the skip window.
        let ctx = ExecutionContext::new();
        let mut it = Skip::new(fixed(&[1, 2, 3]), 2);
        assert!(it.contains(&ctx, &Ref::Node(1)));
    }
}
