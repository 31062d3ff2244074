//! Or iterator: concatenation of sub-iterators
//!
//! Yields every result of each sub-iterator in order, left to right. Does
//! not deduplicate; wrap in Unique for set semantics.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use tessera_db_core::Ref;

/// Concatenating union of ref streams.
pub struct Or {
    sub: Vec<Box<dyn RefIterator>>,
    /// Index of the sub-iterator that produced the current result.
    active: Option<usize>,
    current: usize,
    err: Option<QueryError>,
}

impl Or {
    pub fn new(sub: Vec<Box<dyn RefIterator>>) -> Self {
        Self {
            sub,
            active: None,
            current: 0,
            err: None,
        }
    }
}

impl IteratorBase for Or {
    fn name(&self) -> &'static str {
        "Or"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some(i) = self.active {
            self.sub[i].tag_results(dst);
        }
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        for sub in &mut self.sub {
            sub.reset();
        }
        self.active = None;
        self.current = 0;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let mut size = 0i64;
        let mut exact = true;
        let mut next_cost = 0i64;
        let mut contains_cost = 0i64;
        for sub in &self.sub {
            let st = sub.stats();
            size += st.size;
            exact = exact && st.exact;
            next_cost = next_cost.max(st.next_cost);
            contains_cost += st.contains_cost;
        }
        Stats {
            size,
            exact,
            next_cost,
            contains_cost,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        self.sub.iter().map(|s| s.as_ref() as &dyn IteratorBase).collect()
    }

    fn close(&mut self) {
        for sub in &mut self.sub {
            sub.close();
        }
    }
}

impl RefIterator for Or {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if let Err(e) = ctx.check() {
            self.err = Some(e);
            return false;
        }
        while self.current < self.sub.len() {
            if self.sub[self.current].next(ctx) {
                self.active = Some(self.current);
                return true;
            }
            if let Some(e) = self.sub[self.current].err() {
                self.err = Some(e.clone());
                return false;
            }
            self.current += 1;
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.active.and_then(|i| self.sub[i].result())
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        match self.active {
            Some(i) => {
                if self.sub[i].next_path(ctx) {
                    return true;
                }
                if let Some(e) = self.sub[i].err() {
                    self.err = Some(e.clone());
                }
                false
            }
            None => false,
        }
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        for i in 0..self.sub.len() {
            if self.sub[i].contains(ctx, v) {
                self.active = Some(i);
                return true;
            }
            if let Some(e) = self.sub[i].err() {
                self.err = Some(e.clone());
                return false;
            }
        }
        false
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
    fn concatenates_left_to_right() {
        let ctx = ExecutionContext::new();
        let mut it = Or::new(vec![fixed(&[1, 2]), fixed(&[2, 3])]);
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        // no deduplication
        assert_eq!(
            got,
            vec![Ref::Node(1), Ref::Node(2), Ref::Node(2), Ref::Node(3)]
        );
    }

    #[test]
    fn contains_checks_in_order() {
        let ctx = ExecutionContext::new();
        let mut it = Or::new(vec![fixed(&[1]), fixed(&[2])]);
        assert!(it.contains(&ctx, &Ref::Node(2)));
        assert_eq!(it.result(), Some(Ref::Node(2)));
        assert!(!it.contains(&ctx, &Ref::Node(7)));
    }
}
