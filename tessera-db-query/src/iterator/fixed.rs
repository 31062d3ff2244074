//! Fixed iterators: explicit arrays of refs or values
//!
//! `contains` is a linear scan. Fixed sets are by definition small, so this
//! is acceptable; the optimizer places them first in and-joins precisely
//! because probing them is cheap.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap, VIterator};
use tessera_db_core::{Ref, Value};

/// Array scan over a fixed set of refs.
#[derive(Debug)]
pub struct Fixed {
    values: Vec<Ref>,
    index: usize,
    result: Option<Ref>,
}

impl Fixed {
    pub fn new(values: Vec<Ref>) -> Self {
        Self {
            values,
            index: 0,
            result: None,
        }
    }

    /// Values held by the iterator.
    pub fn values(&self) -> &[Ref] {
        &self.values
    }
}

impl IteratorBase for Fixed {
    fn name(&self) -> &'static str {
        "Fixed"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        None
    }

    fn reset(&mut self) {
        self.index = 0;
        self.result = None;
    }

    fn stats(&self) -> Stats {
        let size = self.values.len() as i64;
        Stats {
            size,
            exact: true,
            next_cost: 1,
            contains_cost: size,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        Vec::new()
    }

    fn close(&mut self) {}
}

impl RefIterator for Fixed {
    fn next(&mut self, _ctx: &ExecutionContext) -> bool {
        if self.index == self.values.len() {
            return false;
        }
        self.result = Some(self.values[self.index].clone());
        self.index += 1;
        true
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &ExecutionContext, v: &Ref) -> bool {
        for x in &self.values {
            if x == v {
                self.result = Some(x.clone());
                return true;
            }
        }
        false
    }
}

/// Array scan over a fixed set of values.
#[derive(Debug)]
pub struct ValuesIterator {
    values: Vec<Value>,
    index: usize,
    result: Option<Value>,
}

impl ValuesIterator {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            values,
            index: 0,
            result: None,
        }
    }
}

impl IteratorBase for ValuesIterator {
    fn name(&self) -> &'static str {
        "Values"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        None
    }

    fn reset(&mut self) {
        self.index = 0;
        self.result = None;
    }

    fn stats(&self) -> Stats {
        let size = self.values.len() as i64;
        Stats {
            size,
            exact: true,
            next_cost: 1,
            contains_cost: size,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        Vec::new()
    }

    fn close(&mut self) {}
}

impl VIterator for ValuesIterator {
    fn next(&mut self, _ctx: &ExecutionContext) -> bool {
        if self.index == self.values.len() {
            return false;
        }
        self.result = Some(self.values[self.index].clone());
        self.index += 1;
        true
    }

    fn result(&self) -> Option<Value> {
        self.result.clone()
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &ExecutionContext, v: &Value) -> bool {
        for x in &self.values {
            if x == v {
                self.result = Some(x.clone());
                return true;
            }
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drains_in_order() {
        let ctx = ExecutionContext::new();
        let mut it = Fixed::new(vec![Ref::Node(1), Ref::Node(2), Ref::Node(3)]);
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        assert_eq!(got, vec![Ref::Node(1), Ref::Node(2), Ref::Node(3)]);
        assert!(!it.next(&ctx));
        assert!(it.err().is_none());
    }

    #[test]
    fn contains_positions_result() {
        let ctx = ExecutionContext::new();
        let mut it = Fixed::new(vec![Ref::Node(1), Ref::Node(2)]);
        assert!(it.contains(&ctx, &Ref::Node(2)));
        assert_eq!(it.result(), Some(Ref::Node(2)));
        assert!(!it.contains(&ctx, &Ref::Node(9)));
    }

    #[test]
    fn reset_restarts() {
        let ctx = ExecutionContext::new();
        let mut it = Fixed::new(vec![Ref::Node(1)]);
        assert!(it.next(&ctx));
        assert!(!it.next(&ctx));
        it.reset();
        assert!(it.next(&ctx));
    }
}
