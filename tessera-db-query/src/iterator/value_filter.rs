//! Value filter iterator
//!
//! Applies a predicate to each value of a sub-iterator. Predicate errors are
//! propagated and made sticky. `contains` returns false unless the predicate
//! holds and the sub-iterator contains the value.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, Stats, TagMap, VIterator};
use crate::shape::filters::ValueFilter;
use tessera_db_core::Value;

/// Predicate-filtering wrapper over a value stream.
pub struct ValueFilterIterator {
    sub: Box<dyn VIterator>,
    filter: ValueFilter,
    result: Option<Value>,
    err: Option<QueryError>,
}

impl ValueFilterIterator {
    pub fn new(sub: Box<dyn VIterator>, filter: ValueFilter) -> Self {
        Self {
            sub,
            filter,
            result: None,
            err: None,
        }
    }

    fn do_filter(&mut self, val: &Value) -> bool {
        match self.filter.filter_value(val) {
            Ok(ok) => ok,
            Err(e) => {
                self.err = Some(e);
                false
            }
        }
    }
}

impl IteratorBase for ValueFilterIterator {
    fn name(&self) -> &'static str {
        "ValueFilter"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.sub.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let mut st = self.sub.stats();
        st.size /= 2;
        st.exact = false;
        st
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) {
        self.sub.close();
    }
}

impl VIterator for ValueFilterIterator {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        while self.sub.next(ctx) {
            let Some(val) = self.sub.result() else {
                break;
            };
            if self.do_filter(&val) {
                self.result = Some(val);
                return true;
            }
            if self.err.is_some() {
                return false;
            }
        }
        if let Some(e) = self.sub.err() {
            self.err = Some(e.clone());
        }
        false
    }

    fn result(&self) -> Option<Value> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        loop {
            if !self.sub.next_path(ctx) {
                if let Some(e) = self.sub.err() {
                    self.err = Some(e.clone());
                }
                return false;
            }
            let Some(val) = self.sub.result() else {
                return false;
            };
            if self.do_filter(&val) {
                self.result = Some(val);
                return true;
            }
            if self.err.is_some() {
                return false;
            }
        }
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Value) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.do_filter(v) {
            return false;
        }
        let ok = self.sub.contains(ctx, v);
        if !ok {
            if let Some(e) = self.sub.err() {
                self.err = Some(e.clone());
            }
        }
        ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::ValuesIterator;
    use crate::shape::filters::{CmpOperator, ValueFilter};

    fn values(vs: &[i64]) -> Box<dyn VIterator> {
        Box::new(ValuesIterator::new(vs.iter().map(|&v| Value::Int(v)).collect()))
    }

    #[test]
    fn filters_by_predicate() {
        let ctx = ExecutionContext::new();
        let mut it = ValueFilterIterator::new(
            values(&[1, 5, 3, 9]),
            ValueFilter::Comparison {
                op: CmpOperator::Gt,
                value: Value::Int(3),
            },
        );
        let mut got = Vec::new();
        while it.next(&ctx) {
            got.push(it.result().unwrap());
        }
        assert_eq!(got, vec![Value::Int(5), Value::Int(9)]);
    }

    #[test]
    fn contains_requires_predicate_and_membership() {
        let ctx = ExecutionContext::new();
        let mut it = ValueFilterIterator::new(
            values(&[1, 5]),
            ValueFilter::Comparison {
                op: CmpOperator::Gt,
                value: Value::Int(3),
            },
        );
        assert!(it.contains(&ctx, &Value::Int(5)));
        assert!(!it.contains(&ctx, &Value::Int(1))); // fails predicate
        assert!(!it.contains(&ctx, &Value::Int(7))); // passes predicate, not present
    }
}
