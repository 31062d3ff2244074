//! Not iterator: set difference
//!
//! Iterates `from` and drops every result the `exclude` iterator contains.
//! `contains` answers for the exclusion only; the caller guarantees the
//! probed value is in the `from` domain.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use tessera_db_core::Ref;

/// Difference of ref streams: `from \ exclude`.
pub struct Not {
    from: Box<dyn RefIterator>,
    exclude: Box<dyn RefIterator>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl Not {
    pub fn new(exclude: Box<dyn RefIterator>, from: Box<dyn RefIterator>) -> Self {
        Self {
            from,
            exclude,
            result: None,
            err: None,
        }
    }
}

impl IteratorBase for Not {
    fn name(&self) -> &'static str {
        "Not"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.from.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.from.reset();
        self.exclude.reset();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let from = self.from.stats();
        let exclude = self.exclude.stats();
        Stats {
            size: from.size,
            exact: false,
            next_cost: from.next_cost + exclude.contains_cost,
            contains_cost: exclude.contains_cost,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.from.as_ref(), self.exclude.as_ref()]
    }

    fn close(&mut self) {
        self.from.close();
        self.exclude.close();
    }
}

impl RefIterator for Not {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if let Err(e) = ctx.check() {
            self.err = Some(e);
            return false;
        }
        while self.from.next(ctx) {
            let Some(curr) = self.from.result() else {
                break;
            };
            if !self.exclude.contains(ctx, &curr) {
                if let Some(e) = self.exclude.err() {
                    self.err = Some(e.clone());
                    return false;
                }
                self.result = Some(curr);
                return true;
            }
        }
        if let Some(e) = self.from.err() {
            self.err = Some(e.clone());
        }
        false
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.from.next_path(ctx)
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.exclude.contains(ctx, v) {
            return false;
        }
        if let Some(e) = self.exclude.err() {
            self.err = Some(e.clone());
            return false;
        }
        self.result = Some(v.clone());
        true
    }
}
