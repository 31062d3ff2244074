//! LinksTo iterator: lifts a node stream into the quad stream
//!
//! For each node produced by the primary sub-iterator, yields the refs of
//! all quads whose `dir` direction is that node. The inverse projection is
//! `HasA`.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::null::Null;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use crate::store::StoreHandle;
use tessera_db_core::{Direction, Ref};

/// Quads with a given direction drawn from a node stream.
pub struct LinksTo {
    store: StoreHandle,
    primary: Box<dyn RefIterator>,
    dir: Direction,
    next_it: Box<dyn RefIterator>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl LinksTo {
    pub fn new(store: StoreHandle, primary: Box<dyn RefIterator>, dir: Direction) -> Self {
        Self {
            store,
            primary,
            dir,
            next_it: Box::new(Null::new()),
            result: None,
            err: None,
        }
    }
}

impl IteratorBase for LinksTo {
    fn name(&self) -> &'static str {
        "LinksTo"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.primary.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.primary.reset();
        self.next_it = Box::new(Null::new());
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let st = self.primary.stats();
        Stats {
            size: st.size * 20,
            exact: false,
            next_cost: st.next_cost + 1,
            contains_cost: st.contains_cost + 1,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.primary.as_ref()]
    }

    fn close(&mut self) {
        self.primary.close();
        self.next_it.close();
    }
}

impl RefIterator for LinksTo {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if let Err(e) = ctx.check() {
            self.err = Some(e);
            return false;
        }
        loop {
            if self.next_it.next(ctx) {
                self.result = self.next_it.result();
                return true;
            }
            if let Some(e) = self.next_it.err() {
                self.err = Some(e.clone());
                return false;
            }
            if !self.primary.next(ctx) {
                if let Some(e) = self.primary.err() {
                    self.err = Some(e.clone());
                }
                return false;
            }
            let Some(node) = self.primary.result() else {
                return false;
            };
            self.next_it.close();
            self.next_it = self.store.quad_iterator(self.dir, &node).build_iterator();
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.primary.next_path(ctx)
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        let Some(node) = self.store.quad_direction(v, self.dir) else {
            return false;
        };
        if self.primary.contains(ctx, &node) {
            self.result = Some(v.clone());
            return true;
        }
        if let Some(e) = self.primary.err() {
            self.err = Some(e.clone());
        }
        false
    }
}
