//! HasA iterator: projects a quad stream onto one direction
//!
//! For each quad produced by the sub-iterator, yields the node at the given
//! direction. Quads without that direction (unlabeled quads under a label
//! projection) are skipped. The inverse lifting is `LinksTo`.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::null::Null;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use crate::store::StoreHandle;
use tessera_db_core::{Direction, Ref};

/// One direction of a quad stream.
pub struct HasA {
    store: StoreHandle,
    quads: Box<dyn RefIterator>,
    dir: Direction,
    /// Quads matching the last `contains` probe.
    result_it: Box<dyn RefIterator>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl HasA {
    pub fn new(store: StoreHandle, quads: Box<dyn RefIterator>, dir: Direction) -> Self {
        Self {
            store,
            quads,
            dir,
            result_it: Box::new(Null::new()),
            result: None,
            err: None,
        }
    }

    /// Advance `result_it` until one of its quads is accepted by the quad
    /// stream, making the probed node the current result.
    fn next_contains(&mut self, ctx: &ExecutionContext) -> bool {
        while self.result_it.next(ctx) {
            let Some(link) = self.result_it.result() else {
                break;
            };
            if self.quads.contains(ctx, &link) {
                self.result = self.store.quad_direction(&link, self.dir);
                return true;
            }
        }
        if let Some(e) = self.result_it.err() {
            self.err = Some(e.clone());
        }
        false
    }
}

impl IteratorBase for HasA {
    fn name(&self) -> &'static str {
        "HasA"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.quads.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.quads.reset();
        self.result_it = Box::new(Null::new());
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let st = self.quads.stats();
        Stats {
            size: st.size,
            exact: false,
            next_cost: st.next_cost + 1,
            contains_cost: st.contains_cost + st.next_cost,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.quads.as_ref()]
    }

    fn close(&mut self) {
        self.quads.close();
        self.result_it.close();
    }
}

impl RefIterator for HasA {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if let Err(e) = ctx.check() {
            self.err = Some(e);
            return false;
        }
        self.result_it.close();
        self.result_it = Box::new(Null::new());
        while self.quads.next(ctx) {
            let Some(quad_ref) = self.quads.result() else {
                break;
            };
            if let Some(node) = self.store.quad_direction(&quad_ref, self.dir) {
                self.result = Some(node);
                return true;
            }
            // no such direction on this quad; keep scanning
        }
        if let Some(e) = self.quads.err() {
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
        if self.quads.next_path(ctx) {
            return true;
        }
        if let Some(e) = self.quads.err() {
            self.err = Some(e.clone());
            return false;
        }
        // another quad reaching the same probed node is another path
        self.next_contains(ctx)
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.result_it.close();
        self.result_it = self.store.quad_iterator(self.dir, v).build_iterator();
        self.next_contains(ctx)
    }
}
