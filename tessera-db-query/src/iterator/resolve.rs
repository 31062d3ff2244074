//! Stream flavor adapters: refs to values and values to refs
//!
//! `ToValues` resolves each ref through the store's `name_of`; pre-fetched
//! refs short-circuit. `ToRefs` resolves each value through `value_of`;
//! values the store does not intern (counts, computed literals) become
//! pre-fetched refs so they survive the round-trip.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap, VIterator};
use crate::store::StoreHandle;
use tessera_db_core::{Error, Ref, Value};

/// Ref stream exposed as a value stream.
pub struct ToValues {
    store: StoreHandle,
    refs: Box<dyn RefIterator>,
    result: Option<Value>,
    err: Option<QueryError>,
}

impl ToValues {
    pub fn new(store: StoreHandle, refs: Box<dyn RefIterator>) -> Self {
        Self {
            store,
            refs,
            result: None,
            err: None,
        }
    }

    fn resolve(&mut self) -> bool {
        let Some(r) = self.refs.result() else {
            return false;
        };
        if let Some(v) = r.value() {
            self.result = Some(v.clone());
            return true;
        }
        if let Ref::Quad(_) = r {
            self.err = Some(QueryError::Core(Error::TypeMismatch {
                expected: "node",
                got: r.kind(),
            }));
            return false;
        }
        match self.store.name_of(&r) {
            Some(v) => {
                self.result = Some(v);
                true
            }
            None => {
                self.err = Some(QueryError::Core(Error::not_found(format!(
                    "no value for ref {r:?}"
                ))));
                false
            }
        }
    }
}

impl IteratorBase for ToValues {
    fn name(&self) -> &'static str {
        "ToValues"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.refs.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref().or_else(|| self.refs.err())
    }

    fn reset(&mut self) {
        self.refs.reset();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let mut st = self.refs.stats();
        st.exact = false;
        st
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.refs.as_ref()]
    }

    fn close(&mut self) {
        self.refs.close();
    }
}

impl VIterator for ToValues {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.refs.next(ctx) {
            return false;
        }
        self.resolve()
    }

    fn result(&self) -> Option<Value> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.refs.next_path(ctx)
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Value) -> bool {
        if self.err.is_some() {
            return false;
        }
        let r = self
            .store
            .value_of(v)
            .unwrap_or_else(|| Ref::pre_fetched(v.clone()));
        if self.refs.contains(ctx, &r) {
            self.result = Some(v.clone());
            return true;
        }
        false
    }
}

/// Value stream exposed as a ref stream.
pub struct ToRefs {
    store: StoreHandle,
    values: Box<dyn VIterator>,
    result: Option<Ref>,
    err: Option<QueryError>,
}

impl ToRefs {
    pub fn new(store: StoreHandle, values: Box<dyn VIterator>) -> Self {
        Self {
            store,
            values,
            result: None,
            err: None,
        }
    }

    fn resolve(&mut self) -> bool {
        let Some(v) = self.values.result() else {
            return false;
        };
        let r = self
            .store
            .value_of(&v)
            .unwrap_or_else(|| Ref::pre_fetched(v));
        self.result = Some(r);
        true
    }
}

impl IteratorBase for ToRefs {
    fn name(&self) -> &'static str {
        "ToRefs"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        self.values.tag_results(dst);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref().or_else(|| self.values.err())
    }

    fn reset(&mut self) {
        self.values.reset();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let mut st = self.values.stats();
        st.exact = false;
        st
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.values.as_ref()]
    }

    fn close(&mut self) {
        self.values.close();
    }
}

impl RefIterator for ToRefs {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.values.next(ctx) {
            return false;
        }
        self.resolve()
    }

    fn result(&self) -> Option<Ref> {
        self.result.clone()
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.values.next_path(ctx)
    }

    fn contains(&mut self, ctx: &ExecutionContext, r: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        let v = match r.value() {
            Some(v) => Some(v.clone()),
            None => self.store.name_of(r),
        };
        let Some(v) = v else {
            return false;
        };
        if self.values.contains(ctx, &v) {
            self.result = Some(r.clone());
            return true;
        }
        false
    }
}
