//! Null and error iterators
//!
//! `Null`/`NullV` are the empty set. `ErrorIterator`/`ErrorVIterator` yield
//! nothing and surface a fixed error; they stand in for trees that cannot be
//! built (unbound shapes, reused one-shot iterators, bad patterns).

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap, VIterator};
use tessera_db_core::{Ref, Value};

/// The empty ref-iterator.
#[derive(Debug, Default)]
pub struct Null;

impl Null {
    pub fn new() -> Self {
        Null
    }
}

impl IteratorBase for Null {
    fn name(&self) -> &'static str {
        "Null"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        None
    }

    fn reset(&mut self) {}

    fn stats(&self) -> Stats {
        Stats {
            size: 0,
            exact: true,
            next_cost: 0,
            contains_cost: 0,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        Vec::new()
    }

    fn close(&mut self) {}
}

impl RefIterator for Null {
    fn next(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn result(&self) -> Option<Ref> {
        None
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &ExecutionContext, _v: &Ref) -> bool {
        false
    }
}

/// The empty value-iterator.
#[derive(Debug, Default)]
pub struct NullV;

impl NullV {
    pub fn new() -> Self {
        NullV
    }
}

impl IteratorBase for NullV {
    fn name(&self) -> &'static str {
        "NullV"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        None
    }

    fn reset(&mut self) {}

    fn stats(&self) -> Stats {
        Stats {
            size: 0,
            exact: true,
            next_cost: 0,
            contains_cost: 0,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        Vec::new()
    }

    fn close(&mut self) {}
}

impl VIterator for NullV {
    fn next(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn result(&self) -> Option<Value> {
        None
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &ExecutionContext, _v: &Value) -> bool {
        false
    }
}

/// Ref-iterator that is permanently failed with a fixed error.
#[derive(Debug)]
pub struct ErrorIterator {
    err: QueryError,
}

impl ErrorIterator {
    pub fn new(err: QueryError) -> Self {
        Self { err }
    }
}

impl IteratorBase for ErrorIterator {
    fn name(&self) -> &'static str {
        "Error"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        Some(&self.err)
    }

    fn reset(&mut self) {}

    fn stats(&self) -> Stats {
        Stats {
            size: 0,
            exact: true,
            next_cost: 0,
            contains_cost: 0,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        Vec::new()
    }

    fn close(&mut self) {}
}

impl RefIterator for ErrorIterator {
    fn next(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn result(&self) -> Option<Ref> {
        None
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &ExecutionContext, _v: &Ref) -> bool {
        false
    }
}

/// Value-iterator that is permanently failed with a fixed error.
#[derive(Debug)]
pub struct ErrorVIterator {
    err: QueryError,
}

impl ErrorVIterator {
    pub fn new(err: QueryError) -> Self {
        Self { err }
    }
}

impl IteratorBase for ErrorVIterator {
    fn name(&self) -> &'static str {
        "ErrorV"
    }

    fn tag_results(&self, _dst: &mut TagMap) {}

    fn err(&self) -> Option<&QueryError> {
        Some(&self.err)
    }

    fn reset(&mut self) {}

    fn stats(&self) -> Stats {
        Stats {
            size: 0,
            exact: true,
            next_cost: 0,
            contains_cost: 0,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        Vec::new()
    }

    fn close(&mut self) {}
}

impl VIterator for ErrorVIterator {
    fn next(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn result(&self) -> Option<Value> {
        None
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        false
    }

    fn contains(&mut self, _ctx: &ExecutionContext, _v: &Value) -> bool {
        false
    }
}
