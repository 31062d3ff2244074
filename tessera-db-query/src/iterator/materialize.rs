//! Materialize iterator: buffers a sub-query in memory
//!
//! On the first advance the sub-iterator is drained into a buffer of
//! `(ref, paths)` rows; replays and containment probes are then served from
//! memory. If the buffer outgrows `MATERIALIZE_LIMIT` (or the drain errors),
//! buffering aborts and the iterator falls back to delegating to the
//! sub-iterator directly.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use rustc_hash::FxHashMap;
use tessera_db_core::Ref;

/// Abort buffering past this many rows.
pub const MATERIALIZE_LIMIT: usize = 1_000_000;

struct Row {
    value: Ref,
    paths: Vec<TagMap>,
}

/// In-memory buffer over a ref stream.
pub struct Materialize {
    sub: Box<dyn RefIterator>,
    expected_size: i64,
    rows: Vec<Row>,
    index: FxHashMap<Ref, usize>,
    cur_row: usize,
    cur_path: usize,
    /// Whether the cursor points at a row (`next`/`contains` succeeded).
    positioned: bool,
    has_run: bool,
    aborted: bool,
    err: Option<QueryError>,
}

impl Materialize {
    pub fn new(sub: Box<dyn RefIterator>) -> Self {
        Self::with_size(sub, 0)
    }

    /// `expected_size` is advisory, used only for stats before the first run.
    pub fn with_size(sub: Box<dyn RefIterator>, expected_size: i64) -> Self {
        Self {
            sub,
            expected_size,
            rows: Vec::new(),
            index: FxHashMap::default(),
            cur_row: 0,
            cur_path: 0,
            positioned: false,
            has_run: false,
            aborted: false,
            err: None,
        }
    }

    fn materialize(&mut self, ctx: &ExecutionContext) {
        self.has_run = true;
        let mut count = 0usize;
        while self.sub.next(ctx) {
            let Some(value) = self.sub.result() else {
                break;
            };
            count += 1;
            if count > MATERIALIZE_LIMIT {
                self.abort();
                return;
            }
            // paths of a repeated value merge into its existing row
            let row = match self.index.get(&value) {
                Some(&i) => i,
                None => {
                    let i = self.rows.len();
                    self.index.insert(value.clone(), i);
                    self.rows.push(Row {
                        value,
                        paths: Vec::new(),
                    });
                    i
                }
            };
            let mut tags = TagMap::default();
            self.sub.tag_results(&mut tags);
            self.rows[row].paths.push(tags);
            while self.sub.next_path(ctx) {
                count += 1;
                if count > MATERIALIZE_LIMIT {
                    self.abort();
                    return;
                }
                let mut tags = TagMap::default();
                self.sub.tag_results(&mut tags);
                self.rows[row].paths.push(tags);
            }
        }
        if let Some(e) = self.sub.err() {
            self.err = Some(e.clone());
        }
    }

    fn abort(&mut self) {
        self.aborted = true;
        self.rows = Vec::new();
        self.index = FxHashMap::default();
        self.sub.reset();
    }
}

impl IteratorBase for Materialize {
    fn name(&self) -> &'static str {
        "Materialize"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if self.aborted {
            self.sub.tag_results(dst);
            return;
        }
        if self.positioned {
            if let Some(row) = self.rows.get(self.cur_row) {
                if let Some(tags) = row.paths.get(self.cur_path) {
                    for (k, v) in tags {
                        dst.insert(k.clone(), v.clone());
                    }
                }
            }
        }
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.cur_row = 0;
        self.cur_path = 0;
        self.positioned = false;
        self.err = None;
        if self.aborted {
            self.sub.reset();
            self.aborted = false;
            self.has_run = false;
            self.rows = Vec::new();
            self.index = FxHashMap::default();
        }
        // a clean buffer is kept for replay
    }

    fn stats(&self) -> Stats {
        if self.has_run && !self.aborted {
            let size = self.rows.len() as i64;
            return Stats {
                size,
                exact: true,
                next_cost: 1,
                contains_cost: 1,
            };
        }
        let st = self.sub.stats();
        Stats {
            size: if self.expected_size > 0 {
                self.expected_size
            } else {
                st.size
            },
            exact: false,
            next_cost: 1,
            contains_cost: 1,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) {
        self.rows = Vec::new();
        self.index = FxHashMap::default();
        self.sub.close();
    }
}

impl RefIterator for Materialize {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.has_run {
            self.materialize(ctx);
            if self.err.is_some() {
                return false;
            }
        }
        if self.aborted {
            return self.sub.next(ctx);
        }
        let next = if self.positioned { self.cur_row + 1 } else { 0 };
        if next >= self.rows.len() {
            return false;
        }
        self.cur_row = next;
        self.cur_path = 0;
        self.positioned = true;
        true
    }

    fn result(&self) -> Option<Ref> {
        if self.aborted {
            return self.sub.result();
        }
        if !self.positioned {
            return None;
        }
        self.rows.get(self.cur_row).map(|r| r.value.clone())
    }

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        if self.aborted {
            return self.sub.next_path(ctx);
        }
        if !self.positioned {
            return false;
        }
        let Some(row) = self.rows.get(self.cur_row) else {
            return false;
        };
        if self.cur_path + 1 >= row.paths.len() {
            return false;
        }
        self.cur_path += 1;
        true
    }

    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        if !self.has_run {
            self.materialize(ctx);
            if self.err.is_some() {
                return false;
            }
        }
        if self.aborted {
            return self.sub.contains(ctx, v);
        }
        match self.index.get(v) {
            Some(&i) => {
                self.cur_row = i;
                self.cur_path = 0;
                self.positioned = true;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iterator::fixed::Fixed;
    use crate::iterator::save::Save;

    fn fixed(ids: &[u64]) -> Box<dyn RefIterator> {
        Box::new(Fixed::new(ids.iter().map(|&i| Ref::Node(i)).collect()))
    }

    #[test]
    fn replays_from_buffer() {
        let ctx = ExecutionContext::new();
        let mut it = Materialize::new(fixed(&[1, 2, 3]));
        let mut first = Vec::new();
        while it.next(&ctx) {
            first.push(it.result().unwrap());
        }
        it.reset();
        let mut second = Vec::new();
        while it.next(&ctx) {
            second.push(it.result().unwrap());
        }
        assert_eq!(first, second);
        assert_eq!(first.len(), 3);
    }

    #[test]
    fn preserves_tags() {
        let ctx = ExecutionContext::new();
        let sub = Save::new(fixed(&[5]), vec!["t".to_string()]);
        let mut it = Materialize::new(Box::new(sub));
        assert!(it.next(&ctx));
        let mut tags = TagMap::default();
        it.tag_results(&mut tags);
        assert_eq!(tags.get("t"), Some(&Ref::Node(5)));
    }

    #[test]
    fn contains_is_constant_time_lookup() {
        let ctx = ExecutionContext::new();
        let mut it = Materialize::new(fixed(&[1, 2, 3]));
        assert!(it.contains(&ctx, &Ref::Node(2)));
        assert_eq!(it.result(), Some(Ref::Node(2)));
        assert!(!it.contains(&ctx, &Ref::Node(9)));
    }
}
