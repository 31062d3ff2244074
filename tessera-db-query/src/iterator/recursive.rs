//! Recursive iterator: transitive application of a morphism
//!
//! Takes a base iterator and a morphism; yields every ref reachable by
//! applying the morphism one or more times to the base set, breadth-first
//! by depth. A seen-map guarantees each ref is visited at most once, so
//! iteration terminates in `O(|reachable|)` regardless of graph cycles.
//!
//! Each emitted ref remembers its predecessor, so `tag_results` can recover
//! the tag bindings of the original base ancestor. The internal
//! `__base_recursive` tag carries the frontier element through the morphism
//! and is never exposed.

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::iterator::fixed::Fixed;
use crate::iterator::null::Null;
use crate::iterator::save::tag;
use crate::iterator::{IteratorBase, RefIterator, Stats, TagMap};
use rustc_hash::FxHashMap;
use std::sync::Arc;
use tessera_db_core::{Ref, Value};

/// Depth cap used when the caller passes zero.
pub const DEFAULT_MAX_RECURSIVE_STEPS: i32 = 50;

const BASE_TAG: &str = "__base_recursive";

/// Applies one step of the recursion: base iterator in, result iterator out.
pub type IterMorphism = Arc<dyn Fn(Box<dyn RefIterator>) -> Box<dyn RefIterator> + Send + Sync>;

#[derive(Clone)]
struct SeenAt {
    depth: i32,
    /// The `__base_recursive` ref of the row that produced this one.
    predecessor: Option<Ref>,
}

/// Transitive closure of a morphism over a base set.
pub struct Recursive {
    sub: Box<dyn RefIterator>,
    morphism: IterMorphism,
    max_depth: i32,
    depth_tags: Vec<String>,

    seen: FxHashMap<Ref, SeenAt>,
    next_it: Box<dyn RefIterator>,
    depth: i32,
    base_drained: bool,
    /// Tag bindings per base element, one map per path.
    path_map: FxHashMap<Ref, Vec<TagMap>>,
    path_index: usize,
    /// Base ancestor of the current result.
    contains_value: Option<Ref>,
    /// Frontier collected at the current depth.
    depth_cache: Vec<Ref>,
    result: Option<(i32, Ref)>,
    err: Option<QueryError>,
}

impl Recursive {
    pub fn new(sub: Box<dyn RefIterator>, morphism: IterMorphism, max_depth: i32) -> Self {
        let max_depth = if max_depth == 0 {
            DEFAULT_MAX_RECURSIVE_STEPS
        } else {
            max_depth
        };
        Self {
            sub,
            morphism,
            max_depth,
            depth_tags: Vec::new(),
            seen: FxHashMap::default(),
            next_it: Box::new(Null::new()),
            depth: 0,
            base_drained: false,
            path_map: FxHashMap::default(),
            path_index: 0,
            contains_value: None,
            depth_cache: Vec::new(),
            result: None,
            err: None,
        }
    }

    /// Tag every result with its depth as an `Int`.
    pub fn add_depth_tag(&mut self, tag: impl Into<String>) {
        self.depth_tags.push(tag.into());
    }

    fn drain_base(&mut self, ctx: &ExecutionContext) {
        while self.sub.next(ctx) {
            let Some(res) = self.sub.result() else {
                break;
            };
            self.depth_cache.push(res.clone());
            let mut tags = TagMap::default();
            self.sub.tag_results(&mut tags);
            self.path_map.entry(res.clone()).or_default().push(tags);
            while self.sub.next_path(ctx) {
                let mut tags = TagMap::default();
                self.sub.tag_results(&mut tags);
                self.path_map.entry(res.clone()).or_default().push(tags);
            }
        }
        if let Some(e) = self.sub.err() {
            self.err = Some(e.clone());
        }
        self.base_drained = true;
    }

    /// Walk the seen-chain back to the depth-1 row; its predecessor is the
    /// original base element.
    fn base_value_of(&self, val: &Ref) -> Option<Ref> {
        let mut at = self.seen.get(val)?;
        loop {
            if at.depth == 1 {
                return at.predecessor.clone();
            }
            if at.depth <= 0 {
                return None;
            }
            at = self.seen.get(at.predecessor.as_ref()?)?;
        }
    }
}

impl IteratorBase for Recursive {
    fn name(&self) -> &'static str {
        "Recursive"
    }

    fn tag_results(&self, dst: &mut TagMap) {
        if let Some((depth, _)) = &self.result {
            for tag in &self.depth_tags {
                dst.insert(tag.clone(), Ref::pre_fetched(Value::Int(*depth as i64)));
            }
        }
        if let Some(cv) = &self.contains_value {
            if let Some(paths) = self.path_map.get(cv) {
                if let Some(tags) = paths.get(self.path_index) {
                    for (k, v) in tags {
                        dst.insert(k.clone(), v.clone());
                    }
                }
            }
        }
        self.next_it.tag_results(dst);
        dst.remove(BASE_TAG);
    }

    fn err(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    fn reset(&mut self) {
        self.sub.reset();
        self.seen = FxHashMap::default();
        self.next_it = Box::new(Null::new());
        self.depth = 0;
        self.base_drained = false;
        self.path_map = FxHashMap::default();
        self.path_index = 0;
        self.contains_value = None;
        self.depth_cache = Vec::new();
        self.result = None;
        self.err = None;
    }

    fn stats(&self) -> Stats {
        let st = self.sub.stats();
        Stats {
            size: st.size.saturating_mul(10).max(1),
            exact: false,
            next_cost: st.next_cost * 2,
            contains_cost: st.contains_cost * 2,
        }
    }

    fn sub_iterators(&self) -> Vec<&dyn IteratorBase> {
        vec![self.sub.as_ref()]
    }

    fn close(&mut self) {
        self.sub.close();
        self.next_it.close();
        self.seen = FxHashMap::default();
        self.path_map = FxHashMap::default();
    }
}

impl RefIterator for Recursive {
    fn next(&mut self, ctx: &ExecutionContext) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.path_index = 0;
        if self.depth == 0 && !self.base_drained {
            self.drain_base(ctx);
            if self.err.is_some() {
                return false;
            }
        }
        loop {
            if let Err(e) = ctx.check() {
                self.err = Some(e);
                return false;
            }
            if !self.next_it.next(ctx) {
                if let Some(e) = self.next_it.err() {
                    self.err = Some(e.clone());
                    return false;
                }
                if self.max_depth > 0 && self.depth >= self.max_depth {
                    return false;
                }
                if self.depth_cache.is_empty() {
                    return false;
                }
                self.depth += 1;
                let frontier = std::mem::take(&mut self.depth_cache);
                let base: Box<dyn RefIterator> = Box::new(Fixed::new(frontier));
                self.next_it.close();
                self.next_it = (self.morphism)(tag(base, BASE_TAG));
                continue;
            }
            let Some(val) = self.next_it.result() else {
                return false;
            };
            let mut results = TagMap::default();
            self.next_it.tag_results(&mut results);
            if !self.seen.contains_key(&val) {
                self.seen.insert(
                    val.clone(),
                    SeenAt {
                        depth: self.depth,
                        predecessor: results.get(BASE_TAG).cloned(),
                    },
                );
                self.contains_value = self.base_value_of(&val);
                self.result = Some((self.depth, val.clone()));
                self.depth_cache.push(val);
                return true;
            }
        }
    }

    fn result(&self) -> Option<Ref> {
        self.result.as_ref().map(|(_, v)| v.clone())
    }

    fn next_path(&mut self, _ctx: &ExecutionContext) -> bool {
        let Some(cv) = &self.contains_value else {
            return false;
        };
        let paths = self.path_map.get(cv).map(|p| p.len()).unwrap_or(0);
        if self.path_index + 1 >= paths {
            return false;
        }
        self.path_index += 1;
        true
    }

    fn contains(&mut self, ctx: &ExecutionContext, val: &Ref) -> bool {
        if self.err.is_some() {
            return false;
        }
        self.path_index = 0;
        if let Some(at) = self.seen.get(val).cloned() {
            self.contains_value = self.base_value_of(val);
            self.result = Some((at.depth, val.clone()));
            return true;
        }
        while self.next(ctx) {
            if self.result().as_ref() == Some(val) {
                return true;
            }
        }
        false
    }
}
