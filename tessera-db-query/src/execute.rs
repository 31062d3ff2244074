//! Query pipeline: optimize, bind, build, drive
//!
//! `optimize` runs the generic structural pass to a fixpoint, then the
//! store-specific pass to a fixpoint. Fixpoints compare trees for equality
//! rather than trusting per-rule changed flags, so a rule only has to make
//! progress. `build_iterator` chains the whole pipeline and hands back the
//! iterator tree; `IterateChain` drives it.

use crate::bind::{resolve_lookup, Binder};
use crate::context::ExecutionContext;
use crate::error::{QueryError, Result};
use crate::iterator::{Null, RefIterator, TagMap};
use crate::shape::{Optimizer, Shape, ValShape, MATERIALIZE_THRESHOLD};
use crate::store::{IndexConstraints, QuadStore};
use std::sync::Arc;
use tessera_db_core::{InternalQuad, Ref, Value};
use tracing::{debug, warn};

/// Passes after which an optimizer that keeps producing new trees is
/// assumed to be oscillating.
const MAX_OPTIMIZER_PASSES: usize = 100;

/// Adapter exposing a store's optional optimizer and quad-index
/// capabilities as a shape rewriter. Also resolves `Lookup` leaves, so the
/// store pass can fold constant sets before binding.
pub struct StoreOptimizer<'a> {
    store: &'a Arc<dyn QuadStore>,
    materialize_threshold: i64,
}

impl<'a> StoreOptimizer<'a> {
    pub fn new(store: &'a Arc<dyn QuadStore>) -> Self {
        Self {
            store,
            materialize_threshold: MATERIALIZE_THRESHOLD,
        }
    }

    /// Override the size under which quad scans are buffered in memory.
    pub fn with_materialize_threshold(mut self, threshold: i64) -> Self {
        self.materialize_threshold = threshold;
        self
    }
}

impl Optimizer for StoreOptimizer<'_> {
    fn optimize_shape(&self, s: Shape) -> (Shape, bool) {
        self.store.optimize_shape(s)
    }

    fn optimize_val_shape(&self, s: ValShape) -> (ValShape, bool) {
        self.store.optimize_val_shape(s)
    }

    fn size_of_index(&self, constraints: &IndexConstraints) -> Option<(i64, bool)> {
        self.store.size_of_index(constraints)
    }

    fn lookup_quad_index(&self, constraints: &IndexConstraints) -> Option<InternalQuad> {
        self.store.lookup_quad_index(constraints)
    }

    fn materialize_threshold(&self) -> i64 {
        self.materialize_threshold
    }
}

/// Pre-pass resolving `Lookup` leaves to fixed ref sets, so the generic
/// rules can merge and order them.
struct ResolveValues<'a> {
    store: &'a Arc<dyn QuadStore>,
}

impl Optimizer for ResolveValues<'_> {
    fn optimize_shape(&self, s: Shape) -> (Shape, bool) {
        match s {
            Shape::Lookup(values) => (resolve_lookup(self.store.as_ref(), &values), true),
            other => (other, false),
        }
    }

    fn optimize_val_shape(&self, s: ValShape) -> (ValShape, bool) {
        (s, false)
    }
}

fn fixpoint(mut s: Shape, r: Option<&dyn Optimizer>) -> Shape {
    for _ in 0..MAX_OPTIMIZER_PASSES {
        let prev = s.clone();
        let (next, _) = s.optimize(r);
        if next == prev {
            return next;
        }
        s = next;
    }
    warn!("optimizer did not settle after {MAX_OPTIMIZER_PASSES} passes");
    s
}

/// Resolve lookups, apply generic optimizations, then the store's, each to
/// a fixpoint.
pub fn optimize(s: Shape, store: Option<&Arc<dyn QuadStore>>) -> (Shape, bool) {
    let original = s.clone();
    let mut s = original.clone();
    if let Some(store) = store {
        s = fixpoint(s, Some(&ResolveValues { store }));
    }
    let mut s = fixpoint(s, None);
    debug!(shape = ?s, "generic optimization done");
    if let Some(store) = store {
        let so = StoreOptimizer::new(store);
        s = fixpoint(s, Some(&so));
        debug!(shape = ?s, "store optimization done");
    }
    let changed = s != original;
    (s, changed)
}

/// Substitute bindable shapes with store-provided ones.
pub fn bind(s: Shape, store: &Arc<dyn QuadStore>) -> Shape {
    if s.is_null() {
        return Shape::Null;
    }
    let binder = Binder::new(store);
    let bound = s.optimize(Some(&binder)).0;
    debug!(shape = ?bound, "bound to store");
    bound
}

/// Optimize the shape, bind it, and build the iterator tree.
pub fn build_iterator(s: Shape, store: &Arc<dyn QuadStore>) -> Box<dyn RefIterator> {
    let (s, _) = optimize(s, Some(store));
    if s.is_null() {
        return Box::new(Null::new());
    }
    let s = bind(s, store);
    s.build_iterator()
}

/// Driver over a built iterator tree.
///
/// Drains results in one of two terminal modes: values-only (primary refs,
/// resolved to values through the store) or tagged (a visitor over the
/// `{tag → ref}` map of every row). Consumes fuel per row, surfaces the
/// sticky error after the drain, and closes the tree exactly once.
pub struct IterateChain<'a> {
    ctx: &'a ExecutionContext,
    it: Box<dyn RefIterator>,
    store: Option<Arc<dyn QuadStore>>,
    paths: bool,
}

impl<'a> IterateChain<'a> {
    pub fn new(ctx: &'a ExecutionContext, it: Box<dyn RefIterator>) -> Self {
        Self {
            ctx,
            it,
            store: None,
            paths: true,
        }
    }

    /// Attach the store used to resolve refs to values.
    pub fn on(mut self, store: Arc<dyn QuadStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Enable or disable `next_path` expansion for the tagged mode.
    pub fn paths(mut self, enable: bool) -> Self {
        self.paths = enable;
        self
    }

    fn fuel(&mut self) -> Result<()> {
        if let Err(e) = self.ctx.tracker().consume_fuel_one() {
            self.it.close();
            return Err(QueryError::from(e));
        }
        Ok(())
    }

    fn finish(mut self) -> Result<()> {
        let err = self.it.err().cloned();
        self.it.close();
        match err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Visit every primary result ref.
    pub fn each(mut self, mut f: impl FnMut(&Ref)) -> Result<()> {
        while self.it.next(self.ctx) {
            self.fuel()?;
            if let Some(r) = self.it.result() {
                f(&r);
            }
        }
        self.finish()
    }

    /// Collect every primary result ref.
    pub fn all(self) -> Result<Vec<Ref>> {
        let mut out = Vec::new();
        self.each(|r| out.push(r.clone()))?;
        Ok(out)
    }

    /// The first result, if any.
    pub fn first(mut self) -> Result<Option<Ref>> {
        let found = self.it.next(self.ctx).then(|| self.it.result()).flatten();
        self.finish()?;
        Ok(found)
    }

    /// Count results, including alternative paths when enabled.
    pub fn count(mut self) -> Result<i64> {
        let mut n = 0i64;
        while self.it.next(self.ctx) {
            self.fuel()?;
            n += 1;
            if self.paths {
                while self.it.next_path(self.ctx) {
                    self.fuel()?;
                    n += 1;
                }
            }
        }
        self.finish()?;
        Ok(n)
    }

    fn resolve(&self, r: &Ref) -> Result<Value> {
        if let Some(v) = r.value() {
            return Ok(v.clone());
        }
        let store = self
            .store
            .as_ref()
            .ok_or_else(|| QueryError::Internal("no store attached to iteration".into()))?;
        store.name_of(r).ok_or_else(|| {
            QueryError::Core(tessera_db_core::Error::not_found(format!(
                "no value for ref {r:?}"
            )))
        })
    }

    /// Visit every primary result, resolved to a value.
    pub fn each_value(mut self, mut f: impl FnMut(&Value)) -> Result<()> {
        while self.it.next(self.ctx) {
            self.fuel()?;
            if let Some(r) = self.it.result() {
                let v = match self.resolve(&r) {
                    Ok(v) => v,
                    Err(e) => {
                        self.it.close();
                        return Err(e);
                    }
                };
                f(&v);
            }
        }
        self.finish()
    }

    /// Collect every primary result as a value.
    pub fn all_values(self) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        self.each_value(|v| out.push(v.clone()))?;
        Ok(out)
    }

    /// Visit the tag bindings of every result row, including alternative
    /// paths when enabled.
    pub fn tag_each(mut self, mut f: impl FnMut(&TagMap)) -> Result<()> {
        while self.it.next(self.ctx) {
            self.fuel()?;
            let mut tags = TagMap::default();
            self.it.tag_results(&mut tags);
            f(&tags);
            if self.paths {
                while self.it.next_path(self.ctx) {
                    self.fuel()?;
                    let mut tags = TagMap::default();
                    self.it.tag_results(&mut tags);
                    f(&tags);
                }
            }
        }
        self.finish()
    }
}
