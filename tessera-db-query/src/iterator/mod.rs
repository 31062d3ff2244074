//! Pull-based iterator layer
//!
//! Iterators are stateful cursors over either refs or values. The two
//! flavors share a base contract (`IteratorBase`) and differ only in the
//! yielded item type.
//!
//! To get the full results of iteration:
//!
//! ```ignore
//! while it.next(ctx) {
//!     let val = it.result();
//!     // ... do things with val
//!     while it.next_path(ctx) {
//!         // ... other tag bindings for the same primary result
//!     }
//! }
//! if let Some(err) = it.err() { /* iteration failed */ }
//! it.close();
//! ```
//!
//! `contains` is the membership-test mode: on success it positions the
//! cursor on the probed item, so `tag_results` reflects that row.
//!
//! Errors are sticky: the first error observed is returned from `err()`
//! until `reset()`. `next`/`next_path`/`contains` return `false` on error;
//! callers distinguish exhaustion from failure via `err()`.

pub mod and;
pub mod count;
pub mod fixed;
pub mod has_a;
pub mod limit;
pub mod links_to;
pub mod materialize;
pub mod not;
pub mod null;
pub mod or;
pub mod recursive;
pub mod resolve;
pub mod save;
pub mod skip;
pub mod unique;
pub mod value_filter;

pub use and::And;
pub use count::Count;
pub use fixed::{Fixed, ValuesIterator};
pub use has_a::HasA;
pub use limit::Limit;
pub use links_to::LinksTo;
pub use materialize::Materialize;
pub use not::Not;
pub use null::{ErrorIterator, ErrorVIterator, Null, NullV};
pub use or::Or;
pub use recursive::{Recursive, DEFAULT_MAX_RECURSIVE_STEPS};
pub use resolve::{ToRefs, ToValues};
pub use save::{tag, Save, Tagger};
pub use skip::Skip;
pub use unique::Unique;
pub use value_filter::ValueFilterIterator;

use crate::context::ExecutionContext;
use crate::error::QueryError;
use rustc_hash::FxHashMap;
use tessera_db_core::{Ref, Value};

/// Tag name → ref binding map filled by `tag_results`.
pub type TagMap = FxHashMap<String, Ref>;

/// Relative costs and size of an iterator.
///
/// Roughly, draining an iterator takes `next_cost * size` cost units. A
/// wibbly-wobbly heuristic, not an exact measure.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    pub size: i64,
    /// Whether `size` is exact or a conservative estimate.
    pub exact: bool,
    pub next_cost: i64,
    pub contains_cost: i64,
}

/// Contract shared by ref- and value-iterators.
pub trait IteratorBase: Send {
    /// Short name for tree descriptions.
    fn name(&self) -> &'static str;

    /// Fill `dst` with the tag bindings for the current result.
    fn tag_results(&self, dst: &mut TagMap);

    /// Sticky error, if any advancing call failed.
    fn err(&self) -> Option<&QueryError>;

    /// Restart iteration from the beginning; clears the sticky error.
    fn reset(&mut self);

    /// Cost and size estimates.
    fn stats(&self) -> Stats;

    /// Child iterators, for tree descriptions.
    fn sub_iterators(&self) -> Vec<&dyn IteratorBase>;

    /// Release resources. Owning iterators close their children, so closing
    /// the root releases the whole tree exactly once.
    fn close(&mut self);
}

/// Iterator yielding refs.
pub trait RefIterator: IteratorBase {
    /// Advance to the next distinct primary result.
    fn next(&mut self, ctx: &ExecutionContext) -> bool;

    /// The current result; defined only after a successful advance.
    fn result(&self) -> Option<Ref>;

    /// Advance to an alternative tag binding for the same primary result.
    fn next_path(&mut self, ctx: &ExecutionContext) -> bool;

    /// Membership test. On success the cursor is positioned on `v`.
    fn contains(&mut self, ctx: &ExecutionContext, v: &Ref) -> bool;

    /// Downcast hook for iterators that accept tags at build time.
    fn as_tagger(&mut self) -> Option<&mut dyn Tagger> {
        None
    }
}

/// Iterator yielding values.
pub trait VIterator: IteratorBase {
    fn next(&mut self, ctx: &ExecutionContext) -> bool;

    fn result(&self) -> Option<Value>;

    fn next_path(&mut self, ctx: &ExecutionContext) -> bool;

    fn contains(&mut self, ctx: &ExecutionContext, v: &Value) -> bool;
}

/// A description of an iterator tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Description {
    pub name: String,
    pub size: i64,
    pub exact: bool,
    pub sub: Vec<Description>,
}

/// Describe an iterator tree, for logging and EXPLAIN-style output.
pub fn describe(it: &dyn IteratorBase) -> Description {
    let stats = it.stats();
    Description {
        name: it.name().to_string(),
        size: stats.size,
        exact: stats.exact,
        sub: it.sub_iterators().into_iter().map(describe).collect(),
    }
}
