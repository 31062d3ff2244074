//! Quad store capability
//!
//! Every backing store surfaces this interface; the rest of the stack works
//! against it. Shapes produced by a store (from `all_nodes`, `quad_iterator`
//! and friends) are ordinary shape nodes, so store plans compose with the
//! generic algebra.
//!
//! The optimizer and quad-index capabilities are optional: the provided
//! defaults decline, and the planner skips the corresponding rewrites.

use crate::shape::{Shape, ValShape};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tessera_db_core::{Delta, Direction, IgnoreOpts, InternalQuad, Quad, Ref, Result, Value};

/// Store-level statistics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreStats {
    /// Number of quads currently stored.
    pub links: i64,
}

/// Constraint map used by the quad-index capability: direction → required
/// ref. Ordered so constraint sets compare and display deterministically.
pub type IndexConstraints = BTreeMap<Direction, Ref>;

/// The capability a backing store provides to the query core.
pub trait QuadStore: Send + Sync {
    // --- resolver ---

    /// Resolve a value to the store's ref for it, if the value is known.
    fn value_of(&self, v: &Value) -> Option<Ref>;

    /// Resolve a ref back to its value.
    fn name_of(&self, r: &Ref) -> Option<Value>;

    // --- indexer ---

    /// The quad a quad-ref denotes.
    fn quad(&self, r: &Ref) -> Option<Quad>;

    /// A shape enumerating refs of quads whose `d` direction is `r`.
    fn quad_iterator(&self, d: Direction, r: &Ref) -> Shape;

    /// The node ref at direction `d` of the quad `quad_ref` denotes.
    ///
    /// At worst a valid implementation resolves through `quad` and
    /// `value_of`; stores usually answer from the quad token directly.
    fn quad_direction(&self, quad_ref: &Ref, d: Direction) -> Option<Ref>;

    /// A shape enumerating all nodes in the store.
    fn all_nodes(&self) -> Shape;

    /// A shape enumerating all quads in the store.
    fn all_quads(&self) -> Shape;

    fn stats(&self) -> StoreStats;

    // --- writer ---

    /// Apply a batch of deltas. The only way data enters the store.
    fn apply_deltas(&self, deltas: &[Delta], opts: IgnoreOpts) -> Result<()>;

    // --- optional optimizer ---

    /// Rewrite a shape into a store-native plan. Default declines.
    fn optimize_shape(&self, s: Shape) -> (Shape, bool) {
        (s, false)
    }

    /// Rewrite a value shape into a store-native plan. Default declines.
    fn optimize_val_shape(&self, s: ValShape) -> (ValShape, bool) {
        (s, false)
    }

    // --- optional quad indexer ---

    /// Size of the quad index under the given constraints, and whether the
    /// size is exact. Default declines.
    fn size_of_index(&self, constraints: &IndexConstraints) -> Option<(i64, bool)> {
        let _ = constraints;
        None
    }

    /// The single quad matching the constraints, if exactly one does.
    /// Default declines.
    fn lookup_quad_index(&self, constraints: &IndexConstraints) -> Option<InternalQuad> {
        let _ = constraints;
        None
    }
}

/// Shared store handle carried by bound shape nodes.
///
/// Compares by pointer identity: two bound shapes are equal only when bound
/// to the same store instance.
#[derive(Clone)]
pub struct StoreHandle(pub Arc<dyn QuadStore>);

impl StoreHandle {
    pub fn new(store: Arc<dyn QuadStore>) -> Self {
        Self(store)
    }
}

impl std::ops::Deref for StoreHandle {
    type Target = dyn QuadStore;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl fmt::Debug for StoreHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QuadStore")
    }
}

impl PartialEq for StoreHandle {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Wrap a ref shape so it yields values (the store's `to_value`).
pub fn to_values(store: &Arc<dyn QuadStore>, refs: Shape) -> ValShape {
    ValShape::ToValues {
        store: StoreHandle::new(store.clone()),
        refs: Box::new(refs),
    }
}

/// Wrap a value shape so it yields refs (the store's `to_ref`).
pub fn to_refs(store: &Arc<dyn QuadStore>, values: ValShape) -> Shape {
    Shape::ToRefs {
        store: StoreHandle::new(store.clone()),
        values: Box::new(values),
    }
}
