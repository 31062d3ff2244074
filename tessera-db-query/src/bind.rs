//! Binder: attaches a shape tree to a concrete store
//!
//! The binder is itself an `Optimizer`: it walks the tree bottom-up through
//! the regular optimize recursion and substitutes each bindable leaf with
//! the store-provided shape. Lookups resolve to fixed ref sets (values the
//! store does not know are dropped; an all-miss lookup becomes `Null`),
//! quad constraints become indexed quad iterators or `LinksTo` nodes, and
//! projections become `HasA` nodes carrying the store handle.

use crate::shape::{Optimizer, QuadFilter, Shape, ValShape};
use crate::store::{QuadStore, StoreHandle};
use std::sync::Arc;
use tessera_db_core::Value;

/// Resolve lookup values through the store, dropping unknown values.
pub fn resolve_lookup(store: &dyn QuadStore, values: &[Value]) -> Shape {
    let refs: Vec<_> = values.iter().filter_map(|v| store.value_of(v)).collect();
    if refs.is_empty() {
        return Shape::Null;
    }
    Shape::Fixed(refs)
}

/// Shape rewriter that substitutes bindables with store-backed shapes.
pub struct Binder<'a> {
    store: &'a Arc<dyn QuadStore>,
}

impl<'a> Binder<'a> {
    pub fn new(store: &'a Arc<dyn QuadStore>) -> Self {
        Self { store }
    }

    fn handle(&self) -> StoreHandle {
        StoreHandle::new(self.store.clone())
    }

    /// Re-run binding over a store-provided shape, so nested bindables it
    /// may contain are substituted as well.
    fn rebind(&self, s: Shape) -> Shape {
        s.optimize(Some(self)).0
    }

    fn bind_quads(&self, filters: Vec<QuadFilter>) -> Shape {
        if filters.is_empty() {
            return self.rebind(self.store.all_quads());
        }
        let mut members = Vec::with_capacity(filters.len());
        for f in filters {
            let sub = match f.values.one() {
                Some(v) => self.rebind(self.store.quad_iterator(f.dir, &v)),
                None => Shape::LinksTo {
                    store: self.handle(),
                    dir: f.dir,
                    values: Box::new(f.values),
                },
            };
            if sub.is_null() {
                return Shape::Null;
            }
            members.push(sub);
        }
        if members.len() == 1 {
            return members.pop().expect("len checked");
        }
        Shape::Intersect(members)
    }
}

impl Optimizer for Binder<'_> {
    fn optimize_shape(&self, s: Shape) -> (Shape, bool) {
        match s {
            Shape::AllNodes => (self.rebind(self.store.all_nodes()), true),
            Shape::AllQuads => (self.rebind(self.store.all_quads()), true),
            Shape::Lookup(values) => (resolve_lookup(self.store.as_ref(), &values), true),
            Shape::Quads(filters) => (self.bind_quads(filters), true),
            Shape::NodesFrom { dir, quads } => (
                // the quads child was bound by the recursion below us
                Shape::HasA {
                    store: self.handle(),
                    dir,
                    quads,
                },
                true,
            ),
            Shape::QuadsAction(a) => {
                let (bound, _) = a.simplify().optimize(Some(self));
                (bound, true)
            }
            Shape::ValuesToRefs(values) => (
                Shape::ToRefs {
                    store: self.handle(),
                    values,
                },
                true,
            ),
            Shape::Recursive(mut rs) => {
                if rs.store.is_none() {
                    rs.store = Some(self.handle());
                    (Shape::Recursive(rs), true)
                } else {
                    (Shape::Recursive(rs), false)
                }
            }
            other => (other, false),
        }
    }

    fn optimize_val_shape(&self, s: ValShape) -> (ValShape, bool) {
        match s {
            ValShape::RefsToValues(refs) => (
                ValShape::ToValues {
                    store: StoreHandle::new(self.store.clone()),
                    refs,
                },
                true,
            ),
            other => (other, false),
        }
    }
}
