//! Declarative shape algebra
//!
//! A shape is a node in the query tree. Shapes are immutable values: every
//! rewrite produces a new tree. `Shape` nodes describe ref streams and
//! `ValShape` nodes describe value streams; the `RefsToValues` /
//! `ValuesToRefs` adapters cross between the two through the store.
//!
//! Each shape can be optimized (`optimize`, a pure structural rewrite) and
//! materialized (`build_iterator`). The bindable leaves (`AllNodes`,
//! `AllQuads`, `Lookup`, `Quads`, `NodesFrom`, the flavor adapters and the
//! recursive node's store slot) carry no store; building them before the
//! binder has replaced them yields an iterator with a sticky "unbound"
//! error.

pub mod build;
pub mod filters;
pub mod optimize;
pub mod traverse;

pub use filters::{CmpOperator, CompiledFilter, ValueFilter};

use crate::iterator::RefIterator;
use crate::path::Path;
use crate::store::{IndexConstraints, StoreHandle};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tessera_db_core::{Direction, InternalQuad, Ref, Value};

/// Collapse sets smaller than this to in-memory buffers during
/// store-specific optimization. Tunable via `Optimizer::materialize_threshold`.
pub const MATERIALIZE_THRESHOLD: i64 = 100;

/// Constant tag name → ref bindings. Ordered, so trees compare and render
/// deterministically.
pub type TagBindings = BTreeMap<String, Ref>;

/// A node in the ref-stream query tree.
#[derive(Clone, Debug, PartialEq)]
pub enum Shape {
    /// The empty set.
    Null,
    /// Every node in the store. Bindable leaf.
    AllNodes,
    /// Every quad in the store. Bindable leaf.
    AllQuads,
    /// A static set of refs.
    Fixed(Vec<Ref>),
    /// A static set of values, resolved to refs by the binder. Bindable.
    Lookup(Vec<Value>),
    /// Multiset union of sub-queries. Does not deduplicate.
    Union(Vec<Shape>),
    /// Set intersection of sub-queries.
    Intersect(Vec<Shape>),
    /// Intersection with additional sub-queries that only contribute tags.
    IntersectOptional {
        intersect: Vec<Shape>,
        optional: Vec<Shape>,
    },
    /// Set difference: `from` minus `exclude`.
    Except {
        from: Box<Shape>,
        exclude: Box<Shape>,
    },
    /// Deduplicated output.
    Unique(Box<Shape>),
    /// Windowing. `limit = 0` means unbounded.
    Page {
        from: Box<Shape>,
        skip: i64,
        limit: i64,
    },
    /// Attach tags bound to the current result ref.
    ///
    /// Shape rewrites push these toward the root so other rules see through
    /// them.
    Save {
        from: Box<Shape>,
        tags: Vec<String>,
    },
    /// Attach constant tag bindings. Does not affect the stream otherwise.
    FixedTags {
        on: Box<Shape>,
        tags: TagBindings,
    },
    /// Buffer the sub-query in memory during execution.
    Materialize {
        from: Box<Shape>,
        size_hint: i64,
    },
    /// Quads matching every filter. Empty means all quads. Bindable.
    Quads(Vec<QuadFilter>),
    /// Project quads onto one direction. Bindable.
    NodesFrom {
        dir: Direction,
        quads: Box<Shape>,
    },
    /// Fused filter + save + project over a single quad scan.
    QuadsAction(Box<QuadsAction>),
    /// Value stream exposed as refs. Bindable.
    ValuesToRefs(Box<ValShape>),
    /// An externally supplied, one-shot iterator.
    Iterator(OneShot),
    /// Transitive application of a morphism.
    Recursive(Box<RecursiveShape>),

    // Bound forms, produced by the binder.
    /// Quads whose `dir` is any of `values` (bound).
    LinksTo {
        store: StoreHandle,
        dir: Direction,
        values: Box<Shape>,
    },
    /// Projection of a bound quad stream onto one direction.
    HasA {
        store: StoreHandle,
        dir: Direction,
        quads: Box<Shape>,
    },
    /// Value stream resolved to refs through the store (bound).
    ToRefs {
        store: StoreHandle,
        values: Box<ValShape>,
    },
}

/// A node in the value-stream query tree.
#[derive(Clone, Debug, PartialEq)]
pub enum ValShape {
    /// The empty set.
    Null,
    /// A static set of values.
    Values(Vec<Value>),
    /// One-row cardinality of a ref stream.
    Count(Box<Shape>),
    /// Filter a value stream by predicates.
    Filter {
        from: Box<ValShape>,
        filters: Vec<ValueFilter>,
    },
    /// Ref stream exposed as values. Bindable.
    RefsToValues(Box<Shape>),
    /// Ref stream resolved to values through the store (bound).
    ToValues {
        store: StoreHandle,
        refs: Box<Shape>,
    },
}

/// One constraint on a quad stream: the `dir` direction must be in `values`.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadFilter {
    pub dir: Direction,
    pub values: Shape,
}

/// A set of actions performed in a single pass over the quad stream:
/// filter quads by constant refs, tag directions, and project the `result`
/// direction.
///
/// `size` is an approximate result count filled in by the store optimizer;
/// zero means unknown.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct QuadsAction {
    pub size: i64,
    pub result: Direction,
    pub filter: IndexConstraints,
    pub save: BTreeMap<Direction, Vec<String>>,
}

impl QuadsAction {
    pub fn set_filter(&mut self, d: Direction, v: Ref) {
        self.filter.insert(d, v);
    }

    /// The equivalent `NodesFrom` over `Quads` tree.
    pub fn simplify(&self) -> Shape {
        let mut quads = Vec::with_capacity(self.filter.len() + self.save.len());
        for (dir, val) in &self.filter {
            quads.push(QuadFilter {
                dir: *dir,
                values: Shape::Fixed(vec![val.clone()]),
            });
        }
        for (dir, tags) in &self.save {
            quads.push(QuadFilter {
                dir: *dir,
                values: Shape::Save {
                    from: Box::new(Shape::AllNodes),
                    tags: tags.clone(),
                },
            });
        }
        Shape::NodesFrom {
            dir: self.result,
            quads: Box::new(Shape::Quads(quads)),
        }
    }
}

/// Transitive closure of a path applied to a base set.
#[derive(Clone, Debug, PartialEq)]
pub struct RecursiveShape {
    pub base: Shape,
    pub step: Path,
    /// Zero means the engine default depth cap.
    pub max_depth: i32,
    pub depth_tags: Vec<String>,
    /// Filled by the binder; building without it fails with an unbound
    /// error.
    pub store: Option<StoreHandle>,
}

/// An externally supplied iterator, usable in exactly one evaluation.
///
/// Compares by identity; a clone shares the single shot.
#[derive(Clone)]
pub struct OneShot(Arc<Mutex<Option<Box<dyn RefIterator>>>>);

impl OneShot {
    pub fn new(it: Box<dyn RefIterator>) -> Self {
        Self(Arc::new(Mutex::new(Some(it))))
    }

    /// Take the iterator out; `None` after the first call.
    pub fn take(&self) -> Option<Box<dyn RefIterator>> {
        self.0.lock().ok().and_then(|mut slot| slot.take())
    }
}

impl fmt::Debug for OneShot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("OneShot")
    }
}

impl PartialEq for OneShot {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Structural rewriter over the shape algebra.
///
/// Implemented by the binder and by the store-optimizer adapter. The
/// quad-index hooks are optional capabilities: the defaults decline, and
/// the `QuadsAction` rules stay inert.
pub trait Optimizer {
    /// Rewrite a shape; `(shape, false)` declines.
    fn optimize_shape(&self, s: Shape) -> (Shape, bool);

    /// Rewrite a value shape; `(shape, false)` declines.
    fn optimize_val_shape(&self, s: ValShape) -> (ValShape, bool);

    /// Size of the quad index under the constraints, if known.
    fn size_of_index(&self, constraints: &IndexConstraints) -> Option<(i64, bool)> {
        let _ = constraints;
        None
    }

    /// The unique quad matching the constraints, if exactly one does.
    fn lookup_quad_index(&self, constraints: &IndexConstraints) -> Option<InternalQuad> {
        let _ = constraints;
        None
    }

    fn materialize_threshold(&self) -> i64 {
        MATERIALIZE_THRESHOLD
    }
}

impl Shape {
    /// Whether this shape is the empty set.
    pub fn is_null(&self) -> bool {
        matches!(self, Shape::Null)
    }

    /// The single ref of a one-element `Fixed`, if that is what this is.
    pub fn one(&self) -> Option<Ref> {
        match self {
            Shape::Fixed(v) if v.len() == 1 => Some(v[0].clone()),
            _ => None,
        }
    }

    /// Visit every shape in the tree, parents before children. Return false
    /// from the callback to skip a branch.
    pub fn walk(&self, f: &mut dyn FnMut(&Shape) -> bool) {
        if !f(self) {
            return;
        }
        match self {
            Shape::Union(v) | Shape::Intersect(v) => {
                for c in v {
                    c.walk(f);
                }
            }
            Shape::IntersectOptional {
                intersect,
                optional,
            } => {
                for c in intersect.iter().chain(optional) {
                    c.walk(f);
                }
            }
            Shape::Except { from, exclude } => {
                from.walk(f);
                exclude.walk(f);
            }
            Shape::Unique(from)
            | Shape::Page { from, .. }
            | Shape::Save { from, .. }
            | Shape::Materialize { from, .. } => from.walk(f),
            Shape::FixedTags { on, .. } => on.walk(f),
            Shape::Quads(filters) => {
                for qf in filters {
                    qf.values.walk(f);
                }
            }
            Shape::NodesFrom { quads, .. } | Shape::HasA { quads, .. } => quads.walk(f),
            Shape::LinksTo { values, .. } => values.walk(f),
            Shape::ValuesToRefs(vs) | Shape::ToRefs { values: vs, .. } => vs.walk_shapes(f),
            Shape::Recursive(rs) => rs.base.walk(f),
            Shape::Null
            | Shape::AllNodes
            | Shape::AllQuads
            | Shape::Fixed(_)
            | Shape::Lookup(_)
            | Shape::QuadsAction(_)
            | Shape::Iterator(_) => {}
        }
    }
}

impl ValShape {
    /// Whether this shape is the empty set.
    pub fn is_null(&self) -> bool {
        matches!(self, ValShape::Null)
    }

    /// Visit nested `Shape` nodes.
    fn walk_shapes(&self, f: &mut dyn FnMut(&Shape) -> bool) {
        match self {
            ValShape::Count(from) => from.walk(f),
            ValShape::Filter { from, .. } => from.walk_shapes(f),
            ValShape::RefsToValues(refs) | ValShape::ToValues { refs, .. } => refs.walk(f),
            ValShape::Null | ValShape::Values(_) => {}
        }
    }
}

/// Strip `FixedTags` wrappers from intersect/union members, returning the
/// stripped members and the merged bindings, if any member carried them.
pub(crate) fn clear_fixed_tags(members: Vec<Shape>) -> (Vec<Shape>, Option<TagBindings>) {
    if !members
        .iter()
        .any(|m| matches!(m, Shape::FixedTags { .. }))
    {
        return (members, None);
    }
    let mut tags = TagBindings::new();
    let stripped = members
        .into_iter()
        .map(|m| match m {
            Shape::FixedTags { on, tags: t } => {
                tags.extend(t);
                *on
            }
            other => other,
        })
        .collect();
    (stripped, Some(tags))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_matches_single_fixed_only() {
        assert_eq!(Shape::Fixed(vec![Ref::Node(1)]).one(), Some(Ref::Node(1)));
        assert_eq!(Shape::Fixed(vec![Ref::Node(1), Ref::Node(2)]).one(), None);
        assert_eq!(Shape::Null.one(), None);
    }

    #[test]
    fn walk_visits_in_preorder() {
        let s = Shape::NodesFrom {
            dir: Direction::Subject,
            quads: Box::new(Shape::Quads(vec![
                QuadFilter {
                    dir: Direction::Subject,
                    values: Shape::Fixed(vec![Ref::Node(1)]),
                },
                QuadFilter {
                    dir: Direction::Predicate,
                    values: Shape::Fixed(vec![Ref::Node(2)]),
                },
                QuadFilter {
                    dir: Direction::Object,
                    values: Shape::QuadsAction(Box::new(QuadsAction {
                        result: Direction::Subject,
                        filter: [(Direction::Predicate, Ref::Node(2))].into_iter().collect(),
                        ..Default::default()
                    })),
                },
            ])),
        };
        let mut names = Vec::new();
        s.walk(&mut |s| {
            names.push(match s {
                Shape::NodesFrom { .. } => "NodesFrom",
                Shape::Quads(_) => "Quads",
                Shape::Fixed(_) => "Fixed",
                Shape::QuadsAction(_) => "QuadsAction",
                _ => "other",
            });
            true
        });
        assert_eq!(
            names,
            vec!["NodesFrom", "Quads", "Fixed", "Fixed", "QuadsAction"]
        );
    }

    #[test]
    fn one_shot_takes_once() {
        let it = OneShot::new(Box::new(crate::iterator::Null::new()));
        assert!(it.take().is_some());
        assert!(it.take().is_none());
    }
}
