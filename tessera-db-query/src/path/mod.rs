//! Fluent path builder
//!
//! A `Path` is a sequence of morphisms plus a traversal context. Building
//! is cheap and store-agnostic: the path compiles to a shape tree by
//! left-folding its morphisms from a seed (`AllNodes`, or the start
//! values). Iteration then goes shape → optimize → bind → iterator.
//!
//! Builder mistakes that only surface later (reversing an irreversible
//! step, reusing a one-shot iterator inside a sub-path) are recorded on the
//! path and surfaced when the shape is requested or iterated.

pub mod morphism;

pub use morphism::Morphism;

use crate::context::ExecutionContext;
use crate::error::QueryError;
use crate::execute::IterateChain;
use crate::iterator::{ErrorIterator, RefIterator};
use crate::shape::{CmpOperator, OneShot, Shape, ValueFilter};
use crate::store::QuadStore;
use regex::Regex;
use std::sync::Arc;
use tessera_db_core::{Ref, Value};

/// Traversal context threaded through morphism application.
///
/// Carries only the active label set constraining traversals to a named
/// graph. Cloned at the start of every application, so a path can be
/// applied many times.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PathContext {
    pub label_set: Option<Shape>,
}

/// The polymorphic `via` argument of traversal steps: all predicates, a
/// set of predicate values, or a sub-path.
#[derive(Clone, Debug, PartialEq)]
pub enum Via {
    All,
    Values(Vec<Value>),
    Path(Box<Path>),
}

impl Via {
    pub(crate) fn shape(&self) -> Shape {
        match self {
            Via::All => Shape::AllNodes,
            Via::Values(values) => Shape::Lookup(values.clone()),
            Via::Path(p) => p.apply_shape(Shape::AllNodes),
        }
    }

    fn err(&self) -> Option<QueryError> {
        match self {
            Via::Path(p) => p.err.clone(),
            _ => None,
        }
    }
}

impl From<()> for Via {
    fn from(_: ()) -> Self {
        Via::All
    }
}

impl From<Value> for Via {
    fn from(v: Value) -> Self {
        Via::Values(vec![v])
    }
}

impl From<Vec<Value>> for Via {
    fn from(v: Vec<Value>) -> Self {
        Via::Values(v)
    }
}

impl From<Path> for Via {
    fn from(p: Path) -> Self {
        Via::Path(Box::new(p))
    }
}

/// A composable query path.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Path {
    stack: Vec<Morphism>,
    base_context: PathContext,
    err: Option<QueryError>,
}

impl Path {
    /// Path starting from the given values; empty means all nodes.
    pub fn start(nodes: impl IntoIterator<Item = Value>) -> Path {
        Path::default().with(Morphism::Is(nodes.into_iter().collect()))
    }

    /// Path with no seed, usable as a morphism for `follow`.
    pub fn start_morphism() -> Path {
        Path::default()
    }

    fn with(mut self, m: Morphism) -> Path {
        self.stack.push(m);
        self
    }

    fn record(&mut self, err: Option<QueryError>) {
        if self.err.is_none() {
            self.err = err;
        }
    }

    fn absorb(&mut self, p: &Path) {
        self.record(p.err.clone());
    }

    fn with_via(mut self, via: Via, f: impl FnOnce(Via) -> Morphism) -> Path {
        self.record(via.err());
        self.with(f(via))
    }

    /// The deferred builder error, if any step was invalid.
    pub fn error(&self) -> Option<&QueryError> {
        self.err.as_ref()
    }

    // --- constraining ---

    /// Keep only the given values; empty is a passthrough.
    pub fn is(self, nodes: impl IntoIterator<Item = Value>) -> Path {
        self.with(Morphism::Is(nodes.into_iter().collect()))
    }

    /// Keep only the given pre-resolved refs.
    pub fn is_node(self, refs: impl IntoIterator<Item = Ref>) -> Path {
        self.with(Morphism::IsNode(refs.into_iter().collect()))
    }

    /// Apply a single comparison filter.
    pub fn filter(self, op: CmpOperator, value: Value) -> Path {
        self.filters(vec![ValueFilter::Comparison { op, value }])
    }

    /// Apply value filters.
    pub fn filters(self, filters: Vec<ValueFilter>) -> Path {
        self.with(Morphism::Filters(filters))
    }

    /// Keep values matching the regexp. Matches only string-ish values.
    pub fn regex(self, re: Regex) -> Path {
        self.filters(vec![ValueFilter::Regexp { re, refs: false }])
    }

    /// Keep values matching the regexp, including IRIs and blank nodes.
    pub fn regex_with_refs(self, re: Regex) -> Path {
        self.filters(vec![ValueFilter::Regexp { re, refs: true }])
    }

    /// Keep nodes that reach one of `nodes` via the predicate.
    pub fn has(self, via: impl Into<Via>, nodes: impl IntoIterator<Item = Value>) -> Path {
        self.has_via(via.into(), false, nodes.into_iter().collect())
    }

    /// Keep nodes reached from one of `nodes` via the predicate.
    pub fn has_reverse(self, via: impl Into<Via>, nodes: impl IntoIterator<Item = Value>) -> Path {
        self.has_via(via.into(), true, nodes.into_iter().collect())
    }

    fn has_via(self, via: Via, rev: bool, nodes: Vec<Value>) -> Path {
        let shape = if nodes.is_empty() {
            Shape::AllNodes
        } else {
            Shape::Lookup(nodes)
        };
        self.has_shape(via, rev, shape)
    }

    /// Keep nodes whose traversal along `via` reaches the shape.
    pub fn has_shape(self, via: impl Into<Via>, rev: bool, nodes: Shape) -> Path {
        self.with_via(via.into(), |via| Morphism::HasShape {
            via,
            rev,
            nodes: Box::new(nodes),
        })
    }

    /// Keep nodes with a link whose far endpoint passes the filters.
    pub fn has_filter(self, via: impl Into<Via>, rev: bool, filters: Vec<ValueFilter>) -> Path {
        let nodes = crate::shape::traverse::filter_refs(Shape::AllNodes, filters);
        self.has_shape(via, rev, nodes)
    }

    // --- tagging ---

    /// Tag the current position.
    pub fn tag(self, tags: &[&str]) -> Path {
        self.with(Morphism::Tag(tags.iter().map(|t| t.to_string()).collect()))
    }

    /// Return to the position marked by `tag`, reversing the intervening
    /// steps and intersecting them back in.
    ///
    /// The reversed tail starts where the full path ended, label context
    /// included, so reversed traversals stay scoped to the graph they
    /// originally ran under.
    pub fn back(mut self, tag: &str) -> Path {
        let (mut priors, end) = self.context_trace();
        let mut reversed = Path::start_morphism();
        reversed.base_context = end;
        let mut i = self.stack.len();
        while i > 0 {
            i -= 1;
            let m = &self.stack[i];
            if m.is_tag() && m.tag_names().iter().any(|t| t == tag) {
                self.stack.truncate(i + 1);
                return self.and(reversed);
            }
            match m.reverse(&mut priors[i]) {
                Ok(rm) => reversed.stack.push(rm),
                Err(e) => {
                    self.record(Some(e));
                    return self;
                }
            }
        }
        // tag not found; leave the path unchanged
        self
    }

    /// Tag the node reached via the predicate, keeping the stream in place.
    pub fn save(self, via: impl Into<Via>, tag: &str) -> Path {
        self.save_via(via.into(), tag, false, false)
    }

    /// As `save`, traversing backward.
    pub fn save_reverse(self, via: impl Into<Via>, tag: &str) -> Path {
        self.save_via(via.into(), tag, true, false)
    }

    /// As `save`, but nodes without the link are kept untagged.
    pub fn save_optional(self, via: impl Into<Via>, tag: &str) -> Path {
        self.save_via(via.into(), tag, false, true)
    }

    /// As `save_optional`, traversing backward.
    pub fn save_optional_reverse(self, via: impl Into<Via>, tag: &str) -> Path {
        self.save_via(via.into(), tag, true, true)
    }

    fn save_via(self, via: Via, tag: &str, rev: bool, optional: bool) -> Path {
        let tag = tag.to_string();
        self.with_via(via, |via| Morphism::SaveVia {
            via,
            tag,
            rev,
            optional,
        })
    }

    /// Tag the predicates out of (or into) the current nodes without
    /// affecting the stream.
    pub fn save_predicates(self, in_dir: bool, tag: &str) -> Path {
        self.with(Morphism::SavePredicates {
            in_dir,
            tag: tag.to_string(),
        })
    }

    // --- traversal ---

    /// Follow quads forward via the predicate(s).
    pub fn out(self, via: impl Into<Via>) -> Path {
        self.out_with_tags(via, &[])
    }

    /// Follow forward, tagging the predicate of each followed quad.
    pub fn out_with_tags(self, via: impl Into<Via>, tags: &[&str]) -> Path {
        let tags = tags.iter().map(|t| t.to_string()).collect();
        self.with_via(via.into(), |via| Morphism::Out { via, tags })
    }

    /// Follow quads backward via the predicate(s).
    pub fn in_(self, via: impl Into<Via>) -> Path {
        self.in_with_tags(via, &[])
    }

    /// Follow backward, tagging the predicate of each followed quad.
    pub fn in_with_tags(self, via: impl Into<Via>, tags: &[&str]) -> Path {
        let tags = tags.iter().map(|t| t.to_string()).collect();
        self.with_via(via.into(), |via| Morphism::In { via, tags })
    }

    /// Follow quads in both directions.
    pub fn both(self, via: impl Into<Via>) -> Path {
        self.both_with_tags(via, &[])
    }

    pub fn both_with_tags(self, via: impl Into<Via>, tags: &[&str]) -> Path {
        let tags = tags.iter().map(|t| t.to_string()).collect();
        self.with_via(via.into(), |via| Morphism::Both { via, tags })
    }

    /// Constrain subsequent traversals to the given named graph(s).
    pub fn label_context(self, via: impl Into<Via>) -> Path {
        self.label_context_with_tags(via, &[])
    }

    pub fn label_context_with_tags(mut self, via: impl Into<Via>, tags: &[&str]) -> Path {
        let via = via.into();
        self.record(via.err());
        let shape = via.shape();
        let label_set = if tags.is_empty() {
            shape
        } else {
            Shape::Save {
                from: Box::new(shape),
                tags: tags.iter().map(|t| t.to_string()).collect(),
            }
        };
        self.with(Morphism::LabelContext {
            label_set: Some(label_set),
        })
    }

    /// Clear the label context.
    pub fn clear_label_context(self) -> Path {
        self.with(Morphism::LabelContext { label_set: None })
    }

    /// Project to the distinct labels of the current nodes.
    ///
    /// This projection has no inverse; `back` across it is an error.
    pub fn labels(self) -> Path {
        self.with(Morphism::Labels)
    }

    /// Project to the distinct predicates on incoming links.
    pub fn in_predicates(self) -> Path {
        self.with(Morphism::Predicates { in_dir: true })
    }

    /// Project to the distinct predicates on outgoing links.
    pub fn out_predicates(self) -> Path {
        self.with(Morphism::Predicates { in_dir: false })
    }

    // --- composition ---

    /// Intersect with another path.
    pub fn and(mut self, p: Path) -> Path {
        self.absorb(&p);
        self.with(Morphism::And(p))
    }

    /// Union with another path.
    pub fn or(mut self, p: Path) -> Path {
        self.absorb(&p);
        self.with(Morphism::Or(p))
    }

    /// Remove another path's results.
    pub fn except(mut self, p: Path) -> Path {
        self.absorb(&p);
        self.with(Morphism::Except(p))
    }

    /// Deduplicate the stream.
    pub fn unique(self) -> Path {
        self.with(Morphism::Unique)
    }

    /// Apply another path's steps from the current position.
    pub fn follow(mut self, p: Path) -> Path {
        self.absorb(&p);
        self.with(Morphism::Follow(p))
    }

    /// Apply another path's steps in reverse.
    pub fn follow_reverse(mut self, p: &Path) -> Path {
        self.absorb(p);
        match p.reverse() {
            Ok(rev) => self.with(Morphism::Follow(rev)),
            Err(e) => {
                self.record(Some(e));
                self
            }
        }
    }

    /// Transitively follow a predicate or sub-path, breadth-first, up to
    /// `max_depth` steps (zero means the engine default).
    pub fn follow_recursive(
        mut self,
        via: impl Into<Via>,
        max_depth: i32,
        depth_tags: &[&str],
    ) -> Path {
        let via = via.into();
        self.record(via.err());
        let path = match via {
            Via::Path(p) => *p,
            other => Path::start_morphism().out(other),
        };
        let depth_tags = depth_tags.iter().map(|t| t.to_string()).collect();
        self.with(Morphism::FollowRecursive {
            path,
            max_depth,
            depth_tags,
        })
    }

    /// Intersect with an externally supplied iterator. The iterator can
    /// participate in exactly one evaluation; reuse is an error.
    pub fn iterator(self, it: Box<dyn RefIterator>) -> Path {
        self.with(Morphism::Iterator(OneShot::new(it)))
    }

    // --- windowing ---

    /// Discard the first `n` results; zero is a passthrough.
    pub fn skip(self, n: i64) -> Path {
        self.with(Morphism::Skip(n))
    }

    /// Cap results at `n`; zero or less is a passthrough.
    pub fn limit(self, n: i64) -> Path {
        self.with(Morphism::Limit(n))
    }

    /// Collapse the stream to its cardinality.
    pub fn count(self) -> Path {
        self.with(Morphism::Count)
    }

    // --- compilation ---

    /// The traversal context active before each step, plus the context
    /// the path ends in.
    fn context_trace(&self) -> (Vec<PathContext>, PathContext) {
        let mut priors = Vec::with_capacity(self.stack.len());
        let mut ctx = self.base_context.clone();
        for m in &self.stack {
            priors.push(ctx.clone());
            m.update_context(&mut ctx);
        }
        (priors, ctx)
    }

    /// The reversed path: every step inverted, in reverse order.
    ///
    /// Each step is reversed under the context it originally ran in: the
    /// reversed path is seeded with the context the original ended in,
    /// and a reversed label-context step restores the previously active
    /// label set.
    pub fn reverse(&self) -> Result<Path, QueryError> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        let (mut priors, end) = self.context_trace();
        let mut stack = Vec::with_capacity(self.stack.len());
        for (m, prior) in self.stack.iter().zip(priors.iter_mut()).rev() {
            stack.push(m.reverse(prior)?);
        }
        Ok(Path {
            stack,
            base_context: end,
            err: None,
        })
    }

    /// Compile the path to a shape tree seeded with all nodes.
    pub fn shape(&self) -> Result<Shape, QueryError> {
        self.shape_from(Shape::AllNodes)
    }

    /// Compile the path to a shape tree seeded with `from`.
    pub fn shape_from(&self, from: Shape) -> Result<Shape, QueryError> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        Ok(self.apply_shape(from))
    }

    /// Left-fold the morphisms onto a seed shape.
    pub(crate) fn apply_shape(&self, from: Shape) -> Shape {
        let mut ctx = self.base_context.clone();
        let mut shape = from;
        for m in &self.stack {
            shape = m.apply(shape, &mut ctx);
        }
        shape
    }

    /// Compile, optimize, bind and build, returning a driver for the
    /// results.
    pub fn iterate<'a>(
        &self,
        ctx: &'a ExecutionContext,
        store: &Arc<dyn QuadStore>,
    ) -> IterateChain<'a> {
        match self.shape() {
            Ok(shape) => {
                let it = crate::execute::build_iterator(shape, store);
                IterateChain::new(ctx, it).on(store.clone())
            }
            Err(e) => IterateChain::new(ctx, Box::new(ErrorIterator::new(e))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::ValShape;
    use tessera_db_core::Direction;

    fn iri(s: &str) -> Value {
        Value::iri(s)
    }

    #[test]
    fn start_seeds_a_lookup() {
        let s = Path::start(vec![iri("alice")]).shape().unwrap();
        assert_eq!(s, Shape::Lookup(vec![iri("alice")]));
    }

    #[test]
    fn empty_start_is_all_nodes() {
        let s = Path::start(vec![]).shape().unwrap();
        assert_eq!(s, Shape::AllNodes);
    }

    #[test]
    fn out_compiles_to_projection() {
        let s = Path::start(vec![iri("alice")])
            .out(iri("follows"))
            .shape()
            .unwrap();
        let Shape::NodesFrom { dir, .. } = s else {
            panic!("expected NodesFrom, got {s:?}");
        };
        assert_eq!(dir, Direction::Object);
    }

    #[test]
    fn reversal_swaps_out_and_in() {
        let p = Path::start_morphism().out(iri("follows")).out(iri("status"));
        let r = p.reverse().unwrap();
        let s = r.shape_from(Shape::Lookup(vec![iri("x")])).unwrap();
        // both reversed steps are In-projections onto Subject
        let Shape::NodesFrom { dir, .. } = s else {
            panic!("expected NodesFrom, got {s:?}");
        };
        assert_eq!(dir, Direction::Subject);
    }

    #[test]
    fn labels_reversal_is_an_error() {
        let p = Path::start_morphism().labels();
        assert!(matches!(
            p.reverse(),
            Err(QueryError::UnsupportedReversal("labels"))
        ));
    }

    #[test]
    fn back_across_labels_records_the_error() {
        let p = Path::start(vec![iri("a")])
            .tag(&["t"])
            .labels()
            .back("t");
        assert!(matches!(
            p.error(),
            Some(QueryError::UnsupportedReversal("labels"))
        ));
        assert!(p.shape().is_err());
    }

    #[test]
    fn back_reverses_the_tail() {
        // follow out, constrain, then come back to the tagged position
        let p = Path::start(vec![iri("bob")])
            .tag(&["foo"])
            .out(iri("status"))
            .is(vec![iri("cool")])
            .back("foo");
        let s = p.shape().unwrap();
        // the tail beyond the tag became an And over the reversed steps
        let Shape::Intersect(_) = s else {
            panic!("expected Intersect at root, got {s:?}");
        };
    }

    #[test]
    fn count_routes_through_value_shape() {
        let s = Path::start(vec![]).count().shape().unwrap();
        assert_eq!(
            s,
            Shape::ValuesToRefs(Box::new(ValShape::Count(Box::new(Shape::AllNodes))))
        );
    }

    #[test]
    fn label_context_scopes_traversals() {
        let s = Path::start(vec![iri("greg")])
            .label_context(iri("smart_graph"))
            .out(iri("status"))
            .shape()
            .unwrap();
        let Shape::NodesFrom { quads, .. } = s else {
            panic!("expected NodesFrom, got {s:?}");
        };
        let Shape::Quads(filters) = *quads else {
            panic!("expected Quads");
        };
        assert!(filters.iter().any(|f| f.dir == Direction::Label));
    }

    #[test]
    fn skip_and_limit_zero_are_passthrough() {
        let base = Path::start(vec![iri("a")]).shape().unwrap();
        assert_eq!(Path::start(vec![iri("a")]).skip(0).shape().unwrap(), base);
        assert_eq!(Path::start(vec![iri("a")]).limit(0).shape().unwrap(), base);
        assert_eq!(Path::start(vec![iri("a")]).limit(-1).shape().unwrap(), base);
    }
}
