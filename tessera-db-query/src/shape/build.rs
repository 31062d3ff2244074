//! Shape to iterator translation
//!
//! Build is direct: each node constructs the iterator it represents from
//! its children's iterators. Bindable shapes that were never bound build
//! into error iterators carrying the unbound error.

use crate::error::QueryError;
use crate::iterator::recursive::IterMorphism;
use crate::iterator::{
    And, Count, ErrorIterator, ErrorVIterator, Fixed, HasA, Limit, LinksTo, Materialize, Not,
    Null, NullV, Or, Recursive, RefIterator, Save, Skip, Tagger, ToRefs, ToValues,
    VIterator, ValueFilterIterator, ValuesIterator,
};
use crate::shape::filters::CompiledFilter;
use crate::shape::{OneShot, RecursiveShape, Shape, ValShape};
use std::sync::Arc;

fn unbound(what: &'static str) -> Box<dyn RefIterator> {
    Box::new(ErrorIterator::new(QueryError::Unbound(what)))
}

impl Shape {
    /// Construct the iterator tree this shape describes.
    pub fn build_iterator(&self) -> Box<dyn RefIterator> {
        match self {
            Shape::Null => Box::new(Null::new()),
            Shape::AllNodes => unbound("all nodes"),
            Shape::AllQuads => unbound("all quads"),
            Shape::Lookup(_) => unbound("lookup"),
            Shape::Quads(_) => unbound("quads"),
            Shape::ValuesToRefs(_) => unbound("values-to-refs"),
            Shape::Fixed(values) => Box::new(Fixed::new(values.clone())),
            Shape::Union(members) => match members.len() {
                0 => Box::new(Null::new()),
                1 => members[0].build_iterator(),
                _ => Box::new(Or::new(members.iter().map(|m| m.build_iterator()).collect())),
            },
            Shape::Intersect(members) => match members.len() {
                0 => Box::new(Null::new()),
                1 => members[0].build_iterator(),
                _ => Box::new(And::new(
                    members.iter().map(|m| m.build_iterator()).collect(),
                )),
            },
            Shape::IntersectOptional {
                intersect,
                optional,
            } => {
                if optional.is_empty() {
                    return Shape::Intersect(intersect.clone()).build_iterator();
                }
                let subs: Vec<Box<dyn RefIterator>> = if intersect.is_empty() {
                    vec![Box::new(Null::new())]
                } else {
                    intersect.iter().map(|m| m.build_iterator()).collect()
                };
                let mut and = And::new(subs);
                for opt in optional {
                    and.add_optional(opt.build_iterator());
                }
                Box::new(and)
            }
            Shape::Except { from, exclude } => {
                if exclude.is_null() {
                    return from.build_iterator();
                }
                Box::new(Not::new(exclude.build_iterator(), from.build_iterator()))
            }
            Shape::Unique(from) => {
                if from.is_null() {
                    return Box::new(Null::new());
                }
                Box::new(crate::iterator::Unique::new(from.build_iterator()))
            }
            Shape::Page { from, skip, limit } => {
                if from.is_null() {
                    return Box::new(Null::new());
                }
                let mut it = from.build_iterator();
                if *skip > 0 {
                    it = Box::new(Skip::new(it, *skip));
                }
                if *limit > 0 {
                    it = Box::new(Limit::new(it, *limit));
                }
                it
            }
            Shape::Save { from, tags } => {
                if from.is_null() {
                    return Box::new(Null::new());
                }
                let it = from.build_iterator();
                if tags.is_empty() {
                    return it;
                }
                Box::new(Save::new(it, tags.clone()))
            }
            Shape::FixedTags { on, tags } => {
                if on.is_null() {
                    return Box::new(Null::new());
                }
                let mut save = Save::new(on.build_iterator(), Vec::new());
                for (tag, value) in tags {
                    save.add_fixed_tag(tag.clone(), value.clone());
                }
                Box::new(save)
            }
            Shape::Materialize { from, size_hint } => {
                if from.is_null() {
                    return Box::new(Null::new());
                }
                Box::new(Materialize::with_size(from.build_iterator(), *size_hint))
            }
            Shape::NodesFrom { .. } => unbound("nodes-from"),
            Shape::QuadsAction(a) => a.simplify().build_iterator(),
            Shape::Iterator(one_shot) => match one_shot.take() {
                Some(it) => it,
                None => Box::new(ErrorIterator::new(QueryError::IteratorReused)),
            },
            Shape::Recursive(rs) => build_recursive(rs),
            Shape::LinksTo { store, dir, values } => Box::new(LinksTo::new(
                store.clone(),
                values.build_iterator(),
                *dir,
            )),
            Shape::HasA { store, dir, quads } => {
                Box::new(HasA::new(store.clone(), quads.build_iterator(), *dir))
            }
            Shape::ToRefs { store, values } => {
                Box::new(ToRefs::new(store.clone(), values.build_iterator()))
            }
        }
    }
}

fn build_recursive(rs: &RecursiveShape) -> Box<dyn RefIterator> {
    let Some(store) = rs.store.clone() else {
        return unbound("recursive");
    };
    let step = rs.step.clone();
    let morphism: IterMorphism = Arc::new(move |it: Box<dyn RefIterator>| {
        let shape = step.apply_shape(Shape::Iterator(OneShot::new(it)));
        crate::execute::build_iterator(shape, &store.0)
    });
    let mut rec = Recursive::new(rs.base.build_iterator(), morphism, rs.max_depth);
    for tag in &rs.depth_tags {
        rec.add_depth_tag(tag.clone());
    }
    Box::new(rec)
}

impl ValShape {
    /// Construct the value-iterator tree this shape describes.
    pub fn build_iterator(&self) -> Box<dyn VIterator> {
        match self {
            ValShape::Null => Box::new(NullV::new()),
            ValShape::Values(values) => Box::new(ValuesIterator::new(values.clone())),
            ValShape::Count(from) => Box::new(Count::new(from.build_iterator())),
            ValShape::Filter { from, filters } => {
                if from.is_null() {
                    return Box::new(NullV::new());
                }
                let mut it = from.build_iterator();
                for f in filters {
                    match f.compile() {
                        Ok(CompiledFilter::MatchAll) => {}
                        Ok(CompiledFilter::MatchNone) => return Box::new(NullV::new()),
                        Ok(CompiledFilter::Filter(f)) => {
                            it = Box::new(ValueFilterIterator::new(it, f));
                        }
                        Err(e) => return Box::new(ErrorVIterator::new(e)),
                    }
                }
                it
            }
            ValShape::RefsToValues(_) => {
                Box::new(ErrorVIterator::new(QueryError::Unbound("refs-to-values")))
            }
            ValShape::ToValues { store, refs } => {
                Box::new(ToValues::new(store.clone(), refs.build_iterator()))
            }
        }
    }
}
