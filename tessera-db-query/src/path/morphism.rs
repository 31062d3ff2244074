//! Morphisms: single steps of a fluent path
//!
//! A morphism is data, not code: a closed enum whose `apply` folds it onto
//! an incoming shape and whose `reverse` produces the symbolic inverse.
//! Both thread the traversal context: applying a label context narrows it,
//! and reversing one restores whatever was active before it. `Labels` and
//! `Predicates` have no inverse; reversing them is an explicit error,
//! never a silent identity.

use crate::error::QueryError;
use crate::path::{Path, PathContext, Via};
use crate::shape::traverse;
use crate::shape::{OneShot, RecursiveShape, Shape, ValShape, ValueFilter};
use tessera_db_core::{Ref, Value};

/// One step in a path.
#[derive(Clone, Debug, PartialEq)]
pub enum Morphism {
    /// Constrain the stream to the given values; empty is a passthrough.
    Is(Vec<Value>),
    /// Constrain the stream to pre-resolved refs; empty is a passthrough.
    IsNode(Vec<Ref>),
    /// Apply value filters to the stream.
    Filters(Vec<ValueFilter>),
    /// Keep nodes whose traversal along `via` reaches the `nodes` shape.
    HasShape {
        via: Via,
        rev: bool,
        nodes: Box<Shape>,
    },
    /// Tag the current stream.
    Tag(Vec<String>),
    /// Follow quads forward via predicates.
    Out { via: Via, tags: Vec<String> },
    /// Follow quads backward via predicates.
    In { via: Via, tags: Vec<String> },
    /// Follow quads both ways.
    Both { via: Via, tags: Vec<String> },
    /// Constrain subsequent traversals to the given label set; `None`
    /// clears it. Carries the computed shape so reversal can re-establish
    /// any previously active context.
    LabelContext { label_set: Option<Shape> },
    /// Project to the distinct labels of the incoming nodes.
    Labels,
    /// Project to the distinct predicates of the incoming nodes.
    Predicates { in_dir: bool },
    /// Tag predicates without affecting the stream.
    SavePredicates { in_dir: bool, tag: String },
    /// Intersect with an externally supplied, one-shot iterator.
    Iterator(OneShot),
    /// Intersect with another path.
    And(Path),
    /// Union with another path.
    Or(Path),
    /// Apply another path's steps from the current position.
    Follow(Path),
    /// Transitively apply a path up to a depth.
    FollowRecursive {
        path: Path,
        max_depth: i32,
        depth_tags: Vec<String>,
    },
    /// Remove another path's results from the stream.
    Except(Path),
    /// Deduplicate the stream.
    Unique,
    /// Tag the far endpoint of a traversal without moving the stream.
    SaveVia {
        via: Via,
        tag: String,
        rev: bool,
        optional: bool,
    },
    /// Discard the first N results.
    Skip(i64),
    /// Cap results at N.
    Limit(i64),
    /// Collapse the stream to its cardinality.
    Count,
}

impl Morphism {
    /// Fold this step onto an incoming shape under the traversal context.
    pub(crate) fn apply(&self, input: Shape, ctx: &mut PathContext) -> Shape {
        match self {
            Morphism::Is(values) => {
                if values.is_empty() {
                    return input;
                }
                let lookup = Shape::Lookup(values.clone());
                if matches!(input, Shape::AllNodes) {
                    return lookup;
                }
                // fixed sets are small; they lead the and-join
                traverse::join(vec![lookup, input])
            }
            Morphism::IsNode(refs) => {
                if refs.is_empty() {
                    return input;
                }
                traverse::join(vec![Shape::Fixed(refs.clone()), input])
            }
            Morphism::Filters(filters) => traverse::filter_refs(input, filters.clone()),
            Morphism::HasShape { via, rev, nodes } => traverse::has_labels(
                input,
                via.shape(),
                (**nodes).clone(),
                ctx.label_set.as_ref(),
                *rev,
            ),
            Morphism::Tag(tags) => Shape::Save {
                from: Box::new(input),
                tags: tags.clone(),
            },
            Morphism::Out { via, tags } => {
                traverse::out(input, via.shape(), ctx.label_set.as_ref(), tags)
            }
            Morphism::In { via, tags } => {
                traverse::in_(input, via.shape(), ctx.label_set.as_ref(), tags)
            }
            Morphism::Both { via, tags } => {
                let via = via.shape();
                Shape::Union(vec![
                    traverse::in_(input.clone(), via.clone(), ctx.label_set.as_ref(), tags),
                    traverse::out(input, via, ctx.label_set.as_ref(), tags),
                ])
            }
            Morphism::LabelContext { label_set } => {
                ctx.label_set = label_set.clone();
                input
            }
            Morphism::Labels => traverse::labels(input),
            Morphism::Predicates { in_dir } => traverse::predicates(input, *in_dir),
            Morphism::SavePredicates { in_dir, tag } => {
                traverse::save_predicates(input, *in_dir, tag)
            }
            Morphism::Iterator(one_shot) => {
                traverse::join(vec![Shape::Iterator(one_shot.clone()), input])
            }
            Morphism::And(p) => traverse::join(vec![input, p.apply_shape(Shape::AllNodes)]),
            Morphism::Or(p) => Shape::Union(vec![input, p.apply_shape(Shape::AllNodes)]),
            Morphism::Follow(p) => p.apply_shape(input),
            Morphism::FollowRecursive {
                path,
                max_depth,
                depth_tags,
            } => Shape::Recursive(Box::new(RecursiveShape {
                base: input,
                step: path.clone(),
                max_depth: *max_depth,
                depth_tags: depth_tags.clone(),
                store: None,
            })),
            Morphism::Except(p) => traverse::join(vec![
                input,
                Shape::Except {
                    from: Box::new(Shape::AllNodes),
                    exclude: Box::new(p.apply_shape(Shape::AllNodes)),
                },
            ]),
            Morphism::Unique => Shape::Unique(Box::new(input)),
            Morphism::SaveVia {
                via,
                tag,
                rev,
                optional,
            } => {
                // only the plain save honors the label context
                let labels = if !*rev && !*optional {
                    ctx.label_set.as_ref()
                } else {
                    None
                };
                traverse::save_via_labels(input, via.shape(), labels, tag, *rev, *optional)
            }
            Morphism::Skip(n) => {
                if *n == 0 {
                    return input;
                }
                Shape::Page {
                    from: Box::new(input),
                    skip: *n,
                    limit: 0,
                }
            }
            Morphism::Limit(n) => {
                if *n <= 0 {
                    return input;
                }
                Shape::Page {
                    from: Box::new(input),
                    skip: 0,
                    limit: *n,
                }
            }
            Morphism::Count => Shape::ValuesToRefs(Box::new(ValShape::Count(Box::new(input)))),
        }
    }

    /// The symbolic inverse of this step.
    ///
    /// `ctx` must hold the traversal context that was active before this
    /// step originally ran. Reversing a label context is context-swapping,
    /// not identity: the returned step re-establishes that prior label
    /// set, and `ctx` advances past this step the same way `apply` would.
    pub(crate) fn reverse(&self, ctx: &mut PathContext) -> Result<Morphism, QueryError> {
        match self {
            Morphism::Out { via, tags } => Ok(Morphism::In {
                via: via.clone(),
                tags: tags.clone(),
            }),
            Morphism::In { via, tags } => Ok(Morphism::Out {
                via: via.clone(),
                tags: tags.clone(),
            }),
            Morphism::Follow(p) => Ok(Morphism::Follow(p.reverse()?)),
            Morphism::FollowRecursive {
                path,
                max_depth,
                depth_tags,
            } => Ok(Morphism::FollowRecursive {
                path: path.reverse()?,
                max_depth: *max_depth,
                depth_tags: depth_tags.clone(),
            }),
            Morphism::LabelContext { label_set } => {
                let restored = std::mem::replace(&mut ctx.label_set, label_set.clone());
                Ok(Morphism::LabelContext {
                    label_set: restored,
                })
            }
            Morphism::Labels => Err(QueryError::UnsupportedReversal("labels")),
            Morphism::Predicates { .. } => Err(QueryError::UnsupportedReversal("predicates")),
            other => Ok(other.clone()),
        }
    }

    /// Advance the traversal context past this step without building any
    /// shapes. Only label contexts change it.
    pub(crate) fn update_context(&self, ctx: &mut PathContext) {
        if let Morphism::LabelContext { label_set } = self {
            ctx.label_set = label_set.clone();
        }
    }

    /// Whether this step is a plain tag, for `back` resolution.
    pub(crate) fn is_tag(&self) -> bool {
        matches!(self, Morphism::Tag(_))
    }

    pub(crate) fn tag_names(&self) -> &[String] {
        match self {
            Morphism::Tag(tags) => tags,
            _ => &[],
        }
    }
}
