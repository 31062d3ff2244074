//! Traversal shape constructors
//!
//! Helpers that compose the quad-level shapes behind the path builder:
//! following links in and out, projecting labels and predicates, tagging
//! traversal endpoints, and lifting value filters onto ref streams.

use crate::shape::filters::ValueFilter;
use crate::shape::{QuadFilter, Shape, ValShape};
use tessera_db_core::Direction;

/// Intersect shapes, putting the smaller result set first.
///
/// An `AllNodes` on the left is elided: anything is a subset of it, and
/// keeping it as primary would force a full scan.
pub fn join(shapes: Vec<Shape>) -> Shape {
    if shapes.is_empty() {
        return Shape::Null;
    }
    if matches!(shapes[0], Shape::AllNodes) {
        return join(shapes.into_iter().skip(1).collect());
    }
    if shapes.len() == 1 {
        return shapes.into_iter().next().expect("len checked");
    }
    Shape::Intersect(shapes)
}

fn with_tags(via: Shape, tags: &[String]) -> Shape {
    if tags.is_empty() {
        return via;
    }
    Shape::Save {
        from: Box::new(via),
        tags: tags.to_vec(),
    }
}

fn in_out(
    from: Shape,
    via: Shape,
    label_set: Option<&Shape>,
    tags: &[String],
    reverse: bool,
) -> Shape {
    let (start, goal) = if reverse {
        (Direction::Object, Direction::Subject)
    } else {
        (Direction::Subject, Direction::Object)
    };
    let mut quads = vec![
        QuadFilter {
            dir: start,
            values: from,
        },
        QuadFilter {
            dir: Direction::Predicate,
            values: with_tags(via, tags),
        },
    ];
    if let Some(labels) = label_set {
        quads.push(QuadFilter {
            dir: Direction::Label,
            values: labels.clone(),
        });
    }
    Shape::NodesFrom {
        dir: goal,
        quads: Box::new(Shape::Quads(quads)),
    }
}

/// Nodes reached by following quads forward: `from` as subject, `via` as
/// predicate, yielding objects. The predicate is tagged with `tags`.
pub fn out(from: Shape, via: Shape, label_set: Option<&Shape>, tags: &[String]) -> Shape {
    in_out(from, via, label_set, tags, false)
}

/// Nodes reached by following quads backward: `from` as object, yielding
/// subjects.
pub fn in_(from: Shape, via: Shape, label_set: Option<&Shape>, tags: &[String]) -> Shape {
    in_out(from, via, label_set, tags, true)
}

/// The distinct labels of all quads touching the given nodes.
pub fn labels(from: Shape) -> Shape {
    Shape::Unique(Box::new(Shape::NodesFrom {
        dir: Direction::Label,
        quads: Box::new(Shape::Union(vec![
            Shape::Quads(vec![QuadFilter {
                dir: Direction::Subject,
                values: from.clone(),
            }]),
            Shape::Quads(vec![QuadFilter {
                dir: Direction::Object,
                values: from,
            }]),
        ])),
    }))
}

/// The distinct predicates on links out of (or into, when `in_dir`) the
/// given nodes.
pub fn predicates(from: Shape, in_dir: bool) -> Shape {
    let dir = if in_dir {
        Direction::Object
    } else {
        Direction::Subject
    };
    Shape::Unique(Box::new(Shape::NodesFrom {
        dir: Direction::Predicate,
        quads: Box::new(Shape::Quads(vec![QuadFilter { dir, values: from }])),
    }))
}

/// Tag the predicates on links out of (or into) the nodes without
/// affecting the stream.
pub fn save_predicates(from: Shape, in_dir: bool, tag: &str) -> Shape {
    let dir = if in_dir {
        Direction::Object
    } else {
        Direction::Subject
    };
    let save = Shape::Save {
        from: Box::new(Shape::AllNodes),
        tags: vec![tag.to_string()],
    };
    Shape::IntersectOptional {
        intersect: vec![from],
        optional: vec![Shape::NodesFrom {
            dir,
            quads: Box::new(Shape::Quads(vec![QuadFilter {
                dir: Direction::Predicate,
                values: save,
            }])),
        }],
    }
}

/// Nodes from `from` whose traversal along `via` (reversed when `rev`)
/// under `label_set` reaches the `nodes` set.
pub fn has_labels(
    from: Shape,
    via: Shape,
    nodes: Shape,
    label_set: Option<&Shape>,
    rev: bool,
) -> Shape {
    let (start, goal) = if rev {
        (Direction::Object, Direction::Subject)
    } else {
        (Direction::Subject, Direction::Object)
    };
    let mut quads = Vec::with_capacity(3);
    if !nodes.is_null() {
        quads.push(QuadFilter {
            dir: goal,
            values: nodes,
        });
    }
    quads.push(QuadFilter {
        dir: Direction::Predicate,
        values: via,
    });
    if let Some(labels) = label_set {
        quads.push(QuadFilter {
            dir: Direction::Label,
            values: labels.clone(),
        });
    }
    let has = Shape::NodesFrom {
        dir: start,
        quads: Box::new(Shape::Quads(quads)),
    };
    if from.is_null() || matches!(from, Shape::AllNodes) {
        return has;
    }
    Shape::Intersect(vec![from, has])
}

/// Tag the other endpoint of a traversal without moving the stream.
///
/// `rev` selects direction; `optional` makes the traversal contribute tags
/// only, instead of gating results.
pub fn save_via_labels(
    from: Shape,
    via: Shape,
    label_set: Option<&Shape>,
    tag: &str,
    rev: bool,
    optional: bool,
) -> Shape {
    let (start, goal) = if rev {
        (Direction::Object, Direction::Subject)
    } else {
        (Direction::Subject, Direction::Object)
    };
    let save = Shape::Save {
        from: Box::new(Shape::AllNodes),
        tags: vec![tag.to_string()],
    };
    let mut quads = vec![
        QuadFilter {
            dir: goal,
            values: save,
        },
        QuadFilter {
            dir: Direction::Predicate,
            values: via,
        },
    ];
    if let Some(labels) = label_set {
        quads.push(QuadFilter {
            dir: Direction::Label,
            values: labels.clone(),
        });
    }
    let nodes = Shape::NodesFrom {
        dir: start,
        quads: Box::new(Shape::Quads(quads)),
    };
    if optional {
        return Shape::IntersectOptional {
            intersect: vec![from],
            optional: vec![nodes],
        };
    }
    Shape::Intersect(vec![from, nodes])
}

/// Apply value filters to a ref stream by routing it through the value
/// flavor and back.
pub fn filter_refs(nodes: Shape, filters: Vec<ValueFilter>) -> Shape {
    if filters.is_empty() {
        return nodes;
    }
    if let Shape::ValuesToRefs(values) = nodes {
        return Shape::ValuesToRefs(Box::new(add_filters(*values, filters)));
    }
    Shape::ValuesToRefs(Box::new(add_filters(
        ValShape::RefsToValues(Box::new(nodes)),
        filters,
    )))
}

/// Append filters to a value stream, merging into an existing filter node.
pub fn add_filters(values: ValShape, filters: Vec<ValueFilter>) -> ValShape {
    if filters.is_empty() {
        return values;
    }
    if let ValShape::Filter {
        from,
        filters: mut existing,
    } = values
    {
        existing.extend(filters);
        return ValShape::Filter {
            from,
            filters: existing,
        };
    }
    ValShape::Filter {
        from: Box::new(values),
        filters,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_db_core::Value;

    #[test]
    fn join_elides_leading_all_nodes() {
        let lookup = Shape::Lookup(vec![Value::iri("a")]);
        assert_eq!(
            join(vec![Shape::AllNodes, lookup.clone()]),
            lookup.clone()
        );
        assert_eq!(join(vec![]), Shape::Null);
        assert_eq!(
            join(vec![lookup.clone(), Shape::AllNodes]),
            Shape::Intersect(vec![lookup, Shape::AllNodes])
        );
    }

    #[test]
    fn out_builds_projection_over_quads() {
        let s = out(
            Shape::Lookup(vec![Value::iri("alice")]),
            Shape::Lookup(vec![Value::iri("follows")]),
            None,
            &[],
        );
        let Shape::NodesFrom { dir, quads } = s else {
            panic!("expected NodesFrom, got {s:?}");
        };
        assert_eq!(dir, Direction::Object);
        let Shape::Quads(filters) = *quads else {
            panic!("expected Quads");
        };
        assert_eq!(filters.len(), 2);
        assert_eq!(filters[0].dir, Direction::Subject);
        assert_eq!(filters[1].dir, Direction::Predicate);
    }

    #[test]
    fn label_set_constrains_traversal() {
        let labels = Shape::Lookup(vec![Value::iri("g")]);
        let s = out(
            Shape::AllNodes,
            Shape::AllNodes,
            Some(&labels),
            &[],
        );
        let Shape::NodesFrom { quads, .. } = s else {
            panic!("expected NodesFrom");
        };
        let Shape::Quads(filters) = *quads else {
            panic!("expected Quads");
        };
        assert_eq!(filters.last().unwrap().dir, Direction::Label);
    }

    #[test]
    fn filter_refs_merges_adapter_chains() {
        let f = vec![ValueFilter::Wildcard {
            pattern: "a%".to_string(),
        }];
        let once = filter_refs(Shape::AllNodes, f.clone());
        let twice = filter_refs(once, f);
        let Shape::ValuesToRefs(values) = twice else {
            panic!("expected adapter");
        };
        let ValShape::Filter { filters, .. } = *values else {
            panic!("expected merged filter");
        };
        assert_eq!(filters.len(), 2);
    }
}
