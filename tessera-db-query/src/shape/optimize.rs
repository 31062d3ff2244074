//! Structural shape rewrites
//!
//! `optimize` recurses into children first, then applies local rules at the
//! current node. Without an `Optimizer` the generic rules run: constant
//! folding, flattening, fixed merging and ordering, tag hoisting, quad
//! fusion and push-down, page and filter merging. With an `Optimizer`
//! (the binder or a store adapter) the local rules step aside and the
//! rewriter gets the node after its children were processed.
//!
//! Optimization is pure and never fails: unrecognized input is returned
//! unchanged. The pipeline (`execute::optimize`) repeats passes until a
//! fixpoint, comparing trees for equality rather than trusting the changed
//! flags, so each pass only has to make progress, not be exact about it.

use crate::shape::{
    clear_fixed_tags, Optimizer, QuadFilter, QuadsAction, Shape, TagBindings, ValShape,
};
use tessera_db_core::{Direction, Ref, Value};

impl Shape {
    /// One optimization pass. Returns the rewritten shape and whether it was
    /// replaced.
    pub fn optimize(self, r: Option<&dyn Optimizer>) -> (Shape, bool) {
        match self {
            Shape::Null => (Shape::Null, false),
            Shape::Fixed(v) => {
                if v.is_empty() {
                    return (Shape::Null, true);
                }
                hook(Shape::Fixed(v), false, r)
            }
            Shape::Lookup(v) => {
                if v.is_empty() {
                    return (Shape::Null, true);
                }
                hook(Shape::Lookup(v), false, r)
            }
            Shape::AllNodes => hook(Shape::AllNodes, false, r),
            Shape::AllQuads => hook(Shape::AllQuads, false, r),
            Shape::Iterator(it) => (Shape::Iterator(it), false),
            Shape::Union(members) => optimize_union(members, r),
            Shape::Intersect(members) => optimize_intersect(members, r),
            Shape::IntersectOptional {
                intersect,
                optional,
            } => optimize_intersect_optional(intersect, optional, r),
            Shape::Except { from, exclude } => optimize_except(*from, *exclude, r),
            Shape::Unique(from) => {
                if from.is_null() {
                    return (Shape::Null, true);
                }
                let (from, opt) = from.optimize(r);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                hook(Shape::Unique(Box::new(from)), opt, r)
            }
            Shape::Page { from, skip, limit } => optimize_page(*from, skip, limit, r),
            Shape::Save { from, tags } => optimize_save(*from, tags, r),
            Shape::FixedTags { on, tags } => optimize_fixed_tags(*on, tags, r),
            Shape::Materialize { from, size_hint } => {
                if from.is_null() {
                    return (Shape::Null, true);
                }
                let (from, opt) = from.optimize(r);
                if from.is_null() {
                    return (Shape::Null, true);
                }
                hook(
                    Shape::Materialize {
                        from: Box::new(from),
                        size_hint,
                    },
                    opt,
                    r,
                )
            }
            Shape::Quads(filters) => optimize_quads(filters, r),
            Shape::NodesFrom { dir, quads } => optimize_nodes_from(dir, *quads, r),
            Shape::QuadsAction(a) => optimize_quads_action(*a, r),
            Shape::ValuesToRefs(vs) => {
                let (vs, opt) = vs.optimize(r);
                if vs.is_null() {
                    return (Shape::Null, true);
                }
                hook(Shape::ValuesToRefs(Box::new(vs)), opt, r)
            }
            Shape::Recursive(mut rs) => {
                let (base, opt) = rs.base.optimize(r);
                if base.is_null() {
                    return (Shape::Null, true);
                }
                rs.base = base;
                hook(Shape::Recursive(rs), opt, r)
            }
            Shape::LinksTo { store, dir, values } => {
                let (values, opt) = values.optimize(r);
                if values.is_null() {
                    return (Shape::Null, true);
                }
                hook(
                    Shape::LinksTo {
                        store,
                        dir,
                        values: Box::new(values),
                    },
                    opt,
                    r,
                )
            }
            Shape::HasA { store, dir, quads } => {
                let (quads, opt) = quads.optimize(r);
                if quads.is_null() {
                    return (Shape::Null, true);
                }
                hook(
                    Shape::HasA {
                        store,
                        dir,
                        quads: Box::new(quads),
                    },
                    opt,
                    r,
                )
            }
            Shape::ToRefs { store, values } => {
                let (values, opt) = values.optimize(r);
                if values.is_null() {
                    return (Shape::Null, true);
                }
                hook(
                    Shape::ToRefs {
                        store,
                        values: Box::new(values),
                    },
                    opt,
                    r,
                )
            }
        }
    }
}

/// Hand the shape to the rewriter, if one is present.
fn hook(s: Shape, opt: bool, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    match r {
        Some(r) => {
            let (ns, nopt) = r.optimize_shape(s);
            (ns, opt || nopt)
        }
        None => (s, opt),
    }
}

fn optimize_union(members: Vec<Shape>, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    let mut opt = false;
    let mut members: Vec<Shape> = members
        .into_iter()
        .map(|c| {
            let (c, copt) = c.optimize(r);
            opt |= copt;
            c
        })
        .collect();
    if let Some(r) = r {
        let (ns, nopt) = r.optimize_shape(Shape::Union(members));
        return (ns, opt || nopt);
    }
    let (stripped, tags) = clear_fixed_tags(members);
    members = stripped;
    if let Some(tags) = tags {
        let (ns, _) = Shape::FixedTags {
            on: Box::new(Shape::Union(members)),
            tags,
        }
        .optimize(r);
        return (ns, true);
    }
    // splice nested unions
    if members.iter().any(|c| matches!(c, Shape::Union(_))) {
        opt = true;
        members = members
            .into_iter()
            .flat_map(|c| match c {
                Shape::Union(inner) => inner,
                other => vec![other],
            })
            .collect();
    }
    // drop empty members
    let before = members.len();
    members.retain(|c| !c.is_null());
    opt |= members.len() != before;
    match members.len() {
        0 => (Shape::Null, true),
        1 => (members.pop().expect("len checked"), true),
        _ => (Shape::Union(members), opt),
    }
}

fn optimize_intersect(members: Vec<Shape>, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    if members.is_empty() {
        return (Shape::Null, true);
    }
    let mut opt = false;
    let mut optimized = Vec::with_capacity(members.len());
    for c in members {
        if c.is_null() {
            return (Shape::Null, true);
        }
        let (c, copt) = c.optimize(r);
        opt |= copt;
        if c.is_null() {
            return (Shape::Null, true);
        }
        optimized.push(c);
    }
    if let Some(r) = r {
        let (ns, nopt) = r.optimize_shape(Shape::Intersect(optimized));
        return (ns, opt || nopt);
    }
    let (stripped, tags) = clear_fixed_tags(optimized);
    if let Some(tags) = tags {
        let (ns, _) = Shape::FixedTags {
            on: Box::new(Shape::Intersect(stripped)),
            tags,
        }
        .optimize(r);
        return (ns, true);
    }

    // second pass: remove AllNodes, merge Quads and nested intersects,
    // collect Fixed sets, hoist Save tags outward
    let mut only_all = true;
    let mut fixed: Vec<Vec<Ref>> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    let mut quads: Vec<QuadFilter> = Vec::new();
    let mut had_quads = false;
    let mut rest: Vec<Shape> = Vec::new();
    let mut queue: std::collections::VecDeque<Shape> = stripped.into();
    while let Some(c) = queue.pop_front() {
        match c {
            Shape::AllNodes => {
                opt = true;
                continue; // useless inside an intersection
            }
            Shape::Quads(q) => {
                if had_quads {
                    opt = true;
                }
                had_quads = true;
                quads.extend(q);
            }
            Shape::Fixed(f) => {
                opt = true;
                fixed.push(f);
            }
            Shape::Intersect(inner) => {
                opt = true;
                for c in inner.into_iter().rev() {
                    queue.push_front(c);
                }
            }
            Shape::Save { from, tags: t } => {
                opt = true;
                tags.extend(t);
                queue.push_front(*from);
            }
            other => rest.push(other),
        }
        only_all = false;
    }
    if only_all {
        return (Shape::AllNodes, true);
    }

    // tags hoisted out of members wrap the final result
    let finish = |sout: Shape, opt: bool, r: Option<&dyn Optimizer>| -> (Shape, bool) {
        if tags.is_empty() || sout.is_null() {
            return (sout, opt);
        }
        let (ns, _) = Shape::Save {
            from: Box::new(sout),
            tags: tags.clone(),
        }
        .optimize(r);
        (ns, true)
    };

    if had_quads {
        let (nq, qopt) = Shape::Quads(quads).optimize(r);
        if nq.is_null() {
            return (Shape::Null, true);
        }
        opt |= qopt;
        rest.push(nq);
    }

    if fixed.len() == 1 {
        let fix = fixed.pop().expect("len checked");
        if rest.len() == 1 {
            // try to push the fixed set down the quad tree
            match rest.pop().expect("len checked") {
                Shape::QuadsAction(mut a) if fix.len() == 1 => {
                    let fv = fix[0].clone();
                    if let Some(v) = a.filter.get(&a.result) {
                        // the result direction already has a constraint
                        if *v != fv {
                            return (Shape::Null, true);
                        }
                        return finish(Shape::QuadsAction(a), true, r);
                    }
                    let result = a.result;
                    a.set_filter(result, fv);
                    a.size = 0; // size needs recomputing
                    let (ns, _) = Shape::QuadsAction(a).optimize(r);
                    return finish(ns, true, r);
                }
                Shape::NodesFrom { dir, quads } if matches!(*quads, Shape::Quads(_)) => {
                    let Shape::Quads(mut sq) = *quads else {
                        unreachable!("matched above")
                    };
                    match sq.iter_mut().find(|qf| qf.dir == dir) {
                        Some(qf) => {
                            // a filter on this direction exists: intersect into it
                            let old = std::mem::replace(&mut qf.values, Shape::Null);
                            qf.values = Shape::Intersect(vec![Shape::Fixed(fix), old]);
                        }
                        None => {
                            sq.insert(
                                0,
                                QuadFilter {
                                    dir,
                                    values: Shape::Fixed(fix),
                                },
                            );
                        }
                    }
                    return finish(
                        Shape::NodesFrom {
                            dir,
                            quads: Box::new(Shape::Quads(sq)),
                        },
                        true,
                        r,
                    );
                }
                other => rest.push(other),
            }
        }
        // smallest sets lead the and-join
        rest.insert(0, Shape::Fixed(fix));
    } else if !fixed.is_empty() {
        for f in fixed.into_iter().rev() {
            rest.insert(0, Shape::Fixed(f));
        }
    }

    match rest.len() {
        0 => (Shape::Null, true),
        1 => finish(rest.pop().expect("len checked"), true, r),
        _ => finish(Shape::Intersect(rest), opt, r),
    }
}

fn optimize_intersect_optional(
    intersect: Vec<Shape>,
    optional: Vec<Shape>,
    r: Option<&dyn Optimizer>,
) -> (Shape, bool) {
    let mut opt = false;
    let mut kept: Vec<Shape> = Vec::with_capacity(optional.len());
    for sub in optional {
        if sub.is_null() {
            opt = true;
            continue;
        }
        let (sub, sopt) = sub.optimize(r);
        opt |= sopt;
        if sub.is_null() {
            opt = true;
            continue; // an empty optional contributes nothing
        }
        kept.push(sub);
    }
    // a single-node intersect is optimized directly; wrapping it back in
    // Intersect below must not count as a change, or passes never settle
    let (ns, iopt) = if intersect.len() == 1 {
        intersect
            .into_iter()
            .next()
            .expect("len checked")
            .optimize(r)
    } else {
        Shape::Intersect(intersect).optimize(r)
    };
    opt |= iopt;
    if kept.is_empty() {
        return (ns, true);
    }
    if ns.is_null() {
        return (Shape::Null, true);
    }
    let intersect = match ns {
        Shape::Intersect(v) => v,
        other => vec![other],
    };
    (
        Shape::IntersectOptional {
            intersect,
            optional: kept,
        },
        opt,
    )
}

fn optimize_except(from: Shape, exclude: Shape, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    let (exclude, opt_e) = exclude.optimize(r);
    let (from, opt_f) = from.optimize(r);
    let opt = opt_e || opt_f;
    if let Some(r) = r {
        let (ns, nopt) = r.optimize_shape(Shape::Except {
            from: Box::new(from),
            exclude: Box::new(exclude),
        });
        return (ns, opt || nopt);
    }
    if exclude.is_null() {
        return (from, true);
    }
    if matches!(exclude, Shape::AllNodes) {
        return (Shape::Null, true);
    }
    (
        Shape::Except {
            from: Box::new(from),
            exclude: Box::new(exclude),
        },
        opt,
    )
}

fn optimize_page(from: Shape, skip: i64, limit: i64, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    if from.is_null() {
        return (Shape::Null, true);
    }
    let (from, opt) = from.optimize(r);
    if from.is_null() {
        return (Shape::Null, true);
    }
    if skip <= 0 && limit <= 0 {
        return (from, true);
    }
    if let Shape::Page {
        from: inner,
        skip: iskip,
        limit: ilimit,
    } = from
    {
        // compose the two windows into one
        let nskip = iskip + skip;
        let nlimit = if ilimit > 0 {
            let reduced = ilimit - skip;
            if reduced <= 0 {
                return (Shape::Null, true);
            }
            if limit > 0 && reduced > limit {
                limit
            } else {
                reduced
            }
        } else {
            limit
        };
        return hook(
            Shape::Page {
                from: inner,
                skip: nskip,
                limit: nlimit,
            },
            true,
            r,
        );
    }
    hook(
        Shape::Page {
            from: Box::new(from),
            skip,
            limit,
        },
        opt,
        r,
    )
}

fn optimize_save(from: Shape, tags: Vec<String>, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    if from.is_null() {
        return (Shape::Null, true);
    }
    let (from, opt) = from.optimize(r);
    if from.is_null() {
        return (Shape::Null, true);
    }
    if tags.is_empty() {
        return (from, true);
    }
    hook(
        Shape::Save {
            from: Box::new(from),
            tags,
        },
        opt,
        r,
    )
}

fn optimize_fixed_tags(on: Shape, tags: TagBindings, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    if on.is_null() {
        return (Shape::Null, true);
    }
    let (on, mut opt) = on.optimize(r);
    if on.is_null() {
        return (Shape::Null, true);
    }
    if tags.is_empty() {
        return (on, true);
    }
    let (on, tags) = if let Shape::FixedTags {
        on: inner,
        tags: inner_tags,
    } = on
    {
        opt = true;
        let mut merged = tags;
        merged.extend(inner_tags);
        (*inner, merged)
    } else {
        (on, tags)
    };
    hook(
        Shape::FixedTags {
            on: Box::new(on),
            tags,
        },
        opt,
        r,
    )
}

fn optimize_quads(filters: Vec<QuadFilter>, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    let mut opt = false;
    let mut out = Vec::with_capacity(filters.len());
    for f in filters {
        let (values, fopt) = f.values.optimize(r);
        opt |= fopt;
        if values.is_null() {
            // a filter with no allowed values matches no quads
            return (Shape::Null, true);
        }
        out.push(QuadFilter {
            dir: f.dir,
            values,
        });
    }
    // place constant filters first
    let is_fixed = |f: &QuadFilter| matches!(f.values, Shape::Fixed(_));
    let misordered = {
        let mut seen_other = false;
        out.iter().any(|f| {
            if is_fixed(f) {
                seen_other
            } else {
                seen_other = true;
                false
            }
        })
    };
    if misordered {
        opt = true;
        let (mut first, second): (Vec<_>, Vec<_>) = out.into_iter().partition(is_fixed);
        first.extend(second);
        out = first;
    }
    hook(Shape::Quads(out), opt, r)
}

fn optimize_nodes_from(dir: Direction, quads: Shape, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    if quads.is_null() {
        return (Shape::Null, true);
    }
    let (quads, opt) = quads.optimize(r);
    if let Some(r) = r {
        // skip the structural rules; the rewriter decides
        let (ns, nopt) = r.optimize_shape(Shape::NodesFrom {
            dir,
            quads: Box::new(quads),
        });
        return (ns, opt || nopt);
    }
    if quads.is_null() {
        return (Shape::Null, true);
    }
    let Shape::Quads(q) = quads else {
        return (
            Shape::NodesFrom {
                dir,
                quads: Box::new(quads),
            },
            opt,
        );
    };
    // HasA(x, LinksTo(x, y)) == y
    if q.len() == 1 && q[0].dir == dir {
        let values = q.into_iter().next().expect("len checked").values;
        return (values, true);
    }
    // pop fixed tags above the projection
    if q.iter()
        .any(|f| matches!(f.values, Shape::FixedTags { .. }))
    {
        let mut tags = TagBindings::new();
        let q: Vec<QuadFilter> = q
            .into_iter()
            .map(|mut f| {
                if let Shape::FixedTags { on, tags: t } = f.values {
                    tags.extend(t);
                    f.values = *on;
                }
                f
            })
            .collect();
        let (ns, _) = Shape::NodesFrom {
            dir,
            quads: Box::new(Shape::Quads(q)),
        }
        .optimize(r);
        return (
            Shape::FixedTags {
                on: Box::new(ns),
                tags,
            },
            true,
        );
    }
    // fuse into a single-scan QuadsAction when every filter is either a
    // constant ref or a tag on the whole direction
    let mut filter = crate::store::IndexConstraints::new();
    let mut save: std::collections::BTreeMap<Direction, Vec<String>> = Default::default();
    let mut recognized = 0usize;
    for f in &q {
        if let Some(v) = f.values.one() {
            if filter.contains_key(&f.dir) {
                // conflicting constant constraints; leave as-is to be safe
                return (
                    Shape::NodesFrom {
                        dir,
                        quads: Box::new(Shape::Quads(q)),
                    },
                    opt,
                );
            }
            filter.insert(f.dir, v);
            recognized += 1;
        } else if let Shape::Save { from, tags } = &f.values {
            if matches!(**from, Shape::AllNodes) {
                save.entry(f.dir).or_default().extend(tags.iter().cloned());
                recognized += 1;
            }
        }
    }
    if recognized == q.len() {
        let (ns, _) = Shape::QuadsAction(Box::new(QuadsAction {
            size: 0,
            result: dir,
            filter,
            save,
        }))
        .optimize(r);
        return (ns, true);
    }
    (
        Shape::NodesFrom {
            dir,
            quads: Box::new(Shape::Quads(q)),
        },
        opt,
    )
}

fn optimize_quads_action(mut a: QuadsAction, r: Option<&dyn Optimizer>) -> (Shape, bool) {
    let Some(r) = r else {
        return (Shape::QuadsAction(Box::new(a)), false);
    };
    let (ns, changed) = r.optimize_shape(Shape::QuadsAction(Box::new(a.clone())));
    if changed {
        return (ns, true);
    }
    // use quad index stats, when the rewriter has them
    if a.size == 0 {
        if let Some((size, exact)) = r.size_of_index(&a.filter) {
            if exact {
                a.size = size;
                if size == 0 {
                    // nothing matches; collapse the tree
                    return (Shape::Null, true);
                }
                if size == 1 {
                    // a single quad matches: bake it into fixed results
                    if let Some(q) = r.lookup_quad_index(&a.filter) {
                        let Some(res) = q.get(a.result).cloned() else {
                            return (Shape::Null, true);
                        };
                        let fixed = Shape::Fixed(vec![res]);
                        if a.save.is_empty() {
                            return (fixed, true);
                        }
                        let mut tags = TagBindings::new();
                        for (d, names) in &a.save {
                            if let Some(v) = q.get(*d) {
                                for t in names {
                                    tags.insert(t.clone(), v.clone());
                                }
                            }
                        }
                        return (
                            Shape::FixedTags {
                                on: Box::new(fixed),
                                tags,
                            },
                            true,
                        );
                    }
                }
                if size < r.materialize_threshold() {
                    // small enough to buffer in memory
                    return (
                        Shape::Materialize {
                            from: Box::new(Shape::QuadsAction(Box::new(a))),
                            size_hint: size,
                        },
                        true,
                    );
                }
                return (Shape::QuadsAction(Box::new(a)), true);
            }
        }
    }
    // the rewriter may recognize the expanded form instead
    let (ns, changed) = r.optimize_shape(a.simplify());
    if changed {
        return (ns, true);
    }
    (Shape::QuadsAction(Box::new(a)), false)
}

impl ValShape {
    /// One optimization pass over a value shape.
    pub fn optimize(self, r: Option<&dyn Optimizer>) -> (ValShape, bool) {
        match self {
            ValShape::Null => (ValShape::Null, false),
            ValShape::Values(v) => {
                if v.is_empty() {
                    return (ValShape::Null, true);
                }
                hook_val(ValShape::Values(v), false, r)
            }
            ValShape::Count(from) => {
                if from.is_null() {
                    return (ValShape::Values(vec![Value::Int(0)]), true);
                }
                let (from, opt) = from.optimize(r);
                if from.is_null() {
                    return (ValShape::Values(vec![Value::Int(0)]), true);
                }
                hook_val(ValShape::Count(Box::new(from)), opt, r)
            }
            ValShape::Filter { from, filters } => {
                if from.is_null() {
                    return (ValShape::Null, true);
                }
                let (from, opt) = from.optimize(r);
                if let Some(r) = r {
                    let (ns, nopt) = r.optimize_val_shape(ValShape::Filter {
                        from: Box::new(from),
                        filters,
                    });
                    return (ns, opt || nopt);
                }
                if from.is_null() {
                    return (ValShape::Null, true);
                }
                if filters.is_empty() {
                    return (from, true);
                }
                // merge stacked filters into one node
                if let ValShape::Filter {
                    from: inner,
                    filters: mut inner_filters,
                } = from
                {
                    inner_filters.extend(filters);
                    return (
                        ValShape::Filter {
                            from: inner,
                            filters: inner_filters,
                        },
                        true,
                    );
                }
                (
                    ValShape::Filter {
                        from: Box::new(from),
                        filters,
                    },
                    opt,
                )
            }
            ValShape::RefsToValues(refs) => {
                let (refs, opt) = refs.optimize(r);
                if refs.is_null() {
                    return (ValShape::Null, true);
                }
                hook_val(ValShape::RefsToValues(Box::new(refs)), opt, r)
            }
            ValShape::ToValues { store, refs } => {
                let (refs, opt) = refs.optimize(r);
                if refs.is_null() {
                    return (ValShape::Null, true);
                }
                hook_val(
                    ValShape::ToValues {
                        store,
                        refs: Box::new(refs),
                    },
                    opt,
                    r,
                )
            }
        }
    }
}

fn hook_val(s: ValShape, opt: bool, r: Option<&dyn Optimizer>) -> (ValShape, bool) {
    match r {
        Some(r) => {
            let (ns, nopt) = r.optimize_val_shape(s);
            (ns, opt || nopt)
        }
        None => (s, opt),
    }
}
