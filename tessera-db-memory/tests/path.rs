//! End-to-end path tests over the in-memory store
//!
//! The fixture is the canonical social graph:
//!
//! ```text
//!  +-------+                        +------+
//!  | alice |-----                 ->| fred |<--
//!  +-------+     \---->+-------+-/  +------+   \-+-------+
//!                ----->| #bob# |       |         | emily |
//!  +---------+--/  --->+-------+       |         +-------+
//!  | charlie |    /                    v
//!  +---------+   /                  +--------+
//!    \---    +--------+             | #greg# |
//!        \-->| #dani# |------------>+--------+
//!            +--------+
//! ```

use regex::Regex;
use std::sync::Arc;
use tessera_db_core::{Quad, Ref, Tracker, TrackingOptions, Value};
use tessera_db_memory::MemStore;
use tessera_db_query::{
    build_iterator, CmpOperator, ExecutionContext, Path, QuadStore, QueryError, TagMap,
    ValueFilter,
};

fn iri(s: &str) -> Value {
    Value::iri(s)
}

fn lit(s: &str) -> Value {
    Value::string(s)
}

fn quads() -> Vec<Quad> {
    let f = |s: &str, o: &str| Quad::new(iri(s), iri("follows"), iri(o), None);
    let status = |s: &str, o: &str| Quad::new(iri(s), iri("status"), lit(o), None);
    vec![
        f("alice", "bob"),
        f("bob", "fred"),
        status("bob", "cool_person"),
        f("charlie", "bob"),
        f("charlie", "dani"),
        f("dani", "bob"),
        f("dani", "greg"),
        status("dani", "cool_person"),
        f("emily", "fred"),
        f("fred", "greg"),
        status("greg", "cool_person"),
        Quad::new(
            iri("greg"),
            iri("status"),
            lit("smart_person"),
            Some(iri("smart_graph")),
        ),
        Quad::new(iri("predicates"), iri("are"), iri("follows"), None),
        Quad::new(iri("predicates"), iri("are"), iri("status"), None),
    ]
}

fn test_store() -> Arc<dyn QuadStore> {
    Arc::new(MemStore::with_quads(quads()).expect("load test graph"))
}

fn run_values(store: &Arc<dyn QuadStore>, path: &Path) -> Vec<Value> {
    let ctx = ExecutionContext::new();
    let mut out = path
        .iterate(&ctx, store)
        .paths(false)
        .all_values()
        .expect("query should succeed");
    out.sort();
    out
}

fn run_tag(store: &Arc<dyn QuadStore>, path: &Path, tag: &str) -> Vec<Value> {
    let ctx = ExecutionContext::new();
    let mut out = Vec::new();
    path.iterate(&ctx, store)
        .paths(true)
        .tag_each(|tags: &TagMap| {
            if let Some(r) = tags.get(tag) {
                if let Some(v) = r.value().cloned().or_else(|| store.name_of(r)) {
                    out.push(v);
                }
            }
        })
        .expect("query should succeed");
    out.sort();
    out
}

fn iris(names: &[&str]) -> Vec<Value> {
    let mut out: Vec<Value> = names.iter().map(|n| iri(n)).collect();
    out.sort();
    out
}

fn lits(names: &[&str]) -> Vec<Value> {
    let mut out: Vec<Value> = names.iter().map(|n| lit(n)).collect();
    out.sort();
    out
}

fn grandfollows() -> Path {
    Path::start_morphism().out(iri("follows")).out(iri("follows"))
}

#[test]
fn out() {
    let qs = test_store();
    let p = Path::start(vec![iri("alice")]).out(iri("follows"));
    assert_eq!(run_values(&qs, &p), iris(&["bob"]));
}

#[test]
fn out_any_predicate() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).out(());
    assert_eq!(
        run_values(&qs, &p),
        vec![lit("cool_person"), iri("fred")]
    );
}

#[test]
fn in_() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).in_(iri("follows"));
    assert_eq!(run_values(&qs, &p), iris(&["alice", "charlie", "dani"]));
}

#[test]
fn in_any_predicate() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).in_(());
    assert_eq!(run_values(&qs, &p), iris(&["alice", "charlie", "dani"]));
}

#[test]
fn filter_nodes() {
    let qs = test_store();
    let p = Path::start(vec![]).filter(CmpOperator::Gt, iri("p"));
    assert_eq!(
        run_values(&qs, &p),
        iris(&["predicates", "smart_graph", "status"])
    );
}

#[test]
fn in_with_filter() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")])
        .in_(iri("follows"))
        .filter(CmpOperator::Gt, iri("c"));
    assert_eq!(run_values(&qs, &p), iris(&["charlie", "dani"]));
}

#[test]
fn in_with_regex() {
    let qs = test_store();
    let re = Regex::new("ar?li.*e").unwrap();
    let p = Path::start(vec![iri("bob")]).in_(iri("follows")).regex(re);
    assert_eq!(run_values(&qs, &p), vec![]);
}

#[test]
fn in_with_regex_including_refs() {
    let qs = test_store();
    let re = Regex::new("ar?li.*e").unwrap();
    let p = Path::start(vec![iri("bob")])
        .in_(iri("follows"))
        .regex_with_refs(re);
    assert_eq!(run_values(&qs, &p), iris(&["alice", "charlie"]));
}

#[test]
fn out_via_sub_path() {
    let qs = test_store();
    let via = Path::start(vec![iri("predicates")]).out(iri("are"));
    let p = Path::start(vec![iri("bob")]).out(via);
    assert_eq!(
        run_values(&qs, &p),
        vec![lit("cool_person"), iri("fred")]
    );
}

#[test]
fn and() {
    let qs = test_store();
    let p = Path::start(vec![iri("dani")])
        .out(iri("follows"))
        .and(Path::start(vec![iri("charlie")]).out(iri("follows")));
    assert_eq!(run_values(&qs, &p), iris(&["bob"]));
}

#[test]
fn or() {
    let qs = test_store();
    let p = Path::start(vec![iri("fred")])
        .out(iri("follows"))
        .or(Path::start(vec![iri("alice")]).out(iri("follows")));
    assert_eq!(run_values(&qs, &p), iris(&["bob", "greg"]));
}

#[test]
fn implicit_all() {
    let qs = test_store();
    let p = Path::start(vec![]);
    let mut expect = iris(&[
        "alice",
        "bob",
        "charlie",
        "dani",
        "emily",
        "fred",
        "greg",
        "follows",
        "status",
        "predicates",
        "are",
        "smart_graph",
    ]);
    expect.extend(lits(&["cool_person", "smart_person"]));
    expect.sort();
    assert_eq!(run_values(&qs, &p), expect);
}

#[test]
fn follow() {
    let qs = test_store();
    let p = Path::start(vec![iri("charlie")]).follow(grandfollows());
    assert_eq!(run_values(&qs, &p), iris(&["bob", "fred", "greg"]));
}

#[test]
fn follow_reverse() {
    let qs = test_store();
    let p = Path::start(vec![iri("fred")]).follow_reverse(&grandfollows());
    assert_eq!(run_values(&qs, &p), iris(&["alice", "charlie", "dani"]));
}

#[test]
fn tag_follow_is_instead_of_follow_reverse() {
    let qs = test_store();
    let p = Path::start(vec![])
        .tag(&["first"])
        .follow(grandfollows())
        .is(vec![iri("fred")]);
    assert_eq!(run_tag(&qs, &p, "first"), iris(&["alice", "charlie", "dani"]));
}

#[test]
fn except_single_vertex() {
    let qs = test_store();
    let p = Path::start(vec![iri("alice"), iri("bob")])
        .except(Path::start(vec![iri("alice")]));
    assert_eq!(run_values(&qs, &p), iris(&["bob"]));
}

#[test]
fn chained_except() {
    let qs = test_store();
    let p = Path::start(vec![iri("alice"), iri("bob"), iri("charlie")])
        .except(Path::start(vec![iri("bob")]))
        .except(Path::start(vec![iri("alice")]));
    assert_eq!(run_values(&qs, &p), iris(&["charlie"]));
}

#[test]
fn unique() {
    let qs = test_store();
    let p = Path::start(vec![iri("alice"), iri("bob"), iri("charlie")])
        .out(iri("follows"))
        .unique();
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani", "fred"]));
}

#[test]
fn simple_save() {
    let qs = test_store();
    let p = Path::start(vec![]).save(iri("status"), "somecool");
    assert_eq!(
        run_tag(&qs, &p, "somecool"),
        lits(&["cool_person", "cool_person", "cool_person", "smart_person"])
    );
}

#[test]
fn simple_save_reverse() {
    let qs = test_store();
    let p = Path::start(vec![lit("cool_person")]).save_reverse(iri("status"), "who");
    assert_eq!(run_tag(&qs, &p, "who"), iris(&["bob", "dani", "greg"]));
}

#[test]
fn simple_has() {
    let qs = test_store();
    let p = Path::start(vec![]).has(iri("status"), vec![lit("cool_person")]);
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani", "greg"]));
}

#[test]
fn has_with_filter() {
    let qs = test_store();
    let p = Path::start(vec![]).has_filter(
        iri("follows"),
        false,
        vec![ValueFilter::Comparison {
            op: CmpOperator::Gt,
            value: iri("f"),
        }],
    );
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani", "emily", "fred"]));
}

#[test]
fn wildcard_prefix() {
    let qs = test_store();
    let p = Path::start(vec![]).filters(vec![ValueFilter::Wildcard {
        pattern: "bo%".to_string(),
    }]);
    assert_eq!(run_values(&qs, &p), iris(&["bob"]));
}

#[test]
fn wildcard_and_comparison() {
    let qs = test_store();
    let p = Path::start(vec![]).filters(vec![
        ValueFilter::Wildcard {
            pattern: "???".to_string(),
        },
        ValueFilter::Comparison {
            op: CmpOperator::Gt,
            value: iri("b"),
        },
    ]);
    assert_eq!(run_values(&qs, &p), iris(&["bob"]));
}

#[test]
fn wildcard_infix() {
    let qs = test_store();
    let p = Path::start(vec![]).filters(vec![ValueFilter::Wildcard {
        pattern: "%ed%".to_string(),
    }]);
    assert_eq!(run_values(&qs, &p), iris(&["fred", "predicates"]));
}

#[test]
fn limit() {
    let qs = test_store();
    let p = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .limit(2);
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani"]));
}

#[test]
fn skip() {
    let qs = test_store();
    let p = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .skip(2);
    assert_eq!(run_values(&qs, &p), iris(&["greg"]));
}

#[test]
fn skip_and_limit() {
    let qs = test_store();
    let p = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .skip(1)
        .limit(1);
    assert_eq!(run_values(&qs, &p), iris(&["dani"]));
}

#[test]
fn skip_past_the_end() {
    let qs = test_store();
    let p = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .skip(5);
    assert_eq!(run_values(&qs, &p), vec![]);
}

#[test]
fn double_has() {
    let qs = test_store();
    let p = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .has(iri("follows"), vec![iri("fred")]);
    assert_eq!(run_values(&qs, &p), iris(&["bob"]));
}

#[test]
fn has_reverse() {
    let qs = test_store();
    let p = Path::start(vec![]).has_reverse(iri("status"), vec![iri("bob")]);
    assert_eq!(run_values(&qs, &p), lits(&["cool_person"]));
}

#[test]
fn tag_is_back() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")])
        .in_(iri("follows"))
        .tag(&["foo"])
        .out(iri("status"))
        .is(vec![lit("cool_person")])
        .back("foo");
    assert_eq!(run_values(&qs, &p), iris(&["dani"]));
}

#[test]
fn multiple_backs() {
    let qs = test_store();
    let p = Path::start(vec![iri("emily")])
        .out(iri("follows"))
        .tag(&["f"])
        .out(iri("follows"))
        .out(iri("status"))
        .is(vec![lit("cool_person")])
        .back("f")
        .in_(iri("follows"))
        .in_(iri("follows"))
        .tag(&["acd"])
        .out(iri("status"))
        .is(vec![lit("cool_person")])
        .back("f");
    assert_eq!(run_tag(&qs, &p, "acd"), iris(&["dani"]));
}

#[test]
fn labels() {
    let qs = test_store();
    let p = Path::start(vec![iri("greg")]).labels();
    assert_eq!(run_values(&qs, &p), iris(&["smart_graph"]));
}

#[test]
fn in_predicates() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).in_predicates();
    assert_eq!(run_values(&qs, &p), iris(&["follows"]));
}

#[test]
fn out_predicates() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).out_predicates();
    assert_eq!(run_values(&qs, &p), iris(&["follows", "status"]));
}

#[test]
fn save_in_predicates() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).save_predicates(true, "pred");
    assert_eq!(
        run_tag(&qs, &p, "pred"),
        iris(&["follows", "follows", "follows"])
    );
}

#[test]
fn save_out_predicates() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob")]).save_predicates(false, "pred");
    assert_eq!(run_tag(&qs, &p, "pred"), iris(&["follows", "status"]));
}

#[test]
fn simple_morphism() {
    let qs = test_store();
    let p = Path::start(vec![iri("charlie")]).follow(grandfollows());
    assert_eq!(run_values(&qs, &p), iris(&["bob", "fred", "greg"]));
}

#[test]
fn reverse_morphism() {
    let qs = test_store();
    let p = Path::start(vec![iri("fred")]).follow_reverse(&grandfollows());
    assert_eq!(run_values(&qs, &p), iris(&["alice", "charlie", "dani"]));
}

#[test]
fn query_without_label_limitation() {
    let qs = test_store();
    let p = Path::start(vec![iri("greg")]).out(iri("status"));
    assert_eq!(run_values(&qs, &p), lits(&["cool_person", "smart_person"]));
}

#[test]
fn query_with_label_limitation() {
    let qs = test_store();
    let p = Path::start(vec![iri("greg")])
        .label_context(iri("smart_graph"))
        .out(iri("status"));
    assert_eq!(run_values(&qs, &p), lits(&["smart_person"]));
}

#[test]
fn reverse_label_context() {
    let qs = test_store();
    let p = Path::start(vec![iri("greg")])
        .tag(&["base"])
        .label_context(iri("smart_graph"))
        .out(iri("status"))
        .tag(&["status"])
        .back("base");
    assert_eq!(run_values(&qs, &p), iris(&["greg"]));
}

#[test]
fn reverse_label_context_restores_prior_context() {
    let qs = test_store();
    // bob's only status quad is unlabeled, so the reversed traversal must
    // keep the smart_graph restriction to exclude it
    let p = Path::start(vec![iri("greg"), iri("bob")])
        .tag(&["base"])
        .label_context(iri("smart_graph"))
        .out(iri("status"))
        .tag(&["status"])
        .back("base");
    assert_eq!(run_values(&qs, &p), iris(&["greg"]));
}

#[test]
fn save_limits_top_level() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob"), iri("charlie")])
        .out(iri("follows"))
        .save(iri("status"), "statustag");
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani"]));
}

#[test]
fn save_optional_keeps_top_level() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob"), iri("charlie")])
        .out(iri("follows"))
        .save_optional(iri("status"), "statustag");
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani", "fred"]));
}

#[test]
fn save_optional_tags_only_matching_rows() {
    let qs = test_store();
    let p = Path::start(vec![iri("bob"), iri("charlie")])
        .out(iri("follows"))
        .save_optional(iri("status"), "statustag");
    assert_eq!(
        run_tag(&qs, &p, "statustag"),
        lits(&["cool_person", "cool_person"])
    );
}

#[test]
fn builder_is_value_like() {
    let qs = test_store();
    // extending a clone leaves the original untouched
    let alice = Path::start(vec![iri("alice")]);
    let _ = alice.clone().out(iri("follows"));
    assert_eq!(run_values(&qs, &alice), iris(&["alice"]));
}

#[test]
fn follow_recursive_unbounded() {
    let qs = test_store();
    let p = Path::start(vec![iri("charlie")]).follow_recursive(iri("follows"), 0, &[]);
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani", "fred", "greg"]));
}

#[test]
fn follow_recursive_depth_one() {
    let qs = test_store();
    let p = Path::start(vec![iri("charlie")]).follow_recursive(iri("follows"), 1, &[]);
    assert_eq!(run_values(&qs, &p), iris(&["bob", "dani"]));
}

#[test]
fn follow_recursive_depth_tags() {
    let qs = test_store();
    let p = Path::start(vec![iri("charlie")]).follow_recursive(iri("follows"), 0, &["depth"]);
    assert_eq!(
        run_tag(&qs, &p, "depth"),
        vec![
            Value::Int(1),
            Value::Int(1),
            Value::Int(2),
            Value::Int(2)
        ]
    );
}

#[test]
fn follow_recursive_composes_with_has() {
    let quads = vec![
        Quad::make("a", "parent", "b", ""),
        Quad::make("b", "parent", "c", ""),
        Quad::make("c", "parent", "d", ""),
        Quad::make("c", "labels", "tag", ""),
        Quad::make("d", "parent", "e", ""),
        Quad::make("d", "labels", "tag", ""),
    ];
    let qs: Arc<dyn QuadStore> = Arc::new(MemStore::with_quads(quads).unwrap());
    let p = Path::start(vec![iri("a")])
        .follow_recursive(
            Path::start_morphism().out(iri("parent")),
            0,
            &[],
        )
        .has(iri("labels"), vec![iri("tag")]);
    assert_eq!(run_values(&qs, &p), iris(&["c", "d"]));
}

#[test]
fn find_non_existent() {
    let qs = test_store();
    let p = Path::start(vec![iri("<not-existing>")]);
    assert_eq!(run_values(&qs, &p), vec![]);
}

#[test]
fn count_all_nodes() {
    let qs = test_store();
    let p = Path::start(vec![]).count();
    assert_eq!(run_values(&qs, &p), vec![Value::Int(14)]);
}

#[test]
fn count_of_empty_set_is_zero() {
    let qs = test_store();
    let p = Path::start(vec![iri("nobody")]).count();
    assert_eq!(run_values(&qs, &p), vec![Value::Int(0)]);
}

#[test]
fn one_shot_iterator_cannot_be_reused() {
    let qs = test_store();
    let ctx = ExecutionContext::new();
    let bob = qs.value_of(&iri("bob")).unwrap();
    let prebuilt: Box<dyn tessera_db_query::RefIterator> =
        Box::new(tessera_db_query::iterator::Fixed::new(vec![bob]));
    let p = Path::start(vec![]).iterator(prebuilt);

    let first = p.iterate(&ctx, &qs).paths(false).all_values().unwrap();
    assert_eq!(first, vec![iri("bob")]);

    let again = p.iterate(&ctx, &qs).paths(false).all_values();
    assert_eq!(again, Err(QueryError::IteratorReused));
}

#[test]
fn cancellation_surfaces_as_error() {
    let qs = test_store();
    let tracker = Tracker::cancellable();
    tracker.cancel();
    let ctx = ExecutionContext::with_tracker(tracker);
    let p = Path::start(vec![]).out(iri("follows"));
    let res = p.iterate(&ctx, &qs).paths(false).all_values();
    assert!(matches!(res, Err(QueryError::Track(_))));
}

#[test]
fn fuel_limit_caps_result_count() {
    let qs = test_store();
    let ctx = ExecutionContext::with_tracker(Tracker::new(TrackingOptions::with_max_fuel(2)));
    let p = Path::start(vec![]);
    let res = p.iterate(&ctx, &qs).paths(false).all_values();
    assert!(matches!(res, Err(QueryError::Track(_))));
}

#[test]
fn optimization_preserves_results() {
    let qs = test_store();
    let ctx = ExecutionContext::new();
    let queries = vec![
        Path::start(vec![]).has(iri("status"), vec![lit("cool_person")]),
        Path::start(vec![iri("bob")]).in_(iri("follows")),
        Path::start(vec![iri("bob"), iri("charlie")])
            .out(iri("follows"))
            .save_optional(iri("status"), "t"),
        Path::start(vec![iri("charlie")]).follow(grandfollows()).unique(),
    ];
    for p in queries {
        let optimized = run_values(&qs, &p);

        // bind without the optimizer passes and drain the raw tree
        let raw = tessera_db_query::bind_shape(p.shape().unwrap(), &qs);
        let mut it = raw.build_iterator();
        let mut unoptimized = Vec::new();
        while it.next(&ctx) {
            let r = it.result().unwrap();
            let v = r.value().cloned().or_else(|| qs.name_of(&r)).unwrap();
            unoptimized.push(v);
        }
        assert!(it.err().is_none());
        it.close();
        unoptimized.sort();
        assert_eq!(optimized, unoptimized, "optimized vs raw for {p:?}");
    }
}

#[test]
fn contains_agrees_with_next() {
    let qs = test_store();
    let ctx = ExecutionContext::new();
    let shape = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .shape()
        .unwrap();

    let mut drain = build_iterator(shape.clone(), &qs);
    let mut produced = Vec::new();
    while drain.next(&ctx) {
        produced.push(drain.result().unwrap());
    }
    assert!(drain.err().is_none());
    assert_eq!(produced.len(), 3);

    let mut probe = build_iterator(shape, &qs);
    for r in &produced {
        assert!(probe.contains(&ctx, r), "produced ref must be contained");
        assert_eq!(probe.result(), Some(r.clone()));
    }
    let alice = qs.value_of(&iri("alice")).unwrap();
    assert!(!probe.contains(&ctx, &alice));
}

#[test]
fn contains_reproduces_tags() {
    let qs = test_store();
    let ctx = ExecutionContext::new();
    let shape = Path::start(vec![])
        .has(iri("status"), vec![lit("cool_person")])
        .save(iri("follows"), "f")
        .shape()
        .unwrap();

    // collect tag bindings per result from a full drain
    let mut drain = build_iterator(shape.clone(), &qs);
    let mut rows: Vec<(Ref, TagMap)> = Vec::new();
    while drain.next(&ctx) {
        let mut tags = TagMap::default();
        drain.tag_results(&mut tags);
        rows.push((drain.result().unwrap(), tags));
    }

    let mut probe = build_iterator(shape, &qs);
    for (r, expect) in &rows {
        assert!(probe.contains(&ctx, r));
        let mut tags = TagMap::default();
        probe.tag_results(&mut tags);
        assert_eq!(&tags, expect, "tags after contains({r:?})");
    }
}
