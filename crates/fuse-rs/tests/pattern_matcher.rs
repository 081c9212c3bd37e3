
use std::collections::HashSet;

use fuse_rs::graph::MutableGraph;
use fuse_rs::pattern::predicates::PredicateRegistry;
use fuse_rs::pattern::{
    AnchorOrder, Match, PatternMatcher, PatternSpec, PatternTable, TemplateSpec, EXTERNAL,
};
use graph_support::graph;

const X: i32 = EXTERNAL;

const RELU_GRAPH: &str = r#"
x = Parameter()
zero = Constant() {value: tensor<2x2>[0.0]}
max_node = Maximum(x, zero)
"#;

const STRICT_PAIR: &[PatternSpec] = &[PatternSpec {
    name: "pair",
    templates: &[
        TemplateSpec::new("Add", &[X, 1]),
        TemplateSpec::new("Constant", &[]),
    ],
}];

const RELAXED_PAIR: &[PatternSpec] = &[PatternSpec {
    name: "pair",
    templates: &[
        TemplateSpec::new("Add", &[X, 1]).relaxed(),
        TemplateSpec::new("Constant", &[]),
    ],
}];

const NEG_ADD: &[PatternSpec] = &[PatternSpec {
    name: "neg_add",
    templates: &[
        TemplateSpec::new("Add", &[1, X]),
        TemplateSpec::new("Neg", &[X]),
    ],
}];

const SQUARE: &[PatternSpec] = &[PatternSpec {
    name: "square",
    templates: &[
        TemplateSpec::new("Multiply", &[1, 1]),
        TemplateSpec::new("Neg", &[X]),
    ],
}];

const MUL_ADD: &[PatternSpec] = &[PatternSpec {
    name: "mul_add",
    templates: &[
        TemplateSpec::new("Add", &[1, X]),
        TemplateSpec::new("Multiply", &[X]),
    ],
}];

const PRIORITY: &[PatternSpec] = &[
    PatternSpec {
        name: "add_const",
        templates: &[
            TemplateSpec::new("Add", &[1, X]),
            TemplateSpec::new("Constant", &[]),
        ],
    },
    PatternSpec {
        name: "add_any",
        templates: &[TemplateSpec::new("Add", &[X, X])],
    },
];

fn table(specs: &[PatternSpec]) -> PatternTable {
    PatternTable::compile(specs, &PredicateRegistry::with_builtins()).expect("valid table")
}

fn names(graph: &MutableGraph, found: &Match) -> Vec<String> {
    found
        .nodes
        .iter()
        .map(|id| graph.node_name(*id).unwrap().to_string())
        .collect()
}

fn pattern_names(table: &PatternTable, matches: &[Match]) -> Vec<&'static str> {
    matches
        .iter()
        .map(|found| table.patterns()[found.pattern].name())
        .collect()
}

#[test]
fn binds_relu_with_zero_constant() {
    graph_support::init_logging();
    let graph = graph(RELU_GRAPH);
    let table = PatternTable::default_table().unwrap();
    let mut matcher = PatternMatcher::new(&table, 16);

    let matches = matcher.find_matches(&graph);
    assert_eq!(matches.len(), 1);
    assert_eq!(pattern_names(&table, &matches), vec!["relu"]);
    assert_eq!(names(&graph, &matches[0]), vec!["max_node", "zero"]);
    assert_eq!(matches[0].anchor(), graph.node_id("max_node").unwrap());
}

#[test]
fn predicate_failure_prevents_binding() {
    let graph = graph(
        r#"
x = Parameter()
ones = Constant() {value: tensor<2x2>[1.0]}
max_node = Maximum(x, ones)
"#,
    );
    let table = PatternTable::default_table().unwrap();
    let mut matcher = PatternMatcher::new(&table, 16);
    assert!(matcher.find_matches(&graph).is_empty());
}

#[test]
fn strict_templates_require_exact_arity() {
    let graph = graph(
        r#"
x = Parameter()
y = Parameter()
c = Constant()
add = Add(x, c, y)
"#,
    );
    let strict = table(STRICT_PAIR);
    assert!(PatternMatcher::new(&strict, 16).find_matches(&graph).is_empty());

    let relaxed = table(RELAXED_PAIR);
    let matches = PatternMatcher::new(&relaxed, 16).find_matches(&graph);
    assert_eq!(matches.len(), 1);
    assert_eq!(names(&graph, &matches[0]), vec!["add", "c"]);
}

#[test]
fn arity_below_declared_slots_never_binds() {
    let graph = graph(
        r#"
x = Parameter()
add = Add(x)
"#,
    );
    let relaxed = table(RELAXED_PAIR);
    assert!(PatternMatcher::new(&relaxed, 16).find_matches(&graph).is_empty());
}

#[test]
fn external_slot_may_not_read_a_bound_node() {
    let graph = graph(
        r#"
x = Parameter()
neg = Neg(x)
add = Add(neg, neg)
"#,
    );
    let table = table(NEG_ADD);
    assert!(PatternMatcher::new(&table, 16).find_matches(&graph).is_empty());

    let graph = graph_support::graph(
        r#"
x = Parameter()
neg = Neg(x)
add = Add(neg, x)
"#,
    );
    let matches = PatternMatcher::new(&table, 16).find_matches(&graph);
    assert_eq!(names(&graph, &matches[0]), vec!["add", "neg"]);
}

#[test]
fn repeated_references_bind_the_same_node() {
    let graph = graph(
        r#"
x = Parameter()
n = Neg(x)
n2 = Neg(x)
same = Multiply(n, n)
mixed = Multiply(n2, n)
"#,
    );
    let table = table(SQUARE);
    let mut matcher = PatternMatcher::new(&table, 16).with_anchor_order(AnchorOrder::Insertion);
    let matches = matcher.find_matches(&graph);
    assert_eq!(matches.len(), 1);
    assert_eq!(names(&graph, &matches[0]), vec!["same", "n"]);

    let mixed = graph.node_id("mixed").unwrap();
    assert!(matcher.match_at(&graph, mixed, &HashSet::new()).is_none());
}

#[test]
fn matches_never_overlap() {
    let graph = graph(
        r#"
x = Parameter()
y = Parameter()
zero = Constant() {value: tensor<>[0.0]}
relu = Maximum(x, zero)
pad = Pad(y, zero)
"#,
    );
    let table = PatternTable::default_table().unwrap();

    let mut downstream = PatternMatcher::new(&table, 16);
    let matches = downstream.find_matches(&graph);
    assert_eq!(pattern_names(&table, &matches), vec!["zero_pad"]);
    assert_eq!(names(&graph, &matches[0]), vec!["pad", "zero"]);

    let mut in_order = PatternMatcher::new(&table, 16).with_anchor_order(AnchorOrder::Insertion);
    let matches = in_order.find_matches(&graph);
    assert_eq!(pattern_names(&table, &matches), vec!["relu"]);
    assert_eq!(names(&graph, &matches[0]), vec!["relu", "zero"]);
}

#[test]
fn earlier_patterns_win_at_the_same_anchor() {
    let graph = graph(
        r#"
x = Parameter()
c = Constant()
with_const = Add(c, x)
plain = Add(x, x)
"#,
    );
    let table = table(PRIORITY);
    let mut matcher = PatternMatcher::new(&table, 16).with_anchor_order(AnchorOrder::Insertion);
    let matches = matcher.find_matches(&graph);
    assert_eq!(pattern_names(&table, &matches), vec!["add_const", "add_any"]);
    assert_eq!(names(&graph, &matches[0]), vec!["with_const", "c"]);
    assert_eq!(names(&graph, &matches[1]), vec!["plain"]);
}

#[test]
fn rejects_matches_that_would_close_a_cycle() {
    let graph = graph(
        r#"
x = Parameter()
m = Multiply(x)
side = Neg(m)
a = Add(m, side)
"#,
    );
    let table = table(MUL_ADD);
    assert!(PatternMatcher::new(&table, 16).find_matches(&graph).is_empty());

    let graph = graph_support::graph(
        r#"
x = Parameter()
m = Multiply(x)
side = Neg(m)
a = Add(m, x)
"#,
    );
    let matches = PatternMatcher::new(&table, 16).find_matches(&graph);
    assert_eq!(names(&graph, &matches[0]), vec!["a", "m"]);
}

#[test]
fn predicate_results_are_cached_per_node() {
    let graph = graph(RELU_GRAPH);
    let table = PatternTable::default_table().unwrap();
    let anchor = graph.node_id("max_node").unwrap();

    let mut matcher = PatternMatcher::new(&table, 16);
    assert_eq!(matcher.cache().capacity(), 16);
    assert!(matcher.match_at(&graph, anchor, &HashSet::new()).is_some());
    assert!(matcher.match_at(&graph, anchor, &HashSet::new()).is_some());
    assert_eq!(matcher.cache().misses(), 1);
    assert_eq!(matcher.cache().hits(), 1);
    assert_eq!(matcher.cache().len(), 1);

    let mut uncached = PatternMatcher::new(&table, 0);
    assert!(uncached.match_at(&graph, anchor, &HashSet::new()).is_some());
    assert!(uncached.match_at(&graph, anchor, &HashSet::new()).is_some());
    assert_eq!(uncached.cache().hits(), 0);
    assert_eq!(uncached.cache().misses(), 2);
    assert!(uncached.cache().is_empty());
}

#[test]
fn consumed_nodes_are_skipped() {
    let graph = graph(RELU_GRAPH);
    let table = PatternTable::default_table().unwrap();
    let anchor = graph.node_id("max_node").unwrap();
    let consumed: HashSet<_> = [graph.node_id("zero").unwrap()].into_iter().collect();
    let mut matcher = PatternMatcher::new(&table, 16);
    assert!(matcher.match_at(&graph, anchor, &consumed).is_none());
}
