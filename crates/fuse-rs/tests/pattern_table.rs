
use fuse_rs::graph::Node;
use fuse_rs::pattern::predicates::{self, PredicateId, PredicateRegistry};
use fuse_rs::pattern::{PatternError, PatternSpec, PatternTable, SlotRef, TemplateSpec, EXTERNAL};
use graph_support::graph;

const X: i32 = EXTERNAL;

fn is_negation(node: &Node) -> bool {
    node.op() == "Neg"
}

fn compile(specs: &[PatternSpec]) -> Result<PatternTable, PatternError> {
    PatternTable::compile(specs, &PredicateRegistry::with_builtins())
}

#[test]
fn default_table_keeps_library_order() {
    let table = PatternTable::default_table().unwrap();
    let names: Vec<&str> = table.patterns().iter().map(|pattern| pattern.name()).collect();
    assert_eq!(
        names,
        vec![
            "const_slice_update",
            "const_slice",
            "relu",
            "sigmoid",
            "biasadd_broadcast",
            "biasadd",
            "zero_pad",
            "trunc_norm_scale_add",
            "trunc_norm",
            "norm_scale_add",
            "uniform_scale_add",
            "norm",
            "uniform",
            "bernoulli",
            "avgpool_valid",
            "avgpool_same",
            "wide_const",
        ]
    );
    assert_eq!(table.len(), 17);
    assert_eq!(table.index_of("relu"), Some(2));
    assert_eq!(table.index_of("missing"), None);
}

#[test]
fn candidates_are_indexed_by_anchor_kind() {
    let table = PatternTable::default_table().unwrap();
    assert_eq!(table.candidates("Add"), &[3, 4, 5, 7, 9, 10]);
    assert_eq!(table.candidates("Rng"), &[11, 12, 13]);
    assert_eq!(table.candidates("Divide"), &[14, 15]);
    assert!(table.candidates("Constant").is_empty());
    assert!(table.candidates("Unknown").is_empty());
}

#[test]
fn compiled_templates_resolve_slots_and_predicates() {
    let table = PatternTable::default_table().unwrap();
    let sigmoid = table.get(table.index_of("sigmoid").unwrap()).unwrap();
    assert_eq!(sigmoid.anchor_op(), "Add");
    assert_eq!(sigmoid.len(), 5);
    assert_eq!(
        sigmoid.template(3).inputs,
        vec![SlotRef::Template(4), SlotRef::External]
    );
    let half = sigmoid.template(4).predicate.expect("predicate resolved");
    assert_eq!(half.name, "is_constant_half");

    let biasadd = table.get(table.index_of("biasadd").unwrap()).unwrap();
    assert!(biasadd.template(0).include_in_replacement);
    assert!(!biasadd.template(1).include_in_replacement);
}

#[test]
fn compile_rejects_malformed_tables() {
    const EMPTY: &[PatternSpec] = &[PatternSpec {
        name: "empty",
        templates: &[],
    }];
    assert_eq!(
        compile(EMPTY).unwrap_err(),
        PatternError::Empty { pattern: "empty" }
    );

    const DUPLICATE: &[PatternSpec] = &[
        PatternSpec {
            name: "twice",
            templates: &[TemplateSpec::new("Neg", &[X])],
        },
        PatternSpec {
            name: "twice",
            templates: &[TemplateSpec::new("Abs", &[X])],
        },
    ];
    assert_eq!(
        compile(DUPLICATE).unwrap_err(),
        PatternError::DuplicateName { pattern: "twice" }
    );

    const EXCLUDED: &[PatternSpec] = &[PatternSpec {
        name: "excluded",
        templates: &[TemplateSpec::new("Neg", &[X]).excluded()],
    }];
    assert_eq!(
        compile(EXCLUDED).unwrap_err(),
        PatternError::ExcludedAnchor { pattern: "excluded" }
    );

    const OUT_OF_RANGE: &[PatternSpec] = &[PatternSpec {
        name: "range",
        templates: &[TemplateSpec::new("Neg", &[2]), TemplateSpec::new("Abs", &[])],
    }];
    assert_eq!(
        compile(OUT_OF_RANGE).unwrap_err(),
        PatternError::InvalidSlot {
            pattern: "range",
            position: 0,
            slot: 0,
            target: 2
        }
    );

    const NEGATIVE: &[PatternSpec] = &[PatternSpec {
        name: "negative",
        templates: &[TemplateSpec::new("Neg", &[X, -3])],
    }];
    assert!(matches!(
        compile(NEGATIVE).unwrap_err(),
        PatternError::InvalidSlot { slot: 1, target: -3, .. }
    ));
}

#[test]
fn compile_rejects_backward_and_unreachable_positions() {
    const BACKWARD: &[PatternSpec] = &[PatternSpec {
        name: "backward",
        templates: &[TemplateSpec::new("Neg", &[1]), TemplateSpec::new("Abs", &[0])],
    }];
    let err = compile(BACKWARD).unwrap_err();
    assert_eq!(
        err,
        PatternError::BackwardReference {
            pattern: "backward",
            position: 1,
            slot: 0,
            target: 0
        }
    );
    assert_eq!(
        err.to_string(),
        "pattern 'backward': position 1 slot 0 refers back to position 0"
    );

    const SELF_LOOP: &[PatternSpec] = &[PatternSpec {
        name: "self_loop",
        templates: &[TemplateSpec::new("Neg", &[0])],
    }];
    assert!(matches!(
        compile(SELF_LOOP).unwrap_err(),
        PatternError::BackwardReference { position: 0, target: 0, .. }
    ));

    const ISLAND: &[PatternSpec] = &[PatternSpec {
        name: "island",
        templates: &[TemplateSpec::new("Neg", &[X]), TemplateSpec::new("Abs", &[])],
    }];
    assert_eq!(
        compile(ISLAND).unwrap_err(),
        PatternError::Unreachable {
            pattern: "island",
            position: 1
        }
    );
}

#[test]
fn compile_resolves_predicates_through_the_registry() {
    const SPECS: &[PatternSpec] = &[PatternSpec {
        name: "double_neg",
        templates: &[
            TemplateSpec::new("Neg", &[1]),
            TemplateSpec::new("Neg", &[X]).with_predicate("is_negation"),
        ],
    }];
    let err = compile(SPECS).unwrap_err();
    assert_eq!(
        err.to_string(),
        "pattern 'double_neg': position 1 uses unknown predicate 'is_negation'"
    );

    let mut registry = PredicateRegistry::with_builtins();
    let builtins = registry.len();
    let id = registry.register("is_negation", is_negation);
    assert_eq!(id, PredicateId(builtins as u32));
    assert_eq!(registry.register("is_negation", is_negation), id);
    assert_eq!(registry.len(), builtins + 1);

    let table = PatternTable::compile(SPECS, &registry).unwrap();
    let predicate = table.patterns()[0].template(1).predicate.unwrap();
    assert_eq!(predicate.id, id);
    assert_eq!(predicate.name, "is_negation");
}

#[test]
fn registry_basics() {
    let registry = PredicateRegistry::new();
    assert!(registry.is_empty());
    assert!(registry.lookup("is_constant_zero").is_none());

    let builtins = PredicateRegistry::with_builtins();
    assert_eq!(builtins.len(), 11);
    assert!(builtins.lookup("is_convolution_call").is_some());
}

#[test]
fn builtin_predicates_read_node_attributes() {
    let graph = graph(
        r#"
zeros = Constant() {value: tensor<2x2>[0.0]}
mixed = Constant() {value: tensor<2>[0.0, 1.0]}
half = Constant() {value: tensor<>[0.5]}
halves = Constant() {value: tensor<3>[0.5, 0.5, 0.4]}
pad = Pad() {interior_padding: [0, 0]}
inner_pad = Pad() {interior_padding: [0, 1]}
bare_pad = Pad()
pool = Divide() {source_op: "AvgPool"}
div = Divide() {source_op: "RealDiv"}
window = ReduceWindow() {window_size: [1, 2, 2, 1], window_stride: [1, 2, 2, 1], padding_low: [0, 0, 0, 0], padding_high: [0, 1, 1, 0]}
batch_window = ReduceWindow() {window_size: [2, 2, 2, 1], window_stride: [1, 2, 2, 1], padding_low: [0, 0, 0, 0], padding_high: [0, 0, 0, 0]}
normal = Rng() {distribution: "normal"}
uniform = Rng() {distribution: "uniform"}
coin = Rng() {distribution: "bernoulli"}
loop = While() {condition: "truncated_normal_cond_3"}
other_loop = While() {condition: "body_cond"}
conv = Call() {callee: "convolution.12"}
dot = Call() {callee: "dot.4"}
"#,
    );
    let node = |name: &str| graph.get_node(name).expect("fixture node");

    assert!(predicates::is_constant_zero(node("zeros")));
    assert!(!predicates::is_constant_zero(node("mixed")));
    assert!(!predicates::is_constant_zero(node("pad")));
    assert!(predicates::is_constant_half(node("half")));
    assert!(!predicates::is_constant_half(node("halves")));
    assert!(predicates::is_scalar_constant(node("half")));
    assert!(!predicates::is_scalar_constant(node("zeros")));

    assert!(predicates::is_external_padding(node("pad")));
    assert!(predicates::is_external_padding(node("bare_pad")));
    assert!(!predicates::is_external_padding(node("inner_pad")));

    assert!(predicates::is_average_pool(node("pool")));
    assert!(!predicates::is_average_pool(node("div")));
    assert!(predicates::is_reduction_window_nyxc(node("window")));
    assert!(!predicates::is_reduction_window_nyxc(node("batch_window")));
    assert!(!predicates::is_reduction_window_nyxc(node("pool")));

    assert!(predicates::is_random_normal(node("normal")));
    assert!(!predicates::is_random_normal(node("uniform")));
    assert!(predicates::is_random_uniform(node("uniform")));
    assert!(predicates::is_random_bernoulli(node("coin")));
    assert!(predicates::is_truncated_normal_while(node("loop")));
    assert!(!predicates::is_truncated_normal_while(node("other_loop")));
    assert!(predicates::is_convolution_call(node("conv")));
    assert!(!predicates::is_convolution_call(node("dot")));
}
