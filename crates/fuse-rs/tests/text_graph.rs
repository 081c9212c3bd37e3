use fuse_rs::graph::{parse_graph, AttrValue, TensorLiteral, TextGraphError};

#[test]
fn parses_devices_and_attributes() {
    let graph = parse_graph(
        r#"
# fixtures may carry comments
x = Parameter() @"/device:CPU:0"
w = Constant() {value: tensor<2x3>[1.5], T: "float", trainable: false}
y = MatMul(x, w:0, ^x) {axes: [0, 1], names: ["lhs", "rhs"], alpha: 0.25, k: 3}
"#,
    )
    .unwrap();

    assert_eq!(graph.nodes.len(), 3);
    assert_eq!(graph.nodes[0].device, "/device:CPU:0");

    let w = graph.node("w").unwrap();
    assert_eq!(
        w.attrs.get("value"),
        Some(&AttrValue::Tensor(TensorLiteral::splat(vec![2, 3], 1.5)))
    );
    assert_eq!(w.attrs.get("T"), Some(&AttrValue::Str("float".into())));
    assert_eq!(w.attrs.get("trainable"), Some(&AttrValue::Bool(false)));

    let y = graph.node("y").unwrap();
    assert_eq!(y.inputs, vec!["x", "w:0", "^x"]);
    assert_eq!(y.attrs.get("axes"), Some(&AttrValue::IntList(vec![0, 1])));
    assert_eq!(
        y.attrs.get("names"),
        Some(&AttrValue::StrList(vec!["lhs".into(), "rhs".into()]))
    );
    assert_eq!(y.attrs.get("alpha"), Some(&AttrValue::Float(0.25)));
    assert_eq!(y.attrs.get("k"), Some(&AttrValue::Int(3)));
}

#[test]
fn reports_the_offending_line() {
    let err = parse_graph("a = Parameter()\nb Parameter()").unwrap_err();
    assert!(matches!(err, TextGraphError::Syntax { line: 2, .. }));

    let err = parse_graph("a = Parameter(").unwrap_err();
    assert_eq!(
        err.to_string(),
        "line 1: missing `)` to close the input list"
    );

    let err = parse_graph("c = Constant() {value: tensor<2x2>[1.0, 2.0]}").unwrap_err();
    assert_eq!(
        err.to_string(),
        "line 1: tensor literal has 2 values for 4 elements"
    );
}
