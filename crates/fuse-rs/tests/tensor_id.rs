use fuse_rs::graph::{TensorId, TensorIdError, CONTROL_SLOT};

#[test]
fn parses_wire_spellings() {
    assert_eq!(TensorId::parse("a").unwrap(), TensorId::new("a", 0));
    assert_eq!(TensorId::parse("a:3").unwrap(), TensorId::new("a", 3));
    assert_eq!(TensorId::parse("^a").unwrap(), TensorId::new("a", CONTROL_SLOT));
    assert_eq!(
        TensorId::parse("scope/inner_1:12").unwrap(),
        TensorId::new("scope/inner_1", 12)
    );
    assert_eq!("b:2".parse::<TensorId>().unwrap(), TensorId::regular("b", 2).unwrap());
}

#[test]
fn regular_ports_must_fit_the_index_space() {
    let last = u32::try_from(i32::MAX).unwrap();
    assert_eq!(TensorId::regular("a", last).unwrap().index, i32::MAX);
    assert_eq!(
        TensorId::regular("a", last + 1),
        Err(TensorIdError::PortOutOfRange {
            node: "a".into(),
            index: last + 1,
        })
    );
    assert_eq!(
        TensorId::regular("a", u32::MAX),
        Err(TensorIdError::PortOutOfRange {
            node: "a".into(),
            index: u32::MAX,
        })
    );
}

#[test]
fn rejects_malformed_references() {
    assert_eq!(TensorId::parse(""), Err(TensorIdError::Empty));
    assert_eq!(
        TensorId::parse("a:-1"),
        Err(TensorIdError::NegativePort("a:-1".into()))
    );
    assert_eq!(
        TensorId::parse("a:x"),
        Err(TensorIdError::MalformedPort("a:x".into()))
    );
    assert_eq!(
        TensorId::parse("^"),
        Err(TensorIdError::MissingProducer("^".into()))
    );
    assert_eq!(
        TensorId::parse(":1"),
        Err(TensorIdError::MissingProducer(":1".into()))
    );
}

#[test]
fn renders_full_and_canonical_forms() {
    let port_zero = TensorId::new("a", 0);
    assert_eq!(port_zero.to_string(), "a:0");
    assert_eq!(port_zero.canonical(), "a");

    let port_two = TensorId::new("a", 2);
    assert_eq!(port_two.to_string(), "a:2");
    assert_eq!(port_two.canonical(), "a:2");

    let control = TensorId::control("a");
    assert!(control.is_control());
    assert!(!control.is_regular());
    assert_eq!(control.to_string(), "^a");
    assert_eq!(control.canonical(), "^a");

    let invalid = TensorId::new("a", -2);
    assert!(!invalid.is_valid());
    assert_eq!(invalid.to_string(), "a:-2");
}
