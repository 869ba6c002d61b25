use knob::{Registry, declare_all};

/// Port the service listens on.
#[knob::replaceable]
fn port() -> u16 {
    8080
}

#[knob::replaceable("redeclare_test.label")]
fn label(id: u32) -> String {
    format!("item-{id}")
}

#[test]
fn declare_all_restores_declarations_after_reset() {
    let registry = Registry::global();
    assert_eq!(port(), 8080);
    registry.replace("redeclare.port", |()| 9090_u16).unwrap();
    assert_eq!(port(), 9090);

    registry.reset();
    assert!(!registry.contains("redeclare.port"));

    assert_eq!(declare_all(), 2);
    assert!(registry.contains("redeclare.port"));
    assert!(registry.contains("redeclare_test.label"));
    assert_eq!(port(), 8080);
    assert_eq!(label(3), "item-3");

    let entry = registry
        .list_active()
        .into_iter()
        .find(|entry| entry.name().as_str() == "redeclare.port")
        .unwrap();
    assert_eq!(entry.description(), Some("Port the service listens on."));
}
