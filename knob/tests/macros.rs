use knob::{ConfigSource, Registry, declare_all, install_overrides};

/// Greeting shown on the landing page.
#[knob::replaceable]
pub fn greeting() -> String {
    "hello".to_owned()
}

#[knob::replaceable("macros_test.scale")]
fn scale(value: u32, factor: u32) -> u32 {
    value * factor
}

#[knob::replace("macros_test.scale")]
fn scale_plus_one(value: u32, factor: u32) -> u32 {
    value * factor + 1
}

#[knob::replaceable]
fn farewell() -> String {
    "bye".to_owned()
}

#[knob::replace("macros.farewell", include_original)]
fn louder_farewell(original: &dyn Fn(()) -> String) -> String {
    original(()).to_uppercase() + "!"
}

#[knob::replaceable(name = "macros_test.lazy")]
fn lazy(count: u8) -> u8 {
    count
}

#[test]
fn names_derive_from_module_path() {
    declare_all();
    let registry = Registry::global();

    assert!(registry.contains("macros.greeting"));
    assert!(registry.contains("macros.farewell"));
    assert!(registry.contains("macros_test.scale"));

    let entry = registry
        .list_active()
        .into_iter()
        .find(|entry| entry.name().as_str() == "macros.greeting")
        .unwrap();
    assert_eq!(entry.description(), Some("Greeting shown on the landing page."));
    assert_eq!(entry.source(), &ConfigSource::Default);
    assert_eq!(greeting(), "hello");
}

#[test]
fn replace_attribute_takes_effect_after_install() {
    declare_all();
    let installed = install_overrides(Registry::global()).unwrap();

    assert_eq!(installed, 2);
    assert_eq!(scale(2, 3), 7);
    assert_eq!(farewell(), "BYE!");
    assert_eq!(scale_plus_one(1, 1), 2);
}

#[test]
fn first_call_declares_lazily() {
    assert_eq!(lazy(9), 9);
    assert!(Registry::global().contains("macros_test.lazy"));
}
