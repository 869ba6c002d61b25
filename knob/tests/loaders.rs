use std::fs;

use knob::Registry;
use knob::config::{EnvironmentLoader, FileModules, Settings, load_from_local_setup};
use tempfile::TempDir;

#[test]
fn environment_variable_overrides_nested_name() {
    let registry = Registry::new();
    let item = registry.declare("pkg.sub.item", || "x".to_owned()).unwrap();

    EnvironmentLoader::with_prefix(&registry, "PREFIX")
        .load([("PREFIX_PKG__SUB__ITEM", "y")])
        .unwrap();

    assert_eq!(item.get(), "y");
}

#[test]
fn environment_values_are_typed() {
    let registry = Registry::new();
    EnvironmentLoader::with_prefix(&registry, "APP")
        .load([
            ("APP_ANSWER", "42"),
            ("APP_RATIO", "1,5"),
            ("APP_ON", "true"),
            ("APP_OFF", "0"),
            ("APP_NAME", "shop"),
        ])
        .unwrap();

    let values: Vec<_> = registry
        .list_active()
        .iter()
        .map(|entry| (entry.name().to_string(), entry.evaluate().unwrap()))
        .collect();
    assert_eq!(
        values,
        [
            ("answer".to_owned(), serde_json::json!(42)),
            ("name".to_owned(), serde_json::json!("shop")),
            ("off".to_owned(), serde_json::json!(0)),
            ("on".to_owned(), serde_json::json!(true)),
            ("ratio".to_owned(), serde_json::json!(1.5)),
        ]
    );

    let off = registry.declare("off", || true).unwrap();
    assert!(!off.get());
}

#[test]
fn local_setup_falls_back_to_shortest_existing_path() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("a")).unwrap();
    fs::write(dir.path().join("a").join("local_setup.toml"), "debug = true\n").unwrap();

    let registry = Registry::new();
    let settings = Settings::declare(&registry).unwrap();
    registry
        .replace(knob::config::settings::APP_MODULE, |()| "a.b.c".to_owned())
        .unwrap();

    let loaded = load_from_local_setup(&registry, &FileModules::new(dir.path())).unwrap();

    assert_eq!(loaded.as_deref(), Some("a.local_setup"));
    assert!(settings.debug());
}

#[test]
#[serial_test::serial]
fn bootstrap_applies_process_environment_last() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join("shop")).unwrap();
    fs::write(
        dir.path().join("shop").join("local_setup.toml"),
        "[checkout]\nretries = 2\n",
    )
    .unwrap();

    // SAFETY: serialized with every other test touching the environment.
    unsafe {
        std::env::set_var("KNOB_APP", "shop.app");
        std::env::set_var("KNOB_CHECKOUT__RETRIES", "5");
    }
    let registry = Registry::new();
    let retries = registry.declare("checkout.retries", || 1_u32).unwrap();
    let report = knob::config::bootstrap(&registry, &FileModules::new(dir.path()));
    // SAFETY: as above.
    unsafe {
        std::env::remove_var("KNOB_APP");
        std::env::remove_var("KNOB_CHECKOUT__RETRIES");
    }

    let report = report.unwrap();
    assert_eq!(report.local_setup.as_deref(), Some("shop.local_setup"));
    assert_eq!(retries.get(), 5);
}
