//! Prints the active configuration after running the startup sequence.
//!
//! ```text
//! KNOB_DEMO__WORKERS=8 cargo run -p print-config -- --local-setup-root ./conf
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use knob::config::{ChainedModules, FileModules, LinkedModules, bootstrap, settings};
use knob::{Registry, render_table};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Number of worker threads serving requests.
#[knob::replaceable("demo.workers")]
fn workers() -> u32 {
    4
}

/// Greeting shown to visitors.
#[knob::replaceable("demo.greeting")]
fn greeting() -> String {
    "hello".to_owned()
}

#[knob::replace("demo.greeting", include_original)]
fn friendly_greeting(original: &dyn Fn(()) -> String) -> String {
    format!("{}, friend", original(()))
}

fn apply_demo_setup(registry: &Registry) -> knob::config::ConfigResult<()> {
    registry.replace(settings::DEBUG, |()| true)?;
    Ok(())
}

knob::local_setup!("demo.local_setup", apply_demo_setup);

#[derive(Debug, Parser)]
#[command(about = "Print the active knob configuration")]
struct Args {
    /// Application module used to find local setup, e.g. `demo.app`.
    #[arg(long)]
    app: Option<String>,

    /// Environment variable prefix, without the trailing underscore.
    #[arg(long)]
    prefix: Option<String>,

    /// Directory holding `local_setup.toml` files laid out by module path.
    #[arg(long)]
    local_setup_root: Option<PathBuf>,

    /// Print JSON instead of a table.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let args = Args::parse();
    let registry = Registry::global();

    knob::config::Settings::declare(registry)?;
    if let Some(app) = args.app {
        registry.replace(settings::APP_MODULE, move |()| app.clone())?;
    }
    if let Some(prefix) = args.prefix {
        registry.replace(settings::ENVIRONMENT_PREFIX, move |()| prefix.clone())?;
    }

    let mut source = ChainedModules::new().with(LinkedModules);
    if let Some(root) = args.local_setup_root {
        source = source.with(FileModules::new(root));
    }

    let report = bootstrap(registry, &source).context("failed to load configuration")?;
    info!(
        local_setup = ?report.local_setup,
        from_environment = report.environment.installed.len(),
        "configuration ready"
    );
    info!(workers = workers(), greeting = %greeting(), "demo settings");

    let active = registry.list_active();
    if args.json {
        println!("{}", serde_json::to_string_pretty(&active)?);
    } else {
        print!("{}", render_table(&active));
    }
    Ok(())
}
