//! `cairn pkg` — package operations against one environment.
//!
//! Each operation resolves the environment's interpreter, binds an engine
//! to it (construction fails hard on a dead interpreter), composes the
//! ambient installer environment (proxy variables, index URL), then drives
//! the engine while rendering its events. Long enumerations run on a
//! worker thread so the progress bar tracks events as they arrive.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::mpsc::Receiver;
use std::time::Duration;

use crate::cli::args::PkgCommands;
use crate::error::Result;
use crate::events::{Event, EventBus, EventSink};
use crate::packages::{PackageEngine, PackageRecord};

use super::{error, failures, success, App};

pub fn run(app: &App, command: &PkgCommands) -> Result<i32> {
    match command {
        PkgCommands::List { env, json } => enumerate(app, env, false, *json),
        PkgCommands::Outdated { env } => enumerate(app, env, true, false),
        PkgCommands::Install { env, spec } => install(app, env, spec),
        PkgCommands::Uninstall { env, name } => uninstall(app, env, name),
        PkgCommands::Upgrade { env, name } => upgrade(app, env, name),
    }
}

/// Resolve the interpreter and bind an engine, printing any failure.
fn bind_engine(app: &App, env: &str, sink: EventSink) -> Result<Option<PackageEngine>> {
    let (registry_sink, registry_rx) = EventBus::new();
    let registry = app.env_registry(registry_sink)?;

    let Some(python) = registry.resolve_interpreter(env) else {
        let messages = failures(&registry_rx);
        if messages.is_empty() {
            error(&format!("Environment '{}' does not exist", env));
        }
        for message in messages {
            error(&message);
        }
        return Ok(None);
    };

    match PackageEngine::new(python, env, app.ambient_options()?, sink) {
        Ok(engine) => Ok(Some(engine)),
        Err(e) => {
            error(&e.to_string());
            Ok(None)
        }
    }
}

/// Run `load` or `check_updates` on a worker thread, tracking progress
/// events, and render the final record set.
fn enumerate(app: &App, env: &str, outdated: bool, json: bool) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let Some(engine) = bind_engine(app, env, sink)? else {
        return Ok(1);
    };

    let bar = if app.quiet() || json {
        ProgressBar::hidden()
    } else {
        let bar = ProgressBar::new(100);
        bar.set_style(
            ProgressStyle::with_template("{bar:30} {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_message(format!("loading packages in '{}'", env));
        bar
    };

    let outcome = std::thread::scope(|scope| {
        scope.spawn(|| {
            if outdated {
                engine.check_updates()
            } else {
                engine.load()
            }
        });

        collect_result(&rx, &bar)
    });
    bar.finish_and_clear();

    match outcome {
        Ok(packages) => {
            render_packages(&packages, outdated, json);
            Ok(0)
        }
        Err(message) => {
            error(&message);
            Ok(1)
        }
    }
}

/// Consume events until the single result or failure event arrives.
fn collect_result(
    rx: &Receiver<Event>,
    bar: &ProgressBar,
) -> std::result::Result<Vec<PackageRecord>, String> {
    loop {
        match rx.recv() {
            Ok(Event::Progress { percent }) => bar.set_position(u64::from(percent)),
            Ok(Event::PackagesLoaded { packages }) => return Ok(packages),
            Ok(Event::OperationFailed { message }) => return Err(message),
            Ok(_) => {}
            Err(_) => return Err("operation ended without a result".to_string()),
        }
    }
}

fn render_packages(packages: &[PackageRecord], outdated: bool, json: bool) {
    if json {
        match serde_json::to_string_pretty(packages) {
            Ok(text) => println!("{}", text),
            Err(e) => error(&format!("Failed to serialize records: {}", e)),
        }
        return;
    }

    if packages.is_empty() {
        println!("No packages installed.");
        return;
    }

    for package in packages {
        if outdated {
            let latest = package.latest_version.as_deref().unwrap_or("-");
            let marker = if package.latest_version.as_deref().is_some_and(|l| l != package.version)
            {
                console::style("update available").yellow().to_string()
            } else {
                String::new()
            };
            println!(
                "{:<30} {:<12} {:<12} {}",
                package.name, package.version, latest, marker
            );
        } else {
            let installed = package.installed_at.as_deref().unwrap_or("-");
            let parent = package
                .parent
                .as_deref()
                .map(|p| format!("via {}", p))
                .unwrap_or_default();
            println!(
                "{:<30} {:<12} {:<20} {}",
                package.name,
                package.version,
                installed,
                console::style(parent).dim()
            );
        }
    }
}

/// Run a mutating operation under a spinner and render its terminal event.
fn mutate(
    app: &App,
    env: &str,
    message: String,
    operation: impl FnOnce(&PackageEngine) -> bool,
) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let Some(engine) = bind_engine(app, env, sink)? else {
        return Ok(1);
    };

    let spinner = if app.quiet() {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(message);
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    };

    let ok = operation(&engine);
    spinner.finish_and_clear();

    for event in rx.try_iter() {
        match event {
            Event::PackageInstalled { spec } => success(&format!("Installed {}", spec)),
            Event::PackageUninstalled { name } => success(&format!("Uninstalled {}", name)),
            Event::PackageUpgraded { name } => success(&format!("Upgraded {}", name)),
            Event::OperationFailed { message } => error(&message),
            _ => {}
        }
    }

    Ok(if ok { 0 } else { 1 })
}

fn install(app: &App, env: &str, spec: &str) -> Result<i32> {
    mutate(app, env, format!("installing {}", spec), |engine| {
        engine.install(spec)
    })
}

fn uninstall(app: &App, env: &str, name: &str) -> Result<i32> {
    mutate(app, env, format!("uninstalling {}", name), |engine| {
        engine.uninstall(name)
    })
}

fn upgrade(app: &App, env: &str, name: &str) -> Result<i32> {
    mutate(app, env, format!("upgrading {}", name), |engine| {
        engine.upgrade(name)
    })
}
