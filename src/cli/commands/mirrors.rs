//! `cairn mirror` — mirror registry commands.

use indicatif::ProgressBar;
use std::time::Duration;

use crate::cli::args::MirrorCommands;
use crate::error::Result;
use crate::events::{Event, EventBus, EventSink};
use crate::mirrors::MirrorLatency;

use super::{confirm, error, report, App};

pub fn run(app: &App, command: &MirrorCommands) -> Result<i32> {
    match command {
        MirrorCommands::List => list(app),
        MirrorCommands::Add { name, url } => add(app, name, url),
        MirrorCommands::Remove { name } => remove(app, name),
        MirrorCommands::Use { name } => use_mirror(app, name),
        MirrorCommands::Test => test(app),
        MirrorCommands::Fastest => fastest(app),
        MirrorCommands::Reset => reset(app),
    }
}

fn list(app: &App) -> Result<i32> {
    let registry = app.mirror_registry(EventSink::detached())?;
    let (current, _) = registry.get_current();

    for (name, url) in registry.list() {
        let marker = if name == current { "*" } else { " " };
        println!(
            "{} {:<16} {}",
            console::style(marker).green(),
            console::style(&name).bold(),
            url
        );
    }
    Ok(0)
}

fn add(app: &App, name: &str, url: &str) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let mut registry = app.mirror_registry(sink)?;

    let ok = registry.add(name, url);
    Ok(report(ok, &format!("Added mirror '{}'", name), &rx))
}

fn remove(app: &App, name: &str) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let mut registry = app.mirror_registry(sink)?;

    let ok = registry.remove(name);
    Ok(report(ok, &format!("Removed mirror '{}'", name), &rx))
}

fn use_mirror(app: &App, name: &str) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let mut registry = app.mirror_registry(sink)?;

    let ok = registry.set_current(name);
    let (_, url) = registry.get_current();
    Ok(report(
        ok,
        &format!("Current mirror is now '{}' ({})", name, url),
        &rx,
    ))
}

fn test(app: &App) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let registry = app.mirror_registry(sink)?;

    let spinner = spinner(app, "probing mirrors");
    registry.test_all();
    spinner.finish_and_clear();

    let results = rx.try_iter().find_map(|event| match event {
        Event::SpeedTestFinished { results } => Some(results),
        _ => None,
    });

    match results {
        Some(results) => {
            render_latencies(&results);
            Ok(0)
        }
        None => {
            error("Speed test produced no result");
            Ok(1)
        }
    }
}

fn fastest(app: &App) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let mut registry = app.mirror_registry(sink)?;

    let spinner = spinner(app, "probing mirrors");
    let best = registry.fastest();
    spinner.finish_and_clear();

    match best {
        Some((name, url)) => {
            let ok = registry.set_current(&name);
            Ok(report(
                ok,
                &format!("Fastest mirror is '{}' ({}), now current", name, url),
                &rx,
            ))
        }
        None => {
            error("No mirror is reachable");
            Ok(1)
        }
    }
}

fn reset(app: &App) -> Result<i32> {
    if !confirm(
        "Discard all user mirrors and restore the defaults?",
        app.assume_yes(),
    ) {
        println!("Aborted.");
        return Ok(1);
    }

    let (sink, rx) = EventBus::new();
    let mut registry = app.mirror_registry(sink)?;

    let ok = registry.reset_to_default();
    Ok(report(ok, "Mirror registry reset to defaults", &rx))
}

fn spinner(app: &App, message: &str) -> ProgressBar {
    if app.quiet() {
        ProgressBar::hidden()
    } else {
        let spinner = ProgressBar::new_spinner();
        spinner.set_message(message.to_string());
        spinner.enable_steady_tick(Duration::from_millis(100));
        spinner
    }
}

fn render_latencies(results: &[MirrorLatency]) {
    if results.is_empty() {
        println!("No user mirrors registered.");
        return;
    }

    for result in results {
        let latency = match result.latency_ms() {
            Some(ms) => format!("{} ms", ms),
            None => console::style("unreachable").red().to_string(),
        };
        println!("{:<16} {:<52} {}", result.name, result.url, latency);
    }
}
