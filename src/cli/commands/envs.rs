//! `cairn env` — environment management commands.

use crate::cli::args::EnvCommands;
use crate::error::Result;
use crate::events::{EventBus, EventSink};

use super::{confirm, error, report, App};

pub fn run(app: &App, command: &EnvCommands) -> Result<i32> {
    match command {
        EnvCommands::List => list(app),
        EnvCommands::Info { name } => info(app, name),
        EnvCommands::Create {
            name,
            parent,
            description,
        } => create(app, name, parent.as_deref(), description),
        EnvCommands::Delete { name } => delete(app, name),
        EnvCommands::Import { name, source } => import(app, name, source),
    }
}

fn list(app: &App) -> Result<i32> {
    let registry = app.env_registry(EventSink::detached())?;
    let names = registry.list();

    if names.is_empty() {
        println!("No environments registered.");
        return Ok(0);
    }

    for name in names {
        match registry.entry(&name) {
            Some(entry) => println!(
                "{:<20} {}  {}",
                console::style(&name).bold(),
                entry.path.display(),
                console::style(&entry.description).dim()
            ),
            None => println!("{}", name),
        }
    }
    Ok(0)
}

fn info(app: &App, name: &str) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let registry = app.env_registry(sink)?;

    match registry.get_info(name) {
        Some(info) => {
            println!("{}", console::style(&info.name).bold());
            println!("  path:        {}", info.path.display());
            println!("  interpreter: {}", info.python_path.display());
            println!("  version:     {}", info.version);
            println!("  created:     {}", info.created_at);
            if !info.description.is_empty() {
                println!("  description: {}", info.description);
            }
            Ok(0)
        }
        None => {
            let messages = super::failures(&rx);
            if messages.is_empty() {
                error(&format!("Environment '{}' does not exist", name));
            }
            for message in messages {
                error(&message);
            }
            Ok(1)
        }
    }
}

fn create(
    app: &App,
    name: &str,
    parent: Option<&std::path::Path>,
    description: &str,
) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let mut registry = app.env_registry(sink)?;

    let parent = parent
        .map(|p| p.to_path_buf())
        .unwrap_or_else(|| registry.envs_dir().to_path_buf());

    let ok = registry.create(name, &parent, description);
    Ok(report(
        ok,
        &format!("Created environment '{}'", name),
        &rx,
    ))
}

fn delete(app: &App, name: &str) -> Result<i32> {
    if !confirm(
        &format!("Delete environment '{}' and its directory tree?", name),
        app.assume_yes(),
    ) {
        println!("Aborted.");
        return Ok(1);
    }

    let (sink, rx) = EventBus::new();
    let mut registry = app.env_registry(sink)?;

    let ok = registry.delete(name);
    Ok(report(
        ok,
        &format!("Deleted environment '{}'", name),
        &rx,
    ))
}

fn import(app: &App, name: &str, source: &std::path::Path) -> Result<i32> {
    let (sink, rx) = EventBus::new();
    let mut registry = app.env_registry(sink)?;

    let ok = registry.import_env(source, name);
    Ok(report(
        ok,
        &format!("Imported environment '{}' from {}", name, source.display()),
        &rx,
    ))
}
