//! CLI command implementations.
//!
//! Commands are dispatched via [`App`], which routes CLI subcommands to
//! their implementations. The commands are presentation glue: they build
//! the core registries, run one operation, drain the event channel, and
//! render what arrived. All invariants live in the core.

pub mod completions;
pub mod config;
pub mod dispatcher;
pub mod envs;
pub mod mirrors;
pub mod packages;

pub use dispatcher::App;

use crate::events::Event;
use std::sync::mpsc::Receiver;

/// Print a success line.
pub(crate) fn success(message: &str) {
    println!("{} {}", console::style("✓").green(), message);
}

/// Print an error line.
pub(crate) fn error(message: &str) {
    eprintln!("{} {}", console::style("✗").red(), message);
}

/// Drain all pending [`Event::OperationFailed`] messages.
pub(crate) fn failures(rx: &Receiver<Event>) -> Vec<String> {
    rx.try_iter()
        .filter_map(|event| match event {
            Event::OperationFailed { message } => Some(message),
            _ => None,
        })
        .collect()
}

/// Render one operation's outcome: the success line, or every failure
/// message the operation emitted. Returns the exit code.
pub(crate) fn report(ok: bool, success_message: &str, rx: &Receiver<Event>) -> i32 {
    if ok {
        success(success_message);
        0
    } else {
        let messages = failures(rx);
        if messages.is_empty() {
            error("operation failed");
        }
        for message in messages {
            error(&message);
        }
        1
    }
}

/// Ask for confirmation before a destructive action.
pub(crate) fn confirm(prompt: &str, assume_yes: bool) -> bool {
    if assume_yes {
        return true;
    }
    dialoguer::Confirm::new()
        .with_prompt(prompt)
        .default(false)
        .interact()
        .unwrap_or(false)
}
