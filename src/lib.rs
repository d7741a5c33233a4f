//! cairn - Manage Python virtual environments and their packages.
//!
//! cairn wraps the platform tools (`python -m venv`, `python -m pip`)
//! behind a small core of owned services plus a thin CLI shell. The core
//! tracks named environments, resolves each to its interpreter, drives
//! package operations against that interpreter, and reconciles the results
//! into a consistent, persisted view.
//!
//! # Modules
//!
//! - [`cli`] - Command-line interface and argument parsing
//! - [`config`] - JSON configuration store and typed settings domains
//! - [`envs`] - Environment registry and interpreter resolution
//! - [`error`] - Error types and result aliases
//! - [`events`] - Completion/progress event channel between core and shell
//! - [`mirrors`] - Mirror registry and latency probing
//! - [`packages`] - Package operations engine over an environment's pip
//! - [`process`] - External tool invocation
//!
//! # Example
//!
//! ```no_run
//! use cairn::envs::EnvRegistry;
//! use cairn::events::EventBus;
//! use std::path::Path;
//!
//! let (sink, events) = EventBus::new();
//! let mut registry = EnvRegistry::new(Path::new("/tmp/cairn"), "python3", sink).unwrap();
//! if registry.create("dev", Path::new("/tmp/envs"), "scratch env") {
//!     println!("created: {:?}", registry.get_info("dev"));
//! }
//! # drop(events);
//! ```

pub mod cli;
pub mod config;
pub mod envs;
pub mod error;
pub mod events;
pub mod mirrors;
pub mod packages;
pub mod process;

pub use error::{CairnError, Result};
