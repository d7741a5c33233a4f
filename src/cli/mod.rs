//! Command-line interface for cairn.
//!
//! This module provides the CLI argument parsing using clap's derive macros
//! and command implementations.
//!
//! # Architecture
//!
//! - [`args`] - Argument definitions using clap derive macros
//! - [`commands`] - Command implementations and the dispatcher

pub mod args;
pub mod commands;

pub use args::{Cli, Commands};
pub use commands::App;
