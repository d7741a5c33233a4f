//! Package operations against one environment's interpreter.
//!
//! - [`record`] — the in-memory package record and dependency linking
//! - [`pip`] — interpreter-bound pip invocations and output parsing
//! - [`engine`] — the operations engine: load, update check,
//!   install/uninstall/upgrade, cooperative cancellation

pub mod engine;
pub mod pip;
pub mod record;

pub use engine::{CancelFlag, PackageEngine};
pub use pip::PipClient;
pub use record::PackageRecord;
