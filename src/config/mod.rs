//! Configuration persistence for cairn.
//!
//! All durable state lives in JSON documents under one configuration
//! directory, one document per logical domain:
//! - [`store`] — the generic document store (load/save/update/delete/list)
//! - [`settings`] — typed settings structs for the proxy, theme, and
//!   general domains, each with explicit defaults for every field
//!
//! The environment registry persists its own document (`envs.json`)
//! directly; the mirror registry persists through [`store::ConfigStore`].

pub mod settings;
pub mod store;

pub use settings::{GeneralSettings, ProxyScheme, ProxySettings, ThemeSettings};
pub use store::ConfigStore;
