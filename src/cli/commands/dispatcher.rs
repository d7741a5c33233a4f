//! Command dispatching.
//!
//! [`App`] owns the shared context every command needs — the data
//! directory and global flags — and constructs the core services on
//! demand. Each registry is built once per command invocation and passed
//! down; there is no ambient global state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cli::args::Commands;
use crate::config::{ConfigStore, GeneralSettings, ProxySettings};
use crate::envs::EnvRegistry;
use crate::error::Result;
use crate::events::EventSink;
use crate::mirrors::MirrorRegistry;
use crate::process::ToolOptions;

use super::{completions, config, envs, mirrors, packages};

/// Shared command context.
pub struct App {
    data_dir: PathBuf,
    yes: bool,
    quiet: bool,
}

impl App {
    pub fn new(data_dir: PathBuf, yes: bool, quiet: bool) -> Self {
        Self {
            data_dir,
            yes,
            quiet,
        }
    }

    /// Default data directory: `~/.cairn`.
    pub fn default_data_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cairn")
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn assume_yes(&self) -> bool {
        self.yes
    }

    pub fn quiet(&self) -> bool {
        self.quiet
    }

    /// The configuration store under `<data-dir>/config`.
    pub fn config_store(&self, sink: EventSink) -> Result<ConfigStore> {
        ConfigStore::new(self.data_dir.join("config"), sink)
    }

    /// The environment registry, with the venv base interpreter from
    /// settings.
    pub fn env_registry(&self, sink: EventSink) -> Result<EnvRegistry> {
        let store = self.config_store(EventSink::detached())?;
        let settings = GeneralSettings::load(&store);
        EnvRegistry::new(&self.data_dir, settings.python, sink)
    }

    /// The mirror registry, with the probe timeout from settings.
    pub fn mirror_registry(&self, sink: EventSink) -> Result<MirrorRegistry> {
        let store = self.config_store(EventSink::detached())?;
        let settings = GeneralSettings::load(&store);
        Ok(MirrorRegistry::new(store, sink)
            .with_probe_timeout(Duration::from_secs(settings.probe_timeout_secs)))
    }

    /// The ambient environment overlay for installer invocations: proxy
    /// variables from the proxy settings and the index URL of the current
    /// mirror. The engine itself knows nothing about either.
    pub fn ambient_options(&self) -> Result<ToolOptions> {
        let store = self.config_store(EventSink::detached())?;
        let mut env = HashMap::new();

        for (key, value) in ProxySettings::load(&store).env_vars() {
            env.insert(key, value);
        }

        let mirrors = MirrorRegistry::new(store, EventSink::detached());
        let (key, value) = mirrors.index_env_var();
        env.insert(key, value);

        Ok(ToolOptions { cwd: None, env })
    }

    /// Route a parsed subcommand to its implementation, returning the
    /// process exit code.
    pub fn dispatch(&self, command: &Commands) -> Result<i32> {
        match command {
            Commands::Env { command } => envs::run(self, command),
            Commands::Pkg { command } => packages::run(self, command),
            Commands::Mirror { command } => mirrors::run(self, command),
            Commands::Config { command } => config::run(self, command),
            Commands::Completions(args) => completions::run(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn ambient_options_carry_index_url() {
        let temp = TempDir::new().unwrap();
        let app = App::new(temp.path().to_path_buf(), true, true);

        let options = app.ambient_options().unwrap();
        assert!(options.env.contains_key("PIP_INDEX_URL"));
        assert!(options.env.contains_key("HTTP_PROXY"));
    }

    #[test]
    fn ambient_options_clear_proxy_when_disabled() {
        let temp = TempDir::new().unwrap();
        let app = App::new(temp.path().to_path_buf(), true, true);

        let options = app.ambient_options().unwrap();
        // Disabled proxy maps to empty values, which run_tool removes
        assert_eq!(options.env.get("HTTP_PROXY").map(String::as_str), Some(""));
    }

    #[test]
    fn registries_share_the_data_dir() {
        let temp = TempDir::new().unwrap();
        let app = App::new(temp.path().to_path_buf(), false, false);

        app.env_registry(EventSink::detached()).unwrap();
        app.mirror_registry(EventSink::detached()).unwrap();

        assert!(temp.path().join("envs").is_dir());
        assert!(temp.path().join("config").is_dir());
        assert!(temp.path().join("config/mirror.json").exists());
    }
}
