//! CLI argument definitions.
//!
//! This module defines all CLI arguments using clap's derive macros.
//! The main entry point is the [`Cli`] struct.

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// cairn - Manage Python virtual environments and their packages.
#[derive(Debug, Parser)]
#[command(name = "cairn")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Data directory holding registries, environments, and configuration
    #[arg(long, global = true, env = "CAIRN_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Minimal output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Assume yes for confirmation prompts
    #[arg(short = 'y', long, global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage virtual environments
    Env {
        #[command(subcommand)]
        command: EnvCommands,
    },

    /// Manage packages inside an environment
    Pkg {
        #[command(subcommand)]
        command: PkgCommands,
    },

    /// Manage package index mirrors
    Mirror {
        #[command(subcommand)]
        command: MirrorCommands,
    },

    /// Show or change configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },

    /// Generate shell completions
    Completions(CompletionsArgs),
}

/// Environment subcommands.
#[derive(Debug, Subcommand)]
pub enum EnvCommands {
    /// List registered environments
    List,

    /// Show one environment, including its live interpreter version
    Info { name: String },

    /// Create a new virtual environment
    Create {
        name: String,

        /// Directory to create the environment under (defaults to the
        /// managed environments directory)
        #[arg(long)]
        parent: Option<PathBuf>,

        /// Free-text description
        #[arg(long, default_value = "")]
        description: String,
    },

    /// Delete an environment and its directory tree
    Delete { name: String },

    /// Import an existing environment by copying it
    Import {
        /// Name to register the imported environment under
        name: String,

        /// Existing environment directory to copy
        source: PathBuf,
    },
}

/// Package subcommands. Every operation is bound to one environment.
#[derive(Debug, Subcommand)]
pub enum PkgCommands {
    /// List installed packages with metadata
    List {
        /// Environment name
        #[arg(short, long)]
        env: String,

        /// Emit the record set as JSON
        #[arg(long)]
        json: bool,
    },

    /// List installed packages with their newest available versions
    Outdated {
        #[arg(short, long)]
        env: String,
    },

    /// Install a package (`name` or `name==version`)
    Install {
        #[arg(short, long)]
        env: String,

        spec: String,
    },

    /// Uninstall a package
    Uninstall {
        #[arg(short, long)]
        env: String,

        name: String,
    },

    /// Upgrade a package to the newest available version
    Upgrade {
        #[arg(short, long)]
        env: String,

        name: String,
    },
}

/// Mirror subcommands.
#[derive(Debug, Subcommand)]
pub enum MirrorCommands {
    /// List mirrors, official index first
    List,

    /// Register a mirror
    Add { name: String, url: String },

    /// Remove a mirror
    Remove { name: String },

    /// Switch the current mirror
    Use { name: String },

    /// Measure latency of every registered mirror
    Test,

    /// Probe all mirrors and switch to the fastest reachable one
    Fastest,

    /// Discard user mirrors and restore the built-in defaults
    Reset,
}

/// Configuration subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show stored configuration domains and current settings
    Show,

    /// Change proxy settings applied around installer invocations
    Proxy(ProxyArgs),
}

/// Arguments for `config proxy`.
#[derive(Debug, Clone, clap::Args)]
pub struct ProxyArgs {
    /// Enable the proxy
    #[arg(long, conflicts_with = "disable")]
    pub enable: bool,

    /// Disable the proxy
    #[arg(long)]
    pub disable: bool,

    /// Proxy scheme: http or socks5
    #[arg(long)]
    pub scheme: Option<String>,

    /// Proxy host
    #[arg(long)]
    pub host: Option<String>,

    /// Proxy port
    #[arg(long)]
    pub port: Option<u16>,

    /// Proxy username
    #[arg(long)]
    pub username: Option<String>,

    /// Proxy password
    #[arg(long)]
    pub password: Option<String>,
}

/// Arguments for the `completions` command.
#[derive(Debug, Clone, clap::Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_structure_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_env_create() {
        let cli = Cli::try_parse_from([
            "cairn",
            "env",
            "create",
            "dev",
            "--parent",
            "/tmp/envs",
            "--description",
            "scratch",
        ])
        .unwrap();

        match cli.command {
            Commands::Env {
                command:
                    EnvCommands::Create {
                        name,
                        parent,
                        description,
                    },
            } => {
                assert_eq!(name, "dev");
                assert_eq!(parent, Some(PathBuf::from("/tmp/envs")));
                assert_eq!(description, "scratch");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn parses_pkg_install_with_env() {
        let cli =
            Cli::try_parse_from(["cairn", "pkg", "install", "--env", "dev", "requests==2.31.0"])
                .unwrap();

        match cli.command {
            Commands::Pkg {
                command: PkgCommands::Install { env, spec },
            } => {
                assert_eq!(env, "dev");
                assert_eq!(spec, "requests==2.31.0");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn global_flags_apply_anywhere() {
        let cli = Cli::try_parse_from(["cairn", "mirror", "list", "--data-dir", "/tmp/d", "-y"])
            .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/d")));
        assert!(cli.yes);
    }

    #[test]
    fn proxy_enable_disable_conflict() {
        let result = Cli::try_parse_from(["cairn", "config", "proxy", "--enable", "--disable"]);
        assert!(result.is_err());
    }
}
