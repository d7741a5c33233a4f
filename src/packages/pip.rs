//! Interpreter-bound pip invocations and output parsing.
//!
//! Every pip call runs as `<interpreter> -m pip ...` so the operation
//! always targets the bound environment, never whatever `pip` happens to be
//! on PATH. Parsers are line-oriented and tolerant: they extract what they
//! recognize and ignore the rest.

use regex::Regex;
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::OnceLock;

use crate::error::Result;
use crate::process::{run_tool, ToolOptions, ToolOutput};

/// One entry of `pip list --format=json`.
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct ListedPackage {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
}

/// Parsed `pip show` output.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ShowInfo {
    pub location: Option<PathBuf>,
    pub requires: Vec<String>,
}

/// Command builder for one interpreter's pip.
#[derive(Debug, Clone)]
pub struct PipClient {
    python: PathBuf,
    options: ToolOptions,
}

impl PipClient {
    /// Bind to an interpreter. `options` carries the ambient environment
    /// overlay (proxy variables, index URL) composed by the shell layer.
    pub fn new(python: PathBuf, options: ToolOptions) -> Self {
        Self { python, options }
    }

    pub fn python(&self) -> &PathBuf {
        &self.python
    }

    fn run(&self, args: &[&str]) -> Result<ToolOutput> {
        run_tool(self.python.as_os_str(), args, &self.options)
    }

    /// `<python> --version`.
    pub fn version_query(&self) -> Result<ToolOutput> {
        self.run(&["--version"])
    }

    /// `pip list --format=json`, parsed. A nonzero exit or unparseable
    /// listing is an error carrying pip's diagnostic text.
    pub fn list_installed(&self) -> Result<Vec<ListedPackage>> {
        let output = self.run(&["-m", "pip", "list", "--format=json"])?;
        if !output.success {
            return Err(crate::error::CairnError::ToolFailed {
                tool: "pip list".to_string(),
                code: output.exit_code,
                stderr: output.stderr,
            });
        }
        parse_listing(&output.stdout).map_err(|message| crate::error::CairnError::ToolFailed {
            tool: "pip list".to_string(),
            code: output.exit_code,
            stderr: message,
        })
    }

    /// `pip show <name>`, parsed. A failed query degrades to empty info —
    /// location and requirements are best-effort fields.
    pub fn show(&self, name: &str) -> ShowInfo {
        match self.run(&["-m", "pip", "show", name]) {
            Ok(output) if output.success => parse_show_output(&output.stdout),
            Ok(output) => {
                tracing::warn!("pip show {} failed: {}", name, output.stderr.trim());
                ShowInfo::default()
            }
            Err(e) => {
                tracing::warn!("pip show {} failed to run: {}", name, e);
                ShowInfo::default()
            }
        }
    }

    /// `pip index versions <name>`, extracting the `LATEST:` marker.
    pub fn latest_version(&self, name: &str) -> Option<String> {
        match self.run(&["-m", "pip", "index", "versions", name]) {
            Ok(output) if output.success => parse_latest_version(&output.stdout),
            Ok(output) => {
                tracing::warn!(
                    "pip index versions {} failed: {}",
                    name,
                    output.stderr.trim()
                );
                None
            }
            Err(e) => {
                tracing::warn!("pip index versions {} failed to run: {}", name, e);
                None
            }
        }
    }

    /// `pip install [--upgrade] <spec>`.
    pub fn install(&self, spec: &str, upgrade: bool) -> Result<ToolOutput> {
        let mut args = vec!["-m", "pip", "install"];
        if upgrade {
            args.push("--upgrade");
        }
        args.push(spec);
        self.run(&args)
    }

    /// `pip uninstall -y <name>`.
    pub fn uninstall(&self, name: &str) -> Result<ToolOutput> {
        self.run(&["-m", "pip", "uninstall", "-y", name])
    }
}

/// Parse a `pip list --format=json` listing.
pub fn parse_listing(stdout: &str) -> std::result::Result<Vec<ListedPackage>, String> {
    serde_json::from_str(stdout.trim()).map_err(|e| format!("unparseable package listing: {}", e))
}

/// Parse `pip show` output: `Location:` and the comma-separated
/// `Requires:` line.
pub fn parse_show_output(stdout: &str) -> ShowInfo {
    let mut info = ShowInfo::default();
    for line in stdout.lines() {
        if let Some(value) = line.strip_prefix("Location:") {
            let value = value.trim();
            if !value.is_empty() {
                info.location = Some(PathBuf::from(value));
            }
        } else if let Some(value) = line.strip_prefix("Requires:") {
            info.requires = value
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
        }
    }
    info
}

/// Extract the version from the first line carrying a `LATEST:` marker.
pub fn parse_latest_version(stdout: &str) -> Option<String> {
    static LATEST: OnceLock<Regex> = OnceLock::new();
    let re = LATEST.get_or_init(|| Regex::new(r"LATEST:\s*(\S+)").unwrap());
    re.captures(stdout).map(|caps| caps[1].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_listing_valid() {
        let listed = parse_listing(r#"[{"name": "requests", "version": "2.31.0"}]"#).unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "requests");
        assert_eq!(listed[0].version, "2.31.0");
    }

    #[test]
    fn parse_listing_empty() {
        assert!(parse_listing("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_listing_garbage_is_err() {
        assert!(parse_listing("WARNING: something").is_err());
    }

    #[test]
    fn parse_show_extracts_location_and_requires() {
        let stdout = "Name: requests\n\
                      Version: 2.31.0\n\
                      Location: /envs/dev/lib/python3.12/site-packages\n\
                      Requires: charset-normalizer, idna, urllib3, certifi\n\
                      Required-by: \n";
        let info = parse_show_output(stdout);
        assert_eq!(
            info.location,
            Some(PathBuf::from("/envs/dev/lib/python3.12/site-packages"))
        );
        assert_eq!(
            info.requires,
            vec!["charset-normalizer", "idna", "urllib3", "certifi"]
        );
    }

    #[test]
    fn parse_show_empty_requires_line() {
        let info = parse_show_output("Name: six\nLocation: /x\nRequires: \n");
        assert!(info.requires.is_empty());
        assert_eq!(info.location, Some(PathBuf::from("/x")));
    }

    #[test]
    fn parse_show_missing_fields() {
        let info = parse_show_output("Name: odd\n");
        assert!(info.location.is_none());
        assert!(info.requires.is_empty());
    }

    #[test]
    fn parse_latest_takes_first_marker() {
        let stdout = "requests (2.31.0)\n\
                      Available versions: 2.31.0, 2.30.0\n\
                      \x20 LATEST: 2.31.0\n\
                      \x20 LATEST: 9.9.9\n";
        assert_eq!(parse_latest_version(stdout), Some("2.31.0".to_string()));
    }

    #[test]
    fn parse_latest_absent() {
        assert!(parse_latest_version("requests (2.31.0)").is_none());
    }
}
