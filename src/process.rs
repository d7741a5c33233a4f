//! External tool invocation.
//!
//! Every interaction with the platform tools (an environment's interpreter,
//! `python -m venv`, `python -m pip ...`) goes through [`run_tool`]: one
//! blocking call out, wait for the exit code and captured output, then hand
//! the result back. Nonzero exit is data, not an error — callers decide what
//! a failure means. Only a spawn failure (binary missing, not executable)
//! surfaces as `Err`.

use crate::error::{CairnError, Result};
use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

/// Result of invoking an external tool.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    /// Exit code (None if killed by signal).
    pub exit_code: Option<i32>,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Execution duration.
    pub duration: Duration,

    /// Whether the tool exited with code 0.
    pub success: bool,
}

/// Options for tool invocation.
#[derive(Debug, Clone, Default)]
pub struct ToolOptions {
    /// Working directory.
    pub cwd: Option<PathBuf>,

    /// Environment variables merged over the inherited environment.
    ///
    /// An empty value removes the variable instead of setting it — this is
    /// how disabled proxy configuration clears `HTTP_PROXY`/`HTTPS_PROXY`
    /// around installer invocations.
    pub env: HashMap<String, String>,
}

/// Invoke a program with arguments, capturing both output streams.
pub fn run_tool<S: AsRef<OsStr>>(
    program: &OsStr,
    args: &[S],
    options: &ToolOptions,
) -> Result<ToolOutput> {
    let start = Instant::now();

    let mut cmd = Command::new(program);
    cmd.args(args);

    if let Some(cwd) = &options.cwd {
        cmd.current_dir(cwd);
    }

    for (key, value) in &options.env {
        if value.is_empty() {
            cmd.env_remove(key);
        } else {
            cmd.env(key, value);
        }
    }

    let output = cmd.output().map_err(|e| CairnError::ToolFailed {
        tool: program.to_string_lossy().to_string(),
        code: None,
        stderr: e.to_string(),
    })?;

    Ok(ToolOutput {
        exit_code: output.status.code(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        duration: start.elapsed(),
        success: output.status.success(),
    })
}

/// Convenience wrapper taking string program and args.
pub fn run(program: &str, args: &[&str], options: &ToolOptions) -> Result<ToolOutput> {
    run_tool(OsStr::new(program), args, options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(unix)]
    #[test]
    fn run_successful_command() {
        let result = run("true", &[], &ToolOptions::default()).unwrap();
        assert!(result.success);
        assert_eq!(result.exit_code, Some(0));
    }

    #[cfg(unix)]
    #[test]
    fn run_failing_command_is_ok_with_failure() {
        let result = run("false", &[], &ToolOptions::default()).unwrap();
        assert!(!result.success);
        assert_eq!(result.exit_code, Some(1));
    }

    #[test]
    fn run_missing_binary_is_err() {
        let result = run("cairn-no-such-binary", &[], &ToolOptions::default());
        assert!(result.is_err());
    }

    #[cfg(unix)]
    #[test]
    fn run_captures_stdout() {
        let result = run("echo", &["hello"], &ToolOptions::default()).unwrap();
        assert!(result.stdout.contains("hello"));
    }

    #[cfg(unix)]
    #[test]
    fn run_with_env_override() {
        let mut options = ToolOptions::default();
        options
            .env
            .insert("CAIRN_TEST_VAR".to_string(), "42".to_string());

        let result = run("sh", &["-c", "echo $CAIRN_TEST_VAR"], &options).unwrap();
        assert!(result.stdout.contains("42"));
    }

    #[cfg(unix)]
    #[test]
    fn empty_env_value_removes_variable() {
        std::env::set_var("CAIRN_TEST_REMOVED", "present");
        let mut options = ToolOptions::default();
        options
            .env
            .insert("CAIRN_TEST_REMOVED".to_string(), String::new());

        let result = run("sh", &["-c", "echo [$CAIRN_TEST_REMOVED]"], &options).unwrap();
        std::env::remove_var("CAIRN_TEST_REMOVED");
        assert!(result.stdout.contains("[]"));
    }

    #[cfg(unix)]
    #[test]
    fn run_with_cwd() {
        let temp = tempfile::TempDir::new().unwrap();
        let options = ToolOptions {
            cwd: Some(temp.path().to_path_buf()),
            ..Default::default()
        };

        let result = run("pwd", &[], &options).unwrap();
        assert!(result.success);
    }

    #[cfg(unix)]
    #[test]
    fn duration_is_tracked() {
        let result = run("true", &[], &ToolOptions::default()).unwrap();
        assert!(result.duration.as_millis() < 5000);
    }
}
