//! Interpreter resolution inside an environment root.
//!
//! A virtual environment's interpreter lives at a small set of well-known
//! relative locations that differ by platform convention. Resolution tries
//! every plausible candidate in order and returns the first that exists on
//! disk; the registry does not guarantee the root still exists, so absence
//! of every candidate is a resolution failure, not a panic.

use std::path::{Path, PathBuf};

/// Platform layout convention for an environment root.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathConvention {
    Windows,
    Posix,
}

impl PathConvention {
    /// The convention of the running platform.
    pub fn current() -> Self {
        if cfg!(windows) {
            Self::Windows
        } else {
            Self::Posix
        }
    }

    /// Candidate interpreter locations relative to the environment root,
    /// in resolution order.
    pub fn candidates(&self) -> &'static [&'static str] {
        match self {
            // Includes bin/python.exe: some cross-built environments use a
            // POSIX-style layout with Windows binaries.
            Self::Windows => &["Scripts/python.exe", "python.exe", "bin/python.exe"],
            Self::Posix => &["bin/python", "python"],
        }
    }

    /// Resolve the interpreter under `root`, first existing candidate wins.
    pub fn resolve(&self, root: &Path) -> Option<PathBuf> {
        for candidate in self.candidates() {
            let path = root.join(candidate);
            if path.exists() {
                tracing::debug!("found interpreter at {}", path.display());
                return Some(path);
            }
            tracing::debug!("no interpreter at {}", path.display());
        }
        None
    }

    /// The full candidate list under `root`, for error messages.
    pub fn describe(&self, root: &Path) -> String {
        self.candidates()
            .iter()
            .map(|c| root.join(c).display().to_string())
            .collect::<Vec<_>>()
            .join(", ")
    }
}
